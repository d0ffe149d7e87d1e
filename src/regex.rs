use regex::Regex;
use std::sync::LazyLock;

/// Regex para localizar arquivos de NF-e, seguindo o padrão (?ix)
/// i: case-insensitive
/// x: modo verbose (ignora espaços e permite comentários)
pub static REGEX_SEARCH_XML: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        ^ # Início da string
        [^.] # Ignora arquivos ocultos
        .*\.xml # Qualquer coisa seguida da extensão .xml
        $ # Fim da string
        ",
    )
    .unwrap()
});

// Formato dos códigos da tabela de regras
pub static RE_CFOP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}$").unwrap());
pub static RE_CST: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{2}$").unwrap());

/// Produção `Name` da especificação XML 1.0 (nomes de elementos e atributos)
pub static RE_XML_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        ^
        [:A-Z_a-z\x{C0}-\x{D6}\x{D8}-\x{F6}\x{F8}-\x{2FF}\x{370}-\x{37D}\x{37F}-\x{1FFF}
         \x{200C}-\x{200D}\x{2070}-\x{218F}\x{2C00}-\x{2FEF}\x{3001}-\x{D7FF}
         \x{F900}-\x{FDCF}\x{FDF0}-\x{FFFD}\x{10000}-\x{EFFFF}] # NameStartChar
        [:A-Z_a-z\-.0-9\x{B7}\x{C0}-\x{D6}\x{D8}-\x{F6}\x{F8}-\x{37D}\x{37F}-\x{1FFF}
         \x{200C}-\x{200D}\x{203F}-\x{2040}\x{2070}-\x{218F}\x{2C00}-\x{2FEF}
         \x{3001}-\x{D7FF}\x{F900}-\x{FDCF}\x{FDF0}-\x{FFFD}\x{10000}-\x{EFFFF}]* # NameChar
        $
        ",
    )
    .unwrap()
});
