use quick_xml::{
    NsReader,
    encoding::Decoder,
    events::{BytesStart, Event},
    name::{Namespace, ResolveResult},
};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use crate::{ParseError, RE_XML_NAME, REGIME_PADRAO, Regime, RuleKey};

/// Namespace dos documentos da NF-e.
pub const NFE_NAMESPACE: &str = "http://www.portalfiscal.inf.br/nfe";

/// Valor atribuído aos campos ausentes no documento.
pub const NAO_ENCONTRADO: &str = "N/A";

/// Dados fiscais de uma nota, extraídos de um único arquivo XML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiscalRecord {
    pub invoice_number: Option<String>,
    pub access_key: String,
    pub cfop: String,
    pub cst_icms: String,
    pub cst_pis: String,
    pub cst_cofins: String,
    pub regime: Regime,
    pub inconsistencies: Vec<String>,
}

impl Default for FiscalRecord {
    fn default() -> Self {
        FiscalRecord {
            invoice_number: None,
            access_key: NAO_ENCONTRADO.to_string(),
            cfop: NAO_ENCONTRADO.to_string(),
            cst_icms: NAO_ENCONTRADO.to_string(),
            cst_pis: NAO_ENCONTRADO.to_string(),
            cst_cofins: NAO_ENCONTRADO.to_string(),
            regime: REGIME_PADRAO,
            inconsistencies: Vec::new(),
        }
    }
}

impl FiscalRecord {
    pub fn key(&self) -> RuleKey<'_> {
        (
            &self.cfop,
            &self.cst_icms,
            &self.cst_pis,
            &self.cst_cofins,
            self.regime,
        )
    }

    pub fn is_ok(&self) -> bool {
        self.inconsistencies.is_empty()
    }

    /// Inconsistências separadas por "; " ou "OK".
    pub fn inconsistencias(&self) -> String {
        if self.is_ok() {
            "OK".to_string()
        } else {
            self.inconsistencies.join("; ")
        }
    }
}

// Caminhos relativos, procurados em qualquer profundidade abaixo da raiz.
// A ordem corresponde à desestruturação em `extrair_dados`.
const CAMINHOS: [&[&str]; 6] = [
    &["ide", "nNF"],
    &["infNFe"],
    &["det", "prod", "CFOP"],
    &["ICMS00", "CST"],
    &["PIS", "PISAliq", "CST"],
    &["COFINS", "COFINSAliq", "CST"],
];

#[derive(Debug)]
enum Estado {
    Pendente,
    Capturando { profundidade: usize, texto: String },
    Encontrado(String),
}

#[derive(Debug)]
struct Consulta {
    caminho: &'static [&'static str],
    estado: Estado,
}

impl Consulta {
    fn new(caminho: &'static [&'static str]) -> Self {
        Consulta {
            caminho,
            estado: Estado::Pendente,
        }
    }

    /// Encerra a captura do elemento aberto na profundidade informada.
    fn encerrar(&mut self, nivel: usize) {
        if let Estado::Capturando { profundidade, texto } = &mut self.estado {
            if *profundidade == nivel {
                self.estado = Estado::Encontrado(std::mem::take(texto));
            }
        }
    }

    fn valor(self) -> Option<String> {
        match self.estado {
            Estado::Encontrado(texto) => Some(texto),
            _ => None,
        }
    }
}

/// Nome local dos elementos no namespace da NF-e; `None` para os demais.
type Pilha = Vec<Option<Vec<u8>>>;

/// Verifica se o topo da pilha termina com o caminho.
/// O primeiro passo do caminho precisa ser descendente da raiz.
fn corresponde(pilha: &Pilha, caminho: &[&str]) -> bool {
    pilha.len() > caminho.len()
        && pilha[pilha.len() - caminho.len()..]
            .iter()
            .zip(caminho)
            .all(|(nome, passo)| nome.as_deref() == Some(passo.as_bytes()))
}

fn nome_nfe(ns: ResolveResult<'_>, e: &BytesStart<'_>) -> Result<Option<Vec<u8>>, ParseError> {
    match ns {
        ResolveResult::Bound(Namespace(uri)) if uri == NFE_NAMESPACE.as_bytes() => {
            Ok(Some(e.local_name().as_ref().to_vec()))
        }
        ResolveResult::Unknown(prefixo) => Err(ParseError::UnboundPrefix(
            String::from_utf8_lossy(&prefixo).into_owned(),
        )),
        _ => Ok(None),
    }
}

/// Confere o nome da tag e seus atributos, que o leitor não valida.
///
/// Nomes e valores são decodificados na codificação declarada no documento.
fn validar_tag(decoder: Decoder, e: &BytesStart<'_>) -> Result<(), ParseError> {
    let qname = e.name();
    let nome = decoder.decode(qname.as_ref())?;
    if !RE_XML_NAME.is_match(&nome) {
        return Err(ParseError::Malformed(format!(
            "nome de elemento inválido: <{nome}>"
        )));
    }

    // with_checks: atributo sem valor ou repetido é erro
    for atributo in e.attributes().with_checks(true) {
        let atributo = atributo?;

        let chave = decoder.decode(atributo.key.as_ref())?;
        if !RE_XML_NAME.is_match(&chave) {
            return Err(ParseError::Malformed(format!(
                "nome de atributo inválido em <{nome}>: {chave}"
            )));
        }
        if atributo.value.contains(&b'<') {
            return Err(ParseError::Malformed(format!(
                "'<' no valor do atributo {chave} de <{nome}>"
            )));
        }
        atributo.decode_and_unescape_value(decoder)?;
    }

    Ok(())
}

// Evento já copiado para fora do buffer do leitor
enum Passo {
    Abre { nome: Option<Vec<u8>>, vazio: bool },
    Fecha,
    Texto(String),
    Fim,
    Outro,
}

/// Extrai os dados fiscais de um documento XML da NF-e.
///
/// Cada campo recebe o texto do primeiro elemento correspondente, na ordem
/// do documento. Campos ausentes recebem `"N/A"`; um elemento presente e
/// sem texto resulta em `""`. O texto não é aparado.
///
/// A chave de acesso é o texto próprio do elemento `infNFe` (anterior ao
/// primeiro filho), e não o atributo `Id`. Apenas o grupo `ICMS00` é
/// consultado para o CST do ICMS.
///
/// XML malformado resulta em [`ParseError`].
///
/// ```
/// use validador_fiscal_nfe::extrair_dados;
///
/// let xml = r#"<NFe xmlns="http://www.portalfiscal.inf.br/nfe"><infNFe>
///     <det nItem="1"><prod><CFOP>5101</CFOP></prod></det>
/// </infNFe></NFe>"#;
///
/// let nota = extrair_dados(xml.as_bytes())?;
/// assert_eq!(nota.cfop, "5101");
/// assert_eq!(nota.cst_icms, "N/A");
/// # Ok::<(), validador_fiscal_nfe::ParseError>(())
/// ```
pub fn extrair_dados<R: BufRead>(entrada: R) -> Result<FiscalRecord, ParseError> {
    let mut reader = NsReader::from_reader(entrada);
    let mut buf = Vec::new();

    let mut pilha: Pilha = Vec::new();
    let mut consultas = CAMINHOS.map(Consulta::new);
    let mut raiz_encontrada = false;
    let mut raiz_encerrada = false;

    loop {
        let passo = {
            let (ns, evento) = reader.read_resolved_event_into(&mut buf)?;
            match evento {
                Event::Start(e) => {
                    let nome = nome_nfe(ns, &e)?;
                    validar_tag(reader.decoder(), &e)?;
                    Passo::Abre { nome, vazio: false }
                }
                Event::Empty(e) => {
                    let nome = nome_nfe(ns, &e)?;
                    validar_tag(reader.decoder(), &e)?;
                    Passo::Abre { nome, vazio: true }
                }
                Event::End(_) => Passo::Fecha,
                Event::Text(e) => Passo::Texto(e.unescape()?.into_owned()),
                Event::CData(e) => Passo::Texto(e.decode()?.into_owned()),
                Event::Eof => Passo::Fim,
                _ => Passo::Outro,
            }
        };
        buf.clear();

        match passo {
            Passo::Abre { nome, vazio } => {
                if raiz_encerrada {
                    return Err(ParseError::Malformed(
                        "conteúdo após o elemento raiz".to_string(),
                    ));
                }
                raiz_encontrada = true;

                // Um filho encerra o texto próprio do elemento pai
                let nivel = pilha.len();
                consultas.iter_mut().for_each(|c| c.encerrar(nivel));

                pilha.push(nome);

                for consulta in consultas
                    .iter_mut()
                    .filter(|c| matches!(c.estado, Estado::Pendente))
                {
                    if corresponde(&pilha, consulta.caminho) {
                        consulta.estado = if vazio {
                            Estado::Encontrado(String::new())
                        } else {
                            Estado::Capturando {
                                profundidade: pilha.len(),
                                texto: String::new(),
                            }
                        };
                    }
                }

                if vazio {
                    pilha.pop();
                    raiz_encerrada = pilha.is_empty();
                }
            }
            Passo::Fecha => {
                let nivel = pilha.len();
                consultas.iter_mut().for_each(|c| c.encerrar(nivel));
                pilha.pop();
                raiz_encerrada = pilha.is_empty();
            }
            Passo::Texto(texto) => {
                if pilha.is_empty() {
                    // Espaços e BOM são aceitos fora da raiz
                    if !texto.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}').is_empty() {
                        return Err(ParseError::Malformed(
                            "texto fora do elemento raiz".to_string(),
                        ));
                    }
                    continue;
                }

                let nivel = pilha.len();
                for consulta in consultas.iter_mut() {
                    match &mut consulta.estado {
                        Estado::Capturando {
                            profundidade,
                            texto: capturado,
                        } if *profundidade == nivel => capturado.push_str(&texto),
                        _ => {}
                    }
                }
            }
            Passo::Fim => {
                if !raiz_encontrada {
                    return Err(ParseError::Malformed("nenhum elemento encontrado".to_string()));
                }
                if !pilha.is_empty() {
                    return Err(ParseError::Malformed(format!(
                        "{} elemento(s) não fechado(s)",
                        pilha.len()
                    )));
                }
                break;
            }
            Passo::Outro => {}
        }
    }

    let [numero, chave, cfop, cst_icms, cst_pis, cst_cofins] = consultas.map(Consulta::valor);
    let ou_sentinela = |valor: Option<String>| valor.unwrap_or_else(|| NAO_ENCONTRADO.to_string());

    Ok(FiscalRecord {
        invoice_number: numero,
        access_key: ou_sentinela(chave),
        cfop: ou_sentinela(cfop),
        cst_icms: ou_sentinela(cst_icms),
        cst_pis: ou_sentinela(cst_pis),
        cst_cofins: ou_sentinela(cst_cofins),
        regime: REGIME_PADRAO,
        inconsistencies: Vec::new(),
    })
}

/// Extrai os dados fiscais de um arquivo XML da NF-e.
pub fn extrair_dados_do_arquivo(path: &Path) -> Result<FiscalRecord, ParseError> {
    let file = File::open(path).map_err(|e| ParseError::Io {
        source: e,
        arquivo: path.to_path_buf(),
    })?;

    extrair_dados(BufReader::new(file))
}
