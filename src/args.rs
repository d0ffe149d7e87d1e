use clap::Parser;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{FiscalError, FiscalResult, NOME_RELATORIO, REGEX_SEARCH_XML};

// Estrutura para o Clap processar os argumentos da linha de comando
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Arguments {
    /// Clear screen
    #[arg(short, long, default_value_t = false)]
    clear: bool,

    /// Arquivo CSV (delimitado por ';') com o mesmo conteúdo da planilha
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Planilha de saída
    #[arg(short, long, default_value = NOME_RELATORIO)]
    output: PathBuf,

    /// Ativar modo detalhado (verbose)
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    /// Arquivos XML de NF-e ou diretórios que os contenham.
    ///
    /// Diretórios são pesquisados (sem recursão) por arquivos `*.xml`.
    #[arg(default_value = ".")]
    paths: Vec<PathBuf>,
}

#[derive(Debug)]
pub struct Config {
    pub clear: bool,
    pub verbose: bool,

    // Arquivos XML, na ordem de processamento
    pub arquivos_xml: Vec<PathBuf>,

    pub target: PathBuf,
    pub target_csv: Option<PathBuf>,
}

pub fn get_config() -> FiscalResult<Config> {
    let args = Arguments::parse();

    // 1. Expandir diretórios; arquivos explícitos mantêm a ordem informada
    let arquivos_xml = collect_xml_files(&args.paths)?;

    // 2. Imprimir aqui, mantendo a função de busca "pura"
    println!(" Arquivo(s) XML a processar:\n");
    arquivos_xml.iter().enumerate().for_each(|(i, path)| {
        println!("{:6}: {}", i + 1, path.display());
    });
    println!();

    Ok(Config {
        clear: args.clear,
        verbose: args.verbose,
        arquivos_xml,
        target: args.output,
        target_csv: args.csv,
    })
}

/// Resolve a lista de entradas em arquivos XML.
pub fn collect_xml_files(paths: &[PathBuf]) -> FiscalResult<Vec<PathBuf>> {
    let mut arquivos_xml = Vec::new();

    for path in paths {
        if path.is_dir() {
            arquivos_xml.extend(search_xml_files(path)?);
        } else {
            // Arquivos inexistentes seguem adiante: geram uma linha de falha
            arquivos_xml.push(path.clone());
        }
    }

    if arquivos_xml.is_empty() {
        return Err(FiscalError::NoXmlFilesFound);
    }

    Ok(arquivos_xml)
}

/// Procura arquivos XML no diretório informado, em ordem alfabética.
pub fn search_xml_files(dir: &Path) -> FiscalResult<Vec<PathBuf>> {
    // 1. Leitura funcional do diretório
    let mut arquivos_xml: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(FiscalError::Io)?
        .flatten() // Transforma Result<DirEntry> em DirEntry, ignorando erros individuais
        .filter_map(|entry| {
            let path = entry.path();
            let is_match = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|name| REGEX_SEARCH_XML.is_match(name))
                .unwrap_or_default();

            if path.is_file() && is_match {
                Some(path)
            } else {
                None
            }
        })
        .collect();

    // 2. Ordenação (alfabética)
    arquivos_xml.sort();

    Ok(arquivos_xml)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn pesquisa_xml_em_ordem_alfabetica() {
        let dir = tempdir().unwrap();
        for nome in ["b.xml", "a.XML", "c.txt", ".oculto.xml", "d.xml.bak"] {
            fs::write(dir.path().join(nome), "<NFe/>").unwrap();
        }
        fs::create_dir(dir.path().join("sub.xml")).unwrap();

        let encontrados: Vec<String> = search_xml_files(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(encontrados, vec!["a.XML", "b.xml"]);
    }

    #[test]
    fn arquivos_explicitos_mantem_a_ordem() {
        let dir = tempdir().unwrap();
        let z = dir.path().join("z.xml");
        let a = dir.path().join("a.xml");
        fs::write(&z, "<NFe/>").unwrap();
        fs::write(&a, "<NFe/>").unwrap();

        let arquivos = collect_xml_files(&[z.clone(), a.clone()]).unwrap();
        assert_eq!(arquivos, vec![z, a]);
    }

    #[test]
    fn diretorio_sem_xml() {
        let dir = tempdir().unwrap();
        let resultado = collect_xml_files(&[dir.path().to_path_buf()]);
        assert!(matches!(resultado, Err(FiscalError::NoXmlFilesFound)));
    }
}
