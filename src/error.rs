use std::{io, path::PathBuf};
use thiserror::Error;

/// Tipo de retorno conveniente para todo o projeto
pub type FiscalResult<T> = Result<T, FiscalError>;

/// Falhas na leitura de um único documento XML.
///
/// Estes erros são isolados por arquivo: o lote continua e o arquivo
/// com defeito gera uma linha de falha no relatório.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Erro de leitura do XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Atributo inválido: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),

    #[error("Erro de codificação: {0}")]
    Encoding(#[from] quick_xml::encoding::EncodingError),

    #[error("Referência de entidade inválida: {0}")]
    Escape(#[from] quick_xml::escape::EscapeError),

    #[error("XML malformado: {0}")]
    Malformed(String),

    #[error("Prefixo de namespace não declarado: <{0}>")]
    UnboundPrefix(String),

    #[error("Falha ao abrir o arquivo {arquivo:?}: {source}")]
    Io {
        #[source]
        source: io::Error,
        arquivo: PathBuf,
    },
}

#[derive(Error, Debug)]
pub enum FiscalError {
    #[error("Erro de configuração: {0}")]
    Config(String),

    #[error("Erro no processamento CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Erro de I/O: {0}")]
    Io(#[from] io::Error),

    #[error(
        "Falha ao gravar o arquivo!\n\
        Arquivo: {arquivo:?}\n\
        {source}"
    )]
    IoWriter {
        #[source]
        source: io::Error,
        arquivo: PathBuf,
    },

    #[error(
        "Nenhum arquivo XML encontrado!\n\
        Exemplo:\n\
        validador_fiscal_nfe nota1.xml nota2.xml\n\
        validador_fiscal_nfe diretorio_com_xmls/"
    )]
    NoXmlFilesFound,

    #[error("Erro na geração da planilha: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}
