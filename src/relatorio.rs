use rust_xlsxwriter::{Format, Workbook};
use std::{
    borrow::Cow,
    collections::HashMap,
    fs::{self, File},
    io::{BufRead, BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::{
    FiscalError, FiscalRecord, FiscalResult, NAO_ENCONTRADO, ParseError, extrair_dados,
    validar_dados,
};

/// Nome padrão do relatório.
pub const NOME_RELATORIO: &str = "relatorio_validacao_fiscal.xlsx";

/// Tipo MIME do relatório.
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Cabeçalho do relatório, na ordem das colunas.
pub const COLUNAS: [&str; 8] = [
    "numero_nota",
    "chave",
    "cfop",
    "cst_icms",
    "cst_pis",
    "cst_cofins",
    "regime",
    "inconsistencias",
];

/// Máximo de caracteres aceito em uma célula do formato `.xlsx`.
pub const LIMITE_CELULA_XLSX: usize = 32_767;

/// Prefixo da coluna `inconsistencias` para arquivos não lidos.
pub const MSG_PARSE_ERROR: &str = "Parse error";

/// Resultado do processamento de um único arquivo.
#[derive(Debug)]
pub enum FileOutcome {
    Processed(FiscalRecord),
    Failed { source: String, error: ParseError },
}

impl FileOutcome {
    pub fn to_row(&self) -> ReportRow {
        match self {
            FileOutcome::Processed(registro) => ReportRow::from(registro),
            FileOutcome::Failed { error, .. } => {
                let registro = FiscalRecord::default();
                ReportRow {
                    inconsistencias: format!("{MSG_PARSE_ERROR}: {error}"),
                    ..ReportRow::from(&registro)
                }
            }
        }
    }
}

/// Uma linha do relatório de validação.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub numero_nota: String,
    pub chave: String,
    pub cfop: String,
    pub cst_icms: String,
    pub cst_pis: String,
    pub cst_cofins: String,
    pub regime: String,
    pub inconsistencias: String,
}

impl From<&FiscalRecord> for ReportRow {
    fn from(registro: &FiscalRecord) -> Self {
        ReportRow {
            numero_nota: registro
                .invoice_number
                .clone()
                .unwrap_or_else(|| NAO_ENCONTRADO.to_string()),
            chave: registro.access_key.clone(),
            cfop: registro.cfop.clone(),
            cst_icms: registro.cst_icms.clone(),
            cst_pis: registro.cst_pis.clone(),
            cst_cofins: registro.cst_cofins.clone(),
            regime: registro.regime.to_string(),
            inconsistencias: registro.inconsistencias(),
        }
    }
}

impl ReportRow {
    /// Valores na ordem de [`COLUNAS`].
    pub fn campos(&self) -> [&str; 8] {
        [
            &self.numero_nota,
            &self.chave,
            &self.cfop,
            &self.cst_icms,
            &self.cst_pis,
            &self.cst_cofins,
            &self.regime,
            &self.inconsistencias,
        ]
    }

    pub fn is_ok(&self) -> bool {
        self.inconsistencias == "OK"
    }

    pub fn is_failure(&self) -> bool {
        self.inconsistencias.starts_with(MSG_PARSE_ERROR)
    }
}

/// Extrai e valida um documento, sem interromper o lote em caso de falha.
pub fn process_file<R: BufRead>(source: &str, entrada: R) -> FileOutcome {
    match extrair_dados(entrada) {
        Ok(mut registro) => {
            registro.inconsistencies = validar_dados(&registro);
            tracing::debug!(
                arquivo = source,
                cfop = %registro.cfop,
                resultado = %registro.inconsistencias(),
                "nota validada"
            );
            FileOutcome::Processed(registro)
        }
        Err(error) => {
            tracing::warn!(arquivo = source, %error, "falha na leitura do XML");
            FileOutcome::Failed {
                source: source.to_string(),
                error,
            }
        }
    }
}

/// Processa os documentos na ordem recebida: uma linha por documento.
///
/// ```
/// use validador_fiscal_nfe::process_files;
///
/// let nota = r#"<NFe xmlns="http://www.portalfiscal.inf.br/nfe"><infNFe>
///   <det><prod><CFOP>9999</CFOP></prod></det></infNFe></NFe>"#;
///
/// let linhas = process_files([("nota.xml", nota.as_bytes()), ("lixo.xml", &b"<<"[..])]);
///
/// assert_eq!(linhas.len(), 2);
/// assert_eq!(linhas[0].cfop, "9999");
/// assert!(linhas[1].inconsistencias.starts_with("Parse error"));
/// ```
pub fn process_files<I, S, R>(entradas: I) -> Vec<ReportRow>
where
    I: IntoIterator<Item = (S, R)>,
    S: AsRef<str>,
    R: BufRead,
{
    entradas
        .into_iter()
        .map(|(source, entrada)| process_file(source.as_ref(), entrada).to_row())
        .collect()
}

/// Processa arquivos XML na ordem informada.
///
/// Arquivos que não podem ser abertos também geram uma linha de falha.
/// Arquivos com conteúdo idêntico são apontados no log, mas processados.
pub fn process_paths(paths: &[PathBuf]) -> Vec<FileOutcome> {
    let mut vistos: HashMap<blake3::Hash, &Path> = HashMap::new();

    paths
        .iter()
        .map(|path| {
            let source = path.display().to_string();

            let bytes = match fs::read(path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    let error = ParseError::Io {
                        source: e,
                        arquivo: path.clone(),
                    };
                    tracing::warn!(arquivo = %source, %error, "arquivo não lido");
                    return FileOutcome::Failed { source, error };
                }
            };

            let hash = blake3::hash(&bytes);
            match vistos.get(&hash) {
                Some(anterior) => tracing::warn!(
                    arquivo = %source,
                    anterior = %anterior.display(),
                    "conteúdo idêntico a outro arquivo do lote"
                ),
                None => {
                    vistos.insert(hash, path);
                }
            }

            process_file(&source, bytes.as_slice())
        })
        .collect()
}

/// Serializa as linhas em uma planilha `.xlsx` de aba única.
///
/// A primeira linha é o cabeçalho ([`COLUNAS`]); não há coluna de índice.
pub fn to_spreadsheet(rows: &[ReportRow]) -> FiscalResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Sheet1")?;

    for (col, nome) in COLUNAS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *nome, &header)?;
    }

    for (idx, row) in rows.iter().enumerate() {
        let linha = u32::try_from(idx + 1).map_err(|_| {
            FiscalError::Config(format!("Número de linhas excede o limite da planilha: {idx}"))
        })?;

        for (col, valor) in row.campos().into_iter().enumerate() {
            let valor = truncar_celula(valor);
            if let Cow::Owned(_) = valor {
                tracing::warn!(
                    linha,
                    coluna = COLUNAS[col],
                    "valor truncado em {LIMITE_CELULA_XLSX} caracteres"
                );
            }
            worksheet.write_string(linha, col as u16, valor.as_ref())?;
        }
    }

    worksheet.autofit();

    Ok(workbook.save_to_buffer()?)
}

// O arquivo CSV mantém o valor completo
fn truncar_celula(valor: &str) -> Cow<'_, str> {
    match valor.char_indices().nth(LIMITE_CELULA_XLSX) {
        Some((corte, _)) => Cow::Owned(valor[..corte].to_string()),
        None => Cow::Borrowed(valor),
    }
}

/// Grava a planilha no caminho informado.
pub fn write_spreadsheet(rows: &[ReportRow], path: &Path) -> FiscalResult<()> {
    let bytes = to_spreadsheet(rows)?;

    let mut file = File::create(path).map_err(|e| FiscalError::IoWriter {
        source: e,
        arquivo: path.to_path_buf(),
    })?;

    file.write_all(&bytes)?;
    file.flush()?;
    Ok(())
}

/// Exporta as linhas em CSV delimitado por ';'.
pub fn write_csv(rows: &[ReportRow], path: &Path) -> FiscalResult<()> {
    let file = File::create(path).map_err(|e| FiscalError::IoWriter {
        source: e,
        arquivo: path.to_path_buf(),
    })?;

    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b';')
        .from_writer(BufWriter::new(file));

    wtr.write_record(COLUNAS)?;
    for row in rows {
        wtr.write_record(row.campos())?;
    }

    wtr.flush()?;
    Ok(())
}

/// Totais do lote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Resumo {
    pub total: usize,
    pub ok: usize,
    pub com_inconsistencias: usize,
    pub falhas: usize,
}

impl Resumo {
    pub fn from_rows(rows: &[ReportRow]) -> Self {
        rows.iter().fold(Resumo::default(), |mut acc, row| {
            acc.total += 1;
            if row.is_ok() {
                acc.ok += 1;
            } else if row.is_failure() {
                acc.falhas += 1;
            } else {
                acc.com_inconsistencias += 1;
            }
            acc
        })
    }
}

/// Exibe o resultado da validação em formato de tabela.
pub fn imprimir_resultados(rows: &[ReportRow]) {
    // Quebras de linha e indentação (comuns na chave de acesso) viram um espaço
    let exibir: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            row.campos()
                .iter()
                .map(|campo| campo.split_whitespace().collect::<Vec<_>>().join(" "))
                .collect()
        })
        .collect();

    // Largura de cada coluna: maior entre cabeçalho e valores
    let larguras: Vec<usize> = COLUNAS
        .iter()
        .enumerate()
        .map(|(col, nome)| {
            exibir
                .iter()
                .map(|campos| campos[col].chars().count())
                .chain(std::iter::once(nome.chars().count()))
                .max()
                .unwrap_or_default()
        })
        .collect();

    let formatar = |valores: Vec<&str>| -> String {
        valores
            .iter()
            .zip(&larguras)
            .map(|(valor, &largura)| format!("{valor:<largura$}"))
            .collect::<Vec<_>>()
            .join(" | ")
    };

    println!(" ### Resultado da Validação\n");
    println!(" {}", formatar(COLUNAS.to_vec()));
    println!(
        " {}",
        larguras
            .iter()
            .map(|&largura| "-".repeat(largura))
            .collect::<Vec<_>>()
            .join("-+-")
    );

    for campos in &exibir {
        println!(" {}", formatar(campos.iter().map(String::as_str).collect()));
    }

    let resumo = Resumo::from_rows(rows);

    println!(
        "\n Notas analisadas: {:>7}\n Sem inconsistências: {:>4}\n Com inconsistências: {:>4}\n Falhas de leitura: {:>6}\n",
        fmt_milhares(resumo.total),
        fmt_milhares(resumo.ok),
        fmt_milhares(resumo.com_inconsistencias),
        fmt_milhares(resumo.falhas),
    );
}

pub fn fmt_milhares(n: usize) -> String {
    let s = n.to_string();
    let len = s.len();
    let mut result = String::with_capacity(len + len / 3);

    s.chars().enumerate().for_each(|(i, c)| {
        // Adiciona o ponto se:
        // 1. Não for o primeiro caractere (i > 0)
        // 2. A distância até o fim for múltipla de 3
        if i > 0 && (len - i).is_multiple_of(3) {
            result.push('.');
        }
        result.push(c);
    });

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MSG_INVALIDA, MSG_NAO_ENCONTRADA};
    use pretty_assertions::assert_eq;

    fn nota(cfop: &str, cst_icms: &str, cst: &str) -> String {
        format!(
            r#"<nfeProc xmlns="http://www.portalfiscal.inf.br/nfe"><NFe><infNFe>
                <ide><nNF>77</nNF></ide>
                <det nItem="1"><prod><CFOP>{cfop}</CFOP></prod>
                <imposto>
                  <ICMS><ICMS00><CST>{cst_icms}</CST></ICMS00></ICMS>
                  <PIS><PISAliq><CST>{cst}</CST></PISAliq></PIS>
                  <COFINS><COFINSAliq><CST>{cst}</CST></COFINSAliq></COFINS>
                </imposto></det>
            </infNFe></NFe></nfeProc>"#
        )
    }

    #[test]
    fn uma_linha_por_arquivo_na_ordem_recebida() {
        let valida = nota("5101", "00", "01");
        let invalida = nota("5101", "40", "04");
        let ausente = nota("9999", "00", "01");

        let rows = process_files([
            ("a.xml", valida.as_bytes()),
            ("b.xml", b"<NFe>".as_slice()),
            ("c.xml", invalida.as_bytes()),
            ("d.xml", ausente.as_bytes()),
        ]);

        let inconsistencias: Vec<&str> = rows.iter().map(|r| r.inconsistencias.as_str()).collect();

        assert_eq!(rows.len(), 4);
        assert_eq!(inconsistencias[0], "OK");
        assert!(inconsistencias[1].starts_with("Parse error: "));
        assert_eq!(inconsistencias[2], MSG_INVALIDA);
        assert_eq!(inconsistencias[3], MSG_NAO_ENCONTRADA);
        assert_eq!(rows[3].cfop, "9999");
    }

    #[test]
    fn linha_de_nota_valida() {
        let xml = nota("5101", "00", "01");
        let rows = process_files([("a.xml", xml.as_bytes())]);

        assert_eq!(
            rows[0].campos(),
            [
                "77",
                rows[0].chave.as_str(),
                "5101",
                "00",
                "01",
                "01",
                "Lucro Presumido",
                "OK"
            ]
        );
    }

    #[test]
    fn linha_de_falha_usa_sentinela() {
        let outcome = process_file("x.xml", b"nada".as_slice());
        assert!(matches!(outcome, FileOutcome::Failed { ref source, .. } if source == "x.xml"));

        let row = outcome.to_row();
        assert_eq!(row.numero_nota, NAO_ENCONTRADO);
        assert_eq!(row.cfop, NAO_ENCONTRADO);
        assert_eq!(row.regime, "Lucro Presumido");
        assert!(row.is_failure());
    }

    #[test]
    fn cfop_ausente_resulta_em_combinacao_nao_encontrada() {
        let xml = r#"<NFe xmlns="http://www.portalfiscal.inf.br/nfe"><infNFe>
            <det><imposto><ICMS><ICMS00><CST>00</CST></ICMS00></ICMS></imposto></det>
        </infNFe></NFe>"#;
        let rows = process_files([("a.xml", xml.as_bytes())]);

        assert_eq!(rows[0].cfop, NAO_ENCONTRADO);
        assert_eq!(rows[0].inconsistencias, MSG_NAO_ENCONTRADA);
    }

    #[test]
    fn lote_vazio() {
        let rows = process_files(Vec::<(&str, &[u8])>::new());
        assert!(rows.is_empty());
        assert_eq!(Resumo::from_rows(&rows), Resumo::default());
    }

    #[test]
    fn resumo_do_lote() {
        let valida = nota("5101", "00", "01");
        let invalida = nota("6101", "40", "04");
        let rows = process_files([
            ("a.xml", valida.as_bytes()),
            ("b.xml", invalida.as_bytes()),
            ("c.xml", b"".as_slice()),
            ("d.xml", valida.as_bytes()),
        ]);

        assert_eq!(
            Resumo::from_rows(&rows),
            Resumo {
                total: 4,
                ok: 2,
                com_inconsistencias: 1,
                falhas: 1,
            }
        );
    }

    #[test]
    fn planilha_e_um_arquivo_zip() {
        let xml = nota("5101", "00", "01");
        let rows = process_files([("a.xml", xml.as_bytes())]);

        let bytes = to_spreadsheet(&rows).unwrap();
        assert!(bytes.starts_with(b"PK"));

        let vazia = to_spreadsheet(&[]).unwrap();
        assert!(vazia.starts_with(b"PK"));
    }

    #[test]
    fn valores_longos_sao_truncados_na_planilha() {
        let xml = nota("5101", "00", "01");
        let mut rows = process_files([("a.xml", xml.as_bytes())]);

        let mut longa = rows[0].clone();
        longa.cfop = "9".repeat(40_000);
        longa.inconsistencias = "é".repeat(LIMITE_CELULA_XLSX + 1);
        rows.push(longa);

        let bytes = to_spreadsheet(&rows).unwrap();
        assert!(bytes.starts_with(b"PK"));

        assert_eq!(truncar_celula(&rows[1].cfop).chars().count(), LIMITE_CELULA_XLSX);
        assert_eq!(
            truncar_celula(&rows[1].inconsistencias).chars().count(),
            LIMITE_CELULA_XLSX
        );
        assert!(matches!(truncar_celula("5101"), Cow::Borrowed("5101")));
    }

    #[test]
    fn formatar_milhares() {
        assert_eq!(fmt_milhares(0), "0");
        assert_eq!(fmt_milhares(999), "999");
        assert_eq!(fmt_milhares(1000), "1.000");
        assert_eq!(fmt_milhares(1234567), "1.234.567");
    }
}
