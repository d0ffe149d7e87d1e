use execution_time::ExecutionTime;
use std::{process, process::Command};

use validador_fiscal_nfe::{
    FiscalError, FiscalResult, ReportRow, TABELA_VALIDACAO, XLSX_MIME, check_rules_table,
    get_config, imprimir_resultados, process_paths, regimes_inalcancaveis, write_csv,
    write_spreadsheet,
};

fn main() {
    // A forma mais idiomática de reportar erros ao usuário final sem stack trace técnico
    if let Err(err) = run() {
        eprintln!("\n[ERRO CRÍTICO]: {err}");
        process::exit(1);
    }
}

fn run() -> FiscalResult<()> {
    let timer = ExecutionTime::start();

    // 1. Obter Configurações
    let config = get_config()?;
    init_tracing(config.verbose)?;

    // 2. Setup inicial
    clear_screen(config.clear)?;
    imprimir_versao_do_programa();

    if config.verbose {
        println!("{:#?}\n", config);
    }

    // 3. Consistência da tabela de regras (apenas alertas)
    for aviso in check_rules_table(&TABELA_VALIDACAO) {
        tracing::warn!("tabela de validação: {aviso}");
    }
    for regime in regimes_inalcancaveis(&TABELA_VALIDACAO) {
        tracing::debug!(%regime, "regras sem correspondência no regime atribuído às notas");
    }

    // 4. Extração e validação, um arquivo por vez
    let rows: Vec<ReportRow> = process_paths(&config.arquivos_xml)
        .iter()
        .map(|outcome| outcome.to_row())
        .collect();

    // 5. Exibição
    imprimir_resultados(&rows);

    // 6. Exportação
    write_spreadsheet(&rows, &config.target)?;
    tracing::info!(arquivo = %config.target.display(), mime = XLSX_MIME, "planilha gravada");
    println!(" Relatório gravado em <{}>.", config.target.display());

    if let Some(target_csv) = &config.target_csv {
        write_csv(&rows, target_csv)?;
        println!(" Relatório CSV gravado em <{}>.", target_csv.display());
    }

    println!("\n Validação concluída.\n");
    timer.print_elapsed_time();

    Ok(())
}

fn init_tracing(verbose: bool) -> FiscalResult<()> {
    let level = if verbose { "debug" } else { "warn" };

    let filter = tracing_subscriber::EnvFilter::try_from_env("VALIDADOR_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| FiscalError::Config(format!("falha ao iniciar o log: {error}")))
}

/// Limpar a tela.
fn clear_screen(clear_screen: bool) -> FiscalResult<()> {
    if clear_screen {
        if cfg!(target_os = "windows") {
            // No Windows, 'cls' é um comando interno do 'cmd'.
            Command::new("cmd").args(["/c", "cls"]).status()?;
        } else {
            Command::new("clear").status()?;
        }
    }

    Ok(())
}

/// Exibe a descrição e a versão do programa.
fn imprimir_versao_do_programa() {
    let descr = [
        "Este programa extrai de arquivos XML de NF-e o CFOP e os CSTs de ICMS, PIS e COFINS.",
        "A combinação (CFOP, CST ICMS, CST PIS, CST COFINS, Regime) é pesquisada na tabela de validação fiscal.",
        "O regime considerado é sempre Lucro Presumido.",
        "Cada arquivo gera uma linha no relatório, mesmo quando não pode ser lido.",
    ];

    for line in &descr {
        println!(" {}", line);
    }

    println!("\n versão: {}\n", env!("CARGO_PKG_VERSION"));
}
