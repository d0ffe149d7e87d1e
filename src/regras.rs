use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use crate::{RE_CFOP, RE_CST};

/// Regime de tributação do emitente.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Regime {
    LucroPresumido,
    LucroReal,
}

impl Regime {
    pub fn descricao(self) -> &'static str {
        match self {
            Regime::LucroPresumido => "Lucro Presumido",
            Regime::LucroReal => "Lucro Real",
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.descricao())
    }
}

/// Regime atribuído a toda nota extraída.
///
/// O XML da NF-e não é consultado: as regras de outros regimes
/// permanecem na tabela, mas nunca são alcançadas.
pub const REGIME_PADRAO: Regime = Regime::LucroPresumido;

/// Uma linha da tabela de validação fiscal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationRule {
    pub cfop: &'static str,
    pub cst_icms: &'static str,
    pub cst_pis: &'static str,
    pub cst_cofins: &'static str,
    pub regime: Regime,
    pub valid: bool,
}

/// Chave de busca: (CFOP, CST ICMS, CST PIS, CST COFINS, Regime)
pub type RuleKey<'a> = (&'a str, &'a str, &'a str, &'a str, Regime);

impl ValidationRule {
    pub fn key(&self) -> RuleKey<'static> {
        (
            self.cfop,
            self.cst_icms,
            self.cst_pis,
            self.cst_cofins,
            self.regime,
        )
    }
}

const fn regra(
    cfop: &'static str,
    cst_icms: &'static str,
    cst_pis: &'static str,
    cst_cofins: &'static str,
    regime: Regime,
    valid: bool,
) -> ValidationRule {
    ValidationRule {
        cfop,
        cst_icms,
        cst_pis,
        cst_cofins,
        regime,
        valid,
    }
}

use Regime::{LucroPresumido, LucroReal};

/// Tabela de validação fiscal.
///
/// A ordem de declaração é significativa: havendo mais de uma linha com a
/// mesma chave, prevalece a primeira.
pub static TABELA_VALIDACAO: [ValidationRule; 22] = [
    regra("5101", "00", "01", "01", LucroPresumido, true),
    regra("5101", "40", "04", "04", LucroPresumido, false),
    regra("6101", "00", "01", "01", LucroPresumido, true),
    regra("6101", "40", "04", "04", LucroPresumido, false),
    regra("5102", "20", "01", "01", LucroPresumido, true),
    regra("5102", "60", "04", "04", LucroPresumido, false),
    regra("6108", "41", "05", "05", LucroReal, true),
    regra("6108", "41", "01", "01", LucroReal, false),
    regra("6108", "41", "04", "04", LucroPresumido, false),
    regra("1102", "00", "01", "01", LucroPresumido, true),
    regra("2101", "00", "01", "01", LucroPresumido, true),
    regra("2101", "40", "04", "04", LucroPresumido, false),
    regra("5103", "00", "01", "01", LucroPresumido, true),
    regra("5901", "41", "04", "04", LucroPresumido, true),
    regra("5902", "41", "04", "04", LucroPresumido, true),
    regra("5910", "40", "04", "04", LucroPresumido, true),
    regra("5949", "49", "49", "49", LucroPresumido, true),
    regra("1101", "00", "01", "01", LucroPresumido, true),
    regra("1202", "00", "01", "01", LucroPresumido, true),
    regra("1910", "41", "04", "04", LucroPresumido, true),
    regra("1949", "49", "49", "49", LucroPresumido, true),
    regra("5152", "20", "01", "01", LucroPresumido, true),
];

/// Problema de qualidade de dados encontrado na tabela de regras.
///
/// Os índices são as posições (base 0) na tabela.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableWarning {
    DuplicateKey {
        primeira: usize,
        repetida: usize,
        conflitante: bool,
    },
    InvalidCode {
        linha: usize,
        campo: &'static str,
        valor: &'static str,
    },
}

impl fmt::Display for TableWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableWarning::DuplicateKey {
                primeira,
                repetida,
                conflitante,
            } => {
                write!(
                    f,
                    "Regra nº {} repete a chave da regra nº {}",
                    repetida + 1,
                    primeira + 1
                )?;
                if *conflitante {
                    write!(f, " com validade divergente (prevalece a regra nº {})", primeira + 1)?;
                }
                Ok(())
            }
            TableWarning::InvalidCode { linha, campo, valor } => write!(
                f,
                "Regra nº {}: código {campo} fora do formato esperado: '{valor}'",
                linha + 1
            ),
        }
    }
}

/// Verifica a consistência da tabela de regras.
///
/// A tabela não é alterada: chaves repetidas continuam resolvidas pela
/// primeira ocorrência. O resultado serve apenas para alertar o usuário.
///
/// ```
/// use validador_fiscal_nfe::{TABELA_VALIDACAO, check_rules_table};
///
/// assert!(check_rules_table(&TABELA_VALIDACAO).is_empty());
/// ```
pub fn check_rules_table(tabela: &[ValidationRule]) -> Vec<TableWarning> {
    let mut avisos = Vec::new();

    // 1. Códigos de largura fixa
    for (linha, regra) in tabela.iter().enumerate() {
        let campos = [
            ("CFOP", regra.cfop, RE_CFOP.is_match(regra.cfop)),
            ("CST ICMS", regra.cst_icms, RE_CST.is_match(regra.cst_icms)),
            ("CST PIS", regra.cst_pis, RE_CST.is_match(regra.cst_pis)),
            ("CST COFINS", regra.cst_cofins, RE_CST.is_match(regra.cst_cofins)),
        ];

        avisos.extend(
            campos
                .into_iter()
                .filter(|(_, _, ok)| !ok)
                .map(|(campo, valor, _)| TableWarning::InvalidCode {
                    linha,
                    campo,
                    valor,
                }),
        );
    }

    // 2. Chaves repetidas (a primeira ocorrência é a referência)
    let mut vista: HashMap<RuleKey<'static>, usize> = HashMap::with_capacity(tabela.len());

    for (linha, regra) in tabela.iter().enumerate() {
        match vista.get(&regra.key()) {
            Some(&primeira) => avisos.push(TableWarning::DuplicateKey {
                primeira,
                repetida: linha,
                conflitante: tabela[primeira].valid != regra.valid,
            }),
            None => {
                vista.insert(regra.key(), linha);
            }
        }
    }

    avisos
}

/// Regimes presentes na tabela que a extração nunca produz.
pub fn regimes_inalcancaveis(tabela: &[ValidationRule]) -> HashSet<Regime> {
    tabela
        .iter()
        .map(|regra| regra.regime)
        .filter(|&regime| regime != REGIME_PADRAO)
        .collect()
}
