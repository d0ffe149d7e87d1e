use crate::{FiscalRecord, RuleKey, TABELA_VALIDACAO, ValidationRule};

pub const MSG_NAO_ENCONTRADA: &str = "Combination not found in rules base. Check the parameters.";
pub const MSG_INVALIDA: &str = "Combination invalid per fiscal validation table.";

/// Resultado da consulta de uma nota à tabela de regras.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// A primeira regra com a mesma chave é válida.
    Valid,
    /// A primeira regra com a mesma chave está marcada como inválida.
    RuleInvalid,
    /// Nenhuma regra com a mesma chave.
    LookupMiss,
}

impl ValidationOutcome {
    pub fn mensagens(self) -> Vec<String> {
        match self {
            ValidationOutcome::Valid => Vec::new(),
            ValidationOutcome::RuleInvalid => vec![MSG_INVALIDA.to_string()],
            ValidationOutcome::LookupMiss => vec![MSG_NAO_ENCONTRADA.to_string()],
        }
    }
}

/// Classifica a combinação fiscal da nota segundo a tabela informada.
///
/// Comparação exata (sensível a maiúsculas, sem normalização).
/// Havendo chaves repetidas, vale a primeira na ordem de declaração.
pub fn classify(registro: &FiscalRecord, tabela: &[ValidationRule]) -> ValidationOutcome {
    let chave: RuleKey<'_> = registro.key();

    match tabela.iter().find(|regra| regra.key() == chave) {
        None => ValidationOutcome::LookupMiss,
        Some(regra) if !regra.valid => ValidationOutcome::RuleInvalid,
        Some(_) => ValidationOutcome::Valid,
    }
}

/// Retorna as inconsistências da nota segundo a tabela informada.
pub fn validar_com_tabela(registro: &FiscalRecord, tabela: &[ValidationRule]) -> Vec<String> {
    classify(registro, tabela).mensagens()
}

/// Retorna as inconsistências da nota segundo a tabela de validação fiscal.
///
/// Lista vazia: combinação válida.
///
/// ```
/// use validador_fiscal_nfe::{FiscalRecord, validar_dados};
///
/// let mut nota = FiscalRecord::default();
/// nota.cfop = "5101".into();
/// nota.cst_icms = "00".into();
/// nota.cst_pis = "01".into();
/// nota.cst_cofins = "01".into();
///
/// assert!(validar_dados(&nota).is_empty());
/// ```
pub fn validar_dados(registro: &FiscalRecord) -> Vec<String> {
    validar_com_tabela(registro, &TABELA_VALIDACAO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Regime;
    use pretty_assertions::assert_eq;

    fn nota(cfop: &str, cst_icms: &str, cst_pis: &str, cst_cofins: &str) -> FiscalRecord {
        FiscalRecord {
            cfop: cfop.to_string(),
            cst_icms: cst_icms.to_string(),
            cst_pis: cst_pis.to_string(),
            cst_cofins: cst_cofins.to_string(),
            ..FiscalRecord::default()
        }
    }

    #[test]
    fn combinacao_valida() {
        let registro = nota("5101", "00", "01", "01");
        assert_eq!(classify(&registro, &TABELA_VALIDACAO), ValidationOutcome::Valid);
        assert_eq!(validar_dados(&registro), Vec::<String>::new());
    }

    #[test]
    fn combinacao_invalida() {
        let registro = nota("5101", "40", "04", "04");
        assert_eq!(validar_dados(&registro), vec![MSG_INVALIDA.to_string()]);
    }

    #[test]
    fn combinacao_nao_encontrada() {
        for registro in [nota("9999", "00", "01", "01"), nota("9999", "40", "04", "04")] {
            assert_eq!(validar_dados(&registro), vec![MSG_NAO_ENCONTRADA.to_string()]);
        }
    }

    #[test]
    fn sentinela_nunca_coincide() {
        let registro = nota("N/A", "00", "01", "01");
        assert_eq!(classify(&registro, &TABELA_VALIDACAO), ValidationOutcome::LookupMiss);
    }

    #[test]
    fn comparacao_exata_sem_normalizacao() {
        // Espaços e zeros à esquerda não são removidos
        assert_eq!(
            classify(&nota(" 5101", "00", "01", "01"), &TABELA_VALIDACAO),
            ValidationOutcome::LookupMiss
        );
        assert_eq!(
            classify(&nota("5101", "0", "01", "01"), &TABELA_VALIDACAO),
            ValidationOutcome::LookupMiss
        );
    }

    #[test]
    fn regras_de_lucro_real_nao_se_aplicam_ao_regime_padrao() {
        // 6108/41/05/05 existe apenas para Lucro Real
        let registro = nota("6108", "41", "05", "05");
        assert_eq!(registro.regime, Regime::LucroPresumido);
        assert_eq!(classify(&registro, &TABELA_VALIDACAO), ValidationOutcome::LookupMiss);

        let lucro_real = FiscalRecord {
            regime: Regime::LucroReal,
            ..registro
        };
        assert_eq!(classify(&lucro_real, &TABELA_VALIDACAO), ValidationOutcome::Valid);
    }

    #[test]
    fn primeira_regra_prevalece() {
        let regra = |valid| ValidationRule {
            cfop: "5101",
            cst_icms: "00",
            cst_pis: "01",
            cst_cofins: "01",
            regime: Regime::LucroPresumido,
            valid,
        };
        let registro = nota("5101", "00", "01", "01");

        assert_eq!(
            classify(&registro, &[regra(false), regra(true)]),
            ValidationOutcome::RuleInvalid
        );
        assert_eq!(
            classify(&registro, &[regra(true), regra(false)]),
            ValidationOutcome::Valid
        );
    }

    #[test]
    fn tabela_vazia() {
        let registro = nota("5101", "00", "01", "01");
        assert_eq!(validar_com_tabela(&registro, &[]), vec![MSG_NAO_ENCONTRADA.to_string()]);
    }

    #[test]
    fn validacao_idempotente() {
        let registro = nota("5102", "60", "04", "04");
        let primeira = validar_dados(&registro);
        let segunda = validar_dados(&registro);
        assert_eq!(primeira, segunda);
        assert_eq!(primeira, vec![MSG_INVALIDA.to_string()]);
    }

    #[test]
    fn todas_as_regras_da_tabela_presumido() {
        for regra in TABELA_VALIDACAO
            .iter()
            .filter(|r| r.regime == Regime::LucroPresumido)
        {
            let registro = nota(regra.cfop, regra.cst_icms, regra.cst_pis, regra.cst_cofins);
            let esperado = if regra.valid {
                ValidationOutcome::Valid
            } else {
                ValidationOutcome::RuleInvalid
            };
            assert_eq!(classify(&registro, &TABELA_VALIDACAO), esperado, "{regra:?}");
        }
    }
}
