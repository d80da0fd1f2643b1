//! Canonical field names and the raw spreadsheet headers they may appear under.

use crate::sheets::RawRow;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    Pep,
    Prazo,
    DataConclusao,
    StatusSap,
    Seccional,
    Tipo,
    StatusEner,
    StatusConc,
    StatusServico,
    Valor,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Pep => "pep",
            Field::Prazo => "prazo",
            Field::DataConclusao => "data_conclusao",
            Field::StatusSap => "status_sap",
            Field::Seccional => "seccional",
            Field::Tipo => "tipo",
            Field::StatusEner => "status_ener",
            Field::StatusConc => "status_conc",
            Field::StatusServico => "status_servico",
            Field::Valor => "valor",
        }
    }

    /// Raw column names, in lookup order. Matching is exact.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Field::Pep => &["PEP"],
            Field::Prazo => &["PRAZO", "Prazo"],
            Field::DataConclusao => &["DATA CONCLUSÃO", "Data Conclusão"],
            Field::StatusSap => &["STATUS SAP", "Status SAP"],
            Field::Seccional => &["SECCIONAL", "SECCIONAL\nOBRA"],
            Field::Tipo => &["TIPO"],
            Field::StatusEner => &["Status ENER", "STATUS ENER"],
            Field::StatusConc => &["Status CONC", "STATUS CONC"],
            Field::StatusServico => &["status serviço", "STATUS SERVIÇO", "Status Serviço"],
            Field::Valor => &["R$", "RS", "VALOR", "Valor"],
        }
    }
}

/// First non-blank value among the field's aliases, trimmed; `""` when none.
pub fn resolve<'a>(row: &'a RawRow, field: Field) -> &'a str {
    field
        .aliases()
        .iter()
        .filter_map(|alias| row.get(*alias))
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> RawRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn first_alias_wins() {
        let r = row(&[("STATUS SAP", "LIB"), ("Status SAP", "ENCE")]);
        assert_eq!(resolve(&r, Field::StatusSap), "LIB");
    }

    #[test]
    fn blank_alias_falls_through() {
        let r = row(&[("SECCIONAL", "  "), ("SECCIONAL\nOBRA", " RMC ")]);
        assert_eq!(resolve(&r, Field::Seccional), "RMC");
    }

    #[test]
    fn header_match_is_case_sensitive() {
        let r = row(&[("status sap", "LIB"), ("tipo", "X")]);
        assert_eq!(resolve(&r, Field::StatusSap), "");
        assert_eq!(resolve(&r, Field::Tipo), "");
    }

    #[test]
    fn accented_aliases() {
        let r = row(&[("Status Serviço", "Executado"), ("Data Conclusão", "01/02/2024")]);
        assert_eq!(resolve(&r, Field::StatusServico), "Executado");
        assert_eq!(resolve(&r, Field::DataConclusao), "01/02/2024");
    }
}
