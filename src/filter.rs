// src/filter.rs

use crate::error::{MatrizError, Result};
use crate::process::date_parser::parse_day_first;
use crate::process::{Field, NormalizedRecord};
use chrono::NaiveDate;
use std::collections::HashMap;

/// Fields that accept a comma-separated inclusion list.
pub const LIST_FIELDS: [Field; 6] = [
    Field::Seccional,
    Field::StatusSap,
    Field::Tipo,
    Field::StatusEner,
    Field::StatusConc,
    Field::StatusServico,
];

/// Conjunctive set of optional predicates over normalized records.
///
/// An empty inclusion list places no constraint on its field.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterSpec {
    pub seccional: Vec<String>,
    pub status_sap: Vec<String>,
    pub tipo: Vec<String>,
    pub status_ener: Vec<String>,
    pub status_conc: Vec<String>,
    pub status_servico: Vec<String>,
    pub mes: Option<String>,
    /// Inclusive `[start, end]`; only set when both bounds were supplied.
    pub date_range: Option<(NaiveDate, NaiveDate)>,
}

impl FilterSpec {
    /// Build from query parameters. Lists are comma-separated; blank items are dropped.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self> {
        let param = |name: &str| params.get(name).map(|v| v.trim()).unwrap_or("");

        let mut spec = FilterSpec::default();
        for field in LIST_FIELDS {
            *spec.list_mut(field) = split_list(param(field.as_str()));
        }

        let mes = param("mes");
        if !mes.is_empty() {
            spec.mes = Some(mes.to_string());
        }

        let (inicio, fim) = (param("data_inicio"), param("data_fim"));
        if !inicio.is_empty() && !fim.is_empty() {
            let start = parse_bound("data_inicio", inicio)?;
            let end = parse_bound("data_fim", fim)?;
            spec.date_range = Some((start, end));
        }
        Ok(spec)
    }

    pub fn list(&self, field: Field) -> &[String] {
        match field {
            Field::Seccional => &self.seccional,
            Field::StatusSap => &self.status_sap,
            Field::Tipo => &self.tipo,
            Field::StatusEner => &self.status_ener,
            Field::StatusConc => &self.status_conc,
            Field::StatusServico => &self.status_servico,
            _ => &[],
        }
    }

    fn list_mut(&mut self, field: Field) -> &mut Vec<String> {
        match field {
            Field::Seccional => &mut self.seccional,
            Field::StatusSap => &mut self.status_sap,
            Field::Tipo => &mut self.tipo,
            Field::StatusEner => &mut self.status_ener,
            Field::StatusConc => &mut self.status_conc,
            Field::StatusServico => &mut self.status_servico,
            other => unreachable!("{} has no inclusion list", other.as_str()),
        }
    }

    pub fn matches(&self, rec: &NormalizedRecord) -> bool {
        let lists_pass = LIST_FIELDS.iter().all(|&field| {
            let allowed = self.list(field);
            allowed.is_empty()
                || rec
                    .text(field)
                    .is_some_and(|v| allowed.iter().any(|a| a == v.trim()))
        });
        if !lists_pass {
            return false;
        }

        if let Some(mes) = &self.mes {
            if rec.mes().as_deref() != Some(mes.as_str()) {
                return false;
            }
        }

        match (self.date_range, rec.data_conclusao) {
            (None, _) => true,
            (Some((start, end)), Some(d)) => start <= d && d <= end,
            (Some(_), None) => false,
        }
    }

    /// Stable filter: survivors keep their input order.
    pub fn apply(&self, records: Vec<NormalizedRecord>) -> Vec<NormalizedRecord> {
        records.into_iter().filter(|r| self.matches(r)).collect()
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bound(name: &str, raw: &str) -> Result<NaiveDate> {
    parse_day_first(raw).ok_or_else(|| {
        MatrizError::Validation(format!(
            "parameter \"{}\" is not a valid date (expected DD/MM/YYYY): {:?}",
            name, raw
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::normalize_rows;
    use crate::sheets::RawRow;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn record(pep: &str, seccional: &str, tipo: &str, data: &str) -> RawRow {
        RawRow::from([
            ("PEP".to_string(), pep.to_string()),
            ("SECCIONAL".to_string(), seccional.to_string()),
            ("TIPO".to_string(), tipo.to_string()),
            ("DATA CONCLUSÃO".to_string(), data.to_string()),
        ])
    }

    fn sample() -> Vec<NormalizedRecord> {
        normalize_rows(&[
            record("1", "RMC", "Obra", "05/03/2024"),
            record("2", "LESTE", "Obra", "20/03/2024"),
            record("3", "RMC", "Manutenção", "02/04/2024"),
            record("4", "RMC", "Obra", "sem data"),
            record("5", "OESTE", "Obra", ""),
        ])
    }

    fn peps(records: &[NormalizedRecord]) -> Vec<&str> {
        records.iter().map(|r| r.pep.as_str()).collect()
    }

    #[test]
    fn parses_lists_month_and_range() -> Result<()> {
        let spec = FilterSpec::from_params(&params(&[
            ("seccional", " RMC, LESTE ,,"),
            ("tipo", ""),
            ("mes", "2024-03"),
            ("data_inicio", "01/03/2024"),
            ("data_fim", "31/03/2024"),
        ]))?;
        assert_eq!(spec.seccional, vec!["RMC", "LESTE"]);
        assert!(spec.tipo.is_empty());
        assert_eq!(spec.mes.as_deref(), Some("2024-03"));
        let (a, b) = spec.date_range.unwrap();
        assert_eq!(a, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(b, NaiveDate::from_ymd_opt(2024, 3, 31).unwrap());
        Ok(())
    }

    #[test]
    fn empty_spec_keeps_everything_in_order() {
        let out = FilterSpec::default().apply(sample());
        assert_eq!(peps(&out), vec!["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn seccional_and_month_combine() -> Result<()> {
        let spec =
            FilterSpec::from_params(&params(&[("seccional", "RMC"), ("mes", "2024-03")]))?;
        let out = spec.apply(sample());
        assert_eq!(peps(&out), vec!["1"]);
        for r in &out {
            assert_eq!(r.seccional, "RMC");
            assert_eq!(r.mes().as_deref(), Some("2024-03"));
        }
        Ok(())
    }

    #[test]
    fn every_status_list_filters_its_own_column() -> Result<()> {
        let row = |pep: &str, sap: &str, ener: &str, conc: &str, servico: &str| {
            RawRow::from([
                ("PEP".to_string(), pep.to_string()),
                ("STATUS SAP".to_string(), sap.to_string()),
                ("Status ENER".to_string(), ener.to_string()),
                ("STATUS CONC".to_string(), conc.to_string()),
                ("status serviço".to_string(), servico.to_string()),
            ])
        };
        let records = normalize_rows(&[
            row("1", "LIB", "Aberta", "Pendente", "Executado"),
            row("2", "ENCE", "Aberta", "Pendente", "Executado"),
            row("3", "LIB", "Fechada", "Pendente", "Executado"),
            row("4", "LIB", "Aberta", "Concluída", "Executado"),
            row("5", "LIB", "Aberta", "Pendente", "Programado"),
        ]);

        let cases = [
            ("status_sap", "ENCE", vec!["2"]),
            ("status_ener", "Fechada", vec!["3"]),
            ("status_conc", "Concluída", vec!["4"]),
            ("status_servico", "Programado", vec!["5"]),
            ("status_sap", "LIB, ENCE", vec!["1", "2", "3", "4", "5"]),
        ];
        for (name, value, expected) in cases {
            let spec = FilterSpec::from_params(&params(&[(name, value)]))?;
            assert_eq!(peps(&spec.apply(records.clone())), expected, "{}={}", name, value);
        }

        let all = FilterSpec::from_params(&params(&[
            ("status_sap", "LIB"),
            ("status_ener", "Aberta"),
            ("status_conc", "Pendente"),
            ("status_servico", "Executado"),
        ]))?;
        assert_eq!(peps(&all.apply(records)), vec!["1"]);
        Ok(())
    }

    #[test]
    fn undated_records_only_drop_under_date_predicates() -> Result<()> {
        let by_tipo = FilterSpec::from_params(&params(&[("tipo", "Obra")]))?.apply(sample());
        assert_eq!(peps(&by_tipo), vec!["1", "2", "4", "5"]);

        let ranged = FilterSpec::from_params(&params(&[
            ("data_inicio", "05/03/2024"),
            ("data_fim", "02/04/2024"),
        ]))?
        .apply(sample());
        assert_eq!(peps(&ranged), vec!["1", "2", "3"]);
        Ok(())
    }

    #[test]
    fn half_open_range_is_ignored() -> Result<()> {
        let spec = FilterSpec::from_params(&params(&[("data_inicio", "01/01/2030")]))?;
        assert_eq!(spec.date_range, None);
        assert_eq!(spec.apply(sample()).len(), 5);
        Ok(())
    }

    #[test]
    fn unparsable_bound_is_a_validation_error() {
        let err = FilterSpec::from_params(&params(&[
            ("data_inicio", "ontem"),
            ("data_fim", "31/03/2024"),
        ]))
        .unwrap_err();
        assert!(matches!(err, MatrizError::Validation(msg) if msg.contains("data_inicio")));
    }
}
