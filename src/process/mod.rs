// src/process/mod.rs

pub mod currency;
pub mod date_parser;
pub mod fields;
pub mod utils;

use crate::sheets::RawRow;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

pub use fields::Field;

/// Canonical view of one work-order row.
///
/// The month bucket is derived from `data_conclusao` on demand, so it exists
/// exactly when the completion date parsed.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedRecord {
    pub pep: String,
    pub prazo: String,
    pub data_conclusao: Option<NaiveDate>,
    /// Completion date as written upstream; kept for display when it did not parse.
    pub data_conclusao_text: String,
    pub status_sap: String,
    pub seccional: String,
    pub tipo: String,
    pub status_ener: String,
    pub status_conc: String,
    pub status_servico: String,
    pub valor: Decimal,
}

impl NormalizedRecord {
    /// Normalize a raw row. Rows without a PEP have no identity and are dropped.
    pub fn from_raw(row: &RawRow) -> Option<Self> {
        let pep = fields::resolve(row, Field::Pep);
        if pep.is_empty() {
            return None;
        }
        let data_text = fields::resolve(row, Field::DataConclusao);
        let valor_raw = fields::resolve(row, Field::Valor);
        Some(Self {
            pep: pep.to_string(),
            prazo: fields::resolve(row, Field::Prazo).to_string(),
            data_conclusao: date_parser::parse_day_first(data_text),
            data_conclusao_text: data_text.to_string(),
            status_sap: fields::resolve(row, Field::StatusSap).to_string(),
            seccional: fields::resolve(row, Field::Seccional).to_string(),
            tipo: fields::resolve(row, Field::Tipo).to_string(),
            status_ener: fields::resolve(row, Field::StatusEner).to_string(),
            status_conc: fields::resolve(row, Field::StatusConc).to_string(),
            status_servico: fields::resolve(row, Field::StatusServico).to_string(),
            valor: currency::parse_brl(Some(valor_raw)),
        })
    }

    pub fn mes(&self) -> Option<String> {
        self.data_conclusao.map(date_parser::month_key)
    }

    /// Text value of a field; `None` for `Valor`, which is numeric.
    pub fn text(&self, field: Field) -> Option<&str> {
        let v = match field {
            Field::Pep => &self.pep,
            Field::Prazo => &self.prazo,
            Field::DataConclusao => &self.data_conclusao_text,
            Field::StatusSap => &self.status_sap,
            Field::Seccional => &self.seccional,
            Field::Tipo => &self.tipo,
            Field::StatusEner => &self.status_ener,
            Field::StatusConc => &self.status_conc,
            Field::StatusServico => &self.status_servico,
            Field::Valor => return None,
        };
        Some(v.as_str())
    }

    pub fn to_item(&self) -> MatrizItem {
        let data_conclusao = match self.data_conclusao {
            Some(d) if self.data_conclusao_text.is_empty() => d.format("%d/%m/%Y").to_string(),
            _ => self.data_conclusao_text.clone(),
        };
        MatrizItem {
            pep: self.pep.clone(),
            prazo: self.prazo.clone(),
            data_conclusao,
            mes: self.mes().unwrap_or_default(),
            status_sap: self.status_sap.clone(),
            valor: self.valor,
            seccional: self.seccional.clone(),
            tipo: self.tipo.clone(),
            status_ener: self.status_ener.clone(),
            status_conc: self.status_conc.clone(),
            status_servico: self.status_servico.clone(),
        }
    }
}

/// Row shape served to the dashboard's matrix table.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrizItem {
    pub pep: String,
    pub prazo: String,
    pub data_conclusao: String,
    pub mes: String,
    pub status_sap: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub valor: Decimal,
    pub seccional: String,
    pub tipo: String,
    pub status_ener: String,
    pub status_conc: String,
    pub status_servico: String,
}

/// Normalize every row that has a PEP, preserving order.
pub fn normalize_rows(rows: &[RawRow]) -> Vec<NormalizedRecord> {
    let records: Vec<NormalizedRecord> = rows
        .iter()
        .filter_map(NormalizedRecord::from_raw)
        .collect();
    let skipped = rows.len() - records.len();
    if skipped > 0 {
        debug!(skipped, kept = records.len(), "dropped rows without PEP");
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, &str)]) -> RawRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn normalizes_aliases_dates_and_values() {
        let r = row(&[
            ("PEP", " RS-001 "),
            ("Prazo", "30 dias"),
            ("DATA CONCLUSÃO", "05/03/2024"),
            ("Status SAP", "LIB"),
            ("SECCIONAL\nOBRA", "RMC"),
            ("TIPO", "Obra"),
            ("STATUS ENER", "Aberta"),
            ("Status CONC", "Pendente"),
            ("STATUS SERVIÇO", "Executado"),
            ("R$", "R$ 1.234,56"),
        ]);
        let rec = NormalizedRecord::from_raw(&r).expect("has pep");
        assert_eq!(rec.pep, "RS-001");
        assert_eq!(rec.prazo, "30 dias");
        assert_eq!(rec.mes().as_deref(), Some("2024-03"));
        assert_eq!(rec.status_sap, "LIB");
        assert_eq!(rec.seccional, "RMC");
        assert_eq!(rec.status_servico, "Executado");
        assert_eq!(rec.valor.to_string(), "1234.56");
        assert_eq!(rec.text(Field::Valor), None);
        assert_eq!(rec.text(Field::Tipo), Some("Obra"));
    }

    #[test]
    fn unparsable_date_has_no_month() {
        let r = row(&[("PEP", "1"), ("DATA CONCLUSÃO", "a definir")]);
        let rec = NormalizedRecord::from_raw(&r).unwrap();
        assert_eq!(rec.data_conclusao, None);
        assert_eq!(rec.mes(), None);
        assert_eq!(rec.valor, Decimal::ZERO);
        assert_eq!(rec.to_item().mes, "");
        assert_eq!(rec.to_item().data_conclusao, "a definir");
    }

    #[test]
    fn rows_without_pep_are_dropped() {
        let rows = vec![
            row(&[("PEP", "1")]),
            row(&[("PEP", "  ")]),
            row(&[("SECCIONAL", "RMC")]),
            row(&[("PEP", "2")]),
        ];
        let peps: Vec<_> = normalize_rows(&rows).into_iter().map(|r| r.pep).collect();
        assert_eq!(peps, vec!["1", "2"]);
    }

    #[test]
    fn item_serializes_camel_case_with_numeric_valor() {
        let rec = NormalizedRecord::from_raw(&row(&[
            ("PEP", "9"),
            ("Data Conclusão", "1/2/2024"),
            ("VALOR", "10,50"),
        ]))
        .unwrap();
        let v = serde_json::to_value(rec.to_item()).unwrap();
        assert_eq!(
            v,
            json!({
                "pep": "9",
                "prazo": "",
                "dataConclusao": "1/2/2024",
                "mes": "2024-02",
                "statusSap": "",
                "valor": 10.5,
                "seccional": "",
                "tipo": "",
                "statusEner": "",
                "statusConc": "",
                "statusServico": ""
            })
        );
    }
}
