// src/aggregate.rs

use crate::process::{Field, NormalizedRecord};
use crate::process::utils::is_placeholder;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// status → seccional → count
pub type StatusCounts = BTreeMap<String, BTreeMap<String, u64>>;

/// Statuses (lowercased) left out of the open-work counts.
pub const CLOSED_STATUSES: &[&str] = &["em andamento", "fechada"];

/// Running total for one seccional.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SectionTotal {
    #[serde(with = "rust_decimal::serde::float")]
    pub valor: Decimal,
    pub pep_count: u64,
}

/// Group records by `key` and fold each group into an accumulator.
/// Records for which `key` yields `None` are skipped.
pub fn group_fold<'a, K, A, I, FK, FF>(records: I, key: FK, mut fold: FF) -> BTreeMap<K, A>
where
    I: IntoIterator<Item = &'a NormalizedRecord>,
    K: Ord,
    A: Default,
    FK: Fn(&NormalizedRecord) -> Option<K>,
    FF: FnMut(&mut A, &NormalizedRecord),
{
    let mut out: BTreeMap<K, A> = BTreeMap::new();
    for rec in records {
        if let Some(k) = key(rec) {
            fold(out.entry(k).or_default(), rec);
        }
    }
    out
}

/// Count records per (status, seccional).
///
/// Records with an empty status or seccional, or whose lowercased status is
/// in `ignore`, are left out of this view only.
pub fn count_by_status<'a, I>(records: I, status: Field, ignore: &[&str]) -> StatusCounts
where
    I: IntoIterator<Item = &'a NormalizedRecord>,
{
    group_fold(
        records,
        |r| {
            let s = r.text(status)?;
            if s.is_empty() || r.seccional.is_empty() {
                return None;
            }
            let lowered = s.to_lowercase();
            if ignore.iter().any(|i| *i == lowered) {
                return None;
            }
            Some(s.to_string())
        },
        |by_section: &mut BTreeMap<String, u64>, r| {
            *by_section.entry(r.seccional.clone()).or_insert(0) += 1;
        },
    )
}

/// Sum of `valor` and record count per seccional.
pub fn section_totals<'a, I>(records: I) -> BTreeMap<String, SectionTotal>
where
    I: IntoIterator<Item = &'a NormalizedRecord>,
{
    group_fold(
        records,
        |r| (!r.seccional.is_empty()).then(|| r.seccional.clone()),
        |acc: &mut SectionTotal, r| {
            acc.valor += r.valor;
            acc.pep_count += 1;
        },
    )
}

/// Sorted distinct non-placeholder values of a text field.
pub fn distinct<'a, I>(records: I, field: Field) -> Vec<String>
where
    I: IntoIterator<Item = &'a NormalizedRecord>,
{
    records
        .into_iter()
        .filter_map(|r| r.text(field))
        .filter(|v| !is_placeholder(v))
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Sorted distinct `YYYY-MM` buckets of completion dates.
pub fn distinct_months<'a, I>(records: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a NormalizedRecord>,
{
    records
        .into_iter()
        .filter_map(NormalizedRecord::mes)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
