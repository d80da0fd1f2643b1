// src/sheets/mod.rs

pub mod client;
pub mod locate;

use crate::error::Result;
use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::BTreeMap;

pub use client::GoogleSheetsClient;
pub use locate::locate_tab;

/// One spreadsheet row: upstream header text → cell text, in sheet column order.
pub type RawRow = IndexMap<String, String>;

/// Tabular upstream the cache reads from.
#[async_trait]
pub trait SheetSource: Send + Sync {
    /// All data rows of a tab, keyed by the header row.
    async fn fetch_rows(&self, tab: &str) -> Result<Vec<RawRow>>;

    /// Titles of every tab in the spreadsheet.
    async fn list_tabs(&self) -> Result<Vec<String>>;
}

/// Turn a grid (header row first) into keyed rows.
///
/// Blank header cells become `vazio`, repeated headers get a `_N` suffix,
/// short rows are padded with empty cells and fully blank rows are dropped.
pub fn rows_from_grid(grid: Vec<Vec<String>>) -> Vec<RawRow> {
    let mut iter = grid.into_iter();
    let Some(header) = iter.next() else {
        return Vec::new();
    };

    let mut seen: BTreeMap<String, usize> = BTreeMap::new();
    let headers: Vec<String> = header
        .into_iter()
        .map(|h| {
            let h = match h.trim() {
                "" => "vazio".to_string(),
                t => t.to_string(),
            };
            let count = seen.entry(h.clone()).or_insert(0);
            let name = if *count > 0 {
                format!("{}_{}", h, count)
            } else {
                h
            };
            *count += 1;
            name
        })
        .collect();

    iter.filter(|cells| cells.iter().any(|c| !c.trim().is_empty()))
        .map(|cells| {
            let mut cells = cells.into_iter();
            headers
                .iter()
                .map(|h| (h.clone(), cells.next().unwrap_or_default()))
                .collect()
        })
        .collect()
}
