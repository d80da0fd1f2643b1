// src/sheets/client.rs

use super::{locate_tab, rows_from_grid, RawRow, SheetSource};
use crate::config::Config;
use crate::error::{MatrizError, Result};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

enum Auth {
    Bearer(String),
    ApiKey(String),
    Anonymous,
}

/// Google Sheets v4 REST client for one spreadsheet.
pub struct GoogleSheetsClient {
    http: Client,
    base: Url,
    spreadsheet_id: String,
    auth: Auth,
}

impl GoogleSheetsClient {
    pub fn new(http: Client, cfg: &Config) -> anyhow::Result<Self> {
        let base = Url::parse(&cfg.sheets_api_base)
            .with_context(|| format!("parsing sheets API base {}", cfg.sheets_api_base))?;
        let auth = match (&cfg.access_token, &cfg.api_key) {
            (Some(token), _) => Auth::Bearer(token.clone()),
            (None, Some(key)) => Auth::ApiKey(key.clone()),
            (None, None) => {
                warn!("no Google Sheets credentials configured; requests are anonymous");
                Auth::Anonymous
            }
        };
        Ok(Self {
            http,
            base,
            spreadsheet_id: cfg.spreadsheet_id.clone(),
            auth,
        })
    }

    fn spreadsheet_url(&self, extra: &[&str]) -> anyhow::Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("sheets API base {} cannot be a base", self.base))?
            .pop_if_empty()
            .push("spreadsheets")
            .push(&self.spreadsheet_id)
            .extend(extra);
        Ok(url)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Auth::Bearer(token) => req.bearer_auth(token),
            Auth::ApiKey(key) => req.query(&[("key", key)]),
            Auth::Anonymous => req,
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: Url,
        query: &[(&str, &str)],
    ) -> anyhow::Result<Option<T>> {
        debug!(%url, "GET");
        let resp = self
            .authorize(self.http.get(url.clone()).query(query))
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = resp
            .error_for_status()
            .with_context(|| format!("Non-success status {}", url))?
            .json::<T>()
            .await
            .with_context(|| format!("decoding body from {}", url))?;
        Ok(Some(body))
    }

    async fn titles(&self) -> anyhow::Result<Vec<String>> {
        let url = self.spreadsheet_url(&[])?;
        let meta = self
            .get_json::<SpreadsheetMeta>(url, &[("fields", "sheets.properties.title")])
            .await?
            .ok_or_else(|| anyhow::anyhow!("spreadsheet {} not found", self.spreadsheet_id))?;
        Ok(meta.sheets.into_iter().map(|s| s.properties.title).collect())
    }

    async fn values(&self, title: &str) -> anyhow::Result<Option<Vec<Vec<String>>>> {
        let range = a1_range(title);
        let url = self.spreadsheet_url(&["values", &range])?;
        let body = self
            .get_json::<ValueRange>(url, &[("valueRenderOption", "FORMATTED_VALUE")])
            .await?;
        Ok(body.map(|b| {
            b.values
                .into_iter()
                .map(|row| row.into_iter().map(cell_text).collect())
                .collect()
        }))
    }
}

#[async_trait]
impl SheetSource for GoogleSheetsClient {
    async fn fetch_rows(&self, tab: &str) -> Result<Vec<RawRow>> {
        let start = Instant::now();
        let available = self
            .titles()
            .await
            .map_err(|e| MatrizError::upstream(tab, format!("{:#}", e)))?;
        let title = locate_tab(tab, &available)?;
        if title != tab {
            info!(requested = %tab, resolved = %title, "worksheet resolved by fallback");
        }
        let grid = self
            .values(&title)
            .await
            .map_err(|e| MatrizError::upstream(tab, format!("{:#}", e)))?
            .ok_or_else(|| MatrizError::TabNotFound(tab.to_string()))?;
        let rows = rows_from_grid(grid);
        info!(tab = %title, rows = rows.len(), elapsed = ?start.elapsed(), "fetched worksheet");
        Ok(rows)
    }

    async fn list_tabs(&self) -> Result<Vec<String>> {
        self.titles()
            .await
            .map_err(|e| MatrizError::upstream("<spreadsheet>", format!("{:#}", e)))
    }
}

/// Whole-sheet A1 range for a title: `'It''s'`.
fn a1_range(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

fn cell_text(v: Value) -> String {
    match v {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(api_key: Option<&str>) -> GoogleSheetsClient {
        let cfg = Config {
            spreadsheet_id: "sheet-id".into(),
            api_key: api_key.map(str::to_string),
            ..Config::default()
        };
        GoogleSheetsClient::new(Client::new(), &cfg).unwrap()
    }

    #[test]
    fn builds_encoded_value_urls() {
        let c = client(Some("k"));
        let url = c
            .spreadsheet_url(&["values", &a1_range("Prazos SAP")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/sheet-id/values/'Prazos%20SAP'"
        );
    }

    #[test]
    fn quotes_in_titles_are_doubled() {
        assert_eq!(a1_range("Tab's"), "'Tab''s'");
    }

    #[test]
    fn non_string_cells_become_text() {
        assert_eq!(cell_text(Value::from(12)), "12");
        assert_eq!(cell_text(Value::Null), "");
        assert_eq!(cell_text(Value::from("R$ 1,00")), "R$ 1,00");
    }
}
