// src/http/handlers.rs

use super::{respond, AppState, Params};
use crate::aggregate::{
    count_by_status, distinct, distinct_months, section_totals, CLOSED_STATUSES,
};
use crate::cache::TabStatus;
use crate::error::{MatrizError, Result};
use crate::filter::FilterSpec;
use crate::process::fields::resolve;
use crate::process::{normalize_rows, Field, MatrizItem, NormalizedRecord};
use crate::sheets::RawRow;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;
use warp::reply::Response;

/// Which status column a count endpoint groups by, and which statuses it leaves out.
#[derive(Clone, Copy, Debug)]
pub struct CountView {
    pub endpoint: &'static str,
    pub field: Field,
    pub ignore: &'static [&'static str],
}

pub const STATUS_ENER_VIEW: CountView = CountView {
    endpoint: "status-ener-pep",
    field: Field::StatusEner,
    ignore: CLOSED_STATUSES,
};

pub const STATUS_CONC_VIEW: CountView = CountView {
    endpoint: "status-conc-pep",
    field: Field::StatusConc,
    ignore: CLOSED_STATUSES,
};

pub const STATUS_SERVICO_VIEW: CountView = CountView {
    endpoint: "status-servico-contagem",
    field: Field::StatusServico,
    ignore: &[],
};

#[derive(Clone, Copy, Debug)]
pub enum DistinctView {
    Field(Field),
    Months,
}

impl DistinctView {
    fn endpoint(&self) -> &'static str {
        match self {
            DistinctView::Field(Field::Seccional) => "seccionais",
            DistinctView::Field(Field::StatusSap) => "status-sap-unicos",
            DistinctView::Field(Field::Tipo) => "tipos-unicos",
            DistinctView::Field(Field::StatusEner) => "status-ener-unicos",
            DistinctView::Field(Field::StatusConc) => "status-conc-unicos",
            DistinctView::Field(Field::StatusServico) => "status-servico-unicos",
            DistinctView::Field(_) => "distinct",
            DistinctView::Months => "meses-conclusao",
        }
    }
}

#[derive(Serialize)]
struct SheetsStatus {
    ttl_secs: u64,
    mirror_enabled: bool,
    tabs: Vec<TabStatus>,
}

/// Raw rows of the matrix tab; an empty tab is reported as such.
async fn matrix_rows(state: &AppState) -> Result<Arc<Vec<RawRow>>> {
    let rows = state.cache.get(&state.matrix_tab).await?;
    if rows.is_empty() {
        return Err(MatrizError::EmptyTab(state.matrix_tab.clone()));
    }
    Ok(rows)
}

async fn matrix_records(state: &AppState) -> Result<Vec<NormalizedRecord>> {
    let rows = matrix_rows(state).await?;
    Ok(normalize_rows(&rows))
}

pub async fn health(_state: Arc<AppState>, params: Params) -> Response {
    respond(
        "health",
        &params,
        Ok(json!({"status": "healthy", "service": "matriz"})),
    )
}

pub async fn exemplo(_state: Arc<AppState>, params: Params) -> Response {
    respond(
        "exemplo",
        &params,
        Ok(json!({"mensagem": "API funcionando com sucesso!"})),
    )
}

/// Rows of a secondary tab, passed through untouched.
pub async fn raw_tab(state: Arc<AppState>, params: Params, tab: &'static str) -> Response {
    let result = state.cache.get(tab).await;
    respond(tab, &params, result.map(|rows| rows.as_ref().clone()))
}

/// The matrix tab as raw rows.
pub async fn carteira(state: Arc<AppState>, params: Params) -> Response {
    let result = matrix_rows(&state).await;
    respond("carteira", &params, result.map(|rows| rows.as_ref().clone()))
}

pub async fn colunas_planilha(state: Arc<AppState>, params: Params) -> Response {
    let result = matrix_rows(&state).await.map(|rows| {
        let columns: Vec<&String> = rows[0].keys().collect();
        json!({ "colunas": columns })
    });
    respond("colunas-planilha", &params, result)
}

pub async fn distinct_values(state: Arc<AppState>, params: Params, view: DistinctView) -> Response {
    let result = matrix_records(&state).await.map(|records| match view {
        DistinctView::Field(field) => distinct(&records, field),
        DistinctView::Months => distinct_months(&records),
    });
    respond(view.endpoint(), &params, result)
}

/// Raw matrix rows belonging to one seccional. The parameter is required.
pub async fn carteira_por_seccional(state: Arc<AppState>, params: Params) -> Response {
    const ENDPOINT: &str = "carteira_por_seccional";
    let seccional = match params.get("seccional").map(|s| s.trim()) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => {
            let err = MatrizError::Validation("parameter \"seccional\" is required".into());
            return respond::<()>(ENDPOINT, &params, Err(err));
        }
    };

    let result = matrix_rows(&state).await.map(|rows| {
        rows.iter()
            .filter(|row| resolve(row, Field::Seccional) == seccional)
            .cloned()
            .collect::<Vec<RawRow>>()
    });
    respond(ENDPOINT, &params, result)
}

pub async fn status_counts(state: Arc<AppState>, params: Params, view: CountView) -> Response {
    let spec = match FilterSpec::from_params(&params) {
        Ok(spec) => spec,
        Err(err) => return respond::<()>(view.endpoint, &params, Err(err)),
    };
    let result = matrix_records(&state)
        .await
        .map(|records| count_by_status(&spec.apply(records), view.field, view.ignore));
    respond(view.endpoint, &params, result)
}

pub async fn seccional_totals(state: Arc<AppState>, params: Params) -> Response {
    const ENDPOINT: &str = "seccional-rs-pep";
    let spec = match FilterSpec::from_params(&params) {
        Ok(spec) => spec,
        Err(err) => return respond::<()>(ENDPOINT, &params, Err(err)),
    };
    let result = matrix_records(&state)
        .await
        .map(|records| section_totals(&spec.apply(records)));
    respond(ENDPOINT, &params, result)
}

/// Filtered flat list, served from the mirror when one is configured.
pub async fn matriz_dados(state: Arc<AppState>, params: Params) -> Response {
    const ENDPOINT: &str = "matriz-dados";
    let spec = match FilterSpec::from_params(&params) {
        Ok(spec) => spec,
        Err(err) => return respond::<()>(ENDPOINT, &params, Err(err)),
    };

    let records = if state.mirror.is_some() {
        let state = Arc::clone(&state);
        tokio::task::spawn_blocking(move || match &state.mirror {
            Some(mirror) => mirror.query(&spec),
            None => Ok(Vec::new()),
        })
        .await
        .map_err(|e| MatrizError::Mirror(format!("mirror query task failed: {}", e)))
        .and_then(|r| r)
    } else {
        matrix_records(&state).await.map(|records| spec.apply(records))
    };

    let result = records.map(|records| {
        debug!(endpoint = ENDPOINT, rows = records.len(), "serving flat list");
        records.iter().map(NormalizedRecord::to_item).collect::<Vec<MatrizItem>>()
    });
    respond(ENDPOINT, &params, result)
}

pub async fn sheets_status(state: Arc<AppState>, params: Params) -> Response {
    let body = SheetsStatus {
        ttl_secs: state.cache.ttl().as_secs(),
        mirror_enabled: state.mirror.is_some(),
        tabs: state.cache.status(),
    };
    respond("sheets-status", &params, Ok(body))
}
