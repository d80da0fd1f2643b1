// src/http/mod.rs

pub mod handlers;

use crate::cache::SheetCache;
use crate::error::MatrizError;
use crate::mirror::MatrixMirror;
use serde::Serialize;
use std::{collections::HashMap, convert::Infallible, future::Future, sync::Arc};
use tracing::{error, warn};
use warp::{
    filters::BoxedFilter,
    http::StatusCode,
    reply::{self, Response},
    Filter, Rejection, Reply,
};

pub type Params = HashMap<String, String>;

/// Everything a request handler needs.
pub struct AppState {
    pub cache: SheetCache,
    pub mirror: Option<MatrixMirror>,
    pub matrix_tab: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

pub fn status_for(err: &MatrizError) -> StatusCode {
    match err {
        MatrizError::Validation(_) => StatusCode::BAD_REQUEST,
        MatrizError::EmptyTab(_) => StatusCode::NOT_FOUND,
        MatrizError::TabNotFound(_)
        | MatrizError::UpstreamUnavailable { .. }
        | MatrizError::Mirror(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// JSON body on success; `{"error": ...}` with the mapped status otherwise.
pub fn respond<T: Serialize>(
    endpoint: &str,
    params: &Params,
    result: Result<T, MatrizError>,
) -> Response {
    match result {
        Ok(body) => reply::json(&body).into_response(),
        Err(err) => {
            let status = status_for(&err);
            if status.is_server_error() {
                error!(endpoint, ?params, error = %err, "request failed");
            } else {
                let code = status.as_u16();
                warn!(endpoint, ?params, error = %err, status = code, "request rejected");
            }
            reply::with_status(
                reply::json(&ErrorBody {
                    error: err.to_string(),
                }),
                status,
            )
            .into_response()
        }
    }
}

fn with_state(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Arc<AppState>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&state))
}

/// `GET /api/<path>/` with query parameters handed to `handler`.
fn get_route<F, Fut>(
    path: &'static str,
    state: Arc<AppState>,
    handler: F,
) -> BoxedFilter<(Response,)>
where
    F: Fn(Arc<AppState>, Params) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    warp::path("api")
        .and(warp::path(path))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state))
        .and(warp::query::<Params>())
        .then(handler)
        .boxed()
}

fn distinct_route(
    path: &'static str,
    state: Arc<AppState>,
    view: handlers::DistinctView,
) -> BoxedFilter<(Response,)> {
    get_route(path, state, move |st, p| handlers::distinct_values(st, p, view))
}

fn count_route(
    path: &'static str,
    state: Arc<AppState>,
    view: handlers::CountView,
) -> BoxedFilter<(Response,)> {
    get_route(path, state, move |st, p| handlers::status_counts(st, p, view))
}

async fn handle_rejection(rej: Rejection) -> Result<Response, Infallible> {
    let (status, message) = if rej.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else if rej.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method not allowed".to_string())
    } else if let Some(forbidden) = rej.find::<warp::cors::CorsForbidden>() {
        warn!(reason = %forbidden, "cors request refused");
        (StatusCode::FORBIDDEN, forbidden.to_string())
    } else if rej.find::<warp::reject::InvalidQuery>().is_some() {
        (StatusCode::BAD_REQUEST, "invalid query string".to_string())
    } else {
        error!(rejection = ?rej, "unhandled rejection");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
    };
    Ok(reply::with_status(reply::json(&ErrorBody { error: message }), status).into_response())
}

/// Every dashboard endpoint, with CORS, request tracing and JSON rejections.
pub fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    use crate::process::Field;
    use handlers::*;

    let s = || Arc::clone(&state);
    let api: Vec<BoxedFilter<(Response,)>> = vec![
        get_route("health", s(), health),
        get_route("exemplo", s(), exemplo),
        get_route("geral", s(), |st, p| raw_tab(st, p, "GERAL")),
        get_route("programacao", s(), |st, p| raw_tab(st, p, "programação")),
        get_route("carteira", s(), carteira),
        get_route("meta", s(), |st, p| raw_tab(st, p, "meta")),
        get_route("defeitos", s(), |st, p| raw_tab(st, p, "ImportDefeitos")),
        get_route("colunas-planilha", s(), colunas_planilha),
        distinct_route("seccionais", s(), DistinctView::Field(Field::Seccional)),
        distinct_route("status-sap-unicos", s(), DistinctView::Field(Field::StatusSap)),
        distinct_route("tipos-unicos", s(), DistinctView::Field(Field::Tipo)),
        distinct_route("status-ener-unicos", s(), DistinctView::Field(Field::StatusEner)),
        distinct_route("status-conc-unicos", s(), DistinctView::Field(Field::StatusConc)),
        distinct_route("status-servico-unicos", s(), DistinctView::Field(Field::StatusServico)),
        distinct_route("meses-conclusao", s(), DistinctView::Months),
        get_route("carteira_por_seccional", s(), carteira_por_seccional),
        count_route("status-ener-pep", s(), STATUS_ENER_VIEW),
        count_route("status-conc-pep", s(), STATUS_CONC_VIEW),
        count_route("status-servico-contagem", s(), STATUS_SERVICO_VIEW),
        get_route("seccional-rs-pep", s(), seccional_totals),
        get_route("matriz-dados", s(), matriz_dados),
        get_route("sheets-status", s(), sheets_status),
    ];

    let not_found = warp::any()
        .and_then(|| async { Err::<Response, Rejection>(warp::reject::not_found()) })
        .boxed();
    let api = api
        .into_iter()
        .rev()
        .fold(not_found, |rest, route| route.or(rest).unify().boxed());

    api.with(warp::cors().allow_any_origin().allow_methods(vec!["GET"]))
        .with(warp::trace::request())
        .recover(handle_rejection)
}
