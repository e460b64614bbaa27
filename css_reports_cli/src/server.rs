//! HTTP endpoint serving filtered customisation reports.
//!
//! `GET /customisation_report` validates the query, runs the report
//! pipeline and streams the filtered CSV back. `/` and unknown routes
//! redirect to the society homepage.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{rejection::QueryRejection, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use css_reports_lib::{
    validate_report_query, ErrorKind, RawReportQuery, ReportError, ReportPipeline, TokenStore,
};
use serde::Serialize;

const CSV_DISPOSITION: &str = "attachment; filename=\"customisations.csv\"";

/// State shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ReportPipeline>,
    pub tokens: Arc<TokenStore>,
    pub homepage: Arc<str>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(homepage))
        .route("/customisation_report", get(customisation_report))
        .fallback(homepage)
        .with_state(state)
}

async fn homepage(State(state): State<AppState>) -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, state.homepage.to_string())],
    )
        .into_response()
}

async fn customisation_report(
    State(state): State<AppState>,
    query: Result<Query<RawReportQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(raw) = query.map_err(|e| ReportError::InvalidInput(e.body_text()))?;
    let mut request = validate_report_query(&raw)?;

    request.session_token = if request.persist {
        tracing::info!(org = %request.org_id, "Session token persisted");
        state.tokens.persist(&request.org_id, &request.session_token)
    } else {
        state
            .tokens
            .effective_token(&request.org_id, &request.session_token)
    };

    let artifact = state.pipeline.run(&request).await?;
    let stream = artifact.into_stream().await.map_err(ReportError::Storage)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (header::CONTENT_DISPOSITION, CSV_DISPOSITION),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    kind: &'static str,
}

/// A [`ReportError`] rendered as a JSON response.
pub struct ApiError(ReportError);

impl From<ReportError> for ApiError {
    fn from(e: ReportError) -> Self {
        Self(e)
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
        ErrorKind::NoData => StatusCode::NOT_FOUND,
        ErrorKind::Transport => StatusCode::BAD_GATEWAY,
        ErrorKind::ReportRender | ErrorKind::ExportUrlNotFound | ErrorKind::Storage => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = status_for(kind);
        let error = match &self.0 {
            ReportError::InvalidInput(msg) => msg.clone(),
            other => other.to_string(),
        };
        if status.is_server_error() {
            tracing::error!(kind = kind.as_str(), "{}", error);
        }
        (
            status,
            Json(ErrorBody {
                error,
                kind: kind.as_str(),
            }),
        )
            .into_response()
    }
}
