use actix_web::error::QueryPayloadError;
use actix_web::http::{header, StatusCode};
use actix_web::{web, HttpRequest, HttpResponse, ResponseError, Result as ActixResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use orchestrate_core::config::Config;
use orchestrate_core::SearchQuery;
use orchestrate_rs::{Client, Error as ClientError};

/// Shared application state
pub struct AppState {
    pub client: Client,
    pub config: Arc<Config>,
}

/// Query parameters of the search route, passed through to Orchestrate
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<u64>,
    pub sort: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchResult {
    pub value: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("search failed")]
    Search { status: StatusCode, message: String },

    #[error("invalid query parameters")]
    InvalidQuery { message: String },
}

impl From<&ClientError> for ApiError {
    fn from(err: &ClientError) -> Self {
        let status = match err {
            ClientError::NotFound => StatusCode::NOT_FOUND,
            ClientError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::BAD_GATEWAY,
        };
        ApiError::Search {
            status,
            message: err.to_string(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Search { status, .. } => *status,
            ApiError::InvalidQuery { .. } => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let (ApiError::Search { message, .. } | ApiError::InvalidQuery { message }) = self;
        HttpResponse::build(self.status_code())
            .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
            .json(ErrorResponse {
                error: self.to_string(),
                message: Some(message.clone()),
            })
    }
}

/// Search a collection
/// GET /api/{collection}?query=...&limit=...&offset=...&sort=...
#[tracing::instrument(skip(params, state))]
pub async fn search(
    path: web::Path<String>,
    params: web::Query<SearchParams>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let collection = path.into_inner();
    let limit = params
        .limit
        .unwrap_or(state.config.search_limit)
        .min(state.config.search_limit);
    let lucene = params.query.as_deref().unwrap_or("*");
    tracing::debug!(
        collection = %collection,
        query = lucene,
        limit,
        offset = params.offset.unwrap_or(0),
        "Searching collection"
    );

    let query = SearchQuery {
        limit: Some(limit),
        offset: params.offset,
        sort: params.sort.clone(),
    };
    let mut cursor = state.client.collection(collection.as_str()).search(lucene, &query);

    // one page at most, even when the service sends fewer than `limit`
    let mut results = Vec::new();
    let mut more = cursor.advance().await;
    while more && results.len() < limit {
        let item = cursor.item().map_err(|e| ApiError::from(&e))?;
        results.push(SearchResult { value: item.value });
        more = !cursor.at_page_end() && cursor.advance().await;
    }
    if let Some(err) = cursor.error() {
        tracing::error!(collection = %collection, error = %err, "Search failed");
        return Err(ApiError::from(err));
    }

    let count = results.len();
    Ok(HttpResponse::Ok()
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .json(SearchResponse { results, count }))
}

/// Health check
/// GET /health
pub async fn health() -> ActixResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now()
    })))
}

fn query_error(err: QueryPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::debug!(path = %req.path(), error = %err, "Rejected query string");
    ApiError::InvalidQuery {
        message: err.to_string(),
    }
    .into()
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::QueryConfig::default().error_handler(query_error))
        .route("/api/{collection}", web::get().to(search))
        .route("/health", web::get().to(health));
}
