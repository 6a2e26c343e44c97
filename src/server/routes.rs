use std::collections::HashMap;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::http::header::{CONTENT_TYPE, COOKIE, REFERER};
use serde::Serialize;

use crate::model::Decision;
use crate::signals::ReaderRequest;

use super::error::{AppError, AppResult};
use super::state::ServerState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub store: &'static str,
    pub uptime_secs: u64,
}

/// Liveness probe: `GET /health`
pub async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        store: state.engine.store_name(),
        uptime_secs: state.uptime_secs(),
    })
}

/// `GET /reader?rid=&popup_id=&url=`
pub async fn query(
    State(state): State<ServerState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> AppResult<Json<Decision>> {
    let request = reader_request(params, &headers, None);
    let engine = state.engine.clone();
    let decision = tokio::task::spawn_blocking(move || engine.query(&request))
        .await
        .map_err(|err| AppError::Internal(format!("query task failed: {err}")))??;
    Ok(Json(decision))
}

/// `POST /reader` with query params, a JSON body or a form body.
pub async fn acknowledge(
    State(state): State<ServerState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> AppResult<Json<Decision>> {
    let request = reader_request(params, &headers, Some(body));
    let engine = state.engine.clone();
    let decision = tokio::task::spawn_blocking(move || engine.acknowledge(&request))
        .await
        .map_err(|err| AppError::Internal(format!("acknowledge task failed: {err}")))??;
    Ok(Json(decision))
}

fn reader_request(
    mut params: HashMap<String, String>,
    headers: &HeaderMap,
    body: Option<String>,
) -> ReaderRequest {
    let is_form = header_str(headers, CONTENT_TYPE.as_str())
        .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"));

    let body = match body {
        Some(raw) if is_form => {
            for (name, value) in url::form_urlencoded::parse(raw.as_bytes()) {
                params
                    .entry(name.into_owned())
                    .or_insert_with(|| value.into_owned());
            }
            None
        }
        other => other,
    };

    let cookie = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect::<Vec<_>>()
        .join("; ");

    ReaderRequest {
        params,
        body,
        referer: header_str(headers, REFERER.as_str()).map(str::to_string),
        cookie: (!cookie.is_empty()).then_some(cookie),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_reader_request_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(REFERER, HeaderValue::from_static("https://example.com/?a=1"));
        headers.append(COOKIE, HeaderValue::from_static("a=1"));
        headers.append(COOKIE, HeaderValue::from_static("amp-access=r9"));

        let request = reader_request(HashMap::new(), &headers, None);
        assert_eq!(request.referer.as_deref(), Some("https://example.com/?a=1"));
        assert_eq!(request.cookie.as_deref(), Some("a=1; amp-access=r9"));
        assert!(request.body.is_none());
    }

    #[test]
    fn test_form_body_fills_missing_params() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        let params = HashMap::from([("rid".to_string(), "from-query".to_string())]);

        let request = reader_request(
            params,
            &headers,
            Some("rid=from-form&popup_id=5&suppress_forever=1".to_string()),
        );
        assert_eq!(request.params["rid"], "from-query");
        assert_eq!(request.params["popup_id"], "5");
        assert_eq!(request.params["suppress_forever"], "1");
        assert!(request.body.is_none());
    }

    #[test]
    fn test_json_body_is_passed_through() {
        let request = reader_request(
            HashMap::new(),
            &HeaderMap::new(),
            Some(r#"{"popup_id": 5}"#.to_string()),
        );
        assert_eq!(request.body.as_deref(), Some(r#"{"popup_id": 5}"#));
    }
}
