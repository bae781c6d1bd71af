use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use crate::AppState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct VersionInfo {
    pub version: String,
    pub build: String,
}

impl VersionInfo {
    pub fn current(state: &AppState) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            build: state.config.build_label(),
        }
    }

    /// Strong ETag derived from version and build.
    pub fn etag(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.version.as_bytes());
        hasher.update(b":");
        hasher.update(self.build.as_bytes());
        format!("\"{}\"", &hex::encode(hasher.finalize())[..16])
    }
}

fn matches_etag(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get_all(header::IF_NONE_MATCH)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|candidate| candidate.trim().trim_start_matches("W/"))
        .any(|candidate| candidate == "*" || candidate == etag)
}

/// Clients poll this to find out whether they run against a new deployment.
#[utoipa::path(
    get,
    path = "/api/v1/version",
    summary = "Deployed version",
    responses(
        (status = 200, description = "Current version", body = VersionInfo,
            headers(("ETag" = String, description = "Changes whenever version or build changes"))
        ),
        (status = 304, description = "Unchanged since the ETag sent in If-None-Match"),
    )
)]
pub async fn get_version(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let info = VersionInfo::current(&state);
    let etag = info.etag();

    let mut response = if matches_etag(&headers, &etag) {
        StatusCode::NOT_MODIFIED.into_response()
    } else {
        Json(info).into_response()
    };

    if let Ok(value) = HeaderValue::from_str(&etag) {
        response.headers_mut().insert(header::ETAG, value);
    }
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(build: &str) -> VersionInfo {
        VersionInfo {
            version: "0.3.0".into(),
            build: build.into(),
        }
    }

    #[test]
    fn etag_changes_with_build() {
        assert_eq!(info("abc123").etag(), info("abc123").etag());
        assert_ne!(info("abc123").etag(), info("def456").etag());
        assert!(info("abc123").etag().starts_with('"'));
    }

    #[test]
    fn if_none_match_handles_lists_and_weak_tags() {
        let etag = info("abc123").etag();
        let mut headers = HeaderMap::new();
        assert!(!matches_etag(&headers, &etag));

        headers.insert(
            header::IF_NONE_MATCH,
            HeaderValue::from_str(&format!("\"other\", W/{}", etag)).unwrap(),
        );
        assert!(matches_etag(&headers, &etag));

        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_static("\"stale\""));
        assert!(!matches_etag(&headers, &etag));
    }
}
