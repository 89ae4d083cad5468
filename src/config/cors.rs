use axum::http::{header, HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

pub const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

const PREFLIGHT_MAX_AGE_SECS: u64 = 86400;

/// CORS for the storefront front-end. Credentials are allowed so the checkout
/// session cookie travels with XHR calls, which rules out a wildcard origin.
pub fn create_cors_layer(allowed_origins: &str) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(resolve_origins(allowed_origins)))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::ORIGIN,
            HeaderName::from_static("x-requested-with"),
        ])
        .expose_headers([header::CONTENT_LENGTH, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(PREFLIGHT_MAX_AGE_SECS))
}

fn resolve_origins(configured: &str) -> Vec<HeaderValue> {
    let origins = parse_origins(configured);
    if origins.is_empty() {
        tracing::warn!(
            "CORS: No valid origins configured, falling back to {}",
            DEFAULT_ALLOWED_ORIGINS
        );
        return parse_origins(DEFAULT_ALLOWED_ORIGINS);
    }
    tracing::info!("CORS: Configured with {} allowed origin(s)", origins.len());
    origins
}

fn parse_origins(raw: &str) -> Vec<HeaderValue> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => {
                tracing::debug!("CORS: Allowing origin: {}", origin);
                Some(value)
            }
            Err(e) => {
                tracing::warn!("CORS: Invalid origin '{}': {}", origin, e);
                None
            }
        })
        .collect()
}
