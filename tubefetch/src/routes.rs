use std::sync::{Arc, LazyLock};

use axum::{
    extract::State,
    http::{
        header::{AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS},
        HeaderName, HeaderValue, Method
    },
    middleware,
    routing::get,
    Router
};
use regex::Regex;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::{ServeDir, ServeFile},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer
};

use crate::config::Config;
use crate::error::AppError;
use crate::handlers::api;
use crate::rate_limit::limit_requests;
use crate::state::AppState;

static PRIVATE_NETWORK_ORIGIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^http://(192\.168\.\d+\.\d+|10\.\d+\.\d+\.\d+|172\.(1[6-9]|2\d|3[01])\.\d+\.\d+):")
        .expect("private network origin regex is valid")
});

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/video/info", get(api::video_info))
        .route("/video/download", get(api::download_video))
        .route("/health", get(api::health))
        .fallback(api_not_found)
        .layer(middleware::from_fn_with_state(state.clone(), limit_requests));

    let app = Router::new().nest("/api", api);

    let app = if state.config.production {
        let index = state.config.static_dir.join("index.html");
        tracing::info!("serving frontend from {}", state.config.static_dir.display());
        app.fallback_service(ServeDir::new(&state.config.static_dir).fallback(ServeFile::new(index)))
    } else {
        app.fallback(route_not_found)
    };

    app.layer(cors_layer(&state.config))
        .layer(SetResponseHeaderLayer::if_not_present(
            X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff")
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("cross-origin-resource-policy"),
            HeaderValue::from_static("cross-origin")
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Local development hosts, private networks, and the configured origins.
pub fn is_allowed_origin(origin: &str, configured: &[String]) -> bool {
    origin.starts_with("http://localhost:")
        || origin.starts_with("http://127.0.0.1:")
        || PRIVATE_NETWORK_ORIGIN.is_match(origin)
        || configured.iter().any(|allowed| allowed == origin)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let configured = Arc::new(config.cors_origins.clone());
    let allow_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        let allowed = origin
            .to_str()
            .is_ok_and(|origin| is_allowed_origin(origin, &configured));
        if !allowed {
            tracing::debug!("CORS origin rejected: {:?}", origin);
        }
        allowed
    });

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .expose_headers([CONTENT_DISPOSITION])
        .allow_credentials(true)
}

async fn api_not_found(State(state): State<AppState>) -> AppError {
    if state.config.production {
        AppError::not_found("Not found")
    } else {
        AppError::not_found("Route not found")
    }
}

async fn route_not_found() -> AppError {
    AppError::not_found("Route not found")
}
