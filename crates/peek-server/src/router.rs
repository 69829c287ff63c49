//! HTTP routes.
//!
//! `/ws` is the live-view endpoint. Everything else serves the viewer: the
//! embedded page by default, or a directory when one is configured.

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use camino::Utf8Path;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::connection;
use crate::state::AppState;

/// The built-in viewer page.
pub const INDEX_HTML: &str = include_str!("../assets/index.html");

/// Builds the router.
///
/// With `assets_dir`, every path except `/ws` is served from that directory.
pub fn build_router(state: AppState, assets_dir: Option<&Utf8Path>) -> Router {
    let router = Router::new().route("/ws", get(ws_handler));

    let router = match assets_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router.route("/", get(index)).fallback(index),
    };

    router.with_state(state).layer(TraceLayer::new_for_http())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// WebSocket upgrade handler.
async fn ws_handler(
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<AppState>,
) -> Response {
    let ws = match upgrade {
        Ok(ws) => ws,
        Err(rejection) => {
            warn!(error = %rejection, "WebSocket upgrade rejected");
            return rejection.into_response();
        }
    };

    ws.on_failed_upgrade(|error| warn!(error = %error, "WebSocket upgrade failed"))
        .on_upgrade(move |socket| connection::serve(socket, state))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_connects_to_ws_endpoint() {
        assert!(INDEX_HTML.contains("/ws"));
        assert!(INDEX_HTML.contains("WebSocket"));
    }

    #[test]
    fn test_index_renders_binary_frames() {
        assert!(INDEX_HTML.contains("instanceof Blob"));
        assert!(INDEX_HTML.contains("createObjectURL"));
    }
}
