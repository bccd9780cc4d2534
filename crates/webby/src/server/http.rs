//! Request handling for the hosted site.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{info, warn};

use super::SERVER_TARGET;
use super::site::{Route, SiteMap};

pub(super) fn router(site: Arc<SiteMap>) -> Router {
    Router::new().fallback(serve_routed).with_state(site)
}

async fn serve_routed(
    State(site): State<Arc<SiteMap>>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    let path = request.uri().path().to_owned();
    info!(
        target: SERVER_TARGET,
        remote = %remote,
        method = %request.method(),
        path,
        version = ?request.version(),
        "request received"
    );
    if path.contains("..") {
        warn!(target: SERVER_TARGET, remote = %remote, path, "request path contains '..'");
    }

    match site.resolve(&path) {
        Route::Dead => {
            info!(target: SERVER_TARGET, remote = %remote, path, "redirecting dead path");
            (
                StatusCode::MOVED_PERMANENTLY,
                [(header::LOCATION, format!("http://localhost{path}"))],
            )
                .into_response()
        }
        Route::File(file) => match ServeFile::new(file).oneshot(request).await {
            Ok(response) => response.into_response(),
            Err(never) => match never {},
        },
        Route::NotFound => StatusCode::NOT_FOUND.into_response(),
    }
}
