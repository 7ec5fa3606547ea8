//! HTTP surface over the carousel.

use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{Path as PathParam, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use once_cell::sync::Lazy;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::carousel::Carousel;
use crate::catalog::PhotoRecord;
use crate::config::Configuration;
use crate::error::Error;
use crate::persist;
use crate::rotate;
use crate::scan;

/// Grey square served when the catalog has nothing to show.
static PLACEHOLDER_PNG: Lazy<Bytes> = Lazy::new(|| {
    let img = image::RgbaImage::from_pixel(64, 64, image::Rgba([48, 48, 48, 255]));
    let mut out = io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .expect("in-memory png encode");
    Bytes::from(out.into_inner())
});

#[derive(Clone)]
struct AppState {
    carousel: Carousel,
    config: Arc<Configuration>,
}

/// Build the HTTP router over a carousel handle.
pub fn router(carousel: Carousel, config: Arc<Configuration>) -> Router {
    Router::new()
        .route("/image/{idx}", get(serve_image))
        .route("/info/{idx}", get(serve_info))
        .route("/ignore/{idx}", post(ignore_photo))
        .route("/like/{idx}", post(like_photo))
        .route("/rotate/{idx}", post(rotate_photo))
        .route("/refresh", post(refresh_catalog))
        .with_state(AppState { carousel, config })
}

/// Bind and serve until ctrl-c or SIGTERM. Cancels `cancel` on the way out
/// so sibling tasks stop with the server.
pub async fn serve(
    carousel: Carousel,
    config: Arc<Configuration>,
    cancel: CancellationToken,
) -> Result<()> {
    let router = router(carousel, Arc::clone(&config));
    let addr = SocketAddr::new(config.bind_address.parse()?, config.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind listener on {addr}"))?;
    info!(?addr, "carousel server listening");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await
        .context("server exited")?;
    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c().await.ok();
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        if let Ok(mut term) = signal(SignalKind::terminate()) {
            term.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    cancel.cancel();
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            // Distinct no-data status, not a fault.
            Error::EmptyCatalog => {
                (StatusCode::OK, Json(json!({"status": "no_images"}))).into_response()
            }
            Error::OutOfRange { .. } | Error::AllExcluded | Error::NotFound(_) => (
                StatusCode::NOT_FOUND,
                Json(json!({"error": self.to_string()})),
            )
                .into_response(),
            Error::Io(_) | Error::Image(_) | Error::Persist(_) => {
                error!(error = %self, "internal error handling request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": self.to_string()})),
                )
                    .into_response()
            }
        }
    }
}

async fn serve_image(
    State(state): State<AppState>,
    PathParam(idx): PathParam<usize>,
) -> Result<Response, Error> {
    let (actual, record) = match state.carousel.resolve(idx).await {
        Ok(pair) => pair,
        Err(Error::EmptyCatalog) => return Ok(placeholder_response()),
        Err(err) => return Err(err),
    };
    state.carousel.focus(actual).await?;
    let bytes = match state.carousel.payload(actual).await {
        Some(bytes) => bytes,
        // A rebuild can race the focus; fall back to a direct read.
        None => state.carousel.read_uncached(&record.path).await?,
    };
    Ok(image_response(bytes, &record.path, actual as i64))
}

async fn serve_info(
    State(state): State<AppState>,
    PathParam(idx): PathParam<usize>,
) -> Result<Json<PhotoRecord>, Error> {
    let (actual, record) = state.carousel.resolve(idx).await?;
    state.carousel.focus(actual).await?;
    Ok(Json(record))
}

async fn ignore_photo(
    State(state): State<AppState>,
    PathParam(idx): PathParam<usize>,
) -> Result<Json<serde_json::Value>, Error> {
    let (_, record) = state.carousel.resolve(idx).await?;
    let snapshot = state.carousel.exclude(record.name.clone()).await;
    if let Err(err) = persist::save_names(&state.config.ignored_file, &snapshot).await {
        warn!(path = %state.config.ignored_file.display(), error = %err, "failed to persist ignored set");
    }
    Ok(Json(json!({"ignored": record.name})))
}

async fn like_photo(
    State(state): State<AppState>,
    PathParam(idx): PathParam<usize>,
) -> Result<Json<serde_json::Value>, Error> {
    let (_, record) = state.carousel.resolve(idx).await?;
    let snapshot = state.carousel.like(record.name.clone()).await;
    if let Err(err) = persist::save_names(&state.config.liked_file, &snapshot).await {
        warn!(path = %state.config.liked_file.display(), error = %err, "failed to persist liked set");
    }
    Ok(Json(json!({"liked": record.name})))
}

async fn rotate_photo(
    State(state): State<AppState>,
    PathParam(idx): PathParam<usize>,
) -> Result<Json<serde_json::Value>, Error> {
    let (actual, record) = state.carousel.resolve(idx).await?;
    let path = record.path.clone();
    tokio::task::spawn_blocking(move || rotate::rotate_file(&path))
        .await
        .map_err(io::Error::other)??;
    state.carousel.invalidate_position(actual).await;
    Ok(Json(json!({"rotated": record.path.display().to_string()})))
}

async fn refresh_catalog(State(state): State<AppState>) -> Json<serde_json::Value> {
    let carousel = state.carousel.clone();
    let config = Arc::clone(&state.config);
    tokio::spawn(async move {
        if let Err(err) = scan::rebuild_catalog(&carousel, &config).await {
            warn!(error = %err, "refresh failed");
        }
    });
    Json(json!({"status": "refreshing"}))
}

fn image_response(bytes: Bytes, path: &Path, index: i64) -> Response {
    let mut resp = Response::new(bytes.into());
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type_for(path)),
    );
    resp.headers_mut()
        .insert("x-image-index", HeaderValue::from(index));
    resp
}

fn placeholder_response() -> Response {
    let mut resp = Response::new(PLACEHOLDER_PNG.clone().into());
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("image/png"),
    );
    resp.headers_mut()
        .insert("x-image-index", HeaderValue::from(-1i64));
    resp
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types_follow_extension() {
        assert_eq!(content_type_for(Path::new("/p/a.JPG")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("/p/a.png")), "image/png");
        assert_eq!(content_type_for(Path::new("/p/a.webp")), "image/webp");
        assert_eq!(
            content_type_for(Path::new("/p/unknown.bin")),
            "application/octet-stream"
        );
    }

    #[test]
    fn placeholder_is_a_png() {
        assert_eq!(&PLACEHOLDER_PNG[..8], b"\x89PNG\r\n\x1a\n");
    }
}
