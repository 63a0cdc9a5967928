//! Static asset serving
//!
//! CSS and JS under `static/` are embedded in the binary and served from
//! `/static/*`. Every other unmatched path gets a 404.

use axum::{
    body::Body,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "static/"]
struct StaticAssets;

/// Router fallback
pub async fn serve_static(uri: Uri) -> Response {
    let path = uri.path();
    // URL decode the path to handle encoded characters
    let decoded_path = urlencoding::decode(path).unwrap_or_else(|_| path.into());
    let path = decoded_path.as_ref();

    let Some(asset_path) = path.strip_prefix("/static/") else {
        return not_found();
    };
    if asset_path.split('/').any(|segment| segment == "..") {
        return not_found();
    }

    match StaticAssets::get(asset_path) {
        Some(content) => build_response(asset_path, &content.data),
        None => not_found(),
    }
}

fn build_response(path: &str, data: &[u8]) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, get_content_type(path)),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        Body::from(data.to_vec()),
    )
        .into_response()
}

/// 404 response
fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        "<html><body><h1>404 Not Found</h1></body></html>",
    )
        .into_response()
}

/// Get content type from file extension
fn get_content_type(path: &str) -> &'static str {
    match path.rsplit('.').next().unwrap_or("") {
        "html" => "text/html; charset=utf-8",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "woff2" => "font/woff2",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}
