//! End-to-end request scenarios against a fixture application directory.

use std::fs;
use std::io::Read;

use bytes::Bytes;
use http::{header, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use tempfile::TempDir;

use spahost_server::{App, ServerParams};

fn params(dir: &TempDir) -> ServerParams {
    let mut params = ServerParams::new(dir.path());
    params.dotenv_path = dir.path().join(".env");
    params
}

fn get(path: &str, accept_encoding: Option<&str>) -> Request<()> {
    let mut builder = Request::builder().method("GET").uri(path);
    if let Some(value) = accept_encoding {
        builder = builder.header(header::ACCEPT_ENCODING, value);
    }
    builder.body(()).unwrap()
}

async fn body_bytes(response: Response<Full<Bytes>>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn decompress_brotli(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    brotli::Decompressor::new(data, 4096)
        .read_to_end(&mut out)
        .unwrap();
    out
}

fn decompress_gzip(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    flate2::read::GzDecoder::new(data)
        .read_to_end(&mut out)
        .unwrap();
    out
}

#[tokio::test]
async fn precompressed_gzip_sibling_is_served_verbatim() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("vendor.js"), "v".repeat(2048)).unwrap();
    fs::write(dir.path().join("vendor.js.gz"), b"gzip sibling bytes").unwrap();
    let app = App::create(params(&dir));

    let response = app.handle(&get("/vendor.js", Some("gzip")));
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_ENCODING).unwrap(),
        "gzip"
    );
    assert_eq!(body_bytes(response).await.as_ref(), b"gzip sibling bytes");
}

#[tokio::test]
async fn missing_sibling_compresses_on_the_fly() {
    let dir = TempDir::new().unwrap();
    let raw = "function app(){}\n".repeat(200);
    fs::write(dir.path().join("vendor.js"), &raw).unwrap();
    let app = App::create(params(&dir));

    let response = app.handle(&get("/vendor.js", Some("br")));
    assert_eq!(
        response.headers().get(header::CONTENT_ENCODING).unwrap(),
        "br"
    );
    let body = body_bytes(response).await;
    assert_eq!(decompress_brotli(&body), raw.as_bytes());
}

#[tokio::test]
async fn index_is_rendered_even_when_a_precompressed_sibling_exists() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("index.html"),
        "<html><head><title>app</title></head></html>",
    )
    .unwrap();
    fs::write(dir.path().join("index.html.br"), b"stale precompressed").unwrap();
    let app = App::create(params(&dir));

    let response = app.handle(&get("/", Some("br")));
    assert_eq!(response.status(), StatusCode::OK);
    let body = String::from_utf8(body_bytes(response).await.to_vec()).unwrap();
    assert!(body.contains("<!--ngssc-->"));
    assert!(!body.contains("stale precompressed"));
}

#[tokio::test]
async fn large_index_is_compressed_after_rendering() {
    let dir = TempDir::new().unwrap();
    let filler = "<!-- padding -->".repeat(200);
    fs::write(
        dir.path().join("index.html"),
        format!("<html><head><title>app</title></head><body>{filler}</body></html>"),
    )
    .unwrap();
    let app = App::create(params(&dir));

    let response = app.handle(&get("/route", Some("gzip")));
    assert_eq!(
        response.headers().get(header::CONTENT_ENCODING).unwrap(),
        "gzip"
    );
    let body = body_bytes(response).await;
    let html = String::from_utf8(decompress_gzip(&body)).unwrap();
    assert!(html.contains("<!--ngssc--><script>(function(self){"));
}

#[tokio::test]
async fn locale_paths_resolve_their_nearest_index() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("index.html"),
        "<html><head><title>default</title></head></html>",
    )
    .unwrap();
    fs::create_dir(dir.path().join("de")).unwrap();
    fs::write(
        dir.path().join("de/index.html"),
        "<html><head><title>de</title></head></html>",
    )
    .unwrap();
    let app = App::create(params(&dir));

    let response = app.handle(&get("/de/dashboard", None));
    let body = String::from_utf8(body_bytes(response).await.to_vec()).unwrap();
    assert!(body.contains("<title>de</title>"));

    let response = app.handle(&get("/fr/dashboard", None));
    let body = String::from_utf8(body_bytes(response).await.to_vec()).unwrap();
    assert!(body.contains("<title>default</title>"));
}

#[tokio::test]
async fn unknown_extensions_have_no_content_type() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("binary.dat"), vec![0u8; 64]).unwrap();
    fs::write(
        dir.path().join("index.html"),
        "<html><head><title>app</title></head></html>",
    )
    .unwrap();
    let app = App::create(params(&dir));

    let response = app.handle(&get("/binary.dat", None));
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::CONTENT_TYPE).is_none());
}

#[tokio::test]
async fn non_compressible_media_is_served_raw() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("photo.png"), vec![1u8; 4096]).unwrap();
    fs::write(
        dir.path().join("index.html"),
        "<html><head><title>app</title></head></html>",
    )
    .unwrap();
    let app = App::create(params(&dir));

    let response = app.handle(&get("/photo.png", Some("br, gzip")));
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::CONTENT_ENCODING).is_none());
    assert_eq!(body_bytes(response).await.len(), 4096);
}

#[tokio::test]
async fn media_with_precompressed_sibling_becomes_eligible() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("model.bin"), vec![1u8; 4096]).unwrap();
    fs::write(dir.path().join("model.bin.br"), b"precompressed model").unwrap();
    fs::write(
        dir.path().join("index.html"),
        "<html><head><title>app</title></head></html>",
    )
    .unwrap();
    let app = App::create(params(&dir));

    let response = app.handle(&get("/model.bin", Some("br")));
    assert_eq!(
        response.headers().get(header::CONTENT_ENCODING).unwrap(),
        "br"
    );
    assert_eq!(body_bytes(response).await.as_ref(), b"precompressed model");
}

#[tokio::test]
async fn traversal_attempts_fall_back_to_index() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("index.html"),
        "<html><head><title>app</title></head></html>",
    )
    .unwrap();
    let app = App::create(params(&dir));

    let response = app.handle(&get("/../../etc/passwd", None));
    assert_eq!(response.status(), StatusCode::OK);
    let body = String::from_utf8(body_bytes(response).await.to_vec()).unwrap();
    assert!(body.contains("<title>app</title>"));
}
