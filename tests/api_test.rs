use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    routing::get,
};
use http_body_util::BodyExt;
use image::{DynamicImage, Rgba, RgbaImage};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt; // for `oneshot`

use fopgate::api::{AppState, build_router};
use fopgate::command::encode_value;
use fopgate::config::{ByteSize, Config};
use fopgate::convert::Converter;
use fopgate::fetch::ResourceFetcher;
use fopgate::handlers::{HandlerServices, JobRegistry};
use fopgate::imaging::OutputFormat;
use fopgate::storage::StorageClient;

const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);
const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

fn solid_png(color: Rgba<u8>) -> Vec<u8> {
    OutputFormat::Png
        .encode(DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, color)))
        .unwrap()
}

/// Serves three 4x4 PNGs the way a bucket's public domain would
async fn spawn_image_server() -> String {
    let png = |color| {
        let data = solid_png(color);
        move || async move { ([(header::CONTENT_TYPE, "image/png")], data) }
    };
    let router = Router::new()
        .route("/a.png", get(png(RED)))
        .route("/b.png", get(png(GREEN)))
        .route("/c.png", get(png(BLUE)));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Router over in-memory storage, with test-sized limits
fn build_test_app(storage: StorageClient, config: Config) -> Router {
    let services = HandlerServices {
        storage,
        fetcher: Arc::new(ResourceFetcher::new(&config.fetch).unwrap()),
        converter: Converter::new(),
    };
    let registry = JobRegistry::with_builtins(
        config.server.operation_prefix.clone(),
        &services,
        &config.handlers,
    )
    .expect("builtins register with default config");

    build_router(AppState::new(config, registry))
}

fn post_uop(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/uop")
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_imagecomp_end_to_end() {
    let base = spawn_image_server().await;
    let storage = StorageClient::in_memory();
    for name in ["a.png", "b.png", "c.png"] {
        storage
            .upload("mybucket", name, solid_png(RED), "image/png")
            .await
            .unwrap();
    }
    let app = build_test_app(storage, Config::default());

    let mut command = format!(
        "imagecomp/bucket/{}/format/png/rows/2/cols/2",
        encode_value("mybucket")
    );
    for name in ["a.png", "b.png", "c.png"] {
        command.push_str(&format!("/url/{}", encode_value(&format!("{base}/{name}"))));
    }
    let body = json!({"cmd": command, "src": {}}).to_string();

    let response = app.oneshot(post_uop(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let canvas = image::load_from_memory(&bytes).unwrap().to_rgba8();
    assert_eq!(canvas.dimensions(), (8, 8));

    // column-major: A (0,0), B (1,0), C (0,1), (1,1) left empty
    assert_eq!(*canvas.get_pixel(0, 0), RED);
    assert_eq!(*canvas.get_pixel(0, 4), GREEN);
    assert_eq!(*canvas.get_pixel(4, 0), BLUE);
    assert_eq!(*canvas.get_pixel(4, 4), Rgba([255, 255, 255, 0]));
}

#[tokio::test]
async fn test_imagecomp_missing_object_is_bad_gateway() {
    let base = spawn_image_server().await;
    let app = build_test_app(StorageClient::in_memory(), Config::default());

    let command = format!(
        "imagecomp/bucket/{}/url/{}",
        encode_value("mybucket"),
        encode_value(&format!("{base}/a.png"))
    );
    let response = app
        .oneshot(post_uop(json!({"cmd": command}).to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("a.png"));
}

#[tokio::test]
async fn test_unknown_operation_is_bad_request() {
    let app = build_test_app(StorageClient::in_memory(), Config::default());

    let response = app
        .oneshot(post_uop(json!({"cmd": "nothere/a/b", "src": {}}).to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("nothere"));
}

#[tokio::test]
async fn test_bad_command_is_bad_request() {
    let app = build_test_app(StorageClient::in_memory(), Config::default());

    let response = app
        .oneshot(post_uop(
            json!({
                "cmd": "roundpic/radius-x/10",
                "src": {"url": "http://127.0.0.1:9/a.png", "mimetype": "image/png", "fsize": 10}
            })
            .to_string(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_envelope_is_bad_request() {
    let app = build_test_app(StorageClient::in_memory(), Config::default());

    let response = app.oneshot(post_uop("{not json")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_get_on_uop_is_method_not_allowed() {
    let app = build_test_app(StorageClient::in_memory(), Config::default());

    let response = app
        .oneshot(Request::builder().uri("/uop").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    let body = json_body(response).await;
    assert_eq!(body["error"], "method not allowed");
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let mut config = Config::default();
    config.server.max_payload_bytes = ByteSize::b(32);
    let app = build_test_app(StorageClient::in_memory(), config);

    let body = json!({"cmd": "roundpic/radius/10", "src": {"url": "http://127.0.0.1:9/long.png"}});
    let response = app.oneshot(post_uop(body.to_string())).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_health_lists_operations() {
    let mut config = Config::default();
    config.server.operation_prefix = "qn-".to_string();
    let app = build_test_app(StorageClient::in_memory(), config);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(
        body["operations"],
        json!([
            "qn-amerge",
            "qn-html2image",
            "qn-html2pdf",
            "qn-imagecomp",
            "qn-mkzip",
            "qn-roundpic",
            "qn-unzip"
        ])
    );
    assert_eq!(body["jobs"]["accepted"], 0);
}
