//! HTTP surface tests driven through the router with `tower::oneshot`.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use lopdf::{dictionary, Document, Object};
use tower::ServiceExt;

use prensa::{app, AppState, Config};

const BOUNDARY: &str = "prensa-test-boundary";

fn test_app() -> Router {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.files.temp_dir = dir.into_path();
    config.files.max_file_size_mb = 5;
    config.workers.count = 2;
    app(AppState::new(config).unwrap())
}

struct Part<'a> {
    name: &'a str,
    filename: Option<&'a str>,
    content_type: Option<&'a str>,
    data: Vec<u8>,
}

impl<'a> Part<'a> {
    fn file(name: &'a str, filename: &'a str, content_type: &'a str, data: Vec<u8>) -> Self {
        Part {
            name,
            filename: Some(filename),
            content_type: Some(content_type),
            data,
        }
    }

    fn text(name: &'a str, value: &str) -> Self {
        Part {
            name,
            filename: None,
            content_type: None,
            data: value.as_bytes().to_vec(),
        }
    }
}

fn multipart_body(parts: &[Part]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part.filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    part.name, filename
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n", part.name).as_bytes(),
            ),
        }
        if let Some(content_type) = part.content_type {
            body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(&part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn multipart_request(uri: &str, parts: &[Part]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

/// A minimal one-page PDF as bytes.
fn sample_pdf(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::new();
    for _ in 0..pages {
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        kids.push(page_id.into());
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);
    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

fn sample_png() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(64, 48, image::Rgb([200, 30, 90]));
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

#[tokio::test]
async fn health_reports_healthy() {
    let response = test_app()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["status"], "healthy");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn ready_probe_responds() {
    let response = test_app()
        .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn compress_rejects_non_pdf_uploads() {
    let request = multipart_request(
        "/api/v1/compress-pdf",
        &[Part::file("file", "notes.txt", "text/plain", b"hello".to_vec())],
    );
    let response = test_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn compress_rejects_corrupt_pdfs() {
    let request = multipart_request(
        "/api/v1/compress-pdf",
        &[Part::file(
            "file",
            "broken.pdf",
            "application/pdf",
            b"%PDF-garbage".to_vec(),
        )],
    );
    let response = test_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn compress_errors_name_the_uploaded_file() {
    let request = multipart_request(
        "/api/v1/compress-pdf",
        &[Part::file(
            "file",
            "quarterly-report.pdf",
            "application/pdf",
            b"%PDF-garbage".to_vec(),
        )],
    );
    let response = test_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    let error = body["error"].as_str().unwrap();
    assert!(
        error.contains("quarterly-report.pdf"),
        "error does not name the file: {error}"
    );
}

#[tokio::test]
async fn result_headers_are_exposed_to_browsers() {
    let response = test_app()
        .oneshot(
            Request::get("/health")
                .header(header::ORIGIN, "http://example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let exposed = response
        .headers()
        .get(header::ACCESS_CONTROL_EXPOSE_HEADERS)
        .expect("expose-headers missing")
        .to_str()
        .unwrap();
    assert!(exposed.contains("content-disposition"));
    assert!(exposed.contains("x-compressed-size"));
    assert!(exposed.contains("x-files-merged"));
}

#[tokio::test]
async fn compress_round_trips_a_document() {
    let request = multipart_request(
        "/api/v1/compress-pdf",
        &[
            Part::file("file", "doc.pdf", "application/pdf", sample_pdf(2)),
            Part::text("level", "high"),
        ],
    );
    let response = test_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/pdf"
    );
    assert!(response.headers().contains_key("x-original-size"));
    assert!(response.headers().contains_key("x-compressed-size"));
    assert_eq!(response.headers().get("x-pages-count").unwrap(), "2");

    let body = body_bytes(response).await;
    let doc = Document::load_mem(&body).unwrap();
    assert_eq!(doc.get_pages().len(), 2);
}

#[tokio::test]
async fn compress_rejects_unknown_level() {
    let request = multipart_request(
        "/api/v1/compress-pdf",
        &[
            Part::file("file", "doc.pdf", "application/pdf", sample_pdf(1)),
            Part::text("level", "extreme"),
        ],
    );
    let response = test_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn merge_concatenates_uploads() {
    let request = multipart_request(
        "/api/v1/merge-pdfs",
        &[
            Part::file("files", "a.pdf", "application/pdf", sample_pdf(2)),
            Part::file("files", "b.pdf", "application/pdf", sample_pdf(3)),
            Part::text("output_filename", "combined.pdf"),
        ],
    );
    let response = test_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-total-pages").unwrap(), "5");
    assert_eq!(response.headers().get("x-files-merged").unwrap(), "2");
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(disposition.contains("combined.pdf"));

    let body = body_bytes(response).await;
    let doc = Document::load_mem(&body).unwrap();
    assert_eq!(doc.get_pages().len(), 5);
}

#[tokio::test]
async fn merge_requires_two_files() {
    let request = multipart_request(
        "/api/v1/merge-pdfs",
        &[Part::file("files", "a.pdf", "application/pdf", sample_pdf(1))],
    );
    let response = test_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn convert_builds_one_page_per_image() {
    let request = multipart_request(
        "/api/v1/images-to-pdf",
        &[
            Part::file("files", "a.png", "image/png", sample_png()),
            Part::file("files", "b.png", "image/png", sample_png()),
            Part::text("page_size", "letter"),
            Part::text("margin", "10"),
        ],
    );
    let response = test_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-pages-count").unwrap(), "2");

    let body = body_bytes(response).await;
    let doc = Document::load_mem(&body).unwrap();
    assert_eq!(doc.get_pages().len(), 2);
}

#[tokio::test]
async fn convert_rejects_disallowed_image_types() {
    let request = multipart_request(
        "/api/v1/images-to-pdf",
        &[Part::file("files", "x.gif", "image/gif", vec![0u8; 16])],
    );
    let response = test_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn convert_with_no_files_is_rejected() {
    let request = multipart_request("/api/v1/images-to-pdf", &[Part::text("margin", "0")]);
    let response = test_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
