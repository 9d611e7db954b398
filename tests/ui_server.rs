use anyhow::Result;
use image::{ImageFormat, Rgb, RgbImage};
use std::io::{Cursor, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;

use panoramic_roi::config::UiSettings;
use panoramic_roi::web::{UiHandle, UiServer};
use panoramic_roi::{ClassScore, ClassificationResult, DetectionBox, StubClient};

struct TestUi {
    client: Arc<StubClient>,
    handle: Option<UiHandle>,
}

impl TestUi {
    fn new(client: StubClient, max_upload_bytes: usize) -> Result<Self> {
        let client = Arc::new(client);
        let settings = UiSettings {
            addr: "127.0.0.1:0".to_string(),
            working_size: 64,
            max_upload_bytes,
        };
        let handle = UiServer::new(settings, client.clone()).spawn()?;
        Ok(Self {
            client,
            handle: Some(handle),
        })
    }

    fn send(&self, method: &str, target: &str, body: &[u8]) -> Result<(String, String)> {
        let addr = self.handle.as_ref().expect("handle").addr;
        let mut stream = TcpStream::connect(addr)?;
        let head = format!(
            "{method} {target} HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        stream.write_all(head.as_bytes())?;
        stream.write_all(body)?;
        read_response(&mut stream)
    }
}

impl Drop for TestUi {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.stop();
        }
    }
}

fn read_response(stream: &mut TcpStream) -> Result<(String, String)> {
    let mut response = String::new();
    stream.read_to_string(&mut response)?;
    let mut parts = response.splitn(2, "\r\n\r\n");
    let headers = parts.next().unwrap_or("").to_string();
    let body = parts.next().unwrap_or("").to_string();
    Ok((headers, body))
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb([90, 90, 90]));
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .expect("encode png");
    bytes.into_inner()
}

fn tooth_box() -> DetectionBox {
    DetectionBox {
        center_x: 32.0,
        center_y: 32.0,
        width: 16.0,
        height: 16.0,
        label: "impacted".to_string(),
        confidence: 0.88,
    }
}

fn classification() -> ClassificationResult {
    ClassificationResult {
        top_label: "horizontal".to_string(),
        top_confidence: 0.97,
        per_class_scores: vec![
            ClassScore {
                label: "horizontal".to_string(),
                confidence: 0.97,
            },
            ClassScore {
                label: "vertical".to_string(),
                confidence: 0.03,
            },
        ],
    }
}

#[test]
fn health_and_upload_page_are_served() -> Result<()> {
    let ui = TestUi::new(StubClient::new(), 1024 * 1024)?;

    let (headers, body) = ui.send("GET", "/health", b"")?;
    assert!(headers.starts_with("HTTP/1.1 200"));
    assert_eq!(body, r#"{"status":"ok"}"#);

    let (headers, body) = ui.send("GET", "/", b"")?;
    assert!(headers.contains("text/html"));
    assert!(body.contains("<input type=\"file\""));
    Ok(())
}

#[test]
fn unknown_routes_and_methods_are_rejected() -> Result<()> {
    let ui = TestUi::new(StubClient::new(), 1024 * 1024)?;

    let (headers, _) = ui.send("GET", "/events", b"")?;
    assert!(headers.starts_with("HTTP/1.1 404"));
    let (headers, _) = ui.send("GET", "/analyze", b"")?;
    assert!(headers.starts_with("HTTP/1.1 405"));
    Ok(())
}

#[test]
fn unsupported_extension_never_reaches_the_service() -> Result<()> {
    let ui = TestUi::new(StubClient::new(), 1024 * 1024)?;

    let (headers, body) = ui.send("POST", "/analyze?filename=scan.bmp", &png_bytes(8, 8))?;
    assert!(headers.starts_with("HTTP/1.1 415"));
    assert!(body.contains("Unsupported file type"));
    assert_eq!(ui.client.detect_calls(), 0);
    Ok(())
}

#[test]
fn oversized_upload_is_refused() -> Result<()> {
    let ui = TestUi::new(StubClient::new(), 64)?;

    // Only the headers are sent; the server must answer without the body.
    let addr = ui.handle.as_ref().expect("handle").addr;
    let mut stream = TcpStream::connect(addr)?;
    stream.write_all(
        b"POST /analyze?filename=scan.png HTTP/1.1\r\nContent-Length: 4096\r\n\r\n",
    )?;
    let (headers, _) = read_response(&mut stream)?;
    assert!(headers.starts_with("HTTP/1.1 413"));
    assert_eq!(ui.client.detect_calls(), 0);
    Ok(())
}

#[test]
fn oversized_upload_can_finish_sending_before_reading_rejection() -> Result<()> {
    let ui = TestUi::new(StubClient::new(), 1024)?;
    let body = vec![0u8; 4 * 1024 * 1024];

    let addr = ui.handle.as_ref().expect("handle").addr;
    let mut stream = TcpStream::connect(addr)?;
    let head = format!(
        "POST /analyze?filename=scan.png HTTP/1.1\r\nContent-Length: {}\r\n\r\n",
        body.len()
    );
    stream.write_all(head.as_bytes())?;
    stream.write_all(&body)?;
    stream.shutdown(std::net::Shutdown::Write)?;
    let (headers, body) = read_response(&mut stream)?;

    assert!(headers.starts_with("HTTP/1.1 413"), "{headers}");
    assert!(body.contains("upload exceeds 1024 bytes"));
    assert_eq!(ui.client.detect_calls(), 0);
    Ok(())
}

#[test]
fn upload_is_detected_cropped_and_classified() -> Result<()> {
    let client = StubClient::new()
        .with_detections(vec![tooth_box()])
        .with_classification(Some(classification()));
    let ui = TestUi::new(client, 1024 * 1024)?;

    let (headers, body) = ui.send(
        "POST",
        "/analyze?filename=panoramic%20scan.png",
        &png_bytes(120, 48),
    )?;

    assert!(headers.starts_with("HTTP/1.1 200"), "{headers}");
    assert!(body.contains("1 region(s) detected!"));
    assert!(body.contains("<h3>ROI 1</h3>"));
    assert!(body.contains("Classified as:</strong> horizontal (0.97)"));
    assert!(body.contains("vertical: 0.03"));
    assert!(body.contains("impacted (0.88)"));
    assert!(body.contains(r#"alt="panoramic scan.png""#));
    assert!(body.contains("Detection of ROI and classification complete!"));
    assert_eq!(ui.client.detect_calls(), 1);
    assert_eq!(ui.client.classify_calls(), 1);
    Ok(())
}

#[test]
fn no_detections_show_guidance() -> Result<()> {
    let ui = TestUi::new(StubClient::new(), 1024 * 1024)?;

    let (headers, body) = ui.send("POST", "/analyze?filename=scan.jpg", &png_bytes(32, 32))?;
    assert!(headers.starts_with("HTTP/1.1 200"));
    assert!(body.contains("No regions detected."));
    assert_eq!(ui.client.classify_calls(), 0);
    Ok(())
}

#[test]
fn undecodable_upload_is_a_client_error() -> Result<()> {
    let ui = TestUi::new(StubClient::new(), 1024 * 1024)?;

    let (headers, body) = ui.send("POST", "/analyze?filename=scan.png", b"not an image")?;
    assert!(headers.starts_with("HTTP/1.1 400"));
    assert!(body.contains("Could not read image"));
    assert_eq!(ui.client.detect_calls(), 0);
    Ok(())
}

#[test]
fn filename_header_is_accepted() -> Result<()> {
    let ui = TestUi::new(StubClient::new(), 1024 * 1024)?;
    let body = png_bytes(16, 16);

    let addr = ui.handle.as_ref().expect("handle").addr;
    let mut stream = TcpStream::connect(addr)?;
    let head = format!(
        "POST /analyze HTTP/1.1\r\nX-Filename: scan.jpeg\r\nContent-Length: {}\r\n\r\n",
        body.len()
    );
    stream.write_all(head.as_bytes())?;
    stream.write_all(&body)?;
    let (headers, _) = read_response(&mut stream)?;

    assert!(headers.starts_with("HTTP/1.1 200"), "{headers}");
    assert_eq!(ui.client.detect_calls(), 1);
    Ok(())
}
