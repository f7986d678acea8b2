//! HTTP blob downloader tests.

use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use roboseg_worker::{BlobDownloader, DownloadError, HttpDownloader};

fn downloader() -> HttpDownloader {
    HttpDownloader::new(Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_streams_video_to_disk() {
    let server = MockServer::start().await;
    let body = vec![7u8; 64 * 1024];

    Mock::given(method("GET"))
        .and(path("/videos/run.mp4"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "video/mp4")
                .set_body_bytes(body.clone()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("task.mp4");

    let written = downloader()
        .download(&format!("{}/videos/run.mp4", server.uri()), &dest)
        .await
        .unwrap();

    assert_eq!(written, body.len() as u64);
    assert_eq!(std::fs::read(&dest).unwrap(), body);
}

#[tokio::test]
async fn test_rejects_non_video_content_type() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string("<html></html>"),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("task.mp4");

    let err = downloader()
        .download(&format!("{}/page", server.uri()), &dest)
        .await
        .unwrap_err();

    assert_eq!(err, DownloadError::NotVideo("text/html; charset=utf-8".to_string()));
    assert_eq!(
        err.to_string(),
        "URL does not point to a video file. Content-Type: text/html; charset=utf-8"
    );
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_http_error_is_transport_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing.mp4"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("task.mp4");

    let err = downloader()
        .download(&format!("{}/missing.mp4", server.uri()), &dest)
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::Transport(_)));
    assert!(err.to_string().starts_with("Failed to download video from URL: "));
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_unreachable_host_is_transport_failure() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("task.mp4");

    let err = downloader()
        .download("http://127.0.0.1:1/video.mp4", &dest)
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::Transport(_)));
    assert!(!dest.exists());
}
