//! End-to-end tests: controller + HTTP service against a mock conversion
//! endpoint.
//!
//! Each test starts a `wiremock` server standing in for the conversion
//! service, drives the controller through its handle as a host would, and
//! inspects the recorded display through a `HeadlessSurface`.

use mdrop::workflow::{
    CONVERTED_MESSAGE, COPIED_MESSAGE, DOWNLOADED_MESSAGE, NO_FILE_MESSAGE,
    UNSUPPORTED_FILE_MESSAGE,
};
use mdrop::{
    ActionError, ClipboardBackend, ClipboardChain, ControllerHandle, CopyMethod,
    DirectoryDownloader, FileRef, HeadlessSurface, InputEvent, Settlement, Severity, UiPhase,
    UploadController, WorkflowConfig, WorkflowConfigBuilder,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

// ── Test helpers ─────────────────────────────────────────────────────────────

struct Harness {
    handle: ControllerHandle,
    surface: HeadlessSurface,
    downloads: TempDir,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mdrop=debug")),
        )
        .with_test_writer()
        .try_init();
}

fn builder_for(endpoint: String) -> WorkflowConfigBuilder {
    WorkflowConfig::builder()
        .endpoint(endpoint)
        .tick_interval_ms(5)
        .hide_delay_ms(30)
        .seed(1)
}

fn config_for(endpoint: String) -> WorkflowConfig {
    builder_for(endpoint).build().expect("valid config")
}

fn start(config: WorkflowConfig) -> Harness {
    start_with(config, None)
}

fn start_with(config: WorkflowConfig, clipboard: Option<ClipboardChain>) -> Harness {
    init_tracing();
    let surface = HeadlessSurface::new();
    let downloads = tempfile::tempdir().expect("temp dir");
    let (mut controller, handle) =
        UploadController::http(&config, surface.clone()).expect("controller builds");
    controller = controller.with_downloader(Box::new(DirectoryDownloader::new(downloads.path())));
    if let Some(clipboard) = clipboard {
        controller = controller.with_clipboard(clipboard);
    }
    controller.spawn();
    Harness {
        handle,
        surface,
        downloads,
    }
}

async fn start_against(server: &MockServer) -> Harness {
    start(config_for(format!("{}/convert", server.uri())))
}

fn file(name: &str, body: &[u8]) -> FileRef {
    FileRef::from_bytes(name, body.to_vec())
}

/// Clipboard backend that records what it was given.
#[derive(Clone, Default)]
struct RecordingClipboard {
    writes: Arc<Mutex<Vec<String>>>,
}

impl ClipboardBackend for RecordingClipboard {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn write_text(&mut self, text: &str) -> Result<(), ActionError> {
        self.writes.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// Matches a multipart body carrying `filename` in the `file` field.
fn multipart_file(filename: &'static str) -> impl Fn(&Request) -> bool + Send + Sync {
    move |req: &Request| {
        let body = String::from_utf8_lossy(&req.body);
        body.contains(&format!("name=\"file\"; filename=\"{filename}\""))
    }
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn successful_conversion_previews_and_downloads() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/convert"))
        .and(multipart_file("report.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "markdown": "# Title"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let h = start_against(&server).await;
    h.handle
        .select_file(Some(file("report.pdf", b"%PDF-1.7")))
        .unwrap();

    let snap = h.handle.wait_for_settled(1).await.unwrap();
    assert_eq!(snap.phase, UiPhase::Success);
    assert!(snap.has_artifact);

    let view = h.surface.snapshot();
    assert_eq!(view.preview.as_deref(), Some("# Title"));
    assert!(!view.help_visible);
    assert_eq!(view.progress, 100);
    let notice = view.notice.expect("success notice");
    assert_eq!(notice.message, CONVERTED_MESSAGE);
    assert_eq!(notice.severity, Severity::Success);

    let saved = h.handle.download().await.unwrap().expect("download succeeds");
    assert_eq!(saved, h.downloads.path().join("report.md"));
    assert_eq!(std::fs::read_to_string(&saved).unwrap(), "# Title");
    assert_eq!(
        h.surface.snapshot().notice.map(|n| n.message),
        Some(DOWNLOADED_MESSAGE.to_string())
    );
}

#[tokio::test]
async fn server_error_shows_body_message_and_restores_help() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/convert"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(serde_json::json!({ "error": "bad format" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let h = start_against(&server).await;
    h.handle.select_file(Some(file("notes.txt", b"hello"))).unwrap();

    let snap = h.handle.wait_for_settled(1).await.unwrap();
    assert_eq!(snap.phase, UiPhase::Failed);

    let view = h.surface.snapshot();
    let notice = view.notice.expect("failure notice");
    assert_eq!(notice.message, "bad format");
    assert_eq!(notice.severity, Severity::Danger);
    assert!(view.help_visible);
    assert!(view.preview.is_none());
    assert!(!view.progress_history.contains(&100));
}

#[tokio::test]
async fn success_without_markdown_is_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    let h = start_against(&server).await;
    h.handle.select_file(Some(file("x", b"x"))).unwrap();
    h.handle.wait_for_settled(1).await.unwrap();

    let view = h.surface.snapshot();
    assert_eq!(
        view.notice.map(|n| n.message).as_deref(),
        Some("Conversion failed: empty response")
    );
    assert!(view.preview.is_none());
    assert!(view.help_visible);
}

#[tokio::test]
async fn non_json_error_body_gets_generic_status_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .mount(&server)
        .await;

    let h = start_against(&server).await;
    h.handle.select_file(Some(file("a.pdf", b"a"))).unwrap();
    h.handle.wait_for_settled(1).await.unwrap();

    assert_eq!(
        h.surface.snapshot().notice.map(|n| n.message).as_deref(),
        Some("Server error: 502")
    );
}

#[tokio::test]
async fn empty_drop_issues_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let h = start_against(&server).await;
    h.handle.input(InputEvent::DragOver).unwrap();
    h.handle.drop_files(vec![]).unwrap();

    let snap = h.handle.wait_for(|s| s.notice.is_some()).await.unwrap();
    assert_eq!(snap.phase, UiPhase::Idle);

    let view = h.surface.snapshot();
    let notice = view.notice.expect("benign notice");
    assert_eq!(notice.message, NO_FILE_MESSAGE);
    assert_eq!(notice.severity, Severity::Info);
    assert!(!view.drop_active);
    assert!(!view.progress_visible);
    assert!(view.progress_history.is_empty());
}

#[tokio::test]
async fn unreachable_service_is_a_transport_failure() {
    // Bind and release a port so nothing is listening on it.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let h = start(config_for(format!("http://127.0.0.1:{port}/convert")));
    h.handle.select_file(Some(file("a.pdf", b"a"))).unwrap();

    let snap = h.handle.wait_for_settled(1).await.unwrap();
    assert_eq!(snap.phase, UiPhase::Failed);
    let view = h.surface.snapshot();
    let notice = view.notice.expect("failure notice");
    assert_eq!(notice.severity, Severity::Danger);
    assert!(!notice.message.trim().is_empty());
    assert!(view.help_visible);
}

#[tokio::test]
async fn missing_file_on_disk_fails_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let h = start_against(&server).await;
    h.handle
        .select_file(Some(FileRef::from_path("/definitely/not/here.pdf")))
        .unwrap();
    h.handle.wait_for_settled(1).await.unwrap();

    let message = h.surface.snapshot().notice.unwrap().message;
    assert!(message.contains("here.pdf"), "got: {message}");
}

#[tokio::test]
async fn progress_is_capped_while_pending_and_retired_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "success": true, "markdown": "slow" }))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let h = start_against(&server).await;
    h.handle.select_file(Some(file("big.pdf", b"big"))).unwrap();

    let pending = h
        .handle
        .wait_for(|s| s.phase == UiPhase::InProgress && s.progress > 0)
        .await
        .unwrap();
    assert!(pending.progress_visible);
    assert!(pending.progress <= 90);

    h.handle.wait_for_settled(1).await.unwrap();
    let history = h.surface.snapshot().progress_history;
    let done_at = history.iter().position(|&v| v == 100).expect("reaches 100");
    assert!(history[..done_at].iter().all(|&v| v <= 90), "history: {history:?}");

    let retired = h.handle.wait_for(|s| !s.progress_visible).await.unwrap();
    assert_eq!(retired.progress, 0);
    assert_eq!(h.surface.snapshot().progress, 0);
}

#[tokio::test]
async fn reselecting_same_file_starts_fresh_submission() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "markdown": "# again"
        })))
        .expect(2)
        .mount(&server)
        .await;

    let h = start_against(&server).await;
    for n in 1..=2 {
        h.handle.select_file(Some(file("same.html", b"<h1>x</h1>"))).unwrap();
        let snap = h.handle.wait_for_settled(n).await.unwrap();
        assert_eq!(snap.current, Some(n));
    }
    assert_eq!(h.surface.snapshot().file_input_clears, 2);
}

#[tokio::test]
async fn later_submission_wins_over_slow_earlier_one() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(multipart_file("slow.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "success": true, "markdown": "# slow" }))
                .set_delay(Duration::from_millis(250)),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(multipart_file("fast.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "markdown": "# fast"
        })))
        .mount(&server)
        .await;

    let h = start_against(&server).await;
    h.handle.select_file(Some(file("slow.pdf", b"1"))).unwrap();
    h.handle
        .wait_for(|s| s.phase == UiPhase::InProgress)
        .await
        .unwrap();
    h.handle.select_file(Some(file("fast.pdf", b"2"))).unwrap();

    h.handle.wait_for_settled(1).await.unwrap();
    assert_eq!(h.surface.snapshot().preview.as_deref(), Some("# fast"));

    // Give the slow reply time to arrive; it must not replace the preview.
    tokio::time::sleep(Duration::from_millis(400)).await;
    let view = h.surface.snapshot();
    assert_eq!(view.preview.as_deref(), Some("# fast"));
    assert_eq!(h.handle.snapshot().settled, 1);

    let saved = h.handle.download().await.unwrap().unwrap();
    assert_eq!(saved.file_name().unwrap(), "fast.md");
}

#[tokio::test]
async fn disallowed_extension_is_rejected_before_upload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = builder_for(format!("{}/convert", server.uri()))
        .accepted_extensions(["pdf", "docx"])
        .build()
        .unwrap();
    let h = start(config);

    let outcome = tokio::time::timeout(
        Duration::from_secs(2),
        h.handle.submit_and_wait(file("scan.tiff", b"II*")),
    )
    .await
    .expect("rejection settles")
    .unwrap();

    assert!(matches!(outcome, Settlement::Rejected(_)));
    let snap = outcome.snapshot();
    assert_eq!((snap.rejected, snap.settled), (1, 0));
    assert_eq!(snap.phase, UiPhase::Idle);

    let view = h.surface.snapshot();
    let notice = view.notice.expect("rejection notice");
    assert_eq!(notice.message, UNSUPPORTED_FILE_MESSAGE);
    assert_eq!(notice.severity, Severity::Danger);
    assert_eq!(view.file_input_clears, 1);
    assert!(!view.progress_visible);
    assert!(view.progress_history.is_empty());
}

#[tokio::test]
async fn copy_goes_through_primary_clipboard() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "markdown": "# Title"
        })))
        .mount(&server)
        .await;

    let primary = RecordingClipboard::default();
    let fallback = RecordingClipboard::default();
    let chain = ClipboardChain::new(Some(Box::new(primary.clone())), Box::new(fallback.clone()));
    let h = start_with(config_for(format!("{}/convert", server.uri())), Some(chain));

    let outcome = h.handle.submit_and_wait(file("report.pdf", b"%PDF")).await.unwrap();
    assert!(outcome.is_success());

    let method = h.handle.copy().await.unwrap().expect("copy succeeds");
    assert_eq!(method, CopyMethod::Primary);
    assert_eq!(*primary.writes.lock().unwrap(), vec!["# Title".to_string()]);
    assert!(fallback.writes.lock().unwrap().is_empty());

    let notice = h.surface.snapshot().notice.expect("copy notice");
    assert_eq!(notice.message, COPIED_MESSAGE);
    assert_eq!(notice.severity, Severity::Success);
    assert_eq!(h.handle.snapshot().phase, UiPhase::Success);
}

#[tokio::test]
async fn each_submission_posts_exactly_one_terminal_notice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(multipart_file("ok.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "markdown": "# ok"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(multipart_file("bad.pdf"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(serde_json::json!({ "error": "bad format" })),
        )
        .mount(&server)
        .await;

    let h = start_against(&server).await;
    let terminal_notices = |h: &Harness| -> Vec<(String, Severity)> {
        h.surface
            .snapshot()
            .notice_history
            .into_iter()
            .map(|n| (n.message, n.severity))
            .collect()
    };

    h.handle.submit_and_wait(file("ok.pdf", b"1")).await.unwrap();
    h.handle.wait_for(|s| !s.progress_visible).await.unwrap();
    assert_eq!(
        terminal_notices(&h),
        vec![(CONVERTED_MESSAGE.to_string(), Severity::Success)]
    );

    h.handle.submit_and_wait(file("bad.pdf", b"2")).await.unwrap();
    h.handle.wait_for(|s| !s.progress_visible).await.unwrap();
    // Late ticks or timers must not add anything.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        terminal_notices(&h),
        vec![
            (CONVERTED_MESSAGE.to_string(), Severity::Success),
            ("bad format".to_string(), Severity::Danger),
        ]
    );
}

#[tokio::test]
async fn download_stays_inside_target_directory() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "markdown": "# inside"
        })))
        .mount(&server)
        .await;

    let h = start_against(&server).await;
    for name in ["../escaped.pdf", "/abs/dir/escaped.pdf"] {
        let outcome = h.handle.submit_and_wait(file(name, b"x")).await.unwrap();
        assert!(outcome.is_success(), "{name}");

        let saved = h.handle.download().await.unwrap().expect("download succeeds");
        assert_eq!(saved, h.downloads.path().join("escaped.md"), "{name}");
    }
    let parent = h.downloads.path().parent().unwrap();
    assert!(!parent.join("escaped.md").exists());
}
