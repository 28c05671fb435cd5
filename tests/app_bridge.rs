use autobridge::BridgeConfig;
use autobridge::facade::AppFacade;
use autobridge::facade::stdio::{AppEvent, AppSession, run_app_bridge};
use autobridge::failure::FailureKind;
use autobridge::relay::relay_channel;
use autobridge::settings::{AppSettings, ModelChoice};
use autobridge::store::{MemoryPayloadStore, PayloadStore};
use autobridge::surface::{Page, SurfaceKind};
use autobridge::test_utils::{ScriptedPage, StaticSurfaces, claude_page};
use std::sync::Arc;

struct Harness {
    _dir: tempfile::TempDir,
    config: BridgeConfig,
    surfaces: Arc<StaticSurfaces>,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir in test");
        let mut config = BridgeConfig::default();
        config.detector.poll_interval_ms = 5;
        config.detector.hard_timeout_secs = 5;
        config.adapter.focus_delay_ms = 0;
        config.adapter.clear_delay_ms = 0;
        config.adapter.settle_delay_ms = 0;
        config.app.settings_path = Some(dir.path().join("settings.json"));
        config.app.history_path = Some(dir.path().join("history.json"));
        Self {
            _dir: dir,
            config,
            surfaces: Arc::new(StaticSurfaces::new()),
        }
    }

    fn session(&self) -> AppSession {
        let store: Arc<dyn PayloadStore> = Arc::new(MemoryPayloadStore::new());
        let (relay, switchboard) = relay_channel(&self.config, store, self.surfaces.clone());
        tokio::spawn(switchboard.run());
        AppSession::new(AppFacade::new(relay, &self.config), &self.config.app)
    }

    async fn run(&self, input: &str) -> Vec<AppEvent> {
        let mut out = Vec::new();
        run_app_bridge(self.session(), input.as_bytes(), &mut out)
            .await
            .expect("bridge run in test");
        String::from_utf8(out)
            .expect("utf-8 output in test")
            .lines()
            .map(|line| serde_json::from_str(line).expect("event json in test"))
            .collect()
    }
}

fn answering_page(answer: &str) -> Arc<dyn Page> {
    Arc::new(
        ScriptedPage::new(SurfaceKind::Claude, claude_page(false, &[]))
            .settle_on(claude_page(false, &[answer])),
    )
}

#[tokio::test]
async fn ping_and_status_without_surface() {
    let harness = Harness::new();
    let events = harness
        .run("{\"type\":\"bridge_ping\"}\n\n{\"type\":\"check_target_open\"}\n")
        .await;
    assert_eq!(
        events,
        vec![
            AppEvent::BridgePong {
                status: "ok".into(),
                message: "גשר פעיל".into(),
            },
            AppEvent::TargetStatus {
                open: false,
                surface: None,
            },
        ]
    );
}

#[tokio::test]
async fn malformed_line_gets_an_error_and_the_bridge_keeps_going() {
    let harness = Harness::new();
    let events = harness
        .run("not json\n{\"type\":\"check_target_open\"}\n")
        .await;
    assert_eq!(events.len(), 2);
    match &events[0] {
        AppEvent::Error { message, .. } => assert!(message.starts_with("failed to parse command")),
        other => panic!("expected error, got {other:?}"),
    }
    assert!(matches!(events[1], AppEvent::TargetStatus { .. }));
}

#[tokio::test]
async fn request_ai_round_trip() {
    let harness = Harness::new();
    harness
        .surfaces
        .open(answering_page("A complete and helpful answer."));
    let events = harness
        .run("{\"type\":\"request_ai\",\"request_id\":\"r1\",\"text\":\"Hello\"}\n")
        .await;
    assert_eq!(
        events,
        vec![AppEvent::Response {
            request_id: "r1".into(),
            text: "A complete and helpful answer.".into(),
        }]
    );
}

#[tokio::test]
async fn failed_request_shows_up_in_diagnostic_report() {
    let harness = Harness::new();
    let events = harness
        .run(
            "{\"type\":\"request_ai\",\"request_id\":\"r2\",\"text\":\"Hello\"}\n\
             {\"type\":\"diagnostic_report\"}\n",
        )
        .await;
    assert_eq!(events.len(), 2);
    assert_eq!(
        events[0],
        AppEvent::Error {
            request_id: Some("r2".into()),
            message: "נא לפתוח את Claude.ai או Gemini בטאב נפרד".into(),
            kind: Some(FailureKind::TargetUnavailable),
        }
    );
    match &events[1] {
        AppEvent::DiagnosticReport { report } => {
            assert!(report.starts_with("### System Diagnostic Report"));
            assert!(report.contains("[Processing Error] נא לפתוח את Claude.ai"));
            assert!(report.contains("- Target surface: ❌ MISSING"));
        }
        other => panic!("expected report, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_transcript_asks_for_text() {
    let harness = Harness::new();
    let events = harness
        .run("{\"type\":\"process_transcript\",\"text\":\"  \"}\n")
        .await;
    assert_eq!(
        events,
        vec![AppEvent::Error {
            request_id: None,
            message: "אנא הזן טקסט לעיבוד.".into(),
            kind: None,
        }]
    );
}

#[tokio::test]
async fn transcript_run_records_history() {
    let harness = Harness::new();
    harness
        .surfaces
        .open(answering_page("Summary of the whole transcript."));
    let events = harness
        .run("{\"type\":\"process_transcript\",\"text\":\"אהה  שלום לכולם .\",\"model\":\"gemini\"}\n")
        .await;
    assert_eq!(
        events,
        vec![AppEvent::TranscriptDone {
            chunks: 1,
            responses: vec!["Summary of the whole transcript.".into()],
        }]
    );

    let history_path = harness
        .config
        .app
        .history_path
        .clone()
        .expect("history path in test");
    let log = autobridge::settings::HistoryLog::load(history_path, 50);
    assert_eq!(log.records().len(), 1);
    assert_eq!(log.records()[0].text, "שלום לכולם.");
    assert_eq!(log.records()[0].model, ModelChoice::Gemini);
}

#[tokio::test]
async fn settings_save_and_reload() {
    let harness = Harness::new();
    let saved = AppSettings {
        chunk_size: 1000,
        preprocess_enabled: false,
        ..AppSettings::default()
    };
    let line = serde_json::json!({"type": "save_settings", "settings": saved}).to_string();
    let events = harness
        .run(&format!("{line}\n{{\"type\":\"get_settings\"}}\n"))
        .await;
    assert_eq!(
        events,
        vec![
            AppEvent::Settings {
                settings: saved.clone()
            },
            AppEvent::Settings { settings: saved },
        ]
    );
}
