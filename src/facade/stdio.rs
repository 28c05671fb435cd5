//! Stdin/stdout JSON bridge for the app facade.
//!
//! Reads newline-delimited JSON [`AppCommand`] messages, handles them one at
//! a time through an [`AppSession`], and writes one [`AppEvent`] per command
//! as newline-delimited JSON.
//!
//! Stdout is exclusively reserved for the JSON protocol; all diagnostic
//! output (tracing, logs) must be routed to stderr.

use super::{AppFacade, AppReply, TranscriptOutcome};
use crate::config::AppConfig;
use crate::diagnostics::ErrorLog;
use crate::error::{BridgeError, Result};
use crate::failure::{Failure, FailureKind};
use crate::settings::{AppSettings, HistoryLog, HistoryRecord, ModelChoice};
use crate::surface::SurfaceKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};

/// App -> host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppCommand {
    BridgePing,
    CheckTargetOpen,
    RequestAi {
        #[serde(default)]
        request_id: Option<String>,
        text: String,
    },
    ProcessTranscript {
        text: String,
        /// Overrides the saved model for this run.
        #[serde(default)]
        model: Option<ModelChoice>,
    },
    GetSettings,
    SaveSettings {
        settings: AppSettings,
    },
    DiagnosticReport,
}

/// Host -> app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    BridgePong {
        status: String,
        message: String,
    },
    TargetStatus {
        open: bool,
        surface: Option<SurfaceKind>,
    },
    Response {
        request_id: String,
        text: String,
    },
    TranscriptDone {
        chunks: usize,
        responses: Vec<String>,
    },
    Settings {
        settings: AppSettings,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kind: Option<FailureKind>,
    },
    DiagnosticReport {
        report: String,
    },
}

impl AppEvent {
    fn error(message: impl Into<String>) -> Self {
        Self::Error {
            request_id: None,
            message: message.into(),
            kind: None,
        }
    }
}

/// Per-process app state around an [`AppFacade`].
pub struct AppSession {
    facade: AppFacade,
    settings_path: PathBuf,
    history: HistoryLog,
    errors: ErrorLog,
}

impl AppSession {
    #[must_use]
    pub fn new(facade: AppFacade, app: &AppConfig) -> Self {
        Self {
            facade,
            settings_path: app.effective_settings_path(),
            history: HistoryLog::load(app.effective_history_path(), app.history_limit),
            errors: ErrorLog::new(app.error_log_limit),
        }
    }

    /// Handle one command to completion.
    pub async fn handle(&mut self, command: AppCommand) -> AppEvent {
        let locale = self.facade.locale();
        match command {
            AppCommand::BridgePing => match self.facade.check_target_open().await {
                Ok(_) => AppEvent::BridgePong {
                    status: "ok".to_owned(),
                    message: locale.bridge_status(true).to_owned(),
                },
                Err(e) => {
                    self.errors.record("Bridge Error", e.to_string());
                    AppEvent::error(locale.bridge_status(false))
                }
            },
            AppCommand::CheckTargetOpen => match self.facade.check_target_open().await {
                Ok(status) => AppEvent::TargetStatus {
                    open: status.open,
                    surface: status.surface,
                },
                Err(e) => self.infrastructure_error(None, e),
            },
            AppCommand::RequestAi { request_id, text } => {
                let request_id = request_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                match self.facade.request_with_id(request_id.clone(), text).await {
                    Ok(AppReply::Response { request_id, text }) => {
                        AppEvent::Response { request_id, text }
                    }
                    Ok(AppReply::Failed {
                        request_id,
                        message,
                        kind,
                    }) => {
                        self.errors.record("Processing Error", message.clone());
                        AppEvent::Error {
                            request_id: Some(request_id),
                            message,
                            kind,
                        }
                    }
                    Err(e) => self.infrastructure_error(Some(request_id), e),
                }
            }
            AppCommand::ProcessTranscript { text, model } => {
                let mut settings = AppSettings::load(&self.settings_path);
                if let Some(model) = model {
                    settings.model = model;
                }
                self.process_transcript(&text, &settings).await
            }
            AppCommand::GetSettings => AppEvent::Settings {
                settings: AppSettings::load(&self.settings_path),
            },
            AppCommand::SaveSettings { settings } => match settings.save(&self.settings_path) {
                Ok(()) => AppEvent::Settings { settings },
                Err(e) => self.infrastructure_error(None, e),
            },
            AppCommand::DiagnosticReport => {
                let target = self.facade.check_target_open().await.ok();
                AppEvent::DiagnosticReport {
                    report: self.errors.report(target),
                }
            }
        }
    }

    async fn process_transcript(&mut self, text: &str, settings: &AppSettings) -> AppEvent {
        let locale = self.facade.locale();
        match self.facade.process_transcript(text, settings).await {
            Ok(TranscriptOutcome::Empty) => AppEvent::error(locale.empty_input()),
            Ok(TranscriptOutcome::Completed {
                first_chunk,
                responses,
            }) => {
                let record = HistoryRecord {
                    date: chrono::Utc::now(),
                    model: settings.model,
                    text: first_chunk,
                };
                if let Err(e) = self.history.push(record) {
                    tracing::warn!(error = %e, "failed to save history");
                    self.errors.record("History Error", e.to_string());
                }
                AppEvent::TranscriptDone {
                    chunks: responses.len(),
                    responses,
                }
            }
            Ok(TranscriptOutcome::Failed {
                chunk_index,
                chunk_count,
                message,
                kind,
            }) => {
                self.errors.record(
                    "Processing Error",
                    format!("chunk {}/{chunk_count}: {message}", chunk_index + 1),
                );
                AppEvent::Error {
                    request_id: None,
                    message,
                    kind,
                }
            }
            Err(e) => self.infrastructure_error(None, e),
        }
    }

    fn infrastructure_error(&mut self, request_id: Option<String>, err: BridgeError) -> AppEvent {
        self.errors.record("Processing Error", err.to_string());
        let (message, kind) = match err {
            BridgeError::Timeout(_) => (
                self.facade
                    .locale()
                    .describe(&Failure::relay(FailureKind::Timeout)),
                Some(FailureKind::Timeout),
            ),
            other => (other.to_string(), None),
        };
        AppEvent::Error {
            request_id,
            message,
            kind,
        }
    }
}

/// Run the bridge on stdin/stdout until stdin closes.
///
/// # Errors
///
/// Returns [`BridgeError::Channel`] if stdin cannot be read or stdout
/// cannot be written.
pub async fn run_stdio_bridge(session: AppSession) -> Result<()> {
    run_app_bridge(
        session,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
}

/// Run the line protocol over any reader/writer pair until the reader hits EOF.
///
/// # Errors
///
/// Returns [`BridgeError::Channel`] on read or write failure.
pub async fn run_app_bridge<R, W>(mut session: AppSession, mut reader: R, writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut writer = BufWriter::new(writer);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| BridgeError::Channel(format!("failed to read command: {e}")))?;

        if bytes_read == 0 {
            tracing::info!("input closed (EOF); shutting down app bridge");
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let event = match serde_json::from_str::<AppCommand>(trimmed) {
            Ok(command) => session.handle(command).await,
            Err(e) => {
                tracing::warn!(error = %e, raw_line = %trimmed, "failed to parse app command");
                AppEvent::error(format!("failed to parse command: {e}"))
            }
        };

        let json = serde_json::to_string(&event)?;
        write_line(&mut writer, &json).await?;
    }

    Ok(())
}

/// Write a single JSON line to the buffered writer and flush.
async fn write_line<W: AsyncWrite + Unpin>(writer: &mut BufWriter<W>, json: &str) -> Result<()> {
    writer
        .write_all(json.as_bytes())
        .await
        .map_err(|e| BridgeError::Channel(format!("failed to write event: {e}")))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| BridgeError::Channel(format!("failed to write newline: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| BridgeError::Channel(format!("failed to flush events: {e}")))?;
    Ok(())
}
