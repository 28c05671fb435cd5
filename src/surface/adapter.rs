//! Request state machine shared by every surface.
//!
//! `Idle -> InputLocated -> TextInserted -> Submitted -> AwaitingCompletion
//! -> {Completed | Failed}`. Every failure is terminal for the request and
//! maps to exactly one [`FailureKind`].

use super::page::{Page, PageError};
use super::profile::SurfaceProfile;
use crate::config::AdapterConfig;
use crate::detector::{CompletionDetector, CompletionProbe, Observation, Outcome};
use crate::error::{BridgeError, Result};
use crate::failure::{Failure, FailureKind};
use async_trait::async_trait;
use autobridge_dom::{Document, Locator, LookupChain};
use std::time::Duration;

/// Where a request is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterStage {
    Idle,
    InputLocated,
    TextInserted,
    Submitted,
    AwaitingCompletion,
    Completed,
    Failed,
}

/// Drives one chunk through a surface.
#[derive(Debug, Clone)]
pub struct SurfaceAdapter {
    profile: SurfaceProfile,
    config: AdapterConfig,
    detector: CompletionDetector,
}

impl SurfaceAdapter {
    #[must_use]
    pub fn new(profile: SurfaceProfile, config: AdapterConfig, detector: CompletionDetector) -> Self {
        Self {
            profile,
            config,
            detector,
        }
    }

    /// Insert `text`, submit it and wait for the answer.
    ///
    /// Returns the extracted response text, or the failure that ended the
    /// request. Nothing is retried.
    pub async fn process(
        &self,
        page: &dyn Page,
        request_id: &str,
        text: &str,
    ) -> std::result::Result<String, Failure> {
        let mut run = Run {
            adapter: self,
            request_id,
            stage: AdapterStage::Idle,
        };
        match run.drive(page, text).await {
            Ok(answer) => {
                run.enter(AdapterStage::Completed);
                Ok(answer)
            }
            Err(kind) => {
                tracing::warn!(
                    request_id,
                    surface = %self.profile.kind,
                    stage = ?run.stage,
                    failure = kind.as_str(),
                    "surface request failed"
                );
                run.enter(AdapterStage::Failed);
                Err(Failure::on(self.profile.kind, kind))
            }
        }
    }

    fn pause(ms: u64) -> tokio::time::Sleep {
        tokio::time::sleep(Duration::from_millis(ms))
    }
}

struct Run<'a> {
    adapter: &'a SurfaceAdapter,
    request_id: &'a str,
    stage: AdapterStage,
}

impl Run<'_> {
    fn enter(&mut self, stage: AdapterStage) {
        tracing::debug!(
            request_id = self.request_id,
            surface = %self.adapter.profile.kind,
            from = ?self.stage,
            to = ?stage,
            "adapter stage"
        );
        self.stage = stage;
    }

    async fn drive(&mut self, page: &dyn Page, text: &str) -> std::result::Result<String, FailureKind> {
        let profile = &self.adapter.profile;
        let config = &self.adapter.config;
        let text = profile.normalization.apply(text);

        let html = page.snapshot().await.map_err(|e| lost(&e))?;
        let input = locate(&html, &profile.input).ok_or(FailureKind::InputNotFound)?;
        self.enter(AdapterStage::InputLocated);

        soft(page.focus(&input).await, "focus")?;
        SurfaceAdapter::pause(config.focus_delay_ms).await;
        soft(page.clear(&input).await, "clear")?;
        SurfaceAdapter::pause(config.clear_delay_ms).await;

        self.insert(page, &input, &text).await?;
        self.enter(AdapterStage::TextInserted);
        SurfaceAdapter::pause(config.settle_delay_ms).await;

        let html = page.snapshot().await.map_err(|e| lost(&e))?;
        let submit = locate(&html, &profile.submit).ok_or(FailureKind::SubmitNotFound)?;
        page.click(&submit).await.map_err(|e| {
            if e.is_connection_loss() {
                FailureKind::SurfaceLost
            } else {
                FailureKind::SubmitNotFound
            }
        })?;
        self.enter(AdapterStage::Submitted);

        self.enter(AdapterStage::AwaitingCompletion);
        let mut probe = SnapshotProbe { page, profile };
        let completion = match self.adapter.detector.watch(&mut probe).await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(request_id = self.request_id, error = %e, "completion probe failed");
                return Err(FailureKind::SurfaceLost);
            }
        };

        let answer = completion.last_message.unwrap_or_default();
        let plausible = answer.chars().count() >= config.min_response_chars;
        match (completion.outcome, plausible) {
            (_, true) => {
                if completion.outcome == Outcome::TimedOut {
                    tracing::warn!(
                        request_id = self.request_id,
                        chars = answer.chars().count(),
                        "hard timeout; delivering last observed response"
                    );
                }
                Ok(answer)
            }
            (Outcome::Settled, false) => Err(FailureKind::EmptyOrTooShortResponse),
            (Outcome::TimedOut, false) => Err(FailureKind::Timeout),
        }
    }

    /// Paste first; splice into the selection if the paste is refused.
    async fn insert(
        &self,
        page: &dyn Page,
        input: &Locator,
        text: &str,
    ) -> std::result::Result<(), FailureKind> {
        let paste_err = match page.paste(input, text).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_connection_loss() => return Err(FailureKind::SurfaceLost),
            Err(e) => e,
        };
        tracing::debug!(
            request_id = self.request_id,
            error = %paste_err,
            "paste refused; falling back to selection insert"
        );
        match page.insert_at_selection(input, text).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_connection_loss() => Err(FailureKind::SurfaceLost),
            Err(e) => {
                tracing::debug!(request_id = self.request_id, error = %e, "selection insert refused");
                Err(FailureKind::InsertionFailed)
            }
        }
    }
}

/// Tolerate a refused preparatory action; only a lost page ends the request.
fn soft(result: std::result::Result<(), PageError>, op: &str) -> std::result::Result<(), FailureKind> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_connection_loss() => Err(FailureKind::SurfaceLost),
        Err(e) => {
            tracing::debug!(op, error = %e, "page action refused; continuing");
            Ok(())
        }
    }
}

fn lost(err: &PageError) -> FailureKind {
    tracing::debug!(error = %err, "snapshot failed");
    FailureKind::SurfaceLost
}

fn locate(html: &str, chain: &LookupChain) -> Option<Locator> {
    match Document::parse(html).locate(chain) {
        Ok(found) => found,
        Err(e) => {
            tracing::error!(chain = chain.name(), error = %e, "lookup chain is broken");
            None
        }
    }
}

/// Reads the stop indicator and last message from a fresh snapshot.
pub(crate) fn observe(html: &str, profile: &SurfaceProfile) -> Result<Observation> {
    let doc = Document::parse(html);
    Ok(Observation {
        indicator_present: doc.is_present(&profile.stop_indicator)?,
        last_message: doc.last_text(&profile.messages)?,
    })
}

struct SnapshotProbe<'a> {
    page: &'a dyn Page,
    profile: &'a SurfaceProfile,
}

#[async_trait]
impl CompletionProbe for SnapshotProbe<'_> {
    async fn probe(&mut self) -> Result<Observation> {
        let html = self.page.snapshot().await.map_err(BridgeError::from)?;
        observe(&html, self.profile)
    }
}
