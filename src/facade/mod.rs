//! App-side client of the relay.
//!
//! [`AppFacade`] is one origin: it packs outbound text through the overflow
//! policy, sends it with a fresh request id and waits for the reply that
//! carries the same id. Transcript runs chunk the text and send the chunks
//! one at a time. [`stdio`] exposes the facade as a JSON line protocol.

pub mod stdio;

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::failure::FailureKind;
use crate::locale::Locale;
use crate::relay::{Delivery, OriginEvent, RelayHandle, SendChunk, TargetStatus};
use crate::settings::AppSettings;
use crate::store::{OverflowPolicy, PAYLOAD_NAMESPACE};
use crate::text::{chunk_text, preprocess_transcript};
use std::time::Duration;
use tokio::sync::broadcast;

/// The relay's answer to one request, resolved to plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppReply {
    Response {
        request_id: String,
        text: String,
    },
    Failed {
        request_id: String,
        message: String,
        kind: Option<FailureKind>,
    },
}

impl AppReply {
    #[must_use]
    pub fn request_id(&self) -> &str {
        match self {
            Self::Response { request_id, .. } | Self::Failed { request_id, .. } => request_id,
        }
    }
}

/// How a transcript run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptOutcome {
    /// Nothing to send after trimming.
    Empty,
    /// Every chunk got a response, in chunk order.
    Completed {
        first_chunk: String,
        responses: Vec<String>,
    },
    /// Chunk `chunk_index` failed; later chunks were not sent.
    Failed {
        chunk_index: usize,
        chunk_count: usize,
        message: String,
        kind: Option<FailureKind>,
    },
}

/// One origin's view of the relay.
pub struct AppFacade {
    relay: RelayHandle,
    origin: String,
    locale: Option<Locale>,
    overflow: OverflowPolicy,
    events: broadcast::Receiver<Delivery>,
    request_timeout: Duration,
}

impl AppFacade {
    /// Subscribe to `relay` as the configured app origin.
    #[must_use]
    pub fn new(relay: RelayHandle, config: &BridgeConfig) -> Self {
        let events = relay.subscribe();
        Self {
            relay,
            origin: config.app.origin_id.clone(),
            locale: None,
            overflow: OverflowPolicy::new(config.relay.overflow_threshold_bytes),
            events,
            request_timeout: config.app.request_timeout(),
        }
    }

    /// Ask for failure messages in `locale` instead of the relay default.
    #[must_use]
    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = Some(locale);
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Locale used for app-side messages.
    #[must_use]
    pub fn locale(&self) -> Locale {
        self.locale.unwrap_or_default()
    }

    /// Live probe for an open surface.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Channel`] if the relay has stopped.
    pub async fn check_target_open(&self) -> Result<TargetStatus> {
        self.relay.check_target_open().await
    }

    /// Pack `text` and send it under `request_id` without waiting.
    ///
    /// # Errors
    ///
    /// Returns the store's error if staging fails, or
    /// [`BridgeError::Channel`] if the relay has stopped.
    pub async fn send_chunk(&self, request_id: &str, text: String) -> Result<()> {
        let store = self.relay.store();
        let payload = self
            .overflow
            .pack(store.as_ref(), PAYLOAD_NAMESPACE, text)
            .await?;
        tracing::debug!(
            request_id,
            staged = payload.is_staged(),
            "sending chunk to relay"
        );
        self.relay
            .send_chunk(SendChunk {
                origin: self.origin.clone(),
                locale: self.locale,
                request_id: request_id.to_owned(),
                payload,
            })
            .await
    }

    /// Next reply addressed to this origin, with staged payloads resolved.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Channel`] if the relay's event channel closed,
    /// or the store's error if a staged result cannot be read.
    pub async fn next_event(&mut self) -> Result<AppReply> {
        loop {
            let delivery = match self.events.recv().await {
                Ok(d) => d,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, origin = %self.origin, "facade lagged; replies were dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(BridgeError::Channel("relay event channel closed".into()));
                }
            };
            if delivery.origin != self.origin {
                continue;
            }
            return match delivery.event {
                OriginEvent::ResultDelivered {
                    request_id,
                    payload,
                } => {
                    let store = self.relay.store();
                    let text = OverflowPolicy::unpack(store.as_ref(), payload).await?;
                    Ok(AppReply::Response { request_id, text })
                }
                OriginEvent::Error {
                    request_id,
                    message,
                    kind,
                } => Ok(AppReply::Failed {
                    request_id,
                    message,
                    kind,
                }),
            };
        }
    }

    /// Send `text` and wait for its reply.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Timeout`] if no matching reply arrives within
    /// the request timeout, plus any error from [`send_chunk`](Self::send_chunk)
    /// or [`next_event`](Self::next_event).
    pub async fn request(&mut self, text: String) -> Result<AppReply> {
        let request_id = uuid::Uuid::new_v4().to_string();
        self.request_with_id(request_id, text).await
    }

    /// [`request`](Self::request) with a caller-chosen id.
    ///
    /// # Errors
    ///
    /// Same as [`request`](Self::request).
    pub async fn request_with_id(&mut self, request_id: String, text: String) -> Result<AppReply> {
        self.send_chunk(&request_id, text).await?;
        let deadline = self.request_timeout;
        let wait = async {
            loop {
                let reply = self.next_event().await?;
                if reply.request_id() == request_id {
                    return Ok::<_, BridgeError>(reply);
                }
                tracing::debug!(
                    expected = %request_id,
                    got = %reply.request_id(),
                    "skipping reply for another request"
                );
            }
        };
        match tokio::time::timeout(deadline, wait).await {
            Ok(result) => result,
            Err(_) => Err(BridgeError::Timeout(format!(
                "no reply for {request_id} within {}s",
                deadline.as_secs()
            ))),
        }
    }

    /// Clean, chunk and send a transcript, one chunk at a time.
    ///
    /// Stops at the first failed chunk.
    ///
    /// # Errors
    ///
    /// Returns infrastructure errors from [`request`](Self::request).
    pub async fn process_transcript(
        &mut self,
        text: &str,
        settings: &AppSettings,
    ) -> Result<TranscriptOutcome> {
        if text.trim().is_empty() {
            return Ok(TranscriptOutcome::Empty);
        }
        let cleaned = if settings.preprocess_enabled {
            preprocess_transcript(text)
        } else {
            text.to_owned()
        };
        let chunks = chunk_text(&cleaned, settings.chunk_size, settings.overlap);
        let chunk_count = chunks.len();
        tracing::info!(
            chunk_count,
            chars = cleaned.chars().count(),
            model = %settings.model,
            "processing transcript"
        );

        let mut responses = Vec::with_capacity(chunk_count);
        let mut first_chunk = None;
        for (chunk_index, chunk) in chunks.into_iter().enumerate() {
            if first_chunk.is_none() {
                first_chunk = Some(chunk.clone());
            }
            match self.request(chunk).await? {
                AppReply::Response { text, .. } => responses.push(text),
                AppReply::Failed { message, kind, .. } => {
                    tracing::warn!(chunk_index, chunk_count, ?kind, "transcript chunk failed");
                    return Ok(TranscriptOutcome::Failed {
                        chunk_index,
                        chunk_count,
                        message,
                        kind,
                    });
                }
            }
        }
        Ok(TranscriptOutcome::Completed {
            first_chunk: first_chunk.unwrap_or_default(),
            responses,
        })
    }
}
