//! Switchboard task and its client handle.

use super::ConcurrencyPolicy;
use super::contract::{Delivery, OriginEvent, ProcessChunk, RelayInbound, SendChunk, TargetStatus};
use crate::config::BridgeConfig;
use crate::detector::CompletionDetector;
use crate::error::{BridgeError, Result};
use crate::failure::{Failure, FailureKind};
use crate::locale::Locale;
use crate::store::{Carried, OverflowPolicy, PayloadStore, RESULT_NAMESPACE};
use crate::surface::{Page, SurfaceAdapter, SurfaceDirectory, SurfaceKind, SurfaceProfile};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};

/// Cloneable client for the switchboard.
#[derive(Clone)]
pub struct RelayHandle {
    inbox: mpsc::Sender<RelayInbound>,
    events: broadcast::Sender<Delivery>,
    store: Arc<dyn PayloadStore>,
}

impl RelayHandle {
    /// Live probe: is any surface open, and which one would get a chunk.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Channel`] if the switchboard has stopped.
    pub async fn check_target_open(&self) -> Result<TargetStatus> {
        let (reply, reply_rx) = oneshot::channel();
        self.send(RelayInbound::CheckTargetOpen { reply }).await?;
        reply_rx
            .await
            .map_err(|e| BridgeError::Channel(format!("target status reply dropped: {e}")))
    }

    /// Submit a chunk. The answer arrives later as a [`Delivery`].
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Channel`] if the switchboard has stopped.
    pub async fn send_chunk(&self, chunk: SendChunk) -> Result<()> {
        self.send(RelayInbound::SendChunk(chunk)).await
    }

    /// Report a surface's response for `request_id`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Channel`] if the switchboard has stopped.
    pub async fn deliver_result(
        &self,
        request_id: impl Into<String>,
        payload: impl Into<String>,
    ) -> Result<()> {
        self.send(RelayInbound::Result {
            request_id: request_id.into(),
            payload: payload.into(),
        })
        .await
    }

    /// Report a localized failure for `request_id`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Channel`] if the switchboard has stopped.
    pub async fn deliver_error(
        &self,
        request_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<()> {
        self.send(RelayInbound::Error {
            request_id: request_id.into(),
            message: message.into(),
            kind: None,
        })
        .await
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Delivery> {
        self.events.subscribe()
    }

    /// The store staged payloads live in.
    #[must_use]
    pub fn store(&self) -> Arc<dyn PayloadStore> {
        Arc::clone(&self.store)
    }

    async fn send(&self, message: RelayInbound) -> Result<()> {
        self.inbox
            .send(message)
            .await
            .map_err(|e| BridgeError::Channel(format!("relay inbox closed: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Origin {
    id: String,
    locale: Locale,
}

#[derive(Debug)]
struct InFlight {
    request_id: String,
    surface: SurfaceKind,
}

/// The relay task. Owns all routing state; run it with [`Switchboard::run`].
pub struct Switchboard {
    inbox: mpsc::Receiver<RelayInbound>,
    reports: mpsc::WeakSender<RelayInbound>,
    events: broadcast::Sender<Delivery>,
    store: Arc<dyn PayloadStore>,
    directory: Arc<dyn SurfaceDirectory>,
    adapters: HashMap<SurfaceKind, Arc<SurfaceAdapter>>,
    overflow: OverflowPolicy,
    surface_order: Vec<SurfaceKind>,
    concurrency: ConcurrencyPolicy,
    default_locale: Locale,
    origin: Option<Origin>,
    in_flight: Option<InFlight>,
    /// Origin id that sent each dispatched request still awaiting a report.
    routes: HashMap<String, String>,
}

/// Build a connected handle/switchboard pair.
#[must_use]
pub fn relay_channel(
    config: &BridgeConfig,
    store: Arc<dyn PayloadStore>,
    directory: Arc<dyn SurfaceDirectory>,
) -> (RelayHandle, Switchboard) {
    let relay = &config.relay;
    let (inbox_tx, inbox_rx) = mpsc::channel(relay.request_capacity.max(1));
    let (events, _) = broadcast::channel(relay.event_capacity.max(1));

    let detector = CompletionDetector::from_config(&config.detector);
    let adapters = [SurfaceKind::Claude, SurfaceKind::Gemini]
        .into_iter()
        .map(|kind| {
            let adapter = SurfaceAdapter::new(
                SurfaceProfile::for_kind(kind),
                config.adapter.clone(),
                detector.clone(),
            );
            (kind, Arc::new(adapter))
        })
        .collect();

    let switchboard = Switchboard {
        inbox: inbox_rx,
        reports: inbox_tx.downgrade(),
        events: events.clone(),
        store: Arc::clone(&store),
        directory,
        adapters,
        overflow: OverflowPolicy::new(relay.overflow_threshold_bytes),
        surface_order: relay.surface_order.clone(),
        concurrency: relay.concurrency,
        default_locale: relay.default_locale,
        origin: None,
        in_flight: None,
        routes: HashMap::new(),
    };
    let handle = RelayHandle {
        inbox: inbox_tx,
        events,
        store,
    };
    (handle, switchboard)
}

impl Switchboard {
    /// Process inbound messages until every [`RelayHandle`] is dropped.
    ///
    /// Surface work already running when the last handle goes away is
    /// abandoned; its outcome has nowhere to go.
    pub async fn run(mut self) {
        while let Some(message) = self.inbox.recv().await {
            self.route(message).await;
        }
        tracing::info!("relay inbox closed; switchboard stopping");
    }

    async fn route(&mut self, message: RelayInbound) {
        match message {
            RelayInbound::CheckTargetOpen { reply } => {
                let status = match self.select_target().await {
                    Some((kind, _)) => TargetStatus {
                        open: true,
                        surface: Some(kind),
                    },
                    None => TargetStatus {
                        open: false,
                        surface: None,
                    },
                };
                let _ = reply.send(status);
            }
            RelayInbound::SendChunk(chunk) => self.handle_send_chunk(chunk).await,
            RelayInbound::Result {
                request_id,
                payload,
            } => self.deliver_result(request_id, payload).await,
            RelayInbound::Error {
                request_id,
                message,
                kind,
            } => self.deliver_error(request_id, message, kind),
        }
    }

    /// First open surface in preference order. Never cached.
    async fn select_target(&self) -> Option<(SurfaceKind, Arc<dyn Page>)> {
        for kind in &self.surface_order {
            if let Some(page) = self.directory.page(*kind).await {
                return Some((*kind, page));
            }
        }
        None
    }

    fn register_origin(&mut self, id: &str, locale: Locale) {
        let origin = Origin {
            id: id.to_owned(),
            locale,
        };
        match &self.origin {
            Some(current) if *current == origin => {}
            Some(current) => {
                tracing::debug!(previous = %current.id, origin = %id, "origin replaced");
                self.origin = Some(origin);
            }
            None => {
                tracing::debug!(origin = %id, "origin registered");
                self.origin = Some(origin);
            }
        }
    }

    async fn handle_send_chunk(&mut self, chunk: SendChunk) {
        let SendChunk {
            origin,
            locale,
            request_id,
            payload,
        } = chunk;
        let locale = locale.unwrap_or(self.default_locale);

        if let Some(busy) = &self.in_flight {
            match self.concurrency {
                ConcurrencyPolicy::Reject => {
                    tracing::info!(
                        request_id = %request_id,
                        in_flight = %busy.request_id,
                        "chunk rejected; another request is in flight"
                    );
                    let failure = Failure::relay(FailureKind::Busy);
                    self.publish(
                        origin,
                        OriginEvent::Error {
                            request_id,
                            message: failure.message(locale),
                            kind: Some(FailureKind::Busy),
                        },
                    );
                    // The staged chunk will never be read otherwise.
                    if let Carried::Staged(key) = payload {
                        let _ = self.store.take(&key).await;
                    }
                    return;
                }
                ConcurrencyPolicy::Overwrite => {
                    tracing::debug!(
                        request_id = %request_id,
                        in_flight = %busy.request_id,
                        surface = %busy.surface,
                        "chunk overwrites in-flight routing"
                    );
                }
            }
        }

        self.register_origin(&origin, locale);

        let text = match payload.resolve(self.store.as_ref()).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "staged chunk unreadable; resolving to empty");
                String::new()
            }
        };

        let Some((kind, page)) = self.select_target().await else {
            tracing::info!(request_id = %request_id, "no surface open");
            let failure = Failure::relay(FailureKind::TargetUnavailable);
            self.deliver_error(
                request_id,
                failure.message(locale),
                Some(FailureKind::TargetUnavailable),
            );
            return;
        };

        let Some(adapter) = self.adapters.get(&kind).cloned() else {
            tracing::error!(request_id = %request_id, surface = %kind, "no adapter configured for surface");
            let failure = Failure::on(kind, FailureKind::TargetUnavailable);
            self.deliver_error(
                request_id,
                failure.message(locale),
                Some(FailureKind::TargetUnavailable),
            );
            return;
        };

        tracing::info!(
            request_id = %request_id,
            surface = %kind,
            chars = text.chars().count(),
            "dispatching chunk"
        );
        self.in_flight = Some(InFlight {
            request_id: request_id.clone(),
            surface: kind,
        });
        self.routes.insert(request_id.clone(), origin);
        self.spawn_process(
            adapter,
            page,
            ProcessChunk {
                request_id,
                payload: text,
                locale,
            },
        );
    }

    fn spawn_process(&self, adapter: Arc<SurfaceAdapter>, page: Arc<dyn Page>, chunk: ProcessChunk) {
        let reports = self.reports.clone();
        tokio::spawn(async move {
            let ProcessChunk {
                request_id,
                payload,
                locale,
            } = chunk;
            let report = match adapter.process(page.as_ref(), &request_id, &payload).await {
                Ok(answer) => RelayInbound::Result {
                    request_id,
                    payload: answer,
                },
                Err(failure) => RelayInbound::Error {
                    request_id,
                    message: failure.message(locale),
                    kind: Some(failure.kind),
                },
            };
            match reports.upgrade() {
                Some(tx) => {
                    let _ = tx.send(report).await;
                }
                None => tracing::debug!("relay gone; dropping surface report"),
            }
        });
    }

    /// Clear the in-flight slot if it belongs to `request_id` and return the
    /// origin the report goes to: the dispatching origin, else the current one.
    fn settle(&mut self, request_id: &str) -> Option<String> {
        if self
            .in_flight
            .as_ref()
            .is_some_and(|f| f.request_id == request_id)
        {
            self.in_flight = None;
        }
        self.routes
            .remove(request_id)
            .or_else(|| self.origin.as_ref().map(|o| o.id.clone()))
    }

    async fn deliver_result(&mut self, request_id: String, payload: String) {
        let Some(origin) = self.settle(&request_id) else {
            tracing::debug!(request_id = %request_id, "result with no origin; dropped");
            return;
        };

        let bytes = payload.len();
        let carried = match self
            .overflow
            .pack(self.store.as_ref(), RESULT_NAMESPACE, payload.clone())
            .await
        {
            Ok(carried) => carried,
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "staging result failed; sending inline");
                Carried::Inline(payload)
            }
        };
        tracing::info!(
            request_id = %request_id,
            bytes,
            staged = carried.is_staged(),
            "result delivered"
        );
        self.publish(
            origin,
            OriginEvent::ResultDelivered {
                request_id,
                payload: carried,
            },
        );
    }

    fn deliver_error(&mut self, request_id: String, message: String, kind: Option<FailureKind>) {
        let Some(origin) = self.settle(&request_id) else {
            tracing::debug!(request_id = %request_id, "error with no origin; dropped");
            return;
        };
        self.publish(
            origin,
            OriginEvent::Error {
                request_id,
                message,
                kind,
            },
        );
    }

    fn publish(&self, origin: String, event: OriginEvent) {
        if self.events.send(Delivery { origin, event }).is_err() {
            tracing::debug!("no origin listening; delivery dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryPayloadStore, PAYLOAD_NAMESPACE};
    use crate::test_utils::{ScriptedPage, StaticSurfaces, claude_page, gemini_page};
    use std::time::Duration;

    fn fast_config() -> BridgeConfig {
        let mut config = BridgeConfig::default();
        config.detector.poll_interval_ms = 1;
        config.detector.hard_timeout_secs = 5;
        config.adapter.focus_delay_ms = 0;
        config.adapter.clear_delay_ms = 0;
        config.adapter.settle_delay_ms = 0;
        config
    }

    fn start(
        config: &BridgeConfig,
        surfaces: Arc<StaticSurfaces>,
    ) -> (RelayHandle, broadcast::Receiver<Delivery>, Arc<MemoryPayloadStore>) {
        let store = Arc::new(MemoryPayloadStore::new());
        let (handle, switchboard) = relay_channel(config, store.clone(), surfaces);
        let rx = handle.subscribe();
        tokio::spawn(switchboard.run());
        (handle, rx, store)
    }

    async fn next(rx: &mut broadcast::Receiver<Delivery>) -> Delivery {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("delivery within deadline")
            .expect("delivery channel open")
    }

    fn chunk(origin: &str, request_id: &str, payload: Carried) -> SendChunk {
        SendChunk {
            origin: origin.into(),
            locale: None,
            request_id: request_id.into(),
            payload,
        }
    }

    #[tokio::test]
    async fn no_surface_yields_one_target_unavailable() {
        let surfaces = Arc::new(StaticSurfaces::new());
        let (handle, mut rx, _) = start(&fast_config(), surfaces);

        handle
            .send_chunk(chunk("app", "r1", Carried::Inline("Hello".into())))
            .await
            .expect("send in test");

        let delivery = next(&mut rx).await;
        assert_eq!(delivery.origin, "app");
        assert_eq!(
            delivery.event,
            OriginEvent::Error {
                request_id: "r1".into(),
                message: "נא לפתוח את Claude.ai או Gemini בטאב נפרד".into(),
                kind: Some(FailureKind::TargetUnavailable),
            }
        );
        assert!(
            tokio::time::timeout(Duration::from_millis(50), rx.recv())
                .await
                .is_err(),
            "exactly one delivery expected"
        );
    }

    #[tokio::test]
    async fn check_target_open_prefers_claude_and_is_live() {
        let surfaces = Arc::new(StaticSurfaces::new());
        let (handle, _rx, _) = start(&fast_config(), Arc::clone(&surfaces));

        let closed = handle.check_target_open().await.expect("status in test");
        assert_eq!(closed, TargetStatus { open: false, surface: None });

        surfaces.open(Arc::new(ScriptedPage::new(SurfaceKind::Gemini, gemini_page(false, &[]))));
        let status = handle.check_target_open().await.expect("status in test");
        assert_eq!(status.surface, Some(SurfaceKind::Gemini));

        surfaces.open(Arc::new(ScriptedPage::new(SurfaceKind::Claude, claude_page(false, &[]))));
        let status = handle.check_target_open().await.expect("status in test");
        assert_eq!(status.surface, Some(SurfaceKind::Claude));

        surfaces.close(SurfaceKind::Claude);
        surfaces.close(SurfaceKind::Gemini);
        let status = handle.check_target_open().await.expect("status in test");
        assert!(!status.open);
    }

    #[tokio::test]
    async fn staged_chunk_is_consumed_and_long_result_staged() {
        let answer = "r".repeat(5000);
        let surfaces = Arc::new(StaticSurfaces::new());
        let page = Arc::new(
            ScriptedPage::new(SurfaceKind::Claude, claude_page(false, &[]))
                .settle_on(claude_page(false, &[answer.as_str()])),
        );
        surfaces.open(page.clone());
        let (handle, mut rx, store) = start(&fast_config(), surfaces);

        let outbound = "q".repeat(3000);
        let key = store
            .stage(PAYLOAD_NAMESPACE, outbound.clone())
            .await
            .expect("stage in test");
        handle
            .send_chunk(chunk("app", "r2", Carried::Staged(key)))
            .await
            .expect("send in test");

        let delivery = next(&mut rx).await;
        let OriginEvent::ResultDelivered { request_id, payload } = delivery.event else {
            panic!("expected result, got {:?}", delivery.event);
        };
        assert_eq!(request_id, "r2");
        assert!(payload.is_staged());
        let restored = payload.resolve(store.as_ref()).await.expect("resolve in test");
        assert_eq!(restored, answer);
        assert!(store.is_empty());
        assert!(page.actions().contains(&crate::test_utils::PageAction::Paste(outbound)));
    }

    #[tokio::test]
    async fn external_result_without_origin_is_dropped() {
        let surfaces = Arc::new(StaticSurfaces::new());
        let (handle, mut rx, _) = start(&fast_config(), surfaces);
        handle
            .deliver_result("orphan", "some text")
            .await
            .expect("deliver in test");
        handle
            .deliver_error("orphan", "some error")
            .await
            .expect("deliver in test");
        assert!(
            tokio::time::timeout(Duration::from_millis(50), rx.recv())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn reject_policy_answers_busy_without_dispatch() {
        let mut config = fast_config();
        config.relay.concurrency = ConcurrencyPolicy::Reject;
        config.relay.default_locale = Locale::En;
        let surfaces = Arc::new(StaticSurfaces::new());
        // Indicator never clears, so the first request stays in flight.
        let page = Arc::new(
            ScriptedPage::new(SurfaceKind::Claude, claude_page(false, &[]))
                .settle_on(claude_page(true, &[])),
        );
        surfaces.open(page.clone());
        let (handle, mut rx, _) = start(&config, surfaces);

        handle
            .send_chunk(chunk("app-a", "first", Carried::Inline("one".into())))
            .await
            .expect("send in test");
        handle
            .send_chunk(chunk("app-b", "second", Carried::Inline("two".into())))
            .await
            .expect("send in test");

        let delivery = next(&mut rx).await;
        assert_eq!(delivery.origin, "app-b");
        let OriginEvent::Error { request_id, kind, message } = delivery.event else {
            panic!("expected busy error");
        };
        assert_eq!(request_id, "second");
        assert_eq!(kind, Some(FailureKind::Busy));
        assert!(message.starts_with("A previous request"));

        tokio::time::sleep(Duration::from_millis(20)).await;
        let pastes = page
            .actions()
            .into_iter()
            .filter(|a| matches!(a, crate::test_utils::PageAction::Paste(_)))
            .count();
        assert_eq!(pastes, 1);
    }

    fn drain(rx: &mut broadcast::Receiver<Delivery>) -> Vec<(String, String)> {
        let mut seen = Vec::new();
        while let Ok(delivery) = rx.try_recv() {
            let request_id = delivery.event.request_id().to_owned();
            seen.push((delivery.origin, request_id));
        }
        seen
    }

    #[tokio::test]
    async fn surface_without_adapter_answers_target_unavailable() {
        let surfaces = Arc::new(StaticSurfaces::new());
        surfaces.open(Arc::new(ScriptedPage::new(SurfaceKind::Gemini, gemini_page(false, &[]))));
        let store = Arc::new(MemoryPayloadStore::new());
        let (handle, mut switchboard) = relay_channel(&fast_config(), store, surfaces);
        let mut rx = handle.subscribe();
        switchboard.adapters.remove(&SurfaceKind::Gemini);

        switchboard
            .route(RelayInbound::SendChunk(chunk("app", "r1", Carried::Inline("Hello".into()))))
            .await;

        let delivery = rx.try_recv().expect("one delivery in test");
        assert_eq!(delivery.origin, "app");
        assert_eq!(
            delivery.event,
            OriginEvent::Error {
                request_id: "r1".into(),
                message: "נא לפתוח את Claude.ai או Gemini בטאב נפרד".into(),
                kind: Some(FailureKind::TargetUnavailable),
            }
        );
        assert!(switchboard.in_flight.is_none());
        assert!(drain(&mut rx).is_empty(), "exactly one delivery expected");
    }

    #[tokio::test]
    async fn overwrite_keeps_each_report_with_its_own_origin() {
        let surfaces = Arc::new(StaticSurfaces::new());
        // Indicator never clears, so neither run reports on its own.
        surfaces.open(Arc::new(
            ScriptedPage::new(SurfaceKind::Claude, claude_page(false, &[]))
                .settle_on(claude_page(true, &[])),
        ));
        let store = Arc::new(MemoryPayloadStore::new());
        let (handle, mut switchboard) = relay_channel(&fast_config(), store, surfaces);
        let mut rx = handle.subscribe();

        switchboard
            .route(RelayInbound::SendChunk(chunk("app-a", "first", Carried::Inline("one".into()))))
            .await;
        switchboard
            .route(RelayInbound::SendChunk(chunk("app-b", "second", Carried::Inline("two".into()))))
            .await;
        assert_eq!(
            switchboard.in_flight.as_ref().map(|f| f.request_id.as_str()),
            Some("second")
        );

        // The first run finishes late.
        switchboard
            .route(RelayInbound::Result {
                request_id: "first".into(),
                payload: "answer one".into(),
            })
            .await;
        assert_eq!(
            switchboard.in_flight.as_ref().map(|f| f.request_id.as_str()),
            Some("second"),
            "a late report must not clear the newer request"
        );

        switchboard
            .route(RelayInbound::Error {
                request_id: "second".into(),
                message: "timed out".into(),
                kind: Some(FailureKind::Timeout),
            })
            .await;
        assert!(switchboard.in_flight.is_none());

        assert_eq!(
            drain(&mut rx),
            vec![
                ("app-a".to_owned(), "first".to_owned()),
                ("app-b".to_owned(), "second".to_owned()),
            ]
        );
    }
}
