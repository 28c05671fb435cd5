//! Shared test doubles for surface and relay tests.
//!
//! [`ScriptedPage`] plays back canned HTML snapshots and records every
//! action the adapter performs; [`StaticSurfaces`] is a directory whose
//! open pages are set by the test.

use crate::surface::{Page, PageError, PageResult, SurfaceDirectory, SurfaceKind};
use async_trait::async_trait;
use autobridge_dom::Locator;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// An action a [`ScriptedPage`] was asked to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageAction {
    Focus(Locator),
    Clear(Locator),
    Paste(String),
    InsertAtSelection(String),
    Click(Locator),
}

#[derive(Debug, Default)]
struct Script {
    before_submit: String,
    after_submit: VecDeque<String>,
    settled: Option<String>,
    submitted: bool,
    refuse_paste: bool,
    refuse_insert: bool,
    disconnect_after_submit: bool,
    actions: Vec<PageAction>,
}

/// A [`Page`] that replays scripted snapshots.
///
/// Before the submit click every snapshot is the composer page. After it,
/// queued snapshots are returned in order and the settled page repeats
/// once the queue is empty.
#[derive(Debug)]
pub struct ScriptedPage {
    kind: SurfaceKind,
    script: Mutex<Script>,
}

impl ScriptedPage {
    pub fn new(kind: SurfaceKind, composer_html: String) -> Self {
        Self {
            kind,
            script: Mutex::new(Script {
                before_submit: composer_html,
                ..Script::default()
            }),
        }
    }

    /// Snapshots returned after submit, in order.
    pub fn then_after_submit(self, snapshots: Vec<String>) -> Self {
        self.edit(|s| s.after_submit.extend(snapshots))
    }

    /// Snapshot repeated once the post-submit queue drains.
    pub fn settle_on(self, html: String) -> Self {
        self.edit(|s| s.settled = Some(html))
    }

    pub fn refusing_paste(self) -> Self {
        self.edit(|s| s.refuse_paste = true)
    }

    pub fn refusing_insert(self) -> Self {
        self.edit(|s| s.refuse_insert = true)
    }

    /// Every snapshot after the submit click fails with a disconnect.
    pub fn disconnect_after_submit(self) -> Self {
        self.edit(|s| s.disconnect_after_submit = true)
    }

    /// Actions performed so far.
    pub fn actions(&self) -> Vec<PageAction> {
        self.lock().actions.clone()
    }

    fn edit(self, f: impl FnOnce(&mut Script)) -> Self {
        f(&mut self.lock());
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        match self.script.lock() {
            Ok(s) => s,
            Err(p) => p.into_inner(),
        }
    }

    fn record(&self, action: PageAction) {
        self.lock().actions.push(action);
    }
}

#[async_trait]
impl Page for ScriptedPage {
    fn surface(&self) -> SurfaceKind {
        self.kind
    }

    async fn snapshot(&self) -> PageResult<String> {
        let mut script = self.lock();
        if !script.submitted {
            return Ok(script.before_submit.clone());
        }
        if script.disconnect_after_submit {
            return Err(PageError::Disconnected);
        }
        if let Some(next) = script.after_submit.pop_front() {
            return Ok(next);
        }
        Ok(script
            .settled
            .clone()
            .unwrap_or_else(|| script.before_submit.clone()))
    }

    async fn focus(&self, target: &Locator) -> PageResult<()> {
        self.record(PageAction::Focus(target.clone()));
        Ok(())
    }

    async fn clear(&self, target: &Locator) -> PageResult<()> {
        self.record(PageAction::Clear(target.clone()));
        Ok(())
    }

    async fn paste(&self, _target: &Locator, text: &str) -> PageResult<()> {
        if self.lock().refuse_paste {
            return Err(PageError::Rejected {
                op: "paste",
                reason: "DataTransfer unavailable".into(),
            });
        }
        self.record(PageAction::Paste(text.to_owned()));
        Ok(())
    }

    async fn insert_at_selection(&self, _target: &Locator, text: &str) -> PageResult<()> {
        if self.lock().refuse_insert {
            return Err(PageError::Rejected {
                op: "insert_at_selection",
                reason: "no selection range".into(),
            });
        }
        self.record(PageAction::InsertAtSelection(text.to_owned()));
        Ok(())
    }

    async fn click(&self, target: &Locator) -> PageResult<()> {
        let mut script = self.lock();
        script.actions.push(PageAction::Click(target.clone()));
        script.submitted = true;
        Ok(())
    }
}

/// A [`SurfaceDirectory`] whose open surfaces are set by the test.
#[derive(Default)]
pub struct StaticSurfaces {
    pages: Mutex<HashMap<SurfaceKind, Arc<dyn Page>>>,
    probes: AtomicUsize,
}

impl StaticSurfaces {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, page: Arc<dyn Page>) {
        let mut pages = match self.pages.lock() {
            Ok(p) => p,
            Err(p) => p.into_inner(),
        };
        pages.insert(page.surface(), page);
    }

    pub fn close(&self, kind: SurfaceKind) {
        let mut pages = match self.pages.lock() {
            Ok(p) => p,
            Err(p) => p.into_inner(),
        };
        pages.remove(&kind);
    }

    /// Number of presence probes answered so far.
    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SurfaceDirectory for StaticSurfaces {
    async fn page(&self, kind: SurfaceKind) -> Option<Arc<dyn Page>> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let pages = match self.pages.lock() {
            Ok(p) => p,
            Err(p) => p.into_inner(),
        };
        pages.get(&kind).cloned()
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// A claude.ai-like page: composer, send or stop button, and messages.
pub fn claude_page(generating: bool, messages: &[&str]) -> String {
    let mut html = String::from("<!DOCTYPE html><html><body><main>");
    html.push_str(r#"<div class="turn"><span data-testid="human-turn">question</span></div>"#);
    for message in messages {
        html.push_str(&format!(
            r#"<div data-testid="message-content">{}</div>"#,
            escape(message)
        ));
    }
    html.push_str(r#"<div contenteditable="true" class="ProseMirror"></div>"#);
    if generating {
        html.push_str(r#"<button aria-label="Stop response">■</button>"#);
    } else {
        html.push_str(r#"<button aria-label="Send message">↑</button>"#);
    }
    html.push_str("</main></body></html>");
    html
}

/// A gemini.google.com-like page.
pub fn gemini_page(generating: bool, messages: &[&str]) -> String {
    let mut html = String::from("<!DOCTYPE html><html><body><chat-window>");
    html.push_str(r#"<user-query><div data-is-human="true">question</div></user-query>"#);
    for message in messages {
        html.push_str(&format!(
            r#"<model-response><div class="response-content">{}</div></model-response>"#,
            escape(message)
        ));
    }
    html.push_str(r#"<rich-textarea><div contenteditable="true" role="textbox"></div></rich-textarea>"#);
    if generating {
        html.push_str(r#"<button aria-label="Stop generating">■</button>"#);
    } else {
        html.push_str(r#"<button aria-label="Send message">➤</button>"#);
    }
    html.push_str("</chat-window></body></html>");
    html
}
