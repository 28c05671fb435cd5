//! Per-provider selector profiles.
//!
//! A profile is data: four ordered lookup chains and a normalization
//! choice. The adapter state machine is the same for every provider.

use super::SurfaceKind;
use super::normalize::Normalization;
use autobridge_dom::{LookupChain, Strategy};

/// Minimum text for generic message strategies (`innerText.trim().length > 10`).
const GENERIC_MESSAGE_MIN_CHARS: usize = 11;

/// Containers holding the user's own turns on Gemini.
const GEMINI_HUMAN_CONTAINERS: &[&str] = &["[data-is-human=\"true\"]", ".human-turn"];

/// Selector profile for one provider.
#[derive(Debug, Clone)]
pub struct SurfaceProfile {
    pub kind: SurfaceKind,
    /// Prompt input control.
    pub input: LookupChain,
    /// Submit control; disabled matches are skipped.
    pub submit: LookupChain,
    /// Generation-in-progress indicator.
    pub stop_indicator: LookupChain,
    /// Assistant message bodies; the last match is the latest answer.
    pub messages: LookupChain,
    /// Applied to the chunk before insertion.
    pub normalization: Normalization,
}

impl SurfaceProfile {
    #[must_use]
    pub fn for_kind(kind: SurfaceKind) -> Self {
        match kind {
            SurfaceKind::Claude => Self::claude(),
            SurfaceKind::Gemini => Self::gemini(),
        }
    }

    /// claude.ai (ProseMirror composer).
    #[must_use]
    pub fn claude() -> Self {
        Self {
            kind: SurfaceKind::Claude,
            input: LookupChain::new(
                "claude.input",
                [
                    Strategy::css("div[contenteditable=\"true\"].ProseMirror"),
                    Strategy::css("[data-testid=\"composer-input\"]"),
                    Strategy::css("div[contenteditable=\"true\"][class*=\"composer\"]"),
                    Strategy::css("div[contenteditable=\"true\"]"),
                ],
            ),
            submit: LookupChain::new(
                "claude.submit",
                [
                    Strategy::css("button[aria-label=\"Send message\"]").enabled_only(),
                    Strategy::css("button[aria-label*=\"Send\"]").enabled_only(),
                    Strategy::css("button[aria-label*=\"שליחה\"]").enabled_only(),
                    Strategy::css("button[data-testid=\"send-button\"]").enabled_only(),
                    Strategy::css("button[type=\"submit\"]").enabled_only(),
                ],
            ),
            stop_indicator: LookupChain::new(
                "claude.stop",
                [
                    Strategy::css("button[aria-label*=\"Stop\"]"),
                    Strategy::css("button[aria-label*=\"עצור\"]"),
                    Strategy::css("[data-testid=\"stop-button\"]"),
                ],
            ),
            messages: LookupChain::new(
                "claude.messages",
                [
                    Strategy::css("[data-testid=\"message-content\"]"),
                    Strategy::css(".font-claude-message"),
                    Strategy::css("[class*=\"message\"]")
                        .excluding_containing("[data-testid=\"human-turn\"]")
                        .min_text_chars(GENERIC_MESSAGE_MIN_CHARS),
                ],
            ),
            normalization: Normalization::StripFillers,
        }
    }

    /// gemini.google.com (`rich-textarea` composer).
    #[must_use]
    pub fn gemini() -> Self {
        Self {
            kind: SurfaceKind::Gemini,
            input: LookupChain::new(
                "gemini.input",
                [
                    Strategy::css("rich-textarea div[contenteditable=\"true\"]"),
                    Strategy::css("ms-prompt-input-wrapper div[contenteditable=\"true\"]"),
                    Strategy::css("ms-prompt-input div[contenteditable=\"true\"]"),
                    Strategy::css("div[contenteditable=\"true\"][aria-label*=\"Enter a prompt\"]"),
                    Strategy::css("div[contenteditable=\"true\"][aria-label*=\"Message Gemini\"]"),
                    Strategy::css("div[contenteditable=\"true\"][aria-label*=\"prompt\"]"),
                    Strategy::css(".ql-editor[contenteditable=\"true\"]"),
                    Strategy::css("div[contenteditable=\"true\"][role=\"textbox\"]"),
                    Strategy::css("div[contenteditable=\"true\"]"),
                ],
            ),
            submit: LookupChain::new(
                "gemini.submit",
                [
                    Strategy::css("button[aria-label=\"Send message\"]").enabled_only(),
                    Strategy::css("button[aria-label*=\"Send\"]").enabled_only(),
                    Strategy::css("button[aria-label*=\"שליחה\"]").enabled_only(),
                    Strategy::css("button[aria-label*=\"Submit\"]").enabled_only(),
                    Strategy::css("ms-prompt-input button[aria-label*=\"Send\"]").enabled_only(),
                    Strategy::css("button.send-button").enabled_only(),
                    Strategy::css("button[data-mat-icon-name=\"send\"]").enabled_only(),
                    Strategy::css("button[type=\"submit\"]").enabled_only(),
                ],
            ),
            stop_indicator: LookupChain::new(
                "gemini.stop",
                [
                    Strategy::css("button[aria-label=\"Stop generating\"]"),
                    Strategy::css("button[aria-label*=\"Stop\"]"),
                    Strategy::css("button[aria-label*=\"עצור\"]"),
                    Strategy::css("ms-prompt-input button[aria-label*=\"Stop\"]"),
                    Strategy::css("[data-testid=\"stop-button\"]"),
                ],
            ),
            messages: LookupChain::new(
                "gemini.messages",
                [
                    Strategy::css("model-response .response-content"),
                    Strategy::css("model-response ms-cmark-node"),
                    Strategy::css("model-response .markdown"),
                    Strategy::css("model-response"),
                    Strategy::css("message-content")
                        .excluding_within(GEMINI_HUMAN_CONTAINERS)
                        .min_text_chars(GENERIC_MESSAGE_MIN_CHARS),
                    Strategy::css("[class*=\"response\"], [class*=\"model\"]")
                        .min_text_chars(GENERIC_MESSAGE_MIN_CHARS),
                ],
            ),
            normalization: Normalization::Verbatim,
        }
    }
}
