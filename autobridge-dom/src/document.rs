//! Parsed surface snapshot and strategy evaluation.

use scraper::{ElementRef, Html, Selector};

use crate::error::{DomError, Result};
use crate::strategy::{Filter, Locator, LookupChain};
use crate::text::inner_text;

/// A parsed HTML snapshot of a chat surface.
///
/// `Document` wraps [`scraper::Html`], which is not `Send`; build it, query
/// it and drop it inside synchronous code.
pub struct Document {
    html: Html,
}

impl Document {
    /// Parse a full-document snapshot (`document.documentElement.outerHTML`).
    #[must_use]
    pub fn parse(html: &str) -> Self {
        Self {
            html: Html::parse_document(html),
        }
    }

    /// Find the first strategy whose first match passes its filter.
    ///
    /// Mirrors `document.querySelector`: later matches of the same selector
    /// are never considered, so a disabled first match moves evaluation on to
    /// the next strategy.
    ///
    /// # Errors
    ///
    /// Returns [`DomError::Selector`] if any evaluated selector is invalid.
    pub fn locate(&self, chain: &LookupChain) -> Result<Option<Locator>> {
        for strategy in chain.strategies() {
            let selector = compile(strategy.selector())?;
            let Some(first) = self.html.select(&selector).next() else {
                continue;
            };
            let filter = CompiledFilter::new(strategy.filter())?;
            if filter.accepts(&first) {
                tracing::trace!(
                    chain = chain.name(),
                    selector = strategy.selector(),
                    "lookup strategy matched"
                );
                return Ok(Some(Locator::new(strategy.selector(), 0)));
            }
            tracing::trace!(
                chain = chain.name(),
                selector = strategy.selector(),
                "first match rejected by filter"
            );
        }
        Ok(None)
    }

    /// Returns `true` if any strategy in the chain locates an element.
    ///
    /// # Errors
    ///
    /// Returns [`DomError::Selector`] if any evaluated selector is invalid.
    pub fn is_present(&self, chain: &LookupChain) -> Result<bool> {
        Ok(self.locate(chain)?.is_some())
    }

    /// Text of the last element matched by the first productive strategy.
    ///
    /// Mirrors `document.querySelectorAll`: every match passing the filter is
    /// a candidate and the last one in document order wins. Returns
    /// `Ok(None)` when no strategy yields a candidate; a candidate with no
    /// text yields `Some("")`.
    ///
    /// # Errors
    ///
    /// Returns [`DomError::Selector`] if any evaluated selector is invalid.
    pub fn last_text(&self, chain: &LookupChain) -> Result<Option<String>> {
        for strategy in chain.strategies() {
            let selector = compile(strategy.selector())?;
            let filter = CompiledFilter::new(strategy.filter())?;
            let last = self
                .html
                .select(&selector)
                .filter(|el| filter.accepts(el))
                .last();
            if let Some(element) = last {
                tracing::trace!(
                    chain = chain.name(),
                    selector = strategy.selector(),
                    "text strategy matched"
                );
                return Ok(Some(inner_text(&element)));
            }
        }
        Ok(None)
    }
}

fn compile(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| DomError::Selector {
        selector: selector.to_owned(),
        reason: format!("{e:?}"),
    })
}

/// A [`Filter`] with its selectors parsed once per strategy evaluation.
struct CompiledFilter {
    skip_disabled: bool,
    exclude_containing: Option<Selector>,
    exclude_within: Vec<Selector>,
    min_text_chars: usize,
}

impl CompiledFilter {
    fn new(filter: &Filter) -> Result<Self> {
        Ok(Self {
            skip_disabled: filter.skip_disabled,
            exclude_containing: filter.exclude_containing.map(compile).transpose()?,
            exclude_within: filter
                .exclude_within
                .iter()
                .map(|s| compile(s))
                .collect::<Result<Vec<_>>>()?,
            min_text_chars: filter.min_text_chars,
        })
    }

    fn accepts(&self, element: &ElementRef<'_>) -> bool {
        if self.skip_disabled && is_disabled(element) {
            return false;
        }
        if let Some(sel) = &self.exclude_containing {
            if element.select(sel).next().is_some() {
                return false;
            }
        }
        if self.exclude_within.iter().any(|sel| closest(element, sel)) {
            return false;
        }
        if self.min_text_chars > 0 && inner_text(element).chars().count() < self.min_text_chars {
            return false;
        }
        true
    }
}

fn is_disabled(element: &ElementRef<'_>) -> bool {
    let value = element.value();
    value.attr("disabled").is_some()
        || value
            .attr("aria-disabled")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

/// `Element.closest`: the element itself or any ancestor matches.
fn closest(element: &ElementRef<'_>, selector: &Selector) -> bool {
    selector.matches(element)
        || element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|ancestor| selector.matches(&ancestor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::Strategy;

    const COMPOSER_HTML: &str = r#"<!DOCTYPE html>
<html><body>
  <div contenteditable="true" class="composer-shell">draft</div>
  <div contenteditable="true" class="ProseMirror"></div>
  <button type="submit" disabled>Go</button>
  <button aria-label="Send message">Send</button>
</body></html>"#;

    #[test]
    fn locate_prefers_earlier_strategy() {
        let doc = Document::parse(COMPOSER_HTML);
        let chain = LookupChain::new(
            "input",
            vec![
                Strategy::css("div[contenteditable=\"true\"].ProseMirror"),
                Strategy::css("div[contenteditable=\"true\"]"),
            ],
        );
        let found = doc.locate(&chain).expect("valid chain");
        assert_eq!(
            found,
            Some(Locator::new("div[contenteditable=\"true\"].ProseMirror", 0))
        );
    }

    #[test]
    fn locate_falls_through_missing_strategies() {
        let doc = Document::parse(COMPOSER_HTML);
        let chain = LookupChain::new(
            "input",
            vec![
                Strategy::css("[data-testid=\"composer-input\"]"),
                Strategy::css("div[contenteditable=\"true\"][class*=\"composer\"]"),
            ],
        );
        let found = doc.locate(&chain).expect("valid chain");
        assert_eq!(
            found.map(|l| l.selector),
            Some("div[contenteditable=\"true\"][class*=\"composer\"]".to_owned())
        );
    }

    #[test]
    fn locate_skips_disabled_first_match() {
        let doc = Document::parse(COMPOSER_HTML);
        let chain = LookupChain::new(
            "submit",
            vec![
                Strategy::css("button[type=\"submit\"]").enabled_only(),
                Strategy::css("button[aria-label*=\"Send\"]").enabled_only(),
            ],
        );
        let found = doc.locate(&chain).expect("valid chain");
        assert_eq!(
            found.map(|l| l.selector),
            Some("button[aria-label*=\"Send\"]".to_owned())
        );
    }

    #[test]
    fn aria_disabled_counts_as_disabled() {
        let doc = Document::parse(r#"<button aria-disabled="true">Send</button>"#);
        let chain = LookupChain::new("submit", vec![Strategy::css("button").enabled_only()]);
        assert_eq!(doc.locate(&chain).expect("valid chain"), None);
    }

    #[test]
    fn locate_none_when_nothing_matches() {
        let doc = Document::parse("<html><body><p>nothing here</p></body></html>");
        let chain = LookupChain::new("input", vec![Strategy::css("textarea")]);
        assert_eq!(doc.locate(&chain).expect("valid chain"), None);
        assert!(!doc.is_present(&chain).expect("valid chain"));
    }

    #[test]
    fn last_text_takes_last_match_of_first_productive_strategy() {
        let doc = Document::parse(
            r#"<div data-testid="message-content">first answer</div>
               <div data-testid="message-content">  second answer  </div>
               <div class="font-claude-message">ignored</div>"#,
        );
        let chain = LookupChain::new(
            "messages",
            vec![
                Strategy::css("[data-testid=\"message-content\"]"),
                Strategy::css(".font-claude-message"),
            ],
        );
        assert_eq!(
            doc.last_text(&chain).expect("valid chain"),
            Some("second answer".to_owned())
        );
    }

    #[test]
    fn last_text_excludes_human_turns_by_descendant() {
        let doc = Document::parse(
            r#"<div class="message-row">assistant reply text here</div>
               <div class="message-row"><span data-testid="human-turn">user question here</span></div>"#,
        );
        let chain = LookupChain::new(
            "messages",
            vec![Strategy::css("[class*=\"message\"]")
                .excluding_containing("[data-testid=\"human-turn\"]")
                .min_text_chars(11)],
        );
        assert_eq!(
            doc.last_text(&chain).expect("valid chain"),
            Some("assistant reply text here".to_owned())
        );
    }

    #[test]
    fn last_text_excludes_elements_inside_human_containers() {
        const HUMAN: &[&str] = &["[data-is-human=\"true\"]", ".human-turn"];
        let doc = Document::parse(
            r#"<message-content>model says something useful</message-content>
               <div data-is-human="true"><message-content>human asked a thing</message-content></div>
               <div class="human-turn"><message-content>another human line</message-content></div>"#,
        );
        let chain = LookupChain::new(
            "messages",
            vec![Strategy::css("message-content")
                .excluding_within(HUMAN)
                .min_text_chars(11)],
        );
        assert_eq!(
            doc.last_text(&chain).expect("valid chain"),
            Some("model says something useful".to_owned())
        );
    }

    #[test]
    fn last_text_min_chars_rejects_short_candidates() {
        let doc = Document::parse(r#"<div class="response">ok</div>"#);
        let chain = LookupChain::new(
            "messages",
            vec![Strategy::css("[class*=\"response\"]").min_text_chars(11)],
        );
        assert_eq!(doc.last_text(&chain).expect("valid chain"), None);
    }

    #[test]
    fn last_text_returns_empty_string_for_empty_candidate() {
        let doc = Document::parse("<model-response></model-response>");
        let chain = LookupChain::new("messages", vec![Strategy::css("model-response")]);
        assert_eq!(
            doc.last_text(&chain).expect("valid chain"),
            Some(String::new())
        );
    }

    #[test]
    fn invalid_selector_is_reported() {
        let doc = Document::parse("<p>x</p>");
        let chain = LookupChain::new("broken", vec![Strategy::css("div[")]);
        let err = doc.locate(&chain).unwrap_err();
        assert!(err.to_string().contains("div["));
    }}
