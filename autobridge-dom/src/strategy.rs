//! Lookup strategies and the ordered chains built from them.
//!
//! A [`Strategy`] is a single CSS probe plus an optional [`Filter`]. A
//! [`LookupChain`] is an ordered list of strategies evaluated until one of
//! them succeeds. A strategy list, not a hierarchy.

use serde::{Deserialize, Serialize};

/// Post-match constraints a candidate element must satisfy.
///
/// All fields default to "no constraint".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Filter {
    /// Reject elements carrying `disabled` or `aria-disabled="true"`.
    pub skip_disabled: bool,
    /// Reject elements that contain a descendant matching this selector.
    pub exclude_containing: Option<&'static str>,
    /// Reject elements that are, or sit inside, an element matching any of
    /// these selectors (`Element.closest` semantics).
    pub exclude_within: &'static [&'static str],
    /// Minimum trimmed text length in characters.
    pub min_text_chars: usize,
}

/// A single CSS lookup probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strategy {
    selector: &'static str,
    filter: Filter,
}

impl Strategy {
    /// A bare CSS selector probe with no filter.
    #[must_use]
    pub const fn css(selector: &'static str) -> Self {
        Self {
            selector,
            filter: Filter {
                skip_disabled: false,
                exclude_containing: None,
                exclude_within: &[],
                min_text_chars: 0,
            },
        }
    }

    /// Reject matches that are disabled.
    #[must_use]
    pub const fn enabled_only(mut self) -> Self {
        self.filter.skip_disabled = true;
        self
    }

    /// Reject matches containing a descendant that matches `selector`.
    #[must_use]
    pub const fn excluding_containing(mut self, selector: &'static str) -> Self {
        self.filter.exclude_containing = Some(selector);
        self
    }

    /// Reject matches located inside any element matching one of `selectors`.
    #[must_use]
    pub const fn excluding_within(mut self, selectors: &'static [&'static str]) -> Self {
        self.filter.exclude_within = selectors;
        self
    }

    /// Require at least `chars` characters of trimmed text.
    #[must_use]
    pub const fn min_text_chars(mut self, chars: usize) -> Self {
        self.filter.min_text_chars = chars;
        self
    }

    /// The CSS selector text.
    #[must_use]
    pub fn selector(&self) -> &'static str {
        self.selector
    }

    /// The post-match filter.
    #[must_use]
    pub fn filter(&self) -> &Filter {
        &self.filter
    }
}

/// An ordered list of strategies, most specific first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupChain {
    name: &'static str,
    strategies: Vec<Strategy>,
}

impl LookupChain {
    /// Build a named chain. The name only appears in trace output.
    #[must_use]
    pub fn new(name: &'static str, strategies: impl Into<Vec<Strategy>>) -> Self {
        Self {
            name,
            strategies: strategies.into(),
        }
    }

    /// Chain name used in diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Strategies in evaluation order.
    #[must_use]
    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    /// Returns `true` if the chain has no strategies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

/// A resolved element reference a page driver can act on.
///
/// Resolves to `document.querySelectorAll(selector)[index]` in the live page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    /// CSS selector that produced the match.
    pub selector: String,
    /// Zero-based index among all matches of `selector`, in document order.
    pub index: usize,
}

impl Locator {
    /// Build a locator.
    #[must_use]
    pub fn new(selector: impl Into<String>, index: usize) -> Self {
        Self {
            selector: selector.into(),
            index,
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.selector, self.index)
    }
}
