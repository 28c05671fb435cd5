//! Pre-send text normalization.
//!
//! Transcribed speech is full of hesitation particles that cost tokens and
//! carry no meaning. [`Normalization::StripFillers`] removes the obvious
//! ones conservatively; anything that might carry meaning is left alone.

use regex::Regex;
use std::sync::LazyLock;

/// Lines consisting of nothing but a filler word.
static FILLER_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^[ \t]*(?:אממ+|אהה+|אוו+|יעני|כאילו|אוקיי|אוקי|נו+)[ \t]*$")
        .expect("FILLER_LINE_RE is a valid static regex pattern")
});

/// Inline fillers as `(mid-sentence, line-start)` pairs.
///
/// Hebrew has no usable `\b`, so fillers are anchored on spaces. The pairs
/// run one filler at a time so adjacent fillers of different kinds are
/// each seen with their leading space intact.
static INLINE_FILLER_RES: LazyLock<Vec<(Regex, Regex)>> = LazyLock::new(|| {
    ["אממ", "אהה", "אוו"]
        .iter()
        .map(|filler| {
            (
                Regex::new(&format!(" {filler}+ "))
                    .expect("inline filler is a valid static regex pattern"),
                Regex::new(&format!("(?m)^{filler}+ "))
                    .expect("line-start filler is a valid static regex pattern"),
            )
        })
        .collect()
});

static BLANK_RUN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\n{3,}").expect("BLANK_RUN_RE is a valid static regex pattern")
});

static TRAILING_WS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)[ \t]+$").expect("TRAILING_WS_RE is a valid static regex pattern")
});

/// Text transformation applied before a chunk is inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    /// Send the text unchanged.
    Verbatim,
    /// Strip speech fillers and tidy whitespace.
    StripFillers,
}

impl Normalization {
    #[must_use]
    pub fn apply(self, text: &str) -> String {
        match self {
            Self::Verbatim => text.to_owned(),
            Self::StripFillers => strip_fillers(text),
        }
    }
}

/// Remove filler-only lines and inline fillers, collapse 3+ newlines to
/// 2, trim trailing whitespace per line, then trim the whole text.
#[must_use]
pub fn strip_fillers(text: &str) -> String {
    let mut out = FILLER_LINE_RE.replace_all(text, "").into_owned();
    for (mid, start) in INLINE_FILLER_RES.iter() {
        out = mid.replace_all(&out, " ").into_owned();
        out = start.replace_all(&out, "").into_owned();
    }
    out = BLANK_RUN_RE.replace_all(&out, "\n\n").into_owned();
    out = TRAILING_WS_RE.replace_all(&out, "").into_owned();
    out.trim().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_filler_only_lines() {
        let input = "שורה ראשונה\n  אממממ  \nיעני\nשורה שנייה";
        assert_eq!(strip_fillers(input), "שורה ראשונה\n\nשורה שנייה");
    }

    #[test]
    fn strips_inline_fillers_between_spaces() {
        assert_eq!(strip_fillers("אני אממ חושב שכן"), "אני חושב שכן");
        assert_eq!(strip_fillers("זה אהההה נכון"), "זה נכון");
    }

    #[test]
    fn strips_fillers_at_line_start() {
        assert_eq!(strip_fillers("אוו זה יפה\nאממ כן"), "זה יפה\nכן");
    }

    #[test]
    fn keeps_fillers_inside_words() {
        // No surrounding spaces, so the particle is part of a word.
        assert_eq!(strip_fillers("מאממן"), "מאממן");
    }

    #[test]
    fn collapses_blank_runs_and_trailing_whitespace() {
        assert_eq!(strip_fillers("a   \n\n\n\n\nb\t\n"), "a\n\nb");
    }

    #[test]
    fn verbatim_leaves_text_alone() {
        let text = "  אממ  \n\n\n\nx ";
        assert_eq!(Normalization::Verbatim.apply(text), text);
        assert_eq!(Normalization::StripFillers.apply(text), "x");
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(strip_fillers(""), "");
    }
}
