//! Transcript preparation: filler cleanup and chunking.
//!
//! Both operate on whole `char`s so a chunk boundary never splits a
//! multi-byte code point.

use std::sync::LazyLock;

use regex::Regex;

static RUN_OF_BLANKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]{2,}").expect("RUN_OF_BLANKS is a valid static regex pattern"));

static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("BLANK_LINES is a valid static regex pattern"));

static SPOKEN_FILLERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:אהה|אממ|כאילו|אוקיי|תראה|תראי|סבבה|טוב אז)\b")
        .expect("SPOKEN_FILLERS is a valid static regex pattern")
});

static SPACE_BEFORE_PUNCT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r" +([.,])").expect("SPACE_BEFORE_PUNCT is a valid static regex pattern")
});

/// Clean a spoken transcript before it is chunked.
///
/// Collapses runs of blanks, squeezes blank-line groups to one empty line,
/// drops spoken Hebrew fillers and tightens spaces before `.` and `,`.
#[must_use]
pub fn preprocess_transcript(text: &str) -> String {
    let out = RUN_OF_BLANKS.replace_all(text, " ");
    let out = BLANK_LINES.replace_all(&out, "\n\n");
    let out = SPOKEN_FILLERS.replace_all(&out, "");
    let out = SPACE_BEFORE_PUNCT.replace_all(&out, "$1");
    let out = RUN_OF_BLANKS.replace_all(&out, " ");
    out.trim().to_owned()
}

/// Split `text` into chunks of at most `chunk_size` chars.
///
/// Consecutive chunks share `overlap` chars. A chunk that is not the last
/// ends right after the last `.` in its window when that dot lies past the
/// window's midpoint. Text that fits in one chunk comes back unchanged.
#[must_use]
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    if chunk_size == 0 || len <= chunk_size {
        return vec![text.to_owned()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let mut end = (start + chunk_size).min(len);
        if end < len {
            let window = &chars[start..end];
            if let Some(dot) = window.iter().rposition(|&c| c == '.') {
                let cut = start + dot;
                if cut > start + chunk_size / 2 {
                    end = cut + 1;
                }
            }
        }
        chunks.push(chars[start..end].iter().collect());
        if end >= len {
            break;
        }
        let next = end.saturating_sub(overlap);
        start = if next > start { next } else { end };
    }
    chunks
}
