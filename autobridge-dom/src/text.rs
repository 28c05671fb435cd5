//! Approximation of `HTMLElement.innerText` for parsed snapshots.

use scraper::ElementRef;

/// Collect an element's text, trimming every line and collapsing runs of
/// blank lines to a single one.
pub(crate) fn inner_text(element: &ElementRef<'_>) -> String {
    let raw: String = element.text().collect();

    let mut out = String::with_capacity(raw.len());
    let mut blank_run = false;
    for line in raw.lines().map(str::trim) {
        if line.is_empty() {
            blank_run = true;
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
            if blank_run {
                out.push('\n');
            }
        }
        blank_run = false;
        out.push_str(line);
    }
    out
}
