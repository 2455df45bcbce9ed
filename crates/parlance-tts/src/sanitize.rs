//! Text sanitation ahead of synthesis. Replies may contain markdown code
//! and symbols no voice should attempt to read.

use regex::Regex;
use std::sync::OnceLock;

fn fenced_code() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```[\s\S]*?```").unwrap())
}

fn inline_code() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`[^`]*`").unwrap())
}

/// Strip code blocks and inline code, drop characters outside the
/// printable Latin-extended range, and collapse whitespace.
pub fn sanitize_for_speech(text: &str) -> String {
    let without_fences = fenced_code().replace_all(text, " ");
    let without_code = inline_code().replace_all(&without_fences, " ");

    let filtered: String = without_code
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .filter(|&c| c == ' ' || is_speakable(c))
        .collect();

    filtered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Printable ASCII plus Latin-1 supplement and Latin Extended-A/B, with
/// the handful of typographic marks synthesis engines handle fine.
fn is_speakable(c: char) -> bool {
    if c.is_ascii_graphic() {
        return true;
    }
    matches!(c, '\u{00A1}'..='\u{024F}') || matches!(c, '’' | '‘' | '“' | '”' | '–' | '—' | '…')
}
