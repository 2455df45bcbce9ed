//! Gate against synthetic-STT hallucinations.
//!
//! Offline models emit stock phrases on near-silent audio ("thanks for
//! watching" artifacts from video training data), bracket-wrapped event
//! tokens, a single word repeated, or bare musical-note strings. All of
//! these are discarded before an utterance is formed.

/// Stock phrases that whole-segment transcription produces from silence.
/// Matched against the trimmed, lowercased, punctuation-stripped text.
const ARTIFACT_PHRASES: &[&str] = &[
    "thank you",
    "thanks for watching",
    "thank you for watching",
    "thank you so much for watching",
    "please subscribe",
    "subtitles by the amara org community",
    "you",
    "bye",
    "so",
];

pub fn is_hallucination(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return true;
    }

    // Bracket-wrapped tokens: "[BLANK_AUDIO]", "(applause)", "*music*".
    if is_wrapped(trimmed, '[', ']')
        || is_wrapped(trimmed, '(', ')')
        || is_wrapped(trimmed, '*', '*')
    {
        return true;
    }

    // Pure musical-note strings.
    if trimmed
        .chars()
        .all(|c| c == '♪' || c == '♫' || c == '♬' || c.is_whitespace() || c.is_ascii_punctuation())
    {
        return true;
    }

    let normalized = normalize(trimmed);
    if ARTIFACT_PHRASES.contains(&normalized.as_str()) {
        return true;
    }

    // Degenerate repetition: the same single word over and over.
    let words: Vec<&str> = normalized.split_whitespace().collect();
    if words.len() >= 3 && words.windows(2).all(|w| w[0] == w[1]) {
        return true;
    }

    false
}

/// Word count on the raw text, for the configurable minimum-length gate.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn is_wrapped(text: &str, open: char, close: char) -> bool {
    text.starts_with(open) && text.ends_with(close) && text.len() > 1
}

fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| !c.is_ascii_punctuation())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_artifacts_always_discard() {
        for artifact in [
            "[BLANK_AUDIO]",
            "Thank you.",
            "you you you you",
            "♪ ♪ ♪",
            "(applause)",
            "Thanks for watching!",
            "*music*",
        ] {
            assert!(is_hallucination(artifact), "should discard {:?}", artifact);
        }
    }

    #[test]
    fn ordinary_sentences_pass() {
        for sentence in [
            "what time is it right now",
            "turn the lights off please",
            "I think that went well today",
        ] {
            assert!(!is_hallucination(sentence), "should keep {:?}", sentence);
        }
    }

    #[test]
    fn repeated_word_needs_three_occurrences() {
        assert!(!is_hallucination("no no"));
        assert!(is_hallucination("no no no"));
    }

    #[test]
    fn empty_and_whitespace_discard() {
        assert!(is_hallucination(""));
        assert!(is_hallucination("   "));
    }

    #[test]
    fn repeated_phrase_with_varied_words_passes() {
        assert!(!is_hallucination("really really good idea"));
    }

    #[test]
    fn word_count_counts_whitespace_tokens() {
        assert_eq!(word_count("hey there general kenobi"), 4);
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("  spaced   out  "), 2);
    }
}
