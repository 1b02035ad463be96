//! Spam heuristic (spec.md §4.6): a deterministic pure function over message text.

use once_cell::sync::Lazy;
use regex::Regex;

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").unwrap());

const MAX_URLS: usize = 3;
const MAX_REPEATED_CHAR_RUN: usize = 8;
const MIN_UNIQUE_CHAR_RATIO: f64 = 0.15;

/// Flag obviously abusive text: link floods, keyboard-mashing, and
/// near-constant-character spam. Deterministic and side-effect free.
pub fn is_spam(text: &str) -> bool {
    if text.trim().is_empty() {
        return false;
    }

    if URL_PATTERN.find_iter(text).count() > MAX_URLS {
        return true;
    }

    if has_long_repeated_run(text, MAX_REPEATED_CHAR_RUN) {
        return true;
    }

    let chars: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    if chars.len() >= 20 {
        let unique: std::collections::HashSet<char> = chars.iter().copied().collect();
        let ratio = unique.len() as f64 / chars.len() as f64;
        if ratio < MIN_UNIQUE_CHAR_RATIO {
            return true;
        }
    }

    false
}

fn has_long_repeated_run(text: &str, threshold: usize) -> bool {
    let mut run_char = None;
    let mut run_len = 0usize;
    for c in text.chars() {
        if Some(c) == run_char {
            run_len += 1;
        } else {
            run_char = Some(c);
            run_len = 1;
        }
        if run_len >= threshold {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_not_spam() {
        assert!(!is_spam("Olá, gostaria de saber mais sobre o plano."));
    }

    #[test]
    fn link_flood_is_spam() {
        let text = "http://a.co http://b.co http://c.co http://d.co";
        assert!(is_spam(text));
    }

    #[test]
    fn repeated_char_run_is_spam() {
        assert!(is_spam("aaaaaaaaaaaaaaaaaaaa"));
    }

    #[test]
    fn is_deterministic() {
        let text = "mensagem normal de teste";
        assert_eq!(is_spam(text), is_spam(text));
    }

    #[test]
    fn empty_text_is_not_spam() {
        assert!(!is_spam("   "));
    }
}
