//! Rewrite rules for file names and tag values.
//! One pass applies every rule once, in the order of [`RULES`]; each rule
//! sees the output of the rule before it.
//!
//! CRITICAL: the rule order is part of the contract. Leading-number stripping
//! must run before website stripping so that "123_www.example.com_Track"
//! loses its counter before the domain is matched.

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashSet;
use unicode_normalization::UnicodeNormalization;

use crate::models::TextKind;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Leading junk: counters, separators and square brackets, e.g. "01 - 02 - ", "[2023] ".
pub static LEADING_JUNK: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\d\s\-_.\[\]]+").unwrap());

/// Explicit URLs: "https://host/path" or "www.host". Any TLD is accepted here
/// because the scheme or "www." already marks the token as a link.
pub static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)[-_\s]*(?:[a-z][a-z0-9+.\-]*://(?:www\.)?|www\.)(?P<host>(?:[a-z0-9](?:[a-z0-9\-]*[a-z0-9])?\.)+[a-z]{2,})(?:/[^\s_]*)?[-_\s]*",
    )
    .unwrap()
});

/// Bare "domain.tld" tokens. Restricted to TLDs seen on download sites so that
/// ordinary dotted words ("Vol.2", "Mr.Blue") survive.
pub static BARE_DOMAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)[-_\s]*(?P<host>(?:[a-z0-9](?:[a-z0-9\-]*[a-z0-9])?\.)+(?:com|net|org|info|biz|co|in|io|ws|me|cc|tv|fm|to|ru|pk|mobi|xyz|site|top|club|online))(?:/[^\s_]*)?[-_\s]*",
    )
    .unwrap()
});

/// A bracketed block at the very end: "[Remix]", " [] ".
pub static TRAILING_BRACKET: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\[[^\]]*\]\s*$").unwrap());

/// Brackets holding nothing but whitespace, anywhere.
pub static EMPTY_BRACKET: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\s*\]").unwrap());

/// Runs of whitespace, including non-breaking and zero-width variants.
pub static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s\u{200B}\u{2060}\u{FEFF}]+").unwrap());

/// Characters that cannot appear in a file name on common platforms.
pub const INVALID_FILENAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Characters trimmed from both ends after whitespace collapsing.
const EDGE_SEPARATORS: &[char] = &[' ', '-', '_'];

// ============================================================================
// RULES
// ============================================================================

/// Classification of a rewrite rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleClass {
    LeadingNumber,
    Website,
    TrailingBracket,
    EmptyBracket,
    Whitespace,
    Unicode,
    InvalidChar,
}

type RuleFn = fn(&str, &mut FxHashSet<String>) -> String;

/// A single rewrite step.
pub struct RewriteRule {
    pub class: RuleClass,
    apply: RuleFn,
}

impl RewriteRule {
    /// Tag values keep characters that are only illegal in paths; album
    /// text keeps leading digits.
    pub fn applies_to(&self, kind: TextKind) -> bool {
        match self.class {
            RuleClass::InvalidChar => kind.is_path_component(),
            RuleClass::LeadingNumber => !kind.is_album(),
            _ => true,
        }
    }
}

/// The fixed rule order for one pass.
pub static RULES: [RewriteRule; 7] = [
    RewriteRule { class: RuleClass::LeadingNumber, apply: strip_leading_junk },
    RewriteRule { class: RuleClass::Website, apply: strip_websites },
    RewriteRule { class: RuleClass::TrailingBracket, apply: strip_trailing_brackets },
    RewriteRule { class: RuleClass::EmptyBracket, apply: strip_empty_brackets },
    RewriteRule { class: RuleClass::Whitespace, apply: normalize_whitespace },
    RewriteRule { class: RuleClass::Unicode, apply: compose_unicode },
    RewriteRule { class: RuleClass::InvalidChar, apply: strip_invalid_chars },
];

/// Result of one pass over a string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassOutcome {
    pub text: String,
    pub changed: bool,
    /// Rules that modified the text, in application order.
    pub fired: Vec<RuleClass>,
    pub extracted_tokens: FxHashSet<String>,
}

/// Apply every rule once, in order.
pub fn run_pass(input: &str, kind: TextKind) -> PassOutcome {
    let mut outcome = PassOutcome {
        text: input.to_string(),
        ..PassOutcome::default()
    };
    for rule in RULES.iter().filter(|r| r.applies_to(kind)) {
        let next = (rule.apply)(&outcome.text, &mut outcome.extracted_tokens);
        if next != outcome.text {
            outcome.changed = true;
            outcome.fired.push(rule.class);
            outcome.text = next;
        }
    }
    outcome
}

// ============================================================================
// RULE IMPLEMENTATIONS
// ============================================================================

fn strip_leading_junk(text: &str, _: &mut FxHashSet<String>) -> String {
    LEADING_JUNK.replace(text, "").into_owned()
}

fn strip_websites(text: &str, tokens: &mut FxHashSet<String>) -> String {
    let without_urls = strip_domain_matches(&URL_PATTERN, text, tokens);
    strip_domain_matches(&BARE_DOMAIN, &without_urls, tokens)
}

/// Replace each accepted match with a single space and record its host.
/// Matches glued to a following word ("example.community") are left alone.
fn strip_domain_matches(pattern: &Regex, text: &str, tokens: &mut FxHashSet<String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in pattern.captures_iter(text) {
        let (Some(whole), Some(host)) = (caps.get(0), caps.name("host")) else {
            continue;
        };
        if !ends_on_boundary(text, whole.end()) {
            continue;
        }
        out.push_str(&text[last..whole.start()]);
        out.push(' ');
        last = whole.end();
        tokens.insert(domain_token(host.as_str()));
    }
    if last == 0 {
        return text.to_string();
    }
    out.push_str(&text[last..]);
    out
}

fn ends_on_boundary(text: &str, end: usize) -> bool {
    let prev = text[..end].chars().next_back();
    let next = text[end..].chars().next();
    match (prev, next) {
        (Some(p), Some(n)) if p.is_alphanumeric() => !(n.is_alphanumeric() || n == '.'),
        _ => true,
    }
}

/// Lowercase host without a leading "www.".
pub fn domain_token(host: &str) -> String {
    let lower = host.to_lowercase();
    match lower.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => lower,
    }
}

fn strip_trailing_brackets(text: &str, _: &mut FxHashSet<String>) -> String {
    let mut result = text.to_string();
    while let Some(m) = TRAILING_BRACKET.find(&result) {
        result.truncate(m.start());
    }
    result
}

fn strip_empty_brackets(text: &str, _: &mut FxHashSet<String>) -> String {
    EMPTY_BRACKET.replace_all(text, "").into_owned()
}

fn normalize_whitespace(text: &str, _: &mut FxHashSet<String>) -> String {
    WHITESPACE_RUN
        .replace_all(text, " ")
        .trim_matches(EDGE_SEPARATORS)
        .to_string()
}

fn compose_unicode(text: &str, _: &mut FxHashSet<String>) -> String {
    text.nfc().collect()
}

fn strip_invalid_chars(text: &str, _: &mut FxHashSet<String>) -> String {
    text.chars()
        .filter(|c| !INVALID_FILENAME_CHARS.contains(c) && !c.is_control())
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pass(text: &str) -> PassOutcome {
        run_pass(text, TextKind::FileName)
    }

    #[test]
    fn test_rule_order_is_fixed() {
        let classes: Vec<RuleClass> = RULES.iter().map(|r| r.class).collect();
        assert_eq!(
            classes,
            vec![
                RuleClass::LeadingNumber,
                RuleClass::Website,
                RuleClass::TrailingBracket,
                RuleClass::EmptyBracket,
                RuleClass::Whitespace,
                RuleClass::Unicode,
                RuleClass::InvalidChar,
            ]
        );
    }

    #[test]
    fn test_leading_junk() {
        assert_eq!(pass("01 - 02 - Song").text, "Song");
        assert_eq!(pass("[2023] Song Title").text, "Song Title");
        assert_eq!(pass("_.-Song").text, "Song");
        assert_eq!(pass("Song 01").text, "Song 01");
    }

    #[test]
    fn test_number_then_domain() {
        let outcome = pass("123_www.example.com_Track [Live] []");
        assert_eq!(outcome.text, "Track");
        assert!(outcome.extracted_tokens.contains("example.com"));
        assert_eq!(
            outcome.fired,
            vec![
                RuleClass::LeadingNumber,
                RuleClass::Website,
                RuleClass::TrailingBracket,
                RuleClass::Whitespace,
            ]
        );
    }

    #[test]
    fn test_website_forms() {
        let outcome = pass("Song - https://www.MusicSite.net/track/42 - Artist");
        assert_eq!(outcome.text, "Song Artist");
        assert!(outcome.extracted_tokens.contains("musicsite.net"));

        let outcome = pass("Artist_downloadming.co_Song");
        assert_eq!(outcome.text, "Artist Song");
        assert!(outcome.extracted_tokens.contains("downloadming.co"));

        let outcome = pass("Song www.weird.zz");
        assert_eq!(outcome.text, "Song");
        assert!(outcome.extracted_tokens.contains("weird.zz"));
    }

    #[test]
    fn test_dotted_words_survive() {
        assert_eq!(pass("Vol.2 Greatest").text, "Vol.2 Greatest");
        assert_eq!(pass("Mr.Blue Sky").text, "Mr.Blue Sky");
        let outcome = pass("example.community");
        assert_eq!(outcome.text, "example.community");
        assert!(outcome.extracted_tokens.is_empty());
    }

    #[test]
    fn test_trailing_brackets_repeat() {
        assert_eq!(pass("Artist - Song [Remix] [Live] []").text, "Artist - Song");
        assert_eq!(pass("Song [Live] (Edit)").text, "Song [Live] (Edit)");
    }

    #[test]
    fn test_empty_brackets_anywhere() {
        assert_eq!(pass("Artist [ ] Song (Edit)").text, "Artist Song (Edit)");
    }

    #[test]
    fn test_whitespace_variants() {
        assert_eq!(pass("Artist\u{00A0}\u{00A0}-\tSong\u{3000}").text, "Artist - Song");
        assert_eq!(pass("Song -_").text, "Song");
    }

    #[test]
    fn test_unicode_composed() {
        // "e" + combining acute composes to a single code point
        assert_eq!(pass("Beyonce\u{0301}").text, "Beyonc\u{00E9}");
    }

    #[test]
    fn test_invalid_chars_only_for_file_names() {
        assert_eq!(pass("AC/DC: Live?").text, "ACDC Live");
        assert_eq!(run_pass("AC/DC: Live?", TextKind::TagValue).text, "AC/DC: Live?");
        assert_eq!(run_pass("AC/DC: Live?", TextKind::AlbumTag).text, "AC/DC: Live?");
        assert_eq!(run_pass("AC/DC: Live?", TextKind::AlbumFolder).text, "ACDC Live");
    }

    #[test]
    fn test_album_text_keeps_leading_digits() {
        for kind in [TextKind::AlbumTag, TextKind::AlbumFolder] {
            let outcome = run_pass("808s & Heartbreak", kind);
            assert!(!outcome.changed);
            assert_eq!(run_pass("1989 [Deluxe]", kind).text, "1989");
        }
        assert_eq!(pass("808s & Heartbreak").text, "s & Heartbreak");
    }

    #[test]
    fn test_clean_input_untouched() {
        let outcome = pass("Artist - Song");
        assert!(!outcome.changed);
        assert!(outcome.fired.is_empty());
        assert_eq!(outcome.text, "Artist - Song");
    }
}
