//! Pre-translation text clean-up.

use regex::{Regex, RegexBuilder};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://\S+").expect("invalid URL regex")
});

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"__URL\d+__").expect("invalid placeholder regex")
});

static SPACES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[ \t]{2,}|\t").expect("invalid whitespace regex")
});

/// Zero-width and invisible formatting characters. ZWJ (U+200D) is kept
/// because it joins emoji sequences.
fn is_invisible(ch: char) -> bool {
    matches!(
        ch,
        '\u{200B}' | '\u{200C}' | '\u{200E}' | '\u{200F}' | '\u{2060}' | '\u{FEFF}' | '\u{00AD}'
    )
}

fn is_emoji(ch: char) -> bool {
    matches!(
        ch as u32,
        0x1F000..=0x1FAFF | 0x2600..=0x27BF | 0x1F1E6..=0x1F1FF
    )
}

/// NFC, strip invisibles, and space emoji away from adjacent letters.
pub fn canonicalize(text: &str) -> String {
    let cleaned: Vec<char> = text.nfc().filter(|ch| !is_invisible(*ch)).collect();

    let mut out = String::with_capacity(text.len());
    let mut prev: Option<char> = None;
    for ch in cleaned {
        if let Some(p) = prev
            && ((is_emoji(p) && ch.is_alphabetic()) || (p.is_alphabetic() && is_emoji(ch)))
        {
            out.push(' ');
        }
        out.push(ch);
        prev = Some(ch);
    }
    out
}

/// Case-insensitive substring replacements, longest key first.
#[derive(Debug, Clone, Default)]
pub struct Corrections {
    rules: Vec<(Regex, String)>,
}

impl Corrections {
    pub fn new(map: &BTreeMap<String, String>) -> Self {
        let mut entries: Vec<(&String, &String)> = map
            .iter()
            .filter(|(from, _)| !from.trim().is_empty())
            .collect();
        entries.sort_by(|(a, _), (b, _)| b.chars().count().cmp(&a.chars().count()));

        let rules = entries
            .into_iter()
            .filter_map(|(from, to)| {
                RegexBuilder::new(&regex::escape(from))
                    .case_insensitive(true)
                    .build()
                    .ok()
                    .map(|re| (re, to.clone()))
            })
            .collect();
        Self { rules }
    }

    pub fn apply(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (re, replacement) in &self.rules {
            if re.is_match(&out) {
                out = re
                    .replace_all(&out, regex::NoExpand(replacement.as_str()))
                    .into_owned();
            }
        }
        out
    }
}

/// Swap bare URLs for `__URL{i}__` placeholders.
pub fn protect_urls(text: &str) -> (String, Vec<String>) {
    let mut urls = Vec::new();
    let protected = URL_RE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let placeholder = format!("__URL{}__", urls.len());
            urls.push(caps[0].to_string());
            placeholder
        })
        .into_owned();
    (protected, urls)
}

/// Put URLs back. Returns `None` when the provider dropped or mangled a placeholder.
pub fn restore_urls(text: &str, urls: &[String]) -> Option<String> {
    let mut out = text.to_string();
    for (idx, url) in urls.iter().enumerate() {
        let placeholder = format!("__URL{idx}__");
        if !out.contains(&placeholder) {
            return None;
        }
        out = out.replace(&placeholder, url);
    }
    if PLACEHOLDER_RE.is_match(&out) && !urls.iter().any(|url| PLACEHOLDER_RE.is_match(url)) {
        return None;
    }
    Some(out)
}

/// Collapse runs of spaces and tabs; newlines carry layout and are kept.
pub fn collapse_spaces(text: &str) -> String {
    SPACES_RE.replace_all(text, " ").into_owned()
}
