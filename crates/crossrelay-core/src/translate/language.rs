//! Cheap "already in the target language" heuristic.
//!
//! Only an English profile exists. For any other target the heuristic never
//! claims a match, so every run goes to the provider.

/// Share of ASCII letters among all letters above which text counts as English.
const ASCII_LETTER_RATIO: f64 = 0.85;

const ENGLISH_STOPWORDS: &[&str] = &[
    "the", "and", "is", "are", "was", "were", "this", "that", "with", "for", "you", "have",
    "has", "will", "not", "from", "what", "your", "they", "there", "about", "would", "should",
    "could", "been", "which", "their", "it's", "i'm", "don't",
];

/// Frequent words of languages that share the Latin alphabet with English.
const FOREIGN_STOPWORDS: &[&str] = &[
    "hola", "el", "la", "los", "las", "que", "de", "del", "y", "en", "por", "para", "con",
    "una", "es", "muy", "pero", "como", "está", "esta", "gracias", "le", "les", "et", "est",
    "une", "pour", "avec", "der", "die", "das", "und", "ist", "nicht", "mit", "il", "di",
    "che", "per", "não", "com", "um", "uma",
];

fn has_foreign_diacritics(text: &str) -> bool {
    text.chars().any(|ch| {
        matches!(
            ch,
            'á' | 'é' | 'í' | 'ó' | 'ú' | 'ñ' | 'ü' | 'ö' | 'ä' | 'ß' | 'ç' | 'à' | 'è' | 'ì'
                | 'ò' | 'ù' | 'â' | 'ê' | 'î' | 'ô' | 'û' | 'ã' | 'õ' | '¿' | '¡'
        ) || matches!(
            ch,
            'Á' | 'É' | 'Í' | 'Ó' | 'Ú' | 'Ñ' | 'Ü' | 'Ö' | 'Ä' | 'Ç' | 'À' | 'È' | 'Â' | 'Ê'
                | 'Ô' | 'Ã' | 'Õ'
        )
    })
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|ch: char| !(ch.is_alphabetic() || ch == '\''))
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
}

fn is_english_target(target_lang: &str) -> bool {
    let lang = target_lang.trim().to_ascii_lowercase();
    lang == "en" || lang.starts_with("en-") || lang.starts_with("en_")
}

/// Whether `text` already reads as `target_lang`.
pub fn looks_like_target(text: &str, target_lang: &str) -> bool {
    if !is_english_target(target_lang) {
        return false;
    }

    if has_foreign_diacritics(text) {
        return false;
    }
    let words: Vec<String> = words(text).collect();
    if words
        .iter()
        .any(|word| FOREIGN_STOPWORDS.contains(&word.as_str()))
    {
        return false;
    }
    if words
        .iter()
        .any(|word| ENGLISH_STOPWORDS.contains(&word.as_str()))
    {
        return true;
    }

    let (ascii, total) = text
        .chars()
        .filter(|ch| ch.is_alphabetic())
        .fold((0usize, 0usize), |(ascii, total), ch| {
            (ascii + usize::from(ch.is_ascii_alphabetic()), total + 1)
        });
    if total == 0 {
        return false;
    }
    ascii as f64 / total as f64 > ASCII_LETTER_RATIO
}
