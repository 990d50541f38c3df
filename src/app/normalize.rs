//! Caption cleaning: lowercase, trim punctuation, strip boilerplate
//! phrases such as "a photo of " or " in the background".

use std::sync::LazyLock;

const TRIM_CHARS: &[char] = &['.', '?', ',', '!', '#', '&'];

const PREFIXES: &[&str] = &[
    "a black and white photograph of ",
    "a black and white picture of ",
    "a black and white image of ",
    "a black and white photo of ",
    "black and white photograph of ",
    "black and white picture of ",
    "black and white image of ",
    "black and white photo of ",
    "an old photograph of ",
    "an old picture of ",
    "an old portrait of ",
    "an old image of ",
    "an old photo of ",
    "old photograph of ",
    "old picture of ",
    "old portrait of ",
    "old image of ",
    "old photo of ",
    "a photograph of ",
    "photograph of ",
    "a close - up of ",
    "close - up of ",
    "a close-up of ",
    "a close up of ",
    "close-up of ",
    "close up of ",
    "close - up ",
    "close-up ",
    "close up ",
    "a portrait of ",
    "portrait of ",
    "a picture of ",
    "picture of ",
    "an image of ",
    "image of ",
    "a photo of ",
    "photo of ",
    "a couple of ",
    "a bunch of ",
    "a group of ",
    "these are ",
    "there are ",
    "there is ",
    "this is ",
    "some of ",
    "several ",
    "a few ",
    "some ",
    "many ",
    "and ",
    "of ",
    "an ",
    "a ",
];

const SUFFIXES: &[&str] = &[
    " in the background.",
    " in the foreground.",
    " in the background",
    " in the foreground",
    " in background.",
    " in foreground.",
    " in background",
    " in foreground",
    " and",
    " or",
];

// Longest first, so "a close-up of " wins over "a ".
static PREFIXES_BY_LENGTH: LazyLock<Vec<&'static str>> = LazyLock::new(|| by_length(PREFIXES));
static SUFFIXES_BY_LENGTH: LazyLock<Vec<&'static str>> = LazyLock::new(|| by_length(SUFFIXES));

fn by_length(list: &[&'static str]) -> Vec<&'static str> {
    let mut sorted = list.to_vec();
    sorted.sort_by(|a, b| b.len().cmp(&a.len()));
    sorted
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn trim_punctuation(text: &str) -> &str {
    text.trim_matches(|c: char| TRIM_CHARS.contains(&c) || c.is_whitespace())
}

fn normalize_pass(text: &str) -> String {
    let mut text = collapse_whitespace(&text.to_lowercase());

    while text.contains("...") {
        text = text.replace("...", ",").trim().to_string();
    }

    text = trim_punctuation(&text).to_string();

    for suffix in SUFFIXES_BY_LENGTH.iter() {
        if let Some(stripped) = text.strip_suffix(suffix) {
            text = stripped.trim().to_string();
        }
    }

    for prefix in PREFIXES_BY_LENGTH.iter() {
        if let Some(stripped) = text.strip_prefix(prefix) {
            text = stripped.trim().to_string();
        }
    }

    collapse_whitespace(&text)
}

/// Normalizes a caption to a fixed point of one cleaning pass, so
/// compound boilerplate ("a photo of a close-up of ...") is fully removed
/// and `normalize_caption(normalize_caption(x)) == normalize_caption(x)`.
pub fn normalize_caption(text: &str) -> String {
    let mut current = normalize_pass(text);
    loop {
        let next = normalize_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Cleans a translated caption: lowercase, trimmed, no trailing
/// punctuation. Empty results are `None`.
pub fn clean_translation(text: &str) -> Option<String> {
    let lowered = text.to_lowercase();
    let cleaned = lowered
        .trim()
        .trim_end_matches(|c: char| TRIM_CHARS.contains(&c) || c.is_whitespace());

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}
