//! Markup scrubbing and decimal normalization for request strings.

use std::sync::LazyLock;

use regex::Regex;
use switchyard_meta::SanitizeMode;

static TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->|<[^>]*>").expect("Valid regex pattern"));

static DANGEROUS_BLOCKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|iframe|object|embed|applet)\b[^>]*>.*?</\s*(script|style|iframe|object|embed|applet)\s*>")
        .expect("Valid regex pattern")
});

static DANGEROUS_TAGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?\s*(script|style|iframe|object|embed|applet|link|meta|base|form)\b[^>]*>")
        .expect("Valid regex pattern")
});

static EVENT_ATTRS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\s+on[a-z]+\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#).expect("Valid regex pattern")
});

static SCRIPT_URLS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(href|src|action)\s*=\s*("\s*javascript:[^"]*"|'\s*javascript:[^']*'|javascript:[^\s>]*)"#)
        .expect("Valid regex pattern")
});

pub fn apply(mode: SanitizeMode, input: &str) -> String {
    match mode {
        SanitizeMode::None => input.to_string(),
        SanitizeMode::StripTags => strip_tags(input),
        SanitizeMode::HtmlPurify => purify_html(input),
    }
}

/// Removes every tag and comment, keeping text content.
pub fn strip_tags(input: &str) -> String {
    TAGS.replace_all(input, "").into_owned()
}

/// Keeps benign markup but drops script-capable elements, event handler
/// attributes and `javascript:` URLs.
pub fn purify_html(input: &str) -> String {
    let out = DANGEROUS_BLOCKS.replace_all(input, "");
    let out = DANGEROUS_TAGS.replace_all(&out, "");
    let out = EVENT_ATTRS.replace_all(&out, "");
    SCRIPT_URLS.replace_all(&out, "${1}=\"\"").into_owned()
}

/// Normalizes a decimal string to exactly two fraction digits, truncating
/// extra digits. Anything that is not a plain decimal becomes `0.00`.
pub fn decimal2(input: &str) -> String {
    let input = input.trim();
    let (negative, digits) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input.strip_prefix('+').unwrap_or(input)),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
    let valid = !(int_part.is_empty() && frac_part.is_empty())
        && int_part.chars().all(|c| c.is_ascii_digit())
        && frac_part.chars().all(|c| c.is_ascii_digit());
    if !valid {
        return "0.00".to_string();
    }

    let int_part = int_part.trim_start_matches('0');
    let int_part = if int_part.is_empty() { "0" } else { int_part };
    let mut frac: String = frac_part.chars().take(2).collect();
    while frac.len() < 2 {
        frac.push('0');
    }

    let is_zero = int_part == "0" && frac == "00";
    if negative && !is_zero {
        format!("-{int_part}.{frac}")
    } else {
        format!("{int_part}.{frac}")
    }
}
