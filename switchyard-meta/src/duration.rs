//! Human readable durations used by rate limit windows and token lifetimes.

/// Parses a duration into whole seconds.
///
/// Accepts a bare number of seconds (`"90"`) or a sequence of
/// number-and-unit pairs (`"5m"`, `"1h30m"`, `"2d"`). Recognized units are
/// `s`, `m`/`min`, `h` and `d`. Returns `None` for anything else,
/// including an empty string.
pub fn parse_duration(input: &str) -> Option<u64> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if let Ok(secs) = input.parse::<u64>() {
        return Some(secs);
    }

    let mut total: u64 = 0;
    let mut chars = input.chars().peekable();
    let mut matched = false;

    while chars.peek().is_some() {
        let mut digits = String::new();
        while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
            digits.push(c);
            chars.next();
        }
        let mut unit = String::new();
        while let Some(c) = chars.peek().copied().filter(char::is_ascii_alphabetic) {
            unit.push(c.to_ascii_lowercase());
            chars.next();
        }
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        if digits.is_empty() {
            return None;
        }
        let amount: u64 = digits.parse().ok()?;
        let factor = match unit.as_str() {
            "" | "s" | "sec" => 1,
            "m" | "min" => 60,
            "h" => 3_600,
            "d" => 86_400,
            _ => return None,
        };
        total = total.checked_add(amount.checked_mul(factor)?)?;
        matched = true;
    }

    matched.then_some(total)
}
