use std::sync::LazyLock;

use chrono::{Local, NaiveDate, NaiveDateTime};
use regex::Regex;
use strum_macros::EnumString;

use crate::binder::cast::{to_float, to_int};

static MOBILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^1[3-9][0-9]{9}$").expect("Valid regex pattern"));

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$")
        .expect("Valid regex pattern")
});

static IDCARD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[1-9][0-9]{5}(18|19|20)[0-9]{2}(0[1-9]|1[0-2])([0-2][1-9]|10|20|30|31)[0-9]{3}[0-9Xx]$")
        .expect("Valid regex pattern")
});

/// Validators understood without registering a [`RuleChecker`](super::RuleChecker).
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(ascii_case_insensitive)]
pub(crate) enum BuiltinRule {
    Required,
    EqualsWith,
    Int,
    IntEq,
    IntNe,
    IntGt,
    IntGe,
    IntLt,
    IntLe,
    IntBetween,
    IntIn,
    IntNotIn,
    Float,
    FloatEq,
    FloatNe,
    FloatGt,
    FloatGe,
    FloatLt,
    FloatLe,
    FloatBetween,
    StrEq,
    StrEqI,
    StrNe,
    StrNeI,
    StrIn,
    StrInI,
    StrNotIn,
    StrNotInI,
    StrLen,
    StrLenGt,
    StrLenGe,
    StrLenLt,
    StrLenLe,
    StrLenBetween,
    Alphas,
    Numbers,
    Alnum,
    Email,
    Mobile,
    PasswordTooSimple,
    Idcard,
    Date,
    DateTime,
    FutureDate,
    PastDate,
    Regexp,
}

impl BuiltinRule {
    /// Runs the check on a non-empty value. `Required` and `EqualsWith` are
    /// resolved by the validator itself.
    pub(crate) fn check(self, value: &str, check_value: &str) -> bool {
        use BuiltinRule::*;

        match self {
            Required | EqualsWith => true,
            Int => is_int(value),
            IntEq => int_cmp(value, check_value, |a, b| a == b),
            IntNe => int_cmp(value, check_value, |a, b| a != b),
            IntGt => int_cmp(value, check_value, |a, b| a > b),
            IntGe => int_cmp(value, check_value, |a, b| a >= b),
            IntLt => int_cmp(value, check_value, |a, b| a < b),
            IntLe => int_cmp(value, check_value, |a, b| a <= b),
            IntBetween => int_between(value, check_value),
            IntIn => int_in(value, check_value),
            IntNotIn => is_int(value) && !int_in(value, check_value),
            Float => is_float(value),
            FloatEq => float_cmp(value, check_value, |a, b| a == b),
            FloatNe => float_cmp(value, check_value, |a, b| a != b),
            FloatGt => float_cmp(value, check_value, |a, b| a > b),
            FloatGe => float_cmp(value, check_value, |a, b| a >= b),
            FloatLt => float_cmp(value, check_value, |a, b| a < b),
            FloatLe => float_cmp(value, check_value, |a, b| a <= b),
            FloatBetween => float_between(value, check_value),
            StrEq => value == check_value,
            StrEqI => value.to_lowercase() == check_value.to_lowercase(),
            StrNe => value != check_value,
            StrNeI => value.to_lowercase() != check_value.to_lowercase(),
            StrIn => str_in(value, check_value, false),
            StrInI => str_in(value, check_value, true),
            StrNotIn => !str_in(value, check_value, false),
            StrNotInI => !str_in(value, check_value, true),
            StrLen => len_cmp(value, check_value, |n, m| n == m),
            StrLenGt => len_cmp(value, check_value, |n, m| n > m),
            StrLenGe => len_cmp(value, check_value, |n, m| n >= m),
            StrLenLt => len_cmp(value, check_value, |n, m| n < m),
            StrLenLe => len_cmp(value, check_value, |n, m| n <= m),
            StrLenBetween => len_between(value, check_value),
            Alphas => value.chars().all(|c| c.is_ascii_alphabetic()),
            Numbers => value.chars().all(|c| c.is_ascii_digit()),
            Alnum => value.chars().all(|c| c.is_ascii_alphanumeric()),
            Email => EMAIL.is_match(value),
            Mobile => MOBILE.is_match(value),
            PasswordTooSimple => !password_too_simple(value),
            Idcard => is_idcard(value),
            Date => parse_date(value).is_some(),
            DateTime => parse_datetime(value).is_some(),
            FutureDate => parse_date(value).is_some_and(|d| d > Local::now().date_naive()),
            PastDate => parse_date(value).is_some_and(|d| d < Local::now().date_naive()),
            Regexp => matches_pattern(value, check_value),
        }
    }

    pub(crate) fn default_message(self) -> &'static str {
        match self {
            BuiltinRule::Mobile => "invalid mobile number",
            BuiltinRule::Email => "invalid email address",
            BuiltinRule::PasswordTooSimple => "password is too simple",
            BuiltinRule::Idcard => "invalid id card number",
            _ => "must be filled",
        }
    }
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.trim().split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn is_int(value: &str) -> bool {
    value.trim().parse::<i64>().is_ok()
}

fn is_float(value: &str) -> bool {
    to_float(value).is_some()
}

fn int_cmp(value: &str, check_value: &str, op: fn(i64, i64) -> bool) -> bool {
    if !is_int(value) {
        return false;
    }
    match (to_int(value), to_int(check_value)) {
        (Some(a), Some(b)) => op(a, b),
        _ => false,
    }
}

fn int_between(value: &str, range: &str) -> bool {
    if !is_int(value) {
        return false;
    }
    let bounds: Vec<i64> = split_list(range)
        .filter(|p| is_int(p))
        .filter_map(to_int)
        .take(2)
        .collect();
    match (to_int(value), bounds.as_slice()) {
        (Some(n), [low, high]) => n >= *low && n <= *high,
        _ => false,
    }
}

fn int_in(value: &str, range: &str) -> bool {
    if !is_int(value) {
        return false;
    }
    let Some(n) = to_int(value) else {
        return false;
    };
    split_list(range)
        .filter(|p| is_int(p))
        .filter_map(to_int)
        .any(|m| m == n)
}

/// Floats compare at six decimal places.
fn scaled(f: f64) -> i64 {
    (f * 1_000_000.0).round() as i64
}

fn float_cmp(value: &str, check_value: &str, op: fn(i64, i64) -> bool) -> bool {
    match (to_float(value), to_float(check_value)) {
        (Some(a), Some(b)) => op(scaled(a), scaled(b)),
        _ => false,
    }
}

fn float_between(value: &str, range: &str) -> bool {
    let bounds: Vec<i64> = split_list(range).filter_map(to_float).map(scaled).take(2).collect();
    match (to_float(value).map(scaled), bounds.as_slice()) {
        (Some(n), [low, high]) => n >= *low && n <= *high,
        _ => false,
    }
}

fn str_in(value: &str, list: &str, ignore_case: bool) -> bool {
    if ignore_case {
        let value = value.to_lowercase();
        split_list(list).any(|s| s.to_lowercase() == value)
    } else {
        split_list(list).any(|s| s == value)
    }
}

fn len_cmp(value: &str, check_value: &str, op: fn(usize, usize) -> bool) -> bool {
    match to_int(check_value) {
        Some(m) if m >= 1 => op(value.chars().count(), m as usize),
        _ => false,
    }
}

fn len_between(value: &str, range: &str) -> bool {
    let bounds: Vec<usize> = split_list(range)
        .filter_map(to_int)
        .filter(|n| *n >= 0)
        .map(|n| n as usize)
        .take(2)
        .collect();
    match bounds.as_slice() {
        [low, high] => {
            let n = value.chars().count();
            n >= *low && n <= *high
        }
        _ => false,
    }
}

fn password_too_simple(value: &str) -> bool {
    let has_alpha = value.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = value.chars().any(|c| c.is_ascii_digit());
    value.chars().count() < 8 || !has_alpha || !has_digit
}

fn is_idcard(value: &str) -> bool {
    const WEIGHTS: [u32; 17] = [7, 9, 10, 5, 8, 4, 2, 1, 6, 3, 7, 9, 10, 5, 8, 4, 2];
    const CHECKSUM: [char; 11] = ['1', '0', 'x', '9', '8', '7', '6', '5', '4', '3', '2'];

    if !IDCARD.is_match(value) {
        return false;
    }
    let sum: u32 = value
        .chars()
        .take(17)
        .zip(WEIGHTS)
        .filter_map(|(c, w)| c.to_digit(10).map(|d| d * w))
        .sum();
    value
        .chars()
        .nth(17)
        .is_some_and(|c| c.to_ascii_lowercase() == CHECKSUM[(sum % 11) as usize])
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

/// Accepts bare patterns as well as `/pattern/` with `i` flag support.
fn matches_pattern(value: &str, pattern: &str) -> bool {
    let pattern = pattern.trim();
    let source = match pattern.strip_prefix('/').and_then(|p| p.rsplit_once('/')) {
        Some((body, flags)) if flags.contains('i') => format!("(?i){body}"),
        Some((body, _)) => body.to_string(),
        None => pattern.to_string(),
    };
    Regex::new(&source).is_ok_and(|re| re.is_match(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::str::FromStr;

    #[test]
    fn test_rule_names_are_case_insensitive() {
        assert_eq!(BuiltinRule::from_str("intbetween").ok(), Some(BuiltinRule::IntBetween));
        assert_eq!(BuiltinRule::from_str("StrLenGe").ok(), Some(BuiltinRule::StrLenGe));
        assert!(BuiltinRule::from_str("NoSuchRule").is_err());
    }

    #[test]
    fn test_integer_rules() {
        assert!(BuiltinRule::Int.check("42", ""));
        assert!(!BuiltinRule::Int.check("4.2", ""));
        assert!(BuiltinRule::IntGe.check("18", "18"));
        assert!(!BuiltinRule::IntGt.check("18", "18"));
        assert!(BuiltinRule::IntBetween.check("5", "1, 10"));
        assert!(!BuiltinRule::IntBetween.check("11", "1,10"));
        assert!(!BuiltinRule::IntBetween.check("5", "1"));
        assert!(BuiltinRule::IntIn.check("3", "1,2,3"));
        assert!(BuiltinRule::IntNotIn.check("4", "1,2,3"));
        assert!(!BuiltinRule::IntNotIn.check("abc", "1,2,3"));
    }

    #[test]
    fn test_float_rules_compare_at_six_places() {
        assert!(BuiltinRule::FloatEq.check("0.1000001", "0.1"));
        assert!(BuiltinRule::FloatLt.check("1.5", "2"));
        assert!(BuiltinRule::FloatBetween.check("2.5", "2.5,3"));
        assert!(!BuiltinRule::Float.check("x1", ""));
    }

    #[test]
    fn test_string_rules() {
        assert!(BuiltinRule::StrEqI.check("Yes", "yes"));
        assert!(BuiltinRule::StrInI.check("RED", "red, green"));
        assert!(!BuiltinRule::StrIn.check("RED", "red, green"));
        assert!(BuiltinRule::StrLen.check("中文", "2"));
        assert!(!BuiltinRule::StrLen.check("abc", "0"));
        assert!(BuiltinRule::StrLenBetween.check("abcd", "2,4"));
        assert!(BuiltinRule::Alnum.check("abc123", ""));
        assert!(!BuiltinRule::Alphas.check("abc123", ""));
    }

    #[test]
    fn test_format_rules() {
        assert!(BuiltinRule::Email.check("dev@example.com", ""));
        assert!(!BuiltinRule::Email.check("dev@", ""));
        assert!(BuiltinRule::Mobile.check("13800138000", ""));
        assert!(BuiltinRule::Idcard.check("11010519491231002X", ""));
        assert!(!BuiltinRule::Idcard.check("110105194912310021", ""));
        assert!(BuiltinRule::PasswordTooSimple.check("s3cretpass", ""));
        assert!(!BuiltinRule::PasswordTooSimple.check("12345678", ""));
        assert!(BuiltinRule::Regexp.check("ABC", "/^abc$/i"));
        assert!(!BuiltinRule::Regexp.check("ABC", "/^abc$/"));
    }

    #[test]
    fn test_date_rules() {
        let tomorrow = (Local::now().date_naive() + Duration::days(1)).format("%Y-%m-%d").to_string();
        assert!(BuiltinRule::Date.check("2024-02-29", ""));
        assert!(!BuiltinRule::Date.check("2023-02-29", ""));
        assert!(BuiltinRule::DateTime.check("2024-01-01 08:30:00", ""));
        assert!(BuiltinRule::FutureDate.check(&tomorrow, ""));
        assert!(!BuiltinRule::PastDate.check(&tomorrow, ""));
        assert!(BuiltinRule::PastDate.check("2000-01-01", ""));
    }
}
