//! Rule-driven validation of request data.
//!
//! A rule reads `field@Validator:checkValue@msg:custom text`. The validator
//! part is optional and defaults to `Required`. A rule carrying
//! `@CheckOnNotEmpty` (or its alias `@WithNotEmpty`) is only checked when the
//! field has a value.

mod rules;

use std::str::FromStr;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::binder::cast::value_to_string;
use crate::error::ValidationError;
use rules::BuiltinRule;

const MODIFIERS: [&str; 2] = ["@CheckOnNotEmpty", "@WithNotEmpty"];

/// A named check that extends the built-in validators.
pub trait RuleChecker: Send + Sync + 'static {
    fn rule_name(&self) -> &str;

    fn check(&self, value: &str, check_value: &str) -> bool;
}

/// One parsed rule line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRule {
    pub field: String,
    pub validator: String,
    pub check_value: String,
    pub message: Option<String>,
    pub check_on_not_empty: bool,
}

impl ValidationRule {
    pub fn parse(raw: &str) -> Self {
        let mut rule = raw.to_string();
        let mut check_on_not_empty = false;
        for modifier in MODIFIERS {
            if rule.contains(modifier) {
                check_on_not_empty = true;
                rule = rule.replace(modifier, "");
            }
        }

        let mut message = None;
        if let Some(pos) = rule.rfind("@msg:") {
            let text = rule[pos + "@msg:".len()..].trim();
            if !text.is_empty() {
                message = Some(text.to_string());
            }
            rule.truncate(pos);
        }

        let (field, validator, check_value) = match rule.split_once('@') {
            Some((field, spec)) => match spec.split_once(':') {
                Some((validator, check)) => (field, validator.trim(), check.trim()),
                None => (field, spec.trim(), ""),
            },
            None => (rule.as_str(), "Required", ""),
        };

        Self {
            field: field.trim().to_string(),
            validator: if validator.is_empty() { "Required" } else { validator }.to_string(),
            check_value: check_value.to_string(),
            message,
            check_on_not_empty,
        }
    }
}

/// Runs rule lists against request data.
#[derive(Clone, Default)]
pub struct DataValidator {
    checkers: Vec<Arc<dyn RuleChecker>>,
}

impl DataValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a custom checker. A checker whose name matches an already
    /// registered one, ignoring case, is dropped.
    pub fn add_rule_checker<R: RuleChecker>(&mut self, checker: R) -> &mut Self {
        let exists = self
            .checkers
            .iter()
            .any(|c| c.rule_name().eq_ignore_ascii_case(checker.rule_name()));
        if !exists {
            self.checkers.push(Arc::new(checker));
        }
        self
    }

    fn custom(&self, name: &str) -> Option<&Arc<dyn RuleChecker>> {
        self.checkers.iter().find(|c| c.rule_name().eq_ignore_ascii_case(name))
    }

    /// Validates `data` against `rules`.
    ///
    /// Fail-fast mode stops at the first failing rule. Otherwise every field
    /// reports the message of its first failing rule.
    pub fn validate(
        &self,
        data: &Map<String, Value>,
        rules: &[String],
        failfast: bool,
    ) -> Result<(), ValidationError> {
        let mut errors: IndexMap<String, String> = IndexMap::new();

        for raw in rules.iter().filter(|r| !r.trim().is_empty()) {
            let rule = ValidationRule::parse(raw);
            if !failfast && errors.contains_key(&rule.field) {
                continue;
            }
            if self.passes(data, &rule) {
                continue;
            }

            let message = rule.message.clone().unwrap_or_else(|| {
                BuiltinRule::from_str(&rule.validator)
                    .map(BuiltinRule::default_message)
                    .unwrap_or("must be filled")
                    .to_string()
            });
            if failfast {
                return Err(ValidationError::FailFast(message));
            }
            errors.insert(rule.field, message);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::Fields(errors))
        }
    }

    fn passes(&self, data: &Map<String, Value>, rule: &ValidationRule) -> bool {
        let value = lookup(data, &rule.field);
        if value.is_empty() {
            return rule.check_on_not_empty;
        }

        match BuiltinRule::from_str(&rule.validator) {
            Ok(BuiltinRule::EqualsWith) => value == lookup(data, &rule.check_value),
            Ok(builtin) => builtin.check(&value, &rule.check_value),
            Err(_) => match self.custom(&rule.validator) {
                Some(checker) => checker.check(&value, &rule.check_value),
                None => {
                    tracing::warn!(validator = %rule.validator, "unknown validator, rule ignored");
                    true
                }
            },
        }
    }
}

/// String value of `key`, descending into nested objects on dots when the
/// key is not present verbatim.
fn lookup(data: &Map<String, Value>, key: &str) -> String {
    if let Some(value) = data.get(key) {
        return value_to_string(value).trim().to_string();
    }

    let mut parts = key.split('.');
    let Some(first) = parts.next() else {
        return String::new();
    };
    let mut current = data.get(first);
    for part in parts {
        current = match current {
            Some(Value::Object(map)) => map.get(part),
            Some(Value::Array(items)) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
    }
    current.map(value_to_string).unwrap_or_default().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn rules(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|s| s.to_string()).collect()
    }

    struct EvenChecker;

    impl RuleChecker for EvenChecker {
        fn rule_name(&self) -> &str {
            "Even"
        }

        fn check(&self, value: &str, _check_value: &str) -> bool {
            value.parse::<i64>().is_ok_and(|n| n % 2 == 0)
        }
    }

    #[test]
    fn test_parse_full_rule() {
        let rule = ValidationRule::parse("age@IntBetween:1,120@msg: age out of range");
        assert_eq!(rule.field, "age");
        assert_eq!(rule.validator, "IntBetween");
        assert_eq!(rule.check_value, "1,120");
        assert_eq!(rule.message.as_deref(), Some("age out of range"));
        assert!(!rule.check_on_not_empty);
    }

    #[test]
    fn test_parse_defaults_to_required() {
        let rule = ValidationRule::parse(" name ");
        assert_eq!(rule.field, "name");
        assert_eq!(rule.validator, "Required");
        assert!(rule.message.is_none());

        let rule = ValidationRule::parse("email@Email@WithNotEmpty");
        assert_eq!(rule.validator, "Email");
        assert!(rule.check_on_not_empty);
    }

    #[test]
    fn test_failfast_returns_first_message() {
        let validator = DataValidator::new();
        let result = validator.validate(
            &data(json!({ "age": "200" })),
            &rules(&["name@msg:name is required", "age@IntLe:120@msg:too old"]),
            true,
        );
        assert_eq!(result, Err(ValidationError::FailFast("name is required".to_string())));
    }

    #[test]
    fn test_accumulated_keeps_first_error_per_field() {
        let validator = DataValidator::new();
        let result = validator.validate(
            &data(json!({ "age": "abc" })),
            &rules(&[
                "age@Int@msg:age must be a number",
                "age@IntGe:18@msg:must be adult",
                "mobile@Mobile",
            ]),
            false,
        );
        let Err(ValidationError::Fields(errors)) = result else {
            panic!("expected field errors");
        };
        assert_eq!(errors.len(), 2);
        assert_eq!(errors["age"], "age must be a number");
        assert_eq!(errors["mobile"], "invalid mobile number");
    }

    #[test]
    fn test_check_on_not_empty_skips_missing_field() {
        let validator = DataValidator::new();
        let input = data(json!({ "email": "" }));
        assert!(validator
            .validate(&input, &rules(&["email@Email@CheckOnNotEmpty"]), true)
            .is_ok());
        assert!(validator.validate(&input, &rules(&["email@Email"]), true).is_err());
    }

    #[test]
    fn test_equals_with_and_dotted_lookup() {
        let validator = DataValidator::new();
        let input = data(json!({
            "password": "abc12345",
            "confirm": "abc12345",
            "profile": { "tags": ["a", "b"], "city": "Paris" }
        }));
        let result = validator.validate(
            &input,
            &rules(&[
                "confirm@EqualsWith:password",
                "profile.city@StrIn:Paris,Rome",
                "profile.tags.1@StrEq:b",
            ]),
            false,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_custom_checker_registration() {
        let mut validator = DataValidator::new();
        validator.add_rule_checker(EvenChecker).add_rule_checker(EvenChecker);
        assert_eq!(validator.checkers.len(), 1);

        let result = validator.validate(
            &data(json!({ "n": 3 })),
            &rules(&["n@even@msg:n must be even"]),
            true,
        );
        assert_eq!(result, Err(ValidationError::FailFast("n must be even".to_string())));
    }

    #[test]
    fn test_unknown_validator_passes() {
        let validator = DataValidator::new();
        let result = validator.validate(&data(json!({ "n": 3 })), &rules(&["n@Mystery"]), true);
        assert!(result.is_ok());
    }
}
