use email_address::EmailAddress;
use regex::Regex;
use url::Url;

use crate::errors::{ValidationResult, Validator};

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 30;
pub const PASSWORD_MIN: usize = 6;
pub const BIO_MAX: usize = 500;

/// Returns `true` if the provided string is a syntactically valid email address.
pub fn is_valid_email(value: &str) -> bool {
    EmailAddress::is_valid(value)
}

/// Returns `true` if the provided string parses as a URL with a scheme.
pub fn is_valid_url(value: &str) -> bool {
    Url::parse(value).is_ok()
}

/// Letters, digits, `_` and `.`; claim keys are derived from usernames.
pub fn is_valid_username(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Case-insensitive substring matcher for free-text user search.
pub fn search_pattern(query: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("(?i){}", regex::escape(query)))
}

pub fn validate_registration(username: &str, email: &str, password: &str, full_name: &str) -> ValidationResult<()> {
    Validator::new()
        .length("username", username, USERNAME_MIN, USERNAME_MAX)
        .check(
            is_valid_username(username),
            "username",
            "validation.username",
            "may only contain letters, digits, '_' and '.'",
        )
        .check(
            is_valid_email(email),
            "email",
            "validation.email",
            "value must be a valid email address",
        )
        .check(
            password.chars().count() >= PASSWORD_MIN,
            "password",
            "validation.length",
            format!("length must be at least {PASSWORD_MIN}"),
        )
        .check(
            !full_name.trim().is_empty(),
            "full_name",
            "validation.required",
            "full name is required",
        )
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("test@example.com"));
        assert!(!is_valid_email("invalid"));
    }

    #[test]
    fn url_validation() {
        assert!(is_valid_url("https://example.com"));
        assert!(!is_valid_url("not-a-url"));
    }

    #[test]
    fn username_validation() {
        assert!(is_valid_username("road.runner_42"));
        assert!(!is_valid_username("with space"));
        assert!(!is_valid_username("colon:name"));
    }

    #[test]
    fn search_pattern_escapes_and_ignores_case() {
        let pattern = search_pattern("A.b").unwrap();
        assert!(pattern.is_match("xa.bx"));
        assert!(!pattern.is_match("axb"));
    }

    #[test]
    fn registration_reports_each_bad_field() {
        let err = validate_registration("ab", "nope", "123", " ").unwrap_err();
        let fields: Vec<_> = err.issues.iter().map(|issue| issue.field.as_str()).collect();
        assert_eq!(fields, vec!["username", "email", "password", "full_name"]);
    }
}
