use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::error::ApiError;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Serialize, Clone)]
pub struct ValidationIssue {
    pub field: String,
    pub code: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(
        field: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn required(field: &str) -> Self {
        Self::new(field, "required", format!("{field} is required"))
    }
}

pub fn to_payload(issues: &[ValidationIssue]) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for issue in issues {
        map.insert(
            issue.field.clone(),
            serde_json::json!({ "code": issue.code, "message": issue.message }),
        );
    }
    serde_json::json!({ "error": "validation failed", "validation": serde_json::Value::Object(map) })
}

/// `Ok(())` when there are no issues, otherwise a 400 carrying all of them.
pub fn into_result(issues: Vec<ValidationIssue>) -> Result<(), ApiError> {
    if issues.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(to_payload(&issues)))
    }
}

#[inline]
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email.trim())
}

pub fn check_email(issues: &mut Vec<ValidationIssue>, email: Option<&str>) {
    match email.map(str::trim) {
        None | Some("") => issues.push(ValidationIssue::required("email")),
        Some(e) if !is_valid_email(e) => {
            issues.push(ValidationIssue::new("email", "format", "email is not valid"))
        }
        _ => {}
    }
}

pub fn check_password(issues: &mut Vec<ValidationIssue>, password: Option<&str>) {
    match password {
        None | Some("") => issues.push(ValidationIssue::required("password")),
        Some(p) if p.chars().count() < MIN_PASSWORD_LEN => issues.push(ValidationIssue::new(
            "password",
            "too_short",
            format!("password must be at least {MIN_PASSWORD_LEN} characters"),
        )),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("asha@example.in"));
        assert!(is_valid_email("  ravi.k@shop.example.com "));
        assert!(!is_valid_email("asha"));
        assert!(!is_valid_email("asha@localhost"));
        assert!(!is_valid_email("a b@example.com"));
    }

    #[test]
    fn issues_are_keyed_by_field() {
        let mut issues = Vec::new();
        check_email(&mut issues, Some("nope"));
        check_password(&mut issues, Some("short"));
        let payload = to_payload(&issues);
        assert_eq!(payload["validation"]["email"]["code"], "format");
        assert_eq!(payload["validation"]["password"]["code"], "too_short");
        assert!(matches!(into_result(issues), Err(ApiError::Validation(_))));
        assert!(into_result(Vec::new()).is_ok());
    }
}
