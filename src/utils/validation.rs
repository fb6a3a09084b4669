use crate::utils::error::{AttendanceError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(AttendanceError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(AttendanceError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(AttendanceError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_positive_number(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(AttendanceError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AttendanceError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

/// 環境變數名稱只允許英數字與底線，且不可以數字開頭
pub fn validate_env_var_name(field_name: &str, name: &str) -> Result<()> {
    let valid = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !valid {
        return Err(AttendanceError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: name.to_string(),
            reason: "Not a valid environment variable name".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("server.base_url", "https://example.com").is_ok());
        assert!(validate_url("server.base_url", "http://localhost:8080/api").is_ok());
        assert!(validate_url("server.base_url", "").is_err());
        assert!(validate_url("server.base_url", "invalid-url").is_err());
        assert!(validate_url("server.base_url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("server.timeout_seconds", 30, 1).is_ok());
        assert!(validate_positive_number("server.timeout_seconds", 0, 1).is_err());
    }

    #[test]
    fn test_validate_env_var_name() {
        assert!(validate_env_var_name("auth.token_env", "ROLLCALL_TOKEN").is_ok());
        assert!(validate_env_var_name("auth.token_env", "_T1").is_ok());
        assert!(validate_env_var_name("auth.token_env", "1TOKEN").is_err());
        assert!(validate_env_var_name("auth.token_env", "MY-TOKEN").is_err());
        assert!(validate_env_var_name("auth.token_env", "").is_err());
    }
}
