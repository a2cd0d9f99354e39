use crate::utils::error::{BatchError, Result, StageError};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use url::Url;

pub const MAX_KEYWORD_CHARS: usize = 150;

static KEYWORD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^[\w /"!'+?.:-]+$"#).expect("keyword pattern is valid"));

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Checks a keyword before it is sent to the guide endpoint.
pub fn validate_keyword(keyword: &str) -> std::result::Result<(), StageError> {
    let length = keyword.chars().count();
    if length > MAX_KEYWORD_CHARS {
        return Err(StageError::InvalidKeyword {
            reason: format!("{} characters, limit is {}", length, MAX_KEYWORD_CHARS),
        });
    }

    if !KEYWORD_PATTERN.is_match(keyword) {
        let offending: String = keyword
            .chars()
            .filter(|c| !KEYWORD_PATTERN.is_match(&c.to_string()))
            .collect();
        return Err(StageError::InvalidKeyword {
            reason: if keyword.is_empty() {
                "keyword is empty".to_string()
            } else {
                format!("disallowed characters {:?}", offending)
            },
        });
    }

    Ok(())
}

fn invalid(field: &str, value: impl ToString, reason: impl Into<String>) -> BatchError {
    BatchError::InvalidConfigValueError {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// The scoring service root: an absolute http(s) URL with a host.
pub fn validate_base_url(field: &str, value: &str) -> Result<()> {
    let url = Url::parse(value).map_err(|e| invalid(field, value, e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(field, value, format!("{} is not an http(s) scheme", url.scheme())));
    }
    if url.host_str().is_none() {
        return Err(invalid(field, value, "no host"));
    }
    Ok(())
}

/// File arguments must name something; a NUL byte never does.
pub fn validate_file_arg(field: &str, path: &Path) -> Result<()> {
    let shown = path.to_string_lossy();
    if shown.is_empty() || shown.contains('\0') {
        return Err(invalid(field, shown, "not a usable file path"));
    }
    Ok(())
}

pub fn validate_attempts(field: &str, value: u32) -> Result<()> {
    if value == 0 {
        return Err(invalid(field, value, "at least one attempt is needed"));
    }
    Ok(())
}

/// The vendor key; unset and blank are both missing.
pub fn require_api_key<'a>(env_var: &str, key: &'a Option<String>) -> Result<&'a str> {
    key.as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| BatchError::MissingConfigError {
            field: env_var.to_string(),
        })
}

pub fn validate_not_blank(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(field, value, "must not be blank"));
    }
    Ok(())
}
