//! Session code validation.
//!
//! A session code is the short, human-chosen name a host advertises itself
//! under. It becomes both the mDNS instance name and the host label
//! `<code>.local.`, so it must be a valid DNS label:
//!
//! - 1 to 63 characters
//! - ASCII letters, digits and `-`
//! - must not start or end with `-`
//!
//! Codes are case-insensitive and normalised to lowercase.
//!
//! ## Example
//!
//! ```rust,ignore
//! use lanshare_core::code::SessionCode;
//!
//! let code = SessionCode::parse("Demo")?;
//! assert_eq!(code.as_str(), "demo");
//! ```

use crate::error::{Error, Result};

/// Maximum length of a session code (one DNS label).
pub const MAX_CODE_LENGTH: usize = 63;

/// A validated session code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionCode {
    code: String,
}

impl SessionCode {
    /// Parse and validate a session code from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the code is empty, too long, or contains
    /// characters that cannot appear in a DNS label.
    pub fn parse(input: &str) -> Result<Self> {
        let normalized = input.trim().to_lowercase();

        if normalized.is_empty() {
            return Err(Error::InvalidCodeFormat("code must not be empty".to_string()));
        }

        if normalized.len() > MAX_CODE_LENGTH {
            return Err(Error::InvalidCodeFormat(format!(
                "code must be at most {} characters, got {}",
                MAX_CODE_LENGTH,
                normalized.len()
            )));
        }

        if let Some(c) = normalized
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-'))
        {
            return Err(Error::InvalidCodeFormat(format!(
                "invalid character '{c}' in code"
            )));
        }

        if normalized.starts_with('-') || normalized.ends_with('-') {
            return Err(Error::InvalidCodeFormat(
                "code must not start or end with '-'".to_string(),
            ));
        }

        Ok(Self { code: normalized })
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.code
    }

    /// The `.local` host name a session with this code answers to.
    #[must_use]
    pub fn host_name(&self) -> String {
        format!("{}.local.", self.code)
    }
}

impl std::fmt::Display for SessionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code)
    }
}

impl std::str::FromStr for SessionCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_case() {
        let code = SessionCode::parse("  Demo-42 ").unwrap();
        assert_eq!(code.as_str(), "demo-42");
        assert_eq!(code.to_string(), "demo-42");
        assert_eq!(code.host_name(), "demo-42.local.");
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert!(SessionCode::parse("").is_err());
        assert!(SessionCode::parse("   ").is_err());
        assert!(SessionCode::parse("with space").is_err());
        assert!(SessionCode::parse("dot.ted").is_err());
        assert!(SessionCode::parse("-lead").is_err());
        assert!(SessionCode::parse("trail-").is_err());
        assert!(SessionCode::parse(&"a".repeat(MAX_CODE_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_parse_accepts_max_length() {
        let code = "a".repeat(MAX_CODE_LENGTH);
        assert!(SessionCode::parse(&code).is_ok());
    }

    #[test]
    fn test_equality_is_case_insensitive() {
        assert_eq!(
            SessionCode::parse("DEMO").unwrap(),
            SessionCode::parse("demo").unwrap()
        );
    }
}
