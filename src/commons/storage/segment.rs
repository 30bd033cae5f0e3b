use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::commons::storage::Scope;

/// A nonempty string that does not start or end with whitespace, does not
/// contain any instances of [`Scope::SEPARATOR`] and is neither `.` nor `..`.
///
/// Segments make up the scopes and names of keys in the key-value store,
/// and end up as directory and file names in the disk backend.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct SegmentBuf(String);

impl SegmentBuf {
    /// Parse a segment from a string.
    ///
    /// # Errors
    /// If the string is empty, starts or ends with whitespace, contains a
    /// [`Scope::SEPARATOR`] or is a relative path component, a
    /// [`ParseSegmentError`] variant will be returned.
    pub fn parse(value: &str) -> Result<Self, ParseSegmentError> {
        if value.is_empty() {
            Err(ParseSegmentError::Empty)
        } else if value.starts_with(char::is_whitespace) || value.ends_with(char::is_whitespace) {
            Err(ParseSegmentError::TrailingWhitespace)
        } else if value.contains(Scope::SEPARATOR) {
            Err(ParseSegmentError::ContainsSeparator)
        } else if value == "." || value == ".." {
            Err(ParseSegmentError::Reserved)
        } else {
            Ok(SegmentBuf(value.to_string()))
        }
    }

    /// Parses a segment, replacing offending characters if needed.
    pub fn parse_lossy(value: &str) -> Self {
        match Self::parse(value) {
            Ok(segment) => segment,
            Err(error) => {
                let sanitized = value.trim().replace(Scope::SEPARATOR, "+");
                let segment = if sanitized.is_empty() {
                    "EMPTY".to_string()
                } else if sanitized == "." || sanitized == ".." {
                    sanitized.replace('.', "+")
                } else {
                    sanitized
                };
                warn!("{value} is not a valid Segment: {error}\nusing {segment} instead");
                SegmentBuf(segment)
            }
        }
    }

    /// Creates a new segment by appending a suffix, e.g. a file extension.
    pub fn with_suffix(&self, suffix: &str) -> Self {
        SegmentBuf::parse_lossy(&format!("{}{}", self.0, suffix))
    }

    /// Return the encapsulated string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SegmentBuf {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SegmentBuf {
    type Err = ParseSegmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SegmentBuf {
    type Error = ParseSegmentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SegmentBuf> for String {
    fn from(segment: SegmentBuf) -> Self {
        segment.0
    }
}

impl AsRef<str> for SegmentBuf {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Represents all ways parsing a string as a [`SegmentBuf`] can fail.
#[derive(Debug)]
pub enum ParseSegmentError {
    TrailingWhitespace,
    Empty,
    ContainsSeparator,
    Reserved,
}

impl Display for ParseSegmentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseSegmentError::TrailingWhitespace => "segments must not start or end with whitespace",
            ParseSegmentError::Empty => "segments must be nonempty",
            ParseSegmentError::ContainsSeparator => "segments must not contain scope separators",
            ParseSegmentError::Reserved => "segments must not be '.' or '..'",
        }
        .fmt(f)
    }
}

impl std::error::Error for ParseSegmentError {}

#[cfg(test)]
mod tests {
    use super::{ParseSegmentError, Scope, SegmentBuf};

    #[test]
    fn test_trailing_separator_fails() {
        assert!(SegmentBuf::parse(&format!("test{}", Scope::SEPARATOR)).is_err());
    }

    #[test]
    fn test_trailing_whitespace_fails() {
        assert!(SegmentBuf::parse("test ").is_err());
        assert!(SegmentBuf::parse("test\t").is_err());
        assert!(SegmentBuf::parse("test\n").is_err());
    }

    #[test]
    fn test_leading_whitespace_fails() {
        assert!(SegmentBuf::parse(" test").is_err());
        assert!(SegmentBuf::parse("\ttest").is_err());
    }

    #[test]
    fn test_empty_fails() {
        assert!(SegmentBuf::parse("").is_err());
    }

    #[test]
    fn test_dot_segments_fail() {
        assert!(matches!(SegmentBuf::parse("."), Err(ParseSegmentError::Reserved)));
        assert!(matches!(SegmentBuf::parse(".."), Err(ParseSegmentError::Reserved)));
        assert!(SegmentBuf::parse("...").is_ok());
        assert!(SegmentBuf::parse(".hidden").is_ok());
        assert_eq!(SegmentBuf::parse_lossy("..").as_str(), "++");
    }

    #[test]
    fn test_containing_space_succeeds() {
        assert!(SegmentBuf::parse("te st").is_ok());
    }

    #[test]
    fn test_parse_lossy_sanitizes() {
        assert_eq!(SegmentBuf::parse_lossy(" a/b ").as_str(), "a+b");
        assert_eq!(SegmentBuf::parse_lossy("  ").as_str(), "EMPTY");
    }

    #[test]
    fn test_serde_rejects_invalid() {
        assert!(serde_json::from_str::<SegmentBuf>(r#""node-1""#).is_ok());
        assert!(serde_json::from_str::<SegmentBuf>(r#""a/b""#).is_err());
    }
}
