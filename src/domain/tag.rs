use crate::domain::Version;
use crate::error::{CoordinatorError, Result};

/// Tag naming pattern (e.g., "v{version}", "release-{version}")
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPattern {
    prefix: String,
    suffix: String,
}

impl TagPattern {
    /// Create a tag pattern; it must contain exactly one `{version}` placeholder
    pub fn new(pattern: &str) -> Result<Self> {
        let parts: Vec<&str> = pattern.split("{version}").collect();
        if parts.len() != 2 {
            return Err(CoordinatorError::tag(format!(
                "Pattern '{}' must contain exactly one {{version}} placeholder",
                pattern
            )));
        }

        Ok(TagPattern {
            prefix: parts[0].to_string(),
            suffix: parts[1].to_string(),
        })
    }

    /// Format a version according to pattern
    /// Example: pattern="v{version}", version=1.2.3 -> "v1.2.3"
    pub fn format(&self, version: &Version) -> String {
        format!("{}{}{}", self.prefix, version, self.suffix)
    }

    /// Floating major tag for a version: "v{version}" -> "v1"
    pub fn major_tag(&self, version: &Version) -> String {
        format!("{}{}{}", self.prefix, version.major, self.suffix)
    }

    /// Extract the version from a tag that matches this pattern
    pub fn parse(&self, tag: &str) -> Option<Version> {
        let inner = tag
            .strip_prefix(self.prefix.as_str())?
            .strip_suffix(self.suffix.as_str())?;
        // Reject the prefix-less forms Version::parse would otherwise accept
        if !inner.starts_with(|c: char| c.is_ascii_digit()) {
            return None;
        }
        Version::parse(inner).ok()
    }

    /// Matches the pattern and looks dotted-numeric, yet does not parse.
    ///
    /// Floating major tags (`v1`) are not malformed.
    pub fn is_malformed(&self, tag: &str) -> bool {
        let inner = match tag
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_suffix(self.suffix.as_str()))
        {
            Some(inner) => inner,
            None => return false,
        };
        inner.starts_with(|c: char| c.is_ascii_digit())
            && inner.contains('.')
            && self.parse(tag).is_none()
    }
}
