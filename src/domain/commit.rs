use regex::Regex;
use std::sync::OnceLock;

use crate::config::ConventionalCommitsConfig;
use crate::domain::VersionBump;

/// Parsed representation of a conventional commit message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommit {
    pub r#type: String,
    pub scope: Option<String>,
    pub description: String,
    pub is_breaking_change: bool,
    /// Whether the header followed the conventional format at all
    pub conventional: bool,
}

/// Release-notes grouping for a commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChangeKind {
    Breaking,
    Feature,
    Fix,
    Other,
}

fn header_regex() -> &'static Regex {
    static HEADER: OnceLock<Regex> = OnceLock::new();
    HEADER.get_or_init(|| {
        Regex::new(r"^([a-z]+)(?:\(([^)]+)\))?(!?):\s*(.*)$").expect("valid header regex")
    })
}

impl ParsedCommit {
    /// Parse a commit message according to conventional commits
    ///
    /// Supports `type(scope)!: description` with optional scope and `!`.
    /// Breaking footers are matched against `indicators`.
    pub fn parse(message: &str, indicators: &[String]) -> Self {
        let header = message.lines().next().unwrap_or("").trim_end();
        let footer_breaking = indicators.iter().any(|i| message.contains(i.as_str()));

        match header_regex().captures(header) {
            Some(captures) => {
                let r#type = captures
                    .get(1)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                let scope = captures.get(2).map(|m| m.as_str().to_string());
                let has_exclamation = captures.get(3).map(|m| m.as_str()) == Some("!");
                let description = captures
                    .get(4)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();

                ParsedCommit {
                    r#type,
                    scope,
                    description,
                    is_breaking_change: has_exclamation || footer_breaking,
                    conventional: true,
                }
            }
            None => ParsedCommit {
                r#type: String::new(),
                scope: None,
                description: header.to_string(),
                is_breaking_change: false,
                conventional: false,
            },
        }
    }

    /// The release marker this commit carries, if any.
    ///
    /// Non-conventional commits never carry a marker, even with a breaking footer.
    pub fn bump(&self, config: &ConventionalCommitsConfig) -> Option<VersionBump> {
        if !self.conventional {
            return None;
        }
        if self.is_breaking_change {
            Some(VersionBump::Major)
        } else if config.feature_types.contains(&self.r#type) {
            Some(VersionBump::Minor)
        } else if config.fix_types.contains(&self.r#type) {
            Some(VersionBump::Patch)
        } else {
            None
        }
    }

    pub fn change_kind(&self, config: &ConventionalCommitsConfig) -> ChangeKind {
        match self.bump(config) {
            Some(VersionBump::Major) => ChangeKind::Breaking,
            Some(VersionBump::Minor) => ChangeKind::Feature,
            Some(VersionBump::Patch) => ChangeKind::Fix,
            None => ChangeKind::Other,
        }
    }
}
