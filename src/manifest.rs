//! Version field embedded in a line-oriented project manifest.
//!
//! Only the bytes of the field value are ever rewritten. Everything else in
//! the file, line endings and comments included, is carried over unchanged.

use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::ops::Range;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, info};

use crate::config::ManifestConfig;
use crate::domain::Version;
use crate::error::{CoordinatorError, Result};
use crate::git::{Identity, Repository};

/// Locates and rewrites the version field of a manifest
#[derive(Debug, Clone)]
pub struct Manifest {
    /// Path relative to the repository workdir
    path: PathBuf,
    section: String,
    field: Regex,
    field_name: String,
}

impl Manifest {
    pub fn new(config: &ManifestConfig) -> Result<Self> {
        let pattern = format!(r#"^\s*{}\s*=\s*"([^"]*)""#, regex::escape(&config.field));
        let field = Regex::new(&pattern)
            .map_err(|e| CoordinatorError::config(format!("Invalid manifest field: {}", e)))?;

        Ok(Manifest {
            path: config.path.clone(),
            section: config.section.clone(),
            field,
            field_name: config.field.clone(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Byte range of the quoted value, or `None` if the field is absent.
    ///
    /// An empty `section` means the top of the file, before any header.
    fn locate(&self, content: &str) -> Option<Range<usize>> {
        let mut offset = 0;
        let mut current = String::new();

        for line in content.split_inclusive('\n') {
            if let Some(name) = section_header(line) {
                current = name.to_string();
            } else if current == self.section {
                if let Some(value) = self.field.captures(line).and_then(|c| c.get(1)) {
                    return Some(offset + value.start()..offset + value.end());
                }
            }
            offset += line.len();
        }
        None
    }

    /// Byte offset just past the section header line, for inserting the field
    fn section_end_of_header(&self, content: &str) -> Option<usize> {
        if self.section.is_empty() {
            return Some(0);
        }
        let mut offset = 0;
        for line in content.split_inclusive('\n') {
            if section_header(line) == Some(self.section.as_str()) {
                return Some(offset + line.len());
            }
            offset += line.len();
        }
        None
    }

    /// Version recorded in `content`; `Ok(None)` when the field is absent
    pub fn parse_version(&self, content: &str) -> Result<Option<Version>> {
        match self.locate(content) {
            Some(range) => Version::parse(&content[range])
                .map(Some)
                .map_err(|e| CoordinatorError::manifest(format!("{}: {}", self.path.display(), e))),
            None => Ok(None),
        }
    }

    /// Content with the field set to `version`, or `None` if nothing can hold it
    pub fn render(&self, content: &str, version: &Version) -> Option<String> {
        let value = version.to_string();
        if let Some(range) = self.locate(content) {
            let mut updated = String::with_capacity(content.len() + value.len());
            updated.push_str(&content[..range.start]);
            updated.push_str(&value);
            updated.push_str(&content[range.end..]);
            return Some(updated);
        }

        let at = self.section_end_of_header(content)?;
        let newline = if content.contains("\r\n") { "\r\n" } else { "\n" };
        let mut updated = String::with_capacity(content.len() + value.len() + 16);
        updated.push_str(&content[..at]);
        if at > 0 && !content[..at].ends_with('\n') {
            updated.push_str(newline);
        }
        updated.push_str(&format!("{} = \"{}\"{}", self.field_name, value, newline));
        updated.push_str(&content[at..]);
        Some(updated)
    }

    /// Read the version from the working tree.
    ///
    /// A missing file or field is the bootstrap state, reported as `Ok(None)`.
    pub fn read_version(&self, workdir: &Path) -> Result<Option<Version>> {
        let full = workdir.join(&self.path);
        match fs::read_to_string(&full) {
            Ok(content) => self.parse_version(&content),
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                debug!(path = %full.display(), "manifest not found");
                Ok(None)
            }
            Err(e) => Err(CoordinatorError::manifest(format!(
                "Cannot read {}: {}",
                full.display(),
                e
            ))),
        }
    }

    /// Version as recorded in the tree of `commit`
    pub fn read_version_at<R: Repository>(&self, repo: &R, commit: git2::Oid) -> Result<Option<Version>> {
        match repo.read_file_at(commit, &self.path)? {
            Some(content) => self.parse_version(&content),
            None => Ok(None),
        }
    }

    /// Rewrite the field and commit it as the automation identity.
    ///
    /// Returns `false` without touching the file or history when the
    /// rendered content equals the current content. Never pushes.
    pub fn write_version<R: Repository>(
        &self,
        repo: &R,
        version: &Version,
        identity: &Identity,
        message: &str,
    ) -> Result<bool> {
        let full = repo.workdir()?.join(&self.path);
        let current = fs::read_to_string(&full).map_err(|e| {
            CoordinatorError::manifest(format!("Cannot read {}: {}", full.display(), e))
        })?;

        let updated = self.render(&current, version).ok_or_else(|| {
            CoordinatorError::manifest(format!(
                "{}: section [{}] not found",
                full.display(),
                self.section
            ))
        })?;

        if updated == current {
            debug!(version = %version, "manifest already up to date");
            return Ok(false);
        }

        write_atomically(&full, &updated)?;
        let oid = repo.commit_file(&self.path, message, identity)?;
        info!(version = %version, commit = %oid, "committed manifest version");
        Ok(true)
    }
}

/// Section name if `line` is a `[header]`, ignoring a trailing `# comment`
fn section_header(line: &str) -> Option<&str> {
    let code = match line.find('#') {
        Some(at) => &line[..at],
        None => line,
    };
    let trimmed = code.trim();
    if !trimmed.starts_with('[') {
        return None;
    }
    Some(
        trimmed
            .trim_start_matches('[')
            .trim_end_matches(']')
            .trim(),
    )
}

/// Write through a sibling file and rename over the target
fn write_atomically(path: &Path, content: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "manifest".to_string());
    let staging = path.with_file_name(format!(".{}.release-tmp", file_name));

    fs::write(&staging, content)
        .and_then(|_| fs::rename(&staging, path))
        .map_err(|e| {
            let _ = fs::remove_file(&staging);
            CoordinatorError::manifest(format!("Cannot write {}: {}", path.display(), e))
        })
}
