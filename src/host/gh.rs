use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde::Deserialize;
use tracing::debug;

use crate::error::{CoordinatorError, Result};
use crate::host::{ReleaseHost, ReleaseRecord, ReleaseRequest};

/// Release host backed by the GitHub CLI
///
/// Authentication is whatever `gh` itself resolves (`GH_TOKEN`,
/// `GITHUB_TOKEN` or a stored login).
pub struct GhCliHost {
    program: PathBuf,
    workdir: PathBuf,
    /// `owner/name`; when absent `gh` infers it from the checkout's remotes
    repository: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ViewOutput {
    tag_name: String,
}

impl GhCliHost {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        GhCliHost {
            program: PathBuf::from("gh"),
            workdir: workdir.into(),
            repository: None,
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    fn run(&self, args: &[String]) -> Result<Output> {
        let mut cmd = Command::new(&self.program);
        cmd.current_dir(&self.workdir).args(args);
        if let Some(repository) = &self.repository {
            cmd.arg("--repo").arg(repository);
        }
        debug!(program = %self.program.display(), ?args, "invoking release host");

        cmd.output().map_err(|e| {
            CoordinatorError::release(format!(
                "Failed to execute {}: {}",
                self.program.display(),
                e
            ))
        })
    }

    pub(crate) fn create_args(request: &ReleaseRequest) -> Vec<String> {
        let mut args = vec![
            "release".to_string(),
            "create".to_string(),
            request.tag.clone(),
        ];
        args.extend(
            request
                .artifacts
                .iter()
                .map(|p| p.to_string_lossy().to_string()),
        );
        args.extend([
            "--verify-tag".to_string(),
            "--title".to_string(),
            request.title.clone(),
            "--notes".to_string(),
            request.notes.clone(),
            format!("--latest={}", request.latest),
        ]);
        if request.draft {
            args.push("--draft".to_string());
        }
        args
    }
}

fn asset_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

impl ReleaseHost for GhCliHost {
    fn release_exists(&self, tag: &str) -> Result<bool> {
        let args = vec![
            "release".to_string(),
            "view".to_string(),
            tag.to_string(),
            "--json".to_string(),
            "tagName".to_string(),
        ];
        let output = self.run(&args)?;

        if output.status.success() {
            let view: ViewOutput = serde_json::from_slice(&output.stdout).map_err(|e| {
                CoordinatorError::release(format!("Unexpected `gh release view` output: {}", e))
            })?;
            return Ok(view.tag_name == tag);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.to_lowercase().contains("not found") {
            Ok(false)
        } else {
            Err(CoordinatorError::release(format!(
                "`gh release view {}` failed: {}",
                tag,
                stderr.trim()
            )))
        }
    }

    fn create_release(&self, request: &ReleaseRequest) -> Result<ReleaseRecord> {
        let output = self.run(&Self::create_args(request))?;
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            return if stderr.to_lowercase().contains("already exists") {
                Err(CoordinatorError::ReleaseExists(request.tag.clone()))
            } else {
                Err(CoordinatorError::release(format!(
                    "`gh release create {}` failed with exit code {}: {}",
                    request.tag,
                    output.status.code().unwrap_or(-1),
                    stderr.trim()
                )))
            };
        }

        let url = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(ReleaseRecord {
            tag: request.tag.clone(),
            title: request.title.clone(),
            url: (!url.is_empty()).then_some(url),
            draft: request.draft,
            latest: request.latest,
            assets: request.artifacts.iter().map(|p| asset_name(p)).collect(),
        })
    }
}
