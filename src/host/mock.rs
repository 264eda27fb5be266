use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{CoordinatorError, Result};
use crate::host::{ReleaseHost, ReleaseRecord, ReleaseRequest};

#[derive(Debug, Default)]
struct HostState {
    releases: HashMap<String, ReleaseRecord>,
    fail_next_create: Option<String>,
    fail_checks: Option<String>,
    create_calls: usize,
}

/// In-memory release host; clones share the same releases
#[derive(Debug, Clone, Default)]
pub struct MockReleaseHost {
    state: Arc<Mutex<HostState>>,
}

impl MockReleaseHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Seed an existing release for `tag`
    pub fn add_release(&self, tag: &str) {
        self.state().releases.insert(
            tag.to_string(),
            ReleaseRecord {
                tag: tag.to_string(),
                title: format!("Release {}", tag),
                url: None,
                draft: false,
                latest: true,
                assets: Vec::new(),
            },
        );
    }

    /// Make the next `create_release` fail with a host error
    pub fn fail_next_create(&self, reason: &str) {
        self.state().fail_next_create = Some(reason.to_string());
    }

    /// Make every later `release_exists` fail with a host error
    pub fn fail_release_checks(&self, reason: &str) {
        self.state().fail_checks = Some(reason.to_string());
    }

    pub fn release(&self, tag: &str) -> Option<ReleaseRecord> {
        self.state().releases.get(tag).cloned()
    }

    pub fn release_count(&self) -> usize {
        self.state().releases.len()
    }

    pub fn create_calls(&self) -> usize {
        self.state().create_calls
    }
}

impl ReleaseHost for MockReleaseHost {
    fn release_exists(&self, tag: &str) -> Result<bool> {
        let state = self.state();
        if let Some(reason) = &state.fail_checks {
            return Err(CoordinatorError::release(reason.clone()));
        }
        Ok(state.releases.contains_key(tag))
    }

    fn create_release(&self, request: &ReleaseRequest) -> Result<ReleaseRecord> {
        let mut state = self.state();
        state.create_calls += 1;
        if let Some(reason) = state.fail_next_create.take() {
            return Err(CoordinatorError::release(reason));
        }
        if state.releases.contains_key(&request.tag) {
            return Err(CoordinatorError::ReleaseExists(request.tag.clone()));
        }

        let record = ReleaseRecord {
            tag: request.tag.clone(),
            title: request.title.clone(),
            url: Some(format!("https://example.invalid/releases/{}", request.tag)),
            draft: request.draft,
            latest: request.latest,
            assets: request
                .artifacts
                .iter()
                .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
                .collect(),
        };
        state.releases.insert(request.tag.clone(), record.clone());
        Ok(record)
    }
}
