use std::cell::RefCell;
use std::path::{Path, PathBuf};

use git2::{
    build::CheckoutBuilder, BranchType, Cred, CredentialType, Direction, ErrorClass, ErrorCode,
    FetchOptions, ObjectType, Oid, PushOptions, RemoteCallbacks, Repository as Git2Repo, Signature,
    Sort,
};
use tracing::{debug, warn};

use crate::error::{CoordinatorError, Result};
use crate::git::{CommitInfo, Identity, TagRef};

/// Wrapper around git2::Repository with our trait interface
pub struct Git2Repository {
    repo: Git2Repo,
}

impl Git2Repository {
    /// Open or discover a git repository
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = Git2Repo::discover(path)?;
        Ok(Git2Repository { repo })
    }

    /// Create from existing git2::Repository
    pub fn from_git2(repo: Git2Repo) -> Self {
        Git2Repository { repo }
    }

    /// Names of every ref the remote advertises
    fn list_remote_refs(&self, remote_name: &str) -> Result<Vec<String>> {
        let mut remote = self.repo.find_remote(remote_name).map_err(|e| {
            CoordinatorError::remote(format!("Remote '{}' not found: {}", remote_name, e))
        })?;

        let connection = remote
            .connect_auth(Direction::Fetch, Some(remote_callbacks()), None)
            .map_err(|e| {
                CoordinatorError::remote(format!(
                    "Cannot connect to remote '{}': {}",
                    remote_name, e
                ))
            })?;

        let refs = connection
            .list()?
            .iter()
            .map(|head| head.name().to_string())
            .collect();
        Ok(refs)
    }

    /// Push refspecs, turning a refused ref update into `TagRejected`
    fn push_refspecs(&self, remote_name: &str, refspecs: &[String]) -> Result<()> {
        let mut remote = self.repo.find_remote(remote_name).map_err(|e| {
            CoordinatorError::remote(format!("Remote '{}' not found: {}", remote_name, e))
        })?;

        let rejected: RefCell<Option<String>> = RefCell::new(None);
        {
            let mut callbacks = remote_callbacks();
            callbacks.push_update_reference(|refname, status| {
                if let Some(status) = status {
                    *rejected.borrow_mut() = Some(format!("{}: {}", refname, status));
                }
                Ok(())
            });

            let mut push_options = PushOptions::new();
            push_options.remote_callbacks(callbacks);

            let specs: Vec<&str> = refspecs.iter().map(|s| s.as_str()).collect();
            if let Err(e) = remote.push(&specs, Some(&mut push_options)) {
                return Err(classify_push_error(e));
            }
        }

        match rejected.into_inner() {
            Some(reason) => Err(CoordinatorError::TagRejected(reason)),
            None => Ok(()),
        }
    }

    /// Fast-forward a local branch to its remote-tracking counterpart.
    ///
    /// Diverged or missing branches are left untouched.
    fn fast_forward(&self, branch_name: &str, remote_name: &str) -> Result<()> {
        let tracking = format!("refs/remotes/{}/{}", remote_name, branch_name);
        let remote_oid = match self.repo.find_reference(&tracking) {
            Ok(r) => match r.target() {
                Some(oid) => oid,
                None => return Ok(()),
            },
            Err(_) => return Ok(()),
        };

        let local_branch = match self.repo.find_branch(branch_name, BranchType::Local) {
            Ok(b) => b,
            Err(_) => {
                let remote_commit = self.repo.find_commit(remote_oid)?;
                self.repo.branch(branch_name, &remote_commit, false)?;
                return Ok(());
            }
        };

        let is_head = local_branch.is_head();
        let mut local_ref = local_branch.into_reference();
        let local_oid = match local_ref.target() {
            Some(oid) => oid,
            None => return Ok(()),
        };

        if local_oid == remote_oid || !self.repo.graph_descendant_of(remote_oid, local_oid)? {
            return Ok(());
        }

        if is_head {
            let target = self.repo.find_commit(remote_oid)?;
            self.repo
                .checkout_tree(target.as_object(), Some(CheckoutBuilder::new().safe()))?;
        }
        local_ref.set_target(remote_oid, &format!("fast-forward from {}", tracking))?;
        debug!(branch = branch_name, to = %remote_oid, "fast-forwarded local branch");
        Ok(())
    }
}

/// Credentials: SSH keys from ~/.ssh, the SSH agent, a token from the
/// environment for HTTPS, then the default credential helper.
fn remote_callbacks<'a>() -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(|url, username_from_url, allowed_types| {
        if allowed_types.contains(CredentialType::SSH_KEY) {
            let user = username_from_url.unwrap_or("git");
            if let Some(home) = dirs::home_dir() {
                for key in ["id_ed25519", "id_rsa", "id_ecdsa"] {
                    let path = home.join(".ssh").join(key);
                    if path.exists() {
                        if let Ok(cred) = Cred::ssh_key(user, None, &path, None) {
                            return Ok(cred);
                        }
                    }
                }
            }
            if let Ok(cred) = Cred::ssh_key_from_agent(user) {
                return Ok(cred);
            }
        }

        if allowed_types.contains(CredentialType::USER_PASS_PLAINTEXT) {
            if let Ok(token) = std::env::var("GITHUB_TOKEN").or_else(|_| std::env::var("GH_TOKEN"))
            {
                return Cred::userpass_plaintext("x-access-token", &token);
            }
            if let Ok(config) = git2::Config::open_default() {
                if let Ok(cred) = Cred::credential_helper(&config, url, username_from_url) {
                    return Ok(cred);
                }
            }
        }

        Cred::default()
    });
    callbacks
}

fn classify_push_error(e: git2::Error) -> CoordinatorError {
    let message = e.message().to_lowercase();
    if e.code() == ErrorCode::NotFastForward
        || message.contains("rejected")
        || message.contains("already exists")
        || message.contains("non-fast-forward")
        || message.contains("non-fastforwardable")
    {
        CoordinatorError::TagRejected(e.message().to_string())
    } else if e.class() == ErrorClass::Net {
        CoordinatorError::remote(format!("Network error during push: {}", e))
    } else {
        CoordinatorError::remote(format!("Push failed: {}", e))
    }
}

impl super::Repository for Git2Repository {
    fn workdir(&self) -> Result<PathBuf> {
        self.repo
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| CoordinatorError::config("Repository has no working directory"))
    }

    fn current_branch(&self) -> Result<Option<String>> {
        let head = self.repo.head()?;
        if head.is_branch() {
            Ok(head.shorthand().map(str::to_string))
        } else {
            Ok(None)
        }
    }

    fn head_oid(&self) -> Result<Oid> {
        Ok(self.repo.head()?.peel_to_commit()?.id())
    }

    fn resolve_commit(&self, rev: &str) -> Result<Option<Oid>> {
        match self.repo.revparse_single(rev) {
            Ok(object) => match object.peel_to_commit() {
                Ok(commit) => Ok(Some(commit.id())),
                Err(_) => Ok(None),
            },
            Err(e)
                if matches!(
                    e.code(),
                    ErrorCode::NotFound | ErrorCode::Ambiguous | ErrorCode::InvalidSpec
                ) =>
            {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn is_ancestor(&self, ancestor: Oid, descendant: Oid) -> Result<bool> {
        if ancestor == descendant {
            return Ok(true);
        }
        Ok(self.repo.graph_descendant_of(descendant, ancestor)?)
    }

    fn merge_base(&self, a: Oid, b: Oid) -> Result<Option<Oid>> {
        match self.repo.merge_base(a, b) {
            Ok(base) => Ok(Some(base)),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn commits_between(&self, from: Option<Oid>, to: Oid) -> Result<Vec<CommitInfo>> {
        let mut revwalk = self.repo.revwalk()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;
        revwalk.push(to)?;
        if let Some(from) = from {
            revwalk.hide(from)?;
        }

        let mut commits = Vec::new();
        for oid_result in revwalk {
            let oid = oid_result?;
            let commit = self.repo.find_commit(oid)?;
            commits.push(CommitInfo {
                hash: oid.to_string(),
                message: commit.message().unwrap_or("(empty message)").to_string(),
                author: commit.author().name().unwrap_or("unknown").to_string(),
            });
        }
        Ok(commits)
    }

    fn read_file_at(&self, commit: Oid, path: &Path) -> Result<Option<String>> {
        let tree = self.repo.find_commit(commit)?.tree()?;
        let entry = match tree.get_path(path) {
            Ok(entry) => entry,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let object = entry.to_object(&self.repo)?;
        let blob = match object.as_blob() {
            Some(blob) => blob,
            None => return Ok(None),
        };
        let content = String::from_utf8(blob.content().to_vec()).map_err(|_| {
            CoordinatorError::manifest(format!("'{}' is not valid UTF-8", path.display()))
        })?;
        Ok(Some(content))
    }

    fn commit_file(&self, path: &Path, message: &str, identity: &Identity) -> Result<Oid> {
        let mut index = self.repo.index()?;
        index.add_path(path)?;
        index.write()?;

        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;
        let parent = self.repo.head()?.peel_to_commit()?;
        let signature = Signature::now(&identity.name, &identity.email)?;

        let oid = self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &[&parent],
        )?;
        Ok(oid)
    }

    fn list_tags(&self) -> Result<Vec<TagRef>> {
        let names = self.repo.tag_names(None)?;
        let mut tags = Vec::new();
        for name in names.iter().flatten() {
            if let Some(target) = self.find_tag(name)? {
                tags.push(TagRef {
                    name: name.to_string(),
                    target,
                });
            }
        }
        Ok(tags)
    }

    fn find_tag(&self, name: &str) -> Result<Option<Oid>> {
        match self.repo.find_reference(&format!("refs/tags/{}", name)) {
            Ok(reference) => match reference.peel(ObjectType::Commit) {
                Ok(object) => Ok(Some(object.id())),
                Err(_) => Ok(None),
            },
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(CoordinatorError::tag(format!(
                "Cannot find tag '{}': {}",
                name, e
            ))),
        }
    }

    fn create_tag(&self, name: &str, target: Oid, force: bool) -> Result<()> {
        let object = self
            .repo
            .find_object(target, None)
            .map_err(|e| CoordinatorError::tag(format!("Cannot find object: {}", e)))?;

        self.repo
            .tag_lightweight(name, &object, force)
            .map_err(|e| CoordinatorError::tag(format!("Cannot create tag '{}': {}", name, e)))?;
        Ok(())
    }

    fn delete_local_tag(&self, name: &str) -> Result<bool> {
        match self.repo.tag_delete(name) {
            Ok(()) => Ok(true),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(false),
            Err(e) => Err(CoordinatorError::tag(format!(
                "Cannot delete tag '{}': {}",
                name, e
            ))),
        }
    }

    fn fetch(&self, remote_name: &str, branch: &str) -> Result<()> {
        let mut remote = self.repo.find_remote(remote_name).map_err(|e| {
            CoordinatorError::remote(format!("Remote '{}' not found: {}", remote_name, e))
        })?;

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(remote_callbacks());

        let refspec_branch = format!("+refs/heads/{0}:refs/remotes/{1}/{0}", branch, remote_name);
        let refspecs = [refspec_branch.as_str(), "+refs/tags/*:refs/tags/*"];
        remote
            .fetch(&refspecs, Some(&mut fetch_options), None)
            .map_err(|e| {
                CoordinatorError::remote(format!(
                    "Failed to fetch from remote '{}': {}",
                    remote_name, e
                ))
            })?;

        self.fast_forward(branch, remote_name)
    }

    fn remote_tag_exists(&self, remote: &str, name: &str) -> Result<bool> {
        let wanted = format!("refs/tags/{}", name);
        Ok(self
            .list_remote_refs(remote)?
            .iter()
            .any(|r| r == &wanted))
    }

    fn push_tag(&self, remote: &str, name: &str, force: bool) -> Result<()> {
        let refspec = format!(
            "{}refs/tags/{1}:refs/tags/{1}",
            if force { "+" } else { "" },
            name
        );
        self.push_refspecs(remote, &[refspec])
    }

    fn delete_remote_tag(&self, remote: &str, name: &str) -> Result<bool> {
        if !self.remote_tag_exists(remote, name)? {
            return Ok(false);
        }
        match self.push_refspecs(remote, &[format!(":refs/tags/{}", name)]) {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!(tag = name, error = %e, "remote tag deletion refused");
                Err(CoordinatorError::remote(format!(
                    "Cannot delete remote tag '{}': {}",
                    name, e
                )))
            }
        }
    }

    fn push_branch(&self, remote: &str, branch: &str) -> Result<()> {
        let refspec = format!("refs/heads/{0}:refs/heads/{0}", branch);
        self.push_refspecs(remote, &[refspec]).map_err(|e| match e {
            CoordinatorError::TagRejected(reason) => CoordinatorError::remote(format!(
                "Push of branch '{}' rejected: {}",
                branch, reason
            )),
            other => other,
        })
    }
}
