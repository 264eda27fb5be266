use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use release_coordinator::config::{self, Config};
use release_coordinator::git::{Git2Repository, Repository};
use release_coordinator::host::GhCliHost;
use release_coordinator::{ui, Coordinator};

#[derive(clap::Parser)]
#[command(
    name = "release-coordinator",
    version,
    about = "Resolve, tag and publish the next release from conventional commits"
)]
struct Args {
    #[arg(short, long, help = "Custom configuration file path")]
    config: Option<PathBuf>,

    #[arg(long, default_value = ".", help = "Path to the repository checkout")]
    repo: PathBuf,

    #[arg(long, env = "RELEASE_BASELINE", help = "Ignore history at or before this commit")]
    baseline: Option<String>,

    #[arg(long, env = "RELEASE_BRANCH", help = "Only this branch publishes")]
    branch: Option<String>,

    #[arg(long, env = "RELEASE_REMOTE", help = "Remote holding tags and releases")]
    remote: Option<String>,

    #[arg(long, env = "RELEASE_UPDATE_MAJOR_TAG", help = "Move the floating major tag (true/false)")]
    update_major_tag: Option<bool>,

    #[arg(long, env = "RELEASE_DRAFT", help = "Create the release as a draft (true/false)")]
    draft: Option<bool>,

    #[arg(long, env = "RELEASE_LATEST", help = "Mark the release as latest (true/false)")]
    latest: Option<bool>,

    #[arg(long, env = "GITHUB_REPOSITORY", help = "owner/name of the release host repository")]
    github_repository: Option<String>,

    #[arg(long, env = "RELEASE_SKIP_GATE", help = "Skip the build and test gate")]
    skip_gate: bool,

    #[arg(long, help = "Resolve and check the tag without changing anything")]
    dry_run: bool,

    #[arg(short, long, help = "Verbose diagnostic logging")]
    verbose: bool,
}

impl Args {
    /// Flags and environment take precedence over the file
    fn apply(&self, config: &mut Config) {
        if let Some(baseline) = &self.baseline {
            config.release.baseline = Some(baseline.clone());
        }
        if let Some(branch) = &self.branch {
            config.release.branch = branch.clone();
        }
        if let Some(remote) = &self.remote {
            config.release.remote = remote.clone();
        }
        if let Some(update) = self.update_major_tag {
            config.release.update_major_tag = update;
        }
        if let Some(draft) = self.draft {
            config.release.draft = draft;
        }
        if let Some(latest) = self.latest {
            config.release.latest = latest;
        }
        if self.skip_gate {
            config.gate.enabled = false;
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = match config::load_config(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            ui::display_error(&format!("Error loading config: {}", e));
            std::process::exit(1);
        }
    };
    args.apply(&mut config);

    let repo = match Git2Repository::open(&args.repo) {
        Ok(repo) => repo,
        Err(e) => {
            ui::display_error(&format!("Git repository error: {}", e));
            std::process::exit(1);
        }
    };
    let mut host = GhCliHost::new(repo.workdir().context("repository has no working directory")?);
    if let Some(repository) = &args.github_repository {
        host = host.with_repository(repository.clone());
    }

    let coordinator = Coordinator::new(config, repo, host)?.with_dry_run(args.dry_run);
    if args.dry_run {
        ui::display_status("Dry run: nothing will be committed, tagged or published");
    }

    match coordinator.run() {
        Ok(report) => {
            ui::display_report(&report);
            Ok(())
        }
        Err(e) => {
            ui::display_error(&e.to_string());
            std::process::exit(1);
        }
    }
}
