//! Command-line argument parsing

use crate::config::AppConfig;
use crate::reference::Dialect;
use clap::{Args as ClapArgs, Parser, Subcommand};

const EXAMPLES: &str = "\
Examples:
  # Mirror an official image
  image-mirror mirror nginx:alpine -n myteam

  # Mirror from GHCR into another region
  image-mirror --region cn-east-3 mirror owner/app:v1 -s ghcr -n myteam

  # Validate an address and print JSON
  image-mirror validate 'docker pull bitnami/redis:7.2' --json";

#[derive(Parser, Debug)]
#[command(name = "image-mirror")]
#[command(about = "Mirror Docker Hub and GHCR images into Huawei Cloud SWR through GitHub Actions")]
#[command(version, author)]
#[command(after_help = EXAMPLES)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Verbose output
    #[arg(long = "verbose", short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Only print errors
    #[arg(long = "quiet", short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// SWR region of the target registry
    #[arg(long = "region", global = true, help = "SWR region, e.g. cn-north-4")]
    pub region: Option<String>,

    /// Timeout in seconds for network operations
    #[arg(long = "timeout", short = 't', global = true)]
    pub timeout: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Mirror a source image into SWR
    Mirror(MirrorArgs),
    /// Validate an image address or tag without touching the network
    Validate {
        /// Image address to validate
        address: String,

        #[arg(long = "source-type", short = 's', default_value = "dockerhub")]
        dialect: Dialect,

        /// Also validate a target tag
        #[arg(long = "tag")]
        tag: Option<String>,

        /// Print the validation result as JSON
        #[arg(long = "json")]
        json: bool,
    },
    /// Check whether a source image exists in its registry
    Probe {
        address: String,

        #[arg(long = "source-type", short = 's', default_value = "dockerhub")]
        dialect: Dialect,
    },
    /// Print the transfer workflow for a mirror without committing it
    Render {
        #[command(flatten)]
        target: TargetArgs,

        /// Print the SWR password instead of masking it
        #[arg(long = "reveal-secrets")]
        reveal_secrets: bool,
    },
    /// Create the transfer repository if it does not exist
    Init {
        #[arg(long = "transfer-repo")]
        transfer_repo: Option<String>,
    },
    /// List recent transfer workflow runs
    Runs {
        #[arg(long = "page", default_value = "1")]
        page: u32,

        #[arg(long = "per-page", default_value = "10")]
        per_page: u32,

        #[arg(long = "transfer-repo")]
        transfer_repo: Option<String>,
    },
}

/// Source and destination of a mirror
#[derive(ClapArgs, Debug, Clone)]
pub struct TargetArgs {
    /// Source image address, `docker pull` prefix allowed
    pub source: String,

    #[arg(long = "source-type", short = 's', default_value = "dockerhub")]
    pub dialect: Dialect,

    /// SWR organization that receives the image
    #[arg(long = "namespace", short = 'n')]
    pub namespace: String,

    /// Target repository, defaults to the source repository name
    #[arg(long = "repository", short = 'r')]
    pub repository: Option<String>,

    /// Target tag, defaults to the source tag
    #[arg(long = "tag")]
    pub tag: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct MirrorArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Continue without asking when the source is not an official image
    #[arg(long = "yes", short = 'y')]
    pub yes: bool,

    /// Seconds between workflow status checks
    #[arg(long = "poll-interval")]
    pub poll_interval: Option<u64>,

    /// Give up after this many status checks
    #[arg(long = "max-polls")]
    pub max_polls: Option<u32>,

    #[arg(long = "transfer-repo")]
    pub transfer_repo: Option<String>,
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }

    /// Command-line values as a config to merge over the environment
    pub fn config_overrides(&self) -> AppConfig {
        let mut config = AppConfig {
            verbose: self.verbose,
            ..AppConfig::default()
        };
        if let Some(region) = &self.region {
            config.region = region.clone();
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }

        match &self.command {
            Command::Mirror(mirror) => {
                if let Some(interval) = mirror.poll_interval {
                    config.poll_interval = interval;
                }
                config.max_poll_attempts = mirror.max_polls;
                if let Some(repo) = &mirror.transfer_repo {
                    config.transfer_repo = repo.clone();
                }
            }
            Command::Init { transfer_repo } | Command::Runs { transfer_repo, .. } => {
                if let Some(repo) = transfer_repo {
                    config.transfer_repo = repo.clone();
                }
            }
            _ => {}
        }

        config
    }
}
