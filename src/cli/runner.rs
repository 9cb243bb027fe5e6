//! Command runner

use crate::cli::args::{Args, Command, MirrorArgs, TargetArgs};
use crate::config::AppConfig;
use crate::error::{MirrorError, Result};
use crate::github::GitHubClient;
use crate::logging::Logger;
use crate::pipeline::{MirrorTarget, Phase, PipelineDriver};
use crate::reference::{
    normalize_source_input, validate_image_address, validate_tag, Dialect, ValidationResult,
};
use crate::registry::{ExistenceCheck, ExistenceProber, RegistryProber};
use crate::workflow::{self, RegistryCredentials, WorkflowRequest};
use tokio::io::{AsyncBufReadExt, BufReader};

pub struct Runner {
    args: Args,
    config: AppConfig,
    output: Logger,
}

impl Runner {
    pub fn new(args: Args) -> Result<Self> {
        let output = if args.quiet {
            Logger::new_quiet()
        } else {
            Logger::new(args.verbose)
        };

        let config = AppConfig::from_env().merge(&args.config_overrides());
        config.validate()?;
        let output = Logger {
            verbose: output.verbose || (config.verbose && !args.quiet),
            ..output
        };

        Ok(Self {
            args,
            config,
            output,
        })
    }

    pub async fn run(&self) -> Result<()> {
        match &self.args.command {
            Command::Mirror(mirror) => self.mirror(mirror).await,
            Command::Validate {
                address,
                dialect,
                tag,
                json,
            } => self.validate(address, *dialect, tag.as_deref(), *json),
            Command::Probe { address, dialect } => self.probe(address, *dialect).await,
            Command::Render {
                target,
                reveal_secrets,
            } => self.render(target, *reveal_secrets),
            Command::Init { .. } => {
                self.output.section("Transfer repository");
                let repository = self.github_client()?.ensure_transfer_repository().await?;
                self.output.summary_kv(
                    "Repository",
                    &[
                        ("Name", repository.full_name),
                        ("Private", repository.private.to_string()),
                        ("URL", repository.html_url.unwrap_or_default()),
                    ],
                );
                Ok(())
            }
            Command::Runs { page, per_page, .. } => self.runs(*page, *per_page).await,
        }
    }

    async fn mirror(&self, args: &MirrorArgs) -> Result<()> {
        let target = self.resolve_target(&args.target)?;
        let github = self.github_client()?;
        github.ensure_transfer_repository().await?;

        let mut driver = PipelineDriver::new(
            self.prober()?,
            github,
            self.config.driver_settings(),
            self.output.clone(),
        );

        let close = driver.close_handle();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                close.close();
            }
        });

        let result = self.drive(&mut driver, args, &target).await;
        interrupt.abort();

        match result? {
            Phase::Completed => {
                self.output.summary_kv(
                    "Mirror complete",
                    &[
                        ("Source", args.target.source.trim().to_string()),
                        ("Target", target.reference(&self.config.region)),
                    ],
                );
                Ok(())
            }
            Phase::Initial if driver.close_handle().is_closed() => {
                self.output.warning("Interrupted, the workflow run may still be in progress");
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn drive(
        &self,
        driver: &mut PipelineDriver<RegistryProber, GitHubClient>,
        args: &MirrorArgs,
        target: &MirrorTarget,
    ) -> Result<Phase> {
        let phase = driver
            .submit(&args.target.source, args.target.dialect, target)
            .await?;
        if phase != Phase::Confirming {
            return Ok(phase);
        }

        if args.yes || self.ask_to_continue().await? {
            driver.confirm().await
        } else {
            Ok(driver.cancel())
        }
    }

    async fn ask_to_continue(&self) -> Result<bool> {
        self.output.raw("Continue anyway? [y/N]");
        let mut line = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await?;
        Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
    }

    fn validate(&self, address: &str, dialect: Dialect, tag: Option<&str>, json: bool) -> Result<()> {
        let result = ValidationResult::from(validate_image_address(address, dialect));
        let tag_result = tag.map(|tag| ValidationResult::from(validate_tag(tag)));

        if json {
            let value = serde_json::json!({
                "address": result,
                "tag": tag_result,
            });
            self.output.raw(&serde_json::to_string_pretty(&value)?);
        } else {
            if let Some(parsed) = &result.parsed {
                self.output.summary_kv(
                    "Valid image address",
                    &[
                        ("Registry", parsed.registry.clone()),
                        ("Repository", parsed.repository.clone()),
                        ("Tag", parsed.tag.clone()),
                        ("Digest", parsed.digest.clone().unwrap_or_else(|| "-".to_string())),
                        ("Pull", parsed.pull_reference()),
                    ],
                );
            }
            if tag_result.as_ref().is_some_and(|r| r.is_valid) {
                self.output.success("Tag is valid");
            }
        }

        // Invalid fields surface as the command error
        validate_image_address(address, dialect)?;
        if let Some(tag) = tag {
            validate_tag(tag)?;
        }
        Ok(())
    }

    async fn probe(&self, address: &str, dialect: Dialect) -> Result<()> {
        let reference = validate_image_address(address, dialect)?;
        self.output.section(&format!("Probing {}", dialect.display_name()));

        match self.prober()?.probe(&reference, dialect).await {
            ExistenceCheck::Found { trusted } => {
                self.output.success(&format!("{} exists", reference));
                if !trusted {
                    self.output.warning("Not an official image");
                }
                Ok(())
            }
            ExistenceCheck::NotFound => Err(MirrorError::NotFound(format!(
                "{} does not exist in {}",
                reference,
                dialect.display_name()
            ))),
            ExistenceCheck::Rejected { reason } => Err(MirrorError::Registry(reason)),
            ExistenceCheck::Unknown { reason } => Err(MirrorError::NotFound(format!(
                "could not verify {}: {}",
                reference, reason
            ))),
        }
    }

    fn render(&self, target_args: &TargetArgs, reveal_secrets: bool) -> Result<()> {
        let target = self.resolve_target(target_args)?;
        let source = validate_image_address(&target_args.source, target_args.dialect)?;
        let credentials = if reveal_secrets {
            self.config.credentials()
        } else {
            RegistryCredentials::new(&self.config.swr_username, "********")
        };
        let target_reference = target.reference(&self.config.region);

        let request = WorkflowRequest {
            source: &source,
            target: &target_reference,
            region: &self.config.region,
            dialect: target_args.dialect,
            credentials: &credentials,
        };
        self.output.raw(&workflow::render(&request));
        Ok(())
    }

    async fn runs(&self, page: u32, per_page: u32) -> Result<()> {
        let github = self.github_client()?;
        let runs = github.list_runs(page, per_page).await?;

        let items: Vec<String> = runs
            .workflow_runs
            .iter()
            .map(|run| {
                format!(
                    "#{} {} [{}{}] {}",
                    run.id,
                    run.display_title.as_deref().unwrap_or("-"),
                    run.status,
                    run.conclusion
                        .as_deref()
                        .map(|c| format!(": {}", c))
                        .unwrap_or_default(),
                    run.created_at.as_deref().unwrap_or("")
                )
            })
            .collect();
        self.output.list(
            &format!(
                "Transfer runs in {} (page {}, {} total)",
                github.repository_name(),
                page,
                runs.total_count
            ),
            &items,
        );
        Ok(())
    }

    /// Fill in target repository and tag from the source when omitted
    fn resolve_target(&self, args: &TargetArgs) -> Result<MirrorTarget> {
        let input = normalize_source_input(&args.source, args.dialect)?;
        let repository = match &args.repository {
            Some(repository) => repository.clone(),
            None => input.reference.namespace_and_name().1.to_string(),
        };
        let tag = args.tag.clone().unwrap_or(input.suggested_tag);

        let target = MirrorTarget::new(&args.namespace, repository, tag);
        target.validate()?;
        self.output
            .verbose(&format!("Target: {}", target.reference(&self.config.region)));
        Ok(target)
    }

    fn prober(&self) -> Result<RegistryProber> {
        RegistryProber::builder()
            .with_ghcr_url(&self.config.ghcr_url)
            .with_docker_hub_api(&self.config.docker_hub_api)
            .with_timeout(self.config.timeout)
            .with_logger(self.output.clone())
            .build()
    }

    fn github_client(&self) -> Result<GitHubClient> {
        let mut builder = GitHubClient::builder()
            .with_api_url(&self.config.github_api)
            .with_repository(&self.config.transfer_repo)
            .with_timeout(self.config.timeout)
            .with_logger(self.output.clone());
        if let Some(token) = &self.config.github_token {
            builder = builder.with_token(token);
        }
        if let Some(owner) = &self.config.github_owner {
            builder = builder.with_owner(owner);
        }
        builder.build()
    }
}
