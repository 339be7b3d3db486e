use adtag::cli::commands::{ResolvePathCommand, RunCommand, ValidateCommand};
use adtag::cli::dry_run::DryRunAdapter;
use adtag::cli::output::*;
use adtag::cli::{Cli, Command};
use adtag::core::services::{BrowserHost, PipelineServices, StaticHost};
use adtag::core::TagConfig;
use adtag::tag::{RefreshOptions, TagController};

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging, RUST_LOG wins over --verbose
    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .context("Failed to set logging subscriber")?;
    } else {
        let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .context("Failed to set logging subscriber")?;
    }

    match &cli.command {
        Command::Run(cmd) => run_tag(cmd).await?,
        Command::Validate(cmd) => validate_config(cmd)?,
        Command::ResolvePath(cmd) => resolve_path(cmd).await?,
    }

    Ok(())
}

async fn run_tag(cmd: &RunCommand) -> Result<()> {
    let config = TagConfig::from_file(&cmd.file).context("Failed to load tag config")?;

    if !cmd.json {
        println!(
            "{} Loaded {} slot(s) from {}",
            INFO,
            style(config.slots.len()).cyan(),
            style(&cmd.file).bold()
        );
    }

    let host = Arc::new(StaticHost::new(cmd.href.as_str()));
    let adapter = Arc::new(DryRunAdapter::new());
    let services = PipelineServices::default().with_host(host.clone());
    let controller = TagController::with_services(adapter.clone(), services);

    if !cmd.json {
        controller
            .add_event_handler(|event| println!("{}", format_pipeline_event(&event)))
            .await;
    }

    let request_ads = config.request_ads;
    let mut state = controller.configure(config).await?;
    if !request_ads {
        state = controller.request_ads().await?;
    }
    if !cmd.json {
        println!("{} State: {}", INFO, format_state(&state));
    }

    for dom_id in &cmd.refresh {
        let outcome = controller
            .refresh_ad_slot(dom_id.as_str(), RefreshOptions::default())
            .await;
        if !cmd.json {
            println!("{}", format_refresh_outcome(dom_id, &outcome));
        }
    }

    for bucket in &cmd.refresh_bucket {
        let outcome = controller.refresh_bucket(bucket.as_str()).await;
        if !cmd.json {
            println!("{}", format_refresh_outcome(bucket, &outcome));
        }
    }

    for href in &cmd.navigate {
        host.navigate(href.as_str());
        if !cmd.json {
            println!("\n{} Navigated to {}", ROCKET, style(host.href()).bold());
        }
        match controller.request_ads().await {
            Ok(state) if !cmd.json => println!("{} State: {}", INFO, format_state(&state)),
            Ok(_) => {}
            Err(e) => {
                if !cmd.json {
                    println!("{} {}", WARN, style(&e).yellow());
                }
                error!("{}", e);
            }
        }
    }

    let state = controller.get_state().await;
    let requests = adapter.requests().await;

    if cmd.json {
        let data = serde_json::json!({
            "state": state,
            "requestAdsCalls": controller.request_ads_calls(),
            "pageTargeting": controller.get_page_targeting().await,
            "requests": requests,
        });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        println!("\n{} Ad server requests:", INFO);
        for request in &requests {
            println!("  {}", format_display_request(request));
        }
        println!("\n{} Final state: {}", INFO, format_state(&state));
    }

    if state.is_error() {
        std::process::exit(1);
    }

    Ok(())
}

fn validate_config(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating tag configuration...", INFO);

    match TagConfig::from_file(&cmd.file) {
        Ok(config) => {
            println!("{} Tag configuration is valid!", CHECK);
            println!("  Slots: {}", style(config.slots.len()).cyan());
            println!(
                "  Buckets: {}",
                if config.buckets.enabled {
                    style("enabled").green()
                } else {
                    style("disabled").dim()
                }
            );
            println!(
                "  SPA: {}",
                if config.spa.enabled {
                    style(format!("enabled ({})", config.spa.validate_location)).green()
                } else {
                    style("disabled".to_string()).dim()
                }
            );

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}

async fn resolve_path(cmd: &ResolvePathCommand) -> Result<()> {
    let host = Arc::new(StaticHost::new(cmd.href.as_str()));
    let services = PipelineServices::default().with_host(host);
    let controller = TagController::with_services(Arc::new(DryRunAdapter::new()), services);

    if let Some(file) = &cmd.file {
        let mut config = TagConfig::from_file(file).context("Failed to load tag config")?;
        config.request_ads = false;
        controller.configure(config).await?;
    }

    if !cmd.variable.is_empty() {
        controller
            .set_ad_unit_path_variables(cmd.variable.iter().cloned().collect())
            .await;
    }

    match controller.resolve_ad_unit_path(&cmd.path).await {
        Ok(path) => {
            println!("{}", path);
            Ok(())
        }
        Err(e) => {
            println!("{} {}", CROSS, style(e).red());
            std::process::exit(1);
        }
    }
}
