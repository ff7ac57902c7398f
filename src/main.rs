//! Skald CLI entrypoint.
//!
//! This is the main entrypoint for the skald command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use skald_promote::change::ChangeAggregator;
use skald_promote::cli::{Cli, Commands, OutputFormatter};
use skald_promote::config::{PromotionSettings, SettingsParser, find_settings_file};
use skald_promote::environment::Actor;
use skald_promote::error::{ConfigError, Result};
use skald_promote::orchestrator::PromotionOrchestrator;
use skald_promote::resource::ResourceType;
use skald_promote::store::{
    EnvironmentBundle, MemoryPromotionLock, MemoryResourceStore, OpenGate,
};
use skald_promote::strategy::PromotionRegistry;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);
    let mut settings = load_settings(cli.settings.as_ref())?;

    match cli.command {
        Commands::Diff {
            bundle,
            source,
            target,
            types,
        } => {
            if !types.is_empty() {
                settings.types = Some(types);
            }
            cmd_diff(&bundle, &source, &target, settings, &formatter).await
        }
        Commands::Publish {
            bundle,
            source,
            target,
            actor,
            types,
            prune,
            batch_size,
            yes,
        } => {
            let actor = resolve_actor(actor)?;
            if !types.is_empty() {
                settings.types = Some(types);
            }
            if prune {
                settings.prune = true;
            }
            if let Some(size) = batch_size {
                settings.batch_size = size;
            }
            settings.validate()?;
            cmd_publish(&bundle, &source, &target, &actor, settings, yes, &formatter).await
        }
        Commands::PromoteChange {
            bundle,
            resource_type,
            resource_id,
            target,
            actor,
        } => {
            let actor = resolve_actor(actor)?;
            cmd_promote_change(
                &bundle,
                resource_type,
                &resource_id,
                &target,
                &actor,
                settings,
                &formatter,
            )
            .await
        }
        Commands::Aggregate {
            bundle,
            resource_type,
            resource_id,
        } => cmd_aggregate(&bundle, resource_type, &resource_id, &formatter).await,
        Commands::Environments { bundle } => cmd_environments(&bundle, &formatter).await,
    }
}

/// Show the changes a publish would apply.
async fn cmd_diff(
    bundle_path: &Path,
    source: &str,
    target: &str,
    settings: PromotionSettings,
    formatter: &OutputFormatter,
) -> Result<()> {
    let bundle = EnvironmentBundle::load(bundle_path).await?;
    let store = bundle.resource_store().await;
    let orchestrator = build_orchestrator(&bundle, &store, settings);

    let plan = orchestrator.diff_environments(source, target).await?;
    eprintln!("{}", formatter.format_plan(&plan));

    Ok(())
}

/// Publish the source environment's state into the target.
async fn cmd_publish(
    bundle_path: &Path,
    source: &str,
    target: &str,
    actor: &Actor,
    settings: PromotionSettings,
    auto_approve: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let bundle = EnvironmentBundle::load(bundle_path).await?;
    let store = bundle.resource_store().await;
    let orchestrator = build_orchestrator(&bundle, &store, settings);

    // Preview first; the publish itself re-plans under the target lock.
    let plan = orchestrator.diff_environments(source, target).await?;
    eprintln!("{}", formatter.format_plan(&plan));

    if plan.is_noop() {
        return Ok(());
    }

    if !auto_approve && !confirm("Do you want to publish these changes? [y/N]: ")? {
        eprintln!("Publish cancelled.");
        return Ok(());
    }

    let report = orchestrator
        .publish_to_environment(source, target, actor)
        .await?;
    eprintln!("{}", formatter.format_report(&report));

    save_bundle(&bundle, &store, bundle_path).await?;

    Ok(())
}

/// Replay one resource's change history into a target environment.
async fn cmd_promote_change(
    bundle_path: &Path,
    resource_type: ResourceType,
    resource_id: &str,
    target: &str,
    actor: &Actor,
    settings: PromotionSettings,
    formatter: &OutputFormatter,
) -> Result<()> {
    let bundle = EnvironmentBundle::load(bundle_path).await?;
    let store = bundle.resource_store().await;
    let orchestrator = build_orchestrator(&bundle, &store, settings);

    let promoted = orchestrator
        .promote_change(
            &bundle.organization_id,
            resource_type,
            resource_id,
            target,
            actor,
        )
        .await?;
    eprintln!("{}", formatter.format_promoted(&promoted));

    save_bundle(&bundle, &store, bundle_path).await?;

    Ok(())
}

/// Show the state a resource's change history folds down to.
async fn cmd_aggregate(
    bundle_path: &Path,
    resource_type: ResourceType,
    resource_id: &str,
    formatter: &OutputFormatter,
) -> Result<()> {
    let bundle = EnvironmentBundle::load(bundle_path).await?;
    let aggregator = ChangeAggregator::new(Arc::new(bundle.change_store()));

    let state = aggregator
        .aggregate(&bundle.organization_id, resource_type, resource_id)
        .await?;
    eprintln!("{}", formatter.format_aggregated(&state));

    Ok(())
}

/// List the environments in a bundle.
async fn cmd_environments(bundle_path: &Path, formatter: &OutputFormatter) -> Result<()> {
    let bundle = EnvironmentBundle::load(bundle_path).await?;
    eprintln!("{}", formatter.format_environments(&bundle.environments));

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Loads promotion settings from the given file, a discovered file, or the
/// environment alone.
fn load_settings(settings_path: Option<&PathBuf>) -> Result<PromotionSettings> {
    let settings_file = match settings_path {
        Some(path) => Some(path.clone()),
        None => find_settings_file(".").ok(),
    };

    let settings = match settings_file {
        Some(file) => {
            debug!("Using settings file: {}", file.display());
            let parser = SettingsParser::new()
                .with_base_path(file.parent().unwrap_or_else(|| Path::new(".")));
            parser.load_dotenv()?;
            parser.load_with_env(&file)?
        }
        None => {
            debug!("No settings file found, using defaults");
            let parser = SettingsParser::new();
            parser.load_dotenv()?;
            parser.load_env_only()?
        }
    };

    settings.validate()?;
    Ok(settings)
}

/// Resolves the acting principal from `--actor` or `SKALD_ACTOR`.
fn resolve_actor(actor: Option<String>) -> Result<Actor> {
    actor.map(Actor::new).ok_or_else(|| {
        ConfigError::MissingEnvVar {
            name: "SKALD_ACTOR".to_string(),
        }
        .into()
    })
}

/// Asks the user a yes/no question on stderr.
fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{prompt}");
    std::io::stderr().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;

    Ok(input.trim().eq_ignore_ascii_case("y"))
}

/// Registers the built-in promotion strategies over the store's adapters.
fn build_registry(store: &MemoryResourceStore) -> PromotionRegistry {
    let mut registry = PromotionRegistry::new();
    for resource_type in ResourceType::promotion_order() {
        registry.register_builtin(*resource_type, store.adapter(*resource_type));
    }
    registry
}

/// Wires a promotion orchestrator over a bundle's in-memory backends.
fn build_orchestrator(
    bundle: &EnvironmentBundle,
    store: &MemoryResourceStore,
    settings: PromotionSettings,
) -> PromotionOrchestrator {
    PromotionOrchestrator::new(
        Arc::new(build_registry(store)),
        Arc::new(bundle.environment_lookup()),
        Arc::new(OpenGate),
        Arc::new(MemoryPromotionLock::new()),
        Arc::new(bundle.change_store()),
        settings,
    )
}

/// Writes the store's records back into the bundle file.
async fn save_bundle(
    bundle: &EnvironmentBundle,
    store: &MemoryResourceStore,
    path: &Path,
) -> Result<()> {
    let mut updated = bundle.clone();
    updated.resources = store.all_records().await;
    updated.save(path).await
}
