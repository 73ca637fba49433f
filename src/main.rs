use anyhow::Context;
use clap::Parser;
use catalog_reconcile::{analyzer, cli, config, coordinator, matcher, patcher, report, scanner, ReconcileError};
use analyzer::{AnalysisFile, AnalysisProvider, CliAnalysisProvider};
use cli::{Cli, Commands, ReconcileArgs};
use config::Config;
use coordinator::{Coordinator, EvidenceSource, RunOptions};
use patcher::{CatalogStore, FieldNames, FileCatalogStore};
use report::RunReport;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load().context("failed to load configuration")?;
    let provider = CliAnalysisProvider::new(cli.ai_provider);

    match cli.command {
        Commands::Analyze { images, output, recursive, no_cache } => {
            println!("📸 catalog-reconcile - analyze ({})\n", cli.ai_provider);

            println!("[1/3] Scanning images...");
            let found = scanner::scan_folder(&images, recursive)?;
            println!("✔ {} images found\n", found.len());

            println!("[2/3] Analyzing...{}", if no_cache { "" } else { " (cache enabled)" });
            let cancel = cancel_on_ctrl_c();
            let options = config.gather_options();
            let evidence = if no_cache {
                analyzer::gather_evidence(&provider, &found, &options, &cancel).await?
            } else {
                analyzer::gather_with_cache(&provider, &found, &images, &options, &cancel).await?
            };
            let file = AnalysisFile::from_evidence(provider.name(), &evidence);
            println!("✔ {} analyzed, {} unavailable\n", file.results.len(), file.unavailable.len());

            println!("[3/3] Saving...");
            let output = output.unwrap_or_else(|| images.join("analysis.json"));
            file.save(&output)?;
            println!("✔ Saved: {}", output.display());

            println!("\n✅ Analysis complete");
        }

        Commands::Plan(args) => {
            println!("🔎 catalog-reconcile - plan\n");
            let store = open_store(&args);
            let (coordinator, evidence) = prepare(&args, &config, &provider, &store).await?;

            println!("[3/3] Deciding...");
            let report = coordinator.run(&store, &evidence)?;
            finish(&report, args.report.as_deref())?;
        }

        Commands::Apply { args, yes } => {
            println!("✏️  catalog-reconcile - apply\n");
            let store = open_store(&args);
            // Held from before the first provider call until the catalog is written
            let lock = store
                .lock()
                .with_context(|| format!("cannot apply to {}", store.path().display()))?;
            let (mut coordinator, evidence) = prepare(&args, &config, &provider, &store).await?;

            println!("[3/3] Deciding...");
            let preview = coordinator.run(&store, &evidence)?;
            if preview.reassignments.is_empty() {
                finish(&preview, args.report.as_deref())?;
                return Ok(());
            }
            print_reassignments(&preview);

            let confirmed = yes
                || dialoguer::Confirm::new()
                    .with_prompt(format!(
                        "Write {} reassignment(s) to {}?",
                        preview.reassignments.len(),
                        store.path().display()
                    ))
                    .default(false)
                    .interact()?;
            if !confirmed {
                println!("Aborted, catalog unchanged");
                return Ok(());
            }

            coordinator.set_dry_run(false);
            match coordinator.run_locked(&store, &evidence, &lock) {
                Ok(report) => finish(&report, args.report.as_deref())?,
                Err(ReconcileError::RunAborted { source, report }) => {
                    finish(&report, args.report.as_deref())?;
                    return Err(anyhow::Error::new(*source).context("patch aborted"));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Restore { catalog, backup } => {
            let store = FileCatalogStore::new(&catalog);
            patcher::restore(&store, &backup)
                .with_context(|| format!("failed to restore {}", catalog.display()))?;
            println!("✔ Restored {} from {}", catalog.display(), backup.display());
        }

        Commands::Config { show, init } => {
            if init {
                Config::default().save()?;
                println!("✔ Default configuration written: {}", Config::config_path()?.display());
            }

            if show || !init {
                println!("Configuration ({}):", Config::config_path()?.display());
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
        }

        Commands::Cache { clear, folder, info } => {
            let target = folder.unwrap_or_else(|| PathBuf::from("."));
            let cache_path = analyzer::cache::CacheFile::cache_path(&target);

            if info || !clear {
                if cache_path.exists() {
                    let cache = analyzer::cache::CacheFile::load(&target);
                    println!("Cache:");
                    println!("  Path: {}", cache_path.display());
                    println!("  Entries: {}", cache.len());
                    for (provider, count) in cache.providers() {
                        println!("    {}: {}", provider, count);
                    }
                    if let Ok(meta) = std::fs::metadata(&cache_path) {
                        println!("  Size: {} bytes", meta.len());
                    }
                } else {
                    println!("No cache file: {}", cache_path.display());
                }
            }

            if clear {
                match analyzer::cache::CacheFile::remove(&target) {
                    Ok(true) => println!("✔ Cache deleted: {}", cache_path.display()),
                    Ok(false) => println!("No cache file to delete"),
                    Err(e) => println!("Failed to delete cache: {}", e),
                }
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "catalog_reconcile=debug" } else { "catalog_reconcile=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Token cancelled on Ctrl-C; evidence gathering stops before any patching
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });
    cancel
}

fn open_store(args: &ReconcileArgs) -> FileCatalogStore {
    let mut fields = FieldNames::default();
    if let Some(image_field) = &args.image_field {
        fields.image = image_field.clone();
    }
    let store = FileCatalogStore::new(&args.catalog).with_fields(fields);
    match args.syntax {
        Some(syntax) => store.with_syntax(syntax),
        None => store,
    }
}

async fn prepare(
    args: &ReconcileArgs,
    config: &Config,
    provider: &CliAnalysisProvider,
    store: &FileCatalogStore,
) -> anyhow::Result<(Coordinator, analyzer::Evidence)> {
    let mut config = config.clone();
    if let Some(threshold) = args.threshold {
        config.acceptance_threshold = threshold;
    }
    if let Some(margin) = args.margin {
        config.min_margin = margin;
    }
    if let Some(concurrency) = args.concurrency {
        config.max_concurrent_analysis = concurrency;
    }
    config.validate()?;

    let overrides = match &args.overrides {
        Some(path) => matcher::OverrideTable::load(path)
            .with_context(|| format!("failed to load overrides {}", path.display()))?,
        None => matcher::OverrideTable::default(),
    };

    println!("[1/3] Reading catalog...");
    let products = store.read_all()?;
    println!("✔ {} products ({:?})\n", products.len(), store.syntax());

    let source = match (&args.images, &args.analyses) {
        (_, Some(path)) => EvidenceSource::AnalysisFile(path.clone()),
        (Some(folder), None) => EvidenceSource::Images {
            folder: folder.clone(),
            recursive: args.recursive,
            use_cache: !args.no_cache,
        },
        (None, None) => anyhow::bail!("either --images or --analyses is required"),
    };

    println!("[2/3] Collecting evidence...");
    let cancel = cancel_on_ctrl_c();
    let evidence = coordinator::collect_evidence(&source, provider, &config.gather_options(), &cancel).await?;
    let failed = evidence.values().filter(|e| e.is_err()).count();
    println!("✔ {} images, {} unavailable\n", evidence.len(), failed);

    let options = RunOptions { dry_run: true, schema: args.schema };
    Ok((Coordinator::from_config(&config, overrides, options), evidence))
}

fn print_reassignments(report: &RunReport) {
    for r in &report.reassignments {
        println!(
            "  {}: {} → {} ({:.2})",
            r.product_id,
            r.from_image_ref.as_deref().unwrap_or("-"),
            r.to_image_ref,
            r.score
        );
        for reason in &r.reasons {
            println!("      - {}", reason);
        }
    }
}

fn finish(report: &RunReport, path: Option<&Path>) -> anyhow::Result<()> {
    let t = &report.totals;
    if report.dry_run {
        print_reassignments(report);
    }
    println!(
        "✔ {} products: {} unchanged ({} overridden), {} reassigned",
        t.products, t.unchanged, t.overridden, t.reassigned
    );
    if !report.dry_run {
        println!("  applied {}, skipped {}, failed {}", t.applied, t.skipped, t.failed);
    }
    if let Some(backup) = report.patch.as_ref().and_then(|p| p.backup.as_ref()) {
        println!("  backup: {}", backup.display());
    }
    if let Some(reason) = &report.aborted {
        println!("  ✘ aborted: {}", reason);
    }
    if let Some(patch) = &report.patch {
        for f in &patch.failures {
            println!("  ✘ {} {}: {}", f.product_id, f.kind, f.detail);
        }
    }
    for f in &report.evidence_failures {
        println!("  ✘ {} ({}): {}", f.image_id, f.kind, f.detail);
    }
    for w in report.override_warnings.iter().chain(&report.shared_image_warnings) {
        println!("  ⚠ {}", w);
    }
    if !report.unused_images.is_empty() {
        println!("  unused images: {}", report.unused_images.join(", "));
    }

    if let Some(path) = path {
        report.save_json(path)?;
        let md_path = path.with_extension("md");
        std::fs::write(&md_path, report.to_markdown())?;
        println!("✔ Report: {} / {}", path.display(), md_path.display());
    }

    if report.aborted.is_some() {
        return Ok(());
    }
    println!("\n✅ Done{}", if report.dry_run { " (dry run, catalog unchanged)" } else { "" });
    Ok(())
}
