use clap::{Args, Parser, Subcommand};
use crate::ai_provider::AiProvider;
use crate::normalizer::ProviderSchema;
use crate::patcher::RecordSyntax;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "catalog-reconcile")]
#[command(about = "Reconcile catalog product images against vision analysis", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// AI CLI used for image analysis (claude/codex/gemini)
    #[arg(long, default_value = "claude", global = true)]
    pub ai_provider: AiProvider,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze an image folder and write an analysis file
    Analyze {
        /// Image folder
        #[arg(required = true)]
        images: PathBuf,

        /// Output file (default: <images>/analysis.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Scan subfolders too
        #[arg(short = 'r', long)]
        recursive: bool,

        /// Analyze every image again, ignoring the cache
        #[arg(long)]
        no_cache: bool,
    },

    /// Decide reassignments and report them without touching the catalog
    Plan(ReconcileArgs),

    /// Decide reassignments and write them into the catalog
    Apply {
        #[command(flatten)]
        args: ReconcileArgs,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Put a backup back in place of the catalog
    Restore {
        /// Catalog file
        #[arg(required = true)]
        catalog: PathBuf,

        /// Backup file to restore
        #[arg(required = true)]
        backup: PathBuf,
    },

    /// Show or initialize the configuration
    Config {
        /// Print the effective configuration
        #[arg(long)]
        show: bool,

        /// Write the default configuration file
        #[arg(long)]
        init: bool,
    },

    /// Analysis cache management
    Cache {
        /// Delete the cache
        #[arg(long)]
        clear: bool,

        /// Image folder (default: current directory)
        #[arg(short, long)]
        folder: Option<PathBuf>,

        /// Show cache information
        #[arg(long)]
        info: bool,
    },
}

/// Inputs shared by `plan` and `apply`
#[derive(Args, Debug, Clone)]
pub struct ReconcileArgs {
    /// Catalog file (.json or a source file with object literals)
    #[arg(required = true)]
    pub catalog: PathBuf,

    /// Image folder to analyze live
    #[arg(long, conflicts_with = "analyses", required_unless_present = "analyses")]
    pub images: Option<PathBuf>,

    /// Analysis file written by `analyze`
    #[arg(long)]
    pub analyses: Option<PathBuf>,

    /// Scan subfolders of --images too
    #[arg(short = 'r', long)]
    pub recursive: bool,

    /// Analyze every image again, ignoring the cache
    #[arg(long)]
    pub no_cache: bool,

    /// Override table (JSON)
    #[arg(long)]
    pub overrides: Option<PathBuf>,

    /// Shape of the provider payloads
    #[arg(long, value_enum, default_value = "vision-json")]
    pub schema: ProviderSchema,

    /// Catalog syntax (default: from the file extension)
    #[arg(long, value_enum)]
    pub syntax: Option<RecordSyntax>,

    /// Name of the image field in catalog records
    #[arg(long)]
    pub image_field: Option<String>,

    /// Acceptance threshold for this run
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Minimum margin for this run
    #[arg(long)]
    pub margin: Option<f64>,

    /// Concurrent analysis requests for this run
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Write the JSON report here (a .md sibling gets the Markdown rendering)
    #[arg(long)]
    pub report: Option<PathBuf>,
}
