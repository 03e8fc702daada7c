//! # ldx CLI
//!
//! Builds, inspects and queries LooseDex loose-file caches.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use ldx_cache::PathNormalizer;
use ldx_config::logging::{init_logging, LogLevel};
use ldx_config::NormalizationConfig;

mod build;
mod inspect;
mod query;

/// LooseDex - precomputed loose-file index for the game's resource system
#[derive(Parser)]
#[command(name = "ldx")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Root marker every cached path starts with (empty disables it)
    #[arg(long, global = true, default_value = "data")]
    root_marker: String,

    /// Name of the root itself in traversal prefixes
    #[arg(long, global = true, default_value = "root")]
    root_sentinel: String,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a data directory into a cache file
    Build {
        /// Game data directory (or any loose-file tree)
        #[arg(value_name = "DIR")]
        directory: PathBuf,

        /// Output cache file [default: <DIR>/SKSE/Plugins/LooseDex/loosedex_vfs_cache.bin]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Additional extension to leave out (repeatable)
        #[arg(long = "exclude-ext", value_name = "EXT")]
        exclude_ext: Vec<String>,

        /// Default-excluded extension to index anyway (repeatable)
        #[arg(long = "include-ext", value_name = "EXT")]
        include_ext: Vec<String>,

        /// Start from an empty exclusion list
        #[arg(long)]
        no_default_excludes: bool,

        /// Print every excluded file
        #[arg(long)]
        show_excluded: bool,
    },

    /// Summarize a cache file
    Inspect {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Show up to two sample paths per extension
        #[arg(long)]
        samples: bool,

        /// Machine-readable output
        #[arg(long)]
        json: bool,
    },

    /// Print normalized form and fingerprint of paths
    Hash {
        /// Paths to hash [default: built-in parity vectors]
        #[arg(value_name = "PATH")]
        paths: Vec<String>,
    },

    /// Resolve one path against a cache file
    Lookup {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(value_name = "PATH")]
        path: String,
    },

    /// List cached paths under a directory prefix
    List {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Directory prefix [default: everything]
        #[arg(value_name = "PREFIX", default_value = "")]
        prefix: String,

        /// Stop after this many paths
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Print the default config file
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Warn
    });

    let normalizer = PathNormalizer::from_config(&NormalizationConfig {
        root_marker: cli.root_marker.clone(),
        root_sentinel: cli.root_sentinel.clone(),
    });

    match cli.command {
        Commands::Build {
            directory,
            output,
            exclude_ext,
            include_ext,
            no_default_excludes,
            show_excluded,
        } => {
            let excluded =
                build::excluded_extensions(!no_default_excludes, &exclude_ext, &include_ext);
            let output = output.unwrap_or_else(|| build::default_output(&directory));
            build::run(&directory, &output, &excluded, normalizer, show_excluded)
        }
        Commands::Inspect {
            file,
            samples,
            json,
        } => inspect::run(&file, normalizer, samples, json),
        Commands::Hash { paths } => {
            query::hash(&paths, &normalizer);
            Ok(())
        }
        Commands::Lookup { file, path } => query::lookup(&file, normalizer, &path),
        Commands::List {
            file,
            prefix,
            limit,
        } => query::list(&file, normalizer, &prefix, limit),
        Commands::Config => {
            print!("{}", ldx_config::Config::default_toml()?);
            Ok(())
        }
    }
}
