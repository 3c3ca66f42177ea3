//! fatvol CLI
//!
//! Command-line driver for fatvol volume images.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use fatvol::report::human_bytes;
use fatvol::{Config, DirectorySizing, Engine, Result, SyncStrategy};
use tracing_subscriber::{fmt, EnvFilter};

/// fatvol CLI
#[derive(Parser, Debug)]
#[command(name = "fatvol")]
#[command(about = "Single-file FAT-style storage volume")]
#[command(version)]
struct Args {
    /// Volume image file
    #[arg(short, long, default_value = "./fatvol.img")]
    image: PathBuf,

    /// Skip fsync after each write
    #[arg(long)]
    no_sync: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new volume (replaces an existing image)
    Create {
        /// Volume size in bytes
        size: u64,

        /// Block size in bytes
        #[arg(short, long, default_value = "4096")]
        block_size: u32,

        /// Size the directory for this many files
        #[arg(short, long)]
        max_files: Option<u32>,
    },

    /// Copy a host file into the volume
    Put {
        /// Host file to copy
        source: PathBuf,

        /// Name inside the volume (defaults to the file name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Copy a file out of the volume
    Get {
        /// Name inside the volume
        name: String,

        /// Host destination ("-" for stdout, defaults to the name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Rename a file
    Rename {
        /// Current name
        old: String,

        /// New name
        new: String,
    },

    /// Remove a file
    Rm {
        /// Name inside the volume
        name: String,
    },

    /// List files
    Ls,

    /// Show space usage
    Df,

    /// Show volume geometry
    Info,

    /// Check directory and table consistency
    Check,
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,fatvol=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let sync_strategy = if args.no_sync {
        SyncStrategy::Buffered
    } else {
        SyncStrategy::Fsync
    };

    let config = Config::builder()
        .image_path(&args.image)
        .sync_strategy(sync_strategy);

    match args.command {
        Commands::Create {
            size,
            block_size,
            max_files,
        } => {
            let sizing = match max_files {
                Some(count) => DirectorySizing::Entries(count),
                None => DirectorySizing::PerRemainingBlock,
            };
            let config = config
                .total_space(size)
                .block_size(block_size)
                .directory_sizing(sizing)
                .build();
            let engine = Engine::create(config)?;
            println!("{}", engine.info());
        }

        Commands::Put { source, name } => {
            let engine = Engine::open(config.build())?;
            let name = match name {
                Some(name) => name,
                None => default_name(&source),
            };
            let copied = engine.import_file(&source, &name)?;
            println!("{} -> {} ({})", source.display(), name, human_bytes(copied as u64));
        }

        Commands::Get { name, output } => {
            let engine = Engine::open(config.build())?;
            match output {
                Some(path) if path.as_os_str() == "-" => {
                    let payload = engine.get(&name)?;
                    std::io::stdout().write_all(&payload)?;
                }
                output => {
                    let dest = output.unwrap_or_else(|| PathBuf::from(&name));
                    let copied = engine.export_file(&name, &dest)?;
                    println!("{} -> {} ({})", name, dest.display(), human_bytes(copied as u64));
                }
            }
        }

        Commands::Rename { old, new } => {
            let engine = Engine::open(config.build())?;
            engine.rename(&old, &new)?;
        }

        Commands::Rm { name } => {
            let engine = Engine::open(config.build())?;
            engine.remove(&name)?;
        }

        Commands::Ls => {
            let engine = Engine::open(config.build())?;
            let names = engine.list()?;
            println!("Total files: {}", names.len());
            for name in names {
                println!("{}", name);
            }
        }

        Commands::Df => {
            let engine = Engine::open(config.build())?;
            println!("{}", engine.usage()?);
        }

        Commands::Info => {
            let engine = Engine::open(config.build())?;
            println!("{}", engine.info());
        }

        Commands::Check => {
            let engine = Engine::open(config.build())?;
            println!("{}", engine.check()?);
        }
    }

    Ok(())
}

/// File name component of a host path, or the whole path if it has none
fn default_name(source: &Path) -> String {
    source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.to_string_lossy().into_owned())
}
