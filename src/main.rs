use anamnese_organizer::operator::{prompt_person, resolve_person};
use anamnese_organizer::{Config, FailurePolicy, Organizer, RunOptions, SentenceTable, TransferMode};
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "anamnese-organizer")]
#[command(version, about = "Align, identify and file multi-camera anamnese recordings")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML or YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Align cameras and file every clip by sentence
    Run {
        /// Person being recorded (display name or code); prompted when absent
        #[arg(short, long)]
        person: Option<String>,

        /// Move clips instead of copying them
        #[arg(long = "move")]
        move_files: bool,

        /// Show what would happen without touching any file
        #[arg(long)]
        dry_run: bool,

        /// Stop at the first failing file
        #[arg(long)]
        fail_fast: bool,
    },
    /// Only align secondary cameras onto the reference camera
    Align {
        /// Show the renames without performing them
        #[arg(long)]
        dry_run: bool,
    },
    /// Verify directories, clip counts and sentence ids without changing anything
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_filter = if cli.verbose {
        "anamnese_organizer=debug,info"
    } else {
        "anamnese_organizer=info,warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let config = Config::load(cli.config.as_deref())?;
    config.validate()?;
    info!("{}", config.summary());

    let mut options = RunOptions::from_config(&config);

    match cli.command {
        Commands::Run {
            person,
            move_files,
            dry_run,
            fail_fast,
        } => {
            let person_code = match person {
                Some(answer) => resolve_person(&config.people, &answer)?,
                None => prompt_person(&config.people, std::io::stdin().lock(), std::io::stdout())?,
            };

            if move_files {
                options.transfer_mode = TransferMode::Move;
            }
            if fail_fast {
                options.failure_policy = FailurePolicy::FailFast;
            }
            options.dry_run = dry_run;
            options.show_progress = true;

            let sentences = SentenceTable::load_partitions(&config.anamnese.sentence_sources)?;
            let organizer = Organizer::new(config, person_code, sentences, options);

            let cancel = organizer.cancellation_flag();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("🛑 Interrupt received, stopping after the current file");
                    cancel.store(true, Ordering::SeqCst);
                }
            });

            let report = organizer.run().await?;

            info!("🎉 Run completed in {:.2}s", report.total_time.as_secs_f64());
            info!("🎥 Aligned: {}", report.aligned);
            info!("✅ Placed: {}", report.transferred);
            info!("❌ Failed: {}", report.failed);
            for failure in &report.failures {
                error!("   {} [{}]: {}", failure.source.display(), failure.channel, failure.error);
            }

            for failure in &report.audit_failures {
                error!("   {} [{}]: placed but not logged: {}", failure.source.display(), failure.channel, failure.error);
            }

            if !report.is_success() {
                return Err(anyhow!(
                    "{} of {} clips were not placed, {} placements missing from the audit log{}",
                    report.total - report.transferred,
                    report.total,
                    report.audit_failures.len(),
                    if report.cancelled { " (cancelled)" } else { "" }
                ));
            }
        }
        Commands::Align { dry_run } => {
            options.dry_run = dry_run;
            let organizer = Organizer::new(config, String::new(), SentenceTable::default(), options);

            let set = organizer.preflight()?;
            let (_, renamed) = organizer.align(set).await?;
            info!("🎥 {} clips {}", renamed, if dry_run { "would be renamed" } else { "renamed" });
        }
        Commands::Check => {
            let sentences = SentenceTable::load_partitions(&config.anamnese.sentence_sources)?;
            let organizer = Organizer::new(config, String::new(), sentences, options);

            let failures = organizer.check()?;
            if failures.is_empty() {
                info!("✅ Every clip resolves to a sentence");
            } else {
                for failure in &failures {
                    error!("   {} [{}]: {}", failure.source.display(), failure.channel, failure.error);
                }
                return Err(anyhow!("{} clips have no sentence", failures.len()));
            }
        }
    }

    Ok(())
}
