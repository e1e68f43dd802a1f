use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use mediarc_core::{ArchiveAction, ArchiveControl, ArchiveOptions, CancellationToken, DuplicateMode};

#[derive(Parser)]
#[command(name = "mediarc", version, about = "File photos and videos into a date-structured archive")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Copy media from INPUT into the archive at OUTPUT
    Archive {
        /// Source directory
        #[arg(short = 'i', long = "input")]
        input: PathBuf,

        /// Archive root
        #[arg(short = 'o', long = "output")]
        output: PathBuf,

        /// What to do with a file whose identical copy is already archived
        /// (a bare -d means ignore)
        #[arg(
            short = 'd',
            long = "duplicates",
            value_enum,
            default_value = "mark",
            num_args = 0..=1,
            default_missing_value = "ignore"
        )]
        duplicates: Mode,

        /// Re-file misplaced items of an existing archive instead of copying
        #[arg(short = 'c', long = "check")]
        check: bool,

        /// Decide everything, change nothing (implies --verbose)
        #[arg(short = 'n', long = "dry-run")]
        dry_run: bool,

        /// Log every placement decision
        #[arg(short, long)]
        verbose: bool,

        /// Directory for the resume checkpoint (default: the archive root)
        #[arg(long)]
        state_dir: Option<PathBuf>,

        /// Also read creation times from PNG metadata chunks
        #[arg(long)]
        png_timestamps: bool,
    },
    /// Print format, creation time and signatures of files
    Inspect {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Also read creation times from PNG metadata chunks
        #[arg(long)]
        png_timestamps: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    #[value(alias = "0")]
    Ignore,
    #[value(alias = "1")]
    Skip,
    #[value(alias = "2")]
    Mark,
}

impl From<Mode> for DuplicateMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Ignore => DuplicateMode::Ignore,
            Mode::Skip => DuplicateMode::Skip,
            Mode::Mark => DuplicateMode::Mark,
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Archive {
            input,
            output,
            duplicates,
            check,
            dry_run,
            verbose,
            state_dir,
            png_timestamps,
        } => {
            let verbose = verbose || dry_run;
            init_logging(verbose);

            let options = ArchiveOptions {
                source_root: input,
                dest_root: output,
                mode: duplicates.into(),
                action: if check {
                    ArchiveAction::Verify
                } else {
                    ArchiveAction::Copy
                },
                dry_run,
                state_dir,
                png_timestamps,
            };
            run_archive(&options, verbose)
        }
        Command::Inspect {
            files,
            png_timestamps,
        } => {
            init_logging(false);
            for path in files {
                let inspection = mediarc_core::inspect(&path, png_timestamps)
                    .with_context(|| format!("Failed to inspect {}", path.display()))?;
                let created = inspection
                    .metadata
                    .created_on
                    .map(|dt| dt.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                let fingerprint = inspection
                    .fingerprint
                    .map(|fp| fp.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}\t{}/{}\t{}\tcrc32={:08x}\tdhash={}",
                    path.display(),
                    inspection.metadata.format,
                    inspection.metadata.class,
                    created,
                    inspection.crc32,
                    fingerprint
                );
            }
            Ok(())
        }
    }
}

fn run_archive(options: &ArchiveOptions, verbose: bool) -> anyhow::Result<()> {
    let t_total = Instant::now();

    let token = CancellationToken::new();
    let handler_token = token.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nStopping after the current file...");
        handler_token.cancel();
    })
    .context("Failed to install Ctrl-C handler")?;
    let control = ArchiveControl::new().with_cancel_token(token);

    // Per-file log lines replace the bar in verbose mode.
    let pb = if verbose {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(0)
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:40}] {pos}/{len} {wide_msg}")
            .context("Invalid progress template")?,
    );
    let bar = pb.clone();
    let result = mediarc_core::archive_with_control(options, &control, &move |_stage, current, total, message| {
        bar.set_length(total);
        bar.set_position(current + 1);
        bar.set_message(message.to_string());
    });
    pb.finish_and_clear();

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            let checkpoint = options.normalized().checkpoint_path();
            if checkpoint.exists() {
                eprintln!(
                    "Progress saved to {}; run the same command again to resume.",
                    checkpoint.display()
                );
            }
            return Err(e.into());
        }
    };

    let placed = if options.action == ArchiveAction::Verify {
        format!("{} moved, {} already in place", report.moved, report.left_in_place)
    } else {
        format!(
            "{} copied, {} duplicates skipped, {} duplicates marked",
            report.copied, report.skipped_duplicates, report.marked_duplicates
        )
    };
    eprintln!(
        "{}{} files: {}, {} need manual check, {} unsupported ({:.2}s)",
        if options.dry_run { "[dry run] " } else { "" },
        report.total,
        placed,
        report.manual_check,
        report.unsupported,
        t_total.elapsed().as_secs_f64()
    );

    Ok(())
}
