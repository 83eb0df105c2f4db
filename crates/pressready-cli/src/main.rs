//! PressReady command-line front end
//!
//! Commands:
//! - check: run the DTF readiness checks on an image and save the report
//! - history list: saved reports, newest first
//! - history show: full summary of one report
//! - history delete / clear: prune the saved reports

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use pressready_core::history::DEFAULT_MAX_ENTRIES;
use pressready_core::{
    evaluate, CheckInput, CheckStatus, FileFormat, FileStore, HistoryConfig, HistoryStore,
    PrintConfig, Report, ShirtColor,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pressready")]
#[command(about = "DTF print-readiness checks with a local report history")]
struct Cli {
    /// Directory the report history is stored in
    #[arg(long, global = true, env = "PRESSREADY_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Number of reports kept in the history
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_ENTRIES)]
    max_history: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check an image for DTF print readiness and save the report
    Check(CheckArgs),

    /// Browse and prune saved reports
    History {
        #[command(subcommand)]
        command: HistoryCommand,
    },
}

#[derive(clap::Args)]
struct CheckArgs {
    /// PNG, JPEG or SVG file
    file: PathBuf,

    /// Print width in inches
    #[arg(long, default_value_t = 12.0)]
    print_width: f64,

    /// Shirt color (dark or light)
    #[arg(long, default_value = "dark")]
    shirt: ShirtColor,

    /// Whether the print uses a white ink underbase
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    white_ink: bool,

    /// MIME type, overriding the file extension
    #[arg(long)]
    mime: Option<String>,

    /// Pixel width, required for SVG
    #[arg(long, requires = "height_px")]
    width_px: Option<u32>,

    /// Pixel height, required for SVG
    #[arg(long, requires = "width_px")]
    height_px: Option<u32>,
}

#[derive(Subcommand)]
enum HistoryCommand {
    /// List saved reports
    List,

    /// Print the summary of a saved report
    Show {
        /// Report id
        #[arg(required_unless_present = "latest", conflicts_with = "latest")]
        id: Option<String>,

        /// Show the most recent report
        #[arg(long)]
        latest: bool,
    },

    /// Delete a saved report
    Delete {
        /// Report id
        id: String,
    },

    /// Delete every saved report
    Clear,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let history = open_history(cli.data_dir, cli.max_history)?;

    match cli.command {
        Commands::Check(args) => {
            let (report, dpi) = check(&args)?;
            history.save(report.clone()).context("Failed to save report")?;
            print!("{}", render_check(&report, dpi));
            println!("Saved report {}", report.id);
        }
        Commands::History { command } => match command {
            HistoryCommand::List => print!("{}", render_list(&history.load())),
            HistoryCommand::Show { id, latest } => {
                let report = match id {
                    Some(id) if !latest => history.get_by_id(&id),
                    _ => history.get_latest(),
                };
                match report {
                    Some(report) => println!("{}", report.summary_text),
                    None => bail!("No matching report in history"),
                }
            }
            HistoryCommand::Delete { id } => {
                if history.get_by_id(&id).is_none() {
                    bail!("No report with id {}", id);
                }
                let remaining = history.delete_by_id(&id)?;
                println!("Deleted {} ({} left)", id, remaining.len());
            }
            HistoryCommand::Clear => {
                history.clear()?;
                println!("History cleared");
            }
        },
    }

    Ok(())
}

fn default_data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join("pressready"))
        .context("No data directory on this platform, pass --data-dir")
}

fn open_history(data_dir: Option<PathBuf>, max_history: usize) -> Result<HistoryStore<FileStore>> {
    let dir = match data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };
    debug!("History directory: {}", dir.display());

    let config = HistoryConfig::with_max_entries(max_history)?;
    Ok(HistoryStore::with_config(FileStore::new(dir), config)?)
}

/// Pixel dimensions, read from the file unless given explicitly
fn dimensions(
    path: &Path,
    format: FileFormat,
    width_px: Option<u32>,
    height_px: Option<u32>,
) -> Result<(u32, u32)> {
    if let (Some(w), Some(h)) = (width_px, height_px) {
        return Ok((w, h));
    }

    match format {
        FileFormat::Svg => bail!("SVG dimensions cannot be read, pass --width-px and --height-px"),
        FileFormat::Png | FileFormat::Jpeg => image::image_dimensions(path)
            .with_context(|| format!("Failed to read image dimensions from {}", path.display())),
    }
}

/// Run the checks for one file, returning the report and its effective DPI
fn check(args: &CheckArgs) -> Result<(Report, f64)> {
    let file_name = args
        .file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .context("Expected a file path")?;

    let format = FileFormat::detect(&file_name, args.mime.as_deref())?;
    let (width, height) = dimensions(&args.file, format, args.width_px, args.height_px)?;

    let input = CheckInput::new(
        &file_name,
        args.mime.as_deref(),
        width,
        height,
        PrintConfig {
            print_width_in: args.print_width,
            shirt_color: args.shirt,
            white_ink: args.white_ink,
        },
    )?;

    let evaluation = evaluate(&input);
    let dpi = evaluation.effective_dpi;
    let report = Report::new(&input, evaluation);
    info!("Checked {} ({:?}): {}", file_name, format, report.overall_status);

    Ok((report, dpi))
}

fn render_check(report: &Report, dpi: f64) -> String {
    let mut out = format!(
        "{} ({}x{} px, {} in, {} shirt, white ink {})\n",
        report.file_name,
        report.image_width_px,
        report.image_height_px,
        report.print_width_in,
        report.shirt_color,
        if report.white_ink { "on" } else { "off" }
    );
    out.push_str(&format!("Effective DPI: {}\n\n", dpi.round()));

    for result in &report.results {
        out.push_str(&format!(
            "  [{}] {}: {}\n",
            result.status, result.title, result.message
        ));
        if let Some(fix) = &result.suggestion {
            out.push_str(&format!("         Fix: {}\n", fix));
        }
    }

    let verdict = match report.overall_status {
        CheckStatus::Pass => "ready to print",
        CheckStatus::Warning => "printable with warnings",
        CheckStatus::Error => "not ready to print",
    };
    out.push_str(&format!("\nOverall: {} ({})\n", report.overall_status, verdict));
    out
}

fn render_list(reports: &[Report]) -> String {
    if reports.is_empty() {
        return "No saved reports\n".to_string();
    }

    reports
        .iter()
        .map(|r| {
            format!(
                "{}  {}  {:<4}  {}\n",
                r.id,
                r.created_at.format("%Y-%m-%d %H:%M"),
                r.overall_status.label(),
                r.file_name
            )
        })
        .collect()
}
