use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use gallery_shrink::config::{self, Preset};
use gallery_shrink::{output, process};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gallery-shrink")]
#[command(about = "Shrink image galleries into web-sized WebP derivatives")]
#[command(long_about = "\
Shrink image galleries into web-sized WebP derivatives

For every .jpg, .jpeg, .png, .gif or .webp image, writes a thumbnail into a
lowres/ directory and replaces the original with a copy whose shortest side
is at most 1000 px. Reruns are safe: converted images are re-encoded in place.

Layouts:

  albums <ROOT>                        screenshots <ROOT>
  pics/                                shots/
  ├── 2023/                            ├── lowres/
  │   ├── lowres/fjord.webp  (300 w)   │   └── login.webp  (300 h)
  │   └── fjord.webp                   └── login.webp
  └── cover.webp

Thumbnail directories are emptied of files at the start of every run.

Run 'gallery-shrink gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Config file (default: <ROOT>/config.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write the run summary as JSON to this file
    #[arg(long, global = true)]
    report: Option<PathBuf>,

    /// Log more detail to stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert nested photo albums (recursive, 300 px wide thumbnails)
    Albums {
        /// Gallery root directory
        root: PathBuf,
    },
    /// Convert a flat screenshot folder (300 px tall thumbnails)
    Screenshots {
        /// Gallery root directory
        root: PathBuf,
    },
    /// Show what a run would write, without touching any file
    Check {
        /// Gallery root directory
        root: PathBuf,
        #[arg(long, value_enum, default_value_t = LayoutArg::Albums)]
        layout: LayoutArg,
    },
    /// Print a stock config.toml with all options documented
    GenConfig {
        #[arg(long, value_enum, default_value_t = LayoutArg::Albums)]
        layout: LayoutArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LayoutArg {
    Albums,
    Screenshots,
}

impl From<LayoutArg> for Preset {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Albums => Preset::Albums,
            LayoutArg::Screenshots => Preset::Screenshots,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Albums { root } => {
            convert(&root, Preset::Albums, cli.config.as_deref(), cli.report.as_deref())?;
        }
        Command::Screenshots { root } => {
            convert(
                &root,
                Preset::Screenshots,
                cli.config.as_deref(),
                cli.report.as_deref(),
            )?;
        }
        Command::Check { root, layout } => {
            let config = config::load_config(&root, layout.into(), cli.config.as_deref())?;
            let report = process::check(&config, &root)?;
            output::print_check_report(&report);
        }
        Command::GenConfig { layout } => {
            print!("{}", config::stock_config_toml(layout.into()));
        }
    }

    Ok(())
}

/// Load config, process the gallery, and print progress as it happens.
fn convert(
    root: &Path,
    preset: Preset,
    config_path: Option<&Path>,
    report_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_config(root, preset, config_path)?;

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            let to_stderr = output::is_error_event(&event);
            for line in output::format_process_event(&event) {
                if to_stderr {
                    eprintln!("{}", line);
                } else {
                    println!("{}", line);
                }
            }
        }
    });
    let result = process::process(&config, root, Some(tx));
    printer
        .join()
        .map_err(|_| "progress printer thread panicked")?;
    let summary = result?;

    output::print_summary(&summary);
    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(path, json)?;
    }
    Ok(())
}

/// Send `tracing` output to stderr, filtered by the verbosity flag.
///
/// Warnings (fallback decodes, failed images) show by default; each `-v`
/// raises the level for this crate only.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::new(format!("warn,gallery_shrink={level}"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
