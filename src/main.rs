use clap::Parser;
use denis::job::{JobOptions, Overwrite, TransformJob};
use denis::naming::{default_mode, default_output_path};
use denis::transform::Mode;
use dialoguer::{theme::ColorfulTheme, Confirm, Input};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "de-nis", version, about = "D5PC file decoder/encoder")]
struct Cli {
    /// File to decode or encode
    input: PathBuf,
    /// d(ecode) or e(ncode); asked interactively when omitted
    #[arg(short, long)]
    mode: Option<Mode>,
    /// Where to save the result; asked interactively when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Overwrite an existing output file without asking
    #[arg(short, long)]
    force: bool,
    /// Take every default without prompting
    #[arg(short, long)]
    yes: bool,
    /// Keep a partially written output file if the run fails
    #[arg(long)]
    keep_partial: bool,
    /// Progress refresh interval in milliseconds
    #[arg(long, default_value = "50")]
    interval: u64,
    /// Print a JSON run report when done
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli   = Cli::parse();
    let theme = ColorfulTheme::default();

    println!("de-nis: D5PC file decoder/encoder\n");

    // ── Mode ─────────────────────────────────────────────────────────────────
    let suggested = default_mode(&cli.input.to_string_lossy());
    let mode = match cli.mode {
        Some(mode)        => mode,
        None if cli.yes   => suggested,
        None => Input::<Mode>::with_theme(&theme)
            .with_prompt("(d)ecode or (e)ncode?")
            .default(suggested)
            .interact_text()?,
    };

    // ── Output ───────────────────────────────────────────────────────────────
    let derived = default_output_path(&cli.input, mode);
    let output = match cli.output {
        Some(path)      => path,
        None if cli.yes => derived,
        None => PathBuf::from(
            Input::<String>::with_theme(&theme)
                .with_prompt("save as what?")
                .default(derived.to_string_lossy().into_owned())
                .interact_text()?,
        ),
    };

    let overwrite = confirm_overwrite(&theme, &output, cli.force, cli.yes)?;

    // ── Run ──────────────────────────────────────────────────────────────────
    let opts = JobOptions {
        mode,
        overwrite,
        poll_interval:     Duration::from_millis(cli.interval.max(1)),
        remove_incomplete: !cli.keep_partial,
    };
    let job = TransformJob::open(&cli.input, &output, opts)?;

    let result = job.run(|p| {
        print!("\r{p}");
        let _ = io::stdout().flush();
    });
    println!();
    let report = result?;

    if cli.json {
        println!("{}", report.to_json()?);
    }
    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Decide the overwrite policy for `output`, asking when it already exists.
fn confirm_overwrite(
    theme:  &ColorfulTheme,
    output: &Path,
    force:  bool,
    yes:    bool,
) -> Result<Overwrite, Box<dyn std::error::Error>> {
    if !output.exists() {
        return Ok(Overwrite::Never);
    }
    if force {
        return Ok(Overwrite::Allow);
    }
    if yes {
        return Err(format!("{} exists; pass --force to overwrite it", output.display()).into());
    }
    let agreed = Confirm::with_theme(theme)
        .with_prompt("that file exists. overwrite?")
        .default(true)
        .interact()?;
    if agreed {
        Ok(Overwrite::Allow)
    } else {
        Err("aborting".into())
    }
}
