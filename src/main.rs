use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use tracing_subscriber::EnvFilter;

use page_mirror::{MirrorCommand, PageMirror, ProgressBarReporter};

#[tokio::main]
async fn main() {
    let args = MirrorCommand::parse();
    setup_logging(&args);

    if let Err(e) = run(&args).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(args: &MirrorCommand) -> Result<()> {
    let mut mirror = PageMirror::new(args.options())?;
    if args.show_progress() {
        mirror = mirror.with_progress(ProgressBarReporter::new());
    }

    let report = mirror.mirror_with_report(&args.url, &args.output_dir).await?;

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("failed to encode report")?;
        println!("{json}");
        return Ok(());
    }

    let failed = report.failed();
    if failed > 0 && !args.quiet {
        eprintln!(
            "{} {} of {} resources could not be downloaded",
            "warning:".yellow().bold(),
            failed,
            report.resources.len()
        );
    }
    println!("{}", report.html_path.display());
    Ok(())
}

fn setup_logging(args: &MirrorCommand) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("page_mirror={}", args.log_level())));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
