//! Manual-inspection CLI: runs the session processing pipeline over a
//! single asciicast v3 recording and prints a summary, for fixture
//! generation and ad-hoc debugging. Not part of the core's public API.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use ragts_core::config::PipelineConfig;
use ragts_core::pipeline;
use ragts_core::repository::InMemoryRepository;

/// Replays an asciicast v3 recording through the session processing
/// pipeline and reports the clean document and detected sections.
#[derive(Parser, Debug)]
#[command(name = "ragts-replay", version, about)]
struct Cli {
    /// Path to a `.cast` (NDJSON) recording.
    path: PathBuf,

    /// Session identifier to use when invoking the repository. Defaults to
    /// the file's stem.
    #[arg(long)]
    session_id: Option<String>,

    /// Path to a JSON pipeline config file (see `PipelineConfig`). Falls
    /// back to the documented defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the clean snapshot's line text after processing.
    #[arg(long)]
    print_snapshot: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => PipelineConfig::load(path).context("loading pipeline config")?,
        None => PipelineConfig::default(),
    };

    let session_id = cli.session_id.clone().unwrap_or_else(|| {
        cli.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "session".to_string())
    });

    let file = File::open(&cli.path)
        .with_context(|| format!("opening {}", cli.path.display()))?;
    let reader = BufReader::new(file);

    let repo = InMemoryRepository::new();
    let cancel = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let session = pipeline::run(reader, &session_id, &repo, &config, cancel)
        .with_context(|| format!("processing session {session_id}"))?;

    println!("session:        {}", session.id);
    println!("status:         {:?}", session.status);
    println!(
        "term:           {}x{}",
        session.header.cols(),
        session.header.rows()
    );
    println!("events:         {}", session.event_count);
    println!("clean lines:    {}", session.clean_snapshot.lines.len());
    println!("sections:       {}", session.section_count);
    if !session.malformed_lines.is_empty() {
        println!("malformed:      {} lines skipped", session.malformed_lines.len());
    }
    for section in &session.sections {
        let range = match (section.start_line, section.end_line) {
            (Some(s), Some(e)) => format!("lines {s}..{e}"),
            _ => "tui snapshot".to_string(),
        };
        println!(
            "  [{:>5}] {:?} {:<24} {}",
            section.start_event, section.kind, section.label, range
        );
    }

    if cli.print_snapshot {
        println!();
        for line in &session.clean_snapshot.lines {
            println!("{}", line.text());
        }
    }

    Ok(())
}
