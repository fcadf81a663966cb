use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use target_fusion::config::FusionConfig;
use target_fusion::io::{read_frame_log, replay};
use target_fusion::target::CertainTargetDescriptor;

/// Replay a frame log and report where each catalog target is.
#[derive(Debug, Parser)]
#[command(name = "target-fusion-replay", version)]
struct Args {
    /// Frame log in JSON Lines format
    #[arg(long)]
    frames: PathBuf,

    /// YAML list of target descriptors to locate
    #[arg(long)]
    catalog: PathBuf,

    /// YAML fusion configuration (defaults when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = match &args.config {
        Some(path) => FusionConfig::from_yaml_file(path)?,
        None => FusionConfig::default(),
    };
    let catalog = load_catalog(&args.catalog)?;
    let records = read_frame_log(&args.frames)?;
    info!(
        "Loaded {} frames and {} catalog targets",
        records.len(),
        catalog.len()
    );

    let manager = replay(&records, config);
    println!("{} tracks after replay", manager.len());

    for (target, found) in catalog.iter().zip(manager.estimate_positions(&catalog)) {
        match found {
            Some(track) => {
                let p = track.position();
                let ids: Vec<String> = track
                    .contributing_ids()
                    .iter()
                    .map(|id| id.to_string())
                    .collect();
                println!(
                    "{} -> track {} at [{:.2}, {:.2}, {:.2}] (score {:.3})",
                    target,
                    track.id(),
                    p.x,
                    p.y,
                    p.z,
                    track.match_score(target)
                );
                println!("  contributing: {}", ids.join(", "));
            }
            None => {
                warn!("No track available for {}", target);
                println!("{} -> no track", target);
            }
        }
    }

    Ok(())
}

fn load_catalog(path: &Path) -> Result<Vec<CertainTargetDescriptor>> {
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    serde_yaml::from_reader(file).with_context(|| format!("Failed to parse catalog {:?}", path))
}

fn init_logging(verbose: bool) {
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true);

    if verbose {
        subscriber.with_max_level(tracing::Level::DEBUG).init();
        info!("Verbose logging enabled (DEBUG level)");
    } else {
        subscriber.with_max_level(tracing::Level::INFO).init();
    }
}
