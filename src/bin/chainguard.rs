#![forbid(unsafe_code)]
//! Inspect reorg guard verdicts from the command line

use chainguard::config::{load_config, load_config_from, Config};
use chainguard::guard::{ChainGuard, GuardReport, Verdict};
use chainguard::sync::SegmentSynchronizer;
use chainguard::{logging, Blockchain, ChainTip};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to ./config.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scores a hypothetical segment against a given tip
    Evaluate {
        /// Local tip height
        #[arg(long)]
        tip: u64,
        /// Local tip difficulty
        #[arg(long, default_value_t = 100_000_000)]
        difficulty: u64,
        /// Segment heights, either `990-994` or `999,1000,1001`
        #[arg(long)]
        heights: String,
        /// Treat the node as already caught up with the network
        #[arg(long)]
        synced: bool,
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replays a catch-up block followed by a deep reorg attempt on an in-memory chain
    Simulate {
        #[arg(long, default_value_t = 1000)]
        height: u64,
        #[arg(long, default_value_t = 100_000_000)]
        difficulty: u64,
        /// How many local blocks the attacking branch rolls back
        #[arg(long, default_value_t = 10)]
        fork_depth: u64,
        /// Attacking branch length
        #[arg(long, default_value_t = 5)]
        length: u64,
    },
    /// Prints the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    logging::init(&config.logging)?;

    match cli.command {
        Commands::Evaluate {
            tip,
            difficulty,
            heights,
            synced,
            json,
        } => {
            let segment = parse_heights(&heights)?;
            let guard = ChainGuard::with_sync_status(config.guard.clone(), synced);
            let report = guard.evaluate_detailed(&ChainTip { height: tip, difficulty }, &segment);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        Commands::Simulate {
            height,
            difficulty,
            fork_depth,
            length,
        } => simulate(&config, height, difficulty, fork_depth, length).await?,
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

async fn simulate(
    config: &Config,
    height: u64,
    difficulty: u64,
    fork_depth: u64,
    length: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    if fork_depth == 0 || fork_depth > height {
        return Err(format!("fork depth must be between 1 and {}", height).into());
    }

    println!("{}", format!("⛓️  Building local chain to height {}...", height).bright_cyan());
    let mut chain = Blockchain::new(difficulty);
    chain.extend_local(height)?;

    let guard = Arc::new(ChainGuard::new(config.guard.clone()));
    let sync = SegmentSynchronizer::new(Arc::new(RwLock::new(chain)), Arc::clone(&guard));
    sync.register_peer("honest", height + 1).await?;
    sync.register_peer("attacker", height + length).await?;

    let next = sync.chain().read().await.build_branch(height, 1, b"honest")?;
    match sync.import_segment("honest", next).await {
        Ok(n) => println!("{}", format!("✅ honest peer: {} block(s) imported", n).green()),
        Err(e) => println!("{}", format!("❌ honest peer: {}", e).red()),
    }
    println!("   synced: {}", guard.is_synced());

    let tip = sync.chain().read().await.height();
    let attack = sync
        .chain()
        .read()
        .await
        .build_branch(tip - fork_depth, length, b"attacker")?;
    match sync.import_segment("attacker", attack).await {
        Ok(n) => println!("{}", format!("⚠️  attacker: {} block(s) imported", n).yellow()),
        Err(e) => println!("{}", format!("🛡️  attacker: {}", e).bright_red().bold()),
    }

    let stats = guard.stats();
    println!();
    println!(
        "evaluations: {}  rejections: {}  final height: {}",
        stats.evaluations,
        stats.rejections,
        sync.chain().read().await.height()
    );
    Ok(())
}

fn print_report(report: &GuardReport) {
    println!("{}", "🛡️  Reorg guard report".bright_cyan().bold());
    println!("   tip:        {} (difficulty {})", report.tip, report.difficulty);
    match report.incoming_height {
        Some(h) => println!("   incoming:   {} ({} blocks)", h, report.segment_len),
        None => println!("   incoming:   empty segment"),
    }
    println!("   synced:     {}", report.synced);
    println!("   active:     {}", report.active);
    println!("   scored:     {}", report.scored);
    for entry in &report.entries {
        println!("     height {:>10}  penalty {:>6}", entry.height, entry.value);
    }
    println!(
        "   penalty:    {} x {} = {}",
        report.raw_penalty, report.multiplier, report.penalty
    );
    match report.verdict {
        Verdict::Accept => println!("{}", "✅ ACCEPT".green().bold()),
        Verdict::Reject { penalty } => {
            println!("{}", format!("❌ REJECT (penalty {})", penalty).red().bold())
        }
    }
}

fn parse_heights(s: &str) -> Result<Vec<u64>, String> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(Vec::new());
    }

    if let Some((from, to)) = s.split_once('-') {
        let from: u64 = from.trim().parse().map_err(|e| format!("bad range start '{}': {}", from, e))?;
        let to: u64 = to.trim().parse().map_err(|e| format!("bad range end '{}': {}", to, e))?;
        if from > to {
            return Err(format!("range {}-{} is reversed", from, to));
        }
        return Ok((from..=to).collect());
    }

    s.split(',')
        .map(|h| h.trim().parse::<u64>().map_err(|e| format!("bad height '{}': {}", h, e)))
        .collect()
}
