//! CLI `replay` command — drive the engine from a text transcript.
//!
//! Each non-empty line is one cognition cycle: its n-grams become the
//! candidate motif set and the logical clock advances by one.

use anyhow::{Context, Result};
use clap::Args;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use rme::config::RmeConfig;
use rme::db::checkpoint;
use rme::engine::types::ngrams;
use rme::engine::{Clock, EmotionalState};

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// Transcript file, one utterance per line (reads stdin when omitted)
    pub file: Option<PathBuf>,

    /// Panic level applied to every cycle
    #[arg(long, default_value_t = 0.0)]
    pub panic: f64,

    /// Joy level applied to every cycle
    #[arg(long, default_value_t = 0.0)]
    pub joy: f64,

    /// Echo score supplied with each candidate (0 lets the engine estimate it)
    #[arg(long, default_value_t = 0.0)]
    pub echo: f64,

    /// Base threshold (defaults to admission.base_threshold)
    #[arg(long)]
    pub base_threshold: Option<f64>,

    /// Longest n-gram extracted per line (defaults to replay.max_ngram)
    #[arg(long)]
    pub ngram: Option<usize>,

    /// Evaluate without saving a checkpoint or logging decisions
    #[arg(long)]
    pub dry_run: bool,
}

/// Replay a transcript through the engine and print one verdict per line.
pub fn replay(config: &RmeConfig, args: &ReplayArgs) -> Result<()> {
    let reader: Box<dyn BufRead> = match &args.file {
        Some(path) => {
            let file = std::fs::File::open(path)
                .with_context(|| format!("failed to open transcript: {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(std::io::stdin())),
    };

    let (mut conn, mut policy, clock) = super::open_engine(config)?;
    let base_threshold = args.base_threshold.unwrap_or(config.admission.base_threshold);
    let max_n = args.ngram.unwrap_or(config.replay.max_ngram);
    let emotion = EmotionalState::new(args.panic, args.joy);

    let mut accepted = 0u64;
    let mut rejected = 0u64;

    for line in reader.lines() {
        let line = line.context("failed to read transcript line")?;
        let candidate = ngrams(&line, max_n);
        if candidate.is_empty() {
            continue;
        }

        clock.advance(1.0);
        let decision =
            policy.merge_against_store(candidate.clone(), args.echo, base_threshold, emotion);
        if !args.dry_run {
            checkpoint::log_decision(&conn, &candidate, &decision)?;
        }

        let verdict = if decision.accepted {
            accepted += 1;
            "ACCEPT"
        } else {
            rejected += 1;
            "reject"
        };
        println!(
            "[{:>5}] {verdict} {:<20} delta={:+.3} thr={:+.3} echo={:.2} H={:.3}  {}",
            clock.now(),
            decision.reason.as_str(),
            decision.delta_reduction,
            decision.effective_threshold,
            decision.echo_score,
            policy.entropy(),
            line.trim(),
        );
    }

    println!();
    println!(
        "{accepted} accepted, {rejected} rejected; store holds {} motifs (entropy {:.3})",
        policy.elements().len(),
        policy.entropy()
    );

    if args.dry_run {
        eprintln!("Dry run: checkpoint not saved.");
    } else {
        let summary = checkpoint::save_checkpoint(&mut conn, &policy)?;
        eprintln!("Checkpoint {} saved.", summary.id);
    }
    Ok(())
}
