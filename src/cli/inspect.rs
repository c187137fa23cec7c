//! CLI `inspect` command — list the store, live cooldowns, and recent decisions.

use anyhow::Result;

use rme::config::RmeConfig;
use rme::db::checkpoint;

/// Print admitted motifs, active cooldowns, and the last `limit` decisions.
pub fn inspect(config: &RmeConfig, limit: usize) -> Result<()> {
    let (conn, mut policy, _clock) = super::open_engine(config)?;

    println!("Admitted motifs ({})", policy.elements().len());
    println!("{}", "=".repeat(50));
    for motif in policy.elements() {
        println!("  {motif}");
    }

    let cooling = policy.get_cooldown_motifs();
    if !cooling.is_empty() {
        println!();
        println!("Cooling down ({})", cooling.len());
        println!("{}", "=".repeat(50));
        for motif in &cooling {
            println!("  {motif}");
        }
    }

    let decisions = checkpoint::recent_decisions(&conn, limit)?;
    if !decisions.is_empty() {
        println!();
        println!("Recent decisions");
        println!("{}", "=".repeat(50));
        for d in &decisions {
            let looped = if d.loop_detected { " loop" } else { "" };
            let verdict = if d.reason.is_accept() { "accept" } else { "reject" };
            println!(
                "  #{:<5} {:<6} {:<20} delta={:+.3} thr={:+.3} echo={:.2} stag={:.2}{looped}",
                d.id,
                verdict,
                d.reason.as_str(),
                d.delta_reduction,
                d.effective_threshold,
                d.echo_score,
                d.stagnation,
            );
            println!("         {}", super::format_set(&d.candidate));
        }
    }

    Ok(())
}
