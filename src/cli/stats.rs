use anyhow::Result;

use rme::config::RmeConfig;
use rme::db::checkpoint;
use rme::engine::Clock;

/// Display engine statistics in the terminal.
pub fn stats(config: &RmeConfig) -> Result<()> {
    let (conn, mut policy, clock) = super::open_engine(config)?;
    let stats = policy.stats();

    println!("Engine Statistics");
    println!("{}", "=".repeat(40));
    println!("  Motifs:              {}", stats.elements);
    println!("  Entropy:             {:.4}", stats.entropy);
    println!("  Merges:              {}", stats.merge_count);
    println!("  Maturity:            {:.2}", stats.maturity);
    println!("  Consecutive blocks:  {}", stats.consecutive_blocks);
    println!("  Active cooldowns:    {}", stats.cooldowns_active);
    println!();

    println!("Stagnation:");
    println!("  Severity:            {:.2}", stats.stagnation);
    println!("  Clock:               {}", clock.now());
    println!("  Last merge at:       {}", stats.last_merge_time);
    let history: Vec<String> = stats
        .entropy_history
        .iter()
        .map(|h| format!("{h:.3}"))
        .collect();
    println!("  Entropy window:      [{}]", history.join(", "));
    println!();

    match checkpoint::latest_checkpoint(&conn)? {
        Some(cp) => println!("Last checkpoint:       {} ({})", cp.created_at, cp.id),
        None => println!("Last checkpoint:       (none)"),
    }

    Ok(())
}
