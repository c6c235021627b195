//! Run history summary.

use super::{OutputFormat, load_config, to_json};
use dramaturg::{DramaturgResult, MetricsStore};
use std::path::Path;

/// Prints aggregate statistics over recorded runs.
pub async fn show_stats(
    config_path: Option<&Path>,
    last: Option<usize>,
    format: OutputFormat,
) -> DramaturgResult<()> {
    let config = load_config(config_path)?;
    let store = MetricsStore::new(config.history.path());
    let Some(stats) = store.stats(last).await? else {
        println!("No runs recorded in {}", store.path().display());
        return Ok(());
    };

    match format {
        OutputFormat::Json => println!("{}", to_json(&stats)?),
        OutputFormat::Human => {
            println!(
                "{} runs: {} succeeded, {} failed ({:.1}% success)",
                stats.total_runs, stats.successful_runs, stats.failed_runs, stats.success_rate
            );
            println!("Average duration: {:.1}s", stats.avg_duration_secs);
            for (stage, avg) in &stats.stage_stats {
                println!(
                    "  {:<10} {:.1}s, {:.1} calls, {:.1} retries, {:.0} tokens",
                    stage.to_string(),
                    avg.avg_duration_secs,
                    avg.avg_calls,
                    avg.avg_retries,
                    avg.avg_tokens
                );
            }
        }
    }
    Ok(())
}
