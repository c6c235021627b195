//! Dramaturg CLI binary.
//!
//! This binary provides command-line access to the analysis pipeline:
//! - Analyse a script through all three stages
//! - Validate a script offline
//! - Summarise the run history
//! - Compare provider settings on one script

use clap::Parser;

mod cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use cli::{
        AnalyzeOptions, Cli, Commands, analyze_script, compare_variants, show_stats,
        validate_script,
    };

    // API keys may live in a local .env
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    dramaturg::init_tracing(cli.verbose, cli.json_logs)?;
    let config = cli.config.as_deref();

    let succeeded = match cli.command {
        Commands::Analyze {
            script,
            provider,
            model,
            output,
            no_history,
            format,
        } => {
            let options = AnalyzeOptions {
                provider,
                model,
                output,
                record_history: !no_history,
                format,
            };
            analyze_script(config, &script, options).await?
        }

        Commands::Validate { script } => validate_script(&script)?,

        Commands::Stats { last, format } => {
            show_stats(config, last, format).await?;
            true
        }

        Commands::Compare {
            script,
            variants,
            format,
        } => compare_variants(config, &script, &variants, format).await?,
    };

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}
