//! Variant comparison command handler.

use super::{OutputFormat, load_config, read_script, script_name, to_json};
use dramaturg::{ConfigError, DramaturgResult, PipelineVariant, VariantComparison};
use serde::Deserialize;
use std::path::Path;

/// Variants file layout:
///
/// ```toml
/// [[variant]]
/// name = "deepseek-cold"
/// provider = "deepseek"
///
/// [[variant]]
/// name = "claude"
/// provider = "anthropic"
/// temperature = 0.3
/// ```
#[derive(Debug, Deserialize)]
struct VariantsFile {
    variant: Vec<PipelineVariant>,
}

fn load_variants(path: &Path) -> Result<Vec<PipelineVariant>, ConfigError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::new(format!("Failed to read {}: {}", path.display(), e)))?;
    let file: VariantsFile = toml::from_str(&text)
        .map_err(|e| ConfigError::new(format!("Failed to parse {}: {}", path.display(), e)))?;
    if file.variant.is_empty() {
        return Err(ConfigError::new("At least one [[variant]] is required"));
    }
    Ok(file.variant)
}

/// Runs every variant on the script. Returns whether any variant completed.
pub async fn compare_variants(
    config_path: Option<&Path>,
    script_path: &Path,
    variants_path: &Path,
    format: OutputFormat,
) -> DramaturgResult<bool> {
    let config = load_config(config_path)?;
    let variants = load_variants(variants_path)?;
    let script = read_script(script_path)?;
    let prompts = config.prompt_library()?;

    let report = VariantComparison::new(config, prompts)
        .compare(&script, &script_name(script_path), &variants)
        .await;

    match format {
        OutputFormat::Json => println!("{}", to_json(&report)?),
        OutputFormat::Human => {
            println!("Comparison on {}", report.script_name);
            for result in &report.results {
                println!(
                    "  {:<20} {:<7} {:>6.1}s  {} TCCs  confidence {:.2}",
                    result.variant.name(),
                    if result.success { "ok" } else { "failed" },
                    result.duration_secs,
                    result.tcc_count,
                    result.mean_confidence
                );
                for error in &result.errors {
                    println!("      {}", error);
                }
            }
            println!(
                "Winner: {}",
                report.winner.as_deref().unwrap_or("none (every variant failed)")
            );
        }
    }
    Ok(report.winner.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dramaturg::Provider;

    #[test]
    fn parses_variant_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("variants.toml");
        std::fs::write(
            &path,
            "[[variant]]\nname = \"a\"\nprovider = \"deepseek\"\n\n\
             [[variant]]\nname = \"b\"\nprovider = \"anthropic\"\ntemperature = 0.5\n",
        )
        .unwrap();
        let variants = load_variants(&path).unwrap();
        assert_eq!(variants.len(), 2);
        assert_eq!(*variants[1].provider(), Provider::Anthropic);
        assert_eq!(*variants[1].temperature(), 0.5);
        assert_eq!(*variants[0].max_tokens(), 4096);
    }

    #[test]
    fn empty_variants_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("variants.toml");
        std::fs::write(&path, "variant = []\n").unwrap();
        assert!(load_variants(&path).is_err());
    }
}
