//! Offline script validation.

use super::read_script;
use dramaturg::{DramaturgResult, validate_setup_payoff_integrity};
use std::path::Path;

/// Checks a script without calling a model. Returns whether it can be analysed.
///
/// Broken setup/payoff links are reported but do not fail validation; the
/// modifier stage exists to repair them.
pub fn validate_script(script_path: &Path) -> DramaturgResult<bool> {
    let script = read_script(script_path)?;
    if let Err(e) = script.validate() {
        println!("Invalid: {}", e.kind);
        return Ok(false);
    }

    println!("Valid: {} scenes", script.len());
    println!(
        "Scenes without setup/payoff data: {:.0}%",
        script.missing_setup_payoff_ratio() * 100.0
    );
    let issues = validate_setup_payoff_integrity(&script);
    if issues.is_empty() {
        println!("Setup/payoff links are consistent");
    } else {
        println!("{} setup/payoff issues:", issues.len());
        for issue in issues {
            println!("  {}", issue);
        }
    }
    Ok(true)
}
