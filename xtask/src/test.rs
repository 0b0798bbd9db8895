use anyhow::Result;
use colored::Colorize;
use std::time::Instant;

use crate::cargo::Step;

pub fn run(unit_only: bool, integration_only: bool) -> Result<()> {
    println!();
    println!("{}", "🧪 Running tests...".cyan().bold());
    println!();

    let total_start = Instant::now();

    if !integration_only {
        Step::fatal("Unit tests", &["test", "--lib", "--workspace"]).run()?;
    }
    if !unit_only {
        // Every tests/*.rs in every crate: registry and bus arbitration,
        // the player flow, and the card-backed end to end runs.
        Step::fatal("Integration tests", &["test", "--workspace", "--tests"]).run()?;
    }
    if !unit_only && !integration_only {
        Step::advisory("Doc tests", &["test", "--doc", "--workspace"]).run()?;
    }

    println!(
        "{}",
        format!("✓ All tests completed in {:.2}s", total_start.elapsed().as_secs_f64())
            .green()
            .bold()
    );
    println!();

    Ok(())
}
