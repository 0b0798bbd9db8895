use anyhow::Result;
use colored::Colorize;
use std::time::Instant;

use crate::cargo::{Step, TARGET};

pub fn run() -> Result<()> {
    println!();
    println!("{}", "🔍 Checking firmware builds...".cyan().bold());
    println!();

    let total_start = Instant::now();

    let steps = [
        Step::fatal(
            "Hardware target (STM32F401RE)",
            &["check", "-p", "firmware", "--target", TARGET, "--features", "hardware"],
        ),
        Step::fatal(
            "Emulator target (host)",
            &["check", "-p", "firmware", "--features", "emulator", "--examples"],
        ),
        // Library crates must stay no_std clean on their own.
        Step::fatal(
            "Platform crate (no_std)",
            &["check", "-p", "platform", "--target", TARGET, "--no-default-features"],
        ),
        Step::fatal(
            "Drivers crate (no_std)",
            &["check", "-p", "drivers", "--target", TARGET, "--no-default-features"],
        ),
        Step::fatal(
            "Playback crate (no_std)",
            &["check", "-p", "playback", "--target", TARGET, "--no-default-features"],
        ),
        Step::advisory(
            "Clippy",
            &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
        ),
        Step::advisory("Formatting", &["fmt", "--all", "--check"]),
    ];

    for step in &steps {
        step.run()?;
    }

    println!(
        "{}",
        format!("✓ All checks completed in {:.2}s", total_start.elapsed().as_secs_f64())
            .green()
            .bold()
    );
    println!();

    Ok(())
}
