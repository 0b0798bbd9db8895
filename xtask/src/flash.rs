use anyhow::{Context, Result};
use colored::Colorize;
use std::process::Command;
use std::time::Instant;

use crate::cargo::{Step, TARGET};

/// probe-rs chip name of the Nucleo-F401RE.
const CHIP: &str = "STM32F401RETx";

pub fn run(release: bool) -> Result<()> {
    let mode = if release { "release" } else { "debug" };

    println!();
    println!("{}", format!("🔨 Building firmware ({mode} mode)...").cyan().bold());
    println!();

    let args: &[&str] = if release {
        &["build", "-p", "firmware", "--target", TARGET, "--features", "hardware", "--release"]
    } else {
        &["build", "-p", "firmware", "--target", TARGET, "--features", "hardware"]
    };
    Step::fatal("Firmware build", args).run()?;

    let binary = format!("target/{TARGET}/{mode}/firmware");
    show_binary_size(&binary);
    println!();

    println!("{}", "📡 Flashing to STM32F401RE...".cyan().bold());
    println!("   {}", "Connecting to probe...".dimmed());

    let flash_start = Instant::now();
    let flash_output = Command::new("probe-rs")
        .args(["run", &binary, "--chip", CHIP, "--probe-index", "0"])
        .output()
        .context("Failed to run probe-rs. Is probe-rs installed? (cargo install probe-rs-tools)")?;

    if !flash_output.status.success() {
        eprintln!("{}", "✗ Flash failed".red().bold());
        eprintln!();
        eprintln!("{}", String::from_utf8_lossy(&flash_output.stderr));
        anyhow::bail!("Flash failed - check that the probe is connected and the board is powered");
    }

    println!(
        "{}",
        format!("✓ Flash successful in {:.2}s", flash_start.elapsed().as_secs_f64()).green()
    );
    println!();
    println!("{}", format!("🎵 {} is running on hardware!", platform::config::APP_NAME).bold());
    println!(
        "   {}",
        format!("Use 'probe-rs attach --chip {CHIP}' to view RTT logs").dimmed()
    );
    println!();

    Ok(())
}

fn show_binary_size(binary: &str) {
    let Ok(out) = Command::new("rust-size").args([binary, "-A"]).output() else {
        println!("   {}", "rust-size not found, skipping size report".dimmed());
        return;
    };
    if !out.status.success() {
        return;
    }
    println!("{}", "📊 Binary size:".cyan());
    for line in String::from_utf8_lossy(&out.stdout).lines() {
        println!("   {}", line.dimmed());
    }
}
