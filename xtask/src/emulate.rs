use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use std::process::Command;

pub fn run(music_path: &Path, track: Option<&str>) -> Result<()> {
    if !music_path.is_dir() {
        anyhow::bail!("{} is not a directory", music_path.display());
    }

    println!();
    println!("{}", platform::config::dev_banner().cyan().bold());
    println!("   {}", format!("Music: {}", music_path.display()).dimmed());
    println!();

    let mut cmd = Command::new("cargo");
    cmd.args(["run", "-p", "firmware", "--example", "emulator", "--features", "emulator"])
        .env("MUSIC_PATH", music_path);
    if std::env::var_os("RUST_LOG").is_none() {
        cmd.env("RUST_LOG", "info");
    }
    if let Some(track) = track {
        cmd.args(["--", track]);
    }

    let status = cmd.status().context("Failed to launch the emulator")?;
    if !status.success() {
        anyhow::bail!("Emulator exited with {status}");
    }
    Ok(())
}
