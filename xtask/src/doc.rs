use anyhow::Result;
use colored::Colorize;
use std::time::Instant;

use crate::cargo::Step;

pub fn run(open: bool) -> Result<()> {
    println!();
    println!("{}", "📚 Building documentation...".cyan().bold());
    println!();

    let start = Instant::now();
    let args: &[&str] = if open {
        &["doc", "--workspace", "--no-deps", "--document-private-items", "--open"]
    } else {
        &["doc", "--workspace", "--no-deps", "--document-private-items"]
    };
    Step::fatal("Documentation", args).run()?;

    println!(
        "{}",
        format!("✓ Documentation built in {:.2}s", start.elapsed().as_secs_f64()).green()
    );
    if !open {
        println!();
        println!("   {}", "Open target/doc/playback/index.html in your browser".dimmed());
        println!("   {}", "Or run 'cargo xtask doc --open'".dimmed());
    }
    println!();

    Ok(())
}
