//! Shared runner for the cargo invocations behind each task.

use anyhow::{Context, Result};
use colored::Colorize;
use std::process::{Command, Output};
use std::time::Instant;

/// Cross target of the Nucleo-F401RE (Cortex-M4F).
pub const TARGET: &str = "thumbv7em-none-eabihf";

/// How a failed step affects the task.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Abort the task.
    Fatal,
    /// Report and keep going.
    Advisory,
}

/// One labelled cargo invocation.
pub struct Step<'a> {
    pub label: &'a str,
    pub args: &'a [&'a str],
    pub severity: Severity,
}

impl<'a> Step<'a> {
    pub const fn fatal(label: &'a str, args: &'a [&'a str]) -> Self {
        Self {
            label,
            args,
            severity: Severity::Fatal,
        }
    }

    pub const fn advisory(label: &'a str, args: &'a [&'a str]) -> Self {
        Self {
            label,
            args,
            severity: Severity::Advisory,
        }
    }

    /// Runs the step and returns its output when it succeeded.
    pub fn run(&self) -> Result<Option<Output>> {
        println!("{}", format!("  {}...", self.label).cyan());
        let start = Instant::now();

        let output = Command::new("cargo")
            .args(self.args)
            .output()
            .with_context(|| format!("Failed to run cargo {}", self.args.join(" ")))?;

        if output.status.success() {
            let summary = test_summary(&String::from_utf8_lossy(&output.stdout))
                .map(|s| format!(" ({s})"))
                .unwrap_or_default();
            println!(
                "{}",
                format!(
                    "  ✓ {} passed{} in {:.2}s",
                    self.label,
                    summary,
                    start.elapsed().as_secs_f64()
                )
                .green()
            );
            println!();
            return Ok(Some(output));
        }

        match self.severity {
            Severity::Fatal => {
                eprintln!("{}", format!("  ✗ {} failed", self.label).red().bold());
                eprintln!();
                dump(&output);
                anyhow::bail!("{} failed", self.label);
            }
            Severity::Advisory => {
                eprintln!("{}", format!("  ⚠ {} reported problems", self.label).yellow().bold());
                dump(&output);
                println!();
                Ok(None)
            }
        }
    }
}

fn dump(output: &Output) {
    for stream in [&output.stdout, &output.stderr] {
        for line in String::from_utf8_lossy(stream).lines() {
            eprintln!("  {line}");
        }
    }
}

/// Pulls "5 passed; 0 failed; ..." out of libtest output, summed across
/// every test binary in the run.
pub fn test_summary(output: &str) -> Option<String> {
    let mut passed = 0u64;
    let mut failed = 0u64;
    let mut ignored = 0u64;
    let mut seen = false;

    for line in output.lines() {
        let Some(rest) = line.split("test result:").nth(1) else {
            continue;
        };
        seen = true;
        for part in rest.split(';') {
            let mut words = part.split_whitespace().rev();
            let (Some(kind), Some(count)) = (words.next(), words.next()) else {
                continue;
            };
            let Ok(count) = count.parse::<u64>() else {
                continue;
            };
            match kind {
                "passed" => passed = passed.saturating_add(count),
                "failed" => failed = failed.saturating_add(count),
                "ignored" => ignored = ignored.saturating_add(count),
                _ => {}
            }
        }
    }

    seen.then(|| format!("{passed} passed; {failed} failed; {ignored} ignored"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sums_every_test_binary() {
        let out = "\
running 3 tests
test result: ok. 3 passed; 0 failed; 1 ignored; 0 measured; 0 filtered out; finished in 0.01s

running 2 tests
test result: ok. 2 passed; 0 failed; 0 ignored; 0 measured; 0 filtered out; finished in 0.20s
";
        assert_eq!(test_summary(out).as_deref(), Some("5 passed; 0 failed; 1 ignored"));
    }

    #[test]
    fn no_summary_without_libtest_output() {
        assert_eq!(test_summary("Compiling firmware v0.1.0"), None);
    }
}
