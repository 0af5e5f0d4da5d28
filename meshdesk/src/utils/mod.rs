use anyhow::{Context, Result, bail};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

pub fn print_error(message: &str) {
    eprintln!("{prefix} {message}", prefix = "Error:".red().bold());
}

pub fn print_success(message: &str) {
    eprintln!("{prefix} {message}", prefix = "✓".green().bold());
}

pub fn print_warning(message: &str) {
    eprintln!("{prefix} {message}", prefix = "⚠".yellow().bold());
}

pub fn print_info(message: &str) {
    eprintln!("{prefix} {message}", prefix = "ℹ".blue().bold());
}

/// Spinner on stderr while a long operation runs. Hidden in JSON mode.
pub fn spinner(message: &str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Parse a node number given as decimal, `0x`-hex, or a `!`-prefixed hex id
pub fn parse_node_num(input: &str) -> Result<u32> {
    let input = input.trim();
    if input.is_empty() {
        bail!("Empty node id");
    }

    if let Some(hex) = input
        .strip_prefix('!')
        .or_else(|| input.strip_prefix("0x"))
    {
        return u32::from_str_radix(hex, 16)
            .with_context(|| format!("Invalid hex node id: {input}"));
    }

    input
        .parse()
        .with_context(|| format!("Invalid node number: {input}"))
}
