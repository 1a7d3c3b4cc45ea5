use anyhow::Result;
use colored::*;
use once_cell::sync::Lazy;
use regex::Regex;
use std::process::{Command, Stdio};

use crate::error::FlatpakError;

const MIB: f64 = 1_048_576.0;

static HUMAN_SIZE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([0-9]+(?:[.,][0-9]+)?)\s*([kKMGT]?i?B|bytes?)\s*$").expect("size pattern is valid")
});

static PERCENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,3})%").expect("percent pattern is valid"));

pub fn confirm(prompt: &str) -> Result<bool> {
    use std::io::{self, Write};

    print!("{} [y/N]: ", prompt.yellow().bold());
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let answer = input.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

/// Runs `flatpak` with the C locale so sizes and headers parse predictably.
pub fn run_flatpak(args: &[&str]) -> Result<String, FlatpakError> {
    log::debug!("running: flatpak {}", args.join(" "));
    let output = Command::new("flatpak")
        .args(args)
        .env("LC_ALL", "C")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| FlatpakError::ServiceUnavailable(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        log::warn!("flatpak {} exited with {:?}", args.join(" "), output.status.code());
        return Err(FlatpakError::CommandFailed {
            command: args.first().copied().unwrap_or_default().to_string(),
            stderr,
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Renders a byte count the way the catalog shows it: `"12.34 MiB"`.
pub fn format_size_mib(bytes: u64) -> String {
    format!("{:.2} MiB", bytes as f64 / MIB)
}

/// Renders an optional size; an absent size is the empty string, never `0.00 MiB`.
pub fn format_optional_size(bytes: Option<u64>) -> String {
    bytes.map(format_size_mib).unwrap_or_default()
}

/// Parses sizes as flatpak prints them (`"1.2 MB"`, `"512 bytes"`, `"3.4 GiB"`).
pub fn parse_human_size(value: &str) -> Option<u64> {
    let caps = HUMAN_SIZE.captures(value)?;
    let number: f64 = caps[1].replace(',', ".").parse().ok()?;
    let unit = &caps[2];
    let binary = unit.contains('i');
    let base: f64 = if binary { 1024.0 } else { 1000.0 };
    let exponent = match unit.chars().next() {
        Some('k') | Some('K') => 1,
        Some('M') => 2,
        Some('G') => 3,
        Some('T') => 4,
        _ => 0,
    };
    Some((number * base.powi(exponent)).round() as u64)
}

/// Last percentage printed on a flatpak progress line, clamped to 100.
pub fn parse_progress_percent(line: &str) -> Option<u32> {
    PERCENT
        .captures_iter(line)
        .last()
        .and_then(|caps| caps[1].parse::<u32>().ok())
        .map(|pct| pct.min(100))
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow(), message);
}
