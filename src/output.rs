//! Colored terminal output for the build helpers
//!
//! Uses owo-colors for terminal colors and indicatif for spinners.
//! The echoed command line is deliberately left uncolored so it can be
//! copied straight back into a shell.

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::io::Write;
use std::time::Duration;

/// Print an action header (blue, bold)
/// Example: "==> Packaging zlib"
pub fn action(message: &str) {
    println!("{} {}", "==>".blue().bold(), message.bold());
}

/// Print a detail line (dimmed)
/// Example: "     install libz.so.1 -> /sw/lib/libz.so.1"
pub fn detail(message: &str) {
    println!("     {}", message.dimmed());
}

/// Echo a command line before it runs, then flush so it precedes child output.
pub fn command(line: &str) {
    println!("{}", line);
    let _ = std::io::stdout().flush();
}

/// Print a success message (green)
pub fn success(message: &str) {
    println!("{} {}", "==>".green().bold(), message.green());
}

/// Print a warning message (yellow)
pub fn warning(message: &str) {
    eprintln!("{} {}", "warning:".yellow().bold(), message.yellow());
}

/// Print an error message (red)
pub fn error(message: &str) {
    eprintln!("{} {}", "error:".red().bold(), message.red());
}

/// Report a failed command and announce the debug shell.
pub fn command_failed(code: Option<i32>, line: &str, dropping_to_shell: bool) {
    match code {
        Some(code) => eprintln!(
            "{} {}",
            "The following command failed, with return code:".red().bold(),
            code
        ),
        None => eprintln!(
            "{}",
            "The following command was terminated by a signal:".red().bold()
        ),
    }
    println!("{}", line);
    if dropping_to_shell {
        println!("{}", "Dropping you into a shell".yellow());
    }
    let _ = std::io::stdout().flush();
}

/// Create a simple spinner for archive operations
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("     {spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Finish a spinner with a success message
pub fn progress_success(pb: ProgressBar, message: &str) {
    pb.finish_with_message(format!("{}", message.green()));
}

/// Finish a spinner with a failure message
pub fn progress_fail(pb: ProgressBar, message: &str) {
    pb.finish_with_message(format!("{}", message.red()));
}
