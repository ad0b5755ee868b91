//! User-facing output on stdout, silenced in JSON mode

use crate::cli::display::icons::StatusIcon;
use colored::Colorize;
use std::sync::atomic::{AtomicBool, Ordering};

static QUIET: AtomicBool = AtomicBool::new(false);

/// Silence everything below so that stdout only carries JSON.
pub fn set_quiet(quiet: bool) {
    QUIET.store(quiet, Ordering::Relaxed);
}

pub fn is_quiet() -> bool {
    QUIET.load(Ordering::Relaxed)
}

fn emit(line: String) {
    if !is_quiet() {
        println!("{}", line);
    }
}

pub fn success(message: impl AsRef<str>) {
    emit(format!("{} {}", StatusIcon::SUCCESS.green(), message.as_ref()));
}

pub fn info(message: impl AsRef<str>) {
    emit(format!("{}  {}", "ℹ".cyan(), message.as_ref()));
}

pub fn warning(message: impl AsRef<str>) {
    emit(format!("{} {}", StatusIcon::WARNING.yellow(), message.as_ref()));
}

pub fn error(message: impl AsRef<str>) {
    emit(format!("{} {}", StatusIcon::ERROR.red(), message.as_ref()));
}

/// A section title followed by an underline.
pub fn title(text: impl AsRef<str>) {
    let text = text.as_ref();
    emit(format!("{}\n{}", text.bold(), "=".repeat(text.chars().count())));
}

pub fn plain(text: impl AsRef<str>) {
    emit(text.as_ref().to_string());
}
