use std::fmt::Display;

use console::style;

pub fn brand_accent<D: Display>(value: D) -> console::StyledObject<D> {
    style(value).cyan()
}

pub fn brand_muted<D: Display>(value: D) -> console::StyledObject<D> {
    style(value).dim()
}

pub fn brand_success<D: Display>(value: D) -> console::StyledObject<D> {
    style(value).green()
}

pub fn brand_warning<D: Display>(value: D) -> console::StyledObject<D> {
    style(value).yellow()
}

pub fn brand_error<D: Display>(value: D) -> console::StyledObject<D> {
    style(value).red()
}

pub fn section(title: &str) {
    println!();
    println!("{}", brand_accent(title).bold());
}

pub fn step(message: &str) {
    println!("{} {}", brand_accent("•").bold(), message);
}

pub fn success(message: &str) {
    println!("{} {}", brand_success("✓").bold(), message);
}

pub fn warning(message: &str) {
    println!("{} {}", brand_warning("!").bold(), message);
}

/// Failure line on stderr, prefixed with a stable cause tag.
pub fn error_stderr(tag: &str, message: &str) {
    eprintln!(
        "{} {} {}",
        brand_error("✗").bold(),
        brand_error(format!("[{tag}]")),
        message
    );
}

pub fn muted(message: &str) {
    println!("{}", brand_muted(message));
}

/// `label: value` with the label dimmed and padded.
pub fn field(label: &str, value: impl Display) {
    println!("  {} {}", brand_muted(format!("{label:<12}")), value);
}

pub fn json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
