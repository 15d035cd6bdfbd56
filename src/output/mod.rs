//! Styled terminal output for vpc-import
//!
//! Status lines go to stdout, errors to stderr. Tool output streamed during
//! `init`/`plan`/`apply` is not routed through here.

use owo_colors::OwoColorize;

/// Pastel palette shared by every printer below
mod palette {
    pub const MINT: (u8, u8, u8) = (152, 225, 152);
    pub const CORAL: (u8, u8, u8) = (255, 160, 160);
    pub const CREAM: (u8, u8, u8) = (255, 230, 160);
    pub const SKY: (u8, u8, u8) = (160, 200, 255);
    pub const LAVENDER: (u8, u8, u8) = (181, 174, 254);
    pub const TEAL: (u8, u8, u8) = (120, 180, 195);
    pub const GREY: (u8, u8, u8) = (160, 160, 160);
}

fn paint(text: &str, (r, g, b): (u8, u8, u8)) -> String {
    text.truecolor(r, g, b).to_string()
}

fn symbol_line(symbol: &str, color: (u8, u8, u8), message: &str) -> String {
    let (r, g, b) = color;
    format!(
        "{} {}",
        symbol.truecolor(r, g, b).bold(),
        message.bright_white()
    )
}

/// Print a success message with a green checkmark
pub fn success(message: &str) {
    println!("{}", symbol_line("✓", palette::MINT, message));
}

/// Print an error message with a red X
pub fn error(message: &str) {
    eprintln!("{}", symbol_line("✗", palette::CORAL, message));
}

/// Print a warning message with a yellow warning symbol
pub fn warning(message: &str) {
    println!("{}", symbol_line("⚠", palette::CREAM, message));
}

/// Print an info message with a blue info symbol
pub fn info(message: &str) {
    println!("{}", symbol_line("ℹ", palette::SKY, message));
}

/// Print a section header with a separator line
pub fn section(title: &str) {
    let (r, g, b) = palette::LAVENDER;
    println!("\n{}", title.truecolor(r, g, b).bold());
    println!("{}", paint(&"─".repeat(50), palette::GREY));
}

/// Print a small section header without separator
pub fn subsection(title: &str) {
    println!("\n{}", paint(title, palette::TEAL));
    println!("{}", paint(&"·".repeat(30), palette::GREY));
}

/// Print a key-value pair with styled key and value
pub fn key_value(key: &str, value: &str) {
    println!(
        "  {} {}",
        paint(&format!("{}:", key), palette::GREY),
        value.bright_white()
    );
}

/// Print a dimmed/muted message
pub fn dimmed(message: &str) {
    println!("{}", paint(message, palette::GREY));
}

/// Print a blank line for spacing
pub fn blank() {
    println!();
}
