use clap::builder::styling::AnsiColor;
use colored::{Color, ColoredString, Colorize, control::ShouldColorize};
use once_cell::sync::Lazy;

/// Whether the environment allows ANSI colors; read once per process.
pub static COLOR_ENABLED: Lazy<bool> = Lazy::new(|| ShouldColorize::from_env().should_colorize());

/// Semantic roles; each maps to one terminal color for messages and one for clap help.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Success,
    Failure,
    Caution,
    Note,
    Heading,
    Title,
    Command,
    Faint,
    Key,
    Value,
}

impl Tone {
    pub fn color(self) -> Color {
        match self {
            Tone::Success => Color::Green,
            Tone::Failure => Color::Red,
            Tone::Caution => Color::Yellow,
            Tone::Note => Color::Blue,
            Tone::Heading => Color::Cyan,
            Tone::Title => Color::BrightGreen,
            Tone::Command => Color::Magenta,
            Tone::Faint => Color::BrightBlack,
            Tone::Key => Color::BrightCyan,
            Tone::Value => Color::White,
        }
    }

    pub fn ansi(self) -> AnsiColor {
        match self {
            Tone::Success => AnsiColor::Green,
            Tone::Failure => AnsiColor::Red,
            Tone::Caution => AnsiColor::Yellow,
            Tone::Note => AnsiColor::Blue,
            Tone::Heading => AnsiColor::Cyan,
            Tone::Title => AnsiColor::BrightGreen,
            Tone::Command => AnsiColor::Magenta,
            Tone::Faint => AnsiColor::BrightBlack,
            Tone::Key => AnsiColor::BrightCyan,
            Tone::Value => AnsiColor::White,
        }
    }

    pub fn paint(self, text: &str) -> ColoredString {
        text.color(self.color())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Glyph {
    Check,
    Cross,
    Alert,
    Info,
    Arrow,
    Dot,
    Spinner,
    Repaired,
}

impl Glyph {
    pub fn as_str(self) -> &'static str {
        match self {
            Glyph::Check => "✓",
            Glyph::Cross => "✗",
            Glyph::Alert => "⚠",
            Glyph::Info => "ℹ",
            Glyph::Arrow => "→",
            Glyph::Dot => "•",
            Glyph::Spinner => "⟳",
            Glyph::Repaired => "~",
        }
    }
}
