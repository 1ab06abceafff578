use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{Attribute, Cell, Color as TableColor, Table, presets};
use serde::Serialize;
use std::io::Write;

use crate::theme::{Glyph, Tone};

#[derive(Clone, Debug, ValueEnum, Default, PartialEq)]
pub enum OutputFormat {
    /// Bordered tables (default)
    #[default]
    Table,
    /// Pretty-printed JSON for scripts
    Json,
    /// One summary line per report
    Compact,
}

#[derive(Clone, Debug, Default)]
pub struct GlobalOptions {
    pub output_format: OutputFormat,
    pub quiet: bool,
    pub no_color: bool,
}

/// Reports that render as a table, a JSON document or one summary line.
pub trait TableDisplay {
    fn to_table(&self, output: &OutputManager) -> Table;
    fn to_compact(&self) -> String;
}

pub struct OutputManager {
    pub options: GlobalOptions,
}

impl OutputManager {
    pub fn new(options: GlobalOptions) -> Self {
        Self { options }
    }

    /// Decorations (headings, key/values, progress) only make sense for humans.
    fn decorates(&self) -> bool {
        !self.options.quiet && self.options.output_format != OutputFormat::Json
    }

    fn paint(&self, tone: Tone, text: &str, bold: bool) -> String {
        match (self.options.no_color, bold) {
            (true, _) => text.to_string(),
            (false, true) => tone.paint(text).bold().to_string(),
            (false, false) => tone.paint(text).to_string(),
        }
    }

    fn status(&self, glyph: Glyph, tone: Tone, message: &str) -> String {
        format!("{} {}", self.paint(tone, glyph.as_str(), false), self.paint(tone, message, false))
    }

    pub fn display<T>(&self, data: &T) -> Result<()>
    where
        T: Serialize + TableDisplay,
    {
        if self.options.quiet {
            return Ok(());
        }
        let rendered = match self.options.output_format {
            OutputFormat::Json => serde_json::to_string_pretty(data)?,
            OutputFormat::Table => data.to_table(self).to_string(),
            OutputFormat::Compact => data.to_compact(),
        };
        println!("{rendered}");
        Ok(())
    }

    /// Plain text, unaffected by the output format (e.g. a rendered config file).
    pub fn raw(&self, text: &str) {
        if !self.options.quiet {
            println!("{text}");
        }
    }

    pub fn success(&self, message: &str) {
        if !self.options.quiet {
            println!("{}", self.status(Glyph::Check, Tone::Success, message));
        }
    }

    /// Always shown, even with `--quiet`.
    pub fn error(&self, message: &str) {
        eprintln!("{}", self.status(Glyph::Cross, Tone::Failure, message));
    }

    pub fn warning(&self, message: &str) {
        if !self.options.quiet {
            println!("{}", self.status(Glyph::Alert, Tone::Caution, message));
        }
    }

    pub fn info(&self, message: &str) {
        if !self.options.quiet {
            println!("{}", self.status(Glyph::Info, Tone::Note, message));
        }
    }

    pub fn heading(&self, text: &str) {
        if !self.decorates() {
            return;
        }
        if self.options.no_color {
            println!("\n{text}\n{}", "=".repeat(text.chars().count()));
        } else {
            println!("\n{}", self.paint(Tone::Title, text, true));
        }
    }

    pub fn key_value(&self, key: &str, value: &str) {
        if self.decorates() {
            println!("{}: {}", self.paint(Tone::Key, key, true), self.paint(Tone::Value, value, false));
        }
    }

    pub fn bullet(&self, text: &str) {
        if !self.options.quiet {
            println!("  {} {text}", self.paint(Tone::Faint, Glyph::Dot.as_str(), false));
        }
    }

    pub fn create_table(&self) -> Table {
        let mut table = Table::new();
        table.load_preset(if self.options.no_color {
            presets::ASCII_FULL
        } else {
            presets::UTF8_FULL_CONDENSED
        });
        table
    }

    pub fn add_table_header(&self, table: &mut Table, headers: &[&str]) {
        let no_color = self.options.no_color;
        table.set_header(headers.iter().map(|header| {
            let cell = Cell::new(header).add_attribute(Attribute::Bold);
            if no_color { cell } else { cell.fg(TableColor::Cyan) }
        }));
    }

    pub fn progress(&self, message: &str) {
        if !self.decorates() {
            return;
        }
        print!(
            "\r{} {}...",
            self.paint(Tone::Heading, Glyph::Spinner.as_str(), true),
            self.paint(Tone::Heading, message, false)
        );
        std::io::stdout().flush().ok();
    }

    pub fn clear_line(&self) {
        if !self.decorates() {
            return;
        }
        print!("\r{}\r", " ".repeat(80));
        std::io::stdout().flush().ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        name: String,
        count: u64,
    }

    impl TableDisplay for Row {
        fn to_table(&self, output: &OutputManager) -> Table {
            let mut table = output.create_table();
            output.add_table_header(&mut table, &["Name", "Count"]);
            table.add_row(vec![Cell::new(&self.name), Cell::new(self.count)]);
            table
        }

        fn to_compact(&self) -> String {
            format!("{}={}", self.name, self.count)
        }
    }

    fn row() -> Row {
        Row {
            name: "users".to_string(),
            count: 3,
        }
    }

    #[test]
    fn displays_json() {
        let manager = OutputManager::new(GlobalOptions {
            output_format: OutputFormat::Json,
            ..Default::default()
        });
        assert!(manager.display(&row()).is_ok());
    }

    #[test]
    fn quiet_suppresses_display() {
        let manager = OutputManager::new(GlobalOptions {
            quiet: true,
            ..Default::default()
        });
        assert!(manager.display(&row()).is_ok());
    }

    #[test]
    fn table_has_header_and_row() {
        let manager = OutputManager::new(GlobalOptions {
            no_color: true,
            ..Default::default()
        });
        let rendered = row().to_table(&manager).to_string();
        assert!(rendered.contains("Name"));
        assert!(rendered.contains("users"));
        assert_eq!(row().to_compact(), "users=3");
    }
}
