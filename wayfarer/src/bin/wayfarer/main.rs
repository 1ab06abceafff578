mod commands;
mod examples;
mod output;
mod theme;

use std::fmt::Write;
use std::io::{self, Write as IoWrite};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{
    ColorChoice, Command, CommandFactory, FromArgMatches, Parser, Subcommand,
    builder::{
        Styles,
        styling::{Color as ClapColor, Style},
    },
    error::ErrorKind,
};
use colored::Colorize;
use wayfarer::{WayfarerConfig, config::CONFIG_ENV};

use commands::{
    StoreCommand,
    config::{ConfigCommands, handle_config_commands},
    run_store_command,
};
use examples::{ExampleGroup, command_examples};
use output::{GlobalOptions, OutputFormat, OutputManager};
use theme::{COLOR_ENABLED, Glyph, Tone};

const ENVIRONMENT_VARIABLES: &[(&str, &str)] = &[
    ("WAYFARER_CONFIG", "Path of the configuration file"),
    ("REDIS_URL", "Redis connection URL referenced by the default config"),
    ("WAYFARER_ACCESS_SECRET", "Access token signing secret"),
    ("WAYFARER_REFRESH_SECRET", "Refresh token signing secret"),
    ("RUST_LOG", "Log filter, e.g. `wayfarer=debug`"),
];

#[derive(Parser)]
#[command(name = "wayfarer")]
#[command(version)]
#[command(
    about = "Administration tool for the Wayfarer document store",
    long_about = r#"Administration tool for the Wayfarer document store:

• Inspect and scaffold configuration
• Count documents per collection
• Sweep index entries left behind by expired or deleted documents
• Detect and repair counters that drifted from their sets

Commands:
  config   Show or create configuration
  stats    Documents per collection
  purge    Remove dangling index entries and unique claims
  audit    Compare counters with set sizes
"#
)]
#[command(subcommand_required = true, arg_required_else_help = true)]
struct Cli {
    /// Configuration file (defaults are used when omitted)
    #[arg(long, global = true, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, global = true, default_value = "table")]
    output: OutputFormat,

    /// Suppress output (only errors will be shown)
    #[arg(short = 'q', long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or create configuration
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Documents per collection
    Stats,

    /// Remove index entries and unique claims whose document is gone
    Purge,

    /// Compare counters with the sets they count
    Audit {
        /// Rewrite drifted counters from set sizes
        #[arg(long)]
        repair: bool,
    },
}

impl Cli {
    /// Parses arguments, printing help and errors with the themed styles and a blank-line margin.
    fn parse_with_styles() -> Self {
        let matches = match build_cli_command().styles(help_styles()).try_get_matches() {
            Ok(matches) => matches,
            Err(err) => exit_with(err),
        };
        Cli::from_arg_matches(&matches).unwrap_or_else(|err| err.exit())
    }
}

fn exit_with(err: clap::Error) -> ! {
    let informational = matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion);
    let code = if informational { 0 } else { err.exit_code() };
    let mut sink: Box<dyn IoWrite> = if informational {
        Box::new(io::stdout())
    } else {
        Box::new(io::stderr())
    };
    let _ = writeln!(sink);
    if let Err(print_err) = err.print()
        && print_err.kind() != io::ErrorKind::BrokenPipe
    {
        eprintln!("Failed to print: {print_err}");
    }
    let _ = writeln!(sink);
    let _ = sink.flush();
    std::process::exit(code);
}

fn build_cli_command() -> Command {
    let use_color = *COLOR_ENABLED;
    let mut command = Cli::command()
        .after_long_help(render_top_level_appendix(use_color))
        .color(if use_color { ColorChoice::Auto } else { ColorChoice::Never });
    for example in command_examples() {
        if let Some(subcommand) = command.find_subcommand_mut(example.name) {
            *subcommand = subcommand
                .clone()
                .after_long_help(render_examples(example.groups, use_color));
        }
    }
    command
}

fn tint(text: &str, tone: Tone, bold: bool, use_color: bool) -> String {
    if !use_color {
        return text.to_string();
    }
    let painted = tone.paint(text);
    if bold { painted.bold().to_string() } else { painted.to_string() }
}

fn render_examples(groups: &[ExampleGroup], use_color: bool) -> String {
    let mut sections = Vec::with_capacity(groups.len());
    for group in groups {
        let mut section = format!("  {}\n", tint(group.title, Tone::Title, true, use_color));
        for command in group.commands {
            let _ = writeln!(
                section,
                "    {} {}",
                tint(Glyph::Arrow.as_str(), Tone::Command, false, use_color),
                tint(command, Tone::Command, false, use_color)
            );
        }
        sections.push(section);
    }
    format!("{}\n{}", tint("Examples:", Tone::Heading, true, use_color), sections.join("\n"))
}

fn render_top_level_appendix(use_color: bool) -> String {
    let mut buffer = format!("{}\n", tint("Environment Variables:", Tone::Heading, true, use_color));
    let width = ENVIRONMENT_VARIABLES.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    for (key, description) in ENVIRONMENT_VARIABLES {
        let padded = format!("{key:<width$}");
        let _ = writeln!(
            buffer,
            "  {}  {}",
            tint(&padded, Tone::Key, true, use_color),
            tint(description, Tone::Value, false, use_color)
        );
    }
    let _ = writeln!(
        buffer,
        "\n{} {}",
        tint("Tip:", Tone::Heading, true, use_color),
        tint(
            "Run 'wayfarer <command> --help' for worked examples.",
            Tone::Command,
            false,
            use_color
        )
    );
    buffer
}

fn help_styles() -> Styles {
    let style = |tone: Tone| Style::new().fg_color(Some(ClapColor::Ansi(tone.ansi())));
    Styles::styled()
        .usage(style(Tone::Title).bold())
        .header(style(Tone::Heading).bold())
        .literal(style(Tone::Command))
        .placeholder(style(Tone::Faint))
        .valid(style(Tone::Success))
        .invalid(style(Tone::Caution))
        .error(style(Tone::Failure).bold())
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = Cli::parse_with_styles();
    println!();
    let outcome = execute(cli).await;
    if let Err(err) = &outcome {
        eprintln!("Error: {err:#}");
    }
    println!();
    if outcome.is_err() {
        std::process::exit(1);
    }
}

async fn execute(cli: Cli) -> Result<()> {
    if cli.no_color {
        colored::control::set_override(false);
    }
    let output = OutputManager::new(GlobalOptions {
        output_format: cli.output,
        quiet: cli.quiet,
        no_color: cli.no_color,
    });

    let config = match &cli.config {
        Some(path) => {
            output.key_value("config", &path.display().to_string());
            WayfarerConfig::load(path).with_context(|| format!("Failed to load {}", path.display()))?
        }
        None => WayfarerConfig::default(),
    };

    match cli.command {
        Commands::Config(command) => handle_config_commands(command, &config, &output).await,
        Commands::Stats => run_store_command(StoreCommand::Stats, &config, &output).await,
        Commands::Purge => run_store_command(StoreCommand::Purge, &config, &output).await,
        Commands::Audit { repair } => run_store_command(StoreCommand::Audit { repair }, &config, &output).await,
    }
}
