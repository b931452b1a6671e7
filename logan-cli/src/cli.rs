//! CLI argument parsing using clap derive API
//!
//! Purely declarative; no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// logan -- parse multi-process logs into tracked objects and search them.
///
/// Use `logan <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "logan", version, about, long_about = None)]
pub struct Cli {
    /// Path to the logan.toml configuration file.
    #[arg(short, long, default_value = "logan.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse log files and summarize the objects found.
    Parse(ParseArgs),

    /// Parse log files, then search the objects.
    Search(SearchArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- parse ----

#[derive(Args, Debug)]
pub struct ParseArgs {
    /// Log files; rotation suffixes and `-child.` names are recognized.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

// ---- search ----

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Log files to parse before searching.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Class name to search; empty matches every class.
    #[arg(long, default_value = "")]
    pub class: String,

    /// Property name, `className`, `pointer`, or `*` for raw line text.
    #[arg(long)]
    pub prop: String,

    /// Operator: ==, !!, !, >, <, contains, !contains, rx, !rx.
    #[arg(long, default_value = "==")]
    pub op: String,

    /// Value to compare against.
    #[arg(long, default_value = "")]
    pub value: String,

    /// Evaluate as of this capture sequence id.
    #[arg(long)]
    pub seek: Option<u64>,
}

// ---- config ----

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only one section (general, engine, search).
        #[arg(long)]
        section: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse_files() {
        let cli = Cli::try_parse_from(["logan", "parse", "a.moz_log", "b-child.1.moz_log"])
            .expect("should parse 'parse' subcommand");
        match cli.command {
            Commands::Parse(args) => {
                assert_eq!(
                    args.files,
                    [PathBuf::from("a.moz_log"), PathBuf::from("b-child.1.moz_log")]
                );
            }
            _ => panic!("expected Parse command"),
        }
    }

    #[test]
    fn test_cli_parse_requires_files() {
        assert!(Cli::try_parse_from(["logan", "parse"]).is_err());
    }

    #[test]
    fn test_cli_search_defaults() {
        let cli = Cli::try_parse_from(["logan", "search", "x.log", "--prop", "url"])
            .expect("should parse search");
        match cli.command {
            Commands::Search(args) => {
                assert_eq!(args.class, "");
                assert_eq!(args.prop, "url");
                assert_eq!(args.op, "==");
                assert_eq!(args.value, "");
                assert!(args.seek.is_none());
            }
            _ => panic!("expected Search command"),
        }
    }

    #[test]
    fn test_cli_search_full() {
        let cli = Cli::try_parse_from([
            "logan",
            "search",
            "x.log",
            "y.log",
            "--class",
            "nsHttpChannel",
            "--prop",
            "status",
            "--op",
            "!contains",
            "--value",
            "0x0",
            "--seek",
            "42",
        ])
        .expect("should parse search");
        match cli.command {
            Commands::Search(args) => {
                assert_eq!(args.files.len(), 2);
                assert_eq!(args.class, "nsHttpChannel");
                assert_eq!(args.op, "!contains");
                assert_eq!(args.seek, Some(42));
            }
            _ => panic!("expected Search command"),
        }
    }

    #[test]
    fn test_cli_search_requires_prop() {
        assert!(Cli::try_parse_from(["logan", "search", "x.log"]).is_err());
    }

    #[test]
    fn test_cli_parse_config_show_section() {
        let cli = Cli::try_parse_from(["logan", "config", "show", "--section", "engine"])
            .expect("should parse config show");
        match cli.command {
            Commands::Config(args) => match args.action {
                ConfigAction::Show { section } => assert_eq!(section.as_deref(), Some("engine")),
                _ => panic!("expected Show action"),
            },
            _ => panic!("expected Config command"),
        }
    }

    #[test]
    fn test_cli_global_options() {
        let cli = Cli::try_parse_from([
            "logan",
            "-c",
            "/etc/logan.toml",
            "config",
            "validate",
            "--log-level",
            "debug",
            "--output",
            "json",
        ])
        .expect("should parse global options");
        assert_eq!(cli.config, PathBuf::from("/etc/logan.toml"));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.output, OutputFormat::Json);
    }

    #[test]
    fn test_cli_default_config_path() {
        let cli = Cli::try_parse_from(["logan", "config", "validate"]).expect("should parse");
        assert_eq!(cli.config, PathBuf::from("logan.toml"));
        assert_eq!(cli.output, OutputFormat::Text);
    }

    #[test]
    fn test_cli_invalid_command_fails() {
        assert!(Cli::try_parse_from(["logan", "scan"]).is_err());
        assert!(Cli::try_parse_from(["logan"]).is_err());
    }

    #[test]
    fn test_cli_verify_command_structure() {
        let cmd = Cli::command();
        assert_eq!(cmd.get_name(), "logan");
        let subcommands: Vec<_> = cmd.get_subcommands().map(|s| s.get_name()).collect();
        for name in ["parse", "search", "config"] {
            assert!(subcommands.contains(&name), "should have '{name}' subcommand");
        }
    }
}
