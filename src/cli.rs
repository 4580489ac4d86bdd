//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};

/// Fetch firmware images listed in vendor metadata catalogs.
///
/// `fetch` downloads every image referenced by a catalog into
/// `<save-root>/<vendor>/<product>/`. `filter` splits a catalog into
/// per-vendor CSV files.
#[derive(Parser, Debug)]
#[command(name = "fwfetch")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: $XDG_CONFIG_HOME/fwfetch/config.toml)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download the firmware images referenced by catalog CSV files
    Fetch(FetchArgs),
    /// Write the rows of a catalog that match vendor keywords to new CSV files
    Filter(FilterArgs),
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["input_dir", "input"])))]
pub struct FetchArgs {
    /// Directory whose *.csv files are read
    #[arg(long, value_name = "DIR")]
    pub input_dir: Option<PathBuf>,

    /// Single catalog CSV file
    #[arg(short, long, value_name = "CSV")]
    pub input: Option<PathBuf>,

    /// Root directory for downloaded images [default: fws]
    #[arg(short = 'o', long, value_name = "DIR")]
    pub save_root: Option<PathBuf>,

    /// Only fetch records of this vendor (repeatable, case-insensitive)
    #[arg(long = "vendor", value_name = "KEYWORD")]
    pub vendors: Vec<String>,

    /// Maximum concurrent fetches (1-100) [default: 4]
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: Option<u8>,

    /// Maximum retries for transient failures (0-10) [default: 0]
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u8).range(0..=10))]
    pub max_retries: Option<u8>,

    /// Connect timeout in seconds (1-3600) [default: 30]
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub connect_timeout: Option<u64>,

    /// Read/idle timeout in seconds (1-3600) [default: 300]
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub read_timeout: Option<u64>,

    /// Write a JSON run report to this path
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Print planned destinations without fetching anything
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("keywords").required(true).args(["vendor", "vendors"])))]
pub struct FilterArgs {
    /// Catalog CSV to filter
    #[arg(short, long, value_name = "CSV")]
    pub input: PathBuf,

    /// Single vendor keyword
    #[arg(long, value_name = "KEYWORD")]
    pub vendor: Option<String>,

    /// Several vendor keywords, one output file each
    #[arg(long, value_name = "KEYWORD", num_args = 1..)]
    pub vendors: Vec<String>,

    /// Output file for --vendor [default: ./<vendor>_firmware_download_list.csv]
    #[arg(short, long, value_name = "PATH", conflicts_with = "vendors")]
    pub output: Option<PathBuf>,

    /// Output directory for --vendors
    #[arg(long, value_name = "DIR", default_value = ".", conflicts_with = "vendor")]
    pub output_dir: PathBuf,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    fn fetch(args: &[&str]) -> FetchArgs {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::Fetch(args) => args,
            Command::Filter(_) => panic!("expected fetch"),
        }
    }

    fn filter(args: &[&str]) -> FilterArgs {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::Filter(args) => args,
            Command::Fetch(_) => panic!("expected filter"),
        }
    }

    #[test]
    fn test_cli_requires_subcommand() {
        let err = Cli::try_parse_from(["fwfetch"]).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::MissingSubcommand | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
        ));
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Cli::try_parse_from(["fwfetch", "--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Cli::try_parse_from(["fwfetch", "--version"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["fwfetch", "fetch", "--input", "a.csv", "-vv", "--config", "c.toml"])
                .unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(!cli.quiet);
        assert_eq!(cli.config, Some(PathBuf::from("c.toml")));
    }

    #[test]
    fn test_cli_quiet_flag() {
        let cli = Cli::try_parse_from(["fwfetch", "-q", "fetch", "--input", "a.csv"]).unwrap();
        assert!(cli.quiet);
    }

    #[test]
    fn test_fetch_defaults_are_unset() {
        let args = fetch(&["fwfetch", "fetch", "--input-dir", "csvs"]);
        assert_eq!(args.input_dir, Some(PathBuf::from("csvs")));
        assert!(args.input.is_none());
        assert!(args.save_root.is_none());
        assert!(args.vendors.is_empty());
        assert!(args.concurrency.is_none());
        assert!(args.max_retries.is_none());
        assert!(args.report.is_none());
        assert!(!args.dry_run);
    }

    #[test]
    fn test_fetch_requires_a_source() {
        let err = Cli::try_parse_from(["fwfetch", "fetch"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_fetch_rejects_both_sources() {
        let err = Cli::try_parse_from(["fwfetch", "fetch", "--input", "a.csv", "--input-dir", "d"])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_fetch_all_options() {
        let args = fetch(&[
            "fwfetch",
            "fetch",
            "-i",
            "tplink.csv",
            "-o",
            "/srv/fw",
            "--vendor",
            "TP-Link",
            "--vendor",
            "zyxel",
            "-c",
            "8",
            "-r",
            "2",
            "--connect-timeout",
            "5",
            "--read-timeout",
            "60",
            "--report",
            "run.json",
            "--dry-run",
        ]);
        assert_eq!(args.input, Some(PathBuf::from("tplink.csv")));
        assert_eq!(args.save_root, Some(PathBuf::from("/srv/fw")));
        assert_eq!(args.vendors, vec!["TP-Link", "zyxel"]);
        assert_eq!(args.concurrency, Some(8));
        assert_eq!(args.max_retries, Some(2));
        assert_eq!(args.connect_timeout, Some(5));
        assert_eq!(args.read_timeout, Some(60));
        assert_eq!(args.report, Some(PathBuf::from("run.json")));
        assert!(args.dry_run);
    }

    #[test]
    fn test_fetch_concurrency_bounds() {
        for bad in ["0", "101"] {
            let err = Cli::try_parse_from(["fwfetch", "fetch", "-i", "a.csv", "-c", bad]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ValueValidation, "concurrency {bad}");
        }
        assert_eq!(fetch(&["fwfetch", "fetch", "-i", "a.csv", "-c", "100"]).concurrency, Some(100));
    }

    #[test]
    fn test_fetch_max_retries_bounds() {
        let err = Cli::try_parse_from(["fwfetch", "fetch", "-i", "a.csv", "-r", "11"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
        assert_eq!(fetch(&["fwfetch", "fetch", "-i", "a.csv", "-r", "0"]).max_retries, Some(0));
    }

    #[test]
    fn test_fetch_timeout_bounds() {
        for bad in ["0", "3601"] {
            let err = Cli::try_parse_from(["fwfetch", "fetch", "-i", "a.csv", "--read-timeout", bad])
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ValueValidation, "timeout {bad}");
        }
    }

    #[test]
    fn test_filter_single_vendor() {
        let args = filter(&["fwfetch", "filter", "-i", "all.csv", "--vendor", "Zyxel"]);
        assert_eq!(args.input, PathBuf::from("all.csv"));
        assert_eq!(args.vendor.as_deref(), Some("Zyxel"));
        assert!(args.vendors.is_empty());
        assert!(args.output.is_none());
    }

    #[test]
    fn test_filter_multi_vendor_defaults_output_dir() {
        let args = filter(&["fwfetch", "filter", "-i", "all.csv", "--vendors", "zyxel", "tp-link"]);
        assert_eq!(args.vendors, vec!["zyxel", "tp-link"]);
        assert_eq!(args.output_dir, PathBuf::from("."));
    }

    #[test]
    fn test_filter_requires_keywords() {
        let err = Cli::try_parse_from(["fwfetch", "filter", "-i", "all.csv"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_filter_rejects_both_keyword_modes() {
        let err = Cli::try_parse_from([
            "fwfetch", "filter", "-i", "all.csv", "--vendor", "a", "--vendors", "b",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_filter_output_conflicts_with_multi_mode() {
        let err = Cli::try_parse_from([
            "fwfetch", "filter", "-i", "all.csv", "--vendors", "a", "-o", "x.csv",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }
}
