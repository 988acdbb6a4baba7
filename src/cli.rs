//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use paperfetch_core::config::FileConfig;
use paperfetch_core::download::{DEFAULT_CONCURRENCY, DownloadConfig};
use paperfetch_core::pipeline::SearchSettings;
use paperfetch_core::search::PacingDelay;

/// Source priority used when neither the CLI nor the config file sets one.
pub const DEFAULT_SOURCES: [&str; 4] = ["arxiv", "zenodo", "doaj", "semantic_scholar"];

/// Output directory used when neither the CLI nor the config file sets one.
pub const DEFAULT_OUTPUT_DIR: &str = "downloads";

/// Resolve bibliographic records to validated PDF files.
///
/// Each record is searched across sources in priority order; the first
/// downloadable match wins, and a failed download falls back once to
/// another source.
#[derive(Parser, Debug)]
#[command(name = "paperfetch")]
#[command(author, version, about)]
pub struct Args {
    /// Record list (.txt with one citation per line, .csv with a header row, or .json array)
    #[arg(short, long, required_unless_present = "check_sources")]
    pub input: Option<PathBuf>,

    /// Output directory (documents in pdfs/, sidecars in metadata/, reports in logs/)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Comma-separated source priority list (arxiv, zenodo, doaj, semantic_scholar)
    #[arg(short, long, value_delimiter = ',')]
    pub sources: Option<Vec<String>>,

    /// Maximum concurrent downloads (1-32)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=32))]
    pub concurrency: Option<u8>,

    /// Maximum records searched at once (1-32)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=32))]
    pub search_concurrency: Option<u8>,

    /// Results requested from each source per record (1-100)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub limit_per_source: Option<u8>,

    /// Re-download documents that already exist
    #[arg(long)]
    pub overwrite: bool,

    /// Do not write JSON metadata sidecars
    #[arg(long)]
    pub no_metadata: bool,

    /// Disable the fallback round after a failed download
    #[arg(long)]
    pub no_fallback: bool,

    /// Check every source for availability and exit
    #[arg(long)]
    pub check_sources: bool,

    /// Config file (default: $XDG_CONFIG_HOME/paperfetch/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Args {
    /// Default log filter for the verbosity flags.
    #[must_use]
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Effective settings after merging flags, config file and defaults.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub priority: Vec<String>,
    pub download: DownloadConfig,
    pub search: SearchSettings,
    pub fallback_enabled: bool,
}

/// Merges with precedence CLI flag > config file > built-in default.
#[must_use]
pub fn resolve_settings(args: &Args, file: Option<&FileConfig>) -> RunSettings {
    let file = file.cloned().unwrap_or_default();

    let priority = args
        .sources
        .clone()
        .or(file.sources)
        .unwrap_or_else(|| DEFAULT_SOURCES.iter().map(ToString::to_string).collect())
        .into_iter()
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    let mut download = DownloadConfig::new(
        args.output
            .clone()
            .or(file.output_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
    );
    download.max_concurrent_downloads = args
        .concurrency
        .map(usize::from)
        .or(file.max_concurrent_downloads)
        .unwrap_or(DEFAULT_CONCURRENCY);
    download.overwrite_existing = args.overwrite || file.overwrite.unwrap_or(false);
    download.save_metadata = !args.no_metadata && file.save_metadata.unwrap_or(true);
    if let Some(secs) = file.connect_timeout_secs {
        download.connect_timeout_secs = secs;
    }
    if let Some(secs) = file.timeout_secs {
        download.timeout_secs = secs;
    }

    let defaults = SearchSettings::default();
    let pacing = match (file.pacing_min_ms, file.pacing_max_ms) {
        (None, None) => defaults.pacing,
        (min, max) => PacingDelay::new(
            min.map_or(defaults.pacing.min(), Duration::from_millis),
            max.map_or(defaults.pacing.max(), Duration::from_millis),
        ),
    };
    let search = SearchSettings {
        max_concurrent_searches: args
            .search_concurrency
            .map(usize::from)
            .or(file.max_concurrent_searches)
            .unwrap_or(defaults.max_concurrent_searches),
        limit_per_source: args
            .limit_per_source
            .map(usize::from)
            .or(file.limit_per_source)
            .unwrap_or(defaults.limit_per_source),
        pacing,
    };

    RunSettings {
        priority,
        download,
        search,
        fallback_enabled: !args.no_fallback && file.fallback.unwrap_or(true),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_minimal_args_parse_successfully() {
        let args = parse(&["paperfetch", "-i", "papers.txt"]);
        assert_eq!(args.input, Some(PathBuf::from("papers.txt")));
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert!(args.concurrency.is_none());
    }

    #[test]
    fn test_cli_input_required_unless_checking_sources() {
        let err = Args::try_parse_from(["paperfetch"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
        assert!(Args::try_parse_from(["paperfetch", "--check-sources"]).is_ok());
    }

    #[test]
    fn test_cli_sources_are_comma_delimited() {
        let args = parse(&["paperfetch", "-i", "x.txt", "-s", "zenodo,arxiv"]);
        assert_eq!(
            args.sources,
            Some(vec!["zenodo".to_string(), "arxiv".to_string()])
        );
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = parse(&["paperfetch", "-i", "x.txt", "-vv"]);
        assert_eq!(args.verbose, 2);
        assert_eq!(args.default_log_level(), "trace");
    }

    #[test]
    fn test_cli_quiet_conflicts_with_verbose() {
        let result = Args::try_parse_from(["paperfetch", "-i", "x.txt", "-q", "-v"]);
        assert_eq!(
            result.unwrap_err().kind(),
            clap::error::ErrorKind::ArgumentConflict
        );
        assert_eq!(parse(&["paperfetch", "-i", "x.txt", "-q"]).default_log_level(), "error");
    }

    #[test]
    fn test_cli_concurrency_range() {
        assert_eq!(parse(&["paperfetch", "-i", "x", "-c", "32"]).concurrency, Some(32));
        assert!(Args::try_parse_from(["paperfetch", "-i", "x", "-c", "0"]).is_err());
        assert!(Args::try_parse_from(["paperfetch", "-i", "x", "-c", "33"]).is_err());
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let err = Args::try_parse_from(["paperfetch", "--invalid-flag"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_resolve_settings_defaults() {
        let settings = resolve_settings(&parse(&["paperfetch", "-i", "x.txt"]), None);
        assert_eq!(settings.priority, ["arxiv", "zenodo", "doaj", "semantic_scholar"]);
        assert_eq!(settings.download.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
        assert_eq!(settings.download.max_concurrent_downloads, DEFAULT_CONCURRENCY);
        assert!(settings.download.save_metadata);
        assert!(!settings.download.overwrite_existing);
        assert!(settings.fallback_enabled);
        assert_eq!(settings.search, SearchSettings::default());
    }

    #[test]
    fn test_resolve_settings_cli_overrides_file() {
        let file = FileConfig {
            sources: Some(vec!["zenodo".to_string()]),
            max_concurrent_downloads: Some(8),
            limit_per_source: Some(9),
            fallback: Some(false),
            output_dir: Some(PathBuf::from("/from/file")),
            ..FileConfig::default()
        };
        let args = parse(&["paperfetch", "-i", "x.txt", "-c", "2", "-s", "ARXIV"]);

        let settings = resolve_settings(&args, Some(&file));

        assert_eq!(settings.priority, ["arxiv"]);
        assert_eq!(settings.download.max_concurrent_downloads, 2);
        assert_eq!(settings.search.limit_per_source, 9);
        assert_eq!(settings.download.output_dir, PathBuf::from("/from/file"));
        assert!(!settings.fallback_enabled);
    }

    #[test]
    fn test_resolve_settings_flags_disable_features() {
        let file = FileConfig {
            save_metadata: Some(true),
            pacing_min_ms: Some(0),
            pacing_max_ms: Some(0),
            ..FileConfig::default()
        };
        let args = parse(&["paperfetch", "-i", "x", "--no-metadata", "--no-fallback", "--overwrite"]);

        let settings = resolve_settings(&args, Some(&file));

        assert!(!settings.download.save_metadata);
        assert!(settings.download.overwrite_existing);
        assert!(!settings.fallback_enabled);
        assert_eq!(settings.search.pacing, PacingDelay::none());
    }
}
