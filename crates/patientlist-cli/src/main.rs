//! patientlist - inspect a patient list from the command line.
//!
//! Loads the full record set from a patient API (with a local cache for
//! offline use) or from a JSON file, then applies filters, search and paging
//! exactly as a list page would, and prints the resulting page.

mod render;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use patientlist_core::{
    CacheManager, CacheMode, CachingSource, Config, FilePatientSource, HttpPatientSource,
    PatientFilters, PatientListController, PatientSource,
};

use render::render_table;

/// Log file name prefix inside the configured log directory
const LOG_FILE_PREFIX: &str = "patientlist.log";

#[derive(Debug, Parser)]
#[command(name = "patientlist", version, about = "Filter, search and page through patient records")]
struct Args {
    /// Read records from a JSON file instead of the API (takes precedence over --url)
    #[arg(long, conflicts_with = "offline")]
    file: Option<PathBuf>,

    /// Base URL of the patient API
    #[arg(long, env = "PATIENTLIST_API_URL")]
    url: Option<String>,

    /// Bearer token for the patient API
    #[arg(long, env = "PATIENTLIST_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Serve records from the local cache only
    #[arg(long)]
    offline: bool,

    /// Do not read or write the local cache
    #[arg(long, conflicts_with = "offline")]
    no_cache: bool,

    /// Only show patients in this service
    #[arg(long)]
    service: Option<String>,

    /// Only show patients with this rank code
    #[arg(long)]
    rank: Option<String>,

    /// Case-insensitive name search
    #[arg(long)]
    search: Option<String>,

    /// Page to show (clamped into range)
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    page: i64,

    /// Records per page
    #[arg(long)]
    per_page: Option<usize>,

    /// Mark these patient ids as selected
    #[arg(long, value_delimiter = ',')]
    select: Vec<i64>,

    /// Print the distinct services and ranks available for filtering
    #[arg(long)]
    show_filters: bool,

    /// Print the view as JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Delete the cached patient list and exit
    #[arg(long, conflicts_with_all = ["offline", "file"])]
    clear_cache: bool,

    /// Store --url, --per-page and --offline in the config file before loading
    #[arg(long)]
    save_config: bool,
}

/// Initialize the tracing subscriber for logging.
/// Returns the file writer guard when a log directory is configured.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr_layer = fmt::layer().with_writer(io::stderr);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(stderr_layer)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(stderr_layer)
                .with(filter)
                .init();
            None
        }
    }
}

/// Fold command-line choices into the persisted config
fn apply_args(config: &mut Config, args: &Args) {
    if let Some(ref url) = args.url {
        config.api_base_url = Some(url.clone());
    }
    if let Some(per_page) = args.per_page {
        config.per_page = Some(per_page);
    }
    if args.offline {
        config.offline_mode = true;
    }
}

fn build_source(args: &Args, config: &Config) -> Result<Arc<dyn PatientSource>> {
    if let Some(ref path) = args.file {
        let file = FilePatientSource::new(path);
        info!(path = %file.path().display(), "Reading patients from file");
        return Ok(Arc::new(file));
    }

    let url = args
        .url
        .clone()
        .or_else(|| config.api_base_url.clone())
        .ok_or_else(|| {
            anyhow::anyhow!("No API URL configured. Set PATIENTLIST_API_URL, pass --url, or use --file")
        })?;

    let mut http = HttpPatientSource::new(url)?;
    if let Some(token) = args.token.clone().or_else(|| config.api_token.clone()) {
        http.set_token(token);
    }
    if let Some(ms) = config.retry_backoff_ms {
        http = http.with_initial_backoff(Duration::from_millis(ms));
    }

    if args.no_cache {
        return Ok(Arc::new(http));
    }

    let cache = CacheManager::new(config.cache_dir()?)?;
    let mode = if args.offline || config.offline_mode {
        CacheMode::Offline
    } else {
        CacheMode::Online
    };
    Ok(Arc::new(CachingSource::new(http, cache, mode)))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let (mut config, config_err) = match Config::load() {
        Ok(c) => (c, None),
        Err(e) => (Config::default(), Some(e)),
    };

    let _log_guard = init_tracing(config.log_dir.as_deref());
    if let Some(e) = config_err {
        warn!(error = %e, "Failed to load config, using defaults");
    }
    info!("patientlist starting");

    if args.clear_cache {
        let cache = CacheManager::new(config.cache_dir()?)?;
        if cache.clear().await? {
            println!("Cleared patient cache in {}", cache.cache_dir().display());
        } else {
            println!("No patient cache to clear");
        }
        return Ok(());
    }

    apply_args(&mut config, &args);
    if args.save_config {
        let path = config.save()?;
        println!("Saved config to {}", path.display());
    }

    let options = config.controller_options();

    let source = build_source(&args, &config).context("Failed to set up patient source")?;
    let mut controller = PatientListController::new(source, options);

    controller.load_and_settle().await;
    if controller.has_error() {
        let message = controller.last_error().unwrap_or("unknown error").to_string();
        anyhow::bail!("Failed to load patients: {}", message);
    }

    if args.show_filters {
        println!("Services: {}", controller.available_services().join(", "));
        println!("Ranks:    {}", controller.available_ranks().join(", "));
        return Ok(());
    }

    if args.service.is_some() || args.rank.is_some() {
        controller.apply_filters(PatientFilters::new(args.service.as_deref(), args.rank.as_deref()));
    }
    if let Some(ref term) = args.search {
        controller.search_patients(term);
    }
    controller.go_to_page(args.page);

    for id in &args.select {
        let record = controller.all_records().iter().find(|r| r.id == *id).cloned();
        match record {
            Some(record) => {
                controller.toggle_select_patient(&record);
            }
            None => warn!(id, "Ignoring selection of unknown patient id"),
        }
    }

    let view = controller.view();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print!("{}", render_table(&view));
    }

    info!("patientlist done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse_filters_and_paging() {
        let args = Args::try_parse_from([
            "patientlist", "--file", "p.json", "--service", "army", "--search", "jo",
            "--page", "-2", "--select", "1,3",
        ])
        .unwrap();
        assert_eq!(args.file, Some(PathBuf::from("p.json")));
        assert_eq!(args.service.as_deref(), Some("army"));
        assert_eq!(args.search.as_deref(), Some("jo"));
        assert_eq!(args.page, -2);
        assert_eq!(args.select, vec![1, 3]);
        assert!(!args.json);
    }

    #[test]
    fn test_args_reject_file_with_offline() {
        assert!(Args::try_parse_from(["patientlist", "--file", "p.json", "--offline"]).is_err());
    }

    #[test]
    fn test_args_reject_offline_without_cache() {
        assert!(Args::try_parse_from(["patientlist", "--offline", "--no-cache"]).is_err());
    }

    #[test]
    fn test_apply_args_overrides_config() {
        let args = Args::try_parse_from([
            "patientlist", "--url", "http://localhost:3000", "--per-page", "25", "--offline",
        ])
        .unwrap();
        let mut config = Config { per_page: Some(5), ..Config::default() };
        apply_args(&mut config, &args);
        assert_eq!(config.api_base_url.as_deref(), Some("http://localhost:3000"));
        assert_eq!(config.controller_options().per_page, 25);
        assert!(config.offline_mode);
    }

    #[test]
    fn test_apply_args_keeps_config_when_unset() {
        let args = Args::try_parse_from(["patientlist", "--file", "p.json"]).unwrap();
        let args = Args { url: None, ..args };
        let mut config = Config {
            api_base_url: Some("https://ehr.example.mil".to_string()),
            per_page: Some(5),
            ..Config::default()
        };
        apply_args(&mut config, &args);
        assert_eq!(config.api_base_url.as_deref(), Some("https://ehr.example.mil"));
        assert_eq!(config.per_page, Some(5));
        assert!(!config.offline_mode);
    }

    #[test]
    fn test_args_reject_clear_cache_with_file() {
        assert!(Args::try_parse_from(["patientlist", "--clear-cache", "--file", "p.json"]).is_err());
    }

    #[test]
    fn test_build_source_requires_url_or_file() {
        let args = Args::try_parse_from(["patientlist"]).unwrap();
        let args = Args { url: None, ..args };
        let err = build_source(&args, &Config::default()).err().unwrap();
        assert!(err.to_string().contains("No API URL configured"));
    }

    #[test]
    fn test_build_source_from_file() {
        let args = Args::try_parse_from(["patientlist", "--file", "p.json"]).unwrap();
        let source = build_source(&args, &Config::default()).unwrap();
        assert_eq!(source.name(), "file");
    }

    #[test]
    fn test_build_source_http_without_cache() {
        let args = Args::try_parse_from(["patientlist", "--url", "http://localhost:3000", "--no-cache"]).unwrap();
        let source = build_source(&args, &Config::default()).unwrap();
        assert_eq!(source.name(), "http");
    }
}
