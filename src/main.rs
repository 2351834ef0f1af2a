mod cli;
mod config;
mod field_normalizer;
mod http_fetcher;
mod json_tree;
mod next_data;
mod pipeline;
mod preview_image;
mod preview_resolver;
mod proxy_env;
mod report;
mod source_ref;
mod trpc_query;
mod version_select;

use std::path::PathBuf;

use clap::Parser;
use log::{info, warn};

use cli::Cli;
use config::Config;
use http_fetcher::{ListingFetcher, UreqFetcher};
use pipeline::{resolve_listing, validate_listing_url, ListingDetails, FAILURE_MESSAGE};
use proxy_env::ProxyEnvGuard;

const DONE_MESSAGE: &str = "done~!";

/// Per-run choices derived from config and CLI flags.
#[derive(Debug, Clone)]
struct ExportOptions {
    output_dir: PathBuf,
    placeholder_image: Option<PathBuf>,
    print_details: bool,
    save_files: bool,
}

impl ExportOptions {
    fn from_sources(cli: &Cli, config: &Config) -> Self {
        Self {
            output_dir: cli
                .output_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(&config.output.directory)),
            placeholder_image: config.output.placeholder_image.as_ref().map(PathBuf::from),
            print_details: config.output.print_details && !cli.quiet,
            save_files: !cli.no_save,
        }
    }
}

fn print_details(details: &ListingDetails) {
    for (name, value) in details.fields.entries() {
        println!("{name}: {value}");
    }
}

fn persist_details(
    fetcher: &dyn ListingFetcher,
    details: &ListingDetails,
    url: &str,
    options: &ExportOptions,
) {
    match preview_image::save_preview_image(
        fetcher,
        details.preview_url.as_deref(),
        &details.fields.file_name,
        &options.output_dir,
        options.placeholder_image.as_deref(),
    ) {
        Ok((path, outcome)) => info!("Preview written ({outcome:?}). path={}", path.display()),
        Err(err) => warn!("Preview image not written: {err}"),
    }
    match report::save_report(&options.output_dir, &details.fields, url) {
        Ok(path) => info!("Report written. path={}", path.display()),
        Err(err) => warn!("Report not written: {err}"),
    }
}

/// Resolves one URL and persists the result. Returns the user-facing status.
fn export_listing(fetcher: &dyn ListingFetcher, url: &str, options: &ExportOptions) -> String {
    let url = match validate_listing_url(url) {
        Ok(url) => url,
        Err(message) => return message,
    };

    let details = resolve_listing(url, fetcher);
    if !details.page_fetched {
        warn!("Listing page unreachable, report fields will be empty. url={url}");
    }
    if options.print_details {
        print_details(&details);
    }
    if options.save_files {
        persist_details(fetcher, &details, url, options);
    }
    DONE_MESSAGE.to_string()
}

fn config_file_path(cli: &Cli) -> Result<PathBuf, String> {
    cli.config
        .clone()
        .or_else(config::default_config_path)
        .ok_or_else(|| "Unable to determine the user config directory".to_string())
}

fn run(cli: &Cli, config: &Config) -> String {
    let _proxy_guard = config.network.bypass_env_proxy.then(ProxyEnvGuard::acquire);
    let proxy_url = config.network.proxy_url();
    let fetcher = match UreqFetcher::new(&config.network, proxy_url.as_deref()) {
        Ok(fetcher) => fetcher,
        Err(err) => {
            log::error!("{err}");
            return FAILURE_MESSAGE.to_string();
        }
    };
    export_listing(&fetcher, &cli.url, &ExportOptions::from_sources(cli, config))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut clog = colog::default_builder();
    clog.filter(
        None,
        if cli.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        },
    );
    clog.init();

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{}': {}", thread_name, panic_info);
    }));

    let config_file = config_file_path(&cli)?;
    let config = config::load_or_create(&config_file)?;

    let status = run(&cli, &config);
    println!("{status}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{export_listing, ExportOptions, DONE_MESSAGE};
    use crate::cli::Cli;
    use crate::config::Config;
    use crate::http_fetcher::ListingFetcher;
    use crate::pipeline::FAILURE_MESSAGE;
    use clap::Parser;
    use serde_json::Value;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[derive(Default)]
    struct OfflineFetcher {
        requested: Mutex<Vec<String>>,
    }

    impl OfflineFetcher {
        fn fail(&self, url: &str) -> String {
            self.requested.lock().expect("request log").push(url.to_string());
            format!("Page request failed ({url}): offline")
        }
    }

    impl ListingFetcher for OfflineFetcher {
        fn fetch_text(&self, url: &str) -> Result<String, String> {
            Err(self.fail(url))
        }
        fn fetch_json(&self, url: &str) -> Result<Value, String> {
            Err(self.fail(url))
        }
        fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, String> {
            Err(self.fail(url))
        }
        fn probe_filename(&self, url: &str) -> Result<Option<String>, String> {
            Err(self.fail(url))
        }
    }

    fn unique_temp_dir(test_name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock should be after UNIX_EPOCH")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "vincenzo_export_{}_{}_{}",
            test_name,
            std::process::id(),
            nanos
        ))
    }

    fn options(output_dir: PathBuf) -> ExportOptions {
        ExportOptions {
            output_dir,
            placeholder_image: None,
            print_details: false,
            save_files: true,
        }
    }

    #[test]
    fn test_non_http_url_is_rejected_before_any_request() {
        let fetcher = OfflineFetcher::default();
        let status = export_listing(&fetcher, "civitai.com/models/7", &options(unique_temp_dir("x")));
        assert_eq!(status, FAILURE_MESSAGE);
        assert!(fetcher.requested.lock().expect("request log").is_empty());
    }

    #[test]
    fn test_offline_export_still_writes_report_and_placeholder() {
        let dir = unique_temp_dir("offline");
        let fetcher = OfflineFetcher::default();
        let status = export_listing(&fetcher, "https://civitai.com/models/7", &options(dir.clone()));

        assert_eq!(status, DONE_MESSAGE);
        let report = std::fs::read_to_string(dir.join("model.txt")).expect("report written");
        assert!(report.starts_with("Type: \n"));
        assert!(report.ends_with("URL: https://civitai.com/models/7\n"));
        assert!(image::open(dir.join("preview.png")).is_ok());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_export_options_merge_cli_over_config() {
        let cli = Cli::parse_from(["vincenzo", "https://x", "--output-dir", "exports", "-q"]);
        let mut config = Config::default();
        config.output.placeholder_image = Some("default.png".to_string());

        let options = ExportOptions::from_sources(&cli, &config);
        assert_eq!(options.output_dir, PathBuf::from("exports"));
        assert_eq!(options.placeholder_image, Some(PathBuf::from("default.png")));
        assert!(!options.print_details);
        assert!(options.save_files);
    }
}
