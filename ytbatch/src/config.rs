use std::path::{Path, PathBuf};
use std::time::Duration;

use yt_dlp::{DownloadOptions, YtDlp};

/// Startup configuration, read once from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind_address: String,
    pub port: u16,
    pub download_path: PathBuf,
    pub output_template: String,
    pub ytdlp_path: Option<PathBuf>,
    pub ffmpeg_path: Option<PathBuf>,
    pub cookies_file: Option<PathBuf>,
    pub extractor_args: Vec<String>,
    pub rate_limit: Option<String>,
    pub abort_on_error: bool,
    pub refresh_interval: Duration
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8000,
            download_path: PathBuf::from("./downloads"),
            output_template: "%(title)s.%(ext)s".to_string(),
            ytdlp_path: None,
            ffmpeg_path: None,
            cookies_file: None,
            extractor_args: Vec::new(),
            rate_limit: None,
            abort_on_error: false,
            refresh_interval: Duration::from_millis(250)
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Self {
            bind_address: get("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            port: parse_or("PORT", get("PORT"), defaults.port),
            download_path: get("DOWNLOAD_PATH").map_or(defaults.download_path, PathBuf::from),
            output_template: get("OUTPUT_TEMPLATE").unwrap_or(defaults.output_template),
            ytdlp_path: get("YTDLP_PATH").map(PathBuf::from),
            ffmpeg_path: get("FFMPEG_PATH").map(PathBuf::from),
            cookies_file: get("COOKIES_FILE").map(PathBuf::from),
            extractor_args: get("EXTRACTOR_ARGS")
                .map(|args| parse_extractor_args(&args))
                .unwrap_or_default(),
            rate_limit: get("RATE_LIMIT"),
            abort_on_error: get("ABORT_ON_ERROR").map_or(defaults.abort_on_error, |v| parse_flag(&v)),
            refresh_interval: Duration::from_millis(parse_or(
                "REFRESH_INTERVAL_MS",
                get("REFRESH_INTERVAL_MS"),
                250
            ))
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn yt_dlp(&self) -> YtDlp {
        let mut yt_dlp = match self.ytdlp_path {
            Some(ref path) => {
                tracing::info!("Using custom yt-dlp path: {}", path.display());
                YtDlp::with_binary(path)
            }
            None => YtDlp::new()
        };

        if !self.extractor_args.is_empty() {
            yt_dlp.set_extra_args(self.extractor_args.clone());
        }

        if let Some(ref path) = self.cookies_file {
            if path.exists() {
                yt_dlp.set_cookies_file(Some(path.clone()));
                tracing::info!("Using cookies file: {}", path.display());
            } else {
                tracing::warn!("Cookies file {} does not exist, ignoring", path.display());
            }
        }

        if let Some(ref path) = self.ffmpeg_path {
            yt_dlp.set_ffmpeg_location(Some(path.clone()));
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                yt_dlp.set_env("PATH_PREPEND".to_string(), parent.to_string_lossy().to_string());
            }
            tracing::info!("Using custom ffmpeg path: {}", path.display());
        }

        yt_dlp
    }

    pub fn download_options(&self) -> DownloadOptions {
        let template = output_path(&self.download_path, &self.output_template);
        let mut options = DownloadOptions::new()
            .output_template(template)
            .abort_on_error(self.abort_on_error);

        if let Some(ref limit) = self.rate_limit {
            options = options.rate_limit(limit.clone());
        }

        options
    }
}

fn output_path(dir: &Path, template: &str) -> String {
    dir.join(template).to_string_lossy().to_string()
}

fn parse_or<T: std::str::FromStr>(key: &str, value: Option<String>, default: T) -> T {
    match value {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid value {:?} for {}, using default", raw, key);
            default
        }),
        None => default
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Folds newline or `;` separated extractor arguments into one
/// `--extractor-args` pair.
pub fn parse_extractor_args(input: &str) -> Vec<String> {
    let joined: Vec<&str> = input
        .split(['\n', ';'])
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if joined.is_empty() {
        return Vec::new();
    }
    vec![
        "--extractor-args".to_string(),
        joined.join(";")
    ]
}
