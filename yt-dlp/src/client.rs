use std::collections::HashMap;
use std::path::PathBuf;
use std::pin::Pin;

use futures_core::Stream;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::command::CommandBuilder;
use crate::error::{Error, Result};
use crate::types::{DownloadEvent, DownloadOptions, DownloadProgress, PlaylistInfo, ProgressStatus};

/// Every progress report is printed on its own line in this shape so that it
/// can be told apart from yt-dlp's regular console output.
const PROGRESS_PREFIX: &str = "[progress]";
const PROGRESS_TEMPLATE: &str = "download:[progress] %(progress.status)s %(progress.downloaded_bytes)s %(progress.total_bytes)s %(progress.total_bytes_estimate)s %(progress.speed)s %(progress.eta)s";

#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: PathBuf,
    cookies_file: Option<PathBuf>,
    extra_args: Vec<String>,
    ffmpeg_location: Option<PathBuf>,
    env_vars: HashMap<String, String>
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::new()
    }
}

impl YtDlp {
    pub fn new() -> Self {
        Self::with_binary("yt-dlp")
    }

    pub fn with_binary(path: impl Into<PathBuf>) -> Self {
        Self {
            binary: path.into(),
            cookies_file: None,
            extra_args: Vec::new(),
            ffmpeg_location: None,
            env_vars: HashMap::new()
        }
    }

    pub fn binary(&self) -> &PathBuf {
        &self.binary
    }

    pub fn set_cookies_file(&mut self, path: Option<PathBuf>) {
        self.cookies_file = path;
    }

    pub fn set_extra_args(&mut self, args: Vec<String>) {
        self.extra_args = args;
    }

    pub fn set_ffmpeg_location(&mut self, path: Option<PathBuf>) {
        self.ffmpeg_location = path;
    }

    pub fn set_env(&mut self, key: String, value: String) {
        self.env_vars.insert(key, value);
    }

    pub async fn check_binary(&self) -> Result<String> {
        let output = match Command::new(&self.binary).arg("--version").output().await {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::BinaryNotFound(self.binary.clone()));
            }
            Err(e) => return Err(e.into())
        };

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(Error::BinaryNotExecutable(self.binary.clone()))
        }
    }

    /// Lists a playlist's entries without downloading anything.
    ///
    /// A URL that turns out to be a single item yields a `PlaylistInfo` whose
    /// `entries` is `None`.
    pub async fn get_playlist_entries(&self, url: &str) -> Result<PlaylistInfo> {
        let output = self
            .command()
            .single_json_output()
            .yes_playlist()
            .flat_playlist()
            .urls(&[url.to_string()])
            .build_with_env(&self.env_vars)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(Error::CommandFailed {
                code: output.status.code().unwrap_or(-1),
                stderr
            });
        }

        if output.stdout.iter().all(u8::is_ascii_whitespace) {
            return Err(Error::EmptyPlaylist);
        }

        let info: PlaylistInfo = serde_json::from_slice(&output.stdout)?;
        tracing::debug!(
            url,
            title = info.title.as_deref(),
            reported = info.playlist_count,
            entries = info.entries.as_ref().map(Vec::len),
            available = info.available_count(),
            "enumerated playlist"
        );
        Ok(info)
    }

    /// Downloads every URL in one yt-dlp process and streams what it reports.
    ///
    /// The stream always ends with [`DownloadEvent::Exited`] once the process
    /// has been spawned. Errors and warnings are read from stderr and are
    /// yielded after stdout closes.
    pub fn download_with_progress(
        &self,
        urls: &[String],
        options: &DownloadOptions
    ) -> Pin<Box<dyn Stream<Item = Result<DownloadEvent>> + Send + 'static>> {
        let urls = urls.to_vec();
        let options = options.clone();
        let builder = self
            .command()
            .with_options(&options)
            .newline_progress()
            .progress_template(PROGRESS_TEMPLATE)
            .urls(&urls);
        let binary = self.binary.clone();
        let env_vars = self.env_vars.clone();

        Box::pin(async_stream::try_stream! {
            yield DownloadEvent::Extracting { urls: urls.len() };

            tracing::debug!(
                binary = %binary.display(),
                args = ?builder.get_args(),
                "spawning yt-dlp"
            );

            let mut cmd = builder.build_with_env(&env_vars);
            cmd.stdout(std::process::Stdio::piped());
            cmd.stderr(std::process::Stdio::piped());
            cmd.kill_on_drop(true);

            let mut child = cmd.spawn()?;

            let stderr = child.stderr.take().ok_or_else(|| {
                std::io::Error::other("yt-dlp stderr not captured")
            })?;
            let stderr_task = tokio::spawn(async move {
                let mut diagnostics = Vec::new();
                let mut reader = BufReader::new(stderr);
                let mut buf = Vec::new();
                while let Ok(Some(line)) = next_line_lossy(&mut reader, &mut buf).await {
                    tracing::trace!(line = %line, "yt-dlp stderr");
                    if let Some(event) = parse_diagnostic_line(&line) {
                        diagnostics.push(event);
                    }
                }
                diagnostics
            });

            let stdout = child.stdout.take().ok_or_else(|| {
                std::io::Error::other("yt-dlp stdout not captured")
            })?;
            let mut reader = BufReader::new(stdout);
            let mut buf = Vec::new();

            while let Some(line) = next_line_lossy(&mut reader, &mut buf).await? {
                tracing::trace!(line = %line, "yt-dlp stdout");
                if let Some(event) = parse_progress_line(&line) {
                    yield event;
                }
            }

            let status = child.wait().await?;

            let diagnostics = match stderr_task.await {
                Ok(diagnostics) => diagnostics,
                Err(e) => {
                    tracing::warn!("yt-dlp stderr reader failed: {}", e);
                    Vec::new()
                }
            };
            for event in diagnostics {
                yield event;
            }

            yield DownloadEvent::Exited { code: status.code() };
        })
    }

    fn command(&self) -> CommandBuilder {
        let mut builder = CommandBuilder::new(&self.binary)
            .cookies_file_opt(self.cookies_file.as_ref())
            .args(self.extra_args.iter().map(String::as_str));

        if let Some(ref ffmpeg_path) = self.ffmpeg_location {
            builder = builder.ffmpeg_location(ffmpeg_path);
        }

        builder
    }
}

/// Reads one line, replacing invalid UTF-8. yt-dlp echoes titles and
/// filenames in the locale's encoding, which need not be UTF-8.
async fn next_line_lossy<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(buf.as_slice());
    Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
}

fn parse_progress_line(line: &str) -> Option<DownloadEvent> {
    let line = line.trim();

    if let Some(rest) = line.strip_prefix(PROGRESS_PREFIX) {
        return parse_template_progress(rest).map(DownloadEvent::Progress);
    }

    if let Some(filename) = line.strip_prefix("[download] Destination:") {
        return Some(DownloadEvent::DownloadStarted {
            filename: filename.trim().to_string()
        });
    }

    if line.starts_with("[download]") && line.ends_with("has already been downloaded") {
        let filename = line
            .trim_start_matches("[download]")
            .trim_end_matches("has already been downloaded")
            .trim()
            .to_string();
        return Some(DownloadEvent::AlreadyDownloaded { filename });
    }

    if line.starts_with("[Merger]") || line.contains("Merging formats") {
        return Some(DownloadEvent::MergingFormats);
    }

    if line.starts_with("[ExtractAudio]") || line.starts_with("[ffmpeg]") {
        return Some(DownloadEvent::PostProcessing {
            status: line.to_string()
        });
    }

    None
}

fn parse_diagnostic_line(line: &str) -> Option<DownloadEvent> {
    let line = line.trim();

    if let Some(message) = line.strip_prefix("ERROR:") {
        return Some(DownloadEvent::Error {
            message: message.trim().to_string()
        });
    }

    if let Some(message) = line.strip_prefix("WARNING:") {
        return Some(DownloadEvent::Warning {
            message: message.trim().to_string()
        });
    }

    None
}

/// Parses the fields written by [`PROGRESS_TEMPLATE`]: status, downloaded
/// bytes, total bytes, total estimate, speed and eta. yt-dlp prints `NA` for
/// missing values.
fn parse_template_progress(content: &str) -> Option<DownloadProgress> {
    let mut parts = content.split_whitespace();

    let status = ProgressStatus::parse(parts.next()?)?;
    let downloaded_bytes = parts.next().and_then(parse_bytes).unwrap_or(0);
    let total_bytes = parts.next().and_then(parse_bytes);
    let total_bytes_estimate = parts.next().and_then(parse_bytes);
    let speed = parts.next().and_then(parse_number);
    let eta = parts.next().and_then(parse_number);

    Some(DownloadProgress {
        status,
        downloaded_bytes,
        total_bytes,
        total_bytes_estimate,
        speed,
        eta
    })
}

fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if s == "NA" || s == "None" || s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|n| n.is_finite() && *n >= 0.0)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_bytes(s: &str) -> Option<u64> {
    parse_number(s).map(|n| n as u64)
}
