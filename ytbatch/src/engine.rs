use async_trait::async_trait;
use tokio_stream::StreamExt;
use yt_dlp::{DownloadEvent, DownloadOptions, OutputFormat, ProgressStatus, YtDlp};

use crate::progress::ProgressEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub id: String,
    pub available: bool
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineOutcome {
    Success,
    PartialFailure(Vec<String>),
    FatalFailure(String)
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    YtDlp(#[from] yt_dlp::Error)
}

/// The media-fetch engine the batch core drives.
#[async_trait]
pub trait MediaEngine: Send + Sync + 'static {
    /// Lists the entries behind a playlist link without downloading them.
    async fn enumerate(&self, url: &str) -> Result<Vec<PlaylistEntry>, EngineError>;

    /// Downloads every link, calling `on_event` for each progress report.
    /// Units are downloaded one after another and each is closed by exactly
    /// one [`ProgressEvent::Finished`].
    async fn download(
        &self,
        links: &[String],
        format_selector: &str,
        on_event: &(dyn Fn(ProgressEvent) + Send + Sync)
    ) -> EngineOutcome;
}

#[derive(Debug, Clone)]
pub struct YtDlpEngine {
    client: YtDlp,
    options: DownloadOptions
}

impl YtDlpEngine {
    pub fn new(client: YtDlp, options: DownloadOptions) -> Self {
        Self { client, options }
    }

    pub fn client(&self) -> &YtDlp {
        &self.client
    }
}

#[async_trait]
impl MediaEngine for YtDlpEngine {
    async fn enumerate(&self, url: &str) -> Result<Vec<PlaylistEntry>, EngineError> {
        let info = self.client.get_playlist_entries(url).await?;

        let Some(entries) = info.entries else {
            return Ok(vec![PlaylistEntry {
                id: info.id.unwrap_or_else(|| url.to_string()),
                available: true
            }]);
        };

        Ok(entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| match entry {
                Some(entry) => {
                    tracing::trace!(
                        index,
                        id = entry.id.as_deref(),
                        title = entry.title.as_deref(),
                        "playlist entry"
                    );
                    PlaylistEntry {
                        id: entry.id.unwrap_or_else(|| format!("#{}", index + 1)),
                        available: true
                    }
                }
                None => PlaylistEntry {
                    id: format!("#{}", index + 1),
                    available: false
                }
            })
            .collect())
    }

    async fn download(
        &self,
        links: &[String],
        format_selector: &str,
        on_event: &(dyn Fn(ProgressEvent) + Send + Sync)
    ) -> EngineOutcome {
        let options = self
            .options
            .clone()
            .format(OutputFormat::Custom(format_selector.to_string()));

        let stream = self.client.download_with_progress(links, &options);
        tokio::pin!(stream);

        let mut errors = Vec::new();
        let mut finished_units = 0u64;
        let mut exit_code = None;

        while let Some(event) = stream.next().await {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    tracing::error!("yt-dlp stream failed: {}", e);
                    return EngineOutcome::FatalFailure(e.to_string());
                }
            };

            match event {
                DownloadEvent::Progress(progress) => match progress.status {
                    ProgressStatus::Downloading => {
                        tracing::trace!(
                            downloaded = %progress.format_size(),
                            total = ?progress.format_total(),
                            speed = ?progress.format_speed(),
                            eta = ?progress.format_eta(),
                            "unit progress"
                        );
                        on_event(ProgressEvent::Downloading {
                            downloaded_bytes: progress.downloaded_bytes,
                            total_bytes: progress.best_total()
                        });
                    }
                    ProgressStatus::Finished => {
                        finished_units += 1;
                        tracing::debug!("unit {} finished ({})", finished_units, progress.format_size());
                        on_event(ProgressEvent::Finished);
                    }
                    ProgressStatus::Error => {
                        tracing::debug!("yt-dlp reported a failed unit");
                    }
                },
                DownloadEvent::DownloadStarted { filename } => {
                    tracing::info!("Downloading {}", filename);
                }
                DownloadEvent::AlreadyDownloaded { filename } => {
                    tracing::info!("Skipping {}, already downloaded", filename);
                }
                DownloadEvent::MergingFormats => {
                    tracing::debug!("merging formats");
                }
                DownloadEvent::PostProcessing { status } => {
                    tracing::debug!("post-processing: {}", status);
                }
                DownloadEvent::Warning { message } => {
                    tracing::debug!("yt-dlp warning: {}", message);
                }
                DownloadEvent::Error { message } => {
                    tracing::warn!("yt-dlp error: {}", message);
                    errors.push(message);
                }
                DownloadEvent::Extracting { urls } => {
                    tracing::debug!("extracting {} link(s)", urls);
                }
                DownloadEvent::Exited { code } => {
                    exit_code = code;
                }
            }
        }

        classify_exit(exit_code, finished_units, errors)
    }
}

fn classify_exit(exit_code: Option<i32>, finished_units: u64, errors: Vec<String>) -> EngineOutcome {
    if exit_code == Some(0) && errors.is_empty() {
        return EngineOutcome::Success;
    }

    if finished_units > 0 {
        let errors = if errors.is_empty() {
            vec![exit_message(exit_code)]
        } else {
            errors
        };
        return EngineOutcome::PartialFailure(errors);
    }

    if errors.is_empty() {
        EngineOutcome::FatalFailure(exit_message(exit_code))
    } else {
        EngineOutcome::FatalFailure(errors.join("; "))
    }
}

fn exit_message(exit_code: Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("yt-dlp exited with code {code}"),
        None => "yt-dlp was terminated by a signal".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn test_clean_exit_is_success() {
        assert_eq!(classify_exit(Some(0), 3, Vec::new()), EngineOutcome::Success);
        assert_eq!(classify_exit(Some(0), 0, Vec::new()), EngineOutcome::Success);
    }

    #[test]
    fn test_errors_after_finished_units_are_partial() {
        let outcome = classify_exit(Some(1), 2, vec!["Video unavailable".to_string()]);
        assert_eq!(
            outcome,
            EngineOutcome::PartialFailure(vec!["Video unavailable".to_string()])
        );
    }

    #[test]
    fn test_errors_with_zero_exit_are_partial() {
        let outcome = classify_exit(Some(0), 1, vec!["Private video".to_string()]);
        assert!(matches!(outcome, EngineOutcome::PartialFailure(_)));
    }

    #[test]
    fn test_nothing_finished_is_fatal() {
        let outcome = classify_exit(
            Some(1),
            0,
            vec!["Unsupported URL".to_string(), "Video unavailable".to_string()]
        );
        assert_eq!(
            outcome,
            EngineOutcome::FatalFailure("Unsupported URL; Video unavailable".to_string())
        );
        assert_eq!(
            classify_exit(None, 0, Vec::new()),
            EngineOutcome::FatalFailure("yt-dlp was terminated by a signal".to_string())
        );
    }

    #[test]
    fn test_nonzero_exit_without_messages() {
        assert_eq!(
            classify_exit(Some(2), 4, Vec::new()),
            EngineOutcome::PartialFailure(vec!["yt-dlp exited with code 2".to_string()])
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_fatal() {
        let engine = YtDlpEngine::new(
            YtDlp::with_binary("/nonexistent/path/to/yt-dlp"),
            DownloadOptions::new()
        );
        let outcome = engine
            .download(&["https://v/1".to_string()], "best", &|_: ProgressEvent| {})
            .await;
        assert!(matches!(outcome, EngineOutcome::FatalFailure(_)));
    }

    /// Runs `script` with `sh` in place of yt-dlp and records what the
    /// engine reports back.
    async fn run_script(script: &str) -> (Vec<ProgressEvent>, EngineOutcome) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("yt-dlp.sh");
        std::fs::write(&path, script).unwrap();
        let mut client = YtDlp::with_binary("sh");
        client.set_extra_args(vec![path.to_string_lossy().to_string()]);
        let engine = YtDlpEngine::new(client, DownloadOptions::new());

        let events = Mutex::new(Vec::new());
        let record = |event: ProgressEvent| events.lock().unwrap().push(event);
        let outcome = engine
            .download(&["https://v/1".to_string(), "https://v/2".to_string()], "best", &record)
            .await;
        (events.into_inner().unwrap(), outcome)
    }

    #[tokio::test]
    async fn test_download_maps_progress_lines() {
        let (events, outcome) = run_script(r"
printf '[download] Destination: one.mp4\n'
printf '[progress] downloading 0 NA 400 NA NA\n'
printf '[progress] downloading 200 NA 400 25.5 8\n'
printf '[progress] finished 400 400 NA NA NA\n'
printf '[download] two.mp4 has already been downloaded\n'
printf '[progress] finished 900 900 NA NA NA\n'
printf 'WARNING: nothing serious\n' >&2
").await;

        assert_eq!(events, vec![
            ProgressEvent::Downloading { downloaded_bytes: 0, total_bytes: Some(400) },
            ProgressEvent::Downloading { downloaded_bytes: 200, total_bytes: Some(400) },
            ProgressEvent::Finished,
            ProgressEvent::Finished
        ]);
        assert_eq!(outcome, EngineOutcome::Success);
    }

    #[tokio::test]
    async fn test_download_errors_after_a_finished_unit_are_partial() {
        let (events, outcome) = run_script(r"
printf '[progress] downloading 50 100 NA NA NA\n'
printf '[progress] finished 100 100 NA NA NA\n'
printf 'ERROR: [youtube] gone: Video unavailable\n' >&2
exit 1
").await;

        assert_eq!(events, vec![
            ProgressEvent::Downloading { downloaded_bytes: 50, total_bytes: Some(100) },
            ProgressEvent::Finished
        ]);
        assert_eq!(
            outcome,
            EngineOutcome::PartialFailure(vec!["[youtube] gone: Video unavailable".to_string()])
        );
    }

    #[tokio::test]
    async fn test_download_errors_with_nothing_finished_are_fatal() {
        let (events, outcome) = run_script(r"
printf 'ERROR: Unsupported URL: https://v/1\n' >&2
exit 1
").await;

        assert!(events.is_empty());
        assert_eq!(
            outcome,
            EngineOutcome::FatalFailure("Unsupported URL: https://v/1".to_string())
        );
    }

    #[tokio::test]
    async fn test_download_keeps_going_past_non_utf8_output() {
        let (events, outcome) = run_script(r"
printf '[progress] downloading 10 100 NA NA NA\n'
printf '[download] Destination: caf\351.mp4\n'
printf '[progress] finished 100 100 NA NA NA\n'
").await;

        assert_eq!(events, vec![
            ProgressEvent::Downloading { downloaded_bytes: 10, total_bytes: Some(100) },
            ProgressEvent::Finished
        ]);
        assert_eq!(outcome, EngineOutcome::Success);
    }

    #[tokio::test]
    async fn test_enumerate_with_missing_binary_fails() {
        let engine = YtDlpEngine::new(
            YtDlp::with_binary("/nonexistent/path/to/yt-dlp"),
            DownloadOptions::new()
        );
        assert!(engine.enumerate("https://v/2?list=ABC").await.is_err());
    }
}
