use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Default,
    Best,
    BestVideo,
    BestAudio,
    BestVideoBestAudio,
    Custom(String)
}

impl OutputFormat {
    pub fn as_arg(&self) -> Option<String> {
        match self {
            OutputFormat::Default => None,
            OutputFormat::Best => Some("best".to_string()),
            OutputFormat::BestVideo => Some("bestvideo".to_string()),
            OutputFormat::BestAudio => Some("bestaudio".to_string()),
            OutputFormat::BestVideoBestAudio => Some("bestvideo+bestaudio".to_string()),
            OutputFormat::Custom(s) => Some(s.clone())
        }
    }

    /// Whether the selector asks yt-dlp for separate streams that get merged
    /// afterwards. Each stream is fetched (and reported) as its own download.
    pub fn is_merged(&self) -> bool {
        self.as_arg().is_some_and(|arg| arg.contains('+'))
    }
}

#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    pub format: OutputFormat,
    pub output_template: Option<String>,
    pub cookies_file: Option<PathBuf>,
    pub rate_limit: Option<String>,
    pub abort_on_error: bool,
    pub extra_args: Vec<String>
}

impl DownloadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn output_template(mut self, template: impl Into<String>) -> Self {
        self.output_template = Some(template.into());
        self
    }

    pub fn cookies_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cookies_file = Some(path.into());
        self
    }

    pub fn rate_limit(mut self, limit: impl Into<String>) -> Self {
        self.rate_limit = Some(limit.into());
        self
    }

    pub fn abort_on_error(mut self, abort: bool) -> Self {
        self.abort_on_error = abort;
        self
    }

    pub fn extra_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    pub fn extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args.extend(args);
        self
    }
}
