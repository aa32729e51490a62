use std::sync::{Arc, RwLock};

use serde::Serialize;

use crate::progress::ProgressSink;

/// The user-facing side of the batch core.
pub trait Presentation: Send + Sync {
    fn set_trigger_enabled(&self, enabled: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressBar {
    pub value: u64,
    /// `None` renders as an indeterminate bar.
    pub max: Option<u64>
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WebView {
    pub trigger_enabled: bool,
    pub unit: ProgressBar,
    pub batch: ProgressBar
}

impl Default for WebView {
    fn default() -> Self {
        Self {
            trigger_enabled: true,
            unit: ProgressBar { value: 0, max: None },
            batch: ProgressBar { value: 0, max: Some(0) }
        }
    }
}

/// Widget state for the browser page, which polls it over HTTP.
#[derive(Debug, Clone, Default)]
pub struct WebPresentation {
    view: Arc<RwLock<WebView>>
}

impl WebPresentation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> WebView {
        match self.view.read() {
            Ok(view) => *view,
            Err(poisoned) => *poisoned.into_inner()
        }
    }

    fn update(&self, f: impl FnOnce(&mut WebView)) {
        match self.view.write() {
            Ok(mut view) => f(&mut *view),
            Err(poisoned) => f(&mut *poisoned.into_inner())
        }
    }
}

impl Presentation for WebPresentation {
    fn set_trigger_enabled(&self, enabled: bool) {
        self.update(|view| view.trigger_enabled = enabled);
    }
}

impl ProgressSink for WebPresentation {
    fn set_unit_progress(&self, downloaded_bytes: u64, total_bytes: Option<u64>) {
        self.update(|view| {
            view.unit = ProgressBar {
                value: downloaded_bytes,
                max: total_bytes
            };
        });
    }

    fn set_batch_progress(&self, completed_units: u64, planned_units: u64) {
        self.update(|view| {
            view.batch = ProgressBar {
                value: completed_units,
                max: Some(planned_units)
            };
        });
    }
}
