//! Progress aggregation for a batch run.
//!
//! The engine reports byte-level progress for one unit at a time. The
//! [`ProgressAggregator`] folds those reports into two indicators: how far the
//! current unit is, and how many units of the planned total are done.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    /// `total_bytes` may be missing while the engine does not know the size yet.
    Downloading {
        downloaded_bytes: u64,
        total_bytes: Option<u64>
    },
    Finished
}

/// Push-style receiver for the two progress indicators.
pub trait ProgressSink: Send + Sync {
    fn set_unit_progress(&self, downloaded_bytes: u64, total_bytes: Option<u64>);

    fn set_batch_progress(&self, completed_units: u64, planned_units: u64);
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub unit_downloaded_bytes: u64,
    pub unit_total_bytes: Option<u64>,
    pub unit_fraction: f64,
    pub completed_units: u64,
    pub planned_units: u64
}

impl ProgressSnapshot {
    pub fn idle(planned_units: u64) -> Self {
        Self {
            unit_downloaded_bytes: 0,
            unit_total_bytes: None,
            unit_fraction: 0.0,
            completed_units: 0,
            planned_units
        }
    }

    pub fn push_to(&self, sink: &dyn ProgressSink) {
        sink.set_unit_progress(self.unit_downloaded_bytes, self.unit_total_bytes);
        sink.set_batch_progress(self.completed_units, self.planned_units);
    }
}

#[derive(Debug)]
struct ProgressState {
    unit_downloaded_bytes: u64,
    unit_total_bytes: Option<u64>,
    finished_units: u64,
    expect_size_refresh: bool
}

impl ProgressState {
    fn new() -> Self {
        Self {
            unit_downloaded_bytes: 0,
            unit_total_bytes: None,
            finished_units: 0,
            expect_size_refresh: true
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn unit_fraction(&self) -> f64 {
        match self.unit_total_bytes {
            Some(total) if total > 0 => {
                (self.unit_downloaded_bytes as f64 / total as f64).clamp(0.0, 1.0)
            }
            _ => 0.0
        }
    }
}

/// Folds engine progress events into per-unit and per-batch progress.
///
/// Events arrive on the download task while readers poll from elsewhere, so
/// all state sits behind one mutex and every accessor sees a consistent view.
///
/// The planned total is fixed at construction. If the engine finishes fewer
/// units than planned, batch progress stops short of the total; if it finishes
/// more, [`completed_units`](Self::completed_units) stays at the total.
#[derive(Debug)]
pub struct ProgressAggregator {
    planned_total: u64,
    state: Mutex<ProgressState>
}

impl ProgressAggregator {
    pub fn new(planned_total: u64) -> Self {
        Self {
            planned_total,
            state: Mutex::new(ProgressState::new())
        }
    }

    fn state(&self) -> MutexGuard<'_, ProgressState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn on_event(&self, event: ProgressEvent) {
        let mut state = self.state();
        match event {
            ProgressEvent::Downloading {
                downloaded_bytes,
                total_bytes
            } => {
                if state.expect_size_refresh {
                    if let Some(total) = total_bytes.filter(|&t| t > 0) {
                        state.unit_total_bytes = Some(total);
                        state.expect_size_refresh = false;
                    }
                }
                state.unit_downloaded_bytes = downloaded_bytes;
            }
            ProgressEvent::Finished => {
                state.finished_units += 1;
                state.expect_size_refresh = true;
                state.unit_downloaded_bytes = 0;
                // The next unit must report its own size.
                state.unit_total_bytes = None;
                if state.finished_units > self.planned_total {
                    tracing::debug!(
                        finished = state.finished_units,
                        planned = self.planned_total,
                        "engine finished more units than planned"
                    );
                }
            }
        }
    }

    pub fn per_unit_fraction(&self) -> f64 {
        self.state().unit_fraction()
    }

    pub fn completed_units(&self) -> u64 {
        self.state().finished_units.min(self.planned_total)
    }

    /// Raw count of `Finished` events, not clamped to the plan.
    pub fn finished_events(&self) -> u64 {
        self.state().finished_units
    }

    pub fn unit_bytes(&self) -> (u64, Option<u64>) {
        let state = self.state();
        (state.unit_downloaded_bytes, state.unit_total_bytes)
    }

    pub fn planned_total(&self) -> u64 {
        self.planned_total
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let state = self.state();
        ProgressSnapshot {
            unit_downloaded_bytes: state.unit_downloaded_bytes,
            unit_total_bytes: state.unit_total_bytes,
            unit_fraction: state.unit_fraction(),
            completed_units: state.finished_units.min(self.planned_total),
            planned_units: self.planned_total
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn downloading(downloaded_bytes: u64, total_bytes: Option<u64>) -> ProgressEvent {
        ProgressEvent::Downloading {
            downloaded_bytes,
            total_bytes
        }
    }

    #[test]
    fn test_fresh_aggregator_is_zeroed() {
        let agg = ProgressAggregator::new(5);
        assert!(agg.per_unit_fraction().abs() < f64::EPSILON);
        assert_eq!(agg.completed_units(), 0);
        assert_eq!(agg.unit_bytes(), (0, None));
        assert_eq!(agg.snapshot(), ProgressSnapshot::idle(5));
    }

    #[test]
    fn test_single_unit_sequence() {
        let agg = ProgressAggregator::new(2);

        agg.on_event(downloading(0, Some(100)));
        assert!(agg.per_unit_fraction().abs() < f64::EPSILON);

        agg.on_event(downloading(50, Some(100)));
        assert!((agg.per_unit_fraction() - 0.5).abs() < f64::EPSILON);

        agg.on_event(downloading(100, Some(100)));
        assert!((agg.per_unit_fraction() - 1.0).abs() < f64::EPSILON);
        assert_eq!(agg.completed_units(), 0);

        agg.on_event(ProgressEvent::Finished);
        assert_eq!(agg.completed_units(), 1);
        assert!(agg.per_unit_fraction().abs() < f64::EPSILON);

        agg.on_event(downloading(10, Some(400)));
        assert!((agg.per_unit_fraction() - 0.025).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unknown_size_after_finished_reads_zero() {
        let agg = ProgressAggregator::new(3);
        agg.on_event(downloading(80, Some(100)));
        agg.on_event(ProgressEvent::Finished);

        agg.on_event(downloading(500, None));
        assert!(agg.per_unit_fraction().abs() < f64::EPSILON);
        assert_eq!(agg.unit_bytes(), (500, None));

        agg.on_event(downloading(600, Some(1_200)));
        assert!((agg.per_unit_fraction() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_total_fixed_until_unit_finishes() {
        let agg = ProgressAggregator::new(1);
        agg.on_event(downloading(10, Some(100)));
        agg.on_event(downloading(20, Some(1_000)));
        assert_eq!(agg.unit_bytes(), (20, Some(100)));
        assert!((agg.per_unit_fraction() - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_total_is_unknown() {
        let agg = ProgressAggregator::new(1);
        agg.on_event(downloading(10, Some(0)));
        assert_eq!(agg.unit_bytes(), (10, None));
        agg.on_event(downloading(20, Some(40)));
        assert!((agg.per_unit_fraction() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_non_monotonic_bytes_reflect_latest() {
        let agg = ProgressAggregator::new(1);
        agg.on_event(downloading(90, Some(100)));
        agg.on_event(downloading(30, None));
        assert!((agg.per_unit_fraction() - 0.3).abs() < f64::EPSILON);
        agg.on_event(downloading(250, None));
        assert!((agg.per_unit_fraction() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_completed_matches_finished_count_across_interleavings() {
        let patterns: [&[ProgressEvent]; 3] = [
            &[],
            &[ProgressEvent::Downloading { downloaded_bytes: 1, total_bytes: None }],
            &[
                ProgressEvent::Downloading { downloaded_bytes: 0, total_bytes: Some(9) },
                ProgressEvent::Downloading { downloaded_bytes: 4, total_bytes: None },
                ProgressEvent::Downloading { downloaded_bytes: 9, total_bytes: Some(9) }
            ]
        ];
        let planned = 7u64;
        let agg = ProgressAggregator::new(planned);
        for unit in 0..planned {
            let index = usize::try_from(unit).unwrap() % patterns.len();
            for event in patterns[index] {
                agg.on_event(*event);
            }
            agg.on_event(ProgressEvent::Finished);
        }
        assert_eq!(agg.completed_units(), planned);
        assert_eq!(agg.finished_events(), planned);
    }

    #[test]
    fn test_over_count_is_clamped() {
        let agg = ProgressAggregator::new(2);
        for _ in 0..3 {
            agg.on_event(ProgressEvent::Finished);
        }
        assert_eq!(agg.completed_units(), 2);
        assert_eq!(agg.finished_events(), 3);
        assert_eq!(agg.snapshot().completed_units, 2);
    }

    #[test]
    fn test_under_count_stays_short() {
        let agg = ProgressAggregator::new(4);
        agg.on_event(ProgressEvent::Finished);
        agg.on_event(ProgressEvent::Finished);
        let snapshot = agg.snapshot();
        assert_eq!(snapshot.completed_units, 2);
        assert_eq!(snapshot.planned_units, 4);
    }

    #[test]
    fn test_concurrent_readers_and_writer() {
        let agg = Arc::new(ProgressAggregator::new(50));
        let writer = {
            let agg = Arc::clone(&agg);
            std::thread::spawn(move || {
                for _ in 0..50 {
                    for step in 0..=10 {
                        agg.on_event(ProgressEvent::Downloading {
                            downloaded_bytes: step * 10,
                            total_bytes: Some(100)
                        });
                    }
                    agg.on_event(ProgressEvent::Finished);
                }
            })
        };
        let reader = {
            let agg = Arc::clone(&agg);
            std::thread::spawn(move || {
                let mut last_completed = 0;
                for _ in 0..1_000 {
                    let snapshot = agg.snapshot();
                    assert!((0.0..=1.0).contains(&snapshot.unit_fraction));
                    assert!(snapshot.completed_units >= last_completed);
                    last_completed = snapshot.completed_units;
                }
            })
        };
        writer.join().unwrap();
        reader.join().unwrap();
        assert_eq!(agg.completed_units(), 50);
    }

    #[derive(Default)]
    struct RecordingSink {
        unit: Mutex<Vec<(u64, Option<u64>)>>,
        batch: Mutex<Vec<(u64, u64)>>
    }

    impl ProgressSink for RecordingSink {
        fn set_unit_progress(&self, downloaded_bytes: u64, total_bytes: Option<u64>) {
            self.unit.lock().unwrap().push((downloaded_bytes, total_bytes));
        }

        fn set_batch_progress(&self, completed_units: u64, planned_units: u64) {
            self.batch.lock().unwrap().push((completed_units, planned_units));
        }
    }

    #[test]
    fn test_snapshot_push_to_sink() {
        let agg = ProgressAggregator::new(3);
        agg.on_event(downloading(25, Some(50)));
        let sink = RecordingSink::default();
        agg.snapshot().push_to(&sink);
        assert_eq!(*sink.unit.lock().unwrap(), vec![(25, Some(50))]);
        assert_eq!(*sink.batch.lock().unwrap(), vec![(0, 3)]);
    }
}
