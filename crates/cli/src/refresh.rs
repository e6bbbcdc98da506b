//! One refresh pass: scrape → reconcile → render → publish → swap.
//!
//! Only one pass runs at a time. A trigger that arrives mid-pass returns
//! [`RefreshOutcome::Skipped`]. A pass whose primary table is empty, or
//! whose output is mostly N/A, leaves the previous snapshot in place and
//! publishes nothing.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;

use nepse_config::PageSettings;
use nepse_recon::{ReconConfig, ReconError};

use crate::publish::{Artifact, PublishError, Publisher};
use crate::render::render_page;
use crate::scrape::{scrape_all, ScrapeError, SourceFetcher};
use crate::snapshot::{Snapshot, SnapshotReader, SnapshotWriter};

#[derive(Debug, Clone, PartialEq)]
pub enum StaleReason {
    /// The primary source produced no rows.
    EmptyPrimary,
    /// Share of N/A cells above `publish.max_unavailable_ratio`.
    Degraded { ratio: f64, limit: f64 },
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPrimary => f.write_str("primary table is empty"),
            Self::Degraded { ratio, limit } => {
                write!(f, "{:.1}% of cells are unavailable (limit {:.1}%)", ratio * 100.0, limit * 100.0)
            }
        }
    }
}

#[derive(Debug)]
pub enum RefreshOutcome {
    /// A new snapshot was swapped in.
    Refreshed { rows: usize, published: bool },
    /// A new snapshot was swapped in, but the upload failed.
    PublishFailed { rows: usize, error: PublishError },
    /// Previous snapshot kept.
    Stale(StaleReason),
    /// Reconciliation rejected the input; previous snapshot kept.
    Failed(ReconError),
    /// Another pass was running.
    Skipped,
}

#[derive(Debug)]
pub struct RefreshReport {
    pub outcome: RefreshOutcome,
    /// Sources that failed to scrape this pass.
    pub scrape_errors: Vec<ScrapeError>,
}

impl RefreshReport {
    fn new(outcome: RefreshOutcome) -> Self {
        Self {
            outcome,
            scrape_errors: Vec::new(),
        }
    }
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct RefreshCycle {
    recon: ReconConfig,
    page: PageSettings,
    max_unavailable_ratio: f64,
    fetcher: Box<dyn SourceFetcher>,
    publisher: Option<Box<dyn Publisher>>,
    writer: SnapshotWriter,
    running: AtomicBool,
}

impl RefreshCycle {
    pub fn new(
        recon: ReconConfig,
        page: PageSettings,
        fetcher: Box<dyn SourceFetcher>,
        publisher: Option<Box<dyn Publisher>>,
        writer: SnapshotWriter,
    ) -> Self {
        Self {
            recon,
            page,
            max_unavailable_ratio: 1.0,
            fetcher,
            publisher,
            writer,
            running: AtomicBool::new(false),
        }
    }

    pub fn with_max_unavailable_ratio(mut self, ratio: f64) -> Self {
        self.max_unavailable_ratio = ratio;
        self
    }

    pub fn reader(&self) -> SnapshotReader {
        self.writer.reader()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn try_enter(&self) -> Option<RunningGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunningGuard(&self.running))
    }

    /// Run one pass unless one is already running.
    pub fn run_once(&self) -> RefreshReport {
        let Some(_guard) = self.try_enter() else {
            log::warn!("refresh already running, skipping this trigger");
            return RefreshReport::new(RefreshOutcome::Skipped);
        };

        let scraped = scrape_all(self.fetcher.as_ref(), &self.recon);
        let outcome = self.reconcile_and_publish(&scraped.input);
        log_outcome(&outcome);

        RefreshReport {
            outcome,
            scrape_errors: scraped.errors,
        }
    }

    fn reconcile_and_publish(&self, input: &nepse_recon::ReconInput) -> RefreshOutcome {
        let primary_rows = input
            .records
            .get(&self.recon.primary)
            .map_or(0, Vec::len);
        if primary_rows == 0 {
            return RefreshOutcome::Stale(StaleReason::EmptyPrimary);
        }

        let result = match nepse_recon::run(&self.recon, input) {
            Ok(result) => result,
            Err(e) => return RefreshOutcome::Failed(e),
        };

        let ratio = result.summary.unavailable_ratio();
        if ratio > self.max_unavailable_ratio {
            return RefreshOutcome::Stale(StaleReason::Degraded {
                ratio,
                limit: self.max_unavailable_ratio,
            });
        }

        let generated_at = Utc::now();
        let html = render_page(
            &self.page,
            &result.schema,
            &result.records,
            generated_at,
            &result.schema.sentinel,
        );

        let publish_result = match &self.publisher {
            Some(publisher) => {
                let artifact = Artifact::html(self.page.file_name.clone(), html.clone());
                Some(publisher.publish(&artifact))
            }
            None => None,
        };
        let published = matches!(publish_result, Some(Ok(())));

        let rows = result.records.len();
        self.writer.swap(Snapshot {
            records: result.records,
            schema: result.schema,
            summary: result.summary,
            html,
            generated_at,
            published,
        });

        match publish_result {
            Some(Err(error)) => RefreshOutcome::PublishFailed { rows, error },
            _ => RefreshOutcome::Refreshed { rows, published },
        }
    }
}

fn log_outcome(outcome: &RefreshOutcome) {
    match outcome {
        RefreshOutcome::Refreshed { rows, published } => {
            log::info!("refresh complete: {rows} rows, published: {published}");
        }
        RefreshOutcome::PublishFailed { rows, error } => {
            log::error!("refresh rendered {rows} rows but publishing failed: {error}");
        }
        RefreshOutcome::Stale(reason) => {
            log::warn!("refresh stale ({reason}), keeping previous snapshot");
        }
        RefreshOutcome::Failed(e) => {
            log::error!("refresh failed: {e}, keeping previous snapshot");
        }
        RefreshOutcome::Skipped => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};
    use std::thread;

    use nepse_recon::config::SourceConfig;
    use nepse_recon::SourceRecord;

    use crate::snapshot::SnapshotCell;

    const RECON: &str = r#"
name = "test board"
primary = "live"
secondaries = ["w52"]

[sources.live]
symbol_column = "Symbol"
columns = [{ header = "LTP" }]

[sources.w52]
symbol_column = "Symbol"
columns = [{ header = "High" }]

[[derived]]
name = "Down From High (%)"
kind = "distance_from_high"
current = "LTP"
reference = "High"
"#;

    /// Hands out one canned table set per call.
    struct Scripted {
        passes: Mutex<Vec<HashMap<&'static str, Vec<SourceRecord>>>>,
    }

    impl Scripted {
        fn new(mut passes: Vec<HashMap<&'static str, Vec<SourceRecord>>>) -> Self {
            passes.reverse();
            Self { passes: Mutex::new(passes) }
        }
    }

    impl SourceFetcher for Scripted {
        fn fetch(&self, name: &str, _source: &SourceConfig) -> Result<Vec<SourceRecord>, ScrapeError> {
            let mut passes = self.passes.lock().unwrap();
            let rows = passes.last_mut().and_then(|pass| pass.remove(name));
            if passes.last().is_some_and(HashMap::is_empty) {
                passes.pop();
            }
            rows.ok_or_else(|| ScrapeError::Status { source: name.into(), status: 503 })
        }
    }

    struct Recorder {
        uploads: Arc<Mutex<Vec<Artifact>>>,
        fail: bool,
    }

    impl Publisher for Recorder {
        fn publish(&self, artifact: &Artifact) -> Result<(), PublishError> {
            if self.fail {
                return Err(PublishError::Connect("refused".into()));
            }
            self.uploads.lock().unwrap().push(artifact.clone());
            Ok(())
        }

        fn describe(&self) -> String {
            "recorder".into()
        }
    }

    fn good_pass() -> HashMap<&'static str, Vec<SourceRecord>> {
        HashMap::from([
            ("live", vec![SourceRecord::new("ABC").with("LTP", "100")]),
            ("w52", vec![SourceRecord::new("ABC").with("High", "150")]),
        ])
    }

    fn empty_pass() -> HashMap<&'static str, Vec<SourceRecord>> {
        HashMap::from([("live", Vec::new()), ("w52", Vec::new())])
    }

    fn cycle(
        passes: Vec<HashMap<&'static str, Vec<SourceRecord>>>,
        publisher: Option<Box<dyn Publisher>>,
    ) -> RefreshCycle {
        let (writer, _reader) = SnapshotCell::new().split();
        RefreshCycle::new(
            ReconConfig::from_toml(RECON).unwrap(),
            PageSettings::default(),
            Box::new(Scripted::new(passes)),
            publisher,
            writer,
        )
    }

    #[test]
    fn test_pass_renders_and_publishes() {
        let uploads = Arc::new(Mutex::new(Vec::new()));
        let publisher = Recorder { uploads: Arc::clone(&uploads), fail: false };
        let cycle = cycle(vec![good_pass()], Some(Box::new(publisher)));

        let report = cycle.run_once();
        assert!(matches!(report.outcome, RefreshOutcome::Refreshed { rows: 1, published: true }));
        assert!(report.scrape_errors.is_empty());

        let snapshot = cycle.reader().latest().unwrap();
        assert!(snapshot.published);
        assert!(snapshot.html.contains("<td>ABC</td><td>100</td><td>150</td><td>33.33</td>"));

        let uploads = uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].file_name, "index.html");
        assert_eq!(uploads[0].body, snapshot.html.as_bytes());
    }

    #[test]
    fn test_empty_primary_keeps_previous_snapshot() {
        let cycle = cycle(vec![good_pass(), empty_pass()], None);

        cycle.run_once();
        let first = cycle.reader().latest().unwrap();

        let report = cycle.run_once();
        assert!(matches!(report.outcome, RefreshOutcome::Stale(StaleReason::EmptyPrimary)));
        let current = cycle.reader().latest().unwrap();
        assert!(Arc::ptr_eq(&first, &current));
    }

    #[test]
    fn test_scrape_failure_is_reported_and_stale() {
        // No tables at all: every fetch fails
        let cycle = cycle(vec![HashMap::from([("other", Vec::new())])], None);
        let report = cycle.run_once();
        assert!(matches!(report.outcome, RefreshOutcome::Stale(StaleReason::EmptyPrimary)));
        assert_eq!(report.scrape_errors.len(), 2);
        assert!(cycle.reader().latest().is_none());
    }

    #[test]
    fn test_missing_secondary_still_refreshes() {
        let pass = HashMap::from([("live", vec![SourceRecord::new("XYZ").with("LTP", "50")])]);
        let cycle = cycle(vec![pass], None);
        let report = cycle.run_once();
        assert!(matches!(report.outcome, RefreshOutcome::Refreshed { rows: 1, published: false }));
        assert_eq!(report.scrape_errors.len(), 1);
        let snapshot = cycle.reader().latest().unwrap();
        assert!(snapshot.html.contains("<td>XYZ</td><td>50</td><td>N/A</td><td>N/A</td>"));
    }

    #[test]
    fn test_degraded_pass_is_discarded() {
        let pass = HashMap::from([
            ("live", vec![SourceRecord::new("XYZ").with("LTP", "50")]),
            ("w52", Vec::new()),
        ]);
        // 2 of 3 cells are N/A
        let cycle = cycle(vec![pass], None).with_max_unavailable_ratio(0.5);
        let report = cycle.run_once();
        match report.outcome {
            RefreshOutcome::Stale(StaleReason::Degraded { ratio, limit }) => {
                assert!((ratio - 2.0 / 3.0).abs() < 1e-9);
                assert_eq!(limit, 0.5);
            }
            other => panic!("expected degraded, got {other:?}"),
        }
        assert!(cycle.reader().latest().is_none());
    }

    #[test]
    fn test_publish_failure_still_swaps() {
        let publisher = Recorder { uploads: Arc::new(Mutex::new(Vec::new())), fail: true };
        let cycle = cycle(vec![good_pass()], Some(Box::new(publisher)));

        let report = cycle.run_once();
        match report.outcome {
            RefreshOutcome::PublishFailed { rows, error } => {
                assert_eq!(rows, 1);
                assert_eq!(error, PublishError::Connect("refused".into()));
            }
            other => panic!("expected publish failure, got {other:?}"),
        }
        let snapshot = cycle.reader().latest().unwrap();
        assert!(!snapshot.published);
    }

    /// Blocks inside the primary fetch until released.
    struct Gate {
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl SourceFetcher for Gate {
        fn fetch(&self, name: &str, _source: &SourceConfig) -> Result<Vec<SourceRecord>, ScrapeError> {
            if name == "live" {
                self.entered.lock().unwrap().send(()).unwrap();
                self.release.lock().unwrap().recv().unwrap();
                return Ok(vec![SourceRecord::new("ABC").with("LTP", "1")]);
            }
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_overlapping_trigger_is_skipped() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let (writer, reader) = SnapshotCell::new().split();
        let cycle = Arc::new(RefreshCycle::new(
            ReconConfig::from_toml(RECON).unwrap(),
            PageSettings::default(),
            Box::new(Gate {
                entered: Mutex::new(entered_tx),
                release: Mutex::new(release_rx),
            }),
            None,
            writer,
        ));

        let background = {
            let cycle = Arc::clone(&cycle);
            thread::spawn(move || cycle.run_once())
        };

        entered_rx.recv().unwrap();
        assert!(cycle.is_running());
        let second = cycle.run_once();
        assert!(matches!(second.outcome, RefreshOutcome::Skipped));

        release_tx.send(()).unwrap();
        let first = background.join().unwrap();
        assert!(matches!(first.outcome, RefreshOutcome::Refreshed { rows: 1, .. }));
        assert!(!cycle.is_running());
        assert!(reader.latest().is_some());
    }
}
