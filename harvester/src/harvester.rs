use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use vulnwatch_collector_common::{CancelFlag, Source};
use vulnwatch_collector_github::GithubSource;
use vulnwatch_collector_osv::OsvSource;
use vulnwatch_store::{is_database_rejection, Db};

use crate::config::HarvesterConfig;
use crate::normalize::Record;

/// Where a run currently is. One run moves Idle → Collecting → Saving →
/// Reporting and back to Idle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Collecting,
    Saving,
    Reporting,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("a collection run is already in progress")]
    AlreadyInProgress,
}

/// Statistics for one collection cycle. Partial success is the normal
/// case: failed targets and failed rows are counted, never fatal.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct RunStats {
    pub collected: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub errors: usize,
    pub elapsed_seconds: f64,
}

pub struct Harvester {
    db: Db,
    sources: Vec<Box<dyn Source>>,
    running: AtomicBool,
    cancel: CancelFlag,
    phase: Mutex<Phase>,
}

impl Harvester {
    pub fn new(db: Db, sources: Vec<Box<dyn Source>>) -> Self {
        Self {
            db,
            sources,
            running: AtomicBool::new(false),
            cancel: CancelFlag::new(),
            phase: Mutex::new(Phase::Idle),
        }
    }

    /// Harvester wired with the standard sources: the package-vulnerability
    /// query API and the issue search.
    pub fn with_default_sources(db: Db, config: &HarvesterConfig, github_token: Option<String>) -> Self {
        let sources: Vec<Box<dyn Source>> = vec![
            Box::new(OsvSource::new(config.packages.clone())),
            Box::new(GithubSource::new(config.keywords.clone(), github_token)),
        ];
        Self::new(db, sources)
    }

    /// Flag shared with the sources; cancelling stops the run after the
    /// in-flight target.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn phase(&self) -> Phase {
        *self.phase.lock()
    }

    pub fn store(&self) -> &Db {
        &self.db
    }

    /// Run one collection cycle: collect from every source, classify, save
    /// and report. At most one run at a time; a second caller gets
    /// `Error::AlreadyInProgress` instead of a queued or interleaved run.
    pub async fn run(&self) -> Result<RunStats, Error> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::AlreadyInProgress);
        }

        let stats = self.cycle().await;

        *self.phase.lock() = Phase::Idle;
        self.running.store(false, Ordering::SeqCst);
        Ok(stats)
    }

    async fn cycle(&self) -> RunStats {
        let start = Instant::now();
        let mut stats = RunStats::default();

        *self.phase.lock() = Phase::Collecting;
        let mut raw = Vec::new();
        for source in &self.sources {
            if self.cancel.is_cancelled() {
                log::info!("collection cancelled before source {}", source.name());
                break;
            }
            log::info!("collecting from {}", source.name());
            let fetched = source.fetch(&self.cancel).await;
            log::info!(
                "{}: {} records, {} failed targets",
                source.name(),
                fetched.records.len(),
                fetched.errors
            );
            stats.errors += fetched.errors;
            raw.extend(fetched.records);
        }
        stats.collected = raw.len();

        *self.phase.lock() = Phase::Saving;
        let mut seen = HashSet::new();
        for record in &raw {
            match Record::from_raw(record) {
                Record::Package(package) => {
                    let key = format!(
                        "{}|{}|{}|{}",
                        package.source, record.id, package.package_name, package.ecosystem
                    );
                    if !seen.insert(key) {
                        stats.duplicates += 1;
                        continue;
                    }
                    match self.db.insert_package(&package).await {
                        Ok(id) => {
                            log::debug!("saved {} as row {}", package.package_name, id);
                            stats.inserted += 1;
                        }
                        Err(e) if is_database_rejection(&e) => {
                            log::debug!("store rejected {}: {}", package.package_name, e);
                            stats.duplicates += 1;
                        }
                        Err(e) => {
                            log::warn!("failed to save {}: {}", package.package_name, e);
                            stats.errors += 1;
                        }
                    }
                }
                Record::Cve(cve) => match self.db.insert_cve(&cve).await {
                    Ok(true) => stats.inserted += 1,
                    Ok(false) => stats.duplicates += 1,
                    Err(e) => {
                        log::warn!("failed to save {}: {}", cve.cve_id, e);
                        stats.errors += 1;
                    }
                },
            }
        }

        *self.phase.lock() = Phase::Reporting;
        stats.elapsed_seconds = start.elapsed().as_secs_f64();
        log::info!(
            "collection finished in {:.2}s: {} collected, {} inserted, {} duplicates, {} errors",
            stats.elapsed_seconds,
            stats.collected,
            stats.inserted,
            stats.duplicates,
            stats.errors
        );
        stats
    }
}
