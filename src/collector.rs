use std::fmt;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::config::{ModuleSource, Settings};
use crate::error::{ExtractionError, PersistenceError};
use crate::extract::extract_lessons;
use crate::fetch::PageFetcher;
use crate::normalize::normalize;
use crate::store::{LessonRecord, SaveCounts, Store};

/// What one module contributed to a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleOutcome {
    Collected { slots: usize, accepted: usize },
    FetchFailed(String),
    NoSchedule(ExtractionError),
}

impl fmt::Display for ModuleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleOutcome::Collected { slots, accepted } => {
                write!(f, "{} lessons from {} slots", accepted, slots)
            }
            ModuleOutcome::FetchFailed(reason) => write!(f, "skipped, {}", reason),
            ModuleOutcome::NoSchedule(e) => write!(f, "skipped, {}", e),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CollectionReport {
    pub modules: Vec<(String, ModuleOutcome)>,
    pub accepted: usize,
    pub dropped: usize,
}

pub struct Batch {
    pub records: Vec<LessonRecord>,
    pub report: CollectionReport,
}

/// Pulls every configured module through fetch, extract and normalize, one
/// module at a time.
pub struct Collector<F> {
    fetcher: F,
    modules: Vec<ModuleSource>,
    delay: Duration,
}

impl<F: PageFetcher> Collector<F> {
    pub fn new(fetcher: F, settings: &Settings) -> Self {
        Collector {
            fetcher,
            modules: settings.modules.clone(),
            delay: settings.request_delay(),
        }
    }

    /// Gather accepted lessons from all modules. A module that cannot be
    /// fetched or has no schedule table contributes nothing; the rest go on.
    pub async fn collect(&self) -> Batch {
        let pb = ProgressBar::new(self.modules.len() as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("=> "));
        }

        let mut records = Vec::new();
        let mut report = CollectionReport::default();

        for (i, module) in self.modules.iter().enumerate() {
            if i > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let module_id = i as i64 + 1;
            pb.set_message(module.name.clone());
            info!("Processing module: {}", module.name);

            let outcome = match self.fetcher.fetch(&module.url).await {
                Err(e) => {
                    warn!("Skipping module {}: {}", module.name, e);
                    ModuleOutcome::FetchFailed(e.to_string())
                }
                Ok(body) => match extract_lessons(&body, module_id) {
                    Err(e) => {
                        warn!("Skipping module {}: {}", module.name, e);
                        ModuleOutcome::NoSchedule(e)
                    }
                    Ok(raw) => {
                        let normalized: Vec<Option<LessonRecord>> =
                            raw.par_iter().map(normalize).collect();
                        let before = records.len();
                        records.extend(normalized.into_iter().flatten());
                        let accepted = records.len() - before;
                        report.accepted += accepted;
                        report.dropped += raw.len() - accepted;
                        info!(
                            "Module {}: {} lessons accepted of {} slots",
                            module.name,
                            accepted,
                            raw.len()
                        );
                        ModuleOutcome::Collected {
                            slots: raw.len(),
                            accepted,
                        }
                    }
                },
            };
            report.modules.push((module.name.clone(), outcome));
            pb.inc(1);
        }

        pb.finish_and_clear();
        info!(
            "Collected {} lessons ({} dropped without a city)",
            report.accepted, report.dropped
        );
        Batch { records, report }
    }

    /// Collect, then hand the whole batch to the store in one go.
    pub async fn run(
        &self,
        store: &Store,
    ) -> Result<(SaveCounts, CollectionReport), PersistenceError> {
        let batch = self.collect().await;
        if batch.records.is_empty() {
            warn!("No data collected");
            return Ok((SaveCounts::default(), batch.report));
        }
        let counts = store.save_lessons(&batch.records)?;
        Ok((counts, batch.report))
    }
}
