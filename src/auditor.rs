//! Audit pipeline and the concurrent worker pool that drives it.

use crate::config::Config;
use crate::parser::PnpmLockParser;
use crate::registry::{Prober, RegistryProber};
use crate::report::{AuditReport, ConsoleOutput, ReportEntry};
use crate::tree::{audit_items, save_dependency_tree, tree_output_path};
use crate::types::{AuditOutcome, AuditWorkItem, Result};
use futures::future::join_all;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, trace, warn};

/// Worker count used when none (or an unusable one) is given.
pub const DEFAULT_WORKERS: usize = 5;

/// Turn the raw worker-count argument into a pool size.
///
/// Absent, non-numeric and non-positive values all mean [`DEFAULT_WORKERS`].
pub fn resolve_worker_count(raw: Option<&str>) -> usize {
    let Some(raw) = raw else {
        return DEFAULT_WORKERS;
    };

    match raw.trim().parse::<i64>() {
        Ok(n) if n > 0 => usize::try_from(n).unwrap_or(DEFAULT_WORKERS),
        _ => {
            warn!(
                "Invalid number of workers '{}', using default of {}",
                raw, DEFAULT_WORKERS
            );
            DEFAULT_WORKERS
        }
    }
}

/// Runs one audit: parse, snapshot, enumerate, probe.
pub struct Auditor {
    lock_file: PathBuf,
    workers: usize,
    parser: PnpmLockParser,
    prober: Arc<RegistryProber>,
    console: ConsoleOutput,
}

impl Auditor {
    /// Create an auditor from the command-line configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let prober = RegistryProber::new(
            &config.registry_url,
            config.access_token(),
            &config.http_config(),
        )?;

        Ok(Self {
            lock_file: config.lock_file.clone(),
            workers: resolve_worker_count(config.workers.as_deref()),
            parser: PnpmLockParser::new(),
            prober: Arc::new(prober),
            console: ConsoleOutput::new(config.verbose, config.json),
        })
    }

    /// Run the audit. Fails before any probe if the lock file cannot be
    /// parsed or the tree snapshot cannot be written.
    pub async fn run(&self) -> Result<AuditReport> {
        let start_time = Instant::now();
        self.console
            .print_run_header(&self.lock_file, self.prober.registry_url(), self.workers);

        self.console.print_step(1, "Parsing pnpm-lock.yaml");
        let tree = self.parser.parse_file(&self.lock_file)?;
        self.console
            .print_progress(&format!("Parsed {} packages", tree.len()));

        self.console.print_step(2, "Saving dependency tree");
        let tree_path = tree_output_path(&self.lock_file);
        save_dependency_tree(&tree, &tree_path)?;
        self.console.print_info(&format!(
            "PNPM dependency tree saved to {}",
            tree_path.display()
        ));

        self.console.print_step(3, "Preparing for audit");
        let items: Vec<AuditWorkItem> = audit_items(&tree).collect();
        self.console
            .print_info(&format!("Found {} dependencies to audit", items.len()));

        self.console.print_step(4, "Auditing dependencies (concurrent)");
        let total = items.len();
        let entries =
            audit_concurrently(self.prober.clone(), items, self.workers, &self.console).await;

        let report = AuditReport {
            lock_file: self.lock_file.clone(),
            registry_url: self.prober.registry_url().to_string(),
            tree_path,
            total,
            entries,
            duration_secs: start_time.elapsed().as_secs_f64(),
        };

        self.console.print_report(&report);
        self.console.print_summary(&report);

        Ok(report)
    }
}

/// Probe every item with a pool of `workers` tasks and return the outcomes
/// in work-list order.
///
/// Completion order is arbitrary. Each outcome is placed back at the list
/// index of the first item with the same name and version; positions that
/// never received an outcome are left out.
pub async fn audit_concurrently<P: Prober>(
    prober: Arc<P>,
    items: Vec<AuditWorkItem>,
    workers: usize,
    console: &ConsoleOutput,
) -> Vec<ReportEntry> {
    let total = items.len();
    let workers = if workers == 0 {
        warn!("Worker count must be positive, using default of {}", DEFAULT_WORKERS);
        DEFAULT_WORKERS
    } else {
        workers
    };

    let mut positions: HashMap<(String, String), usize> = HashMap::with_capacity(total);
    for (index, item) in items.iter().enumerate() {
        positions
            .entry((item.name.clone(), item.version.clone()))
            .or_insert(index);
    }

    // The queue holds the whole list, so filling it never waits on a worker.
    let (job_tx, job_rx) = mpsc::channel::<AuditWorkItem>(total.max(1));
    for item in items {
        if let Err(e) = job_tx.send(item).await {
            warn!("Failed to queue {}@{}", e.0.name, e.0.version);
        }
    }
    drop(job_tx);

    let job_rx = Arc::new(Mutex::new(job_rx));
    let (result_tx, mut result_rx) = mpsc::channel::<AuditOutcome>(total.max(1));

    // At most one worker per queued item.
    let spawned = workers.min(total.max(1));
    trace!("Spawning {} of {} requested workers", spawned, workers);

    let handles: Vec<_> = (0..spawned)
        .map(|id| {
            tokio::spawn(worker(
                id,
                prober.clone(),
                job_rx.clone(),
                result_tx.clone(),
            ))
        })
        .collect();

    // Holds the last sender; dropping it after every worker has exited
    // closes the result stream.
    let supervisor = tokio::spawn(async move {
        for (id, joined) in join_all(handles).await.into_iter().enumerate() {
            if let Err(e) = joined {
                warn!("Worker {} stopped abnormally: {}", id, e);
            }
        }
        drop(result_tx);
    });

    let pb = console.create_progress_bar(total as u64);
    let mut slots: Vec<Option<AuditOutcome>> = vec![None; total];
    let mut completed = 0usize;

    while let Some(outcome) = result_rx.recv().await {
        completed += 1;
        console.advance_progress(pb.as_ref(), completed, total);

        let key = (outcome.name.clone(), outcome.version.clone());
        match positions.get(&key) {
            Some(&index) if slots[index].is_none() => slots[index] = Some(outcome),
            Some(_) => debug!("Duplicate outcome for {}@{}", key.0, key.1),
            None => warn!("Outcome for unknown package {}@{}", key.0, key.1),
        }
    }

    if let Some(pb) = pb {
        pb.finish();
    }

    if let Err(e) = supervisor.await {
        warn!("Audit supervisor failed: {}", e);
    }

    trace!("Collected {} of {} outcomes", completed, total);

    slots
        .into_iter()
        .enumerate()
        .filter_map(|(position, slot)| match slot {
            Some(outcome) => Some(ReportEntry { position, outcome }),
            None => {
                warn!("No outcome recorded for position {}", position + 1);
                None
            }
        })
        .collect()
}

/// Take items off the shared queue until it is empty.
async fn worker<P: Prober>(
    id: usize,
    prober: Arc<P>,
    jobs: Arc<Mutex<mpsc::Receiver<AuditWorkItem>>>,
    results: mpsc::Sender<AuditOutcome>,
) {
    loop {
        let next = jobs.lock().await.recv().await;
        let Some(item) = next else {
            break;
        };

        let outcome = prober.probe(&item).await;
        if results.send(outcome).await.is_err() {
            break;
        }
    }
    trace!("Worker {} finished", id);
}
