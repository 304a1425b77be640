use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;

use relforge_core::config::{self, PkgConfig};
use relforge_core::PkgId;
use relforge_git::LogFilter;
use relforge_release::{update_pkg_at, RootOutcome, UpdateReport};

use crate::error::{io_err, WatchError};

/// Rapid saves of the same path within this window collapse to one pass.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

struct PassJob {
    source: &'static str,
    respond_to: oneshot::Sender<Result<PassSummary, String>>,
}

/// Result of one watch-triggered update pass, for logging.
#[derive(Debug, Clone)]
pub struct PassSummary {
    pub pkg: String,
    pub source: String,
    pub roots: Vec<String>,
    pub bundled: usize,
    pub unchanged: usize,
    pub duration_ms: u128,
}

/// Start the watch daemon and block the current thread until it exits.
pub fn start_blocking(home: &Path, pkg: &PkgId) -> Result<(), WatchError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf(), pkg.clone()))
}

/// Run the watch daemon for one package.
///
/// Three triggers feed a single pass queue: filesystem events on the
/// package's include sources, the interval fallback tick, and nothing
/// else — passes are serialized so no two ever mutate the same root
/// concurrently. Configs are re-read on every pass, so edits to the
/// package's include list take effect without a restart.
pub async fn run(home: PathBuf, pkg: PkgId) -> Result<(), WatchError> {
    let main = config::load_main_at(&home)?;
    let cfg = config::load_pkg_at(&home, &pkg)?;

    // A zero period would panic tokio's timer.
    let period = Duration::from_secs(main.watch.interval_sec.max(1));
    let targets = watch_targets(&cfg);
    let release_area = fs::canonicalize(&cfg.pkg.root).unwrap_or_else(|_| cfg.pkg.root.clone());

    tracing::info!(
        pkg = %pkg,
        sources = targets.len(),
        interval_sec = period.as_secs(),
        "watch daemon starting",
    );

    let (pass_tx, pass_rx) = mpsc::channel::<PassJob>(64);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let watcher_handle = {
        let shutdown = shutdown_tx.clone();
        let pass_tx = pass_tx.clone();
        tokio::spawn(async move {
            let result = watcher_task(targets, release_area, pass_tx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let processor_handle = {
        let shutdown = shutdown_tx.clone();
        let home = home.clone();
        let pkg = pkg.clone();
        tokio::spawn(async move {
            let result = pass_processor_task(home, pkg, pass_rx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let ticker_handle = {
        let shutdown = shutdown_tx.clone();
        let pass_tx = pass_tx.clone();
        tokio::spawn(async move {
            let result = ticker_task(period, pass_tx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down watch daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(WatchError::Runtime(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (watcher_result, processor_result, ticker_result, signal_result) = tokio::join!(
        watcher_handle,
        processor_handle,
        ticker_handle,
        signal_handle
    );

    handle_join("watcher", watcher_result)?;
    handle_join("pass_processor", processor_result)?;
    handle_join("ticker", ticker_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

async fn watcher_task(
    targets: Vec<PathBuf>,
    release_area: PathBuf,
    pass_tx: mpsc::Sender<PassJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), WatchError> {
    if targets.is_empty() {
        tracing::warn!("no watchable sources; relying on the interval tick only");
        let _ = shutdown_rx.recv().await;
        return Ok(());
    }

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut _watcher: RecommendedWatcher = recommended_watcher(move |event| {
        let _ = event_tx.send(event);
    })?;

    let mut watched_dirs = HashSet::new();
    for target in &targets {
        register_source_tree(&mut _watcher, &mut watched_dirs, target)?;
    }

    let mut debounce = HashMap::<PathBuf, Instant>::new();

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                let event = match event {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(error = %err, "watcher event error");
                        continue;
                    }
                };
                if !is_relevant_event_kind(&event.kind) {
                    continue;
                }

                for path in event.paths {
                    // FSEvents is directory-based; register freshly created
                    // subdirectories as soon as something happens in them.
                    if let Some(watch_dir) = directory_to_watch(&path) {
                        if targets.iter().any(|t| watch_dir.starts_with(t)) && watch_dir.exists() {
                            register_source_tree(&mut _watcher, &mut watched_dirs, &watch_dir)?;
                        }
                    }

                    if !is_watched_path(&path, &targets, &release_area) {
                        continue;
                    }

                    if !should_process_event(&mut debounce, &path, Instant::now()) {
                        continue;
                    }

                    match enqueue_pass(&pass_tx, "watcher").await {
                        Ok(summary) => {
                            tracing::info!(
                                pkg = %summary.pkg,
                                bundled = summary.bundled,
                                unchanged = summary.unchanged,
                                duration_ms = summary.duration_ms,
                                "watcher-triggered update pass completed",
                            );
                        }
                        Err(err) => {
                            tracing::error!(error = %err, "watcher-triggered update pass failed");
                        }
                    }
                }
            }
        }
    }

    Ok(())
}

async fn pass_processor_task(
    home: PathBuf,
    pkg: PkgId,
    mut pass_rx: mpsc::Receiver<PassJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), WatchError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = pass_rx.recv() => {
                let Some(job) = maybe_job else { break };
                let started = Instant::now();

                let home_for_pass = home.clone();
                let pkg_for_pass = pkg.clone();
                let pass_result = tokio::task::spawn_blocking(move || {
                    run_pass_blocking(&home_for_pass, &pkg_for_pass)
                })
                .await
                .map_err(|err| WatchError::Runtime(format!("update pass join error: {err}")))?;

                let outcome = match pass_result {
                    Ok(report) => Ok(build_pass_summary(job.source, &report, started.elapsed())),
                    Err(err) => Err(err.to_string()),
                };

                let _ = job.respond_to.send(outcome);
            }
        }
    }

    Ok(())
}

async fn ticker_task(
    period: Duration,
    pass_tx: mpsc::Sender<PassJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), WatchError> {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick fires immediately: a catch-up pass for anything that
    // changed while the daemon was down.

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {
                match enqueue_pass(&pass_tx, "interval").await {
                    Ok(summary) => {
                        tracing::info!(
                            pkg = %summary.pkg,
                            bundled = summary.bundled,
                            unchanged = summary.unchanged,
                            duration_ms = summary.duration_ms,
                            "interval update pass completed",
                        );
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "interval update pass failed");
                    }
                }
            }
        }
    }

    Ok(())
}

async fn enqueue_pass(
    pass_tx: &mpsc::Sender<PassJob>,
    source: &'static str,
) -> Result<PassSummary, WatchError> {
    let (tx, rx) = oneshot::channel();
    pass_tx
        .send(PassJob {
            source,
            respond_to: tx,
        })
        .await
        .map_err(|_| WatchError::ChannelClosed("pass queue"))?;

    let outcome = rx
        .await
        .map_err(|_| WatchError::ChannelClosed("pass response"))?;
    outcome.map_err(WatchError::Runtime)
}

/// One full update pass: collect commits for the audit record, then
/// reconcile every root. Pass failures are reported to the trigger site
/// and logged there; they never stop the daemon.
fn run_pass_blocking(home: &Path, pkg: &PkgId) -> Result<UpdateReport, WatchError> {
    let main = config::load_main_at(home)?;
    let cfg = config::load_pkg_at(home, pkg)?;
    let filter = LogFilter::from_config(&main, &cfg);
    let commits = relforge_git::collect_commits(cfg.git_repo(), &filter)?;
    let report = update_pkg_at(home, pkg, commits, false)?;
    Ok(report)
}

fn build_pass_summary(
    source: &'static str,
    report: &UpdateReport,
    duration: Duration,
) -> PassSummary {
    let mut roots = Vec::new();
    let mut bundled = 0usize;
    let mut unchanged = 0usize;

    for outcome in &report.outcomes {
        roots.push(outcome.root().to_string());
        match outcome {
            RootOutcome::Bundled(_) | RootOutcome::Planned(_) => bundled += 1,
            RootOutcome::Unchanged { .. } => unchanged += 1,
        }
    }

    PassSummary {
        pkg: report.pkg.to_string(),
        source: source.to_string(),
        roots,
        bundled,
        unchanged,
        duration_ms: duration.as_millis(),
    }
}

/// Resolve the package's include entries to absolute, watchable paths.
/// Missing entries are logged and skipped; they may appear later, at
/// which point the interval tick still picks their content up.
fn watch_targets(cfg: &PkgConfig) -> Vec<PathBuf> {
    let mut targets = Vec::new();
    for entry in &cfg.include.sources {
        let resolved = if entry.is_absolute() {
            entry.clone()
        } else {
            cfg.pkg.dir.join(entry)
        };
        if !resolved.exists() {
            tracing::warn!(path = %resolved.display(), "watch source missing; not watched");
            continue;
        }
        // Canonicalize so event paths (which arrive as real paths, e.g.
        // /private/var/... on macOS) match the starts_with checks.
        let canonical = fs::canonicalize(&resolved).unwrap_or(resolved);
        targets.push(canonical);
    }
    targets
}

fn register_source_tree(
    watcher: &mut RecommendedWatcher,
    watched_dirs: &mut HashSet<PathBuf>,
    target: &Path,
) -> Result<(), WatchError> {
    if target.is_file() {
        if let Some(parent) = target.parent() {
            watch_dir(watcher, watched_dirs, parent)?;
        }
        return Ok(());
    }
    for dir in collect_dirs(target)? {
        watch_dir(watcher, watched_dirs, &dir)?;
    }
    Ok(())
}

fn watch_dir(
    watcher: &mut RecommendedWatcher,
    watched_dirs: &mut HashSet<PathBuf>,
    dir: &Path,
) -> Result<(), WatchError> {
    let canonical = match fs::canonicalize(dir) {
        Ok(path) => path,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(io_err(dir, err)),
    };
    if watched_dirs.insert(canonical.clone()) {
        watcher.watch(&canonical, RecursiveMode::NonRecursive)?;
        tracing::debug!(path = %canonical.display(), "watching source directory");
    }
    Ok(())
}

fn collect_dirs(root: &Path) -> Result<Vec<PathBuf>, WatchError> {
    let mut dirs = Vec::new();
    let mut queue = vec![root.to_path_buf()];
    while let Some(current) = queue.pop() {
        let entries = match fs::read_dir(&current) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => continue,
            Err(err) => return Err(io_err(&current, err)),
        };
        for entry in entries {
            let entry = entry.map_err(|e| io_err(&current, e))?;
            let ty = entry.file_type().map_err(|e| io_err(entry.path(), e))?;
            if ty.is_dir() {
                queue.push(entry.path());
            }
        }
        dirs.push(current);
    }
    dirs.sort();
    dirs.dedup();
    Ok(dirs)
}

fn is_relevant_event_kind(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_))
}

/// Bundles written under the release area must not re-trigger passes
/// when that area nests inside a watched source directory.
fn is_watched_path(path: &Path, targets: &[PathBuf], release_area: &Path) -> bool {
    !path.starts_with(release_area) && targets.iter().any(|t| path.starts_with(t))
}

fn directory_to_watch(path: &Path) -> Option<PathBuf> {
    if path.is_dir() {
        Some(path.to_path_buf())
    } else {
        path.parent().map(Path::to_path_buf)
    }
}

fn should_process_event(
    debounce: &mut HashMap<PathBuf, Instant>,
    path: &Path,
    now: Instant,
) -> bool {
    should_process_event_with_threshold(debounce, path, now, DEBOUNCE_WINDOW)
}

fn should_process_event_with_threshold(
    debounce: &mut HashMap<PathBuf, Instant>,
    path: &Path,
    now: Instant,
    threshold: Duration,
) -> bool {
    debounce.retain(|_, seen_at| now.duration_since(*seen_at) <= Duration::from_secs(30));
    match debounce.get(path) {
        Some(last_seen) if now.duration_since(*last_seen) < threshold => false,
        _ => {
            debounce.insert(path.to_path_buf(), now);
            true
        }
    }
}

fn handle_join(
    task: &str,
    result: Result<Result<(), WatchError>, tokio::task::JoinError>,
) -> Result<(), WatchError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(WatchError::Runtime(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
