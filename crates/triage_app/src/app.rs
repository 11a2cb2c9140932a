use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use tokio::time::MissedTickBehavior;
use triage_core::{AppState, JobId, ReportCache};
use triage_engine::{Coordinator, JobService, StoreHandle};
use triage_logging::triage_info;

use crate::effects::EffectRunner;
use crate::render;

/// Bootstraps, then redraws the dashboard on every published change, at most once per
/// `tick`, until Ctrl-C.
pub async fn watch(
    service: Arc<dyn JobService>,
    job: Option<JobId>,
    tick: Duration,
) -> anyhow::Result<()> {
    let (store, effects) = StoreHandle::spawn(AppState::new());
    let runner = EffectRunner::new(Arc::clone(&service), store.clone()).spawn(effects);
    let coordinator = Coordinator::new(service, store.clone());

    coordinator
        .bootstrap()
        .await
        .context("failed to load jobs from the backend")?;
    if job.is_some() {
        store.select(job);
    }

    let mut changes = store.subscribe();
    let mut cache = ReportCache::new();
    let mut ticker = tokio::time::interval(tick.max(Duration::from_millis(10)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut pending = true;

    loop {
        tokio::select! {
            interrupted = &mut ctrl_c => {
                interrupted.context("failed to listen for Ctrl-C")?;
                break;
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                pending = true;
            }
            _ = ticker.tick() => {
                if pending {
                    pending = false;
                    let state = changes.borrow_and_update().clone();
                    draw(&state, &mut cache)?;
                }
            }
        }
    }

    coordinator.shutdown();
    runner.abort();
    triage_info!("watch stopped");
    Ok(())
}

fn draw(state: &AppState, cache: &mut ReportCache) -> anyhow::Result<()> {
    cache.retain_known(state);
    let mut lines = render::render_dashboard(&state.view());
    if let Some(detail) = state.detail(cache) {
        lines.extend(render::render_detail(&detail));
    }

    let mut stdout = std::io::stdout().lock();
    write!(stdout, "{}", render::clear_screen())?;
    for line in lines {
        writeln!(stdout, "{line}")?;
    }
    stdout.flush()?;
    Ok(())
}

pub async fn submit(service: &dyn JobService, files: &[PathBuf]) -> anyhow::Result<()> {
    for path in files {
        let raw = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        service
            .submit_job(Bytes::from(raw))
            .await
            .with_context(|| format!("failed to submit {}", path.display()))?;
        println!("submitted {}", path.display());
    }
    Ok(())
}

pub async fn print_email(service: &dyn JobService, job_id: JobId) -> anyhow::Result<()> {
    let text = service
        .fetch_raw_email(job_id)
        .await
        .with_context(|| format!("failed to fetch the email of job {job_id}"))?;
    println!("{text}");
    Ok(())
}
