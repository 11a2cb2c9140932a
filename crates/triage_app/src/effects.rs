use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use triage_core::{Effect, JobId, Msg};
use triage_engine::{JobService, StoreHandle};
use triage_logging::{triage_info, triage_warn};

/// Runs the effects requested by `update` and feeds their outcome back to the store.
pub struct EffectRunner {
    service: Arc<dyn JobService>,
    store: StoreHandle,
}

impl EffectRunner {
    pub fn new(service: Arc<dyn JobService>, store: StoreHandle) -> Self {
        Self { service, store }
    }

    pub fn spawn(self, mut effects: mpsc::UnboundedReceiver<Effect>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(effect) = effects.recv().await {
                match effect {
                    Effect::LoadEmail { job_id } => self.load_email(job_id),
                }
            }
        })
    }

    fn load_email(&self, job_id: JobId) {
        let service = Arc::clone(&self.service);
        let store = self.store.clone();
        tokio::spawn(async move {
            match service.fetch_raw_email(job_id).await {
                Ok(text) => {
                    triage_info!("LoadEmail job_id={} len={}", job_id, text.len());
                    store.dispatch(Msg::EmailLoaded { job_id, text });
                }
                Err(err) => triage_warn!("LoadEmail job_id={} failed: {}", job_id, err),
            }
        });
    }
}
