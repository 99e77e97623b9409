use crate::{PauseRefreshJob, PolicyRefreshJob};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct JobRunner {
    policy_refresh: Option<PolicyRefreshJob>,
    pause_refresh: Option<PauseRefreshJob>,
    shutdown: Option<CancellationToken>,
}

impl JobRunner {
    pub fn new() -> Self {
        Self { policy_refresh: None, pause_refresh: None, shutdown: None }
    }

    pub fn with_policy_refresh(mut self, job: PolicyRefreshJob) -> Self {
        self.policy_refresh = Some(job);
        self
    }

    pub fn with_pause_refresh(mut self, job: PauseRefreshJob) -> Self {
        self.pause_refresh = Some(job);
        self
    }

    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    pub async fn start(self) {
        info!("Starting background job runner");

        if let Some(job) = self.policy_refresh {
            let job = match &self.shutdown {
                Some(token) => job.with_cancellation(token.clone()),
                None => job,
            };
            Arc::new(job).start().await;
        }

        if let Some(job) = self.pause_refresh {
            let job = match &self.shutdown {
                Some(token) => job.with_cancellation(token.clone()),
                None => job,
            };
            Arc::new(job).start().await;
        }

        info!("All background jobs started");
    }
}

impl Default for JobRunner {
    fn default() -> Self {
        Self::new()
    }
}
