//! [`ContinuousIntegrationService`] over locally executed checks.

use std::path::PathBuf;

use async_trait::async_trait;
use futures::future::join_all;
use reviewgate_core::{
    ChangeRequestId, Check, CheckStatus, ContinuousIntegrationService, GateError, GateResult,
};
use tracing::info;

use crate::check::CheckConfig;
use crate::runner::CheckRunner;

/// Runs every configured check against a checked-out workspace.
///
/// Checks run concurrently and to completion inside one `get_checks` call,
/// so the result is always terminal. Every call runs against whatever the
/// workspace holds at that moment; nothing is cached between calls.
pub struct LocalCiService {
    workdir: PathBuf,
    checks: Vec<CheckConfig>,
}

impl LocalCiService {
    pub fn new(workdir: impl Into<PathBuf>, checks: Vec<CheckConfig>) -> Self {
        Self {
            workdir: workdir.into(),
            checks,
        }
    }

    pub fn checks(&self) -> &[CheckConfig] {
        &self.checks
    }

    /// Run all checks once.
    pub async fn run_all(&self) -> anyhow::Result<Vec<Check>> {
        let runs = self.checks.iter().map(|config| async move {
            if !config.enabled {
                return Ok(Check::new(config.name.clone(), CheckStatus::Skipped));
            }
            info!(check = %config.name, "running check");
            CheckRunner::execute(config, &self.workdir)
                .await
                .map(|outcome| outcome.into_check())
        });
        join_all(runs).await.into_iter().collect()
    }
}

#[async_trait]
impl ContinuousIntegrationService for LocalCiService {
    async fn get_checks(&self, id: &ChangeRequestId) -> GateResult<Vec<Check>> {
        info!(change_request = %id, checks = self.checks.len(), "running local checks");
        self.run_all()
            .await
            .map_err(|e| GateError::collaborator("local-ci", format!("{e:#}")))
    }
}
