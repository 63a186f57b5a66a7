//! Administrative command surface: exemptions and grace windows.
//!
//! Rank rules:
//! - Global scope: owner only.
//! - Space scope: owner or an administrator of that space.
//! - Listing a space's exemptions: anyone.
//!
//! Unlike policy decisions, authorization fails closed: if the platform
//! cannot confirm the invoker's rank the command is refused.

use crate::db::ExemptionRecord;
use crate::delay::DelayConfig;
use crate::error::{CommandError, CommandResult};
use crate::ids::{Identity, Scope, SpaceId};
use crate::metrics;
use crate::policy::PolicyEvaluator;
use crate::transport::Transport;
use std::sync::Arc;
use tracing::{info, warn};

pub struct AdminService {
    evaluator: Arc<PolicyEvaluator>,
    delays: Arc<DelayConfig>,
    transport: Arc<dyn Transport>,
    log_space: Option<SpaceId>,
}

impl AdminService {
    pub fn new(
        evaluator: Arc<PolicyEvaluator>,
        delays: Arc<DelayConfig>,
        transport: Arc<dyn Transport>,
        log_space: Option<SpaceId>,
    ) -> Self {
        Self {
            evaluator,
            delays,
            transport,
            log_space,
        }
    }

    /// Exempt `identity` in `scope`. Acknowledged only after the write commits.
    pub async fn grant_exemption(
        &self,
        invoker: Identity,
        scope: Scope,
        identity: Identity,
    ) -> CommandResult<()> {
        let result = async {
            self.authorize(invoker, scope).await?;
            self.evaluator.grant(scope, identity, invoker).await?;
            Ok(())
        }
        .await;
        self.finish("grant", &result);
        result?;

        info!(%invoker, %scope, %identity, "Exemption granted");
        self.audit(format!("{} exempted {} ({})", invoker, identity, scope))
            .await;
        Ok(())
    }

    /// Remove `identity`'s exemption in `scope`. Returns whether one existed.
    pub async fn revoke_exemption(
        &self,
        invoker: Identity,
        scope: Scope,
        identity: Identity,
    ) -> CommandResult<bool> {
        let result = async {
            self.authorize(invoker, scope).await?;
            Ok(self.evaluator.revoke(scope, identity).await?)
        }
        .await;
        self.finish("revoke", &result);
        let existed = result?;

        info!(%invoker, %scope, %identity, existed, "Exemption revoked");
        if existed {
            self.audit(format!("{} revoked exemption of {} ({})", invoker, identity, scope))
                .await;
        }
        Ok(existed)
    }

    /// List exemptions. The global list is owner-only.
    pub async fn list_exemptions(
        &self,
        invoker: Identity,
        scope: Scope,
    ) -> CommandResult<Vec<ExemptionRecord>> {
        let result = async {
            if scope == Scope::Global && invoker != self.evaluator.owner() {
                return Err(CommandError::PermissionDenied);
            }
            Ok(self.evaluator.list(scope).await?)
        }
        .await;
        self.finish("list", &result);
        result
    }

    /// Set the grace window for `space`. Returns the stored value.
    pub async fn set_delay(
        &self,
        invoker: Identity,
        space: SpaceId,
        seconds: i64,
    ) -> CommandResult<u64> {
        let result = async {
            self.authorize(invoker, Scope::Space(space)).await?;
            self.delays.set(space, seconds, invoker).await
        }
        .await;
        self.finish("set_delay", &result);
        let secs = result?;

        info!(%invoker, %space, delay_secs = secs, "Grace window updated");
        self.audit(format!("{} set grace window of {} to {}s", invoker, space, secs))
            .await;
        Ok(secs)
    }

    /// Return `space` to the default grace window.
    pub async fn reset_delay(&self, invoker: Identity, space: SpaceId) -> CommandResult<bool> {
        let result = async {
            self.authorize(invoker, Scope::Space(space)).await?;
            self.delays.reset(space).await
        }
        .await;
        self.finish("reset_delay", &result);
        let existed = result?;

        info!(%invoker, %space, existed, "Grace window reset");
        Ok(existed)
    }

    /// Current grace window for `space` in seconds.
    pub async fn get_delay(&self, space: SpaceId) -> u64 {
        self.delays.get(space).await
    }

    async fn authorize(&self, invoker: Identity, scope: Scope) -> CommandResult<()> {
        if invoker == self.evaluator.owner() {
            return Ok(());
        }
        match scope {
            Scope::Global => Err(CommandError::PermissionDenied),
            Scope::Space(space) => {
                if self.transport.is_administrator(space, invoker).await? {
                    Ok(())
                } else {
                    Err(CommandError::PermissionDenied)
                }
            }
        }
    }

    fn finish<T>(&self, command: &str, result: &CommandResult<T>) {
        if let Err(e) = result {
            metrics::record_command_error(command, e.error_code());
            warn!(command, error = %e, "Administrative command failed");
        }
    }

    /// Best-effort notice to the log space.
    async fn audit(&self, text: String) {
        let Some(space) = self.log_space else {
            return;
        };
        if let Err(e) = self.transport.notify(space, &text).await {
            warn!(%space, error = %e, "Failed to deliver audit notice");
        }
    }
}
