use anyhow::Context;
use harvest_auth::LocalBackend;
use harvest_config::{BackendMode, HarvestConfig};
use harvest_core::Role;
use harvest_market::ReviewDecision;

use crate::cli::GlobalFlags;
use crate::cli::subcommands::AdminCommands;
use crate::cli::subcommands::admin::AdminGrantArgs;
use crate::context::AppContext;
use crate::output::{notices, output};

/// Handle `harvest admin <subcommand>`.
pub async fn handle(
    action: &AdminCommands,
    ctx: &mut AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let market = ctx.marketplace()?;
    let (decision, vendor_id) = match action {
        AdminCommands::Pending => {
            return output(&market.pending_applications().await?, flags.format);
        }
        AdminCommands::Approve(args) => (ReviewDecision::Approve, &args.vendor_id),
        AdminCommands::Reject(args) => (ReviewDecision::Reject, &args.vendor_id),
        AdminCommands::Grant(args) => return grant(args, flags, &ctx.config),
    };

    let result = market.review(vendor_id, decision).await;
    notices(&ctx.take_events(), flags);
    output(&result?, flags.format)
}

/// Promote an account to admin in the local account file.
///
/// Hosted deployments assign roles in the backend's own dashboard.
pub fn grant(
    args: &AdminGrantArgs,
    flags: &GlobalFlags,
    config: &HarvestConfig,
) -> anyhow::Result<()> {
    if config.backend.resolved_mode() == BackendMode::Remote {
        anyhow::bail!(
            "admin grant only works with the local backend; assign roles in the hosted dashboard"
        );
    }
    let dir = config.storage.data_dir()?;
    let backend = LocalBackend::open(&dir, config.auth.refresh_buffer_secs)
        .with_context(|| format!("failed to open local accounts in {}", dir.display()))?;
    let profile = backend.assign_role(&args.email, Role::Admin)?;
    tracing::info!(user = %profile.id, "admin role granted");
    output(&profile, flags.format)
}
