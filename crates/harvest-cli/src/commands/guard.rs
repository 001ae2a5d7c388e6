use harvest_auth::{GuardDecision, RequiredRole};
use serde::Serialize;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::GuardArgs;
use crate::context::AppContext;
use crate::output::output;

#[derive(Serialize)]
struct GuardResponse<'a> {
    path: &'a str,
    require: RequiredRole,
    decision: GuardDecision,
}

/// Handle `harvest guard <path>`.
pub fn handle(args: &GuardArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let decision = ctx.session.guard(args.require, &args.path);
    tracing::debug!(path = %args.path, ?decision, "guard evaluated");
    output(
        &GuardResponse {
            path: &args.path,
            require: args.require,
            decision,
        },
        flags.format,
    )
}
