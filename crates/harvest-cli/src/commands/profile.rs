use harvest_auth::AuthError;
use harvest_core::ProfilePatch;

use crate::cli::GlobalFlags;
use crate::cli::subcommands::ProfileCommands;
use crate::cli::subcommands::profile::ProfileUpdateArgs;
use crate::context::AppContext;
use crate::output::{notices, output};

/// Handle `harvest profile <subcommand>`.
pub async fn handle(
    action: &ProfileCommands,
    ctx: &mut AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    match action {
        ProfileCommands::Show => {
            let user = ctx
                .session
                .effective_user()
                .ok_or(AuthError::NotAuthenticated)?;
            output(&user, flags.format)
        }
        ProfileCommands::Update(args) => {
            let result = ctx.session.update_profile(&patch(args)).await;
            notices(&ctx.take_events(), flags);
            result?;
            output(&ctx.session.effective_user(), flags.format)
        }
    }
}

fn patch(args: &ProfileUpdateArgs) -> ProfilePatch {
    ProfilePatch {
        full_name: args.full_name.clone(),
        avatar_url: args.avatar_url.clone(),
        phone_number: args.phone.clone(),
        ..ProfilePatch::default()
    }
}
