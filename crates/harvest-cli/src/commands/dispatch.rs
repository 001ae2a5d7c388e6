use crate::cli::GlobalFlags;
use crate::cli::root_commands::Commands;
use crate::commands;
use crate::context::AppContext;

/// Dispatch a parsed command to the corresponding handler module.
pub async fn dispatch(
    command: Commands,
    ctx: &mut AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    match command {
        Commands::Auth { action } => commands::auth::handle(&action, ctx, flags).await,
        Commands::Guard(args) => commands::guard::handle(&args, ctx, flags),
        Commands::Vendors { action } => commands::vendors::handle(&action, ctx, flags).await,
        Commands::Profile { action } => commands::profile::handle(&action, ctx, flags).await,
        Commands::Shop { action } => commands::shop::handle(&action, ctx, flags).await,
        Commands::Admin { action } => commands::admin::handle(&action, ctx, flags).await,
        Commands::Schema(_) => anyhow::bail!("schema is handled before a session is opened"),
    }
}
