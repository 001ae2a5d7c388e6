use std::io::BufRead;

use anyhow::{Context, bail};
use harvest_auth::{AuthError, RoleFlags, Route, SessionView};
use harvest_core::{EffectiveUser, Role};
use serde::Serialize;

use crate::cli::GlobalFlags;
use crate::cli::subcommands::AuthCommands;
use crate::cli::subcommands::auth::{AuthLoginArgs, AuthSignupArgs, PasswordArgs};
use crate::context::AppContext;
use crate::output::{last_route, notices, output};

#[derive(Serialize)]
struct SignupResponse {
    registered: bool,
    requires_confirmation: bool,
    user_id: Option<String>,
}

#[derive(Serialize)]
struct LoginResponse {
    authenticated: bool,
    route: Route,
    path: &'static str,
    user: Option<EffectiveUser>,
    role_flags: RoleFlags,
}

#[derive(Serialize)]
struct LogoutResponse {
    signed_out: bool,
    route: Option<Route>,
    #[serde(skip_serializing_if = "Option::is_none")]
    server_error: Option<String>,
}

#[derive(Serialize)]
struct StatusResponse {
    backend: &'static str,
    expires_at: Option<String>,
    #[serde(flatten)]
    view: SessionView,
}

/// Handle `harvest auth <subcommand>`.
pub async fn handle(
    action: &AuthCommands,
    ctx: &mut AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    match action {
        AuthCommands::Signup(args) => signup(args, ctx, flags).await,
        AuthCommands::Login(args) => login(args, ctx, flags).await,
        AuthCommands::Logout => logout(ctx, flags).await,
        AuthCommands::Status => output(&status(ctx), flags.format),
        AuthCommands::Refresh => {
            ctx.session.refresh().await?;
            notices(&ctx.take_events(), flags);
            output(&status(ctx), flags.format)
        }
    }
}

async fn signup(
    args: &AuthSignupArgs,
    ctx: &mut AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let password = password(&args.password)?;
    let role = args.vendor.then_some(Role::Vendor);
    let result = ctx.session.sign_up(&args.email, &password, role).await;
    notices(&ctx.take_events(), flags);
    let outcome = result?;

    output(
        &SignupResponse {
            registered: true,
            requires_confirmation: outcome.requires_confirmation,
            user_id: outcome.identity.map(|identity| identity.id),
        },
        flags.format,
    )
}

async fn login(
    args: &AuthLoginArgs,
    ctx: &mut AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let password = password(&args.password)?;
    let result = ctx.session.sign_in(&args.email, &password).await;
    notices(&ctx.take_events(), flags);
    let route = result?;

    output(
        &LoginResponse {
            authenticated: true,
            route,
            path: route.path(),
            user: ctx.session.effective_user(),
            role_flags: ctx.session.role_flags(),
        },
        flags.format,
    )
}

async fn logout(ctx: &mut AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    if ctx.session.effective_user().is_none() {
        return Err(AuthError::NotAuthenticated.into());
    }
    let result = ctx.session.sign_out().await;
    let events = ctx.take_events();
    notices(&events, flags);

    // The local session is gone either way; a server failure is only reported.
    output(
        &LogoutResponse {
            signed_out: true,
            route: last_route(&events),
            server_error: result.err().map(|error| error.to_string()),
        },
        flags.format,
    )
}

fn password(args: &PasswordArgs) -> anyhow::Result<String> {
    resolve_password(
        args.password.as_deref(),
        args.password_stdin,
        std::io::stdin().lock(),
    )
}

/// Pick the password from stdin when asked, else from `--password` or
/// `HARVEST_PASSWORD` (clap fills `explicit` from either).
fn resolve_password(
    explicit: Option<&str>,
    from_stdin: bool,
    mut reader: impl BufRead,
) -> anyhow::Result<String> {
    if from_stdin {
        let mut line = String::new();
        reader
            .read_line(&mut line)
            .context("failed to read password from stdin")?;
        let password = line.trim_end_matches(['\r', '\n']);
        if password.is_empty() {
            bail!("no password on stdin");
        }
        return Ok(password.to_string());
    }
    match explicit {
        Some(password) => Ok(password.to_string()),
        None => bail!("a password is required: use --password-stdin or set HARVEST_PASSWORD"),
    }
}

fn status(ctx: &AppContext) -> StatusResponse {
    StatusResponse {
        backend: ctx.session.backend().name(),
        expires_at: ctx
            .session
            .current_session()
            .map(|session| session.expires_at.to_rfc3339()),
        view: ctx.session.view(),
    }
}
