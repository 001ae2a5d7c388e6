use clap::{Args, Subcommand};

/// Authentication commands.
#[derive(Clone, Debug, Subcommand)]
pub enum AuthCommands {
    /// Create an account.
    Signup(AuthSignupArgs),
    /// Sign in with email and password.
    Login(AuthLoginArgs),
    /// Sign out and clear the stored session.
    Logout,
    /// Show the current user, readiness, and role flags.
    Status,
    /// Refresh the session and reload the profile.
    Refresh,
}

/// Where the password comes from. `--password-stdin` wins over the others.
#[derive(Clone, Debug, Default, Args)]
pub struct PasswordArgs {
    /// Password. Visible in the process list; prefer the env var or stdin.
    #[arg(long, env = "HARVEST_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
    /// Read the password from the first line of stdin.
    #[arg(long)]
    pub password_stdin: bool,
}

#[derive(Clone, Debug, Args)]
pub struct AuthLoginArgs {
    pub email: String,
    #[command(flatten)]
    pub password: PasswordArgs,
}

#[derive(Clone, Debug, Args)]
pub struct AuthSignupArgs {
    pub email: String,
    #[command(flatten)]
    pub password: PasswordArgs,
    /// Register intending to sell (starts as a pending vendor).
    #[arg(long)]
    pub vendor: bool,
}
