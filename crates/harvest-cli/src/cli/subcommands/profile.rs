use clap::{Args, Subcommand};

/// Your own profile.
#[derive(Clone, Debug, Subcommand)]
pub enum ProfileCommands {
    /// Show the signed-in user.
    Show,
    /// Change display details. Roles are assigned by an administrator.
    Update(ProfileUpdateArgs),
}

#[derive(Clone, Debug, Args)]
pub struct ProfileUpdateArgs {
    #[arg(long)]
    pub full_name: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub avatar_url: Option<String>,
}
