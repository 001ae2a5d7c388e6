use clap::{Args, Subcommand};

/// Admin commands. All but `grant` require an admin session.
#[derive(Clone, Debug, Subcommand)]
pub enum AdminCommands {
    /// Applications awaiting review.
    Pending,
    /// Verify a vendor.
    Approve(AdminReviewArgs),
    /// Reject a vendor.
    Reject(AdminReviewArgs),
    /// Give an account the admin role (local backend only).
    Grant(AdminGrantArgs),
}

#[derive(Clone, Debug, Args)]
pub struct AdminReviewArgs {
    pub vendor_id: String,
}

#[derive(Clone, Debug, Args)]
pub struct AdminGrantArgs {
    pub email: String,
}
