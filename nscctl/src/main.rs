//! Admin command-line client for the NSC server.
//!
//! ## Environment Variables
//!
//! - `NSC_API_URL`: server base URL (default: http://127.0.0.1:8080)
//! - `NSC_TOKEN`: admin access token printed by `nscctl login`
//! - `NSC_PASSWORD`: password for `login` when not passed on the command line

mod modules {
    pub mod admin;
    pub mod auth;
    pub mod client;
}

use anyhow::Result;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::modules::client::ApiClient;

#[derive(Parser, Debug)]
#[command(version, about = "NSC platform admin CLI")]
struct Cli {
    /// Server base URL
    #[arg(long, env = "NSC_API_URL", default_value = "http://127.0.0.1:8080", global = true)]
    url: String,

    /// Access token (see `login`)
    #[arg(long, env = "NSC_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in and print the token to export as NSC_TOKEN
    Login {
        email: String,
        #[arg(long, env = "NSC_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Platform totals and review queues
    Stats,

    /// Run ROI distribution now
    RoiRun,

    /// List payment requests
    Payments {
        /// Status filter, or `all`
        #[arg(long, default_value = "pending")]
        status: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Approve a payment request and activate its bot or package
    ApprovePayment { id: Uuid },

    /// Reject a payment request
    RejectPayment {
        id: Uuid,
        #[arg(long)]
        note: Option<String>,
    },

    /// List withdrawal requests
    Withdrawals {
        /// Status filter, or `all`
        #[arg(long, default_value = "pending")]
        status: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Approve a pending withdrawal
    ApproveWithdrawal { id: Uuid },

    /// Reject a withdrawal and refund the user
    RejectWithdrawal {
        id: Uuid,
        #[arg(long)]
        note: Option<String>,
    },

    /// Mark an approved withdrawal as paid on-chain
    CompleteWithdrawal { id: Uuid, tx_hash: String },

    /// List KYC submissions
    Kyc {
        /// Status filter, or `all`
        #[arg(long, default_value = "pending")]
        status: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Approve a KYC submission
    ApproveKyc { id: Uuid },

    /// Reject a KYC submission
    RejectKyc {
        id: Uuid,
        #[arg(long)]
        note: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut _guard = None;

    if std::env::var("SERVER_LOG").unwrap_or_default() == "true" {
        let file_appender = tracing_appender::rolling::RollingFileAppender::new(
            tracing_appender::rolling::Rotation::DAILY,
            "./logs",
            "nscctl.log"
        );
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::fmt()
            .with_writer(tracing_subscriber::fmt::writer::MakeWriterExt::and(non_blocking, std::io::stderr))
            .with_target(false)
            .with_env_filter("info")
            .with_timer(tracing_subscriber::fmt::time::ChronoLocal::new("%Y-%m-%dT%H:%M:%S".to_string()))
            .init();

        _guard = Some(guard);
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_env_filter("info")
            .with_timer(tracing_subscriber::fmt::time::ChronoLocal::new("%Y-%m-%dT%H:%M:%S".to_string()))
            .init();
    }

    let cli = Cli::parse();
    let client = ApiClient::new(&cli.url, cli.token)?;

    use modules::admin;
    match cli.cmd {
        Commands::Login { email, password } => modules::auth::login(&client, &email, &password).await,
        Commands::Stats => admin::stats(&client).await,
        Commands::RoiRun => admin::run_roi(&client).await,
        Commands::Payments { status, page, limit } => admin::payments(&client, status, page, limit).await,
        Commands::ApprovePayment { id } => admin::approve_payment(&client, id).await,
        Commands::RejectPayment { id, note } => admin::reject_payment(&client, id, note).await,
        Commands::Withdrawals { status, page, limit } => admin::withdrawals(&client, status, page, limit).await,
        Commands::ApproveWithdrawal { id } => admin::approve_withdrawal(&client, id).await,
        Commands::RejectWithdrawal { id, note } => admin::reject_withdrawal(&client, id, note).await,
        Commands::CompleteWithdrawal { id, tx_hash } => admin::complete_withdrawal(&client, id, tx_hash).await,
        Commands::Kyc { status, page, limit } => admin::kyc(&client, status, page, limit).await,
        Commands::ApproveKyc { id } => admin::approve_kyc(&client, id).await,
        Commands::RejectKyc { id, note } => admin::reject_kyc(&client, id, note).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_approve_payment() {
        let id = Uuid::new_v4();
        let cli = Cli::try_parse_from(["nscctl", "--url", "http://api", "approve-payment", &id.to_string()]).unwrap();
        assert_eq!(cli.url, "http://api");
        assert!(matches!(cli.cmd, Commands::ApprovePayment { id: parsed } if parsed == id));
    }

    #[test]
    fn test_list_defaults_to_pending() {
        let cli = Cli::try_parse_from(["nscctl", "withdrawals", "--page", "3"]).unwrap();
        match cli.cmd {
            Commands::Withdrawals { status, page, limit } => {
                assert_eq!(status.as_deref(), Some("pending"));
                assert_eq!(page, 3);
                assert_eq!(limit, 20);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_status_all_lists_everything() {
        let cli = Cli::try_parse_from(["nscctl", "payments", "--status", "all"]).unwrap();
        match cli.cmd {
            Commands::Payments { status, .. } => {
                assert_eq!(status.as_deref(), Some(modules::admin::ALL_STATUSES));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_invalid_id_is_rejected() {
        assert!(Cli::try_parse_from(["nscctl", "approve-kyc", "not-a-uuid"]).is_err());
    }
}
