use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};
use uuid::Uuid;

/// Sends onboarding invitations to pending customers.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Invite every customer whose status is still pending.
    #[arg(long)]
    all_pending: bool,

    /// Days until the invitation link expires.
    #[arg(long)]
    days: Option<i64>,

    /// Customers to invite.
    customers: Vec<Uuid>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();

    if !args.all_pending && args.customers.is_empty() {
        anyhow::bail!("name at least one customer id or pass --all-pending");
    }

    let summary = invite::run(args.all_pending, args.days, &args.customers).await?;
    println!("{summary}");

    if summary.failed > 0 {
        anyhow::bail!("{} invitation(s) failed", summary.failed);
    }

    Ok(())
}
