//! # Invite
//!
//! Batch counterpart of `POST /api/admin/customers/{id}/invite`: issues onboarding tokens and
//! mails the links, one customer at a time, using the same config as the server.
use std::fmt;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use platform::Query;
use server::{
    config::Config,
    models::{Customer, CustomerStatus},
    onboarding,
    state::State,
    store,
};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Default, PartialEq)]
pub struct Summary {
    pub issued: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Issued: {}, skipped: {}, failed: {}",
            self.issued, self.skipped, self.failed
        )
    }
}

pub async fn run(all_pending: bool, days: Option<i64>, ids: &[Uuid]) -> Result<Summary> {
    let mut config = Config::load().context("loading config")?;
    if let Some(days) = days {
        anyhow::ensure!(days > 0, "--days must be positive");
        config.invite_ttl_days = days;
    }

    let state = State::new(config).await.context("connecting to platform")?;

    invite_all(&state, all_pending, ids).await
}

async fn targets(state: &State, all_pending: bool, ids: &[Uuid]) -> Result<Vec<Option<Customer>>> {
    let platform = state.platform.as_ref();
    let mut targets = Vec::new();

    if all_pending {
        let pending: Vec<Customer> = store::fetch_all(
            platform,
            Query::new()
                .eq("status", "pending")
                .order("created_at", true),
        )
        .await?;
        targets.extend(pending.into_iter().map(Some));
    }

    for &id in ids {
        if targets.iter().flatten().any(|c: &Customer| c.id == id) {
            continue;
        }

        let customer = store::find_by_id::<Customer>(platform, id).await?;
        if customer.is_none() {
            warn!("Customer {id} not found");
        }
        targets.push(customer);
    }

    Ok(targets)
}

/// Invites every target; a missing or already onboarded customer is skipped.
pub async fn invite_all(state: &State, all_pending: bool, ids: &[Uuid]) -> Result<Summary> {
    let targets = targets(state, all_pending, ids).await?;
    let mut summary = Summary::default();

    let pb = ProgressBar::new(targets.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )?
        .progress_chars("=> "),
    );

    for customer in targets {
        let Some(customer) = customer else {
            summary.skipped += 1;
            pb.inc(1);
            continue;
        };

        pb.set_message(customer.email.clone());

        if customer.status != CustomerStatus::Pending {
            info!("Customer {} already onboarded, skipping", customer.id);
            summary.skipped += 1;
            pb.inc(1);
            continue;
        }

        match onboarding::issue(state, &customer).await {
            Ok(invitation) => {
                info!(
                    "Invited {} (expires {}, delivered: {})",
                    invitation.email, invitation.expires_at, invitation.delivered
                );
                summary.issued += 1;
            }
            Err(e) => {
                warn!("Inviting customer {} failed: {e}", customer.id);
                summary.failed += 1;
            }
        }

        pb.inc(1);
    }

    pb.finish_with_message("Done");
    Ok(summary)
}
