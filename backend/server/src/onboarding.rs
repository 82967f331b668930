//! Onboarding invitations: a single-use, expiring token that lets a pending customer attach a
//! freshly created login to their existing record.
use chrono::{DateTime, Duration, Utc};
use platform::{Filter, Platform, Query};
use serde::Serialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{Customer, CustomerStatus, OnboardingToken, Table},
    state::State,
    store::{self, Journal},
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub email: String,
    pub expires_at: DateTime<Utc>,
    pub delivered: bool,
}

pub fn check(token: &OnboardingToken, now: DateTime<Utc>) -> Result<(), AppError> {
    if token.used {
        return Err(AppError::bad_request("Token already used"));
    }

    if now > token.expires_at {
        return Err(AppError::bad_request("Token expired"));
    }

    Ok(())
}

pub async fn find(platform: &dyn Platform, token: &str) -> Result<OnboardingToken, AppError> {
    store::fetch_one(platform, Query::new().eq("token", token))
        .await?
        .ok_or_else(|| AppError::not_found("Invalid token"))
}

/// Validates a token and, with `mark_as_used`, consumes it and activates its customer.
///
/// Consuming is a conditional update on `used = false`, so two concurrent redemptions cannot
/// both succeed. If activating the customer fails, the token is put back.
pub async fn redeem(
    platform: &dyn Platform,
    token: &str,
    mark_as_used: bool,
    user_id: Option<Uuid>,
) -> Result<OnboardingToken, AppError> {
    let token = find(platform, token).await?;
    let now = Utc::now();

    check(&token, now)?;

    if !mark_as_used {
        return Ok(token);
    }

    let marked = platform
        .update(
            OnboardingToken::NAME,
            &[Filter::eq("id", token.id), Filter::eq("used", false)],
            json!({ "used": true, "used_at": now }),
        )
        .await?;

    if marked.is_empty() {
        return Err(AppError::bad_request("Token already used"));
    }

    let mut journal = Journal::new(platform);
    journal.updated(&token)?;

    let mut patch = json!({ "status": CustomerStatus::Active, "updated_at": now });
    if let Some(user_id) = user_id {
        patch["user_id"] = json!(user_id);
    }

    match store::update_by_id::<Customer>(platform, token.customer_id, patch).await {
        Ok(Some(customer)) => {
            info!("Customer {} completed onboarding", customer.id);
            Ok(token)
        }
        Ok(None) => {
            journal.unwind().await;
            Err(AppError::not_found("Customer not found"))
        }
        Err(e) => {
            journal.unwind().await;
            Err(e)
        }
    }
}

pub async fn issue(state: &State, customer: &Customer) -> Result<Invitation, AppError> {
    if customer.status != CustomerStatus::Pending {
        return Err(AppError::bad_request("Customer has already been onboarded"));
    }

    let days = state.config.invite_ttl_days;
    let expires_at = Utc::now() + Duration::days(days);
    let token = Uuid::new_v4().simple().to_string();

    let row: OnboardingToken = store::insert_one(
        state.platform.as_ref(),
        json!({
            "token": token,
            "email": customer.email,
            "customer_id": customer.id,
            "expires_at": expires_at,
            "used": false,
        }),
    )
    .await?;

    let link = format!(
        "{}/onboarding?token={}",
        state.config.site_url.trim_end_matches('/'),
        row.token
    );
    let html = format!(
        "<p>Hallo {},</p>\
         <p>über den folgenden Link können Sie Ihr Kundenkonto einrichten:</p>\
         <p><a href=\"{link}\">{link}</a></p>\
         <p>Der Link ist {days} Tage gültig.</p>",
        customer.first_name
    );

    let delivered = state
        .mailer
        .send(&customer.email, "Ihr Zugang zum Kundenportal", &html)
        .await?;

    Ok(Invitation {
        email: row.email,
        expires_at: row.expires_at,
        delivered,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(used: bool, expires_at: DateTime<Utc>) -> OnboardingToken {
        OnboardingToken {
            id: Uuid::new_v4(),
            token: "abc".to_string(),
            email: "anna@example.com".to_string(),
            customer_id: Uuid::new_v4(),
            expires_at,
            used,
            used_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_check() {
        let now = Utc::now();

        assert!(check(&token(false, now + Duration::hours(1)), now).is_ok());
        assert!(check(&token(false, now), now).is_ok());

        let used = check(&token(true, now + Duration::hours(1)), now).unwrap_err();
        assert_eq!(used.to_string(), "Token already used");

        let expired = check(&token(false, now - Duration::seconds(1)), now).unwrap_err();
        assert_eq!(expired.to_string(), "Token expired");
    }
}
