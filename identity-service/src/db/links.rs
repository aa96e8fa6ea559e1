//! Provider link repository.
//!
//! One repository instance per CRM provider, each bound to its own table at
//! construction time (the table name comes from the [`CrmProvider`] enum, so
//! no string-keyed lookups happen on the request path). Challenge storage and
//! the verified transition are single-row updates keyed by account id, which
//! makes the account the serialization point for concurrent requests and the
//! `mark_verified` transition atomic.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::crm::CrmProvider;
use crate::models::{Account, OtpChallenge, ProviderLink};

/// True when the error is a PostgreSQL unique-constraint violation
/// (SQLSTATE 23505), the expected signal of a lost create race.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("23505"),
        _ => false,
    }
}

#[derive(Clone)]
pub struct LinkRepository {
    pool: PgPool,
    table: &'static str,
}

impl LinkRepository {
    pub fn new(pool: PgPool, provider: CrmProvider) -> Self {
        Self {
            pool,
            table: provider.link_table(),
        }
    }

    /// Find the live link for an external user id.
    pub async fn find_by_external_id(
        &self,
        external_user_id: &str,
    ) -> Result<Option<ProviderLink>, sqlx::Error> {
        sqlx::query_as::<_, ProviderLink>(&format!(
            "SELECT * FROM {} WHERE external_user_id = $1 AND deleted_utc IS NULL",
            self.table
        ))
        .bind(external_user_id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn find_by_account_id(
        &self,
        account_id: Uuid,
    ) -> Result<Option<ProviderLink>, sqlx::Error> {
        sqlx::query_as::<_, ProviderLink>(&format!(
            "SELECT * FROM {} WHERE account_id = $1 AND deleted_utc IS NULL",
            self.table
        ))
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Overwrite the raw profile snapshot after a repeat login.
    pub async fn refresh_profile(
        &self,
        link_id: Uuid,
        profile: &serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(&format!(
            "UPDATE {} SET profile = $2, updated_utc = NOW() WHERE link_id = $1",
            self.table
        ))
        .bind(link_id)
        .bind(profile)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Create the account and its provider link in one transaction.
    ///
    /// A unique violation on either insert aborts the whole transaction; the
    /// resolver re-reads the link and recovers.
    pub async fn create_with_account(
        &self,
        account: &Account,
        external_user_id: &str,
        profile: &serde_json::Value,
    ) -> Result<ProviderLink, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO accounts (account_id, email, display_name, created_utc)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(account.account_id)
        .bind(&account.email)
        .bind(&account.display_name)
        .bind(account.created_utc)
        .execute(&mut *tx)
        .await?;

        let link = sqlx::query_as::<_, ProviderLink>(&format!(
            r#"
            INSERT INTO {} (link_id, external_user_id, account_id, profile,
                            verification_status, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, 'none', NOW(), NOW())
            RETURNING *
            "#,
            self.table
        ))
        .bind(Uuid::new_v4())
        .bind(external_user_id)
        .bind(account.account_id)
        .bind(profile)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(link)
    }

    /// Store a fresh OTP challenge, overwriting any outstanding one.
    ///
    /// Returns false when no live link exists for the account.
    pub async fn store_challenge(
        &self,
        account_id: Uuid,
        phone: &str,
        code: &str,
        expiry_utc: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(&format!(
            r#"
            UPDATE {} SET otp_code = $2, otp_phone = $3, otp_expiry_utc = $4,
                          verification_status = 'pending', updated_utc = NOW()
            WHERE account_id = $1 AND deleted_utc IS NULL
            "#,
            self.table
        ))
        .bind(account_id)
        .bind(code)
        .bind(phone)
        .bind(expiry_utc)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Read back the outstanding challenge for an account, if any.
    pub async fn get_challenge(
        &self,
        account_id: Uuid,
    ) -> Result<Option<OtpChallenge>, sqlx::Error> {
        let link = self.find_by_account_id(account_id).await?;
        Ok(link.and_then(|l| l.challenge()))
    }

    /// Consume the challenge: clear code/phone/expiry and record the verified
    /// phone in a single statement so the transition cannot be observed
    /// half-applied. Conditional on the stored code still being the one that
    /// was validated, so a concurrent resend cannot be wiped by a stale
    /// consume.
    pub async fn mark_verified(
        &self,
        account_id: Uuid,
        phone: &str,
        code: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(&format!(
            r#"
            UPDATE {} SET otp_code = NULL, otp_phone = NULL, otp_expiry_utc = NULL,
                          verification_status = 'active', verified_phone = $2,
                          updated_utc = NOW()
            WHERE account_id = $1 AND otp_code = $3 AND deleted_utc IS NULL
            "#,
            self.table
        ))
        .bind(account_id)
        .bind(phone)
        .bind(code)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Attach a pending invitation to the account's link.
    pub async fn set_invitation(
        &self,
        account_id: Uuid,
        token_hash: &str,
        phone: &str,
        expiry_utc: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(&format!(
            r#"
            UPDATE {} SET invite_token_hash = $2, invite_phone = $3,
                          invite_expiry_utc = $4, invite_state = 'pending',
                          updated_utc = NOW()
            WHERE account_id = $1 AND deleted_utc IS NULL
            "#,
            self.table
        ))
        .bind(account_id)
        .bind(token_hash)
        .bind(phone)
        .bind(expiry_utc)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn find_by_invite_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<ProviderLink>, sqlx::Error> {
        sqlx::query_as::<_, ProviderLink>(&format!(
            "SELECT * FROM {} WHERE invite_token_hash = $1 AND deleted_utc IS NULL",
            self.table
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
    }

    /// Accept an invitation: clear the token, mark accepted and store the
    /// fresh OTP challenge in one statement.
    pub async fn accept_invitation(
        &self,
        link_id: Uuid,
        code: &str,
        phone: &str,
        expiry_utc: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(&format!(
            r#"
            UPDATE {} SET invite_token_hash = NULL, invite_expiry_utc = NULL,
                          invite_state = 'accepted',
                          otp_code = $2, otp_phone = $3, otp_expiry_utc = $4,
                          verification_status = 'pending', updated_utc = NOW()
            WHERE link_id = $1
            "#,
            self.table
        ))
        .bind(link_id)
        .bind(code)
        .bind(phone)
        .bind(expiry_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// The typed repository for every supported provider, built once at startup.
#[derive(Clone)]
pub struct LinkRepositories {
    hubspot: LinkRepository,
    pipedrive: LinkRepository,
    zoho: LinkRepository,
}

impl LinkRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            hubspot: LinkRepository::new(pool.clone(), CrmProvider::HubSpot),
            pipedrive: LinkRepository::new(pool.clone(), CrmProvider::Pipedrive),
            zoho: LinkRepository::new(pool, CrmProvider::Zoho),
        }
    }

    pub fn for_provider(&self, provider: CrmProvider) -> &LinkRepository {
        match provider {
            CrmProvider::HubSpot => &self.hubspot,
            CrmProvider::Pipedrive => &self.pipedrive,
            CrmProvider::Zoho => &self.zoho,
        }
    }
}
