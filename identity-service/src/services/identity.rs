//! Identity resolver - the only place identity ambiguity is decided.
//!
//! Reconciles an external CRM profile with an internal account: a known link
//! gets its profile snapshot refreshed; an unknown one gets a fresh account
//! and link created transactionally. The create path is safe against
//! duplicate OAuth callbacks: a unique violation means someone else just
//! created the link, so we re-read instead of failing.

use std::sync::Arc;

use super::error::ServiceError;
use super::session::{SessionHandle, SessionIssuer};
use crate::crm::{CrmProvider, RawProfile};
use crate::db::{AccountRepository, LinkRepositories, is_unique_violation};
use crate::models::Account;

#[derive(Clone)]
pub struct IdentityService {
    accounts: AccountRepository,
    links: Arc<LinkRepositories>,
    sessions: Arc<dyn SessionIssuer>,
}

impl IdentityService {
    pub fn new(
        accounts: AccountRepository,
        links: Arc<LinkRepositories>,
        sessions: Arc<dyn SessionIssuer>,
    ) -> Self {
        Self {
            accounts,
            links,
            sessions,
        }
    }

    /// Resolve a raw provider profile to an account and issue the single-use
    /// session artifact. Idempotent: the same profile always resolves to the
    /// same account, and retries never create duplicates.
    pub async fn resolve(
        &self,
        provider: CrmProvider,
        profile: RawProfile,
    ) -> Result<SessionHandle, ServiceError> {
        let repo = self.links.for_provider(provider);

        let account = match repo.find_by_external_id(&profile.external_id).await? {
            Some(link) => {
                // Idempotent refresh: latest snapshot wins, account binding
                // stays untouched.
                repo.refresh_profile(link.link_id, &profile.snapshot).await?;

                self.accounts
                    .find_by_id(link.account_id)
                    .await?
                    .ok_or(ServiceError::UnknownAccount)?
            }
            None => self.create_account_and_link(provider, &profile).await?,
        };

        tracing::info!(
            provider = %provider,
            account_id = %account.account_id,
            "External identity resolved"
        );

        self.sessions
            .issue_magic_link(account.account_id, &account.email)
    }

    async fn create_account_and_link(
        &self,
        provider: CrmProvider,
        profile: &RawProfile,
    ) -> Result<Account, ServiceError> {
        let email = profile
            .email
            .clone()
            .unwrap_or_else(|| provider.placeholder_email(&profile.external_id));
        let account = Account::new(email, profile.name.clone());

        let repo = self.links.for_provider(provider);

        match repo
            .create_with_account(&account, &profile.external_id, &profile.snapshot)
            .await
        {
            Ok(_) => Ok(account),
            Err(err) if is_unique_violation(&err) => {
                // Lost the create race to a concurrent callback: the link
                // should exist now, so adopt it. Any other uniqueness clash
                // (an email already owned by a different account) leaves the
                // link absent and is fatal.
                match repo.find_by_external_id(&profile.external_id).await? {
                    Some(link) => {
                        tracing::debug!(
                            provider = %provider,
                            external_id = %profile.external_id,
                            "Create race lost; adopting concurrently created link"
                        );
                        self.accounts
                            .find_by_id(link.account_id)
                            .await?
                            .ok_or(ServiceError::UnknownAccount)
                    }
                    None => {
                        // Not the link race: the profile email already belongs
                        // to a different account, and accounts are never
                        // merged across providers.
                        if self.accounts.find_by_email(&account.email).await?.is_some() {
                            return Err(ServiceError::AccountCreationFailed(format!(
                                "email {} already belongs to another account",
                                account.email
                            )));
                        }
                        Err(ServiceError::AccountCreationFailed(err.to_string()))
                    }
                }
            }
            Err(err) => Err(ServiceError::Persistence(err)),
        }
    }
}
