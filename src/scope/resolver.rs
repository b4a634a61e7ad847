use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::auth::CredentialProvider;
use crate::errors::{with_retry, KostyError, RetryConfig};
use crate::models::Account;

/// Safety valve against a listing API that never stops returning tokens.
const MAX_PAGES: usize = 10_000;

/// Expands single-account or organization scope into an ordered list of
/// account ids to scan.
pub struct ScopeResolver {
    provider: Arc<CredentialProvider>,
    excluded: HashSet<String>,
    retry: RetryConfig,
}

impl ScopeResolver {
    pub fn new(provider: Arc<CredentialProvider>) -> Self {
        Self {
            provider,
            excluded: HashSet::new(),
            retry: RetryConfig::default(),
        }
    }

    /// Accounts removed from organization scans.
    pub fn with_excluded_accounts<I, S>(mut self, accounts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded = accounts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub async fn resolve(
        &self,
        organization: bool,
        admin_account: Option<&str>,
        role_name: &str,
    ) -> Result<Vec<String>, KostyError> {
        if !organization {
            let account_id = self.provider.caller_account_id().await.map_err(scope_error)?;
            debug!(account = %account_id, "Resolved single-account scope");
            return Ok(vec![account_id]);
        }

        let session = match admin_account {
            Some(admin) => {
                info!(admin_account = %admin, "Listing organization through admin account");
                self.provider
                    .acquire(Some(admin), role_name, "kosty-org-admin")
                    .await
                    .map_err(scope_error)?
            }
            None => self.provider.current_session(),
        };

        let accounts = self.list_all(&session).await?;
        let listed = accounts.len();
        let active: Vec<String> = accounts
            .into_iter()
            .filter(Account::is_active)
            .map(|a| a.id)
            .collect();

        let before_exclusion = active.len();
        let scoped: Vec<String> = active
            .into_iter()
            .filter(|id| !self.excluded.contains(id))
            .collect();
        if scoped.len() < before_exclusion {
            info!(
                excluded = before_exclusion - scoped.len(),
                "Removed accounts excluded by configuration"
            );
        }

        info!(listed, active = before_exclusion, scanned = scoped.len(), "Resolved organization scope");
        Ok(scoped)
    }

    async fn list_all(&self, session: &crate::cloud::Session) -> Result<Vec<Account>, KostyError> {
        let identity = self.provider.identity();
        let mut accounts = Vec::new();
        let mut next_token: Option<String> = None;

        for page_number in 0..MAX_PAGES {
            let page = with_retry("ListAccounts", &self.retry, || {
                let identity = identity.clone();
                let token = next_token.clone();
                async move { identity.list_accounts_page(session, token).await }
            })
            .await
            .map_err(scope_error)?;

            debug!(page = page_number, accounts = page.accounts.len(), "Fetched account page");
            accounts.extend(page.accounts);

            match page.next_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => return Ok(accounts),
            }
        }

        Err(KostyError::Scope(format!(
            "Organization listing did not finish after {} pages",
            MAX_PAGES
        )))
    }
}

/// Everything that goes wrong while resolving scope aborts the request.
fn scope_error(err: KostyError) -> KostyError {
    match err {
        KostyError::NotInOrganization(_) | KostyError::Scope(_) => err,
        other => KostyError::Scope(other.to_string()),
    }
}
