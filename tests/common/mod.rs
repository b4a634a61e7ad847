#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use kosty::auth::CredentialProvider;
use kosty::cloud::{AssumeRoleInput, Credentials, IdentityClient, Session};
use kosty::errors::{KostyError, RetryConfig};
use kosty::models::{Account, AccountPage, AccountStatus, Finding, FindingKind, Severity};
use kosty::scope::ScopeResolver;
use kosty::services::{AuditService, CheckDescriptor, OperationContext};

pub const CALLER: &str = "999999999999";

/// In-memory organization: paged membership listing and role assumption.
#[derive(Default)]
pub struct MockIdentity {
    pages: Vec<Vec<Account>>,
    not_in_org: bool,
    deny_accounts: HashSet<String>,
    pub list_calls: AtomicUsize,
    pub assume_calls: AtomicUsize,
    pub assumed_arns: Mutex<Vec<String>>,
}

impl MockIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, accounts: &[(&str, AccountStatus)]) -> Self {
        self.pages.push(
            accounts
                .iter()
                .map(|(id, status)| Account::new(*id, status.clone()))
                .collect(),
        );
        self
    }

    /// One page of ACTIVE accounts.
    pub fn with_active(self, ids: &[&str]) -> Self {
        let accounts: Vec<(&str, AccountStatus)> = ids.iter().map(|id| (*id, AccountStatus::Active)).collect();
        self.with_page(&accounts)
    }

    pub fn not_in_organization(mut self) -> Self {
        self.not_in_org = true;
        self
    }

    pub fn deny(mut self, account_id: &str) -> Self {
        self.deny_accounts.insert(account_id.to_string());
        self
    }

    pub fn assume_count(&self) -> usize {
        self.assume_calls.load(Ordering::SeqCst)
    }

    pub fn list_count(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityClient for MockIdentity {
    async fn caller_account_id(&self, session: &Session) -> Result<String, KostyError> {
        Ok(session.account_id().unwrap_or(CALLER).to_string())
    }

    async fn assume_role(&self, input: &AssumeRoleInput) -> Result<Credentials, KostyError> {
        self.assume_calls.fetch_add(1, Ordering::SeqCst);
        self.assumed_arns.lock().unwrap().push(input.role_arn.clone());
        let account = input.role_arn.split(':').nth(4).unwrap_or_default();
        if self.deny_accounts.contains(account) {
            return Err(KostyError::Auth(format!("AccessDenied: not authorized to assume {}", input.role_arn)));
        }
        Ok(Credentials {
            access_key_id: format!("ASIA{}", account),
            secret_access_key: "secret".into(),
            session_token: "token".into(),
            expiration: None,
        })
    }

    async fn list_accounts_page(
        &self,
        _session: &Session,
        next_token: Option<String>,
    ) -> Result<AccountPage, KostyError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.not_in_org {
            return Err(KostyError::NotInOrganization(CALLER.into()));
        }
        let index = match next_token.as_deref() {
            None => 0,
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| KostyError::Internal(format!("bad page token {}", token)))?,
        };
        let accounts = self.pages.get(index).cloned().unwrap_or_default();
        let next_token = (index + 1 < self.pages.len()).then(|| (index + 1).to_string());
        Ok(AccountPage { accounts, next_token })
    }
}

pub static MOCK_CHECKS: &[CheckDescriptor] = &[
    CheckDescriptor {
        name: "check_things",
        kind: FindingKind::Cost,
        description: "Things that cost money",
        accepts_worker_hint: true,
    },
    CheckDescriptor {
        name: "check_plain",
        kind: FindingKind::Security,
        description: "Plain exposure check",
        accepts_worker_hint: false,
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub account_id: String,
    pub region: String,
    pub check: String,
    pub worker_hint: Option<usize>,
}

/// Audit service that records every invocation and can fail or hang per account.
#[derive(Default)]
pub struct MockService {
    name: Option<&'static str>,
    delay: Duration,
    fail_accounts: HashSet<String>,
    hang_accounts: HashSet<String>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub invocations: Mutex<Vec<Invocation>>,
}

impl MockService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry name; `mock` unless set.
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, account_id: &str) -> Self {
        self.fail_accounts.insert(account_id.to_string());
        self
    }

    pub fn hanging(mut self, account_id: &str) -> Self {
        self.hang_accounts.insert(account_id.to_string());
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

pub fn thing_arn(account_id: &str, region: &str, check: &str) -> String {
    format!("arn:aws:mock:{}:{}:thing/{}", region, account_id, check)
}

#[async_trait]
impl AuditService for MockService {
    fn name(&self) -> &'static str {
        self.name.unwrap_or("mock")
    }

    fn description(&self) -> &'static str {
        "In-memory audit service"
    }

    fn checks(&self) -> &'static [CheckDescriptor] {
        MOCK_CHECKS
    }

    async fn run_check(&self, check: &CheckDescriptor, ctx: &OperationContext) -> Result<Vec<Finding>, KostyError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.invocations.lock().unwrap().push(Invocation {
            account_id: ctx.account_id.clone(),
            region: ctx.region.clone(),
            check: check.name.to_string(),
            worker_hint: ctx.worker_hint,
        });

        if self.hang_accounts.contains(&ctx.account_id) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        } else if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_accounts.contains(&ctx.account_id) {
            return Err(KostyError::Operation(format!("{}: simulated failure", check.name)));
        }
        Ok(vec![Finding::new("Mock", check.kind, format!("thing-{}", ctx.region), check.description)
            .with_severity(Severity::Medium)
            .with_arn(thing_arn(&ctx.account_id, &ctx.region, check.name))])
    }
}

/// Provider and resolver over `identity`, without retry back-off.
pub fn wire(identity: Arc<MockIdentity>) -> (Arc<CredentialProvider>, Arc<ScopeResolver>) {
    let provider = Arc::new(CredentialProvider::new(identity).with_retry(RetryConfig::none()));
    let scope = Arc::new(ScopeResolver::new(provider.clone()).with_retry(RetryConfig::none()));
    (provider, scope)
}
