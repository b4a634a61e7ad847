use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::auth::CredentialProvider;
use crate::cloud::Session;
use crate::config::ArnMatcher;
use crate::errors::KostyError;
use crate::models::{AccountFailure, AccountOutcome, AuditRequest, FailureKind, Finding, ScanResult};
use crate::pricing::CostCalculator;
use crate::progress::Progress;
use crate::scope::ScopeResolver;
use crate::services::{AuditService, Operation, OperationContext};
use crate::utils::truncation::truncate_error;

const SESSION_NAME_HINT: &str = "kosty";

/// Runs one named operation of one service across accounts and regions.
///
/// Only scope resolution and unknown operations fail the whole run; every
/// other problem becomes the failure entry of the account it happened in.
pub struct AuditExecutor {
    service: Arc<dyn AuditService>,
    provider: Arc<CredentialProvider>,
    scope: Arc<ScopeResolver>,
    calculator: Option<Arc<CostCalculator>>,
    arn_exclusions: Arc<ArnMatcher>,
    show_progress: bool,
    cancel_token: CancellationToken,
}

impl AuditExecutor {
    pub fn new(service: Arc<dyn AuditService>, provider: Arc<CredentialProvider>, scope: Arc<ScopeResolver>) -> Self {
        Self {
            service,
            provider,
            scope,
            calculator: None,
            arn_exclusions: Arc::new(ArnMatcher::default()),
            show_progress: false,
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn with_cost_calculator(mut self, calculator: Arc<CostCalculator>) -> Self {
        self.calculator = Some(calculator);
        self
    }

    /// Findings whose ARN matches are dropped before they reach the result.
    pub fn with_arn_exclusions(mut self, matcher: ArnMatcher) -> Self {
        self.arn_exclusions = Arc::new(matcher);
        self
    }

    pub fn with_progress(mut self, visible: bool) -> Self {
        self.show_progress = visible;
        self
    }

    /// Replace the executor's cancel token with an external one (e.g. Ctrl-C
    /// handling in the CLI).
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn service(&self) -> &Arc<dyn AuditService> {
        &self.service
    }

    /// Resolve scope, then run the operation for every resolved account.
    pub async fn run(&self, request: &AuditRequest) -> Result<ScanResult, KostyError> {
        // Unknown operations are rejected before any remote call.
        Operation::lookup(self.service.as_ref(), &request.operation)?;

        let resolving = Progress::spinner("Resolving accounts", self.show_progress);
        let accounts = match self
            .scope
            .resolve(request.organization, request.admin_account.as_deref(), &request.role_name)
            .await
        {
            Ok(accounts) => accounts,
            Err(e) => {
                resolving.abandon("Scope resolution failed");
                return Err(e);
            }
        };
        resolving.finish_and_clear();

        if request.organization {
            info!(accounts = accounts.len(), "Found accounts in organization");
        }
        self.run_for_accounts(request, &accounts).await
    }

    /// Run the operation for an already resolved account list. The result
    /// has exactly one entry per distinct account, in input order.
    pub async fn run_for_accounts(&self, request: &AuditRequest, accounts: &[String]) -> Result<ScanResult, KostyError> {
        let operation = Operation::lookup(self.service.as_ref(), &request.operation)?;
        let worker_hint = operation
            .accepts_worker_hint(self.service.as_ref())
            .then(|| request.worker_hint());

        info!(
            service = self.service.name(),
            operation = operation.name(),
            accounts = accounts.len(),
            regions = ?request.regions,
            max_workers = request.max_workers,
            "Starting audit"
        );

        let label = format!("{} {}", self.service.name(), operation.name());
        let progress = if request.organization {
            Progress::bar(accounts.len() as u64, format!("Scanning {} across accounts", label), self.show_progress)
        } else {
            Progress::spinner(format!("Running {}", label), self.show_progress)
        };

        let request = Arc::new(request.clone());
        let semaphore = Arc::new(Semaphore::new(request.max_workers.max(1)));
        let mut pending = FuturesUnordered::new();

        for account_id in accounts {
            let unit = AccountUnit {
                account_id: account_id.clone(),
                service: self.service.clone(),
                provider: self.provider.clone(),
                operation,
                worker_hint,
                request: request.clone(),
                calculator: self.calculator.clone(),
                arn_exclusions: self.arn_exclusions.clone(),
            };
            let semaphore = semaphore.clone();
            let cancel = self.cancel_token.clone();

            let handle = tokio::spawn(async move {
                let _permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return AccountUnit::cancelled(),
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(e) => {
                            return AccountOutcome::Failed(AccountFailure::new(FailureKind::Operation, e.to_string()))
                        }
                    },
                };

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => AccountUnit::cancelled(),
                    outcome = unit.run() => outcome,
                }
            });

            let account_id = account_id.clone();
            pending.push(async move { (account_id, handle.await) });
        }

        let mut settled: HashMap<String, AccountOutcome> = HashMap::with_capacity(accounts.len());
        while let Some((account_id, joined)) = pending.next().await {
            let outcome = joined.unwrap_or_else(|e| {
                error!(account = %account_id, error = %e, "Account task panicked");
                AccountOutcome::Failed(AccountFailure::new(
                    FailureKind::Operation,
                    format!("audit task aborted: {}", e),
                ))
            });
            progress.inc(1);
            settled.insert(account_id, outcome);
        }

        let mut result = ScanResult::new();
        for account_id in accounts {
            if let Some(outcome) = settled.remove(account_id) {
                result.insert(account_id.clone(), outcome);
            }
        }

        let failed = result.failed_accounts().count();
        progress.finish(format!(
            "{}: {} issues, {} of {} accounts failed",
            label,
            result.total_findings(),
            failed,
            result.len()
        ));
        info!(
            operation = operation.name(),
            issues = result.total_findings(),
            failed_accounts = failed,
            "Audit complete"
        );
        Ok(result)
    }
}

/// Everything one account's work needs, owned so it can move into a task.
struct AccountUnit {
    account_id: String,
    service: Arc<dyn AuditService>,
    provider: Arc<CredentialProvider>,
    operation: Operation,
    worker_hint: Option<usize>,
    request: Arc<AuditRequest>,
    calculator: Option<Arc<CostCalculator>>,
    arn_exclusions: Arc<ArnMatcher>,
}

impl AccountUnit {
    fn cancelled() -> AccountOutcome {
        AccountOutcome::Failed(AccountFailure::new(FailureKind::Cancelled, "scan cancelled"))
    }

    async fn run(self) -> AccountOutcome {
        match self.collect().await {
            Ok(findings) => {
                info!(account = %self.account_id, findings = findings.len(), "Account audit complete");
                AccountOutcome::Findings(findings)
            }
            Err(failure) => {
                warn!(account = %self.account_id, kind = failure.kind.as_str(), error = %failure.message, "Account audit failed");
                AccountOutcome::Failed(failure)
            }
        }
    }

    async fn session(&self) -> Result<Session, AccountFailure> {
        if !self.request.organization {
            return Ok(self.provider.current_session());
        }

        let limit = self.request.timeouts.credentials;
        let acquire = self
            .provider
            .acquire(Some(&self.account_id), &self.request.role_name, SESSION_NAME_HINT);
        match timeout(limit, acquire).await {
            Ok(Ok(session)) => Ok(session),
            Ok(Err(e)) => Err(to_failure(e, FailureKind::Auth)),
            Err(_) => Err(AccountFailure::new(
                FailureKind::Timeout,
                format!("credential acquisition timed out after {}s", limit.as_secs()),
            )),
        }
    }

    async fn collect(&self) -> Result<Vec<Finding>, AccountFailure> {
        let session = self.session().await?;
        let limit = self.request.timeouts.operation;
        let mut findings = Vec::new();

        // Regions run one after another inside a unit; the worker hint is
        // the only parallelism handed further down.
        for region in &self.request.regions {
            let ctx = OperationContext::new(session.clone(), self.account_id.clone(), region.clone())
                .with_worker_hint(self.worker_hint)
                .with_params(self.request.params.clone());

            debug!(account = %self.account_id, region = %region, operation = self.operation.name(), "Invoking operation");
            match timeout(limit, self.operation.invoke(self.service.as_ref(), &ctx)).await {
                Ok(Ok(found)) => findings.extend(found),
                Ok(Err(e)) => return Err(to_failure(e, FailureKind::Operation)),
                Err(_) => {
                    return Err(AccountFailure::new(
                        FailureKind::Timeout,
                        format!("{} in {} timed out after {}s", self.operation.name(), region, limit.as_secs()),
                    ))
                }
            }
        }

        Ok(self.post_process(findings))
    }

    fn post_process(&self, findings: Vec<Finding>) -> Vec<Finding> {
        findings
            .into_iter()
            .filter(|f| {
                let excluded = f.arn.as_deref().is_some_and(|arn| self.arn_exclusions.matches(arn));
                if excluded {
                    debug!(resource = %f.resource_id, "Finding excluded by ARN pattern");
                }
                !excluded
            })
            .map(|mut f| {
                if let Some(calculator) = &self.calculator {
                    calculator.annotate(&mut f);
                }
                f
            })
            .collect()
    }
}

fn to_failure(err: KostyError, default: FailureKind) -> AccountFailure {
    let kind = match &err {
        KostyError::Auth(_) => FailureKind::Auth,
        KostyError::Timeout(_) => FailureKind::Timeout,
        KostyError::Cancelled(_) => FailureKind::Cancelled,
        _ => default,
    };
    AccountFailure::new(kind, truncate_error(&err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_mapping() {
        assert_eq!(to_failure(KostyError::Auth("denied".into()), FailureKind::Operation).kind, FailureKind::Auth);
        assert_eq!(to_failure(KostyError::Throttled("slow".into()), FailureKind::Auth).kind, FailureKind::Auth);
        assert_eq!(
            to_failure(KostyError::Throttled("slow".into()), FailureKind::Operation).kind,
            FailureKind::Operation
        );
        assert_eq!(to_failure(KostyError::Timeout("t".into()), FailureKind::Operation).kind, FailureKind::Timeout);
    }

    #[test]
    fn test_failure_message_is_error_text() {
        let failure = to_failure(KostyError::Operation("DescribeAddresses: boom".into()), FailureKind::Operation);
        assert_eq!(failure.marker(), "Error: Operation failed: DescribeAddresses: boom");
    }
}
