use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::executor::AuditExecutor;
use crate::auth::CredentialProvider;
use crate::config::Exclusions;
use crate::errors::KostyError;
use crate::models::AuditRequest;
use crate::pricing::CostCalculator;
use crate::progress::Progress;
use crate::reporting::Reporter;
use crate::scope::ScopeResolver;
use crate::services::{AuditService, ServiceRegistry};

const AUDIT_OPERATION: &str = "audit";

/// Runs `audit` for every registered, non-excluded service over one
/// resolved account list and collects everything into a single report.
pub struct ComprehensiveScanner {
    registry: &'static ServiceRegistry,
    provider: Arc<CredentialProvider>,
    scope: Arc<ScopeResolver>,
    calculator: Option<Arc<CostCalculator>>,
    exclusions: Exclusions,
    show_progress: bool,
    cancel_token: CancellationToken,
}

impl ComprehensiveScanner {
    pub fn new(registry: &'static ServiceRegistry, provider: Arc<CredentialProvider>, scope: Arc<ScopeResolver>) -> Self {
        Self {
            registry,
            provider,
            scope,
            calculator: None,
            exclusions: Exclusions::default(),
            show_progress: false,
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn with_cost_calculator(mut self, calculator: Arc<CostCalculator>) -> Self {
        self.calculator = Some(calculator);
        self
    }

    pub fn with_exclusions(mut self, exclusions: Exclusions) -> Self {
        self.exclusions = exclusions;
        self
    }

    pub fn with_progress(mut self, visible: bool) -> Self {
        self.show_progress = visible;
        self
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    /// Services that will be scanned, in registration order.
    pub fn services(&self) -> Vec<Arc<dyn AuditService>> {
        self.registry
            .iter()
            .filter(|s| !self.exclusions.excludes_service(s.name()))
            .cloned()
            .collect()
    }

    /// `template` supplies scope and tuning; its operation is ignored.
    pub async fn run(&self, template: &AuditRequest) -> Result<Reporter, KostyError> {
        let mut request = template.clone();
        request.operation = AUDIT_OPERATION.to_string();

        let accounts = self
            .scope
            .resolve(request.organization, request.admin_account.as_deref(), &request.role_name)
            .await?;

        let services = self.services();
        info!(
            services = services.len(),
            accounts = accounts.len(),
            regions = ?request.regions,
            "Starting comprehensive scan"
        );

        let progress = Progress::bar(services.len() as u64, "Comprehensive scan", self.show_progress);
        let mut reporter = Reporter::new();

        for service in services {
            if self.cancel_token.is_cancelled() {
                warn!(service = service.name(), "Scan cancelled, skipping remaining services");
                break;
            }
            progress.set_message(format!("Scanning {}", service.name()));

            let mut executor = AuditExecutor::new(service.clone(), self.provider.clone(), self.scope.clone())
                .with_arn_exclusions(self.exclusions.arn_matcher())
                .with_cancel_token(self.cancel_token.clone());
            if let Some(calculator) = &self.calculator {
                executor = executor.with_cost_calculator(calculator.clone());
            }

            let result = executor.run_for_accounts(&request, &accounts).await?;
            reporter.add_scan_result(service.name(), AUDIT_OPERATION, &result);
            progress.inc(1);
        }

        progress.finish(format!("Comprehensive scan: {} issues", reporter.total_issues()));
        Ok(reporter)
    }
}
