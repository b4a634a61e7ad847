use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::cloud::Session;
use crate::errors::KostyError;
use crate::models::{Finding, FindingKind, OperationParams};

/// Static description of one named check a service exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckDescriptor {
    pub name: &'static str,
    pub kind: FindingKind,
    pub description: &'static str,
    /// The check can use a suggested internal parallelism.
    pub accepts_worker_hint: bool,
}

/// Everything an operation needs for one account and one region.
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub session: Session,
    pub account_id: String,
    pub region: String,
    pub worker_hint: Option<usize>,
    pub params: OperationParams,
}

impl OperationContext {
    pub fn new(session: Session, account_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            session,
            account_id: account_id.into(),
            region: region.into(),
            worker_hint: None,
            params: OperationParams::new(),
        }
    }

    pub fn with_worker_hint(mut self, hint: Option<usize>) -> Self {
        self.worker_hint = hint.map(|h| h.max(1));
        self
    }

    pub fn with_params(mut self, params: OperationParams) -> Self {
        self.params = params;
        self
    }

    /// Context as seen by `check`: the hint is withheld from checks that
    /// do not declare support for it.
    pub fn for_check(&self, check: &CheckDescriptor) -> OperationContext {
        let mut ctx = self.clone();
        if !check.accepts_worker_hint {
            ctx.worker_hint = None;
        }
        ctx
    }

    /// Hint to use for internal fan-out, 1 when none was given.
    pub fn parallelism(&self) -> usize {
        self.worker_hint.unwrap_or(1).max(1)
    }
}

/// A pluggable audit service (EC2, S3, EIP, ...).
///
/// Implementors list their checks and run one by name; the composite
/// operations are derived from that list.
#[async_trait]
pub trait AuditService: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn checks(&self) -> &'static [CheckDescriptor];

    async fn run_check(
        &self,
        check: &CheckDescriptor,
        ctx: &OperationContext,
    ) -> Result<Vec<Finding>, KostyError>;

    async fn cost_audit(&self, ctx: &OperationContext) -> Result<Vec<Finding>, KostyError> {
        run_checks(self, Some(FindingKind::Cost), ctx).await
    }

    async fn security_audit(&self, ctx: &OperationContext) -> Result<Vec<Finding>, KostyError> {
        run_checks(self, Some(FindingKind::Security), ctx).await
    }

    async fn audit(&self, ctx: &OperationContext) -> Result<Vec<Finding>, KostyError> {
        run_checks(self, None, ctx).await
    }
}

/// Run every check of `service`, optionally restricted to one kind, in
/// declaration order. Findings are stamped with account, region and check.
pub async fn run_checks<S: AuditService + ?Sized>(
    service: &S,
    kind: Option<FindingKind>,
    ctx: &OperationContext,
) -> Result<Vec<Finding>, KostyError> {
    let mut findings = Vec::new();
    for check in service.checks() {
        if kind.is_some_and(|k| k != check.kind) {
            continue;
        }
        let found = service.run_check(check, &ctx.for_check(check)).await?;
        findings.extend(stamp(found, check, ctx));
    }
    Ok(findings)
}

pub(crate) fn stamp(findings: Vec<Finding>, check: &CheckDescriptor, ctx: &OperationContext) -> Vec<Finding> {
    findings
        .into_iter()
        .map(|mut f| {
            if f.account_id.is_empty() {
                f.account_id = ctx.account_id.clone();
            }
            if f.region.is_empty() {
                f.region = ctx.region.clone();
            }
            if f.check.is_empty() {
                f.check = check.name.to_string();
            }
            f
        })
        .collect()
}

/// A resolved, callable operation of one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Audit,
    CostAudit,
    SecurityAudit,
    Check(CheckDescriptor),
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Audit => "audit",
            Self::CostAudit => "cost_audit",
            Self::SecurityAudit => "security_audit",
            Self::Check(check) => check.name,
        }
    }

    /// Look `name` up on `service`; `-` and `_` are interchangeable.
    pub fn lookup(service: &dyn AuditService, name: &str) -> Result<Self, KostyError> {
        let normalised = name.trim().replace('-', "_");
        match normalised.as_str() {
            "audit" => return Ok(Self::Audit),
            "cost_audit" => return Ok(Self::CostAudit),
            "security_audit" => return Ok(Self::SecurityAudit),
            _ => {}
        }
        service
            .checks()
            .iter()
            .find(|c| c.name == normalised)
            .map(|c| Self::Check(*c))
            .ok_or_else(|| KostyError::UnknownOperation {
                service: service.name().to_string(),
                operation: name.to_string(),
            })
    }

    /// Composite operations take the hint when any check they run does.
    pub fn accepts_worker_hint(&self, service: &dyn AuditService) -> bool {
        match self {
            Self::Check(check) => check.accepts_worker_hint,
            _ => {
                let kind = self.kind();
                service
                    .checks()
                    .iter()
                    .filter(|c| kind.map_or(true, |k| c.kind == k))
                    .any(|c| c.accepts_worker_hint)
            }
        }
    }

    fn kind(&self) -> Option<FindingKind> {
        match self {
            Self::Audit => None,
            Self::CostAudit => Some(FindingKind::Cost),
            Self::SecurityAudit => Some(FindingKind::Security),
            Self::Check(check) => Some(check.kind),
        }
    }

    pub async fn invoke(
        &self,
        service: &dyn AuditService,
        ctx: &OperationContext,
    ) -> Result<Vec<Finding>, KostyError> {
        match self {
            Self::Audit => service.audit(ctx).await,
            Self::CostAudit => service.cost_audit(ctx).await,
            Self::SecurityAudit => service.security_audit(ctx).await,
            Self::Check(check) => {
                let found = service.run_check(check, &ctx.for_check(check)).await?;
                Ok(stamp(found, check, ctx))
            }
        }
    }
}

/// Operation names a service answers to, composites first.
pub fn operation_names(service: &dyn AuditService) -> Vec<&'static str> {
    let mut names = vec!["audit", "cost_audit", "security_audit"];
    names.extend(service.checks().iter().map(|c| c.name));
    names
}

/// Service name → implementation, in registration order.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    services: IndexMap<&'static str, Arc<dyn AuditService>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every service compiled into this build.
    pub fn builtin() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();
        #[cfg(feature = "aws")]
        {
            registry.register(Arc::new(super::eip::EipAuditService));
            registry.register(Arc::new(super::sg::SgAuditService));
        }
        registry
    }

    pub fn register(&mut self, service: Arc<dyn AuditService>) {
        self.services.insert(service.name(), service);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn AuditService>, KostyError> {
        let normalised = name.trim().to_ascii_lowercase();
        self.services
            .get(normalised.as_str())
            .cloned()
            .ok_or_else(|| KostyError::UnknownService(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn AuditService>> {
        self.services.values()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.services.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

pub static SERVICE_REGISTRY: LazyLock<ServiceRegistry> = LazyLock::new(ServiceRegistry::builtin);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;

    static CHECKS: &[CheckDescriptor] = &[
        CheckDescriptor {
            name: "check_idle_things",
            kind: FindingKind::Cost,
            description: "Idle things",
            accepts_worker_hint: false,
        },
        CheckDescriptor {
            name: "check_open_things",
            kind: FindingKind::Security,
            description: "Open things",
            accepts_worker_hint: true,
        },
    ];

    struct Things;

    #[async_trait]
    impl AuditService for Things {
        fn name(&self) -> &'static str {
            "things"
        }

        fn description(&self) -> &'static str {
            "Things audit"
        }

        fn checks(&self) -> &'static [CheckDescriptor] {
            CHECKS
        }

        async fn run_check(
            &self,
            check: &CheckDescriptor,
            ctx: &OperationContext,
        ) -> Result<Vec<Finding>, KostyError> {
            let hint = ctx.worker_hint.map(|h| h as u64).unwrap_or(0);
            Ok(vec![Finding::new("things", check.kind, "thing-1", check.description)
                .with_severity(Severity::Low)
                .with_detail("hint", hint)])
        }
    }

    fn ctx() -> OperationContext {
        OperationContext::new(Session::Ambient, "123456789012", "us-east-1").with_worker_hint(Some(4))
    }

    #[test]
    fn test_lookup_normalises_dashes() {
        let op = Operation::lookup(&Things, "check-idle-things").unwrap();
        assert_eq!(op.name(), "check_idle_things");
        assert_eq!(Operation::lookup(&Things, "cost-audit").unwrap(), Operation::CostAudit);
    }

    #[test]
    fn test_lookup_unknown_operation() {
        let err = Operation::lookup(&Things, "check_nothing").unwrap_err();
        assert!(matches!(err, KostyError::UnknownOperation { .. }));
    }

    #[test]
    fn test_worker_hint_capability() {
        assert!(!Operation::lookup(&Things, "check_idle_things").unwrap().accepts_worker_hint(&Things));
        assert!(Operation::lookup(&Things, "check_open_things").unwrap().accepts_worker_hint(&Things));
        assert!(Operation::Audit.accepts_worker_hint(&Things));
        assert!(!Operation::CostAudit.accepts_worker_hint(&Things));
    }

    #[tokio::test]
    async fn test_audit_runs_all_checks_and_stamps_scope() {
        let findings = Operation::Audit.invoke(&Things, &ctx()).await.unwrap();
        assert_eq!(findings.len(), 2);
        assert!(findings.iter().all(|f| f.account_id == "123456789012" && f.region == "us-east-1"));
        assert_eq!(findings[0].check, "check_idle_things");
        // hint withheld from the check that does not accept it
        assert_eq!(findings[0].detail_f64("hint"), Some(0.0));
        assert_eq!(findings[1].detail_f64("hint"), Some(4.0));
    }

    #[tokio::test]
    async fn test_security_audit_filters_by_kind() {
        let findings = Operation::SecurityAudit.invoke(&Things, &ctx()).await.unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::Security);
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = ServiceRegistry::new();
        registry.register(Arc::new(Things));
        assert_eq!(registry.names(), vec!["things"]);
        assert!(registry.get("Things").is_ok());
        assert!(matches!(registry.get("nope"), Err(KostyError::UnknownService(_))));
    }

    #[test]
    fn test_operation_names() {
        let names = operation_names(&Things);
        assert_eq!(names[0], "audit");
        assert!(names.contains(&"check_open_things"));
    }
}
