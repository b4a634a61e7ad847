mod common;

use std::sync::Arc;

use common::{wire, MockIdentity, MockService, CALLER};
use kosty::errors::{KostyError, RetryConfig};
use kosty::models::{AccountStatus, AuditRequest};
use kosty::pipeline::AuditExecutor;
use kosty::scope::ScopeResolver;

#[tokio::test]
async fn test_single_account_scope_is_caller() {
    let (_, scope) = wire(Arc::new(MockIdentity::new()));
    let accounts = scope.resolve(false, None, "OrganizationAccountAccessRole").await.unwrap();
    assert_eq!(accounts, vec![CALLER]);
}

#[tokio::test]
async fn test_only_active_accounts_across_pages_in_order() {
    let identity = Arc::new(
        MockIdentity::new()
            .with_page(&[
                ("111111111111", AccountStatus::Active),
                ("222222222222", AccountStatus::Suspended),
            ])
            .with_page(&[
                ("333333333333", AccountStatus::PendingClosure),
                ("444444444444", AccountStatus::Active),
            ])
            .with_page(&[("555555555555", AccountStatus::Active)]),
    );
    let (_, scope) = wire(identity.clone());

    let accounts = scope.resolve(true, None, "OrganizationAccountAccessRole").await.unwrap();

    assert_eq!(accounts, vec!["111111111111", "444444444444", "555555555555"]);
    assert_eq!(identity.list_count(), 3);
}

#[tokio::test]
async fn test_not_in_organization_is_distinguishable_and_does_no_account_work() {
    let identity = Arc::new(MockIdentity::new().not_in_organization());
    let service = Arc::new(MockService::new());
    let (provider, scope) = wire(identity.clone());
    let request = AuditRequest::builder("audit").organization(true).build().unwrap();

    let err = AuditExecutor::new(service.clone(), provider, scope)
        .run(&request)
        .await
        .unwrap_err();

    assert!(matches!(err, KostyError::NotInOrganization(_)));
    assert!(err.is_scope_error());
    assert!(err.to_string().contains("without --organization"));
    assert_eq!(identity.assume_count(), 0);
    assert!(service.invocations().is_empty());
}

#[tokio::test]
async fn test_configured_exclusions_removed() {
    let identity = Arc::new(MockIdentity::new().with_active(&["111111111111", "222222222222", "333333333333"]));
    let (provider, _) = wire(identity);
    let scope = ScopeResolver::new(provider)
        .with_retry(RetryConfig::none())
        .with_excluded_accounts(["222222222222"]);

    let accounts = scope.resolve(true, None, "OrganizationAccountAccessRole").await.unwrap();

    assert_eq!(accounts, vec!["111111111111", "333333333333"]);
}

#[tokio::test]
async fn test_admin_account_listing_assumes_admin_role_first() {
    let identity = Arc::new(MockIdentity::new().with_active(&["111111111111"]));
    let (_, scope) = wire(identity.clone());

    let accounts = scope
        .resolve(true, Some("777777777777"), "OrganizationAccountAccessRole")
        .await
        .unwrap();

    assert_eq!(accounts, vec!["111111111111"]);
    let arns = identity.assumed_arns.lock().unwrap().clone();
    assert_eq!(arns, vec!["arn:aws:iam::777777777777:role/OrganizationAccountAccessRole"]);
}

#[tokio::test]
async fn test_admin_assume_failure_is_scope_error() {
    let identity = Arc::new(MockIdentity::new().with_active(&["111111111111"]).deny("777777777777"));
    let (_, scope) = wire(identity.clone());

    let err = scope
        .resolve(true, Some("777777777777"), "OrganizationAccountAccessRole")
        .await
        .unwrap_err();

    assert!(matches!(err, KostyError::Scope(_)));
    assert_eq!(identity.list_count(), 0);
}
