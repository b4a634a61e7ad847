mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{wire, MockIdentity, MockService, CALLER};
use kosty::config::ArnMatcher;
use kosty::errors::KostyError;
use kosty::models::{AccountOutcome, AccountStatus, AuditRequest, FailureKind, Timeouts};
use kosty::pipeline::AuditExecutor;
use tokio_util::sync::CancellationToken;

const A: &str = "111111111111";
const B: &str = "222222222222";
const C: &str = "333333333333";
const D: &str = "444444444444";
const E: &str = "555555555555";

fn executor(identity: Arc<MockIdentity>, service: Arc<MockService>) -> AuditExecutor {
    let (provider, scope) = wire(identity);
    AuditExecutor::new(service, provider, scope)
}

fn org_request(operation: &str) -> AuditRequest {
    AuditRequest::builder(operation)
        .organization(true)
        .regions(["us-east-1"])
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_every_resolved_account_gets_an_entry() {
    let identity = Arc::new(MockIdentity::new().with_active(&[A, B, C, D]).deny(B));
    let service = Arc::new(MockService::new());

    let result = executor(identity, service).run(&org_request("audit")).await.unwrap();

    assert_eq!(result.len(), 4);
    let keys: Vec<&String> = result.iter().map(|(id, _)| id).collect();
    assert_eq!(keys, vec![A, B, C, D]);

    let failure = result.get(B).and_then(AccountOutcome::failure).unwrap();
    assert_eq!(failure.kind, FailureKind::Auth);
    assert!(failure.marker().starts_with("Error: "));
    assert_eq!(result.failed_accounts().count(), 1);
}

#[tokio::test]
async fn test_one_failing_account_does_not_affect_siblings() {
    let identity = Arc::new(MockIdentity::new().with_active(&[A, B, C]));
    let service = Arc::new(MockService::new().failing(B));

    let result = executor(identity, service).run(&org_request("check_things")).await.unwrap();

    assert_eq!(result.len(), 3);
    assert_eq!(result.get(A).and_then(AccountOutcome::findings).map(<[_]>::len), Some(1));
    assert_eq!(result.get(C).and_then(AccountOutcome::findings).map(<[_]>::len), Some(1));
    let failure = result.get(B).and_then(AccountOutcome::failure).unwrap();
    assert_eq!(failure.kind, FailureKind::Operation);
    assert!(failure.message.contains("simulated failure"));
}

#[tokio::test]
async fn test_worker_hint_split_across_regions() {
    let identity = Arc::new(MockIdentity::new());
    let service = Arc::new(MockService::new());
    let request = AuditRequest::builder("check_things")
        .regions(["us-east-1", "eu-west-1"])
        .max_workers(10)
        .build()
        .unwrap();

    let result = executor(identity.clone(), service.clone()).run(&request).await.unwrap();

    assert_eq!(result.len(), 1);
    let findings = result.get(CALLER).and_then(AccountOutcome::findings).unwrap();
    assert_eq!(findings.len(), 2);

    let invocations = service.invocations();
    assert_eq!(invocations.len(), 2);
    assert!(invocations.iter().all(|i| i.worker_hint == Some(5)));
    let regions: Vec<&str> = invocations.iter().map(|i| i.region.as_str()).collect();
    assert_eq!(regions, vec!["us-east-1", "eu-west-1"]);
    // single-account mode never assumes a role
    assert_eq!(identity.assume_count(), 0);
}

#[tokio::test]
async fn test_worker_hint_withheld_from_incapable_check() {
    let identity = Arc::new(MockIdentity::new());
    let service = Arc::new(MockService::new());
    let request = AuditRequest::builder("check-plain").max_workers(8).build().unwrap();

    executor(identity, service.clone()).run(&request).await.unwrap();

    let invocations = service.invocations();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].check, "check_plain");
    assert_eq!(invocations[0].worker_hint, None);
}

#[tokio::test]
async fn test_in_flight_accounts_bounded_by_max_workers() {
    let identity = Arc::new(MockIdentity::new().with_active(&[A, B, C, D, E]));
    let service = Arc::new(MockService::new().with_delay(Duration::from_millis(40)));
    let request = AuditRequest::builder("audit")
        .organization(true)
        .max_workers(2)
        .build()
        .unwrap();

    let result = executor(identity, service.clone()).run(&request).await.unwrap();

    assert_eq!(result.len(), 5);
    assert_eq!(result.total_findings(), 10);
    assert!(service.peak_in_flight() <= 2, "peak was {}", service.peak_in_flight());
    assert!(service.peak_in_flight() >= 1);
}

#[tokio::test]
async fn test_hanging_operation_times_out() {
    let identity = Arc::new(MockIdentity::new().with_active(&[A, B]));
    let service = Arc::new(MockService::new().hanging(A));
    let request = AuditRequest::builder("check_things")
        .organization(true)
        .timeouts(Timeouts {
            credentials: Duration::from_secs(5),
            operation: Duration::from_millis(100),
        })
        .build()
        .unwrap();

    let result = executor(identity, service).run(&request).await.unwrap();

    let failure = result.get(A).and_then(AccountOutcome::failure).unwrap();
    assert_eq!(failure.kind, FailureKind::Timeout);
    assert!(result.get(B).and_then(AccountOutcome::findings).is_some());
}

#[tokio::test]
async fn test_cancelled_scan_still_returns_every_account() {
    let identity = Arc::new(MockIdentity::new().with_active(&[A, B, C]));
    let service = Arc::new(MockService::new());
    let token = CancellationToken::new();
    token.cancel();

    let result = executor(identity, service.clone())
        .with_cancel_token(token)
        .run(&org_request("audit"))
        .await
        .unwrap();

    assert_eq!(result.len(), 3);
    assert!(result
        .iter()
        .all(|(_, outcome)| outcome.failure().map(|f| f.kind) == Some(FailureKind::Cancelled)));
    assert!(service.invocations().is_empty());
}

#[tokio::test]
async fn test_arn_exclusions_drop_findings() {
    let identity = Arc::new(MockIdentity::new());
    let service = Arc::new(MockService::new());
    let matcher = ArnMatcher::new(&["arn:aws:mock:*:*:thing/check_plain".to_string()]);

    let result = executor(identity, service)
        .with_arn_exclusions(matcher)
        .run(&AuditRequest::builder("audit").build().unwrap())
        .await
        .unwrap();

    let findings = result.get(CALLER).and_then(AccountOutcome::findings).unwrap();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].check, "check_things");
}

#[tokio::test]
async fn test_no_active_accounts_is_empty_result() {
    let identity = Arc::new(MockIdentity::new().with_page(&[(A, AccountStatus::Suspended)]));
    let service = Arc::new(MockService::new());

    let result = executor(identity, service.clone()).run(&org_request("audit")).await.unwrap();

    assert!(result.is_empty());
    assert_eq!(result.total_findings(), 0);
    assert!(service.invocations().is_empty());
}

#[tokio::test]
async fn test_unknown_operation_rejected_before_any_remote_call() {
    let identity = Arc::new(MockIdentity::new().with_active(&[A]));
    let service = Arc::new(MockService::new());

    let err = executor(identity.clone(), service)
        .run(&org_request("check_nothing"))
        .await
        .unwrap_err();

    assert!(matches!(err, KostyError::UnknownOperation { .. }));
    assert_eq!(identity.list_count(), 0);
}

#[tokio::test]
async fn test_findings_stamped_with_scope() {
    let identity = Arc::new(MockIdentity::new().with_active(&[A]));
    let service = Arc::new(MockService::new());
    let request = AuditRequest::builder("audit")
        .organization(true)
        .regions(["eu-west-1"])
        .build()
        .unwrap();

    let result = executor(identity.clone(), service).run(&request).await.unwrap();

    let findings = result.get(A).and_then(AccountOutcome::findings).unwrap();
    assert!(findings.iter().all(|f| f.account_id == A && f.region == "eu-west-1"));
    let arns = identity.assumed_arns.lock().unwrap().clone();
    assert_eq!(arns, vec![format!("arn:aws:iam::{}:role/OrganizationAccountAccessRole", A)]);
}
