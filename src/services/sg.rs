use async_trait::async_trait;

use super::ec2;
use super::registry::{AuditService, CheckDescriptor, OperationContext};
use super::rules;
use crate::errors::KostyError;
use crate::models::{Finding, FindingKind};

static CHECKS: &[CheckDescriptor] = &[
    CheckDescriptor {
        name: "check_unused_groups",
        kind: FindingKind::Cost,
        description: "Security groups not referenced by any network interface",
        accepts_worker_hint: false,
    },
    CheckDescriptor {
        name: "check_ssh_rdp_open",
        kind: FindingKind::Security,
        description: "SSH or RDP open to the internet",
        accepts_worker_hint: false,
    },
    CheckDescriptor {
        name: "check_database_ports_open",
        kind: FindingKind::Security,
        description: "Database ports open to the internet",
        accepts_worker_hint: false,
    },
    CheckDescriptor {
        name: "check_all_ports_open",
        kind: FindingKind::Security,
        description: "Every port open to the internet",
        accepts_worker_hint: false,
    },
    CheckDescriptor {
        name: "check_complex_security_groups",
        kind: FindingKind::Security,
        description: "Security groups with more rules than rule_threshold",
        accepts_worker_hint: false,
    },
];

pub struct SgAuditService;

#[async_trait]
impl AuditService for SgAuditService {
    fn name(&self) -> &'static str {
        "sg"
    }

    fn description(&self) -> &'static str {
        "Security group hygiene and exposure audit"
    }

    fn checks(&self) -> &'static [CheckDescriptor] {
        CHECKS
    }

    async fn run_check(
        &self,
        check: &CheckDescriptor,
        ctx: &OperationContext,
    ) -> Result<Vec<Finding>, KostyError> {
        let client = ec2::client(ctx).await;
        let groups = ec2::describe_security_groups(&client, None).await?;
        let (region, account) = (ctx.region.as_str(), ctx.account_id.as_str());

        match check.name {
            "check_unused_groups" => {
                let in_use = ec2::groups_in_use(&client).await?;
                Ok(rules::unused_groups(&groups, &in_use, region, account))
            }
            "check_ssh_rdp_open" => Ok(rules::ssh_rdp_open(&groups, region, account)),
            "check_database_ports_open" => Ok(rules::database_ports_open(&groups, region, account)),
            "check_all_ports_open" => Ok(rules::all_ports_open(&groups, region, account)),
            "check_complex_security_groups" => {
                let threshold = ctx.params.u64_or("rule_threshold", rules::DEFAULT_RULE_THRESHOLD);
                Ok(rules::complex_groups(&groups, threshold, region, account))
            }
            other => Err(KostyError::UnknownOperation {
                service: self.name().to_string(),
                operation: other.to_string(),
            }),
        }
    }
}
