use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_ec2::Client;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::debug;

use super::ec2;
use super::registry::{stamp, AuditService, CheckDescriptor, OperationContext};
use super::rules::{self, ElasticIp, InstanceState, SecurityGroup};
use crate::errors::KostyError;
use crate::models::{Finding, FindingKind};

static CHECKS: &[CheckDescriptor] = &[
    CheckDescriptor {
        name: "check_unattached_eips",
        kind: FindingKind::Cost,
        description: "Elastic IPs not associated with any instance or interface",
        accepts_worker_hint: false,
    },
    CheckDescriptor {
        name: "check_eips_on_stopped_instances",
        kind: FindingKind::Cost,
        description: "Elastic IPs attached to stopped instances",
        accepts_worker_hint: false,
    },
    CheckDescriptor {
        name: "check_eips_with_dangerous_sg_rules",
        kind: FindingKind::Security,
        description: "Elastic IPs on instances whose security groups expose admin or database ports",
        accepts_worker_hint: true,
    },
];

/// The EC2 reads the EIP checks need.
#[async_trait]
trait AddressSource: Send + Sync {
    async fn addresses(&self) -> Result<Vec<ElasticIp>, KostyError>;
    async fn instances(&self, ids: Vec<String>) -> Result<Vec<InstanceState>, KostyError>;
    async fn security_groups(&self, ids: Vec<String>) -> Result<Vec<SecurityGroup>, KostyError>;
}

#[async_trait]
impl AddressSource for Client {
    async fn addresses(&self) -> Result<Vec<ElasticIp>, KostyError> {
        ec2::describe_addresses(self).await
    }

    async fn instances(&self, ids: Vec<String>) -> Result<Vec<InstanceState>, KostyError> {
        ec2::describe_instances(self, ids).await
    }

    async fn security_groups(&self, ids: Vec<String>) -> Result<Vec<SecurityGroup>, KostyError> {
        ec2::describe_security_groups(self, Some(ids)).await
    }
}

/// Elastic IP audit.
pub struct EipAuditService;

#[async_trait]
impl AuditService for EipAuditService {
    fn name(&self) -> &'static str {
        "eip"
    }

    fn description(&self) -> &'static str {
        "Elastic IP cost and exposure audit"
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
        let eips = client.addresses().await?;
        evaluate(check, ctx, &client, &eips).await
    }

    async fn cost_audit(&self, ctx: &OperationContext) -> Result<Vec<Finding>, KostyError> {
        let client = ec2::client(ctx).await;
        run_kind(&client, Some(FindingKind::Cost), ctx).await
    }

    async fn security_audit(&self, ctx: &OperationContext) -> Result<Vec<Finding>, KostyError> {
        let client = ec2::client(ctx).await;
        run_kind(&client, Some(FindingKind::Security), ctx).await
    }

    async fn audit(&self, ctx: &OperationContext) -> Result<Vec<Finding>, KostyError> {
        let client = ec2::client(ctx).await;
        run_kind(&client, None, ctx).await
    }
}

/// Every check of `kind` over a single address snapshot of the region.
async fn run_kind<S: AddressSource>(
    source: &S,
    kind: Option<FindingKind>,
    ctx: &OperationContext,
) -> Result<Vec<Finding>, KostyError> {
    let eips = source.addresses().await?;
    let mut findings = Vec::new();
    for check in CHECKS.iter().filter(|c| kind.map_or(true, |k| k == c.kind)) {
        let found = evaluate(check, &ctx.for_check(check), source, &eips).await?;
        findings.extend(stamp(found, check, ctx));
    }
    Ok(findings)
}

async fn evaluate<S: AddressSource>(
    check: &CheckDescriptor,
    ctx: &OperationContext,
    source: &S,
    eips: &[ElasticIp],
) -> Result<Vec<Finding>, KostyError> {
    debug!(region = %ctx.region, addresses = eips.len(), check = check.name, "Evaluating addresses");

    match check.name {
        "check_unattached_eips" => Ok(rules::unattached_eips(eips, &ctx.region, &ctx.account_id)),
        "check_eips_on_stopped_instances" => {
            let ids = eips.iter().filter_map(|e| e.instance_id.clone()).collect();
            let instances = source.instances(ids).await?;
            Ok(rules::eips_on_stopped_instances(eips, &instances, &ctx.region, &ctx.account_id))
        }
        "check_eips_with_dangerous_sg_rules" => {
            let by_instance: HashMap<String, &ElasticIp> = eips
                .iter()
                .filter_map(|e| Some((e.instance_id.clone()?, e)))
                .collect();
            let instances = source.instances(by_instance.keys().cloned().collect()).await?;

            let by_instance = &by_instance;
            let findings: Vec<Option<Finding>> = stream::iter(instances)
                .map(|instance| async move {
                    let Some(eip) = by_instance.get(&instance.id) else {
                        return Ok::<_, KostyError>(None);
                    };
                    if instance.security_group_ids.is_empty() {
                        return Ok(None);
                    }
                    let groups = source.security_groups(instance.security_group_ids.clone()).await?;
                    Ok(rules::eip_with_dangerous_rules(
                        eip,
                        &instance,
                        &groups,
                        &ctx.region,
                        &ctx.account_id,
                    ))
                })
                .buffered(ctx.parallelism())
                .try_collect()
                .await?;
            Ok(findings.into_iter().flatten().collect())
        }
        other => Err(KostyError::UnknownOperation {
            service: "eip".to_string(),
            operation: other.to_string(),
        }),
    }
}
