//! Resource snapshots and the rules evaluated over them.
//!
//! The SDK-backed services only fetch; everything that decides whether a
//! resource is a finding lives here so it can be exercised without a cloud.

use std::collections::HashSet;

use serde_json::json;

use crate::models::{Finding, FindingKind, Severity};

pub const SSH_RDP_PORTS: &[i32] = &[22, 3389];
pub const DATABASE_PORTS: &[i32] = &[3306, 5432, 1433, 27017];
pub const DANGEROUS_PORTS: &[i32] = &[22, 3389, 3306, 5432, 1433, 27017];
pub const DEFAULT_RULE_THRESHOLD: u64 = 50;

const WORLD_V4: &str = "0.0.0.0/0";
const WORLD_V6: &str = "::/0";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngressRule {
    /// `tcp`, `udp`, `icmp` or `-1` for all protocols.
    pub protocol: String,
    pub from_port: Option<i32>,
    pub to_port: Option<i32>,
    pub ipv4_ranges: Vec<String>,
    pub ipv6_ranges: Vec<String>,
}

impl IngressRule {
    pub fn open_to_world(&self) -> bool {
        self.ipv4_ranges.iter().any(|c| c == WORLD_V4) || self.ipv6_ranges.iter().any(|c| c == WORLD_V6)
    }

    /// Inclusive port range; unset bounds and the all-protocol marker mean
    /// the full range.
    pub fn port_range(&self) -> (i32, i32) {
        if self.protocol == "-1" {
            return (0, 65535);
        }
        (self.from_port.unwrap_or(0), self.to_port.unwrap_or(65535))
    }

    pub fn covers(&self, port: i32) -> bool {
        let (from, to) = self.port_range();
        from <= port && port <= to
    }

    pub fn covers_any(&self, ports: &[i32]) -> bool {
        ports.iter().any(|p| self.covers(*p))
    }

    pub fn all_ports(&self) -> bool {
        self.port_range() == (0, 65535)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityGroup {
    pub id: String,
    pub name: String,
    pub description: String,
    pub ingress: Vec<IngressRule>,
    pub egress_count: usize,
}

impl SecurityGroup {
    /// First world-open ingress rule matching `predicate`.
    pub fn world_open_rule<F>(&self, predicate: F) -> Option<&IngressRule>
    where
        F: Fn(&IngressRule) -> bool,
    {
        self.ingress.iter().find(|r| r.open_to_world() && predicate(r))
    }

    pub fn rule_count(&self) -> usize {
        self.ingress.len() + self.egress_count
    }

    pub fn arn(&self, region: &str, account_id: &str) -> String {
        format!("arn:aws:ec2:{}:{}:security-group/{}", region, account_id, self.id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElasticIp {
    pub allocation_id: Option<String>,
    pub public_ip: Option<String>,
    pub domain: Option<String>,
    pub instance_id: Option<String>,
    pub network_interface_id: Option<String>,
}

impl ElasticIp {
    pub fn is_attached(&self) -> bool {
        self.instance_id.is_some() || self.network_interface_id.is_some()
    }

    pub fn resource_id(&self) -> String {
        self.allocation_id
            .clone()
            .or_else(|| self.public_ip.clone())
            .unwrap_or_default()
    }

    pub fn arn(&self, region: &str, account_id: &str) -> String {
        format!("arn:aws:ec2:{}:{}:elastic-ip/{}", region, account_id, self.resource_id())
    }

    fn base_finding(&self, kind: FindingKind, issue: &str, region: &str, account_id: &str) -> Finding {
        let mut finding = Finding::new("EIP", kind, self.resource_id(), issue)
            .in_scope(account_id, region)
            .with_severity(Severity::High)
            .with_arn(self.arn(region, account_id))
            .with_detail("PublicIp", json!(self.public_ip))
            .with_detail("AllocationId", json!(self.allocation_id));
        if let Some(ip) = &self.public_ip {
            finding = finding.with_name(ip.clone());
        }
        finding
    }
}

/// Instance facts the EIP checks need.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceState {
    pub id: String,
    pub state: String,
    pub security_group_ids: Vec<String>,
}

impl InstanceState {
    pub fn is_stopped(&self) -> bool {
        self.state == "stopped"
    }
}

pub fn unattached_eips(eips: &[ElasticIp], region: &str, account_id: &str) -> Vec<Finding> {
    eips.iter()
        .filter(|eip| !eip.is_attached())
        .map(|eip| {
            eip.base_finding(FindingKind::Cost, "Unattached Elastic IP", region, account_id)
                .with_description(format!(
                    "Elastic IP {} is unattached and billed hourly",
                    eip.public_ip.as_deref().unwrap_or("-")
                ))
                .with_detail("Domain", json!(eip.domain))
        })
        .collect()
}

pub fn eips_on_stopped_instances(
    eips: &[ElasticIp],
    instances: &[InstanceState],
    region: &str,
    account_id: &str,
) -> Vec<Finding> {
    let stopped: HashSet<&str> = instances
        .iter()
        .filter(|i| i.is_stopped())
        .map(|i| i.id.as_str())
        .collect();

    eips.iter()
        .filter_map(|eip| {
            let instance_id = eip.instance_id.as_deref()?;
            stopped.contains(instance_id).then(|| {
                eip.base_finding(FindingKind::Cost, "EIP attached to stopped instance", region, account_id)
                    .with_description(format!(
                        "Elastic IP {} attached to stopped instance {}",
                        eip.public_ip.as_deref().unwrap_or("-"),
                        instance_id
                    ))
                    .with_detail("InstanceId", instance_id)
            })
        })
        .collect()
}

/// EIP whose instance has a security group exposing a dangerous port.
pub fn eip_with_dangerous_rules(
    eip: &ElasticIp,
    instance: &InstanceState,
    groups: &[SecurityGroup],
    region: &str,
    account_id: &str,
) -> Option<Finding> {
    let exposed = groups
        .iter()
        .any(|g| g.world_open_rule(|r| r.covers_any(DANGEROUS_PORTS)).is_some());
    exposed.then(|| {
        eip.base_finding(FindingKind::Security, "EIP on instance with dangerous SG rules", region, account_id)
            .with_description(format!(
                "Elastic IP {} on instance with dangerous security group rules",
                eip.public_ip.as_deref().unwrap_or("-")
            ))
            .with_detail("InstanceId", instance.id.clone())
            .with_detail("SecurityGroups", json!(instance.security_group_ids))
    })
}

fn group_finding(
    group: &SecurityGroup,
    kind: FindingKind,
    issue: impl Into<String>,
    severity: Severity,
    region: &str,
    account_id: &str,
) -> Finding {
    Finding::new("SG", kind, group.id.clone(), issue)
        .in_scope(account_id, region)
        .with_name(group.name.clone())
        .with_severity(severity)
        .with_arn(group.arn(region, account_id))
        .with_detail("GroupName", group.name.clone())
}

fn exposure_findings(
    groups: &[SecurityGroup],
    ports: &[i32],
    issue: &str,
    risk: &str,
    region: &str,
    account_id: &str,
) -> Vec<Finding> {
    groups
        .iter()
        .filter_map(|group| {
            let rule = group.world_open_rule(|r| r.covers_any(ports))?;
            let (from, to) = rule.port_range();
            Some(
                group_finding(group, FindingKind::Security, issue, Severity::Critical, region, account_id)
                    .with_description(risk)
                    .with_detail("FromPort", from)
                    .with_detail("ToPort", to)
                    .with_detail("Protocol", rule.protocol.clone()),
            )
        })
        .collect()
}

pub fn ssh_rdp_open(groups: &[SecurityGroup], region: &str, account_id: &str) -> Vec<Finding> {
    exposure_findings(
        groups,
        SSH_RDP_PORTS,
        "Port 22/3389 open to 0.0.0.0/0",
        "Brute force attacks",
        region,
        account_id,
    )
}

pub fn database_ports_open(groups: &[SecurityGroup], region: &str, account_id: &str) -> Vec<Finding> {
    exposure_findings(
        groups,
        DATABASE_PORTS,
        "Database ports open to 0.0.0.0/0",
        "Unauthorized DB access",
        region,
        account_id,
    )
}

pub fn all_ports_open(groups: &[SecurityGroup], region: &str, account_id: &str) -> Vec<Finding> {
    groups
        .iter()
        .filter_map(|group| {
            let rule = group.world_open_rule(IngressRule::all_ports)?;
            Some(
                group_finding(
                    group,
                    FindingKind::Security,
                    "All ports open (0-65535) to 0.0.0.0/0",
                    Severity::Critical,
                    region,
                    account_id,
                )
                .with_description("Complete exposure")
                .with_detail("Protocol", rule.protocol.clone()),
            )
        })
        .collect()
}

/// Groups attached to nothing in `in_use`. The VPC `default` group cannot
/// be deleted and is never reported.
pub fn unused_groups(
    groups: &[SecurityGroup],
    in_use: &HashSet<String>,
    region: &str,
    account_id: &str,
) -> Vec<Finding> {
    groups
        .iter()
        .filter(|g| g.name != "default" && !in_use.contains(&g.id))
        .map(|group| {
            group_finding(
                group,
                FindingKind::Cost,
                "Unused security group (no attachments)",
                Severity::Low,
                region,
                account_id,
            )
            .with_description("Configuration drift")
            .with_detail("Description", group.description.clone())
        })
        .collect()
}

pub fn complex_groups(
    groups: &[SecurityGroup],
    threshold: u64,
    region: &str,
    account_id: &str,
) -> Vec<Finding> {
    groups
        .iter()
        .filter(|g| g.rule_count() as u64 > threshold)
        .map(|group| {
            group_finding(
                group,
                FindingKind::Security,
                format!("Security group with >{} rules", threshold),
                Severity::Low,
                region,
                account_id,
            )
            .with_description("Complex troubleshooting")
            .with_detail("RuleCount", group.rule_count() as u64)
            .with_detail("Threshold", threshold)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGION: &str = "eu-west-1";
    const ACCOUNT: &str = "123456789012";

    fn rule(protocol: &str, from: Option<i32>, to: Option<i32>, cidr: &str) -> IngressRule {
        IngressRule {
            protocol: protocol.into(),
            from_port: from,
            to_port: to,
            ipv4_ranges: vec![cidr.into()],
            ipv6_ranges: vec![],
        }
    }

    fn group(id: &str, name: &str, ingress: Vec<IngressRule>) -> SecurityGroup {
        SecurityGroup {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            ingress,
            egress_count: 1,
        }
    }

    fn eip(alloc: &str, instance: Option<&str>) -> ElasticIp {
        ElasticIp {
            allocation_id: Some(alloc.into()),
            public_ip: Some("203.0.113.10".into()),
            domain: Some("vpc".into()),
            instance_id: instance.map(Into::into),
            network_interface_id: None,
        }
    }

    #[test]
    fn test_port_ranges() {
        assert!(rule("tcp", Some(20), Some(25), WORLD_V4).covers(22));
        assert!(!rule("tcp", Some(80), Some(443), WORLD_V4).covers(22));
        assert!(rule("-1", None, None, WORLD_V4).all_ports());
        assert!(rule("tcp", Some(0), Some(65535), WORLD_V4).all_ports());
        assert!(!rule("tcp", Some(0), Some(1024), WORLD_V4).all_ports());
    }

    #[test]
    fn test_private_cidr_is_not_world_open() {
        let groups = vec![group("sg-1", "ssh", vec![rule("tcp", Some(22), Some(22), "10.0.0.0/8")])];
        assert!(ssh_rdp_open(&groups, REGION, ACCOUNT).is_empty());
    }

    #[test]
    fn test_ssh_open_reported_once_per_group() {
        let groups = vec![group(
            "sg-1",
            "ssh",
            vec![
                rule("tcp", Some(22), Some(22), WORLD_V4),
                rule("tcp", Some(3389), Some(3389), WORLD_V4),
            ],
        )];
        let findings = ssh_rdp_open(&groups, REGION, ACCOUNT);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Critical);
        assert_eq!(
            findings[0].arn.as_deref(),
            Some("arn:aws:ec2:eu-west-1:123456789012:security-group/sg-1")
        );
    }

    #[test]
    fn test_ipv6_world_counts() {
        let mut r = rule("tcp", Some(5432), Some(5432), "10.0.0.0/8");
        r.ipv6_ranges.push(WORLD_V6.into());
        let groups = vec![group("sg-db", "db", vec![r])];
        assert_eq!(database_ports_open(&groups, REGION, ACCOUNT).len(), 1);
    }

    #[test]
    fn test_all_ports_open() {
        let groups = vec![
            group("sg-a", "all", vec![rule("-1", None, None, WORLD_V4)]),
            group("sg-b", "web", vec![rule("tcp", Some(443), Some(443), WORLD_V4)]),
        ];
        let findings = all_ports_open(&groups, REGION, ACCOUNT);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].resource_id, "sg-a");
    }

    #[test]
    fn test_unused_groups_skip_default() {
        let groups = vec![
            group("sg-1", "default", vec![]),
            group("sg-2", "used", vec![]),
            group("sg-3", "orphan", vec![]),
        ];
        let in_use: HashSet<String> = ["sg-2".to_string()].into_iter().collect();
        let findings = unused_groups(&groups, &in_use, REGION, ACCOUNT);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].resource_id, "sg-3");
        assert_eq!(findings[0].kind, FindingKind::Cost);
    }

    #[test]
    fn test_complex_groups_threshold() {
        let rules: Vec<IngressRule> = (0..5).map(|p| rule("tcp", Some(p), Some(p), "10.0.0.0/8")).collect();
        let groups = vec![group("sg-big", "big", rules)];
        assert_eq!(complex_groups(&groups, 5, REGION, ACCOUNT).len(), 1);
        assert!(complex_groups(&groups, 6, REGION, ACCOUNT).is_empty());
    }

    #[test]
    fn test_unattached_eips() {
        let eips = vec![eip("eipalloc-1", None), eip("eipalloc-2", Some("i-1"))];
        let findings = unattached_eips(&eips, REGION, ACCOUNT);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].resource_id, "eipalloc-1");
        assert_eq!(findings[0].resource_name.as_deref(), Some("203.0.113.10"));
        assert!(findings[0].is_cost());
    }

    #[test]
    fn test_eips_on_stopped_instances() {
        let eips = vec![eip("eipalloc-1", Some("i-stopped")), eip("eipalloc-2", Some("i-running"))];
        let instances = vec![
            InstanceState { id: "i-stopped".into(), state: "stopped".into(), security_group_ids: vec![] },
            InstanceState { id: "i-running".into(), state: "running".into(), security_group_ids: vec![] },
        ];
        let findings = eips_on_stopped_instances(&eips, &instances, REGION, ACCOUNT);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].detail_str("InstanceId"), Some("i-stopped"));
    }

    #[test]
    fn test_eip_with_dangerous_rules() {
        let instance = InstanceState {
            id: "i-1".into(),
            state: "running".into(),
            security_group_ids: vec!["sg-1".into()],
        };
        let open = vec![group("sg-1", "db", vec![rule("tcp", Some(3300), Some(3310), WORLD_V4)])];
        let closed = vec![group("sg-1", "web", vec![rule("tcp", Some(443), Some(443), WORLD_V4)])];
        let address = eip("eipalloc-1", Some("i-1"));
        assert!(eip_with_dangerous_rules(&address, &instance, &open, REGION, ACCOUNT).is_some());
        assert!(eip_with_dangerous_rules(&address, &instance, &closed, REGION, ACCOUNT).is_none());
    }
}
