//! EC2 describe calls shared by the EIP and security-group services,
//! converted into the snapshots in `rules`.

use std::collections::HashSet;

use aws_sdk_ec2::Client;

use super::registry::OperationContext;
use super::rules::{ElasticIp, IngressRule, InstanceState, SecurityGroup};
use crate::cloud::aws::{map_sdk_error, sdk_config};
use crate::errors::KostyError;

pub async fn client(ctx: &OperationContext) -> Client {
    Client::new(&sdk_config(&ctx.session, &ctx.region).await)
}

pub async fn describe_addresses(client: &Client) -> Result<Vec<ElasticIp>, KostyError> {
    let resp = client
        .describe_addresses()
        .send()
        .await
        .map_err(|e| map_sdk_error("DescribeAddresses", e, KostyError::Operation))?;

    Ok(resp
        .addresses()
        .iter()
        .map(|a| ElasticIp {
            allocation_id: a.allocation_id().map(str::to_string),
            public_ip: a.public_ip().map(str::to_string),
            domain: a.domain().map(|d| d.as_str().to_string()),
            instance_id: a.instance_id().map(str::to_string),
            network_interface_id: a.network_interface_id().map(str::to_string),
        })
        .collect())
}

pub async fn describe_instances(client: &Client, ids: Vec<String>) -> Result<Vec<InstanceState>, KostyError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut instances = Vec::new();
    let mut next_token: Option<String> = None;
    loop {
        let resp = client
            .describe_instances()
            .set_instance_ids(Some(ids.clone()))
            .set_next_token(next_token.take())
            .send()
            .await
            .map_err(|e| map_sdk_error("DescribeInstances", e, KostyError::Operation))?;

        for reservation in resp.reservations() {
            for instance in reservation.instances() {
                let Some(id) = instance.instance_id() else { continue };
                instances.push(InstanceState {
                    id: id.to_string(),
                    state: instance
                        .state()
                        .and_then(|s| s.name())
                        .map(|n| n.as_str().to_string())
                        .unwrap_or_default(),
                    security_group_ids: instance
                        .security_groups()
                        .iter()
                        .filter_map(|g| g.group_id().map(str::to_string))
                        .collect(),
                });
            }
        }

        match resp.next_token() {
            Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
            _ => return Ok(instances),
        }
    }
}

/// Security groups in the region, or only `ids` when given.
pub async fn describe_security_groups(
    client: &Client,
    ids: Option<Vec<String>>,
) -> Result<Vec<SecurityGroup>, KostyError> {
    let mut groups = Vec::new();
    let mut next_token: Option<String> = None;
    loop {
        let resp = client
            .describe_security_groups()
            .set_group_ids(ids.clone())
            .set_next_token(next_token.take())
            .send()
            .await
            .map_err(|e| map_sdk_error("DescribeSecurityGroups", e, KostyError::Operation))?;

        for group in resp.security_groups() {
            groups.push(SecurityGroup {
                id: group.group_id().unwrap_or_default().to_string(),
                name: group.group_name().unwrap_or_default().to_string(),
                description: group.description().unwrap_or_default().to_string(),
                ingress: group
                    .ip_permissions()
                    .iter()
                    .map(|p| IngressRule {
                        protocol: p.ip_protocol().unwrap_or("-1").to_string(),
                        from_port: p.from_port(),
                        to_port: p.to_port(),
                        ipv4_ranges: p.ip_ranges().iter().filter_map(|r| r.cidr_ip().map(str::to_string)).collect(),
                        ipv6_ranges: p
                            .ipv6_ranges()
                            .iter()
                            .filter_map(|r| r.cidr_ipv6().map(str::to_string))
                            .collect(),
                    })
                    .collect(),
                egress_count: group.ip_permissions_egress().len(),
            });
        }

        match resp.next_token() {
            Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
            _ => return Ok(groups),
        }
    }
}

/// Group ids referenced by any network interface (instances, load
/// balancers, databases, functions).
pub async fn groups_in_use(client: &Client) -> Result<HashSet<String>, KostyError> {
    let mut in_use = HashSet::new();
    let mut next_token: Option<String> = None;
    loop {
        let resp = client
            .describe_network_interfaces()
            .set_next_token(next_token.take())
            .send()
            .await
            .map_err(|e| map_sdk_error("DescribeNetworkInterfaces", e, KostyError::Operation))?;

        for eni in resp.network_interfaces() {
            in_use.extend(eni.groups().iter().filter_map(|g| g.group_id().map(str::to_string)));
        }

        match resp.next_token() {
            Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
            _ => return Ok(in_use),
        }
    }
}
