use std::sync::Arc;

use super::cache::PriceCache;
use crate::models::Finding;

pub const HOURS_PER_MONTH: f64 = 730.0;
pub const CURRENCY: &str = "USD";

const EIP_HOURLY: f64 = 0.005;
const NAT_HOURLY: f64 = 0.045;
const ALB_HOURLY: f64 = 0.0225;
const SNAPSHOT_GB_MONTH: f64 = 0.05;
const S3_STANDARD_DEFAULT: f64 = 0.023;

/// Public on-demand list prices, USD per GB-month.
fn ebs_gb_month(volume_type: &str) -> Option<f64> {
    match volume_type {
        "gp2" => Some(0.10),
        "gp3" => Some(0.08),
        "io1" | "io2" => Some(0.125),
        "st1" => Some(0.045),
        "sc1" => Some(0.015),
        "standard" => Some(0.05),
        _ => None,
    }
}

fn s3_standard_gb_month(region: &str) -> f64 {
    match region {
        "us-east-1" | "us-east-2" | "us-west-2" | "eu-west-1" => 0.023,
        "us-west-1" | "ap-southeast-1" | "ap-northeast-1" => 0.025,
        "eu-central-1" => 0.024,
        _ => S3_STANDARD_DEFAULT,
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Annotates cost findings with an estimated `MonthlyCost`.
#[derive(Debug, Clone, Default)]
pub struct CostCalculator {
    cache: Arc<PriceCache>,
}

impl CostCalculator {
    pub fn new(cache: Arc<PriceCache>) -> Self {
        Self { cache }
    }

    fn cached(&self, key: String, lookup: impl FnOnce() -> Option<f64>) -> Option<f64> {
        self.cache.get_or_insert_with(&key, lookup)
    }

    pub fn ebs_volume(&self, size_gb: f64, volume_type: &str, region: &str) -> Option<f64> {
        let per_gb = self.cached(format!("ebs_{}_{}", volume_type, region), || ebs_gb_month(volume_type))?;
        Some(round_cents(size_gb * per_gb))
    }

    pub fn eip(&self, region: &str) -> Option<f64> {
        let hourly = self.cached(format!("eip_{}", region), || Some(EIP_HOURLY))?;
        Some(round_cents(hourly * HOURS_PER_MONTH))
    }

    pub fn nat_gateway(&self, region: &str) -> Option<f64> {
        let hourly = self.cached(format!("nat_{}", region), || Some(NAT_HOURLY))?;
        Some(round_cents(hourly * HOURS_PER_MONTH))
    }

    pub fn load_balancer(&self, region: &str) -> Option<f64> {
        let hourly = self.cached(format!("alb_{}", region), || Some(ALB_HOURLY))?;
        Some(round_cents(hourly * HOURS_PER_MONTH))
    }

    pub fn s3_storage(&self, size_gb: f64, region: &str) -> Option<f64> {
        if size_gb <= 0.0 {
            return None;
        }
        let per_gb = self.cached(format!("s3_{}", region), || Some(s3_standard_gb_month(region)))?;
        Some(round_cents(size_gb * per_gb))
    }

    pub fn snapshot(&self, size_gb: f64, region: &str) -> Option<f64> {
        if size_gb <= 0.0 {
            return None;
        }
        let per_gb = self.cached(format!("snapshot_{}", region), || Some(SNAPSHOT_GB_MONTH))?;
        Some(round_cents(size_gb * per_gb))
    }

    /// Monthly cost for `finding`, if its service and check are priced.
    pub fn estimate(&self, finding: &Finding) -> Option<f64> {
        if !finding.is_cost() {
            return None;
        }
        let service = finding.service.to_ascii_lowercase();
        let check = finding.check.as_str();
        let region = finding.region.as_str();
        let size_gb = || {
            finding
                .detail_f64("SizeGB")
                .or_else(|| finding.detail_f64("size_gb"))
                .or_else(|| finding.detail_f64("VolumeSizeGB"))
        };

        match service.as_str() {
            "ebs" if check.contains("orphan") => {
                let volume_type = finding
                    .detail_str("VolumeType")
                    .or_else(|| finding.detail_str("volume_type"))
                    .unwrap_or("gp2");
                self.ebs_volume(size_gb()?, volume_type, region)
            }
            "ebs" | "snapshots" if check.contains("old_snapshots") => self.snapshot(size_gb()?, region),
            "eip" if check.contains("unattached") || check.contains("stopped") => self.eip(region),
            "nat" if check.contains("unused") => self.nat_gateway(region),
            "lb" | "loadbalancer" if check.contains("no_healthy_targets") => self.load_balancer(region),
            "s3" if check.contains("lifecycle") => self.s3_storage(size_gb()?, region),
            "backup" if check.contains("empty") => Some(0.0),
            _ => None,
        }
    }

    /// Set `MonthlyCost`/`CostCurrency` on `finding` when it can be priced.
    pub fn annotate(&self, finding: &mut Finding) {
        if let Some(cost) = self.estimate(finding) {
            finding.monthly_cost = Some(cost);
            finding.cost_currency = Some(CURRENCY.to_string());
        }
    }
}
