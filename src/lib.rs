//! Cost and security audits over one AWS account or a whole organization.
//!
//! An [`pipeline::AuditExecutor`] resolves the accounts in scope, runs one
//! named operation of one [`services::AuditService`] per account and region
//! under a bounded worker pool, and returns a per-account
//! [`models::ScanResult`]. A [`reporting::Reporter`] aggregates results and
//! renders them as console text, JSON or CSV.

pub mod auth;
pub mod cli;
pub mod cloud;
pub mod config;
pub mod errors;
pub mod models;
pub mod pipeline;
pub mod pricing;
pub mod progress;
pub mod reporting;
pub mod scope;
pub mod services;
pub mod utils;
