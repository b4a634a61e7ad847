pub mod registry;
pub mod rules;
#[cfg(feature = "aws")]
mod ec2;
#[cfg(feature = "aws")]
pub mod eip;
#[cfg(feature = "aws")]
pub mod sg;

pub use registry::{
    operation_names, run_checks, AuditService, CheckDescriptor, Operation, OperationContext, ServiceRegistry,
    SERVICE_REGISTRY,
};
