pub mod identity;
#[cfg(feature = "aws")]
pub mod aws;

pub use identity::{AssumeRoleInput, Credentials, IdentityClient, MfaToken, Session};
#[cfg(feature = "aws")]
pub use aws::AwsIdentityClient;
