pub mod credentials;
pub mod mfa;

pub use credentials::{role_arn, session_name, CredentialProvider, CurrentSessionConfig};
pub use mfa::{ConsolePrompt, MfaPrompt, StaticPrompt};
