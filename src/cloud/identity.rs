use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::KostyError;
use crate::models::AccountPage;

/// Short-lived credential triple returned by a role assumption.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("session_token", &"[REDACTED]")
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// An authenticated identity that audit operations run under.
///
/// `Ambient` means whatever the default credential chain resolves to;
/// `Assumed` carries temporary credentials for exactly one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    Ambient,
    Assumed {
        account_id: String,
        credentials: Credentials,
    },
}

impl Session {
    pub fn assumed(account_id: impl Into<String>, credentials: Credentials) -> Self {
        Self::Assumed {
            account_id: account_id.into(),
            credentials,
        }
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        match self {
            Self::Ambient => None,
            Self::Assumed { credentials, .. } => Some(credentials),
        }
    }

    /// Account id when it is known without a network call.
    pub fn account_id(&self) -> Option<&str> {
        match self {
            Self::Ambient => None,
            Self::Assumed { account_id, .. } => Some(account_id),
        }
    }

    pub fn is_ambient(&self) -> bool {
        matches!(self, Self::Ambient)
    }
}

/// Parameters of one role assumption.
#[derive(Debug, Clone)]
pub struct AssumeRoleInput {
    /// Identity the assumption is made from.
    pub source: Session,
    pub role_arn: String,
    pub session_name: String,
    pub duration_seconds: i32,
    pub mfa: Option<MfaToken>,
}

#[derive(Debug, Clone)]
pub struct MfaToken {
    pub serial_number: String,
    pub token_code: String,
}

/// The cloud identity boundary: who-am-I, assume-role and organization listing.
#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// Account id of the identity behind `session`.
    async fn caller_account_id(&self, session: &Session) -> Result<String, KostyError>;

    /// Exchange the source identity for temporary credentials of `role_arn`.
    /// Throttling must surface as `KostyError::Throttled`.
    async fn assume_role(&self, input: &AssumeRoleInput) -> Result<Credentials, KostyError>;

    /// One page of organization members. An account outside any organization
    /// must surface as `KostyError::NotInOrganization`.
    async fn list_accounts_page(
        &self,
        session: &Session,
        next_token: Option<String>,
    ) -> Result<AccountPage, KostyError>;
}
