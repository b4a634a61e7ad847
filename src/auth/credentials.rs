use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, info};

use super::mfa::MfaPrompt;
use crate::cloud::{AssumeRoleInput, IdentityClient, MfaToken, Session};
use crate::errors::{with_retry, KostyError, RetryConfig};

pub const DEFAULT_DURATION_SECONDS: i32 = 3600;
pub const DEFAULT_PARTITION: &str = "aws";
const SESSION_NAME_MAX: usize = 64;

static SESSION_NAME_INVALID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w+=,.@-]").expect("valid session name pattern"));

/// `arn:<partition>:iam::<account_id>:role/<role_name>`
pub fn role_arn(partition: &str, account_id: &str, role_name: &str) -> String {
    format!("arn:{}:iam::{}:role/{}", partition, account_id, role_name)
}

/// Deterministic, human-traceable role session name: `<hint>-<account_id>`,
/// restricted to the characters STS accepts and at most 64 long.
pub fn session_name(hint: &str, account_id: &str) -> String {
    let hint = if hint.trim().is_empty() { "kosty" } else { hint.trim() };
    let raw = format!("{}-{}", hint, account_id);
    let cleaned = SESSION_NAME_INVALID.replace_all(&raw, "-");
    cleaned.chars().take(SESSION_NAME_MAX).collect()
}

/// Settings for the single, non-parallel "current session" acquisition.
#[derive(Debug, Clone, Default)]
pub struct CurrentSessionConfig {
    /// Role to assume for the current session; ambient identity when unset.
    pub role_arn: Option<String>,
    pub mfa_serial: Option<String>,
    pub session_name: Option<String>,
    pub duration_seconds: Option<i32>,
}

/// Turns a target account into an authenticated `Session`.
///
/// Holds the current session (ambient, or assumed once at startup) and uses
/// it as the source identity for every cross-account assumption.
pub struct CredentialProvider {
    identity: Arc<dyn IdentityClient>,
    current: Session,
    partition: String,
    duration_seconds: i32,
    retry: RetryConfig,
}

impl CredentialProvider {
    pub fn new(identity: Arc<dyn IdentityClient>) -> Self {
        Self {
            identity,
            current: Session::Ambient,
            partition: DEFAULT_PARTITION.to_string(),
            duration_seconds: DEFAULT_DURATION_SECONDS,
            retry: RetryConfig::default(),
        }
    }

    /// Establish the current session. When a role ARN is configured it is
    /// assumed once, prompting for an MFA code first if a serial is set.
    /// Must be called before any concurrent work starts.
    pub async fn establish(
        identity: Arc<dyn IdentityClient>,
        config: &CurrentSessionConfig,
        prompt: Arc<dyn MfaPrompt>,
    ) -> Result<Self, KostyError> {
        let mut provider = Self::new(identity);
        if let Some(duration) = config.duration_seconds {
            provider = provider.with_duration(duration);
        }

        let Some(role_arn) = config.role_arn.as_deref() else {
            return Ok(provider);
        };

        let mfa = match config.mfa_serial.clone() {
            Some(serial) => {
                let serial_for_prompt = serial.clone();
                let token_code = tokio::task::spawn_blocking(move || prompt.token_code(&serial_for_prompt))
                    .await
                    .map_err(|e| KostyError::Internal(format!("MFA prompt task failed: {}", e)))??;
                Some(MfaToken { serial_number: serial, token_code })
            }
            None => None,
        };

        let input = AssumeRoleInput {
            source: Session::Ambient,
            role_arn: role_arn.to_string(),
            session_name: config
                .session_name
                .clone()
                .unwrap_or_else(|| "kosty-session".to_string()),
            duration_seconds: provider.duration_seconds,
            mfa,
        };

        // MFA codes are single-use, so this call is never retried.
        let credentials = provider.identity.assume_role(&input).await?;
        let account_id = role_account_id(role_arn).unwrap_or_default();
        info!(role_arn, "Established current session from configured role");
        provider.current = Session::assumed(account_id, credentials);
        Ok(provider)
    }

    pub fn with_duration(mut self, duration_seconds: i32) -> Self {
        self.duration_seconds = duration_seconds;
        self
    }

    pub fn with_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = partition.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn current_session(&self) -> Session {
        self.current.clone()
    }

    pub fn identity(&self) -> Arc<dyn IdentityClient> {
        self.identity.clone()
    }

    /// "Who am I" for the current session.
    pub async fn caller_account_id(&self) -> Result<String, KostyError> {
        let identity = self.identity.clone();
        let session = self.current.clone();
        with_retry("GetCallerIdentity", &self.retry, || {
            let identity = identity.clone();
            let session = session.clone();
            async move { identity.caller_account_id(&session).await }
        })
        .await
    }

    /// Acquire a session for `account_id`.
    ///
    /// No account, or the caller's own account with no role requested,
    /// yields the current session without a network round trip beyond the
    /// identity lookup. Otherwise `role_name` in that account is assumed.
    pub async fn acquire(
        &self,
        account_id: Option<&str>,
        role_name: &str,
        session_name_hint: &str,
    ) -> Result<Session, KostyError> {
        let Some(account_id) = account_id else {
            return Ok(self.current.clone());
        };

        if role_name.trim().is_empty() {
            let caller = self.caller_account_id().await?;
            if caller == account_id {
                return Ok(self.current.clone());
            }
            return Err(KostyError::Auth(format!(
                "No cross-account role given for account {}",
                account_id
            )));
        }

        let input = AssumeRoleInput {
            source: self.current.clone(),
            role_arn: role_arn(&self.partition, account_id, role_name),
            session_name: session_name(session_name_hint, account_id),
            duration_seconds: self.duration_seconds,
            mfa: None,
        };
        debug!(account = %account_id, role_arn = %input.role_arn, "Assuming cross-account role");

        let identity = self.identity.clone();
        let credentials = with_retry("AssumeRole", &self.retry, || {
            let identity = identity.clone();
            let input = input.clone();
            async move { identity.assume_role(&input).await }
        })
        .await?;

        Ok(Session::assumed(account_id, credentials))
    }
}

/// Account id segment of an IAM role ARN.
fn role_account_id(arn: &str) -> Option<String> {
    let account = arn.split(':').nth(4)?;
    (!account.is_empty()).then(|| account.to_string())
}
