//! AWS implementation of the identity boundary (STS + Organizations) and the
//! shared SDK configuration used by the EC2-backed audit services.

use std::time::SystemTime;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_sts::config::{Credentials as SdkCredentials, Region};
use aws_sdk_sts::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use chrono::DateTime;
use tracing::debug;

use super::identity::{AssumeRoleInput, Credentials, IdentityClient, Session};
use crate::errors::KostyError;
use crate::models::{Account, AccountPage, AccountStatus, DEFAULT_REGION};

const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "TooManyRequestsException",
    "RequestLimitExceeded",
];

const ACCESS_DENIED_CODES: &[&str] = &["AccessDenied", "AccessDeniedException", "UnauthorizedOperation"];

/// Build SDK configuration for `session` in `region`.
pub async fn sdk_config(session: &Session, region: &str) -> SdkConfig {
    let loader = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()));

    let loader = match session.credentials() {
        Some(creds) => loader.credentials_provider(SdkCredentials::new(
            creds.access_key_id.clone(),
            creds.secret_access_key.clone(),
            Some(creds.session_token.clone()),
            creds.expiration.map(SystemTime::from),
            "kosty-assume-role",
        )),
        None => loader,
    };

    loader.load().await
}

/// Translate an SDK error into the crate taxonomy. Throttling, timeouts and
/// access denials get their own variants; anything else goes to `fallback`.
pub fn map_sdk_error<E, R>(context: &str, err: SdkError<E, R>, fallback: fn(String) -> KostyError) -> KostyError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    if matches!(err, SdkError::TimeoutError(_)) {
        return KostyError::Timeout(format!("{} timed out", context));
    }

    let code = err.as_service_error().and_then(|e| e.code()).map(str::to_string);
    let message = format!("{}: {}", context, DisplayErrorContext(&err));

    match code.as_deref() {
        Some("AWSOrganizationsNotInUseException") => KostyError::NotInOrganization(message),
        Some(c) if THROTTLING_CODES.contains(&c) => KostyError::Throttled(message),
        Some(c) if ACCESS_DENIED_CODES.contains(&c) => KostyError::Auth(message),
        _ => fallback(message),
    }
}

/// STS and Organizations client. Both APIs are called in `home_region`.
#[derive(Debug, Clone)]
pub struct AwsIdentityClient {
    home_region: String,
}

impl AwsIdentityClient {
    pub fn new(home_region: impl Into<String>) -> Self {
        Self { home_region: home_region.into() }
    }
}

impl Default for AwsIdentityClient {
    fn default() -> Self {
        Self::new(DEFAULT_REGION)
    }
}

#[async_trait]
impl IdentityClient for AwsIdentityClient {
    async fn caller_account_id(&self, session: &Session) -> Result<String, KostyError> {
        if let Some(account_id) = session.account_id() {
            return Ok(account_id.to_string());
        }

        let config = sdk_config(session, &self.home_region).await;
        let client = aws_sdk_sts::Client::new(&config);
        let resp = client
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| map_sdk_error("GetCallerIdentity", e, KostyError::Auth))?;

        resp.account()
            .map(str::to_string)
            .ok_or_else(|| KostyError::Auth("GetCallerIdentity returned no account id".into()))
    }

    async fn assume_role(&self, input: &AssumeRoleInput) -> Result<Credentials, KostyError> {
        let config = sdk_config(&input.source, &self.home_region).await;
        let client = aws_sdk_sts::Client::new(&config);

        let mut request = client
            .assume_role()
            .role_arn(&input.role_arn)
            .role_session_name(&input.session_name)
            .duration_seconds(input.duration_seconds);
        if let Some(mfa) = &input.mfa {
            request = request
                .serial_number(&mfa.serial_number)
                .token_code(&mfa.token_code);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| map_sdk_error(&format!("AssumeRole {}", input.role_arn), e, KostyError::Auth))?;

        let creds = resp.credentials().ok_or_else(|| {
            KostyError::Auth(format!("AssumeRole {} returned no credentials", input.role_arn))
        })?;
        debug!(role_arn = %input.role_arn, session = %input.session_name, "Assumed role");

        Ok(Credentials {
            access_key_id: creds.access_key_id().to_string(),
            secret_access_key: creds.secret_access_key().to_string(),
            session_token: creds.session_token().to_string(),
            expiration: DateTime::from_timestamp(creds.expiration().secs(), 0),
        })
    }

    async fn list_accounts_page(
        &self,
        session: &Session,
        next_token: Option<String>,
    ) -> Result<AccountPage, KostyError> {
        let config = sdk_config(session, &self.home_region).await;
        let client = aws_sdk_organizations::Client::new(&config);
        let resp = client
            .list_accounts()
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| map_sdk_error("ListAccounts", e, KostyError::Scope))?;

        #[allow(deprecated)]
        let accounts = resp
            .accounts()
            .iter()
            .filter_map(|account| {
                let id = account.id()?;
                let status = account
                    .status()
                    .map(|s| AccountStatus::parse(s.as_str()))
                    .unwrap_or_else(|| AccountStatus::Other("UNKNOWN".into()));
                Some(Account::new(id, status))
            })
            .collect();

        Ok(AccountPage {
            accounts,
            next_token: resp.next_token().map(str::to_string),
        })
    }
}
