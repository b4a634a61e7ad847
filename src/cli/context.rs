use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::auth::CredentialProvider;
use crate::config::{self, CliOverrides, Settings};
use crate::errors::KostyError;
use crate::models::{AuditRequest, OperationParams};
use crate::pricing::CostCalculator;
use crate::progress::should_display;
use crate::scope::ScopeResolver;

/// Flags every subcommand sees.
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub quiet: bool,
    pub config_file: Option<PathBuf>,
    pub profile: String,
}

/// Effective settings plus the shared collaborators of one invocation.
pub struct RunContext {
    pub settings: Settings,
    pub provider: Arc<CredentialProvider>,
    pub scope: Arc<ScopeResolver>,
    pub calculator: Arc<CostCalculator>,
    pub show_progress: bool,
    pub cancel: CancellationToken,
}

impl RunContext {
    pub async fn build(
        global: &GlobalOptions,
        overrides: &CliOverrides,
        cancel: CancellationToken,
    ) -> Result<Self, KostyError> {
        let settings = load(global, overrides).await?;
        let provider = Arc::new(connect(&settings).await?);
        let scope = Arc::new(ScopeResolver::new(provider.clone()).with_excluded_accounts(settings.exclude.accounts.clone()));

        Ok(Self {
            settings,
            provider,
            scope,
            calculator: Arc::new(CostCalculator::default()),
            show_progress: should_display(global.quiet),
            cancel,
        })
    }

    /// Request for `operation` from the effective settings. CLI parameters
    /// win over configured thresholds.
    pub fn request(&self, operation: &str, params: OperationParams) -> Result<AuditRequest, KostyError> {
        let regions = self.settings.scan_regions();
        if regions.is_empty() {
            return Err(KostyError::Config("Every configured region is excluded".into()));
        }
        let max_workers = usize::try_from(self.settings.max_workers)
            .map_err(|_| KostyError::Config("max_workers must be a positive integer".into()))?;

        let mut params = params;
        params.merge_missing(&self.settings.thresholds);

        AuditRequest::builder(operation)
            .organization(self.settings.organization)
            .regions(regions)
            .max_workers(max_workers)
            .role_name(self.settings.cross_account_role.clone())
            .admin_account(self.settings.org_admin_account_id.clone())
            .params(params)
            .build()
    }

    /// Directory reports are written to; the working directory by default.
    pub fn output_dir(&self) -> PathBuf {
        self.settings.save_to.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Locate and layer configuration, apply CLI flags, validate the result.
pub async fn load(global: &GlobalOptions, overrides: &CliOverrides) -> Result<Settings, KostyError> {
    let (settings, path) = config::load_settings(global.config_file.as_deref(), &global.profile).await?;
    match &path {
        Some(p) => debug!(path = %p.display(), profile = %settings.profile, "Using configuration file"),
        None => debug!("No configuration file found, using built-in defaults"),
    }
    let settings = settings.with_overrides(overrides);
    config::validate_settings(&settings)?;
    Ok(settings)
}

/// Parse repeated `--param key=value` flags.
pub fn parse_params(raw: &[String]) -> Result<OperationParams, KostyError> {
    let mut params = OperationParams::new();
    for pair in raw {
        let (key, value) = OperationParams::parse_pair(pair)?;
        params.insert(key, value);
    }
    Ok(params)
}

#[cfg(feature = "aws")]
async fn connect(settings: &Settings) -> Result<CredentialProvider, KostyError> {
    use crate::auth::{ConsolePrompt, CurrentSessionConfig};
    use crate::cloud::AwsIdentityClient;

    let home_region = settings
        .regions
        .first()
        .cloned()
        .unwrap_or_else(|| crate::models::DEFAULT_REGION.to_string());
    let identity = Arc::new(AwsIdentityClient::new(home_region));

    let duration = i32::try_from(settings.duration_seconds)
        .map_err(|_| KostyError::Config("duration_seconds is out of range".into()))?;
    let session = CurrentSessionConfig {
        role_arn: settings.role_arn.clone(),
        mfa_serial: settings.mfa_serial.clone(),
        session_name: None,
        duration_seconds: Some(duration),
    };

    let provider = CredentialProvider::establish(identity, &session, Arc::new(ConsolePrompt::new()))
        .await
        .map_err(|e| match e {
            KostyError::Auth(_) => e,
            other => KostyError::Auth(format!("Could not establish session: {}", other)),
        })?;
    if settings.role_arn.is_some() {
        tracing::info!("Using configured role for the current session");
    }
    Ok(provider)
}

#[cfg(not(feature = "aws"))]
async fn connect(_settings: &Settings) -> Result<CredentialProvider, KostyError> {
    Err(KostyError::Config("kosty was built without the `aws` feature".into()))
}
