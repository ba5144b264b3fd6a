//! Shared AWS configuration

use aws_config::{BehaviorVersion, Region, SdkConfig};
use tracing::debug;

use crate::iam::IamKeyStore;
use crate::secrets::SecretsManagerVault;

/// Loaded AWS configuration for the operator's session
#[derive(Debug, Clone)]
pub struct AwsSession {
    config: SdkConfig,
}

impl AwsSession {
    /// Load shared config, optionally pinning a named profile and region
    ///
    /// Without a profile the default provider chain is used (environment,
    /// `default` profile, instance metadata).
    pub async fn load(profile: Option<&str>, region: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());

        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }

        let config = loader.load().await;
        debug!(
            profile = profile.unwrap_or("default"),
            region = ?config.region(),
            "loaded AWS configuration"
        );

        Self { config }
    }

    /// Wrap an existing SDK configuration
    pub fn from_config(config: SdkConfig) -> Self {
        Self { config }
    }

    pub fn sdk_config(&self) -> &SdkConfig {
        &self.config
    }

    pub fn region(&self) -> Option<String> {
        self.config.region().map(|r| r.to_string())
    }

    /// IAM-backed key store
    pub fn key_store(&self) -> IamKeyStore {
        IamKeyStore::new(&self.config)
    }

    /// Secrets Manager-backed vault
    pub fn vault(&self) -> SecretsManagerVault {
        SecretsManagerVault::new(&self.config)
    }
}
