//! Secrets Manager-backed vault

use async_trait::async_trait;
use aws_config::SdkConfig;
use tracing::debug;

use keyrot_core::{RemoteResult, SecretVault};

use crate::error::classify;

/// Named secrets in AWS Secrets Manager
///
/// `put_secret` creates the secret on first use and writes a new current
/// version on every later rotation.
#[derive(Debug, Clone)]
pub struct SecretsManagerVault {
    client: aws_sdk_secretsmanager::Client,
}

impl SecretsManagerVault {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_secretsmanager::Client::new(sdk_config),
        }
    }
}

#[async_trait]
impl SecretVault for SecretsManagerVault {
    async fn put_secret(&self, name: &str, payload: &str) -> RemoteResult<()> {
        let created = self
            .client
            .create_secret()
            .name(name)
            .secret_string(payload)
            .send()
            .await;

        let err = match created {
            Ok(_) => {
                debug!(secret_name = name, "created secret");
                return Ok(());
            }
            Err(err) => err,
        };

        let exists = err
            .as_service_error()
            .map(|e| e.is_resource_exists_exception())
            .unwrap_or(false);
        if !exists {
            return Err(classify("put_secret", err));
        }

        self.client
            .put_secret_value()
            .secret_id(name)
            .secret_string(payload)
            .send()
            .await
            .map_err(|e| classify("put_secret", e))?;

        debug!(secret_name = name, "wrote new secret version");
        Ok(())
    }
}
