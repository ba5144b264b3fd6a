//! IAM-backed key store
//!
//! Key lifecycle calls go through the operator's session. Verification is
//! the exception: it builds a throwaway STS client from the new key's
//! static credentials so the call proves the new key works on its own.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_iam::primitives::DateTime as AwsDateTime;
use aws_sdk_iam::types::StatusType;
use aws_sdk_sts::config::Credentials;
use chrono::{DateTime, Utc};
use tracing::debug;

use keyrot_core::{
    AccessKeyPair, CallerIdentity, IdentityKeyStore, KeyAdministration, KeyId, KeyMetadata,
    KeyStatus, MfaDevice, Principal, RemoteResult, SecretKey,
};

use crate::error::{classify, missing};

/// Provider name attached to the verification credentials
const VERIFY_PROVIDER: &str = "keyrot-verify";

/// Access keys managed through IAM
#[derive(Debug, Clone)]
pub struct IamKeyStore {
    iam: aws_sdk_iam::Client,
    sdk_config: SdkConfig,
}

impl IamKeyStore {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            iam: aws_sdk_iam::Client::new(sdk_config),
            sdk_config: sdk_config.clone(),
        }
    }

    /// STS client that signs with `pair` and nothing else
    fn scoped_sts(&self, pair: &AccessKeyPair) -> aws_sdk_sts::Client {
        let credentials = Credentials::new(
            pair.id.as_str(),
            pair.secret.expose(),
            None,
            None,
            VERIFY_PROVIDER,
        );
        let config = aws_sdk_sts::config::Builder::from(&self.sdk_config)
            .credentials_provider(credentials)
            .build();
        aws_sdk_sts::Client::from_conf(config)
    }
}

#[async_trait]
impl IdentityKeyStore for IamKeyStore {
    async fn create_key(&self, principal: &Principal) -> RemoteResult<AccessKeyPair> {
        let output = self
            .iam
            .create_access_key()
            .user_name(principal.as_str())
            .send()
            .await
            .map_err(|e| classify("create_key", e))?;

        let key = output
            .access_key()
            .ok_or_else(|| missing("create_key", "an access key"))?;

        Ok(AccessKeyPair::new(
            KeyId::new(key.access_key_id()),
            SecretKey::new(key.secret_access_key()),
            principal.clone(),
            key.create_date().and_then(to_utc).unwrap_or_else(Utc::now),
        ))
    }

    async fn verify_key(&self, pair: &AccessKeyPair) -> RemoteResult<bool> {
        let output = self
            .scoped_sts(pair)
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| classify("verify_key", e))?;

        let arn = output.arn().ok_or_else(|| missing("verify_key", "a caller ARN"))?;
        let matches = arn_names_user(arn, &pair.owner);
        if !matches {
            debug!(arn, principal = %pair.owner, "new key resolved to a different identity");
        }
        Ok(matches)
    }

    async fn list_keys(&self, principal: &Principal) -> RemoteResult<Vec<KeyMetadata>> {
        let mut keys = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let output = self
                .iam
                .list_access_keys()
                .user_name(principal.as_str())
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| classify("list_keys", e))?;

            for meta in output.access_key_metadata() {
                let id = match meta.access_key_id() {
                    Some(id) => KeyId::new(id),
                    None => continue,
                };
                keys.push(KeyMetadata {
                    id,
                    owner: principal.clone(),
                    status: to_status(meta.status()),
                    created_at: meta.create_date().and_then(to_utc),
                });
            }

            match output.marker() {
                Some(next) if output.is_truncated() => marker = Some(next.to_string()),
                _ => break,
            }
        }

        Ok(keys)
    }

    async fn delete_key(&self, principal: &Principal, key_id: &KeyId) -> RemoteResult<()> {
        self.iam
            .delete_access_key()
            .user_name(principal.as_str())
            .access_key_id(key_id.as_str())
            .send()
            .await
            .map_err(|e| classify("delete_key", e))?;
        Ok(())
    }
}

#[async_trait]
impl KeyAdministration for IamKeyStore {
    async fn current_identity(&self) -> RemoteResult<CallerIdentity> {
        let output = self
            .iam
            .get_user()
            .send()
            .await
            .map_err(|e| classify("current_identity", e))?;

        let user = output
            .user()
            .ok_or_else(|| missing("current_identity", "a user"))?;

        Ok(CallerIdentity {
            principal: Principal::new(user.user_name()),
            arn: user.arn().to_string(),
            user_id: user.user_id().to_string(),
        })
    }

    async fn set_key_status(
        &self,
        principal: &Principal,
        key_id: &KeyId,
        status: KeyStatus,
    ) -> RemoteResult<()> {
        let status = match status {
            KeyStatus::Active => StatusType::Active,
            KeyStatus::Inactive => StatusType::Inactive,
        };

        self.iam
            .update_access_key()
            .user_name(principal.as_str())
            .access_key_id(key_id.as_str())
            .status(status)
            .send()
            .await
            .map_err(|e| classify("set_key_status", e))?;
        Ok(())
    }

    async fn mfa_devices(&self, principal: &Principal) -> RemoteResult<Vec<MfaDevice>> {
        let mut devices = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let output = self
                .iam
                .list_mfa_devices()
                .user_name(principal.as_str())
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| classify("mfa_devices", e))?;

            for device in output.mfa_devices() {
                let enabled_at = to_utc(device.enable_date())
                    .ok_or_else(|| missing("mfa_devices", "a valid enable date"))?;
                devices.push(MfaDevice {
                    serial_number: device.serial_number().to_string(),
                    enabled_at,
                });
            }

            match output.marker() {
                Some(next) if output.is_truncated() => marker = Some(next.to_string()),
                _ => break,
            }
        }

        Ok(devices)
    }
}

/// Whether `arn` is the IAM user `principal` (any path)
///
/// `arn:aws:iam::123456789012:user/division/alice` names `alice`.
pub fn arn_names_user(arn: &str, principal: &Principal) -> bool {
    let resource = match arn.splitn(6, ':').nth(5) {
        Some(resource) => resource,
        None => return false,
    };

    match resource.strip_prefix("user/") {
        Some(path) => path.rsplit('/').next() == Some(principal.as_str()),
        None => false,
    }
}

fn to_utc(timestamp: &AwsDateTime) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(timestamp.secs(), timestamp.subsec_nanos())
}

fn to_status(status: Option<&StatusType>) -> KeyStatus {
    match status {
        Some(StatusType::Active) => KeyStatus::Active,
        _ => KeyStatus::Inactive,
    }
}
