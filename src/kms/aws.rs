use crate::error::{Error, Result};
use crate::KeyManagementService;
use async_trait::async_trait;
use aws_sdk_kms::primitives::Blob;
use aws_sdk_kms::types::EncryptionAlgorithmSpec;
use aws_sdk_kms::Client as AwsSdkKmsClient;
use std::fmt;

/// URI scheme accepted in front of key ids and ARNs
pub const AWS_KMS_PREFIX: &str = "aws-kms://";

/// AWS KMS implementation of the KeyManagementService trait
///
/// Key URIs are key ids, aliases or ARNs, optionally prefixed with `aws-kms://`.
pub struct AwsKeyManagementService {
    client: AwsSdkKmsClient,
}

impl fmt::Debug for AwsKeyManagementService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsKeyManagementService").finish()
    }
}

impl AwsKeyManagementService {
    /// Wraps an existing SDK client
    pub fn new(client: AwsSdkKmsClient) -> Self {
        Self { client }
    }

    /// Builds a client from the default AWS environment (credentials chain, region)
    pub async fn from_env() -> Self {
        let config = aws_config::load_from_env().await;
        Self::new(AwsSdkKmsClient::new(&config))
    }
}

fn key_id(key_uri: &str) -> &str {
    key_uri.strip_prefix(AWS_KMS_PREFIX).unwrap_or(key_uri)
}

#[async_trait]
impl KeyManagementService for AwsKeyManagementService {
    async fn encrypt_key(&self, key_uri: &str, key: &[u8]) -> Result<Vec<u8>> {
        let result = self
            .client
            .encrypt()
            .key_id(key_id(key_uri))
            .encryption_algorithm(EncryptionAlgorithmSpec::SymmetricDefault)
            .plaintext(Blob::new(key.to_vec()))
            .send()
            .await
            .map_err(|e| Error::BackendUnavailable(format!("KMS encrypt error: {}", e)))?;

        result
            .ciphertext_blob()
            .map(|b| b.as_ref().to_vec())
            .ok_or_else(|| Error::BackendUnavailable("No ciphertext blob returned from KMS".into()))
    }

    async fn decrypt_key(&self, key_uri: &str, encrypted_key: &[u8]) -> Result<Vec<u8>> {
        let result = self
            .client
            .decrypt()
            .key_id(key_id(key_uri))
            .encryption_algorithm(EncryptionAlgorithmSpec::SymmetricDefault)
            .ciphertext_blob(Blob::new(encrypted_key.to_vec()))
            .send()
            .await
            .map_err(|e| Error::BackendUnavailable(format!("KMS decrypt error: {}", e)))?;

        result
            .plaintext()
            .map(|b| b.as_ref().to_vec())
            .ok_or_else(|| Error::BackendUnavailable("No plaintext returned from KMS".into()))
    }
}
