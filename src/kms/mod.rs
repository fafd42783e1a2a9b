//! Key-management service implementations
//!
//! - [`StaticKeyManagementService`]: in-process KEKs for tests and development
//! - `AwsKeyManagementService`: AWS KMS, behind the `aws-kms` feature
//!
//! Anything else (Cloud KMS, Vault transit, an HSM) plugs in by implementing
//! [`KeyManagementService`](crate::KeyManagementService).

mod static_kms;

#[cfg(feature = "aws-kms")]
mod aws;

pub use static_kms::StaticKeyManagementService;

#[cfg(feature = "aws-kms")]
pub use aws::AwsKeyManagementService;
