// Provisioning scenarios: mint then restore, failures and deadlines

use crate::integration::common::{
    create_provisioner, create_shared_key, create_static_kms, FailingKms, SlowKms, KEY_URI,
    OTHER_KEY_URI,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use msgenvelope::kms::StaticKeyManagementService;
use msgenvelope::policy::EnvelopePolicy;
use msgenvelope::{BackendKind, EnvelopeHandle, Error, KeyProvisioner, ProvisionRequest};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_mint_then_restore_service_wrapped_direct() {
    let first = create_provisioner(create_static_kms());
    let minted = first
        .provision(ProvisionRequest::new(BackendKind::ServiceWrappedDirect, KEY_URI, ""))
        .await
        .unwrap();
    assert!(!minted.handle().wrapped_key().is_empty());

    let sealed = minted.seal(b"hello", b"").unwrap();

    // The handle crosses the wire as JSON
    let wire = minted.handle().to_json().unwrap();
    let handle = EnvelopeHandle::from_json(&wire).unwrap();

    let second = create_provisioner(create_static_kms());
    let restored = second
        .provision(ProvisionRequest::new(
            handle.backend(),
            handle.key_uri(),
            handle.wrapped_key(),
        ))
        .await
        .unwrap();
    assert_eq!(restored.open(&sealed, b"").unwrap(), b"hello");
}

#[tokio::test]
async fn test_shared_secret_without_key_fails() {
    let provisioner = create_provisioner(create_static_kms());
    let result = provisioner
        .provision(ProvisionRequest::new(BackendKind::SharedSecret, "", ""))
        .await;
    assert!(matches!(result, Err(Error::MissingKey(_))));
}

#[tokio::test]
async fn test_shared_secret_needs_no_kms() {
    let provisioner = KeyProvisioner::shared_secret_only(EnvelopePolicy::default());
    let key = provisioner
        .provision(
            ProvisionRequest::mint(BackendKind::SharedSecret, "").with_shared_key(create_shared_key()),
        )
        .await
        .unwrap();
    assert_eq!(key.handle().key_uri(), "");
    assert_eq!(key.handle().backend().tag(), 2);
}

#[tokio::test]
async fn test_kms_failures_are_backend_unavailable() {
    let provisioner = create_provisioner(Arc::new(FailingKms));

    for kind in [BackendKind::WrappedEnvelope, BackendKind::ServiceWrappedDirect] {
        assert!(matches!(
            provisioner.mint(kind, KEY_URI, None).await,
            Err(Error::BackendUnavailable(_))
        ));
    }

    // Restore errors of any kind coming from the KMS are classified the same way
    let handle = EnvelopeHandle::new(BackendKind::ServiceWrappedDirect, KEY_URI, STANDARD.encode([0_u8; 60]));
    assert!(matches!(
        provisioner.restore(&handle, None).await,
        Err(Error::BackendUnavailable(_))
    ));
}

#[tokio::test]
async fn test_unknown_kek_is_backend_unavailable() {
    let kms = StaticKeyManagementService::new(vec![1_u8; 32])
        .unwrap()
        .with_known_uris([KEY_URI]);
    let provisioner = create_provisioner(Arc::new(kms));

    assert!(provisioner
        .mint(BackendKind::ServiceWrappedDirect, KEY_URI, None)
        .await
        .is_ok());
    assert!(matches!(
        provisioner
            .mint(BackendKind::ServiceWrappedDirect, OTHER_KEY_URI, None)
            .await,
        Err(Error::BackendUnavailable(_))
    ));
}

#[tokio::test]
async fn test_deadline_expiry_is_backend_unavailable() {
    let slow = Arc::new(SlowKms {
        delay: Duration::from_secs(30),
    });
    let policy = EnvelopePolicy::default().with_kms_timeout(Duration::from_millis(25));
    let provisioner = KeyProvisioner::new(slow, policy);

    let started = std::time::Instant::now();
    let result = provisioner
        .mint(BackendKind::WrappedEnvelope, KEY_URI, None)
        .await;
    assert!(matches!(result, Err(Error::BackendUnavailable(_))));
    assert!(started.elapsed() < Duration::from_secs(5));

    let handle = EnvelopeHandle::new(BackendKind::ServiceWrappedDirect, KEY_URI, "AAAA");
    let result = provisioner
        .provision(ProvisionRequest::restore(&handle).with_timeout(Duration::from_millis(10)))
        .await;
    assert!(matches!(result, Err(Error::BackendUnavailable(_))));
}

#[tokio::test]
async fn test_malformed_wrapped_keys_are_corrupt() {
    let provisioner = create_provisioner(create_static_kms());

    let not_base64 = EnvelopeHandle::new(BackendKind::ServiceWrappedDirect, KEY_URI, "%%%");
    assert!(matches!(
        provisioner.restore(&not_base64, None).await,
        Err(Error::CorruptEnvelope(_))
    ));

    let not_keyset = EnvelopeHandle::new(BackendKind::WrappedEnvelope, KEY_URI, "{\"nope\":1}");
    assert!(matches!(
        provisioner.restore(&not_keyset, None).await,
        Err(Error::CorruptEnvelope(_))
    ));
}

#[tokio::test]
async fn test_reserved_backend_tag_is_unsupported() {
    assert!(matches!(
        EnvelopeHandle::from_json(r#"{"key_uri":"k","dek":"d","type":1}"#),
        Err(Error::UnsupportedBackend(_))
    ));
    assert!(matches!(
        EnvelopeHandle::from_json(r#"{"key_uri":"k","dek":"d","type":7}"#),
        Err(Error::UnsupportedBackend(_))
    ));
}
