// Tests to verify key cache behaviors under different configurations

use crate::integration::common::{
    create_provisioner, create_shared_key, create_static_kms, CountingKms, KEY_URI, ORIGINAL_DATA,
};
use msgenvelope::policy::EnvelopePolicy;
use msgenvelope::{
    BackendKind, EncryptedMessage, EnvelopeHandle, Error, KeyCache, KeyProvisioner, MessageConsumer,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

#[tokio::test]
async fn test_resolving_twice_calls_kms_once() {
    let kms = Arc::new(CountingKms::new(create_static_kms()));
    let provisioner = create_provisioner(kms.clone());

    for kind in [BackendKind::WrappedEnvelope, BackendKind::ServiceWrappedDirect] {
        let minted = provisioner.mint(kind, KEY_URI, None).await.unwrap();
        let before = kms.decrypt_count();

        let cache = KeyCache::new(provisioner.clone()).unwrap();
        let first = cache.resolve(minted.handle(), None).await.unwrap();
        let second = cache.resolve(minted.handle(), None).await.unwrap();

        assert_eq!(kms.decrypt_count() - before, 1, "{}", kind);

        // Both contexts open what the other sealed
        let a = first.seal(ORIGINAL_DATA.as_bytes(), b"").unwrap();
        let b = second.seal(ORIGINAL_DATA.as_bytes(), b"").unwrap();
        assert_eq!(second.open(&a, b"").unwrap(), ORIGINAL_DATA.as_bytes());
        assert_eq!(first.open(&b, b"").unwrap(), ORIGINAL_DATA.as_bytes());
    }
}

#[tokio::test]
async fn test_registered_minted_key_skips_kms() {
    let kms = Arc::new(CountingKms::new(create_static_kms()));
    let provisioner = create_provisioner(kms.clone());
    let cache = KeyCache::new(provisioner.clone()).unwrap();

    let minted = provisioner
        .mint(BackendKind::ServiceWrappedDirect, KEY_URI, None)
        .await
        .unwrap();
    cache.insert(minted.clone());

    cache.resolve(minted.handle(), None).await.unwrap();
    assert_eq!(kms.encrypt_count(), 1);
    assert_eq!(kms.decrypt_count(), 0);
}

#[tokio::test]
async fn test_lru_evicts_beyond_capacity() {
    let kms = Arc::new(CountingKms::new(create_static_kms()));
    let policy = EnvelopePolicy::default().with_key_cache_max_size(2);
    let provisioner = Arc::new(KeyProvisioner::new(kms.clone(), policy));
    let cache = KeyCache::new(provisioner.clone()).unwrap();

    let mut handles = Vec::new();
    for _ in 0..3 {
        let minted = provisioner
            .mint(BackendKind::ServiceWrappedDirect, KEY_URI, None)
            .await
            .unwrap();
        handles.push(minted.handle().clone());
    }

    for handle in &handles {
        cache.resolve(handle, None).await.unwrap();
    }
    assert_eq!(cache.len(), 2);
    assert_eq!(kms.decrypt_count(), 3);

    // The first handle was evicted and needs another restore
    assert!(cache.get(&handles[0]).is_none());
    cache.resolve(&handles[0], None).await.unwrap();
    assert_eq!(kms.decrypt_count(), 4);
}

#[tokio::test]
async fn test_simple_policy_never_evicts() {
    let policy = EnvelopePolicy::default()
        .with_key_cache_policy("simple")
        .with_key_cache_max_size(1);
    let provisioner = Arc::new(KeyProvisioner::new(create_static_kms(), policy));
    let cache = KeyCache::new(provisioner.clone()).unwrap();

    for _ in 0..5 {
        let minted = provisioner
            .mint(BackendKind::ServiceWrappedDirect, KEY_URI, None)
            .await
            .unwrap();
        cache.resolve(minted.handle(), None).await.unwrap();
    }
    assert_eq!(cache.len(), 5);
}

#[tokio::test]
async fn test_ttl_forces_restore() {
    let kms = Arc::new(CountingKms::new(create_static_kms()));
    let policy = EnvelopePolicy::default().with_key_cache_ttl(Duration::from_millis(50));
    let provisioner = Arc::new(KeyProvisioner::new(kms.clone(), policy));
    let cache = KeyCache::new(provisioner.clone()).unwrap();

    let minted = provisioner
        .mint(BackendKind::WrappedEnvelope, KEY_URI, None)
        .await
        .unwrap();

    cache.resolve(minted.handle(), None).await.unwrap();
    cache.resolve(minted.handle(), None).await.unwrap();
    assert_eq!(kms.decrypt_count(), 1);

    sleep(Duration::from_millis(100)).await;

    cache.resolve(minted.handle(), None).await.unwrap();
    assert_eq!(kms.decrypt_count(), 2);
}

#[tokio::test]
async fn test_shared_secret_mismatch_is_not_cached() {
    let provisioner = create_provisioner(create_static_kms());
    let cache = KeyCache::new(provisioner.clone()).unwrap();
    let shared = create_shared_key();

    let minted = provisioner
        .mint(BackendKind::SharedSecret, "", Some(&shared))
        .await
        .unwrap();

    let wrong = msgenvelope::SecretKey::from("this is not the key you want....");
    assert!(matches!(
        cache.resolve(minted.handle(), Some(&wrong)).await,
        Err(Error::KeyMismatch)
    ));
    assert!(cache.is_empty());

    cache.resolve(minted.handle(), Some(&shared)).await.unwrap();
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_empty_wrapped_key_is_corrupt_not_minted() {
    let kms = Arc::new(CountingKms::new(create_static_kms()));
    let cache = Arc::new(KeyCache::new(create_provisioner(kms.clone())).unwrap());

    let extension = format!(r#"{{"key_uri":"{}","type":3}}"#, KEY_URI);
    let handle = EnvelopeHandle::from_json(&extension).unwrap();
    assert!(handle.wrapped_key().is_empty());

    for _ in 0..3 {
        assert!(matches!(
            cache.resolve(&handle, None).await,
            Err(Error::CorruptEnvelope(_))
        ));
    }

    let consumer = MessageConsumer::new(cache.clone());
    let message = EncryptedMessage {
        extension,
        data: String::new(),
    };
    assert!(matches!(
        consumer.open(&message, b"").await,
        Err(Error::CorruptEnvelope(_))
    ));

    assert_eq!(kms.encrypt_count(), 0);
    assert_eq!(kms.decrypt_count(), 0);
    assert!(cache.is_empty());
}
