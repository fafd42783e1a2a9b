// Round-trip, tamper and associated-data properties across every backend

use crate::integration::common::{
    create_provisioner, create_shared_key, create_static_kms, KEY_URI, ORIGINAL_DATA,
};
use msgenvelope::{BackendKind, Error, ProvisionedKey, SecretKey};

const ALL_BACKENDS: [BackendKind; 3] = [
    BackendKind::WrappedEnvelope,
    BackendKind::ServiceWrappedDirect,
    BackendKind::SharedSecret,
];

async fn mint(kind: BackendKind) -> ProvisionedKey {
    let provisioner = create_provisioner(create_static_kms());
    let shared = create_shared_key();
    provisioner
        .mint(kind, KEY_URI, Some(&shared))
        .await
        .expect("mint failed")
}

#[tokio::test]
async fn test_round_trip_every_backend() {
    let payloads: [&[u8]; 3] = [b"", b"x", ORIGINAL_DATA.as_bytes()];
    let aads: [&[u8]; 2] = [b"", b"topic/orders"];

    for kind in ALL_BACKENDS {
        let key = mint(kind).await;
        for payload in payloads {
            for aad in aads {
                let sealed = key.seal(payload, aad).expect("seal failed");
                assert_eq!(key.open(&sealed, aad).expect("open failed"), payload, "{}", kind);
            }
        }
    }
}

#[tokio::test]
async fn test_restored_key_opens_across_provisioners() {
    let shared = create_shared_key();

    for kind in ALL_BACKENDS {
        let key = mint(kind).await;
        let sealed = key.seal(ORIGINAL_DATA.as_bytes(), b"ctx").unwrap();

        // A second provisioner over a KMS holding the same master key
        let other = create_provisioner(create_static_kms());
        let restored = other.restore(key.handle(), Some(&shared)).await.unwrap();

        assert_eq!(restored.handle(), key.handle());
        assert_eq!(restored.open(&sealed, b"ctx").unwrap(), ORIGINAL_DATA.as_bytes());
        // and the other direction
        let back = restored.seal(b"reply", b"").unwrap();
        assert_eq!(key.open(&back, b"").unwrap(), b"reply");
    }
}

#[tokio::test]
async fn test_flipping_any_byte_fails_authentication() {
    for kind in ALL_BACKENDS {
        let key = mint(kind).await;
        let sealed = key.seal(b"tamper me", b"aad").unwrap();

        for i in 0..sealed.len() {
            let mut tampered = sealed.clone();
            tampered[i] ^= 0x01;
            assert!(
                matches!(key.open(&tampered, b"aad"), Err(Error::AuthenticationFailure)),
                "{} byte {} was not detected",
                kind,
                i
            );
        }
    }
}

#[tokio::test]
async fn test_associated_data_is_bound() {
    for kind in ALL_BACKENDS {
        let key = mint(kind).await;
        let sealed = key.seal(b"payload", b"aad-one").unwrap();

        assert!(matches!(
            key.open(&sealed, b"aad-two"),
            Err(Error::AuthenticationFailure)
        ));
        assert!(matches!(
            key.open(&sealed, b""),
            Err(Error::AuthenticationFailure)
        ));
    }
}

#[tokio::test]
async fn test_short_ciphertext_is_malformed() {
    let direct = mint(BackendKind::ServiceWrappedDirect).await;
    assert!(matches!(
        direct.open(&[0_u8; 11], b""),
        Err(Error::MalformedCiphertext(_))
    ));

    let shared = mint(BackendKind::SharedSecret).await;
    assert!(matches!(shared.open(b"", b""), Err(Error::MalformedCiphertext(_))));

    let wrapped = mint(BackendKind::WrappedEnvelope).await;
    assert!(matches!(
        wrapped.open(&[1_u8, 0, 0], b""),
        Err(Error::MalformedCiphertext(_))
    ));
}

#[tokio::test]
async fn test_shared_secret_fingerprint_is_deterministic_and_not_the_key() {
    let provisioner = create_provisioner(create_static_kms());
    let shared = create_shared_key();

    let first = provisioner
        .mint(BackendKind::SharedSecret, "", Some(&shared))
        .await
        .unwrap();
    let second = provisioner
        .mint(BackendKind::SharedSecret, "", Some(&shared))
        .await
        .unwrap();

    assert_eq!(first.handle().wrapped_key(), second.handle().wrapped_key());
    assert_ne!(first.handle().wrapped_key().as_bytes(), shared.expose());
    assert!(!first.handle().to_json().unwrap().contains(crate::integration::common::SHARED_KEY));

    let different = provisioner
        .mint(
            BackendKind::SharedSecret,
            "",
            Some(&SecretKey::from("a completely different 32B key!!")),
        )
        .await
        .unwrap();
    assert_ne!(first.handle().wrapped_key(), different.handle().wrapped_key());
}

#[tokio::test]
async fn test_every_seal_uses_a_fresh_nonce() {
    for kind in ALL_BACKENDS {
        let key = mint(kind).await;
        let a = key.seal(b"same", b"").unwrap();
        let b = key.seal(b"same", b"").unwrap();
        assert_ne!(a, b, "{}", kind);
    }
}
