#![allow(dead_code)]

use tame_gcs_signer::{Credentials, FixedClock, PrivateKey, UrlSigner};

pub const TEST_KEY: &[u8] = include_bytes!("test_key.pem");
pub const TEST_KEY_RSA: &[u8] = include_bytes!("test_key_rsa.pem");
pub const TEST_PUBLIC_KEY: &[u8] = include_bytes!("test_key_pub.der");

/// 2023-11-14T22:13:20Z
pub const NOW: i64 = 1_700_000_000;

pub fn cmp_strings(expected: &str, actual: &str) {
    if expected != actual {
        let cs = difference::Changeset::new(expected, actual, "\n");
        panic!("{}", cs);
    }
}

pub fn credentials(access_id: &str) -> Credentials {
    Credentials::new(
        access_id,
        std::sync::Arc::new(PrivateKey::from_pem(TEST_KEY).unwrap()),
    )
}

pub fn frozen_signer() -> UrlSigner<FixedClock> {
    use chrono::TimeZone;

    UrlSigner::new().with_clock(FixedClock(chrono::Utc.timestamp_opt(NOW, 0).unwrap()))
}

/// Verifies an RSA-SHA256 signature against the test key's public counterpart
pub fn verify(message: &[u8], signature: &[u8]) {
    ring::signature::UnparsedPublicKey::new(
        &ring::signature::RSA_PKCS1_2048_8192_SHA256,
        TEST_PUBLIC_KEY,
    )
    .verify(message, signature)
    .expect("signature doesn't verify");
}

/// Gets the (decoded) value of a query parameter
pub fn query_param(url: &url::Url, name: &str) -> String {
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
        .unwrap_or_else(|| panic!("missing query parameter '{}'", name))
}
