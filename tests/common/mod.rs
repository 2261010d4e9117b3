//! Common test utilities for apollo-client integration tests
//!
//! Key generation is slow, so every test binary shares one RSA key.

#![allow(dead_code)]

use std::sync::OnceLock;

use apollo_client::PrivateKeyHandle;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::rngs::OsRng;
use rsa::pkcs8::EncodePrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};

pub const APP_ID: &str = "demo";
pub const CLUSTER: &str = "default";
pub const NAMESPACE: &str = "application";

fn rsa_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| RsaPrivateKey::new(&mut OsRng, 1024).expect("RSA key generation"))
}

/// The shared test key as Base64 of its PKCS#8 DER encoding
pub fn private_key_base64() -> String {
    let der = rsa_key().to_pkcs8_der().expect("PKCS#8 encoding");
    BASE64.encode(der.as_bytes())
}

/// The shared test key parsed the way callers would parse it
pub fn private_key() -> PrivateKeyHandle {
    PrivateKeyHandle::from_base64_der(&private_key_base64()).expect("valid test key")
}

/// Encrypt like the config service: (k - 11)-byte pieces, one RSA block per piece
pub fn encrypt_chunked(plaintext: &[u8]) -> Vec<u8> {
    let public_key = RsaPublicKey::from(rsa_key());
    let piece_len = rsa_key().size() - 11;
    let mut ciphertext = Vec::new();
    for piece in plaintext.chunks(piece_len) {
        let block = public_key
            .encrypt(&mut OsRng, Pkcs1v15Encrypt, piece)
            .expect("PKCS#1 v1.5 encryption");
        ciphertext.extend_from_slice(&block);
    }
    ciphertext
}

/// A config response body as served for a `properties` namespace
pub fn config_body(release_key: &str, pairs: &[(&str, &str)]) -> String {
    let configurations: serde_json::Map<String, serde_json::Value> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
        .collect();
    serde_json::json!({
        "appId": APP_ID,
        "cluster": CLUSTER,
        "namespaceName": NAMESPACE,
        "configurations": configurations,
        "releaseKey": release_key,
    })
    .to_string()
}

/// Path of the config endpoint for the default test namespace
pub fn config_path() -> String {
    format!("/configs/{}/{}/{}", APP_ID, CLUSTER, NAMESPACE)
}
