#![allow(dead_code)]

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::Value;

const SIGNING_KEY_PEM: &str = include_str!("../fixtures/test_rsa_key.pem");
pub const JWKS: &str = include_str!("../fixtures/jwks.json");
pub const KEY_ID: &str = "test-signing-key";
pub const CLIENT_ID: &str = "client-1";

/// Signs `claims` with the fixture key under key id `kid`.
pub fn sign(kid: &str, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    let key = EncodingKey::from_rsa_pem(SIGNING_KEY_PEM.as_bytes()).expect("test key parses");
    encode(&header, claims, &key).expect("token signs")
}
