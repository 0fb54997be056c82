//! Wallet signing.
//!
//! A [`Signer`] owns the wallet's key material; everything that needs to
//! authenticate (upload providers, registry writes) borrows one.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::{Signer as _, SigningKey};
use rsa::pss::BlindedSigningKey;
use rsa::rand_core::OsRng;
use rsa::signature::{RandomizedSigner, SignatureEncoding};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPrivateKey};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use pl_pages_core::Address;

use crate::error::SignError;

/// Signature type of RSA-PSS (Arweave wallet) data items.
pub const RSA_SIGNATURE_TYPE: u16 = 1;

/// Signature type of Ed25519 data items.
pub const ED25519_SIGNATURE_TYPE: u16 = 2;

/// Signs data items on behalf of a wallet.
pub trait Signer: Send + Sync {
    /// Data item signature type.
    fn signature_type(&self) -> u16;

    /// Length in bytes of signatures this signer produces.
    fn signature_len(&self) -> usize;

    /// Raw public key, embedded as the data item owner.
    fn owner(&self) -> &[u8];

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SignError>;

    /// Wallet address: base64url SHA-256 of the owner key.
    fn address(&self) -> Address {
        Address(b64url(&Sha256::digest(self.owner())))
    }
}

/// Load a wallet key file, picking the signer from the JWK `kty`.
pub fn load_jwk(json: &str) -> Result<Arc<dyn Signer>, SignError> {
    #[derive(Deserialize)]
    struct Kind {
        kty: String,
    }
    let kind: Kind = serde_json::from_str(json)?;
    match kind.kty.as_str() {
        "RSA" => Ok(Arc::new(RsaSigner::from_jwk(json)?)),
        "OKP" => Ok(Arc::new(Ed25519Signer::from_jwk(json)?)),
        other => Err(SignError::InvalidKey(format!("unsupported key type {other}"))),
    }
}

/// Arweave RSA wallet. Signs with RSA-PSS over SHA-256, salt length 32.
pub struct RsaSigner {
    key: BlindedSigningKey<Sha256>,
    owner: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct RsaJwk {
    kty: String,
    n: String,
    e: String,
    d: String,
    p: String,
    q: String,
}

impl RsaSigner {
    pub fn new(key: RsaPrivateKey) -> Self {
        let owner = key.n().to_bytes_be();
        Self {
            key: BlindedSigningKey::new(key),
            owner,
        }
    }

    /// Load an Arweave JWK (`{"kty":"RSA","n":…,"e":…,"d":…,"p":…,"q":…}`).
    pub fn from_jwk(json: &str) -> Result<Self, SignError> {
        let jwk: RsaJwk = serde_json::from_str(json)?;
        if jwk.kty != "RSA" {
            return Err(SignError::InvalidKey(format!(
                "expected an RSA key, got kty={}",
                jwk.kty
            )));
        }
        let int = |value: &str, field: &'static str| {
            decode_b64url(value, field).map(|bytes| BigUint::from_bytes_be(&bytes))
        };
        let key = RsaPrivateKey::from_components(
            int(&jwk.n, "n")?,
            int(&jwk.e, "e")?,
            int(&jwk.d, "d")?,
            vec![int(&jwk.p, "p")?, int(&jwk.q, "q")?],
        )
        .map_err(|e| SignError::InvalidKey(e.to_string()))?;
        key.validate().map_err(|_| SignError::KeyMismatch)?;
        Ok(Self::new(key))
    }
}

impl Signer for RsaSigner {
    fn signature_type(&self) -> u16 {
        RSA_SIGNATURE_TYPE
    }

    fn signature_len(&self) -> usize {
        self.owner.len()
    }

    fn owner(&self) -> &[u8] {
        &self.owner
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SignError> {
        let signature = self
            .key
            .try_sign_with_rng(&mut OsRng, message)
            .map_err(|e| SignError::InvalidKey(e.to_string()))?;
        Ok(signature.to_vec())
    }
}

/// Ed25519 wallet.
pub struct Ed25519Signer {
    key: SigningKey,
    owner: [u8; 32],
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kty: String,
    crv: String,
    d: String,
    #[serde(default)]
    x: Option<String>,
}

impl Ed25519Signer {
    pub fn from_secret(secret: [u8; 32]) -> Self {
        let key = SigningKey::from_bytes(&secret);
        let owner = key.verifying_key().to_bytes();
        Self { key, owner }
    }

    /// Load an OKP/Ed25519 JWK (`{"kty":"OKP","crv":"Ed25519","d":…,"x":…}`).
    ///
    /// When `x` is present it must match the public key derived from `d`.
    pub fn from_jwk(json: &str) -> Result<Self, SignError> {
        let jwk: Jwk = serde_json::from_str(json)?;
        if jwk.kty != "OKP" || jwk.crv != "Ed25519" {
            return Err(SignError::InvalidKey(format!(
                "expected an OKP Ed25519 key, got kty={} crv={}",
                jwk.kty, jwk.crv
            )));
        }
        let secret: [u8; 32] = decode_b64url(&jwk.d, "d")?
            .try_into()
            .map_err(|_| SignError::InvalidKey("private key must be 32 bytes".into()))?;
        let signer = Self::from_secret(secret);
        if let Some(x) = &jwk.x {
            if decode_b64url(x, "x")? != signer.owner {
                return Err(SignError::KeyMismatch);
            }
        }
        Ok(signer)
    }

    /// JWK form of this wallet.
    pub fn to_jwk(&self) -> serde_json::Value {
        serde_json::json!({
            "kty": "OKP",
            "crv": "Ed25519",
            "d": b64url(&self.key.to_bytes()),
            "x": b64url(&self.owner),
        })
    }
}

impl Signer for Ed25519Signer {
    fn signature_type(&self) -> u16 {
        ED25519_SIGNATURE_TYPE
    }

    fn signature_len(&self) -> usize {
        64
    }

    fn owner(&self) -> &[u8] {
        &self.owner
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SignError> {
        Ok(self.key.sign(message).to_bytes().to_vec())
    }
}

pub(crate) fn b64url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

pub(crate) fn decode_b64url(value: &str, field: &'static str) -> Result<Vec<u8>, SignError> {
    URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|_| SignError::Base64 { field })
}
