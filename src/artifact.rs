//! Signed license artifact encoding and decoding.
//!
//! The artifact is what the external trading-platform client checks offline.
//! That client reimplements this decoder in a minimal scripting dialect with
//! no compression or crypto libraries, so the whole pipeline sticks to
//! primitives that port to byte arrays and table lookups: compact JSON,
//! HMAC-SHA256, and lowercase hex.
//!
//! Exactly one scheme is supported. Pipeline, in order:
//!
//! 1. Serialize the canonical payload (fixed field order, compact separators)
//!    without the signature field.
//! 2. HMAC-SHA256 those bytes with the pre-shared key; hex-encode the MAC.
//! 3. Re-serialize with `signature` appended as the final field.
//! 4. Hex-encode the signed JSON; that text is the `<license_id>.lic` body.
//!
//! Decoding reverses each step and rejects outright on bad hex, bad JSON, or
//! a MAC mismatch. A payload whose signature does not verify is never
//! returned, even if it parsed cleanly.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};
use crate::models::{Activation, License, Product};

type HmacSha256 = Hmac<Sha256>;

pub const ARTIFACT_VERSION: &str = "1.0";

/// One authorized trading account inside the artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountEntry {
    pub account_login: String,
    pub account_server: String,
    pub activated_at: String,
}

/// Canonical license object. Field order here is the wire order; the external
/// decoder depends on it, so do not reorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicensePayload {
    pub product_name: String,
    pub license_id: String,
    pub max_activations: i64,
    pub current_activations: i64,
    pub accounts: Vec<AccountEntry>,
    pub generated_at: String,
    pub expiry_date: Option<String>,
    pub version: String,
}

/// The payload with its signature appended. Kept as a separate struct so the
/// signature is always the last serialized field and the unsigned form is
/// byte-identical to what was MACed.
#[derive(Debug, Serialize, Deserialize)]
struct SignedPayload {
    product_name: String,
    license_id: String,
    max_activations: i64,
    current_activations: i64,
    accounts: Vec<AccountEntry>,
    generated_at: String,
    expiry_date: Option<String>,
    version: String,
    signature: String,
}

impl SignedPayload {
    fn from_payload(payload: LicensePayload, signature: String) -> Self {
        Self {
            product_name: payload.product_name,
            license_id: payload.license_id,
            max_activations: payload.max_activations,
            current_activations: payload.current_activations,
            accounts: payload.accounts,
            generated_at: payload.generated_at,
            expiry_date: payload.expiry_date,
            version: payload.version,
            signature,
        }
    }

    fn into_parts(self) -> (LicensePayload, String) {
        (
            LicensePayload {
                product_name: self.product_name,
                license_id: self.license_id,
                max_activations: self.max_activations,
                current_activations: self.current_activations,
                accounts: self.accounts,
                generated_at: self.generated_at,
                expiry_date: self.expiry_date,
                version: self.version,
            },
            self.signature,
        )
    }
}

/// Build the canonical payload from current license state.
/// Only active activations are included; the artifact is a snapshot taken at
/// generation time, not a live document.
pub fn build_payload(
    license: &License,
    product: &Product,
    active_activations: &[Activation],
    generated_at: i64,
) -> LicensePayload {
    let accounts = active_activations
        .iter()
        .map(|a| AccountEntry {
            account_login: a.account_login.clone(),
            account_server: a.account_server.clone(),
            activated_at: format_timestamp(a.activated_at),
        })
        .collect::<Vec<_>>();

    LicensePayload {
        product_name: product.name.clone(),
        license_id: license.license_id.clone(),
        max_activations: product.max_activations,
        current_activations: accounts.len() as i64,
        accounts,
        generated_at: format_timestamp(generated_at),
        expiry_date: license.expires_at.map(format_timestamp),
        version: ARTIFACT_VERSION.to_string(),
    }
}

fn format_timestamp(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Signs, encodes, decodes, and verifies artifacts with a pre-shared key.
///
/// The key is injected at process start (see `Config`); it must match the key
/// baked into the deployed external decoder byte for byte.
#[derive(Clone)]
pub struct ArtifactCodec {
    key: Vec<u8>,
}

impl ArtifactCodec {
    pub fn new(key: &[u8]) -> Self {
        Self { key: key.to_vec() }
    }

    /// Hex HMAC-SHA256 over the payload serialized without a signature field.
    fn sign(&self, payload: &LicensePayload) -> Result<String> {
        let canonical = serde_json::to_vec(payload)?;
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|_| AppError::Internal("Invalid signing key".into()))?;
        mac.update(&canonical);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Produce the artifact text: hex of the signed, canonical JSON.
    pub fn encode(&self, payload: &LicensePayload) -> Result<String> {
        let signature = self.sign(payload)?;
        let signed = SignedPayload::from_payload(payload.clone(), signature);
        let json = serde_json::to_vec(&signed)?;
        Ok(hex::encode(json))
    }

    /// Decode and verify an artifact. Any malformed input or signature
    /// mismatch discards the whole object; no partial data is ever returned.
    pub fn decode(&self, text: &str) -> Result<LicensePayload> {
        let bytes = hex::decode(text.trim())
            .map_err(|_| AppError::Malformed("Artifact is not valid hex".into()))?;

        let signed: SignedPayload = serde_json::from_slice(&bytes)
            .map_err(|_| AppError::Malformed("Artifact structure is invalid".into()))?;

        let (payload, presented) = signed.into_parts();
        let expected = self.sign(&payload)?;

        let presented_bytes = hex::decode(&presented).unwrap_or_default();
        let expected_bytes =
            hex::decode(&expected).map_err(|_| AppError::Internal("Signature encoding".into()))?;

        if presented_bytes.len() != expected_bytes.len()
            || presented_bytes.ct_eq(&expected_bytes).unwrap_u8() != 1
        {
            return Err(AppError::Unauthorized);
        }

        Ok(payload)
    }
}

/// On-disk storage for generated artifacts: `<dir>/<license_id>.lic`.
#[derive(Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn filename(license_id: &str) -> String {
        format!("{}.lic", license_id)
    }

    fn path_for(&self, license_id: &str) -> Result<PathBuf> {
        // license_id comes from a URL path segment; only our own generated
        // alphabet is acceptable in a filename.
        if license_id.is_empty()
            || !license_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(AppError::BadRequest("Invalid license ID".into()));
        }
        Ok(self.dir.join(Self::filename(license_id)))
    }

    /// Write the artifact atomically: temp path in the same directory, then
    /// rename over the destination so a reader never sees a torn file.
    pub fn write(&self, license_id: &str, contents: &str) -> Result<PathBuf> {
        let path = self.path_for(license_id)?;
        fs::create_dir_all(&self.dir)?;

        let tmp = self.dir.join(format!(".{}.tmp", Self::filename(license_id)));
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &path)?;
        Ok(path)
    }

    pub fn read(&self, license_id: &str) -> Result<Option<String>> {
        let path = self.path_for(license_id)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn exists(&self, license_id: &str) -> Result<bool> {
        Ok(self.path_for(license_id)?.exists())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
