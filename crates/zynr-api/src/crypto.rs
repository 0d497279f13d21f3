// Hybrid RSA/AES envelope channel.
//
// The firmware's login and DAL endpoints exchange JSON wrapped in an
// AES-256-CBC envelope; the AES key is RSA-wrapped (PKCS#1 v1.5) with a
// public key fetched from the device. Responses reuse the shared AES key
// but carry their own IV. Firmware versions disagree about response
// padding, so unpadding runs a tolerant fallback chain with one
// diagnostic counter per path.

use aes::cipher::block_padding::{NoPadding, Pkcs7};
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::RngCore;
use rand::rngs::OsRng;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::Error;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const BLOCK: usize = 16;

/// Request envelope: `{content, key, iv}`. Device responses omit `key`
/// (the AES key was shared at request time).
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    iv: String,
}

/// Which unpadding rule accepted a decrypted response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PaddingPath {
    Pkcs7,
    ZeroStripped,
    LengthByte,
    Raw,
}

/// Per-path counters for the tolerant unpadding chain. The fallbacks
/// exist for firmware with broken PKCS7; the counters make each path
/// observable instead of fully silent.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PaddingStats {
    pub pkcs7: u64,
    pub zero_stripped: u64,
    pub length_byte: u64,
    pub raw: u64,
}

/// Encrypts outbound payloads and decrypts inbound envelopes.
///
/// When the device supplies no RSA key the channel is inactive and both
/// directions are identity operations over JSON. `reset()` regenerates
/// the symmetric material, which invalidates any in-flight encrypted
/// request.
pub struct CryptoChannel {
    rsa_key: Option<RsaPublicKey>,
    aes_key: [u8; 32],
    // 256 random bits; only the first 128 are used as the CBC IV. The
    // device's web UI sends the longer buffer, and some firmware checks
    // its length.
    iv: [u8; 32],
    stats: PaddingStats,
}

impl CryptoChannel {
    pub fn new() -> Self {
        let mut channel = Self {
            rsa_key: None,
            aes_key: [0; 32],
            iv: [0; 32],
            stats: PaddingStats::default(),
        };
        channel.regenerate();
        channel
    }

    /// (Re)key the channel with the device's public key, or deactivate
    /// it when the device reports none. Always draws fresh AES material.
    pub fn reset(&mut self, rsa_pem: Option<&str>) -> Result<(), Error> {
        self.rsa_key = match rsa_pem {
            Some(pem) => Some(parse_public_key(pem)?),
            None => None,
        };
        self.regenerate();
        debug!(encryption_required = self.encryption_required(), "crypto channel reset");
        Ok(())
    }

    fn regenerate(&mut self) {
        OsRng.fill_bytes(&mut self.aes_key);
        OsRng.fill_bytes(&mut self.iv);
    }

    /// Whether payloads must be wrapped in the encrypted envelope.
    pub fn encryption_required(&self) -> bool {
        self.rsa_key.is_some()
    }

    pub fn padding_stats(&self) -> PaddingStats {
        self.stats
    }

    /// Serialize `payload` for transmission: compact JSON, wrapped in the
    /// encrypted envelope when the channel is active.
    ///
    /// Compactness matters: the firmware decrypts and compares lengths,
    /// and extraneous whitespace makes it reject the request.
    pub fn encode(&self, payload: &Value) -> Result<String, Error> {
        let plain = serde_json::to_string(payload)
            .map_err(|e| Error::decryption(format!("request serialization: {e}")))?;

        let Some(rsa_key) = &self.rsa_key else {
            return Ok(plain);
        };

        let enc = Aes256CbcEnc::new_from_slices(&self.aes_key, &self.iv[..BLOCK])
            .map_err(|e| Error::decryption(format!("cipher init: {e}")))?;
        let ciphertext = enc.encrypt_padded_vec_mut::<Pkcs7>(plain.as_bytes());

        // The web UI RSA-wraps the *base64 text* of the AES key, not the
        // raw bytes. The firmware expects exactly that.
        let key_b64 = BASE64.encode(self.aes_key);
        let wrapped_key = rsa_key
            .encrypt(&mut OsRng, Pkcs1v15Encrypt, key_b64.as_bytes())
            .map_err(|e| Error::decryption(format!("RSA key wrap: {e}")))?;

        let envelope = Envelope {
            content: BASE64.encode(&ciphertext),
            key: Some(BASE64.encode(&wrapped_key)),
            iv: BASE64.encode(self.iv),
        };
        serde_json::to_string(&envelope)
            .map_err(|e| Error::decryption(format!("envelope serialization: {e}")))
    }

    /// Decrypt a device response. Identity when the channel is inactive.
    ///
    /// The response carries its own IV; the AES key is the one shared at
    /// request time. A JSON or UTF-8 failure after unpadding is a hard
    /// error, not retried at this layer.
    pub fn decode(&mut self, value: Value) -> Result<Value, Error> {
        if !self.encryption_required() {
            return Ok(value);
        }

        let envelope: Envelope = serde_json::from_value(value)
            .map_err(|e| Error::decryption(format!("malformed envelope: {e}")))?;

        let response_iv = BASE64
            .decode(&envelope.iv)
            .map_err(|e| Error::decryption(format!("envelope iv: {e}")))?;
        if response_iv.len() < BLOCK {
            return Err(Error::decryption(format!(
                "envelope iv too short: {} bytes",
                response_iv.len()
            )));
        }
        let ciphertext = BASE64
            .decode(&envelope.content)
            .map_err(|e| Error::decryption(format!("envelope content: {e}")))?;

        let dec = Aes256CbcDec::new_from_slices(&self.aes_key, &response_iv[..BLOCK])
            .map_err(|e| Error::decryption(format!("cipher init: {e}")))?;
        let padded = dec
            .decrypt_padded_vec_mut::<NoPadding>(&ciphertext)
            .map_err(|_| Error::decryption("ciphertext not block-aligned"))?;

        let (len, path) = tolerant_unpad(&padded);
        self.count(path);

        let text = std::str::from_utf8(&padded[..len])
            .map_err(|e| Error::decryption(format!("decrypted body not UTF-8: {e}")))?;
        serde_json::from_str(text)
            .map_err(|e| Error::decryption(format!("decrypted body not JSON: {e}")))
    }

    fn count(&mut self, path: PaddingPath) {
        match path {
            PaddingPath::Pkcs7 => self.stats.pkcs7 += 1,
            PaddingPath::ZeroStripped => {
                debug!("response unpadded via trailing-zero fallback");
                self.stats.zero_stripped += 1;
            }
            PaddingPath::LengthByte => {
                debug!("response unpadded via length-byte fallback");
                self.stats.length_byte += 1;
            }
            PaddingPath::Raw => {
                debug!("response carried no recognizable padding");
                self.stats.raw += 1;
            }
        }
    }
}

impl Default for CryptoChannel {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_public_key(pem: &str) -> Result<RsaPublicKey, Error> {
    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|e| Error::decryption(format!("device RSA key: {e}")))
}

/// Remove padding from a decrypted buffer, tolerating the firmware's
/// inconsistencies. Returns the unpadded length and the rule that fired:
/// strict PKCS7 first, then trailing-zero stripping, then last-byte
/// length padding, otherwise the buffer is taken as already unpadded.
fn tolerant_unpad(buf: &[u8]) -> (usize, PaddingPath) {
    if let Some(&last) = buf.last() {
        let n = last as usize;
        if (1..=BLOCK).contains(&n)
            && buf.len() >= n
            && buf[buf.len() - n..].iter().all(|&b| b == last)
        {
            return (buf.len() - n, PaddingPath::Pkcs7);
        }
    }

    let stripped = buf.iter().rev().take_while(|&&b| b == 0).count();
    if stripped > 0 {
        return (buf.len() - stripped, PaddingPath::ZeroStripped);
    }

    if let Some(&last) = buf.last() {
        let n = last as usize;
        if (1..=BLOCK).contains(&n) && buf.len() >= n {
            return (buf.len() - n, PaddingPath::LengthByte);
        }
    }

    (buf.len(), PaddingPath::Raw)
}
