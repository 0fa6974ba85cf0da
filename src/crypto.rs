//! Keyed digest over the canonical signing string

use hmac::{digest::KeyInit, Hmac, Mac};
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::Sha256;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Signature algorithm carried in the token's `method` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigMethod {
    Md5,
    Sha1,
    Sha256,
}

impl SigMethod {
    /// Literal method token embedded in the signing string and the token's
    /// `method` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            SigMethod::Md5 => "md5",
            SigMethod::Sha1 => "sha1",
            SigMethod::Sha256 => "sha256",
        }
    }

    /// Digest size in bytes: 16, 20 or 32.
    pub fn digest_len(&self) -> usize {
        match self {
            SigMethod::Md5 => 16,
            SigMethod::Sha1 => 20,
            SigMethod::Sha256 => 32,
        }
    }
}

impl fmt::Display for SigMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unrecognized method name.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown signature method: {0}")]
pub struct UnknownSigMethod(pub String);

impl FromStr for SigMethod {
    type Err = UnknownSigMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "md5" => Ok(SigMethod::Md5),
            "sha1" => Ok(SigMethod::Sha1),
            "sha256" => Ok(SigMethod::Sha256),
            other => Err(UnknownSigMethod(other.to_string())),
        }
    }
}

/// Compute the keyed digest of `message` under `key`.
///
/// Deterministic and stateless; the returned digest is `method.digest_len()`
/// bytes. HMAC is defined for keys of any length, so the decoded access key
/// is used as-is.
pub fn sign(method: SigMethod, key: &[u8], message: &[u8]) -> Vec<u8> {
    match method {
        SigMethod::Md5 => keyed_digest::<Hmac<Md5>>(key, message),
        SigMethod::Sha1 => keyed_digest::<Hmac<Sha1>>(key, message),
        SigMethod::Sha256 => keyed_digest::<Hmac<Sha256>>(key, message),
    }
}

fn keyed_digest<M: Mac + KeyInit>(key: &[u8], message: &[u8]) -> Vec<u8> {
    let mut mac = <M as Mac>::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    #[test]
    fn test_known_answer_vectors() {
        let key = b"key";
        let message = b"The quick brown fox jumps over the lazy dog";

        assert_eq!(
            hex(&sign(SigMethod::Md5, key, message)),
            "80070713463e7749b90c2dc24911e275"
        );
        assert_eq!(
            hex(&sign(SigMethod::Sha1, key, message)),
            "de7c9b85b8b78aa6bc8a7a36f70a90701c9db4d9"
        );
        assert_eq!(
            hex(&sign(SigMethod::Sha256, key, message)),
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn test_digest_lengths() {
        for method in [SigMethod::Md5, SigMethod::Sha1, SigMethod::Sha256] {
            assert_eq!(sign(method, b"k", b"m").len(), method.digest_len());
        }
    }

    #[test]
    fn test_empty_key_is_accepted() {
        assert_eq!(sign(SigMethod::Sha256, b"", b"m").len(), 32);
    }

    #[test]
    fn test_method_names_round_trip() {
        for method in [SigMethod::Md5, SigMethod::Sha1, SigMethod::Sha256] {
            assert_eq!(method.as_str().parse::<SigMethod>().unwrap(), method);
        }
        assert!("sha512".parse::<SigMethod>().is_err());
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        assert_eq!(
            serde_json::to_string(&SigMethod::Sha256).unwrap(),
            "\"sha256\""
        );
        let parsed: SigMethod = serde_json::from_str("\"md5\"").unwrap();
        assert_eq!(parsed, SigMethod::Md5);
    }
}
