//! Device token assembly
//!
//! A token authenticates a product or a single device to the platform. The
//! access key is Base64 text issued at registration; its decoded bytes key
//! an HMAC over the canonical signing string, and the resulting digest is
//! Base64-encoded, percent-escaped and joined with the other fields into an
//! ampersand-delimited credential safe to hand to transport code as-is.

use crate::codec::{self, Base64Error, EncodingMode};
use crate::crypto::{self, SigMethod};
use crate::escape::escape_signature;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Version stamp carried in every token.
pub const TOKEN_VERSION: &str = "2018-10-31";

#[derive(Debug, Error)]
pub enum TokenError {
    /// The access key did not decode as Base64.
    #[error("access key is not valid base64: {0}")]
    InvalidAccessKey(#[source] Base64Error),

    /// The access key decoded to zero bytes.
    #[error("access key decoded to an empty key")]
    EmptyAccessKey,

    /// The signature failed to encode. Indicates a codec defect, not bad
    /// caller input.
    #[error("signature encoding failed: {0}")]
    SignatureEncoding(#[source] Base64Error),
}

/// Everything needed to mint one token. Constructed per request and
/// consumed immediately; holds no state between calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRequest {
    pub method: SigMethod,
    /// Expiry as unsigned epoch seconds; the token is valid until then.
    pub expiry: u32,
    pub product_id: String,
    /// Present for device-level tokens, absent for product-level ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    /// Access key as issued by the platform: Base64 text.
    pub access_key: String,
}

impl TokenRequest {
    pub fn new(
        method: SigMethod,
        expiry: u32,
        product_id: impl Into<String>,
        access_key: impl Into<String>,
    ) -> Self {
        Self {
            method,
            expiry,
            product_id: product_id.into(),
            device_name: None,
            access_key: access_key.into(),
        }
    }

    /// Scope the token to a single device under the product.
    pub fn for_device(mut self, device_name: impl Into<String>) -> Self {
        self.device_name = Some(device_name.into());
        self
    }

    /// Set the expiry to `ttl` from now.
    pub fn expires_in(mut self, ttl: Duration) -> Self {
        self.expiry = (Utc::now() + ttl).timestamp() as u32;
        self
    }

    /// Raw resource identifier: `products/{id}` or
    /// `products/{id}/devices/{name}`.
    pub fn resource_path(&self) -> String {
        match &self.device_name {
            Some(name) => format!("products/{}/devices/{}", self.product_id, name),
            None => format!("products/{}", self.product_id),
        }
    }

    // The `res` field carries the path with `/` pre-escaped; the signature
    // escaper never touches it.
    fn escaped_resource_path(&self) -> String {
        match &self.device_name {
            Some(name) => format!("products%2F{}%2Fdevices%2F{}", self.product_id, name),
            None => format!("products%2F{}", self.product_id),
        }
    }

    /// Canonical newline-joined text the signature is computed over.
    pub fn signing_string(&self) -> String {
        format!(
            "{}\n{}\n{}\n{}",
            self.expiry,
            self.method.as_str(),
            self.resource_path(),
            TOKEN_VERSION
        )
    }

    /// Assemble the token string.
    ///
    /// Decodes the access key, signs the canonical string, Base64-encodes
    /// the digest without line handling, percent-escapes it, and joins the
    /// fields in the platform's required order.
    pub fn generate(&self) -> Result<String, TokenError> {
        let key =
            codec::decode(self.access_key.as_bytes()).map_err(TokenError::InvalidAccessKey)?;
        if key.is_empty() {
            return Err(TokenError::EmptyAccessKey);
        }

        let digest = crypto::sign(self.method, &key, self.signing_string().as_bytes());
        let signature = codec::encode(&digest, EncodingMode::NoNewline)
            .map_err(TokenError::SignatureEncoding)?;

        Ok(format!(
            "version={}&res={}&et={}&method={}&sign={}",
            TOKEN_VERSION,
            self.escaped_resource_path(),
            self.expiry,
            self.method.as_str(),
            escape_signature(&signature),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device_request() -> TokenRequest {
        TokenRequest::new(SigMethod::Sha256, 2232933411, "E3Sgq5fGjC", "c2VjcmV0")
            .for_device("esp32led01")
    }

    #[test]
    fn test_signing_string_with_device() {
        assert_eq!(
            device_request().signing_string(),
            "2232933411\nsha256\nproducts/E3Sgq5fGjC/devices/esp32led01\n2018-10-31"
        );
    }

    #[test]
    fn test_signing_string_without_device() {
        let req = TokenRequest::new(SigMethod::Md5, 1700000000, "p1", "c2VjcmV0");
        assert_eq!(req.signing_string(), "1700000000\nmd5\nproducts/p1\n2018-10-31");
    }

    #[test]
    fn test_token_prefix_and_field_order() {
        let token = device_request().generate().unwrap();
        assert!(token.starts_with(
            "version=2018-10-31&res=products%2FE3Sgq5fGjC%2Fdevices%2Fesp32led01\
             &et=2232933411&method=sha256&sign="
        ));
    }

    #[test]
    fn test_token_is_deterministic() {
        let req = device_request();
        assert_eq!(req.generate().unwrap(), req.generate().unwrap());
    }

    #[test]
    fn test_product_level_resource() {
        let req = TokenRequest::new(SigMethod::Sha1, 2000000000, "E3Sgq5fGjC", "c2VjcmV0");
        let token = req.generate().unwrap();
        assert!(token.contains("&res=products%2FE3Sgq5fGjC&"));
        assert!(token.contains("&method=sha1&"));
    }

    #[test]
    fn test_invalid_access_key() {
        let req = TokenRequest::new(SigMethod::Sha256, 0, "p", "@@@@");
        assert!(matches!(
            req.generate(),
            Err(TokenError::InvalidAccessKey(_))
        ));
    }

    #[test]
    fn test_empty_access_key_rejected() {
        let req = TokenRequest::new(SigMethod::Sha256, 0, "p", "");
        assert!(matches!(req.generate(), Err(TokenError::EmptyAccessKey)));
    }

    #[test]
    fn test_expires_in_sets_future_expiry() {
        let req = TokenRequest::new(SigMethod::Sha256, 0, "p", "c2VjcmV0")
            .expires_in(Duration::hours(1));
        assert!(i64::from(req.expiry) > Utc::now().timestamp());
    }

    #[test]
    fn test_request_deserializes_from_json() {
        let req: TokenRequest = serde_json::from_str(
            r#"{
                "method": "sha256",
                "expiry": 2232933411,
                "product_id": "E3Sgq5fGjC",
                "device_name": "esp32led01",
                "access_key": "c2VjcmV0"
            }"#,
        )
        .unwrap();
        assert_eq!(req.generate().unwrap(), device_request().generate().unwrap());
    }
}
