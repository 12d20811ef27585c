//! HmacSHA1 request signing
//!
//! The signed string is `<METHOD><endpoint>?<k1=v1&k2=v2...>` with the
//! parameters sorted by key and left unencoded. The base64 digest travels
//! as the `Signature` query parameter.

use crate::error::VpcError;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::collections::BTreeMap;

type HmacSha1 = Hmac<Sha1>;

/// Build the canonical string that gets signed
#[must_use]
pub fn string_to_sign(method: &str, endpoint: &str, params: &BTreeMap<String, String>) -> String {
    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}{}?{}", method, endpoint, query)
}

/// HMAC-SHA1 of `data` keyed with `key`, base64 encoded
pub fn hmac_sha1_base64(key: &[u8], data: &[u8]) -> Result<String, VpcError> {
    let mut mac = HmacSha1::new_from_slice(key)
        .map_err(|e| VpcError::InvalidRequest(format!("invalid secret key: {}", e)))?;
    mac.update(data);
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Sign a request's parameters with the account secret key
pub fn sign(
    secret_key: &str,
    method: &str,
    endpoint: &str,
    params: &BTreeMap<String, String>,
) -> Result<String, VpcError> {
    let plain = string_to_sign(method, endpoint, params);
    hmac_sha1_base64(secret_key.as_bytes(), plain.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_hmac_sha1_rfc2202_vector() {
        let digest = hmac_sha1_base64(b"Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(digest, "7/zfauXrL6LSdBbV8YTfnCWafHk=");
    }

    #[test]
    fn test_string_to_sign_sorts_keys() {
        let p = params(&[("vpcId", "vpc-1"), ("Action", "DescribeNetworkInterfaces"), ("Nonce", "7")]);
        assert_eq!(
            string_to_sign("GET", "vpc.api.qcloud.com/v2/index.php", &p),
            "GETvpc.api.qcloud.com/v2/index.php?Action=DescribeNetworkInterfaces&Nonce=7&vpcId=vpc-1"
        );
    }

    #[test]
    fn test_sign_known_request() {
        let p = params(&[
            ("Action", "DescribeNetworkInterfaces"),
            ("Nonce", "11886"),
            ("Region", "ap-guangzhou"),
            ("SecretId", "AKIDtest"),
            ("SignatureMethod", "HmacSHA1"),
            ("Timestamp", "1465185768"),
            ("vpcId", "vpc-1"),
        ]);
        let signature = sign("secret", "GET", "vpc.api.qcloud.com/v2/index.php", &p).unwrap();
        assert_eq!(signature, "sb6X/74LYx5z8xt3cIhR/oZeL5Y=");
    }
}
