//! `aws-chunked` streaming payload support
//! (`STREAMING-AWS4-HMAC-SHA256-PAYLOAD`).
//!
//! Each chunk is framed as `{hex-size};chunk-signature={hex-sig}\r\n{data}\r\n`,
//! terminated by a zero-length chunk. Each chunk's signature is computed over
//! the previous chunk's signature (or the seed signature from the
//! `Authorization` header, for the first chunk), so chunks can only be
//! replayed or reordered by someone holding the secret key.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// The payload-hash sentinel naming the chunked-streaming content encoding.
pub const STREAMING_SENTINEL: &str = "STREAMING-AWS4-HMAC-SHA256-PAYLOAD";

/// The payload-hash sentinel for unsigned bodies.
pub const UNSIGNED_PAYLOAD_SENTINEL: &str = "UNSIGNED-PAYLOAD";

/// Decode and verify an `aws-chunked` body, returning the concatenated
/// plaintext. `seed_signature` is the `Signature=` value from the
/// `Authorization` header (the chain's starting point); `string_to_sign_prefix`
/// and `signing_key` are reused to build each chunk's string-to-sign.
pub fn decode_and_verify_chunked(
    body: &[u8],
    signing_key: &[u8],
    date_scope: &str,
    seed_signature: &str,
) -> Result<Vec<u8>, AuthError> {
    let mut out = Vec::with_capacity(body.len());
    let mut cursor = 0usize;
    let mut previous_signature = seed_signature.to_owned();

    loop {
        let header_end = find_crlf(body, cursor).ok_or(AuthError::InvalidChunkFraming)?;
        let header = std::str::from_utf8(&body[cursor..header_end])
            .map_err(|_| AuthError::InvalidChunkFraming)?;
        let (size_str, signature) = parse_chunk_header(header)?;
        let size = usize::from_str_radix(size_str, 16).map_err(|_| AuthError::InvalidChunkFraming)?;

        let data_start = header_end + 2;
        let data_end = data_start + size;
        if data_end + 2 > body.len() {
            return Err(AuthError::InvalidChunkFraming);
        }
        let chunk_data = &body[data_start..data_end];

        let chunk_hash = hex::encode(Sha256::digest(chunk_data));
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256-PAYLOAD\n{date_scope}\n{previous_signature}\n{empty_hash}\n{chunk_hash}",
            empty_hash = hex::encode(Sha256::digest(b"")),
        );
        let expected = hex::encode(hmac_sha256(signing_key, string_to_sign.as_bytes()));
        if !expected.as_bytes().ct_eq(signature.as_bytes()).into() {
            return Err(AuthError::SignatureDoesNotMatch);
        }

        if size == 0 {
            break;
        }
        out.extend_from_slice(chunk_data);
        previous_signature = signature.to_owned();
        cursor = data_end + 2;
    }

    Ok(out)
}

fn parse_chunk_header(header: &str) -> Result<(&str, &str), AuthError> {
    let (size_str, rest) = header.split_once(';').ok_or(AuthError::InvalidChunkFraming)?;
    let signature = rest
        .strip_prefix("chunk-signature=")
        .ok_or(AuthError::InvalidChunkFraming)?;
    Ok((size_str, signature))
}

fn find_crlf(body: &[u8], from: usize) -> Option<usize> {
    body[from..]
        .windows(2)
        .position(|w| w == b"\r\n")
        .map(|p| from + p)
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sigv4::derive_signing_key;

    #[test]
    fn test_decode_single_chunk_matching_signature() {
        let secret = "wJalrXUtnFEMI/K7MDENG/bPxRfiCYEXAMPLEKEY";
        let key = derive_signing_key(secret, "20130524", "us-east-1", "s3");
        let seed = "seedsig";
        let data = b"hello world";
        let chunk_hash = hex::encode(Sha256::digest(data));
        let sts = format!(
            "AWS4-HMAC-SHA256-PAYLOAD\n20130524T000000Z/us-east-1/s3/aws4_request\n{seed}\n{empty}\n{chunk_hash}",
            empty = hex::encode(Sha256::digest(b"")),
        );
        let sig = hex::encode(hmac_sha256(&key, sts.as_bytes()));

        let mut body = Vec::new();
        body.extend_from_slice(format!("{:x};chunk-signature={sig}\r\n", data.len()).as_bytes());
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
        let final_sts = format!(
            "AWS4-HMAC-SHA256-PAYLOAD\n20130524T000000Z/us-east-1/s3/aws4_request\n{sig}\n{empty}\n{empty}",
            empty = hex::encode(Sha256::digest(b"")),
        );
        let final_sig = hex::encode(hmac_sha256(&key, final_sts.as_bytes()));
        body.extend_from_slice(format!("0;chunk-signature={final_sig}\r\n\r\n").as_bytes());

        let decoded = decode_and_verify_chunked(
            &body,
            &key,
            "20130524T000000Z/us-east-1/s3/aws4_request",
            seed,
        )
        .unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_rejects_tampered_chunk_signature() {
        let key = vec![0u8; 32];
        let body = b"5;chunk-signature=deadbeef\r\nhello\r\n0;chunk-signature=deadbeef\r\n\r\n";
        let err = decode_and_verify_chunked(body, &key, "scope", "seed").unwrap_err();
        assert!(matches!(err, AuthError::SignatureDoesNotMatch));
    }
}
