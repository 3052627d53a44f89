//! AWS Signature Version 4 request authentication for the FileFlow S3 gateway.
//!
//! This crate verifies SigV4-signed requests against FileFlow's own
//! credential store (`S3Credential` rows, not IAM users): given an incoming
//! HTTP request and a [`CredentialProvider`], it checks that the request was
//! signed by a known access key with the correct secret, that the
//! `x-amz-date` is within 15 minutes of server time, and — for
//! `aws-chunked` request bodies — that every chunk's signature chains back
//! to the one in the `Authorization` header.
//!
//! # Usage
//!
//! ```rust
//! use fileflow_s3_auth::credentials::{CredentialProvider, StaticCredentialProvider};
//! use fileflow_s3_auth::sigv4::{hash_payload, verify_sigv4};
//!
//! let provider = StaticCredentialProvider::new(vec![
//!     ("FFLWEXAMPLEACCESSKEY12".to_owned(), "examplesecretkey".to_owned()),
//! ]);
//! // verify_sigv4(&parts, &hash_payload(body), &provider) checks the
//! // Authorization header against `provider`.
//! ```
//!
//! # Modules
//!
//! - [`canonical`] - Canonical request construction per the SigV4 specification
//! - [`credentials`] - Credential provider trait and in-memory implementation
//! - [`error`] - Authentication error types
//! - [`sigv4`] - Main SigV4 signature verification logic
//! - [`streaming`] - `aws-chunked` streaming payload decoding and verification

pub mod canonical;
pub mod credentials;
pub mod error;
pub mod sigv4;
pub mod streaming;

pub use credentials::{CredentialProvider, StaticCredentialProvider};
pub use error::AuthError;
pub use sigv4::{AuthResult, hash_payload, verify_sigv4};
