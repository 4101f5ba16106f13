//! # wxpay-core
//!
//! Signed request and verified response pipeline for the WeChat Pay API v3.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      WechatPayClient                          │
//! │                                                               │
//! │  endpoint calls (orders, refunds, bills, complaints)          │
//! │                           │                                   │
//! │                           ▼                                   │
//! │  ┌─────────────────────────────────────────────────────┐     │
//! │  │                   HttpsClient                        │     │
//! │  │  Credential ──► Authorization header                 │     │
//! │  │  ResponseValidator ◄── Wechatpay-* headers + body    │     │
//! │  └─────────────────────────────────────────────────────┘     │
//! │                           │                                   │
//! │                           ▼                                   │
//! │  ┌──────────────────┐   ┌──────────────────────────────┐     │
//! │  │ CertificateStore │◄──│ CertificateVerifier          │     │
//! │  │ serial ─► key    │   │ SHA256withRSA over response  │     │
//! │  └──────────────────┘   └──────────────────────────────┘     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Properties
//!
//! - **No unverified bodies**: a 2xx body is returned only after its
//!   signature, timestamp and certificate serial check out
//! - **Append-only trust**: platform certificates are added by serial,
//!   never replaced
//! - **Authenticated decryption**: encrypted resources fail closed on any
//!   tag mismatch

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod bill;
pub mod certificates;
pub mod client;
pub mod config;
pub mod credential;
pub mod error;
pub mod https;
pub mod notify;
pub mod types;
pub mod validation;
pub mod verifier;

pub use certificates::{
    CertificateList, CertificateStore, InsertOutcome, PlatformCertificate, RefreshReport,
};
pub use client::WechatPayClient;
pub use config::{ApiV3Key, ClientConfig};
pub use credential::{Credential, WechatPayCredentials};
pub use error::{ErrorKind, PayError};
pub use https::{ApiResponse, HttpsClient};
pub use notify::{parse_complaint_notify, ComplaintEvent, EncryptedResource};
pub use validation::{NoopValidator, ResponseValidator, WechatPayValidator};
pub use verifier::{CertificateVerifier, NullVerifier, Verifier};
