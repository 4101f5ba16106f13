//! Consolidated integration tests for wxpay-core.
//!
//! One test binary so the mock servers and the shared RSA keys are set up
//! once instead of per file.

mod certificates;
mod client;
mod support;
mod transport;
