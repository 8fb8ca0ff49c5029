//! Verification of encoded payloads before delivery.

pub mod payload;

pub use payload::{validate_payload, PayloadStats, PayloadValidation, PayloadValidationError};
