//! Stripe list endpoints as page sources.
//!
//! - **Explicit credentials** passed in through `StripeConfig`, held as `secrecy::SecretString`
//! - **Safe logging** of path, status, duration and request id only
//! - **Stripe error mapping** from the `{ "error": { ... } }` envelope into `ExportError`

pub mod client;
pub mod list;

pub use client::StripeClient;
pub use list::StripeListSource;
