//! Export of Stripe customers and subscriptions to shipping-label CSV files.
//!
//! Records flow one way: a [`PageSource`] is drained page by page, each
//! record is projected into a canonical row, rows are encoded into one CSV
//! payload, the payload is verified and handed to an [`OutputSink`].
//!
//! ```ignore
//! let config = StripeConfig::from_env()?;
//! let client = StripeClient::new(&config)?;
//! let pipeline = ExportPipeline::for_kind(RecordKind::Subscriptions, ExportOptions::default());
//! let sink = AtomicFileSink::new("/tmp/exports");
//! let report = pipeline
//!     .export(&client.subscription_pages(), &sink, &CancellationToken::new())
//!     .await?;
//! ```

pub mod collector;
pub mod config;
pub mod csv_encoder;
pub mod error;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod projector;
pub mod sink;
pub mod stripe;
pub mod validation;

pub use collector::{collect_all, Page, PageSource, Paginator, PartialCollection};
pub use config::{ConfigError, ExportOptions, StripeConfig};
pub use error::{ErrorPresentation, ExportError};
pub use model::{Address, Customer, CustomerRef, Identified, Shipping, Subscription, SubscriptionStatus};
pub use pipeline::{ExportPipeline, ExportReport};
pub use projector::{
    CanonicalRow, ExportSummary, OutputShape, Projectable, RecordKind, RecordProjector, RowHighlight,
};
pub use sink::{AtomicFileSink, ExportPayload, MemorySink, OutputSink, CSV_MIME_TYPE};
pub use stripe::{StripeClient, StripeListSource};
