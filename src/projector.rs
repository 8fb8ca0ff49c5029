//! Record projection: one customer or subscription to one canonical row.
//!
//! The projector is parameterized by an [`OutputShape`]. Each shape owns its
//! header list and its row layout, so adding a shape never touches the
//! encoder.

use serde::{Deserialize, Serialize};

use crate::error::ExportError;
use crate::model::{Customer, Identified, Subscription, SubscriptionStatus};
use crate::normalize::{format_one_line, normalize, split_name, strip_diacritics, text};

// ─────────────────────────────────────────────────────────────────────────────
// Record kinds
// ─────────────────────────────────────────────────────────────────────────────

/// Which list endpoint the records came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Customers,
    Subscriptions,
}

impl RecordKind {
    pub fn default_filename(&self) -> &'static str {
        match self {
            RecordKind::Customers => "customers-export.csv",
            RecordKind::Subscriptions => "subscriptions-export.csv",
        }
    }

    /// Shape used by the existing export of this kind.
    pub fn default_shape(&self) -> OutputShape {
        match self {
            RecordKind::Customers => OutputShape::Contact,
            RecordKind::Subscriptions => OutputShape::ShippingLabel,
        }
    }
}

/// A record the projector knows how to flatten.
pub trait Projectable: Identified {
    const KIND: RecordKind;

    /// The customer carrying the shipping details.
    ///
    /// # Errors
    ///
    /// Returns `ExportError::MissingExpansion` when only a reference id is
    /// available.
    fn shipping_customer(&self) -> Result<&Customer, ExportError>;

    /// Subscription status, `None` for records without one.
    fn status(&self) -> Option<SubscriptionStatus> {
        None
    }

    /// Whether the record counts towards "N records to export".
    fn counts_toward_export(&self) -> bool {
        self.status() != Some(SubscriptionStatus::Canceled)
    }
}

impl Projectable for Customer {
    const KIND: RecordKind = RecordKind::Customers;

    fn shipping_customer(&self) -> Result<&Customer, ExportError> {
        Ok(self)
    }
}

impl Projectable for Subscription {
    const KIND: RecordKind = RecordKind::Subscriptions;

    fn shipping_customer(&self) -> Result<&Customer, ExportError> {
        self.customer
            .expanded()
            .ok_or_else(|| ExportError::MissingExpansion {
                subscription_id: self.id.clone(),
            })
    }

    fn status(&self) -> Option<SubscriptionStatus> {
        Some(self.status)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Output shapes
// ─────────────────────────────────────────────────────────────────────────────

/// Named output presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputShape {
    /// Split first/last name and a joined street, for shipping labels.
    ShippingLabel,
    /// Raw address keys with accent folding, for carrier uploads.
    KeyedAddress,
    /// Contact sheet with a one-line shipping address.
    Contact,
}

const SHIPPING_LABEL_HEADERS: &[&str] = &[
    "Prénom",
    "Nom",
    "Rue",
    "Code postal",
    "Ville",
    "Dép/Region",
    "Pays",
];

const KEYED_ADDRESS_HEADERS: &[&str] = &[
    "name",
    "postal_code",
    "line1",
    "line2",
    "city",
    "state",
    "country",
];

const CONTACT_HEADERS: &[&str] = &[
    "Email",
    "Name",
    "Shipping Name",
    "Shipping Address",
    "Carrier",
    "Tracking #",
    "Phone",
];

impl OutputShape {
    pub fn headers(&self) -> &'static [&'static str] {
        match self {
            OutputShape::ShippingLabel => SHIPPING_LABEL_HEADERS,
            OutputShape::KeyedAddress => KEYED_ADDRESS_HEADERS,
            OutputShape::Contact => CONTACT_HEADERS,
        }
    }

    /// Only the carrier-upload shape folds accents unless told otherwise.
    pub fn default_strip_diacritics(&self) -> bool {
        matches!(self, OutputShape::KeyedAddress)
    }
}

/// One flattened record. Every field is a string; empty means unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanonicalRow {
    ShippingLabel {
        first_name: String,
        last_name: String,
        street: String,
        postal_code: String,
        city: String,
        state: String,
        country: String,
    },
    KeyedAddress {
        name: String,
        postal_code: String,
        line1: String,
        line2: String,
        city: String,
        state: String,
        country: String,
    },
    Contact {
        email: String,
        name: String,
        shipping_name: String,
        shipping_address: String,
        carrier: String,
        tracking_number: String,
        phone: String,
    },
}

impl CanonicalRow {
    /// Field values in the order of the shape's headers.
    pub fn fields(&self) -> [&str; 7] {
        let fields = match self {
            CanonicalRow::ShippingLabel {
                first_name,
                last_name,
                street,
                postal_code,
                city,
                state,
                country,
            } => [first_name, last_name, street, postal_code, city, state, country],
            CanonicalRow::KeyedAddress {
                name,
                postal_code,
                line1,
                line2,
                city,
                state,
                country,
            } => [name, postal_code, line1, line2, city, state, country],
            CanonicalRow::Contact {
                email,
                name,
                shipping_name,
                shipping_address,
                carrier,
                tracking_number,
                phone,
            } => [
                email,
                name,
                shipping_name,
                shipping_address,
                carrier,
                tracking_number,
                phone,
            ],
        };
        fields.map(String::as_str)
    }

    pub fn shape(&self) -> OutputShape {
        match self {
            CanonicalRow::ShippingLabel { .. } => OutputShape::ShippingLabel,
            CanonicalRow::KeyedAddress { .. } => OutputShape::KeyedAddress,
            CanonicalRow::Contact { .. } => OutputShape::Contact,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RecordProjector
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordProjector {
    shape: OutputShape,
    strip_diacritics: bool,
}

impl RecordProjector {
    pub fn new(shape: OutputShape) -> Self {
        Self {
            shape,
            strip_diacritics: shape.default_strip_diacritics(),
        }
    }

    /// Folds names and street lines, including the street part of the
    /// contact one-line address. Locality fields are never folded.
    pub fn with_strip_diacritics(mut self, strip: bool) -> Self {
        self.strip_diacritics = strip;
        self
    }

    pub fn shape(&self) -> OutputShape {
        self.shape
    }

    pub fn strips_diacritics(&self) -> bool {
        self.strip_diacritics
    }

    pub fn headers(&self) -> &'static [&'static str] {
        self.shape.headers()
    }

    /// Projects one record.
    ///
    /// # Errors
    ///
    /// Returns `ExportError::MissingExpansion` for a subscription whose
    /// customer was not expanded. Absent fields never cause an error.
    pub fn project<R: Projectable>(&self, record: &R) -> Result<CanonicalRow, ExportError> {
        let customer = record.shipping_customer()?;
        let shipping = customer.shipping.as_ref();
        let address = normalize(shipping, self.strip_diacritics);
        let shipping_name = self.free_text(shipping.and_then(|s| s.name.as_ref()));

        let row = match self.shape {
            OutputShape::ShippingLabel => {
                let (first_name, last_name) = split_name(Some(shipping_name.as_str()));
                CanonicalRow::ShippingLabel {
                    first_name,
                    last_name,
                    street: address.street,
                    postal_code: address.postal_code,
                    city: address.city,
                    state: address.state,
                    country: address.country,
                }
            }
            OutputShape::KeyedAddress => CanonicalRow::KeyedAddress {
                name: shipping_name,
                postal_code: address.postal_code,
                line1: address.line1,
                line2: address.line2,
                city: address.city,
                state: address.state,
                country: address.country,
            },
            OutputShape::Contact => CanonicalRow::Contact {
                email: text(customer.email.as_ref()),
                name: self.free_text(customer.name.as_ref()),
                shipping_name,
                shipping_address: format_one_line(shipping, self.strip_diacritics),
                carrier: text(shipping.and_then(|s| s.carrier.as_ref())),
                tracking_number: text(shipping.and_then(|s| s.tracking_number.as_ref())),
                phone: text(shipping.and_then(|s| s.phone.as_ref())),
            },
        };
        Ok(row)
    }

    fn free_text(&self, value: Option<&String>) -> String {
        let value = text(value);
        if self.strip_diacritics {
            strip_diacritics(&value).into_owned()
        } else {
            value
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Status classification and summary
// ─────────────────────────────────────────────────────────────────────────────

/// Row highlight class shown next to a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowHighlight {
    Neutral,
    Warning,
    Error,
}

impl RowHighlight {
    pub fn for_status(status: SubscriptionStatus) -> Self {
        match status {
            SubscriptionStatus::PastDue => RowHighlight::Warning,
            SubscriptionStatus::Canceled
            | SubscriptionStatus::Incomplete
            | SubscriptionStatus::IncompleteExpired
            | SubscriptionStatus::Unpaid => RowHighlight::Error,
            _ => RowHighlight::Neutral,
        }
    }
}

/// Counts shown before an export is triggered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSummary {
    pub total: usize,
    /// Records counted as "to export" (canceled subscriptions excluded).
    pub exportable: usize,
    pub canceled: usize,
}

impl ExportSummary {
    pub fn from_records<R: Projectable>(records: &[R]) -> Self {
        let exportable = records.iter().filter(|r| r.counts_toward_export()).count();
        Self {
            total: records.len(),
            exportable,
            canceled: records.len() - exportable,
        }
    }
}
