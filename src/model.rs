//! Billing-platform records as they arrive from the list endpoints.
//!
//! Every field the platform may omit or send as `null` is an `Option`, so
//! deserialization never fails on a sparsely populated record and the
//! normalizers can treat absence uniformly.

use serde::{Deserialize, Serialize};

/// Records that can be used as a pagination cursor.
pub trait Identified {
    fn id(&self) -> &str;
}

// ─────────────────────────────────────────────────────────────────────────────
// Address / Shipping
// ─────────────────────────────────────────────────────────────────────────────

/// Postal address attached to a shipping block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub city: Option<String>,
    pub country: Option<String>,
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub postal_code: Option<String>,
    pub state: Option<String>,
}

/// Shipping details of a customer. May be entirely absent on the customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Shipping {
    pub address: Option<Address>,
    pub carrier: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub tracking_number: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Customer
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub shipping: Option<Shipping>,
}

impl Identified for Customer {
    fn id(&self) -> &str {
        &self.id
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Subscription
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle status of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Incomplete,
    IncompleteExpired,
    Trialing,
    Active,
    PastDue,
    Canceled,
    Unpaid,
    Paused,
    /// Any status introduced after this crate was written.
    #[serde(other)]
    Unknown,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Incomplete => "incomplete",
            SubscriptionStatus::IncompleteExpired => "incomplete_expired",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Unpaid => "unpaid",
            SubscriptionStatus::Paused => "paused",
            SubscriptionStatus::Unknown => "unknown",
        }
    }
}

/// The `customer` field of a subscription: a bare id unless the list call
/// asked for `expand[]=data.customer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CustomerRef {
    Id(String),
    Expanded(Box<Customer>),
}

impl CustomerRef {
    /// Returns the expanded customer, or `None` for a bare reference.
    pub fn expanded(&self) -> Option<&Customer> {
        match self {
            CustomerRef::Expanded(customer) => Some(customer),
            CustomerRef::Id(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub status: SubscriptionStatus,
    pub customer: CustomerRef,
}

impl Identified for Subscription {
    fn id(&self) -> &str {
        &self.id
    }
}
