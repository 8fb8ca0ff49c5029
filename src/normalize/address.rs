//! Shipping block to canonical postal tuple.

use crate::model::{Address, Shipping};

use super::diacritics::strip_diacritics;
use super::text;

/// Countries whose carriers expect the state or region after the city.
pub const STATE_SUFFIX_COUNTRIES: &[&str] = &["US", "CA", "AU", "GB", "NZ"];

/// Canonical postal fields of one shipping block. Empty string means unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedAddress {
    /// `line1`, with a non-empty `line2` appended after `", "`.
    pub street: String,
    pub line1: String,
    pub line2: String,
    pub postal_code: String,
    /// City, suffixed with the state for [`STATE_SUFFIX_COUNTRIES`].
    pub city: String,
    pub state: String,
    pub country: String,
}

/// Normalizes an optional shipping block. Never fails.
///
/// When `fold_accents` is set, the free-text street lines are passed
/// through [`strip_diacritics`]; city, state, country and postal code are
/// left untouched.
pub fn normalize(shipping: Option<&Shipping>, fold_accents: bool) -> NormalizedAddress {
    let Some(address) = shipping.and_then(|s| s.address.as_ref()) else {
        return NormalizedAddress::default();
    };

    let fold = |value: Option<&String>| -> String {
        let value = text(value);
        if fold_accents {
            strip_diacritics(&value).into_owned()
        } else {
            value
        }
    };

    let line1 = fold(address.line1.as_ref());
    let line2 = fold(address.line2.as_ref());
    let state = text(address.state.as_ref());
    let country = text(address.country.as_ref());

    NormalizedAddress {
        street: join_street(&line1, &line2),
        city: city_with_state(address, &state, &country),
        postal_code: text(address.postal_code.as_ref()),
        line1,
        line2,
        state,
        country,
    }
}

fn join_street(line1: &str, line2: &str) -> String {
    match (line1.is_empty(), line2.is_empty()) {
        (_, true) => line1.to_string(),
        (true, false) => line2.to_string(),
        (false, false) => format!("{}, {}", line1, line2),
    }
}

fn city_with_state(address: &Address, state: &str, country: &str) -> String {
    let city = text(address.city.as_ref());
    let suffixed = STATE_SUFFIX_COUNTRIES
        .iter()
        .any(|c| c.eq_ignore_ascii_case(country.trim()));
    if suffixed && !city.is_empty() && !state.is_empty() {
        format!("{} {}", city, state)
    } else {
        city
    }
}

/// One-line rendering used by the contact export:
/// `line1 | line2 | city, state, postal | country`, skipping empty parts.
///
/// `fold_accents` folds the street lines only, as in [`normalize`].
pub fn format_one_line(shipping: Option<&Shipping>, fold_accents: bool) -> String {
    let Some(address) = shipping.and_then(|s| s.address.as_ref()) else {
        return String::new();
    };

    let street = |value: &str| -> String {
        if fold_accents {
            strip_diacritics(value).into_owned()
        } else {
            value.to_string()
        }
    };

    let mut parts: Vec<String> = Vec::new();
    parts.extend(non_empty(&address.line1).map(&street));
    parts.extend(non_empty(&address.line2).map(&street));

    let locality: Vec<&str> = [&address.city, &address.state, &address.postal_code]
        .into_iter()
        .filter_map(non_empty)
        .collect();
    if !locality.is_empty() {
        parts.push(locality.join(", "));
    }

    parts.extend(non_empty(&address.country).map(str::to_string));
    parts.join(" | ")
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
