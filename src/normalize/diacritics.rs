//! Accent folding for carrier-label text.

use std::borrow::Cow;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Removes diacritics by canonical decomposition (NFD) followed by dropping
/// every combining mark, so `"Hélène Müller"` becomes `"Helene Muller"`.
///
/// ASCII input is returned borrowed.
pub fn strip_diacritics(value: &str) -> Cow<'_, str> {
    if value.is_ascii() {
        return Cow::Borrowed(value);
    }
    Cow::Owned(value.nfd().filter(|c| !is_combining_mark(*c)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_common_latin_accents() {
        assert_eq!(strip_diacritics("Hélène Müller"), "Helene Muller");
        assert_eq!(strip_diacritics("12 Rue de l'Église"), "12 Rue de l'Eglise");
        assert_eq!(strip_diacritics("Ångström, Çà et là"), "Angstrom, Ca et la");
    }

    #[test]
    fn ascii_is_borrowed() {
        assert!(matches!(strip_diacritics("Main Street"), Cow::Borrowed(_)));
    }

    #[test]
    fn letters_without_decomposition_are_kept() {
        // No canonical decomposition exists for these.
        assert_eq!(strip_diacritics("Łódź"), "Łodz");
        assert_eq!(strip_diacritics("Straße"), "Straße");
    }

    #[test]
    fn empty_string() {
        assert_eq!(strip_diacritics(""), "");
    }
}
