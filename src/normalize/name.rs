/// Splits a free-text full name into `(first, last)`.
///
/// The first whitespace-separated token is the first name; the remaining
/// tokens, rejoined with single spaces, form the last name. Absent, empty
/// or whitespace-only input yields `("", "")`.
pub fn split_name(full_name: Option<&str>) -> (String, String) {
    let mut tokens = full_name.unwrap_or_default().split_whitespace();
    let first = match tokens.next() {
        Some(token) => token.to_string(),
        None => return (String::new(), String::new()),
    };
    let last = tokens.collect::<Vec<_>>().join(" ");
    (first, last)
}
