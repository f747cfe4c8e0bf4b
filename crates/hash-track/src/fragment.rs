/// Returns the fragment of `address`: everything after the first `#`.
///
/// The value is parsed out of the full address rather than taken from a
/// fragment accessor. Some hosts move a `?query` inside the fragment into the
/// search component, drop later fragments when a query string is present, or
/// unescape the accessor's value while leaving the address untouched. The
/// full address is the only representation that is consistent everywhere.
///
/// An address without `#` and an address ending in `#` both yield `""`.
pub fn fragment_of(address: &str) -> &str {
    match address.find('#') {
        Some(index) => &address[index + 1..],
        None => "",
    }
}

/// Replaces the fragment of `address` with `fragment`, appending `#` when the
/// address had none.
pub fn with_fragment(address: &str, fragment: &str) -> String {
    let base = match address.find('#') {
        Some(index) => &address[..index],
        None => address,
    };
    format!("{base}#{fragment}")
}
