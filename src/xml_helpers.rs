//! Shared XML attribute helpers for the XLSX reader.
//!
//! All lookups compare local names, so `r:id` and `id` both match `b"id"`.

use quick_xml::events::BytesStart;

/// Extract an attribute value by local name, with XML entities unescaped.
///
/// Returns `None` if the attribute is missing or malformed.
pub fn attr_string(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == key)
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}

/// Extract a raw attribute value by local name without unescaping.
///
/// Cheaper than [`attr_string`] for ASCII-only values such as cell refs.
pub fn attr_bytes(e: &BytesStart, key: &[u8]) -> Option<Vec<u8>> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == key)
        .map(|attr| attr.value.into_owned())
}

/// Check if an element matches a local name, ignoring namespace prefix.
#[inline]
pub fn element_matches(e: &BytesStart, local_name: &[u8]) -> bool {
    e.local_name().as_ref() == local_name
}
