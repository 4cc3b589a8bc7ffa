use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};

/// Escapes everything except the unreserved characters, for use in a query
/// component. Notably `+`, `/` and `=` from base64 are escaped.
pub const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Same as [`QUERY_ENCODE_SET`], but `@` is kept as is since access ids are
/// service account emails
pub const ACCESS_ID_ENCODE_SET: &AsciiSet = &QUERY_ENCODE_SET.remove(b'@');

/// Escapes an object name for use as a URL path, `/` separates path segments
/// and is kept
pub const PATH_ENCODE_SET: &AsciiSet = &QUERY_ENCODE_SET.remove(b'/');
