/// Percent-encoding of path params
///
/// Param values are stored decoded and encoded again when a path is built.
/// Characters allowed in a path segment (RFC 3986 `pchar`) are kept as is;
/// everything else, `/` included, is percent-encoded.

use std::borrow::Cow;

use tracing::warn;

/// Characters besides ASCII alphanumerics that may appear raw in a segment
const SEGMENT_SAFE: &str = "-._~!$&'()*+,;=:@";

fn is_segment_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || SEGMENT_SAFE.contains(c)
}

/// Encodes a param value for use inside one path segment
///
/// **Pure function** with a zero-copy fast path: returns `Cow::Borrowed`
/// when nothing needs escaping.
///
/// # Examples
///
/// ```
/// use rhtmx_spa_router::route::encoding::encode_param;
///
/// assert_eq!(encode_param("john"), "john");
/// assert_eq!(encode_param("a b"), "a%20b");
/// assert_eq!(encode_param("a/b"), "a%2Fb");
/// ```
pub fn encode_param(value: &str) -> Cow<'_, str> {
    if value.chars().all(is_segment_safe) {
        return Cow::Borrowed(value);
    }

    let mut encoded = String::with_capacity(value.len() + 8);
    let mut buf = [0u8; 4];
    for c in value.chars() {
        if is_segment_safe(c) {
            encoded.push(c);
        } else {
            encoded.push_str(&urlencoding::encode(c.encode_utf8(&mut buf)));
        }
    }
    Cow::Owned(encoded)
}

/// Decodes a percent-encoded param value
///
/// Invalid sequences are kept verbatim with a warning rather than failing
/// the whole match.
pub fn decode_param(value: &str) -> Cow<'_, str> {
    if !value.contains('%') {
        return Cow::Borrowed(value);
    }

    match urlencoding::decode(value) {
        Ok(decoded) => Cow::Owned(decoded.into_owned()),
        Err(err) => {
            warn!(value, error = %err, "failed to decode param, keeping raw value");
            Cow::Borrowed(value)
        }
    }
}
