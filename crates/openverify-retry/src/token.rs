//! Best-effort bearer-token discovery for the verification probe.
//!
//! A token may ride in the connection's raw credential bytes or in the
//! opaque query blob under a handful of conventional field names. Either
//! way the result is passed to the probe as an explicit parameter — there
//! is deliberately no process-global credential channel.

use crate::opaque::OpaqueData;

/// Opaque-blob field names that may carry a token, matched after
/// percent-decoding and ASCII lowercasing.
const TOKEN_FIELDS: &[&str] = &[
    "authorization",
    "authz",
    "bearer",
    "bearer_token",
    "token",
    "access_token",
];

/// Extract a token from raw connection credential bytes.
///
/// A single trailing NUL is tolerated (C-string padding); any embedded NUL
/// or non-UTF-8 content disqualifies the credential entirely.
pub fn token_from_connection(creds: &[u8]) -> Option<String> {
    let creds = creds.strip_suffix(&[0]).unwrap_or(creds);
    if creds.is_empty() || creds.contains(&0) {
        return None;
    }
    std::str::from_utf8(creds).ok().map(str::to_string)
}

/// Scan the opaque blob for a token-bearing field.
///
/// Values are percent-decoded, trimmed, and stripped of a
/// case-insensitive `Bearer ` prefix; an empty result is skipped and the
/// scan continues with later fields.
pub fn token_from_opaque(opaque: &OpaqueData) -> Option<String> {
    for (raw_key, raw_value) in opaque.iter() {
        let key = percent_decode(raw_key).to_ascii_lowercase();
        if !TOKEN_FIELDS.contains(&key.as_str()) {
            continue;
        }

        let mut value = percent_decode(raw_value).trim().to_string();
        let has_prefix = value
            .get(..7)
            .map_or(false, |p| p.eq_ignore_ascii_case("bearer "));
        if has_prefix {
            value = value[7..].trim().to_string();
        }
        if !value.is_empty() {
            return Some(value);
        }
    }
    None
}

/// Connection credentials first, opaque blob as fallback.
pub fn extract_token(creds: Option<&[u8]>, opaque: &OpaqueData) -> Option<String> {
    creds
        .and_then(token_from_connection)
        .or_else(|| token_from_opaque(opaque))
}

/// Decode `%XX` escapes and `+` as space. Malformed escapes pass through
/// verbatim.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push((hi << 4) | lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(10 + c - b'a'),
        b'A'..=b'F' => Some(10 + c - b'A'),
        _ => None,
    }
}
