use std::fmt;

/// Query-string-shaped auxiliary data threaded through to the storage
/// layer alongside each open: `a=b&c=d`, with a leading `?` tolerated on
/// parse.
///
/// Pairs are kept in order and duplicates are preserved; values are stored
/// verbatim (no percent-decoding) because the blob is mostly a pass-through
/// — decoding happens only where a consumer needs it, e.g. token
/// extraction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OpaqueData {
    pairs: Vec<(String, String)>,
}

impl OpaqueData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `key=value` pairs separated by `&`. A pair without `=` gets an
    /// empty value; empty pairs (from `&&` or a trailing `&`) are skipped.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.strip_prefix('?').unwrap_or(raw);
        let pairs = raw
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((k, v)) => (k.to_string(), v.to_string()),
                None => (pair.to_string(), String::new()),
            })
            .collect();
        Self { pairs }
    }

    /// First value stored under `key`, verbatim.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replace the first value under `key`, or append the pair if absent.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.pairs.push((key.to_string(), value)),
        }
    }

    /// Merge `items` into the comma-joined list field `key`: append to an
    /// existing non-empty value, otherwise create the field. No-op when
    /// `items` is empty.
    pub fn append_list<I>(&mut self, key: &str, items: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let joined = items
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(",");
        if joined.is_empty() {
            return;
        }
        match self.get(key) {
            Some(existing) if !existing.is_empty() => {
                let merged = format!("{existing},{joined}");
                self.set(key, merged);
            }
            _ => self.set(key, joined),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Render as `k=v&k2=v2` (no leading `?`).
    pub fn to_query(&self) -> String {
        self.pairs
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl fmt::Display for OpaqueData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query())
    }
}
