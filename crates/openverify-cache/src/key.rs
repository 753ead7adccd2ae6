/// Build the canonical cache key for a (path, host, port) triple.
///
/// Format: `host[:port]//path`, with any leading slashes stripped from
/// `path` first so the host/path boundary is always exactly two slashes —
/// no ambiguity from doubled or missing separators on the caller's side.
/// `port: None` omits the `:port` suffix.
///
/// The key is a purely syntactic artifact: two keys are equal iff their
/// strings are. No percent-decoding or other semantic equivalence is
/// applied.
///
/// Because the `host[:port]` token is the first path segment under the trie
/// root, entries for distinct servers occupy disjoint subtrees.
pub fn make_cache_key(path: &str, host: &str, port: Option<u16>) -> String {
    let path = path.trim_start_matches('/');
    match port {
        Some(port) => format!("{host}:{port}//{path}"),
        None => format!("{host}//{path}"),
    }
}
