use thiserror::Error;

/// Raised when a request path reduces to nothing, leaving no file to name.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("request path is empty after sanitization")]
pub struct EmptyPath;

/// Normalizes a raw request path into the `./`-relative form used both as
/// the cache key and as the filesystem name under the document root.
///
/// The reduction rewrites `/../` -> `/`, `\/` -> `/` and `//` -> `/` until
/// none of the patterns remain, then appends `index.html` to directory
/// requests and rewrites the leading separator to `./`.
pub fn sanitize(raw: &str) -> Result<String, EmptyPath> {
    let mut reduced = reduce(raw);
    if reduced.ends_with('/') {
        reduced.push_str("index.html");
    }
    let mut chars = reduced.chars();
    if chars.next().is_none() {
        return Err(EmptyPath);
    }
    Ok(format!("./{}", chars.as_str()))
}

/// Reduces `path` to the fixed point of the three substitutions.
///
/// The rules form a terminating, locally confluent rewrite system (every
/// overlap of two left-hand sides reduces to the same string), so the fixed
/// point is unique and can be computed in a single left-to-right scan: each
/// substitution only ever rewrites a suffix of the scanned prefix, and the
/// replacement character is re-examined before the scan moves on. This stays
/// linear even on adversarial inputs hundreds of thousands of characters
/// long, where pass-per-pattern replacement degrades quadratically.
fn reduce(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for ch in path.chars() {
        out.push(ch);
        loop {
            if out.ends_with("/../") {
                out.truncate(out.len() - 4);
                out.push('/');
            } else if out.ends_with("\\/") || out.ends_with("//") {
                out.truncate(out.len() - 2);
                out.push('/');
            } else {
                break;
            }
        }
    }
    out
}
