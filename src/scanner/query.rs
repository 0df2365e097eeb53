//! Search query normalization
//!
//! Queries are canonicalized into a stable string used as the checkpoint
//! dedup key: the same token multiset always yields the same output no
//! matter the original ordering or whitespace. The bucket ordering is a
//! checkpoint-stability choice, not query semantics, and must stay bit-exact
//! across runs.

/// Canonicalize a free-form search query.
///
/// Tokenizes on whitespace with double-quoted substrings kept atomic (an
/// unterminated quote falls back to a single-character token), classifies
/// tokens into five buckets, sorts each bucket, and joins them in fixed
/// order: quoted, other, `language:`, `filename:`, `path:`.
pub fn normalize_query(query: &str) -> String {
    let tokens = tokenize(query);

    let mut quoted = Vec::new();
    let mut language = Vec::new();
    let mut filename = Vec::new();
    let mut path = Vec::new();
    let mut other = Vec::new();

    for token in tokens {
        if token.starts_with('"') && token.ends_with('"') && token.len() >= 2 {
            quoted.push(token);
        } else if token.starts_with("language:") {
            language.push(token);
        } else if token.starts_with("filename:") {
            filename.push(token);
        } else if token.starts_with("path:") {
            path.push(token);
        } else if !token.trim().is_empty() {
            other.push(token);
        }
    }

    quoted.sort();
    language.sort();
    filename.sort();
    path.sort();
    other.sort();

    let mut normalized = quoted;
    normalized.extend(other);
    normalized.extend(language);
    normalized.extend(filename);
    normalized.extend(path);
    normalized.join(" ")
}

fn tokenize(query: &str) -> Vec<String> {
    // Collapse whitespace first so tokens never carry stray spacing
    let query: String = query.split_whitespace().collect::<Vec<_>>().join(" ");
    let chars: Vec<char> = query.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '"' {
            match chars[i + 1..].iter().position(|&c| c == '"') {
                Some(offset) => {
                    let end = i + 1 + offset;
                    tokens.push(chars[i..=end].iter().collect());
                    i = end + 1;
                }
                None => {
                    // Unterminated quote degrades to a single-character token
                    tokens.push(chars[i].to_string());
                    i += 1;
                }
            }
        } else if chars[i] == ' ' {
            i += 1;
        } else {
            let start = i;
            while i < chars.len() && chars[i] != ' ' {
                i += 1;
            }
            tokens.push(chars[start..i].iter().collect());
        }
    }

    tokens
}
