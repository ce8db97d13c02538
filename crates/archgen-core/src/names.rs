//! Naming helpers for generated artifacts.
//!
//! Generated names derive from node names plus a fixed per-artifact suffix,
//! so they stay stable across runs and cannot collide as long as node names
//! are unique.

/// Makes `name` usable as a Rust identifier: every character outside
/// `[A-Za-z0-9_]` becomes `_`, and a leading digit gets a `_` prefix.
pub fn clean_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Lower snake case of [`clean_name`]: `UserService` -> `user_service`.
pub fn snake_name(name: &str) -> String {
    let cleaned = clean_name(name);
    let mut out = String::with_capacity(cleaned.len() + 4);
    let mut prev: Option<char> = None;
    for c in cleaned.chars() {
        if c.is_ascii_uppercase() {
            if prev.is_some_and(|p| p.is_ascii_lowercase() || p.is_ascii_digit()) {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
        prev = Some(c);
    }
    out
}

/// `<Node>_<Suffix>`, e.g. `UserService_Wrapper`.
pub fn artifact_name(node: &str, suffix: &str) -> String {
    format!("{}_{}", clean_name(node), clean_name(suffix))
}

/// Source file name for an artifact: `user_service_wrapper.rs`.
pub fn artifact_file_name(node: &str, suffix: &str) -> String {
    format!("{}.rs", snake_name(&artifact_name(node, suffix)))
}

/// Dotted instance path, skipping empty segments: `serviceA.handler`.
pub fn instance_path(segments: &[&str]) -> String {
    segments
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(".")
}

/// Crate name for a generated module: `<prefix>_<short>` in snake case.
pub fn crate_name(prefix: &str, short: &str) -> String {
    let short = snake_name(short);
    if prefix.is_empty() {
        short
    } else {
        format!("{}_{}", snake_name(prefix), short)
    }
}
