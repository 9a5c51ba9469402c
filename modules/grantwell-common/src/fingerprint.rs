use chrono::NaiveDate;
use sha2::{Digest, Sha256};

/// Normalize a string for identity comparison: lowercase, strip punctuation,
/// collapse whitespace. Shared by fingerprinting, dedup and eligibility tag
/// matching so all three agree on what "the same text" means.
pub fn normalize_key(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_space = true;
    for c in s.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    out.trim_end().to_string()
}

/// Deterministic fingerprint of a grant's semantic identity: normalized title,
/// sponsor, deadline date, and amount bounds. Identical semantic content yields
/// the identical fingerprint regardless of source, whitespace, or case.
pub fn fingerprint(
    title: &str,
    sponsor: &str,
    deadline_date: Option<NaiveDate>,
    funding_min: Option<f64>,
    funding_max: Option<f64>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_key(title).as_bytes());
    hasher.update(b"|");
    hasher.update(normalize_key(sponsor).as_bytes());
    hasher.update(b"|");
    hasher.update(
        deadline_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
            .as_bytes(),
    );
    hasher.update(b"|");
    hasher.update(amount_component(funding_min).as_bytes());
    hasher.update(b"|");
    hasher.update(amount_component(funding_max).as_bytes());
    hex::encode(hasher.finalize())
}

/// Amounts are fingerprinted at whole-dollar precision so float noise from
/// different sources cannot split identical grants.
fn amount_component(amount: Option<f64>) -> String {
    amount
        .map(|a| format!("{}", a.round() as i64))
        .unwrap_or_default()
}
