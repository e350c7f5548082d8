//! Query normalization and cache-key hashing.
//!
//! Cache keys are full 32-byte BLAKE3 hashes of the normalized question;
//! conversation histories are folded in as a truncated 64-bit fingerprint.

use blake3::Hasher;

use crate::query::ChatTurn;

/// Normalizes a raw question for cache keying and routing.
///
/// Case-folds, collapses internal whitespace, and strips trailing
/// punctuation so that `"What is SSO?"` and `"  what is sso "` share a key.
pub fn normalize_query(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for word in raw.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.extend(word.to_lowercase().chars());
    }
    while out.ends_with(['?', '!', '.']) {
        out.pop();
    }
    out.trim_end().to_string()
}

/// Computes the 32-byte cache key for a normalized question plus an
/// optional history fingerprint.
#[inline]
pub fn cache_key(normalized: &str, history_fingerprint: Option<u64>) -> [u8; 32] {
    let mut hasher = Hasher::new();
    hasher.update(normalized.as_bytes());
    if let Some(fp) = history_fingerprint {
        hasher.update(b"|");
        hasher.update(&fp.to_le_bytes());
    }
    *hasher.finalize().as_bytes()
}

/// Computes a 64-bit fingerprint over a bounded conversation history.
///
/// Truncated from BLAKE3; collisions only cost a spurious cache miss, the
/// entry itself is keyed by the full question hash as well.
pub fn history_fingerprint(history: &[ChatTurn]) -> Option<u64> {
    if history.is_empty() {
        return None;
    }
    let mut hasher = Hasher::new();
    for turn in history {
        hasher.update(turn.role.as_str().as_bytes());
        hasher.update(b":");
        hasher.update(turn.text.as_bytes());
        hasher.update(b"|");
    }
    let hash = hasher.finalize();
    let bytes: [u8; 8] = hash.as_bytes()[0..8]
        .try_into()
        .expect("BLAKE3 always produces at least 8 bytes");
    Some(u64::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::TurnRole;

    #[test]
    fn normalize_casefolds_and_collapses_whitespace() {
        assert_eq!(normalize_query("  What   is\tSSO? "), "what is sso");
        assert_eq!(normalize_query("Pricing?!."), "pricing");
        assert_eq!(normalize_query(""), "");
    }

    #[test]
    fn normalized_variants_share_a_key() {
        let a = cache_key(&normalize_query("What is SSO?"), None);
        let b = cache_key(&normalize_query("what  is sso"), None);
        assert_eq!(a, b);
    }

    #[test]
    fn history_changes_the_key() {
        let norm = normalize_query("what is sso");
        let turns = vec![ChatTurn {
            role: TurnRole::User,
            text: "earlier question".to_string(),
        }];
        let bare = cache_key(&norm, history_fingerprint(&[]));
        let with_history = cache_key(&norm, history_fingerprint(&turns));
        assert_ne!(bare, with_history);
    }

    #[test]
    fn fingerprint_is_deterministic_and_role_sensitive() {
        let user = vec![ChatTurn {
            role: TurnRole::User,
            text: "hello".to_string(),
        }];
        let bot = vec![ChatTurn {
            role: TurnRole::Bot,
            text: "hello".to_string(),
        }];
        assert_eq!(history_fingerprint(&user), history_fingerprint(&user));
        assert_ne!(history_fingerprint(&user), history_fingerprint(&bot));
        assert_eq!(history_fingerprint(&[]), None);
    }
}
