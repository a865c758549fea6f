use regex::Regex;

use replypilot_core_types::CandidateKey;

/// Default pattern for the canonical reference embedded in raw keys: a
/// URN-style token whose parenthesized payload is the permanent identifier.
const CANONICAL_PATTERN: &str = r"urn:[a-z0-9.]+:comment:\([^)]*\)";

/// Raw-to-normalized key mapping. Canonical-reference extraction takes
/// precedence; the fallback compacts embedded whitespace. Normalizing an
/// already-normalized key is a no-op.
#[derive(Clone, Debug)]
pub struct KeyNorm {
    canonical: Regex,
}

impl KeyNorm {
    pub fn new(canonical: Regex) -> Self {
        Self { canonical }
    }

    pub fn normalize(&self, raw: &str) -> CandidateKey {
        if let Some(found) = self.canonical.find(raw) {
            return CandidateKey::new(found.as_str());
        }
        let compacted = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        CandidateKey::new(compacted)
    }
}

impl Default for KeyNorm {
    fn default() -> Self {
        // The pattern is a compile-time constant; it cannot fail to parse.
        Self {
            canonical: Regex::new(CANONICAL_PATTERN).expect("valid canonical pattern"),
        }
    }
}
