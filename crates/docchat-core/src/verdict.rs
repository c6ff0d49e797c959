//! Usefulness heuristic for retrieval-augmented output.
//!
//! The verdict is evaluated per fragment: one fragment free of hedging
//! language marks the whole run useful, even if earlier fragments hedged.
//! An empty (or whitespace-only) answer is never useful.

/// Lower-case phrases that mark a fragment as unhelpful.
const UNHELPFUL_PHRASES: &[&str] = &[
    "don't know",
    "not sure",
    "no information",
    "no data",
    "unable to find",
    "i do not have",
];

/// `true` when `fragment` contains hedging language (case-insensitive).
pub fn is_unhelpful(fragment: &str) -> bool {
    let lowered = fragment.to_lowercase().replace('\u{2019}', "'");
    UNHELPFUL_PHRASES.iter().any(|p| lowered.contains(p))
}

/// Incrementally computed usefulness of a primary run.
#[derive(Debug, Clone, Default)]
pub struct UsefulnessVerdict {
    found_useful: bool,
    accumulated: String,
    fragments: usize,
}

impl UsefulnessVerdict {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one emitted fragment.
    pub fn observe(&mut self, fragment: &str) {
        self.accumulated.push_str(fragment);
        self.fragments += 1;
        if !is_unhelpful(fragment) {
            self.found_useful = true;
        }
    }

    pub fn is_useful(&self) -> bool {
        self.found_useful && !self.accumulated.trim().is_empty()
    }

    /// All text observed so far.
    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    pub fn fragments(&self) -> usize {
        self.fragments
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
