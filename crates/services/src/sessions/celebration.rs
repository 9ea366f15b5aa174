use rand::seq::IndexedRandom;

const PHRASES: &[&str] = &[
    "Day complete. Every set counted.",
    "That's the whole plan. Great work.",
    "Done and dusted. Rest up.",
    "Consistency wins. See you next session.",
    "All sets in the bag.",
];

/// Feedback fired once when a session first reaches 100%.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Celebration {
    pub phrase: &'static str,
    /// The UI should play a success haptic.
    pub haptic: bool,
}

impl Celebration {
    #[must_use]
    pub fn random() -> Self {
        let phrase = PHRASES.choose(&mut rand::rng()).copied().unwrap_or(PHRASES[0]);
        Self {
            phrase,
            haptic: true,
        }
    }
}
