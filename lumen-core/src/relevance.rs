//! Relevance filtering: decides which classifier labels are worth announcing.

/// Immutable keyword set matched against classifier labels.
///
/// Matching is case-insensitive substring in both directions, so the label
/// `"Catfood"` matches the term `"cat"` and the label `"glass"` matches the
/// term `"glasses"`. Terms are lowercased once at construction.
#[derive(Debug, Clone)]
pub struct PriorityVocabulary {
    terms: Vec<String>,
}

impl PriorityVocabulary {
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            terms: terms
                .into_iter()
                .map(|t| t.into().to_lowercase())
                .collect(),
        }
    }

    /// The built-in priority list: everyday objects a walking user is most
    /// likely to need called out, with common naming variations.
    pub fn default_terms() -> Vec<String> {
        [
            // Common objects (high priority)
            "person", "face", "hand", "phone", "book", "chair", "table",
            // Electronics
            "laptop", "computer", "tablet", "screen", "monitor", "keyboard", "mouse",
            // Furniture
            "desk", "bed", "sofa", "couch", "cabinet", "shelf",
            // Personal items
            "bag", "backpack", "wallet", "watch", "glasses",
            // Food and drink
            "cup", "bottle", "glass", "plate", "bowl", "food",
            // Room elements
            "door", "window", "wall", "floor", "ceiling", "light",
            // Common items
            "box", "paper", "pen", "pencil", "clock",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    /// Returns true if the label text matches any priority term.
    pub fn is_relevant(&self, label_text: &str) -> bool {
        let text = label_text.to_lowercase();
        self.terms
            .iter()
            .any(|term| text.contains(term.as_str()) || term.contains(text.as_str()))
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl Default for PriorityVocabulary {
    fn default() -> Self {
        Self::new(Self::default_terms())
    }
}
