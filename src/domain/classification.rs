use crate::domain::rule::HighlightRule;

/// Outcome of matching one chat item against a rule snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// A blacklist entry matched; the item is hidden.
    Suppressed,
    /// The first matching highlight rule in snapshot order.
    Highlighted(HighlightRule),
    Plain,
}

impl Classification {
    pub fn is_suppressed(&self) -> bool {
        matches!(self, Self::Suppressed)
    }

    pub fn highlighted_by(&self) -> Option<&HighlightRule> {
        match self {
            Self::Highlighted(rule) => Some(rule),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Suppressed => "suppressed",
            Self::Highlighted(_) => "highlighted",
            Self::Plain => "plain",
        }
    }
}
