//! Restricting a project's BOQ activities to selected divisions.

use std::collections::BTreeSet;

use crate::types::BoqActivity;
use crate::util::normalize_text;

/// Normalized set of selected division names. Empty means "no filtering".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DivisionFilter {
    selected: BTreeSet<String>,
}

impl DivisionFilter {
    pub fn new<S: AsRef<str>>(names: &[S]) -> Self {
        let selected = names
            .iter()
            .map(|n| normalize_text(n.as_ref()))
            .filter(|n| !n.is_empty())
            .collect();
        DivisionFilter { selected }
    }

    pub fn is_active(&self) -> bool {
        !self.selected.is_empty()
    }

    /// Sorted normalized names, as used in cache keys.
    pub fn names(&self) -> Vec<String> {
        self.selected.iter().cloned().collect()
    }

    pub fn allows(&self, activity: &BoqActivity) -> bool {
        if !self.is_active() {
            return true;
        }
        activity
            .division
            .as_deref()
            .map(|d| self.selected.contains(&normalize_text(d)))
            .unwrap_or(false)
    }

    /// Keeps only activities in a selected division. The project itself is
    /// never dropped by this; an empty result simply values to zero.
    pub fn apply<'a>(&self, activities: &[&'a BoqActivity]) -> Vec<&'a BoqActivity> {
        activities.iter().copied().filter(|a| self.allows(a)).collect()
    }
}
