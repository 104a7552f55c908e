use crate::{model::Reference, projection::ReferenceSet};
use std::fmt::{Display, Formatter};

/// Minimal set of changes turning an observed reference set into a desired one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    /// desired − observed, in sorted order
    pub to_add: Vec<Reference>,
    /// observed − desired, in sorted order
    pub to_delete: Vec<Reference>,
    /// |desired ∩ observed|
    pub unchanged: usize,
}

impl ReconciliationPlan {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_delete.is_empty()
    }

    /// The observed set as it will look once this plan has been applied.
    pub fn apply(&self, observed: &ReferenceSet) -> ReferenceSet {
        let mut next = observed.clone();
        for reference in self.to_delete.iter() {
            next.remove(reference);
        }
        next.extend(self.to_add.iter().cloned());
        next
    }
}

impl Display for ReconciliationPlan {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "adding {}, deleting {}, keeping {}",
            self.to_add.len(),
            self.to_delete.len(),
            self.unchanged
        )
    }
}

/// Compute `(desired − observed, observed − desired)`.
pub fn reconcile(desired: &ReferenceSet, observed: &ReferenceSet) -> ReconciliationPlan {
    let to_add: Vec<Reference> = desired.difference(observed).cloned().collect();
    let to_delete: Vec<Reference> = observed.difference(desired).cloned().collect();
    ReconciliationPlan {
        unchanged: desired.len() - to_add.len(),
        to_add,
        to_delete,
    }
}
