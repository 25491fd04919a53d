use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentSlot {
    /// Seen in this run but not (yet) created in the destination.
    Pending,
    Created(i64),
}

/// A resolved link from a child to its already-migrated parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentLink {
    pub parent_id: i64,
}

/// Tracks destination ids of parentless issues for the lifetime of one run.
#[derive(Debug, Default)]
pub struct HierarchyTracker {
    roots: HashMap<String, ParentSlot>,
}

impl HierarchyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a created item that has no parent in the source.
    pub fn record_root(&mut self, issue_key: &str, destination_id: i64) {
        self.roots
            .insert(issue_key.to_string(), ParentSlot::Created(destination_id));
    }

    pub fn resolve_parent_link(
        &mut self,
        issue_key: &str,
        parent_key: Option<&str>,
    ) -> Option<ParentLink> {
        let Some(parent_key) = parent_key.filter(|k| !k.is_empty()) else {
            self.roots
                .entry(issue_key.to_string())
                .or_insert(ParentSlot::Pending);
            return None;
        };

        match self.roots.get(parent_key)? {
            ParentSlot::Created(parent_id) => Some(ParentLink {
                parent_id: *parent_id,
            }),
            ParentSlot::Pending => None,
        }
    }

    #[cfg(test)]
    pub fn slot(&self, issue_key: &str) -> Option<ParentSlot> {
        self.roots.get(issue_key).copied()
    }
}
