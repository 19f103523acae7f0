//! Dependency store: compiled path matchers tagged with their owner,
//! fanning a changed path out to every interested field.

use crate::field::FieldId;
use crate::PathPattern;

pub(crate) struct DependencyEntry {
    pub owner: FieldId,
    pub pattern: PathPattern,
}

pub(crate) struct DependencyStore {
    entries: Vec<DependencyEntry>,
    paused: bool,
}

impl DependencyStore {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            paused: false,
        }
    }

    /// Register a field's dependency declarations.
    pub fn add(&mut self, owner: FieldId, patterns: &[PathPattern]) {
        for pattern in patterns {
            self.entries.push(DependencyEntry {
                owner,
                pattern: pattern.clone(),
            });
        }
    }

    /// Drop every entry owned by a destroyed field.
    pub fn remove(&mut self, owner: FieldId) {
        self.entries.retain(|e| e.owner != owner);
    }

    #[inline]
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Actually resume matching; the engine defers this one tick.
    #[inline]
    pub fn resume(&mut self) {
        self.paused = false;
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Owners whose patterns accept the changed path. Empty while
    /// paused.
    pub fn match_dependencies(&self, changed: &str, all_paths: &[String]) -> Vec<FieldId> {
        if self.paused {
            return Vec::new();
        }
        self.entries
            .iter()
            .filter(|e| e.pattern.matches(changed, all_paths))
            .map(|e| e.owner)
            .collect()
    }
}
