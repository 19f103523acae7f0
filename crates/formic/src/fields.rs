//! Field store: registry of constructed fields and the derived read
//! views over the mounted subset.
//!
//! Derivations are pull-based: the visible value tree is recomputed on
//! read and memoized until the engine invalidates it (mount, unmount,
//! path change, or any committed write).

use crate::field::{FieldId, FieldState};
use crate::value::{self};
use crate::{Path, PathPattern, Seg};
use serde_json::{Map, Value};
use std::collections::HashMap;

pub(crate) struct FieldStore {
    fields: HashMap<FieldId, FieldState>,
    order: Vec<FieldId>,
    cache: Option<Value>,
}

impl FieldStore {
    pub fn new() -> Self {
        Self {
            fields: HashMap::new(),
            order: Vec::new(),
            cache: None,
        }
    }

    pub fn insert(&mut self, state: FieldState) {
        self.order.push(state.id);
        self.fields.insert(state.id, state);
        self.cache = None;
    }

    pub fn remove(&mut self, id: FieldId) -> Option<FieldState> {
        self.order.retain(|&fid| fid != id);
        self.cache = None;
        self.fields.remove(&id)
    }

    #[inline]
    pub fn get(&self, id: FieldId) -> Option<&FieldState> {
        self.fields.get(&id)
    }

    #[inline]
    pub fn get_mut(&mut self, id: FieldId) -> Option<&mut FieldState> {
        self.fields.get_mut(&id)
    }

    /// Drop the memoized derivation; next read recomputes.
    #[inline]
    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    /// All constructed fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldState> {
        self.order.iter().filter_map(|id| self.fields.get(id))
    }

    /// Field ids in insertion order (owned, for mutation loops).
    pub fn ids(&self) -> Vec<FieldId> {
        self.order.clone()
    }

    fn visible(&self) -> impl Iterator<Item = &FieldState> {
        self.iter().filter(|f| f.mounted && f.shown)
    }

    /// First mounted field bound to exactly this path.
    pub fn find_by_path(&self, path: &Path) -> Option<FieldId> {
        self.visible()
            .find(|f| &f.path == path)
            .or_else(|| self.iter().find(|f| &f.path == path))
            .map(|f| f.id)
    }

    /// Child fields of an array field, in insertion order.
    pub fn children_of(&self, list: FieldId) -> Vec<FieldId> {
        self.iter()
            .filter(|f| f.parent.is_some_and(|p| p.list == list))
            .map(|f| f.id)
            .collect()
    }

    /// Stringified path of every mounted field, in registry order.
    pub fn fields_path(&self) -> Vec<String> {
        self.visible().map(|f| f.path.to_string()).collect()
    }

    /// Every mounted field path accepted by the compiled matcher.
    pub fn match_field_path(&self, pattern: &PathPattern) -> Vec<String> {
        let all = self.fields_path();
        all.iter()
            .filter(|p| pattern.matches(p, &all))
            .cloned()
            .collect()
    }

    /// The visible value tree: only mounted, shown fields contribute.
    ///
    /// Two-pass composition: array fields first seed their slot with
    /// empty placeholder rows sized to the live row count, so a list
    /// with no populated scalar sub-fields still reports the correct
    /// length; scalar fields then fill in their values.
    pub fn fields_value(&mut self, live: &Value) -> Value {
        if let Some(cached) = &self.cache {
            return cached.clone();
        }
        let out = self.compose(live, false);
        self.cache = Some(out.clone());
        out
    }

    /// Like `fields_value`, but each field's `transform` hook reshapes
    /// its contribution; list transforms run last over the assembled
    /// sub-tree. Never cached (hooks may close over external state).
    pub fn fields_transformed_value(&self, live: &Value) -> Value {
        self.compose(live, true)
    }

    fn compose(&self, live: &Value, transformed: bool) -> Value {
        let mut out = Value::Object(Map::new());

        // Pass 1: list placeholders, so intermediate paths exist
        // before scalar fields populate them.
        for f in self.visible().filter(|f| f.is_list()) {
            let len = value::get_at(live, &f.path)
                .and_then(Value::as_array)
                .map_or(0, Vec::len);
            let rows = vec![Value::Object(Map::new()); len];
            value::set_at(&mut out, &f.path, Value::Array(rows));
        }

        // Pass 2: scalar fields.
        for f in self.visible().filter(|f| !f.is_list()) {
            let Some(v) = value::get_at(live, &f.path) else {
                continue;
            };
            match (transformed, &f.options.transform) {
                (true, Some(t)) => {
                    let reshaped = t(v, &f.path.to_string());
                    self.place_contribution(&mut out, f, reshaped);
                }
                _ => value::set_at(&mut out, &f.path, v.clone()),
            }
        }

        // Pass 3: list transforms over the already-assembled sub-tree.
        if transformed {
            for f in self.visible().filter(|f| f.is_list()) {
                let Some(t) = &f.options.transform else {
                    continue;
                };
                let subtree = value::get_at(&out, &f.path).cloned().unwrap_or(Value::Null);
                let reshaped = t(&subtree, &f.path.to_string());
                self.place_contribution(&mut out, f, reshaped);
            }
        }

        out
    }

    /// Placement rule for transformed contributions: plain objects
    /// deep-merge into the root, or into the enclosing row object for
    /// fields nested in an array field; anything else is set verbatim
    /// at the field's own path.
    fn place_contribution(&self, out: &mut Value, f: &FieldState, contribution: Value) {
        if contribution.is_object() {
            match self.enclosing_row_path(f) {
                Some(row_path) => {
                    if value::get_at(out, &row_path).is_none() {
                        value::set_at(out, &row_path, Value::Object(Map::new()));
                    }
                    if let Some(slot) = value::get_at_mut(out, &row_path) {
                        value::deep_merge(slot, contribution);
                    }
                }
                None => value::deep_merge(out, contribution),
            }
        } else {
            value::set_at(out, &f.path, contribution);
        }
    }

    fn enclosing_row_path(&self, f: &FieldState) -> Option<Path> {
        let parent = f.parent?;
        let list = self.fields.get(&parent.list)?;
        Some(list.path.clone().with_segment(Seg::Index(parent.row)))
    }
}
