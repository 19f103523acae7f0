//! Engine core: every store behind one lock, with notifications
//! collected during mutation and dispatched by the facade after the
//! lock is released.
//!
//! The engine is single-threaded-cooperative: derived views are
//! pull-based, and "next tick" work (clearing a list's updating
//! window, resuming dependency triggers) sits in a deferred-task queue
//! the facade flushes when the public operation that enqueued it
//! finishes.

use crate::deps::DependencyStore;
use crate::expr::ExpressionEvaluator;
use crate::field::{FieldId, FieldOptions, FieldState, ListState, OnChangeHook, ParentRow, PropValue};
use crate::fields::FieldStore;
use crate::list;
use crate::store::ValueStore;
use crate::value::MergeStrategy;
use crate::{Path, Seg};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

/// Payload of a committed field-value change.
#[derive(Clone, Debug, Serialize)]
pub struct ValueChange {
    /// Stringified path of the changed field.
    pub path: String,
    /// The committed value (after `post_state`).
    pub value: Value,
    /// The previous value (`Null` if the slot did not exist).
    pub old_value: Value,
}

/// Payload of a dependency fan-out: `path` changed, and the field at
/// `depend_path` declared a pattern matching it.
#[derive(Clone, Debug, Serialize)]
pub struct DependencyChange {
    /// Stringified path of the changed field.
    pub path: String,
    /// Stringified path of the field that depends on it.
    pub depend_path: String,
}

/// Work items collected under the lock, run by the facade outside it.
/// Order per change: field `on_change`, dependency fan-out, form-level
/// callback.
pub(crate) enum Dispatch {
    FieldOnChange {
        hook: OnChangeHook,
        new: Value,
        old: Value,
    },
    Dependencies(Vec<DependencyChange>),
    FormChange {
        change: ValueChange,
        values: Value,
    },
}

/// Whether a commit originates from seeding or from interaction.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum Commit {
    /// Mount-time / prop-driven seeding: never marks touching, never
    /// raises notifications.
    Seed,
    /// User-or-facade-driven write: marks the field touching and
    /// notifies when the value actually changed.
    Touch,
}

/// Structural mutation request against an array field's value.
pub(crate) enum ListOp {
    Push(Value),
    Pop,
    Insert(usize, Vec<Value>),
    Remove(usize),
    Shift,
    Unshift(Value),
    Move(usize, usize),
    MoveUp(usize),
    MoveDown(usize),
}

pub(crate) enum DeferredTask {
    ClearListUpdating(FieldId),
    ResumeDependencies,
}

/// One-shot warning for fields constructed outside any form; there is
/// no engine to own a dedup cache, so it fires once per process.
pub(crate) fn warn_no_form_context(message: &str) {
    use std::sync::Once;
    static ONCE: Once = Once::new();
    ONCE.call_once(|| tracing::warn!("{message}"));
}

pub(crate) struct EngineState {
    pub values: ValueStore,
    pub fields: FieldStore,
    pub deps: DependencyStore,
    deferred: Vec<DeferredTask>,
    fully_mounted: bool,
    next_field_id: FieldId,
    next_row_key: u64,
    pub strategy: MergeStrategy,
    warned: HashSet<String>,
}

impl EngineState {
    pub fn new(initial_values: Value, strategy: MergeStrategy) -> Self {
        Self {
            values: ValueStore::new(initial_values),
            fields: FieldStore::new(),
            deps: DependencyStore::new(),
            deferred: Vec::new(),
            fully_mounted: false,
            next_field_id: 1,
            next_row_key: 1,
            strategy,
            warned: HashSet::new(),
        }
    }

    /// Emit a usage warning at most once per distinct message, deduped
    /// per engine.
    fn warn_once(&mut self, message: &str) {
        if self.warned.insert(message.to_owned()) {
            tracing::warn!("{message}");
        }
    }

    fn fresh_row_key(&mut self) -> u64 {
        let key = self.next_row_key;
        self.next_row_key += 1;
        key
    }

    // -------------------------------------------------------------
    // Field lifecycle
    // -------------------------------------------------------------

    /// Construct a field, register it, and seed its value if shown.
    pub fn construct_field(
        &mut self,
        options: FieldOptions,
        is_list: bool,
        parent: Option<ParentRow>,
        ev: &dyn ExpressionEvaluator,
    ) -> (FieldId, Vec<Dispatch>) {
        let id = self.next_field_id;
        self.next_field_id += 1;

        let path = self.full_path(parent, &options.path);
        if path.is_empty() {
            // An empty path denotes "no field"; it never enters the
            // registries.
            self.warn_once("field constructed with an empty path; it was not registered");
            return (id, Vec::new());
        }
        let shown = options.resolve_show(ev, self.values.values());

        self.deps.add(id, &options.dependencies);
        self.fields.insert(FieldState {
            id,
            path,
            options,
            list: is_list.then(ListState::default),
            parent,
            mounted: false,
            shown,
            touching: false,
        });

        let mut out = Vec::new();
        if shown {
            out = self.mount_field(id, true, ev);
        }
        (id, out)
    }

    fn full_path(&self, parent: Option<ParentRow>, declared: &Path) -> Path {
        match parent {
            Some(p) => match self.fields.get(p.list) {
                Some(list) => list
                    .path
                    .clone()
                    .with_segment(Seg::Index(p.row))
                    .join(declared),
                None => declared.clone(),
            },
            None => declared.clone(),
        }
    }

    /// Register the field in the visible registry and seed its value
    /// through the precedence chain.
    fn mount_field(
        &mut self,
        id: FieldId,
        first_mount: bool,
        ev: &dyn ExpressionEvaluator,
    ) -> Vec<Dispatch> {
        let Some(f) = self.fields.get(id) else {
            return Vec::new();
        };
        let path = f.path.clone();
        let resolved = self.resolve_initial_value(id, first_mount, ev);

        if let Some(f) = self.fields.get_mut(id) {
            f.mounted = true;
            f.shown = true;
        }
        self.fields.invalidate();

        let mut out = Vec::new();
        if let Some(v) = resolved {
            out = self.commit(&path, v, Commit::Seed);
        }
        self.sync_row_keys(id);

        // A list re-appearing brings back every row field that is not
        // hidden in its own right.
        if self.fields.get(id).is_some_and(FieldState::is_list) {
            for child in self.fields.children_of(id) {
                let remount = self.fields.get(child).is_some_and(|c| {
                    !c.mounted && c.options.resolve_show(ev, self.values.values())
                });
                if remount {
                    out.extend(self.mount_field(child, false, ev));
                }
            }
        }
        out
    }

    /// Precedence chain for the value a field adopts when it (re)mounts.
    ///
    /// First mount: explicit value > field initial > form snapshot
    /// (only before the form is fully mounted) > stored > default.
    /// Re-show: explicit value > preserved stored value > field
    /// initial > stored > default.
    fn resolve_initial_value(
        &self,
        id: FieldId,
        first_mount: bool,
        ev: &dyn ExpressionEvaluator,
    ) -> Option<Value> {
        let f = self.fields.get(id)?;
        if let Some(prop) = &f.options.value {
            return Some(prop.resolve(ev, self.values.values()));
        }
        if !first_mount && f.options.preserve {
            if let Some(v) = self.values.get(&f.path) {
                return Some(v.clone());
            }
        }
        if let Some(v) = &f.options.initial_value {
            return Some(v.clone());
        }
        if first_mount && !self.fully_mounted {
            if let Some(v) = self.values.initial_at(&f.path) {
                return Some(v.clone());
            }
        }
        if let Some(v) = self.values.get(&f.path) {
            return Some(v.clone());
        }
        f.options.default_value.clone()
    }

    /// Deregister from the visible registry; `destroy` also drops the
    /// field and its dependency entries.
    ///
    /// The stored value is deleted unless the field preserves it or
    /// its parent list is mid-structural-update (row relocation, not a
    /// real removal).
    pub fn unmount_field(&mut self, id: FieldId, destroy: bool) -> Vec<Dispatch> {
        let Some(f) = self.fields.get(id) else {
            return Vec::new();
        };
        let path = f.path.clone();
        let preserve = f.options.preserve;
        let is_list = f.is_list();
        let reindexing = self.parent_list_updating(id);

        // A list takes its row fields with it, whether it is hiding
        // or being destroyed.
        if is_list {
            for child in self.fields.children_of(id) {
                self.unmount_field(child, destroy);
            }
        }

        if let Some(f) = self.fields.get_mut(id) {
            f.mounted = false;
            f.shown = false;
        }
        self.fields.invalidate();

        if !preserve && !reindexing && !path.is_empty() {
            self.values.delete(&path);
        }
        if destroy {
            self.deps.remove(id);
            self.fields.remove(id);
        }
        Vec::new()
    }

    fn parent_list_updating(&self, id: FieldId) -> bool {
        self.fields
            .get(id)
            .and_then(|f| f.parent)
            .and_then(|p| self.fields.get(p.list))
            .and_then(|l| l.list.as_ref())
            .is_some_and(|ls| ls.updating)
    }

    /// Move a field to a new path.
    ///
    /// A genuine rename relocates the stored value; a reindex under a
    /// mid-update parent list only rewrites the path (the structural
    /// operation owns the relocation semantics holistically).
    pub fn set_field_path(&mut self, id: FieldId, new_path: Path) {
        let Some(f) = self.fields.get(id) else {
            return;
        };
        let old_path = f.path.clone();
        if old_path == new_path {
            return;
        }
        let reindexing = self.parent_list_updating(id);

        if !reindexing && !old_path.is_empty() && !new_path.is_empty() {
            if let Some(v) = self.values.get(&old_path).cloned() {
                self.values.set(&new_path, v);
                self.values.delete(&old_path);
            }
        }
        if let Some(f) = self.fields.get_mut(id) {
            f.path = new_path;
        }
        self.fields.invalidate();
        self.recompute_descendant_paths(id);
    }

    /// Keep grandchildren consistent when a nested list's path moved.
    fn recompute_descendant_paths(&mut self, id: FieldId) {
        let Some(f) = self.fields.get(id) else {
            return;
        };
        if !f.is_list() {
            return;
        }
        for child in self.fields.children_of(id) {
            let Some(c) = self.fields.get(child) else {
                continue;
            };
            let new_path = self.full_path(c.parent, &c.options.path);
            if let Some(c) = self.fields.get_mut(child) {
                c.path = new_path;
            }
            self.recompute_descendant_paths(child);
        }
        self.fields.invalidate();
    }

    /// Update visibility props and apply the resulting transition.
    pub fn set_show_props(
        &mut self,
        id: FieldId,
        hidden: Option<Option<PropValue>>,
        visible: Option<Option<PropValue>>,
        ev: &dyn ExpressionEvaluator,
    ) -> Vec<Dispatch> {
        {
            let Some(f) = self.fields.get_mut(id) else {
                return Vec::new();
            };
            if let Some(h) = hidden {
                f.options.hidden = h;
            }
            if let Some(v) = visible {
                f.options.visible = v;
            }
        }
        self.apply_show_transition(id, ev)
    }

    fn apply_show_transition(&mut self, id: FieldId, ev: &dyn ExpressionEvaluator) -> Vec<Dispatch> {
        let Some(f) = self.fields.get(id) else {
            return Vec::new();
        };
        let shown_now = f.options.resolve_show(ev, self.values.values());
        if shown_now == f.shown {
            return Vec::new();
        }
        if shown_now {
            self.mount_field(id, false, ev)
        } else {
            self.unmount_field(id, false)
        }
    }

    /// Re-evaluate expression-driven visibility across all fields.
    pub fn refresh_show(&mut self, ev: &dyn ExpressionEvaluator) -> Vec<Dispatch> {
        let mut out = Vec::new();
        for id in self.fields.ids() {
            let reactive = self
                .fields
                .get(id)
                .is_some_and(|f| f.options.has_reactive_show());
            if reactive {
                out.extend(self.apply_show_transition(id, ev));
            }
        }
        out
    }

    /// Replace the explicit value prop and re-seed from it.
    pub fn set_value_prop(
        &mut self,
        id: FieldId,
        prop: Option<PropValue>,
        ev: &dyn ExpressionEvaluator,
    ) -> Vec<Dispatch> {
        let path = {
            let Some(f) = self.fields.get_mut(id) else {
                return Vec::new();
            };
            f.options.value = prop;
            f.path.clone()
        };
        let shown = self.fields.get(id).is_some_and(|f| f.mounted && f.shown);
        if !shown {
            return Vec::new();
        }
        match self.resolve_initial_value(id, false, ev) {
            Some(v) => self.commit(&path, v, Commit::Seed),
            None => Vec::new(),
        }
    }

    /// First full mount of the form: copy every mounted field's
    /// resolved value into the initial snapshot, so later resets
    /// reproduce computed/defaulted values, not just declared literals.
    pub fn complete_mount(&mut self) {
        if self.fully_mounted {
            return;
        }
        self.fully_mounted = true;
        for id in self.fields.ids() {
            let Some(f) = self.fields.get(id) else {
                continue;
            };
            if !(f.mounted && f.shown) || f.path.is_empty() {
                continue;
            }
            let path = f.path.clone();
            if let Some(v) = self.values.get(&path).cloned() {
                self.values.set_initial(&path, v);
            }
        }
    }

    // -------------------------------------------------------------
    // Commits and notifications
    // -------------------------------------------------------------

    /// Write a value at a path through the pipeline: owning-field
    /// `post_state`, equality gate, then notification collection.
    ///
    /// A write of an equal value is a silent no-op. Notifications are
    /// raised only for fields in the touching state.
    pub fn commit(&mut self, path: &Path, value: Value, kind: Commit) -> Vec<Dispatch> {
        if path.is_empty() {
            self.warn_once("value write through an empty path was dropped");
            return Vec::new();
        }
        let field_id = self.fields.find_by_path(path);
        if field_id.is_none() && matches!(path.last(), Some(Seg::Index(_))) {
            // Bare row writes without a backing field would bypass
            // row-identity bookkeeping.
            self.warn_once("value write at a bare index path with no backing field was dropped");
            return Vec::new();
        }

        let mut new_value = value;
        if let Some(id) = field_id {
            let post_state = self
                .fields
                .get(id)
                .and_then(|f| f.options.post_state.clone());
            if let Some(ps) = post_state {
                new_value = ps(new_value);
            }
        }

        let old = self.values.get(path).cloned();
        if old.as_ref() == Some(&new_value) {
            return Vec::new();
        }

        self.values.set(path, new_value.clone());
        self.fields.invalidate();

        let Some(id) = field_id else {
            return Vec::new();
        };
        // A write that resized a list's array must keep row identity
        // keys in step.
        self.sync_row_keys(id);
        if kind == Commit::Touch {
            if let Some(f) = self.fields.get_mut(id) {
                f.touching = true;
            }
        }
        let touching = self.fields.get(id).is_some_and(|f| f.touching);
        if kind == Commit::Seed || !touching {
            return Vec::new();
        }

        self.notify_change(id, new_value, old.unwrap_or(Value::Null))
    }

    fn notify_change(&mut self, id: FieldId, new: Value, old: Value) -> Vec<Dispatch> {
        let Some(f) = self.fields.get(id) else {
            return Vec::new();
        };
        let path_str = f.path.to_string();
        let mut out = Vec::new();

        if let Some(hook) = f.options.on_change.clone() {
            out.push(Dispatch::FieldOnChange {
                hook,
                new: new.clone(),
                old: old.clone(),
            });
        }

        let all_paths = self.fields.fields_path();
        let owners = self.deps.match_dependencies(&path_str, &all_paths);
        let dep_changes: Vec<DependencyChange> = owners
            .iter()
            .filter_map(|oid| self.fields.get(*oid))
            .map(|of| DependencyChange {
                path: path_str.clone(),
                depend_path: of.path.to_string(),
            })
            .collect();
        if !dep_changes.is_empty() {
            out.push(Dispatch::Dependencies(dep_changes));
        }

        out.push(Dispatch::FormChange {
            change: ValueChange {
                path: path_str,
                value: new,
                old_value: old,
            },
            values: self.values.values().clone(),
        });
        out
    }

    /// Strategy-aware bulk write, notifying per mounted field whose
    /// slot actually changed.
    pub fn set_fields_value(&mut self, incoming: Value, strategy: MergeStrategy) -> Vec<Dispatch> {
        let old_tree = self.values.values().clone();
        self.values.set_many(incoming, strategy);
        self.fields.invalidate();

        let mut out = Vec::new();
        for id in self.fields.ids() {
            let Some(f) = self.fields.get(id) else {
                continue;
            };
            if !(f.mounted && f.shown) || f.path.is_empty() {
                continue;
            }
            let path = f.path.clone();
            let post_state = f.options.post_state.clone();

            let old = crate::value::get_at(&old_tree, &path).cloned();
            let mut new = self.values.get(&path).cloned();
            if let (Some(ps), Some(v)) = (post_state, new.clone()) {
                let adjusted = ps(v);
                if new.as_ref() != Some(&adjusted) {
                    self.values.set(&path, adjusted.clone());
                    new = Some(adjusted);
                }
            }
            if old == new {
                continue;
            }
            if let Some(f) = self.fields.get_mut(id) {
                f.touching = true;
            }
            self.sync_row_keys(id);
            out.extend(self.notify_change(
                id,
                new.unwrap_or(Value::Null),
                old.unwrap_or(Value::Null),
            ));
        }
        out
    }

    /// Restore a single path from the initial snapshot through the
    /// commit pipeline; paths absent from the snapshot are deleted.
    pub fn reset_field(&mut self, path: &Path) -> Vec<Dispatch> {
        match self.values.initial_at(path).cloned() {
            Some(v) => self.commit(path, v, Commit::Touch),
            None => {
                self.values.delete(path);
                self.fields.invalidate();
                Vec::new()
            }
        }
    }

    /// Restore everything from the initial snapshot, then clear the
    /// touching state so the form is pristine again.
    pub fn reset_all(&mut self) -> Vec<Dispatch> {
        let snapshot = self.values.initial().clone();
        let out = self.set_fields_value(snapshot, MergeStrategy::Overwrite);
        for id in self.fields.ids() {
            if let Some(f) = self.fields.get_mut(id) {
                f.touching = false;
            }
        }
        out
    }

    // -------------------------------------------------------------
    // Structural list operations
    // -------------------------------------------------------------

    /// Apply a structural mutation to an array field's value.
    ///
    /// The whole reorder happens inside the list's updating window:
    /// child fields of a removed row are destroyed without value
    /// deletion, surviving rows' children are reindexed in place, and
    /// the window closes on the next deferred-queue flush.
    pub fn list_apply(&mut self, list_id: FieldId, op: ListOp) -> Vec<Dispatch> {
        let (path, is_list) = match self.fields.get(list_id) {
            Some(f) => (f.path.clone(), f.is_list()),
            None => return Vec::new(),
        };
        if !is_list {
            self.warn_once("structural operation on a non-list field was ignored");
            return Vec::new();
        }
        let current: Vec<Value> = self
            .values
            .get(&path)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let op = match op {
            ListOp::MoveUp(i) => ListOp::Move(i, list::wrap_up(i, current.len())),
            ListOp::MoveDown(i) => ListOp::Move(i, list::wrap_down(i, current.len())),
            other => other,
        };

        // Markers carry each old row's index through the same splice,
        // giving old-row -> new-row mapping; None marks a fresh row.
        let markers: Vec<Option<usize>> = (0..current.len()).map(Some).collect();
        let Some(new_markers) = apply_list_op(&markers, &op, &|_| None) else {
            return Vec::new();
        };
        let Some(new_rows) = apply_list_op(&current, &op, &|v| v.clone()) else {
            return Vec::new();
        };

        self.sync_row_keys(list_id);
        let old_keys = self
            .fields
            .get(list_id)
            .and_then(|f| f.list.as_ref())
            .map(|ls| ls.row_keys.clone())
            .unwrap_or_default();
        let mut new_keys = Vec::with_capacity(new_markers.len());
        for marker in &new_markers {
            match marker {
                Some(old_row) => new_keys.push(old_keys.get(*old_row).copied().unwrap_or(0)),
                None => new_keys.push(self.fresh_row_key()),
            }
        }

        // Open the updating window before anything moves.
        if let Some(ls) = self.fields.get_mut(list_id).and_then(|f| f.list.as_mut()) {
            ls.updating = true;
            ls.row_keys = new_keys;
        }
        self.deferred.push(DeferredTask::ClearListUpdating(list_id));

        let out = self.commit(&path, Value::Array(new_rows), Commit::Touch);

        // Old row -> new row lookup.
        let mut new_index_of_old: Vec<Option<usize>> = vec![None; current.len()];
        for (new_pos, marker) in new_markers.iter().enumerate() {
            if let Some(old_row) = marker {
                new_index_of_old[*old_row] = Some(new_pos);
            }
        }

        for child in self.fields.children_of(list_id) {
            let Some(c) = self.fields.get(child) else {
                continue;
            };
            let Some(parent) = c.parent else {
                continue;
            };
            match new_index_of_old.get(parent.row).copied().flatten() {
                Some(new_row) if new_row != parent.row => {
                    if let Some(c) = self.fields.get_mut(child) {
                        c.parent = Some(ParentRow {
                            list: list_id,
                            row: new_row,
                        });
                    }
                    let new_path = self
                        .fields
                        .get(child)
                        .map(|c| self.full_path(c.parent, &c.options.path));
                    if let Some(new_path) = new_path {
                        // Reindex under the updating window: path only,
                        // the array assignment already moved the values.
                        self.set_field_path(child, new_path);
                    }
                }
                Some(_) => {}
                None if parent.row < current.len() => {
                    // The row is gone; its fields unmount without
                    // deleting values (already spliced out).
                    self.unmount_field(child, true);
                }
                None => {}
            }
        }
        self.fields.invalidate();
        out
    }

    /// Reconcile `row_keys` with the current row count: retained
    /// prefix rows keep their keys, net-new rows get fresh ones, and
    /// excess keys are dropped. Never regenerates keys wholesale, so
    /// surviving rows keep a stable identity across resizing writes.
    fn sync_row_keys(&mut self, id: FieldId) {
        let Some(f) = self.fields.get(id) else {
            return;
        };
        if !f.is_list() {
            return;
        }
        let len = self
            .values
            .get(&f.path)
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        let current_len = f.list.as_ref().map_or(0, |ls| ls.row_keys.len());
        if current_len == len {
            return;
        }
        let extra: Vec<u64> = (current_len..len).map(|_| self.fresh_row_key()).collect();
        if let Some(ls) = self.fields.get_mut(id).and_then(|f| f.list.as_mut()) {
            ls.row_keys.truncate(len);
            ls.row_keys.extend(extra);
        }
    }

    /// Row-scoped merge: write only the sub-paths that have a mounted
    /// field under this row; everything else is left untouched.
    pub fn set_row(&mut self, list_id: FieldId, row: usize, incoming: &Value) -> Vec<Dispatch> {
        let mut out = Vec::new();
        for child in self.fields.children_of(list_id) {
            let Some(c) = self.fields.get(child) else {
                continue;
            };
            let Some(parent) = c.parent else {
                continue;
            };
            if parent.row != row || !(c.mounted && c.shown) {
                continue;
            }
            let rel = c.options.path.clone();
            let full = c.path.clone();
            if let Some(v) = crate::value::get_at(incoming, &rel).cloned() {
                out.extend(self.commit(&full, v, Commit::Touch));
            }
        }
        out
    }

    // -------------------------------------------------------------
    // Scheduler
    // -------------------------------------------------------------

    pub fn defer_resume_dependencies(&mut self) {
        self.deferred.push(DeferredTask::ResumeDependencies);
    }

    /// Run everything queued for the next tick.
    pub fn flush_deferred(&mut self) {
        let tasks = std::mem::take(&mut self.deferred);
        for task in tasks {
            match task {
                DeferredTask::ClearListUpdating(id) => {
                    if let Some(ls) = self.fields.get_mut(id).and_then(|f| f.list.as_mut()) {
                        ls.updating = false;
                    }
                }
                DeferredTask::ResumeDependencies => self.deps.resume(),
            }
        }
    }
}

fn apply_list_op<T: Clone>(
    items: &[T],
    op: &ListOp,
    mk: &dyn Fn(&Value) -> T,
) -> Option<Vec<T>> {
    match op {
        ListOp::Push(v) => {
            let mut out = items.to_vec();
            out.push(mk(v));
            Some(out)
        }
        ListOp::Pop => {
            if items.is_empty() {
                None
            } else {
                Some(items[..items.len() - 1].to_vec())
            }
        }
        ListOp::Insert(index, values) => {
            list::insert_items(items, *index, values.iter().map(|v| mk(v)).collect())
        }
        ListOp::Remove(index) => list::remove_at(items, *index),
        ListOp::Shift => {
            if items.is_empty() {
                None
            } else {
                Some(items[1..].to_vec())
            }
        }
        ListOp::Unshift(v) => list::insert_items(items, 0, vec![mk(v)]),
        ListOp::Move(from, to) => list::move_item(items, *from, *to),
        // Resolved to Move before reaching here.
        ListOp::MoveUp(_) | ListOp::MoveDown(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::PassthroughEvaluator;
    use crate::path;
    use serde_json::json;

    fn engine() -> EngineState {
        EngineState::new(json!({}), MergeStrategy::Merge)
    }

    #[test]
    fn test_construct_seeds_initial_value() {
        let mut eng = engine();
        let opts = FieldOptions::new("a").with_initial_value(json!(1));
        let (_, dispatches) = eng.construct_field(opts, false, None, &PassthroughEvaluator);
        // Seeding never notifies.
        assert!(dispatches.is_empty());
        assert_eq!(eng.values.get(&path!("a")), Some(&json!(1)));
    }

    #[test]
    fn test_commit_equal_value_is_noop() {
        let mut eng = engine();
        let (id, _) = eng.construct_field(
            FieldOptions::new("a").with_initial_value(json!(1)),
            false,
            None,
            &PassthroughEvaluator,
        );
        let _ = id;
        let out = eng.commit(&path!("a"), json!(1), Commit::Touch);
        assert!(out.is_empty());
    }

    #[test]
    fn test_commit_touch_notifies() {
        let mut eng = engine();
        eng.construct_field(FieldOptions::new("a"), false, None, &PassthroughEvaluator);
        let out = eng.commit(&path!("a"), json!(2), Commit::Touch);
        assert!(matches!(out.last(), Some(Dispatch::FormChange { .. })));
    }

    #[test]
    fn test_post_state_rewrites_commit() {
        let mut eng = engine();
        let opts = FieldOptions::new("n").with_post_state(|v| match v.as_i64() {
            Some(n) if n < 0 => json!(0),
            _ => v,
        });
        eng.construct_field(opts, false, None, &PassthroughEvaluator);
        eng.commit(&path!("n"), json!(-5), Commit::Touch);
        assert_eq!(eng.values.get(&path!("n")), Some(&json!(0)));
    }

    #[test]
    fn test_empty_path_write_dropped() {
        let mut eng = engine();
        let out = eng.commit(&Path::new(), json!(1), Commit::Touch);
        assert!(out.is_empty());
        assert_eq!(eng.values.values(), &json!({}));
    }

    #[test]
    fn test_unmount_preserve_keeps_value() {
        let mut eng = engine();
        let (id, _) = eng.construct_field(
            FieldOptions::new("a").with_initial_value(json!(1)),
            false,
            None,
            &PassthroughEvaluator,
        );
        eng.unmount_field(id, false);
        assert_eq!(eng.values.get(&path!("a")), Some(&json!(1)));
    }

    #[test]
    fn test_unmount_without_preserve_deletes() {
        let mut eng = engine();
        let (id, _) = eng.construct_field(
            FieldOptions::new("a").with_initial_value(json!(1)).preserve(false),
            false,
            None,
            &PassthroughEvaluator,
        );
        eng.unmount_field(id, false);
        assert!(!eng.values.has(&path!("a")));
    }

    #[test]
    fn test_rename_relocates_value() {
        let mut eng = engine();
        let (id, _) = eng.construct_field(
            FieldOptions::new("old").with_initial_value(json!(7)),
            false,
            None,
            &PassthroughEvaluator,
        );
        eng.set_field_path(id, path!("new"));
        assert!(!eng.values.has(&path!("old")));
        assert_eq!(eng.values.get(&path!("new")), Some(&json!(7)));
    }

    #[test]
    fn test_complete_mount_snapshots_resolved_values() {
        let mut eng = engine();
        eng.construct_field(
            FieldOptions::new("a").with_default_value(json!("fallback")),
            false,
            None,
            &PassthroughEvaluator,
        );
        eng.complete_mount();
        assert_eq!(eng.values.initial_at(&path!("a")), Some(&json!("fallback")));
    }

    #[test]
    fn test_list_remove_reindexes_children() {
        let mut eng = engine();
        let ev = PassthroughEvaluator;
        let (list_id, _) = eng.construct_field(
            FieldOptions::new("list").with_initial_value(json!([{"a": 1}, {"a": 2}, {"a": 3}])),
            true,
            None,
            &ev,
        );
        let mut child_ids = Vec::new();
        for row in 0..3 {
            let (id, _) = eng.construct_field(
                FieldOptions::new("a"),
                false,
                Some(ParentRow { list: list_id, row }),
                &ev,
            );
            child_ids.push(id);
        }

        eng.list_apply(list_id, ListOp::Remove(1));
        eng.flush_deferred();

        // Row 1's child is destroyed, row 2's child now points at row 1.
        assert!(eng.fields.get(child_ids[1]).is_none());
        let moved = eng.fields.get(child_ids[2]).unwrap();
        assert_eq!(moved.path, path!("list", 1, "a"));
        assert_eq!(
            eng.values.get(&path!("list")),
            Some(&json!([{"a": 1}, {"a": 3}]))
        );
    }

    #[test]
    fn test_list_noop_out_of_range() {
        let mut eng = engine();
        let ev = PassthroughEvaluator;
        let (list_id, _) = eng.construct_field(
            FieldOptions::new("list").with_initial_value(json!([1, 2])),
            true,
            None,
            &ev,
        );
        let out = eng.list_apply(list_id, ListOp::Move(0, 5));
        assert!(out.is_empty());
        assert_eq!(eng.values.get(&path!("list")), Some(&json!([1, 2])));
    }

    #[test]
    fn test_row_keys_stable_across_move() {
        let mut eng = engine();
        let ev = PassthroughEvaluator;
        let (list_id, _) = eng.construct_field(
            FieldOptions::new("list").with_initial_value(json!([1, 2, 3])),
            true,
            None,
            &ev,
        );
        let before = eng
            .fields
            .get(list_id)
            .and_then(|f| f.list.as_ref())
            .map(|ls| ls.row_keys.clone())
            .unwrap();
        eng.list_apply(list_id, ListOp::Move(0, 2));
        eng.flush_deferred();
        let after = eng
            .fields
            .get(list_id)
            .and_then(|f| f.list.as_ref())
            .map(|ls| ls.row_keys.clone())
            .unwrap();
        assert_eq!(after, vec![before[1], before[2], before[0]]);
    }

    #[test]
    fn test_empty_path_field_not_registered() {
        let mut eng = engine();
        let (id, dispatches) =
            eng.construct_field(FieldOptions::new(""), false, None, &PassthroughEvaluator);
        assert!(dispatches.is_empty());
        assert!(eng.fields.get(id).is_none());
        assert!(eng.fields.fields_path().is_empty());
    }

    #[test]
    fn test_bare_index_write_without_field_dropped() {
        let mut eng = engine();
        eng.construct_field(
            FieldOptions::new("list").with_initial_value(json!(["a", "b"])),
            true,
            None,
            &PassthroughEvaluator,
        );
        // No field is registered at list[0]; writing there would bypass
        // row-identity bookkeeping, so the write is dropped.
        let out = eng.commit(&path!("list", 0), json!("z"), Commit::Touch);
        assert!(out.is_empty());
        assert_eq!(eng.values.get(&path!("list")), Some(&json!(["a", "b"])));
    }

    #[test]
    fn test_warning_dedup_is_per_engine() {
        let mut a = engine();
        let mut b = engine();
        a.commit(&Path::new(), json!(1), Commit::Touch);
        a.commit(&Path::new(), json!(2), Commit::Touch);
        assert_eq!(a.warned.len(), 1);
        assert!(b.warned.is_empty());
        b.commit(&Path::new(), json!(1), Commit::Touch);
        assert_eq!(b.warned.len(), 1);
    }

    #[test]
    fn test_row_keys_reconcile_after_direct_commit() {
        let mut eng = engine();
        let (list_id, _) = eng.construct_field(
            FieldOptions::new("list").with_initial_value(json!([1, 2])),
            true,
            None,
            &PassthroughEvaluator,
        );
        let keys = |eng: &EngineState| {
            eng.fields
                .get(list_id)
                .and_then(|f| f.list.as_ref())
                .map(|ls| ls.row_keys.clone())
                .unwrap()
        };
        let before = keys(&eng);
        assert_eq!(before.len(), 2);

        // Growing the array mints a key for the new row only.
        eng.commit(&path!("list"), json!([1, 2, 3]), Commit::Touch);
        let grown = keys(&eng);
        assert_eq!(grown.len(), 3);
        assert_eq!(&grown[..2], &before[..]);
        assert!(!before.contains(&grown[2]));

        // Shrinking drops trailing keys, keeping the survivors' identity.
        eng.commit(&path!("list"), json!([9]), Commit::Touch);
        assert_eq!(keys(&eng), vec![before[0]]);
    }

    #[test]
    fn test_deferred_clears_updating_next_flush() {
        let mut eng = engine();
        let ev = PassthroughEvaluator;
        let (list_id, _) = eng.construct_field(
            FieldOptions::new("list").with_initial_value(json!([1])),
            true,
            None,
            &ev,
        );
        eng.list_apply(list_id, ListOp::Push(json!(2)));
        assert!(eng
            .fields
            .get(list_id)
            .and_then(|f| f.list.as_ref())
            .is_some_and(|ls| ls.updating));
        eng.flush_deferred();
        assert!(!eng
            .fields
            .get(list_id)
            .and_then(|f| f.list.as_ref())
            .is_some_and(|ls| ls.updating));
    }
}
