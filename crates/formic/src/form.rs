//! Form facade: the public handle over the engine, plus field handles.
//!
//! The scheduler is cooperative: work queued for "next tick" (closing
//! a list's updating window, resuming dependency triggers) runs only
//! when [`Form::tick`] is called, so everything between a structural
//! operation and the tick still sees the window open. Notifications
//! are dispatched after the engine lock is released, so callbacks may
//! call back into the form freely.

use crate::engine::{Commit, DependencyChange, Dispatch, EngineState, ListOp, ValueChange};
use crate::error::{FormError, FormResult};
use crate::expr::{ExpressionEvaluator, PassthroughEvaluator};
use crate::field::{FieldId, FieldOptions, ParentRow, PropValue};
use crate::value::MergeStrategy;
use crate::{Path, PathPattern, Seg};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Form-level change callback: one committed field change.
pub type FieldValueChangeCallback = Arc<dyn Fn(&ValueChange) + Send + Sync>;

/// Form-level change callback: the full live tree after a change.
pub type ValuesChangeCallback = Arc<dyn Fn(&Value) + Send + Sync>;

/// Form-level dependency callback: the fan-out of one changed path.
pub type DependenciesChangeCallback = Arc<dyn Fn(&[DependencyChange]) + Send + Sync>;

/// Options for constructing a [`Form`].
///
/// # Examples
///
/// ```
/// use formic::{Form, FormOptions};
/// use serde_json::json;
///
/// let form = Form::new(FormOptions::new().with_initial_values(json!({"a": 1})));
/// ```
#[derive(Default)]
pub struct FormOptions {
    /// Form-level initial values (also the reset snapshot seed).
    pub initial_values: Option<Value>,
    /// Default strategy for [`Form::set_fields_value`].
    pub set_fields_value_strategy: MergeStrategy,
    /// Invoked per committed field change.
    pub on_field_value_change: Option<FieldValueChangeCallback>,
    /// Invoked with the full live tree after each committed change.
    pub on_values_change: Option<ValuesChangeCallback>,
    /// Invoked with the dependency fan-out of each committed change.
    pub on_dependencies_value_change: Option<DependenciesChangeCallback>,
    /// Evaluator for `{{ … }}` template props.
    pub expression_evaluator: Option<Arc<dyn ExpressionEvaluator>>,
}

impl FormOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set form-level initial values (builder pattern).
    #[inline]
    pub fn with_initial_values(mut self, v: Value) -> Self {
        self.initial_values = Some(v);
        self
    }

    /// Set the default bulk-write strategy (builder pattern).
    #[inline]
    pub fn with_set_fields_value_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.set_fields_value_strategy = strategy;
        self
    }

    /// Set the expression evaluator (builder pattern).
    #[inline]
    pub fn with_expression_evaluator(mut self, ev: Arc<dyn ExpressionEvaluator>) -> Self {
        self.expression_evaluator = Some(ev);
        self
    }

    /// Register the per-field-change callback (builder pattern).
    pub fn on_field_value_change<F>(mut self, f: F) -> Self
    where
        F: Fn(&ValueChange) + Send + Sync + 'static,
    {
        self.on_field_value_change = Some(Arc::new(f));
        self
    }

    /// Register the whole-tree-change callback (builder pattern).
    pub fn on_values_change<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.on_values_change = Some(Arc::new(f));
        self
    }

    /// Register the dependency fan-out callback (builder pattern).
    pub fn on_dependencies_value_change<F>(mut self, f: F) -> Self
    where
        F: Fn(&[DependencyChange]) + Send + Sync + 'static,
    {
        self.on_dependencies_value_change = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for FormOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormOptions")
            .field("initial_values", &self.initial_values)
            .field("set_fields_value_strategy", &self.set_fields_value_strategy)
            .finish_non_exhaustive()
    }
}

struct FormInner {
    state: Mutex<EngineState>,
    evaluator: Arc<dyn ExpressionEvaluator>,
    on_field_value_change: Option<FieldValueChangeCallback>,
    on_values_change: Option<ValuesChangeCallback>,
    on_dependencies_value_change: Option<DependenciesChangeCallback>,
}

impl FormInner {
    fn lock(&self) -> MutexGuard<'_, EngineState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Read-only-ish access: no tick advance, no dispatch.
    fn with_state<R>(&self, f: impl FnOnce(&mut EngineState) -> R) -> R {
        f(&mut self.lock())
    }

    /// A mutating public operation: run the mutation, refresh
    /// expression-driven visibility, then dispatch collected
    /// notifications outside the lock.
    fn run<R>(
        &self,
        f: impl FnOnce(&mut EngineState, &dyn ExpressionEvaluator) -> (R, Vec<Dispatch>),
    ) -> R {
        let (result, dispatches) = {
            let mut state = self.lock();
            let (result, mut dispatches) = f(&mut state, self.evaluator.as_ref());
            dispatches.extend(state.refresh_show(self.evaluator.as_ref()));
            (result, dispatches)
        };
        self.dispatch(dispatches);
        result
    }

    fn dispatch(&self, items: Vec<Dispatch>) {
        for item in items {
            match item {
                Dispatch::FieldOnChange { hook, new, old } => hook(&new, &old),
                Dispatch::Dependencies(changes) => {
                    if let Some(cb) = &self.on_dependencies_value_change {
                        cb(&changes);
                    }
                }
                Dispatch::FormChange { change, values } => {
                    if let Some(cb) = &self.on_field_value_change {
                        cb(&change);
                    }
                    if let Some(cb) = &self.on_values_change {
                        cb(&values);
                    }
                }
            }
        }
    }
}

/// The form: a path-addressable value store with field lifecycle,
/// dependency fan-out, and structural array operations.
///
/// Cheap to clone; clones share the same underlying state.
#[derive(Clone)]
pub struct Form {
    inner: Arc<FormInner>,
}

impl Form {
    pub fn new(options: FormOptions) -> Self {
        let evaluator = options
            .expression_evaluator
            .unwrap_or_else(|| Arc::new(PassthroughEvaluator));
        let state = EngineState::new(
            options.initial_values.unwrap_or(Value::Object(Map::new())),
            options.set_fields_value_strategy,
        );
        Form {
            inner: Arc::new(FormInner {
                state: Mutex::new(state),
                evaluator,
                on_field_value_change: options.on_field_value_change,
                on_values_change: options.on_values_change,
                on_dependencies_value_change: options.on_dependencies_value_change,
            }),
        }
    }

    // -------------------------------------------------------------
    // Field construction
    // -------------------------------------------------------------

    /// Construct and mount a scalar field.
    pub fn create_field(&self, options: FieldOptions) -> FieldHandle {
        let id = self
            .inner
            .run(|st, ev| st.construct_field(options, false, None, ev));
        FieldHandle::bound(self.inner.clone(), id)
    }

    /// Construct and mount an array field.
    pub fn create_array_field(&self, options: FieldOptions) -> ArrayFieldHandle {
        let id = self
            .inner
            .run(|st, ev| st.construct_field(options, true, None, ev));
        ArrayFieldHandle {
            field: FieldHandle::bound(self.inner.clone(), id),
        }
    }

    // -------------------------------------------------------------
    // Values
    // -------------------------------------------------------------

    /// The live value at a path, `Null` when absent.
    pub fn get_field_value(&self, path: impl Into<Path>) -> Value {
        let path = path.into();
        self.inner
            .with_state(|st| st.values.get(&path).cloned())
            .unwrap_or(Value::Null)
    }

    /// The live value at a path, deserialized into a concrete type.
    ///
    /// Unlike [`get_field_value`](Self::get_field_value) this is a
    /// checked read: an empty path, an absent path, and a value of the
    /// wrong shape each surface as an error instead of `Null`.
    pub fn get_field_value_as<T>(&self, path: impl Into<Path>) -> FormResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let path = path.into();
        if path.is_empty() {
            return Err(FormError::EmptyPath);
        }
        let value = self
            .inner
            .with_state(|st| st.values.get(&path).cloned())
            .ok_or_else(|| FormError::path_not_found(path))?;
        Ok(serde_json::from_value(value)?)
    }

    /// The visible value tree: only mounted, shown fields contribute.
    pub fn get_fields_value(&self) -> Value {
        self.inner
            .with_state(|st| st.fields.fields_value(st.values.values()))
    }

    /// The visible tree with each field's `transform` hook applied.
    pub fn get_fields_transformed_value(&self) -> Value {
        self.inner
            .with_state(|st| st.fields.fields_transformed_value(st.values.values()))
    }

    /// The full live tree, including values with no backing field.
    pub fn values(&self) -> Value {
        self.inner.with_state(|st| st.values.values().clone())
    }

    /// The initial-values snapshot.
    pub fn initial_values(&self) -> Value {
        self.inner.with_state(|st| st.values.initial().clone())
    }

    /// Write one value through the commit pipeline.
    pub fn set_field_value(&self, path: impl Into<Path>, value: impl Into<Value>) {
        let path = path.into();
        let value = value.into();
        self.inner
            .run(|st, _| ((), st.commit(&path, value, Commit::Touch)));
    }

    /// Bulk write with the form's default strategy.
    pub fn set_fields_value(&self, values: Value) {
        self.inner.run(|st, _| {
            let strategy = st.strategy;
            ((), st.set_fields_value(values, strategy))
        });
    }

    /// Bulk write with an explicit strategy.
    pub fn set_fields_value_with(&self, values: Value, strategy: MergeStrategy) {
        self.inner
            .run(|st, _| ((), st.set_fields_value(values, strategy)));
    }

    /// Write into the initial-values snapshot only.
    pub fn set_initial_value(&self, path: impl Into<Path>, value: impl Into<Value>) {
        let path = path.into();
        let value = value.into();
        self.inner.with_state(|st| st.values.set_initial(&path, value));
    }

    /// Bulk write into the snapshot (deep merge).
    pub fn set_initial_values(&self, values: Value) {
        self.set_initial_values_with(values, MergeStrategy::Merge);
    }

    /// Bulk write into the snapshot with an explicit strategy.
    pub fn set_initial_values_with(&self, values: Value, strategy: MergeStrategy) {
        self.inner
            .with_state(|st| st.values.set_initial_many(values, strategy));
    }

    /// Restore one path from the snapshot (deleted when absent there).
    pub fn reset_field_value(&self, path: impl Into<Path>) {
        let path = path.into();
        self.inner.run(|st, _| ((), st.reset_field(&path)));
    }

    /// Restore everything from the snapshot and clear touching state.
    pub fn reset_fields_value(&self) {
        self.inner.run(|st, _| ((), st.reset_all()));
    }

    // -------------------------------------------------------------
    // Paths and dependencies
    // -------------------------------------------------------------

    /// Stringified path of every mounted field, in registry order.
    pub fn get_fields_path(&self) -> Vec<String> {
        self.inner.with_state(|st| st.fields.fields_path())
    }

    /// Mounted field paths accepted by a pattern.
    pub fn match_field_path(&self, pattern: impl Into<PathPattern>) -> Vec<String> {
        let pattern = pattern.into();
        self.inner
            .with_state(|st| st.fields.match_field_path(&pattern))
    }

    /// Whether the field at a path has been touched by interaction.
    pub fn is_field_touching(&self, path: impl Into<Path>) -> bool {
        let path = path.into();
        self.inner.with_state(|st| {
            st.fields
                .find_by_path(&path)
                .and_then(|id| st.fields.get(id))
                .is_some_and(|f| f.touching)
        })
    }

    /// Stop dependency fan-out until resumed.
    pub fn pause_dependencies_trigger(&self) {
        self.inner.run(|st, _| {
            st.deps.pause();
            ((), Vec::new())
        });
    }

    /// Resume dependency fan-out on the next tick.
    pub fn resume_dependencies_trigger(&self) {
        self.inner.run(|st, _| {
            st.defer_resume_dependencies();
            ((), Vec::new())
        });
    }

    // -------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------

    /// Mark the form fully mounted: every mounted field's resolved
    /// value is copied into the initial snapshot so resets reproduce
    /// the fully-seeded state.
    pub fn complete_mount(&self) {
        self.inner.run(|st, _| {
            st.complete_mount();
            ((), Vec::new())
        });
    }

    /// Advance the cooperative tick: run deferred work (closing list
    /// updating windows, resuming dependency triggers) and refresh
    /// expression-driven visibility.
    pub fn tick(&self) {
        self.inner.run(|st, _| {
            st.flush_deferred();
            ((), Vec::new())
        });
    }
}

impl fmt::Debug for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Form").finish_non_exhaustive()
    }
}

/// A detached field keeps its value locally, outside any form.
struct DetachedState {
    options: FieldOptions,
    value: Value,
}

#[derive(Clone)]
enum HandleCtx {
    Bound {
        inner: Arc<FormInner>,
        id: FieldId,
    },
    Detached {
        state: Arc<Mutex<DetachedState>>,
    },
}

/// Handle over one scalar field.
///
/// Handles stay valid after the field is destroyed; operations on a
/// stale handle are silent no-ops.
#[derive(Clone)]
pub struct FieldHandle {
    ctx: HandleCtx,
}

impl FieldHandle {
    fn bound(inner: Arc<FormInner>, id: FieldId) -> Self {
        FieldHandle {
            ctx: HandleCtx::Bound { inner, id },
        }
    }

    /// Construct a field with no enclosing form. It resolves its value
    /// from its own options and keeps later writes locally.
    pub fn detached(options: FieldOptions) -> Self {
        crate::engine::warn_no_form_context(
            "field created without an enclosing form; its value is held locally",
        );
        let ev = PassthroughEvaluator;
        let value = options
            .value
            .as_ref()
            .map(|p| p.resolve(&ev, &Value::Null))
            .or_else(|| options.initial_value.clone())
            .or_else(|| options.default_value.clone())
            .unwrap_or(Value::Null);
        FieldHandle {
            ctx: HandleCtx::Detached {
                state: Arc::new(Mutex::new(DetachedState { options, value })),
            },
        }
    }

    fn bound_parts(&self) -> Option<(&Arc<FormInner>, FieldId)> {
        match &self.ctx {
            HandleCtx::Bound { inner, id } => Some((inner, *id)),
            HandleCtx::Detached { .. } => None,
        }
    }

    fn detached_lock(state: &Arc<Mutex<DetachedState>>) -> MutexGuard<'_, DetachedState> {
        match state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// The engine id, `None` for detached handles.
    pub fn id(&self) -> Option<FieldId> {
        self.bound_parts().map(|(_, id)| id)
    }

    /// The field's full resolved path.
    pub fn path(&self) -> Path {
        match &self.ctx {
            HandleCtx::Bound { inner, id } => inner.with_state(|st| {
                st.fields
                    .get(*id)
                    .map(|f| f.path.clone())
                    .unwrap_or_default()
            }),
            HandleCtx::Detached { state } => Self::detached_lock(state).options.path.clone(),
        }
    }

    /// The field's current value, `Null` when absent.
    pub fn value(&self) -> Value {
        match &self.ctx {
            HandleCtx::Bound { inner, id } => inner.with_state(|st| {
                st.fields
                    .get(*id)
                    .and_then(|f| st.values.get(&f.path).cloned())
                    .unwrap_or(Value::Null)
            }),
            HandleCtx::Detached { state } => Self::detached_lock(state).value.clone(),
        }
    }

    /// User-driven write through the commit pipeline.
    pub fn set_value(&self, value: impl Into<Value>) {
        let value = value.into();
        match &self.ctx {
            HandleCtx::Bound { inner, id } => {
                let id = *id;
                inner.run(|st, _| {
                    let Some(path) = st.fields.get(id).map(|f| f.path.clone()) else {
                        return ((), Vec::new());
                    };
                    ((), st.commit(&path, value, Commit::Touch))
                });
            }
            HandleCtx::Detached { state } => {
                let (hook, new, old) = {
                    let mut st = Self::detached_lock(state);
                    let mut v = value;
                    if let Some(ps) = st.options.post_state.clone() {
                        v = ps(v);
                    }
                    if st.value == v {
                        return;
                    }
                    let old = std::mem::replace(&mut st.value, v.clone());
                    (st.options.on_change.clone(), v, old)
                };
                if let Some(hook) = hook {
                    hook(&new, &old);
                }
            }
        }
    }

    /// Move the field to a new path, relocating the stored value.
    pub fn set_path(&self, path: impl Into<Path>) {
        let path = path.into();
        match &self.ctx {
            HandleCtx::Bound { inner, id } => {
                let id = *id;
                inner.run(|st, _| {
                    st.set_field_path(id, path);
                    ((), Vec::new())
                });
            }
            HandleCtx::Detached { state } => {
                Self::detached_lock(state).options.path = path;
            }
        }
    }

    /// Whether the field is currently mounted and shown.
    pub fn is_shown(&self) -> bool {
        match &self.ctx {
            HandleCtx::Bound { inner, id } => inner.with_state(|st| {
                st.fields
                    .get(*id)
                    .is_some_and(|f| f.mounted && f.shown)
            }),
            HandleCtx::Detached { .. } => true,
        }
    }

    /// Update the hidden prop and apply the visibility transition.
    pub fn set_hidden(&self, prop: impl Into<PropValue>) {
        self.update_show_props(Some(Some(prop.into())), None);
    }

    /// Update the visible prop and apply the visibility transition.
    pub fn set_visible(&self, prop: impl Into<PropValue>) {
        self.update_show_props(None, Some(Some(prop.into())));
    }

    fn update_show_props(
        &self,
        hidden: Option<Option<PropValue>>,
        visible: Option<Option<PropValue>>,
    ) {
        match &self.ctx {
            HandleCtx::Bound { inner, id } => {
                let id = *id;
                inner.run(|st, ev| ((), st.set_show_props(id, hidden, visible, ev)));
            }
            HandleCtx::Detached { state } => {
                let mut st = Self::detached_lock(state);
                if let Some(h) = hidden {
                    st.options.hidden = h;
                }
                if let Some(v) = visible {
                    st.options.visible = v;
                }
            }
        }
    }

    /// Replace the explicit value prop and re-seed from it.
    pub fn set_value_prop(&self, prop: impl Into<PropValue>) {
        let prop = Some(prop.into());
        match &self.ctx {
            HandleCtx::Bound { inner, id } => {
                let id = *id;
                inner.run(|st, ev| ((), st.set_value_prop(id, prop, ev)));
            }
            HandleCtx::Detached { state } => {
                let mut st = Self::detached_lock(state);
                st.options.value = prop;
                if let Some(p) = st.options.value.clone() {
                    st.value = p.resolve(&PassthroughEvaluator, &Value::Null);
                }
            }
        }
    }

    /// Restore the field from the initial snapshot.
    pub fn reset(&self) {
        match &self.ctx {
            HandleCtx::Bound { inner, id } => {
                let id = *id;
                inner.run(|st, _| {
                    let Some(path) = st.fields.get(id).map(|f| f.path.clone()) else {
                        return ((), Vec::new());
                    };
                    ((), st.reset_field(&path))
                });
            }
            HandleCtx::Detached { state } => {
                let mut st = Self::detached_lock(state);
                st.value = st
                    .options
                    .initial_value
                    .clone()
                    .or_else(|| st.options.default_value.clone())
                    .unwrap_or(Value::Null);
            }
        }
    }

    /// Destroy the field: deregister it and delete its value unless
    /// preserved.
    pub fn unmount(&self) {
        if let Some((inner, id)) = self.bound_parts() {
            inner.run(|st, _| ((), st.unmount_field(id, true)));
        }
    }
}

impl fmt::Debug for FieldHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldHandle")
            .field("path", &self.path().to_string())
            .finish_non_exhaustive()
    }
}

/// Handle over one array field: everything a [`FieldHandle`] does,
/// plus structural row operations.
///
/// Structural mutations open the list's updating window: sibling rows
/// keep their field state across the reindex, and the window closes on
/// the next tick.
#[derive(Clone)]
pub struct ArrayFieldHandle {
    field: FieldHandle,
}

impl std::ops::Deref for ArrayFieldHandle {
    type Target = FieldHandle;

    fn deref(&self) -> &FieldHandle {
        &self.field
    }
}

impl ArrayFieldHandle {
    fn apply(&self, op: ListOp) {
        if let Some((inner, id)) = self.field.bound_parts() {
            inner.run(|st, _| ((), st.list_apply(id, op)));
        }
    }

    /// Append a row.
    pub fn push(&self, value: impl Into<Value>) {
        self.apply(ListOp::Push(value.into()));
    }

    /// Remove the last row. No-op when empty.
    pub fn pop(&self) {
        self.apply(ListOp::Pop);
    }

    /// Splice rows in at `index`. No-op when `index > len`.
    pub fn insert(&self, index: usize, values: Vec<Value>) {
        self.apply(ListOp::Insert(index, values));
    }

    /// Remove the row at `index`. No-op when out of range.
    pub fn remove(&self, index: usize) {
        self.apply(ListOp::Remove(index));
    }

    /// Remove the first row. No-op when empty.
    pub fn shift(&self) {
        self.apply(ListOp::Shift);
    }

    /// Prepend a row.
    pub fn unshift(&self, value: impl Into<Value>) {
        self.apply(ListOp::Unshift(value.into()));
    }

    /// Move a row from one index to another, shifting the rows between.
    /// No-op when `from == to` or either index is out of range.
    pub fn move_item(&self, from: usize, to: usize) {
        self.apply(ListOp::Move(from, to));
    }

    /// Move a row one position up; the first row wraps to the end.
    pub fn move_up(&self, index: usize) {
        self.apply(ListOp::MoveUp(index));
    }

    /// Move a row one position down; the last row wraps to the front.
    pub fn move_down(&self, index: usize) {
        self.apply(ListOp::MoveDown(index));
    }

    /// Current row count.
    pub fn len(&self) -> usize {
        let Some((inner, id)) = self.field.bound_parts() else {
            return 0;
        };
        inner.with_state(|st| {
            st.fields
                .get(id)
                .and_then(|f| st.values.get(&f.path))
                .and_then(Value::as_array)
                .map_or(0, Vec::len)
        })
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stable per-row identity keys, permuted alongside structural ops.
    pub fn row_keys(&self) -> Vec<u64> {
        let Some((inner, id)) = self.field.bound_parts() else {
            return Vec::new();
        };
        inner.with_state(|st| {
            st.fields
                .get(id)
                .and_then(|f| f.list.as_ref())
                .map(|ls| ls.row_keys.clone())
                .unwrap_or_default()
        })
    }

    /// Read a sub-path of one row, `Null` when absent.
    pub fn get(&self, row: usize, sub_path: impl Into<Path>) -> Value {
        let sub = sub_path.into();
        let Some((inner, id)) = self.field.bound_parts() else {
            return Value::Null;
        };
        inner.with_state(|st| {
            st.fields
                .get(id)
                .map(|f| f.path.with_segment(Seg::Index(row)).join(&sub))
                .and_then(|full| st.values.get(&full).cloned())
                .unwrap_or(Value::Null)
        })
    }

    /// Write a sub-path of one row through the commit pipeline.
    pub fn set(&self, row: usize, sub_path: impl Into<Path>, value: impl Into<Value>) {
        let sub = sub_path.into();
        let value = value.into();
        let Some((inner, id)) = self.field.bound_parts() else {
            return;
        };
        inner.run(|st, _| {
            let Some(full) = st
                .fields
                .get(id)
                .map(|f| f.path.with_segment(Seg::Index(row)).join(&sub))
            else {
                return ((), Vec::new());
            };
            ((), st.commit(&full, value, Commit::Touch))
        });
    }

    /// Row-scoped merge: only sub-paths with a mounted field under
    /// this row are written.
    pub fn set_row(&self, row: usize, value: Value) {
        let Some((inner, id)) = self.field.bound_parts() else {
            return;
        };
        inner.run(|st, _| ((), st.set_row(id, row, &value)));
    }

    /// Construct and mount a scalar field inside one row. Its declared
    /// path is relative to the row.
    pub fn create_row_field(&self, row: usize, options: FieldOptions) -> FieldHandle {
        let Some((inner, id)) = self.field.bound_parts() else {
            return FieldHandle::detached(options);
        };
        let child = inner.run(|st, ev| {
            st.construct_field(options, false, Some(ParentRow { list: id, row }), ev)
        });
        FieldHandle::bound(inner.clone(), child)
    }

    /// Construct and mount a nested array field inside one row.
    pub fn create_row_array_field(&self, row: usize, options: FieldOptions) -> ArrayFieldHandle {
        let Some((inner, id)) = self.field.bound_parts() else {
            return ArrayFieldHandle {
                field: FieldHandle::detached(options),
            };
        };
        let child = inner.run(|st, ev| {
            st.construct_field(options, true, Some(ParentRow { list: id, row }), ev)
        });
        ArrayFieldHandle {
            field: FieldHandle::bound(inner.clone(), child),
        }
    }
}

impl fmt::Debug for ArrayFieldHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayFieldHandle")
            .field("path", &self.path().to_string())
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
