//! Field declarations: options, reactive props, hooks.
//!
//! A field is a live unit bound to one path. `FieldOptions` is the
//! declarative description handed to the form when the field mounts;
//! the engine keeps the runtime state (`FieldState`) internally.

use crate::expr::{truthy, ExpressionEvaluator};
use crate::{Path, PathPattern};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Unique identifier of a mounted field.
pub type FieldId = u64;

/// Per-field change hook: `(new_value, old_value)`.
pub type OnChangeHook = Arc<dyn Fn(&Value, &Value) + Send + Sync>;

/// Per-field output reshaping hook: `(value, string_path) -> value`.
pub type TransformHook = Arc<dyn Fn(&Value, &str) -> Value + Send + Sync>;

/// Hook rewriting a value immediately before it is committed.
pub type PostStateHook = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Predicate form of a path pattern: `(path, all_paths) -> bool`.
pub type PredicateFn = Arc<dyn Fn(&str, &[String]) -> bool + Send + Sync>;

/// A field prop that is either a literal value or a `{{ expr }}`
/// template resolved through the expression-evaluator seam.
#[derive(Clone, Debug)]
pub enum PropValue {
    /// A plain value used as-is.
    Literal(Value),
    /// A template string evaluated against the live value tree.
    Expr(String),
}

impl PropValue {
    /// Literal prop.
    #[inline]
    pub fn literal(v: impl Into<Value>) -> Self {
        PropValue::Literal(v.into())
    }

    /// Expression prop.
    #[inline]
    pub fn expr(template: impl Into<String>) -> Self {
        PropValue::Expr(template.into())
    }

    /// Build from a value, detecting `{{ … }}` templates in strings.
    pub fn new(v: impl Into<Value>) -> Self {
        let v = v.into();
        match v {
            Value::String(s) if crate::expr::is_expression(&s) => PropValue::Expr(s),
            other => PropValue::Literal(other),
        }
    }

    /// Returns true if this prop depends on the expression evaluator.
    #[inline]
    pub fn is_expr(&self) -> bool {
        matches!(self, PropValue::Expr(_))
    }

    pub(crate) fn resolve(&self, ev: &dyn ExpressionEvaluator, scope: &Value) -> Value {
        match self {
            PropValue::Literal(v) => v.clone(),
            PropValue::Expr(template) => ev.evaluate(template, scope),
        }
    }
}

impl From<bool> for PropValue {
    fn from(b: bool) -> Self {
        PropValue::Literal(Value::Bool(b))
    }
}

impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        PropValue::new(s)
    }
}

impl From<Value> for PropValue {
    fn from(v: Value) -> Self {
        PropValue::new(v)
    }
}

/// Declarative description of a field.
///
/// # Examples
///
/// ```
/// use formic::FieldOptions;
/// use serde_json::json;
///
/// let opts = FieldOptions::new("user.name")
///     .with_initial_value(json!("Alice"))
///     .preserve(false)
///     .with_dependency("user.kind");
/// ```
#[derive(Clone, Default)]
pub struct FieldOptions {
    /// Path the field binds to. Relative to the enclosing row for
    /// fields created inside an array field.
    pub path: Path,
    /// Field-level initial value (beats the form-level snapshot).
    pub initial_value: Option<Value>,
    /// Explicit bound value (beats everything in the precedence chain).
    pub value: Option<PropValue>,
    /// Fallback when nothing else in the chain resolves.
    pub default_value: Option<Value>,
    /// Hide the field when truthy. `visible` takes precedence.
    pub hidden: Option<PropValue>,
    /// Show the field when truthy; wins over `hidden`.
    pub visible: Option<PropValue>,
    /// Keep the stored value when the field unmounts or hides.
    pub preserve: bool,
    /// Dependency declarations matched against every changed path.
    pub dependencies: Vec<PathPattern>,
    /// Reshapes this field's contribution to the transformed tree.
    pub transform: Option<TransformHook>,
    /// Rewrites values immediately before commit.
    pub post_state: Option<PostStateHook>,
    /// Invoked on user-driven value changes.
    pub on_change: Option<OnChangeHook>,
}

impl FieldOptions {
    /// Create options bound to a path (string or segment form).
    pub fn new(path: impl Into<Path>) -> Self {
        Self {
            path: path.into(),
            preserve: true,
            ..Default::default()
        }
    }

    /// Set the field-level initial value (builder pattern).
    #[inline]
    pub fn with_initial_value(mut self, v: impl Into<Value>) -> Self {
        self.initial_value = Some(v.into());
        self
    }

    /// Set the explicit bound value (builder pattern).
    #[inline]
    pub fn with_value(mut self, v: impl Into<PropValue>) -> Self {
        self.value = Some(v.into());
        self
    }

    /// Set the default value (builder pattern).
    #[inline]
    pub fn with_default_value(mut self, v: impl Into<Value>) -> Self {
        self.default_value = Some(v.into());
        self
    }

    /// Set the hidden prop (builder pattern).
    #[inline]
    pub fn with_hidden(mut self, v: impl Into<PropValue>) -> Self {
        self.hidden = Some(v.into());
        self
    }

    /// Set the visible prop (builder pattern).
    #[inline]
    pub fn with_visible(mut self, v: impl Into<PropValue>) -> Self {
        self.visible = Some(v.into());
        self
    }

    /// Set the preserve policy (builder pattern). Defaults to true.
    #[inline]
    pub fn preserve(mut self, keep: bool) -> Self {
        self.preserve = keep;
        self
    }

    /// Add a dependency pattern (builder pattern).
    #[inline]
    pub fn with_dependency(mut self, pattern: impl Into<PathPattern>) -> Self {
        self.dependencies.push(pattern.into());
        self
    }

    /// Set the transform hook (builder pattern).
    pub fn with_transform<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &str) -> Value + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(f));
        self
    }

    /// Set the post-state hook (builder pattern).
    pub fn with_post_state<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.post_state = Some(Arc::new(f));
        self
    }

    /// Set the on-change hook (builder pattern).
    pub fn with_on_change<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &Value) + Send + Sync + 'static,
    {
        self.on_change = Some(Arc::new(f));
        self
    }

    /// Compute the shown state from hidden/visible props.
    ///
    /// `visible` wins over `hidden`; both absent means shown.
    pub(crate) fn resolve_show(&self, ev: &dyn ExpressionEvaluator, scope: &Value) -> bool {
        if let Some(visible) = &self.visible {
            return truthy(&visible.resolve(ev, scope));
        }
        if let Some(hidden) = &self.hidden {
            return !truthy(&hidden.resolve(ev, scope));
        }
        true
    }

    /// True if any visibility prop is expression-driven.
    pub(crate) fn has_reactive_show(&self) -> bool {
        self.visible.as_ref().is_some_and(PropValue::is_expr)
            || self.hidden.as_ref().is_some_and(PropValue::is_expr)
    }
}

impl fmt::Debug for FieldOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldOptions")
            .field("path", &self.path.to_string())
            .field("initial_value", &self.initial_value)
            .field("value", &self.value)
            .field("default_value", &self.default_value)
            .field("hidden", &self.hidden)
            .field("visible", &self.visible)
            .field("preserve", &self.preserve)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

/// Link from a row-scoped field to its enclosing array field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ParentRow {
    pub list: FieldId,
    pub row: usize,
}

/// List-specific runtime state.
#[derive(Clone, Debug, Default)]
pub(crate) struct ListState {
    /// Structural mutation in flight: child mount/unmount/path-change
    /// events are reindexing, not semantic add/remove.
    pub updating: bool,
    /// Stable per-row identity keys, permuted alongside structural ops.
    pub row_keys: Vec<u64>,
}

/// Runtime state of one constructed field.
pub(crate) struct FieldState {
    pub id: FieldId,
    /// Full resolved path (parent list path + row index + declared path).
    pub path: Path,
    pub options: FieldOptions,
    /// Present iff this field is an array field.
    pub list: Option<ListState>,
    pub parent: Option<ParentRow>,
    /// Registered in the visible registry (mounted and shown).
    pub mounted: bool,
    pub shown: bool,
    /// User-interaction state gating change notifications.
    pub touching: bool,
}

impl FieldState {
    #[inline]
    pub fn is_list(&self) -> bool {
        self.list.is_some()
    }
}
