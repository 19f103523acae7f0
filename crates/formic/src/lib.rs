//! Reactive form state, headless.
//!
//! `formic` keeps a path-addressable value tree behind a [`Form`]
//! facade, and models everything a form UI needs without rendering
//! anything: field mount/unmount lifecycle, visibility with preserved
//! values, a value-resolution precedence chain, dependency fan-out
//! over path patterns, and structural array operations that keep
//! sibling row state intact.
//!
//! # Example
//!
//! ```
//! use formic::{FieldOptions, Form, FormOptions};
//! use serde_json::json;
//!
//! let form = Form::new(FormOptions::new().with_initial_values(json!({
//!     "user": { "name": "Alice" }
//! })));
//!
//! let name = form.create_field(FieldOptions::new("user.name"));
//! let age = form.create_field(FieldOptions::new("user.age").with_default_value(json!(30)));
//! form.complete_mount();
//!
//! assert_eq!(name.value(), json!("Alice"));
//! assert_eq!(
//!     form.get_fields_value(),
//!     json!({"user": {"name": "Alice", "age": 30}})
//! );
//!
//! age.set_value(json!(31));
//! form.reset_fields_value();
//! assert_eq!(age.value(), json!(30));
//! ```

mod deps;
mod engine;
mod error;
mod expr;
mod field;
mod fields;
mod form;
mod list;
mod path;
mod store;
mod value;

pub use engine::{DependencyChange, ValueChange};
pub use error::{FormError, FormResult};
pub use expr::{is_expression, ExpressionEvaluator, PassthroughEvaluator};
pub use field::{
    FieldId, FieldOptions, OnChangeHook, PostStateHook, PredicateFn, PropValue, TransformHook,
};
pub use form::{
    ArrayFieldHandle, DependenciesChangeCallback, FieldHandle, FieldValueChangeCallback, Form,
    FormOptions, ValuesChangeCallback,
};
pub use list::{insert_items, move_item, remove_at};
pub use path::{Path, PathPattern, Seg};
pub use value::{
    deep_merge, get_at, get_at_mut, has_at, set_at, shallow_merge, unset_at, MergeStrategy,
};

pub use serde_json::Value;
