//! Value store: the canonical live value tree plus the initial-values
//! snapshot used by reset and first-mount resolution.
//!
//! Both trees are rooted at an object and mutated only through these
//! methods. Incoming values are owned, so callers cannot alias the
//! stored trees afterwards.

use crate::value::{self, MergeStrategy};
use crate::Path;
use serde_json::{Map, Value};

pub(crate) struct ValueStore {
    values: Value,
    initial: Value,
}

fn object_root(v: Value) -> Value {
    if v.is_object() {
        v
    } else {
        Value::Object(Map::new())
    }
}

impl ValueStore {
    pub fn new(initial: Value) -> Self {
        Self {
            values: Value::Object(Map::new()),
            initial: object_root(initial),
        }
    }

    /// Read the live value at a path.
    #[inline]
    pub fn get(&self, path: &Path) -> Option<&Value> {
        value::get_at(&self.values, path)
    }

    /// The full live tree, including hidden/unmounted-but-preserved
    /// values and keys with no backing field.
    #[inline]
    pub fn values(&self) -> &Value {
        &self.values
    }

    #[inline]
    pub fn has(&self, path: &Path) -> bool {
        value::has_at(&self.values, path)
    }

    /// Write the live value at a path.
    #[inline]
    pub fn set(&mut self, path: &Path, v: Value) {
        value::set_at(&mut self.values, path, v);
    }

    /// Remove the slot at a path entirely (distinct from writing null).
    #[inline]
    pub fn delete(&mut self, path: &Path) -> bool {
        value::unset_at(&mut self.values, path)
    }

    /// Strategy-aware bulk write into the live tree.
    #[inline]
    pub fn set_many(&mut self, incoming: Value, strategy: MergeStrategy) {
        value::apply_strategy(&mut self.values, object_root(incoming), strategy);
    }

    /// Read the initial-values snapshot at a path.
    #[inline]
    pub fn initial_at(&self, path: &Path) -> Option<&Value> {
        value::get_at(&self.initial, path)
    }

    /// The full initial-values snapshot.
    #[inline]
    pub fn initial(&self) -> &Value {
        &self.initial
    }

    /// Write into the snapshot only; never touches the live tree.
    #[inline]
    pub fn set_initial(&mut self, path: &Path, v: Value) {
        value::set_at(&mut self.initial, path, v);
    }

    /// Strategy-aware bulk write into the snapshot.
    #[inline]
    pub fn set_initial_many(&mut self, incoming: Value, strategy: MergeStrategy) {
        value::apply_strategy(&mut self.initial, object_root(incoming), strategy);
    }
}
