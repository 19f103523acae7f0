//! Expression-evaluator seam.
//!
//! Hidden/visible/value props may be literals or `{{ expr }}` template
//! strings. Compiling and sandboxing expressions is an external
//! collaborator's job; the engine only needs a function from template
//! string plus scope to resolved value. The scope handed to the
//! evaluator is the full live value tree.

use serde_json::Value;

/// Evaluates a `{{ expr }}` template string against a scope object.
///
/// Implementations must pass non-expression strings through unchanged.
pub trait ExpressionEvaluator: Send + Sync {
    /// Resolve `input` against `scope`.
    fn evaluate(&self, input: &str, scope: &Value) -> Value;
}

/// Returns true if the string contains a `{{ … }}` template.
#[inline]
pub fn is_expression(input: &str) -> bool {
    input
        .find("{{")
        .is_some_and(|start| input[start..].contains("}}"))
}

/// Default evaluator: non-expression strings pass through unchanged,
/// templates resolve to `Null` (no expression compiler in scope).
#[derive(Clone, Copy, Debug, Default)]
pub struct PassthroughEvaluator;

impl ExpressionEvaluator for PassthroughEvaluator {
    fn evaluate(&self, input: &str, _scope: &Value) -> Value {
        if is_expression(input) {
            Value::Null
        } else {
            Value::String(input.to_owned())
        }
    }
}

/// JS-style truthiness over JSON values, used for hidden/visible props.
pub(crate) fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
