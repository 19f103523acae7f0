//! Field lifecycle: value resolution precedence, visibility with and
//! without preserve, reset behavior.

use formic::{FieldOptions, Form, FormOptions, ValueChange};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

#[test]
fn field_initial_value_beats_form_initial_values() {
    let form = Form::new(FormOptions::new().with_initial_values(json!({"a": 1, "b": 2})));
    let a = form.create_field(FieldOptions::new("a").with_initial_value(json!(2)));
    let b = form.create_field(FieldOptions::new("b").with_initial_value(json!(3)));

    assert_eq!(a.value(), json!(2));
    assert_eq!(b.value(), json!(3));
    assert_eq!(form.get_fields_value(), json!({"a": 2, "b": 3}));
}

#[test]
fn explicit_value_beats_initial_value() {
    let form = Form::new(FormOptions::new());
    let a = form.create_field(
        FieldOptions::new("a")
            .with_initial_value(json!(2))
            .with_value(json!(3)),
    );
    assert_eq!(a.value(), json!(3));
}

#[test]
fn form_initial_values_only_seed_before_full_mount() {
    let form = Form::new(FormOptions::new().with_initial_values(json!({"late": 1})));
    form.complete_mount();

    // Mounted after the form finished mounting: the form-level
    // snapshot no longer participates, so the default wins.
    let late = form.create_field(FieldOptions::new("late").with_default_value(json!(9)));
    assert_eq!(late.value(), json!(9));
}

#[test]
fn default_value_is_last_resort() {
    let form = Form::new(FormOptions::new());
    let a = form.create_field(FieldOptions::new("a").with_default_value(json!("dft")));
    assert_eq!(a.value(), json!("dft"));
}

#[test]
fn hide_without_preserve_drops_value_and_reshow_reseeds() {
    let form = Form::new(FormOptions::new());
    let a = form.create_field(
        FieldOptions::new("a")
            .preserve(false)
            .with_value(json!(5)),
    );
    let _b = form.create_field(FieldOptions::new("b").with_initial_value(json!(4)).preserve(false));

    a.set_hidden(true);
    assert_eq!(form.get_fields_value(), json!({"b": 4}));
    // Dropped from the live tree, not just from the visible view.
    assert_eq!(form.values(), json!({"b": 4}));

    a.set_hidden(false);
    // Re-seeded from the live value prop, not a stale store entry.
    assert_eq!(a.value(), json!(5));
    assert_eq!(form.get_fields_value(), json!({"a": 5, "b": 4}));
}

#[test]
fn hide_with_preserve_keeps_value_and_reshow_restores_it() {
    let form = Form::new(FormOptions::new());
    let a = form.create_field(FieldOptions::new("a").with_initial_value(json!(1)));

    a.set_value(json!(42));
    a.set_hidden(true);
    assert_eq!(form.get_fields_value(), json!({}));
    assert_eq!(form.values(), json!({"a": 42}));

    a.set_hidden(false);
    // Preserved value beats the field initial on re-show.
    assert_eq!(a.value(), json!(42));
}

#[test]
fn unmount_without_preserve_deletes_slot() {
    let form = Form::new(FormOptions::new());
    let a = form.create_field(
        FieldOptions::new("a")
            .with_initial_value(json!(1))
            .preserve(false),
    );
    a.unmount();
    assert_eq!(form.values(), json!({}));
}

#[test]
fn rename_relocates_the_stored_value() {
    let form = Form::new(FormOptions::new());
    let a = form.create_field(FieldOptions::new("old").with_initial_value(json!(7)));

    a.set_path("fresh");
    assert_eq!(form.values(), json!({"fresh": 7}));
    assert_eq!(a.value(), json!(7));
    assert_eq!(a.path().to_string(), "fresh");
}

#[test]
fn seeding_fires_no_change_notifications() {
    let changes: Arc<Mutex<Vec<ValueChange>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = changes.clone();
    let form = Form::new(
        FormOptions::new()
            .with_initial_values(json!({"a": 1}))
            .on_field_value_change(move |c| sink.lock().unwrap().push(c.clone())),
    );
    form.create_field(FieldOptions::new("a"));
    form.create_field(FieldOptions::new("b").with_initial_value(json!(2)));
    form.complete_mount();

    assert!(changes.lock().unwrap().is_empty());
}

#[test]
fn change_notification_carries_old_and_new() {
    let changes: Arc<Mutex<Vec<ValueChange>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = changes.clone();
    let form = Form::new(
        FormOptions::new()
            .on_field_value_change(move |c| sink.lock().unwrap().push(c.clone())),
    );
    let a = form.create_field(FieldOptions::new("a").with_initial_value(json!(1)));

    a.set_value(json!(2));
    a.set_value(json!(2)); // equal write, silent

    let changes = changes.lock().unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].old_value, json!(1));
    assert_eq!(changes[0].value, json!(2));
}

#[test]
fn on_change_hook_sees_new_then_old() {
    let seen: Arc<Mutex<Vec<(Value, Value)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let form = Form::new(FormOptions::new());
    let a = form.create_field(
        FieldOptions::new("a")
            .with_initial_value(json!("x"))
            .with_on_change(move |new, old| {
                sink.lock().unwrap().push((new.clone(), old.clone()));
            }),
    );
    a.set_value(json!("y"));

    let seen = seen.lock().unwrap();
    assert_eq!(*seen, vec![(json!("y"), json!("x"))]);
}

#[test]
fn post_state_rewrites_every_write() {
    let form = Form::new(FormOptions::new());
    let n = form.create_field(FieldOptions::new("n").with_post_state(|v| {
        match v.as_i64() {
            Some(i) if i > 100 => json!(100),
            _ => v,
        }
    }));
    n.set_value(json!(250));
    assert_eq!(n.value(), json!(100));
}

#[test]
fn reset_is_idempotent_after_bulk_writes() {
    let form = Form::new(FormOptions::new().with_initial_values(json!({"a": 1, "b": {"c": 2}})));
    form.create_field(FieldOptions::new("a"));
    form.create_field(FieldOptions::new("b.c"));
    form.complete_mount();

    form.set_fields_value(json!({"a": 10, "b": {"c": 20}}));
    form.set_fields_value(json!({"a": 11}));

    form.reset_fields_value();
    let once = form.values();
    form.reset_fields_value();
    assert_eq!(form.values(), once);
    assert_eq!(once, json!({"a": 1, "b": {"c": 2}}));
}

#[test]
fn reset_single_field_restores_snapshot_value() {
    let form = Form::new(FormOptions::new().with_initial_values(json!({"a": 1})));
    let a = form.create_field(FieldOptions::new("a"));
    a.set_value(json!(9));

    form.reset_field_value("a");
    assert_eq!(a.value(), json!(1));
}

#[test]
fn complete_mount_makes_resolved_values_resettable() {
    let form = Form::new(FormOptions::new());
    let a = form.create_field(FieldOptions::new("a").with_initial_value(json!("seeded")));
    form.complete_mount();

    a.set_value(json!("edited"));
    form.reset_fields_value();
    assert_eq!(a.value(), json!("seeded"));
}

#[test]
fn set_fields_value_merges_deep_by_default() {
    let form = Form::new(FormOptions::new());
    form.create_field(FieldOptions::new("user.name").with_initial_value(json!("n")));
    form.create_field(FieldOptions::new("user.age").with_initial_value(json!(1)));

    form.set_fields_value(json!({"user": {"age": 2}}));
    assert_eq!(form.values(), json!({"user": {"name": "n", "age": 2}}));
}

#[test]
fn set_fields_value_with_overwrite_replaces_tree() {
    let form = Form::new(FormOptions::new());
    form.create_field(FieldOptions::new("a").with_initial_value(json!(1)));
    form.set_fields_value_with(json!({"b": 2}), formic::MergeStrategy::Overwrite);
    assert_eq!(form.values(), json!({"b": 2}));
}

#[test]
fn touching_is_tracked_per_field() {
    let form = Form::new(FormOptions::new().with_initial_values(json!({"a": 1, "b": 2})));
    let a = form.create_field(FieldOptions::new("a"));
    form.create_field(FieldOptions::new("b"));

    assert!(!form.is_field_touching("a"));
    a.set_value(json!(3));
    assert!(form.is_field_touching("a"));
    assert!(!form.is_field_touching("b"));
}

#[test]
fn typed_reads_surface_checked_errors() {
    use formic::FormError;

    let form = Form::new(FormOptions::new());
    form.create_field(FieldOptions::new("a").with_initial_value(json!(1)));

    assert_eq!(form.get_field_value_as::<i64>("a").unwrap(), 1);
    assert!(matches!(
        form.get_field_value_as::<i64>("missing"),
        Err(FormError::PathNotFound { .. })
    ));
    assert!(matches!(
        form.get_field_value_as::<String>("a"),
        Err(FormError::Serialization(_))
    ));
    assert!(matches!(
        form.get_field_value_as::<i64>(""),
        Err(FormError::EmptyPath)
    ));
}
