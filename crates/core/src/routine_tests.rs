// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn steps_deserialize_with_defaults() {
    let routine: Routine = serde_json::from_value(json!({
        "name": "daily",
        "step": [
            { "name": "open", "command": "launch {serial}", "delay": "500ms" },
            { "name": "claim", "template": "claim_button" },
        ],
    }))
    .unwrap();

    assert_eq!(routine.name, "daily");
    assert_eq!(routine.description, "");
    assert_eq!(
        routine.steps,
        vec![
            RoutineStep::new("open")
                .command("launch {serial}")
                .delay(Duration::from_millis(500)),
            RoutineStep::new("claim").template("claim_button"),
        ]
    );
}

#[test]
fn bad_delay_is_rejected() {
    let result: Result<RoutineStep, _> =
        serde_json::from_value(json!({ "name": "wait", "delay": "forever" }));
    assert!(result.is_err());
}

#[test]
fn templates_lists_referenced_names_in_step_order() {
    let routine = Routine::new("farm")
        .with_step(RoutineStep::new("a").template("map"))
        .with_step(RoutineStep::new("b").command("tap"))
        .with_step(RoutineStep::new("c").template("boss"));
    assert_eq!(routine.templates().collect::<Vec<_>>(), vec!["map", "boss"]);
}

#[test]
fn unset_fields_are_omitted() {
    let value = serde_json::to_value(RoutineStep::new("noop")).unwrap();
    assert_eq!(value, json!({ "name": "noop", "delay": "0s" }));
}
