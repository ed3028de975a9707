//! Compatibility tests for script actions against Home Assistant configs
//!
//! These tests use real configuration examples from Home Assistant's test suite
//! (tests/helpers/test_script.py) to verify action sequences in HA format are
//! accepted and normalized.

use ha_automation::{ValidationContext, ValidationStage};
use ha_script::{validate_actions_config, validate_script_mode, ScriptMode};
use serde_json::{json, Value};

fn actions(config: Value) -> Value {
    validate_actions_config(config, &ValidationContext::new()).unwrap()
}

// ============================================================================
// Action Compatibility Tests (from HA's test_script.py)
// ============================================================================

#[test]
fn test_ha_compat_service_action() {
    let result = actions(json!({
        "service": "light.turn_on",
        "target": {
            "entity_id": ["light.kitchen", "light.living_room"]
        },
        "data": {
            "brightness": 255
        }
    }));

    assert_eq!(result[0]["service"], "light.turn_on");
    assert_eq!(result[0]["target"]["entity_id"].as_array().unwrap().len(), 2);
}

#[test]
fn test_ha_compat_action_key() {
    let result = actions(json!({
        "action": "notify.mobile_app_phone",
        "data": {"message": "Front door opened"},
        "response_variable": "reply"
    }));

    assert_eq!(result[0]["service"], "notify.mobile_app_phone");
    assert!(result[0].get("action").is_none());
}

#[test]
fn test_ha_compat_delay_action() {
    let result = actions(json!({
        "delay": {
            "hours": 0,
            "minutes": 5,
            "seconds": 0,
            "milliseconds": 0
        }
    }));

    assert_eq!(result[0]["delay"], "00:05:00");
}

#[test]
fn test_ha_compat_delay_template() {
    let template = "{{ states('input_number.delay_minutes') | int * 60 }}";
    let result = actions(json!({ "delay": template }));

    assert_eq!(result[0]["delay"], template);
}

#[test]
fn test_ha_compat_wait_template_action() {
    let result = actions(json!({
        "wait_template": "{{ is_state('input_boolean.test', 'on') }}",
        "timeout": "00:01:00",
        "continue_on_timeout": true
    }));

    assert_eq!(result[0]["timeout"], "00:01:00");
    assert_eq!(result[0]["continue_on_timeout"], true);
}

#[test]
fn test_ha_compat_choose_with_default() {
    let result = actions(json!({
        "choose": [
            {
                "conditions": [
                    {"condition": "state", "entity_id": "input_boolean.mode", "state": "on"}
                ],
                "sequence": [{"service": "light.turn_on", "target": {"entity_id": "light.hall"}}]
            },
            {
                "conditions": "{{ is_state('sun.sun', 'below_horizon') }}",
                "sequence": [{"event": "night_mode"}]
            }
        ],
        "default": [{"service": "light.turn_off", "target": {"entity_id": "light.hall"}}]
    }));

    let options = result[0]["choose"].as_array().unwrap();
    assert_eq!(options.len(), 2);
    assert_eq!(options[0]["conditions"][0]["state"], json!(["on"]));
    assert_eq!(options[1]["conditions"][0]["condition"], "template");
}

#[test]
fn test_ha_compat_repeat_while() {
    let result = actions(json!({
        "repeat": {
            "while": [
                {"condition": "state", "entity_id": "binary_sensor.motion", "state": "on"}
            ],
            "sequence": [{"delay": 10}]
        }
    }));

    assert_eq!(result[0]["repeat"]["while"][0]["condition"], "state");
    assert_eq!(result[0]["repeat"]["sequence"][0]["delay"], "00:00:10");
}

#[test]
fn test_ha_compat_repeat_for_each() {
    let result = actions(json!({
        "repeat": {
            "for_each": ["living_room", "kitchen"],
            "sequence": [{"service": "light.turn_on", "target": {"area_id": "{{ repeat.item }}"}}]
        }
    }));

    assert_eq!(result[0]["repeat"]["for_each"], json!(["living_room", "kitchen"]));
}

#[test]
fn test_ha_compat_stop_action() {
    let result = actions(json!({"stop": "Stop the script", "error": true}));
    assert_eq!(result[0]["error"], true);
}

#[test]
fn test_ha_compat_nested_error_is_action_stage() {
    let err = validate_actions_config(
        json!([
            {"delay": 1},
            {"sequence": [{"condition": "sun"}]}
        ]),
        &ValidationContext::new(),
    )
    .unwrap_err();

    assert_eq!(err.stage, ValidationStage::Action);
    assert_eq!(
        err.to_string(),
        "must contain at least one of before, after. @ data[1]['sequence'][0]"
    );
}

#[test]
fn test_ha_compat_script_mode_fields() {
    let config = json!({"mode": "restart", "max_exceeded": "silent"});
    let mode = validate_script_mode(config.as_object().unwrap()).unwrap();

    assert_eq!(mode.mode, ScriptMode::Restart);
    assert_eq!(mode.max, 10);
}
