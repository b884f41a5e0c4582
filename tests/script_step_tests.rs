//! End-to-end script step behavior through the runner.

mod common;

use common::AutomationBuilder;

#[tokio::test]
async fn test_basic_script_returns_result() {
    let results = AutomationBuilder::new("Basic Script Execution")
        .execute_script("return 2 + 2", "basic-script-step")
        .run()
        .await;

    assert!(results.is_success());
    assert_eq!(
        results.steps[0].outputs["result"],
        serde_json::json!(4)
    );
}

#[tokio::test]
async fn test_script_accesses_trigger_bindings() {
    let results = AutomationBuilder::new("Access Bindings")
        .trigger_fields(serde_json::json!({ "data": [1, 2, 3] }))
        .execute_script(
            "return steps['trigger'].fields.data.map(x => x * 2)",
            "binding-script-step",
        )
        .run()
        .await;

    assert_eq!(
        results.steps[0].outputs["result"],
        serde_json::json!([2, 4, 6])
    );
}

#[tokio::test]
async fn test_script_error_handled_gracefully() {
    let results = AutomationBuilder::new("Handle Script Errors")
        .execute_script("return nonexistentVariable.map(x => x)", "error-script-step")
        .run()
        .await;

    // The fault is captured per-step; the run itself completes.
    assert!(results.is_success());
    let outputs = &results.steps[0].outputs;
    assert_eq!(outputs["success"], serde_json::json!(false));
    assert!(outputs["error"]
        .as_str()
        .unwrap()
        .contains("ReferenceError: nonexistentVariable is not defined"));
}

#[tokio::test]
async fn test_script_conditional_logic() {
    let code = r#"
        if (steps['trigger'].fields.value > 5) {
          return "Value is greater than 5";
        } else {
          return "Value is 5 or less";
        }
    "#;

    let results = AutomationBuilder::new("Conditional Script Logic")
        .trigger_fields(serde_json::json!({ "value": 10 }))
        .execute_script(code, "conditional-logic-step")
        .run()
        .await;
    assert_eq!(
        results.steps[0].outputs["result"],
        serde_json::json!("Value is greater than 5")
    );

    let results = AutomationBuilder::new("Conditional Script Logic")
        .trigger_fields(serde_json::json!({ "value": 3 }))
        .execute_script(code, "conditional-logic-step")
        .run()
        .await;
    assert_eq!(
        results.steps[0].outputs["result"],
        serde_json::json!("Value is 5 or less")
    );
}

#[tokio::test]
async fn test_multi_step_automation_threads_outputs() {
    let results = AutomationBuilder::new("Multi-Step Script Execution")
        .server_log("Starting multi-step automation", "start-log-step")
        .create_row(
            serde_json::json!({ "name": "Test Row", "value": 42, "tableId": "12345" }),
            "create-row-step",
        )
        .execute_script(
            r#"
            const createdRow = steps['create-row-step'].outputs;
            return createdRow.row.value * 2;
            "#,
            "script-step",
        )
        .server_log(
            "Final result is {{ steps['script-step'].outputs.result }}",
            "final-log-step",
        )
        .run()
        .await;

    assert!(results.is_success());
    assert_eq!(results.steps.len(), 4);

    assert!(results.steps[0].outputs["message"]
        .as_str()
        .unwrap()
        .contains("Starting multi-step automation"));
    assert_eq!(
        results.steps[1].outputs["row"]["value"],
        serde_json::json!(42)
    );
    assert_eq!(results.steps[2].outputs["result"], serde_json::json!(84));
    assert!(results.steps[3].outputs["message"]
        .as_str()
        .unwrap()
        .contains("Final result is 84"));

    // Declared order is execution order.
    let ids: Vec<&str> = results.steps.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "start-log-step",
            "create-row-step",
            "script-step",
            "final-log-step"
        ]
    );
}

#[tokio::test]
async fn test_script_runs_after_failed_script() {
    let results = AutomationBuilder::new("Continue After Failure")
        .execute_script("return boom()", "failing-step")
        .execute_script("return 'still here'", "following-step")
        .run()
        .await;

    assert!(results.is_success());
    assert_eq!(results.steps.len(), 2);
    assert_eq!(
        results.steps[1].outputs["result"],
        serde_json::json!("still here")
    );
}

#[tokio::test]
async fn test_script_reads_previous_step_by_index() {
    let results = AutomationBuilder::new("Positional Addressing")
        .trigger_fields(serde_json::json!({ "value": 5 }))
        .execute_script("return steps[0].fields.value + 1", "index-script-step")
        .run()
        .await;

    assert_eq!(results.steps[0].outputs["result"], serde_json::json!(6));
}

#[tokio::test]
async fn test_script_type_error_category_preserved() {
    let results = AutomationBuilder::new("Type Error Category")
        .trigger_fields(serde_json::json!({ "value": 3 }))
        .execute_script(
            "return steps['trigger'].fields.value.map(x => x)",
            "type-error-step",
        )
        .run()
        .await;

    let error = results.steps[0].outputs["error"].as_str().unwrap();
    assert!(error.starts_with("TypeError:"), "{}", error);
}
