//! Concrete inputs and expected results for every task the harness launches.

use crate::launcher::TaskSpec;
use crate::task::{LaunchRequest, TaskKind};
use crate::value::ResultValue;

pub const TEMPLATE_REPLACER: &str = "calculations:templatereplacer";
pub const DOUBLER_PARSER: &str = "templatereplacer.doubler";
/// Temporary file the doubler retrieves and parses into the `artifacts` output
pub const TRIPLE_VALUE_FILE: &str = "triple_value";
pub const INPUT_FILE_NAME: &str = "value_to_double.txt";
pub const OUTPUT_FILE_NAME: &str = "output.txt";

pub const NESTED_WORKFLOW: &str = "workflows:nested";
pub const NESTED_NAMESPACE_WORKFLOW: &str = "workflows:nested_input_namespace";
pub const DYNAMIC_NON_DB_WORKFLOW: &str = "workflows:dynamic_non_db";
pub const DYNAMIC_DB_WORKFLOW: &str = "workflows:dynamic_db";
pub const DYNAMIC_MIXED_WORKFLOW: &str = "workflows:dynamic_mixed";
pub const SERIALIZE_WORKFLOW: &str = "workflows:serialize";
pub const LIST_ECHO_WORKFLOW: &str = "workflows:list_echo";
pub const WORKFUNCTION_RUNNER_WORKFLOW: &str = "workflows:workfunction_runner";
pub const CALCFUNCTION_RUNNER_WORKFLOW: &str = "workflows:calcfunction_runner";

/// Identity the daemon uses for its integer data type
pub const INT_TYPE_IDENTITY: &str = "data.int:Int";

fn int_node(value: i64) -> ResultValue {
    ResultValue::node("Int", ResultValue::Int(value))
}

fn dict_node(value: ResultValue) -> ResultValue {
    ResultValue::node("Dict", value)
}

/// `{value: 2v, artifacts: {"triple_value": "<3v>"}}`
pub fn expected_calculation(value: i64) -> ResultValue {
    ResultValue::mapping([
        ("value", ResultValue::Int(2 * value)),
        (
            "artifacts",
            ResultValue::mapping([(TRIPLE_VALUE_FILE, ResultValue::str((3 * value).to_string()))]),
        ),
    ])
}

/// A doubling template-replacer calculation for `value`
pub fn calculation(code: &str, counter: usize, value: i64) -> TaskSpec {
    let template = ResultValue::mapping([
        // Non-zero so some calculations are still queued when polling starts
        ("cmdline_params", ResultValue::list([ResultValue::str("1")])),
        ("input_file_template", ResultValue::str("{value}")),
        ("input_file_name", ResultValue::str(INPUT_FILE_NAME)),
        ("output_file_name", ResultValue::str(OUTPUT_FILE_NAME)),
        (
            "retrieve_temporary_files",
            ResultValue::list([ResultValue::str(TRIPLE_VALUE_FILE)]),
        ),
    ]);
    let options = ResultValue::mapping([
        (
            "resources",
            ResultValue::mapping([("num_machines", ResultValue::Int(1))]),
        ),
        ("max_wallclock_seconds", ResultValue::Int(5 * 60)),
        ("withmpi", ResultValue::Bool(false)),
        ("parser_name", ResultValue::str(DOUBLER_PARSER)),
    ]);
    let inputs = ResultValue::mapping([
        ("code", ResultValue::str(code)),
        (
            "parameters",
            dict_node(ResultValue::mapping([("value", ResultValue::Int(value))])),
        ),
        ("template", dict_node(template)),
        (
            "metadata",
            ResultValue::mapping([("options", options)]),
        ),
    ]);

    TaskSpec {
        label: format!("[{counter}] calculation(value={value})"),
        request: LaunchRequest::new(TaskKind::Calculation, TEMPLATE_REPLACER, inputs),
        expected: expected_calculation(value),
    }
}

fn workflow(label: String, process: &str, inputs: ResultValue, expected: ResultValue) -> TaskSpec {
    TaskSpec {
        label,
        request: LaunchRequest::new(TaskKind::Workflow, process, inputs),
        expected,
    }
}

/// `plain` nested workflows with inputs `0..plain`, followed by one workflow of
/// every other input/output flavour
pub fn workflow_variants(plain: usize) -> Vec<TaskSpec> {
    let mut specs: Vec<TaskSpec> = (0..plain as i64)
        .map(|index| {
            workflow(
                format!("workflow nested(inp={index})"),
                NESTED_WORKFLOW,
                ResultValue::mapping([("inp", int_node(index))]),
                ResultValue::Int(index),
            )
        })
        .collect();

    specs.push(workflow(
        "workflow nested input namespace".to_string(),
        NESTED_NAMESPACE_WORKFLOW,
        ResultValue::mapping([(
            "foo",
            ResultValue::mapping([("bar", ResultValue::mapping([("baz", int_node(-12))]))]),
        )]),
        ResultValue::Int(-12),
    ));

    let non_db = ResultValue::list([4, 2, 3].map(ResultValue::Int));
    specs.push(workflow(
        "workflow dynamic non-db input".to_string(),
        DYNAMIC_NON_DB_WORKFLOW,
        ResultValue::mapping([("namespace", ResultValue::mapping([("input", non_db.clone())]))]),
        non_db,
    ));

    specs.push(workflow(
        "workflow dynamic db input".to_string(),
        DYNAMIC_DB_WORKFLOW,
        ResultValue::mapping([("namespace", ResultValue::mapping([("input", int_node(9))]))]),
        ResultValue::Int(9),
    ));

    let (value_non_db, value_db) = (3, 2);
    specs.push(workflow(
        "workflow mixed dynamic input".to_string(),
        DYNAMIC_MIXED_WORKFLOW,
        ResultValue::mapping([(
            "namespace",
            ResultValue::mapping([(
                "inputs",
                ResultValue::mapping([
                    ("input_non_db", ResultValue::Int(value_non_db)),
                    ("input_db", int_node(value_db)),
                ]),
            )]),
        )]),
        ResultValue::Int(value_non_db + value_db),
    ));

    specs.push(workflow(
        "workflow serializing a type".to_string(),
        SERIALIZE_WORKFLOW,
        ResultValue::mapping([("test", ResultValue::str(INT_TYPE_IDENTITY))]),
        ResultValue::str(INT_TYPE_IDENTITY),
    ));

    let list_value = ResultValue::node("List", ResultValue::list([1, 2, 3].map(ResultValue::Int)));
    specs.push(workflow(
        "workflow list echo".to_string(),
        LIST_ECHO_WORKFLOW,
        ResultValue::mapping([("list", list_value.clone())]),
        list_value,
    ));

    let text = ResultValue::node("Str", ResultValue::str("workfunction test string"));
    specs.push(workflow(
        "workflow running a workfunction".to_string(),
        WORKFUNCTION_RUNNER_WORKFLOW,
        ResultValue::mapping([("input", text.clone())]),
        text,
    ));

    specs.push(workflow(
        "workflow running a calcfunction".to_string(),
        CALCFUNCTION_RUNNER_WORKFLOW,
        ResultValue::mapping([("input", int_node(1))]),
        int_node(2),
    ));

    specs
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_expected_calculation_shape() {
        assert_eq!(
            expected_calculation(5).to_json(),
            json!({"value": 10, "artifacts": {"triple_value": "15"}})
        );
    }

    #[test]
    fn test_calculation_spec_inputs() {
        let spec = calculation("doubler", 3, 3);
        assert_eq!(spec.kind(), TaskKind::Calculation);
        assert_eq!(spec.request.process, TEMPLATE_REPLACER);
        assert_eq!(spec.request.caching, None);
        assert_eq!(
            spec.request
                .inputs
                .lookup("parameters.value")
                .and_then(ResultValue::as_i64),
            Some(3)
        );
        assert_eq!(
            spec.request
                .inputs
                .lookup("metadata.options.parser_name")
                .and_then(ResultValue::as_str),
            Some(DOUBLER_PARSER)
        );
        assert_eq!(spec.label, "[3] calculation(value=3)");
    }

    #[test]
    fn test_workflow_variants_cover_every_flavour() {
        let specs = workflow_variants(8);
        assert_eq!(specs.len(), 16);
        assert!(specs.iter().all(|s| s.kind() == TaskKind::Workflow));

        let processes: Vec<&str> = specs.iter().map(|s| s.request.process.as_str()).collect();
        for process in [
            NESTED_NAMESPACE_WORKFLOW,
            DYNAMIC_NON_DB_WORKFLOW,
            DYNAMIC_DB_WORKFLOW,
            DYNAMIC_MIXED_WORKFLOW,
            SERIALIZE_WORKFLOW,
            LIST_ECHO_WORKFLOW,
            WORKFUNCTION_RUNNER_WORKFLOW,
            CALCFUNCTION_RUNNER_WORKFLOW,
        ] {
            assert_eq!(
                processes.iter().filter(|p| **p == process).count(),
                1,
                "{process} must be launched once"
            );
        }
        assert_eq!(
            processes.iter().filter(|p| **p == NESTED_WORKFLOW).count(),
            8
        );
    }

    #[test]
    fn test_workflow_expectations() {
        let specs = workflow_variants(2);
        let expected = |process: &str| {
            specs
                .iter()
                .find(|s| s.request.process == process)
                .map(|s| s.expected.to_json())
                .unwrap()
        };

        assert_eq!(expected(DYNAMIC_NON_DB_WORKFLOW), json!([4, 2, 3]));
        assert_eq!(expected(DYNAMIC_MIXED_WORKFLOW), json!(5));
        assert_eq!(expected(NESTED_NAMESPACE_WORKFLOW), json!(-12));
        assert_eq!(
            expected(CALCFUNCTION_RUNNER_WORKFLOW),
            json!({"$node": "Int", "$value": 2})
        );
        assert_eq!(specs[1].expected, ResultValue::Int(1));
    }
}
