//! @ai:module:intent Heuristic task complexity from template shape and task data
//! @ai:module:layer domain
//! @ai:module:public_api complexity
//! @ai:module:stateless true

use crate::catalog::{Category, CriterionType, DataType, Task, Template};

const BASE_COMPLEXITY: f64 = 0.3;
const SECTION_CAP: f64 = 0.2;
const TASK_CAP: f64 = 0.1;
const REQUIRED_MULTIPLIER: f64 = 1.2;
const INPUT_SIZE_DIVISOR: f64 = 10_000.0;

/// @ai:intent Complexity in [0, 1]: base 0.3 plus capped schema, criteria and task contributions
/// @ai:effects pure
pub fn complexity(task: &Task, template: &Template, category: Option<&Category>) -> f64 {
    let score = BASE_COMPLEXITY
        + input_contribution(template)
        + output_contribution(template)
        + criteria_contribution(template)
        + task_contribution(task, category);

    score.clamp(0.0, 1.0)
}

fn input_contribution(template: &Template) -> f64 {
    let total: f64 = template
        .input_schema
        .values()
        .map(|field| {
            let base = match field.data_type {
                DataType::ImagePath => 0.05,
                DataType::JsonObject | DataType::Object => 0.07,
                DataType::Array | DataType::StringArray => 0.04,
                _ => 0.02,
            };
            if field.required {
                base * REQUIRED_MULTIPLIER
            } else {
                base
            }
        })
        .sum();

    total.min(SECTION_CAP)
}

fn output_contribution(template: &Template) -> f64 {
    let total: f64 = template
        .output_schema
        .values()
        .map(|field| match field.data_type {
            DataType::JsonObject | DataType::Object => 0.08,
            DataType::Array | DataType::StringArray => 0.05,
            DataType::Number => 0.03,
            _ => 0.02,
        })
        .sum();

    total.min(SECTION_CAP)
}

fn criteria_contribution(template: &Template) -> f64 {
    let total: f64 = template
        .evaluation_criteria
        .values()
        .map(|criterion| match criterion.kind {
            CriterionType::UnitTest => 0.06,
            CriterionType::GroundTruthComparison => 0.05,
            CriterionType::StaticAnalysis => 0.04,
            _ => 0.02,
        })
        .sum();

    total.min(SECTION_CAP)
}

/// Category name keywords plus serialized input size
fn task_contribution(task: &Task, category: Option<&Category>) -> f64 {
    let mut total = 0.0;

    if let Some(category) = category {
        let name = category.name.to_lowercase();
        if name.contains("coding") {
            total += 0.08;
        } else if name.contains("document") {
            total += 0.06;
        } else if name.contains("recruitment") {
            total += 0.04;
        }
    }

    if !task.input_data.is_empty() {
        let size = serde_json::to_string(&task.input_data)
            .map(|s| s.len())
            .unwrap_or(0);
        total += (size as f64 / INPUT_SIZE_DIVISOR).min(TASK_CAP);
    }

    total.min(TASK_CAP)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EvaluationCriterion, InputField, OutputField};

    fn input(data_type: DataType, required: bool) -> InputField {
        InputField {
            data_type,
            description: String::new(),
            required,
            default: None,
        }
    }

    fn output(data_type: DataType) -> OutputField {
        OutputField {
            data_type,
            description: String::new(),
        }
    }

    #[test]
    fn test_minimal_template_is_base() {
        let task = Task::new("t", "T", "tpl");
        let template = Template::new("tpl", "Template");
        assert!((complexity(&task, &template, None) - BASE_COMPLEXITY).abs() < 1e-9);
    }

    #[test]
    fn test_schema_contributions() {
        let task = Task::new("t", "T", "tpl");
        let mut template = Template::new("tpl", "Template");
        template.input_schema.insert("code".to_string(), input(DataType::Text, true));
        template
            .output_schema
            .insert("result".to_string(), output(DataType::JsonObject));
        template.evaluation_criteria.insert(
            "tests".to_string(),
            EvaluationCriterion {
                kind: CriterionType::UnitTest,
                weight: 1.0,
            },
        );

        let expected = 0.3 + 0.02 * 1.2 + 0.08 + 0.06;
        assert!((complexity(&task, &template, None) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_sections_are_capped() {
        let task = Task::new("t", "T", "tpl");
        let mut template = Template::new("tpl", "Template");
        for i in 0..10 {
            template
                .input_schema
                .insert(format!("in{}", i), input(DataType::JsonObject, true));
            template
                .output_schema
                .insert(format!("out{}", i), output(DataType::JsonObject));
        }

        let expected = 0.3 + 0.2 + 0.2;
        assert!((complexity(&task, &template, None) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_coding_category_bonus() {
        let task = Task::new("t", "T", "tpl");
        let template = Template::new("tpl", "Template");
        let category = Category::new("c", "Python Coding");

        let expected = 0.3 + 0.08;
        assert!((complexity(&task, &template, Some(&category)) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_task_contribution_capped() {
        let big = "x".repeat(20_000);
        let task = Task::new("t", "T", "tpl").with_input("blob", serde_json::json!(big));
        let template = Template::new("tpl", "Template");
        let category = Category::new("c", "Coding");

        let expected = 0.3 + 0.1;
        assert!((complexity(&task, &template, Some(&category)) - expected).abs() < 1e-9);
    }
}
