use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PlanError;

/// An ordered, immutable list of browser actions for one run.
///
/// Deserializing goes through [`Plan::from_value`], so every plan in hand
/// has been validated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct Plan {
    steps: Vec<Action>,
}

/// A single step of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action_type", rename_all = "snake_case")]
pub enum Action {
    Navigate { url: String },
    Interact(Interaction),
}

/// What to do with the element the decision step picks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "interaction_type", rename_all = "snake_case")]
pub enum Interaction {
    Click {
        element_description: String,
    },
    Type {
        element_description: String,
        value: String,
        submit: bool,
    },
    /// Accepted by the plan model but has no handler.
    Select {
        element_description: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Click,
    Type,
    Select,
}

impl InteractionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            InteractionKind::Click => "click",
            InteractionKind::Type => "type",
            InteractionKind::Select => "select",
        }
    }
}

impl std::fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Interaction {
    pub fn kind(&self) -> InteractionKind {
        match self {
            Interaction::Click { .. } => InteractionKind::Click,
            Interaction::Type { .. } => InteractionKind::Type,
            Interaction::Select { .. } => InteractionKind::Select,
        }
    }

    pub fn element_description(&self) -> &str {
        match self {
            Interaction::Click { element_description }
            | Interaction::Type {
                element_description,
                ..
            }
            | Interaction::Select {
                element_description,
                ..
            } => element_description,
        }
    }
}

impl Action {
    /// Short label for logs and progress events: `navigate`, `click`, `type` or `select`.
    pub fn label(&self) -> &'static str {
        match self {
            Action::Navigate { .. } => "navigate",
            Action::Interact(interaction) => interaction.kind().as_str(),
        }
    }
}

impl Plan {
    pub fn new(steps: Vec<Action>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[Action] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn from_json(raw: &str) -> Result<Self, PlanError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| PlanError::Malformed(vec![format!("invalid JSON: {e}")]))?;
        Self::from_value(&value)
    }

    /// Validate an untyped payload. Either every step validates or the whole
    /// payload is rejected with all of its problems listed.
    pub fn from_value(value: &Value) -> Result<Self, PlanError> {
        let Some(root) = value.as_object() else {
            return Err(PlanError::Malformed(vec![
                "plan must be a JSON object".to_string(),
            ]));
        };
        let Some(raw_steps) = root.get("steps").and_then(Value::as_array) else {
            return Err(PlanError::Malformed(vec![
                "plan must contain a 'steps' array".to_string(),
            ]));
        };

        let mut steps = Vec::with_capacity(raw_steps.len());
        let mut problems = Vec::new();
        for (index, raw) in raw_steps.iter().enumerate() {
            match parse_step(raw) {
                Ok(action) => steps.push(action),
                Err(mut step_problems) => problems.extend(
                    step_problems
                        .drain(..)
                        .map(|problem| format!("steps[{index}]: {problem}")),
                ),
            }
        }

        if problems.is_empty() {
            Ok(Self { steps })
        } else {
            Err(PlanError::Malformed(problems))
        }
    }
}

impl TryFrom<Value> for Plan {
    type Error = PlanError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(&value)
    }
}

impl<'a> IntoIterator for &'a Plan {
    type Item = &'a Action;
    type IntoIter = std::slice::Iter<'a, Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

fn parse_step(raw: &Value) -> Result<Action, Vec<String>> {
    let Some(fields) = raw.as_object() else {
        return Err(vec!["step must be an object".to_string()]);
    };

    match fields.get("action_type").and_then(Value::as_str) {
        Some("navigate") => match non_empty_str(fields, "url") {
            Some(url) => Ok(Action::Navigate {
                url: url.to_string(),
            }),
            None => Err(vec!["navigate step needs a non-empty 'url'".to_string()]),
        },
        Some("interact") => parse_interaction(fields).map(Action::Interact),
        Some(other) => Err(vec![format!("unknown action_type '{other}'")]),
        None => Err(vec!["missing 'action_type'".to_string()]),
    }
}

fn parse_interaction(fields: &Map<String, Value>) -> Result<Interaction, Vec<String>> {
    let mut problems = Vec::new();

    let description = fields.get("element_description").and_then(Value::as_str);
    if description.is_none() {
        problems.push("interact step needs an 'element_description' string".to_string());
    }

    let value = fields.get("value").and_then(Value::as_str);
    let kind = match fields.get("interaction_type").and_then(Value::as_str) {
        Some("click") => Some(InteractionKind::Click),
        Some("type") => {
            if value.is_none() {
                problems.push("type interaction needs a 'value' string".to_string());
            }
            Some(InteractionKind::Type)
        }
        Some("select") => Some(InteractionKind::Select),
        Some(other) => {
            problems.push(format!("unknown interaction_type '{other}'"));
            None
        }
        None => {
            problems.push("missing 'interaction_type'".to_string());
            None
        }
    };

    let submit = match fields.get("submit") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(_) => {
            problems.push("'submit' must be a boolean".to_string());
            false
        }
    };

    if !problems.is_empty() {
        return Err(problems);
    }

    let element_description = description.unwrap_or_default().to_string();
    Ok(match kind {
        Some(InteractionKind::Type) => Interaction::Type {
            element_description,
            value: value.unwrap_or_default().to_string(),
            submit,
        },
        Some(InteractionKind::Select) => Interaction::Select {
            element_description,
            value: value.map(str::to_string),
        },
        _ => Interaction::Click {
            element_description,
        },
    })
}

fn non_empty_str<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_a_single_navigate_step() {
        let plan = Plan::from_value(&json!({
            "steps": [{"action_type": "navigate", "url": "https://x"}]
        }))
        .unwrap();
        assert_eq!(
            plan.steps(),
            &[Action::Navigate {
                url: "https://x".into()
            }]
        );
    }

    #[test]
    fn rejects_type_without_value() {
        let err = Plan::from_value(&json!({
            "steps": [{"action_type": "interact", "interaction_type": "type"}]
        }))
        .unwrap_err();
        let PlanError::Malformed(problems) = err;
        assert!(problems.iter().any(|p| p.contains("'value'")));
    }

    #[test]
    fn empty_plan_is_valid() {
        let plan = Plan::from_json(r#"{"steps": []}"#).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn rejects_payloads_without_steps() {
        for payload in [json!([]), json!({}), json!({"steps": "nope"}), json!(null)] {
            assert!(Plan::from_value(&payload).is_err(), "{payload} accepted");
        }
    }

    #[test]
    fn collects_problems_from_every_step() {
        let err = Plan::from_value(&json!({
            "steps": [
                {"action_type": "scroll"},
                {"action_type": "navigate", "url": "https://ok"},
                {"action_type": "interact", "element_description": "x",
                 "interaction_type": "hover"},
                {"action_type": "navigate", "url": ""}
            ]
        }))
        .unwrap_err();
        let problems = err.problems();
        assert_eq!(problems.len(), 3);
        assert!(problems[0].starts_with("steps[0]: unknown action_type 'scroll'"));
        assert!(problems[1].starts_with("steps[2]: unknown interaction_type 'hover'"));
        assert!(problems[2].starts_with("steps[3]:"));
    }

    #[test]
    fn click_ignores_value_and_type_keeps_submit() {
        let plan = Plan::from_value(&json!({
            "steps": [
                {"action_type": "interact", "interaction_type": "click",
                 "element_description": "login button", "value": 12},
                {"action_type": "interact", "interaction_type": "type",
                 "element_description": "search box", "value": "rust", "submit": true}
            ]
        }))
        .unwrap();
        assert_eq!(plan.steps()[0].label(), "click");
        assert_eq!(
            plan.steps()[1],
            Action::Interact(Interaction::Type {
                element_description: "search box".into(),
                value: "rust".into(),
                submit: true,
            })
        );
    }

    #[test]
    fn select_is_kept_in_the_model() {
        let plan = Plan::from_value(&json!({
            "steps": [{"action_type": "interact", "interaction_type": "select",
                       "element_description": "country", "value": "FR"}]
        }))
        .unwrap();
        assert_eq!(plan.steps()[0].label(), "select");
    }

    #[test]
    fn serde_deserialization_validates_too() {
        let empty_url = json!({"steps": [{"action_type": "navigate", "url": ""}]});
        let err = serde_json::from_value::<Plan>(empty_url).unwrap_err();
        assert!(err.to_string().contains("steps[0]"));

        let plan: Plan =
            serde_json::from_str(r#"{"steps": [{"action_type": "navigate", "url": "https://a"}]}"#)
                .unwrap();
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn serialized_plan_validates_again() {
        let plan = Plan::new(vec![
            Action::Navigate {
                url: "https://a".into(),
            },
            Action::Interact(Interaction::Click {
                element_description: "login button".into(),
            }),
        ]);
        let value = serde_json::to_value(&plan).unwrap();
        assert_eq!(value["steps"][1]["action_type"], "interact");
        assert_eq!(value["steps"][1]["interaction_type"], "click");
        assert_eq!(Plan::from_value(&value).unwrap(), plan);
    }
}
