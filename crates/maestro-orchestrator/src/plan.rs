use maestro_core::{strip_code_fences, MaestroError, MaestroResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// One unit of delegated work: which worker, and what to send it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Worker to dispatch to.
    #[serde(rename = "agent")]
    pub worker: String,
    /// Text sent to the worker.
    pub input: String,
}

impl PlanStep {
    /// A step for `worker` with `input`.
    pub fn new(worker: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            worker: worker.into(),
            input: input.into(),
        }
    }
}

/// An ordered, validated list of steps. Order is execution and aggregation
/// order.
///
/// A `Plan` can only be built through validation, so every step names a
/// worker that was available when the plan was made.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Plan {
    steps: Vec<PlanStep>,
}

impl Plan {
    /// Validate already-structured steps against the available workers.
    pub fn from_steps(steps: Vec<PlanStep>, available: &BTreeSet<String>) -> MaestroResult<Self> {
        for (index, step) in steps.iter().enumerate() {
            check_worker(index, &step.worker, available)?;
        }
        Ok(Self { steps })
    }

    /// Steps in execution order.
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True for an empty plan.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Iterate steps in order.
    pub fn iter(&self) -> std::slice::Iter<'_, PlanStep> {
        self.steps.iter()
    }
}

impl<'a> IntoIterator for &'a Plan {
    type Item = &'a PlanStep;
    type IntoIter = std::slice::Iter<'a, PlanStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

/// Parse untrusted planner output into a [`Plan`].
///
/// Code fences around the text are removed first. The remainder must be a
/// JSON array (`MalformedPlan` otherwise) of objects with string `agent` and
/// `input` fields, where `agent` is one of `available` (`InvalidStep`
/// otherwise, carrying the element index). Extra fields are ignored.
pub fn parse_plan(raw: &str, available: &BTreeSet<String>) -> MaestroResult<Plan> {
    let body = strip_code_fences(raw);
    let value: Value = serde_json::from_str(body)
        .map_err(|e| MaestroError::MalformedPlan(format!("not valid JSON: {e}")))?;

    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(MaestroError::MalformedPlan(format!(
                "expected a JSON array, got {}",
                json_kind(&other)
            )))
        }
    };

    let steps = items
        .iter()
        .enumerate()
        .map(|(index, item)| parse_step(index, item, available))
        .collect::<MaestroResult<Vec<_>>>()?;

    Ok(Plan { steps })
}

fn parse_step(index: usize, item: &Value, available: &BTreeSet<String>) -> MaestroResult<PlanStep> {
    let obj = item.as_object().ok_or_else(|| MaestroError::InvalidStep {
        index,
        reason: format!("expected an object, got {}", json_kind(item)),
    })?;

    let worker = string_field(index, obj, "agent")?;
    let input = string_field(index, obj, "input")?;
    check_worker(index, worker, available)?;

    Ok(PlanStep::new(worker, input))
}

fn string_field<'a>(index: usize, obj: &'a Map<String, Value>, field: &str) -> MaestroResult<&'a str> {
    match obj.get(field) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(MaestroError::InvalidStep {
            index,
            reason: format!("'{field}' must be a string, got {}", json_kind(other)),
        }),
        None => Err(MaestroError::InvalidStep {
            index,
            reason: format!("missing '{field}'"),
        }),
    }
}

fn check_worker(index: usize, worker: &str, available: &BTreeSet<String>) -> MaestroResult<()> {
    if available.contains(worker) {
        Ok(())
    } else {
        Err(MaestroError::InvalidStep {
            index,
            reason: format!("unknown worker '{worker}'"),
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
