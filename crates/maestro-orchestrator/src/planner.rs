use crate::plan::{parse_plan, Plan};
use maestro_agent::TextCompletion;
use maestro_core::MaestroResult;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

const PLAN_PROMPT: &str = r#"You are an NLP Planner Agent.
You do NOT execute any tasks yourself.
You only create a plan for other agents to execute.

Available agents:
{available_agents}

Output the plan in strict JSON format:
[
  { "agent": "<agent_name>", "input": "<input_text>" },
  ...
]

Example:
User: "Check the sentiment and POS tags for 'I love Groq models!'"
Plan:
[
  { "agent": "<agent1>", "input": "I love Groq models!" },
  { "agent": "<agent2>", "input": "I love Groq models!" }
]

Now, given the user request:
"{user_input}"
Produce the JSON plan only."#;

/// Turns a query into a validated [`Plan`] with one completion call.
///
/// Rejected output is not retried: the same prompt is expected to produce
/// the same rejected output.
pub struct Planner {
    completion: Arc<dyn TextCompletion>,
}

impl Planner {
    /// Planner backed by `completion`.
    pub fn new(completion: Arc<dyn TextCompletion>) -> Self {
        Self { completion }
    }

    /// Ask the model for a plan and validate it against `available`.
    pub async fn plan(&self, query: &str, available: &BTreeSet<String>) -> MaestroResult<Plan> {
        let prompt = render_prompt(query, available);
        let raw = self.completion.complete(&prompt).await?;
        debug!(output_len = raw.len(), "Planner output received");

        match parse_plan(&raw, available) {
            Ok(plan) => {
                info!(steps = plan.len(), "Plan accepted");
                Ok(plan)
            }
            Err(e) => {
                warn!(error = %e, "Planner output rejected");
                Err(e)
            }
        }
    }
}

/// The planning prompt for `query`, listing each available worker on its own line.
pub fn render_prompt(query: &str, available: &BTreeSet<String>) -> String {
    let agents = available
        .iter()
        .map(|name| format!("- {name}"))
        .collect::<Vec<_>>()
        .join("\n");
    PLAN_PROMPT
        .replace("{available_agents}", &agents)
        .replace("{user_input}", query)
}
