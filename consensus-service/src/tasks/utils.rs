use graph_flow::{Context, GraphError, NextAction, Result, StateDelta, TaskResult};
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::session_keys;
use crate::{
    llm::{LlmClient, LlmError, filter_thinking_tags},
    models::{AgentKind, AgentOutput, CaseInput, ResearchBundle},
    search::WebSearchClient,
    verifier::SourceVerifier,
};

/// Shared collaborators handed to every stage. Cheap to clone.
#[derive(Clone)]
pub struct AgentDeps {
    pub llm: LlmClient,
    pub search: Arc<WebSearchClient>,
    pub verifier: SourceVerifier,
    pub max_results: usize,
}

pub async fn require_case(context: &Context) -> Result<CaseInput> {
    context
        .get(session_keys::CASE)
        .await
        .ok_or_else(|| GraphError::ContextError("case not found".to_string()))
}

/// Research bundle, or an empty one when research never produced it
pub async fn research_bundle(context: &Context) -> ResearchBundle {
    context
        .get(session_keys::RESEARCH_BUNDLE)
        .await
        .unwrap_or(ResearchBundle {
            results: Vec::new(),
            overall_credibility: 0.0,
        })
}

pub async fn agent_output(context: &Context, agent: AgentKind) -> Option<AgentOutput> {
    context.get(&session_keys::agent_output(agent)).await
}

/// Every specialist output present, in presentation order
pub async fn agent_outputs(context: &Context) -> Vec<AgentOutput> {
    let mut outputs = Vec::new();
    for agent in AgentKind::ALL {
        if let Some(output) = agent_output(context, agent).await {
            outputs.push(output);
        }
    }
    outputs
}

/// Completion with reasoning blocks stripped
pub async fn ask(llm: &LlmClient, prompt: &str, role: &str) -> std::result::Result<String, LlmError> {
    let text = llm.complete(prompt, role).await?;
    Ok(filter_thinking_tags(&text))
}

pub fn agent_result(stage: &str, output: AgentOutput) -> Result<TaskResult> {
    let status = format!("{} finished", output.agent.display_name());
    debug!(task_id = %stage, agent = %output.agent.id(), chars = output.content.len(), "Agent output ready");
    let delta = StateDelta::new().with(session_keys::agent_output(output.agent), &output)?;
    Ok(TaskResult::new_with_status(delta, NextAction::Continue, Some(status)))
}

/// Stage result for an agent that could not produce its normal answer. The gap is
/// recorded under the stage's error key.
pub fn degraded_result(stage: &str, output: AgentOutput) -> Result<TaskResult> {
    let reason = output
        .degraded
        .clone()
        .unwrap_or_else(|| "degraded".to_string());
    warn!(task_id = %stage, agent = %output.agent.id(), reason = %reason, "Agent output degraded");
    let status = format!("{} degraded: {reason}", output.agent.display_name());
    let delta = StateDelta::new()
        .with(session_keys::agent_output(output.agent), &output)?
        .with(session_keys::stage_error(stage), &reason)?;
    Ok(TaskResult::new_with_status(delta, NextAction::Continue, Some(status)))
}

/// Map an exhausted provider chain onto the stage outcome: a fatal chain ends the
/// run, anything else degrades to `fallback`.
pub fn on_llm_error(
    stage: &str,
    agent: AgentKind,
    err: LlmError,
    fallback: String,
) -> Result<TaskResult> {
    if err.is_fatal() {
        error!(task_id = %stage, error = %err, "No LLM provider available");
        return Err(GraphError::TaskExecutionFailed(format!(
            "{} could not reach any LLM provider: {err}",
            agent.display_name()
        )));
    }
    degraded_result(stage, AgentOutput::degraded(agent, fallback, err.to_string()))
}

/// Truncate to at most `max` characters on a char boundary
pub fn clip(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ProviderError;

    #[test]
    fn clip_respects_char_boundaries() {
        assert_eq!(clip("héllo", 2), "hé");
        assert_eq!(clip("short", 100), "short");
    }

    #[test]
    fn transient_failure_degrades() {
        let err = LlmError::Exhausted {
            failures: vec![("primary".to_string(), ProviderError::Timeout)],
        };
        let result = on_llm_error("diagnose", AgentKind::Diagnostician, err, "fallback".into()).unwrap();
        let output: AgentOutput = result
            .delta
            .get(&session_keys::agent_output(AgentKind::Diagnostician))
            .unwrap();
        assert!(output.is_degraded());
        assert_eq!(output.content, "fallback");
        assert!(result
            .delta
            .get::<String>(&session_keys::stage_error("diagnose"))
            .is_some());
    }

    #[test]
    fn unreachable_chain_is_terminal() {
        let err = LlmError::Exhausted {
            failures: vec![("primary".to_string(), ProviderError::Auth { status: 401 })],
        };
        let result = on_llm_error("diagnose", AgentKind::Diagnostician, err, String::new());
        assert!(matches!(result, Err(GraphError::TaskExecutionFailed(_))));
    }
}
