//! Deterministic retrieve-then-answer planning.

use async_trait::async_trait;
use serde_json::json;

use docmind_core::{Action, AgentStep, DocmindError, Observation, Planner, Query, Result};

use crate::context::{compose_answer, SourcePassage, NO_RESULTS_ANSWER};

/// Two-step plan: search the corpus once, then answer extractively from
/// whatever came back. A pure function of the query and trace, so replaying
/// a trace reproduces the same decisions.
pub struct RetrieveThenAnswerPlanner {
    top_k: usize,
}

impl RetrieveThenAnswerPlanner {
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }
}

#[async_trait]
impl Planner for RetrieveThenAnswerPlanner {
    async fn plan(&self, query: &Query, trace: &[AgentStep]) -> Result<Action> {
        let last = match trace.last() {
            None => {
                return Ok(Action::ToolCall {
                    name: "search_documents".to_string(),
                    arguments: json!({
                        "query": query.text,
                        "top_k": self.top_k,
                        "filters": serde_json::to_value(&query.filters)?,
                    }),
                });
            }
            Some(step) => step,
        };

        match &last.observation {
            Observation::Output { value } => {
                let results = value["results"].as_array().ok_or_else(|| {
                    DocmindError::planning("search observation missing 'results'")
                })?;

                if results.is_empty() {
                    return Ok(Action::FinalAnswer {
                        text: NO_RESULTS_ANSWER.to_string(),
                    });
                }

                let passages: Vec<SourcePassage> = results
                    .iter()
                    .map(|r| {
                        serde_json::from_value(r.clone()).map_err(|e| {
                            DocmindError::planning(format!("malformed search result: {}", e))
                        })
                    })
                    .collect::<Result<_>>()?;

                Ok(Action::FinalAnswer {
                    text: compose_answer(&query.text, &passages),
                })
            }
            Observation::Error { message, .. } => Ok(Action::FinalAnswer {
                text: format!("I wasn't able to search the documents: {}", message),
            }),
        }
    }
}
