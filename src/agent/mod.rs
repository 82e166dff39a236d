//! The conversational routing graph. One turn enters at the router and
//! leaves with `final_response` populated, whatever breaks along the way.

pub mod prompts;
pub mod state;

use std::sync::Arc;

use strum::IntoEnumIterator;
use tracing::{debug, error, info};

use crate::llm::providers::base::LlmProvider;
use crate::tools::criteria::{CriteriaExtractor, FlightCriteria};
use crate::tools::flight_search::{FlightSearchEngine, ScoredFlight};
use crate::tools::rag::RagTool;
use prompts::{
    CLARIFICATION_SYSTEM_PROMPT, INTENT_SYSTEM_PROMPT, RESULTS_SYSTEM_PROMPT,
    build_clarification_prompt, build_intent_prompt, build_no_results_prompt,
    build_results_prompt,
};
use state::{Intent, TurnState};

/// Last-resort reply when every node on the path failed.
const TOTAL_FAILURE_MESSAGE: &str = "I'm sorry, something went wrong. Please try again.";
const RAG_FAILURE_MESSAGE: &str =
    "I'm sorry, I encountered an error retrieving that information.";
const COMPOSER_FAILURE_MESSAGE: &str =
    "I apologize, but I encountered an error generating the response.";
const CLARIFICATION_FAILURE_MESSAGE: &str =
    "Could you provide more details about your travel plans?";

/// Typed node outcomes. Each node reads the state and returns one of
/// these; only the dispatcher writes state, so the flow of every field
/// is visible in `run_turn`.
struct RouterOutcome {
    intent: Intent,
    error: Option<String>,
}

struct ExtractionOutcome {
    criteria: Option<FlightCriteria>,
    needs_clarification: bool,
    error: Option<String>,
}

struct SearchOutcome {
    results: Vec<ScoredFlight>,
    error: Option<String>,
}

struct ComposeOutcome {
    response: String,
    rag_context: Option<String>,
    error: Option<String>,
}

/// The turn-level API: owns the injected collaborators and drives the
/// graph `router -> {criteria extraction -> flight search -> response,
/// rag, clarification}`.
pub struct TravelAgent {
    llm: Arc<dyn LlmProvider>,
    extractor: CriteriaExtractor,
    search: FlightSearchEngine,
    rag: RagTool,
    max_results_shown: usize,
}

impl TravelAgent {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        extractor: CriteriaExtractor,
        search: FlightSearchEngine,
        rag: RagTool,
    ) -> Self {
        info!("Travel agent assembled (provider={})", llm.provider_name());
        Self {
            llm,
            extractor,
            search,
            rag,
            max_results_shown: 5,
        }
    }

    pub fn with_max_results_shown(mut self, max_results_shown: usize) -> Self {
        self.max_results_shown = max_results_shown;
        self
    }

    /// Process one user turn. The input state must carry the query as
    /// its newest message; the output state always has a non-empty
    /// `final_response`.
    pub async fn run_turn(&self, mut state: TurnState) -> TurnState {
        let routed = self.router_node(&state).await;
        state.intent = Some(routed.intent);
        merge_error(&mut state, routed.error);

        match routed.intent {
            Intent::FlightSearch => {
                let extraction = self.criteria_extraction_node(&state).await;
                state.needs_clarification = extraction.needs_clarification;
                state.extracted_criteria = extraction.criteria;
                merge_error(&mut state, extraction.error);

                if state.needs_clarification {
                    let composed = self.clarification_node(&state).await;
                    apply_compose(&mut state, composed);
                } else {
                    let searched = self.flight_search_node(&state);
                    state.search_results = Some(searched.results);
                    merge_error(&mut state, searched.error);

                    let composed = self.response_generation_node(&state).await;
                    apply_compose(&mut state, composed);
                }
            }
            Intent::VisaQuery | Intent::PolicyQuery | Intent::GeneralTravel => {
                let composed = self.rag_query_node(&state).await;
                apply_compose(&mut state, composed);
            }
            Intent::ClarificationNeeded => {
                let composed = self.clarification_node(&state).await;
                apply_compose(&mut state, composed);
            }
        }

        // The turn must always end with something to say.
        if state.final_response.as_deref().is_none_or(str::is_empty) {
            state.final_response = Some(TOTAL_FAILURE_MESSAGE.to_string());
        }
        state
    }

    async fn router_node(&self, state: &TurnState) -> RouterOutcome {
        debug!("Executing router node");
        let conversation_context = if state.messages.len() > 1 {
            let recent = state.format_recent_messages(true);
            if recent.is_empty() {
                String::new()
            } else {
                format!("Recent conversation:\n{recent}\n\n")
            }
        } else {
            String::new()
        };
        let prompt = build_intent_prompt(&state.user_query, &conversation_context);

        match self.llm.generate(INTENT_SYSTEM_PROMPT, &prompt, None).await {
            Ok((response, _metadata)) => {
                let response = response.trim();
                // First label found in enumeration order wins; anything
                // unrecognizable routes to clarification.
                let intent = Intent::iter()
                    .find(|intent| response.contains(intent.label()))
                    .unwrap_or(Intent::ClarificationNeeded);
                info!("Classified intent: {}", intent.label());
                RouterOutcome {
                    intent,
                    error: None,
                }
            }
            Err(e) => {
                error!("Router LLM call failed: {}", e);
                RouterOutcome {
                    intent: Intent::ClarificationNeeded,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn criteria_extraction_node(&self, state: &TurnState) -> ExtractionOutcome {
        debug!("Executing criteria extraction node");
        let conversation_context = if state.messages.len() > 1 {
            format!("Conversation:\n{}\n\n", state.format_recent_messages(false))
        } else {
            String::new()
        };

        match self
            .extractor
            .extract(&state.user_query, &conversation_context)
            .await
        {
            Ok(criteria) => {
                info!("Extracted criteria: {}", criteria.summary());
                let needs_clarification = !criteria.has_destination();
                ExtractionOutcome {
                    criteria: Some(criteria),
                    needs_clarification,
                    error: None,
                }
            }
            Err(e) => {
                error!("Criteria extraction failed: {}", e);
                ExtractionOutcome {
                    criteria: None,
                    needs_clarification: true,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    fn flight_search_node(&self, state: &TurnState) -> SearchOutcome {
        debug!("Executing flight search node");
        match &state.extracted_criteria {
            Some(criteria) => {
                let results = self.search.search(criteria);
                info!("Found {} flights", results.len());
                if let Some(top) = results.first() {
                    debug!("Top match: {}", top.flight.summary());
                }
                SearchOutcome {
                    results,
                    error: None,
                }
            }
            None => SearchOutcome {
                results: Vec::new(),
                error: Some("No criteria extracted".to_string()),
            },
        }
    }

    async fn rag_query_node(&self, state: &TurnState) -> ComposeOutcome {
        debug!("Executing RAG query node");
        let previous = state.last_assistant_message();
        match self.rag.query(&state.user_query, previous).await {
            Ok(result) => {
                info!("RAG answer generated with {} sources", result.sources.len());
                ComposeOutcome {
                    response: result.answer,
                    rag_context: Some(result.sources.join("\n")),
                    error: None,
                }
            }
            Err(e) => {
                error!("RAG query failed: {}", e);
                ComposeOutcome {
                    response: RAG_FAILURE_MESSAGE.to_string(),
                    rag_context: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn response_generation_node(&self, state: &TurnState) -> ComposeOutcome {
        debug!("Executing response generation node");
        let results = state.search_results.as_deref().unwrap_or(&[]);
        let criteria_json = state
            .extracted_criteria
            .as_ref()
            .and_then(|c| serde_json::to_string_pretty(c).ok())
            .unwrap_or_else(|| "{}".to_string());

        let prompt = if results.is_empty() {
            build_no_results_prompt(&criteria_json)
        } else {
            let shown = &results[..results.len().min(self.max_results_shown)];
            let results_json =
                serde_json::to_string_pretty(shown).unwrap_or_else(|_| "[]".to_string());
            build_results_prompt(&criteria_json, &results_json, results.len())
        };

        match self.llm.generate(RESULTS_SYSTEM_PROMPT, &prompt, None).await {
            Ok((response, _metadata)) => ComposeOutcome {
                response,
                rag_context: None,
                error: None,
            },
            Err(e) => {
                error!("Response generation failed: {}", e);
                ComposeOutcome {
                    response: COMPOSER_FAILURE_MESSAGE.to_string(),
                    rag_context: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn clarification_node(&self, state: &TurnState) -> ComposeOutcome {
        debug!("Executing clarification node");
        let conversation_context = {
            let recent = state.format_recent_messages(false);
            if recent.is_empty() {
                "(none yet)".to_string()
            } else {
                recent
            }
        };
        let missing = missing_field(state.extracted_criteria.as_ref());
        let prompt =
            build_clarification_prompt(&state.user_query, missing, &conversation_context);

        match self
            .llm
            .generate(CLARIFICATION_SYSTEM_PROMPT, &prompt, None)
            .await
        {
            Ok((response, _metadata)) => ComposeOutcome {
                response,
                rag_context: None,
                error: None,
            },
            Err(e) => {
                error!("Clarification generation failed: {}", e);
                ComposeOutcome {
                    response: CLARIFICATION_FAILURE_MESSAGE.to_string(),
                    rag_context: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

/// Surface the single most specific missing criteria field.
fn missing_field(criteria: Option<&FlightCriteria>) -> &'static str {
    match criteria {
        Some(c) if !c.has_destination() => "destination city",
        Some(c) if !c.has_origin() => "origin city or dates",
        _ => "travel details",
    }
}

fn merge_error(state: &mut TurnState, error: Option<String>) {
    if let Some(e) = error {
        state.error = Some(e);
    }
}

/// `final_response` is terminal for the turn: the first composer to set
/// it wins and later nodes cannot overwrite it.
fn apply_compose(state: &mut TurnState, outcome: ComposeOutcome) {
    if state.final_response.is_none() {
        state.final_response = Some(outcome.response);
    }
    if outcome.rag_context.is_some() {
        state.rag_context = outcome.rag_context;
    }
    merge_error(state, outcome.error);
}
