//! Prompt constants and builders for the routing graph's LLM calls.

pub const INTENT_SYSTEM_PROMPT: &str = r#"You are an intent classifier for a travel assistant.

Classify the user's query into ONE of these categories:

1. **FLIGHT_SEARCH** - User wants to find, search, or compare flights
   Examples: "find flights to Tokyo", "show me cheap options to Paris"

2. **VISA_QUERY** - Questions about visa requirements, entry rules, passport validity
   Examples: "do I need a visa for Japan?", "visa requirements for France"

3. **POLICY_QUERY** - Questions about refunds, cancellations, baggage, policies
   Examples: "can I cancel my ticket?", "what's the baggage allowance?"

4. **GENERAL_TRAVEL** - General travel questions, recommendations, tips
   Examples: "best time to visit Tokyo", "what to pack for winter travel"

5. **CLARIFICATION_NEEDED** - Query is too ambiguous or needs more information
   Examples: "help me", "I want to travel", "tell me about flights"

**IMPORTANT**: Respond with ONLY the category name, nothing else."#;

pub fn build_intent_prompt(query: &str, conversation_context: &str) -> String {
    format!("{conversation_context}Latest user message: {query}\n\nClassification:")
}

pub const RESULTS_SYSTEM_PROMPT: &str =
    "You are a travel assistant presenting flight search results.";

pub fn build_results_prompt(criteria_json: &str, results_json: &str, count: usize) -> String {
    format!(
        r#"Format these flight search results into a user-friendly response.

**Search Criteria:**
{criteria_json}

**Found Flights:**
{results_json}

**Instructions:**
1. Start with a brief summary (e.g., "I found {count} flights matching your criteria")
2. Present each flight clearly with:
   - Airline and alliance
   - Route (from to destination)
   - Dates
   - Price
   - Layover information
   - Refundability
3. Highlight the best option based on criteria
4. End with a helpful suggestion or question

**Format:**"#
    )
}

pub fn build_no_results_prompt(criteria_json: &str) -> String {
    format!(
        r#"Generate a helpful response when no flights match the criteria.

**Search Criteria:**
{criteria_json}

**Instructions:**
1. Politely inform no exact matches were found
2. Suggest relaxing specific constraints (dates, alliance, layovers, price)
3. Offer to search with modified criteria
4. Keep tone positive and solution-oriented

**Response:**"#
    )
}

pub const CLARIFICATION_SYSTEM_PROMPT: &str =
    "You are a travel assistant gathering missing trip details.";

pub fn build_clarification_prompt(
    query: &str,
    missing_fields: &str,
    conversation_context: &str,
) -> String {
    format!(
        r#"Generate a clarification question to gather missing information.

**User's message:** {query}

**Missing information:** {missing_fields}

**Conversation so far:**
{conversation_context}

Ask one short, friendly question for the missing information only."#
    )
}
