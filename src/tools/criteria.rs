//! Structured flight-search criteria and their extraction from free text.

use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{EnumString, IntoStaticStr};
use thiserror::Error;
use tracing::{debug, warn};

use crate::llm::providers::base::{LlmProvider, LlmProviderError};

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("LLM generation failed: {0}")]
    Llm(#[from] LlmProviderError),

    #[error("Could not parse criteria from response: {0}")]
    Unparseable(#[from] serde_json::Error),
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, IntoStaticStr, Default,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum TripType {
    OneWay,
    #[default]
    RoundTrip,
    MultiCity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, IntoStaticStr)]
pub enum Alliance {
    #[serde(rename = "Star Alliance")]
    #[strum(serialize = "Star Alliance")]
    StarAlliance,
    #[serde(rename = "Oneworld")]
    #[strum(serialize = "Oneworld")]
    Oneworld,
    #[serde(rename = "SkyTeam")]
    #[strum(serialize = "SkyTeam")]
    SkyTeam,
}

impl Alliance {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

fn default_departure_date() -> String {
    "flexible".to_string()
}

/// Validated flight-search criteria. A non-empty destination is the sole
/// gate for running a search; everything else is optional narrowing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightCriteria {
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default = "default_departure_date")]
    pub departure_date: String,
    #[serde(default)]
    pub return_date: Option<String>,
    #[serde(default)]
    pub trip_type: TripType,
    #[serde(default)]
    pub alliance: Option<Alliance>,
    #[serde(default)]
    pub preferred_airlines: Option<Vec<String>>,
    #[serde(default)]
    pub avoid_overnight_layover: bool,
    #[serde(default)]
    pub max_layovers: Option<u32>,
    #[serde(default)]
    pub max_price_usd: Option<f64>,
    #[serde(default)]
    pub refundable_only: bool,
    #[serde(default)]
    pub flexible_dates: bool,
}

impl Default for FlightCriteria {
    fn default() -> Self {
        Self {
            origin: None,
            destination: None,
            departure_date: default_departure_date(),
            return_date: None,
            trip_type: TripType::default(),
            alliance: None,
            preferred_airlines: None,
            avoid_overnight_layover: false,
            max_layovers: None,
            max_price_usd: None,
            refundable_only: false,
            flexible_dates: false,
        }
    }
}

impl FlightCriteria {
    pub fn has_destination(&self) -> bool {
        self.destination
            .as_deref()
            .is_some_and(|d| !d.trim().is_empty())
    }

    pub fn has_origin(&self) -> bool {
        self.origin.as_deref().is_some_and(|o| !o.trim().is_empty())
    }

    /// Compact "field: value" listing of the populated criteria, for
    /// logs and transcripts.
    pub fn summary(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(origin) = self.origin.as_deref() {
            parts.push(format!("origin: {origin}"));
        }
        if let Some(destination) = self.destination.as_deref() {
            parts.push(format!("destination: {destination}"));
        }
        parts.push(format!("departure: {}", self.departure_date));
        if let Some(return_date) = self.return_date.as_deref() {
            parts.push(format!("return: {return_date}"));
        }
        if let Some(alliance) = self.alliance {
            parts.push(format!("alliance: {}", alliance.as_str()));
        }
        if let Some(airlines) = self.preferred_airlines.as_deref() {
            parts.push(format!("airlines: {}", airlines.join("/")));
        }
        if let Some(max_layovers) = self.max_layovers {
            parts.push(format!("max layovers: {max_layovers}"));
        }
        if let Some(max_price) = self.max_price_usd {
            parts.push(format!("max price: ${max_price:.0}"));
        }
        if self.avoid_overnight_layover {
            parts.push("no overnight layovers".to_string());
        }
        if self.refundable_only {
            parts.push("refundable only".to_string());
        }
        parts.join(", ")
    }

    /// Validate a raw JSON object into criteria, normalizing the sentinel
    /// values extraction models habitually emit: literal `"null"` strings,
    /// unknown trip types (defaulted to round-trip), unknown alliances
    /// (dropped) and null departure dates (mapped to `"flexible"`).
    pub fn from_json_value(mut value: Value) -> Result<Self, ExtractionError> {
        if let Some(obj) = value.as_object_mut() {
            for key in ["origin", "destination", "return_date"] {
                if matches!(obj.get(key), Some(v) if is_null_sentinel(v)) {
                    obj.insert(key.to_string(), Value::Null);
                }
            }
            if matches!(obj.get("departure_date"), Some(v) if is_null_sentinel(v)) {
                obj.insert(
                    "departure_date".to_string(),
                    Value::String(default_departure_date()),
                );
            }
            if let Some(v) = obj.get("trip_type").cloned() {
                if v.is_null() {
                    obj.remove("trip_type");
                } else if serde_json::from_value::<TripType>(v).is_err() {
                    obj.insert("trip_type".to_string(), Value::String("round-trip".to_string()));
                }
            }
            if let Some(v) = obj.get("alliance").cloned() {
                if !v.is_null() && serde_json::from_value::<Alliance>(v).is_err() {
                    obj.insert("alliance".to_string(), Value::Null);
                }
            }
        }
        Ok(serde_json::from_value(value)?)
    }
}

fn is_null_sentinel(value: &Value) -> bool {
    value.is_null() || value.as_str().is_some_and(|s| s == "null")
}

lazy_static! {
    static ref FENCED_JSON_RE: Regex =
        Regex::new(r"```(?:json)?\s*([\s\S]*?)```").expect("fenced json regex");
    static ref BRACE_RE: Regex =
        Regex::new(r"\{[^{}]*(?:\{[^{}]*\}[^{}]*)*\}").expect("brace regex");
}

/// Recover a JSON object fragment from verbose LLM output. Strategies in
/// order: fenced code block, balanced-brace scan, first-`{`-to-last-`}`
/// slice. `None` when the text holds no candidate at all.
pub fn recover_json_fragment(text: &str) -> Option<String> {
    if let Some(caps) = FENCED_JSON_RE.captures(text) {
        return Some(caps[1].trim().to_string());
    }
    if let Some(found) = BRACE_RE.find(text) {
        return Some(found.as_str().to_string());
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(text[start..=end].to_string())
    } else {
        None
    }
}

const EXTRACTION_SYSTEM_PROMPT: &str = r#"You are a flight search parameter extractor.

Extract structured flight search criteria from the user's natural language query.

**Output Format** (JSON only, no explanations):
{
  "origin": "city name or null if not specified",
  "destination": "city name (REQUIRED)",
  "departure_date": "YYYY-MM-DD or 'flexible' or date range like '2024-08-01 to 2024-08-15'",
  "return_date": "YYYY-MM-DD or null for one-way",
  "trip_type": "round-trip or one-way",
  "alliance": "Star Alliance | Oneworld | SkyTeam | null",
  "preferred_airlines": ["airline1", "airline2"] or null,
  "avoid_overnight_layover": true or false,
  "max_layovers": number or null,
  "max_price_usd": number or null,
  "refundable_only": true or false,
  "flexible_dates": true or false
}

**Use the full conversation to resolve references** (e.g. if the user said
"I want to travel" and then "london", the destination is London)."#;

fn build_extraction_prompt(query: &str, conversation_context: &str) -> String {
    format!("{conversation_context}Latest user message: {query}\n\n**JSON Output:**")
}

/// Turns a user query plus conversation context into [`FlightCriteria`]
/// with one LLM call. Parse failures propagate so the caller can ask the
/// user for clarification instead of searching on garbage.
pub struct CriteriaExtractor {
    llm: Arc<dyn LlmProvider>,
}

impl CriteriaExtractor {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    pub async fn extract(
        &self,
        query: &str,
        conversation_context: &str,
    ) -> Result<FlightCriteria, ExtractionError> {
        let prompt = build_extraction_prompt(query, conversation_context);
        let (response, _metadata) = self
            .llm
            .generate(EXTRACTION_SYSTEM_PROMPT, &prompt, Some("json_object"))
            .await?;
        let response = response.trim();

        let fragment =
            recover_json_fragment(response).unwrap_or_else(|| response.to_string());
        let parsed: Value = serde_json::from_str(&fragment).inspect_err(|e| {
            warn!("Criteria JSON parse failed: {}", e);
        })?;

        let criteria = FlightCriteria::from_json_value(parsed)?;
        debug!("Extracted criteria: {:?}", criteria);
        Ok(criteria)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::llm::providers::base::LlmMetadata;

    struct CannedProvider {
        response: String,
    }

    #[async_trait]
    impl LlmProvider for CannedProvider {
        async fn generate(
            &self,
            _system_prompt: &str,
            _user_prompt: &str,
            _response_format: Option<&str>,
        ) -> Result<(String, LlmMetadata), LlmProviderError> {
            Ok((self.response.clone(), LlmMetadata::default()))
        }

        fn provider_name(&self) -> &str {
            "canned"
        }

        fn model_name(&self) -> &str {
            "canned"
        }
    }

    #[test]
    fn test_recover_fenced_block() {
        let text = "Here you go:\n```json\n{\"destination\": \"Tokyo\"}\n```\nDone.";
        assert_eq!(
            recover_json_fragment(text).unwrap(),
            "{\"destination\": \"Tokyo\"}"
        );
    }

    #[test]
    fn test_recover_embedded_object() {
        let text = "Sure! {\"destination\": \"Tokyo\", \"max_layovers\": 1} hope that helps";
        let fragment = recover_json_fragment(text).unwrap();
        let value: Value = serde_json::from_str(&fragment).unwrap();
        assert_eq!(value["destination"], "Tokyo");
    }

    #[test]
    fn test_recover_none_without_braces() {
        assert_eq!(recover_json_fragment("no json here"), None);
    }

    #[test]
    fn test_null_string_sentinels() {
        let value = serde_json::json!({
            "origin": "null",
            "destination": "Paris",
            "departure_date": null,
            "return_date": "null"
        });
        let criteria = FlightCriteria::from_json_value(value).unwrap();
        assert_eq!(criteria.origin, None);
        assert_eq!(criteria.destination.as_deref(), Some("Paris"));
        assert_eq!(criteria.departure_date, "flexible");
        assert_eq!(criteria.return_date, None);
    }

    #[test]
    fn test_invalid_trip_type_defaults_to_round_trip() {
        let value = serde_json::json!({
            "destination": "Paris",
            "trip_type": "circular",
            "alliance": "Sky Alliance"
        });
        let criteria = FlightCriteria::from_json_value(value).unwrap();
        assert_eq!(criteria.trip_type, TripType::RoundTrip);
        assert_eq!(criteria.alliance, None);
    }

    #[test]
    fn test_criteria_round_trip() {
        let criteria = FlightCriteria {
            origin: Some("Singapore".to_string()),
            destination: Some("Tokyo".to_string()),
            departure_date: "2024-08-01 to 2024-08-31".to_string(),
            return_date: Some("2024-09-05".to_string()),
            trip_type: TripType::RoundTrip,
            alliance: Some(Alliance::StarAlliance),
            preferred_airlines: Some(vec!["ANA".to_string()]),
            avoid_overnight_layover: true,
            max_layovers: Some(1),
            max_price_usd: Some(900.0),
            refundable_only: true,
            flexible_dates: true,
        };
        let value = serde_json::to_value(&criteria).unwrap();
        let reparsed = FlightCriteria::from_json_value(value).unwrap();
        assert_eq!(reparsed, criteria);
    }

    #[test]
    fn test_alliance_wire_names() {
        let value = serde_json::json!({"destination": "Paris", "alliance": "Star Alliance"});
        let criteria = FlightCriteria::from_json_value(value).unwrap();
        assert_eq!(criteria.alliance, Some(Alliance::StarAlliance));
        assert_eq!(Alliance::StarAlliance.as_str(), "Star Alliance");
    }

    #[test]
    fn test_summary_lists_populated_fields() {
        let criteria = FlightCriteria {
            destination: Some("Tokyo".to_string()),
            alliance: Some(Alliance::StarAlliance),
            max_price_usd: Some(900.0),
            refundable_only: true,
            ..FlightCriteria::default()
        };
        assert_eq!(
            criteria.summary(),
            "destination: Tokyo, departure: flexible, alliance: Star Alliance, \
             max price: $900, refundable only"
        );
    }

    #[test]
    fn test_has_destination_blank() {
        let mut criteria = FlightCriteria::default();
        assert!(!criteria.has_destination());
        criteria.destination = Some("   ".to_string());
        assert!(!criteria.has_destination());
        criteria.destination = Some("Tokyo".to_string());
        assert!(criteria.has_destination());
    }

    #[tokio::test]
    async fn test_extract_from_verbose_response() {
        let provider = CannedProvider {
            response: "Here are the criteria:\n```json\n{\"destination\": \"Tokyo\", \
                       \"departure_date\": \"2024-08-01 to 2024-08-31\", \
                       \"alliance\": \"Star Alliance\", \"avoid_overnight_layover\": true}\n```"
                .to_string(),
        };
        let extractor = CriteriaExtractor::new(Arc::new(provider));
        let criteria = extractor.extract("round trip to Tokyo in August", "").await.unwrap();
        assert_eq!(criteria.destination.as_deref(), Some("Tokyo"));
        assert!(criteria.avoid_overnight_layover);
        assert_eq!(criteria.alliance, Some(Alliance::StarAlliance));
    }

    #[tokio::test]
    async fn test_extract_unparseable_fails() {
        let provider = CannedProvider {
            response: "I could not determine the criteria, sorry.".to_string(),
        };
        let extractor = CriteriaExtractor::new(Arc::new(provider));
        let result = extractor.extract("???", "").await;
        assert!(matches!(result, Err(ExtractionError::Unparseable(_))));
    }
}
