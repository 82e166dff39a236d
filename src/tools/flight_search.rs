//! Filters and ranks the in-memory flight catalog against structured
//! criteria. No stage ever errors on "no matches": an empty vector is the
//! valid no-results signal.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::{Flight, FlightCatalog, parse_date, parse_date_or_range};
use super::criteria::FlightCriteria;

/// A catalog record paired with its per-search relevance score. Scores
/// live here rather than on the shared [`Flight`] records so concurrent
/// searches never write into catalog memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredFlight {
    #[serde(flatten)]
    pub flight: Flight,
    pub match_score: f64,
}

pub struct FlightSearchEngine {
    catalog: Arc<FlightCatalog>,
}

impl FlightSearchEngine {
    pub fn new(catalog: Arc<FlightCatalog>) -> Self {
        info!("Flight search engine ready ({} listings)", catalog.len());
        Self { catalog }
    }

    /// Run the filter pipeline and rank the survivors. A missing or blank
    /// destination short-circuits to an empty result before any other
    /// field is looked at.
    pub fn search(&self, criteria: &FlightCriteria) -> Vec<ScoredFlight> {
        let Some(destination) = criteria
            .destination
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
        else {
            return Vec::new();
        };

        let destination = destination.to_lowercase();
        let mut results: Vec<&Flight> = self
            .catalog
            .flights()
            .iter()
            .filter(|f| f.destination.to_lowercase() == destination)
            .collect();

        if let Some(window) = parse_date_or_range(&criteria.departure_date) {
            results.retain(|f| {
                parse_date(&f.departure_date).is_some_and(|d| window.contains(d))
            });
        }
        if let Some(window) = criteria
            .return_date
            .as_deref()
            .and_then(parse_date_or_range)
        {
            // One-way flights never satisfy a return-date constraint.
            results.retain(|f| {
                f.return_date
                    .as_deref()
                    .and_then(parse_date)
                    .is_some_and(|d| window.contains(d))
            });
        }
        if let Some(origin) = criteria.origin.as_deref().map(str::trim).filter(|o| !o.is_empty()) {
            let origin = origin.to_lowercase();
            results.retain(|f| f.origin.to_lowercase() == origin);
        }
        if let Some(alliance) = criteria.alliance {
            results.retain(|f| f.alliance.as_deref() == Some(alliance.as_str()));
        }
        if let Some(airlines) = criteria.preferred_airlines.as_deref() {
            let airlines: Vec<String> = airlines.iter().map(|a| a.to_lowercase()).collect();
            results.retain(|f| airlines.contains(&f.airline.to_lowercase()));
        }
        if criteria.avoid_overnight_layover {
            results.retain(|f| !f.overnight_layover);
        }
        if let Some(max_layovers) = criteria.max_layovers {
            results.retain(|f| f.layovers.len() <= max_layovers as usize);
        }
        if let Some(max_price) = criteria.max_price_usd {
            results.retain(|f| f.price_usd <= max_price);
        }
        if criteria.refundable_only {
            results.retain(|f| f.refundable);
        }

        let ranked = rank_flights(results, criteria);
        debug!("Found {} flights matching criteria", ranked.len());
        ranked
    }
}

/// Score the filtered set and sort it descending. The sort is stable, so
/// equal scores keep catalog order and identical inputs always produce
/// identical output.
fn rank_flights(flights: Vec<&Flight>, criteria: &FlightCriteria) -> Vec<ScoredFlight> {
    if flights.is_empty() {
        return Vec::new();
    }
    let max_price = flights
        .iter()
        .map(|f| f.price_usd)
        .fold(f64::NEG_INFINITY, f64::max);

    let mut scored: Vec<ScoredFlight> = flights
        .into_iter()
        .map(|flight| {
            let layover_count = flight.layovers.len();
            let mut score = ((3 - layover_count.min(3)) * 10) as f64;
            if layover_count == 0 {
                score += 15.0;
            }
            if max_price > 0.0 {
                score += (((max_price - flight.price_usd) / max_price) * 20.0).max(0.0);
            }
            if flight.refundable {
                score += 5.0;
            }
            if let Some(alliance) = criteria.alliance {
                if flight.alliance.as_deref() == Some(alliance.as_str()) {
                    score += 8.0;
                }
            }
            ScoredFlight {
                flight: flight.clone(),
                match_score: (score * 100.0).round() / 100.0,
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.match_score
            .partial_cmp(&a.match_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::criteria::Alliance;

    fn fixture_catalog() -> Arc<FlightCatalog> {
        Arc::new(
            FlightCatalog::from_json(
                r#"[
          {"airline": "ANA", "alliance": "Star Alliance", "from": "Singapore",
           "to": "Tokyo", "departure_date": "2024-08-15", "return_date": "2024-08-29",
           "layovers": [], "price_usd": 600.0, "refundable": false},
          {"airline": "Qatar Airways", "alliance": "Oneworld", "from": "Singapore",
           "to": "Tokyo", "departure_date": "2024-08-15", "return_date": "2024-08-29",
           "layovers": ["Doha"], "price_usd": 400.0, "refundable": true},
          {"airline": "Delta", "alliance": "SkyTeam", "from": "Seoul",
           "to": "Tokyo", "departure_date": "2024-09-01",
           "layovers": [], "price_usd": 200.0, "refundable": false},
          {"airline": "Lufthansa", "alliance": "Star Alliance", "from": "Singapore",
           "to": "Paris", "departure_date": "2024-08-20", "return_date": "2024-09-03",
           "layovers": ["Frankfurt", "Munich"], "price_usd": 900.0, "refundable": true},
          {"airline": "Mystery Air", "from": "Singapore", "to": "Tokyo",
           "departure_date": "someday", "layovers": [], "price_usd": 100.0}
        ]"#,
            )
            .unwrap(),
        )
    }

    fn criteria_for(destination: &str) -> FlightCriteria {
        FlightCriteria {
            destination: Some(destination.to_string()),
            ..FlightCriteria::default()
        }
    }

    #[test]
    fn test_blank_destination_short_circuits() {
        let engine = FlightSearchEngine::new(fixture_catalog());
        let mut criteria = FlightCriteria {
            destination: None,
            // Deliberately impossible constraints that would otherwise
            // empty the set only after other filters ran.
            max_price_usd: Some(-1.0),
            max_layovers: Some(0),
            ..FlightCriteria::default()
        };
        assert!(engine.search(&criteria).is_empty());
        criteria.destination = Some("   ".to_string());
        assert!(engine.search(&criteria).is_empty());
    }

    #[test]
    fn test_destination_match_is_case_insensitive() {
        let engine = FlightSearchEngine::new(fixture_catalog());
        let results = engine.search(&criteria_for("tokyo"));
        assert!(!results.is_empty());
        assert!(results.iter().all(|r| r.flight.destination == "Tokyo"));
    }

    #[test]
    fn test_departure_date_range_membership() {
        let engine = FlightSearchEngine::new(fixture_catalog());
        let mut criteria = criteria_for("Tokyo");
        criteria.departure_date = "2024-08-01 to 2024-08-31".to_string();
        let results = engine.search(&criteria);
        // 2024-08-15 flights retained; 2024-09-01 excluded; the
        // unparseable "someday" candidate dropped.
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.flight.departure_date == "2024-08-15"));
    }

    #[test]
    fn test_flexible_sentinel_bypasses_date_filter() {
        let engine = FlightSearchEngine::new(fixture_catalog());
        let mut criteria = criteria_for("Tokyo");
        criteria.departure_date = "Flexible".to_string();
        // All four Tokyo flights survive, including the unparseable one.
        assert_eq!(engine.search(&criteria).len(), 4);
    }

    #[test]
    fn test_return_filter_drops_one_way() {
        let engine = FlightSearchEngine::new(fixture_catalog());
        let mut criteria = criteria_for("Tokyo");
        criteria.return_date = Some("2024-08-25 to 2024-08-31".to_string());
        let results = engine.search(&criteria);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.flight.return_date.is_some()));
    }

    #[test]
    fn test_optional_filters() {
        let engine = FlightSearchEngine::new(fixture_catalog());

        let mut criteria = criteria_for("Tokyo");
        criteria.origin = Some("singapore".to_string());
        assert!(engine.search(&criteria).iter().all(|r| r.flight.origin == "Singapore"));

        let mut criteria = criteria_for("Tokyo");
        criteria.alliance = Some(Alliance::Oneworld);
        let results = engine.search(&criteria);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].flight.airline, "Qatar Airways");

        let mut criteria = criteria_for("Tokyo");
        criteria.preferred_airlines = Some(vec!["ana".to_string(), "delta".to_string()]);
        assert_eq!(engine.search(&criteria).len(), 2);

        let mut criteria = criteria_for("Paris");
        criteria.avoid_overnight_layover = true;
        assert!(engine.search(&criteria).is_empty());

        let mut criteria = criteria_for("Tokyo");
        criteria.max_layovers = Some(0);
        assert!(engine.search(&criteria).iter().all(|r| r.flight.layovers.is_empty()));

        let mut criteria = criteria_for("Tokyo");
        criteria.max_price_usd = Some(300.0);
        assert!(engine.search(&criteria).iter().all(|r| r.flight.price_usd <= 300.0));

        let mut criteria = criteria_for("Tokyo");
        criteria.refundable_only = true;
        let results = engine.search(&criteria);
        assert_eq!(results.len(), 1);
        assert!(results[0].flight.refundable);
    }

    #[test]
    fn test_relative_price_ranking() {
        let catalog = Arc::new(
            FlightCatalog::from_json(
                r#"[
          {"airline": "A", "from": "X", "to": "Rome", "departure_date": "2024-08-10",
           "layovers": [], "price_usd": 200.0},
          {"airline": "B", "from": "X", "to": "Rome", "departure_date": "2024-08-10",
           "layovers": [], "price_usd": 400.0},
          {"airline": "C", "from": "X", "to": "Rome", "departure_date": "2024-08-10",
           "layovers": [], "price_usd": 600.0}
        ]"#,
            )
            .unwrap(),
        );
        let engine = FlightSearchEngine::new(catalog);
        let results = engine.search(&criteria_for("Rome"));
        let airlines: Vec<&str> =
            results.iter().map(|r| r.flight.airline.as_str()).collect();
        // Identical except for price: cheapest wins the discount bonus.
        assert_eq!(airlines, vec!["A", "B", "C"]);
        assert!(results[0].match_score > results[1].match_score);
        assert!(results[1].match_score > results[2].match_score);
        // Base 30 + direct 15; the most expensive gets no discount.
        assert_eq!(results[2].match_score, 45.0);
    }

    #[test]
    fn test_alliance_bonus_applies_to_ranking() {
        let engine = FlightSearchEngine::new(fixture_catalog());
        let mut criteria = criteria_for("Tokyo");
        criteria.departure_date = "2024-08-15".to_string();
        criteria.alliance = Some(Alliance::StarAlliance);
        let results = engine.search(&criteria);
        assert_eq!(results.len(), 1);
        // 30 (zero of three layovers) + 15 (direct) + 0 (priciest) + 8 (alliance).
        assert_eq!(results[0].match_score, 53.0);
    }

    #[test]
    fn test_search_is_deterministic() {
        let engine = FlightSearchEngine::new(fixture_catalog());
        let mut criteria = criteria_for("Tokyo");
        criteria.departure_date = "flexible".to_string();
        let first = engine.search(&criteria);
        let second = engine.search(&criteria);
        let order =
            |results: &[ScoredFlight]| -> Vec<String> {
                results.iter().map(|r| r.flight.airline.clone()).collect()
            };
        assert_eq!(order(&first), order(&second));
        let scores = |results: &[ScoredFlight]| -> Vec<f64> {
            results.iter().map(|r| r.match_score).collect()
        };
        assert_eq!(scores(&first), scores(&second));
    }

    #[test]
    fn test_ties_keep_catalog_order() {
        let catalog = Arc::new(
            FlightCatalog::from_json(
                r#"[
          {"airline": "First", "from": "X", "to": "Rome", "departure_date": "2024-08-10",
           "layovers": [], "price_usd": 300.0},
          {"airline": "Second", "from": "X", "to": "Rome", "departure_date": "2024-08-10",
           "layovers": [], "price_usd": 300.0}
        ]"#,
            )
            .unwrap(),
        );
        let engine = FlightSearchEngine::new(catalog);
        let results = engine.search(&criteria_for("Rome"));
        assert_eq!(results[0].flight.airline, "First");
        assert_eq!(results[1].flight.airline, "Second");
    }
}
