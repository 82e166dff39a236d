pub mod criteria;
pub mod flight_search;
pub mod rag;

pub use criteria::{Alliance, CriteriaExtractor, ExtractionError, FlightCriteria, TripType};
pub use flight_search::{FlightSearchEngine, ScoredFlight};
pub use rag::{NO_INFO_MESSAGE, RagResult, RagTool};
