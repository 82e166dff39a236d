//! Static flight catalog, loaded once at startup and read-only afterwards.

pub mod dates;

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

pub use dates::{DateWindow, parse_date, parse_date_or_range};

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read catalog file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Malformed catalog file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("Catalog is empty: {0}")]
    Empty(String),
}

/// Wire form of a catalog row. The upstream feed names the endpoints
/// `from`/`to`; `overnight_layover` may be absent and is derived on load.
#[derive(Debug, Deserialize)]
struct FlightRow {
    airline: String,
    #[serde(default)]
    alliance: Option<String>,
    #[serde(alias = "from")]
    origin: String,
    #[serde(alias = "to")]
    destination: String,
    departure_date: String,
    #[serde(default)]
    return_date: Option<String>,
    #[serde(default)]
    layovers: Vec<String>,
    price_usd: f64,
    #[serde(default)]
    refundable: bool,
    #[serde(default)]
    overnight_layover: Option<bool>,
}

/// A single flight listing. Immutable for the process lifetime; search
/// results carry scores alongside clones of these records rather than
/// writing into them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flight {
    pub airline: String,
    pub alliance: Option<String>,
    pub origin: String,
    pub destination: String,
    pub departure_date: String,
    pub return_date: Option<String>,
    pub layovers: Vec<String>,
    pub price_usd: f64,
    pub refundable: bool,
    pub overnight_layover: bool,
}

impl Flight {
    /// One-line display form for logs and transcripts.
    pub fn summary(&self) -> String {
        format!(
            "{} | {} -> {} | Dep: {} | ${:.0}",
            self.airline, self.origin, self.destination, self.departure_date, self.price_usd
        )
    }
}

impl From<FlightRow> for Flight {
    fn from(row: FlightRow) -> Self {
        // Rows without an explicit flag: more than one layover implies an
        // overnight connection somewhere.
        let overnight = row.overnight_layover.unwrap_or(row.layovers.len() > 1);
        Self {
            airline: row.airline,
            alliance: row.alliance,
            origin: row.origin,
            destination: row.destination,
            departure_date: row.departure_date,
            return_date: row.return_date,
            layovers: row.layovers,
            price_usd: row.price_usd,
            refundable: row.refundable,
            overnight_layover: overnight,
        }
    }
}

/// The in-memory flight catalog.
#[derive(Debug, Clone)]
pub struct FlightCatalog {
    flights: Vec<Flight>,
}

impl FlightCatalog {
    /// Load from a JSON file. Any malformed row or an empty catalog is
    /// fatal: there is nothing to search without listings.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_json(&raw).map_err(|e| match e {
            CatalogError::Parse { source, .. } => CatalogError::Parse {
                path: path.display().to_string(),
                source,
            },
            CatalogError::Empty(_) => CatalogError::Empty(path.display().to_string()),
            other => other,
        })?;
        info!("Loaded {} flights from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    /// Parse catalog rows from a JSON array string.
    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let rows: Vec<FlightRow> =
            serde_json::from_str(raw).map_err(|source| CatalogError::Parse {
                path: "<inline>".to_string(),
                source,
            })?;
        if rows.is_empty() {
            return Err(CatalogError::Empty("<inline>".to_string()));
        }
        Ok(Self {
            flights: rows.into_iter().map(Flight::from).collect(),
        })
    }

    pub fn flights(&self) -> &[Flight] {
        &self.flights
    }

    pub fn len(&self) -> usize {
        self.flights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }
}
