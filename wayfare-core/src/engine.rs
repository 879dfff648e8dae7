//! Filter/sort pipeline and the message protocol used to run it off the
//! caller's task.
//!
//! Everything here is synchronous and side-effect free so it can be called
//! directly in tests; `wayfare-results` layers the background worker on top.

use serde::{Deserialize, Serialize};
use tracing::debug;
use wayfare_shared::{CabinClass, Flight, SearchResults};

use crate::filter::FilterCriteria;
use crate::pricing::passes_availability_gate;
use crate::sort::{sort_flights, SortKey};

/// Which leg of a search the engine is asked to process
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    #[default]
    Outbound,
    Return,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    pub seq: u64,
    pub flights: SearchResults,
    #[serde(default)]
    pub filters: FilterCriteria,
    #[serde(default)]
    pub sort_by: SortKey,
    pub mode: SelectionMode,
    #[serde(default)]
    pub selected_cabin_class: CabinClass,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkerRequest {
    Process(ProcessRequest),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedResults {
    pub seq: u64,
    pub flights: SearchResults,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkerFailure {
    pub seq: u64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkerResponse {
    Results(ProcessedResults),
    Error(WorkerFailure),
}

impl WorkerRequest {
    pub fn seq(&self) -> u64 {
        match self {
            WorkerRequest::Process(req) => req.seq,
        }
    }
}

impl WorkerResponse {
    pub fn seq(&self) -> u64 {
        match self {
            WorkerResponse::Results(r) => r.seq,
            WorkerResponse::Error(e) => e.seq,
        }
    }

    pub fn failure(seq: u64, message: impl Into<String>) -> Self {
        WorkerResponse::Error(WorkerFailure { seq, message: message.into() })
    }
}

/// Availability gate, then filters, then a stable sort.
pub fn process_flights(
    flights: &[Flight],
    filters: &FilterCriteria,
    sort_by: SortKey,
    cabin: CabinClass,
) -> Vec<Flight> {
    let mut result: Vec<Flight> = flights
        .iter()
        .filter(|f| passes_availability_gate(f, cabin))
        .filter(|f| filters.matches(f))
        .cloned()
        .collect();
    sort_flights(&mut result, sort_by, cabin);
    result
}

/// Processes the list selected by `mode` and passes the other list through
/// untouched.
pub fn handle_request(request: &WorkerRequest) -> WorkerResponse {
    let WorkerRequest::Process(req) = request;

    if let Err(e) = req.filters.validate() {
        return WorkerResponse::failure(req.seq, e.to_string());
    }

    let cabin = req.selected_cabin_class;
    let flights = match req.mode {
        SelectionMode::Outbound => SearchResults {
            outbound_flights: process_flights(&req.flights.outbound_flights, &req.filters, req.sort_by, cabin),
            return_flights: req.flights.return_flights.clone(),
        },
        SelectionMode::Return => SearchResults {
            outbound_flights: req.flights.outbound_flights.clone(),
            return_flights: process_flights(&req.flights.return_flights, &req.filters, req.sort_by, cabin),
        },
    };

    debug!(
        seq = req.seq,
        mode = ?req.mode,
        outbound = flights.outbound_flights.len(),
        inbound = flights.return_flights.len(),
        "processed flight results"
    );

    WorkerResponse::Results(ProcessedResults { seq: req.seq, flights })
}

/// A return flight is bookable only if it leaves strictly after the outbound
/// flight lands. Unparsable timestamps make the pair invalid.
pub fn is_valid_return(outbound: &Flight, candidate: &Flight) -> bool {
    match (outbound.arrival_at(), candidate.departure_at()) {
        (Some(landed), Some(leaves)) => leaves > landed,
        _ => false,
    }
}

pub fn valid_returns(outbound: &Flight, returns: &[Flight]) -> Vec<Flight> {
    returns
        .iter()
        .filter(|candidate| is_valid_return(outbound, candidate))
        .cloned()
        .collect()
}
