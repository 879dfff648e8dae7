use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use wayfare_core::{
    valid_returns, FilterCriteria, ProcessRequest, SelectionMode, SortKey, WorkerRequest, WorkerResponse,
};
use wayfare_shared::{CabinClass, Flight, SearchResults, TripType};

use crate::{ResultsError, ResultsResult};

/// Where the traveller is in picking flights
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    /// One-way search: a single list, picking a flight completes the itinerary
    SingleList,
    SelectingOutbound,
    SelectingReturn { outbound: Flight },
    Done(Itinerary),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Itinerary {
    pub outbound: Flight,
    pub inbound: Option<Flight>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Outbound recorded; return flights are being processed
    AwaitingReturn { seq: u64 },
    Complete(Itinerary),
}

/// Owns the result-list state and keeps the displayed list in step with it
/// through the engine worker.
///
/// Every change submits one request tagged with the next sequence number.
/// Responses are applied only when newer than anything already applied, so a
/// slow response can never overwrite a fresher one. After a phase change
/// nothing is visible or selectable until the first response built for the
/// new phase arrives.
pub struct ResultCoordinator {
    requests: mpsc::Sender<WorkerRequest>,
    results: SearchResults,
    filters: FilterCriteria,
    sort_by: SortKey,
    cabin: CabinClass,
    phase: Phase,
    next_seq: u64,
    applied_seq: u64,
    /// First seq submitted under the current phase
    phase_seq: u64,
    displayed: SearchResults,
    last_error: Option<String>,
}

impl ResultCoordinator {
    pub fn new(requests: mpsc::Sender<WorkerRequest>) -> Self {
        Self {
            requests,
            results: SearchResults::default(),
            filters: FilterCriteria::default(),
            sort_by: SortKey::default(),
            cabin: CabinClass::default(),
            phase: Phase::SingleList,
            next_seq: 1,
            applied_seq: 0,
            phase_seq: 0,
            displayed: SearchResults::default(),
            last_error: None,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn filters(&self) -> &FilterCriteria {
        &self.filters
    }

    pub fn sort_by(&self) -> SortKey {
        self.sort_by
    }

    pub fn cabin_class(&self) -> CabinClass {
        self.cabin
    }

    /// Processed results for the current phase. Only the leg being chosen
    /// is populated; the other leg is always empty.
    pub fn displayed(&self) -> &SearchResults {
        &self.displayed
    }

    /// The list the traveller is currently choosing from. Empty while the
    /// current phase has no processed results yet.
    pub fn visible(&self) -> &[Flight] {
        if !self.phase_ready() {
            return &[];
        }
        match self.phase {
            Phase::SelectingReturn { .. } => &self.displayed.return_flights,
            Phase::Done(_) => &[],
            _ => &self.displayed.outbound_flights,
        }
    }

    fn phase_ready(&self) -> bool {
        self.applied_seq >= self.phase_seq
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn latest_seq(&self) -> u64 {
        self.next_seq - 1
    }

    pub fn applied_seq(&self) -> u64 {
        self.applied_seq
    }

    pub fn is_pending(&self) -> bool {
        self.applied_seq < self.latest_seq()
    }

    // ========================================================================
    // State changes, each followed by one submission
    // ========================================================================

    /// Replaces the result set and restarts selection.
    pub async fn new_search(&mut self, results: SearchResults, trip_type: TripType) -> ResultsResult<u64> {
        self.phase = match trip_type {
            TripType::RoundTrip => Phase::SelectingOutbound,
            TripType::OneWay => Phase::SingleList,
        };
        info!(
            outbound = results.outbound_flights.len(),
            inbound = results.return_flights.len(),
            %trip_type,
            "New search results"
        );
        self.results = results;
        self.last_error = None;
        self.submit_phase().await
    }

    /// Invalid criteria are rejected here and never reach the engine.
    pub async fn set_filters(&mut self, filters: FilterCriteria) -> ResultsResult<u64> {
        filters.validate()?;
        self.filters = filters;
        self.submit().await
    }

    pub async fn set_sort(&mut self, sort_by: SortKey) -> ResultsResult<u64> {
        self.sort_by = sort_by;
        self.submit().await
    }

    pub async fn set_cabin_class(&mut self, cabin: CabinClass) -> ResultsResult<u64> {
        self.cabin = cabin;
        self.submit().await
    }

    /// Picks a flight from the visible list.
    pub async fn select(&mut self, flight_id: &str) -> ResultsResult<Selection> {
        if matches!(self.phase, Phase::Done(_)) {
            return Err(ResultsError::SelectionComplete);
        }
        if !self.phase_ready() {
            return Err(ResultsError::ResultsPending);
        }
        let flight = self
            .visible()
            .iter()
            .find(|f| f.id == flight_id)
            .cloned()
            .ok_or_else(|| ResultsError::UnknownFlight(flight_id.to_string()))?;

        match std::mem::replace(&mut self.phase, Phase::SingleList) {
            Phase::SingleList => {
                let itinerary = Itinerary { outbound: flight, inbound: None };
                self.phase = Phase::Done(itinerary.clone());
                Ok(Selection::Complete(itinerary))
            }
            Phase::SelectingOutbound => {
                info!(flight_id, "Outbound selected");
                self.phase = Phase::SelectingReturn { outbound: flight };
                let seq = self.submit_phase().await?;
                Ok(Selection::AwaitingReturn { seq })
            }
            Phase::SelectingReturn { outbound } => {
                info!(flight_id, "Return selected");
                let itinerary = Itinerary { outbound, inbound: Some(flight) };
                self.phase = Phase::Done(itinerary.clone());
                Ok(Selection::Complete(itinerary))
            }
            done @ Phase::Done(_) => {
                self.phase = done;
                Err(ResultsError::SelectionComplete)
            }
        }
    }

    pub async fn back_to_outbound(&mut self) -> ResultsResult<u64> {
        if !matches!(self.phase, Phase::SelectingReturn { .. }) {
            return Err(ResultsError::NotSelectingReturn);
        }
        self.phase = Phase::SelectingOutbound;
        self.submit_phase().await
    }

    // ========================================================================
    // Worker exchange
    // ========================================================================

    fn build_request(&self, seq: u64) -> WorkerRequest {
        let (mode, flights) = match &self.phase {
            Phase::SelectingReturn { outbound } => (
                SelectionMode::Return,
                SearchResults {
                    outbound_flights: self.results.outbound_flights.clone(),
                    return_flights: valid_returns(outbound, &self.results.return_flights),
                },
            ),
            _ => (SelectionMode::Outbound, self.results.clone()),
        };
        WorkerRequest::Process(ProcessRequest {
            seq,
            flights,
            filters: self.filters.clone(),
            sort_by: self.sort_by,
            mode,
            selected_cabin_class: self.cabin,
        })
    }

    /// First submission after a phase change. Drops whatever was displayed
    /// for the previous phase.
    async fn submit_phase(&mut self) -> ResultsResult<u64> {
        self.displayed = SearchResults::default();
        self.phase_seq = self.next_seq;
        self.submit().await
    }

    /// Sends the current state to the engine under a fresh sequence number.
    pub async fn submit(&mut self) -> ResultsResult<u64> {
        let seq = self.next_seq;
        self.next_seq += 1;
        let request = self.build_request(seq);
        debug!(seq, "Submitting engine request");
        self.requests.send(request).await.map_err(|_| ResultsError::WorkerGone)?;
        Ok(seq)
    }

    /// Applies a response unless something newer was already applied.
    /// Returns whether it was applied.
    pub fn apply_response(&mut self, response: WorkerResponse) -> bool {
        let seq = response.seq();
        if seq <= self.applied_seq {
            debug!(seq, applied = self.applied_seq, "Discarding stale engine response");
            return false;
        }
        self.applied_seq = seq;

        if seq < self.phase_seq {
            debug!(seq, phase_seq = self.phase_seq, "Dropping response built for an earlier phase");
            return true;
        }

        match response {
            WorkerResponse::Results(results) => {
                // The engine passes the other leg through unprocessed
                let SearchResults { outbound_flights, return_flights } = results.flights;
                self.displayed = match self.phase {
                    Phase::SelectingReturn { .. } => SearchResults { outbound_flights: Vec::new(), return_flights },
                    _ => SearchResults { outbound_flights, return_flights: Vec::new() },
                };
                self.last_error = None;
            }
            WorkerResponse::Error(failure) => {
                warn!(seq, message = %failure.message, "Engine reported an error");
                self.last_error = Some(failure.message);
            }
        }
        true
    }

    /// Applies responses until the latest submission has been answered.
    pub async fn settle(&mut self, responses: &mut mpsc::Receiver<WorkerResponse>) -> ResultsResult<()> {
        while self.is_pending() {
            let response = responses.recv().await.ok_or(ResultsError::WorkerGone)?;
            self.apply_response(response);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::EngineWorker;
    use wayfare_core::handle_request;

    fn flight(id: &str, price: f64, dep: &str, arr: &str) -> Flight {
        Flight {
            id: id.to_string(),
            departure_time: dep.to_string(),
            arrival_time: arr.to_string(),
            economy_capacity: Some(80),
            economy_price: Some(price),
            ..Default::default()
        }
    }

    fn ids(flights: &[Flight]) -> Vec<&str> {
        flights.iter().map(|f| f.id.as_str()).collect()
    }

    fn round_trip() -> SearchResults {
        SearchResults {
            outbound_flights: vec![
                flight("OUT-LATE", 200.0, "2024-12-25T15:00:00Z", "2024-12-25T19:00:00Z"),
                flight("OUT-EARLY", 300.0, "2024-12-25T06:00:00Z", "2024-12-25T10:00:00Z"),
            ],
            return_flights: vec![
                flight("RET-BEFORE", 50.0, "2024-12-25T09:00:00Z", "2024-12-25T11:00:00Z"),
                flight("RET-AT-ARRIVAL", 60.0, "2024-12-25T19:00:00Z", "2024-12-25T23:00:00Z"),
                flight("RET-AFTER", 150.0, "2024-12-26T08:00:00Z", "2024-12-26T12:00:00Z"),
                flight("RET-NEXT-WEEK", 90.0, "2025-01-01T08:00:00Z", "2025-01-01T12:00:00Z"),
            ],
        }
    }

    /// A coordinator wired to a channel the test answers by hand.
    fn detached() -> (ResultCoordinator, mpsc::Receiver<WorkerRequest>) {
        let (tx, rx) = mpsc::channel(16);
        (ResultCoordinator::new(tx), rx)
    }

    #[tokio::test]
    async fn test_out_of_order_responses_keep_latest() {
        let (mut coordinator, mut requests) = detached();
        coordinator.new_search(round_trip(), TripType::OneWay).await.unwrap();
        coordinator.set_sort(SortKey::Departure).await.unwrap();

        let first = handle_request(&requests.recv().await.unwrap());
        let second = handle_request(&requests.recv().await.unwrap());
        assert_eq!((first.seq(), second.seq()), (1, 2));

        assert!(coordinator.apply_response(second));
        assert!(!coordinator.apply_response(first));

        assert_eq!(coordinator.applied_seq(), 2);
        assert_eq!(ids(coordinator.visible()), vec!["OUT-EARLY", "OUT-LATE"]);
    }

    #[tokio::test]
    async fn test_error_responses_are_seq_guarded() {
        let (mut coordinator, mut requests) = detached();
        coordinator.new_search(round_trip(), TripType::OneWay).await.unwrap();
        let ok = handle_request(&requests.recv().await.unwrap());
        coordinator.apply_response(ok);
        let shown = coordinator.displayed().clone();

        assert!(!coordinator.apply_response(WorkerResponse::failure(1, "late failure")));
        assert!(coordinator.last_error().is_none());

        coordinator.set_sort(SortKey::Duration).await.unwrap();
        assert!(coordinator.apply_response(WorkerResponse::failure(2, "engine exploded")));
        assert_eq!(coordinator.last_error(), Some("engine exploded"));
        assert_eq!(coordinator.displayed(), &shown);
    }

    #[tokio::test]
    async fn test_invalid_filters_never_submitted() {
        let (mut coordinator, mut requests) = detached();
        let bad = FilterCriteria { min_price: Some(900.0), max_price: Some(100.0), ..Default::default() };
        assert!(matches!(coordinator.set_filters(bad).await, Err(ResultsError::Core(_))));
        assert!(requests.try_recv().is_err());
        assert_eq!(coordinator.latest_seq(), 0);
    }

    #[tokio::test]
    async fn test_round_trip_flow_with_worker() {
        let (worker, mut responses) = EngineWorker::spawn();
        let mut coordinator = ResultCoordinator::new(worker.requests());

        coordinator.new_search(round_trip(), TripType::RoundTrip).await.unwrap();
        coordinator.settle(&mut responses).await.unwrap();
        assert_eq!(coordinator.phase(), &Phase::SelectingOutbound);
        assert_eq!(ids(coordinator.visible()), vec!["OUT-LATE", "OUT-EARLY"]);

        let selection = coordinator.select("OUT-LATE").await.unwrap();
        assert!(matches!(selection, Selection::AwaitingReturn { .. }));
        coordinator.settle(&mut responses).await.unwrap();

        // Nothing leaving at or before the outbound arrival
        assert_eq!(ids(coordinator.visible()), vec!["RET-NEXT-WEEK", "RET-AFTER"]);
        assert!(matches!(
            coordinator.select("RET-AT-ARRIVAL").await,
            Err(ResultsError::UnknownFlight(_))
        ));

        match coordinator.select("RET-AFTER").await.unwrap() {
            Selection::Complete(itinerary) => {
                assert_eq!(itinerary.outbound.id, "OUT-LATE");
                assert_eq!(itinerary.inbound.map(|f| f.id), Some("RET-AFTER".to_string()));
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(coordinator.select("OUT-EARLY").await, Err(ResultsError::SelectionComplete)));
    }

    #[tokio::test]
    async fn test_return_not_selectable_before_processed() {
        let (worker, mut responses) = EngineWorker::spawn();
        let mut coordinator = ResultCoordinator::new(worker.requests());

        coordinator.new_search(round_trip(), TripType::RoundTrip).await.unwrap();
        coordinator.settle(&mut responses).await.unwrap();
        // Unprocessed returns are never exposed while picking the outbound
        assert!(coordinator.displayed().return_flights.is_empty());

        coordinator.select("OUT-LATE").await.unwrap();
        assert!(coordinator.visible().is_empty());
        assert!(matches!(
            coordinator.select("RET-AT-ARRIVAL").await,
            Err(ResultsError::ResultsPending)
        ));
        assert!(matches!(coordinator.phase(), Phase::SelectingReturn { .. }));

        coordinator.settle(&mut responses).await.unwrap();
        assert!(matches!(
            coordinator.select("RET-AT-ARRIVAL").await,
            Err(ResultsError::UnknownFlight(_))
        ));
        assert!(coordinator.displayed().outbound_flights.is_empty());
    }

    #[tokio::test]
    async fn test_response_from_previous_phase_is_not_shown() {
        let (mut coordinator, mut requests) = detached();
        coordinator.new_search(round_trip(), TripType::RoundTrip).await.unwrap();
        let first = handle_request(&requests.recv().await.unwrap());
        coordinator.apply_response(first);

        coordinator.select("OUT-LATE").await.unwrap();
        let return_leg = handle_request(&requests.recv().await.unwrap());
        coordinator.back_to_outbound().await.unwrap();
        let outbound_leg = handle_request(&requests.recv().await.unwrap());

        assert!(coordinator.apply_response(return_leg));
        assert!(coordinator.visible().is_empty());
        assert!(coordinator.displayed().return_flights.is_empty());
        assert!(coordinator.is_pending());

        assert!(coordinator.apply_response(outbound_leg));
        assert_eq!(ids(coordinator.visible()), vec!["OUT-LATE", "OUT-EARLY"]);
    }

    #[tokio::test]
    async fn test_back_to_outbound_and_new_search_reset() {
        let (worker, mut responses) = EngineWorker::spawn();
        let mut coordinator = ResultCoordinator::new(worker.requests());

        assert!(matches!(coordinator.back_to_outbound().await, Err(ResultsError::NotSelectingReturn)));

        coordinator.new_search(round_trip(), TripType::RoundTrip).await.unwrap();
        coordinator.settle(&mut responses).await.unwrap();
        coordinator.select("OUT-EARLY").await.unwrap();
        coordinator.settle(&mut responses).await.unwrap();
        // Arrives 10:00, so the 19:00 return qualifies
        assert!(ids(coordinator.visible()).contains(&"RET-AT-ARRIVAL"));

        coordinator.back_to_outbound().await.unwrap();
        coordinator.settle(&mut responses).await.unwrap();
        assert_eq!(coordinator.phase(), &Phase::SelectingOutbound);

        coordinator.select("OUT-LATE").await.unwrap();
        coordinator.new_search(round_trip(), TripType::OneWay).await.unwrap();
        coordinator.settle(&mut responses).await.unwrap();
        assert_eq!(coordinator.phase(), &Phase::SingleList);

        match coordinator.select("OUT-EARLY").await.unwrap() {
            Selection::Complete(itinerary) => assert!(itinerary.inbound.is_none()),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cabin_change_resubmits_with_gate() {
        let (worker, mut responses) = EngineWorker::spawn();
        let mut coordinator = ResultCoordinator::new(worker.requests());
        let mut results = round_trip();
        results.outbound_flights[0].business_capacity = Some(8);

        coordinator.new_search(results, TripType::OneWay).await.unwrap();
        coordinator.set_cabin_class(CabinClass::Business).await.unwrap();
        coordinator.settle(&mut responses).await.unwrap();

        assert_eq!(coordinator.applied_seq(), 2);
        assert_eq!(ids(coordinator.visible()), vec!["OUT-LATE"]);
    }
}
