use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use wayfare_core::{handle_request, WorkerRequest, WorkerResponse};

const CHANNEL_CAPACITY: usize = 32;

/// Runs the filter/sort engine off the caller's task. Requests and responses
/// are owned values; nothing is shared with the caller.
pub struct EngineWorker {
    requests: mpsc::Sender<WorkerRequest>,
    handle: JoinHandle<()>,
}

impl EngineWorker {
    pub fn spawn() -> (Self, mpsc::Receiver<WorkerResponse>) {
        let (request_tx, request_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (response_tx, response_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let handle = tokio::spawn(run_worker(request_rx, response_tx));
        (Self { requests: request_tx, handle }, response_rx)
    }

    pub fn requests(&self) -> mpsc::Sender<WorkerRequest> {
        self.requests.clone()
    }

    /// Stops accepting work and waits for in-flight requests to drain. Other
    /// clones of the request sender keep the worker alive until dropped.
    pub async fn shutdown(self) {
        drop(self.requests);
        if let Err(e) = self.handle.await {
            error!("Engine worker task failed: {}", e);
        }
    }
}

async fn run_worker(mut requests: mpsc::Receiver<WorkerRequest>, responses: mpsc::Sender<WorkerResponse>) {
    info!("Engine worker started");

    while let Some(request) = requests.recv().await {
        let seq = request.seq();
        debug!(seq, "engine request received");

        let response = match tokio::task::spawn_blocking(move || handle_request(&request)).await {
            Ok(response) => response,
            Err(e) if e.is_panic() => {
                error!(seq, "Engine panicked while processing request");
                WorkerResponse::failure(seq, "engine panicked while processing flights")
            }
            Err(e) => {
                error!(seq, "Engine task cancelled: {}", e);
                WorkerResponse::failure(seq, e.to_string())
            }
        };

        if responses.send(response).await.is_err() {
            info!("Response receiver dropped, stopping engine worker");
            break;
        }
    }

    info!("Engine worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfare_core::{FilterCriteria, ProcessRequest, SelectionMode, SortKey};
    use wayfare_shared::{CabinClass, Flight, SearchResults};

    fn flight(id: &str, price: f64, dep: &str, arr: &str) -> Flight {
        Flight {
            id: id.to_string(),
            departure_time: dep.to_string(),
            arrival_time: arr.to_string(),
            economy_capacity: Some(50),
            economy_price: Some(price),
            ..Default::default()
        }
    }

    fn request(seq: u64, filters: FilterCriteria) -> WorkerRequest {
        WorkerRequest::Process(ProcessRequest {
            seq,
            flights: SearchResults {
                outbound_flights: vec![
                    flight("A", 300.0, "2024-12-25T10:00:00Z", "2024-12-25T12:00:00Z"),
                    flight("B", 100.0, "2024-12-25T14:00:00Z", "2024-12-25T16:30:00Z"),
                ],
                return_flights: vec![],
            },
            filters,
            sort_by: SortKey::Price,
            mode: SelectionMode::Outbound,
            selected_cabin_class: CabinClass::Economy,
        })
    }

    #[tokio::test]
    async fn test_worker_replies_in_request_order() {
        let (worker, mut responses) = EngineWorker::spawn();
        let requests = worker.requests();

        requests.send(request(1, FilterCriteria::default())).await.unwrap();
        requests
            .send(request(2, FilterCriteria { max_duration: Some(120), ..Default::default() }))
            .await
            .unwrap();

        match responses.recv().await.unwrap() {
            WorkerResponse::Results(r) => {
                assert_eq!(r.seq, 1);
                let ids: Vec<&str> = r.flights.outbound_flights.iter().map(|f| f.id.as_str()).collect();
                assert_eq!(ids, vec!["B", "A"]);
            }
            other => panic!("unexpected: {:?}", other),
        }
        match responses.recv().await.unwrap() {
            WorkerResponse::Results(r) => {
                assert_eq!(r.seq, 2);
                // B takes 150 minutes
                assert_eq!(r.flights.outbound_flights.len(), 1);
                assert_eq!(r.flights.outbound_flights[0].id, "A");
            }
            other => panic!("unexpected: {:?}", other),
        }

        drop(requests);
        worker.shutdown().await;
        assert!(responses.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_invalid_filters_become_error_responses() {
        let (worker, mut responses) = EngineWorker::spawn();
        worker
            .requests()
            .send(request(9, FilterCriteria { min_price: Some(-5.0), ..Default::default() }))
            .await
            .unwrap();

        let response = responses.recv().await.unwrap();
        assert_eq!(response.seq(), 9);
        assert!(matches!(response, WorkerResponse::Error(_)));
    }
}
