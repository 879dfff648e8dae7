use async_trait::async_trait;
use futures_util::stream::{self, Stream};
use reqwest::header::ACCEPT;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};
use url::Url;
use wayfare_shared::{SeatSnapshot, StreamMessage};
use wayfare_store::app_config::StreamConfig;

use super::sse::{SseDecoder, SseEvent};
use super::{StreamError, StreamResult};
use crate::client::ApiClient;

pub type EventStream = Pin<Box<dyn Stream<Item = StreamResult<SseEvent>> + Send>>;

/// Opens the raw event stream for one flight.
#[async_trait]
pub trait SeatEventSource: Send + Sync {
    async fn connect(&self, flight_id: &str) -> StreamResult<EventStream>;
}

/// `GET {backend}/sse/seat-updates?flightId=…`
pub struct HttpSeatSource {
    http: reqwest::Client,
    endpoint: Url,
}

impl HttpSeatSource {
    pub fn new(client: &ApiClient) -> StreamResult<Self> {
        // No request timeout: the connection is meant to stay open
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| StreamError::Connect(e.to_string()))?;
        Ok(Self { http, endpoint: client.url("/sse/seat-updates") })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl SeatEventSource for HttpSeatSource {
    async fn connect(&self, flight_id: &str) -> StreamResult<EventStream> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("flightId", flight_id);

        let response = self
            .http
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| StreamError::Connect(e.to_string()))?;
        if !response.status().is_success() {
            return Err(StreamError::Status(response.status().as_u16()));
        }

        let bytes = Box::pin(response.bytes_stream());
        let events = stream::unfold(
            (bytes, SseDecoder::new(), VecDeque::new(), false),
            |(mut bytes, mut decoder, mut queue, failed)| async move {
                loop {
                    if let Some(event) = queue.pop_front() {
                        return Some((Ok(event), (bytes, decoder, queue, failed)));
                    }
                    if failed {
                        return None;
                    }
                    match bytes.next().await {
                        Some(Ok(chunk)) => queue.extend(decoder.feed(&chunk)),
                        Some(Err(e)) => {
                            let err = StreamError::Transport(e.to_string());
                            return Some((Err(err), (bytes, decoder, queue, true)));
                        }
                        None => return None,
                    }
                }
            },
        );
        Ok(Box::pin(events))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Connecting,
    Open,
    Closed,
    Errored,
}

/// Everything a view needs to render live availability for the tracked flight.
#[derive(Debug, Clone, PartialEq)]
pub struct SeatFeed {
    pub flight_id: Option<String>,
    /// Bumped on every `track`/`close`; writes from older tasks are dropped
    pub generation: u64,
    pub state: StreamState,
    pub snapshot: Option<SeatSnapshot>,
    pub connected: bool,
    pub last_error: Option<StreamError>,
}

impl SeatFeed {
    fn idle() -> Self {
        Self {
            flight_id: None,
            generation: 0,
            state: StreamState::Idle,
            snapshot: None,
            connected: false,
            last_error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SeatEvent {
    Opened { flight_id: String },
    Snapshot(SeatSnapshot),
    ParseError(StreamError),
    TransportError(StreamError),
    Closed { flight_id: String },
}

/// Follows seat availability for at most one flight at a time.
///
/// Errors are terminal for a connection: the tracker never reconnects on its
/// own. Call `track` again to open a fresh stream.
pub struct SeatTracker {
    source: Arc<dyn SeatEventSource>,
    selling_fast_threshold: u32,
    feed: Arc<watch::Sender<SeatFeed>>,
    events: broadcast::Sender<SeatEvent>,
    task: Option<JoinHandle<()>>,
}

impl SeatTracker {
    pub fn new(source: Arc<dyn SeatEventSource>, config: &StreamConfig) -> Self {
        let (feed, _) = watch::channel(SeatFeed::idle());
        let (events, _) = broadcast::channel(64);
        Self {
            source,
            selling_fast_threshold: config.selling_fast_threshold,
            feed: Arc::new(feed),
            events,
            task: None,
        }
    }

    /// Switches the tracker to `flight_id`, tearing down any previous stream first.
    pub fn track(&mut self, flight_id: &str) {
        self.stop();

        let mut generation = 0;
        self.feed.send_modify(|feed| {
            feed.generation += 1;
            generation = feed.generation;
            *feed = SeatFeed {
                flight_id: Some(flight_id.to_string()),
                generation,
                state: StreamState::Connecting,
                snapshot: None,
                connected: false,
                last_error: None,
            };
        });

        info!(%flight_id, generation, "Tracking seat updates");
        let publisher = FeedPublisher {
            feed: self.feed.clone(),
            events: self.events.clone(),
            generation,
        };
        let source = self.source.clone();
        let flight_id = flight_id.to_string();
        self.task = Some(tokio::spawn(run_stream(source, flight_id, publisher)));
    }

    pub fn close(&mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let had_task = match self.task.take() {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        };

        let events = &self.events;
        self.feed.send_if_modified(|feed| {
            let Some(flight_id) = feed.flight_id.clone() else {
                return false;
            };
            if !had_task && feed.state == StreamState::Closed {
                return false;
            }
            feed.generation += 1;
            feed.state = StreamState::Closed;
            feed.connected = false;
            let _ = events.send(SeatEvent::Closed { flight_id: flight_id.clone() });
            info!(%flight_id, "Seat stream closed");
            true
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<SeatFeed> {
        self.feed.subscribe()
    }

    pub fn feed(&self) -> SeatFeed {
        self.feed.borrow().clone()
    }

    pub fn events(&self) -> broadcast::Receiver<SeatEvent> {
        self.events.subscribe()
    }

    /// Narrow events as a stream; lagged receivers skip what they missed.
    pub fn event_stream(&self) -> impl Stream<Item = SeatEvent> + Send + 'static {
        BroadcastStream::new(self.events.subscribe()).filter_map(|result| result.ok())
    }

    /// Latest pushed seat count, or the caller's value until one arrives.
    pub fn current_seats(&self, initial: u32) -> u32 {
        self.feed
            .borrow()
            .snapshot
            .as_ref()
            .map(|s| s.available_seats)
            .unwrap_or(initial)
    }

    pub fn is_selling_fast(&self, initial: u32) -> bool {
        self.current_seats(initial) < self.selling_fast_threshold
    }

    pub fn updates_paused(&self) -> bool {
        self.feed.borrow().last_error.is_some()
    }
}

impl Drop for SeatTracker {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct FeedPublisher {
    feed: Arc<watch::Sender<SeatFeed>>,
    events: broadcast::Sender<SeatEvent>,
    generation: u64,
}

impl FeedPublisher {
    /// Applies `change` only while this connection is still the current one.
    fn publish(&self, change: impl FnOnce(&mut SeatFeed) -> SeatEvent) -> bool {
        let events = &self.events;
        let generation = self.generation;
        self.feed.send_if_modified(|feed| {
            if feed.generation != generation {
                return false;
            }
            let _ = events.send(change(feed));
            true
        })
    }

    fn fail(&self, flight_id: &str, err: StreamError) {
        warn!(%flight_id, error = %err, "Seat stream failed, live updates paused");
        self.publish(|feed| {
            feed.state = StreamState::Errored;
            feed.connected = false;
            feed.last_error = Some(err.clone());
            SeatEvent::TransportError(err)
        });
    }

    fn handle(&self, flight_id: &str, event: SseEvent) {
        if event.event.as_deref().is_some_and(|name| name != "message") {
            debug!(%flight_id, event = ?event.event, "Skipping named event");
            return;
        }
        if event.data.trim().is_empty() {
            return;
        }

        match StreamMessage::parse(&event.data) {
            Ok(StreamMessage::SeatUpdate(snapshot)) if snapshot.flight_id != flight_id => {
                debug!(%flight_id, other = %snapshot.flight_id, "Ignoring update for another flight");
            }
            Ok(StreamMessage::SeatUpdate(snapshot)) => {
                debug!(%flight_id, seats = snapshot.available_seats, "Seat update");
                self.publish(|feed| {
                    feed.snapshot = Some(snapshot.clone());
                    SeatEvent::Snapshot(snapshot)
                });
            }
            Ok(StreamMessage::Ignored) => {
                debug!(%flight_id, "Ignoring non seat-update message");
            }
            Err(e) => {
                let err = StreamError::Parse(e.to_string());
                warn!(%flight_id, error = %err, "Could not parse seat update");
                self.publish(|feed| {
                    feed.last_error = Some(err.clone());
                    SeatEvent::ParseError(err)
                });
            }
        }
    }
}

async fn run_stream(source: Arc<dyn SeatEventSource>, flight_id: String, publisher: FeedPublisher) {
    let mut stream = match source.connect(&flight_id).await {
        Ok(stream) => stream,
        Err(e) => {
            publisher.fail(&flight_id, e);
            return;
        }
    };

    let opened = publisher.publish(|feed| {
        feed.state = StreamState::Open;
        feed.connected = true;
        feed.last_error = None;
        SeatEvent::Opened { flight_id: flight_id.clone() }
    });
    if opened {
        info!(%flight_id, "Seat stream open");
    }

    while let Some(item) = stream.next().await {
        match item {
            Ok(event) => publisher.handle(&flight_id, event),
            Err(e) => {
                publisher.fail(&flight_id, e);
                return;
            }
        }
    }
    publisher.fail(&flight_id, StreamError::Ended);
}
