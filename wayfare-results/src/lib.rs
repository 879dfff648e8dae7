pub mod coordinator;
pub mod worker;

use thiserror::Error;
use wayfare_core::CoreError;

pub use coordinator::{Itinerary, Phase, ResultCoordinator, Selection};
pub use worker::EngineWorker;

#[derive(Debug, Error)]
pub enum ResultsError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Engine worker is no longer running")]
    WorkerGone,

    #[error("Flight {0} is not in the displayed list")]
    UnknownFlight(String),

    #[error("Itinerary already complete, start a new search")]
    SelectionComplete,

    #[error("Not selecting a return flight")]
    NotSelectingReturn,

    #[error("Results for this step are still being processed")]
    ResultsPending,
}

pub type ResultsResult<T> = Result<T, ResultsError>;
