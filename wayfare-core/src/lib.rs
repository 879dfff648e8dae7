pub mod engine;
pub mod filter;
pub mod pricing;
pub mod sort;

pub use engine::{
    handle_request, is_valid_return, process_flights, valid_returns, ProcessRequest,
    ProcessedResults, SelectionMode, WorkerFailure, WorkerRequest, WorkerResponse,
};
pub use filter::{FilterCriteria, TimeRange};
pub use pricing::{passes_availability_gate, resolve_capacity, resolve_price};
pub use sort::{sort_flights, SortKey};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
