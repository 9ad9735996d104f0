// Pipeline services: state machine plus its async driver
pub mod orchestrator;
pub mod pipeline_service;

pub use orchestrator::{FetchOutcome, FetchTicket, IndicatorOrchestrator, PipelineState};
pub use pipeline_service::PipelineService;
