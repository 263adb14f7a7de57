//! Progress events for observers of a pipeline run.
//!
//! The web UI polls persisted state, but live observers (log shippers, a
//! websocket bridge) subscribe through an [`EventSink`].

mod event;
mod sink;

pub use event::{event_types, PipelineEvent};
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
