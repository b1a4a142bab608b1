pub mod config;
pub mod invoice;
pub mod metrics_server;
pub mod observability;
pub mod pipeline;
pub mod projection;
pub mod sinks;
pub mod sources;
pub mod transform;

pub use pipeline::{Envelope, Pipeline, SinkReport};
