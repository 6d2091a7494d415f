//! Edit Flux - Edit-session telemetry engine
//!
//! Flux follows a document line by line while it is being edited and
//! attributes every character either to the author (typed) or to an
//! assistant (pasted or completed). From the same event stream it derives
//! timing metrics: thinking vs. editing time, burstiness of the gaps between
//! edits, and the Fano factor of events per time bucket.
//!
//! ## Modules
//!
//! - **Ledger**: [`LineLedger`] applies line-level events and keeps provenance
//! - **Normalizer**: turns host range changes into line-level events
//! - **Pipeline**: [`EditSession`] for live sessions, [`events_to_report`] for replay

pub mod adapter;
pub mod config;
pub mod diff;
pub mod encoder;
pub mod error;
pub mod features;
pub mod ledger;
pub mod line;
pub mod normalizer;
pub mod pipeline;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::LedgerConfig;
pub use error::LedgerError;
pub use ledger::LineLedger;
pub use line::{LineNode, LineProvenance};
pub use pipeline::{events_to_report, events_to_report_with_config, EditSession};
pub use types::{EditEvent, EditEventKind, EditEventRecord, LedgerMetrics, SessionReport};

// Host integration exports
pub use adapter::EventStreamAdapter;
pub use normalizer::{AssistHeuristic, ChangeNotification, EventNormalizer, LineSource};

/// Flux version embedded in all session reports
pub const FLUX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for session reports
pub const PRODUCER_NAME: &str = "edit-flux";
