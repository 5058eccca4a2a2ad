//! spacebio-runtime — batch orchestration and service wiring.
//!
//! `BatchScheduler` drives identifiers through fetch, parse, enrich and
//! persist behind trait seams; `Services` wires the real clients to it.

pub mod idlist;
pub mod scheduler;
pub mod services;

pub use idlist::load_id_list;
pub use scheduler::{BatchScheduler, Outcome, PipelineError, RunStats};
pub use services::Services;
