//! esim-store – persistence for simulation jobs.
//!
//! Three record kinds are kept in SQLite:
//!
//! - [`TaskRecord`]: one submitted simulation run.
//! - [`SpiceFileRecord`]: an uploaded netlist owned by a task; its bytes live
//!   in the media directory ([`MediaStorage`]).
//! - [`RuntimeStatRecord`]: one bucket of the execution-time histogram.
//!
//! [`SimStore`] implements the per-record store traits; [`SimulationRepository`]
//! adds the uploaded bytes on top of it.

pub mod config;
pub mod entities;
pub mod error;
pub mod media;
pub mod repository;
pub mod telemetry;

pub use config::Config;
pub use entities::{
    RuntimeStatRecord, RuntimeStatStore, SimStore, SpiceFileRecord, SpiceFileStore, TaskRecord,
    TaskStore,
};
pub use error::StoreError;
pub use media::MediaStorage;
pub use repository::SimulationRepository;
pub use telemetry::init_tracing;
