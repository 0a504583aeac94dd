//! Input sources.
//!
//! Each source fully materializes its rows before the engine runs.

pub mod delimited;
pub mod search_console;

pub use delimited::read_observations;
pub use search_console::{DateRange, SearchConsoleClient};
