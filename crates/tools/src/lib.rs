//! The voice-agent tool catalogue: alarms, reminders, notes, calendar
//! events, weather/search lookups, email, and app control, executed only
//! through the governed executor.

pub mod catalog;
pub mod executor;
pub mod stores;

pub use catalog::{default_catalog, default_tool_metadata, Tool};
pub use executor::GovernedExecutor;
pub use stores::ToolStores;
