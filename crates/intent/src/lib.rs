pub mod classifier;
pub mod matcher;
pub mod registry;
pub mod types;

pub use classifier::IntentClassifier;
pub use registry::ToolRegistry;
pub use types::{Intent, ToolMatch, ToolMetadata};
