pub mod badge;
pub mod bridge;
pub mod closed;
pub mod error;
pub mod events;
pub mod host;
pub mod logging;
pub mod persistence;
pub mod registry;
pub mod search;
pub mod service;
pub mod settings;
pub mod tab;
pub mod timer;

pub use error::TabError;
pub use registry::{Direction, OrderedTabRegistry};
pub use tab::{TabId, TrackedTab, WindowId};
