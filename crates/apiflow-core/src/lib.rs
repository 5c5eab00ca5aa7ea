pub mod config;
pub mod error;
pub mod event;
pub mod flow;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use error::{FlowError, Result};
pub use event::EventBus;
pub use flow::Flow;
pub use types::*;
