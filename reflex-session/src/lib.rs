pub mod config;
pub mod state;
pub mod trial;
pub use config::{ConfigError, SessionConfig};
pub use state::{SessionEvent, SessionStateMachine};
pub use trial::SessionState;
