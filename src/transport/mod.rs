pub mod bridge;
pub mod liveness;
pub mod traits;

pub use bridge::BridgeConnector;
pub use traits::{MessagingSession, SessionConnector, SessionEvent, ThreadSnapshot};
