mod core;
mod enforcement;
mod gateway;
mod observability;
mod session;

pub use core::Config;
pub use enforcement::{DelayBand, EnforcementConfig};
pub use gateway::GatewayConfig;
pub use observability::ObservabilityConfig;
pub use session::SessionConfig;
