pub mod schema;

pub use schema::{
    Config, DelayBand, EnforcementConfig, GatewayConfig, ObservabilityConfig, SessionConfig,
};
