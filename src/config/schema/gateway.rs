use serde::{Deserialize, Serialize};

/// Liveness responder used by external uptime monitors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Liveness port (default: 3000)
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    /// Liveness host (default: 0.0.0.0)
    #[serde(default = "default_gateway_host")]
    pub host: String,
    /// Set to false to skip the liveness endpoint entirely.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_gateway_port() -> u16 {
    3000
}

fn default_gateway_host() -> String {
    "0.0.0.0".into()
}

fn default_true() -> bool {
    true
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            host: default_gateway_host(),
            enabled: true,
        }
    }
}
