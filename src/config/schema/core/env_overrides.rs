use super::Config;

impl Config {
    pub fn apply_env_overrides(&mut self) {
        if let Ok(operator) = std::env::var("GROUPLOCK_OPERATOR_ID")
            && !operator.is_empty()
        {
            self.enforcement.operator_id = operator;
        }

        if let Ok(nickname) = std::env::var("GROUPLOCK_DEFAULT_NICKNAME")
            && !nickname.is_empty()
        {
            self.enforcement.default_nickname = nickname;
        }

        if let Ok(url) = std::env::var("GROUPLOCK_BRIDGE_URL")
            && !url.is_empty()
        {
            self.session.bridge_url = url;
        }

        if let Ok(path) = std::env::var("GROUPLOCK_CREDENTIALS")
            && !path.is_empty()
        {
            self.session.credentials_path = path;
        }

        if let Ok(level) = std::env::var("GROUPLOCK_LOG_LEVEL")
            && !level.is_empty()
        {
            self.observability.log_level = level;
        }

        if let Ok(port_str) = std::env::var("GROUPLOCK_PORT").or_else(|_| std::env::var("PORT"))
            && let Ok(port) = port_str.parse::<u16>()
        {
            self.gateway.port = port;
        }

        if let Ok(host) = std::env::var("GROUPLOCK_HOST").or_else(|_| std::env::var("HOST"))
            && !host.is_empty()
        {
            self.gateway.host = host;
        }
    }
}
