//! Server configuration from flags and environment.

use clap::Parser;
use dungeon_core::dm::DmConfig;
use dungeon_core::SessionConfig;

#[derive(Debug, Clone, Parser)]
#[command(name = "dungeon", about = "AI Dungeon Master over HTTP")]
pub struct ServerConfig {
    /// Host to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Allowed CORS origins, comma separated; `*` allows any origin
    #[arg(long = "cors-origin", env = "CORS_ORIGINS", value_delimiter = ',', default_value = "*")]
    pub cors_origins: Vec<String>,

    /// Always use this model instead of picking one from the account's list
    #[arg(long, env = "GEMINI_MODEL")]
    pub model: Option<String>,

    /// Maximum tokens per generated response
    #[arg(long, env = "MAX_OUTPUT_TOKENS")]
    pub max_output_tokens: Option<usize>,

    /// Recent lines kept verbatim before compaction
    #[arg(long, env = "HISTORY_LIMIT", default_value_t = dungeon_core::dm::HISTORY_LIMIT)]
    pub history_limit: usize,
}

impl ServerConfig {
    /// Address to bind the listener to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Session settings derived from the server flags.
    pub fn session_config(&self) -> SessionConfig {
        let mut config = SessionConfig::new()
            .with_dm_config(DmConfig::default().with_history_limit(self.history_limit));
        if let Some(ref model) = self.model {
            config = config.with_model(model);
        }
        if let Some(max) = self.max_output_tokens {
            config = config.with_max_output_tokens(max);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let config = ServerConfig::parse_from([
            "dungeon",
            "--host",
            "127.0.0.1",
            "--port",
            "9000",
            "--cors-origin",
            "http://localhost:3000,https://game.example",
            "--model",
            "gemini-1.5-pro",
        ]);

        assert_eq!(config.bind_addr(), "127.0.0.1:9000");
        assert_eq!(
            config.cors_origins,
            vec!["http://localhost:3000", "https://game.example"]
        );
        assert_eq!(
            config.session_config().model.as_deref(),
            Some("gemini-1.5-pro")
        );
    }

    #[test]
    fn test_history_limit_flag() {
        let config = ServerConfig::parse_from(["dungeon", "--history-limit", "3"]);
        assert_eq!(config.session_config().dm.history_limit, 4);
    }
}
