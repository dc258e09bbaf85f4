use crate::reasoner::ReasonerConfig;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub reasoner: ReasonerConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Self {
            log_level,
            reasoner: ReasonerConfig::from_env(),
        }
    }
}
