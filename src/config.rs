#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub file_logs: bool,
    pub log_dir: String,
}

impl Config {
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let log_level = env_string("RUST_LOG").unwrap_or_else(|| "info".to_string());
        let file_logs =
            env_string("STUDYAI_FILE_LOGS").is_some_and(|v| v == "true" || v == "1");
        let log_dir = env_string("STUDYAI_LOG_DIR").unwrap_or_else(|| "./logs".to_string());

        Self { log_level, file_logs, log_dir }
    }
}

pub(crate) fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

pub(crate) fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

pub(crate) fn normalize_endpoint(endpoint: String) -> String {
    endpoint.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_logging_defaults_off() {
        let config = Config::from_env();
        assert!(!config.file_logs);
        assert_eq!(config.log_dir, "./logs");
    }

    #[test]
    fn endpoint_normalization_strips_trailing_slash() {
        assert_eq!(
            normalize_endpoint("https://example.com/v1/".to_string()),
            "https://example.com/v1"
        );
        assert_eq!(
            normalize_endpoint("  https://example.com ".to_string()),
            "https://example.com"
        );
    }
}
