//! Proxy configuration

use std::env;
use std::path::PathBuf;

/// Default request body limit; init bodies carry the whole base64 package
pub const DEFAULT_MAX_BODY_BYTES: usize = 48 * 1024 * 1024;

/// Proxy configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Address to bind the control listener to
    pub bind_address: String,

    /// Port for the init/run control protocol
    pub port: u16,

    /// Directory under which each package is extracted into a fresh subdirectory
    pub work_dir: PathBuf,

    /// Maximum accepted request body size in bytes
    pub max_body_bytes: usize,

    /// Append captured stack traces to action failure messages
    pub stack_traces: bool,

    /// Mirror environment bindings into the process environment
    pub export_process_env: bool,
}

impl ProxyConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            bind_address: env::var("WHISK_PROXY_BIND").unwrap_or_else(|_| "0.0.0.0".to_string()),

            port: env::var("WHISK_PROXY_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8080),

            work_dir: env::var("WHISK_PROXY_WORK_DIR")
                .map(PathBuf::from)
                .or_else(|_| env::current_dir())
                .unwrap_or_else(|_| env::temp_dir()),

            max_body_bytes: env::var("WHISK_PROXY_MAX_BODY_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_BODY_BYTES),

            stack_traces: env::var("WHISK_PROXY_STACK_TRACES")
                .ok()
                .and_then(|s| parse_flag(&s))
                .unwrap_or(cfg!(debug_assertions)),

            export_process_env: env::var("WHISK_PROXY_EXPORT_ENV")
                .ok()
                .and_then(|s| parse_flag(&s))
                .unwrap_or(true),
        }
    }

    /// Configuration rooted at `work_dir` with every other setting at its default
    pub fn with_work_dir(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8080,
            work_dir: work_dir.into(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            stack_traces: cfg!(debug_assertions),
            export_process_env: true,
        }
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
