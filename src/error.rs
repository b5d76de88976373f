use crate::model::ExitCode;

/// Invalid or unsafe configuration, surfaced before any server call.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("RUN_MODE must be \"once\" or \"cron\", got \"{0}\"")]
    InvalidRunMode(String),
    #[error("CRON_INTERVAL must be a positive integer, got \"{0}\"")]
    InvalidCronInterval(String),
    #[error("invalid CRITERIA: {0}")]
    InvalidCriteria(#[from] crate::criteria::CriteriaError),
    #[error("RESET_STACKS=true requires CONFIRM_RESET_STACK=\"yes-delete-my-stacks\" and RUN_MODE=once")]
    IllegalFlagCombination,
}

/// Transport-level failure from the server adapter, already retried to
/// exhaustion.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request to {url} timed out after {attempts} attempt(s)")]
    Timeout { url: String, attempts: u32 },
    #[error("network error contacting {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("server returned {status} for {url} after {attempts} attempt(s)")]
    ServerError {
        url: String,
        status: u16,
        attempts: u32,
    },
    #[error("failed to build HTTP client for {url}: {message}")]
    ClientBuild { url: String, message: String },
}

/// Semantic failure once a response was received — not retried by the
/// transport layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("{status} response from {url}: {body}")]
    Unexpected {
        url: String,
        status: u16,
        body: String,
    },
    #[error("malformed response from {url}: {source}")]
    MalformedResponse {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// A planning guard-rail rejection — the affected cluster is skipped, not
/// the whole run.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("cluster with parent {parent} would produce an invalid stack: {reason}")]
    InvalidStack { parent: String, reason: String },
}

/// Top-level error type `main` matches on to choose a process exit code.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("{0}")]
    General(String),
}

impl AppError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            AppError::Config(_) => ExitCode::Configuration,
            AppError::Api(_) => ExitCode::Api,
            AppError::General(_) => ExitCode::General,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_maps_to_exit_code_2() {
        let err = AppError::from(ConfigError::Missing("API_URL"));
        assert_eq!(err.exit_code(), ExitCode::Configuration);
    }

    #[test]
    fn test_api_error_maps_to_exit_code_3() {
        let err = AppError::from(ApiError::Unexpected {
            url: "https://example.test/assets".into(),
            status: 404,
            body: "not found".into(),
        });
        assert_eq!(err.exit_code(), ExitCode::Api);
    }

    #[test]
    fn test_general_error_maps_to_exit_code_1() {
        let err = AppError::General("unexpected".into());
        assert_eq!(err.exit_code(), ExitCode::General);
    }
}
