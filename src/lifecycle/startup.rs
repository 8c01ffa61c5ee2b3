//! Startup orchestration.
//!
//! # Responsibilities
//! - Parse command-line options
//! - Merge them over the optional config file
//! - Validate the result before anything binds
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal and exits with status 1
//! - The port has no default; a harness must be told where to listen

use std::path::PathBuf;

use clap::Parser;

use crate::config::{load_config, validate_config, HarnessConfig, LogFormat, StartupConfigError};
use crate::correlation::{CorrelationToken, TokenError};

/// Command-line options of the harness process.
#[derive(Debug, Clone, Parser)]
#[command(name = "harness-server")]
#[command(about = "Correlated HTTP dispatcher for distributed test scenarios", long_about = None)]
pub struct StartupArgs {
    /// Port to listen on (0 lets the OS choose).
    #[arg(long)]
    pub port: Option<u16>,

    /// Expected X-Test-Env-Id for this run; generated when omitted.
    #[arg(long)]
    pub test_env_id: Option<String>,

    /// Optional TOML configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Emit JSON log lines.
    #[arg(long)]
    pub json_logs: bool,
}

/// What the command line asks the process to do.
#[derive(Debug)]
pub enum ParseOutcome {
    /// Start the dispatcher with these options.
    Run(StartupArgs),
    /// Print this help or version text and exit successfully.
    Help(String),
}

impl StartupArgs {
    /// Parse from an argument list, turning clap failures into startup errors.
    pub fn parse_args<I, T>(args: I) -> Result<ParseOutcome, StartupConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        match Self::try_parse_from(args) {
            Ok(parsed) => Ok(ParseOutcome::Run(parsed)),
            Err(e) => match e.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                    Ok(ParseOutcome::Help(e.to_string()))
                }
                _ => Err(StartupConfigError::Args(e.to_string())),
            },
        }
    }

    /// Build the validated configuration for this process.
    pub fn resolve(&self) -> Result<HarnessConfig, StartupConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => HarnessConfig::default(),
        };

        if let Some(port) = self.port {
            config.listener.port = Some(port);
        }
        if let Some(token) = &self.test_env_id {
            config.correlation.expected_token = Some(token.clone());
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
        if self.json_logs {
            config.observability.log_format = LogFormat::Json;
        }

        validate_config(&config).map_err(StartupConfigError::Validation)?;
        Ok(config)
    }
}

/// The token this run expects: configured, or freshly generated.
pub fn expected_token(config: &HarnessConfig) -> Result<CorrelationToken, TokenError> {
    match &config.correlation.expected_token {
        Some(token) => CorrelationToken::new(token.as_str()),
        None => CorrelationToken::generate(config.correlation.token_length_bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationError;

    fn parse(args: &[&str]) -> StartupArgs {
        match StartupArgs::parse_args(std::iter::once("harness-server").chain(args.iter().copied())) {
            Ok(ParseOutcome::Run(args)) => args,
            other => panic!("expected runnable args, got {other:?}"),
        }
    }

    #[test]
    fn test_port_is_required() {
        let err = parse(&[]).resolve().unwrap_err();
        match err {
            StartupConfigError::Validation(errors) => {
                assert_eq!(errors, vec![ValidationError::MissingPort]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unparsable_port_is_startup_error() {
        let err = StartupArgs::parse_args(["harness-server", "--port", "eighty"]).unwrap_err();
        assert!(matches!(err, StartupConfigError::Args(_)));
    }

    #[test]
    fn test_help_is_not_an_error() {
        let outcome = StartupArgs::parse_args(["harness-server", "--help"]).unwrap();
        let ParseOutcome::Help(text) = outcome else {
            panic!("expected help text");
        };
        assert!(text.contains("--test-env-id"));
    }

    #[test]
    fn test_overrides_apply() {
        let config = parse(&["--port", "0", "--test-env-id", "abc123", "--log-level", "debug", "--json-logs"])
            .resolve()
            .unwrap();
        assert_eq!(config.listener.port, Some(0));
        assert_eq!(config.correlation.expected_token.as_deref(), Some("abc123"));
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(expected_token(&config).unwrap().as_str(), "abc123");
    }

    #[test]
    fn test_generated_token_when_absent() {
        let config = parse(&["--port", "0"]).resolve().unwrap();
        let token = expected_token(&config).unwrap();
        assert_eq!(token.as_str().len(), 32);
    }
}
