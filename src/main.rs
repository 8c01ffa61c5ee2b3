//! Test-harness HTTP process.
//!
//! # Architecture Overview
//!
//! ```text
//!     Driver                 ┌──────────────────────────────────────────────────┐
//!     (test runner)          │                 HARNESS PROCESS                  │
//!                            │        single thread, current_thread runtime     │
//!     request +              │  ┌─────────┐   ┌────────────┐   ┌─────────────┐  │
//!     X-Test-Env-Id ─────────┼─▶│   net   │──▶│   http     │──▶│ correlation │  │
//!                            │  │listener │   │ dispatcher │   │  verifier   │  │
//!                            │  └─────────┘   └─────┬──────┘   └──────┬──────┘  │
//!                            │                      │ passed          │ failed  │
//!                            │                      ▼                 ▼         │
//!                            │               ┌─────────────┐     400 response  │
//!                            │               │   handler   │                   │
//!                            │               └──────┬──────┘                   │
//!                            │        immediate /   │   \ deferred / fault     │
//!     response ◀─────────────┼──────────────────────┘    \                     │
//!                            │                         exit(1) on fault        │
//!                            └──────────────────────────────────────────────────┘
//! ```

use std::process::ExitCode;

use harness_server::handler::ScenarioHandler;
use harness_server::lifecycle::startup::{self, ParseOutcome, StartupArgs};
use harness_server::lifecycle::EXIT_FAULT;
use harness_server::observability::{logging, metrics};
use harness_server::Dispatcher;

fn fail(message: impl std::fmt::Display) -> ExitCode {
    eprintln!("harness-server: {}", message);
    ExitCode::from(EXIT_FAULT as u8)
}

fn main() -> ExitCode {
    let args = match StartupArgs::parse_args(std::env::args_os()) {
        Ok(ParseOutcome::Run(args)) => args,
        Ok(ParseOutcome::Help(text)) => {
            println!("{}", text);
            return ExitCode::SUCCESS;
        }
        Err(e) => return fail(e),
    };

    let config = match args.resolve() {
        Ok(config) => config,
        Err(e) => return fail(e),
    };

    if let Err(e) = logging::init_logging(&config.observability) {
        eprintln!("harness-server: logging disabled: {}", e);
    }

    let expected_token = match startup::expected_token(&config) {
        Ok(token) => token,
        Err(e) => return fail(e),
    };

    // Validated earlier; a None here would have failed resolve().
    let Some(port) = config.listener.port else {
        return fail("missing required option --port");
    };

    tracing::info!(
        host = %config.listener.host,
        port,
        test_env_id = %expected_token,
        "harness-server v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    if let Some(addr) = &config.observability.metrics_address {
        match addr.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(metrics_address = %addr, "Failed to parse metrics address"),
        }
    }

    let dispatcher = Dispatcher::from_config(ScenarioHandler::new(), expected_token, &config);
    match dispatcher.start(port) {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Dispatcher failed");
            fail(e)
        }
    }
}
