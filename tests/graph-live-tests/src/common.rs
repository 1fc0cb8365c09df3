//! Suite setup shared by the live test groups.
//!
//! Configuration and credentials are loaded per test and passed in
//! explicitly; nothing is kept in process-wide state.

#![cfg_attr(not(test), allow(dead_code))]

use anyhow::{Context, Result};
use graph_client::{CleanupReport, Config, GraphClient};

pub struct LiveSuite {
    pub config: Config,
    pub graph: GraphClient,
}

impl LiveSuite {
    /// Client without credentials; public reads only
    pub fn anonymous() -> Result<Self> {
        let config = load_config()?;
        let graph = GraphClient::anonymous(&config)?;
        Ok(Self { config, graph })
    }

    /// Client with the configured token; fails with the reason when there is none
    pub fn authenticated() -> Result<Self> {
        let config = load_config()?;
        let token = config
            .resolve_access_token()
            .context("Must supply an access token to run with-token tests")?;
        let graph = GraphClient::new(&config, token)?;
        Ok(Self { config, graph })
    }
}

fn load_config() -> Result<Config> {
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Combine a scenario's outcome with its cleanup report
///
/// A failed scenario is reported as-is; otherwise any object left behind
/// fails the test.
pub fn settle<T>(outcome: Result<T>, report: CleanupReport) -> Result<T> {
    for failure in &report.failures {
        eprintln!("cleanup failed for {}: {:?}", failure.id(), failure);
    }
    let value = outcome?;
    anyhow::ensure!(
        report.is_clean(),
        "unable to clean up {:?}",
        report.failures.iter().map(|f| f.id()).collect::<Vec<_>>()
    );
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph_client::CleanupFailure;

    fn leaked(id: &str) -> CleanupReport {
        CleanupReport {
            deleted: Vec::new(),
            failures: vec![CleanupFailure::NotConfirmed { id: id.to_string() }],
        }
    }

    #[test]
    fn test_settle_passes_clean_outcome() {
        let report = CleanupReport {
            deleted: vec!["1_2".to_string()],
            failures: Vec::new(),
        };
        assert_eq!(settle(Ok(7), report).unwrap(), 7);
    }

    #[test]
    fn test_settle_fails_on_leftover_objects() {
        let err = settle(Ok(()), leaked("1_2")).unwrap_err();
        assert!(err.to_string().contains("1_2"));
    }

    #[test]
    fn test_settle_keeps_scenario_error() {
        let outcome: Result<()> = Err(anyhow::anyhow!("message mismatch"));
        let err = settle(outcome, leaked("1_2")).unwrap_err();
        assert_eq!(err.to_string(), "message mismatch");
    }
}
