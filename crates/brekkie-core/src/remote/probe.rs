use std::time::Duration;

use super::{Query, RemoteGateway};

/// Which tables answered a probe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeReport {
    pub available: Vec<String>,
    pub missing: Vec<String>,
    pub attempts: u32,
}

impl ProbeReport {
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Check that every table answers a one-row select, retrying with a fixed
/// delay until all do or `attempts` runs out.
pub async fn probe_tables<G: RemoteGateway>(
    gateway: &G,
    access_token: &str,
    tables: &[&str],
    attempts: u32,
    delay: Duration,
) -> ProbeReport {
    let attempts = attempts.max(1);
    let mut report = ProbeReport::default();

    for attempt in 1..=attempts {
        report = ProbeReport {
            attempts: attempt,
            ..ProbeReport::default()
        };
        for table in tables {
            match gateway
                .select(access_token, table, &Query::select("id").limit(1))
                .await
            {
                Ok(_) => report.available.push((*table).to_string()),
                Err(error) => {
                    tracing::debug!("Probe of {} failed: {}", table, error);
                    report.missing.push((*table).to_string());
                }
            }
        }

        if report.is_ready() {
            tracing::info!("Remote tables ready after {} attempt(s)", attempt);
            return report;
        }
        if attempt < attempts {
            tokio::time::sleep(delay).await;
        }
    }

    tracing::warn!("Remote tables still missing: {}", report.missing.join(", "));
    report
}
