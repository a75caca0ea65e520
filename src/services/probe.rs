// AutoDNS - Latency Probe
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Resolver latency comparison across static profiles.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::backend::NetworkBackend;
use crate::models::profile::ALL_PROFILES;
use crate::models::ProbeConfig;

/// Average latency of one profile for one domain.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileTiming {
    pub profile: &'static str,
    /// `None` when the resolver never answered.
    pub average: Option<Duration>,
}

/// Timings for one domain.
#[derive(Debug, Clone, Serialize)]
pub struct DomainTimings {
    pub domain: String,
    pub timings: Vec<ProfileTiming>,
}

impl DomainTimings {
    /// Profile with the lowest average, ties broken by profile order.
    pub fn fastest(&self) -> Option<&ProfileTiming> {
        self.timings
            .iter()
            .filter(|t| t.average.is_some())
            .min_by_key(|t| t.average)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProbeReport {
    pub domains: Vec<DomainTimings>,
}

pub struct LatencyProbe {
    backend: Arc<dyn NetworkBackend>,
    config: ProbeConfig,
}

impl LatencyProbe {
    pub fn new(backend: Arc<dyn NetworkBackend>, config: ProbeConfig) -> Self {
        Self { backend, config }
    }

    /// Time every (domain, static profile) pair.
    pub async fn run(&self) -> ProbeReport {
        let samples = self.config.samples.max(1);
        let mut report = ProbeReport::default();

        for domain in self.config.valid_domains() {
            let mut timings = Vec::new();
            for profile in ALL_PROFILES.iter() {
                let Some(resolver) = profile.probe_resolver() else {
                    continue;
                };
                let average = match self
                    .backend
                    .measure_resolution_latency(resolver, &domain, samples)
                    .await
                {
                    Ok(avg) => Some(avg),
                    Err(e) => {
                        debug!("{} via {}: {}", domain, profile.name, e);
                        None
                    }
                };
                timings.push(ProfileTiming {
                    profile: profile.name,
                    average,
                });
            }
            report.domains.push(DomainTimings { domain, timings });
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::models::profile::{ADGUARD, CLOUDFLARE, GOOGLE};

    #[tokio::test]
    async fn test_fastest_per_domain() {
        let backend = Arc::new(MockBackend::default());
        backend.set_latency(ADGUARD.probe_resolver().unwrap(), Duration::from_millis(40));
        backend.set_latency(CLOUDFLARE.probe_resolver().unwrap(), Duration::from_millis(12));
        backend.set_latency(GOOGLE.probe_resolver().unwrap(), Duration::from_millis(20));
        // HiNet never answers.

        let probe = LatencyProbe::new(
            backend,
            ProbeConfig {
                domains: vec!["example.com".to_string(), "bad..name".to_string()],
                samples: 2,
            },
        );
        let report = probe.run().await;

        assert_eq!(report.domains.len(), 1);
        let domain = &report.domains[0];
        assert_eq!(domain.timings.len(), 4);
        assert!(domain.timings.iter().any(|t| t.profile == "HiNet" && t.average.is_none()));
        assert_eq!(domain.fastest().unwrap().profile, "Cloudflare");
    }

    #[tokio::test]
    async fn test_no_answers_means_no_fastest() {
        let probe = LatencyProbe::new(Arc::new(MockBackend::default()), ProbeConfig::default());
        let report = probe.run().await;
        assert_eq!(report.domains.len(), 4);
        assert!(report.domains.iter().all(|d| d.fastest().is_none()));
    }
}
