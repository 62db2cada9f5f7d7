//! Derivation of the settings a run actually executes with.
//!
//! [`EffectiveSettings::resolve`] is the only constructor, so every value of
//! the type has passed validation. Fields are private and the type has no
//! interior mutability; a resolved value can be shared across scheduler
//! threads without synchronization.

use crate::error::{Result, SettingsError};
use crate::report::fmt_f64;
use crate::reporter::ReportHandle;
use crate::sample_library::QuerySampleLibrary;
use crate::settings::{RequestedSettings, TestMode, TestScenario};
use std::time::Duration;

const NANOS_PER_SECOND: f64 = 1e9;

/// Substituted for a negative Server or Offline throughput target.
pub const FALLBACK_TARGET_QPS: f64 = 1.0;

/// Offline sample volume covers 110% of the minimum duration at the expected
/// throughput.
pub const OFFLINE_SAMPLE_SLACK: f64 = 1.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectiveSettings {
    requested: RequestedSettings,
    scenario: TestScenario,
    mode: TestMode,
    samples_per_query: u64,
    target_qps: f64,
    target_latency_percentile: f64,
    target_latency: Duration,
    max_async_queries: u64,
    target_duration: Duration,
    min_duration: Duration,
    max_duration: Duration,
    min_query_count: u64,
    max_query_count: u64,
    min_sample_count: u64,
    qsl_rng_seed: u64,
    sample_index_rng_seed: u64,
    schedule_rng_seed: u64,
    accuracy_log_rng_seed: u64,
    accuracy_log_probability: f64,
    performance_issue_unique: bool,
    performance_issue_same: bool,
    performance_issue_same_index: u64,
    performance_sample_count: u64,
}

impl EffectiveSettings {
    /// Applies the scenario rules to `requested` and validates the result.
    ///
    /// `library` is consulted only when no performance sample count override
    /// is set. Throughput fallbacks are reported through `reports`.
    pub fn resolve<L>(
        requested: &RequestedSettings,
        library: &L,
        reports: &ReportHandle,
    ) -> Result<Self>
    where
        L: QuerySampleLibrary + ?Sized,
    {
        let mut samples_per_query = 1;
        let target_qps;
        let mut target_latency = Duration::ZERO;
        let mut target_latency_percentile = 0.0;
        let max_async_queries;
        let min_duration = Duration::from_millis(requested.min_duration_ms);
        let mut target_duration = min_duration;
        let mut min_query_count = requested.min_query_count;

        match requested.scenario {
            TestScenario::SingleStream => {
                target_qps = NANOS_PER_SECOND / requested.single_stream_expected_latency_ns as f64;
                max_async_queries = 1;
                target_latency_percentile = requested.single_stream_target_latency_percentile;
            }
            TestScenario::MultiStream | TestScenario::MultiStreamFree => {
                target_qps = requested.multi_stream_target_qps;
                target_latency = Duration::from_nanos(requested.multi_stream_target_latency_ns);
                max_async_queries = requested.multi_stream_max_async_queries;
                target_latency_percentile = requested.multi_stream_target_latency_percentile;
                samples_per_query = requested.multi_stream_samples_per_query;
            }
            TestScenario::Server => {
                target_qps = throughput_or_fallback(
                    "server_target_qps",
                    requested.server_target_qps,
                    reports,
                );
                target_latency = Duration::from_nanos(requested.server_target_latency_ns);
                max_async_queries = u64::MAX;
                target_latency_percentile = requested.server_target_latency_percentile;
            }
            TestScenario::Offline => {
                target_qps = throughput_or_fallback(
                    "offline_expected_qps",
                    requested.offline_expected_qps,
                    reports,
                );
                max_async_queries = u64::MAX;
            }
        }

        let performance_sample_count = match requested.performance_sample_count_override {
            0 => library.performance_sample_count(),
            n => n,
        };

        // Offline folds the whole run into a single query; sample volume
        // replaces the minimum duration.
        if requested.scenario == TestScenario::Offline {
            samples_per_query =
                if requested.performance_issue_unique || requested.performance_issue_same {
                    performance_sample_count
                } else {
                    min_query_count.max(offline_target_sample_count(target_duration, target_qps))
                };
            min_query_count = 1;
            target_duration = Duration::ZERO;
        }

        let min_sample_count = min_query_count.checked_mul(samples_per_query);

        check_issue_modes(requested)?;
        let min_sample_count =
            min_sample_count.ok_or_else(|| SettingsError::InvalidDerivedValue {
                field: "min_sample_count",
                value: format!("{} * {} overflows", min_query_count, samples_per_query),
            })?;
        if samples_per_query == 0 {
            return Err(SettingsError::InvalidDerivedValue {
                field: "samples_per_query",
                value: "0".to_string(),
            });
        }
        if max_async_queries == 0 {
            return Err(SettingsError::InvalidDerivedValue {
                field: "max_async_queries",
                value: "0".to_string(),
            });
        }
        if !(target_qps.is_finite() && target_qps > 0.0) {
            return Err(SettingsError::InvalidDerivedValue {
                field: "target_qps",
                value: fmt_f64(target_qps),
            });
        }

        let settings = Self {
            requested: *requested,
            scenario: requested.scenario,
            mode: requested.mode,
            samples_per_query,
            target_qps,
            target_latency_percentile,
            target_latency,
            max_async_queries,
            target_duration,
            min_duration,
            max_duration: Duration::from_millis(requested.max_duration_ms),
            min_query_count,
            max_query_count: requested.max_query_count,
            min_sample_count,
            qsl_rng_seed: requested.qsl_rng_seed,
            sample_index_rng_seed: requested.sample_index_rng_seed,
            schedule_rng_seed: requested.schedule_rng_seed,
            accuracy_log_rng_seed: requested.accuracy_log_rng_seed,
            accuracy_log_probability: requested.accuracy_log_probability,
            performance_issue_unique: requested.performance_issue_unique,
            performance_issue_same: requested.performance_issue_same,
            performance_issue_same_index: requested.performance_issue_same_index,
            performance_sample_count,
        };
        tracing::debug!(
            scenario = settings.scenario.as_str(),
            mode = settings.mode.as_str(),
            samples_per_query = settings.samples_per_query,
            target_qps = settings.target_qps,
            min_sample_count = settings.min_sample_count,
            performance_sample_count = settings.performance_sample_count,
            "resolved effective settings"
        );
        Ok(settings)
    }

    /// The requested settings this value was derived from.
    pub fn requested(&self) -> &RequestedSettings {
        &self.requested
    }

    pub fn scenario(&self) -> TestScenario {
        self.scenario
    }

    pub fn mode(&self) -> TestMode {
        self.mode
    }

    pub fn samples_per_query(&self) -> u64 {
        self.samples_per_query
    }

    pub fn target_qps(&self) -> f64 {
        self.target_qps
    }

    pub fn target_latency_percentile(&self) -> f64 {
        self.target_latency_percentile
    }

    pub fn target_latency(&self) -> Duration {
        self.target_latency
    }

    /// `u64::MAX` stands for unbounded.
    pub fn max_async_queries(&self) -> u64 {
        self.max_async_queries
    }

    pub fn target_duration(&self) -> Duration {
        self.target_duration
    }

    pub fn min_duration(&self) -> Duration {
        self.min_duration
    }

    pub fn max_duration(&self) -> Duration {
        self.max_duration
    }

    pub fn min_query_count(&self) -> u64 {
        self.min_query_count
    }

    pub fn max_query_count(&self) -> u64 {
        self.max_query_count
    }

    pub fn min_sample_count(&self) -> u64 {
        self.min_sample_count
    }

    pub fn qsl_rng_seed(&self) -> u64 {
        self.qsl_rng_seed
    }

    pub fn sample_index_rng_seed(&self) -> u64 {
        self.sample_index_rng_seed
    }

    pub fn schedule_rng_seed(&self) -> u64 {
        self.schedule_rng_seed
    }

    pub fn accuracy_log_rng_seed(&self) -> u64 {
        self.accuracy_log_rng_seed
    }

    pub fn accuracy_log_probability(&self) -> f64 {
        self.accuracy_log_probability
    }

    pub fn performance_issue_unique(&self) -> bool {
        self.performance_issue_unique
    }

    pub fn performance_issue_same(&self) -> bool {
        self.performance_issue_same
    }

    pub fn performance_issue_same_index(&self) -> u64 {
        self.performance_issue_same_index
    }

    pub fn performance_sample_count(&self) -> u64 {
        self.performance_sample_count
    }
}

fn throughput_or_fallback(field: &str, requested: f64, reports: &ReportHandle) -> f64 {
    if requested >= 0.0 {
        return requested;
    }
    tracing::warn!(
        field,
        requested,
        using = FALLBACK_TARGET_QPS,
        "invalid throughput target; using fallback"
    );
    reports.error(
        format!("Invalid value for {} requested.", field),
        requested,
        FALLBACK_TARGET_QPS,
    );
    FALLBACK_TARGET_QPS
}

fn offline_target_sample_count(target_duration: Duration, target_qps: f64) -> u64 {
    (OFFLINE_SAMPLE_SLACK * target_duration.as_secs_f64() * target_qps).ceil() as u64
}

// The same-index bound is checked against the raw override rather than the
// resolved count, so a zero override rejects every same-sample run.
fn check_issue_modes(requested: &RequestedSettings) -> Result<()> {
    if requested.performance_issue_same && requested.performance_issue_unique {
        return Err(SettingsError::ConflictingIssueModes);
    }
    if requested.performance_issue_same
        && requested.performance_issue_same_index >= requested.performance_sample_count_override
    {
        return Err(SettingsError::SameIndexOutOfRange {
            index: requested.performance_issue_same_index,
            limit: requested.performance_sample_count_override,
        });
    }
    Ok(())
}
