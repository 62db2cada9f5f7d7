use crate::error::{Result, SettingsError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestScenario {
    #[default]
    SingleStream,
    MultiStream,
    MultiStreamFree,
    Server,
    Offline,
}

impl TestScenario {
    pub const ALL: [TestScenario; 5] = [
        Self::SingleStream,
        Self::MultiStream,
        Self::MultiStreamFree,
        Self::Server,
        Self::Offline,
    ];

    /// Human-readable name used in reports.
    pub const fn label(self) -> &'static str {
        match self {
            Self::SingleStream => "Single Stream",
            Self::MultiStream => "Multi Stream",
            Self::MultiStreamFree => "Multi Stream Free",
            Self::Server => "Server",
            Self::Offline => "Offline",
        }
    }

    /// Name used in settings files.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SingleStream => "single_stream",
            Self::MultiStream => "multi_stream",
            Self::MultiStreamFree => "multi_stream_free",
            Self::Server => "server",
            Self::Offline => "offline",
        }
    }
}

impl FromStr for TestScenario {
    type Err = SettingsError;

    fn from_str(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|scenario| scenario.as_str() == normalized)
            .ok_or_else(|| {
                SettingsError::Config(format!(
                    "unknown scenario: {raw} (expected \
                     single_stream|multi_stream|multi_stream_free|server|offline)"
                ))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestMode {
    SubmissionRun,
    AccuracyOnly,
    #[default]
    PerformanceOnly,
    FindPeakPerformance,
}

impl TestMode {
    pub const ALL: [TestMode; 4] = [
        Self::SubmissionRun,
        Self::AccuracyOnly,
        Self::PerformanceOnly,
        Self::FindPeakPerformance,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::SubmissionRun => "Submission",
            Self::AccuracyOnly => "Accuracy",
            Self::PerformanceOnly => "Performance",
            Self::FindPeakPerformance => "Find Peak Performance",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SubmissionRun => "submission_run",
            Self::AccuracyOnly => "accuracy_only",
            Self::PerformanceOnly => "performance_only",
            Self::FindPeakPerformance => "find_peak_performance",
        }
    }
}

impl FromStr for TestMode {
    type Err = SettingsError;

    fn from_str(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == normalized)
            .ok_or_else(|| {
                SettingsError::Config(format!(
                    "unknown test mode: {raw} (expected \
                     submission_run|accuracy_only|performance_only|find_peak_performance)"
                ))
            })
    }
}

/// Every user-facing knob of a benchmark run, before any scenario rules are
/// applied.
///
/// Fields missing from a settings file take the values from [`Default`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RequestedSettings {
    pub scenario: TestScenario,
    pub mode: TestMode,

    pub single_stream_expected_latency_ns: u64,
    pub single_stream_target_latency_percentile: f64,

    pub multi_stream_target_qps: f64,
    pub multi_stream_target_latency_ns: u64,
    pub multi_stream_target_latency_percentile: f64,
    pub multi_stream_samples_per_query: u64,
    pub multi_stream_max_async_queries: u64,

    pub server_target_qps: f64,
    pub server_target_latency_ns: u64,
    pub server_target_latency_percentile: f64,
    pub server_coalesce_queries: bool,

    pub offline_expected_qps: f64,

    pub min_duration_ms: u64,
    /// 0 means no upper bound.
    pub max_duration_ms: u64,
    pub min_query_count: u64,
    /// 0 means no upper bound.
    pub max_query_count: u64,

    pub qsl_rng_seed: u64,
    pub sample_index_rng_seed: u64,
    pub schedule_rng_seed: u64,
    pub accuracy_log_rng_seed: u64,
    pub accuracy_log_probability: f64,

    pub performance_issue_unique: bool,
    pub performance_issue_same: bool,
    pub performance_issue_same_index: u64,
    /// 0 defers to the sample library.
    pub performance_sample_count_override: u64,
}

impl Default for RequestedSettings {
    fn default() -> Self {
        Self {
            scenario: TestScenario::SingleStream,
            mode: TestMode::PerformanceOnly,
            single_stream_expected_latency_ns: 1_000_000,
            single_stream_target_latency_percentile: 0.90,
            multi_stream_target_qps: 20.0,
            multi_stream_target_latency_ns: 50_000_000,
            multi_stream_target_latency_percentile: 0.90,
            multi_stream_samples_per_query: 4,
            multi_stream_max_async_queries: 1,
            server_target_qps: 1.0,
            server_target_latency_ns: 100_000_000,
            server_target_latency_percentile: 0.99,
            server_coalesce_queries: false,
            offline_expected_qps: 1.0,
            min_duration_ms: 60_000,
            max_duration_ms: 0,
            min_query_count: 100,
            max_query_count: 0,
            qsl_rng_seed: 0,
            sample_index_rng_seed: 0,
            schedule_rng_seed: 0,
            accuracy_log_rng_seed: 0,
            accuracy_log_probability: 0.0,
            performance_issue_unique: false,
            performance_issue_same: false,
            performance_issue_same_index: 0,
            performance_sample_count_override: 0,
        }
    }
}

impl RequestedSettings {
    pub fn load(path: &Path, overrides: &BTreeMap<String, Value>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_yaml_str(&raw, overrides)
    }

    /// Parses a YAML settings document and applies `overrides` on top of it.
    ///
    /// Override keys are top-level field names; unknown keys are rejected the
    /// same way unknown document keys are.
    pub fn from_yaml_str(raw: &str, overrides: &BTreeMap<String, Value>) -> Result<Self> {
        let yaml_value: serde_yaml::Value = serde_yaml::from_str(raw)?;
        let mut json_value: Value = serde_json::to_value(yaml_value)?;
        if json_value.is_null() {
            json_value = Value::Object(serde_json::Map::new());
        }
        apply_overrides(&mut json_value, overrides)?;
        let settings: RequestedSettings = serde_json::from_value(json_value)?;
        Ok(settings)
    }
}

fn apply_overrides(document: &mut Value, overrides: &BTreeMap<String, Value>) -> Result<()> {
    let map = document.as_object_mut().ok_or_else(|| {
        SettingsError::Config("settings document must be a mapping".to_string())
    })?;
    for (key, value) in overrides {
        if key.trim().is_empty() {
            return Err(SettingsError::Config(
                "override key cannot be empty".to_string(),
            ));
        }
        map.insert(key.clone(), value.clone());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeSet;

    #[test]
    fn labels_are_total_and_distinct() {
        let scenario_labels: BTreeSet<_> =
            TestScenario::ALL.iter().map(|s| s.label()).collect();
        assert_eq!(scenario_labels.len(), TestScenario::ALL.len());
        let mode_labels: BTreeSet<_> = TestMode::ALL.iter().map(|m| m.label()).collect();
        assert_eq!(mode_labels.len(), TestMode::ALL.len());

        assert_eq!(TestScenario::MultiStreamFree.label(), "Multi Stream Free");
        assert_eq!(TestMode::SubmissionRun.label(), "Submission");
        assert_eq!(TestMode::FindPeakPerformance.label(), "Find Peak Performance");
    }

    #[test]
    fn config_names_match_serde_names() {
        for scenario in TestScenario::ALL {
            let encoded = serde_json::to_value(scenario).expect("encode scenario");
            assert_eq!(encoded, json!(scenario.as_str()));
        }
        for mode in TestMode::ALL {
            let encoded = serde_json::to_value(mode).expect("encode mode");
            assert_eq!(encoded, json!(mode.as_str()));
        }
    }

    #[test]
    fn config_names_parse_back_to_variants() {
        for scenario in TestScenario::ALL {
            let parsed: TestScenario = scenario.as_str().parse().expect("parse scenario");
            assert_eq!(parsed, scenario);
        }
        for mode in TestMode::ALL {
            let parsed: TestMode = mode.as_str().parse().expect("parse mode");
            assert_eq!(parsed, mode);
        }
        assert_eq!(" Offline ".parse::<TestScenario>().expect("trimmed"), TestScenario::Offline);

        let err = "batch".parse::<TestScenario>().expect_err("unknown scenario");
        assert!(matches!(err, SettingsError::Config(_)));
        assert!(err.to_string().contains("batch"));
        let err = "Single Stream".parse::<TestScenario>().expect_err("labels are not names");
        assert_eq!(err.code(), "invalid_settings");
        let err = "peak".parse::<TestMode>().expect_err("unknown mode");
        assert!(matches!(err, SettingsError::Config(_)));
    }

    #[test]
    fn missing_settings_file_is_an_io_error() {
        let path = std::env::temp_dir().join(format!(
            "loadgen_missing_settings_{}.yaml",
            std::process::id()
        ));
        let _ = fs::remove_file(&path);
        let err = RequestedSettings::load(&path, &BTreeMap::new()).expect_err("missing file");
        assert!(matches!(err, SettingsError::Io(_)));
        assert_eq!(err.code(), "io_error");
    }

    #[test]
    fn omitted_fields_take_defaults() {
        let settings = RequestedSettings::from_yaml_str(
            "scenario: offline\noffline_expected_qps: 250.5\n",
            &BTreeMap::new(),
        )
        .expect("parse settings");
        assert_eq!(settings.scenario, TestScenario::Offline);
        assert_eq!(settings.offline_expected_qps, 250.5);
        let defaults = RequestedSettings::default();
        assert_eq!(settings.min_duration_ms, defaults.min_duration_ms);
        assert_eq!(settings.min_query_count, defaults.min_query_count);
        assert_eq!(settings.mode, TestMode::PerformanceOnly);
    }

    #[test]
    fn empty_document_is_all_defaults() {
        let settings =
            RequestedSettings::from_yaml_str("", &BTreeMap::new()).expect("parse empty");
        assert_eq!(settings, RequestedSettings::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = RequestedSettings::from_yaml_str("server_qps: 10\n", &BTreeMap::new())
            .expect_err("unknown key must fail");
        assert!(
            err.to_string().contains("server_qps"),
            "unexpected error: {}",
            err
        );
    }

    #[test]
    fn overrides_replace_document_values() {
        let mut overrides = BTreeMap::new();
        overrides.insert("scenario".to_string(), json!("server"));
        overrides.insert("server_target_qps".to_string(), json!(-1));
        overrides.insert("schedule_rng_seed".to_string(), json!(99));
        let settings = RequestedSettings::from_yaml_str(
            "scenario: single_stream\nserver_target_qps: 40\n",
            &overrides,
        )
        .expect("apply overrides");
        assert_eq!(settings.scenario, TestScenario::Server);
        assert_eq!(settings.server_target_qps, -1.0);
        assert_eq!(settings.schedule_rng_seed, 99);
    }

    #[test]
    fn override_with_wrong_type_is_rejected() {
        let mut overrides = BTreeMap::new();
        overrides.insert("min_query_count".to_string(), json!("many"));
        assert!(RequestedSettings::from_yaml_str("", &overrides).is_err());
    }

    #[test]
    fn non_mapping_document_is_rejected() {
        let mut overrides = BTreeMap::new();
        overrides.insert("mode".to_string(), json!("accuracy_only"));
        let err = RequestedSettings::from_yaml_str("- 1\n- 2\n", &overrides)
            .expect_err("sequence document must fail");
        assert_eq!(err.code(), "invalid_settings");
    }
}
