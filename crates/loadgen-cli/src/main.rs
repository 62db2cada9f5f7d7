use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use loadgen_core::{
    EffectiveSettings, FixedSampleLibrary, Reporter, RequestedSettings, SettingsError, TestMode,
    TestScenario,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "loadgen",
    version,
    about = "Resolve benchmark load generator settings"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve requested settings into the effective settings a run uses.
    Resolve {
        settings: PathBuf,
        #[arg(long)]
        performance_sample_count: u64,
        #[arg(long)]
        scenario: Option<TestScenario>,
        #[arg(long)]
        mode: Option<TestMode>,
        #[arg(long = "set")]
        set_values: Vec<String>,
        #[arg(long)]
        summary_out: Option<PathBuf>,
        /// Print only the effective block in text mode.
        #[arg(long)]
        effective_only: bool,
        #[arg(long)]
        json: bool,
    },
    /// Print the requested settings after defaults and overrides.
    Describe {
        settings: PathBuf,
        #[arg(long)]
        scenario: Option<TestScenario>,
        #[arg(long)]
        mode: Option<TestMode>,
        #[arg(long = "set")]
        set_values: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// Write a settings template.
    Init {
        #[arg(default_value = "loadgen.yaml")]
        path: PathBuf,
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let json_mode = command_json_mode(&cli.command);
    let result = run_command(cli.command);
    match result {
        Ok(Some(payload)) => {
            emit_json(&payload);
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(err) => {
            if json_mode {
                let code = err
                    .downcast_ref::<SettingsError>()
                    .map(SettingsError::code)
                    .unwrap_or("command_failed");
                emit_json(&json_error(code, format!("{:#}", err), json!({})));
                std::process::exit(1);
            }
            Err(err)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run_command(command: Commands) -> Result<Option<Value>> {
    match command {
        Commands::Resolve {
            settings,
            performance_sample_count,
            scenario,
            mode,
            set_values,
            summary_out,
            effective_only,
            json,
        } => {
            let mut overrides = parse_set_bindings(&set_values)?;
            select_run_kind(&mut overrides, scenario, mode);
            let requested = load_settings(&settings, &overrides)?;
            let library = FixedSampleLibrary::new(performance_sample_count);

            // Report blocks would corrupt a JSON payload on stdout.
            let detail: Box<dyn Write + Send> = if json {
                Box::new(io::stderr())
            } else {
                Box::new(io::stdout())
            };
            let summary: Box<dyn Write + Send> = match &summary_out {
                Some(path) => Box::new(open_summary_file(path)?),
                None => Box::new(io::sink()),
            };
            let reporter = Reporter::spawn(detail, summary)?;
            let reports = reporter.handle();

            // On failure the reporter is dropped, which still renders any
            // fallback warnings queued so far.
            let effective = EffectiveSettings::resolve(&requested, &library, &reports)?;
            tracing::info!(
                scenario = effective.scenario().as_str(),
                samples_per_query = effective.samples_per_query(),
                "settings resolved"
            );
            if !json {
                if effective_only {
                    reports.effective_settings(&effective);
                } else {
                    reports.all_settings(&effective);
                }
            }
            if summary_out.is_some() {
                reports.summary(&effective);
            }
            drop(reports);
            reporter.finish().context("failed to write settings report")?;

            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "resolve",
                    "requested": serde_json::to_value(effective.requested())?,
                    "effective": effective_to_json(&effective),
                    "summary_out": summary_out.map(|p| p.display().to_string()),
                })));
            }
            if let Some(path) = &summary_out {
                println!("summary: {}", path.display());
            }
        }
        Commands::Describe {
            settings,
            scenario,
            mode,
            set_values,
            json,
        } => {
            let mut overrides = parse_set_bindings(&set_values)?;
            select_run_kind(&mut overrides, scenario, mode);
            let requested = load_settings(&settings, &overrides)?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "describe",
                    "requested": serde_json::to_value(requested)?,
                })));
            }
            let reporter = Reporter::spawn(io::stdout(), io::sink())?;
            reporter.handle().requested_settings(&requested);
            reporter.finish().context("failed to write settings report")?;
        }
        Commands::Init { path, force } => {
            if !force && path.exists() {
                return Err(anyhow::anyhow!(
                    "settings file already exists (use --force): {}",
                    path.display()
                ));
            }
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, SETTINGS_TEMPLATE)?;
            println!("wrote: {}", path.display());
            println!(
                "next: loadgen resolve {} --performance-sample-count <N>",
                path.display()
            );
        }
    }
    Ok(None)
}

fn load_settings(path: &Path, overrides: &BTreeMap<String, Value>) -> Result<RequestedSettings> {
    RequestedSettings::load(path, overrides)
        .with_context(|| format!("failed to load settings {}", path.display()))
}

/// `--scenario` and `--mode` win over `--set` bindings for the same keys.
fn select_run_kind(
    overrides: &mut BTreeMap<String, Value>,
    scenario: Option<TestScenario>,
    mode: Option<TestMode>,
) {
    if let Some(scenario) = scenario {
        overrides.insert("scenario".to_string(), json!(scenario.as_str()));
    }
    if let Some(mode) = mode {
        overrides.insert("mode".to_string(), json!(mode.as_str()));
    }
}

fn open_summary_file(path: &Path) -> Result<fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(path)
        .with_context(|| format!("cannot create summary file {}", path.display()))?;
    writeln!(file, "generated_at : {}", Utc::now().to_rfc3339())?;
    Ok(file)
}

const SERIALIZATION_FAILED: &str = concat!(
    r#"{"ok":false,"error":{"code":"serialization_error","#,
    r#""message":"loadgen could not encode its JSON output","details":{}}}"#
);

fn emit_json(value: &Value) {
    let line = serde_json::to_string(value).unwrap_or_else(|_| SERIALIZATION_FAILED.to_string());
    println!("{}", line);
}

fn json_error(code: &str, message: String, details: Value) -> Value {
    json!({
        "ok": false,
        "error": {
            "code": code,
            "message": message,
            "details": details
        }
    })
}

fn command_json_mode(command: &Commands) -> bool {
    match command {
        Commands::Resolve { json, .. } | Commands::Describe { json, .. } => *json,
        Commands::Init { .. } => false,
    }
}

fn parse_set_bindings(values: &[String]) -> Result<BTreeMap<String, Value>> {
    let mut out = BTreeMap::new();
    for raw in values {
        let (key, val_raw) = raw
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("invalid --set '{}': expected k=v", raw))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(anyhow::anyhow!(
                "invalid --set '{}': key cannot be empty",
                raw
            ));
        }
        let parsed =
            serde_json::from_str::<Value>(val_raw).unwrap_or(Value::String(val_raw.to_string()));
        out.insert(key.to_string(), parsed);
    }
    Ok(out)
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn duration_ns(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

fn effective_to_json(s: &EffectiveSettings) -> Value {
    json!({
        "scenario": s.scenario().as_str(),
        "mode": s.mode().as_str(),
        "samples_per_query": s.samples_per_query(),
        "target_qps": s.target_qps(),
        "target_latency_ns": duration_ns(s.target_latency()),
        "target_latency_percentile": s.target_latency_percentile(),
        "max_async_queries": s.max_async_queries(),
        "target_duration_ms": duration_ms(s.target_duration()),
        "min_duration_ms": duration_ms(s.min_duration()),
        "max_duration_ms": duration_ms(s.max_duration()),
        "min_query_count": s.min_query_count(),
        "max_query_count": s.max_query_count(),
        "min_sample_count": s.min_sample_count(),
        "qsl_rng_seed": s.qsl_rng_seed(),
        "sample_index_rng_seed": s.sample_index_rng_seed(),
        "schedule_rng_seed": s.schedule_rng_seed(),
        "accuracy_log_rng_seed": s.accuracy_log_rng_seed(),
        "accuracy_log_probability": s.accuracy_log_probability(),
        "performance_issue_unique": s.performance_issue_unique(),
        "performance_issue_same": s.performance_issue_same(),
        "performance_issue_same_index": s.performance_issue_same_index(),
        "performance_sample_count": s.performance_sample_count(),
    })
}

const SETTINGS_TEMPLATE: &str = "\
# scenario: single_stream | multi_stream | multi_stream_free | server | offline
scenario: single_stream
# mode: submission_run | accuracy_only | performance_only | find_peak_performance
mode: performance_only

single_stream_expected_latency_ns: 1000000
single_stream_target_latency_percentile: 0.9

multi_stream_target_qps: 20.0
multi_stream_target_latency_ns: 50000000
multi_stream_target_latency_percentile: 0.9
multi_stream_samples_per_query: 4
multi_stream_max_async_queries: 1

server_target_qps: 1.0
server_target_latency_ns: 100000000
server_target_latency_percentile: 0.99
server_coalesce_queries: false

offline_expected_qps: 1.0

min_duration_ms: 60000
max_duration_ms: 0                    # 0: no limit
min_query_count: 100
max_query_count: 0                    # 0: no limit

qsl_rng_seed: 0
sample_index_rng_seed: 0
schedule_rng_seed: 0
accuracy_log_rng_seed: 0
accuracy_log_probability: 0.0

performance_issue_unique: false
performance_issue_same: false
performance_issue_same_index: 0
performance_sample_count_override: 0  # 0: ask the sample library
";

#[cfg(test)]
mod tests {
    use super::*;
    use loadgen_core::ReportHandle;

    #[test]
    fn set_bindings_coerce_json_scalars() {
        let values = vec![
            "scenario=offline".to_string(),
            "offline_expected_qps=1000".to_string(),
            "performance_issue_unique=true".to_string(),
            " min_query_count =1".to_string(),
        ];
        let parsed = parse_set_bindings(&values).expect("parse bindings");
        assert_eq!(parsed["scenario"], json!("offline"));
        assert_eq!(parsed["offline_expected_qps"], json!(1000));
        assert_eq!(parsed["performance_issue_unique"], json!(true));
        assert_eq!(parsed["min_query_count"], json!(1));
    }

    #[test]
    fn set_bindings_reject_malformed_entries() {
        assert!(parse_set_bindings(&["scenario".to_string()]).is_err());
        assert!(parse_set_bindings(&["=1".to_string()]).is_err());
    }

    #[test]
    fn run_kind_flags_parse_and_win_over_set_bindings() {
        let cli = Cli::try_parse_from([
            "loadgen",
            "resolve",
            "loadgen.yaml",
            "--performance-sample-count",
            "1024",
            "--scenario",
            "offline",
            "--mode",
            "accuracy_only",
            "--set",
            "scenario=server",
        ])
        .expect("parse cli");
        let Commands::Resolve {
            scenario,
            mode,
            set_values,
            ..
        } = cli.command
        else {
            panic!("expected resolve command");
        };
        assert_eq!(scenario, Some(TestScenario::Offline));
        assert_eq!(mode, Some(TestMode::AccuracyOnly));

        let mut overrides = parse_set_bindings(&set_values).expect("parse bindings");
        select_run_kind(&mut overrides, scenario, mode);
        let requested = RequestedSettings::from_yaml_str(SETTINGS_TEMPLATE, &overrides)
            .expect("apply overrides");
        assert_eq!(requested.scenario, TestScenario::Offline);
        assert_eq!(requested.mode, TestMode::AccuracyOnly);
    }

    #[test]
    fn unknown_scenario_flag_is_rejected() {
        let parsed = Cli::try_parse_from([
            "loadgen",
            "describe",
            "loadgen.yaml",
            "--scenario",
            "batch",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn missing_settings_file_keeps_io_error_code() {
        let path = std::env::temp_dir().join(format!(
            "loadgen_cli_missing_{}.yaml",
            std::process::id()
        ));
        let _ = fs::remove_file(&path);
        let err = load_settings(&path, &BTreeMap::new()).expect_err("missing file");
        let code = err.downcast_ref::<SettingsError>().map(SettingsError::code);
        assert_eq!(code, Some("io_error"));
        assert!(format!("{:#}", err).contains("failed to load settings"));
    }

    #[test]
    fn serialization_fallback_is_valid_json() {
        let fallback: Value =
            serde_json::from_str(SERIALIZATION_FAILED).expect("fallback must parse");
        assert_eq!(fallback["ok"], json!(false));
        assert_eq!(fallback["error"]["code"], json!("serialization_error"));
    }

    #[test]
    fn template_parses_to_defaults() {
        let requested = RequestedSettings::from_yaml_str(SETTINGS_TEMPLATE, &BTreeMap::new())
            .expect("template must parse");
        assert_eq!(requested, RequestedSettings::default());
    }

    #[test]
    fn effective_json_carries_resolved_offline_values() {
        let mut overrides = BTreeMap::new();
        overrides.insert("scenario".to_string(), json!("offline"));
        overrides.insert("offline_expected_qps".to_string(), json!(1000));
        overrides.insert("min_query_count".to_string(), json!(1));
        let requested = RequestedSettings::from_yaml_str(SETTINGS_TEMPLATE, &overrides)
            .expect("apply overrides");
        let effective = EffectiveSettings::resolve(
            &requested,
            &FixedSampleLibrary::new(1024),
            &ReportHandle::disabled(),
        )
        .expect("resolve");
        let payload = effective_to_json(&effective);
        assert_eq!(payload["scenario"], json!("offline"));
        assert_eq!(payload["samples_per_query"], json!(66_000));
        assert_eq!(payload["min_sample_count"], json!(66_000));
        assert_eq!(payload["target_duration_ms"], json!(0));
        assert_eq!(payload["min_duration_ms"], json!(60_000));
        assert_eq!(payload["max_async_queries"], json!(u64::MAX));
        assert_eq!(payload["performance_sample_count"], json!(1024));
    }

    #[test]
    fn summary_file_starts_with_timestamp() {
        let path = std::env::temp_dir().join(format!(
            "loadgen_summary_test_{}_{}.txt",
            std::process::id(),
            Utc::now().timestamp_micros()
        ));
        let file = open_summary_file(&path).expect("create summary");
        drop(file);
        let contents = fs::read_to_string(&path).expect("read summary");
        assert!(contents.starts_with("generated_at : "));
        let _ = fs::remove_file(path);
    }
}
