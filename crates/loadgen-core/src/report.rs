//! Plain-text rendering of settings blocks.
//!
//! Line order is part of the output contract; report consumers parse by
//! position.

use crate::effective::EffectiveSettings;
use crate::settings::{RequestedSettings, TestScenario};
use std::fmt::Display;
use std::io::{self, Write};

/// Formats a float so it always carries a decimal point (`1.0`, not `1`).
pub(crate) fn fmt_f64(value: f64) -> String {
    format!("{:?}", value)
}

fn field<W: Write + ?Sized>(w: &mut W, key: &str, value: impl Display) -> io::Result<()> {
    writeln!(w, "{} : {}", key, value)
}

fn unit_field<W: Write + ?Sized>(
    w: &mut W,
    key: &str,
    unit: &str,
    value: impl Display,
) -> io::Result<()> {
    writeln!(w, "{} ({}): {}", key, unit, value)
}

pub fn write_requested_settings<W: Write + ?Sized>(
    s: &RequestedSettings,
    w: &mut W,
) -> io::Result<()> {
    writeln!(w)?;
    writeln!(w, "Requested Settings:")?;
    field(w, "Scenario", s.scenario.label())?;
    field(w, "Test mode", s.mode.label())?;

    match s.scenario {
        TestScenario::SingleStream => {
            field(
                w,
                "single_stream_expected_latency_ns",
                s.single_stream_expected_latency_ns,
            )?;
            field(
                w,
                "single_stream_target_latency_percentile",
                fmt_f64(s.single_stream_target_latency_percentile),
            )?;
        }
        TestScenario::MultiStream | TestScenario::MultiStreamFree => {
            field(
                w,
                "multi_stream_target_qps",
                fmt_f64(s.multi_stream_target_qps),
            )?;
            field(
                w,
                "multi_stream_target_latency_ns",
                s.multi_stream_target_latency_ns,
            )?;
            field(
                w,
                "multi_stream_target_latency_percentile",
                fmt_f64(s.multi_stream_target_latency_percentile),
            )?;
            field(
                w,
                "multi_stream_samples_per_query",
                s.multi_stream_samples_per_query,
            )?;
            field(
                w,
                "multi_stream_max_async_queries",
                s.multi_stream_max_async_queries,
            )?;
        }
        TestScenario::Server => {
            field(w, "server_target_qps", fmt_f64(s.server_target_qps))?;
            field(w, "server_target_latency_ns", s.server_target_latency_ns)?;
            field(
                w,
                "server_target_latency_percentile",
                fmt_f64(s.server_target_latency_percentile),
            )?;
            field(w, "server_coalesce_queries", s.server_coalesce_queries)?;
        }
        TestScenario::Offline => {
            field(w, "offline_expected_qps", fmt_f64(s.offline_expected_qps))?;
        }
    }

    field(w, "min_duration_ms", s.min_duration_ms)?;
    field(w, "max_duration_ms", s.max_duration_ms)?;
    field(w, "min_query_count", s.min_query_count)?;
    field(w, "max_query_count", s.max_query_count)?;
    field(w, "qsl_rng_seed", s.qsl_rng_seed)?;
    field(w, "sample_index_rng_seed", s.sample_index_rng_seed)?;
    field(w, "schedule_rng_seed", s.schedule_rng_seed)?;
    field(w, "accuracy_log_rng_seed", s.accuracy_log_rng_seed)?;
    field(
        w,
        "accuracy_log_probability",
        fmt_f64(s.accuracy_log_probability),
    )?;
    field(w, "performance_issue_unique", s.performance_issue_unique)?;
    field(w, "performance_issue_same", s.performance_issue_same)?;
    field(
        w,
        "performance_issue_same_index",
        s.performance_issue_same_index,
    )?;
    field(
        w,
        "performance_sample_count_override",
        s.performance_sample_count_override,
    )?;
    writeln!(w)
}

pub fn write_effective_settings<W: Write + ?Sized>(
    s: &EffectiveSettings,
    w: &mut W,
) -> io::Result<()> {
    writeln!(w)?;
    writeln!(w, "Effective Settings:")?;
    field(w, "Scenario", s.scenario().label())?;
    field(w, "Test mode", s.mode().label())?;

    field(w, "samples_per_query", s.samples_per_query())?;
    field(w, "target_qps", fmt_f64(s.target_qps()))?;
    unit_field(w, "target_latency", "ns", s.target_latency().as_nanos())?;
    field(
        w,
        "target_latency_percentile",
        fmt_f64(s.target_latency_percentile()),
    )?;
    field(w, "max_async_queries", s.max_async_queries())?;
    unit_field(w, "target_duration", "ms", s.target_duration().as_millis())?;
    unit_field(w, "min_duration", "ms", s.min_duration().as_millis())?;
    unit_field(w, "max_duration", "ms", s.max_duration().as_millis())?;
    field(w, "min_query_count", s.min_query_count())?;
    field(w, "max_query_count", s.max_query_count())?;
    field(w, "min_sample_count", s.min_sample_count())?;
    write_seeds_and_issue_modes(s, w)
}

/// The subset of effective settings needed to interpret a finished run.
pub fn write_summary<W: Write + ?Sized>(s: &EffectiveSettings, w: &mut W) -> io::Result<()> {
    field(w, "samples_per_query", s.samples_per_query())?;
    field(w, "target_qps", fmt_f64(s.target_qps()))?;
    unit_field(w, "target_latency", "ns", s.target_latency().as_nanos())?;
    field(w, "max_async_queries", s.max_async_queries())?;
    unit_field(w, "min_duration", "ms", s.min_duration().as_millis())?;
    unit_field(w, "max_duration", "ms", s.max_duration().as_millis())?;
    field(w, "min_query_count", s.min_query_count())?;
    field(w, "max_query_count", s.max_query_count())?;
    write_seeds_and_issue_modes(s, w)
}

pub fn write_all_settings<W: Write + ?Sized>(
    s: &EffectiveSettings,
    w: &mut W,
) -> io::Result<()> {
    write_effective_settings(s, w)?;
    write_requested_settings(s.requested(), w)
}

pub(crate) fn write_error<W: Write + ?Sized>(
    message: &str,
    requested: f64,
    substituted: f64,
    w: &mut W,
) -> io::Result<()> {
    writeln!(
        w,
        "ERROR : {} requested : {} using : {}",
        message,
        fmt_f64(requested),
        fmt_f64(substituted)
    )
}

fn write_seeds_and_issue_modes<W: Write + ?Sized>(
    s: &EffectiveSettings,
    w: &mut W,
) -> io::Result<()> {
    field(w, "qsl_rng_seed", s.qsl_rng_seed())?;
    field(w, "sample_index_rng_seed", s.sample_index_rng_seed())?;
    field(w, "schedule_rng_seed", s.schedule_rng_seed())?;
    field(w, "accuracy_log_rng_seed", s.accuracy_log_rng_seed())?;
    field(
        w,
        "accuracy_log_probability",
        fmt_f64(s.accuracy_log_probability()),
    )?;
    field(w, "performance_issue_unique", s.performance_issue_unique())?;
    field(w, "performance_issue_same", s.performance_issue_same())?;
    field(
        w,
        "performance_issue_same_index",
        s.performance_issue_same_index(),
    )?;
    field(w, "performance_sample_count", s.performance_sample_count())
}
