//! Settings resolution for an inference benchmark load generator.
//!
//! A [`RequestedSettings`] snapshot is turned into scenario-specific
//! [`EffectiveSettings`] by [`EffectiveSettings::resolve`]. Human-readable
//! blocks of both are rendered by the functions in [`report`], usually on the
//! background thread owned by a [`Reporter`].

pub mod effective;
pub mod error;
pub mod query_sample;
pub mod report;
pub mod reporter;
pub mod sample_library;
pub mod settings;

pub use effective::{EffectiveSettings, FALLBACK_TARGET_QPS, OFFLINE_SAMPLE_SLACK};
pub use error::{Result, SettingsError};
pub use query_sample::{QueryId, QuerySample, QuerySampleResponse};
pub use report::{
    write_all_settings, write_effective_settings, write_requested_settings, write_summary,
};
pub use reporter::{ReportHandle, ReportRecord, Reporter};
pub use sample_library::{FixedSampleLibrary, QuerySampleLibrary};
pub use settings::{RequestedSettings, TestMode, TestScenario};
