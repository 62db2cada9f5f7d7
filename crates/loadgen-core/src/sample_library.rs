/// The one capability of the sample library the resolver depends on.
pub trait QuerySampleLibrary {
    /// Number of samples that participate in the performance phase.
    fn performance_sample_count(&self) -> u64;
}

impl<T: QuerySampleLibrary + ?Sized> QuerySampleLibrary for &T {
    fn performance_sample_count(&self) -> u64 {
        (**self).performance_sample_count()
    }
}

/// A library that reports a fixed count. Used by the CLI, where no real
/// dataset is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSampleLibrary {
    performance_sample_count: u64,
}

impl FixedSampleLibrary {
    pub const fn new(performance_sample_count: u64) -> Self {
        Self {
            performance_sample_count,
        }
    }
}

impl QuerySampleLibrary for FixedSampleLibrary {
    fn performance_sample_count(&self) -> u64 {
        self.performance_sample_count
    }
}
