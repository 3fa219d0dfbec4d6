mod error;
mod int_histogram;
mod string_histogram;
mod table_stats;

pub use error::{StatsError, StatsResult};
pub use int_histogram::IntHistogram;
pub use string_histogram::StringHistogram;
pub use table_stats::{IO_COST_PER_PAGE, StatsRegistry, TableStats};

/// Number of buckets in per-column histograms
pub const NUM_HIST_BINS: usize = 100;
