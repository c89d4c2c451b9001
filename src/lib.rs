// Library surface: the rollup engine plus the file/report helpers the binary uses.
// The engine modules never touch the filesystem or the wall clock directly.
pub mod aggregate;
pub mod app_dirs;
pub mod attempt;
pub mod clock;
pub mod config;
pub mod error;
pub mod history;
pub mod phoneme;
pub mod priority;
pub mod report;
pub mod rollup;
pub mod session;
pub mod snapshot;
pub mod time_series;
pub mod trouble;
pub mod util;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{ElocuteError, Result};
pub use rollup::{rollup, Rollup, RollupOptions, RollupResult, Totals};
