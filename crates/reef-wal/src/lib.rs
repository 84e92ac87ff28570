//! Write-ahead log for a single Reef shard.
//!
//! Every mutation is appended to the shard's log as one JSON object per line
//! before it is applied in memory:
//!
//! ```text
//! {"op":"PUT","key":"user:1","value":"alice","ts":1705612800}
//! {"op":"DELETE","key":"user:1","ts":1705612802}
//! ```
//!
//! [`WriteAheadLog::replay`] folds the log, in append order, onto an empty
//! map. It is the only recovery mechanism: there are no snapshots and no
//! compaction. Lines that cannot be applied are skipped with a warning so a
//! single bad record never hides the history after it.

mod error;
mod log;

pub use error::WalError;
pub use log::{ReplayReport, WriteAheadLog, replay_file};
