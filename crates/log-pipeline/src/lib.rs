//! Non-Blocking Serial Log Pipeline
//!
//! Application code hands log bytes to a [`LogWriter`] from any thread. The
//! bytes are copied into a fixed-capacity frame and pushed onto a bounded
//! queue without ever blocking; a full queue drops the newest write. A single
//! drain task moves frames to a [`Transport`](log_transport::Transport),
//! spinning on a busy transport only until the stall guard fires, and parks
//! itself whenever the queue is empty.
//!
//! ```no_run
//! use log_pipeline::{Logger, LoggerConfig};
//! use log_transport::StdoutTransport;
//!
//! let logger = Logger::init(LoggerConfig::default(), StdoutTransport::stdout()).unwrap();
//! logger.write(b"hello\n").unwrap();
//! logger.shutdown().unwrap();
//! ```

mod config;
mod consumer;
mod error;
mod guard;
mod logger;
mod stats;
mod writer;

pub use config::{FailPolicy, LoggerConfig, ENV_PREFIX};
pub use consumer::{ConsumerState, LogConsumer};
pub use error::{ConfigError, LoggerError, WriteError};
pub use guard::TimeoutGuard;
pub use logger::{channel, Logger};
pub use stats::PipelineStats;
pub use writer::{LogWriter, Written, WRITE_FAILED};
