//! Logger Context
//!
//! Owns the queue, the drain thread and its runtime. The drain task runs on
//! a dedicated OS thread with a single-threaded tokio runtime, so its
//! busy-poll never competes with the application's own executor.

use crate::config::LoggerConfig;
use crate::consumer::{ConsumerState, LogConsumer};
use crate::error::{LoggerError, WriteError};
use crate::stats::PipelineStats;
use crate::writer::{LogWriter, Shared, Written};
use log_queue::LogQueue;
use log_transport::Transport;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{info, warn};

/// Build a connected writer/consumer pair without starting anything.
///
/// The consumer can be driven on any tokio runtime with
/// [`LogConsumer::run`]; [`Logger::init`] does this on its own thread.
pub fn channel<T: Transport>(
    config: LoggerConfig,
    transport: T,
) -> Result<(LogWriter, LogConsumer<T>), LoggerError> {
    config.validate()?;

    let queue = LogQueue::new(config.queue_depth)?;
    let shared = Arc::new(Shared::new(queue, config.frame_capacity));

    Ok((
        LogWriter::new(Arc::clone(&shared)),
        LogConsumer::new(shared, transport, config),
    ))
}

/// Running log pipeline
pub struct Logger {
    writer: LogWriter,
    thread: Option<JoinHandle<()>>,
}

impl Logger {
    /// Create the queue and start the drain thread
    pub fn init<T: Transport + 'static>(config: LoggerConfig, transport: T) -> Result<Self, LoggerError> {
        let task_name = config.task_name.clone();
        let stack_size = config.task_stack_size;
        let (writer, consumer) = channel(config, transport)?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(LoggerError::Runtime)?;

        let thread = std::thread::Builder::new()
            .name(task_name.clone())
            .stack_size(stack_size)
            .spawn(move || {
                runtime.block_on(consumer.run());
            })
            .map_err(LoggerError::Spawn)?;

        info!("Logger started on thread '{}'", task_name);

        Ok(Self {
            writer,
            thread: Some(thread),
        })
    }

    /// Get a cloneable writer handle
    pub fn writer(&self) -> LogWriter {
        self.writer.clone()
    }

    /// Queue bytes for transmission; see [`LogWriter::write`]
    pub fn write(&self, data: &[u8]) -> Result<Written, WriteError> {
        self.writer.write(data)
    }

    /// Current drain task state
    pub fn state(&self) -> ConsumerState {
        self.writer.state()
    }

    /// Snapshot of the pipeline counters
    pub fn stats(&self) -> PipelineStats {
        self.writer.stats()
    }

    /// Stop accepting writes, drain what is queued and join the drain thread.
    ///
    /// A stalled transport still costs one stall timeout plus one retry
    /// interval per queued frame.
    pub fn shutdown(mut self) -> Result<PipelineStats, LoggerError> {
        info!("Shutting down logger");
        self.writer.close();

        if let Some(thread) = self.thread.take() {
            thread.join().map_err(|_| LoggerError::ConsumerPanicked)?;
        }

        Ok(self.writer.stats())
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        if self.thread.is_some() {
            warn!("Logger dropped without shutdown; drain thread detached");
            self.writer.close();
        }
    }
}
