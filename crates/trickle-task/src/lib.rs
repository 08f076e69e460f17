#![warn(clippy::pedantic)]

pub mod config;
pub mod hook;
pub mod manual;
pub mod message;
pub mod runner;
pub mod scheduler;
pub mod source;
pub mod task;

pub use config::{SchedulerConfig, TaskConfig};
pub use hook::{DecodeHook, DecodeLabel, LogHook};
pub use manual::{ManualScheduler, SchedulerEvent};
pub use message::{Completion, OperationId, TaskMessage, UpstreamSignal};
pub use runner::{TaskHandle, TaskReport, spawn_task};
pub use scheduler::{DecodeScheduler, DecodeWork, OperationHandle, PooledScheduler};
pub use source::{ChunkSource, DataSource, EventSink, ReaderSource, Subscription, TaskSubscription};
pub use task::{Artifact, IncrementalDecodeTask, TaskChannels, TaskState, TaskStats};
