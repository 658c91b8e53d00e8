pub mod dispatcher;
pub mod job;

pub use dispatcher::{DispatcherConfig, JobDispatcher, QueueError};
pub use job::{DeadJob, HandlerError, Job, JobHandler};
