pub mod executor;
pub mod pool;

pub use executor::{JobExecutor, ProcessedJob, UNEXPECTED_ERROR};
pub use pool::WorkerPool;
