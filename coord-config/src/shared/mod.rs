//! Configuration types shared by the coordination primitives and the binaries using them.

mod base;
mod fan_in;
mod playground;
mod pool;
mod semaphore;

pub use base::ValidationError;
pub use fan_in::FanInConfig;
pub use playground::PlaygroundConfig;
pub use pool::WorkerPoolConfig;
pub use semaphore::SemaphoreConfig;
