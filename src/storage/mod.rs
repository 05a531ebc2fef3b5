pub mod lock;
pub mod watermark;

pub use lock::{LockError, RunLock, RunLockGuard};
pub use watermark::{PersistError, Watermark, WatermarkStore};
