pub mod clock;
pub mod error;
pub mod scheduler;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{EngineError, Result};
pub use scheduler::{CancelToken, TimerQueue};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
