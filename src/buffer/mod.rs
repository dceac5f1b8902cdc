pub mod frame;
pub mod publisher;
pub mod queue;

pub use frame::{BatchFrame, CLOSING_BYTES, MESSAGE_TYPE};
pub use publisher::Publisher;
pub use queue::{DEFAULT_DROP_REPORT_EVERY, IntakeQueue, PopOutcome, QueueError};
