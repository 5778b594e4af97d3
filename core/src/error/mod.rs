pub mod code;
pub mod mission;
pub mod remote;

pub use code::ErrorCode;
pub use mission::{MissionError, TaskError, DEADLOCK_MESSAGE};
pub use remote::{is_transient_message, RemoteError};
