/// Stable numeric codes attached to every error surfaced by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    GeneralError = 1,
    ParseError = 2,
    ValidationError = 3,
    TaskNotFound = 10,
    Deadlock = 12,
    RetryRejected = 13,
    BackendError = 20,
    QuotaExceeded = 22,
    Timeout = 30,
    NetworkError = 40,
}

impl ErrorCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}
