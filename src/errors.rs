use std::io::Error as IOError;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct Error {
    kind: ErrorKind,
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    #[error("gpio{pin}: {op} failed: {source}")]
    Io {
        pin: u32,
        op: &'static str,
        #[source]
        source: IOError,
    },
    #[error("Failed to wait for interrupts: {0}")]
    Poll(#[source] nix::Error),
    #[error("gpio{0} is invalid: not exported or a register write failed")]
    InvalidPin(u32),
    #[error("gpio{pin}: {reason}")]
    InvalidOperation { pin: u32, reason: &'static str },
    #[error("Interrupt multiplexer is full ({0} pins)")]
    CapacityExceeded(usize),
    #[error("Interrupt multiplexer is already started")]
    AlreadyStarted,
    #[error("Failed to spawn interrupt worker: {0}")]
    Spawn(#[source] IOError),
    #[error("No gpio named {0:?} in pin map")]
    UnknownName(String),
    #[error("Failed to read pin map {}: {source}", path.display())]
    PinMap {
        path: PathBuf,
        #[source]
        source: IOError,
    },
    #[error("Invalid pin map: {0}")]
    PinMapFormat(#[from] serde_json::Error),
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// The OS error code behind a register or poll failure, if any.
    pub fn raw_os_error(&self) -> Option<i32> {
        match &self.kind {
            ErrorKind::Io { source, .. } | ErrorKind::Spawn(source) => source.raw_os_error(),
            ErrorKind::Poll(errno) => Some(*errno as i32),
            _ => None,
        }
    }

    pub(crate) fn io(pin: u32, op: &'static str, source: IOError) -> Self {
        ErrorKind::Io { pin, op, source }.into()
    }

    pub(crate) fn invalid_operation(pin: u32, reason: &'static str) -> Self {
        ErrorKind::InvalidOperation { pin, reason }.into()
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self { kind }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        ErrorKind::from(err).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_keeps_os_code() {
        let err = Error::io(17, "write direction", IOError::from_raw_os_error(16));
        assert_eq!(err.raw_os_error(), Some(16));
        assert!(err.to_string().starts_with("gpio17: write direction failed"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn logic_errors_have_no_os_code() {
        let err: Error = ErrorKind::CapacityExceeded(4).into();
        assert_eq!(err.raw_os_error(), None);
        assert_eq!(err.to_string(), "Interrupt multiplexer is full (4 pins)");
    }
}
