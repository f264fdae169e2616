use std::fmt::Formatter;

/// Failures that abort a task. Malformed datagrams and attempt exhaustion
/// are not represented here: the engine treats the former as a no-op receive
/// and reports the latter through [`crate::rendezvous::PunchOutcome`].
#[derive(Debug)]
pub enum PunchError {
    Resolve(String),
    Bind(String),
    ControlChannel(String),
}

impl std::fmt::Display for PunchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PunchError::Resolve(err) => write!(f, "Unable to resolve punch target: {err}"),
            PunchError::Bind(err) => write!(f, "Unable to bind local UDP port: {err}"),
            PunchError::ControlChannel(err) => write!(f, "Control channel failure: {err}"),
        }
    }
}

impl std::error::Error for PunchError {}

impl From<PunchError> for std::io::Error {
    fn from(val: PunchError) -> Self {
        std::io::Error::new(std::io::ErrorKind::Other, val.to_string())
    }
}
