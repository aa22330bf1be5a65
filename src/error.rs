use std::fmt;
use std::io;

/// The setup step that failed while building a listening endpoint or a
/// worker's readiness context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStage {
    /// Socket creation
    Socket,
    /// Applying socket options (address/port reuse, non-blocking mode)
    Options,
    /// Binding the local address
    Bind,
    /// Entering the listening state
    Listen,
    /// Creating the readiness context
    Poll,
    /// Registering an interest into the readiness context
    Register,
}

impl fmt::Display for SetupStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            SetupStage::Socket => "socket",
            SetupStage::Options => "options",
            SetupStage::Bind => "bind",
            SetupStage::Listen => "listen",
            SetupStage::Poll => "poll",
            SetupStage::Register => "register",
        };
        f.write_str(stage)
    }
}

#[derive(Debug)]
pub enum AcceptorError {
    /// A setup step failed before the serve loop was entered.
    Setup { stage: SetupStage, source: io::Error },
    /// An accept call failed after setup. Terminal for the worker that hit it.
    Accept(io::Error),
    /// A readiness wait failed. Terminal for the worker that hit it.
    Wait(io::Error),
    /// A worker thread could not be spawned.
    Spawn(io::Error),
}

impl AcceptorError {
    pub fn setup(stage: SetupStage, source: io::Error) -> Self {
        AcceptorError::Setup { stage, source }
    }
}

impl fmt::Display for AcceptorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcceptorError::Setup { stage, source } => {
                write!(f, "Setup Error at {}: {}", stage, source)
            }
            AcceptorError::Accept(e) => write!(f, "Accept Error: {}", e),
            AcceptorError::Wait(e) => write!(f, "Wait Error: {}", e),
            AcceptorError::Spawn(e) => write!(f, "Spawn Error: {}", e),
        }
    }
}

impl std::error::Error for AcceptorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AcceptorError::Setup { source, .. } => Some(source),
            AcceptorError::Accept(e) | AcceptorError::Wait(e) | AcceptorError::Spawn(e) => Some(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, AcceptorError>;
