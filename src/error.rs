use crate::flags::Flags;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmulatorError {
    /// render and input are required; sound is optional
    #[error("required plugins unavailable (faults: {faults:?})")]
    Unavailable { faults: Flags },
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}
