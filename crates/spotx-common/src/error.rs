use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Unknown slot: {0}")]
    InvalidSlot(u8),

    #[error("No active time window")]
    NoActiveSlot,

    #[error("Slot {0} already completed today")]
    SlotAlreadyCompleted(u8),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Validation failed: {0}")]
    Validation(String),
}
