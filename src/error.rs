use crate::interrupt::{BridgeError, LineId};

/// Errors returned by [`Expander`](crate::Expander) operations.
///
/// `E` is the error type of the chip driver, which for the drivers in [`dev`](crate::dev) is the
/// error type of the I2C bus.
#[derive(Debug, thiserror::Error)]
pub enum Error<E> {
    /// Pin index outside `0..pin_count`.
    #[error("pin {pin} is out of range for a {pin_count}-pin expander")]
    PinOutOfRange { pin: u8, pin_count: u8 },
    /// Pin is not configured as an output.
    #[error("pin {0} is not configured as an output")]
    NotOutput(u8),
    /// Initial state has bits set above the pin count.
    #[error("initial state {state:#x} does not fit a {pin_count}-pin expander")]
    InitialStateOutOfRange { state: u32, pin_count: u8 },
    /// A read is already in flight for this expander.
    #[error("another poll is in progress")]
    PollInProgress,
    /// The number of outstanding polls reached the limit given here.
    #[error("too many polls queued (limit {0})")]
    TooManyPolls(usize),
    /// The operation queue has no free slot.
    #[error("operation queue is full")]
    QueueFull,
    /// No free slot for another listener.
    #[error("too many listeners subscribed")]
    TooManyListeners,
    /// An interrupt line is already enabled; disable it first.
    #[error("GPIO interrupt already enabled on line {0}")]
    InterruptAlreadyEnabled(LineId),
    /// No interrupt line is enabled for this expander.
    #[error("no GPIO interrupt enabled")]
    InterruptNotEnabled,
    #[error(transparent)]
    Interrupt(#[from] BridgeError),
    /// Transaction with the chip failed.
    #[error("bus transaction failed: {0:?}")]
    Bus(E),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Pin index out of range.
    Range,
    /// Operation not valid in the current pin or chip configuration.
    State,
    /// The chip or bus reported a failure.
    Protocol,
    /// The request collided with other outstanding work and was rejected.
    Contention,
    /// Interrupt line registration or release failed.
    Interrupt,
}

impl<E> Error<E> {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::PinOutOfRange { .. } => ErrorKind::Range,
            Error::NotOutput(_) | Error::InitialStateOutOfRange { .. } => ErrorKind::State,
            Error::Bus(_) => ErrorKind::Protocol,
            Error::PollInProgress
            | Error::TooManyPolls(_)
            | Error::QueueFull
            | Error::TooManyListeners
            | Error::InterruptAlreadyEnabled(_) => ErrorKind::Contention,
            Error::InterruptNotEnabled | Error::Interrupt(_) => ErrorKind::Interrupt,
        }
    }
}

impl<E: embedded_hal::i2c::Error> Error<E> {
    /// Classification of the underlying I2C failure, if this is a bus error.
    pub fn bus_kind(&self) -> Option<embedded_hal::i2c::ErrorKind> {
        match self {
            Error::Bus(e) => Some(e.kind()),
            _ => None,
        }
    }
}
