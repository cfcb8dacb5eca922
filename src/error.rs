//! Common error definitions.

use crate::rtc::RtcError;

macro_rules! impl_from_error {
    ($error:ident) => {
        impl From<$error> for Error {
            fn from(error: $error) -> Self {
                Self::$error(error)
            }
        }
    };
}

/// Alias for Result<T, Error>.
pub type Result<T> = core::result::Result<T, Error>;

/// Collection of all errors that can occur.
#[derive(Debug, Clone, Copy, Eq, PartialEq, defmt::Format)]
pub enum Error {
    /// Occurs when an expected change of a register doesn't happen in time.
    ///
    /// This is returned when a bounded loop exceeds its alotted iteration count, eg
    /// the RTC never reporting its last write operation as finished while entering or
    /// leaving configuration mode.
    RegisterUnchanged,
    /// Calendar and time errors.
    RtcError(RtcError),
}

impl_from_error!(RtcError);

impl Error {
    /// `true` if this is a timeout from the configuration mode handshake.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::RegisterUnchanged)
    }
}
