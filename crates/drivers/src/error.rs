//! Soft driver errors and their status codes.

use thiserror_no_std::Error;

/// Recoverable error returned by registry and adapter operations.
///
/// Each variant maps to a fixed negative status code ([`DriverError::code`]);
/// zero is success and never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriverError {
    /// No device is registered under the requested identifier.
    #[error("device not found")]
    DeviceNotFound,
    /// The device already has its maximum number of open handles.
    #[error("too many references")]
    TooManyRefs,
    /// The device has not been initialized.
    #[error("device not initialized")]
    DeviceNotInitialized,
    /// The handle does not name a device usable for this request.
    #[error("invalid handle")]
    InvalidHandle,
    /// Malformed argument buffer or buffer length.
    #[error("bad argument")]
    BadArgument,
    /// The device does not understand this configure request code.
    #[error("unknown configure request")]
    UnknownRequest,
    /// The operation is not valid with the currently selected chip-select.
    #[error("chip-select error")]
    ChipSelect,
    /// Close on a device with no open handles.
    #[error("device not open")]
    DeviceNotOpen,
    /// The device never signalled ready within the poll bound.
    #[error("device not ready")]
    NotReady,
    /// The underlying peripheral reported a transfer failure.
    #[error("bus transfer failed")]
    Bus,
    /// Identity registers did not match the expected part.
    #[error("unexpected device identity")]
    UnexpectedDevice,
}

impl DriverError {
    /// Negative status code for this error.
    pub const fn code(self) -> i8 {
        match self {
            Self::DeviceNotFound => -1,
            Self::TooManyRefs => -2,
            Self::DeviceNotInitialized => -3,
            Self::InvalidHandle => -4,
            Self::BadArgument => -5,
            Self::UnknownRequest => -6,
            Self::ChipSelect => -7,
            Self::DeviceNotOpen => -8,
            Self::NotReady => -9,
            Self::Bus => -10,
            Self::UnexpectedDevice => -11,
        }
    }

    /// Inverse of [`DriverError::code`].
    pub const fn from_code(code: i8) -> Option<Self> {
        Some(match code {
            -1 => Self::DeviceNotFound,
            -2 => Self::TooManyRefs,
            -3 => Self::DeviceNotInitialized,
            -4 => Self::InvalidHandle,
            -5 => Self::BadArgument,
            -6 => Self::UnknownRequest,
            -7 => Self::ChipSelect,
            -8 => Self::DeviceNotOpen,
            -9 => Self::NotReady,
            -10 => Self::Bus,
            -11 => Self::UnexpectedDevice,
            _ => return None,
        })
    }
}

/// Collapse a driver result into a status code: 0 on success.
pub fn status<T>(result: &Result<T, DriverError>) -> i8 {
    match result {
        Ok(_) => 0,
        Err(e) => e.code(),
    }
}
