//! Configure request codes, one set per device family.
//!
//! Codes are family-local: the same byte means different things to different
//! adapters. Any code an adapter does not list decodes to
//! [`DriverError::UnknownRequest`].

use crate::error::DriverError;

macro_rules! request_codes {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $code:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        #[repr(u8)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $code, )+
        }

        impl $name {
            /// Wire code of this request.
            pub const fn code(self) -> u8 {
                self as u8
            }
        }

        impl TryFrom<u8> for $name {
            type Error = DriverError;

            fn try_from(code: u8) -> Result<Self, Self::Error> {
                match code {
                    $( $code => Ok(Self::$variant), )+
                    _ => Err(DriverError::UnknownRequest),
                }
            }
        }
    };
}

request_codes! {
    /// Requests understood by the SPI bus transport.
    pub enum BusRequest {
        /// Block until the bus lock is free, then take it.
        WaitForLock = 0x01,
        /// Release the bus lock.
        ReleaseLock = 0x02,
        /// Set the bus clock; args are a little-endian `u32` in Hz.
        SetDataRate = 0x03,
    }
}

request_codes! {
    /// Requests understood by the VS1053 audio decoder.
    pub enum AudioRequest {
        /// Route transfers to the data interface (XDCS).
        SelectData = 0x01,
        /// Route transfers to the command interface (XCS).
        SelectCommand = 0x02,
        /// Bind the bus transport handle; args are one handle byte.
        SetBusHandle = 0x03,
    }
}

request_codes! {
    /// Requests understood by the ILI9341 display.
    pub enum DisplayRequest {
        /// Drive D/C high: following writes are pixel/parameter data.
        SelectData = 0x01,
        /// Drive D/C low: following writes are commands.
        SelectCommand = 0x02,
        /// Bind the bus transport handle; args are one handle byte.
        SetBusHandle = 0x03,
    }
}

request_codes! {
    /// Requests understood by the SD card.
    pub enum CardRequest {
        /// Assert the card's chip-select. Requires the bus lock.
        AssertCs = 0x01,
        /// Deassert the card's chip-select.
        DeassertCs = 0x02,
        /// Take the bus lock; no-op if the card already holds it.
        LockBus = 0x03,
        /// Release the bus lock.
        ReleaseBus = 0x04,
        /// Bind the bus transport handle; args are one handle byte.
        SetBusHandle = 0x05,
    }
}

/// Decode a `SET_DATA_RATE` argument buffer.
pub fn decode_rate(args: &[u8]) -> Result<u32, DriverError> {
    let bytes: [u8; 4] = args.try_into().map_err(|_| DriverError::BadArgument)?;
    Ok(u32::from_le_bytes(bytes))
}
