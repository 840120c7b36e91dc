//! BLE peripheral core for the HuGo block robot.
//!
//! Exposes one GATT service multiplexing three logical channels (shell
//! command/response, log streaming, virtual keyboard input) over a single
//! radio link, tracks connection lifecycle, negotiates the MTU with bounded
//! retries and duty-cycles the radio through an adaptive power-save timer.
//!
//! The physical radio, the task scheduler, the power-management facility,
//! the shell and the keyboard are external collaborators reached through
//! the traits in [`radio`], [`ble`], [`power`] and [`channels`]; the core
//! itself performs no blocking operation and never unwinds into the radio
//! stack's interrupt context.

#![no_std]

mod fmt;

pub mod codec;
pub mod cursor;
pub(crate) mod types;

pub mod advertise;
pub mod ble;
pub mod channels;
pub mod config;
pub mod gatt;
pub mod links;
pub mod power;
pub mod radio;

pub use ble::{Ble, BleLogWriter, LogQueue, LogRegistry, TickScheduler};
pub use bt_hci::param::ConnHandle;
pub use channels::{Shell, VirtualKeyboard};
pub use power::{BlePowerPlan, PowerControl};
pub use radio::{RadioEvent, RadioStack};
pub use types::uuid::Uuid;

/// Errors surfaced by the lifecycle operations.
#[derive(Debug)]
pub enum BleError<E> {
    /// The radio port failed.
    Radio(E),
    /// Encoding the advertising payload failed.
    Codec(codec::Error),
    /// Service registration did not yield one handle per characteristic.
    ServiceRegistration,
}

impl<E> From<codec::Error> for BleError<E> {
    fn from(error: codec::Error) -> Self {
        Self::Codec(error)
    }
}

#[cfg(feature = "defmt")]
impl<E> defmt::Format for BleError<E>
where
    E: defmt::Format,
{
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            BleError::Radio(value) => {
                defmt::write!(fmt, "Radio({})", value)
            }
            BleError::Codec(value) => {
                defmt::write!(fmt, "Codec({})", value)
            }
            BleError::ServiceRegistration => {
                defmt::write!(fmt, "ServiceRegistration")
            }
        }
    }
}
