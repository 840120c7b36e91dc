//! Radio stack port.
//!
//! The peripheral core drives the physical radio exclusively through
//! [`RadioStack`] and receives its interrupt-style events as [`RadioEvent`]
//! values. A port implementation wraps whatever controller the target
//! hardware provides; every method is synchronous and non-blocking per the
//! cooperative scheduling model.

use bt_hci::param::ConnHandle;
use embassy_time::Duration;

use crate::gatt::{Service, ServiceHandles};

/// Operations the peripheral core requires from the target's radio stack.
///
/// Methods take `&self`: a port synchronizes internally, and the core may
/// call it while holding its own state lock. A port must not re-enter the
/// core synchronously from within any of these calls.
pub trait RadioStack {
    type Error;

    /// Power the radio on or off.
    fn set_active(&self, on: bool) -> Result<(), Self::Error>;

    /// Configure the stack-side receive buffer for attribute writes.
    fn configure_rx_buffer(&self, size: u16) -> Result<(), Self::Error>;

    /// Register a GATT service, returning the value handle of each
    /// characteristic in declaration order. Called once per activation.
    fn register_service(&self, service: &Service<'_>) -> Result<ServiceHandles, Self::Error>;

    /// Begin (or restart) advertising with the given payload.
    fn advertise(&self, interval: Duration, payload: &[u8]) -> Result<(), Self::Error>;

    /// Initiate an MTU exchange on a fresh link. Returns when the request
    /// has been issued; the negotiated value arrives later as
    /// [`RadioEvent::MtuExchanged`].
    fn exchange_mtu(&self, link: ConnHandle) -> Result<(), Self::Error>;

    /// Terminate one link.
    fn disconnect(&self, link: ConnHandle) -> Result<(), Self::Error>;

    /// Read the current value of a local attribute into `buf`, returning
    /// the number of bytes written.
    fn read_attribute(&self, attribute: u16, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Send a notification on a characteristic to one link.
    fn notify(&self, link: ConnHandle, attribute: u16, payload: &[u8]) -> Result<(), Self::Error>;
}

/// Events delivered by the radio stack's interrupt context.
///
/// A port translates its native event codes into this closed set;
/// [`RadioEvent::Unknown`] carries anything the port does not recognize so
/// the core can log it without crashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioEvent {
    /// A central connected to us.
    CentralConnected { link: ConnHandle },
    /// A central disconnected (or the link dropped).
    CentralDisconnected { link: ConnHandle },
    /// A central wrote to a local attribute; the payload is pending in the
    /// stack and is fetched with [`RadioStack::read_attribute`].
    GattWrite { link: ConnHandle, attribute: u16 },
    /// A previously sent indication was acknowledged.
    IndicateDone {
        link: ConnHandle,
        attribute: u16,
        status: u8,
    },
    /// The MTU exchange initiated at connect time completed.
    MtuExchanged { link: ConnHandle, mtu: u16 },
    /// Anything the port did not recognize.
    Unknown { code: u8 },
}
