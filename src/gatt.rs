//! GATT service definition for the HuGo peripheral.
//!
//! One service, three characteristics: shell command traffic, log
//! streaming, virtual keyboard input. The UUIDs are the wire contract
//! with the companion desktop application and must never change.

use heapless::Vec;

use crate::config::MAX_SERVICE_CHARACTERISTICS;
use crate::types::uuid::Uuid;

/// All HuGo UUIDs share one 128-bit base, `XXXXXXXX-0000-1000-8000-00805F9B34FB`,
/// with the ASCII bytes `Hu` and a per-item marker in the first group.
const fn hugo_uuid(marker: u16) -> Uuid {
    Uuid::new_long([
        0xFB, 0x34, 0x9B, 0x5F, 0x80, 0x00, 0x00, 0x80, 0x00, 0x10, 0x00, 0x00,
        (marker & 0xFF) as u8,
        (marker >> 8) as u8,
        0x75,
        0x48,
    ])
}

/// UUID of the HuGo service (`4875476F-...`).
pub const HUGO_SERVICE_UUID: Uuid = hugo_uuid(0x476F);

/// UUID of the shell command characteristic (`48754770-...`).
pub const SHELL_COMMAND_CHARACTERISTIC_UUID: Uuid = hugo_uuid(0x4770);

/// UUID of the log characteristic (`48754771-...`).
pub const LOG_CHARACTERISTIC_UUID: Uuid = hugo_uuid(0x4771);

/// UUID of the keyboard characteristic (`48754772-...`).
pub const KEYBOARD_CHARACTERISTIC_UUID: Uuid = hugo_uuid(0x4772);

/// Characteristic properties
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CharacteristicProp {
    /// Broadcast
    Broadcast = 0x01,
    /// Read
    Read = 0x02,
    /// Write without response
    WriteWithoutResponse = 0x04,
    /// Write
    Write = 0x08,
    /// Notify
    Notify = 0x10,
    /// Indicate
    Indicate = 0x20,
    /// Authenticated writes
    AuthenticatedWrite = 0x40,
    /// Extended properties
    Extended = 0x80,
}

/// Property set of one characteristic, stored as the BLE property bitfield.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CharacteristicProps(u8);

impl CharacteristicProps {
    pub const fn new(props: &[CharacteristicProp]) -> Self {
        let mut val = 0;
        let mut i = 0;
        while i < props.len() {
            val |= props[i] as u8;
            i += 1;
        }
        Self(val)
    }

    pub fn any(&self, props: &[CharacteristicProp]) -> bool {
        for p in props {
            if (*p as u8) & self.0 != 0 {
                return true;
            }
        }
        false
    }

    pub const fn raw(&self) -> u8 {
        self.0
    }
}

/// One characteristic within a [`Service`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Characteristic {
    pub uuid: Uuid,
    pub props: CharacteristicProps,
}

/// A GATT service to register with the radio stack.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Service<'d> {
    pub uuid: Uuid,
    pub characteristics: &'d [Characteristic],
}

/// Attribute value handles returned by service registration, in
/// characteristic declaration order.
pub type ServiceHandles = Vec<u16, MAX_SERVICE_CHARACTERISTICS>;

/// The HuGo service as registered on every radio activation.
pub const HUGO_SERVICE: Service<'static> = Service {
    uuid: HUGO_SERVICE_UUID,
    characteristics: &[
        Characteristic {
            uuid: SHELL_COMMAND_CHARACTERISTIC_UUID,
            props: CharacteristicProps::new(&[
                CharacteristicProp::Read,
                CharacteristicProp::Notify,
                CharacteristicProp::Indicate,
                CharacteristicProp::Write,
                CharacteristicProp::WriteWithoutResponse,
            ]),
        },
        Characteristic {
            uuid: LOG_CHARACTERISTIC_UUID,
            props: CharacteristicProps::new(&[CharacteristicProp::Notify, CharacteristicProp::Indicate]),
        },
        Characteristic {
            uuid: KEYBOARD_CHARACTERISTIC_UUID,
            props: CharacteristicProps::new(&[CharacteristicProp::Write]),
        },
    ],
};
