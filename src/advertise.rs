//! Advertising payload assembly.

use heapless::Vec;

use crate::codec;
use crate::config::ADV_DATA_LEN;
use crate::cursor::WriteCursor;

pub const AD_FLAG_LE_LIMITED_DISCOVERABLE: u8 = 0b00000001;
pub const LE_GENERAL_DISCOVERABLE: u8 = 0b00000010;
pub const BR_EDR_NOT_SUPPORTED: u8 = 0b00000100;
pub const SIMUL_LE_BR_CONTROLLER: u8 = 0b00001000;
pub const SIMUL_LE_BR_HOST: u8 = 0b00010000;

/// Fixed content of the complete 16-bit service UUID list field.
///
/// Not a UUID list at all: deployed units broadcast the ASCII device name
/// here, and the companion application keys its device filter on these exact
/// bytes. Changing them breaks discovery for every shipped client.
pub const SERVICE_UUID16_MARKER: &[u8] = b"HuGo";

#[derive(Debug, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdStructure<'a> {
    /// Device flags and baseband capabilities.
    ///
    /// This should be sent if any flags apply to the device.
    Flags(u8),

    /// Sets the full (unabbreviated) device name.
    ///
    /// This will be shown to the user when this device is found.
    CompleteLocalName(&'a [u8]),

    /// Raw contents of the complete 16-bit service UUID list.
    ///
    /// Raw bytes rather than typed UUIDs so the wire content above can be
    /// reproduced verbatim.
    CompleteServiceUuids16(&'a [u8]),

    /// The external appearance of the device, little-endian.
    Appearance(u16),
}

impl<'d> AdStructure<'d> {
    pub fn encode_slice(data: &[AdStructure<'_>], dest: &mut [u8]) -> Result<usize, codec::Error> {
        let mut w = WriteCursor::new(dest);
        for item in data.iter() {
            item.encode(&mut w)?;
        }
        Ok(w.len())
    }

    pub fn encode(&self, w: &mut WriteCursor<'_>) -> Result<(), codec::Error> {
        match self {
            AdStructure::Flags(flags) => {
                w.append(&[0x02, 0x01, *flags])?;
            }
            AdStructure::CompleteLocalName(name) => {
                w.append(&[(name.len() + 1) as u8, 0x09])?;
                w.append(name)?;
            }
            AdStructure::CompleteServiceUuids16(data) => {
                w.append(&[(data.len() + 1) as u8, 0x03])?;
                w.append(data)?;
            }
            AdStructure::Appearance(appearance) => {
                w.append(&[0x03, 0x19])?;
                w.write(*appearance)?;
            }
        }
        Ok(())
    }
}

/// The representation of the external appearance of the device.
///
/// Values from the Bluetooth Assigned Numbers list, category in the high
/// 10 bits, subcategory in the low 6.
pub mod appearance {
    /// Construct a new appearance value for the advertising payload.
    pub const fn new(category: u8, subcategory: u8) -> u16 {
        ((category as u16) << 6) | (subcategory as u16)
    }

    /// Generic Unknown device appearance.
    pub const GENERIC_UNKNOWN: u16 = new(0x000, 0x000);
    /// Generic Thermometer device appearance.
    pub const GENERIC_THERMOMETER: u16 = new(0x00C, 0x000);
    /// Generic Remote Control device appearance.
    pub const GENERIC_REMOTE_CONTROL: u16 = new(0x009, 0x000);
}

/// Inputs for [`advertising_payload`].
///
/// The defaults produce the flags byte deployed HuGo units have always
/// broadcast: `BR_EDR_NOT_SUPPORTED` and no discoverable-mode bits. Callers
/// wanting discoverable modes OR the exported flag constants in explicitly.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdvertiseConfig<'d> {
    pub flags: u8,
    pub local_name: Option<&'d str>,
    /// Emit the 16-bit service UUID list field (content is
    /// [`SERVICE_UUID16_MARKER`], see there).
    pub advertise_service: bool,
    /// Appearance code; 0 omits the field.
    pub appearance: u16,
}

impl Default for AdvertiseConfig<'_> {
    fn default() -> Self {
        Self {
            flags: BR_EDR_NOT_SUPPORTED,
            local_name: None,
            advertise_service: false,
            appearance: appearance::GENERIC_UNKNOWN,
        }
    }
}

/// Builds the advertising payload broadcast between radio restarts.
///
/// Field order is fixed: flags, local name, service UUID list, appearance.
pub fn advertising_payload(config: &AdvertiseConfig<'_>) -> Result<Vec<u8, ADV_DATA_LEN>, codec::Error> {
    let mut buf = [0u8; ADV_DATA_LEN];
    let mut w = WriteCursor::new(&mut buf);
    AdStructure::Flags(config.flags).encode(&mut w)?;
    if let Some(name) = config.local_name {
        AdStructure::CompleteLocalName(name.as_bytes()).encode(&mut w)?;
    }
    if config.advertise_service {
        AdStructure::CompleteServiceUuids16(SERVICE_UUID16_MARKER).encode(&mut w)?;
    }
    if config.appearance != 0 {
        AdStructure::Appearance(config.appearance).encode(&mut w)?;
    }
    let len = w.len();
    Vec::from_slice(&buf[..len]).map_err(|_| codec::Error::InsufficientSpace)
}
