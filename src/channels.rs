//! Multiplexing of the three logical channels over one GATT service.
//!
//! Inbound attribute writes are routed by value handle to the shell or the
//! virtual keyboard; outbound traffic (log lines, shell responses) goes back
//! out as notifications. The shell and keyboard are constructed lazily on
//! first use so their resource cost is only paid when a central actually
//! exercises the channel.

use crate::gatt::ServiceHandles;

/// The shell command interpreter.
pub trait Shell {
    /// Process one command payload. A returned slice (borrowed from the
    /// shell's own buffer) is sent back to the originating link; `None` or
    /// an empty slice means no response.
    fn command_request(&mut self, request: &[u8]) -> Option<&[u8]>;
}

/// The virtual keyboard fed by the companion application.
pub trait VirtualKeyboard {
    /// Consume one raw input report, byte-exact as written by the central.
    fn process_input(&mut self, input: &[u8]);
}

/// Value handles of the three HuGo characteristics, in the order the
/// service declares them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelHandles {
    pub shell_command: u16,
    pub log: u16,
    pub keyboard: u16,
}

impl ChannelHandles {
    /// Bind the handles returned by service registration. `None` if the
    /// stack did not hand back exactly one handle per characteristic.
    pub fn from_registration(handles: &ServiceHandles) -> Option<Self> {
        match handles[..] {
            [shell_command, log, keyboard] => Some(Self {
                shell_command,
                log,
                keyboard,
            }),
            _ => None,
        }
    }
}

/// Routes inbound writes to the lazily constructed channel endpoints.
pub struct ChannelMux<S, K> {
    pub(crate) shell: Option<S>,
    pub(crate) keyboard: Option<K>,
}

impl<S: Shell + Default, K: VirtualKeyboard + Default> ChannelMux<S, K> {
    pub const fn new() -> Self {
        Self {
            shell: None,
            keyboard: None,
        }
    }

    /// Route one attribute write. Returns the shell's response when the
    /// write hit the shell command handle and produced one; the caller
    /// notifies it back on that same handle to the originating link.
    pub fn on_write(&mut self, handles: &ChannelHandles, attribute: u16, payload: &[u8]) -> Option<&[u8]> {
        if attribute == handles.shell_command {
            let shell = self.shell.get_or_insert_with(S::default);
            return shell.command_request(payload).filter(|response| !response.is_empty());
        }
        if attribute == handles.keyboard {
            let keyboard = self.keyboard.get_or_insert_with(K::default);
            keyboard.process_input(payload);
        }
        None
    }
}
