//! The BLE peripheral facade.
//!
//! [`Ble`] is the one context object coordinating the connection tracker,
//! the power-save timer, the MTU negotiation and the channel multiplexer.
//! It is constructed once at startup with its collaborators injected and is
//! driven from two interleaved sources: the periodic power-save tick
//! ([`Ble::power_save_tick`]) and the radio stack's event delivery
//! ([`Ble::handle_event`]). Neither entry point blocks, panics or returns
//! an error; every failure is handled where it is detected.
//!
//! All mutable state sits behind one blocking mutex. `M = NoopRawMutex`
//! suffices on a cooperative scheduler; use a critical-section mutex when
//! the tick and the radio events can preempt each other.

use core::cell::RefCell;

use bt_hci::param::ConnHandle;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use heapless::{String, Vec};

use crate::advertise::{advertising_payload, appearance, AdvertiseConfig};
use crate::channels::{ChannelHandles, ChannelMux, Shell, VirtualKeyboard};
use crate::config::{
    ADVERTISE_INTERVAL, ADV_DATA_LEN, DEVICE_NAME, LOG_LINE_LEN, LOG_QUEUE_DEPTH, MAX_LINKS, MTU_EXCHANGE_ATTEMPTS,
    RX_BUFFER_SIZE,
};
use crate::gatt::HUGO_SERVICE;
use crate::links::LinkSet;
use crate::power::{BlePowerPlan, PowerControl, PowerSaveTimer, TickOutcome};
use crate::radio::{RadioEvent, RadioStack};
use crate::BleError;

/// The cooperative task scheduler, as far as this core needs it.
pub trait TickScheduler {
    /// Schedule one call of [`Ble::power_save_tick`] with the given
    /// `wake_up` flag after `after_ticks` scheduler ticks; 0 means the next
    /// scheduler pass.
    fn schedule_power_tick(&self, after_ticks: u32, wake_up: bool);
}

/// The firmware logging facility, as far as this core needs it.
pub trait LogRegistry<'d, M: RawMutex> {
    /// Install the BLE log sink so application log lines reach the log
    /// characteristic.
    fn add_logger(&self, writer: BleLogWriter<'d, M>);
}

/// One deferred log line.
pub type LogLine = String<LOG_LINE_LEN>;

/// Queue decoupling log emission from log delivery.
///
/// Log lines can be emitted from dispatcher or port context where calling
/// back into the facade would deadlock, so the sink only enqueues here and
/// the queue is drained at the top of every power-save tick.
pub struct LogQueue<M: RawMutex> {
    lines: Channel<M, LogLine, LOG_QUEUE_DEPTH>,
}

impl<M: RawMutex> LogQueue<M> {
    pub const fn new() -> Self {
        Self { lines: Channel::new() }
    }
}

impl<M: RawMutex> Default for LogQueue<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// The log sink handed to the logging facility by [`Ble::init`].
pub struct BleLogWriter<'d, M: RawMutex> {
    queue: &'d LogQueue<M>,
}

impl<'d, M: RawMutex> BleLogWriter<'d, M> {
    /// Queue one line for forwarding onto the log characteristic.
    ///
    /// Best effort: overlong lines are truncated, and when the queue is
    /// full the line is dropped until the next tick drains it.
    pub fn log(&self, message: &str) {
        let mut line = LogLine::new();
        for c in message.chars() {
            if line.push(c).is_err() {
                break;
            }
        }
        let _ = self.queue.lines.try_send(line);
    }
}

struct State<S, K> {
    active: bool,
    links: LinkSet<MAX_LINKS>,
    timer: PowerSaveTimer,
    handles: Option<ChannelHandles>,
    mux: ChannelMux<S, K>,
    adv_payload: Vec<u8, ADV_DATA_LEN>,
}

/// The BLE peripheral core.
pub struct Ble<'d, M, R, S, K>
where
    M: RawMutex,
    R: RadioStack,
    S: Shell,
    K: VirtualKeyboard,
{
    radio: R,
    scheduler: &'d dyn TickScheduler,
    power: &'d dyn PowerControl,
    log_queue: &'d LogQueue<M>,
    state: Mutex<M, RefCell<State<S, K>>>,
}

impl<'d, M, R, S, K> Ble<'d, M, R, S, K>
where
    M: RawMutex,
    R: RadioStack,
    S: Shell + Default,
    K: VirtualKeyboard + Default,
{
    pub fn new(
        radio: R,
        scheduler: &'d dyn TickScheduler,
        power: &'d dyn PowerControl,
        log_queue: &'d LogQueue<M>,
    ) -> Self {
        Self {
            radio,
            scheduler,
            power,
            log_queue,
            state: Mutex::new(RefCell::new(State {
                active: false,
                links: LinkSet::new(),
                timer: PowerSaveTimer::new(),
                handles: None,
                mux: ChannelMux::new(),
                adv_payload: Vec::new(),
            })),
        }
    }

    /// Access the radio port.
    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// Bring the core up: seed the power-save timeouts from the initial
    /// plan, install the BLE log sink and schedule the first wake tick.
    pub fn init<L: LogRegistry<'d, M>>(&self, logging: &L, plan: &BlePowerPlan) {
        self.state.lock(|state| state.borrow_mut().timer.apply_plan(plan));
        logging.add_logger(BleLogWriter { queue: self.log_queue });
        self.scheduler.schedule_power_tick(0, true);
    }

    /// The power plan changed. Re-arms the grace period unless a link
    /// currently holds the countdown blocked.
    pub fn power_plan_changed(&self, plan: &BlePowerPlan) {
        self.state.lock(|state| state.borrow_mut().timer.apply_plan(plan));
    }

    /// Activate the radio, register the HuGo service and start advertising.
    pub fn start(&self) -> Result<(), BleError<R::Error>> {
        self.radio.set_active(true).map_err(BleError::Radio)?;
        self.radio.configure_rx_buffer(RX_BUFFER_SIZE).map_err(BleError::Radio)?;
        let registered = self.radio.register_service(&HUGO_SERVICE).map_err(BleError::Radio)?;
        let handles = ChannelHandles::from_registration(&registered).ok_or(BleError::ServiceRegistration)?;
        let payload = advertising_payload(&AdvertiseConfig {
            local_name: Some(DEVICE_NAME),
            advertise_service: true,
            appearance: appearance::GENERIC_THERMOMETER,
            ..Default::default()
        })?;
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            state.active = true;
            state.links.clear();
            state.handles = Some(handles);
            state.adv_payload = payload.clone();
        });
        self.radio.advertise(ADVERTISE_INTERVAL, &payload).map_err(BleError::Radio)?;
        info!("[ble] radio started, advertising as {}", DEVICE_NAME);
        Ok(())
    }

    /// Drop every link and deactivate the radio. Idempotent; a tick or
    /// event arriving after `stop` finds the core inactive and no-ops.
    pub fn stop(&self) -> Result<(), BleError<R::Error>> {
        let was_active = self
            .state
            .lock(|state| core::mem::replace(&mut state.borrow_mut().active, false));
        if !was_active {
            return Ok(());
        }
        self.disconnect()?;
        self.radio.set_active(false).map_err(BleError::Radio)?;
        info!("[ble] radio stopped");
        Ok(())
    }

    /// Forcibly terminate every tracked link.
    ///
    /// Each link is attempted even when an earlier one fails; the first
    /// failure is reported.
    pub fn disconnect(&self) -> Result<(), BleError<R::Error>> {
        let links: Vec<ConnHandle, MAX_LINKS> = self.state.lock(|state| state.borrow().links.iter().collect());
        let mut result = Ok(());
        for link in links {
            if let Err(err) = self.radio.disconnect(link) {
                warn!("[ble][link] disconnect of {} failed", link.raw());
                if result.is_ok() {
                    result = Err(BleError::Radio(err));
                }
            }
        }
        result
    }

    /// Push one log line to every tracked link's log characteristic,
    /// best effort.
    pub fn notify_log(&self, message: &[u8]) {
        self.state.lock(|state| {
            let state = state.borrow();
            let Some(handles) = state.handles else {
                return;
            };
            for link in state.links.iter() {
                if self.radio.notify(link, handles.log, message).is_err() {
                    warn!("[ble][log] notify to {} failed", link.raw());
                }
            }
        });
    }

    /// The periodic power-save tick.
    ///
    /// Drains the deferred log queue, then runs the duty-cycle state
    /// machine: a wake tick powers the radio on and blocks power save, a
    /// count tick walks the grace period toward radio power-down. Always
    /// schedules its successor.
    pub fn power_save_tick(&self, wake_up: bool) {
        self.flush_log_queue();
        if wake_up {
            self.power.block_power_save();
            self.state.lock(|state| state.borrow_mut().timer.arm_for_wake());
            info!("[ble][power] power save blocked");
            if self.start().is_err() {
                warn!("[ble][power] radio start failed");
            }
            self.scheduler.schedule_power_tick(1, false);
        } else {
            match self.state.lock(|state| state.borrow_mut().timer.tick()) {
                TickOutcome::Sleep { time_down } => {
                    if self.stop().is_err() {
                        warn!("[ble][power] radio stop failed");
                    }
                    self.power.unblock_power_save();
                    info!("[ble][power] power save allowed");
                    self.scheduler.schedule_power_tick(time_down, true);
                }
                TickOutcome::Idle => self.scheduler.schedule_power_tick(1, false),
            }
        }
    }

    /// The radio stack's event callback. Never panics and never returns an
    /// error; it must stay callable for every future event.
    pub fn handle_event(&self, event: RadioEvent) {
        match event {
            RadioEvent::CentralConnected { link } => self.on_central_connect(link),
            RadioEvent::CentralDisconnected { link } => self.on_central_disconnect(link),
            RadioEvent::GattWrite { link, attribute } => self.on_gatt_write(link, attribute),
            RadioEvent::IndicateDone { .. } => {}
            RadioEvent::MtuExchanged { .. } => {}
            RadioEvent::Unknown { code } => warn!("[ble][event] unhandled event code {}", code),
        }
    }

    fn on_central_connect(&self, link: ConnHandle) {
        // Freeze the countdown before the exchange so power save cannot
        // cut the link mid-negotiation.
        self.state.lock(|state| state.borrow_mut().timer.block());

        let mut negotiated = false;
        for attempt in 1..=MTU_EXCHANGE_ATTEMPTS {
            match self.radio.exchange_mtu(link) {
                Ok(()) => {
                    negotiated = true;
                    break;
                }
                Err(_) => warn!("[ble][mtu] exchange attempt {} failed", attempt),
            }
        }
        if !negotiated {
            // A link without a successful MTU exchange is not accepted.
            if self.radio.disconnect(link).is_err() {
                warn!("[ble][link] disconnect of {} failed", link.raw());
            }
            self.state.lock(|state| {
                let mut state = state.borrow_mut();
                if state.links.is_empty() {
                    state.timer.rearm_after_disconnect();
                }
            });
            return;
        }

        let added = self.state.lock(|state| state.borrow_mut().links.add(link));
        match added {
            Ok(()) => info!("[ble][link] new connection {}", link.raw()),
            Err(_) => {
                warn!("[ble][link] no free slot for {}", link.raw());
                let _ = self.radio.disconnect(link);
            }
        }
    }

    fn on_central_disconnect(&self, link: ConnHandle) {
        let advertise = self.state.lock(|state| {
            let mut state = state.borrow_mut();
            if state.links.remove(link) {
                if state.links.is_empty() {
                    state.timer.rearm_after_disconnect();
                }
                info!("[ble][link] disconnected {}", link.raw());
            } else {
                warn!("[ble][link] disconnect of untracked handle {}", link.raw());
            }
            state.active.then(|| state.adv_payload.clone())
        });
        // Start advertising again to allow a new connection.
        if let Some(payload) = advertise {
            if self.radio.advertise(ADVERTISE_INTERVAL, &payload).is_err() {
                warn!("[ble][adv] restart failed");
            }
        }
    }

    fn on_gatt_write(&self, link: ConnHandle, attribute: u16) {
        let mut buf = [0u8; RX_BUFFER_SIZE as usize];
        let len = match self.radio.read_attribute(attribute, &mut buf) {
            Ok(len) => len,
            Err(_) => {
                warn!("[ble][gatt] read of attribute {} failed", attribute);
                return;
            }
        };
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            let Some(handles) = state.handles else {
                return;
            };
            if let Some(response) = state.mux.on_write(&handles, attribute, &buf[..len]) {
                if self.radio.notify(link, handles.shell_command, response).is_err() {
                    warn!("[ble][shell] response notify to {} failed", link.raw());
                }
            }
        });
    }

    fn flush_log_queue(&self) {
        while let Ok(line) = self.log_queue.lines.try_receive() {
            self.notify_log(line.as_bytes());
        }
    }
}
