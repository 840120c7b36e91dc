//! Full-lifecycle test of the peripheral core against recording mocks:
//! init, wake, connect, channel traffic, disconnect, grace period, sleep
//! and the next wake cycle.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_time::Duration;
use hugo_ble::gatt::{Service, ServiceHandles};
use hugo_ble::{
    Ble, BleLogWriter, BlePowerPlan, ConnHandle, LogQueue, LogRegistry, PowerControl, RadioEvent, RadioStack, Shell,
    TickScheduler, VirtualKeyboard,
};

const SHELL_HANDLE: u16 = 16;
const LOG_HANDLE: u16 = 18;
const KEYBOARD_HANDLE: u16 = 20;

const PLAN: BlePowerPlan = BlePowerPlan {
    initial_time_up: 2,
    running_time_up: 1,
    time_down: 5,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum RadioCall {
    SetActive(bool),
    ConfigureRxBuffer(u16),
    RegisterService,
    Advertise(Vec<u8>),
    ExchangeMtu(u16),
    Disconnect(u16),
    Notify(u16, u16, Vec<u8>),
    ReadAttribute(u16),
}

#[derive(Default)]
struct MockRadio {
    calls: RefCell<Vec<RadioCall>>,
    mtu_failures: Cell<usize>,
    pending_value: RefCell<Vec<u8>>,
}

impl MockRadio {
    fn record(&self, call: RadioCall) {
        self.calls.borrow_mut().push(call);
    }

    fn count(&self, wanted: &RadioCall) -> usize {
        self.calls.borrow().iter().filter(|call| *call == wanted).count()
    }

    fn notifies(&self) -> Vec<RadioCall> {
        self.calls
            .borrow()
            .iter()
            .filter(|call| matches!(call, RadioCall::Notify(..)))
            .cloned()
            .collect()
    }
}

impl RadioStack for MockRadio {
    type Error = ();

    fn set_active(&self, on: bool) -> Result<(), ()> {
        self.record(RadioCall::SetActive(on));
        Ok(())
    }

    fn configure_rx_buffer(&self, size: u16) -> Result<(), ()> {
        self.record(RadioCall::ConfigureRxBuffer(size));
        Ok(())
    }

    fn register_service(&self, service: &Service<'_>) -> Result<ServiceHandles, ()> {
        assert_eq!(service.characteristics.len(), 3);
        self.record(RadioCall::RegisterService);
        let mut handles = ServiceHandles::new();
        handles
            .extend_from_slice(&[SHELL_HANDLE, LOG_HANDLE, KEYBOARD_HANDLE])
            .unwrap();
        Ok(handles)
    }

    fn advertise(&self, interval: Duration, payload: &[u8]) -> Result<(), ()> {
        assert_eq!(interval, Duration::from_micros(100_000));
        self.record(RadioCall::Advertise(payload.to_vec()));
        Ok(())
    }

    fn exchange_mtu(&self, link: ConnHandle) -> Result<(), ()> {
        self.record(RadioCall::ExchangeMtu(link.raw()));
        if self.mtu_failures.get() > 0 {
            self.mtu_failures.set(self.mtu_failures.get() - 1);
            return Err(());
        }
        Ok(())
    }

    fn disconnect(&self, link: ConnHandle) -> Result<(), ()> {
        self.record(RadioCall::Disconnect(link.raw()));
        Ok(())
    }

    fn read_attribute(&self, attribute: u16, buf: &mut [u8]) -> Result<usize, ()> {
        self.record(RadioCall::ReadAttribute(attribute));
        let pending = self.pending_value.borrow();
        buf[..pending.len()].copy_from_slice(&pending);
        Ok(pending.len())
    }

    fn notify(&self, link: ConnHandle, attribute: u16, payload: &[u8]) -> Result<(), ()> {
        self.record(RadioCall::Notify(link.raw(), attribute, payload.to_vec()));
        Ok(())
    }
}

/// Records scheduled ticks so the test can pump them like the firmware
/// scheduler would.
#[derive(Default)]
struct MockScheduler {
    pending: RefCell<VecDeque<(u32, bool)>>,
}

impl MockScheduler {
    fn pump(&self) -> (u32, bool) {
        self.pending.borrow_mut().pop_front().expect("no tick scheduled")
    }
}

impl TickScheduler for MockScheduler {
    fn schedule_power_tick(&self, after_ticks: u32, wake_up: bool) {
        self.pending.borrow_mut().push_back((after_ticks, wake_up));
    }
}

#[derive(Default)]
struct MockPower {
    blocks: Cell<usize>,
    unblocks: Cell<usize>,
}

impl PowerControl for MockPower {
    fn block_power_save(&self) {
        self.blocks.set(self.blocks.get() + 1);
    }

    fn unblock_power_save(&self) {
        self.unblocks.set(self.unblocks.get() + 1);
    }
}

#[derive(Default)]
struct StatusShell {
    response: Vec<u8>,
}

impl Shell for StatusShell {
    fn command_request(&mut self, request: &[u8]) -> Option<&[u8]> {
        if request == b"status" {
            self.response = b"ready".to_vec();
            Some(&self.response)
        } else {
            None
        }
    }
}

#[derive(Default)]
struct RecordingKeyboard {
    input: Vec<u8>,
}

impl VirtualKeyboard for RecordingKeyboard {
    fn process_input(&mut self, input: &[u8]) {
        self.input.extend_from_slice(input);
    }
}

struct CapturingLogging<'d> {
    writer: RefCell<Option<BleLogWriter<'d, NoopRawMutex>>>,
}

impl<'d> LogRegistry<'d, NoopRawMutex> for CapturingLogging<'d> {
    fn add_logger(&self, writer: BleLogWriter<'d, NoopRawMutex>) {
        *self.writer.borrow_mut() = Some(writer);
    }
}

type TestBle<'d> = Ble<'d, NoopRawMutex, MockRadio, StatusShell, RecordingKeyboard>;

#[test]
fn full_lifecycle() {
    let scheduler = MockScheduler::default();
    let power = MockPower::default();
    let queue = LogQueue::new();
    let logging = CapturingLogging {
        writer: RefCell::new(None),
    };
    let ble: TestBle<'_> = Ble::new(MockRadio::default(), &scheduler, &power, &queue);

    // init installs the log sink and schedules an immediate wake tick.
    ble.init(&logging, &PLAN);
    assert!(logging.writer.borrow().is_some());
    assert_eq!(scheduler.pump(), (0, true));

    // The wake tick powers the radio on, blocks power save and starts
    // advertising with the deployed payload.
    ble.power_save_tick(true);
    assert_eq!(power.blocks.get(), 1);
    assert_eq!(ble.radio().count(&RadioCall::SetActive(true)), 1);
    assert_eq!(ble.radio().count(&RadioCall::ConfigureRxBuffer(256)), 1);
    assert_eq!(ble.radio().count(&RadioCall::RegisterService), 1);
    {
        let calls = ble.radio().calls.borrow();
        let Some(RadioCall::Advertise(payload)) = calls.iter().find(|c| matches!(c, RadioCall::Advertise(_))) else {
            panic!("radio never advertised");
        };
        assert_eq!(
            payload.as_slice(),
            &[
                0x02, 0x01, 0x04, // flags
                0x05, 0x09, b'H', b'u', b'G', b'o', // complete local name
                0x05, 0x03, b'H', b'u', b'G', b'o', // 16-bit uuid list marker
                0x03, 0x19, 0x00, 0x03, // appearance 768
            ]
        );
    }
    assert_eq!(scheduler.pump(), (1, false));

    // A central connects; the first MTU attempt fails, the retry succeeds.
    ble.radio().mtu_failures.set(1);
    ble.handle_event(RadioEvent::CentralConnected {
        link: ConnHandle::new(1),
    });
    assert_eq!(ble.radio().count(&RadioCall::ExchangeMtu(1)), 2);
    assert_eq!(ble.radio().count(&RadioCall::Disconnect(1)), 0);

    // Shell traffic: command in, response notified back to that link.
    ble.radio().pending_value.replace(b"status".to_vec());
    ble.handle_event(RadioEvent::GattWrite {
        link: ConnHandle::new(1),
        attribute: SHELL_HANDLE,
    });
    assert_eq!(
        ble.radio().notifies(),
        vec![RadioCall::Notify(1, SHELL_HANDLE, b"ready".to_vec())]
    );

    // Keyboard traffic is a byte-exact pass-through with no response.
    ble.radio().pending_value.replace(vec![0x1B, 0x5B, 0x41]);
    ble.handle_event(RadioEvent::GattWrite {
        link: ConnHandle::new(1),
        attribute: KEYBOARD_HANDLE,
    });
    assert_eq!(ble.radio().notifies().len(), 1);

    // A log line emitted through the sink is forwarded on the next tick.
    logging.writer.borrow().as_ref().unwrap().log("battery low");
    ble.power_save_tick(false);
    assert_eq!(
        ble.radio().notifies().last(),
        Some(&RadioCall::Notify(1, LOG_HANDLE, b"battery low".to_vec()))
    );
    assert_eq!(scheduler.pump(), (1, false));

    // The central disconnects: advertising restarts and the grace period
    // (running_time_up = 1) begins.
    ble.handle_event(RadioEvent::CentralDisconnected {
        link: ConnHandle::new(1),
    });
    assert_eq!(
        ble.radio()
            .calls
            .borrow()
            .iter()
            .filter(|c| matches!(c, RadioCall::Advertise(_)))
            .count(),
        2
    );

    // One more tick expires the grace period: radio down, power save
    // allowed, next tick scheduled as a wake after time_down.
    ble.power_save_tick(false);
    assert_eq!(ble.radio().count(&RadioCall::SetActive(false)), 1);
    assert_eq!(power.unblocks.get(), 1);
    assert_eq!(scheduler.pump(), (5, true));

    // Ticks while asleep change nothing until the wake tick powers the
    // radio back up for the next duty cycle.
    ble.power_save_tick(true);
    assert_eq!(power.blocks.get(), 2);
    assert_eq!(ble.radio().count(&RadioCall::SetActive(true)), 2);
    assert_eq!(scheduler.pump(), (1, false));
}

#[test]
fn link_that_never_negotiates_mtu_is_rejected() {
    let scheduler = MockScheduler::default();
    let power = MockPower::default();
    let queue = LogQueue::new();
    let ble: TestBle<'_> = Ble::new(MockRadio::default(), &scheduler, &power, &queue);
    ble.power_plan_changed(&PLAN);
    ble.start().unwrap();

    ble.radio().mtu_failures.set(3);
    ble.handle_event(RadioEvent::CentralConnected {
        link: ConnHandle::new(4),
    });

    assert_eq!(ble.radio().count(&RadioCall::ExchangeMtu(4)), 3);
    assert_eq!(ble.radio().count(&RadioCall::Disconnect(4)), 1);

    // The rejected link was never tracked: a log line reaches nobody.
    ble.notify_log(b"x");
    assert!(ble.radio().notifies().is_empty());
}
