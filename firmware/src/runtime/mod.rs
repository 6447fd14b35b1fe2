use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Input, Level as PinLevel, Output, Pull, Speed};
use embassy_sync::channel::Channel;
use jack_core::{Capabilities, Detector};

use crate::hw::{self, BoardLines, MicBiasPin, WakeWindow};
use crate::jack::{EdgeQueue, FirmwareInstant, LoggingSink};

mod irq_task;
mod worker_task;

pub(crate) type FirmwareDetector =
    Detector<FirmwareInstant, BoardLines, MicBiasPin, LoggingSink, WakeWindow>;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

pub(super) static EDGE_QUEUE: EdgeQueue = Channel::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0,
        PA1,
        PA6,
        PA7,
        PB3,
        EXTI0,
        EXTI1,
        ..
    } = hal::init(config);

    let detect = ExtiInput::new(PA0, EXTI0, Pull::Up);
    let key = ExtiInput::new(PA1, EXTI1, Pull::Down);

    let lines = BoardLines::new(
        Input::new(PA6, Pull::None),
        Output::new(PA7, PinLevel::Low, Speed::Low),
    );
    let bias = MicBiasPin::new(Output::new(PB3, PinLevel::Low, Speed::Low));

    let config = hw::board_config();
    defmt::info!(
        "jack: attaching {} (keypad {}) key={}",
        config.switch_name,
        config.keypad_name,
        config.key_code
    );
    let detector: FirmwareDetector = Detector::attach_new(
        config,
        Capabilities {
            lines,
            bias,
            sink: LoggingSink::new(),
            suspend: WakeWindow,
        },
        FirmwareInstant::now(),
    )
    .expect("jack detector attach");

    spawner
        .spawn(worker_task::run(detector, EDGE_QUEUE.receiver()))
        .expect("failed to spawn jack worker task");
    spawner
        .spawn(irq_task::detect(detect, EDGE_QUEUE.sender()))
        .expect("failed to spawn detect interrupt task");
    spawner
        .spawn(irq_task::key(key, EDGE_QUEUE.sender()))
        .expect("failed to spawn key interrupt task");

    core::future::pending::<()>().await;
}
