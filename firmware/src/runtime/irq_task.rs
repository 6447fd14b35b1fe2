//! Edge handlers for the detect and key lines.
//!
//! Each handler samples the level, holds off suspend, and forwards a
//! timestamped edge to the worker. They never block and never touch jack
//! state directly.

use embassy_stm32::exti::ExtiInput;
use jack_core::config::SUSPEND_BLOCK_WINDOW;
use jack_core::{Level, SuspendBlocker};

use crate::hw::WakeWindow;
use crate::jack::{EdgeSender, EdgeSource, FirmwareInstant, LineEdge};
use crate::status;

fn sample(line: &ExtiInput<'static>) -> Level {
    if line.is_high() { Level::High } else { Level::Low }
}

#[embassy_executor::task]
pub async fn detect(mut line: ExtiInput<'static>, edges: EdgeSender<'static>) -> ! {
    loop {
        line.wait_for_any_edge().await;
        let level = sample(&line);
        WakeWindow.hold(SUSPEND_BLOCK_WINDOW);
        forward(&edges, EdgeSource::Detect, level);
    }
}

#[embassy_executor::task]
pub async fn key(mut line: ExtiInput<'static>, edges: EdgeSender<'static>) -> ! {
    loop {
        line.wait_for_any_edge().await;
        let level = sample(&line);
        // Masked until a four-pole headset has been seated for the guard delay.
        if !status::button_irq_enabled() {
            continue;
        }
        WakeWindow.hold(SUSPEND_BLOCK_WINDOW);
        forward(&edges, EdgeSource::Button, level);
    }
}

fn forward(edges: &EdgeSender<'static>, source: EdgeSource, level: Level) {
    let edge = LineEdge {
        source,
        level,
        at: FirmwareInstant::now(),
    };
    if edges.try_send(edge).is_err() {
        defmt::warn!("jack: edge queue full, dropped {} edge", source.label());
    }
}
