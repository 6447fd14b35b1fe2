use embassy_futures::select::{Either, select};
use embassy_time::Timer;

use super::FirmwareDetector;
use crate::jack::{EdgeReceiver, EdgeSource, FirmwareInstant, LineEdge};
use crate::status;
use crate::telemetry::TelemetryDrain;

/// Single ordered worker: applies edges, runs due tasks, then sleeps until
/// the next deadline or the next edge.
#[embassy_executor::task]
pub async fn run(mut detector: FirmwareDetector, edges: EdgeReceiver<'static>) -> ! {
    let mut drain = TelemetryDrain::new();

    loop {
        let edge = match detector.next_wakeup() {
            Some(deadline) => {
                match select(edges.receive(), Timer::at(deadline.into_embassy())).await {
                    Either::First(edge) => Some(edge),
                    Either::Second(()) => None,
                }
            }
            None => Some(edges.receive().await),
        };

        if let Some(edge) = edge {
            deliver(&mut detector, edge);
        }

        let now = FirmwareInstant::now();
        let steps = detector.poll(now);
        drain.drain(detector.telemetry());
        status::publish(detector.jack_state());

        if steps > 0 && detector.next_wakeup().is_none() {
            defmt::debug!(
                "jack: idle state={} suspend-blocked={}",
                detector.detection().as_raw(),
                status::suspend_blocked(now.as_millis())
            );
        }
    }
}

fn deliver(detector: &mut FirmwareDetector, edge: LineEdge) {
    defmt::trace!(
        "jack: {} edge level={} t={}ms",
        edge.source.label(),
        edge.level.is_high(),
        edge.at.as_millis()
    );
    match edge.source {
        EdgeSource::Detect => detector.on_jack_edge(edge.level, edge.at),
        EdgeSource::Button => detector.on_button_edge(edge.level, edge.at),
    }
}
