mod common;

use common::{Bench, Report};
use jack_core::config::KEY_MEDIA;
use jack_core::lines::SwitchKind;
use jack_core::telemetry::JackEventKind;
use jack_core::{ButtonState, DetectionState, PoleType};

/// Four-pole headset seated at t=0 with the button interrupt unmasked.
fn headset_ready() -> Bench {
    let mut bench = Bench::new();
    bench.plug(PoleType::FourPole);
    bench.advance(700);
    assert!(bench.detector.lines().button_irq);
    bench
}

fn key_reports(bench: &Bench) -> Vec<Report> {
    bench
        .reports()
        .iter()
        .copied()
        .skip_while(|report| !matches!(report, Report::Key(..)))
        .collect()
}

#[test]
fn button_is_ignored_without_a_headset() {
    let mut bench = Bench::new();
    bench.press();
    bench.advance(500);
    bench.release();
    bench.advance(500);

    assert!(bench.reports().is_empty());
    assert_eq!(bench.detector.jack_state().button, ButtonState::Released);
}

#[test]
fn press_and_release_emit_exactly_two_key_events() {
    let mut bench = headset_ready();

    bench.press();
    bench.advance(199);
    assert!(bench.sink().keys().is_empty());
    bench.advance(1);
    assert_eq!(bench.sink().keys(), vec![true]);

    bench.release();
    bench.advance(200);
    assert_eq!(
        key_reports(&bench),
        vec![
            Report::Key(KEY_MEDIA, true),
            Report::Sync,
            Report::Key(KEY_MEDIA, false),
            Report::Sync,
        ]
    );

    let released = bench.detector.telemetry().latest().copied().unwrap();
    assert_eq!(released.event, JackEventKind::ButtonReleased);
    assert_eq!(released.held_for, Some(core::time::Duration::from_millis(200)));
}

#[test]
fn chattering_button_reports_a_single_press() {
    let mut bench = headset_ready();
    bench.press();
    bench.advance(50);
    bench.release();
    bench.advance(50);
    bench.press();
    bench.advance(500);

    assert_eq!(bench.sink().keys(), vec![true]);
}

#[test]
fn button_is_masked_during_enable_guard() {
    let mut bench = Bench::new();
    bench.plug(PoleType::FourPole);
    bench.advance(300);
    assert_eq!(bench.detector.detection(), DetectionState::HeadsetWithMic);
    assert!(!bench.detector.lines().button_irq);

    bench.press();
    bench.advance(250);
    assert!(bench.sink().keys().is_empty());

    bench.release();
    bench.advance(1_000);
    assert!(bench.sink().keys().is_empty());
    assert!(bench.detector.lines().button_irq);
}

#[test]
fn removal_while_pressed_releases_key_before_switches() {
    let mut bench = headset_ready();
    bench.press();
    bench.advance(250);

    bench.unplug();
    bench.advance(50);

    assert_eq!(
        key_reports(&bench),
        vec![
            Report::Key(KEY_MEDIA, true),
            Report::Sync,
            Report::Key(KEY_MEDIA, false),
            Report::Sync,
            Report::Switch(SwitchKind::HeadphoneInsert, false),
            Report::Switch(SwitchKind::MicrophoneInsert, false),
            Report::Sync,
        ]
    );
    assert!(!bench.detector.lines().button_irq);
    assert_eq!(bench.detector.jack_state().button, ButtonState::Released);
}

#[test]
fn synthetic_release_on_removal_keeps_hold_time() {
    let mut bench = headset_ready();
    bench.press();
    bench.advance(250);
    bench.unplug();
    bench.advance(50);

    let released = bench
        .detector
        .telemetry()
        .oldest_first()
        .find(|record| record.event == JackEventKind::ButtonReleased)
        .copied()
        .unwrap();
    assert_eq!(released.held_for, Some(core::time::Duration::from_millis(70)));
}

#[test]
fn replug_inside_confirm_window_drops_stale_press() {
    let mut bench = headset_ready();
    bench.press();
    bench.advance(10);
    bench.unplug();
    bench.advance(30);
    bench.plug(PoleType::FourPole);
    bench.advance(240);

    assert_eq!(bench.detector.detection(), DetectionState::HeadsetWithMic);
    assert!(!bench.detector.lines().button_irq, "still inside the enable guard");
    assert!(bench.sink().keys().is_empty());

    bench.advance(600);
    assert!(bench.detector.lines().button_irq);
    assert!(bench.sink().keys().is_empty());
    assert_eq!(bench.detector.jack_state().button, ButtonState::Released);
}

#[test]
fn press_confirm_after_unplug_is_dropped() {
    let mut bench = headset_ready();
    bench.press();
    bench.advance(100);
    bench.unplug();
    bench.advance(500);

    assert!(bench.sink().keys().is_empty());
    assert_eq!(
        bench.sink().switches(SwitchKind::MicrophoneInsert),
        vec![true, false]
    );
}

#[test]
fn reinsert_as_headphones_keeps_button_masked() {
    let mut bench = Bench::new();
    bench.plug(PoleType::FourPole);
    bench.advance(100);
    bench.unplug();
    bench.advance(100);
    bench.plug(PoleType::ThreePole);
    bench.advance(1_000);

    assert_eq!(bench.detector.detection(), DetectionState::HeadsetNoMic);
    assert!(!bench.detector.lines().button_irq);
}
