use std::cell::Cell;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::ops::Add;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use jack_core::config::{DetectorConfig, KEY_MEDIA, LineMap};
use jack_core::console::catalog;
use jack_core::console::grammar::{ButtonCommand, Command, parse};
use jack_core::console::status::{StatusFormatter, StatusSnapshot};
use jack_core::lines::{LineId, SwitchKind};
use jack_core::telemetry::TelemetryInstant;
use jack_core::{
    Capabilities, Detector, EventSink, JackLines, Level, LineRole, MicBias, PoleType, StateQuery,
    SuspendBlocker,
};

/// Line numbers the bench pretends to own.
pub const BENCH_LINES: LineMap = LineMap::new(LineId(26), LineId(29), LineId(41), LineId(127));

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TranscriptProfile {
    Interactive,
    Headset,
    Headphones,
    Bounce,
}

impl TranscriptProfile {
    pub fn log_path(self) -> &'static str {
        match self {
            TranscriptProfile::Interactive => "transcripts/emulator-interactive.log",
            TranscriptProfile::Headset => "transcripts/emulator-headset.log",
            TranscriptProfile::Headphones => "transcripts/emulator-headphones.log",
            TranscriptProfile::Bounce => "transcripts/emulator-bounce.log",
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            TranscriptProfile::Interactive => "Headset jack emulator session transcript",
            TranscriptProfile::Headset => "Headset jack emulator 4-pole headset transcript",
            TranscriptProfile::Headphones => "Headset jack emulator 3-pole headphones transcript",
            TranscriptProfile::Bounce => "Headset jack emulator contact bounce transcript",
        }
    }

    /// Commands replayed for the profile before any interactive input.
    pub fn script(self) -> &'static [&'static str] {
        match self {
            TranscriptProfile::Interactive => &[],
            TranscriptProfile::Headset => &[
                "status",
                "plug headset",
                "wait 40ms",
                "status",
                "wait 600ms",
                "button press",
                "wait 250ms",
                "button release",
                "wait 250ms",
                "button tap 500ms",
                "wait 250ms",
                "unplug",
                "wait 40ms",
                "log",
            ],
            TranscriptProfile::Headphones => &[
                "plug headphones",
                "wait 40ms",
                "button press",
                "wait 700ms",
                "button release",
                "status",
                "unplug",
                "wait 40ms",
                "log",
            ],
            TranscriptProfile::Bounce => &[
                "plug",
                "wait 5ms",
                "unplug",
                "wait 5ms",
                "plug",
                "wait 40ms",
                "unplug",
                "wait 40ms",
                "plug",
                "wait 25ms",
                "unplug",
                "wait 40ms",
                "status",
                "log",
            ],
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, String> {
        if tag.eq_ignore_ascii_case("interactive") {
            Ok(Self::Interactive)
        } else if tag.eq_ignore_ascii_case("headset") {
            Ok(Self::Headset)
        } else if tag.eq_ignore_ascii_case("headphones") {
            Ok(Self::Headphones)
        } else if tag.eq_ignore_ascii_case("bounce") {
            Ok(Self::Bounce)
        } else {
            Err(format!("Unknown transcript profile `{tag}`"))
        }
    }
}

/// Millisecond tick of the emulator's virtual clock.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct VirtualInstant(u64);

impl VirtualInstant {
    pub const fn as_millis(self) -> u64 {
        self.0
    }
}

impl Add<Duration> for VirtualInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        let millis = u64::try_from(rhs.as_millis()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(millis))
    }
}

impl TelemetryInstant for VirtualInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

type Clock = Rc<Cell<VirtualInstant>>;

/// Simulated jack switch. Idle levels match an empty socket.
#[derive(Debug)]
pub struct BenchLines {
    detect: Level,
    pole: Level,
    button: Level,
    mic_enable: bool,
    button_irq: bool,
}

impl BenchLines {
    const fn idle() -> Self {
        Self {
            detect: Level::High,
            pole: Level::High,
            button: Level::Low,
            mic_enable: false,
            button_irq: false,
        }
    }

    pub fn button_irq(&self) -> bool {
        self.button_irq
    }

    pub fn mic_enable(&self) -> bool {
        self.mic_enable
    }
}

impl JackLines for BenchLines {
    fn read(&mut self, line: LineRole) -> Level {
        match line {
            LineRole::Detect => self.detect,
            LineRole::PoleType => self.pole,
            LineRole::Button => self.button,
            LineRole::MicEnable if self.mic_enable => Level::High,
            LineRole::MicEnable => Level::Low,
        }
    }

    fn set_mic_enable(&mut self, enabled: bool) {
        self.mic_enable = enabled;
    }

    fn set_button_irq(&mut self, enabled: bool) {
        self.button_irq = enabled;
    }
}

#[derive(Debug, Default)]
pub struct BenchBias {
    enabled: bool,
}

impl BenchBias {
    pub fn enabled(&self) -> bool {
        self.enabled
    }
}

impl MicBias for BenchBias {
    fn set(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

/// Collects reports into one `EVT` line per sync batch.
pub struct BenchSink {
    clock: Clock,
    batch: Vec<String>,
    events: Vec<String>,
}

impl BenchSink {
    fn new(clock: Clock) -> Self {
        Self {
            clock,
            batch: Vec::new(),
            events: Vec::new(),
        }
    }

    fn take_events(&mut self) -> Vec<String> {
        std::mem::take(&mut self.events)
    }
}

impl EventSink for BenchSink {
    fn report_switch(&mut self, switch: SwitchKind, active: bool) {
        self.batch
            .push(format!("{}={}", switch.label(), u8::from(active)));
    }

    fn report_key(&mut self, code: u16, pressed: bool) {
        self.batch.push(format!("KEY({code})={}", u8::from(pressed)));
    }

    fn sync(&mut self) {
        let at = self.clock.get().as_millis();
        let reports = self.batch.join(" ");
        self.batch.clear();
        self.events.push(format!("EVT +{at}ms {reports} SYN"));
    }
}

/// Tracks how long the bench would be kept out of suspend.
pub struct WakeWindow {
    clock: Clock,
    until: VirtualInstant,
    holds: usize,
}

impl WakeWindow {
    fn new(clock: Clock) -> Self {
        Self {
            clock,
            until: VirtualInstant::default(),
            holds: 0,
        }
    }

    pub fn until(&self) -> VirtualInstant {
        self.until
    }

    pub fn holds(&self) -> usize {
        self.holds
    }
}

impl SuspendBlocker for WakeWindow {
    fn hold(&mut self, window: Duration) {
        let until = self.clock.get() + window;
        self.until = self.until.max(until);
        self.holds += 1;
    }
}

pub type BenchDetector = Detector<VirtualInstant, BenchLines, BenchBias, BenchSink, WakeWindow>;

pub struct Session {
    detector: BenchDetector,
    clock: Clock,
    transcript: TranscriptLogger,
}

impl Session {
    pub fn new(profile: TranscriptProfile) -> io::Result<Self> {
        Self::with_transcript(TranscriptLogger::create(profile)?)
    }

    pub fn with_transcript(transcript: TranscriptLogger) -> io::Result<Self> {
        let clock: Clock = Rc::new(Cell::new(VirtualInstant::default()));
        let capabilities = Capabilities {
            lines: BenchLines::idle(),
            bias: BenchBias::default(),
            sink: BenchSink::new(Rc::clone(&clock)),
            suspend: WakeWindow::new(Rc::clone(&clock)),
        };
        let detector =
            Detector::attach_new(DetectorConfig::new(BENCH_LINES, KEY_MEDIA), capabilities, clock.get())
                .map_err(|err| io::Error::other(err.to_string()))?;

        Ok(Self {
            detector,
            clock,
            transcript,
        })
    }

    pub fn now(&self) -> VirtualInstant {
        self.clock.get()
    }

    pub fn detector(&self) -> &BenchDetector {
        &self.detector
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        self.transcript
            .append_line(self.clock.get(), TranscriptRole::Host, trimmed)?;

        let lines = match parse(trimmed) {
            Ok(command) => self.execute(command)?,
            Err(err) => vec![format!("ERR syntax {err}")],
        };

        self.record_output(&lines)?;
        Ok(lines)
    }

    fn execute(&mut self, command: Command<'_>) -> io::Result<Vec<String>> {
        let mut lines = match command {
            Command::Plug(pole) => self.plug(pole),
            Command::Unplug => self.unplug(),
            Command::Button(ButtonCommand::Press) => self.press(),
            Command::Button(ButtonCommand::Release) => self.release(),
            Command::Button(ButtonCommand::Tap(hold)) => self.tap(hold),
            Command::Wait(span) => {
                self.advance(span);
                vec![format!(
                    "OK wait {} now=+{}ms",
                    format_duration_short(span),
                    self.clock.get().as_millis()
                )]
            }
            Command::Status => self.status()?,
            Command::Log => self.log(),
            Command::Help(help) => help_lines(help.topic),
        };

        lines.append(&mut self.detector.sink_mut().take_events());
        Ok(lines)
    }

    fn plug(&mut self, pole: PoleType) -> Vec<String> {
        let bench = self.detector.lines_mut();
        if bench.detect.is_low() {
            return vec!["ERR plug already inserted".to_string()];
        }
        bench.pole = pole.level();
        bench.detect = Level::Low;

        self.detector.on_jack_edge(Level::Low, self.clock.get());
        vec![format!("OK plug {pole} detect=low")]
    }

    fn unplug(&mut self) -> Vec<String> {
        if self.detector.lines().detect.is_high() {
            return vec!["ERR no plug inserted".to_string()];
        }

        let mut lines = vec!["OK unplug detect=high".to_string()];
        // Pulling the plug opens the button contact as well.
        if self.detector.lines().button.is_high() {
            lines.extend(self.drive_button(Level::Low));
        }

        let bench = self.detector.lines_mut();
        bench.detect = Level::High;
        bench.pole = Level::High;
        self.detector.on_jack_edge(Level::High, self.clock.get());
        lines
    }

    fn press(&mut self) -> Vec<String> {
        let bench = self.detector.lines();
        if bench.detect.is_high() {
            return vec!["ERR no plug inserted".to_string()];
        }
        if bench.button.is_high() {
            return vec!["ERR button already pressed".to_string()];
        }

        let mut lines = vec!["OK button press".to_string()];
        lines.extend(self.drive_button(Level::High));
        lines
    }

    fn release(&mut self) -> Vec<String> {
        if self.detector.lines().button.is_low() {
            return vec!["ERR button not pressed".to_string()];
        }

        let mut lines = vec!["OK button release".to_string()];
        lines.extend(self.drive_button(Level::Low));
        lines
    }

    fn tap(&mut self, hold: Duration) -> Vec<String> {
        let mut lines = self.press();
        if lines.first().is_some_and(|line| line.starts_with("ERR")) {
            return lines;
        }
        lines[0] = format!("OK button tap {}", format_duration_short(hold));

        self.advance(hold);
        lines.extend(self.drive_button(Level::Low));
        lines
    }

    /// Moves the key line and raises the edge only while the interrupt is unmasked.
    fn drive_button(&mut self, level: Level) -> Option<String> {
        let bench = self.detector.lines_mut();
        bench.button = level;
        if !bench.button_irq {
            return Some("key edge masked (button irq off)".to_string());
        }

        self.detector.on_button_edge(level, self.clock.get());
        None
    }

    /// Runs every wakeup up to `now + span` at its own virtual time.
    fn advance(&mut self, span: Duration) {
        let target = self.clock.get() + span;
        while let Some(wakeup) = self.detector.next_wakeup() {
            if wakeup > target {
                break;
            }
            let at = wakeup.max(self.clock.get());
            self.clock.set(at);
            self.detector.poll(at);
        }
        self.clock.set(target);
        self.detector.poll(target);
    }

    fn status(&mut self) -> io::Result<Vec<String>> {
        let now = self.clock.get();
        let snapshot = StatusSnapshot::capture(&mut self.detector, now);
        let formatter = StatusFormatter::new(&snapshot);

        let mut state = String::new();
        formatter
            .write_state_line(&mut state)
            .map_err(io::Error::other)?;
        let mut levels = String::new();
        formatter
            .write_lines_line(&mut levels)
            .map_err(io::Error::other)?;
        let mut queue = String::new();
        formatter
            .write_queue_line(&mut queue)
            .map_err(io::Error::other)?;

        let wake = self.detector.suspend();
        let device = format!(
            "device {} state={} bias={} clock=+{}ms awake-until=+{}ms holds={}",
            self.detector.name(),
            StateQuery::state(&self.detector),
            if self.detector.bias().enabled() { "on" } else { "off" },
            now.as_millis(),
            wake.until().as_millis(),
            wake.holds(),
        );

        Ok(vec![state, levels, queue, device])
    }

    fn log(&self) -> Vec<String> {
        let telemetry = self.detector.telemetry();
        if telemetry.is_empty() {
            return vec!["log empty".to_string()];
        }

        let mut lines = vec![format!("log records={}", telemetry.len())];
        for record in telemetry.oldest_first() {
            let mut line = format!(
                "  #{} +{}ms {}",
                record.id,
                record.timestamp.as_millis(),
                record.event
            );
            if let Some(held) = record.held_for {
                line.push_str(" held=");
                line.push_str(&format_duration_short(held));
            }
            lines.push(line);
        }
        lines
    }

    fn record_output(&mut self, lines: &[String]) -> io::Result<()> {
        let at = self.clock.get();
        for line in lines {
            self.transcript
                .append_line(at, TranscriptRole::Emulator, line)?;
        }
        Ok(())
    }
}

fn help_lines(topic: Option<&str>) -> Vec<String> {
    match topic {
        Some(name) => match catalog::find(name) {
            Some(spec) => vec![spec.summary.to_string()],
            None => vec![
                format!("No help available for `{name}`."),
                format!("Available topics: {}", help_topic_list()),
            ],
        },
        None => {
            let mut lines = vec!["Available commands:".to_string()];
            for spec in catalog::commands() {
                lines.push(format!("  {}", spec.summary));
            }
            lines.push("Type `help <command>` for a specific command.".to_string());
            lines
        }
    }
}

fn help_topic_list() -> String {
    catalog::commands()
        .iter()
        .map(|spec| spec.name)
        .collect::<Vec<_>>()
        .join(", ")
}

pub struct TranscriptLogger {
    writer: Box<dyn Write>,
}

impl TranscriptLogger {
    pub fn create(profile: TranscriptProfile) -> io::Result<Self> {
        let path = Path::new(profile.log_path());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = File::create(path)?;
        let mut logger = Self {
            writer: Box::new(BufWriter::new(file)),
        };

        logger.write_header(profile)?;
        Ok(logger)
    }

    /// Logger that drops everything; used when no transcript is wanted.
    pub fn discard() -> Self {
        Self {
            writer: Box::new(io::sink()),
        }
    }

    fn write_header(&mut self, profile: TranscriptProfile) -> io::Result<()> {
        writeln!(self.writer, "# {}", profile.header())?;
        writeln!(
            self.writer,
            "# Timestamps are virtual milliseconds since the detector attached"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        at: VirtualInstant,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            at.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

fn format_duration_short(duration: Duration) -> String {
    if duration.as_secs() == 0 {
        format!("{}ms", duration.as_millis())
    } else {
        format!("{:.3}s", duration.as_secs_f64())
    }
}
