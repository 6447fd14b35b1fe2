mod session;

use std::env;
use std::io::{self, BufRead, IsTerminal, Write};
use std::process;

use crossterm::queue;
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use session::{Session, TranscriptProfile};

fn main() -> io::Result<()> {
    let profile = parse_profile().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!(
            "Usage: jack-emulator [--profile <interactive|headset|headphones|bounce>] | jack-emulator <profile>"
        );
        process::exit(2);
    });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let styled = stdout.is_terminal();
    let mut writer = stdout.lock();
    let mut session = Session::new(profile)?;
    let mut line = String::new();

    writeln!(
        writer,
        "Headset Jack Emulator ready. Type `help` for commands or `exit` to quit."
    )?;

    for command in profile.script() {
        writeln!(writer, "> {command}")?;
        for response in session.handle_command(command)? {
            write_response(&mut writer, &response, styled)?;
        }
    }

    loop {
        line.clear();
        write!(writer, "[+{}ms] > ", session.now().as_millis())?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        let responses = session.handle_command(trimmed)?;
        for response in responses {
            write_response(&mut writer, &response, styled)?;
        }
    }

    Ok(())
}

fn write_response<W: Write>(writer: &mut W, response: &str, styled: bool) -> io::Result<()> {
    if !styled {
        return writeln!(writer, "{response}");
    }

    queue!(
        writer,
        SetForegroundColor(response_color(response)),
        Print(response),
        ResetColor,
        Print('\n')
    )?;
    writer.flush()
}

fn response_color(response: &str) -> Color {
    if response.starts_with("ERR") {
        Color::Red
    } else if response.starts_with("EVT") {
        Color::Cyan
    } else if response.starts_with("OK") {
        Color::Green
    } else {
        Color::Reset
    }
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_profile() -> Result<TranscriptProfile, String> {
    let mut args = env::args().skip(1);
    if let Some(arg) = args.next() {
        if let Some(value) = arg.strip_prefix("--profile=") {
            TranscriptProfile::from_tag(value)
        } else if arg == "--profile" {
            if let Some(value) = args.next() {
                TranscriptProfile::from_tag(&value)
            } else {
                Err("Expected value after --profile".to_string())
            }
        } else {
            TranscriptProfile::from_tag(&arg)
        }
    } else {
        Ok(TranscriptProfile::Interactive)
    }
}
