use std::io;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use session::{Session, TranscriptProfile};

fn main() -> io::Result<()> {
    for profile in [
        TranscriptProfile::Headset,
        TranscriptProfile::Headphones,
        TranscriptProfile::Bounce,
    ] {
        record_profile(profile)?;
    }
    Ok(())
}

fn record_profile(profile: TranscriptProfile) -> io::Result<()> {
    let mut session = Session::new(profile)?;
    let mut errors = 0;
    for command in profile.script() {
        let responses = session.handle_command(command)?;
        errors += responses
            .iter()
            .filter(|response| response.starts_with("ERR"))
            .count();
    }

    println!(
        "{} -> {} ({} commands, {errors} errors, clock=+{}ms)",
        profile.header(),
        profile.log_path(),
        profile.script().len(),
        session.now().as_millis()
    );
    Ok(())
}
