//! Password prompt with terminal echo turned off.

use nix::sys::termios::{self, LocalFlags, SetArg};
use std::io::{self, BufRead, Write};

/// Prompts on stderr and reads one line from stdin.
///
/// Echo is disabled while reading when stdin is a terminal; piped input is
/// read as is.
pub fn prompt_password(prompt: &str) -> io::Result<String> {
    let stdin = io::stdin();
    eprint!("{prompt}");
    io::stderr().flush()?;

    let saved = termios::tcgetattr(&stdin).ok();
    if let Some(original) = &saved {
        let mut hidden = original.clone();
        hidden.local_flags.remove(LocalFlags::ECHO);
        hidden.local_flags.insert(LocalFlags::ECHONL);
        termios::tcsetattr(&stdin, SetArg::TCSANOW, &hidden).map_err(io::Error::from)?;
    }

    let mut line = String::new();
    let read = stdin.lock().read_line(&mut line);

    if let Some(original) = &saved {
        termios::tcsetattr(&stdin, SetArg::TCSANOW, original).map_err(io::Error::from)?;
    }
    read?;

    Ok(strip_line_ending(&line).to_string())
}

fn strip_line_ending(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}
