use crate::scheduler::CountdownTick;
use crate::utils::format_countdown;
use std::io::IsTerminal;

#[cfg(feature = "progress")]
mod backend {
    use indicatif::{ProgressBar, ProgressStyle};
    use std::time::Duration;

    pub struct Backend(ProgressBar);

    impl Backend {
        pub fn new() -> Self {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
                pb.set_style(style);
            }
            pb.enable_steady_tick(Duration::from_millis(200));
            Self(pb)
        }

        pub fn show(&self, message: String) {
            self.0.set_message(message);
        }

        pub fn println(&self, line: &str) {
            self.0.println(line);
        }

        pub fn finish(&self) {
            self.0.finish_and_clear();
        }
    }
}

#[cfg(not(feature = "progress"))]
mod backend {
    use std::io::Write;

    pub struct Backend;

    impl Backend {
        pub fn new() -> Self {
            Self
        }

        pub fn show(&self, message: String) {
            let mut stderr = std::io::stderr();
            let _ = write!(stderr, "\r\x1b[2K{message}");
            let _ = stderr.flush();
        }

        pub fn println(&self, line: &str) {
            eprint!("\r\x1b[2K");
            println!("{line}");
        }

        pub fn finish(&self) {
            eprintln!();
        }
    }
}

/// Live "next backup in ..." line for the terminal.
///
/// Log lines go through `println` so they do not tear the countdown line.
pub struct CountdownDisplay {
    backend: Option<backend::Backend>,
}

impl CountdownDisplay {
    /// Only draws when requested and stderr is a terminal
    pub fn new(enabled: bool) -> Self {
        let enabled = enabled && std::io::stderr().is_terminal();
        Self {
            backend: enabled.then(backend::Backend::new),
        }
    }

    pub fn message(seconds_remaining: u64) -> String {
        format!("Next backup in {}", format_countdown(seconds_remaining))
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub fn update(&self, tick: CountdownTick) {
        if let Some(ref backend) = self.backend {
            backend.show(Self::message(tick.seconds_remaining));
        }
    }

    pub fn println(&self, line: &str) {
        match self.backend {
            Some(ref backend) => backend.println(line),
            None => println!("{line}"),
        }
    }

    pub fn finish(&self) {
        if let Some(ref backend) = self.backend {
            backend.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message() {
        assert_eq!(CountdownDisplay::message(5), "Next backup in 5s");
        assert_eq!(CountdownDisplay::message(90), "Next backup in 1m 30s");
        assert_eq!(CountdownDisplay::message(3661), "Next backup in 1h 1m 1s");
    }

    #[test]
    fn test_disabled_display_is_inert() {
        let display = CountdownDisplay::new(false);
        assert!(!display.is_enabled());

        display.update(CountdownTick {
            seconds_remaining: 10,
        });
        display.println("line");
        display.finish();
    }
}
