use std::{
    convert::Infallible,
    io::{self, BufRead},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, TryRecvError},
    },
    thread,
};

use log::{debug, warn};
use readily_engine::input::{InputProvider, Key, ViewportEvent};

#[derive(Debug, PartialEq)]
enum Command {
    Event(ViewportEvent),
    Quit,
}

/// Line commands read on a background thread and drained by the session tick.
pub(super) struct StdinInput {
    events: Receiver<ViewportEvent>,
}

impl StdinInput {
    /// Returns the provider plus a flag raised by the `q` command.
    pub(super) fn spawn() -> (Self, Arc<AtomicBool>) {
        let (tx, rx) = mpsc::channel();
        let quit = Arc::new(AtomicBool::new(false));
        let quit_flag = Arc::clone(&quit);

        thread::spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                match parse_command(&line) {
                    Some(Command::Event(event)) => {
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                    Some(Command::Quit) => {
                        quit_flag.store(true, Ordering::Relaxed);
                        break;
                    }
                    None => warn!("input: unknown command {:?}", line.trim()),
                }
            }
            debug!("input: stdin closed");
        });

        (Self { events: rx }, quit)
    }
}

impl InputProvider for StdinInput {
    type Error = Infallible;

    fn poll_event(&mut self) -> Result<Option<ViewportEvent>, Self::Error> {
        match self.events.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => Ok(None),
        }
    }
}

fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    let key = match line {
        "" | "p" => Key::Space,
        "+" => Key::Up,
        "-" => Key::Down,
        "n" => Key::Right,
        "b" => Key::Left,
        "f" => Key::PageDown,
        "r" => Key::PageUp,
        "h" => Key::Home,
        "a" => Key::A,
        "w" => return Some(Command::Event(ViewportEvent::Wheel)),
        "q" => return Some(Command::Quit),
        _ => {
            let percent = line.strip_prefix("s ")?.trim().parse().ok()?;
            return Some(Command::Event(ViewportEvent::Seek { percent }));
        }
    };
    Some(Command::Event(ViewportEvent::Key(key)))
}
