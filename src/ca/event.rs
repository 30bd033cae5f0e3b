use std::{
    fmt,
    sync::{Mutex, mpsc::Sender},
};

use log::warn;

//------------ CaChangedEvent ------------------------------------------------

/// Tells dependent components that the certificate authority changed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CaChangedEvent {
    Created,
    Uploaded,
}

impl fmt::Display for CaChangedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaChangedEvent::Created => write!(f, "CA created"),
            CaChangedEvent::Uploaded => write!(f, "CA uploaded"),
        }
    }
}

//------------ CaChangeListener ----------------------------------------------

/// Receives an event after the CA was persisted.
///
/// Note that at this time the change really happened, so listeners do not
/// have the luxury of failure. Anything that goes wrong is theirs to log.
pub trait CaChangeListener: Send + Sync {
    fn listen(&self, event: &CaChangedEvent);
}

/// Forwards events to a channel.
impl CaChangeListener for Sender<CaChangedEvent> {
    fn listen(&self, event: &CaChangedEvent) {
        if self.send(*event).is_err() {
            warn!("Nobody is listening for '{}' anymore", event);
        }
    }
}

//------------ NoopListener --------------------------------------------------

/// Drops all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopListener;

impl CaChangeListener for NoopListener {
    fn listen(&self, _event: &CaChangedEvent) {}
}

//------------ EventCounter --------------------------------------------------

/// Listener that simply remembers all events
#[derive(Debug, Default)]
pub struct EventCounter {
    events: Mutex<Vec<CaChangedEvent>>,
}

impl EventCounter {
    pub fn total(&self) -> usize {
        self.events().len()
    }

    pub fn events(&self) -> Vec<CaChangedEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl CaChangeListener for EventCounter {
    fn listen(&self, event: &CaChangedEvent) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).push(*event)
    }
}
