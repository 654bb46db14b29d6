#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Event types for inter-component communication
//!
//! Components publish structured events over an unbounded channel; the
//! daemon drains the channel and forwards each event to its log output.
//! Senders never block and never fail: if the receiver is gone the event
//! is dropped.

pub mod events;

pub use events::{
    AppEvent, BackupEvent, ExtractEvent, GeneralEvent, InstallEvent, ProvisionEvent, ScanEvent,
    UpdateEvent,
};

/// Event sender channel type
pub type EventSender = tokio::sync::mpsc::UnboundedSender<AppEvent>;

/// Event receiver channel type
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<AppEvent>;

/// Create a new event channel
#[must_use]
pub fn channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// Trait for components that can emit events
pub trait EventEmitter {
    /// Get the event sender, if one is attached
    fn event_sender(&self) -> Option<&EventSender>;

    /// Emit an event, dropping it silently when no receiver is listening
    fn emit(&self, event: AppEvent) {
        if let Some(sender) = self.event_sender() {
            let _ = sender.send(event);
        }
    }

    /// Emit a debug message event
    fn emit_debug(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::debug(message)));
    }

    /// Emit a warning event
    fn emit_warning(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::warning(message)));
    }

    /// Emit an error event
    fn emit_error(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::error(message)));
    }
}

impl EventEmitter for Option<EventSender> {
    fn event_sender(&self) -> Option<&EventSender> {
        self.as_ref()
    }
}

impl EventEmitter for EventSender {
    fn event_sender(&self) -> Option<&EventSender> {
        Some(self)
    }
}
