//! Typed events emitted by backends.
//!
//! Each backend exposes the same ten event names. The payloads carry the raw
//! backend encoding; translation into the canonical vocabulary happens in
//! the orchestration layer.

use cardlink_core::constants::*;
use cardlink_core::{RawValue, Reader, ReaderSoftwareUpdate, StatusReport, UpdateOutcome};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Name of a backend event, with its wire string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventName {
    RequestConnectionToken,
    #[serde(rename = "didReportUnexpectedReaderDisconnect")]
    UnexpectedReaderDisconnect,
    ReadersDiscovered,
    #[serde(rename = "didChangeConnectionStatus")]
    ConnectionStatusChanged,
    #[serde(rename = "didRequestReaderInput")]
    ReaderInputRequested,
    #[serde(rename = "didRequestReaderDisplayMessage")]
    ReaderDisplayMessageRequested,
    #[serde(rename = "didReportAvailableUpdate")]
    AvailableUpdateReported,
    #[serde(rename = "didStartInstallingUpdate")]
    InstallingUpdateStarted,
    #[serde(rename = "didReportReaderSoftwareUpdateProgress")]
    SoftwareUpdateProgress,
    #[serde(rename = "didFinishInstallingUpdate")]
    InstallingUpdateFinished,
}

impl EventName {
    pub const ALL: [EventName; 10] = [
        EventName::RequestConnectionToken,
        EventName::UnexpectedReaderDisconnect,
        EventName::ReadersDiscovered,
        EventName::ConnectionStatusChanged,
        EventName::ReaderInputRequested,
        EventName::ReaderDisplayMessageRequested,
        EventName::AvailableUpdateReported,
        EventName::InstallingUpdateStarted,
        EventName::SoftwareUpdateProgress,
        EventName::InstallingUpdateFinished,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::RequestConnectionToken => EVENT_REQUEST_CONNECTION_TOKEN,
            EventName::UnexpectedReaderDisconnect => EVENT_UNEXPECTED_READER_DISCONNECT,
            EventName::ReadersDiscovered => EVENT_READERS_DISCOVERED,
            EventName::ConnectionStatusChanged => EVENT_CONNECTION_STATUS_CHANGED,
            EventName::ReaderInputRequested => EVENT_READER_INPUT_REQUESTED,
            EventName::ReaderDisplayMessageRequested => EVENT_READER_DISPLAY_MESSAGE_REQUESTED,
            EventName::AvailableUpdateReported => EVENT_AVAILABLE_UPDATE_REPORTED,
            EventName::InstallingUpdateStarted => EVENT_INSTALLING_UPDATE_STARTED,
            EventName::SoftwareUpdateProgress => EVENT_SOFTWARE_UPDATE_PROGRESS,
            EventName::InstallingUpdateFinished => EVENT_INSTALLING_UPDATE_FINISHED,
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventName {
    type Err = cardlink_core::Error;

    fn from_str(s: &str) -> cardlink_core::Result<Self> {
        EventName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| cardlink_core::Error::UnknownName {
                kind: "event",
                value: s.to_string(),
            })
    }
}

/// An event as emitted by one backend.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    /// The backend needs a connection token.
    RequestConnectionToken,

    /// The connected reader went away.
    UnexpectedReaderDisconnect { reader: Option<Reader> },

    /// A discovery tick. Some backends omit the list on an empty tick.
    ReadersDiscovered { readers: Option<Vec<Reader>> },

    ConnectionStatusChanged(StatusReport),

    /// Requested input methods. `android` marks the numeric encoding.
    ReaderInputRequested { value: RawValue, android: bool },

    ReaderDisplayMessageRequested(RawValue),

    AvailableUpdateReported { update: Option<ReaderSoftwareUpdate> },

    InstallingUpdateStarted { update: Option<ReaderSoftwareUpdate> },

    SoftwareUpdateProgress(RawValue),

    InstallingUpdateFinished(UpdateOutcome),
}

impl BackendEvent {
    /// The name this event is delivered under.
    #[must_use]
    pub fn name(&self) -> EventName {
        match self {
            BackendEvent::RequestConnectionToken => EventName::RequestConnectionToken,
            BackendEvent::UnexpectedReaderDisconnect { .. } => {
                EventName::UnexpectedReaderDisconnect
            }
            BackendEvent::ReadersDiscovered { .. } => EventName::ReadersDiscovered,
            BackendEvent::ConnectionStatusChanged(_) => EventName::ConnectionStatusChanged,
            BackendEvent::ReaderInputRequested { .. } => EventName::ReaderInputRequested,
            BackendEvent::ReaderDisplayMessageRequested(_) => {
                EventName::ReaderDisplayMessageRequested
            }
            BackendEvent::AvailableUpdateReported { .. } => EventName::AvailableUpdateReported,
            BackendEvent::InstallingUpdateStarted { .. } => EventName::InstallingUpdateStarted,
            BackendEvent::SoftwareUpdateProgress(_) => EventName::SoftwareUpdateProgress,
            BackendEvent::InstallingUpdateFinished(_) => EventName::InstallingUpdateFinished,
        }
    }
}
