//! Translation of backend-specific encodings into the canonical vocabulary.
//!
//! Every function here is total: unrecognized input yields `None` rather
//! than an error, and the caller decides what an unrecognized value means.

use crate::constants::UNKNOWN_SOFTWARE_VERSION;
use crate::types::{
    ConnectionStatus, PaymentIntent, RawValue, Reader, ReaderDisplayMessage, ReaderInputOptions,
    ReaderSoftwareUpdate, SimulatedCardType, SimulatorConfiguration, SimulatorReport,
    StatusEncoding, StatusReport, UpdateOutcome,
};

// ============================================================================
// Readers
// ============================================================================

/// Normalize one reader snapshot.
///
/// A battery level of exactly zero is what backends report while scanning
/// without a reading, so it becomes unknown. The literal software version
/// `"unknown"` becomes unknown as well.
#[must_use]
pub fn normalize_reader(mut reader: Reader) -> Reader {
    if reader.battery_level == Some(0.0) {
        reader.battery_level = None;
    }
    if reader.device_software_version.as_deref() == Some(UNKNOWN_SOFTWARE_VERSION) {
        reader.device_software_version = None;
    }
    reader
}

/// Normalize a discovery tick. A tick without a list is an empty list.
#[must_use]
pub fn normalize_readers(readers: Option<Vec<Reader>>) -> Vec<Reader> {
    readers
        .unwrap_or_default()
        .into_iter()
        .map(normalize_reader)
        .collect()
}

// ============================================================================
// Connection Status
// ============================================================================

/// Translate a reported connection status. Unknown codes yield `None`.
#[must_use]
pub fn translate_connection_status(report: StatusReport) -> Option<ConnectionStatus> {
    match (report.encoding, report.code) {
        (_, 0) => Some(ConnectionStatus::NotConnected),
        (StatusEncoding::Canonical, 1) | (StatusEncoding::AndroidOrdinal, 2) => {
            Some(ConnectionStatus::Connected)
        }
        (StatusEncoding::Canonical, 2) | (StatusEncoding::AndroidOrdinal, 1) => {
            Some(ConnectionStatus::Connecting)
        }
        _ => None,
    }
}

// ============================================================================
// Loose Numbers
// ============================================================================

/// Read a number the way a lenient float parser does: surrounding whitespace
/// is ignored and trailing garbage after the longest numeric prefix is
/// dropped. Non-finite results yield `None`.
#[must_use]
pub fn parse_numeric(value: &RawValue) -> Option<f64> {
    let number = match value {
        RawValue::Number(n) => *n,
        RawValue::Text(text) => parse_float_prefix(text.trim())?,
    };
    number.is_finite().then_some(number)
}

fn parse_float_prefix(text: &str) -> Option<f64> {
    if let Ok(n) = text.parse::<f64>() {
        return Some(n);
    }
    let end = text
        .char_indices()
        .take_while(|(i, c)| {
            c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E') || (*i == 0 && matches!(c, '+' | '-'))
        })
        .map(|(i, c)| i + c.len_utf8())
        .last()?;
    (1..=end)
        .rev()
        .filter(|len| text.is_char_boundary(*len))
        .find_map(|len| text[..len].parse::<f64>().ok())
}

fn integral(value: f64) -> Option<i64> {
    (value.fract() == 0.0 && value >= i64::MIN as f64 && value <= i64::MAX as f64)
        .then_some(value as i64)
}

/// Reader input options from a reported value.
///
/// Android backends report the bitmask as a number which passes through as
/// is; other backends send it as text.
#[must_use]
pub fn reader_input_options(value: &RawValue, android: bool) -> Option<ReaderInputOptions> {
    let number = match (android, value) {
        (true, RawValue::Number(n)) => *n,
        (true, RawValue::Text(_)) => return None,
        (false, _) => parse_numeric(value)?,
    };
    let bits = integral(number)?;
    u32::try_from(bits).ok().map(ReaderInputOptions::from_bits)
}

/// Reader display message from a reported value.
#[must_use]
pub fn reader_display_message(value: &RawValue) -> Option<ReaderDisplayMessage> {
    let code = integral(parse_numeric(value)?)?;
    ReaderDisplayMessage::try_from(code).ok()
}

/// Software update progress from a reported value.
#[must_use]
pub fn update_progress(value: &RawValue) -> Option<f32> {
    parse_numeric(value).map(|p| p as f32)
}

// ============================================================================
// Simulator
// ============================================================================

/// Translate a backend's simulator report. A reported card name goes
/// through the name table, and an unrecognized name becomes no card.
#[must_use]
pub fn simulator_configuration(report: SimulatorReport) -> SimulatorConfiguration {
    SimulatorConfiguration {
        available_reader_update: report.available_reader_update,
        simulated_card: report
            .simulated_card
            .as_deref()
            .and_then(SimulatedCardType::from_name),
    }
}

// ============================================================================
// Object Exists
// ============================================================================

/// Values that can come back from a backend with nothing in them.
pub trait Presence {
    /// Whether no field is set.
    fn is_blank(&self) -> bool;
}

/// Replace blank results with `None`, so callers test one shape regardless
/// of which backend answered.
pub fn object_exists<T: Presence>(value: Option<T>) -> Option<T> {
    value.filter(|v| !v.is_blank())
}

impl Presence for Reader {
    fn is_blank(&self) -> bool {
        *self == Reader::default()
    }
}

impl Presence for PaymentIntent {
    fn is_blank(&self) -> bool {
        *self == PaymentIntent::default()
    }
}

impl Presence for ReaderSoftwareUpdate {
    fn is_blank(&self) -> bool {
        *self == ReaderSoftwareUpdate::default()
    }
}

impl Presence for UpdateOutcome {
    fn is_blank(&self) -> bool {
        self.update.is_none() && self.error.is_none()
    }
}

impl Presence for SimulatorConfiguration {
    fn is_blank(&self) -> bool {
        *self == SimulatorConfiguration::default()
    }
}

impl Presence for SimulatorReport {
    fn is_blank(&self) -> bool {
        *self == SimulatorReport::default()
    }
}
