use crate::{Result, error::Error};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Backends and Hosts
// ============================================================================

/// Which backend produced a value or services a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    /// In-process hardware backend (mobile SDK, or the only backend present).
    Native,
    /// Browser-hosted backend, used for network-attached readers.
    Browser,
}

impl BackendKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Native => "native",
            BackendKind::Browser => "browser",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Platform the orchestration layer is hosted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HostPlatform {
    Ios,
    Android,
    Web,
}

impl HostPlatform {
    /// Native mobile hosts embed a web view and can run a browser backend
    /// next to the native one.
    #[must_use]
    pub fn is_native_mobile(&self) -> bool {
        matches!(self, HostPlatform::Ios | HostPlatform::Android)
    }
}

// ============================================================================
// Discovery
// ============================================================================

/// How readers are discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiscoveryMethod {
    BluetoothScan,
    BluetoothProximity,
    Internet,
    UsbScan,
    /// Bluetooth scan on the native backend and internet discovery on the
    /// browser backend at the same time.
    Both,
}

/// Options for a discovery call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryConfiguration {
    #[serde(default)]
    pub simulated: bool,
    pub discovery_method: DiscoveryMethod,
    #[serde(default)]
    pub location_id: Option<String>,
}

impl DiscoveryConfiguration {
    pub fn new(discovery_method: DiscoveryMethod) -> Self {
        Self {
            simulated: false,
            discovery_method,
            location_id: None,
        }
    }

    pub fn simulated(mut self, simulated: bool) -> Self {
        self.simulated = simulated;
        self
    }

    pub fn with_location_id(mut self, location_id: impl Into<String>) -> Self {
        self.location_id = Some(location_id.into());
        self
    }
}

// ============================================================================
// Status Vocabularies
// ============================================================================

/// Canonical reader connection status.
///
/// Canonical codes are `NotConnected = 0`, `Connected = 1`, `Connecting = 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ConnectionStatus {
    NotConnected = 0,
    Connected = 1,
    Connecting = 2,
}

impl ConnectionStatus {
    #[must_use]
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Name used by the browser backend.
    #[must_use]
    pub fn wire_name(&self) -> &'static str {
        match self {
            ConnectionStatus::NotConnected => "not_connected",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Connecting => "connecting",
        }
    }

    #[must_use]
    pub fn from_wire_name(name: &str) -> Option<Self> {
        match name {
            "not_connected" => Some(ConnectionStatus::NotConnected),
            "connected" => Some(ConnectionStatus::Connected),
            "connecting" => Some(ConnectionStatus::Connecting),
            _ => None,
        }
    }
}

/// How a backend encoded a numeric connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusEncoding {
    /// Canonical codes (see [`ConnectionStatus`]).
    Canonical,
    /// Android ordinals: `0` not connected, `1` connecting, `2` connected.
    AndroidOrdinal,
}

/// A connection status as reported by a backend, before translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub code: i64,
    pub encoding: StatusEncoding,
}

impl StatusReport {
    pub fn canonical(status: ConnectionStatus) -> Self {
        Self {
            code: i64::from(status.code()),
            encoding: StatusEncoding::Canonical,
        }
    }

    pub fn android(code: i64) -> Self {
        Self {
            code,
            encoding: StatusEncoding::AndroidOrdinal,
        }
    }
}

/// Canonical payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    NotReady,
    Ready,
    WaitingForInput,
    Processing,
}

impl PaymentStatus {
    #[must_use]
    pub fn wire_name(&self) -> &'static str {
        match self {
            PaymentStatus::NotReady => "not_ready",
            PaymentStatus::Ready => "ready",
            PaymentStatus::WaitingForInput => "waiting_for_input",
            PaymentStatus::Processing => "processing",
        }
    }

    #[must_use]
    pub fn from_wire_name(name: &str) -> Option<Self> {
        match name {
            "not_ready" => Some(PaymentStatus::NotReady),
            "ready" => Some(PaymentStatus::Ready),
            "waiting_for_input" => Some(PaymentStatus::WaitingForInput),
            "processing" => Some(PaymentStatus::Processing),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentIntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresCapture,
    Processing,
    Canceled,
    Succeeded,
}

impl PaymentIntentStatus {
    #[must_use]
    pub fn from_wire_name(name: &str) -> Option<Self> {
        match name {
            "requires_payment_method" => Some(PaymentIntentStatus::RequiresPaymentMethod),
            "requires_confirmation" => Some(PaymentIntentStatus::RequiresConfirmation),
            "requires_capture" => Some(PaymentIntentStatus::RequiresCapture),
            "processing" => Some(PaymentIntentStatus::Processing),
            "canceled" => Some(PaymentIntentStatus::Canceled),
            "succeeded" => Some(PaymentIntentStatus::Succeeded),
            _ => None,
        }
    }
}

// ============================================================================
// Readers
// ============================================================================

/// Reader hardware model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    Chipper2X,
    StripeM2,
    WisePad3,
    WisePosE,
    VerifoneP400,
}

impl DeviceType {
    /// How readers of this type are reached.
    #[must_use]
    pub fn device_style(&self) -> DeviceStyle {
        match self {
            DeviceType::Chipper2X | DeviceType::StripeM2 | DeviceType::WisePad3 => {
                DeviceStyle::Bluetooth
            }
            DeviceType::WisePosE | DeviceType::VerifoneP400 => DeviceStyle::Internet,
        }
    }

    /// Name used by the browser backend.
    #[must_use]
    pub fn wire_name(&self) -> &'static str {
        match self {
            DeviceType::Chipper2X => "chipper_2X",
            DeviceType::StripeM2 => "stripe_m2",
            DeviceType::WisePad3 => "wisepad_3",
            DeviceType::WisePosE => "bbpos_wisepos_e",
            DeviceType::VerifoneP400 => "verifone_P400",
        }
    }

    #[must_use]
    pub fn from_wire_name(name: &str) -> Option<Self> {
        match name {
            "chipper_2X" => Some(DeviceType::Chipper2X),
            "stripe_m2" => Some(DeviceType::StripeM2),
            "wisepad_3" => Some(DeviceType::WisePad3),
            "bbpos_wisepos_e" => Some(DeviceType::WisePosE),
            "verifone_P400" => Some(DeviceType::VerifoneP400),
            _ => None,
        }
    }
}

/// Connectivity class of a reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceStyle {
    Bluetooth,
    Internet,
}

/// Style for an optional device type. Unrecognized types are treated as
/// internet readers.
#[must_use]
pub fn device_style_for(device_type: Option<DeviceType>) -> DeviceStyle {
    device_type.map_or(DeviceStyle::Internet, |t| t.device_style())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReaderNetworkStatus {
    Online,
    Offline,
}

impl ReaderNetworkStatus {
    #[must_use]
    pub fn from_wire_name(name: &str) -> Option<Self> {
        match name {
            "online" => Some(ReaderNetworkStatus::Online),
            "offline" => Some(ReaderNetworkStatus::Offline),
            _ => None,
        }
    }
}

/// A card reader as reported by one discovery tick or connect call.
///
/// Readers are snapshots: a newer report supersedes the old value rather
/// than mutating it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reader {
    #[serde(default)]
    pub serial_number: Option<String>,
    /// Cloud identifier of internet readers.
    #[serde(default)]
    pub stripe_id: Option<String>,
    #[serde(default)]
    pub device_type: Option<DeviceType>,
    #[serde(default)]
    pub network_status: Option<ReaderNetworkStatus>,
    /// Battery level, `None` when unknown.
    #[serde(default)]
    pub battery_level: Option<f32>,
    #[serde(default)]
    pub device_software_version: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub location_id: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub livemode: Option<bool>,
    #[serde(default)]
    pub simulated: bool,
}

impl Reader {
    /// Reader identified by its serial number.
    pub fn with_serial(serial_number: impl Into<String>) -> Self {
        Self {
            serial_number: Some(serial_number.into()),
            ..Self::default()
        }
    }

    /// Reader identified by its cloud id.
    pub fn with_stripe_id(stripe_id: impl Into<String>) -> Self {
        Self {
            stripe_id: Some(stripe_id.into()),
            ..Self::default()
        }
    }

    pub fn device_type(mut self, device_type: DeviceType) -> Self {
        self.device_type = Some(device_type);
        self
    }

    pub fn battery_level(mut self, level: f32) -> Self {
        self.battery_level = Some(level);
        self
    }

    pub fn software_version(mut self, version: impl Into<String>) -> Self {
        self.device_software_version = Some(version.into());
        self
    }

    pub fn ip_address(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self
    }

    #[must_use]
    pub fn device_style(&self) -> DeviceStyle {
        device_style_for(self.device_type)
    }
}

// ============================================================================
// Connection Options
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BluetoothConnectionConfiguration {
    pub location_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsbConnectionConfiguration {
    pub location_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternetConnectionConfiguration {
    #[serde(default)]
    pub fail_if_in_use: bool,
    #[serde(default)]
    pub allow_customer_cancel: bool,
}

/// Arguments of a Bluetooth or USB connect call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalConnectRequest {
    pub serial_number: Option<String>,
    pub location_id: String,
}

/// Arguments of an internet connect call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternetConnectRequest {
    pub serial_number: Option<String>,
    pub ip_address: Option<String>,
    pub stripe_id: Option<String>,
    #[serde(default)]
    pub fail_if_in_use: bool,
    #[serde(default)]
    pub allow_customer_cancel: bool,
}

impl InternetConnectRequest {
    /// Merge a reader's identity with the caller's connection options.
    pub fn for_reader(reader: &Reader, config: &InternetConnectionConfiguration) -> Self {
        Self {
            serial_number: reader.serial_number.clone(),
            ip_address: reader.ip_address.clone(),
            stripe_id: reader.stripe_id.clone(),
            fail_if_in_use: config.fail_if_in_use,
            allow_customer_cancel: config.allow_customer_cancel,
        }
    }
}

// ============================================================================
// Payments
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    #[serde(default)]
    pub stripe_id: Option<String>,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<PaymentIntentStatus>,
    /// Amount in the currency's smallest unit.
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    pub display_name: String,
    pub quantity: u32,
    pub amount: i64,
}

/// Cart shown on the reader display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub currency: String,
    pub tax: i64,
    pub total: i64,
    pub line_items: Vec<CartLineItem>,
}

// ============================================================================
// Locations
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListLocationsParameters {
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub ending_before: Option<String>,
    #[serde(default)]
    pub starting_after: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub city: Option<String>,
    pub country: Option<String>,
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub postal_code: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub stripe_id: Option<String>,
    pub display_name: Option<String>,
    pub livemode: Option<bool>,
    pub address: Option<Address>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationList {
    pub locations: Vec<Location>,
    pub has_more: bool,
}

// ============================================================================
// Simulator
// ============================================================================

/// Test card presented by a simulated reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SimulatedCardType {
    Visa,
    VisaDebit,
    Mastercard,
    MasterDebit,
    MastercardPrepaid,
    Amex,
    Amex2,
    Discover,
    Discover2,
    Diners,
    Diners14Digit,
    Jcb,
    UnionPay,
    Interac,
    ChargeDeclined,
    ChargeDeclinedInsufficientFunds,
    ChargeDeclinedLostCard,
    ChargeDeclinedStolenCard,
    ChargeDeclinedExpiredCard,
    ChargeDeclinedProcessingError,
    RefundFailed,
}

/// (card, enum name, test payment method id)
const SIMULATED_CARDS: [(SimulatedCardType, &str, &str); 21] = [
    (SimulatedCardType::Visa, "Visa", "visa"),
    (SimulatedCardType::VisaDebit, "VisaDebit", "visa_debit"),
    (SimulatedCardType::Mastercard, "Mastercard", "mastercard"),
    (SimulatedCardType::MasterDebit, "MasterDebit", "mastercard_debit"),
    (
        SimulatedCardType::MastercardPrepaid,
        "MastercardPrepaid",
        "mastercard_prepaid",
    ),
    (SimulatedCardType::Amex, "Amex", "amex"),
    (SimulatedCardType::Amex2, "Amex2", "amex2"),
    (SimulatedCardType::Discover, "Discover", "discover"),
    (SimulatedCardType::Discover2, "Discover2", "discover2"),
    (SimulatedCardType::Diners, "Diners", "diners"),
    (
        SimulatedCardType::Diners14Digit,
        "Diners14Digit",
        "diners_14digits",
    ),
    (SimulatedCardType::Jcb, "Jcb", "jcb"),
    (SimulatedCardType::UnionPay, "UnionPay", "unionpay"),
    (SimulatedCardType::Interac, "Interac", "interac"),
    (
        SimulatedCardType::ChargeDeclined,
        "ChargeDeclined",
        "charge_declined",
    ),
    (
        SimulatedCardType::ChargeDeclinedInsufficientFunds,
        "ChargeDeclinedInsufficientFunds",
        "charge_declined_insufficient_funds",
    ),
    (
        SimulatedCardType::ChargeDeclinedLostCard,
        "ChargeDeclinedLostCard",
        "charge_declined_lost_card",
    ),
    (
        SimulatedCardType::ChargeDeclinedStolenCard,
        "ChargeDeclinedStolenCard",
        "charge_declined_stolen_card",
    ),
    (
        SimulatedCardType::ChargeDeclinedExpiredCard,
        "ChargeDeclinedExpiredCard",
        "charge_declined_expired_card",
    ),
    (
        SimulatedCardType::ChargeDeclinedProcessingError,
        "ChargeDeclinedProcessingError",
        "charge_declined_processing_error",
    ),
    (SimulatedCardType::RefundFailed, "RefundFailed", "refund_fail"),
];

impl SimulatedCardType {
    /// All simulated cards, in table order.
    pub fn all() -> impl Iterator<Item = SimulatedCardType> {
        SIMULATED_CARDS.iter().map(|(card, _, _)| *card)
    }

    /// Enum name, as reported by native backends.
    #[must_use]
    pub fn name(&self) -> &'static str {
        SIMULATED_CARDS
            .iter()
            .find(|(card, _, _)| card == self)
            .map_or("", |(_, name, _)| name)
    }

    /// Look up a card by enum name. Unknown names yield `None`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        SIMULATED_CARDS
            .iter()
            .find(|(_, n, _)| *n == name)
            .map(|(card, _, _)| *card)
    }

    /// Test payment method id, as used by browser backends.
    #[must_use]
    pub fn test_payment_method(&self) -> &'static str {
        SIMULATED_CARDS
            .iter()
            .find(|(card, _, _)| card == self)
            .map_or("", |(_, _, method)| method)
    }

    /// Look up a card by test payment method id. Unknown ids yield `None`.
    #[must_use]
    pub fn from_test_payment_method(method: &str) -> Option<Self> {
        SIMULATED_CARDS
            .iter()
            .find(|(_, _, m)| *m == method)
            .map(|(card, _, _)| *card)
    }
}

impl fmt::Display for SimulatedCardType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SimulatedCardType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s).ok_or_else(|| Error::unknown_name("simulated card", s))
    }
}

/// Whether a simulated reader offers a software update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SimulateReaderUpdate {
    Available,
    None,
    Required,
    Random,
}

/// Simulator settings in the canonical vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatorConfiguration {
    #[serde(default)]
    pub available_reader_update: Option<SimulateReaderUpdate>,
    #[serde(default)]
    pub simulated_card: Option<SimulatedCardType>,
}

impl SimulatorConfiguration {
    pub fn with_card(card: SimulatedCardType) -> Self {
        Self {
            available_reader_update: None,
            simulated_card: Some(card),
        }
    }
}

/// Simulator settings as reported by a backend: the card comes back as its
/// enum name, or not at all when the backend cannot read it back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatorReport {
    #[serde(default)]
    pub available_reader_update: Option<SimulateReaderUpdate>,
    #[serde(default)]
    pub simulated_card: Option<String>,
}

// ============================================================================
// Software Updates
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateTimeEstimate {
    LessThanOneMinute,
    OneToTwoMinutes,
    TwoToFiveMinutes,
    FiveToFifteenMinutes,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReaderSoftwareUpdate {
    #[serde(default)]
    pub device_software_version: Option<String>,
    #[serde(default)]
    pub estimated_update_time: Option<UpdateTimeEstimate>,
    #[serde(default)]
    pub required_at: Option<DateTime<Utc>>,
}

/// Result of a software update installation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOutcome {
    #[serde(default)]
    pub update: Option<ReaderSoftwareUpdate>,
    #[serde(default)]
    pub error: Option<String>,
}

// ============================================================================
// Reader Prompts
// ============================================================================

/// Card input methods the reader is waiting for (bitmask).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReaderInputOptions(u32);

impl ReaderInputOptions {
    pub const NONE: Self = Self(0);
    pub const SWIPE_CARD: Self = Self(1);
    pub const INSERT_CARD: Self = Self(1 << 1);
    pub const TAP_CARD: Self = Self(1 << 2);

    #[must_use]
    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[must_use]
    pub fn bits(&self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for ReaderInputOptions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Message the reader asks the host to display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ReaderDisplayMessage {
    RetryCard = 0,
    InsertCard = 1,
    InsertOrSwipeCard = 2,
    SwipeCard = 3,
    RemoveCard = 4,
    MultipleContactlessCardsDetected = 5,
    TryAnotherReadMethod = 6,
    TryAnotherCard = 7,
}

impl TryFrom<i64> for ReaderDisplayMessage {
    type Error = Error;

    fn try_from(code: i64) -> Result<Self> {
        match code {
            0 => Ok(ReaderDisplayMessage::RetryCard),
            1 => Ok(ReaderDisplayMessage::InsertCard),
            2 => Ok(ReaderDisplayMessage::InsertOrSwipeCard),
            3 => Ok(ReaderDisplayMessage::SwipeCard),
            4 => Ok(ReaderDisplayMessage::RemoveCard),
            5 => Ok(ReaderDisplayMessage::MultipleContactlessCardsDetected),
            6 => Ok(ReaderDisplayMessage::TryAnotherReadMethod),
            7 => Ok(ReaderDisplayMessage::TryAnotherCard),
            _ => Err(Error::UnknownCode {
                kind: "reader display message",
                code,
            }),
        }
    }
}

/// Loosely typed numeric payload: some backends send numbers, others send
/// the number as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
}

// ============================================================================
// Permissions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PermissionState {
    Granted,
    Denied,
    Prompt,
    PromptWithRationale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionStatus {
    pub location: PermissionState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(HostPlatform::Ios, true)]
    #[case(HostPlatform::Android, true)]
    #[case(HostPlatform::Web, false)]
    fn test_host_platform_native_mobile(#[case] host: HostPlatform, #[case] expected: bool) {
        assert_eq!(host.is_native_mobile(), expected);
    }

    #[rstest]
    #[case(DeviceType::Chipper2X, DeviceStyle::Bluetooth)]
    #[case(DeviceType::StripeM2, DeviceStyle::Bluetooth)]
    #[case(DeviceType::WisePad3, DeviceStyle::Bluetooth)]
    #[case(DeviceType::WisePosE, DeviceStyle::Internet)]
    #[case(DeviceType::VerifoneP400, DeviceStyle::Internet)]
    fn test_device_style(#[case] device_type: DeviceType, #[case] expected: DeviceStyle) {
        assert_eq!(device_type.device_style(), expected);
        assert_eq!(device_style_for(Some(device_type)), expected);
    }

    #[test]
    fn test_unknown_device_type_is_internet_style() {
        assert_eq!(device_style_for(None), DeviceStyle::Internet);
        assert_eq!(Reader::default().device_style(), DeviceStyle::Internet);
    }

    #[rstest]
    #[case("chipper_2X", Some(DeviceType::Chipper2X))]
    #[case("bbpos_wisepos_e", Some(DeviceType::WisePosE))]
    #[case("verifone_P400", Some(DeviceType::VerifoneP400))]
    #[case("toaster", None)]
    fn test_device_type_wire_name(#[case] name: &str, #[case] expected: Option<DeviceType>) {
        assert_eq!(DeviceType::from_wire_name(name), expected);
        if let Some(device_type) = expected {
            assert_eq!(device_type.wire_name(), name);
        }
    }

    #[rstest]
    #[case("not_connected", Some(ConnectionStatus::NotConnected))]
    #[case("connecting", Some(ConnectionStatus::Connecting))]
    #[case("connected", Some(ConnectionStatus::Connected))]
    #[case("CONNECTED", None)]
    fn test_connection_status_wire_name(
        #[case] name: &str,
        #[case] expected: Option<ConnectionStatus>,
    ) {
        assert_eq!(ConnectionStatus::from_wire_name(name), expected);
    }

    #[rstest]
    #[case("not_ready", Some(PaymentStatus::NotReady))]
    #[case("waiting_for_input", Some(PaymentStatus::WaitingForInput))]
    #[case("idle", None)]
    fn test_payment_status_wire_name(#[case] name: &str, #[case] expected: Option<PaymentStatus>) {
        assert_eq!(PaymentStatus::from_wire_name(name), expected);
    }

    #[test]
    fn test_simulated_card_tables_cover_every_card() {
        assert_eq!(SimulatedCardType::all().count(), 21);
        for card in SimulatedCardType::all() {
            assert_eq!(SimulatedCardType::from_name(card.name()), Some(card));
            assert_eq!(
                SimulatedCardType::from_test_payment_method(card.test_payment_method()),
                Some(card)
            );
        }
    }

    #[rstest]
    #[case("MasterDebit", "mastercard_debit")]
    #[case("Diners14Digit", "diners_14digits")]
    #[case("RefundFailed", "refund_fail")]
    fn test_simulated_card_irregular_ids(#[case] name: &str, #[case] method: &str) {
        let card: SimulatedCardType = name.parse().unwrap();
        assert_eq!(card.test_payment_method(), method);
    }

    #[test]
    fn test_simulated_card_unknown_name() {
        assert_eq!(SimulatedCardType::from_name("Monopoly"), None);
        assert_eq!(SimulatedCardType::from_test_payment_method("monopoly"), None);
        assert!("Monopoly".parse::<SimulatedCardType>().is_err());
    }

    #[test]
    fn test_simulated_card_serializes_as_name() {
        let json = serde_json::to_string(&SimulatedCardType::VisaDebit).unwrap();
        assert_eq!(json, "\"VisaDebit\"");
    }

    #[test]
    fn test_reader_input_options_bitmask() {
        let options = ReaderInputOptions::SWIPE_CARD | ReaderInputOptions::TAP_CARD;
        assert_eq!(options.bits(), 5);
        assert!(options.contains(ReaderInputOptions::TAP_CARD));
        assert!(!options.contains(ReaderInputOptions::INSERT_CARD));
    }

    #[test]
    fn test_display_message_codes() {
        assert_eq!(
            ReaderDisplayMessage::try_from(4).unwrap(),
            ReaderDisplayMessage::RemoveCard
        );
        assert!(ReaderDisplayMessage::try_from(8).is_err());
    }

    #[test]
    fn test_internet_connect_request_merges_reader_identity() {
        let reader = Reader::with_stripe_id("tmr_123").ip_address("10.0.0.7");
        let config = InternetConnectionConfiguration {
            fail_if_in_use: true,
            allow_customer_cancel: false,
        };

        let request = InternetConnectRequest::for_reader(&reader, &config);
        assert_eq!(request.stripe_id.as_deref(), Some("tmr_123"));
        assert_eq!(request.ip_address.as_deref(), Some("10.0.0.7"));
        assert!(request.fail_if_in_use);
    }

    #[test]
    fn test_reader_deserializes_camel_case() {
        let reader: Reader = serde_json::from_str(
            r#"{"serialNumber":"CHB2","batteryLevel":0.5,"deviceType":"Chipper2X"}"#,
        )
        .unwrap();

        assert_eq!(reader.serial_number.as_deref(), Some("CHB2"));
        assert_eq!(reader.battery_level, Some(0.5));
        assert_eq!(reader.device_type, Some(DeviceType::Chipper2X));
        assert!(!reader.simulated);
    }

    #[test]
    fn test_payment_intent_created_is_unix_seconds() {
        let intent: PaymentIntent =
            serde_json::from_str(r#"{"stripeId":"pi_1","created":1700000000}"#).unwrap();
        assert_eq!(intent.created.unwrap().timestamp(), 1_700_000_000);
    }
}
