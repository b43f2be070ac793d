//! # Core identifiers and event metadata.
//!
//! Defines the closed [`EventType`] enumeration, the opaque [`ParticipantId`]
//! and [`DomainId`] identifiers with their reserved wildcard values, and the
//! [`EventDescriptor`] metadata handed to observers on every delivery.
//!
//! ## Reserved values
//! - [`ParticipantId::ANY`] matches every participant (usable only as a
//!   registration filter, never as a signal source).
//! - [`ParticipantId::PRIMARY`] is the role-stable id of the framework's
//!   top-level manager participant. A filter of `PRIMARY` matches a signaled
//!   participant whenever the catalog says that participant currently holds
//!   the primary role, even if its concrete instance id changed.
//! - [`DomainId::ANY`] matches every domain; [`DomainId::NA`] matches when the
//!   signaled domain is itself `NA`; [`DomainId::D0`] is the conventional
//!   first domain of a participant.

use std::fmt;

/// Opaque identifier of a hardware/software participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParticipantId(pub u32);

impl ParticipantId {
    /// Wildcard filter matching all participants.
    pub const ANY: ParticipantId = ParticipantId(u32::MAX);
    /// Conventional instance id of the primary (manager) participant.
    ///
    /// The primary participant may be re-enumerated with a different concrete
    /// id across the process lifetime; matching against `PRIMARY` goes through
    /// [`ParticipantCatalog::is_primary`](crate::platform::ParticipantCatalog::is_primary)
    /// so the *role* is what matches, not this constant.
    pub const PRIMARY: ParticipantId = ParticipantId(0);

    /// True if this id is the `ANY` wildcard.
    #[inline]
    pub fn is_any(self) -> bool {
        self == Self::ANY
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::ANY => write!(f, "any"),
            Self(id) => write!(f, "{id}"),
        }
    }
}

/// Opaque identifier of a sub-unit (domain) of a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DomainId(pub u16);

impl DomainId {
    /// Wildcard filter matching all domains.
    pub const ANY: DomainId = DomainId(u16::MAX);
    /// "Not applicable": matches when the signaled domain is itself `NA`.
    pub const NA: DomainId = DomainId(0x4E41);
    /// Conventional first domain.
    pub const D0: DomainId = DomainId(0x3044);
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::ANY => write!(f, "any"),
            Self::NA => write!(f, "na"),
            Self(id) => write!(f, "0x{id:04X}"),
        }
    }
}

/// Classification of an event type, used to select the hardware/OS
/// enable-disable side effect that applies when the first observer for a
/// primary-participant event appears (and the last one leaves).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventGroup {
    /// OS power notifications (keyed registration with the power stack).
    Power,
    /// OS system-metrics notifications (display, foreground app, ...).
    SystemMetrics,
    /// Sensor subsystem events (lid, dock, orientation).
    Sensor,
    /// Process-internal code events; enabled through the code-event hook.
    Code,
    /// Framework-origin events; no enable action required.
    Dptf,
    /// ACPI-origin events; no enable action required.
    Acpi,
}

/// Semantic kind of an event. Closed enumeration; the dense index
/// ([`EventType::index`]) is used for bucket selection and filter bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventType {
    // === Thermal / framework ===
    TemperatureThresholdCrossed = 0,
    ThermalRelationshipChanged = 1,
    ActiveRelationshipChanged = 2,
    PolicyTableChanged = 3,
    SpecificInfoChanged = 4,

    // === Power ===
    PowerSourceChanged = 5,
    BatteryStatusChanged = 6,
    BatteryCountChanged = 7,
    OsPowerSchemeChanged = 8,
    PlatformPowerLimitChanged = 9,

    // === System metrics ===
    DisplayOff = 10,
    DisplayOn = 11,
    ForegroundAppChanged = 12,
    OsMixedRealityModeChanged = 13,

    // === Sensors ===
    LidStateChanged = 14,
    DockModeChanged = 15,
    MotionChanged = 16,
    DeviceOrientationChanged = 17,

    // === Code (process-internal) ===
    ParticipantCreate = 18,
    ParticipantSuspend = 19,
    ParticipantResume = 20,
    LowPowerModeEntry = 21,
    LowPowerModeExit = 22,
    AppUnloading = 23,

    // === ACPI ===
    AcpiThermalEvent = 24,
    AcpiPowerEvent = 25,
}

/// Number of distinct event types; also the filter-bitset width bound.
pub const MAX_EVENT_TYPES: usize = 64;

impl EventType {
    /// Every event type, in index order. Used to size dense tables at init.
    pub const ALL: [EventType; 26] = [
        EventType::TemperatureThresholdCrossed,
        EventType::ThermalRelationshipChanged,
        EventType::ActiveRelationshipChanged,
        EventType::PolicyTableChanged,
        EventType::SpecificInfoChanged,
        EventType::PowerSourceChanged,
        EventType::BatteryStatusChanged,
        EventType::BatteryCountChanged,
        EventType::OsPowerSchemeChanged,
        EventType::PlatformPowerLimitChanged,
        EventType::DisplayOff,
        EventType::DisplayOn,
        EventType::ForegroundAppChanged,
        EventType::OsMixedRealityModeChanged,
        EventType::LidStateChanged,
        EventType::DockModeChanged,
        EventType::MotionChanged,
        EventType::DeviceOrientationChanged,
        EventType::ParticipantCreate,
        EventType::ParticipantSuspend,
        EventType::ParticipantResume,
        EventType::LowPowerModeEntry,
        EventType::LowPowerModeExit,
        EventType::AppUnloading,
        EventType::AcpiThermalEvent,
        EventType::AcpiPowerEvent,
    ];

    /// Dense index of this type, always `< MAX_EVENT_TYPES`.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Group governing the enable/disable side effect for this type.
    pub fn group(self) -> EventGroup {
        use EventType::*;
        match self {
            TemperatureThresholdCrossed | ThermalRelationshipChanged | ActiveRelationshipChanged
            | PolicyTableChanged | SpecificInfoChanged => EventGroup::Dptf,
            PowerSourceChanged | BatteryStatusChanged | BatteryCountChanged
            | OsPowerSchemeChanged | PlatformPowerLimitChanged => EventGroup::Power,
            DisplayOff | DisplayOn | ForegroundAppChanged | OsMixedRealityModeChanged => {
                EventGroup::SystemMetrics
            }
            LidStateChanged | DockModeChanged | MotionChanged | DeviceOrientationChanged => {
                EventGroup::Sensor
            }
            ParticipantCreate | ParticipantSuspend | ParticipantResume | LowPowerModeEntry
            | LowPowerModeExit | AppUnloading => EventGroup::Code,
            AcpiThermalEvent | AcpiPowerEvent => EventGroup::Acpi,
        }
    }

    /// Short stable name for logs.
    pub fn as_label(self) -> &'static str {
        use EventType::*;
        match self {
            TemperatureThresholdCrossed => "temperature_threshold_crossed",
            ThermalRelationshipChanged => "thermal_relationship_changed",
            ActiveRelationshipChanged => "active_relationship_changed",
            PolicyTableChanged => "policy_table_changed",
            SpecificInfoChanged => "specific_info_changed",
            PowerSourceChanged => "power_source_changed",
            BatteryStatusChanged => "battery_status_changed",
            BatteryCountChanged => "battery_count_changed",
            OsPowerSchemeChanged => "os_power_scheme_changed",
            PlatformPowerLimitChanged => "platform_power_limit_changed",
            DisplayOff => "display_off",
            DisplayOn => "display_on",
            ForegroundAppChanged => "foreground_app_changed",
            OsMixedRealityModeChanged => "os_mixed_reality_mode_changed",
            LidStateChanged => "lid_state_changed",
            DockModeChanged => "dock_mode_changed",
            MotionChanged => "motion_changed",
            DeviceOrientationChanged => "device_orientation_changed",
            ParticipantCreate => "participant_create",
            ParticipantSuspend => "participant_suspend",
            ParticipantResume => "participant_resume",
            LowPowerModeEntry => "low_power_mode_entry",
            LowPowerModeExit => "low_power_mode_exit",
            AppUnloading => "app_unloading",
            AcpiThermalEvent => "acpi_thermal_event",
            AcpiPowerEvent => "acpi_power_event",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Wire type of an event's payload, carried in the descriptor so observers
/// can interpret the byte buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDataType {
    /// No payload expected.
    Void,
    /// Little-endian unsigned 32-bit value.
    UInt32,
    /// UTF-8 string.
    String,
    /// Uninterpreted structure bytes.
    Structure,
}

/// Opaque stable key identifying an event toward the OS notification stacks
/// (power, system metrics). Analogous to a registration GUID.
pub type EventKey = [u8; 16];

/// Immutable metadata describing one event type, handed to observers with
/// every delivery and used to drive the group enable/disable side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDescriptor {
    pub event_type: EventType,
    pub group: EventGroup,
    pub data_type: EventDataType,
    pub key: EventKey,
}

impl EventDescriptor {
    /// Builds the generic descriptor for a type, used for `ANY`-participant
    /// registrations where no per-participant metadata is consulted.
    pub fn for_type(event_type: EventType) -> Self {
        let data_type = match event_type {
            EventType::TemperatureThresholdCrossed
            | EventType::BatteryStatusChanged
            | EventType::BatteryCountChanged
            | EventType::PowerSourceChanged
            | EventType::PlatformPowerLimitChanged
            | EventType::LidStateChanged
            | EventType::DockModeChanged
            | EventType::DeviceOrientationChanged => EventDataType::UInt32,
            EventType::ForegroundAppChanged => EventDataType::String,
            EventType::ParticipantCreate | EventType::SpecificInfoChanged => {
                EventDataType::Structure
            }
            _ => EventDataType::Void,
        };
        Self {
            event_type,
            group: event_type.group(),
            data_type,
            key: Self::key_for(event_type),
        }
    }

    // Deterministic per-type key; the OS stacks only require stability and
    // uniqueness, not a particular layout.
    fn key_for(event_type: EventType) -> EventKey {
        let mut key = *b"thermbus-event--";
        key[14] = (event_type.index() >> 8) as u8;
        key[15] = (event_type.index() & 0xFF) as u8;
        key
    }
}

/// Owned event payload. A deep copy is taken at enqueue time so the
/// producer's buffer may be transient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventData {
    pub data_type: EventDataType,
    pub bytes: Vec<u8>,
}

impl EventData {
    /// Copies the producer's buffer into an owned payload. Empty buffers are
    /// treated as "no data" by the signal paths before this is called.
    pub fn copied(data_type: EventDataType, bytes: &[u8]) -> Self {
        Self {
            data_type,
            bytes: bytes.to_vec(),
        }
    }

    /// Convenience constructor for a little-endian `u32` payload.
    pub fn u32(value: u32) -> Self {
        Self {
            data_type: EventDataType::UInt32,
            bytes: value.to_le_bytes().to_vec(),
        }
    }

    /// Interprets the payload as a little-endian `u32`, if it is one.
    pub fn as_u32(&self) -> Option<u32> {
        if self.data_type != EventDataType::UInt32 {
            return None;
        }
        let bytes: [u8; 4] = self.bytes.get(..4)?.try_into().ok()?;
        Some(u32::from_le_bytes(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexes_are_dense_and_bounded() {
        for (i, ty) in EventType::ALL.iter().enumerate() {
            assert_eq!(ty.index(), i);
            assert!(ty.index() < MAX_EVENT_TYPES);
        }
    }

    #[test]
    fn test_descriptor_keys_are_unique() {
        let mut keys: Vec<EventKey> = EventType::ALL
            .iter()
            .map(|ty| EventDescriptor::for_type(*ty).key)
            .collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), EventType::ALL.len());
    }

    #[test]
    fn test_u32_payload_round_trip() {
        let data = EventData::u32(45_000);
        assert_eq!(data.as_u32(), Some(45_000));
        assert_eq!(EventData::u32(7).bytes.len(), 4);
    }

    #[test]
    fn test_reserved_ids() {
        assert!(ParticipantId::ANY.is_any());
        assert!(!ParticipantId::PRIMARY.is_any());
        assert_ne!(DomainId::NA, DomainId::ANY);
    }
}
