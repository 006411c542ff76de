//! Closed enumerations of the CDM schema.
//!
//! Every enum is encoded on the wire by ordinal. Ordinals are dense, start at
//! zero and are never renumbered: new members are only ever appended, which is
//! what lets an older consumer recognise "beyond my range" as "newer than me".

use std::fmt;

/// Identifies an enum family in the schema evolution rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumFamily {
    SubjectType,
    EventType,
    InstrumentationSource,
    SrcSinkType,
    PrincipalType,
    EdgeType,
    TagOpCode,
    IntegrityTag,
    ConfidentialityTag,
}

impl EnumFamily {
    /// Returns the schema name of the family.
    pub fn name(self) -> &'static str {
        match self {
            EnumFamily::SubjectType => "SubjectType",
            EnumFamily::EventType => "EventType",
            EnumFamily::InstrumentationSource => "InstrumentationSource",
            EnumFamily::SrcSinkType => "SrcSinkType",
            EnumFamily::PrincipalType => "PrincipalType",
            EnumFamily::EdgeType => "EdgeType",
            EnumFamily::TagOpCode => "TagOpCode",
            EnumFamily::IntegrityTag => "IntegrityTag",
            EnumFamily::ConfidentialityTag => "ConfidentialityTag",
        }
    }
}

/// Common behaviour of the schema's wire enums.
pub trait CdmEnum: Copy + Eq + fmt::Debug + 'static {
    /// Family this enum belongs to.
    const FAMILY: EnumFamily;
    /// All members, indexed by ordinal.
    const MEMBERS: &'static [Self];
    /// Member that absorbs ordinals the consumer does not know, if any.
    const CATCH_ALL: Option<Self>;

    /// Returns the wire ordinal.
    fn ordinal(self) -> u8;

    /// Returns the schema symbol (e.g. `EVENT_READ`).
    fn symbol(self) -> &'static str;

    /// Looks up a member by ordinal, ignoring schema version.
    fn from_ordinal(ordinal: u64) -> Option<Self> {
        usize::try_from(ordinal)
            .ok()
            .and_then(|i| Self::MEMBERS.get(i))
            .copied()
    }
}

macro_rules! cdm_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident : $family:ident, catch_all($catch:expr) {
            $( $(#[$vmeta:meta])* $variant:ident = $ord:literal => $symbol:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $ord, )+
        }

        impl CdmEnum for $name {
            const FAMILY: EnumFamily = EnumFamily::$family;
            const MEMBERS: &'static [Self] = &[ $( $name::$variant, )+ ];
            const CATCH_ALL: Option<Self> = $catch;

            #[inline]
            fn ordinal(self) -> u8 {
                self as u8
            }

            fn symbol(self) -> &'static str {
                match self {
                    $( $name::$variant => $symbol, )+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.symbol())
            }
        }
    };
}

cdm_enum! {
    /// Kind of execution context.
    pub enum SubjectType: SubjectType, catch_all(None) {
        Process = 0 => "SUBJECT_PROCESS",
        Thread = 1 => "SUBJECT_THREAD",
        Unit = 2 => "SUBJECT_UNIT",
    }
}

cdm_enum! {
    /// Instrumentation that produced a record.
    pub enum InstrumentationSource: InstrumentationSource, catch_all(None) {
        LinuxAuditTrace = 0 => "SOURCE_LINUX_AUDIT_TRACE",
        LinuxProcTrace = 1 => "SOURCE_LINUX_PROC_TRACE",
        LinuxBeepTrace = 2 => "SOURCE_LINUX_BEEP_TRACE",
        FreebsdOpenbsmTrace = 3 => "SOURCE_FREEBSD_OPENBSM_TRACE",
        AndroidJavaClearscope = 4 => "SOURCE_ANDROID_JAVA_CLEARSCOPE",
        AndroidNativeClearscope = 5 => "SOURCE_ANDROID_NATIVE_CLEARSCOPE",
        FreebsdDtraceCadets = 6 => "SOURCE_FREEBSD_DTRACE_CADETS",
        FreebsdTeslaCadets = 7 => "SOURCE_FREEBSD_TESLA_CADETS",
        FreebsdLoomCadets = 8 => "SOURCE_FREEBSD_LOOM_CADETS",
        FreebsdMacifCadets = 9 => "SOURCE_FREEBSD_MACIF_CADETS",
        WindowsDiftFaros = 10 => "SOURCE_WINDOWS_DIFT_FAROS",
        LinuxTheia = 11 => "SOURCE_LINUX_THEIA",
        WindowsFivedirections = 12 => "SOURCE_WINDOWS_FIVEDIRECTIONS",
    }
}

cdm_enum! {
    /// Action performed by a subject.
    ///
    /// Ordinals 27-29 (`Blind`, `Unit`, `Update`) were appended in schema
    /// version 13; a version 12 consumer reads them as [`EventType::Unknown`].
    pub enum EventType: EventType, catch_all(Some(EventType::Unknown)) {
        Accept = 0 => "EVENT_ACCEPT",
        Bind = 1 => "EVENT_BIND",
        ChangePrincipal = 2 => "EVENT_CHANGE_PRINCIPAL",
        CheckFileAttributes = 3 => "EVENT_CHECK_FILE_ATTRIBUTES",
        Clone = 4 => "EVENT_CLONE",
        Close = 5 => "EVENT_CLOSE",
        Connect = 6 => "EVENT_CONNECT",
        Execute = 7 => "EVENT_EXECUTE",
        Fork = 8 => "EVENT_FORK",
        Link = 9 => "EVENT_LINK",
        Unlink = 10 => "EVENT_UNLINK",
        Mmap = 11 => "EVENT_MMAP",
        ModifyFileAttributes = 12 => "EVENT_MODIFY_FILE_ATTRIBUTES",
        Mprotect = 13 => "EVENT_MPROTECT",
        Open = 14 => "EVENT_OPEN",
        Read = 15 => "EVENT_READ",
        Recvfrom = 16 => "EVENT_RECVFROM",
        Recvmsg = 17 => "EVENT_RECVMSG",
        Rename = 18 => "EVENT_RENAME",
        Write = 19 => "EVENT_WRITE",
        Sendto = 20 => "EVENT_SENDTO",
        Sendmsg = 21 => "EVENT_SENDMSG",
        OsUnknown = 22 => "EVENT_OS_UNKNOWN",
        KernelUnknown = 23 => "EVENT_KERNEL_UNKNOWN",
        AppUnknown = 24 => "EVENT_APP_UNKNOWN",
        UiUnknown = 25 => "EVENT_UI_UNKNOWN",
        Unknown = 26 => "EVENT_UNKNOWN",
        /// A period of missing visibility.
        Blind = 27 => "EVENT_BLIND",
        /// A unit of execution inside a subject (e.g. one loop iteration).
        Unit = 28 => "EVENT_UNIT",
        /// An update to an object that does not warrant a new version.
        Update = 29 => "EVENT_UPDATE",
    }
}

impl EventType {
    /// Returns true for event kinds that describe no concrete action and so
    /// normally carry no timestamp.
    pub fn is_synthetic(self) -> bool {
        matches!(
            self,
            EventType::Blind
                | EventType::Unit
                | EventType::Update
                | EventType::OsUnknown
                | EventType::KernelUnknown
                | EventType::AppUnknown
                | EventType::UiUnknown
                | EventType::Unknown
        )
    }
}

cdm_enum! {
    /// Kind of a source or sink of data that is not a file, socket or memory.
    pub enum SrcSinkType: SrcSinkType, catch_all(None) {
        Accelerometer = 0 => "SOURCE_ACCELEROMETER",
        Temperature = 1 => "SOURCE_TEMPERATURE",
        Gyroscope = 2 => "SOURCE_GYROSCOPE",
        MagneticField = 3 => "SOURCE_MAGNETIC_FIELD",
        HeartRate = 4 => "SOURCE_HEART_RATE",
        Light = 5 => "SOURCE_LIGHT",
        Proximity = 6 => "SOURCE_PROXIMITY",
        Pressure = 7 => "SOURCE_PRESSURE",
        RelativeHumidity = 8 => "SOURCE_RELATIVE_HUMIDITY",
        LinearAcceleration = 9 => "SOURCE_LINEAR_ACCELERATION",
        Gravity = 10 => "SOURCE_GRAVITY",
        RotationVector = 11 => "SOURCE_ROTATION_VECTOR",
        Camera = 12 => "SOURCE_CAMERA",
        Gps = 13 => "SOURCE_GPS",
        Audio = 14 => "SOURCE_AUDIO",
        SystemProperty = 15 => "SOURCE_SYSTEM_PROPERTY",
        EnvVariable = 16 => "SOURCE_ENV_VARIABLE",
        SinkIpc = 17 => "SOURCE_SINK_IPC",
        Clipboard = 18 => "SOURCE_CLIPBOARD",
        Database = 19 => "SOURCE_DATABASE",
    }
}

cdm_enum! {
    /// Whether a principal is local to the host.
    pub enum PrincipalType: PrincipalType, catch_all(None) {
        Local = 0 => "PRINCIPAL_LOCAL",
        Remote = 1 => "PRINCIPAL_REMOTE",
    }
}

impl Default for PrincipalType {
    fn default() -> Self {
        PrincipalType::Local
    }
}

cdm_enum! {
    /// Directed edge kinds.
    ///
    /// `ObjectPrevVersion` was appended in schema version 13.
    pub enum EdgeType: EdgeType, catch_all(None) {
        EventAffectsMemory = 0 => "EDGE_EVENT_AFFECTS_MEMORY",
        EventAffectsFile = 1 => "EDGE_EVENT_AFFECTS_FILE",
        EventAffectsNetflow = 2 => "EDGE_EVENT_AFFECTS_NETFLOW",
        EventAffectsSubject = 3 => "EDGE_EVENT_AFFECTS_SUBJECT",
        EventAffectsSrcsink = 4 => "EDGE_EVENT_AFFECTS_SRCSINK",
        EventHasparentEvent = 5 => "EDGE_EVENT_HASPARENT_EVENT",
        EventIsgeneratedbySubject = 6 => "EDGE_EVENT_ISGENERATEDBY_SUBJECT",
        SubjectAffectsEvent = 7 => "EDGE_SUBJECT_AFFECTS_EVENT",
        SubjectHasparentSubject = 8 => "EDGE_SUBJECT_HASPARENT_SUBJECT",
        SubjectHaslocalprincipal = 9 => "EDGE_SUBJECT_HASLOCALPRINCIPAL",
        SubjectRunson = 10 => "EDGE_SUBJECT_RUNSON",
        FileAffectsEvent = 11 => "EDGE_FILE_AFFECTS_EVENT",
        NetflowAffectsEvent = 12 => "EDGE_NETFLOW_AFFECTS_EVENT",
        MemoryAffectsEvent = 13 => "EDGE_MEMORY_AFFECTS_EVENT",
        SrcsinkAffectsEvent = 14 => "EDGE_SRCSINK_AFFECTS_EVENT",
        ObjectPrevVersion = 15 => "EDGE_OBJECT_PREV_VERSION",
    }
}

cdm_enum! {
    /// How a tag node combines its children.
    pub enum TagOpCode: TagOpCode, catch_all(None) {
        Sequence = 0 => "TAG_OP_SEQUENCE",
        Union = 1 => "TAG_OP_UNION",
        Encode = 2 => "TAG_OP_ENCODE",
        Strong = 3 => "TAG_OP_STRONG",
        Medium = 4 => "TAG_OP_MEDIUM",
        Weak = 5 => "TAG_OP_WEAK",
    }
}

cdm_enum! {
    /// Integrity label of tagged data.
    pub enum IntegrityTag: IntegrityTag, catch_all(None) {
        Untrusted = 0 => "INTEGRITY_UNTRUSTED",
        Benign = 1 => "INTEGRITY_BENIGN",
        Invulnerable = 2 => "INTEGRITY_INVULNERABLE",
    }
}

cdm_enum! {
    /// Confidentiality label of tagged data.
    pub enum ConfidentialityTag: ConfidentialityTag, catch_all(None) {
        Secret = 0 => "CONFIDENTIALITY_SECRET",
        Sensitive = 1 => "CONFIDENTIALITY_SENSITIVE",
        Private = 2 => "CONFIDENTIALITY_PRIVATE",
        Public = 3 => "CONFIDENTIALITY_PUBLIC",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_dense<E: CdmEnum>() {
        for (i, member) in E::MEMBERS.iter().enumerate() {
            assert_eq!(member.ordinal() as usize, i, "{:?} out of order", member);
            assert_eq!(E::from_ordinal(i as u64), Some(*member));
        }
        assert_eq!(E::from_ordinal(E::MEMBERS.len() as u64), None);
    }

    #[test]
    fn test_ordinals_are_dense() {
        assert_dense::<SubjectType>();
        assert_dense::<InstrumentationSource>();
        assert_dense::<EventType>();
        assert_dense::<SrcSinkType>();
        assert_dense::<PrincipalType>();
        assert_dense::<EdgeType>();
        assert_dense::<TagOpCode>();
        assert_dense::<IntegrityTag>();
        assert_dense::<ConfidentialityTag>();
    }

    #[test]
    fn test_member_counts() {
        assert_eq!(EventType::MEMBERS.len(), 30);
        assert_eq!(EdgeType::MEMBERS.len(), 16);
    }

    #[test]
    fn test_catch_all_members() {
        assert_eq!(EventType::CATCH_ALL, Some(EventType::Unknown));
        assert_eq!(EdgeType::CATCH_ALL, None);
        assert_eq!(SrcSinkType::CATCH_ALL, None);
        assert_eq!(PrincipalType::CATCH_ALL, None);
    }

    #[test]
    fn test_symbols() {
        assert_eq!(EdgeType::EventAffectsFile.to_string(), "EDGE_EVENT_AFFECTS_FILE");
        assert_eq!(EventType::Unknown.symbol(), "EVENT_UNKNOWN");
        assert_eq!(PrincipalType::default(), PrincipalType::Local);
    }

    #[test]
    fn test_synthetic_events() {
        assert!(EventType::Blind.is_synthetic());
        assert!(!EventType::Read.is_synthetic());
    }
}
