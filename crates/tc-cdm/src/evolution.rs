//! Schema version rules and forward/backward compatibility decisions.
//!
//! Producers and consumers may run different schema versions. A read-only
//! rule table records, per version, how many members each enum family has,
//! which datum kinds exist, and which late-added fields are on the wire.
//! Codec calls consult it through an explicitly constructed
//! [`EvolutionPolicy`] (decoding) or [`EncodeOptions`](crate::codec::EncodeOptions)
//! (encoding); nothing here is mutable after first access.

use std::fmt;

use lazy_static::lazy_static;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::{DecodeError, EncodeError};
use crate::limits::DEFAULT_MAX_TAG_DEPTH;
use crate::model::{CdmEnum, DatumKind, EnumFamily};

/// A released revision of the CDM schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum SchemaVersion {
    V12 = 12,
    V13 = 13,
}

impl SchemaVersion {
    /// The version this crate writes by default.
    pub const CURRENT: SchemaVersion = SchemaVersion::V13;

    pub const ALL: [SchemaVersion; 2] = [SchemaVersion::V12, SchemaVersion::V13];

    pub fn from_u8(version: u8) -> Option<SchemaVersion> {
        match version {
            12 => Some(SchemaVersion::V12),
            13 => Some(SchemaVersion::V13),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Number of members of `family` this version defines.
    pub fn known_members(self, family: EnumFamily, declared: usize) -> usize {
        rules(self)
            .enum_members
            .get(&family)
            .copied()
            .unwrap_or(declared)
    }

    /// Returns true if this version defines `kind`.
    pub fn knows_kind(self, kind: DatumKind) -> bool {
        rules(self).kinds.contains(&kind)
    }

    /// Returns true if records of this version carry `field` on the wire.
    pub fn has_field(self, field: EvolvableField) -> bool {
        rules(self).fields.contains(&field)
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.as_u8())
    }
}

/// Record fields that were added after the base schema version.
///
/// These are always encoded after every base field of their record, so an
/// older reader finds them as trailing bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvolvableField {
    /// `FileObject.is_pipe` and `FileObject.version`.
    FileVersioning,
    /// `Event.program_point`.
    EventProgramPoint,
    /// `Subject.imported_libraries` and `Subject.exported_libraries`.
    SubjectLibraries,
}

impl EvolvableField {
    /// The default a reader substitutes when the writer predates the field.
    pub fn default_description(self) -> &'static str {
        match self {
            EvolvableField::FileVersioning => "is_pipe=false, version=1",
            EvolvableField::EventProgramPoint => "program_point=None",
            EvolvableField::SubjectLibraries => "libraries=None",
        }
    }
}

#[derive(Debug)]
struct VersionRules {
    /// Member counts for families that grew; absent families use their full
    /// declared member list.
    enum_members: FxHashMap<EnumFamily, usize>,
    kinds: Vec<DatumKind>,
    fields: Vec<EvolvableField>,
}

lazy_static! {
    static ref RULES: FxHashMap<SchemaVersion, VersionRules> = {
        let mut table = FxHashMap::default();

        let mut v12_members = FxHashMap::default();
        v12_members.insert(EnumFamily::EventType, 27);
        v12_members.insert(EnumFamily::EdgeType, 15);
        table.insert(
            SchemaVersion::V12,
            VersionRules {
                enum_members: v12_members,
                kinds: DatumKind::ALL
                    .iter()
                    .copied()
                    .filter(|k| *k != DatumKind::ProvenanceTagNode)
                    .collect(),
                fields: Vec::new(),
            },
        );

        table.insert(
            SchemaVersion::V13,
            VersionRules {
                enum_members: FxHashMap::default(),
                kinds: DatumKind::ALL.to_vec(),
                fields: vec![
                    EvolvableField::FileVersioning,
                    EvolvableField::EventProgramPoint,
                    EvolvableField::SubjectLibraries,
                ],
            },
        );

        table
    };
}

fn rules(version: SchemaVersion) -> &'static VersionRules {
    // Every SchemaVersion variant is inserted above.
    &RULES[&version]
}

/// Decoder-side compatibility settings.
///
/// Built once by the caller and passed by reference into every decode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvolutionPolicy {
    version: SchemaVersion,
    max_tag_depth: usize,
    skip_unknown_kinds: bool,
}

impl Default for EvolutionPolicy {
    fn default() -> Self {
        Self::new(SchemaVersion::CURRENT)
    }
}

impl EvolutionPolicy {
    /// A policy for a consumer running `version`.
    pub fn new(version: SchemaVersion) -> Self {
        Self {
            version,
            max_tag_depth: DEFAULT_MAX_TAG_DEPTH,
            skip_unknown_kinds: true,
        }
    }

    pub fn with_max_tag_depth(mut self, max_tag_depth: usize) -> Self {
        self.max_tag_depth = max_tag_depth;
        self
    }

    /// Whether length-prefixed records of unknown kinds are surfaced as
    /// opaque records (true) or rejected (false).
    pub fn with_skip_unknown_kinds(mut self, skip: bool) -> Self {
        self.skip_unknown_kinds = skip;
        self
    }

    pub fn version(&self) -> SchemaVersion {
        self.version
    }

    pub fn max_tag_depth(&self) -> usize {
        self.max_tag_depth
    }

    pub fn skip_unknown_kinds(&self) -> bool {
        self.skip_unknown_kinds
    }

    /// Resolves a wire ordinal to a member known to this consumer.
    ///
    /// Ordinals beyond the consumer's range map to the family's catch-all
    /// member if it has one.
    pub fn resolve_enum<E: CdmEnum>(&self, ordinal: u64) -> Result<E, DecodeError> {
        let known = self
            .version
            .known_members(E::FAMILY, E::MEMBERS.len()) as u64;
        if ordinal < known {
            if let Some(member) = E::from_ordinal(ordinal) {
                return Ok(member);
            }
        }
        match E::CATCH_ALL {
            Some(fallback) => {
                debug!(
                    family = E::FAMILY.name(),
                    ordinal,
                    version = %self.version,
                    fallback = fallback.symbol(),
                    "unknown enum ordinal mapped to catch-all"
                );
                Ok(fallback)
            }
            None => Err(DecodeError::UnknownEnumValue {
                family: E::FAMILY.name(),
                ordinal,
            }),
        }
    }
}

/// Per-record decoding context: the consumer's policy plus the version the
/// stream's producer declared.
#[derive(Debug, Clone, Copy)]
pub struct DecodeContext<'p> {
    policy: &'p EvolutionPolicy,
    writer: SchemaVersion,
}

impl<'p> DecodeContext<'p> {
    pub fn new(policy: &'p EvolutionPolicy, writer: SchemaVersion) -> Self {
        Self { policy, writer }
    }

    pub fn policy(&self) -> &'p EvolutionPolicy {
        self.policy
    }

    pub fn writer(&self) -> SchemaVersion {
        self.writer
    }

    /// Returns true if the producer wrote a newer schema than the consumer
    /// understands, so records may carry trailing fields to skip.
    pub fn writer_is_newer(&self) -> bool {
        self.writer > self.policy.version
    }

    /// Returns true if `field` is both on the wire and understood locally.
    pub fn reads_field(&self, field: EvolvableField) -> bool {
        let readable = self.writer.has_field(field) && self.policy.version.has_field(field);
        if !readable {
            debug!(
                ?field,
                writer = %self.writer,
                local = %self.policy.version,
                default = field.default_description(),
                "evolvable field not on wire, using default"
            );
        }
        readable
    }

    pub fn resolve_enum<E: CdmEnum>(&self, ordinal: u64) -> Result<E, DecodeError> {
        self.policy.resolve_enum(ordinal)
    }

    pub fn max_tag_depth(&self) -> usize {
        self.policy.max_tag_depth
    }
}

/// Rejects a member the writer's schema version does not define.
pub(crate) fn check_writable<E: CdmEnum>(
    value: E,
    version: SchemaVersion,
) -> Result<(), EncodeError> {
    let known = version.known_members(E::FAMILY, E::MEMBERS.len());
    if (value.ordinal() as usize) < known {
        Ok(())
    } else {
        Err(EncodeError::UnknownEnumValue {
            family: E::FAMILY.name(),
            ordinal: value.ordinal() as u64,
            version: version.as_u8(),
        })
    }
}
