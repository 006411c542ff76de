//! Shared pieces for the benchmark and dump tools: logging setup and a
//! synthetic provenance workload.

use std::error::Error;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tc_cdm::model::{
    derived_uuid, subject_uuid, AbstractObject, EdgeType, Event, EventType, FileObject,
    InstrumentationSource, IntegrityTag, NetFlowObject, Permission, Principal, PrincipalType,
    ProvenanceTagNode, SimpleEdge, Subject, SubjectType, TagOpCode, TagRun, TagRuns, TagValue,
    TcCdmDatum, Uuid, Value,
};

pub type BoxError = Box<dyn Error + Send + Sync>;

/// Installs the fmt subscriber. `level` is an `EnvFilter` directive; an
/// unparsable one falls back to `info`.
pub fn init_logging(level: &str) -> Result<(), BoxError> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| format!("invalid log level: {}", e))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .init();

    Ok(())
}

/// Shape of the generated trace.
#[derive(Debug, Clone, Copy)]
pub struct Workload {
    pub processes: usize,
    pub files_per_process: usize,
    pub events_per_file: usize,
}

impl Default for Workload {
    fn default() -> Self {
        Self {
            processes: 200,
            files_per_process: 10,
            events_per_file: 20,
        }
    }
}

const SOURCE: InstrumentationSource = InstrumentationSource::FreebsdDtraceCadets;
const START_MICROS: i64 = 1_500_000_000_000_000;

/// Builds a plausible audit trace: one principal, then per process a
/// subject, files with a tainted base tag, read/write events with tagged
/// buffers, and the edges between them. File versions are chained with
/// prev-version edges.
pub fn synthesize(host: &Uuid, workload: Workload) -> Result<Vec<TcCdmDatum>, BoxError> {
    let mut datums = Vec::new();
    let mut sequence = 0i64;
    let mut clock = START_MICROS;

    let principal = Principal::builder()
        .uuid(derived_uuid(b"principal:root"))
        .principal_type(PrincipalType::Local)
        .user_id("0")
        .group_id("0")
        .group_id("5")
        .source(SOURCE)
        .build()?;
    let principal_uuid = *principal.uuid();
    datums.push(principal.into());

    // Tag id 1 is defined once and referenced from every file's base tag.
    let untrusted = ProvenanceTagNode::builder()
        .value(TagValue::Integrity(IntegrityTag::Untrusted))
        .tag_id(1)
        .build()?;
    datums.push(untrusted.into());

    for p in 0..workload.processes {
        let pid = 1000 + p as i32;
        let subject = Subject::builder()
            .uuid(subject_uuid(host, pid, clock))
            .subject_type(SubjectType::Process)
            .pid(pid)
            .ppid(1)
            .source(SOURCE)
            .start_timestamp_micros(clock)
            .cmd_line(format!("/usr/bin/worker --id {}", p))
            .imported_libraries(["libc.so.7", "libthr.so.3"])
            .build()?;
        let subject_id = *subject.uuid();
        datums.push(subject.into());
        datums.push(edge(subject_id, principal_uuid, EdgeType::SubjectHaslocalprincipal, clock)?);

        if p % 16 == 0 {
            let flow = NetFlowObject::builder()
                .uuid(derived_uuid(format!("netflow:{}", p).as_bytes()))
                .base(base(clock)?)
                .src("10.0.0.2", 40_000 + p as i32)
                .dest("192.168.1.1", 443)
                .build()?;
            datums.push(flow.into());
        }

        for f in 0..workload.files_per_process {
            let path = format!("/var/tmp/p{}/f{}", p, f);
            let mut previous: Option<Uuid> = None;

            for version in 1..=2 {
                let file = FileObject::builder()
                    .uuid(derived_uuid(format!("file:{}:{}", path, version).as_bytes()))
                    .base(base(clock)?)
                    .url(path.as_str())
                    .version(version)
                    .size(4096 * version as i64)
                    .build()?;
                let file_uuid = *file.uuid();
                datums.push(file.into());
                if let Some(older) = previous {
                    datums.push(edge(file_uuid, older, EdgeType::ObjectPrevVersion, clock)?);
                }
                previous = Some(file_uuid);

                for e in 0..workload.events_per_file / 2 {
                    clock += 7;
                    sequence += 1;
                    let event_type = if e % 2 == 0 { EventType::Read } else { EventType::Write };
                    let event = Event::builder()
                        .uuid(derived_uuid(&sequence.to_le_bytes()))
                        .sequence(sequence)
                        .event_type(event_type)
                        .thread_id(pid)
                        .source(SOURCE)
                        .timestamp_micros(clock)
                        .size(64)
                        .parameter(buffer(64)?)
                        .build()?;
                    let event_uuid = *event.uuid();
                    datums.push(event.into());
                    datums.push(edge(event_uuid, subject_id, EdgeType::EventIsgeneratedbySubject, clock)?);
                    datums.push(edge(event_uuid, file_uuid, EdgeType::EventAffectsFile, clock)?);
                }
            }
        }
        clock += 1_000;
    }

    Ok(datums)
}

fn base(clock: i64) -> Result<AbstractObject, BoxError> {
    let tag = ProvenanceTagNode::builder()
        .value(TagValue::OpCode(TagOpCode::Union))
        .child(ProvenanceTagNode::leaf(TagValue::Ref(1)))
        .child(ProvenanceTagNode::leaf(TagValue::OpCode(TagOpCode::Weak)))
        .build()?;
    Ok(AbstractObject::builder()
        .source(SOURCE)
        .permission(Permission::from_bits(0o644))
        .last_timestamp_micros(clock)
        .tag(tag)
        .build()?)
}

fn buffer(size: u32) -> Result<Value, BoxError> {
    let half = size / 2;
    Ok(Value::builder()
        .size(size)
        .type_name("char[]")
        .tag(TagRuns::new(vec![TagRun::new(half, 1), TagRun::new(size - half, 0)]))
        .build()?)
}

fn edge(from: Uuid, to: Uuid, edge_type: EdgeType, ts: i64) -> Result<TcCdmDatum, BoxError> {
    Ok(SimpleEdge::builder()
        .from_uuid(from)
        .to_uuid(to)
        .edge_type(edge_type)
        .timestamp_micros(ts)
        .build()?
        .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tc_cdm::model::DatumKind;
    use tc_cdm::validate::TagTable;

    #[test]
    fn test_synthesize_counts() {
        let workload = Workload {
            processes: 2,
            files_per_process: 3,
            events_per_file: 4,
        };
        let datums = synthesize(&[7u8; 32], workload).unwrap();

        let count = |kind: DatumKind| datums.iter().filter(|d| d.kind() == kind).count();
        assert_eq!(count(DatumKind::Principal), 1);
        assert_eq!(count(DatumKind::ProvenanceTagNode), 1);
        assert_eq!(count(DatumKind::Subject), 2);
        assert_eq!(count(DatumKind::FileObject), 2 * 3 * 2);
        assert_eq!(count(DatumKind::Event), 2 * 3 * 2 * 2);
        assert_eq!(count(DatumKind::NetFlowObject), 1);
    }

    #[test]
    fn test_synthesized_tags_resolve() {
        let datums = synthesize(&[7u8; 32], Workload::default()).unwrap();
        let mut table = TagTable::new();
        for datum in &datums {
            match datum {
                TcCdmDatum::ProvenanceTagNode(tree) => table.define(tree).unwrap(),
                TcCdmDatum::FileObject(file) => {
                    table.resolve_references(file.base().tag().unwrap()).unwrap()
                }
                _ => {}
            }
        }
        assert_eq!(table.len(), 1);
    }
}
