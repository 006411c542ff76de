//! Summarizes a CDM stream file: header, per-kind record counts, and any
//! records that failed to decode.
//!
//! Usage: `cdm-dump PATH [--json] [--as-version 12|13]`

use std::collections::BTreeMap;
use std::env;
use std::fs;

use serde::Serialize;
use tracing::{info, trace, warn};

use tc_cdm::codec::{decompress, DatumStream, Framing, Record};
use tc_cdm::evolution::{EvolutionPolicy, SchemaVersion};
use tc_cdm::limits::MAGIC_COMPRESSED;
use tc_cdm::model::{format_uuid, TcCdmDatum};
use tc_cdm::validate::{validate_tag_tree, TagTable};
use tc_cdm_bench::{init_logging, BoxError};

#[derive(Debug, Default, Serialize)]
struct Summary {
    writer_version: Option<u8>,
    length_prefixed: Option<bool>,
    counts: BTreeMap<String, u64>,
    opaque: BTreeMap<u8, u64>,
    errors: Vec<String>,
    invalid_tags: u64,
}

struct Args {
    path: String,
    json: bool,
    version: SchemaVersion,
}

fn parse_args() -> Result<Args, BoxError> {
    let mut path = None;
    let mut json = false;
    let mut version = SchemaVersion::CURRENT;
    let mut iter = env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--json" => json = true,
            "--as-version" => {
                let raw = iter.next().ok_or("--as-version needs a value")?;
                let byte: u8 = raw.parse().map_err(|_| format!("bad version: {}", raw))?;
                version = SchemaVersion::from_u8(byte)
                    .ok_or_else(|| format!("unknown version: {}", byte))?;
            }
            _ => path = Some(arg),
        }
    }
    Ok(Args {
        path: path.ok_or("usage: cdm-dump PATH [--json] [--as-version 12|13]")?,
        json,
        version,
    })
}

fn main() -> Result<(), BoxError> {
    init_logging(&env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))?;
    let args = parse_args()?;

    let input = fs::read(&args.path)?;
    let raw = if input.starts_with(MAGIC_COMPRESSED) {
        let raw = decompress(&input)?;
        info!(compressed = input.len(), uncompressed = raw.len(), "decompressed stream");
        raw
    } else {
        input
    };

    let policy = EvolutionPolicy::new(args.version);
    let mut summary = Summary::default();
    let mut tags = TagTable::new();
    let mut stream = DatumStream::new(&raw, &policy);

    while let Some(item) = stream.next() {
        let offset = stream.position();
        match item {
            Ok(Record::Datum(datum)) => {
                if let TcCdmDatum::ProvenanceTagNode(tree) = &datum {
                    let checked = validate_tag_tree(tree, policy.max_tag_depth())
                        .and_then(|()| tags.define(tree))
                        .and_then(|()| tags.resolve_references(tree));
                    if let Err(err) = checked {
                        warn!(offset, error = %err, "tag node failed validation");
                        summary.invalid_tags += 1;
                    }
                }
                if let Some(id) = datum.vertex_uuid() {
                    trace!(kind = datum.kind().name(), uuid = %format_uuid(id), "record");
                }
                *summary.counts.entry(datum.kind().name().to_string()).or_default() += 1;
            }
            Ok(Record::Opaque { kind, .. }) => {
                *summary.opaque.entry(kind).or_default() += 1;
            }
            Err(err) => {
                warn!(offset, error = %err, "record failed to decode");
                summary.errors.push(format!("near offset {}: {}", offset, err));
            }
        }
    }

    if let Some(header) = stream.header() {
        summary.writer_version = Some(header.version.as_u8());
        summary.length_prefixed = Some(header.framing == Framing::LengthPrefixed);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    match summary.writer_version {
        Some(v) => println!("writer schema version: {}", v),
        None => println!("no valid header"),
    }
    if let Some(framed) = summary.length_prefixed {
        println!("framing: {}", if framed { "length-prefixed" } else { "bare" });
    }
    for (kind, count) in &summary.counts {
        println!("  {:<20} {}", kind, count);
    }
    for (kind, count) in &summary.opaque {
        println!("  unknown kind {:<7} {}", kind, count);
    }
    if summary.invalid_tags > 0 {
        println!("tag nodes failing validation: {}", summary.invalid_tags);
    }
    for error in &summary.errors {
        println!("error {}", error);
    }

    Ok(())
}
