//! Encode/decode throughput on a synthetic provenance trace.
//!
//! Usage: `cdm-bench [PROCESSES] [--json] [--out PATH]`

use std::env;
use std::fs;
use std::time::Instant;

use serde::Serialize;
use tracing::info;

use tc_cdm::codec::{
    decode_stream, encode_stream, encode_stream_compressed, DatumStream, EncodeOptions, Record,
};
use tc_cdm::evolution::{EvolutionPolicy, SchemaVersion};
use tc_cdm::model::{derived_uuid, TcCdmDatum};
use tc_cdm_bench::{init_logging, synthesize, BoxError, Workload};

#[derive(Debug, Serialize)]
struct Timing {
    name: &'static str,
    bytes: usize,
    micros: u128,
    mb_per_sec: f64,
}

impl Timing {
    fn new(name: &'static str, bytes: usize, secs: f64) -> Self {
        Self {
            name,
            bytes,
            micros: (secs * 1_000_000.0) as u128,
            mb_per_sec: (bytes as f64 / 1_000_000.0) / secs,
        }
    }

    fn print(&self) {
        println!(
            "{:<28} {:>10} bytes in {:>8} us  ({:.2} MB/s)",
            self.name, self.bytes, self.micros, self.mb_per_sec
        );
    }
}

#[derive(Debug, Serialize)]
struct Report {
    records: usize,
    v12_readable: usize,
    v12_rejected: usize,
    timings: Vec<Timing>,
    compression_ratio: f64,
}

struct Args {
    processes: usize,
    json: bool,
    out: Option<String>,
}

fn parse_args() -> Result<Args, BoxError> {
    let mut args = Args {
        processes: Workload::default().processes,
        json: false,
        out: None,
    };
    let mut iter = env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--json" => args.json = true,
            "--out" => args.out = Some(iter.next().ok_or("--out needs a path")?),
            n => args.processes = n.parse().map_err(|_| format!("bad process count: {}", n))?,
        }
    }
    Ok(args)
}

fn time<T>(f: impl FnOnce() -> T) -> (T, f64) {
    let start = Instant::now();
    let out = f();
    (out, start.elapsed().as_secs_f64())
}

fn main() -> Result<(), BoxError> {
    init_logging(&env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string()))?;
    let args = parse_args()?;

    let host = derived_uuid(uuid::Uuid::new_v4().as_bytes());
    let workload = Workload {
        processes: args.processes,
        ..Workload::default()
    };

    let (datums, build_secs) = time(|| synthesize(&host, workload));
    let datums: Vec<TcCdmDatum> = datums?;
    info!(records = datums.len(), build_secs, "synthesized trace");

    let policy = EvolutionPolicy::default();
    let mut timings = Vec::new();

    let (framed, secs) = time(|| encode_stream(&datums, EncodeOptions::new()));
    let framed = framed?;
    timings.push(Timing::new("encode (length-prefixed)", framed.len(), secs));

    let (bare, secs) = time(|| encode_stream(&datums, EncodeOptions::bare()));
    let bare = bare?;
    timings.push(Timing::new("encode (bare)", bare.len(), secs));

    let (compressed, secs) = time(|| encode_stream_compressed(&datums, 3, EncodeOptions::new()));
    let compressed = compressed?;
    timings.push(Timing::new("encode (zstd level 3)", compressed.len(), secs));

    let (decoded, secs) = time(|| decode_stream(&framed, &policy));
    let decoded = decoded?;
    timings.push(Timing::new("decode (length-prefixed)", framed.len(), secs));

    let (_, secs) = time(|| decode_stream(&bare, &policy));
    timings.push(Timing::new("decode (bare)", bare.len(), secs));

    let (_, secs) = time(|| decode_stream(&compressed, &policy));
    timings.push(Timing::new("decode (zstd)", compressed.len(), secs));

    // An older consumer reading the same bytes skips what it cannot see and
    // rejects records using members it has never heard of.
    let old_policy = EvolutionPolicy::new(SchemaVersion::V12);
    let (old, secs) = time(|| {
        let mut readable = 0usize;
        let mut rejected = 0usize;
        for record in DatumStream::new(&framed, &old_policy) {
            match record {
                Ok(Record::Datum(_)) => readable += 1,
                Ok(Record::Opaque { .. }) => {}
                Err(_) => rejected += 1,
            }
        }
        (readable, rejected)
    });
    timings.push(Timing::new("decode (as V12 consumer)", framed.len(), secs));
    info!(readable = old.0, rejected = old.1, "V12 consumer pass");

    let roundtrip_ok = decoded
        .iter()
        .zip(&datums)
        .all(|(record, datum)| record.as_datum() == Some(datum));
    if !roundtrip_ok || decoded.len() != datums.len() {
        return Err("decoded records differ from the encoded trace".into());
    }

    let report = Report {
        records: datums.len(),
        v12_readable: old.0,
        v12_rejected: old.1,
        compression_ratio: framed.len() as f64 / compressed.len() as f64,
        timings,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{} records\n", report.records);
        for timing in &report.timings {
            timing.print();
        }
        println!("\nCompression ratio: {:.1}x", report.compression_ratio);
        println!(
            "V12 consumer: {} readable, {} rejected",
            report.v12_readable, report.v12_rejected
        );
    }

    if let Some(path) = args.out {
        fs::write(&path, &compressed)?;
        println!("Wrote compressed stream to {}", path);
    }

    Ok(())
}
