//! Shared fixtures for unit tests.

use std::collections::BTreeMap;
use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;

use crate::descriptor::{RuntimeFingerprint, RuntimeRequirement};
use crate::version::VersionReq;

/// Build a requirement of `runtime_type` with the given dependency constraints.
pub fn requirement(runtime_type: &str, deps: &[(&str, &str)]) -> RuntimeRequirement {
    RuntimeRequirement {
        runtime_type: runtime_type.to_string(),
        version: None,
        dependencies: deps
            .iter()
            .map(|(name, req)| {
                (
                    name.to_string(),
                    VersionReq::parse(req).expect("valid constraint"),
                )
            })
            .collect(),
    }
}

/// Build a fingerprint of `runtime_type` with the given observed versions.
pub fn fingerprint(runtime_type: &str, deps: &[(&str, &str)]) -> RuntimeFingerprint {
    RuntimeFingerprint {
        runtime_type: runtime_type.to_string(),
        version: None,
        dependencies: deps
            .iter()
            .map(|(name, version)| (name.to_string(), version.to_string()))
            .collect::<BTreeMap<_, _>>(),
        source: "test".to_string(),
        digest: String::new(),
    }
}

/// Minimal `renv.lock` body with the given R version and packages.
pub fn renv_lock(r_version: &str, packages: &[(&str, &str)]) -> String {
    let packages: serde_json::Map<String, serde_json::Value> = packages
        .iter()
        .map(|(name, version)| {
            (
                name.to_string(),
                serde_json::json!({"Package": name, "Version": version, "Source": "Repository"}),
            )
        })
        .collect();
    serde_json::json!({
        "R": {"Version": r_version, "Repositories": []},
        "Packages": packages,
    })
    .to_string()
}

/// Build an in-memory zip container from `(name, bytes)` entries.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("start zip entry");
        writer.write_all(data).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// A zip with no entries: only the end-of-central-directory record.
pub const EMPTY_ZIP: &[u8] = b"PK\x05\x06\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0";

const LOCAL_HEADER_SIG: u32 = 0x0403_4b50;
const CENTRAL_HEADER_SIG: u32 = 0x0201_4b50;
const DATA_DESCRIPTOR_SIG: u32 = 0x0807_4b50;
const DATA_DESCRIPTOR_FLAG: u16 = 0x0008;

fn le_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn le_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn put_u16(bytes: &mut [u8], at: usize, value: u16) {
    bytes[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(bytes: &mut [u8], at: usize, value: u32) {
    bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

/// Rewrite a zip the way a non-seekable writer lays it out.
///
/// Every entry gets general-purpose flag bit 3, zeroed CRC and sizes in its
/// local header, and a data descriptor after its data. The central
/// directory keeps the real values.
pub fn with_data_descriptors(zip: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(zip.len() + 64);
    let mut new_offsets = Vec::new();
    let mut pos = 0;

    while le_u32(zip, pos) == LOCAL_HEADER_SIG {
        let name_len = usize::from(le_u16(zip, pos + 26));
        let extra_len = usize::from(le_u16(zip, pos + 28));
        let crc = le_u32(zip, pos + 14);
        let compressed = le_u32(zip, pos + 18);
        let uncompressed = le_u32(zip, pos + 22);
        let header_len = 30 + name_len + extra_len;
        let data_end = pos + header_len + compressed as usize;

        new_offsets.push(out.len() as u32);
        let mut header = zip[pos..pos + header_len].to_vec();
        let flags = le_u16(&header, 6) | DATA_DESCRIPTOR_FLAG;
        put_u16(&mut header, 6, flags);
        put_u32(&mut header, 14, 0);
        put_u32(&mut header, 18, 0);
        put_u32(&mut header, 22, 0);
        out.extend_from_slice(&header);
        out.extend_from_slice(&zip[pos + header_len..data_end]);
        for value in [DATA_DESCRIPTOR_SIG, crc, compressed, uncompressed] {
            out.extend_from_slice(&value.to_le_bytes());
        }
        pos = data_end;
    }

    let central_start = out.len() as u32;
    let mut index = 0;
    while le_u32(zip, pos) == CENTRAL_HEADER_SIG {
        let name_len = usize::from(le_u16(zip, pos + 28));
        let extra_len = usize::from(le_u16(zip, pos + 30));
        let comment_len = usize::from(le_u16(zip, pos + 32));
        let record_len = 46 + name_len + extra_len + comment_len;

        let mut record = zip[pos..pos + record_len].to_vec();
        let flags = le_u16(&record, 8) | DATA_DESCRIPTOR_FLAG;
        put_u16(&mut record, 8, flags);
        put_u32(&mut record, 42, new_offsets[index]);
        out.extend_from_slice(&record);
        index += 1;
        pos += record_len;
    }

    let mut end_record = zip[pos..].to_vec();
    put_u32(&mut end_record, 16, central_start);
    out.extend_from_slice(&end_record);
    out
}
