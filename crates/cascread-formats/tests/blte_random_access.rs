#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Random access over lazily decoded BLTE records
//!
//! Builds multi-chunk records from mixed raw and zlib chunks and checks
//! that reads in any order see the same bytes as one sequential read.

use std::io::{Read, Seek, SeekFrom, Write};

use cascread_formats::blte::{BlteStream, DecodeOptions, Materialization, decode};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use md5::{Digest, Md5};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn encode_chunk(compress: bool, content: &[u8]) -> (u8, Vec<u8>) {
    if compress {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(content).unwrap();
        (b'Z', encoder.finish().unwrap())
    } else {
        (b'N', content.to_vec())
    }
}

fn build_record(chunks: &[(bool, Vec<u8>)]) -> (Vec<u8>, Vec<u8>) {
    let encoded: Vec<_> = chunks
        .iter()
        .map(|(compress, content)| (encode_chunk(*compress, content), content.len()))
        .collect();

    let mut record = Vec::new();
    record.extend_from_slice(b"BLTE");
    record.extend_from_slice(&((12 + 24 * encoded.len()) as u32).to_be_bytes());
    record.push(0x0F);
    record.extend_from_slice(&(encoded.len() as u32).to_be_bytes()[1..]);
    for ((mode, payload), size) in &encoded {
        record.extend_from_slice(&(payload.len() as u32 + 1).to_be_bytes());
        record.extend_from_slice(&(*size as u32).to_be_bytes());
        let mut hasher = Md5::new();
        hasher.update([*mode]);
        hasher.update(payload);
        record.extend_from_slice(&hasher.finalize());
    }
    for ((mode, payload), _) in &encoded {
        record.push(*mode);
        record.extend_from_slice(payload);
    }

    let plain = chunks.iter().flat_map(|(_, c)| c.clone()).collect();
    (record, plain)
}

fn sample_record() -> (Vec<u8>, Vec<u8>) {
    build_record(&[
        (false, b"raw header bytes|".to_vec()),
        (true, b"zlib body ".repeat(50)),
        (false, (0..=255u8).collect()),
        (true, b"tail".to_vec()),
    ])
}

#[test]
fn test_tail_first_matches_sequential() {
    let (record, plain) = sample_record();

    let mut sequential = Vec::new();
    BlteStream::new(record.as_slice(), Some(record.len() as u64))
        .unwrap()
        .read_to_end(&mut sequential)
        .unwrap();
    assert_eq!(sequential, plain);

    let mut stream = BlteStream::new(record.as_slice(), Some(record.len() as u64)).unwrap();
    stream.seek(SeekFrom::End(-10)).unwrap();
    let mut tail = [0u8; 10];
    stream.read_exact(&mut tail).unwrap();
    assert_eq!(&tail[..], &sequential[sequential.len() - 10..]);
}

#[test]
fn test_chunk_metadata_available_up_front() {
    let (record, plain) = sample_record();
    let stream = BlteStream::new(record.as_slice(), None).unwrap();
    assert_eq!(stream.chunks().len(), 4);
    assert_eq!(stream.len(), plain.len() as u64);
    assert_eq!(
        stream
            .chunks()
            .iter()
            .map(|c| u64::from(c.decompressed_size))
            .sum::<u64>(),
        plain.len() as u64
    );
}

#[test]
fn test_decode_helper_and_eager_mode_agree() {
    let (record, plain) = sample_record();
    assert_eq!(decode(&record, DecodeOptions::default()).unwrap(), plain);

    let options = DecodeOptions::default().with_materialization(Materialization::Eager);
    let mut stream = BlteStream::with_options(record.as_slice(), None, options).unwrap();
    let mut out = Vec::new();
    stream.read_to_end(&mut out).unwrap();
    assert_eq!(out, plain);
}

#[test]
fn test_read_past_end_returns_zero() {
    let (record, plain) = sample_record();
    let mut stream = BlteStream::new(record.as_slice(), None).unwrap();
    let pos = stream.seek(SeekFrom::Start(plain.len() as u64 + 100)).unwrap();
    assert_eq!(pos, plain.len() as u64 + 100);
    let mut buf = [0u8; 8];
    assert_eq!(stream.read(&mut buf).unwrap(), 0);
    assert!(stream.seek(SeekFrom::Current(-(plain.len() as i64) - 200)).is_err());
}

fn chunk_strategy() -> impl Strategy<Value = (bool, Vec<u8>)> {
    (any::<bool>(), prop::collection::vec(any::<u8>(), 1..300))
}

proptest! {
    #[test]
    fn prop_out_of_order_reads_match(
        chunks in prop::collection::vec(chunk_strategy(), 1..6),
        reads in prop::collection::vec((any::<prop::sample::Index>(), 1usize..64), 1..12),
    ) {
        let (record, plain) = build_record(&chunks);
        let mut stream = BlteStream::new(record.as_slice(), Some(record.len() as u64)).unwrap();

        for (start, len) in reads {
            let offset = start.index(plain.len());
            let end = (offset + len).min(plain.len());

            stream.seek(SeekFrom::Start(offset as u64)).unwrap();
            let mut buf = vec![0u8; end - offset];
            stream.read_exact(&mut buf).unwrap();
            prop_assert_eq!(&buf[..], &plain[offset..end]);
        }
    }
}
