//! Integration tests for stream composition and message assembly.

#![allow(clippy::unwrap_used)]

use std::io::{Read, SeekFrom};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use proptest::prelude::*;

use mailweave_mime::{
    AppendStream, BackingStream, Base64Encode, Body, Disposition, EmptyStream, Error, HeaderSet,
    LineChunk, Metadata, Stream, StreamReader,
};

fn members(parts: &[Vec<u8>]) -> AppendStream {
    let streams: Vec<Box<dyn Stream>> = parts
        .iter()
        .map(|p| Box::new(BackingStream::from_literal(p)) as Box<dyn Stream>)
        .collect();
    AppendStream::new(streams).unwrap()
}

fn read_in_chunks(stream: &mut impl Stream, chunk: usize) -> Vec<u8> {
    let mut out = Vec::new();
    while !stream.eof().unwrap() {
        let bytes = stream.read(chunk).unwrap();
        assert!(bytes.len() <= chunk);
        out.extend(bytes);
    }
    out
}

proptest! {
    #[test]
    fn test_concatenation_matches_members(
        parts in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..300), 0..8),
        chunk in 1usize..64,
    ) {
        let expected: Vec<u8> = parts.concat();
        let mut stream = members(&parts);

        prop_assert_eq!(stream.size().unwrap(), Some(expected.len() as u64));
        let out = read_in_chunks(&mut stream, chunk);
        prop_assert_eq!(stream.tell().unwrap(), expected.len() as u64);
        prop_assert_eq!(out, expected);
    }

    #[test]
    fn test_rewind_reproduces_bytes(
        parts in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..200), 1..6),
        chunk in 1usize..50,
    ) {
        let mut stream = members(&parts);
        let first = read_in_chunks(&mut stream, chunk);
        stream.seek(SeekFrom::Start(0)).unwrap();
        let second = read_in_chunks(&mut stream, chunk + 7);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn test_seek_to_offset(
        parts in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..100), 1..5),
        fraction in 0.0f64..1.0,
    ) {
        let expected: Vec<u8> = parts.concat();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let offset = (expected.len() as f64 * fraction) as usize;

        let mut stream = members(&parts);
        prop_assert_eq!(stream.seek(SeekFrom::Start(offset as u64)).unwrap(), offset as u64);
        prop_assert_eq!(stream.contents().unwrap(), expected[offset..].to_vec());
    }

    #[test]
    fn test_base64_decodes_to_input(data in prop::collection::vec(any::<u8>(), 0..6000)) {
        let mut encoded = Base64Encode::new(BackingStream::from_literal(&data));
        let text = encoded.contents().unwrap();
        prop_assert_eq!(STANDARD.decode(&text).unwrap(), data);
    }

    #[test]
    fn test_wrapped_base64_decodes_to_input(data in prop::collection::vec(any::<u8>(), 0..3000)) {
        let mut wrapped = LineChunk::new(Base64Encode::new(BackingStream::from_literal(&data)));
        let text = wrapped.contents().unwrap();
        prop_assert!(text.split(|b| *b == b'\n').all(|line| line.len() <= 75));
        let joined: Vec<u8> = text.into_iter().filter(|b| *b != b'\n').collect();
        prop_assert_eq!(STANDARD.decode(&joined).unwrap(), data);
    }
}

#[test]
fn test_seekability_follows_members() {
    let mut stream = AppendStream::default();
    stream.add_stream(BackingStream::from_literal("seekable")).unwrap();
    assert!(stream.is_seekable());

    stream.add_stream(EmptyStream::new()).unwrap();
    assert!(!stream.is_seekable());
    stream.add_stream(BackingStream::from_literal("more")).unwrap();
    assert!(!stream.is_seekable());

    assert_eq!(stream.contents().unwrap(), b"seekablemore");
    assert!(matches!(stream.seek(SeekFrom::Start(0)), Err(Error::NotSeekable)));
}

#[test]
fn test_line_chunk_examples() {
    let digits = || BackingStream::from_literal("01234567890123456789");

    let mut ten = LineChunk::with_width(digits(), 10, b"|");
    assert_eq!(ten.contents().unwrap(), b"0123456789|0123456789|");

    let mut three = LineChunk::with_width(digits(), 3, b"|");
    assert_eq!(three.contents().unwrap(), b"012|345|678|901|234|567|89|");
}

#[test]
fn test_full_message() {
    let mut headers = HeaderSet::new("sender@example.com", "Sender").with_host("mx.example.org");
    headers.add_to("one@example.com", "One");
    headers.add_cc("two@example.com", "");
    headers.set_header("Subject", "Quarterly report");

    let mut body = Body::new();
    body.set_body(
        BackingStream::from_literal("<p>Numbers inside</p>")
            .with_metadata(Metadata::new().with_content_type("text/html")),
    );
    body.set_alt_body(BackingStream::from_literal("Numbers inside"));
    let payload = vec![7u8; 4000];
    body.add_attachment(
        BackingStream::from_literal(&payload).with_metadata(
            Metadata::new()
                .with_content_type("application/octet-stream")
                .with_disposition(Disposition::Attachment)
                .with_filename("numbers.bin"),
        ),
    );
    body.refresh_boundary();
    headers.set_header("Content-Type", &body.content_type());
    let boundary = body.boundary().to_string();

    let mut message = AppendStream::default();
    message.add_stream(headers.to_stream()).unwrap();
    message.add_stream(body.into_stream().unwrap()).unwrap();

    let mut raw = String::new();
    StreamReader::new(message).read_to_string(&mut raw).unwrap();

    let (head, rest) = raw.split_once("\n\n").unwrap();
    assert!(head.contains("\nSubject: Quarterly report"));
    assert!(head.contains("\nTo: One <one@example.com>"));
    assert!(head.contains("\nCc: two@example.com"));
    assert!(head.contains(&format!("\nContent-Type: multipart/mixed; boundary={boundary}")));
    assert!(head.contains("@mx.example.org>"));
    assert!(rest.starts_with(&format!("\n--{boundary}\nContent-Type: multipart/alternative;")));
    assert!(rest.contains("filename=\"numbers.bin\""));

    let attachment = rest
        .split("filename=\"numbers.bin\"\n\n")
        .nth(1)
        .unwrap()
        .replace('\n', "");
    assert_eq!(STANDARD.decode(attachment).unwrap(), payload);
}
