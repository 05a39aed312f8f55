//! End-to-end tests: settings file in, raw message out.

#![allow(clippy::unwrap_used)]

use std::fs;

use mailweave_core::{Composer, Envelope, Error, Settings, Transport, WriterTransport};
use mailweave_mime::Stream;

/// Transport that records what it was handed.
#[derive(Default)]
struct Recorder {
    envelope: Option<Envelope>,
    data: Vec<u8>,
    reads: usize,
}

impl Transport for Recorder {
    fn send(&mut self, envelope: &Envelope, data: &mut dyn Stream) -> mailweave_core::Result<()> {
        self.envelope = Some(envelope.clone());
        while !data.eof()? {
            self.data.extend(data.read(100)?);
            self.reads += 1;
        }
        Ok(())
    }
}

#[test]
fn test_settings_file_to_message() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("body.html"), "<h1>Report</h1>").unwrap();
    fs::write(dir.path().join("data.bin"), vec![0u8, 1, 2, 3, 254, 255]).unwrap();
    let settings_path = dir.path().join("message.json");
    fs::write(
        &settings_path,
        r#"{
            "subject": "Weekly numbers",
            "to": [{"email": "team@example.com", "name": "Team"}],
            "cc": [{"email": "lead@example.com"}],
            "body": {"path": "body.html", "contentType": "text/html"},
            "altBody": {"text": "Report"},
            "attachments": [
                {"path": "data.bin", "contentType": "application/octet-stream"}
            ]
        }"#,
    )
    .unwrap();

    let settings = Settings::from_file(&settings_path).unwrap();
    let mut composer = Composer::new("reports@example.com", "Reports");
    composer.apply_settings(&settings).unwrap();

    let mut recorder = Recorder::default();
    composer.send(&mut recorder).unwrap();

    let envelope = recorder.envelope.unwrap();
    assert_eq!(envelope.from, "reports@example.com");
    assert_eq!(envelope.recipients, ["team@example.com", "lead@example.com"]);
    assert!(recorder.reads > 1);

    let raw = String::from_utf8(recorder.data).unwrap();
    assert!(raw.contains("\nSubject: Weekly numbers\n"));
    assert!(raw.contains("\nTo: Team <team@example.com>\n"));
    assert!(raw.contains("\nContent-Type: multipart/mixed; boundary="));
    assert!(raw.contains("\nMime-Version: 1.0\n"));
    // "<h1>Report</h1>" and the attachment bytes, base64 encoded
    assert!(raw.contains("\nPGgxPlJlcG9ydDwvaDE+\n"));
    assert!(raw.contains("Content-Disposition: attachment; filename=\"data.bin\"\n\nAAECA/7/\n"));
}

#[test]
fn test_writer_transport_output() {
    let mut composer = Composer::new("a@example.com", "");
    composer.add_bcc("hidden@example.com", "");
    composer.set_subject("Only bcc");

    let mut transport = WriterTransport::new(Vec::new());
    composer.send(&mut transport).unwrap();
    let raw = String::from_utf8(transport.into_inner()).unwrap();
    assert!(raw.contains("\nBcc: hidden@example.com\n"));
    assert!(raw.ends_with("Mime-Version: 1.0\n\n"));
}

#[test]
fn test_no_recipients() {
    let settings = Settings::from_json(r#"{"subject": "Nobody"}"#).unwrap();
    let mut composer = Composer::new("a@example.com", "");
    composer.apply_settings(&settings).unwrap();
    let err = composer.send(&mut Recorder::default()).unwrap_err();
    assert!(matches!(err, Error::NoRecipients));
    assert_eq!(err.to_string(), "No recipients were specified");
}

#[test]
fn test_missing_body_file() {
    let settings = Settings::from_json(r#"{"body": {"path": "/nonexistent/body.txt"}}"#).unwrap();
    let mut composer = Composer::new("a@example.com", "");
    assert!(matches!(
        composer.apply_settings(&settings),
        Err(Error::Mime(_))
    ));
}
