mod common;

use common::{MockColander, Recorder};
use pirogue_colander::api::ArtifactType;
use pirogue_colander::artifact::{choose_type, sidecar_path};
use pirogue_colander::{
    ArtifactCollector, Error, FixedType, NoProgress, Result, TypeChoice, TypeResolver,
};
use serde_json::{json, Map, Value};
use std::path::Path;
use tempfile::TempDir;

fn capture(dir: &TempDir, name: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, b"\xd4\xc3\xb2\xa1 capture").unwrap();
    path
}

fn collector<'a>(
    client: &'a MockColander,
    path: &Path,
    choice: TypeChoice<'_>,
) -> Result<ArtifactCollector<'a>> {
    ArtifactCollector::new(client, path, "case-1", choice, Map::new())
}

struct TypedAnswer(&'static str);

impl TypeResolver for TypedAnswer {
    fn resolve(&self, _path: &Path, types: &[ArtifactType]) -> Result<String> {
        Ok(choose_type(types, self.0)?.short_name.clone())
    }
}

#[test]
fn named_type_upload_reaches_100_percent() {
    let dir = TempDir::new().unwrap();
    let path = capture(&dir, "cap.pcap");
    let client = MockColander::new();
    let mut progress = Recorder::default();

    let artifact = collector(&client, &path, TypeChoice::Named("PCAP"))
        .unwrap()
        .collect(&mut progress)
        .unwrap();

    assert_eq!(artifact.name, "cap.pcap");
    assert_eq!(client.upload_types(), ["PCAP"]);
    let deltas: Vec<f64> = progress.updates.iter().map(|(_, d, _)| *d).collect();
    assert_eq!(deltas, [40.0, 40.0, 20.0]);
    assert_eq!(progress.updates[0].0, "upload");
    assert_eq!(progress.updates[0].2, "PROCESSING");
    assert_eq!(progress.total(), 100.0);
    assert_eq!(progress.finished, 1);
}

#[test]
fn overshooting_progress_is_clamped() {
    let dir = TempDir::new().unwrap();
    let path = capture(&dir, "cap.pcap");
    let mut client = MockColander::new();
    client.progress_steps = vec![70.0, 70.0];
    let mut progress = Recorder::default();

    collector(&client, &path, TypeChoice::Named("PCAP"))
        .unwrap()
        .collect(&mut progress)
        .unwrap();

    let deltas: Vec<f64> = progress.updates.iter().map(|(_, d, _)| *d).collect();
    assert_eq!(deltas, [70.0, 30.0]);
}

#[test]
fn failed_upload_still_finishes_progress() {
    let dir = TempDir::new().unwrap();
    let path = capture(&dir, "cap.pcap");
    let mut client = MockColander::new();
    client.fail_on = Some("cap.pcap".into());
    let mut progress = Recorder::default();

    let err = collector(&client, &path, TypeChoice::Named("PCAP"))
        .unwrap()
        .collect(&mut progress)
        .unwrap_err();

    assert!(matches!(err, Error::Api { status: 500, .. }));
    assert_eq!(progress.finished, 1);
    assert!(progress.updates.is_empty());
}

#[test]
fn unknown_type_uploads_nothing() {
    let dir = TempDir::new().unwrap();
    let path = capture(&dir, "cap.pcap");
    let client = MockColander::new();

    let err = collector(&client, &path, TypeChoice::Named("NOPE"))
        .err()
        .unwrap();
    assert!(matches!(err, Error::UnknownArtifactType(ref n) if n == "NOPE"));
    assert!(client.state.lock().unwrap().uploads.is_empty());
}

#[test]
fn missing_file_is_invalid_input() {
    let dir = TempDir::new().unwrap();
    let client = MockColander::new();
    for path in [dir.path().join("absent.pcap"), dir.path().to_path_buf()] {
        let err = collector(&client, &path, TypeChoice::Named("PCAP"))
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}

#[test]
fn resolver_picks_the_type() {
    let dir = TempDir::new().unwrap();
    let path = capture(&dir, "app.apk");
    let client = MockColander::new();

    let resolver = FixedType("APK".into());
    collector(&client, &path, TypeChoice::Ask(&resolver))
        .unwrap()
        .collect(&mut Recorder::default())
        .unwrap();
    assert_eq!(client.upload_types(), ["APK"]);

    collector(&client, &path, TypeChoice::Ask(&TypedAnswer("4")))
        .unwrap()
        .collect(&mut Recorder::default())
        .unwrap();
    assert_eq!(client.upload_types(), ["APK", "VIDEO"]);
}

#[test]
fn invalid_choice_aborts_the_upload() {
    let dir = TempDir::new().unwrap();
    let path = capture(&dir, "app.apk");
    let client = MockColander::new();

    for answer in ["42", "apk"] {
        let err = collector(&client, &path, TypeChoice::Ask(&TypedAnswer(answer)))
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidChoice(_)));
    }
    assert!(client.state.lock().unwrap().uploads.is_empty());
}

#[test]
fn sidecar_attributes_are_uploaded() {
    let dir = TempDir::new().unwrap();
    let path = capture(&dir, "cap.pcap");
    std::fs::write(sidecar_path(&path), r#"{"a": 99, "b": 2}"#).unwrap();
    let client = MockColander::new();

    let mut attributes = Map::new();
    attributes.insert("a".into(), json!(1));
    let collector =
        ArtifactCollector::new(&client, &path, "case-1", TypeChoice::Named("PCAP"), attributes)
            .unwrap();
    assert_eq!(collector.artifact_type().short_name, "PCAP");
    assert_eq!(collector.attributes().len(), 2);
    collector.collect(&mut NoProgress).unwrap();

    let state = client.state.lock().unwrap();
    let uploaded: &Map<String, Value> = &state.uploads[0].attributes;
    assert_eq!(uploaded["a"], json!(1));
    assert_eq!(uploaded["b"], json!(2));
}
