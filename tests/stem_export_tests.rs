//! Stem bundle export against a scripted tool.

mod common;

use common::{list_dir, FakeTool, Reply, TestWorkspace};
use std::sync::Arc;
use studio_pipeline::stems::{StemExportError, StemExporter, MANIFEST_FILE_NAME};
use studio_pipeline::AudioAsset;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn read_manifest(dir: &std::path::Path) -> serde_json::Value {
    let raw = std::fs::read_to_string(dir.join(MANIFEST_FILE_NAME)).unwrap();
    serde_json::from_str(&raw).unwrap()
}

#[tokio::test]
async fn test_export_default_stems() {
    let workspace = TestWorkspace::new();
    let song = workspace.audio_file("song.wav");
    let tool = Arc::new(FakeTool::new());
    let exporter = StemExporter::new(tool.clone(), workspace.exports_dir.clone());

    let result = exporter
        .export_stems(&AudioAsset::from_path(&song), &[], "My Song")
        .await
        .unwrap();

    let dir_name = result
        .output_directory
        .file_name()
        .unwrap()
        .to_string_lossy()
        .to_string();
    assert!(dir_name.starts_with(&format!("My_Song_{}_", result.manifest.timestamp)));
    assert!(result
        .output_directory
        .starts_with(workspace.exports_dir.join("stems")));

    assert_eq!(
        list_dir(&result.output_directory),
        vec![
            "bass.wav",
            "highs.wav",
            "instrumental.wav",
            "stems_info.json",
            "vocals.wav"
        ]
    );
    assert_eq!(tool.calls().len(), 4);

    let manifest = read_manifest(&result.output_directory);
    assert_eq!(manifest["sourceFile"], "song.wav");
    assert_eq!(manifest["exportName"], "My_Song");
    let names: Vec<&str> = manifest["stems"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["vocals", "instrumental", "bass", "highs"]);
    assert_eq!(
        manifest["stems"][2]["description"],
        "Bass frequencies (< 250Hz)"
    );
}

#[tokio::test]
async fn test_unknown_and_repeated_stems_are_skipped() {
    let workspace = TestWorkspace::new();
    let song = workspace.audio_file("song.wav");
    let tool = Arc::new(FakeTool::new());
    let exporter = StemExporter::new(tool.clone(), workspace.exports_dir.clone());

    let result = exporter
        .export_stems(
            &AudioAsset::from_path(&song),
            &strings(&["bass", "kazoo", "bass", "drums"]),
            "Song",
        )
        .await
        .unwrap();

    let stems: Vec<&String> = result.stem_files.keys().collect();
    assert_eq!(stems, vec!["bass", "drums"]);
    assert_eq!(result.manifest.stems.len(), 2);
    assert_eq!(tool.calls().len(), 2);

    let bass_call = &tool.calls_containing("bass.wav")[0];
    assert_eq!(bass_call.arg_after("-af"), Some("lowpass=f=250,bass=g=3"));
    assert_eq!(bass_call.arg_after("-ar"), Some("48000"));
    assert_eq!(bass_call.arg_after("-ac"), Some("2"));
}

#[tokio::test]
async fn test_failed_stem_is_reported() {
    let workspace = TestWorkspace::new();
    let song = workspace.audio_file("song.wav");
    let tool = Arc::new(
        FakeTool::new().when_arg("lowpass=f=250", Reply::failed(1, "Conversion failed!")),
    );
    let exporter = StemExporter::new(tool.clone(), workspace.exports_dir.clone());

    let outcome = exporter
        .export_stems(
            &AudioAsset::from_path(&song),
            &strings(&["vocals", "bass", "highs"]),
            "Song",
        )
        .await;

    match outcome {
        Err(StemExportError::SubprocessFailure { stage, message }) => {
            assert_eq!(stage, "stem:bass");
            assert!(message.contains("Conversion failed!"));
        }
        other => panic!("Expected stem failure, got {:?}", other),
    }
    // Siblings still ran
    assert_eq!(tool.calls().len(), 3);
}

#[tokio::test]
async fn test_concurrent_same_name_exports_get_separate_bundles() {
    let workspace = TestWorkspace::new();
    let song = AudioAsset::from_path(workspace.audio_file("song.wav"));
    let tool = Arc::new(FakeTool::new());
    let exporter = StemExporter::new(tool, workspace.exports_dir.clone());
    let requested = strings(&["bass"]);

    let (first, second) = tokio::join!(
        exporter.export_stems(&song, &requested, "Song"),
        exporter.export_stems(&song, &requested, "Song"),
    );
    let (first, second) = (first.unwrap(), second.unwrap());

    assert_ne!(first.output_directory, second.output_directory);
    assert_eq!(list_dir(&workspace.exports_dir.join("stems")).len(), 2);
    for result in [&first, &second] {
        assert_eq!(
            list_dir(&result.output_directory),
            vec!["bass.wav", "stems_info.json"]
        );
    }
}

#[tokio::test]
async fn test_missing_input() {
    let workspace = TestWorkspace::new();
    let tool = Arc::new(FakeTool::new());
    let exporter = StemExporter::new(tool.clone(), workspace.exports_dir.clone());

    let outcome = exporter
        .export_stems(
            &AudioAsset::from_path(workspace.missing_file("gone.wav")),
            &[],
            "Song",
        )
        .await;

    assert!(matches!(outcome, Err(StemExportError::InputNotFound(_))));
    assert!(tool.calls().is_empty());
    assert!(!workspace.exports_dir.exists());
}

#[tokio::test]
async fn test_export_from_tracks() {
    let workspace = TestWorkspace::new();
    let beat = workspace.audio_file("beat.mp3");
    let vocal = workspace.audio_file("vocal.wav");
    let tool = Arc::new(FakeTool::new());
    let exporter = StemExporter::new(tool.clone(), workspace.exports_dir.clone());

    let tracks = vec![
        ("beat".to_string(), AudioAsset::from_path(&beat)),
        (String::new(), AudioAsset::from_path(&beat)),
        ("lead vocal".to_string(), AudioAsset::from_path(&vocal)),
        (
            "fx".to_string(),
            AudioAsset::from_path(workspace.missing_file("fx.wav")),
        ),
        ("beat".to_string(), AudioAsset::from_path(&vocal)),
    ];
    let result = exporter
        .export_stems_from_tracks(&tracks, "Session 1")
        .await
        .unwrap();

    assert_eq!(
        list_dir(&result.output_directory),
        vec!["beat.wav", "lead_vocal.wav", "stems_info.json"]
    );
    assert!(!result.stem_files.contains_key(""));

    let calls = tool.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| !c.args.contains(&"-af".to_string())));

    let manifest = read_manifest(&result.output_directory);
    assert!(manifest.get("sourceFile").is_none());
    assert_eq!(manifest["exportName"], "Session_1");
    assert_eq!(manifest["stems"][1]["file"], "lead_vocal.wav");
    assert!(manifest["stems"][1].get("description").is_none());
}
