//! Worker output metadata ("sidecar") parsing and the captioning decision.
//!
//! The worker writes a JSON file next to the rendered video. Its location is
//! `output_path + ".json"`; older workers replaced the `.webm` extension
//! instead, so that name is tried second.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value as JsonValue;

use roadwatch_core::{defaults, representative_frame, Result};

/// Parsed sidecar contents.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SidecarMetadata {
    #[serde(default)]
    pub incidents: Option<JsonValue>,
    #[serde(default)]
    pub has_accident: bool,
    #[serde(default)]
    pub snapshot_paths: Option<Vec<String>>,
    /// Single-frame field written by older workers.
    #[serde(default)]
    pub snapshot_path: Option<String>,
    /// Report the worker generated itself.
    #[serde(default, rename = "aiReport")]
    pub ai_report: Option<String>,
    /// Incident row the worker already persisted.
    #[serde(default, rename = "incidentId")]
    pub incident_id: Option<i64>,
}

impl SidecarMetadata {
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Ordered frame paths: `snapshot_paths` when non-empty, else the legacy single frame.
    pub fn frames(&self) -> Vec<String> {
        match &self.snapshot_paths {
            Some(paths) if !paths.is_empty() => paths.clone(),
            _ => self.snapshot_path.iter().cloned().collect(),
        }
    }

    /// Worker-generated report, if non-empty.
    pub fn precomputed_report(&self) -> Option<&str> {
        self.ai_report.as_deref().filter(|r| !r.is_empty())
    }
}

/// Sidecar locations in lookup order.
pub fn sidecar_candidates(output_path: &str) -> Vec<PathBuf> {
    let primary = PathBuf::from(format!("{}{}", output_path, defaults::SIDECAR_SUFFIX));
    let legacy = PathBuf::from(output_path.replace(defaults::RENDERED_EXTENSION, defaults::SIDECAR_SUFFIX));
    if legacy == primary || legacy.as_os_str() == output_path {
        vec![primary]
    } else {
        vec![primary, legacy]
    }
}

/// Load the sidecar for `output_path`.
///
/// `Ok(None)` when no sidecar exists; an unreadable or malformed file is an error.
pub async fn load_sidecar(output_path: &str) -> Result<Option<(PathBuf, SidecarMetadata)>> {
    for candidate in sidecar_candidates(output_path) {
        match tokio::fs::read_to_string(&candidate).await {
            Ok(raw) => return Ok(Some((candidate, SidecarMetadata::from_json(&raw)?))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(None)
}

/// Final path component, or the input when it has none.
pub fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

/// Why captioning was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AutoReportDisabled,
    NoDetection,
}

/// What reconciliation should do with a completed job's metadata.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileDecision {
    /// Complete without a report.
    Skip(SkipReason),
    /// Use the worker's report verbatim; never caption, never create a row.
    Adopt {
        report: String,
        incident_id: Option<i64>,
    },
    /// Caption `frame` and record a new incident.
    Caption {
        frame: String,
        frames: Vec<String>,
    },
    /// Detection without any frame to caption.
    NoFrames,
}

/// Decide how to enrich a job. `auto_report` was captured at submission.
pub fn decide(metadata: &SidecarMetadata, auto_report: bool) -> ReconcileDecision {
    if !auto_report {
        return ReconcileDecision::Skip(SkipReason::AutoReportDisabled);
    }
    if !metadata.has_accident {
        return ReconcileDecision::Skip(SkipReason::NoDetection);
    }
    if let Some(report) = metadata.precomputed_report() {
        return ReconcileDecision::Adopt {
            report: report.to_string(),
            incident_id: metadata.incident_id,
        };
    }
    let frames = metadata.frames();
    match representative_frame(&frames) {
        Some(frame) => ReconcileDecision::Caption {
            frame: frame.to_string(),
            frames: frames.clone(),
        },
        None => ReconcileDecision::NoFrames,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_sidecar() {
        let raw = r#"{
            "incidents": [{"frame": 120, "label": "collision"}],
            "has_accident": true,
            "snapshot_paths": ["/data/snap_before.jpg", "/data/snap_during.jpg", "/data/snap_after.jpg"],
            "aiReport": "Worker report",
            "incidentId": 12
        }"#;
        let meta = SidecarMetadata::from_json(raw).unwrap();
        assert!(meta.has_accident);
        assert_eq!(meta.frames().len(), 3);
        assert_eq!(meta.precomputed_report(), Some("Worker report"));
        assert_eq!(meta.incident_id, Some(12));
        assert!(meta.incidents.unwrap().is_array());
    }

    #[test]
    fn test_legacy_single_snapshot() {
        let meta = SidecarMetadata::from_json(
            r#"{"has_accident": true, "snapshot_path": "/data/snap.jpg"}"#,
        )
        .unwrap();
        assert_eq!(meta.frames(), vec!["/data/snap.jpg"]);
    }

    #[test]
    fn test_missing_fields_default() {
        let meta = SidecarMetadata::from_json("{}").unwrap();
        assert!(!meta.has_accident);
        assert!(meta.frames().is_empty());
        assert!(meta.precomputed_report().is_none());
    }

    #[test]
    fn test_sidecar_candidates() {
        let candidates = sidecar_candidates("/data/processed_a.mp4.webm");
        assert_eq!(
            candidates,
            vec![
                PathBuf::from("/data/processed_a.mp4.webm.json"),
                PathBuf::from("/data/processed_a.mp4.json"),
            ]
        );
        assert_eq!(sidecar_candidates("/data/out.avi").len(), 1);
    }

    #[test]
    fn test_decide_order() {
        let mut meta = SidecarMetadata {
            has_accident: true,
            snapshot_paths: Some(vec!["a.jpg".into(), "b.jpg".into(), "c.jpg".into()]),
            ..Default::default()
        };

        assert_eq!(
            decide(&meta, false),
            ReconcileDecision::Skip(SkipReason::AutoReportDisabled)
        );
        assert_eq!(
            decide(&meta, true),
            ReconcileDecision::Caption {
                frame: "b.jpg".into(),
                frames: vec!["a.jpg".into(), "b.jpg".into(), "c.jpg".into()],
            }
        );

        meta.ai_report = Some(String::new());
        assert!(matches!(decide(&meta, true), ReconcileDecision::Caption { .. }));

        meta.ai_report = Some("cached".into());
        meta.incident_id = Some(3);
        assert_eq!(
            decide(&meta, true),
            ReconcileDecision::Adopt {
                report: "cached".into(),
                incident_id: Some(3),
            }
        );

        meta.has_accident = false;
        assert_eq!(
            decide(&meta, true),
            ReconcileDecision::Skip(SkipReason::NoDetection)
        );
    }

    #[test]
    fn test_decide_without_frames() {
        let meta = SidecarMetadata {
            has_accident: true,
            ..Default::default()
        };
        assert_eq!(decide(&meta, true), ReconcileDecision::NoFrames);
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("/data/snapshots/during.jpg"), "during.jpg");
        assert_eq!(file_name("during.jpg"), "during.jpg");
    }

    #[tokio::test]
    async fn test_load_sidecar_prefers_appended_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("processed_a.mp4.webm");
        let output = output.to_str().unwrap();

        assert!(load_sidecar(output).await.unwrap().is_none());

        std::fs::write(
            dir.path().join("processed_a.mp4.json"),
            r#"{"has_accident": false}"#,
        )
        .unwrap();
        let (path, meta) = load_sidecar(output).await.unwrap().unwrap();
        assert!(path.ends_with("processed_a.mp4.json"));
        assert!(!meta.has_accident);

        std::fs::write(
            format!("{output}.json"),
            r#"{"has_accident": true}"#,
        )
        .unwrap();
        let (path, meta) = load_sidecar(output).await.unwrap().unwrap();
        assert!(path.ends_with("processed_a.mp4.webm.json"));
        assert!(meta.has_accident);
    }

    #[tokio::test]
    async fn test_load_sidecar_malformed_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.webm");
        let output = output.to_str().unwrap();
        std::fs::write(format!("{output}.json"), "not json").unwrap();
        assert!(load_sidecar(output).await.is_err());
    }
}
