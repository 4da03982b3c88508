//! Track log model and loader.
//!
//! A track log is the recorded output of a teach run: an ordered sequence of
//! vehicle poses, some of which are flagged as inspection points carrying the
//! object detections observed during recording. The log is loaded atomically
//! from a YAML document written by the recorder and is immutable afterwards.

use crate::error::{AnugaError, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// Allowed deviation of a quaternion norm from 1.
const QUATERNION_NORM_TOLERANCE: f64 = 1e-3;

/// 3D position in the track log's reference frame (meters).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Unit quaternion orientation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Orientation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Orientation {
    /// Euclidean norm of the quaternion.
    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt()
    }
}

/// Recorded vehicle pose.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub position: Position,
    pub orientation: Orientation,
}

/// One detection captured at an inspection point during the teach run.
///
/// The bounding-box extents are carried through from the recorder but only
/// the class name participates in inspection confirmation.
#[derive(Clone, Debug, PartialEq)]
pub struct ExpectedDetection {
    pub class_name: String,
    pub confidence: f64,
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

/// One recorded track point.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackPoint {
    pub pose: Pose,
    /// Whether this point was flagged for visual inspection during recording.
    pub is_inspection: bool,
    /// Detections observed at recording time (meaningful for inspection points).
    pub expected: Vec<ExpectedDetection>,
}

impl TrackPoint {
    /// Object classes expected to be observable at this point.
    pub fn expected_classes(&self) -> HashSet<String> {
        self.expected
            .iter()
            .map(|d| d.class_name.clone())
            .collect()
    }
}

/// An ordered, immutable-once-loaded sequence of track points.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackLog {
    /// Reference frame all poses are expressed in.
    pub frame_id: String,
    /// Points in recorded order. Non-empty after a successful load.
    pub points: Vec<TrackPoint>,
}

impl TrackLog {
    /// Load a track log from a YAML file.
    ///
    /// The load is atomic: any unreadable or malformed entry fails the whole
    /// load and no partial log is produced.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AnugaError::Load(format!("Failed to read {:?}: {}", path, e)))?;
        Self::from_yaml(&content)
    }

    /// Parse a track log from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let raw: RawTrackLog = serde_yaml::from_str(text)
            .map_err(|e| AnugaError::Load(format!("Malformed track log: {}", e)))?;

        let mut points = Vec::with_capacity(raw.tracklog.len());
        for (index, entry) in raw.tracklog.into_iter().enumerate() {
            points.push(entry.validate(index)?);
        }

        if points.is_empty() {
            return Err(AnugaError::Load("Track log contains no points".to_string()));
        }

        Ok(Self {
            frame_id: raw.header_frame,
            points,
        })
    }

    /// Number of recorded points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Number of inspection points.
    pub fn inspection_count(&self) -> usize {
        self.points.iter().filter(|p| p.is_inspection).count()
    }
}

// Raw document shapes as written by the recorder. Poses are stored as a list
// of single-key maps (one for position, one for orientation).

#[derive(Debug, Deserialize)]
struct RawTrackLog {
    header_frame: String,
    tracklog: Vec<RawTrackPoint>,
}

#[derive(Debug, Deserialize)]
struct RawTrackPoint {
    pose: Vec<RawPoseEntry>,
    #[serde(rename = "isRecorded")]
    is_recorded: bool,
    #[serde(rename = "boundingBoxes", default)]
    bounding_boxes: Vec<RawBoundingBox>,
}

#[derive(Debug, Deserialize)]
struct RawPoseEntry {
    #[serde(default)]
    position: Option<Vec<f64>>,
    #[serde(default)]
    orientation: Option<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
struct RawBoundingBox {
    #[serde(rename = "Class")]
    class: String,
    probability: f64,
    xmin: f64,
    ymin: f64,
    xmax: f64,
    ymax: f64,
}

impl RawTrackPoint {
    fn validate(self, index: usize) -> Result<TrackPoint> {
        let mut position = None;
        let mut orientation = None;

        for entry in &self.pose {
            if let Some(p) = &entry.position {
                if p.len() != 3 {
                    return Err(AnugaError::Load(format!(
                        "Point {}: position must have 3 components, got {}",
                        index,
                        p.len()
                    )));
                }
                position = Some(Position {
                    x: p[0],
                    y: p[1],
                    z: p[2],
                });
            }
            if let Some(q) = &entry.orientation {
                if q.len() != 4 {
                    return Err(AnugaError::Load(format!(
                        "Point {}: orientation must have 4 components, got {}",
                        index,
                        q.len()
                    )));
                }
                orientation = Some(Orientation {
                    x: q[0],
                    y: q[1],
                    z: q[2],
                    w: q[3],
                });
            }
        }

        let position = position
            .ok_or_else(|| AnugaError::Load(format!("Point {}: missing position", index)))?;
        let orientation = orientation
            .ok_or_else(|| AnugaError::Load(format!("Point {}: missing orientation", index)))?;

        if (orientation.norm() - 1.0).abs() > QUATERNION_NORM_TOLERANCE {
            return Err(AnugaError::Load(format!(
                "Point {}: orientation is not a unit quaternion (norm {:.4})",
                index,
                orientation.norm()
            )));
        }

        let expected = self
            .bounding_boxes
            .into_iter()
            .map(|bb| ExpectedDetection {
                class_name: bb.class,
                confidence: bb.probability,
                xmin: bb.xmin,
                ymin: bb.ymin,
                xmax: bb.xmax,
                ymax: bb.ymax,
            })
            .collect();

        Ok(TrackPoint {
            pose: Pose {
                position,
                orientation,
            },
            is_inspection: self.is_recorded,
            expected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
header_frame: world
tracklog:
- pose:
  - position: [1.0, 2.0, -5.0]
  - orientation: [0.0, 0.0, 0.0, 1.0]
  isRecorded: false
  boundingBoxes: []
- pose:
  - position: [3.0, 2.0, -5.0]
  - orientation: [0.0, 0.0, 0.7071068, 0.7071068]
  isRecorded: true
  boundingBoxes:
  - Class: buoy
    probability: 0.91
    xmin: 120.0
    ymin: 80.0
    xmax: 260.0
    ymax: 210.0
"#;

    #[test]
    fn parses_recorded_log() {
        let log = TrackLog::from_yaml(SAMPLE).unwrap();
        assert_eq!(log.frame_id, "world");
        assert_eq!(log.len(), 2);
        assert_eq!(log.inspection_count(), 1);

        let first = &log.points[0];
        assert!(!first.is_inspection);
        assert_eq!(first.pose.position.z, -5.0);

        let second = &log.points[1];
        assert!(second.is_inspection);
        assert_eq!(
            second.expected_classes(),
            HashSet::from(["buoy".to_string()])
        );
        assert_eq!(second.expected[0].xmax, 260.0);
    }

    #[test]
    fn reload_is_idempotent() {
        let a = TrackLog::from_yaml(SAMPLE).unwrap();
        let b = TrackLog::from_yaml(SAMPLE).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_log_fails() {
        let err = TrackLog::from_yaml("header_frame: world\ntracklog: []\n").unwrap_err();
        assert!(matches!(err, AnugaError::Load(_)));
    }

    #[test]
    fn missing_orientation_fails() {
        let text = r#"
header_frame: world
tracklog:
- pose:
  - position: [0.0, 0.0, 0.0]
  isRecorded: false
  boundingBoxes: []
"#;
        let err = TrackLog::from_yaml(text).unwrap_err();
        assert!(matches!(err, AnugaError::Load(_)));
    }

    #[test]
    fn non_unit_quaternion_fails() {
        let text = r#"
header_frame: world
tracklog:
- pose:
  - position: [0.0, 0.0, 0.0]
  - orientation: [0.0, 0.0, 0.0, 2.0]
  isRecorded: false
  boundingBoxes: []
"#;
        let err = TrackLog::from_yaml(text).unwrap_err();
        assert!(matches!(err, AnugaError::Load(_)));
    }

    #[test]
    fn malformed_entry_fails_whole_load() {
        // Second entry has a short position vector; nothing must be produced.
        let text = r#"
header_frame: world
tracklog:
- pose:
  - position: [0.0, 0.0, 0.0]
  - orientation: [0.0, 0.0, 0.0, 1.0]
  isRecorded: false
  boundingBoxes: []
- pose:
  - position: [1.0, 2.0]
  - orientation: [0.0, 0.0, 0.0, 1.0]
  isRecorded: false
  boundingBoxes: []
"#;
        let err = TrackLog::from_yaml(text).unwrap_err();
        assert!(matches!(err, AnugaError::Load(_)));
    }

    #[test]
    fn missing_bounding_boxes_key_defaults_to_empty() {
        let text = r#"
header_frame: odom
tracklog:
- pose:
  - position: [0.0, 0.0, 0.0]
  - orientation: [0.0, 0.0, 0.0, 1.0]
  isRecorded: true
"#;
        let log = TrackLog::from_yaml(text).unwrap();
        assert!(log.points[0].expected.is_empty());
        assert!(log.points[0].expected_classes().is_empty());
    }
}
