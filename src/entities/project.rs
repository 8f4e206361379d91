//! Timeline project - the injected TimeBase context plus its tracks.
//!
//! On-disk form is a flat JSON document (`ProjectFile`); the in-memory form
//! keeps each track's interval index built and ready for queries.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::color::Color;
use super::tag::Tag;
use super::track::{Track, TrackId, TrackType};
use crate::core::timebase::{FrameRate, TimeBase};

/// Serialized track
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackFile {
    pub track_id: TrackId,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(default)]
    pub track_type: TrackType,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// Serialized project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectFile {
    pub frame_rate: FrameRate,
    #[serde(default)]
    pub drop_frame: bool,
    pub duration: f64,
    #[serde(default)]
    pub tracks: Vec<TrackFile>,
}

#[derive(Debug, Clone)]
pub struct TimelineProject {
    time_base: TimeBase,
    tracks: IndexMap<TrackId, Track>,
}

impl TimelineProject {
    pub fn new(time_base: TimeBase) -> Self {
        Self {
            time_base,
            tracks: IndexMap::new(),
        }
    }

    pub fn from_file(file: ProjectFile) -> Self {
        let time_base = TimeBase::new(file.frame_rate, file.drop_frame, file.duration);
        let mut project = Self::new(time_base);
        for tf in file.tracks {
            let label = tf.label.unwrap_or_else(|| tf.track_id.to_string());
            let mut track = Track::new(tf.track_id, label, tf.track_type);
            if let Some(color) = tf.color {
                track = track.with_color(color);
            }
            let rejected = track.set_tags(tf.tags);
            if rejected > 0 {
                log::warn!(
                    "Track '{}': {} malformed tags excluded",
                    track.track_id(),
                    rejected
                );
            }
            project.add_track(track);
        }
        project
    }

    pub fn to_file(&self) -> ProjectFile {
        ProjectFile {
            frame_rate: self.time_base.rate(),
            drop_frame: self.time_base.drop_frame(),
            duration: self.time_base.duration(),
            tracks: self
                .tracks
                .values()
                .map(|t| TrackFile {
                    track_id: t.track_id().clone(),
                    label: Some(t.label().to_string()),
                    color: Some(t.color()),
                    track_type: t.track_type(),
                    tags: t.tags_vec(),
                })
                .collect(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: ProjectFile =
            serde_json::from_str(json).context("Failed to parse project JSON")?;
        Ok(Self::from_file(file))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read project {}", path.display()))?;
        let project = Self::from_json_str(&json)
            .with_context(|| format!("Invalid project {}", path.display()))?;
        log::info!(
            "Loaded project {} ({} tracks, {} @ {})",
            path.display(),
            project.tracks.len(),
            crate::core::timebase::time_to_string(project.time_base.duration(), false),
            project.time_base.rate()
        );
        Ok(project)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.to_file())
            .context("Failed to serialize project")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write project {}", path.display()))?;
        Ok(())
    }

    pub fn time_base(&self) -> &TimeBase {
        &self.time_base
    }

    pub fn frame_rate(&self) -> FrameRate {
        self.time_base.rate()
    }

    /// Insert or replace a track (replacement keeps its position)
    pub fn add_track(&mut self, track: Track) {
        self.tracks.insert(track.track_id().clone(), track);
    }

    pub fn remove_track(&mut self, id: &TrackId) -> Option<Track> {
        self.tracks.shift_remove(id)
    }

    pub fn track(&self, id: &TrackId) -> Option<&Track> {
        self.tracks.get(id)
    }

    pub fn track_mut(&mut self, id: &TrackId) -> Option<&mut Track> {
        self.tracks.get_mut(id)
    }

    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::tag::TagId;

    const SAMPLE: &str = r##"{
        "frame_rate": "30000/1001",
        "drop_frame": true,
        "duration": 120.0,
        "tracks": [
            { "track_id": "shots", "label": "Shots", "track_type": "clip", "color": "#ff0000",
              "tags": [
                { "tag_id": "s1", "start_time": 0, "end_time": 10 },
                { "tag_id": "s2", "start_time": 10, "end_time": 25.5 }
              ] },
            { "track_id": "faces", "tags": [
                { "tag_id": "f1", "start_time": 3, "end_time": 4, "text": "Alice" },
                { "tag_id": "bad", "start_time": "x", "end_time": 4 }
              ] }
        ]
    }"##;

    #[test]
    fn test_parse_project() {
        let project = TimelineProject::from_json_str(SAMPLE).unwrap();
        assert_eq!(project.frame_rate(), FrameRate::NTSC_29_97);
        assert!(project.time_base().drop_frame());
        assert_eq!(project.track_count(), 2);

        let shots = project.track(&TrackId::from("shots")).unwrap();
        assert_eq!(shots.track_type(), TrackType::Clip);
        assert_eq!(shots.color(), Color::rgb(255, 0, 0));
        assert_eq!(shots.search_point(10.0), vec![TagId::from("s2")]);

        let faces = project.track(&TrackId::from("faces")).unwrap();
        assert_eq!(faces.label(), "faces");
        assert_eq!(faces.track_type(), TrackType::Metadata);
        assert_eq!(faces.len(), 2);
        assert_eq!(faces.index().len(), 1);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.json");
        let project = TimelineProject::from_json_str(SAMPLE).unwrap();
        project.save(&path).unwrap();

        let reloaded = TimelineProject::load(&path).unwrap();
        assert_eq!(reloaded.track_count(), 2);
        assert_eq!(reloaded.frame_rate(), FrameRate::NTSC_29_97);
        let ids: Vec<&str> = reloaded.tracks().map(|t| t.track_id().as_str()).collect();
        assert_eq!(ids, vec!["shots", "faces"]);
    }

    #[test]
    fn test_load_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(TimelineProject::load(&dir.path().join("nope.json")).is_err());
        assert!(TimelineProject::from_json_str("{").is_err());
    }
}
