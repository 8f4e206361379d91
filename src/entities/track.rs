//! Track - ordered, named collection of tags with its own interval index.
//!
//! The index is rebuilt wholesale on bulk loads (`set_tags`) and patched on
//! single-tag edits, so it always matches the tag set.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::color::Color;
use super::tag::{Tag, TagId};
use crate::core::interval_index::IntervalIndex;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TrackId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// How a track's tags are drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrackType {
    /// Annotations drawn as markers
    #[default]
    Metadata,
    /// Edit clips drawn as contiguous blocks
    Clip,
    /// The main program content, drawn as blocks
    PrimaryContent,
}

impl TrackType {
    /// Block-style geometry (vs. markers)
    pub fn draws_blocks(&self) -> bool {
        matches!(self, TrackType::Clip | TrackType::PrimaryContent)
    }
}

#[derive(Debug, Clone)]
pub struct Track {
    track_id: TrackId,
    label: String,
    color: Color,
    track_type: TrackType,
    tags: IndexMap<TagId, Tag>,
    index: IntervalIndex<TagId>,
}

impl Track {
    pub fn new(track_id: impl Into<TrackId>, label: impl Into<String>, track_type: TrackType) -> Self {
        let track_id = track_id.into();
        let label = label.into();
        Self {
            color: Color::from_hash(&label),
            index: IntervalIndex::named(track_id.as_str()),
            track_id,
            label,
            track_type,
            tags: IndexMap::new(),
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_tags(mut self, tags: Vec<Tag>) -> Self {
        self.set_tags(tags);
        self
    }

    pub fn track_id(&self) -> &TrackId {
        &self.track_id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn track_type(&self) -> TrackType {
        self.track_type
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// All tags in insertion order, malformed ones included
    pub fn tags(&self) -> impl Iterator<Item = &Tag> {
        self.tags.values()
    }

    /// Owned copy of the tag list (for handing across threads)
    pub fn tags_vec(&self) -> Vec<Tag> {
        self.tags.values().cloned().collect()
    }

    pub fn tag(&self, id: &TagId) -> Option<&Tag> {
        self.tags.get(id)
    }

    pub fn index(&self) -> &IntervalIndex<TagId> {
        &self.index
    }

    /// Replace every tag and rebuild the index in one pass.
    /// Returns the number of malformed tags left out of the index.
    pub fn set_tags(&mut self, tags: Vec<Tag>) -> usize {
        self.tags = tags.into_iter().map(|t| (t.tag_id.clone(), t)).collect();
        let rejected = self.index.rebuild(
            self.tags
                .values()
                .map(|t| (t.start_time, t.end_time, t.tag_id.clone())),
        );
        log::debug!(
            "Track '{}': indexed {} tags ({} malformed)",
            self.track_id,
            self.index.len(),
            rejected
        );
        rejected
    }

    /// Add or replace one tag, patching the index.
    /// Returns false if the tag is malformed (kept in the list, not indexed).
    pub fn upsert_tag(&mut self, tag: Tag) -> bool {
        let indexed = self
            .index
            .insert(tag.start_time, tag.end_time, tag.tag_id.clone());
        self.tags.insert(tag.tag_id.clone(), tag);
        indexed
    }

    pub fn remove_tag(&mut self, id: &TagId) -> Option<Tag> {
        self.index.remove(id);
        self.tags.shift_remove(id)
    }

    /// Tag ids overlapping `[a, b]` (index order)
    pub fn search(&self, a: f64, b: f64) -> Vec<TagId> {
        self.index.search(a, b)
    }

    /// Tag ids active at `p`
    pub fn search_point(&self, p: f64) -> Vec<TagId> {
        self.index.search_point(p)
    }

    /// Tags overlapping `[a, b]`
    pub fn tags_in(&self, a: f64, b: f64) -> Vec<&Tag> {
        self.index
            .search(a, b)
            .iter()
            .filter_map(|id| self.tags.get(id))
            .collect()
    }
}
