//! RenderCoordinator - interactive-side glue between timeline state and the
//! per-track renderers.
//!
//! Changes are grouped into five signal groups. Each (track, group) pair has
//! one debounce timer; a newer change re-arms it, so a burst of edits, zoom
//! steps or keystrokes produces one dispatch. Delays grow with track density
//! (`base * max(1, log10(n))`).
//!
//! At dispatch time only the fields that differ from what the renderer last
//! received are sent. The active-at-playhead set is compared as soon as it is
//! computed, so steady playback over the same tags sends nothing at all.
//!
//! # Usage
//! ```ignore
//! let mut coord = RenderCoordinator::new(time_base, settings);
//! coord.add_track(track)?;
//! // per UI frame:
//! coord.update_playhead(player_time);
//! coord.tick();
//! let image = coord.canvas().composite(row_height);
//! ```

use crossbeam_channel::{Receiver, Sender, unbounded};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::time::{Duration, Instant};

use super::canvas::TimelineCanvas;
use super::hit_test::HitTester;
use super::track_renderer::{Dimensions, InitParams, RenderError, RenderMessage};
use super::worker::{RenderResult, RendererHandle};
use crate::config::EngineSettings;
use crate::core::debounce::{Debouncer, density_scaled};
use crate::core::timebase::TimeBase;
use crate::core::viewport::{Scale, Viewport};
use crate::entities::tag::{Tag, TagId};
use crate::entities::track::{Track, TrackId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SignalGroup {
    /// Tag set changed (bulk or single edit)
    Entries,
    /// Zoom window or canvas size
    Scale,
    /// Text filter
    Filter,
    /// Selection / hover sets
    Selection,
    /// Tags active at the playhead
    Active,
}

impl SignalGroup {
    pub const ALL: [SignalGroup; 5] = [
        SignalGroup::Entries,
        SignalGroup::Scale,
        SignalGroup::Filter,
        SignalGroup::Selection,
        SignalGroup::Active,
    ];

    fn slot(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    /// Messages sent per signal group, indexed like [`SignalGroup::ALL`]
    pub dispatched: [u64; 5],
    /// Playhead updates that produced an unchanged active set
    pub suppressed_active: u64,
    /// Render results dropped as stale
    pub stale_discarded: u64,
    /// Render results applied to the canvas
    pub results_applied: u64,
}

impl CoordinatorStats {
    pub fn dispatched(&self, group: SignalGroup) -> u64 {
        self.dispatched[group.slot()]
    }

    pub fn total_dispatched(&self) -> u64 {
        self.dispatched.iter().sum()
    }
}

/// What a renderer was last told
#[derive(Debug, Clone)]
struct SentState {
    entries_version: u64,
    scale: Scale,
    dimensions: Dimensions,
    filter: String,
    selected: HashSet<TagId>,
    hover: HashSet<TagId>,
    active: HashSet<TagId>,
}

struct TrackBinding {
    handle: RendererHandle,
    /// UI-side copy with its own interval index (hit-testing, playhead)
    track: Track,
    entries_version: u64,
    active: HashSet<TagId>,
    sent: SentState,
}

/// Ids from `ids` that belong to `track`
fn subset(track: &Track, ids: &HashSet<TagId>) -> HashSet<TagId> {
    ids.iter()
        .filter(|id| track.tag(id).is_some())
        .cloned()
        .collect()
}

pub struct RenderCoordinator {
    settings: EngineSettings,
    viewport: Viewport,
    dimensions: Dimensions,
    filter: String,
    selected: HashSet<TagId>,
    hover: HashSet<TagId>,
    playhead: Option<f64>,
    tracks: IndexMap<TrackId, TrackBinding>,
    timers: Debouncer<(TrackId, SignalGroup)>,
    results_tx: Sender<RenderResult>,
    results_rx: Receiver<RenderResult>,
    canvas: TimelineCanvas,
    stats: CoordinatorStats,
}

impl RenderCoordinator {
    pub fn new(time_base: TimeBase, settings: EngineSettings) -> Self {
        let (results_tx, results_rx) = unbounded();
        Self {
            viewport: Viewport::new(time_base).with_min_span(settings.min_scale_span),
            dimensions: settings.canvas,
            canvas: TimelineCanvas::new(settings.palette.background),
            settings,
            filter: String::new(),
            selected: HashSet::new(),
            hover: HashSet::new(),
            playhead: None,
            tracks: IndexMap::new(),
            timers: Debouncer::new(),
            results_tx,
            results_rx,
            stats: CoordinatorStats::default(),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn canvas(&self) -> &TimelineCanvas {
        &self.canvas
    }

    pub fn track(&self, id: &TrackId) -> Option<&Track> {
        self.tracks.get(id).map(|b| &b.track)
    }

    pub fn track_ids(&self) -> Vec<TrackId> {
        self.tracks.keys().cloned().collect()
    }

    pub fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            stale_discarded: self.canvas.discarded_count(),
            results_applied: self.canvas.applied_count(),
            ..self.stats
        }
    }

    /// Current active set of a track
    pub fn active(&self, id: &TrackId) -> Option<&HashSet<TagId>> {
        self.tracks.get(id).map(|b| &b.active)
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Earliest debounce deadline (for sleeping the UI loop)
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    // ========== Track lifecycle ==========

    /// Spawn a renderer for `track` and initialize it right away.
    /// Replaces (and destroys) any renderer already bound to the same id.
    pub fn add_track(&mut self, track: Track) -> anyhow::Result<()> {
        let id = track.track_id().clone();
        if self.tracks.contains_key(&id) {
            self.remove_track(&id);
        }
        let mut handle = RendererHandle::spawn(id.clone(), self.results_tx.clone())?;

        let active: HashSet<TagId> = match self.playhead {
            Some(t) => track.search_point(t).into_iter().collect(),
            None => HashSet::new(),
        };
        let selected = subset(&track, &self.selected);
        let hover = subset(&track, &self.hover);

        let params = InitParams {
            track_id: id.clone(),
            track_type: track.track_type(),
            color: track.color(),
            dimensions: self.dimensions,
            tags: track.tags_vec(),
            scale: self.viewport.scale(),
            time_base: *self.viewport.time_base(),
            palette: self.settings.palette,
            filter: self.filter.clone(),
            selected: selected.clone(),
            hover: hover.clone(),
            active: active.clone(),
        };
        handle.send(RenderMessage::Initialize(Box::new(params)))?;
        self.stats.dispatched[SignalGroup::Entries.slot()] += 1;
        self.canvas.attach(id.clone(), handle.id());

        let binding = TrackBinding {
            handle,
            sent: SentState {
                entries_version: 0,
                scale: self.viewport.scale(),
                dimensions: self.dimensions,
                filter: self.filter.clone(),
                selected,
                hover,
                active: active.clone(),
            },
            track,
            entries_version: 0,
            active,
        };
        log::debug!(
            "Coordinator: track '{}' added ({} tags)",
            id,
            binding.track.len()
        );
        self.tracks.insert(id, binding);
        Ok(())
    }

    /// Cancel the track's timers and destroy its renderer
    pub fn remove_track(&mut self, id: &TrackId) -> bool {
        let Some(mut binding) = self.tracks.shift_remove(id) else {
            return false;
        };
        let cancelled = self.timers.cancel_where(|(track, _)| track == id);
        binding.handle.destroy();
        self.canvas.detach(id);
        log::debug!(
            "Coordinator: track '{}' removed ({} pending timers cancelled)",
            id,
            cancelled
        );
        true
    }

    /// Destroy every renderer
    pub fn shutdown(&mut self) {
        for id in self.track_ids() {
            self.remove_track(&id);
        }
    }

    // ========== Signals ==========

    fn schedule(&mut self, id: &TrackId, group: SignalGroup) {
        let Some(binding) = self.tracks.get(id) else {
            return;
        };
        let delay = density_scaled(self.settings.debounce.base(group), binding.track.len());
        self.timers.schedule((id.clone(), group), delay);
    }

    fn schedule_all(&mut self, group: SignalGroup) {
        for id in self.track_ids() {
            self.schedule(&id, group);
        }
    }

    /// Replace a track's tags (bulk rebuild of the UI-side index)
    pub fn set_entries(&mut self, id: &TrackId, tags: Vec<Tag>) -> bool {
        let Some(binding) = self.tracks.get_mut(id) else {
            return false;
        };
        binding.track.set_tags(tags);
        binding.entries_version += 1;
        self.schedule(id, SignalGroup::Entries);
        self.refresh_active(id);
        true
    }

    /// Add or replace one tag (index patch)
    pub fn upsert_tag(&mut self, id: &TrackId, tag: Tag) -> bool {
        let Some(binding) = self.tracks.get_mut(id) else {
            return false;
        };
        binding.track.upsert_tag(tag);
        binding.entries_version += 1;
        self.schedule(id, SignalGroup::Entries);
        self.refresh_active(id);
        true
    }

    pub fn remove_tag(&mut self, id: &TrackId, tag_id: &TagId) -> bool {
        let Some(binding) = self.tracks.get_mut(id) else {
            return false;
        };
        if binding.track.remove_tag(tag_id).is_none() {
            return false;
        }
        binding.entries_version += 1;
        self.schedule(id, SignalGroup::Entries);
        self.refresh_active(id);
        true
    }

    fn scale_changed(&mut self, before: Scale) {
        if self.viewport.scale() != before {
            self.schedule_all(SignalGroup::Scale);
        }
    }

    pub fn set_scale(&mut self, min: f64, max: f64) {
        let before = self.viewport.scale();
        self.viewport.set_scale(min, max);
        self.scale_changed(before);
    }

    pub fn scroll_scale(&mut self, pivot: f64, delta_y: f64) {
        let before = self.viewport.scale();
        self.viewport.scroll_scale(pivot, delta_y);
        self.scale_changed(before);
    }

    pub fn scroll_to(&mut self, min: f64) {
        let before = self.viewport.scale();
        self.viewport.scroll_to(min);
        self.scale_changed(before);
    }

    pub fn reset_scale(&mut self) {
        let before = self.viewport.scale();
        self.viewport.reset();
        self.scale_changed(before);
    }

    /// Canvas size changes ride on the scale group
    pub fn resize(&mut self, width: u32, height: u32) {
        let dims = Dimensions::new(width, height);
        if dims != self.dimensions {
            self.dimensions = dims;
            self.schedule_all(SignalGroup::Scale);
        }
    }

    pub fn set_filter(&mut self, filter: &str) {
        let filter = filter.trim().to_lowercase();
        if filter != self.filter {
            self.filter = filter;
            self.schedule_all(SignalGroup::Filter);
        }
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Global selection / hover; each track receives its own subset
    pub fn set_selection(&mut self, selected: HashSet<TagId>, hover: HashSet<TagId>) {
        if selected == self.selected && hover == self.hover {
            return;
        }
        self.selected = selected;
        self.hover = hover;
        self.schedule_all(SignalGroup::Selection);
    }

    /// Recompute active sets at `time`. Tracks whose set did not change are
    /// left alone. Returns the number of tracks scheduled.
    pub fn update_playhead(&mut self, time: f64) -> usize {
        if !time.is_finite() {
            return 0;
        }
        let duration = self.viewport.time_base().duration();
        self.playhead = Some(time.clamp(0.0, duration.max(0.0)));
        let mut scheduled = 0;
        for id in self.track_ids() {
            if self.refresh_active(&id) {
                scheduled += 1;
            }
        }
        scheduled
    }

    pub fn playhead(&self) -> Option<f64> {
        self.playhead
    }

    /// Point query at the playhead; schedules only on change
    fn refresh_active(&mut self, id: &TrackId) -> bool {
        let Some(t) = self.playhead else {
            return false;
        };
        let Some(binding) = self.tracks.get_mut(id) else {
            return false;
        };
        let active: HashSet<TagId> = binding.track.search_point(t).into_iter().collect();
        if active == binding.active {
            self.stats.suppressed_active += 1;
            return false;
        }
        binding.active = active;
        self.schedule(id, SignalGroup::Active);
        true
    }

    // ========== Dispatch ==========

    /// Dispatch due timers, then apply any finished renders.
    /// Returns the number of messages sent.
    pub fn tick(&mut self) -> usize {
        let sent = self.tick_at(Instant::now());
        self.receive_results();
        sent
    }

    /// Dispatch timers due at `now`
    pub fn tick_at(&mut self, now: Instant) -> usize {
        let due = self.timers.due_at(now);
        self.dispatch_keys(due)
    }

    /// Dispatch every pending timer immediately
    pub fn flush(&mut self) -> usize {
        let all = self.timers.drain();
        self.dispatch_keys(all)
    }

    fn dispatch_keys(&mut self, keys: Vec<(TrackId, SignalGroup)>) -> usize {
        let mut sent = 0;
        for (id, group) in keys {
            log::trace!("Coordinator: dispatch {:?} for '{}'", group, id);
            sent += self.dispatch(&id, group);
        }
        sent
    }

    /// Send the diff for one group. Returns the number of messages sent.
    fn dispatch(&mut self, id: &TrackId, group: SignalGroup) -> usize {
        let scale = self.viewport.scale();
        let time_base = *self.viewport.time_base();
        let dimensions = self.dimensions;
        let Some(binding) = self.tracks.get_mut(id) else {
            return 0;
        };
        if binding.handle.is_destroyed() {
            log::debug!("Coordinator: '{}' renderer destroyed, not dispatching", id);
            return 0;
        }

        let mut messages = Vec::new();
        match group {
            SignalGroup::Entries => {
                if binding.sent.entries_version != binding.entries_version {
                    binding.sent.entries_version = binding.entries_version;
                    messages.push(RenderMessage::SetEntries(binding.track.tags_vec()));
                }
            }
            SignalGroup::Scale => {
                if binding.sent.scale != scale {
                    binding.sent.scale = scale;
                    messages.push(RenderMessage::SetScale { scale, time_base });
                }
                if binding.sent.dimensions != dimensions {
                    binding.sent.dimensions = dimensions;
                    messages.push(RenderMessage::Resize(dimensions));
                }
            }
            SignalGroup::Filter => {
                if binding.sent.filter != self.filter {
                    binding.sent.filter = self.filter.clone();
                    messages.push(RenderMessage::SetFilter(self.filter.clone()));
                }
            }
            SignalGroup::Selection => {
                let selected = subset(&binding.track, &self.selected);
                let hover = subset(&binding.track, &self.hover);
                if selected != binding.sent.selected || hover != binding.sent.hover {
                    binding.sent.selected = selected.clone();
                    binding.sent.hover = hover.clone();
                    messages.push(RenderMessage::SetSelected { selected, hover });
                }
            }
            SignalGroup::Active => {
                if binding.sent.active != binding.active {
                    binding.sent.active = binding.active.clone();
                    messages.push(RenderMessage::SetActive(binding.active.clone()));
                }
            }
        }

        let mut sent = 0;
        for msg in messages {
            match binding.handle.send(msg) {
                Ok(_) => sent += 1,
                Err(RenderError::Destroyed) => break,
                Err(e) => {
                    log::warn!("Coordinator: '{}' dispatch failed: {}", id, e);
                    break;
                }
            }
        }
        self.stats.dispatched[group.slot()] += sent as u64;
        sent
    }

    // ========== Results ==========

    /// Apply finished renders without blocking. Returns how many were applied.
    pub fn receive_results(&mut self) -> usize {
        self.canvas.drain(&self.results_rx)
    }

    /// True when every live track shows a render of its latest message
    pub fn is_settled(&self) -> bool {
        self.tracks.iter().all(|(id, b)| {
            self.canvas
                .layer(id)
                .is_some_and(|l| l.last_seq() >= b.handle.last_seq())
        })
    }

    /// Flush pending timers and block until every track is settled or
    /// `timeout` elapses. Returns whether everything settled.
    pub fn wait_for_renders(&mut self, timeout: Duration) -> bool {
        self.flush();
        let deadline = Instant::now() + timeout;
        self.receive_results();
        while !self.is_settled() {
            let now = Instant::now();
            if now >= deadline {
                log::warn!("Coordinator: renders not settled after {:?}", timeout);
                return false;
            }
            if let Ok(result) = self.results_rx.recv_timeout(deadline - now) {
                self.canvas.apply(result);
            }
        }
        true
    }

    // ========== Hit-testing ==========

    pub fn hit_tester(&self) -> HitTester<'_> {
        HitTester::new(
            &self.viewport,
            self.dimensions.width as f64,
            self.settings.hit_tolerance_px,
        )
        .with_filter(&self.filter)
    }

    /// Tag ids of `track` under pixel `x`, skipping tags the filter hides
    pub fn hit_test(&self, id: &TrackId, x: f64) -> Vec<TagId> {
        match self.tracks.get(id) {
            Some(binding) => self.hit_tester().tags_at_pixel(&binding.track, x),
            None => Vec::new(),
        }
    }
}

impl Drop for RenderCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::timebase::FrameRate;
    use crate::entities::track::TrackType;

    fn coordinator() -> RenderCoordinator {
        let mut settings = EngineSettings::default();
        settings.canvas = Dimensions::new(400, 16);
        RenderCoordinator::new(TimeBase::new(FrameRate::FPS_25, false, 100.0), settings)
    }

    fn track(id: &str) -> Track {
        Track::new(id, id, TrackType::Clip).with_tags(vec![
            Tag::new("a", 0.0, 10.0),
            Tag::new("b", 5.0, 15.0),
            Tag::new("c", 50.0, 60.0),
        ])
    }

    fn ids(items: &[&str]) -> HashSet<TagId> {
        items.iter().map(|s| TagId::from(*s)).collect()
    }

    #[test]
    fn test_same_active_set_dispatches_once() {
        let mut coord = coordinator();
        coord.add_track(track("t")).unwrap();

        assert_eq!(coord.update_playhead(7.0), 1);
        coord.flush();
        assert_eq!(coord.update_playhead(7.0), 0);
        coord.flush();
        // Different time, same tags under it
        assert_eq!(coord.update_playhead(8.0), 0);
        coord.flush();

        let stats = coord.stats();
        assert_eq!(stats.dispatched(SignalGroup::Active), 1);
        assert_eq!(stats.suppressed_active, 2);
        assert_eq!(coord.active(&TrackId::from("t")), Some(&ids(&["a", "b"])));
    }

    #[test]
    fn test_bursts_coalesce_per_group() {
        let mut coord = coordinator();
        coord.add_track(track("t")).unwrap();
        let before = coord.stats().dispatched(SignalGroup::Scale);

        for i in 0..20 {
            coord.scroll_scale(50.0, if i % 2 == 0 { -1.0 } else { -2.0 });
            coord.resize(400 + i, 16);
        }
        assert_eq!(coord.pending_timers(), 1);
        // SetScale + Resize in one dispatch
        assert_eq!(coord.flush(), 2);
        assert_eq!(coord.stats().dispatched(SignalGroup::Scale), before + 2);
        assert_eq!(coord.flush(), 0);
    }

    #[test]
    fn test_debounce_deadline_respected() {
        let mut coord = coordinator();
        coord.add_track(track("t")).unwrap();
        let now = Instant::now();
        coord.set_filter("a");
        assert_eq!(coord.tick_at(now), 0);
        assert_eq!(coord.tick_at(now + Duration::from_millis(300)), 1);
        // Same filter again is not a change
        coord.set_filter(" A ");
        assert_eq!(coord.pending_timers(), 0);
    }

    #[test]
    fn test_unchanged_state_sends_nothing() {
        let mut coord = coordinator();
        coord.add_track(track("t")).unwrap();
        coord.set_scale(0.0, 50.0);
        coord.set_scale(0.0, 100.0);
        assert_eq!(coord.flush(), 0);

        coord.set_selection(ids(&["zzz"]), HashSet::new());
        // Selection of ids this track doesn't own is an empty subset
        assert_eq!(coord.flush(), 0);
    }

    #[test]
    fn test_remove_track_cancels_timers() {
        let mut coord = coordinator();
        coord.add_track(track("t")).unwrap();
        coord.add_track(track("u")).unwrap();
        coord.set_filter("x");
        coord.update_playhead(55.0);
        assert_eq!(coord.pending_timers(), 4);

        assert!(coord.remove_track(&TrackId::from("t")));
        assert!(!coord.remove_track(&TrackId::from("t")));
        assert_eq!(coord.pending_timers(), 2);
        assert_eq!(coord.flush(), 2);
        assert!(coord.canvas().layer(&TrackId::from("t")).is_none());
    }

    #[test]
    fn test_entries_edit_updates_ui_index_and_active() {
        let mut coord = coordinator();
        let id = TrackId::from("t");
        coord.add_track(track("t")).unwrap();
        coord.update_playhead(55.0);
        coord.flush();

        assert!(coord.remove_tag(&id, &TagId::from("c")));
        assert!(coord.active(&id).unwrap().is_empty());
        assert!(coord.upsert_tag(&id, Tag::new("d", 54.0, 56.0)));
        assert_eq!(coord.active(&id), Some(&ids(&["d"])));
        // Entries + Active
        assert_eq!(coord.flush(), 2);
        assert!(!coord.remove_tag(&id, &TagId::from("nope")));
    }

    #[test]
    fn test_renders_settle_and_hit_test() {
        let mut coord = coordinator();
        let id = TrackId::from("t");
        coord.add_track(track("t")).unwrap();
        coord.set_scale(0.0, 20.0);
        assert!(coord.wait_for_renders(Duration::from_secs(5)));

        let layer = coord.canvas().layer(&id).unwrap();
        assert_eq!(layer.visible(), 2);
        assert_eq!(layer.image().unwrap().dimensions(), (400, 16));
        // 400px over 20s: x=20 is t=1s
        assert_eq!(coord.hit_test(&id, 20.0), vec![TagId::from("a")]);
        assert_eq!(coord.hit_test(&id, 150.0), vec![TagId::from("a"), TagId::from("b")]);
        assert!(coord.hit_test(&TrackId::from("nope"), 20.0).is_empty());
    }

    #[test]
    fn test_hit_test_follows_filter() {
        let mut coord = coordinator();
        let id = TrackId::from("pets");
        coord
            .add_track(Track::new("pets", "Pets", TrackType::Clip).with_tags(vec![
                Tag::new("dog", 10.0, 20.0).with_text("dog"),
                Tag::new("cat", 30.0, 40.0).with_text("cat"),
            ]))
            .unwrap();
        coord.set_filter("dog");
        coord.flush();
        assert!(coord.wait_for_renders(Duration::from_secs(5)));

        assert_eq!(coord.canvas().layer(&id).unwrap().visible(), 1);
        // 400px over 100s: x=60 is t=15s, x=140 is t=35s
        assert_eq!(coord.hit_test(&id, 60.0), vec![TagId::from("dog")]);
        assert!(coord.hit_test(&id, 140.0).is_empty());

        coord.set_filter("");
        assert_eq!(coord.hit_test(&id, 140.0), vec![TagId::from("cat")]);
    }
}
