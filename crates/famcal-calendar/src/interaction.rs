//! Drag and resize gestures on the time grid.
//!
//! A [`GestureTracker`] lives for exactly one pointer gesture: it is created on
//! pointer-down, fed move samples, and consumed on pointer-up. It never writes
//! anything itself; it produces [`EventMove`] proposals that the caller hands to
//! the event service.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use famcal_core::CalendarConfig;

use crate::types::CalendarEvent;

/// Mouse movement (px) before a press counts as a drag.
pub const DRAG_THRESHOLD_PX: f64 = 3.0;
/// Touch hold (ms) before drag mode is entered.
pub const LONG_PRESS_MS: u64 = 500;
/// Touch movement (px) that cancels a pending long press.
pub const LONG_PRESS_CANCEL_PX: f64 = 10.0;

/// Pixel geometry of the visible grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GridGeometry {
    pub hour_height: f64,
    pub snap_minutes: u32,
    pub min_duration_minutes: u32,
    /// Width of one day column; zero disables horizontal moves.
    pub day_width: f64,
    pub first_day: NaiveDate,
    pub visible_days: u32,
    pub tz: Tz,
}

impl GridGeometry {
    pub fn from_config(
        config: &CalendarConfig,
        first_day: NaiveDate,
        visible_days: u32,
        day_width: f64,
    ) -> Self {
        Self {
            hour_height: config.hour_height_px,
            snap_minutes: config.snap_minutes,
            min_duration_minutes: config.min_duration_minutes,
            day_width,
            first_day,
            visible_days,
            tz: config.tz(),
        }
    }

    /// Convert a vertical pixel delta to whole minutes snapped to the grid.
    pub fn snap_minutes(&self, delta_px: f64) -> i64 {
        if self.hour_height <= 0.0 {
            return 0;
        }
        let minutes = (delta_px / self.hour_height * 60.0).round();
        let snap = f64::from(self.snap_minutes.max(1));
        ((minutes / snap).round() * snap) as i64
    }

    /// Like [`snap_minutes`](Self::snap_minutes), but a resized edge only moves
    /// once the pointer has covered a whole snap step.
    pub fn snap_edge_minutes(&self, delta_px: f64) -> i64 {
        if self.hour_height <= 0.0 {
            return 0;
        }
        let minutes = (delta_px / self.hour_height * 60.0).round();
        let snap = f64::from(self.snap_minutes.max(1));
        ((minutes / snap).trunc() * snap) as i64
    }

    fn day_offset(&self, delta_x: f64) -> i64 {
        if self.day_width <= 0.0 || self.visible_days <= 1 {
            return 0;
        }
        (delta_x / self.day_width).round() as i64
    }

    fn column_of(&self, date: NaiveDate) -> i64 {
        (date - self.first_day).num_days()
    }

    fn local(&self, at: DateTime<Utc>) -> NaiveDateTime {
        at.with_timezone(&self.tz).naive_local()
    }

    fn to_utc(&self, local: NaiveDateTime) -> Option<DateTime<Utc>> {
        self.tz
            .from_local_datetime(&local)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    Move,
    ResizeTop,
    ResizeBottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Mouse,
    Touch,
}

/// One pointer sample in container coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerSample {
    pub x: f64,
    pub y: f64,
    pub timestamp_ms: u64,
}

impl PointerSample {
    pub fn new(x: f64, y: f64, timestamp_ms: u64) -> Self {
        Self { x, y, timestamp_ms }
    }

    fn distance(&self, other: &PointerSample) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Proposed new time range for an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMove {
    pub event_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GestureOutcome {
    /// No drag happened; open the event.
    Click,
    /// Persist the last valid position.
    Moved(EventMove),
    /// Scroll, cancelled press, or a drag that ended where it started.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Touch held, waiting for the long press.
    Pending,
    /// Ready to drag.
    Armed,
    Dragging,
    Cancelled,
}

#[derive(Debug)]
pub struct GestureTracker {
    event_id: String,
    original_start: DateTime<Utc>,
    original_end: DateTime<Utc>,
    kind: GestureKind,
    pointer: PointerKind,
    origin: PointerSample,
    geometry: GridGeometry,
    phase: Phase,
    has_dragged: bool,
    last_move: Option<EventMove>,
}

impl GestureTracker {
    /// Start tracking a gesture on `event`.
    pub fn pointer_down(
        event: &CalendarEvent,
        kind: GestureKind,
        pointer: PointerKind,
        at: PointerSample,
        geometry: GridGeometry,
    ) -> Self {
        let phase = match pointer {
            PointerKind::Mouse => Phase::Armed,
            PointerKind::Touch => Phase::Pending,
        };
        Self {
            event_id: event.id.clone(),
            original_start: event.start,
            original_end: event.end,
            kind,
            pointer,
            origin: at,
            geometry,
            phase,
            has_dragged: false,
            last_move: None,
        }
    }

    pub fn has_dragged(&self) -> bool {
        self.has_dragged
    }

    pub fn is_cancelled(&self) -> bool {
        self.phase == Phase::Cancelled
    }

    /// Timer tick for touch gestures. Returns true when drag mode was just
    /// entered, so the caller can give haptic feedback.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        if self.phase == Phase::Pending
            && now_ms.saturating_sub(self.origin.timestamp_ms) >= LONG_PRESS_MS
        {
            self.phase = Phase::Armed;
            return true;
        }
        false
    }

    /// Feed a move sample. Returns a new proposal when the snapped position
    /// changed and is valid; invalid positions skip the tick.
    pub fn pointer_move(&mut self, at: PointerSample) -> Option<EventMove> {
        let distance = at.distance(&self.origin);

        if self.phase == Phase::Pending {
            if distance > LONG_PRESS_CANCEL_PX {
                tracing::debug!(event_id = %self.event_id, "Long press cancelled by scroll");
                self.phase = Phase::Cancelled;
                return None;
            }
            self.poll(at.timestamp_ms);
        }

        match self.phase {
            Phase::Pending | Phase::Cancelled => None,
            Phase::Armed => {
                if distance <= DRAG_THRESHOLD_PX {
                    return None;
                }
                self.phase = Phase::Dragging;
                self.has_dragged = true;
                self.track(at)
            }
            Phase::Dragging => self.track(at),
        }
    }

    /// Finish the gesture.
    pub fn pointer_up(mut self, at: PointerSample) -> GestureOutcome {
        if self.phase == Phase::Cancelled {
            return GestureOutcome::Ignored;
        }
        if matches!(self.phase, Phase::Armed | Phase::Dragging) {
            self.pointer_move(at);
        }

        if self.has_dragged {
            return match self.last_move.take() {
                Some(m) if m.start != self.original_start || m.end != self.original_end => {
                    GestureOutcome::Moved(m)
                }
                _ => GestureOutcome::Ignored,
            };
        }

        match (self.pointer, self.phase) {
            (PointerKind::Mouse, _) => GestureOutcome::Click,
            // A short tap; a long press without movement is not a click.
            (PointerKind::Touch, Phase::Pending)
                if at.timestamp_ms.saturating_sub(self.origin.timestamp_ms) < LONG_PRESS_MS =>
            {
                GestureOutcome::Click
            }
            _ => GestureOutcome::Ignored,
        }
    }

    fn track(&mut self, at: PointerSample) -> Option<EventMove> {
        let proposal = self.propose(at)?;
        if self.last_move.as_ref() == Some(&proposal) {
            return None;
        }
        self.last_move = Some(proposal.clone());
        Some(proposal)
    }

    fn propose(&self, at: PointerSample) -> Option<EventMove> {
        let g = &self.geometry;
        let delta_px = at.y - self.origin.y;
        let delta = Duration::minutes(match self.kind {
            GestureKind::Move => g.snap_minutes(delta_px),
            GestureKind::ResizeTop | GestureKind::ResizeBottom => g.snap_edge_minutes(delta_px),
        });
        let start_local = g.local(self.original_start);
        let end_local = g.local(self.original_end);

        let (new_start, new_end, day) = match self.kind {
            GestureKind::Move => {
                let offset = g.day_offset(at.x - self.origin.x);
                let day = start_local.date() + Duration::days(offset);
                let shift = delta + Duration::days(offset);
                (start_local + shift, end_local + shift, day)
            }
            GestureKind::ResizeTop => {
                let new_start = start_local + delta;
                if new_start >= end_local {
                    return None;
                }
                (new_start, end_local, start_local.date())
            }
            GestureKind::ResizeBottom => {
                let new_end = end_local + delta;
                let min = Duration::minutes(i64::from(g.min_duration_minutes));
                if new_end - start_local < min {
                    return None;
                }
                (start_local, new_end, start_local.date())
            }
        };

        let column = g.column_of(day);
        if column < 0 || column >= i64::from(g.visible_days) {
            return None;
        }
        let day_start = day.and_hms_opt(0, 0, 0)?;
        let day_end = day_start + Duration::days(1);
        if new_start < day_start || new_end > day_end {
            return None;
        }

        Some(EventMove {
            event_id: self.event_id.clone(),
            start: g.to_utc(new_start)?,
            end: g.to_utc(new_end)?,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::types::NewEvent;

    const HOUR: f64 = 60.0;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 9).unwrap()
    }

    fn geometry(visible_days: u32) -> GridGeometry {
        GridGeometry {
            hour_height: HOUR,
            snap_minutes: 15,
            min_duration_minutes: 15,
            day_width: 100.0,
            first_day: day(),
            visible_days,
            tz: Tz::UTC,
        }
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.from_utc_datetime(&day().and_hms_opt(h, m, 0).unwrap())
    }

    fn nine_to_ten() -> CalendarEvent {
        NewEvent::new("Standup", at(9, 0), at(10, 0), "1").into_event("e1".to_string())
    }

    fn mouse(kind: GestureKind, visible_days: u32) -> GestureTracker {
        GestureTracker::pointer_down(
            &nine_to_ten(),
            kind,
            PointerKind::Mouse,
            PointerSample::new(50.0, 600.0, 0),
            geometry(visible_days),
        )
    }

    #[test]
    fn test_snap_rounds_to_nearest_quarter() {
        let g = geometry(1);
        assert_eq!(g.snap_minutes(0.0), 0);
        assert_eq!(g.snap_minutes(7.0), 0);
        assert_eq!(g.snap_minutes(8.0), 15);
        assert_eq!(g.snap_minutes(22.0), 15);
        assert_eq!(g.snap_minutes(23.0), 30);
        assert_eq!(g.snap_minutes(-8.0), -15);
        assert_eq!(g.snap_minutes(-7.0), 0);
    }

    #[test]
    fn test_click_without_movement() {
        let tracker = mouse(GestureKind::Move, 1);
        assert_eq!(
            tracker.pointer_up(PointerSample::new(50.0, 600.0, 120)),
            GestureOutcome::Click
        );
    }

    #[test]
    fn test_jitter_below_threshold_is_still_click() {
        let mut tracker = mouse(GestureKind::Move, 1);
        assert_eq!(tracker.pointer_move(PointerSample::new(51.0, 602.0, 40)), None);
        assert!(!tracker.has_dragged());
        assert_eq!(
            tracker.pointer_up(PointerSample::new(51.0, 602.0, 80)),
            GestureOutcome::Click
        );
    }

    #[test]
    fn test_drag_moves_and_suppresses_click() {
        let mut tracker = mouse(GestureKind::Move, 1);
        // one hour down
        let proposal = tracker.pointer_move(PointerSample::new(50.0, 660.0, 40)).unwrap();
        assert_eq!(proposal.start, at(10, 0));
        assert_eq!(proposal.end, at(11, 0));
        assert!(tracker.has_dragged());

        let outcome = tracker.pointer_up(PointerSample::new(50.0, 660.0, 80));
        assert_eq!(
            outcome,
            GestureOutcome::Moved(EventMove {
                event_id: "e1".to_string(),
                start: at(10, 0),
                end: at(11, 0),
            })
        );
    }

    #[test]
    fn test_drag_back_to_origin_is_ignored() {
        let mut tracker = mouse(GestureKind::Move, 1);
        tracker.pointer_move(PointerSample::new(50.0, 660.0, 40));
        assert_eq!(
            tracker.pointer_up(PointerSample::new(50.0, 601.0, 80)),
            GestureOutcome::Ignored
        );
    }

    #[test]
    fn test_unchanged_snap_emits_once() {
        let mut tracker = mouse(GestureKind::Move, 1);
        assert!(tracker.pointer_move(PointerSample::new(50.0, 615.0, 10)).is_some());
        assert!(tracker.pointer_move(PointerSample::new(50.0, 617.0, 20)).is_none());
    }

    #[test]
    fn test_move_across_day_columns() {
        let mut tracker = mouse(GestureKind::Move, 7);
        let proposal = tracker.pointer_move(PointerSample::new(250.0, 600.0, 40)).unwrap();
        assert_eq!(proposal.start, at(9, 0) + Duration::days(2));
    }

    #[test]
    fn test_move_outside_visible_columns_is_skipped() {
        let mut tracker = mouse(GestureKind::Move, 7);
        assert_eq!(tracker.pointer_move(PointerSample::new(-80.0, 600.0, 40)), None);
        assert!(tracker.has_dragged());
    }

    #[test]
    fn test_move_past_midnight_is_skipped() {
        let mut tracker = mouse(GestureKind::Move, 1);
        // 15 hours down would end at 25:00
        assert_eq!(tracker.pointer_move(PointerSample::new(50.0, 1500.0, 40)), None);
        // 10 hours up would start at -01:00
        assert_eq!(tracker.pointer_move(PointerSample::new(50.0, 0.0, 50)), None);
    }

    #[test]
    fn test_snap_edge_holds_until_full_step() {
        let g = geometry(1);
        assert_eq!(g.snap_edge_minutes(8.0), 0);
        assert_eq!(g.snap_edge_minutes(-8.0), 0);
        assert_eq!(g.snap_edge_minutes(-14.0), 0);
        assert_eq!(g.snap_edge_minutes(-15.0), -15);
        assert_eq!(g.snap_edge_minutes(29.0), 15);
    }

    #[test]
    fn test_resize_bottom_to_0952_keeps_1000_end() {
        let mut tracker = mouse(GestureKind::ResizeBottom, 1);
        tracker.pointer_move(PointerSample::new(50.0, 630.0, 20));
        let outcome = tracker.pointer_up(PointerSample::new(50.0, 592.0, 40));
        assert_eq!(outcome, GestureOutcome::Ignored);

        let mut tracker = mouse(GestureKind::ResizeBottom, 1);
        let proposal = tracker.pointer_move(PointerSample::new(50.0, 592.0, 20)).unwrap();
        assert_eq!(proposal.start, at(9, 0));
        assert_eq!(proposal.end, at(10, 0));

        // a full quarter up reaches 09:45
        let proposal = tracker.pointer_move(PointerSample::new(50.0, 585.0, 30)).unwrap();
        assert_eq!(proposal.end, at(9, 45));
    }

    #[test]
    fn test_resize_bottom_rejects_short_duration() {
        let mut tracker = mouse(GestureKind::ResizeBottom, 1);
        // drag end up by 60 min → 09:00, duration 0
        assert_eq!(tracker.pointer_move(PointerSample::new(50.0, 540.0, 20)), None);
        // up by 45 min → 09:15, exactly the minimum
        let proposal = tracker.pointer_move(PointerSample::new(50.0, 555.0, 30)).unwrap();
        assert_eq!(proposal.end, at(9, 15));
    }

    #[test]
    fn test_resize_top_rejects_start_at_or_after_end() {
        let mut tracker = mouse(GestureKind::ResizeTop, 1);
        assert_eq!(tracker.pointer_move(PointerSample::new(50.0, 660.0, 20)), None);
        let proposal = tracker.pointer_move(PointerSample::new(50.0, 570.0, 30)).unwrap();
        assert_eq!(proposal.start, at(8, 30));
        assert_eq!(proposal.end, at(10, 0));
    }

    fn touch() -> GestureTracker {
        GestureTracker::pointer_down(
            &nine_to_ten(),
            GestureKind::Move,
            PointerKind::Touch,
            PointerSample::new(50.0, 600.0, 1_000),
            geometry(1),
        )
    }

    #[test]
    fn test_touch_tap_is_click() {
        let tracker = touch();
        assert_eq!(
            tracker.pointer_up(PointerSample::new(50.0, 600.0, 1_150)),
            GestureOutcome::Click
        );
    }

    #[test]
    fn test_touch_scroll_cancels_long_press() {
        let mut tracker = touch();
        assert_eq!(tracker.pointer_move(PointerSample::new(50.0, 640.0, 1_100)), None);
        assert!(tracker.is_cancelled());
        // later movement after the press window changes nothing
        assert_eq!(tracker.pointer_move(PointerSample::new(50.0, 700.0, 1_700)), None);
        assert_eq!(
            tracker.pointer_up(PointerSample::new(50.0, 700.0, 1_800)),
            GestureOutcome::Ignored
        );
    }

    #[test]
    fn test_touch_long_press_then_drag() {
        let mut tracker = touch();
        assert!(!tracker.poll(1_200));
        assert!(tracker.poll(1_500));
        let proposal = tracker.pointer_move(PointerSample::new(50.0, 630.0, 1_600)).unwrap();
        assert_eq!(proposal.start, at(9, 30));
        assert!(matches!(
            tracker.pointer_up(PointerSample::new(50.0, 630.0, 1_700)),
            GestureOutcome::Moved(_)
        ));
    }

    #[test]
    fn test_touch_long_press_without_move_is_not_click() {
        let mut tracker = touch();
        tracker.poll(1_600);
        assert_eq!(
            tracker.pointer_up(PointerSample::new(50.0, 600.0, 1_700)),
            GestureOutcome::Ignored
        );
    }
}
