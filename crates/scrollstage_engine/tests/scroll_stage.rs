// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scroll-driven sections through the full stage: pinning, snapping,
//! media sync, layout and disposal.

use scrollstage_engine::{
    Anchor, Direction, EngineConfig, LayoutReason, MediaTarget, Millis, PlaybackState, RawScrollEvent, RotationTarget,
    ScrollBounds, SectionHandle, SectionSpec, SectionUpdate, Segment, SnapSpec, Stage, StaticLayout, Timeline,
    TriggerSpec,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn phones() -> Timeline {
    let segments = vec![
        Segment::new("phone-0", "opacity", 1.0, 0.0).over(0.2, 0.25),
        Segment::new("phone-1", "opacity", 0.0, 1.0).over(0.2, 0.25),
        Segment::new("phone-1", "opacity", 1.0, 0.0).over(0.45, 0.5),
        Segment::new("phone-2", "opacity", 0.0, 1.0).over(0.45, 0.5),
        Segment::new("carousel", "y", 0.0, -300.0),
    ];
    Timeline::new(segments).unwrap()
}

fn stage() -> Stage {
    Stage::new(EngineConfig::default(), StaticLayout::new(800.0)).unwrap()
}

fn record(handle: &SectionHandle) -> Rc<RefCell<Vec<SectionUpdate>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    handle.on_update(move |update| sink.borrow_mut().push(update.clone())).unwrap();
    log
}

/// Scroll to an absolute position, then run frames until `until`
fn scroll_and_settle(stage: &Stage, position: f64, at: Millis, until: Millis) {
    stage.push_input(RawScrollEvent::Scroll { position }, at);
    let mut now = at;
    while now <= until {
        stage.frame(now);
        now += 16;
    }
}

fn snapping(stage: &Stage) -> SectionHandle {
    let spec = SectionSpec::new("phones", phones())
        .with_bounds(ScrollBounds::new(0.0, 1000.0))
        .with_snap(SnapSpec::Evenly(5));
    stage.register_section(spec).unwrap()
}

#[test]
fn test_progress_monotonic_under_forward_scroll() {
    let stage = stage();
    let handle = stage
        .register_section(SectionSpec::new("phones", phones()).with_bounds(ScrollBounds::new(300.0, 3300.0)))
        .unwrap();
    let log = record(&handle);

    let mut now = 0;
    for _ in 0..300 {
        stage.push_input(RawScrollEvent::Wheel { delta: 17.0 }, now);
        stage.push_input(RawScrollEvent::Touch { delta: 3.0 }, now + 4);
        now += 16;
        stage.frame(now);
    }

    let progress: Vec<f64> = log.borrow().iter().map(|u| u.progress).collect();
    assert!(progress.windows(2).all(|w| w[1] >= w[0]));
    assert_eq!(progress.last().copied(), Some(1.0));
    assert!(log.borrow().iter().all(|u| (0.0..=1.0).contains(&u.progress)));
    assert!(log.borrow().windows(2).all(|w| w[1].timestamp >= w[0].timestamp));
}

#[test]
fn test_snap_tie_breaks_follow_direction() {
    // Forward to 0.24 settles up to 0.25
    let stage_a = stage();
    let a = snapping(&stage_a);
    scroll_and_settle(&stage_a, 240.0, 0, 600);
    assert_eq!(a.progress(), 0.25);
    assert_eq!(a.active_snap_index(), Some(1));
    assert_eq!(a.state(), PlaybackState::Idle);

    // Backward to 0.26 settles down to 0.25
    let stage_b = stage();
    let b = snapping(&stage_b);
    stage_b.push_input(RawScrollEvent::Scroll { position: 600.0 }, 0);
    stage_b.frame(16);
    scroll_and_settle(&stage_b, 260.0, 32, 600);
    assert_eq!(b.progress(), 0.25);

    // Exactly between 0.25 and 0.5 moving forward goes to 0.5
    let stage_c = stage();
    let c = snapping(&stage_c);
    scroll_and_settle(&stage_c, 375.0, 0, 600);
    assert_eq!(c.progress(), 0.5);
    assert_eq!(c.active_snap_index(), Some(2));
}

#[test]
fn test_settle_states_and_duration() {
    let stage = stage();
    let handle = snapping(&stage);
    let log = record(&handle);
    scroll_and_settle(&stage, 300.0, 0, 600);

    let states: Vec<PlaybackState> = log.borrow().iter().map(|u| u.state).collect();
    assert!(states.contains(&PlaybackState::Scrubbing));
    assert!(states.contains(&PlaybackState::Settling));
    assert_eq!(states.last(), Some(&PlaybackState::Idle));

    let settling: Vec<Millis> = log
        .borrow()
        .iter()
        .filter(|u| u.state == PlaybackState::Settling)
        .map(|u| u.timestamp)
        .collect();
    // Debounce of 100ms after the sample at t=0, then at most 250ms of settle
    assert!(settling[0] >= 100);
    assert!(settling.last().copied().unwrap() <= 100 + 16 + 250);
}

#[test]
fn test_input_interrupts_settle_without_snap_back() {
    let stage = stage();
    let handle = snapping(&stage);

    stage.push_input(RawScrollEvent::Scroll { position: 400.0 }, 0);
    let mut now = 0;
    while handle.state() != PlaybackState::Settling {
        stage.frame(now);
        now += 16;
        assert!(now < 1000, "settle never started");
    }
    stage.frame(now);
    let mid = handle.progress();
    assert!(mid > 0.4 && mid < 0.5, "expected intermediate progress, got {mid}");

    stage.push_input(RawScrollEvent::Wheel { delta: 10.0 }, now + 4);
    stage.frame(now + 16);
    assert!((handle.progress() - (mid + 0.008)).abs() < 1e-9);
    assert_eq!(handle.state(), PlaybackState::Scrubbing);
}

#[test]
fn test_scroll_to_snap_from_above_the_section() {
    let stage = stage();
    let spec = SectionSpec::new("phones", phones())
        .with_bounds(ScrollBounds::new(1000.0, 2000.0))
        .with_snap(SnapSpec::Evenly(5));
    let handle = stage.register_section(spec).unwrap();
    let log = record(&handle);

    stage.frame(0);
    handle.scroll_to_snap(2, 0).unwrap();
    let mut now = 16;
    while now <= 1100 {
        stage.frame(now);
        now += 16;
    }

    assert_eq!(handle.progress(), 0.5);
    assert_eq!(handle.active_snap_index(), Some(2));
    assert_eq!(handle.state(), PlaybackState::Idle);
    assert_eq!(stage.scroll_position(), Some(1500.0));

    let log = log.borrow();
    assert!(log.windows(2).all(|w| w[1].progress >= w[0].progress));
    let settling: Vec<Millis> = log
        .iter()
        .filter(|u| u.state == PlaybackState::Settling)
        .map(|u| u.timestamp)
        .collect();
    assert!(!settling.is_empty());
    // One second of navigation, landing on the first frame past it
    assert!(settling.last().copied().unwrap() < 1000);
}

#[test]
fn test_input_interrupts_navigation() {
    let stage = stage();
    let handle = snapping(&stage);
    stage.frame(0);
    handle.scroll_to_snap(4, 0).unwrap();

    let mut now = 16;
    while now <= 496 {
        stage.frame(now);
        now += 16;
    }
    let mid = handle.progress();
    assert!(mid > 0.4 && mid < 0.6, "expected intermediate progress, got {mid}");
    assert_eq!(handle.state(), PlaybackState::Settling);

    stage.push_input(RawScrollEvent::Wheel { delta: 10.0 }, 500);
    stage.frame(512);
    assert!((handle.progress() - (mid + 0.008)).abs() < 1e-9);
    assert_eq!(handle.state(), PlaybackState::Scrubbing);

    // The navigation is abandoned; the ordinary settle takes over
    let mut now = 528;
    while now <= 1200 {
        stage.frame(now);
        now += 16;
    }
    assert_eq!(handle.progress(), 0.5);
    assert_eq!(handle.active_snap_index(), Some(2));
}

fn carousel(stage: &Stage, snap: Option<SnapSpec>) -> SectionHandle {
    let mut spec = SectionSpec::new("carousel", phones())
        .with_bounds(ScrollBounds::new(0.0, 1000.0))
        .looping();
    spec.snap = snap;
    stage.register_section(spec).unwrap()
}

#[test]
fn test_loop_wraps_forward_at_the_end() {
    let stage = stage();
    let handle = carousel(&stage, None);
    assert_eq!(handle.loop_iteration(), Some(0));

    stage.push_input(RawScrollEvent::Scroll { position: 1000.0 }, 0);
    stage.frame(0);
    assert_eq!(handle.progress(), 1.0);
    assert_eq!(handle.loop_iteration(), Some(0));

    stage.frame(16);
    assert_eq!(handle.progress(), 0.0);
    assert_eq!(handle.loop_iteration(), Some(1));
    assert_eq!(handle.direction(), Direction::Forward);
    assert_eq!(stage.scroll_position(), Some(0.0));

    stage.push_input(RawScrollEvent::Wheel { delta: 250.0 }, 20);
    stage.frame(32);
    assert_eq!(handle.progress(), 0.2);
    assert_eq!(handle.loop_iteration(), Some(1));
}

#[test]
fn test_loop_wraps_backward_near_the_start() {
    let stage = stage();
    let handle = carousel(&stage, None);
    scroll_and_settle(&stage, 500.0, 0, 0);

    // Within the backward threshold but not exactly at the start
    stage.push_input(RawScrollEvent::Scroll { position: 0.005 }, 10);
    stage.frame(16);
    assert_eq!(handle.loop_iteration(), Some(0));

    stage.frame(32);
    assert_eq!(handle.progress(), 1.0);
    assert_eq!(handle.loop_iteration(), Some(-1));
    assert_eq!(handle.direction(), Direction::Backward);

    stage.push_input(RawScrollEvent::Wheel { delta: -100.0 }, 40);
    stage.frame(48);
    assert!((handle.progress() - 0.920005).abs() < 1e-9);
    assert_eq!(handle.loop_iteration(), Some(-1));
}

#[test]
fn test_loop_settle_crosses_the_edge() {
    let stage = stage();
    let handle = carousel(&stage, Some(SnapSpec::Points(vec![0.1, 0.6])));
    let log = record(&handle);

    // 0.95 is closer to the next turn's 0.1 than to 0.6
    scroll_and_settle(&stage, 950.0, 0, 600);

    assert!((handle.progress() - 0.1).abs() < 1e-9);
    assert_eq!(handle.loop_iteration(), Some(1));
    assert_eq!(handle.active_snap_index(), Some(0));
    assert_eq!(handle.state(), PlaybackState::Idle);
    assert!((stage.scroll_position().unwrap() - 100.0).abs() < 1e-6);

    let log = log.borrow();
    let turns: Vec<i64> = log.iter().filter_map(|u| u.loop_iteration).collect();
    assert!(turns.windows(2).all(|w| w[1] >= w[0]));
    assert!(log.iter().any(|u| u.loop_iteration == Some(0) && u.progress > 0.95));
}

#[test]
fn test_overlapping_sections_newest_pins() {
    let stage = stage();
    let older = stage
        .register_section(SectionSpec::new("older", phones()).with_bounds(ScrollBounds::new(0.0, 2000.0)))
        .unwrap();
    let newer = stage
        .register_section(SectionSpec::new("newer", phones()).with_bounds(ScrollBounds::new(1000.0, 3000.0)))
        .unwrap();

    scroll_and_settle(&stage, 1500.0, 0, 16);
    assert!(newer.is_pinned());
    assert!(!older.is_pinned());
    assert_eq!(older.progress(), 0.75);
    assert_eq!(newer.progress(), 0.25);

    scroll_and_settle(&stage, 500.0, 32, 48);
    assert!(older.is_pinned());
    assert!(!newer.is_pinned());
}

#[test]
fn test_duplicate_registration_replaces_older() {
    let stage = stage();
    let first = stage
        .register_section(SectionSpec::new("hero", phones()).with_bounds(ScrollBounds::new(0.0, 1000.0)))
        .unwrap();
    let first_calls = Rc::new(Cell::new(0));
    let counter = first_calls.clone();
    first.on_update(move |_| counter.set(counter.get() + 1)).unwrap();

    let second = stage
        .register_section(SectionSpec::new("hero", phones()).with_bounds(ScrollBounds::new(0.0, 500.0)))
        .unwrap();
    let second_log = record(&second);

    assert!(first.is_disposed());
    assert!(!second.is_disposed());
    assert_eq!(stage.section_count(), 1);

    scroll_and_settle(&stage, 250.0, 0, 32);
    assert_eq!(first_calls.get(), 0);
    assert_eq!(second.progress(), 0.5);
    assert!(!second_log.borrow().is_empty());
}

#[test]
fn test_degenerate_bounds_hold_progress_at_one() {
    let stage = stage();
    let broken = stage
        .register_section(SectionSpec::new("broken", phones()).with_bounds(ScrollBounds::new(900.0, 900.0)))
        .unwrap();
    let healthy = stage
        .register_section(
            SectionSpec::new("healthy", phones())
                .with_bounds(ScrollBounds::new(2000.0, 3000.0))
                .unpinned(),
        )
        .unwrap();

    scroll_and_settle(&stage, 2500.0, 0, 32);
    assert_eq!(broken.progress(), 1.0);
    assert!(!broken.is_pinned());
    assert_eq!(healthy.progress(), 0.5);
}

#[test]
fn test_reversal_returns_identical_frames() {
    let stage = stage();
    let handle = stage
        .register_section(SectionSpec::new("phones", phones()).with_bounds(ScrollBounds::new(0.0, 1000.0)))
        .unwrap();
    let log = record(&handle);

    let mut now = 0;
    let mut visit = |position: f64| {
        stage.push_input(RawScrollEvent::Scroll { position }, now);
        now += 16;
        stage.frame(now);
        log.borrow().last().cloned().unwrap()
    };
    let first = visit(330.0);
    for _ in 0..20 {
        visit(910.0);
        visit(40.0);
    }
    let again = visit(330.0);
    assert_eq!(again.progress, first.progress);
    assert_eq!(again.frame, first.frame);
}

#[derive(Clone, Default)]
struct Video(Rc<RefCell<Vec<f64>>>);

impl MediaTarget for Video {
    fn set_current_time(&mut self, seconds: f64) {
        self.0.borrow_mut().push(seconds);
    }
}

#[test]
fn test_video_waits_for_metadata() {
    let stage = stage();
    let handle = stage
        .register_section(SectionSpec::new("scrub", phones()).with_bounds(ScrollBounds::new(0.0, 1000.0)))
        .unwrap();
    let video = Video::default();
    handle.bind_video("hero", video.clone()).unwrap();
    let log = record(&handle);

    scroll_and_settle(&stage, 500.0, 0, 16);
    assert!(video.0.borrow().is_empty());
    // Timeline keeps animating while the video is pending
    assert_eq!(log.borrow().last().unwrap().frame.float("carousel", "y"), Some(-150.0));

    handle.media_loaded("hero", 12.0).unwrap();
    assert_eq!(*video.0.borrow(), vec![6.0]);

    // Native time updates never move progress
    handle.media_time_update("hero", 11.0).unwrap();
    stage.frame(48);
    assert_eq!(handle.progress(), 0.5);

    scroll_and_settle(&stage, 750.0, 64, 80);
    assert_eq!(video.0.borrow().last().copied(), Some(9.0));
}

#[test]
fn test_failed_metadata_leaves_timeline_running() {
    let stage = stage();
    let handle = stage
        .register_section(SectionSpec::new("scrub", phones()).with_bounds(ScrollBounds::new(0.0, 1000.0)))
        .unwrap();
    let video = Video::default();
    handle.bind_video("hero", video.clone()).unwrap();
    handle.media_failed("hero", "network error").unwrap();
    let log = record(&handle);

    scroll_and_settle(&stage, 1000.0, 0, 16);
    assert!(video.0.borrow().is_empty());
    assert_eq!(log.borrow().last().unwrap().frame.float("carousel", "y"), Some(-300.0));
}

#[test]
fn test_trigger_bounds_follow_layout() {
    let layout = StaticLayout::new(800.0).with_element("phones", 1200.0, 800.0);
    let stage = Stage::new(EngineConfig::default(), layout).unwrap();
    let trigger = TriggerSpec::new("phones", Anchor::TOP_TOP, "+=300%".parse().unwrap());
    let handle = stage
        .register_section(SectionSpec::new("phones", phones()).with_trigger(trigger))
        .unwrap();

    scroll_and_settle(&stage, 2400.0, 0, 16);
    assert_eq!(handle.progress(), 0.5);

    // Content above grew by 1200px
    stage.set_layout(
        StaticLayout::new(800.0).with_element("phones", 2400.0, 800.0),
        LayoutReason::ContentLoaded,
    );
    stage.frame(32);
    assert_eq!(handle.progress(), 0.0);
    assert!(handle.is_pinned());

    // Explicit bounds win over later invalidations
    handle.update(ScrollBounds::new(0.0, 4800.0)).unwrap();
    stage.invalidate_layout(LayoutReason::Resize);
    stage.frame(48);
    assert_eq!(handle.progress(), 0.5);
}

struct Spinner {
    handle: Rc<RefCell<Option<SectionHandle>>>,
    writes: Rc<Cell<usize>>,
}

impl RotationTarget for Spinner {
    fn set_rotation(&mut self, _radians: f64) {
        self.writes.set(self.writes.get() + 1);
        // Re-entrant call from inside evaluation
        if let Some(handle) = self.handle.borrow().as_ref() {
            handle.update(ScrollBounds::new(0.0, 2000.0)).unwrap();
        }
    }
}

#[test]
fn test_reentrant_update_from_media_is_deferred() {
    let stage = stage();
    let handle = stage
        .register_section(SectionSpec::new("carousel", phones()).with_bounds(ScrollBounds::new(0.0, 1000.0)))
        .unwrap();
    let slot = Rc::new(RefCell::new(None));
    let writes = Rc::new(Cell::new(0));
    handle
        .bind_rotation(
            "ring",
            Spinner {
                handle: slot.clone(),
                writes: writes.clone(),
            },
            -std::f64::consts::TAU,
        )
        .unwrap();
    *slot.borrow_mut() = Some(handle.clone());

    stage.push_input(RawScrollEvent::Scroll { position: 500.0 }, 0);
    let updates = stage.frame(16);
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].progress, 0.5);

    // The bounds change lands after the frame and shows up on the next one
    let updates = stage.frame(32);
    assert_eq!(updates[0].progress, 0.25);
    assert!(writes.get() >= 2);
}

#[test]
fn test_disposal_silences_pending_timers() {
    let stage = stage();
    let handle = snapping(&stage);
    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    handle.on_update(move |_| counter.set(counter.get() + 1)).unwrap();
    let video = Video::default();
    handle.bind_video("hero", video.clone()).unwrap();
    handle.media_loaded("hero", 10.0).unwrap();

    // Arm the settle debounce, then dispose before it fires
    stage.push_input(RawScrollEvent::Scroll { position: 330.0 }, 0);
    stage.frame(16);
    let seen = calls.get();
    let writes = video.0.borrow().len();
    handle.dispose();

    let mut now = 32;
    while now < 2000 {
        stage.push_input(RawScrollEvent::Wheel { delta: 25.0 }, now);
        assert!(stage.frame(now).is_empty());
        now += 16;
    }
    assert_eq!(calls.get(), seen);
    assert_eq!(video.0.borrow().len(), writes);
    assert!(!handle.is_pinned());
    assert!(handle.on_update(|_| {}).is_err());
}
