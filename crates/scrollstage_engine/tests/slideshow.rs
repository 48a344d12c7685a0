// SPDX-License-Identifier: MIT OR Apache-2.0
//! Slideshow autoplay through the full stage.

use scrollstage_engine::{
    AutoplayEvent, AutoplaySpec, EngineConfig, Millis, PlaybackState, PropertyValue, SectionHandle, SectionSpec,
    SectionUpdate, Segment, Stage, StaticLayout, Timeline,
};
use std::cell::RefCell;
use std::rc::Rc;

const FRAME_MS: Millis = 40;

fn features() -> Timeline {
    let mut segments = Vec::new();
    for i in 0..4 {
        let start = f64::from(i) * 0.25;
        let slide = format!("slide-{i}");
        segments.push(Segment::new(slide.clone(), "visible", false, true).over(start, start));
        if i < 3 {
            segments.push(Segment::new(slide, "visible", true, false).over(start + 0.25, start + 0.25));
        }
    }
    Timeline::new(segments).unwrap()
}

fn slideshow() -> (Stage, SectionHandle, Rc<RefCell<Vec<SectionUpdate>>>) {
    let stage = Stage::new(EngineConfig::default(), StaticLayout::new(900.0)).unwrap();
    let spec = SectionSpec::new("features", features()).with_autoplay(AutoplaySpec {
        item_count: 4,
        item_duration_ms: 5000,
        idle_ms: None,
    });
    let handle = stage.register_section(spec).unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    handle.on_update(move |update| sink.borrow_mut().push(update.clone())).unwrap();
    (stage, handle, log)
}

fn events_since(log: &[SectionUpdate], from: Millis) -> Vec<(Millis, AutoplayEvent)> {
    log.iter()
        .filter(|update| update.timestamp >= from)
        .flat_map(|update| update.autoplay_events.iter().map(|event| (update.timestamp, *event)))
        .collect()
}

#[test]
fn test_click_mid_cycle_resumes_from_selected_item() {
    let (stage, handle, log) = slideshow();

    let mut now = 0;
    while now < 1200 {
        stage.frame(now);
        now += FRAME_MS;
    }
    let before = log.borrow().last().cloned().unwrap();
    assert_eq!(before.active_item, Some(0));
    assert!(before.item_progress.unwrap() > 0.2);

    handle.select(2, 1200).unwrap();
    let updates = stage.frame(1200);
    let clicked = &updates[0];
    assert_eq!(clicked.active_item, Some(2));
    assert_eq!(clicked.item_progress, Some(0.0));
    assert_eq!(clicked.state, PlaybackState::Paused);
    assert_eq!(
        clicked.autoplay_events,
        vec![AutoplayEvent::Selected { index: 2 }, AutoplayEvent::Paused]
    );
    assert_eq!(clicked.frame.get("slide-2", "visible"), Some(&PropertyValue::Bool(true)));
    assert_eq!(clicked.frame.get("slide-1", "visible"), Some(&PropertyValue::Bool(false)));
    assert_eq!(handle.state(), PlaybackState::Paused);

    now += FRAME_MS;
    while now <= 21_200 {
        stage.frame(now);
        now += FRAME_MS;
    }

    let transitions = events_since(&log.borrow(), 1240);
    assert_eq!(
        transitions,
        vec![
            (11_200, AutoplayEvent::Resumed { index: 2 }),
            (16_200, AutoplayEvent::Advanced { from: 2, to: 3 }),
            (21_200, AutoplayEvent::Advanced { from: 3, to: 0 }),
        ]
    );

    let resumed = log
        .borrow()
        .iter()
        .find(|update| update.timestamp == 11_200)
        .cloned()
        .unwrap();
    assert_eq!(resumed.active_item, Some(2));
    assert_eq!(resumed.item_progress, Some(0.0));
    assert_eq!(resumed.state, PlaybackState::AutoPlaying);
}

#[test]
fn test_no_auto_advance_inside_idle_window() {
    let (stage, handle, log) = slideshow();
    stage.frame(0);
    handle.select(1, 0).unwrap();

    let mut now = 0;
    while now < 10_000 {
        stage.frame(now);
        now += 16;
    }
    let during: Vec<_> = events_since(&log.borrow(), 0)
        .into_iter()
        .filter(|(_, event)| matches!(event, AutoplayEvent::Advanced { .. } | AutoplayEvent::Resumed { .. }))
        .collect();
    assert!(during.is_empty(), "advanced during idle window: {during:?}");

    while now < 14_000 {
        stage.frame(now);
        now += 16;
    }
    let after = events_since(&log.borrow(), 10_000);
    assert_eq!(after, vec![(10_000, AutoplayEvent::Resumed { index: 1 })]);
}

#[test]
fn test_repeated_selection_keeps_one_timer() {
    let (stage, handle, log) = slideshow();
    stage.frame(0);
    handle.select(1, 100).unwrap();
    stage.frame(100);
    handle.select(3, 4000).unwrap();
    stage.frame(4000);

    let mut now = 4000;
    while now <= 15_000 {
        stage.frame(now);
        now += FRAME_MS;
    }
    let resumes: Vec<_> = events_since(&log.borrow(), 0)
        .into_iter()
        .filter(|(_, event)| matches!(event, AutoplayEvent::Resumed { .. }))
        .collect();
    assert_eq!(resumes, vec![(14_000, AutoplayEvent::Resumed { index: 3 })]);
}

#[test]
fn test_disposed_slideshow_goes_silent() {
    let (stage, handle, log) = slideshow();
    stage.frame(0);
    handle.select(2, 0).unwrap();
    stage.frame(16);
    let seen = log.borrow().len();

    handle.dispose();
    handle.dispose();
    let mut now = 16;
    while now < 30_000 {
        assert!(stage.frame(now).is_empty());
        now += 100;
    }
    assert_eq!(log.borrow().len(), seen);
    assert!(handle.select(0, now).is_err());
}
