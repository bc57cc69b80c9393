// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use chrono::Utc;
use common::{
    error::PositioningError,
    position::{GeoCoordinate, PositionInfo},
};
use gnss::test_helper::{ManualProvider, ManualProviderSlot, failing_factory, manual_factory};
use module_core::{Event, EventKind, EventKindType, test_helper::drain_events};
use position_source::PositionSource;
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::sync::broadcast::Receiver;

fn create_source() -> (PositionSource, Arc<ManualProviderSlot>, Receiver<Event>) {
    let (factory, slot) = manual_factory();
    let source = PositionSource::with_factory(factory);
    let receiver = source.subscribe();
    (source, slot, receiver)
}

fn enabled_source() -> (PositionSource, Arc<ManualProvider>, Receiver<Event>) {
    let (source, slot, mut receiver) = create_source();
    source.set_enabled(true);
    let provider = slot.provider().expect("Provider was not created");
    drain_events(&mut receiver);
    (source, provider, receiver)
}

fn fix(latitude: f64, longitude: f64, altitude: f64) -> PositionInfo {
    PositionInfo::new(
        GeoCoordinate::new(latitude, longitude, Some(altitude)),
        Utc::now(),
    )
}

fn count(events: &[Event], event_type: EventKindType) -> usize {
    events
        .iter()
        .filter(|event| event.event_type() == event_type)
        .count()
}

#[test_log::test]
fn disabled_without_provider_after_construction() {
    let (source, slot, _receiver) = create_source();
    assert!(!source.enabled());
    assert!(!source.coordinate().is_valid());
    assert!(source.position_info_source().is_none());
    assert_eq!(slot.created(), 0);
}

#[test_log::test]
fn enabling_twice_notifies_once() {
    let (source, slot, mut receiver) = create_source();
    source.set_enabled(true);
    source.set_enabled(true);

    let events = drain_events(&mut receiver);
    assert_eq!(events, vec![Event::from(EventKind::EnabledChangedEvent(true))]);
    assert!(source.enabled());
    assert_eq!(slot.created(), 1);
    assert_eq!(slot.provider().unwrap().start_count(), 1);
}

#[test_log::test]
fn disabling_disabled_source_does_nothing() {
    let (source, slot, mut receiver) = create_source();
    source.set_enabled(false);
    assert!(drain_events(&mut receiver).is_empty());
    assert_eq!(slot.created(), 0);
}

#[test_log::test]
fn provider_is_created_lazily_and_reused() {
    let (source, slot, mut receiver) = create_source();
    assert!(source.position_info_source().is_none());

    source.set_enabled(true);
    let provider = source
        .position_info_source()
        .expect("Provider must exist after enabling");
    assert_eq!(provider.source_name(), "manual");
    assert!(provider.is_active());

    source.set_enabled(false);
    assert!(!provider.is_active());
    source.set_enabled(true);

    assert_eq!(slot.created(), 1);
    let manual = slot.provider().unwrap();
    assert_eq!(manual.start_count(), 2);
    assert_eq!(manual.stop_count(), 1);
    assert_eq!(
        drain_events(&mut receiver),
        vec![
            Event::from(EventKind::EnabledChangedEvent(true)),
            Event::from(EventKind::EnabledChangedEvent(false)),
            Event::from(EventKind::EnabledChangedEvent(true))
        ]
    );
}

#[test_log::test]
fn valid_fix_updates_coordinate() {
    let (source, provider, mut receiver) = enabled_source();
    provider.push_position(fix(10.0, 20.0, 30.0));

    let expected = GeoCoordinate::new(10.0, 20.0, Some(30.0));
    assert_eq!(source.coordinate(), expected);
    assert_eq!(
        drain_events(&mut receiver),
        vec![Event::from(EventKind::CoordinateChangedEvent(expected))]
    );
}

#[test_log::test]
fn valid_fix_set_directly_updates_coordinate() {
    let (source, _provider, mut receiver) = enabled_source();
    source.set_position_info(&fix(10.0, 20.0, 30.0));

    assert_eq!(source.coordinate(), GeoCoordinate::new(10.0, 20.0, Some(30.0)));
    let events = drain_events(&mut receiver);
    assert_eq!(count(&events, EventKindType::CoordinateChangedEvent), 1);
}

#[test_log::test]
fn invalid_fix_is_ignored() {
    let (source, provider, mut receiver) = enabled_source();
    provider.push_position(fix(10.0, 20.0, 30.0));
    drain_events(&mut receiver);

    provider.push_position(PositionInfo::invalid());
    provider.push_position(PositionInfo::new(
        GeoCoordinate::new(95.0, 20.0, None),
        Utc::now(),
    ));

    assert_eq!(source.coordinate(), GeoCoordinate::new(10.0, 20.0, Some(30.0)));
    assert!(drain_events(&mut receiver).is_empty());
}

#[test_log::test]
fn every_valid_fix_notifies() {
    let (source, provider, mut receiver) = enabled_source();
    provider.push_position(fix(10.0, 20.0, 30.0));
    provider.push_position(fix(10.0, 20.0, 30.0));

    let events = drain_events(&mut receiver);
    assert_eq!(count(&events, EventKindType::CoordinateChangedEvent), 2);
    assert_eq!(source.coordinate(), GeoCoordinate::new(10.0, 20.0, Some(30.0)));
}

#[test_log::test]
fn no_fix_taken_over_after_disable_returns() {
    let (source, provider, _receiver) = enabled_source();
    let running = Arc::new(AtomicBool::new(true));
    let pusher = {
        let running = running.clone();
        let provider = provider.clone();
        std::thread::spawn(move || {
            let mut step = 0u32;
            while running.load(Ordering::SeqCst) {
                provider.push_position(fix(f64::from(step % 1000) * 0.01, 20.0, 30.0));
                step += 1;
            }
        })
    };
    while !source.coordinate().is_valid() {
        std::thread::yield_now();
    }

    source.set_enabled(false);
    let coordinate_at_disable = source.coordinate();
    std::thread::sleep(Duration::from_millis(20));
    let coordinate_after_disable = source.coordinate();
    running.store(false, Ordering::SeqCst);
    pusher.join().expect("Fix pushing thread panicked");

    assert_eq!(coordinate_after_disable, coordinate_at_disable);
}

#[test_log::test]
fn fix_while_disabled_is_ignored() {
    let (source, provider, mut receiver) = enabled_source();
    source.set_enabled(false);
    drain_events(&mut receiver);

    provider.push_position(fix(10.0, 20.0, 30.0));

    assert!(!source.coordinate().is_valid());
    assert!(drain_events(&mut receiver).is_empty());
}

#[test_log::test]
fn coordinate_survives_error_and_disable() {
    let (source, provider, mut receiver) = enabled_source();
    provider.push_position(fix(10.0, 20.0, 30.0));
    drain_events(&mut receiver);

    provider.push_error(PositioningError::Closed);
    assert_eq!(source.coordinate(), GeoCoordinate::new(10.0, 20.0, Some(30.0)));
    assert!(source.enabled());
    assert!(drain_events(&mut receiver).is_empty());
    assert_eq!(
        source.position_info_source().unwrap().error(),
        Some(PositioningError::Closed)
    );

    source.set_enabled(false);
    assert_eq!(source.coordinate(), GeoCoordinate::new(10.0, 20.0, Some(30.0)));
}

#[test_log::test]
fn failing_provider_creation_keeps_source_disabled() {
    let source = PositionSource::with_factory(failing_factory());
    let mut receiver = source.subscribe();
    source.set_enabled(true);

    assert!(!source.enabled());
    assert!(source.position_info_source().is_none());
    assert!(drain_events(&mut receiver).is_empty());
}
