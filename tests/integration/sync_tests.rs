//! Sync-engine tests: group fetch, supersession, and origin-tagged
//! outbound propagation.

use std::time::Duration as StdDuration;

use futures_lite::future;

use scenelink::Error;
use scenelink::props::sync::{FetchOutcome, GroupContent, SyncEngine};
use scenelink::props::{Argb, GroupId, Property, PropertyUpdate, PropertyValue, SliderStyle};
use scenelink::wire::frame::FunctionId;
use scenelink::wire::ByteWriter;
use scenelink::props::codec::{encode_descriptor, encode_value};

use crate::support::{answer_next_fetch, connected_session, encode_group_body, test_config};

fn scene_props() -> Vec<Property> {
    vec![
        Property {
            id: 4,
            group: GroupId::Scene,
            name: "Brightness".into(),
            value: PropertyValue::Float {
                style: SliderStyle::Slider,
                value: 0.5,
                min: 0.0,
                max: 1.0,
            },
        },
        Property {
            id: 5,
            group: GroupId::Scene,
            name: "Accent".into(),
            value: PropertyValue::Color(Argb::opaque(0x20, 0x40, 0x80)),
        },
    ]
}

#[test]
fn fetch_commits_decoded_list() {
    let (session, peer) = connected_session(&test_config());
    let engine = SyncEngine::new(session);

    let props = scene_props();
    let expected = props.clone();
    let script = std::thread::spawn(move || {
        let group = answer_next_fetch(&peer, &props, 1000);
        assert_eq!(group, GroupId::Scene as u8);
    });

    let outcome = future::block_on(engine.fetch(GroupId::Scene)).unwrap();
    assert_eq!(outcome, FetchOutcome::Committed(2));

    let GroupContent::Ready(list) = engine.content(GroupId::Scene).get() else {
        panic!("group not ready");
    };
    assert_eq!(*list, expected);
    script.join().unwrap();
}

#[test]
fn fetch_failure_leaves_loading_placeholder() {
    let (session, peer) = connected_session(&test_config());
    let engine = SyncEngine::new(session);

    let script = std::thread::spawn(move || {
        let msg = peer.recv_message(1000).unwrap();
        peer.respond(msg[0], 1, b"flash busy").unwrap();
    });

    let err = future::block_on(engine.fetch(GroupId::Global)).unwrap_err();
    assert!(matches!(err, Error::Remote { status: 1, .. }));
    assert_eq!(
        engine.content(GroupId::Global).get(),
        GroupContent::Loading { progress: 0.0 }
    );
    script.join().unwrap();
}

#[test]
fn superseding_fetch_wins_even_when_first_finishes_late() {
    let (session, peer) = connected_session(&test_config());
    let engine = SyncEngine::new(session);

    let first_props = vec![scene_props().remove(0)];
    let second_props = scene_props();

    // First fetch goes out...
    let first_engine = engine.clone();
    let first = std::thread::spawn(move || future::block_on(first_engine.fetch(GroupId::Scene)));
    let first_request = peer.recv_message(1000).unwrap();
    assert_eq!(first_request[1], GroupId::Scene as u8);

    // ...and before it is answered, a second fetch supersedes it.
    let second_engine = engine.clone();
    let second = std::thread::spawn(move || future::block_on(second_engine.fetch(GroupId::Scene)));
    std::thread::sleep(StdDuration::from_millis(30));

    // Answer the first request now; its result must be discarded.
    peer.respond(first_request[0], 0, &encode_group_body(&first_props))
        .unwrap();
    assert_eq!(first.join().unwrap().unwrap(), FetchOutcome::Superseded);

    // Answer the second; it commits.
    let second_request = peer.recv_message(1000).unwrap();
    peer.respond(second_request[0], 0, &encode_group_body(&second_props))
        .unwrap();
    assert_eq!(
        second.join().unwrap().unwrap(),
        FetchOutcome::Committed(2)
    );

    let GroupContent::Ready(list) = engine.content(GroupId::Scene).get() else {
        panic!("group not ready");
    };
    assert_eq!(list.len(), 2, "only the second fetch may commit");
}

#[test]
fn user_edit_updates_cache_and_pushes_upstream() {
    let (session, peer) = connected_session(&test_config());
    let engine = SyncEngine::new(session);

    let script_peer = peer.clone();
    let props = scene_props();
    let script = std::thread::spawn(move || {
        answer_next_fetch(&script_peer, &props, 1000);
    });
    future::block_on(engine.fetch(GroupId::Scene)).unwrap();
    script.join().unwrap();

    future::block_on(engine.set_value(GroupId::Scene, 4, PropertyUpdate::Float(0.25)))
        .unwrap();

    // The push is [SetPropertyValueById][id:i32][Q15 value].
    let push = peer.recv_message(1000).unwrap();
    let mut expected = vec![FunctionId::SetPropertyValueById as u8];
    expected.extend_from_slice(&4i32.to_le_bytes());
    expected.extend_from_slice(&8192i32.to_le_bytes());
    assert_eq!(push, expected);

    // The cache already shows the edit.
    let GroupContent::Ready(list) = engine.content(GroupId::Scene).get() else {
        panic!("group not ready");
    };
    let PropertyValue::Float { value, .. } = list[0].value else {
        panic!("kind changed");
    };
    assert!((value - 0.25).abs() < f32::EPSILON);
}

#[test]
fn hydration_is_never_echoed_upstream() {
    let (session, peer) = connected_session(&test_config());
    let engine = SyncEngine::new(session);

    let script_peer = peer.clone();
    let props = scene_props();
    let script = std::thread::spawn(move || {
        answer_next_fetch(&script_peer, &props, 1000);
    });
    future::block_on(engine.fetch(GroupId::Scene)).unwrap();
    script.join().unwrap();

    // Values arrived from the wire; nothing may be pushed back.
    std::thread::sleep(StdDuration::from_millis(50));
    assert!(
        peer.try_recv_message().is_none(),
        "fetch hydration was echoed to the controller"
    );
}

#[test]
fn user_edit_rejected_when_group_not_synchronized() {
    let (session, _peer) = connected_session(&test_config());
    let engine = SyncEngine::new(session);

    let err = future::block_on(engine.set_value(GroupId::Scene, 4, PropertyUpdate::Float(0.5)))
        .unwrap_err();
    assert_eq!(err, Error::InvalidValue("group not synchronized"));
}

#[test]
fn itemized_fetch_assembles_group() {
    let (session, peer) = connected_session(&test_config());
    let engine = SyncEngine::new(session);

    let props = scene_props();
    let script_props = props.clone();
    let script = std::thread::spawn(move || {
        // Id-list request.
        let msg = peer.recv_message(1000).unwrap();
        assert_eq!(msg[0], FunctionId::GetPropertiesIdsByGroup as u8);
        let mut body = ByteWriter::new();
        body.put_u16(script_props.len() as u16);
        for p in &script_props {
            body.put_i32(p.id);
        }
        peer.respond(msg[0], 0, &body.into_inner()).unwrap();

        // Per-id info + value requests, in order.
        for p in &script_props {
            let msg = peer.recv_message(1000).unwrap();
            assert_eq!(msg[0], FunctionId::GetPropertyInfoById as u8);
            assert_eq!(&msg[1..5], p.id.to_le_bytes().as_slice());
            let mut w = ByteWriter::new();
            encode_descriptor(p, &mut w).unwrap();
            peer.respond(msg[0], 0, &w.into_inner()).unwrap();

            let msg = peer.recv_message(1000).unwrap();
            assert_eq!(msg[0], FunctionId::GetPropertyValueById as u8);
            let mut w = ByteWriter::new();
            encode_value(p, &mut w).unwrap();
            peer.respond(msg[0], 0, &w.into_inner()).unwrap();
        }
    });

    let outcome = future::block_on(engine.fetch_with_progress(GroupId::Scene)).unwrap();
    assert_eq!(outcome, FetchOutcome::Committed(2));

    let GroupContent::Ready(list) = engine.content(GroupId::Scene).get() else {
        panic!("group not ready");
    };
    assert_eq!(*list, props);
    script.join().unwrap();
}
