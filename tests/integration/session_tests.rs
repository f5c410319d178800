//! Session-level tests: single-in-flight request servicing, timeouts,
//! reassembly failures, and event routing.

use std::time::Duration as StdDuration;

use futures_lite::future;

use scenelink::Error;
use scenelink::props::GroupId;
use scenelink::wire::frame::{ControllerEvent, FunctionId};

use crate::support::{connected_session, test_config};

#[test]
fn request_roundtrip() {
    let (session, peer) = connected_session(&test_config());

    let script = std::thread::spawn(move || {
        let msg = peer.recv_message(1000).unwrap();
        assert_eq!(msg, vec![FunctionId::Ping as u8]);
        peer.respond(FunctionId::Ping as u8, 0, &[]).unwrap();
    });

    let body = future::block_on(session.request(FunctionId::Ping, |_| {})).unwrap();
    assert!(body.is_empty());
    script.join().unwrap();
}

#[test]
fn multi_packet_response_is_reassembled() {
    let (session, peer) = connected_session(&test_config());
    let big_body: Vec<u8> = (0..200u16).map(|i| i as u8).collect();

    let expected = big_body.clone();
    let script = std::thread::spawn(move || {
        let msg = peer.recv_message(1000).unwrap();
        assert_eq!(msg[0], FunctionId::GetPropertiesFromGroup as u8);
        peer.respond(msg[0], 0, &expected).unwrap();
    });

    let body = future::block_on(session.request(FunctionId::GetPropertiesFromGroup, |w| {
        w.put_u8(GroupId::Scene as u8);
    }))
    .unwrap();
    assert_eq!(body, big_body);
    script.join().unwrap();
}

#[test]
fn fire_and_forget_completes_after_write() {
    let (session, peer) = connected_session(&test_config());

    future::block_on(session.request_no_response(FunctionId::SetPropertyValueById, |w| {
        w.put_i32(7);
        w.put_u8(1);
    }))
    .unwrap();

    // The write reached the peer; no response was needed.
    let msg = peer.recv_message(1000).unwrap();
    assert_eq!(msg, vec![4, 7, 0, 0, 0, 1]);
}

#[test]
fn remote_error_status_carries_message() {
    let (session, peer) = connected_session(&test_config());

    let script = std::thread::spawn(move || {
        let msg = peer.recv_message(1000).unwrap();
        peer.respond(msg[0], 2, b"no such group").unwrap();
    });

    let err = future::block_on(session.request(FunctionId::GetPropertiesFromGroup, |w| {
        w.put_u8(9);
    }))
    .unwrap_err();
    assert_eq!(
        err,
        Error::Remote {
            status: 2,
            message: "no such group".into()
        }
    );
    script.join().unwrap();
}

#[test]
fn unanswered_request_times_out_with_no_response() {
    let (session, _peer) = connected_session(&test_config());

    let start = std::time::Instant::now();
    let err = future::block_on(session.request(FunctionId::Ping, |_| {})).unwrap_err();
    assert_eq!(err, Error::NoResponse);
    assert!(start.elapsed() >= StdDuration::from_millis(100));
}

#[test]
fn partial_response_fails_with_packet_loss() {
    let (session, peer) = connected_session(&test_config());

    let script = std::thread::spawn(move || {
        let msg = peer.recv_message(1000).unwrap();
        // 60-byte body at packet size 20 → 4 packets; deliver only 2.
        peer.respond_truncated(msg[0], &[0xAB; 60], 2).unwrap();
    });

    let err = future::block_on(session.request(FunctionId::GetPropertyById, |w| {
        w.put_i32(1);
    }))
    .unwrap_err();
    assert_eq!(
        err,
        Error::PacketLoss {
            received: 2,
            expected: 4
        }
    );
    script.join().unwrap();
}

#[test]
fn requests_are_serviced_strictly_fifo() {
    let (session, peer) = connected_session(&test_config());

    let s1 = session.clone();
    let first = std::thread::spawn(move || {
        future::block_on(s1.request(FunctionId::GetPropertyValueById, |w| w.put_i32(1)))
    });

    // Give the first request time to reach the worker, then queue a
    // second one behind it.
    std::thread::sleep(StdDuration::from_millis(20));
    let s2 = session.clone();
    let second = std::thread::spawn(move || {
        future::block_on(s2.request(FunctionId::GetPropertyValueById, |w| w.put_i32(2)))
    });

    // Only the first request may be on the wire while it is pending.
    let msg1 = peer.recv_message(1000).unwrap();
    assert_eq!(msg1, vec![1, 1, 0, 0, 0]);
    std::thread::sleep(StdDuration::from_millis(30));
    assert!(
        peer.try_recv_message().is_none(),
        "second request leaked onto the wire while the first was pending"
    );

    peer.respond(1, 0, &5i32.to_le_bytes()).unwrap();
    let msg2 = peer.recv_message(1000).unwrap();
    assert_eq!(msg2, vec![1, 2, 0, 0, 0]);
    peer.respond(1, 0, &9i32.to_le_bytes()).unwrap();

    assert_eq!(first.join().unwrap().unwrap(), 5i32.to_le_bytes());
    assert_eq!(second.join().unwrap().unwrap(), 9i32.to_le_bytes());
}

#[test]
fn event_while_idle_reaches_event_stream() {
    let (session, peer) = connected_session(&test_config());

    peer.send_properties_changed(GroupId::Scene as u8).unwrap();
    let event = future::block_on(session.next_event());
    assert_eq!(event, ControllerEvent::PropertiesChanged(GroupId::Scene));
}

#[test]
fn event_ahead_of_response_is_routed_not_consumed() {
    let (session, peer) = connected_session(&test_config());

    let script = std::thread::spawn(move || {
        let msg = peer.recv_message(1000).unwrap();
        // The controller slips an event in before answering.
        peer.send_properties_changed(GroupId::Global as u8).unwrap();
        peer.respond(msg[0], 0, &[]).unwrap();
    });

    let body = future::block_on(session.request(FunctionId::Ping, |_| {})).unwrap();
    assert!(body.is_empty());
    assert_eq!(
        future::block_on(session.next_event()),
        ControllerEvent::PropertiesChanged(GroupId::Global)
    );
    script.join().unwrap();
}

#[test]
fn link_drop_fails_pending_request() {
    let (session, peer) = connected_session(&test_config());

    let script = std::thread::spawn(move || {
        let _ = peer.recv_message(1000).unwrap();
        peer.drop_link();
    });

    let err = future::block_on(session.request(FunctionId::Ping, |_| {})).unwrap_err();
    assert_eq!(err, Error::NotConnected);
    script.join().unwrap();
}
