use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::time::timeout;

use livesync::transport::memory::MemoryTransport;
use livesync::{
    attach, Config, ConnectOptions, ConnectionStatus, LiveState, PropertyBinding, StateSink,
};

#[derive(Default)]
struct Recording {
    properties: Vec<(String, Value)>,
    attributes: Vec<(String, Value)>,
    events: Vec<(String, Value)>,
}

#[derive(Clone, Default)]
struct RecordingSink(Arc<Mutex<Recording>>);

impl StateSink for RecordingSink {
    fn set_property(&mut self, name: &str, value: &Value) {
        self.0.lock().properties.push((name.into(), value.clone()));
    }

    fn set_attribute(&mut self, name: &str, value: &Value) {
        self.0.lock().attributes.push((name.into(), value.clone()));
    }

    fn dispatch_event(&mut self, name: &str, payload: &Value) {
        self.0.lock().events.push((name.into(), payload.clone()));
    }
}

async fn wait_until(deadline: Duration, mut check: impl FnMut() -> bool) {
    timeout(deadline, async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition deadline");
}

fn live_pair() -> (Arc<LiveState>, livesync::transport::memory::MemoryServer) {
    let (transport, server) = MemoryTransport::new();
    let live = Arc::new(LiveState::with_transport(
        Config::new("ws://h/s", "el:1").unwrap(),
        transport,
    ));
    (live, server)
}

#[tokio::test]
async fn properties_and_attributes_track_state() {
    let (live, mut server) = live_pair();
    let sink = RecordingSink::default();
    let recording = sink.0.clone();

    let _binding = attach(
        live.clone(),
        sink,
        ConnectOptions {
            properties: vec![
                PropertyBinding::new("bar"),
                PropertyBinding::with_path("nested", "foo.bar"),
            ],
            attributes: vec!["foo".into()],
            ..Default::default()
        },
    );

    // attach() itself connects.
    let session = timeout(Duration::from_secs(2), server.accept())
        .await
        .expect("join deadline")
        .unwrap();
    session.send(
        "state:change",
        json!({"state": {"foo": {"bar": "wizzle"}, "bar": "wuzzle"}, "version": 1}),
    );

    wait_until(Duration::from_secs(2), || {
        let r = recording.lock();
        r.properties.len() == 2 && r.attributes.len() == 1
    })
    .await;

    let r = recording.lock();
    assert!(r.properties.contains(&("bar".into(), json!("wuzzle"))));
    assert!(r.properties.contains(&("nested".into(), json!("wizzle"))));
    assert_eq!(r.attributes[0], ("foo".into(), json!({"bar": "wizzle"})));
}

#[tokio::test]
async fn declared_events_flow_both_ways() {
    let (live, mut server) = live_pair();
    let sink = RecordingSink::default();
    let recording = sink.0.clone();

    let binding = attach(
        live.clone(),
        sink,
        ConnectOptions {
            send_events: vec!["sayHi".into()],
            receive_events: vec!["sayHiBack".into()],
            ..Default::default()
        },
    );

    let mut session = timeout(Duration::from_secs(2), server.accept())
        .await
        .expect("join deadline")
        .unwrap();

    let mut status = live.status_stream();
    status
        .wait_for(|s| *s == ConnectionStatus::Joined)
        .await
        .unwrap();

    binding.emit("sayHi", json!({"greeting": "wazzaap"}));
    let push = timeout(Duration::from_secs(2), session.next_push())
        .await
        .expect("push deadline")
        .unwrap();
    assert_eq!(push.event, "lvs_evt:sayHi");
    assert_eq!(push.payload, json!({"greeting": "wazzaap"}));

    // Undeclared send events are dropped.
    binding.emit("notDeclared", json!(1));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(session.try_next_push().is_none());

    session.send("sayHiBack", json!({"foo": "bar"}));
    wait_until(Duration::from_secs(2), || !recording.lock().events.is_empty()).await;
    assert_eq!(
        recording.lock().events[0],
        ("sayHiBack".into(), json!({"foo": "bar"}))
    );
}

#[tokio::test]
async fn detach_disconnects_and_stops_forwarding() {
    let (live, mut server) = live_pair();
    let sink = RecordingSink::default();
    let recording = sink.0.clone();

    let binding = attach(
        live.clone(),
        sink,
        ConnectOptions {
            properties: vec![PropertyBinding::new("a")],
            ..Default::default()
        },
    );
    let session = timeout(Duration::from_secs(2), server.accept())
        .await
        .expect("join deadline")
        .unwrap();

    binding.detach();

    let mut status = live.status_stream();
    timeout(
        Duration::from_secs(2),
        status.wait_for(|s| *s == ConnectionStatus::Unconnected),
    )
    .await
    .expect("detach deadline")
    .unwrap();

    session.send("state:change", json!({"state": {"a": 1}, "version": 1}));
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(recording.lock().properties.is_empty());
}
