//! End-to-end RPC over the pipe transport: host and guest joined by a pair
//! of in-memory duplex pipes, each side running its own manager, receiver
//! task, and registry.

use framelink::transport::{ContextId, PipeReceiver, PipeSink};
use framelink::{Arg, Channel, ChannelManager, MethodObject};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::mpsc;

struct Side {
    channel: Arc<Channel>,
    _manager: ChannelManager,
}

fn wire_side(
    origin: &str,
    peer_origin: &str,
    writer: tokio::io::WriteHalf<tokio::io::SimplexStream>,
    reader: tokio::io::ReadHalf<tokio::io::SimplexStream>,
) -> Side {
    let peer = ContextId::next();
    let (deliveries_tx, deliveries_rx) = mpsc::unbounded_channel();

    tokio::spawn(PipeReceiver::new(reader, peer, deliveries_tx).run());

    let manager = ChannelManager::new(deliveries_rx);
    let channel = manager.add_channel(peer, PipeSink::new(writer, origin), Some(peer_origin));

    Side {
        channel,
        _manager: manager,
    }
}

fn piped_pair() -> (Side, Side) {
    let (host_reader, guest_writer) = tokio::io::simplex(4096);
    let (guest_reader, host_writer) = tokio::io::simplex(4096);

    let host = wire_side(
        "https://host.example",
        "https://guest.example",
        host_writer,
        host_reader,
    );
    let guest = wire_side(
        "https://guest.example",
        "https://host.example",
        guest_writer,
        guest_reader,
    );
    (host, guest)
}

#[tokio::test]
async fn calls_round_trip_across_the_pipe() {
    let (host, guest) = piped_pair();

    guest.channel.object_registry().register(
        "echo",
        MethodObject::new()
            .method("identity", |mut args: Vec<Arg>| async move {
                args.remove(0).into_data()
            })
            .build(),
    );

    let value: Value = host
        .channel
        .invoke_remote_method("identity", "echo", vec![Arg::Data(json!({"nested": [1, 2]}))])
        .await
        .unwrap();
    assert_eq!(value, json!({"nested": [1, 2]}));
}

#[tokio::test]
async fn both_directions_work_on_one_pipe_pair() {
    let (host, guest) = piped_pair();

    host.channel.object_registry().register(
        "host.control",
        MethodObject::new()
            .method("resize", |mut args: Vec<Arg>| async move {
                let width = args.remove(0).into_data()?;
                Ok(json!({"resized": width}))
            })
            .build(),
    );
    guest.channel.object_registry().register(
        "guest.widget",
        MethodObject::new()
            .method("state", |_args: Vec<Arg>| async move { Ok(json!("ready")) })
            .build(),
    );

    let state: String = host
        .channel
        .invoke_remote_method("state", "guest.widget", vec![])
        .await
        .unwrap();
    assert_eq!(state, "ready");

    let resized: Value = guest
        .channel
        .invoke_remote_method("resize", "host.control", vec![Arg::Data(json!(800))])
        .await
        .unwrap();
    assert_eq!(resized, json!({"resized": 800}));
}

#[tokio::test]
async fn mismatched_envelope_origin_is_filtered() {
    let (host_reader, mut rogue_writer) = tokio::io::simplex(4096);
    let (mut guest_reader, host_writer) = tokio::io::simplex(4096);

    let peer = ContextId::next();
    let (deliveries_tx, deliveries_rx) = mpsc::unbounded_channel();
    tokio::spawn(PipeReceiver::new(host_reader, peer, deliveries_tx).run());

    let manager = ChannelManager::new(deliveries_rx);
    let channel = manager.add_channel(
        peer,
        PipeSink::new(host_writer, "https://host.example"),
        Some("https://guest.example"),
    );
    channel.object_registry().register(
        "echo",
        MethodObject::new()
            .method("identity", |mut args: Vec<Arg>| async move {
                args.remove(0).into_data()
            })
            .build(),
    );

    // An endpoint asserting the wrong origin gets no answer at all.
    framelink::transport::send_envelope(
        &mut rogue_writer,
        "https://rogue.example",
        json!({"method": "identity", "instanceId": "echo", "params": [1], "id": 0}),
    )
    .await
    .unwrap();

    let mut probe = [0u8; 1];
    let read = tokio::time::timeout(
        std::time::Duration::from_millis(50),
        tokio::io::AsyncReadExt::read(&mut guest_reader, &mut probe),
    )
    .await;
    assert!(read.is_err(), "no response bytes should have been written");
}
