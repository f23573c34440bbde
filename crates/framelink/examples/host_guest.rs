// Host/guest example - two in-process contexts talking over channels
//
// Shows: manager setup, registering objects (including a factory and a
// client-side event callback), invoking well-known instance ids, and a
// callback crossing the boundary. The "DevOps-style" handshake flow here is
// application convention; the RPC layer itself is agnostic to the names.

use framelink::transport::LocalContext;
use framelink::{Arg, Callback, ChannelManager, MethodObject};
use serde_json::{Value, json};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Two isolated contexts and a channel each way.
    let mut host_ctx = LocalContext::new("https://host.example");
    let mut guest_ctx = LocalContext::new("https://guest.example");

    let host_manager = ChannelManager::new(host_ctx.deliveries());
    let guest_manager = ChannelManager::new(guest_ctx.deliveries());

    let to_guest = host_manager.add_channel(
        guest_ctx.id(),
        guest_ctx.sink_from(&host_ctx),
        Some("https://guest.example"),
    );
    let to_host = guest_manager.add_channel(
        host_ctx.id(),
        host_ctx.sink_from(&guest_ctx),
        Some("https://host.example"),
    );

    // Host side: a control object the guest calls by convention.
    to_guest.object_registry().register(
        "host.control",
        MethodObject::new()
            .method("initialHandshake", |mut args: Vec<Arg>| async move {
                let options = args.remove(0).into_data()?;
                println!("[host] handshake with options {options}");
                Ok(json!({
                    "contributionId": "sample.panel",
                    "context": {"user": {"name": "jas"}},
                }))
            })
            .method("resize", |mut args: Vec<Arg>| async move {
                let width = args.remove(0).into_data()?;
                let height = args.remove(0).into_data()?;
                println!("[host] resize to {width}x{height}");
                Ok(Value::Null)
            })
            .method("subscribe", |mut args: Vec<Arg>| async move {
                // The guest's function arrived as a proxy reference; calling
                // it here routes back across the boundary.
                let listener = args.remove(0).into_callback()?;
                listener.call(vec![json!("subscribed")]).await?;
                Ok(Value::Null)
            })
            .build(),
    );

    // Host side: a service lookup that uses the caller's context data.
    to_guest
        .object_registry()
        .register_factory("host.services", |context| {
            let caller = context
                .and_then(|c| c.get("contributionId"))
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            MethodObject::new()
                .method("getService", move |mut args: Vec<Arg>| {
                    let caller = caller.clone();
                    async move {
                        let id = args.remove(0).into_data()?;
                        Ok(json!({"service": id, "grantedTo": caller}))
                    }
                })
                .build()
        });

    // Guest side: an event sink the host can call back into.
    to_host.object_registry().register(
        "guest.client",
        MethodObject::new()
            .method("dispatchEvent", |mut args: Vec<Arg>| async move {
                let name = args.remove(0).into_data()?;
                println!("[guest] event {name}");
                Ok(Value::Null)
            })
            .build(),
    );

    // Guest performs the handshake...
    let handshake: Value = to_host
        .invoke_remote_method("initialHandshake", "host.control", vec![Arg::Data(json!({
            "sdkVersion": 4.0,
            "loaded": true,
        }))])
        .await?;
    println!("[guest] handshake result: {handshake}");

    // ...asks for a service, identifying itself via instance context...
    let service: Value = to_host
        .invoke_with_context(
            "getService",
            "host.services",
            Some(json!({"contributionId": handshake["contributionId"]})),
            vec![Arg::Data(json!("theme"))],
        )
        .await?;
    println!("[guest] service: {service}");

    // ...while the host pushes an event into the guest's client object...
    to_guest
        .invoke_remote_method::<Value>(
            "dispatchEvent",
            "guest.client",
            vec![Arg::Data(json!("themeApplied"))],
        )
        .await?;

    // ...and the guest subscribes with a callback the host fires remotely.
    let on_change = Callback::new(|args: Vec<Value>| async move {
        println!("[guest] notification: {args:?}");
        Ok(Value::Null)
    });
    to_host
        .invoke_remote_method::<Value>("subscribe", "host.control", vec![Arg::Callback(
            on_change,
        )])
        .await?;

    to_host
        .invoke_remote_method::<Value>("resize", "host.control", vec![
            Arg::Data(json!(800)),
            Arg::Data(json!(600)),
        ])
        .await?;

    Ok(())
}
