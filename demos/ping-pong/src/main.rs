//! Two endpoints playing ping-pong over an in-process transport.
//!
//! The "shell" side fires a volley of pings and awaits each reply; the
//! "widget" side answers every ping through the reply capability of the
//! inbound message. Run with `RUST_LOG=interframe=debug` to watch the
//! handshake and the correlation traffic.

use interframe::{ChannelTransport, Endpoint, EndpointError};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), EndpointError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env(),
        )
        .init();

    let (shell_half, widget_half) = ChannelTransport::pair(
        "https://shell.example",
        "https://widget.example",
    );
    let (to_widget, to_shell) =
        (shell_half.peer_context(), widget_half.peer_context());

    // Note: the first ping below is sent before the handshake completes;
    // it is queued and replayed automatically once both sides are ready.
    let shell = Endpoint::new(shell_half, to_widget)?;
    let widget = Endpoint::new(widget_half, to_shell)?;

    widget.register_listener("ping", |message| {
        let round = message.data()["round"].as_u64().unwrap_or(0);
        tracing::info!(round, "widget received ping");
        message.open().response(json!({ "pong": round }));
    });

    for round in 0..5u64 {
        let reply = shell
            .send("ping", json!({ "round": round }))?
            .await;
        match reply {
            Some(reply) => {
                println!("round {round}: pong {}", reply.data["pong"]);
            }
            None => println!("round {round}: no reply within the window"),
        }
    }

    Ok(())
}
