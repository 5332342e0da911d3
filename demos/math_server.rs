//! Math RPC server demo.
//!
//! Run with: cargo run --example math_server
//!
//! Listens on 127.0.0.1:18800 and serves until Ctrl+C.

use mprpc::{CodecOptions, Result, Server, Value};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct AddRequest {
    a: i64,
    b: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct AddResponse {
    sum: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    tracing_subscriber::fmt::init();

    let server = Server::new(CodecOptions::default());

    server
        .register("add", |req: AddRequest| async move {
            Ok(AddResponse { sum: req.a + req.b })
        })
        .await;

    server
        .on_request("echo", |params| async move { Ok(Value::Array(params)) })
        .await;

    server
        .on_notify("log", |params| async move {
            println!("notification: {params:?}");
        })
        .await;

    let handle = server.listen(("127.0.0.1", 18800)).await?;
    println!("listening on {}", handle.local_addr());

    tokio::signal::ctrl_c().await?;
    println!("shutting down");
    handle.close().await;

    Ok(())
}
