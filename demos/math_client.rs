//! Math RPC client demo.
//!
//! This demo sends a typed request, a raw request, and a notification to
//! the math server, printing each outcome.
//!
//! Run with: cargo run --example math_client
//!
//! Requires: math_server listening on 127.0.0.1:18800

use mprpc::{Client, ClientConfig, Result, Value};
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

    let client = Client::new(ClientConfig::new(18800).with_host("127.0.0.1"));

    // ---
    // Typed request
    let resp: AddResponse = client.call("add", AddRequest { a: 2, b: 3 }).await?;
    println!("2 + 3 = {}", resp.sum);

    // ---
    // Raw request
    let echoed = client
        .request("echo", vec![Value::from(1), Value::from("two")])
        .await?;
    println!("echoed: {echoed:?}");

    // ---
    // Notification: resolves once the write flushes, no response expected
    client.notify("log", vec![Value::from("hello")]).await?;

    Ok(())
}
