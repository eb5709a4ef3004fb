//! Standalone fixture server for trying `courier` by hand.
//!
//! `PORT` picks the port (default 3000). Token requests must use client id
//! `courier` and secret `s3cret`.

use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    println!("mock server on http://{addr}");
    println!("routes: /api /text /broken-json /status/{{code}} /echo /slow/{{ms}} POST /oauth/token");
    mock_server::run(listener).await
}
