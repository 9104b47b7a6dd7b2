use bytes::BytesMut;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::codec::{Decoder, Encoder};

use enclave_bridge::transport::unix;
use enclave_bridge::{
    ClientConfig, Frame, FrameCodec, RequestEnvelope, ResponseEnvelope, TransportClient,
    UnixConnector,
};

/// Mock enclave answering length-prefixed JSON requests over a Unix socket.
///
/// Run with: `cargo run --example echo_enclave [socket-path]`
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/tmp/echo-enclave.sock".to_string());
    let listener = unix::listen(&path)?;
    println!("mock enclave listening on {path}");

    // Spawn a client that exercises the bridge against the mock enclave.
    let client_path = path.clone();
    let client_handle = tokio::spawn(async move {
        let mut client =
            TransportClient::new(UnixConnector::new(client_path), ClientConfig::default());
        client.connect().await.unwrap();
        println!("[client] connected");

        for i in 0..3 {
            let request = RequestEnvelope::new("echo", json!({ "n": i }));
            println!("[client] sending: {} {}", request.method, request.params);
            let response = client.send(&request).await.unwrap();
            println!("[client] received: {:?}", response.data);
        }

        let response = client.call("get_attestation", json!({})).await.unwrap();
        println!("[client] attestation: {:?}", response.data);

        client.disconnect().await;
        println!("[client] disconnected");
    });

    let (mut stream, _) = unix::accept(&listener).await?;
    println!("accepted connection");

    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::new();
    loop {
        let frame = match codec.decode(&mut buf)? {
            Some(frame) => frame,
            None => {
                if stream.read_buf(&mut buf).await? == 0 {
                    println!("[enclave] client closed the connection, exiting");
                    break;
                }
                continue;
            }
        };

        let response = match frame.to_json::<RequestEnvelope>() {
            Ok(request) if request.method == "get_attestation" => ResponseEnvelope::ok(
                request.id,
                json!({
                    "attestation_doc": "TU9DS19BVFRfVjE=",
                    "certificate_chain": [],
                    "public_key": "04deadbeef",
                }),
            ),
            Ok(request) => {
                println!("[enclave] echoing: {}", request.method);
                ResponseEnvelope::ok(request.id, request.params)
            }
            Err(e) => ResponseEnvelope::failure("", format!("bad request: {e}")),
        };

        let mut out = BytesMut::new();
        codec.encode(Frame::from_json(&response)?, &mut out)?;
        stream.write_all(&out).await?;
    }

    client_handle.await?;
    let _ = std::fs::remove_file(&path);
    println!("done!");

    Ok(())
}
