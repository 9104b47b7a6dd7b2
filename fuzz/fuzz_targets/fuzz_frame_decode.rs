#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use tokio_util::codec::Decoder;

use enclave_bridge::frame::codec::FrameCodec;
use enclave_bridge::ResponseEnvelope;

fuzz_target!(|data: &[u8]| {
    // Small limit so hostile prefixes hit the size check as well as the
    // buffering path.
    let mut codec = FrameCodec::with_max_payload_size(64 * 1024);

    // Deliver the input in two pieces to exercise the cached-prefix path.
    let split = data.first().map_or(0, |b| *b as usize).min(data.len());
    let mut buf = BytesMut::from(&data[..split]);
    let mut pending = Some(&data[split..]);

    loop {
        match codec.decode(&mut buf) {
            Ok(Some(frame)) => {
                let _ = frame.to_json::<ResponseEnvelope>();
            }
            Ok(None) => match pending.take() {
                Some(rest) => buf.extend_from_slice(rest),
                None => break,
            },
            Err(_) => break, // Rejection is fine; panics are not.
        }
    }
});
