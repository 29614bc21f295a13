// src/stream/mod.rs — Response stream decoding

pub mod decoder;
pub mod events;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::pin::Pin;

use crate::infra::errors::CoachError;

pub use decoder::{Frame, FrameDecoder};
pub use events::StreamEvent;

/// Raw response body, chunk by chunk as the transport delivers it.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, CoachError>> + Send>>;

pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, CoachError>> + Send>>;

/// Lift a byte stream into a frame stream.
///
/// A transport error is yielded once and ends the stream. Dropping the
/// returned stream drops the transport with it.
pub fn frames(bytes: ByteStream) -> FrameStream {
    let stream = async_stream::stream! {
        let mut decoder = FrameDecoder::new();
        let mut bytes = bytes;

        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(chunk) => {
                    for frame in decoder.push(&chunk) {
                        yield Ok(frame);
                    }
                }
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }

        decoder.finish();
    };

    Box::pin(stream)
}

/// Byte stream over fixed chunks. Handy for replaying captured responses.
pub fn byte_stream_from_chunks<I, C>(chunks: I) -> ByteStream
where
    I: IntoIterator<Item = C>,
    C: Into<Bytes>,
{
    let items: Vec<Result<Bytes, CoachError>> = chunks.into_iter().map(|c| Ok(c.into())).collect();
    Box::pin(futures::stream::iter(items))
}
