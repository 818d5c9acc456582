//! One request/response exchange over an open byte stream.
//!
//! Requester: method name, parameter types, argument tuple, flushed together.
//! Responder: outcome tag, then the return value (left out for methods that
//! return nothing) or a single failure payload. Every value is its own
//! length-delimited frame. A connection carries exactly one exchange.

use std::io;

use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::{
    messages::{CallRequest, Failure, Outcome, Reply},
    util::{closed_early_io_error, other_io_error, string_io_error},
};

pub struct CallChannel<RW> {
    frames: Framed<RW, LengthDelimitedCodec>,
}

impl<RW: AsyncRead + AsyncWrite + Unpin> CallChannel<RW> {
    pub fn new(read_write: RW) -> Self {
        Self {
            frames: Framed::new(read_write, LengthDelimitedCodec::new()),
        }
    }

    pub async fn send_request(&mut self, request: &CallRequest) -> io::Result<()> {
        self.feed_value(&request.method).await?;
        self.feed_value(&request.parameter_types).await?;
        self.frames.feed(request.arguments.clone()).await?;
        SinkExt::<Bytes>::flush(&mut self.frames).await
    }

    pub async fn read_request(&mut self) -> io::Result<CallRequest> {
        let method = self.next_value("method name").await?;
        let parameter_types = self.next_value("parameter types").await?;
        let arguments = self.next_frame("arguments").await?.freeze();
        Ok(CallRequest {
            method,
            parameter_types,
            arguments,
        })
    }

    pub async fn send_reply(&mut self, reply: &Reply) -> io::Result<()> {
        self.feed_value(&reply.outcome()).await?;
        match reply {
            Reply::Success(Some(value)) => self.frames.feed(value.clone()).await?,
            Reply::Success(None) => (),
            Reply::Failure(failure) => self.feed_value(failure).await?,
        }
        SinkExt::<Bytes>::flush(&mut self.frames).await
    }

    /// Reads the response to a request. The return value frame is only
    /// expected when `returns_value` is set.
    pub async fn read_reply(&mut self, returns_value: bool) -> io::Result<Reply> {
        match self.next_value::<Outcome>("outcome").await? {
            Outcome::Success if returns_value => {
                let value = self.next_frame("return value").await?;
                Ok(Reply::Success(Some(value.freeze())))
            }
            Outcome::Success => Ok(Reply::Success(None)),
            Outcome::Failure => {
                let failure: Failure = self.next_value("failure").await?;
                Ok(Reply::Failure(failure))
            }
        }
    }

    /// Flushes and shuts down the write half. Dropping the channel closes the
    /// socket either way; this only makes the hang-up orderly.
    pub async fn close(mut self) -> io::Result<()> {
        SinkExt::<Bytes>::close(&mut self.frames).await
    }

    async fn feed_value<T: Serialize + ?Sized>(&mut self, value: &T) -> io::Result<()> {
        let bytes = rmp_serde::to_vec(value).map_err(other_io_error)?;
        self.frames.feed(Bytes::from(bytes)).await
    }

    async fn next_frame(&mut self, expected: &str) -> io::Result<BytesMut> {
        match self.frames.next().await {
            Some(frame) => frame,
            None => Err(closed_early_io_error(expected)),
        }
    }

    async fn next_value<T: DeserializeOwned>(&mut self, expected: &str) -> io::Result<T> {
        let frame = self.next_frame(expected).await?;
        rmp_serde::from_slice(&frame)
            .map_err(|e| string_io_error(format!("malformed {expected}: {e}")))
    }
}
