//! JSON-lines transport: one inbound message per input line, one reply per
//! output line.

use crate::domain::message::{InboundMessage, ReplyMessage};
use crate::domain::ports::{MessageFeed, ReplySink};
use crate::error::TransportError;
use async_trait::async_trait;
use serde_json::json;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};
use tokio::sync::Mutex;

pub struct JsonLinesFeed<R> {
    lines: Lines<R>,
}

impl<R: AsyncBufRead + Unpin + Send> JsonLinesFeed<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> MessageFeed for JsonLinesFeed<R> {
    async fn next_message(&mut self) -> Option<Result<InboundMessage, TransportError>> {
        loop {
            match self.lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => return Some(serde_json::from_str(&line).map_err(TransportError::from)),
                Ok(None) => return None,
                Err(err) => return Some(Err(err.into())),
            }
        }
    }
}

pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl<W: AsyncWrite + Unpin + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> ReplySink for JsonLinesSink<W> {
    async fn emit(&self, reply: ReplyMessage) -> Result<(), TransportError> {
        let mut line = serde_json::to_vec(&json!({
            "in_reply_to": reply.in_reply_to,
            "content": reply.content,
            "sender": reply.sender,
        }))?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }
}
