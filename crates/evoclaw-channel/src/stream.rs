//! A `Stream<Item = Message>` backed by an mpsc receiver, shared by every
//! channel implementation's `receive()`.

use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;

use crate::message::Message;

pub struct InboxStream(pub mpsc::Receiver<Message>);

impl Stream for InboxStream {
    type Item = Message;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        self.0.poll_recv(cx)
    }
}
