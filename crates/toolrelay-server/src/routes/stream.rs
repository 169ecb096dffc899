use axum::{
    body::Body,
    http::header,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::{
    pin::Pin,
    task::{Context, Poll},
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use toolrelay::providers::base::{ProviderError, TextStream};

const CHANNEL_CAPACITY: usize = 100;

/// Plain-text body that forwards completion deltas as they arrive.
///
/// A failure partway through aborts the body instead of ending it cleanly.
pub struct TextStreamResponse {
    rx: ReceiverStream<Result<String, ProviderError>>,
}

impl TextStreamResponse {
    /// Drain the completion on its own task, so a slow client only fills the channel
    pub fn spawn(mut stream: TextStream) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        tokio::spawn(async move {
            while let Some(chunk) = stream.next().await {
                let failed = chunk.is_err();
                if let Err(e) = &chunk {
                    tracing::error!("Error reading completion stream: {}", e);
                }
                if tx.send(chunk).await.is_err() {
                    tracing::debug!("client went away");
                    break;
                }
                if failed {
                    break;
                }
            }
        });

        Self {
            rx: ReceiverStream::new(rx),
        }
    }
}

impl Stream for TextStreamResponse {
    type Item = Result<Bytes, ProviderError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx)
            .poll_next(cx)
            .map(|opt| opt.map(|chunk| chunk.map(Bytes::from)))
    }
}

impl IntoResponse for TextStreamResponse {
    fn into_response(self) -> Response {
        (
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            Body::from_stream(self),
        )
            .into_response()
    }
}
