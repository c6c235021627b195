//! Scripted driver for pipeline tests.

use async_trait::async_trait;
use dramaturg_core::{GenerateRequest, GenerateResponse, TokenUsage};
use dramaturg_error::{DramaturgResult, ProviderError, ProviderErrorKind};
use dramaturg_interface::DramaturgDriver;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Completion text
    Text(String),
    /// Provider failure
    Error(ProviderErrorKind),
    /// Completion text delivered after a delay
    Delayed(Duration, String),
}

/// Driver that replays scripted replies in order.
///
/// Once the script runs out, the last reply repeats.
#[derive(Debug)]
pub struct MockDriver {
    replies: Mutex<VecDeque<MockReply>>,
    last: Mutex<Option<MockReply>>,
    requests: Mutex<Vec<GenerateRequest>>,
    call_count: AtomicUsize,
}

impl MockDriver {
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Replies with the given texts in order.
    pub fn with_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(|t| MockReply::Text(t.into())).collect())
    }

    /// Always replies with the same text.
    pub fn always(text: impl Into<String>) -> Self {
        Self::with_texts([text])
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_reply(&self) -> MockReply {
        let next = self.replies.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        match next {
            Some(reply) => {
                *last = Some(reply.clone());
                reply
            }
            None => last.clone().unwrap_or_else(|| {
                MockReply::Error(ProviderErrorKind::InvalidResponse(
                    "no scripted reply".to_string(),
                ))
            }),
        }
    }
}

#[async_trait]
impl DramaturgDriver for MockDriver {
    async fn generate(&self, req: &GenerateRequest) -> DramaturgResult<GenerateResponse> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(req.clone());

        let text = match self.next_reply() {
            MockReply::Text(text) => text,
            MockReply::Error(kind) => return Err(ProviderError::new(kind).into()),
            MockReply::Delayed(delay, text) => {
                tokio::time::sleep(delay).await;
                text
            }
        };
        Ok(GenerateResponse {
            text,
            usage: Some(TokenUsage::new(100, 50)),
        })
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}
