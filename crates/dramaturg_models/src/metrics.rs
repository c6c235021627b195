//! OpenTelemetry instruments for provider calls.
//!
//! Process-wide and labelled by provider and model. Per-run accounting is
//! the pipeline collector's job; these exist for exporters.

use dramaturg_core::TokenUsage;
use dramaturg_error::ProviderErrorKind;
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use std::sync::OnceLock;
use std::time::Duration;

static METRICS: OnceLock<LlmMetrics> = OnceLock::new();

/// Call counters shared by every provider client.
#[derive(Clone)]
pub struct LlmMetrics {
    calls: Counter<u64>,
    failures: Counter<u64>,
    latency: Histogram<f64>,
    tokens: Counter<u64>,
}

impl LlmMetrics {
    fn init() -> Self {
        let meter = global::meter("dramaturg");
        Self {
            calls: meter
                .u64_counter("dramaturg.llm.calls")
                .with_description("Completed provider calls")
                .build(),
            failures: meter
                .u64_counter("dramaturg.llm.failures")
                .with_description("Provider calls that returned an error")
                .build(),
            latency: meter
                .f64_histogram("dramaturg.llm.latency")
                .with_unit("s")
                .with_description("Provider call latency")
                .build(),
            tokens: meter
                .u64_counter("dramaturg.llm.tokens")
                .with_description("Tokens billed, split by direction")
                .build(),
        }
    }

    /// The process-wide instance.
    pub fn get() -> &'static Self {
        METRICS.get_or_init(Self::init)
    }

    /// Records a call that produced a response.
    pub fn record_success(
        &self,
        provider: &'static str,
        model: &str,
        elapsed: Duration,
        usage: Option<TokenUsage>,
    ) {
        let labels = labels(provider, model);
        self.calls.add(1, &labels);
        self.latency.record(elapsed.as_secs_f64(), &labels);
        if let Some(usage) = usage {
            for (direction, count) in [
                ("prompt", usage.prompt_tokens),
                ("completion", usage.completion_tokens),
            ] {
                let mut tagged = labels.to_vec();
                tagged.push(KeyValue::new("direction", direction));
                self.tokens.add(count, &tagged);
            }
        }
    }

    /// Records a failed call under its error class.
    pub fn record_failure(&self, provider: &'static str, model: &str, kind: &ProviderErrorKind) {
        let mut labels = labels(provider, model).to_vec();
        labels.push(KeyValue::new("error_class", classify_error(kind)));
        self.failures.add(1, &labels);
    }
}

fn labels(provider: &'static str, model: &str) -> [KeyValue; 2] {
    [
        KeyValue::new("provider", provider),
        KeyValue::new("model", model.to_string()),
    ]
}

/// Error class used as a metrics label.
///
/// One of `rate_limit`, `auth`, `timeout`, `server`, `bad_request`,
/// `network`, `bad_response` or `config`.
pub fn classify_error(kind: &ProviderErrorKind) -> &'static str {
    match kind {
        ProviderErrorKind::HttpStatus { status_code, .. } => match *status_code {
            429 => "rate_limit",
            401 | 403 => "auth",
            408 => "timeout",
            500..=599 => "server",
            _ => "bad_request",
        },
        ProviderErrorKind::Network(_) => "network",
        ProviderErrorKind::Timeout => "timeout",
        ProviderErrorKind::InvalidResponse(_) => "bad_response",
        ProviderErrorKind::MissingApiKey(_)
        | ProviderErrorKind::UnsupportedProvider(_)
        | ProviderErrorKind::ClientCreation(_) => "config",
    }
}
