use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("ollamachat.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter =
    Counter::new("ollamachat.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("ollamachat.client.request_duration_seconds");

pub(crate) static STREAM_FRAGMENTS: Counter = Counter::new("ollamachat.stream.fragments");
pub(crate) static STREAM_SKIPPED_LINES: Counter = Counter::new("ollamachat.stream.skipped_lines");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("ollamachat.stream.errors");
pub(crate) static STREAM_BYTES: Counter = Counter::new("ollamachat.stream.bytes");
pub(crate) static STREAM_DURATION: Moments = Moments::new("ollamachat.stream.duration_seconds");

pub(crate) static CATALOG_FETCHES: Counter = Counter::new("ollamachat.catalog.fetches");
pub(crate) static CATALOG_HITS: Counter = Counter::new("ollamachat.catalog.hits");
pub(crate) static CATALOG_FALLBACKS: Counter = Counter::new("ollamachat.catalog.fallbacks");

pub(crate) static SESSION_TURNS: Counter = Counter::new("ollamachat.session.turns");
pub(crate) static SESSION_FAILED_TURNS: Counter = Counter::new("ollamachat.session.failed_turns");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_FRAGMENTS);
    collector.register_counter(&STREAM_SKIPPED_LINES);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&CATALOG_FETCHES);
    collector.register_counter(&CATALOG_HITS);
    collector.register_counter(&CATALOG_FALLBACKS);

    collector.register_counter(&SESSION_TURNS);
    collector.register_counter(&SESSION_FAILED_TURNS);
}
