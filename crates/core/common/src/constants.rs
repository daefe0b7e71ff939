//! Shared constants

/// Name of the durable topic exchange every event is routed through
pub const DEFAULT_EXCHANGE_NAME: &str = "events_exchange";

/// Suffix appended to an event type to form its durable queue name
pub const QUEUE_SUFFIX: &str = "_queue";

/// Marker value stored against a processed event id
pub const PROCESSED_MARKER: &str = "processed";

/// Idempotency record lifetime (30 days)
pub const IDEMPOTENCY_TTL_SECS: u64 = 2_592_000;

/// Content type of every published event body
pub const EVENT_CONTENT_TYPE: &str = "application/json";

/// AMQP delivery mode for persistent messages
pub const PERSISTENT_DELIVERY_MODE: u8 = 2;

/// Default request timeout for outbound HTTP calls
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default number of attempts per logical request
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default backoff before the first retry
pub const DEFAULT_BACKOFF_START_MS: u64 = 1_000;

/// Upper bound on a single backoff sleep
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Window the outbound rate limit is expressed against
pub const DEFAULT_RATE_INTERVAL_SECS: u64 = 60;

/// EODHD allows 1000 calls per minute on the standard plan
pub const EODHD_RATE_LIMIT: u32 = 1_000;

/// Default EODHD API root
pub const EODHD_BASE_URL: &str = "https://eodhd.com/api";

/// Default interval between scheduled instrument updates
pub const DEFAULT_UPDATE_INTERVAL_HOURS: u64 = 24;

/// Seconds per hour
pub const SECS_PER_HOUR: u64 = 3_600;
