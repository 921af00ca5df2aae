
use rand::Rng;

/// Inclusive range a chat's sticker threshold is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdRange {
    min: i64,
    max: i64,
}

impl ThresholdRange {
    /// Creates a range, or `None` unless `1 <= min <= max`.
    pub fn new(min: i64, max: i64) -> Option<Self> {
        (1 <= min && min <= max).then_some(Self { min, max })
    }

    /// Lower bound, inclusive.
    pub fn min(&self) -> i64 {
        self.min
    }

    /// Upper bound, inclusive.
    pub fn max(&self) -> i64 {
        self.max
    }

    fn sample(&self) -> i64 {
        rand::thread_rng().gen_range(self.min..=self.max)
    }
}

/// Per-chat message counter deciding when the chat gets its next sticker.
///
/// The count is signed: a mention refunds the message it was counted as, and
/// the refund is never clamped at zero.
#[derive(Debug, Clone)]
pub struct ChatState {
    message_count: i64,
    threshold: i64,
    range: ThresholdRange,
}

impl ChatState {
    /// Creates a fresh counter with a newly drawn threshold.
    pub fn new(range: ThresholdRange) -> Self {
        Self { message_count: 0, threshold: range.sample(), range }
    }

    /// Messages counted since the last sticker.
    pub fn message_count(&self) -> i64 {
        self.message_count
    }

    /// Count at which the next sticker is sent.
    pub fn threshold(&self) -> i64 {
        self.threshold
    }

    /// How many more messages the chat needs before the next sticker.
    pub fn messages_until_sticker(&self) -> i64 {
        self.threshold - self.message_count
    }

    /// Adds `offset` to the message count. Negative offsets are allowed.
    pub fn increment(&mut self, offset: i64) {
        self.message_count += offset;
    }

    /// Whether the count has reached the threshold.
    pub fn threshold_exceeded(&self) -> bool {
        self.message_count >= self.threshold
    }

    /// Zeroes the count and draws a new threshold.
    pub fn reset(&mut self) {
        self.message_count = 0;
        self.threshold = self.range.sample();
    }
}
