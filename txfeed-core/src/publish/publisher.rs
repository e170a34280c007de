//! Batched publish with backoff.
//!
//! Records are buffered in dataset order; whenever the buffer reaches the
//! batch size it is wrapped in a `BatchEnvelope` and posted. A trailing
//! partial batch is flushed at the end.
//!
//! Each batch goes `Pending → Sending` and then one of:
//! - `Success` (status 200): the next batch starts.
//! - `Retrying` (any other status): wait `retry * backoff_step` and resend.
//! - `Aborted`: retries exhausted, or the request failed at transport level.
//!   The error is returned and nothing further is sent.

use super::bridge::Bridge;
use super::envelope::BatchEnvelope;
use super::error::PublishError;
use super::progress::PublishProgress;
use super::retry::{RetryPolicy, Sleeper};
use crate::record::{Dataset, Record};
use serde::Serialize;
use tracing::debug;

/// Status code the bridge returns for an accepted batch.
const STATUS_OK: u16 = 200;

/// Options for a publish run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishOptions {
    /// Records per POST.
    pub batch_size: usize,
    pub retry: RetryPolicy,
    /// Only consider the first `limit` records.
    pub limit: Option<usize>,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            batch_size: 100,
            retry: RetryPolicy::default(),
            limit: None,
        }
    }
}

/// Summary of a completed publish run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Delivered {
    pub batches: usize,
    pub records: usize,
    /// Resends across all batches.
    pub retries: u32,
}

/// Publish `dataset` to `bridge` in batches of `opts.batch_size`.
pub fn publish_dataset(
    bridge: &dyn Bridge,
    dataset: &Dataset,
    opts: &PublishOptions,
    sleeper: &dyn Sleeper,
    progress: &dyn PublishProgress,
) -> Result<Delivered, PublishError> {
    if opts.batch_size == 0 {
        return Err(PublishError::InvalidBatchSize);
    }

    let total = opts.limit.map_or(dataset.len(), |n| n.min(dataset.len()));
    debug!(endpoint = bridge.endpoint(), total, batch_size = opts.batch_size, "publishing");

    let mut sender = BatchSender {
        bridge,
        policy: opts.retry,
        sleeper,
        progress,
        total,
        delivered: Delivered::default(),
    };

    let mut buffer: Vec<Record<'_>> = Vec::with_capacity(opts.batch_size.min(total.max(1)));
    for record in dataset.records().take(total) {
        buffer.push(record);
        if buffer.len() == opts.batch_size {
            sender.send(&buffer)?;
            buffer.clear();
        }
    }
    if !buffer.is_empty() {
        sender.send(&buffer)?;
    }

    Ok(sender.delivered)
}

struct BatchSender<'a> {
    bridge: &'a dyn Bridge,
    policy: RetryPolicy,
    sleeper: &'a dyn Sleeper,
    progress: &'a dyn PublishProgress,
    total: usize,
    delivered: Delivered,
}

impl BatchSender<'_> {
    fn send(&mut self, records: &[Record<'_>]) -> Result<(), PublishError> {
        let batch = self.delivered.batches;
        let body = BatchEnvelope::from_records(records.iter().copied())?.to_body()?;

        let mut retry = 0u32;
        loop {
            match self.bridge.post(&body) {
                Ok(STATUS_OK) => break,
                Ok(status) => {
                    retry += 1;
                    if retry > self.policy.max_retries {
                        return Err(self.abort(PublishError::Exhausted {
                            batch,
                            retries: self.policy.max_retries,
                            last_status: status,
                        }));
                    }
                    let delay = self.policy.delay(retry);
                    debug!(batch, status, "bridge rejected batch");
                    self.sleeper.sleep(delay);
                    self.progress
                        .on_backoff(batch, retry, self.policy.max_retries, delay);
                }
                Err(e) => {
                    return Err(self.abort(PublishError::Transport {
                        batch,
                        reason: e.to_string(),
                    }));
                }
            }
        }

        self.delivered.batches += 1;
        self.delivered.records += records.len();
        self.delivered.retries += retry;
        self.progress
            .on_delivered(batch, self.delivered.records, self.total);
        Ok(())
    }

    fn abort(&self, error: PublishError) -> PublishError {
        self.progress.on_abort(&error);
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::bridge::TransportError;
    use crate::publish::progress::LogProgress;
    use crate::record::FieldValue;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Bridge that answers from a script, then 200 forever.
    struct ScriptedBridge {
        script: Mutex<VecDeque<Result<u16, TransportError>>>,
        bodies: Mutex<Vec<Vec<u8>>>,
    }

    impl ScriptedBridge {
        fn new(script: Vec<Result<u16, TransportError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                bodies: Mutex::new(Vec::new()),
            }
        }

        fn posts(&self) -> usize {
            self.bodies.lock().unwrap().len()
        }

        fn batch_ids(&self) -> Vec<Vec<i64>> {
            self.bodies
                .lock()
                .unwrap()
                .iter()
                .map(|body| {
                    let envelope: BatchEnvelope = serde_json::from_slice(body).unwrap();
                    envelope
                        .records
                        .iter()
                        .map(|r| {
                            let v: serde_json::Value = serde_json::from_str(&r.value).unwrap();
                            v["TRANSACTION_ID"].as_i64().unwrap()
                        })
                        .collect()
                })
                .collect()
        }
    }

    impl Bridge for ScriptedBridge {
        fn endpoint(&self) -> &str {
            "http://bridge.test/topics/tx-sim"
        }

        fn post(&self, body: &[u8]) -> Result<u16, TransportError> {
            self.bodies.lock().unwrap().push(body.to_vec());
            self.script.lock().unwrap().pop_front().unwrap_or(Ok(200))
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        delays: Mutex<Vec<Duration>>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, delay: Duration) {
            self.delays.lock().unwrap().push(delay);
        }
    }

    impl RecordingSleeper {
        fn secs(&self) -> Vec<u64> {
            self.delays.lock().unwrap().iter().map(|d| d.as_secs()).collect()
        }
    }

    fn dataset(n: i64) -> Dataset {
        let mut ds = Dataset::new(vec!["TRANSACTION_ID".into(), "TX_AMOUNT".into()]);
        for id in 0..n {
            ds.push_row(vec![FieldValue::Int(id), FieldValue::Float(id as f64 * 1.5)])
                .unwrap();
        }
        ds
    }

    fn opts(batch_size: usize) -> PublishOptions {
        PublishOptions {
            batch_size,
            ..PublishOptions::default()
        }
    }

    #[test]
    fn even_batches() {
        let bridge = ScriptedBridge::new(vec![]);
        let sleeper = RecordingSleeper::default();

        let delivered =
            publish_dataset(&bridge, &dataset(20), &opts(5), &sleeper, &LogProgress).unwrap();

        assert_eq!(delivered.batches, 4);
        assert_eq!(delivered.records, 20);
        assert_eq!(bridge.batch_ids()[1], vec![5, 6, 7, 8, 9]);
        assert!(sleeper.secs().is_empty());
    }

    #[test]
    fn trailing_partial_batch_is_flushed() {
        let bridge = ScriptedBridge::new(vec![]);
        let sleeper = RecordingSleeper::default();

        let delivered =
            publish_dataset(&bridge, &dataset(7), &opts(3), &sleeper, &LogProgress).unwrap();

        assert_eq!(delivered.batches, 3);
        assert_eq!(bridge.batch_ids(), vec![vec![0, 1, 2], vec![3, 4, 5], vec![6]]);
    }

    #[test]
    fn empty_dataset_sends_nothing() {
        let bridge = ScriptedBridge::new(vec![]);
        let delivered = publish_dataset(
            &bridge,
            &dataset(0),
            &opts(10),
            &RecordingSleeper::default(),
            &LogProgress,
        )
        .unwrap();

        assert_eq!(delivered, Delivered::default());
        assert_eq!(bridge.posts(), 0);
    }

    #[test]
    fn recovers_after_three_rejections() {
        let bridge = ScriptedBridge::new(vec![Ok(503), Ok(429), Ok(500)]);
        let sleeper = RecordingSleeper::default();

        let delivered =
            publish_dataset(&bridge, &dataset(4), &opts(4), &sleeper, &LogProgress).unwrap();

        assert_eq!(delivered.retries, 3);
        assert_eq!(delivered.batches, 1);
        assert_eq!(bridge.posts(), 4);
        assert_eq!(sleeper.secs(), vec![2, 4, 6]);
        // every attempt resends the same batch
        let ids = bridge.batch_ids();
        assert!(ids.iter().all(|b| b == &ids[0]));
    }

    #[test]
    fn aborts_after_five_retries() {
        let bridge = ScriptedBridge::new(vec![Ok(503); 10]);
        let sleeper = RecordingSleeper::default();

        let err = publish_dataset(&bridge, &dataset(10), &opts(5), &sleeper, &LogProgress)
            .unwrap_err();

        match err {
            PublishError::Exhausted {
                batch,
                retries,
                last_status,
            } => {
                assert_eq!(batch, 0);
                assert_eq!(retries, 5);
                assert_eq!(last_status, 503);
            }
            other => panic!("expected Exhausted, got {other}"),
        }
        // initial attempt + 5 resends, second batch never sent
        assert_eq!(bridge.posts(), 6);
        assert_eq!(sleeper.secs(), vec![2, 4, 6, 8, 10]);
    }

    #[test]
    fn later_batch_exhaustion_stops_the_run() {
        let mut script = vec![Ok(200)];
        script.extend(std::iter::repeat(Ok(502)).take(6));
        let bridge = ScriptedBridge::new(script);

        let err = publish_dataset(
            &bridge,
            &dataset(15),
            &opts(5),
            &RecordingSleeper::default(),
            &LogProgress,
        )
        .unwrap_err();

        assert!(matches!(err, PublishError::Exhausted { batch: 1, .. }));
        assert_eq!(bridge.posts(), 7);
    }

    #[test]
    fn transport_failure_aborts_without_retry() {
        let bridge = ScriptedBridge::new(vec![Err(TransportError("connection refused".into()))]);
        let sleeper = RecordingSleeper::default();

        let err = publish_dataset(&bridge, &dataset(10), &opts(5), &sleeper, &LogProgress)
            .unwrap_err();

        assert!(matches!(err, PublishError::Transport { batch: 0, .. }));
        assert_eq!(bridge.posts(), 1);
        assert!(sleeper.secs().is_empty());
    }

    #[test]
    fn limit_caps_records() {
        let bridge = ScriptedBridge::new(vec![]);
        let options = PublishOptions {
            batch_size: 2,
            limit: Some(3),
            ..PublishOptions::default()
        };

        let delivered = publish_dataset(
            &bridge,
            &dataset(10),
            &options,
            &RecordingSleeper::default(),
            &LogProgress,
        )
        .unwrap();

        assert_eq!(delivered.records, 3);
        assert_eq!(bridge.batch_ids(), vec![vec![0, 1], vec![2]]);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let bridge = ScriptedBridge::new(vec![]);
        let err = publish_dataset(
            &bridge,
            &dataset(3),
            &opts(0),
            &RecordingSleeper::default(),
            &LogProgress,
        )
        .unwrap_err();

        assert!(matches!(err, PublishError::InvalidBatchSize));
        assert_eq!(bridge.posts(), 0);
    }

    #[test]
    fn only_200_counts_as_success() {
        let bridge = ScriptedBridge::new(vec![Ok(201), Ok(204)]);
        let sleeper = RecordingSleeper::default();

        let delivered =
            publish_dataset(&bridge, &dataset(1), &opts(1), &sleeper, &LogProgress).unwrap();

        assert_eq!(delivered.retries, 2);
        assert_eq!(sleeper.secs(), vec![2, 4]);
    }
}
