//! Periodic telemetry scheduling.
//!
//! Each device owns one scheduler, and each scheduler owns one worker
//! thread. Jobs are keyed by subject (the empty string for device-scoped
//! telemetry, an appId otherwise) and indexed twice: by next deadline for
//! the worker, by subject for update and delete. A freshly added job
//! fires immediately once, then every `interval`. Re-adding an existing
//! subject updates its interval in place without rescheduling the
//! pending deadline.
//!
//! The scheduler lock is not held while a sampler or the publish
//! callback runs, so samplers may call back into `add`/`remove`. A job
//! removed during its own callback is not re-inserted.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use dab_common::{DabError, Result, Value};

use crate::publish::PublishSlot;

/// Produces one telemetry sample per tick.
pub type Sampler = Box<dyn FnMut() -> Result<Value> + Send>;

/// Deadline key; the sequence number breaks ties between jobs that share
/// an instant.
type DeadlineKey = (Instant, u64);

struct JobSlot {
    topic: String,
    interval: Duration,
    /// Taken by the worker while the sampler runs.
    sampler: Option<Sampler>,
    deadline: Option<DeadlineKey>,
}

#[derive(Default)]
struct SchedulerState {
    jobs: HashMap<String, JobSlot>,
    deadlines: BTreeMap<DeadlineKey, String>,
    next_seq: u64,
    exiting: bool,
}

struct SchedulerInner {
    state: Mutex<SchedulerState>,
    wakeup: Condvar,
}

impl SchedulerInner {
    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Time-ordered set of recurring telemetry jobs with one worker thread.
pub struct TelemetryScheduler {
    inner: Arc<SchedulerInner>,
    worker: Option<thread::JoinHandle<()>>,
}

impl TelemetryScheduler {
    /// Create a scheduler and spawn its worker. Samples are delivered
    /// through `publish` as `{"topic":…,"payload":…}` envelopes.
    pub fn new(device_id: &str, publish: PublishSlot) -> Result<Self> {
        let inner = Arc::new(SchedulerInner {
            state: Mutex::new(SchedulerState::default()),
            wakeup: Condvar::new(),
        });
        let worker_inner = Arc::clone(&inner);
        let worker = thread::Builder::new()
            .name(format!("telemetry-{device_id}"))
            .spawn(move || worker_loop(worker_inner, publish))
            .map_err(|e| DabError::internal(format!("failed to spawn telemetry worker: {e}")))?;

        Ok(Self {
            inner,
            worker: Some(worker),
        })
    }

    /// Register a job, or update the interval of the job already
    /// registered under `subject`. New jobs fire immediately once.
    pub fn add(&self, interval: Duration, subject: &str, topic: String, sampler: Sampler) {
        let mut state = self.inner.lock();
        if let Some(slot) = state.jobs.get_mut(subject) {
            slot.interval = interval;
        } else {
            let key = (Instant::now(), state.next_seq);
            state.next_seq += 1;
            state.deadlines.insert(key, subject.to_owned());
            state.jobs.insert(
                subject.to_owned(),
                JobSlot {
                    topic,
                    interval,
                    sampler: Some(sampler),
                    deadline: Some(key),
                },
            );
        }
        drop(state);
        self.inner.wakeup.notify_all();
    }

    /// Remove the job registered under `subject`, if any.
    pub fn remove(&self, subject: &str) {
        let mut state = self.inner.lock();
        if let Some(slot) = state.jobs.remove(subject) {
            if let Some(key) = slot.deadline {
                state.deadlines.remove(&key);
            }
        }
        drop(state);
        self.inner.wakeup.notify_all();
    }

    /// Whether a job is registered under `subject`.
    pub fn contains(&self, subject: &str) -> bool {
        self.inner.lock().jobs.contains_key(subject)
    }
}

impl Drop for TelemetryScheduler {
    fn drop(&mut self) {
        {
            let mut state = self.inner.lock();
            state.exiting = true;
        }
        self.inner.wakeup.notify_all();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn worker_loop(inner: Arc<SchedulerInner>, publish: PublishSlot) {
    let mut state = inner.lock();
    loop {
        if state.exiting {
            break;
        }
        let next = state
            .deadlines
            .iter()
            .next()
            .map(|(key, subject)| (*key, subject.clone()));
        let Some((key, subject)) = next else {
            state = inner
                .wakeup
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
            continue;
        };

        let now = Instant::now();
        if key.0 > now {
            state = inner
                .wakeup
                .wait_timeout(state, key.0 - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|e| e.into_inner().0);
            continue;
        }

        state.deadlines.remove(&key);
        let Some(slot) = state.jobs.get_mut(&subject) else {
            continue;
        };
        slot.deadline = None;
        let mut sampler = slot.sampler.take();
        let topic = slot.topic.clone();

        // run the sampler and publish without holding the lock
        drop(state);
        if let Some(sample) = sampler.as_mut() {
            match sample() {
                Ok(payload) => {
                    let message = Value::from_literal(vec![
                        Value::pair("topic", topic.as_str()),
                        Value::pair("payload", payload),
                    ]);
                    if !publish.publish(&message) {
                        tracing::warn!(
                            topic = %topic,
                            "telemetry sample dropped, no publish callback installed"
                        );
                    }
                }
                Err(e) => {
                    tracing::warn!(topic = %topic, error = %e, "telemetry sampler failed");
                }
            }
        }
        state = inner.lock();

        // the job may have been removed while the sampler ran
        if state.jobs.contains_key(&subject) {
            let seq = state.next_seq;
            state.next_seq += 1;
            let slot = state.jobs.get_mut(&subject).unwrap();
            slot.sampler = sampler;
            let key = (Instant::now() + slot.interval, seq);
            slot.deadline = Some(key);
            state.deadlines.insert(key, subject);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    fn counting_publish() -> (PublishSlot, Arc<AtomicUsize>) {
        let slot = PublishSlot::default();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        slot.set(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        (slot, count)
    }

    fn constant_sampler() -> Sampler {
        Box::new(|| Ok(Value::pair("cpu", 1)))
    }

    #[test]
    fn test_job_fires_immediately_and_periodically() {
        let (publish, count) = counting_publish();
        let scheduler = TelemetryScheduler::new("t", publish).unwrap();

        scheduler.add(
            Duration::from_millis(50),
            "",
            "dab/t/device-telemetry/metrics".into(),
            constant_sampler(),
        );
        thread::sleep(Duration::from_millis(200));

        assert!(count.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn test_remove_stops_publishing() {
        let (publish, count) = counting_publish();
        let scheduler = TelemetryScheduler::new("t", publish).unwrap();

        scheduler.add(
            Duration::from_millis(20),
            "",
            "dab/t/device-telemetry/metrics".into(),
            constant_sampler(),
        );
        thread::sleep(Duration::from_millis(100));
        scheduler.remove("");
        // let an in-flight sampler drain before taking the baseline
        thread::sleep(Duration::from_millis(50));
        let settled = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(200));

        assert!(settled >= 1);
        assert_eq!(count.load(Ordering::SeqCst), settled);
        assert!(!scheduler.contains(""));
    }

    #[test]
    fn test_re_add_updates_interval_without_duplicating() {
        let (publish, _count) = counting_publish();
        let scheduler = TelemetryScheduler::new("t", publish).unwrap();

        scheduler.add(
            Duration::from_millis(10),
            "netflix",
            "dab/t/app-telemetry/metrics/netflix".into(),
            constant_sampler(),
        );
        scheduler.add(
            Duration::from_millis(10_000),
            "netflix",
            "dab/t/app-telemetry/metrics/netflix".into(),
            constant_sampler(),
        );

        // only one deadline may exist for the subject
        let state = scheduler.inner.lock();
        assert_eq!(state.jobs.len(), 1);
        assert!(state.deadlines.len() <= 1);
    }

    #[test]
    fn test_interval_change_takes_effect_after_next_fire() {
        let (publish, count) = counting_publish();
        let scheduler = TelemetryScheduler::new("t", publish).unwrap();

        scheduler.add(
            Duration::from_millis(10),
            "",
            "dab/t/device-telemetry/metrics".into(),
            constant_sampler(),
        );
        thread::sleep(Duration::from_millis(60));
        scheduler.add(
            Duration::from_millis(10_000),
            "",
            "dab/t/device-telemetry/metrics".into(),
            constant_sampler(),
        );
        thread::sleep(Duration::from_millis(50));
        let settled = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(200));

        // at most one further tick can land before the long interval applies
        assert!(count.load(Ordering::SeqCst) <= settled + 1);
    }

    #[test]
    fn test_sampler_error_keeps_job_alive() {
        let (publish, count) = counting_publish();
        let scheduler = TelemetryScheduler::new("t", publish).unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let call_counter = Arc::clone(&calls);
        scheduler.add(
            Duration::from_millis(20),
            "",
            "dab/t/device-telemetry/metrics".into(),
            Box::new(move || {
                let n = call_counter.fetch_add(1, Ordering::SeqCst);
                if n % 2 == 0 {
                    Err(DabError::internal("sensor offline"))
                } else {
                    Ok(Value::pair("cpu", 1))
                }
            }),
        );
        thread::sleep(Duration::from_millis(200));

        assert!(calls.load(Ordering::SeqCst) >= 3);
        assert!(count.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn test_publish_envelope_shape() {
        let slot = PublishSlot::default();
        let (tx, rx) = mpsc::channel();
        slot.set(Arc::new(move |message: &Value| {
            let _ = tx.send(message.clone());
        }));
        let scheduler = TelemetryScheduler::new("tv1", slot).unwrap();

        scheduler.add(
            Duration::from_millis(10_000),
            "",
            "dab/tv1/device-telemetry/metrics".into(),
            Box::new(|| Ok(Value::pair("memoryUsedBytes", 1024))),
        );

        let message = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(
            message.get("topic").unwrap().as_str().unwrap(),
            "dab/tv1/device-telemetry/metrics"
        );
        assert_eq!(
            message
                .get("payload")
                .unwrap()
                .get("memoryUsedBytes")
                .unwrap()
                .as_i64()
                .unwrap(),
            1024
        );
    }

    #[test]
    fn test_shutdown_joins_worker() {
        let (publish, _count) = counting_publish();
        let scheduler = TelemetryScheduler::new("t", publish).unwrap();
        scheduler.add(
            Duration::from_millis(5),
            "",
            "dab/t/device-telemetry/metrics".into(),
            constant_sampler(),
        );
        thread::sleep(Duration::from_millis(30));
        drop(scheduler);
    }
}
