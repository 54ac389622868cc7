//! Per-resource write serialization.
//!
//! Every key (a normalized absolute path) owns a FIFO chain of completion
//! signals. A task joins the tail of its key's chain when it is submitted and
//! starts only after every earlier task on that key has finished, whatever
//! the outcome. Tasks under different keys never wait on each other.
//!
//! Submission happens synchronously inside [`KeyedSerializer::run`], before
//! the returned future is first polled, so callers that spawn the future
//! still get their tasks ordered by call order.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Tail of one key's chain.
struct Slot {
    generation: u64,
    /// Fires (by being dropped) when the tail task releases the key.
    released: oneshot::Receiver<()>,
}

#[derive(Default)]
struct Slots {
    next_generation: u64,
    tails: HashMap<PathBuf, Slot>,
}

/// A key held (or queued for) by one task.
struct Held {
    key: PathBuf,
    generation: u64,
    _release: oneshot::Sender<()>,
}

/// Queue position of a submitted task. Dropping it releases its keys.
struct Ticket {
    slots: Arc<Mutex<Slots>>,
    held: Vec<Held>,
    /// Predecessors still running, one per contended key.
    waiting: Vec<oneshot::Receiver<()>>,
}

impl Ticket {
    async fn acquire(&mut self) {
        while let Some(prev) = self.waiting.last_mut() {
            // Sender dropped means the predecessor finished, successfully or not.
            let _ = prev.await;
            self.waiting.pop();
        }
    }
}

fn release(slots: &Mutex<Slots>, held: Vec<Held>) {
    let mut slots = slots.lock();
    for h in held {
        if slots
            .tails
            .get(&h.key)
            .is_some_and(|tail| tail.generation == h.generation)
        {
            slots.tails.remove(&h.key);
        }
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        let held = std::mem::take(&mut self.held);
        let waiting = std::mem::take(&mut self.waiting);
        if waiting.is_empty() {
            release(&self.slots, held);
            return;
        }

        // Cancelled while queued: successors must still wait for our
        // predecessors, so hand the release over to a background task.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let slots = self.slots.clone();
                handle.spawn(async move {
                    for prev in waiting {
                        let _ = prev.await;
                    }
                    release(&slots, held);
                });
            }
            Err(_) => {
                log::warn!("serializer ticket dropped outside a runtime, releasing early");
                release(&self.slots, held);
            }
        }
    }
}

/// Runs async tasks so that at most one task per resource key is in flight.
#[derive(Clone, Default)]
pub struct KeyedSerializer {
    slots: Arc<Mutex<Slots>>,
}

impl KeyedSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    fn enqueue(&self, keys: Vec<PathBuf>) -> Ticket {
        let mut keys: Vec<PathBuf> = keys.iter().map(|k| normalize_key(k)).collect();
        keys.sort();
        keys.dedup();

        let mut slots = self.slots.lock();
        let mut held = Vec::with_capacity(keys.len());
        let mut waiting = Vec::new();
        for key in keys {
            let generation = slots.next_generation;
            slots.next_generation += 1;
            let (tx, rx) = oneshot::channel();
            let prev = slots.tails.insert(
                key.clone(),
                Slot {
                    generation,
                    released: rx,
                },
            );
            if let Some(prev) = prev {
                waiting.push(prev.released);
            }
            held.push(Held {
                key,
                generation,
                _release: tx,
            });
        }
        drop(slots);

        Ticket {
            slots: self.slots.clone(),
            held,
            waiting,
        }
    }

    /// Queue `task` behind every earlier task on `key`.
    pub fn run<K, F, Fut, T>(
        &self,
        key: K,
        task: F,
    ) -> impl Future<Output = T> + Send + 'static + use<K, F, Fut, T>
    where
        K: AsRef<Path>,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.run_all([key.as_ref().to_path_buf()], task)
    }

    /// Queue `task` behind every earlier task on any of `keys`.
    ///
    /// Keys are normalized, sorted and de-duplicated, and all of them are
    /// claimed in one atomic step, so overlapping multi-key tasks cannot
    /// deadlock.
    pub fn run_all<I, F, Fut, T>(
        &self,
        keys: I,
        task: F,
    ) -> impl Future<Output = T> + Send + 'static + use<I, F, Fut, T>
    where
        I: IntoIterator,
        I::Item: AsRef<Path>,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let keys: Vec<PathBuf> = keys.into_iter().map(|k| k.as_ref().to_path_buf()).collect();
        let mut ticket = self.enqueue(keys);
        async move {
            ticket.acquire().await;
            let out = task().await;
            drop(ticket);
            out
        }
    }

    /// Number of keys with a queued or running task.
    pub fn active_keys(&self) -> usize {
        self.slots.lock().tails.len()
    }
}

/// Lexically normalize `path` to an absolute path, so that different
/// spellings of the same resource share one key.
pub fn normalize_key(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::{Instant, sleep};

    #[test]
    fn keys_are_normalized() {
        assert_eq!(
            normalize_key(Path::new("/data/canvases/./Moodboard/../Moodboard/canvas.json")),
            PathBuf::from("/data/canvases/Moodboard/canvas.json")
        );
        assert!(normalize_key(Path::new("relative/file.json")).is_absolute());
    }

    #[tokio::test(start_paused = true)]
    async fn same_key_runs_in_submission_order() {
        let serializer = KeyedSerializer::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let in_flight = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for i in 0..5u64 {
            let log = log.clone();
            let in_flight = in_flight.clone();
            handles.push(tokio::spawn(serializer.run("/k/file.json", move || async move {
                assert_eq!(in_flight.fetch_add(1, Ordering::SeqCst), 0, "overlapping tasks");
                // Earlier tasks take longer.
                sleep(Duration::from_millis(50 * (5 - i))).await;
                log.lock().push(i);
                in_flight.fetch_sub(1, Ordering::SeqCst);
            })));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(*log.lock(), vec![0, 1, 2, 3, 4]);
        assert_eq!(serializer.active_keys(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn distinct_keys_do_not_block_each_other() {
        let serializer = KeyedSerializer::new();
        let start = Instant::now();

        let slow = tokio::spawn(serializer.run("/k/slow", || sleep(Duration::from_secs(10))));
        let fast = serializer.run("/k/fast", || async { Instant::now() });

        let finished = fast.await;
        assert!(finished - start < Duration::from_secs(1));
        slow.await.unwrap();
    }

    #[tokio::test]
    async fn failure_does_not_poison_key() {
        let serializer = KeyedSerializer::new();
        let first = serializer.run("/k/x", || async { Err::<u32, &str>("disk full") });
        let second = serializer.run("/k/x", || async { Ok::<u32, &str>(7) });
        assert_eq!(first.await, Err("disk full"));
        assert_eq!(second.await, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn equivalent_spellings_share_a_key() {
        let serializer = KeyedSerializer::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let a = {
            let log = log.clone();
            tokio::spawn(serializer.run("/root/c/canvas.json", move || async move {
                sleep(Duration::from_millis(100)).await;
                log.lock().push("a");
            }))
        };
        let b = {
            let log = log.clone();
            tokio::spawn(serializer.run("/root/c/./sub/../canvas.json", move || async move {
                log.lock().push("b");
            }))
        };
        a.await.unwrap();
        b.await.unwrap();
        assert_eq!(*log.lock(), vec!["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn multi_key_waits_for_every_key() {
        let serializer = KeyedSerializer::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let on_old = {
            let log = log.clone();
            tokio::spawn(serializer.run("/c/old", move || async move {
                sleep(Duration::from_millis(200)).await;
                log.lock().push("save old");
            }))
        };
        let rename = {
            let log = log.clone();
            // Duplicate and unsorted keys are fine.
            tokio::spawn(serializer.run_all(["/c/new", "/c/old", "/c/new"], move || async move {
                log.lock().push("rename");
            }))
        };
        let on_new = {
            let log = log.clone();
            tokio::spawn(serializer.run("/c/new", move || async move {
                log.lock().push("save new");
            }))
        };

        for h in [on_old, rename, on_new] {
            h.await.unwrap();
        }
        assert_eq!(*log.lock(), vec!["save old", "rename", "save new"]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_waiter_keeps_order() {
        let serializer = KeyedSerializer::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let first = {
            let log = log.clone();
            tokio::spawn(serializer.run("/k/c", move || async move {
                sleep(Duration::from_millis(100)).await;
                log.lock().push("first");
            }))
        };
        // Queued, then dropped without ever running.
        drop(serializer.run("/k/c", || async {}));
        let third = {
            let log = log.clone();
            tokio::spawn(serializer.run("/k/c", move || async move {
                log.lock().push("third");
            }))
        };

        first.await.unwrap();
        third.await.unwrap();
        assert_eq!(*log.lock(), vec!["first", "third"]);
    }
}
