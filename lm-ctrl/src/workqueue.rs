use std::collections::{
    HashSet,
    VecDeque,
};
use std::future::Future;
use std::hash::Hash;
use std::sync::{
    Arc,
    Mutex,
    MutexGuard,
};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinSet;
use tracing::*;

struct QueueState<K> {
    pending: VecDeque<K>,
    queued: HashSet<K>,
    processing: HashSet<K>,
    // keys that were added again while a worker held them
    dirty: HashSet<K>,
    shut_down: bool,
}

impl<K> Default for QueueState<K> {
    fn default() -> Self {
        QueueState {
            pending: VecDeque::new(),
            queued: HashSet::new(),
            processing: HashSet::new(),
            dirty: HashSet::new(),
            shut_down: false,
        }
    }
}

// A work queue that never hands the same key to two workers at once.  Adding a key that is already
// waiting is a no-op; adding a key that is being processed marks it dirty, and it goes back on the
// queue (once) when the worker calls done().
pub struct KeyedQueue<K> {
    state: Arc<Mutex<QueueState<K>>>,
    notify: Arc<Notify>,
}

impl<K> Clone for KeyedQueue<K> {
    fn clone(&self) -> Self {
        KeyedQueue { state: self.state.clone(), notify: self.notify.clone() }
    }
}

impl<K> Default for KeyedQueue<K> {
    fn default() -> Self {
        KeyedQueue { state: Default::default(), notify: Arc::new(Notify::new()) }
    }
}

impl<K: Clone + Eq + Hash + Send + Sync + 'static> KeyedQueue<K> {
    pub fn new() -> KeyedQueue<K> {
        Default::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<K>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add(&self, key: K) {
        let mut state = self.lock();
        if state.shut_down || state.queued.contains(&key) {
            return;
        }
        if state.processing.contains(&key) {
            state.dirty.insert(key);
            return;
        }
        state.queued.insert(key.clone());
        state.pending.push_back(key);
        drop(state);
        self.notify.notify_one();
    }

    pub fn add_after(&self, key: K, delay: Duration) {
        if delay.is_zero() {
            self.add(key);
            return;
        }
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(key);
        });
    }

    // Waits for the next key; returns None once the queue is shut down and drained
    pub async fn get(&self) -> Option<K> {
        loop {
            let notified = self.notify.notified();
            {
                let mut state = self.lock();
                if let Some(key) = state.pending.pop_front() {
                    state.queued.remove(&key);
                    state.processing.insert(key.clone());
                    return Some(key);
                }
                if state.shut_down {
                    return None;
                }
            }
            notified.await;
        }
    }

    pub fn done(&self, key: &K) {
        let mut state = self.lock();
        state.processing.remove(key);
        if state.dirty.remove(key) && !state.shut_down {
            state.queued.insert(key.clone());
            state.pending.push_back(key.clone());
            drop(state);
            self.notify.notify_one();
        }
    }

    pub fn shut_down(&self) {
        self.lock().shut_down = true;
        self.notify.notify_waiters();
    }

    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Runs `workers` tasks pulling from the queue until it's shut down.  The handler returns how
    // long to wait before looking at the key again, if at all.
    pub async fn run<F, Fut>(&self, workers: usize, handler: F)
    where
        F: Fn(K) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Option<Duration>> + Send + 'static,
    {
        let mut js = JoinSet::new();
        for id in 0..workers.max(1) {
            let queue = self.clone();
            let handler = handler.clone();
            js.spawn(async move {
                while let Some(key) = queue.get().await {
                    if let Some(delay) = handler(key.clone()).await {
                        queue.add_after(key.clone(), delay);
                    }
                    queue.done(&key);
                }
                debug!("queue worker {id} exiting");
            });
        }
        while let Some(res) = js.join_next().await {
            if let Err(err) = res {
                error!("queue worker failed: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{
        AtomicUsize,
        Ordering,
    };

    use rstest::*;

    use super::*;

    #[rstest]
    #[tokio::test]
    async fn test_add_dedups_pending() {
        let q = KeyedQueue::new();
        q.add("a");
        q.add("a");
        q.add("b");
        assert_eq!(q.len(), 2);
        assert_eq!(q.get().await, Some("a"));
        assert_eq!(q.get().await, Some("b"));
        assert!(q.is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn test_readd_while_processing() {
        let q = KeyedQueue::new();
        q.add("a");
        let key = q.get().await.unwrap();

        // not handed out again while held, and only requeued once
        q.add("a");
        q.add("a");
        assert!(q.is_empty());

        q.done(&key);
        assert_eq!(q.len(), 1);
        assert_eq!(q.get().await, Some("a"));
        q.done(&"a");
        assert!(q.is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn test_shut_down_wakes_waiters() {
        let q: KeyedQueue<&str> = KeyedQueue::new();
        let waiter = {
            let q = q.clone();
            tokio::spawn(async move { q.get().await })
        };
        tokio::task::yield_now().await;
        q.shut_down();
        assert_eq!(waiter.await.unwrap(), None);

        q.add("a");
        assert!(q.is_empty());
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn test_add_after() {
        let q = KeyedQueue::new();
        q.add_after("a", Duration::from_secs(10));
        tokio::task::yield_now().await;
        assert!(q.is_empty());

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(q.len(), 1);
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_run_single_flight_per_key() {
        let q = KeyedQueue::new();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));

        let handler = {
            let (in_flight, max_in_flight, calls) = (in_flight.clone(), max_in_flight.clone(), calls.clone());
            let q = q.clone();
            move |_key: &'static str| {
                let (in_flight, max_in_flight, calls, q) =
                    (in_flight.clone(), max_in_flight.clone(), calls.clone(), q.clone());
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_in_flight.fetch_max(now, Ordering::SeqCst);
                    // somebody else asks for the same key mid-reconcile
                    q.add("kyma");
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    if calls.fetch_add(1, Ordering::SeqCst) >= 3 {
                        q.shut_down();
                    }
                    None
                }
            }
        };

        q.add("kyma");
        q.run(4, handler).await;

        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
