//! Fault injection for message stores.
//!
//! [`FaultyStore`] wraps any [`MessageStore`] and fails selected calls
//! before they reach the inner store. Failures are either scripted per
//! operation (the next N `edit_message` calls return `Forbidden`) or drawn
//! at a fixed rate from a seeded RNG, so a failing run can be replayed from
//! its seed.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;
use turnslot_core::{Control, MessageId, SurfaceId};
use turnslot_server::{ActionEvent, Message, MessageStore, StoreError, SubSurface};

/// Store operations that can be failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    /// `fetch_message`
    Fetch,
    /// `send_message`
    Send,
    /// `edit_message`
    Edit,
    /// `delete_message`
    Delete,
    /// `recent_messages`
    Recent,
    /// `create_sub_surface`
    CreateSubSurface,
    /// `list_sub_surfaces`
    ListSubSurfaces,
    /// `acknowledge`
    Acknowledge,
}

#[derive(Debug)]
struct Faults {
    scripted: HashMap<StoreOp, VecDeque<StoreError>>,
    transient_rate: f64,
    rng: ChaCha8Rng,
    calls: HashMap<StoreOp, usize>,
    injected: usize,
}

/// [`MessageStore`] wrapper that injects failures.
#[derive(Debug)]
pub struct FaultyStore<S> {
    inner: Arc<S>,
    faults: Mutex<Faults>,
}

impl<S: MessageStore> FaultyStore<S> {
    /// Wrap `inner` with no faults configured.
    pub fn new(inner: Arc<S>) -> Self {
        Self::with_seed(inner, 0)
    }

    /// Wrap `inner`, seeding the RNG used for random transient failures.
    pub fn with_seed(inner: Arc<S>, seed: u64) -> Self {
        Self {
            inner,
            faults: Mutex::new(Faults {
                scripted: HashMap::new(),
                transient_rate: 0.0,
                rng: ChaCha8Rng::seed_from_u64(seed),
                calls: HashMap::new(),
                injected: 0,
            }),
        }
    }

    /// The wrapped store.
    pub fn inner(&self) -> &Arc<S> {
        &self.inner
    }

    /// Fail the next call of `op` with `error`. Calls queue up in order.
    pub fn fail_next(&self, op: StoreOp, error: StoreError) {
        self.lock().scripted.entry(op).or_default().push_back(error);
    }

    /// Fail the next `count` calls of `op` with `error`.
    pub fn fail_times(&self, op: StoreOp, error: &StoreError, count: usize) {
        let mut faults = self.lock();
        let queue = faults.scripted.entry(op).or_default();
        queue.extend(std::iter::repeat_n(error.clone(), count));
    }

    /// Fail every call with probability `rate` using a transient error.
    pub fn set_transient_rate(&self, rate: f64) {
        self.lock().transient_rate = rate.clamp(0.0, 1.0);
    }

    /// Stop injecting anything.
    pub fn heal(&self) {
        let mut faults = self.lock();
        faults.scripted.clear();
        faults.transient_rate = 0.0;
    }

    /// Number of calls of `op` seen so far, failed or not.
    pub fn calls(&self, op: StoreOp) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Number of failures injected so far.
    pub fn injected(&self) -> usize {
        self.lock().injected
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self, op: StoreOp) -> Result<(), StoreError> {
        let mut faults = self.lock();
        *faults.calls.entry(op).or_insert(0) += 1;

        let scripted = faults.scripted.get_mut(&op).and_then(VecDeque::pop_front);
        let error = match scripted {
            Some(error) => Some(error),
            None => {
                let rate = faults.transient_rate;
                (rate > 0.0 && faults.rng.gen_bool(rate))
                    .then(|| StoreError::Transient("injected".into()))
            },
        };

        match error {
            Some(error) => {
                faults.injected += 1;
                debug!(?op, %error, "injecting store failure");
                Err(error)
            },
            None => Ok(()),
        }
    }
}

#[async_trait]
impl<S: MessageStore> MessageStore for FaultyStore<S> {
    async fn fetch_message(
        &self,
        surface: SurfaceId,
        id: MessageId,
    ) -> Result<Message, StoreError> {
        self.check(StoreOp::Fetch)?;
        self.inner.fetch_message(surface, id).await
    }

    async fn send_message(
        &self,
        surface: SurfaceId,
        content: &str,
        controls: &[Control],
    ) -> Result<Message, StoreError> {
        self.check(StoreOp::Send)?;
        self.inner.send_message(surface, content, controls).await
    }

    async fn edit_message(
        &self,
        surface: SurfaceId,
        id: MessageId,
        content: &str,
        controls: &[Control],
    ) -> Result<(), StoreError> {
        self.check(StoreOp::Edit)?;
        self.inner.edit_message(surface, id, content, controls).await
    }

    async fn delete_message(&self, surface: SurfaceId, id: MessageId) -> Result<(), StoreError> {
        self.check(StoreOp::Delete)?;
        self.inner.delete_message(surface, id).await
    }

    async fn recent_messages(
        &self,
        surface: SurfaceId,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError> {
        self.check(StoreOp::Recent)?;
        self.inner.recent_messages(surface, limit).await
    }

    async fn create_sub_surface(
        &self,
        parent: SurfaceId,
        name: &str,
    ) -> Result<SubSurface, StoreError> {
        self.check(StoreOp::CreateSubSurface)?;
        self.inner.create_sub_surface(parent, name).await
    }

    async fn list_sub_surfaces(&self, parent: SurfaceId) -> Result<Vec<SubSurface>, StoreError> {
        self.check(StoreOp::ListSubSurfaces)?;
        self.inner.list_sub_surfaces(parent).await
    }

    async fn acknowledge(&self, event: &ActionEvent) -> Result<(), StoreError> {
        self.check(StoreOp::Acknowledge)?;
        self.inner.acknowledge(event).await
    }
}
