//! Session-wide cache of requirements and their applications.
//!
//! Reads are answered from cache while fresh, served stale while a
//! background refresh runs once the freshness window lapses, and block on
//! the gateway only when an entry is missing or explicitly invalidated.
//! Concurrent reads of the same key share one in-flight fetch.
//!
//! Writes go through [`RollbackToken`]s handed out by the optimistic
//! methods. Those methods are crate-private: only the transition controller
//! mutates cached state.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::domain::{Application, ApplicationKey, OwnerId, Requirement, RequirementId};
use super::error::{NotFound, PipelineError, WriteTarget};
use super::gateway::{GatewayError, JobGateway};
use super::status::RequirementStatus;

pub const DEFAULT_FRESH_SECS: u64 = 300;
const EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// How long a fetched entry is served without a refresh.
    pub fresh_for: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            fresh_for: Duration::from_secs(DEFAULT_FRESH_SECS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ListKey {
    Owner(OwnerId),
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
    Requirement(RequirementId),
    /// The owner's list and the browse list.
    Owner(OwnerId),
    All,
}

/// Change notification delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    RequirementChanged(RequirementId),
    RequirementRemoved(RequirementId),
    ApplicationChanged(ApplicationKey),
    ListLoaded(ListKey),
    Invalidated(Invalidation),
    /// The subscriber fell behind and missed this many events.
    Lagged(u64),
}

/// Point-in-time copy of every cached requirement, ordered by id.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    requirements: Vec<Requirement>,
}

impl StoreSnapshot {
    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn requirement(&self, id: &RequirementId) -> Option<&Requirement> {
        self.requirements
            .iter()
            .find(|requirement| &requirement.id == id)
    }

    pub fn owned_by<'a>(&'a self, owner_id: &'a OwnerId) -> impl Iterator<Item = &'a Requirement> {
        self.requirements
            .iter()
            .filter(move |requirement| &requirement.owner_id == owner_id)
    }
}

/// Keeps a change callback alive; dropping it stops delivery.
#[derive(Debug)]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum FetchKey {
    Requirement(RequirementId),
    List(ListKey),
}

type FetchOutcome = Result<(), GatewayError>;

/// One gateway fetch and the write generation it started at.
struct Flight {
    sender: broadcast::Sender<FetchOutcome>,
    started: u64,
}

/// Result of installing a server snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Installed {
    Replaced,
    /// A local write landed after the fetch started; the cached value stays.
    Kept,
    Skipped,
}

impl Installed {
    fn is_member(self) -> bool {
        matches!(self, Self::Replaced | Self::Kept)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Freshness {
    Fresh,
    Stale,
    Invalidated,
}

fn freshness(fetched_at: Instant, invalidated: bool, window: Duration) -> Freshness {
    if invalidated {
        Freshness::Invalidated
    } else if fetched_at.elapsed() < window {
        Freshness::Fresh
    } else {
        Freshness::Stale
    }
}

struct Entry {
    requirement: Requirement,
    fetched_at: Instant,
    invalidated: bool,
}

struct ListEntry {
    ids: Vec<RequirementId>,
    fetched_at: Instant,
    invalidated: bool,
}

/// Requirement-level fields restored by a rollback.
#[derive(Debug)]
struct Header {
    title: String,
    status: RequirementStatus,
    capacity: NonZeroU32,
    deadline: Option<DateTime<Utc>>,
}

impl Header {
    fn capture(requirement: &Requirement) -> Self {
        Self {
            title: requirement.title.clone(),
            status: requirement.status,
            capacity: requirement.capacity,
            deadline: requirement.deadline,
        }
    }

    fn restore(self, requirement: &mut Requirement) {
        requirement.title = self.title;
        requirement.status = self.status;
        requirement.capacity = self.capacity;
        requirement.deadline = self.deadline;
    }
}

#[derive(Debug)]
enum Undo {
    Application {
        key: ApplicationKey,
        previous: Option<Application>,
    },
    Requirement {
        id: RequirementId,
        header: Header,
    },
    Removal {
        requirement: Box<Requirement>,
        memberships: Vec<(ListKey, usize)>,
    },
}

/// Pre-mutation state of one optimistic write. Consumed by exactly one of
/// `commit*` or `rollback`.
#[derive(Debug)]
#[must_use = "an optimistic write must be committed or rolled back"]
pub(crate) struct RollbackToken {
    target: WriteTarget,
    undo: Undo,
}

#[derive(Default)]
struct StoreState {
    requirements: HashMap<RequirementId, Entry>,
    lists: HashMap<ListKey, ListEntry>,
    in_flight: HashMap<FetchKey, Flight>,
    pending: HashSet<WriteTarget>,
    /// Bumped by every local write and invalidation.
    generation: u64,
    written: HashMap<RequirementId, u64>,
    lists_written: HashMap<ListKey, u64>,
    /// Generation of the last `Invalidation::All`.
    floor: u64,
}

impl StoreState {
    /// Marks a local write to `id` so fetches started earlier cannot
    /// overwrite it. Returns the new generation.
    fn stamp(&mut self, id: &RequirementId) -> u64 {
        self.generation += 1;
        self.written.insert(id.clone(), self.generation);
        self.generation
    }

    /// Frees a write slot and stamps the requirement it belongs to.
    fn release(&mut self, target: &WriteTarget) -> u64 {
        self.pending.remove(target);
        let id = match target {
            WriteTarget::Requirement(id) => id,
            WriteTarget::Application(key) => &key.requirement_id,
        };
        self.stamp(id)
    }

    fn stamp_list(&mut self, key: &ListKey) {
        self.generation += 1;
        self.lists_written.insert(key.clone(), self.generation);
    }

    fn requirement_written(&self, id: &RequirementId) -> u64 {
        self.written.get(id).copied().unwrap_or(0).max(self.floor)
    }

    fn list_written(&self, key: &ListKey) -> u64 {
        self.lists_written.get(key).copied().unwrap_or(0).max(self.floor)
    }

    fn written_at(&self, key: &FetchKey) -> u64 {
        match key {
            FetchKey::Requirement(id) => self.requirement_written(id),
            FetchKey::List(list) => self.list_written(list),
        }
    }

    /// Installs a server snapshot fetched at generation `started`. Anything
    /// under a pending optimistic write keeps its cached value, and so does
    /// an entry written locally after the fetch started. A requirement being
    /// deleted is skipped.
    fn install(&mut self, mut incoming: Requirement, now: Instant, started: u64) -> Installed {
        let id = incoming.id.clone();
        if self.requirement_written(&id) > started {
            return if self.requirements.contains_key(&id) {
                Installed::Kept
            } else {
                Installed::Skipped
            };
        }
        let header_pending = self.pending.contains(&WriteTarget::Requirement(id.clone()));

        let Some(entry) = self.requirements.get_mut(&id) else {
            if header_pending {
                return Installed::Skipped;
            }
            self.requirements.insert(
                id,
                Entry {
                    requirement: incoming,
                    fetched_at: now,
                    invalidated: false,
                },
            );
            return Installed::Replaced;
        };

        if header_pending {
            Header::capture(&entry.requirement).restore(&mut incoming);
        }

        for application in incoming.applications.iter_mut() {
            if self
                .pending
                .contains(&WriteTarget::Application(application.key()))
            {
                if let Some(cached) = entry.requirement.application(&application.applicant_id) {
                    *application = cached.clone();
                }
            }
        }
        for cached in &entry.requirement.applications {
            let in_flight_insert = self
                .pending
                .contains(&WriteTarget::Application(cached.key()))
                && incoming.application(&cached.applicant_id).is_none();
            if in_flight_insert {
                incoming.applications.push(cached.clone());
            }
        }

        entry.requirement = incoming;
        entry.fetched_at = now;
        entry.invalidated = false;
        Installed::Replaced
    }

    fn materialize(&self, ids: &[RequirementId]) -> Vec<Requirement> {
        ids.iter()
            .filter_map(|id| self.requirements.get(id))
            .map(|entry| entry.requirement.clone())
            .collect()
    }

    fn claim(&mut self, target: &WriteTarget) -> Result<(), PipelineError> {
        if self.pending.contains(target) {
            return Err(PipelineError::TransitionInProgress(target.clone()));
        }
        Ok(())
    }
}

struct StoreInner<G> {
    gateway: Arc<G>,
    config: StoreConfig,
    state: Mutex<StoreState>,
    events: broadcast::Sender<StoreEvent>,
}

/// Shared handle to the pipeline cache. Clones share the same state.
pub struct PipelineStore<G> {
    inner: Arc<StoreInner<G>>,
}

impl<G> Clone for PipelineStore<G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<G: JobGateway> PipelineStore<G> {
    pub fn new(gateway: Arc<G>, config: StoreConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            inner: Arc::new(StoreInner {
                gateway,
                config,
                state: Mutex::new(StoreState::default()),
                events,
            }),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub(crate) fn gateway(&self) -> Arc<G> {
        Arc::clone(&self.inner.gateway)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.events.subscribe()
    }

    /// Runs `callback` for every change until the returned handle is dropped.
    pub fn on_change<F>(&self, mut callback: F) -> Subscription
    where
        F: FnMut(StoreEvent) + Send + 'static,
    {
        let mut receiver = self.subscribe();
        let task = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => callback(event),
                    Err(RecvError::Lagged(skipped)) => callback(StoreEvent::Lagged(skipped)),
                    Err(RecvError::Closed) => break,
                }
            }
        });
        Subscription { task }
    }

    /// Cached requirement, without touching the gateway.
    pub fn peek(&self, id: &RequirementId) -> Option<Requirement> {
        self.inner
            .state
            .lock()
            .requirements
            .get(id)
            .map(|entry| entry.requirement.clone())
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.inner.state.lock();
        let mut requirements: Vec<Requirement> = state
            .requirements
            .values()
            .map(|entry| entry.requirement.clone())
            .collect();
        requirements.sort_by(|a, b| a.id.cmp(&b.id));
        StoreSnapshot { requirements }
    }

    pub async fn get(&self, id: &RequirementId) -> Result<Requirement, PipelineError> {
        let cached = {
            let state = self.inner.state.lock();
            state.requirements.get(id).map(|entry| {
                (
                    entry.requirement.clone(),
                    freshness(entry.fetched_at, entry.invalidated, self.inner.config.fresh_for),
                )
            })
        };

        match cached {
            Some((requirement, Freshness::Fresh)) => Ok(requirement),
            Some((requirement, Freshness::Stale)) => {
                self.refresh(FetchKey::Requirement(id.clone()));
                Ok(requirement)
            }
            Some((_, Freshness::Invalidated)) | None => {
                match self.load(FetchKey::Requirement(id.clone())).await {
                    Ok(()) => self
                        .peek(id)
                        .ok_or_else(|| NotFound::Requirement(id.clone()).into()),
                    Err(GatewayError::NotFound) => Err(NotFound::Requirement(id.clone()).into()),
                    Err(err) => Err(PipelineError::FetchFailed(err)),
                }
            }
        }
    }

    pub async fn list_by_owner(&self, owner_id: &OwnerId) -> Result<Vec<Requirement>, PipelineError> {
        self.list(ListKey::Owner(owner_id.clone())).await
    }

    /// Browse listing across all owners.
    pub async fn list_all(&self) -> Result<Vec<Requirement>, PipelineError> {
        self.list(ListKey::All).await
    }

    pub fn invalidate(&self, scope: Invalidation) {
        {
            let mut state = self.inner.state.lock();
            match &scope {
                Invalidation::Requirement(id) => {
                    state.stamp(id);
                    if let Some(entry) = state.requirements.get_mut(id) {
                        entry.invalidated = true;
                    }
                }
                Invalidation::Owner(owner_id) => {
                    for key in [ListKey::Owner(owner_id.clone()), ListKey::All] {
                        state.stamp_list(&key);
                        if let Some(list) = state.lists.get_mut(&key) {
                            list.invalidated = true;
                        }
                    }
                }
                Invalidation::All => {
                    state.generation += 1;
                    state.floor = state.generation;
                    for entry in state.requirements.values_mut() {
                        entry.invalidated = true;
                    }
                    for list in state.lists.values_mut() {
                        list.invalidated = true;
                    }
                }
            }
        }
        debug!(?scope, "cache invalidated");
        self.emit(StoreEvent::Invalidated(scope));
    }

    async fn list(&self, key: ListKey) -> Result<Vec<Requirement>, PipelineError> {
        let cached = {
            let state = self.inner.state.lock();
            state.lists.get(&key).map(|list| {
                (
                    state.materialize(&list.ids),
                    freshness(list.fetched_at, list.invalidated, self.inner.config.fresh_for),
                )
            })
        };

        match cached {
            Some((requirements, Freshness::Fresh)) => Ok(requirements),
            Some((requirements, Freshness::Stale)) => {
                self.refresh(FetchKey::List(key));
                Ok(requirements)
            }
            Some((_, Freshness::Invalidated)) | None => {
                self.load(FetchKey::List(key.clone()))
                    .await
                    .map_err(PipelineError::FetchFailed)?;
                let state = self.inner.state.lock();
                Ok(state
                    .lists
                    .get(&key)
                    .map(|list| state.materialize(&list.ids))
                    .unwrap_or_default())
            }
        }
    }

    /// Waits for the fetch of `key`, joining one already in flight unless it
    /// started before the last local write to `key`.
    async fn load(&self, key: FetchKey) -> FetchOutcome {
        let (mut receiver, leader) = {
            let mut state = self.inner.state.lock();
            let written = state.written_at(&key);
            let joinable = state
                .in_flight
                .get(&key)
                .filter(|flight| flight.started >= written)
                .map(|flight| flight.sender.subscribe());
            match joinable {
                Some(receiver) => (receiver, None),
                None => {
                    let (sender, receiver) = broadcast::channel(1);
                    let started = state.generation;
                    state.in_flight.insert(
                        key.clone(),
                        Flight {
                            sender: sender.clone(),
                            started,
                        },
                    );
                    (receiver, Some((sender, started)))
                }
            }
        };

        match leader {
            Some((sender, started)) => self.spawn_fetch(key, sender, started),
            None => debug!(?key, "joined in-flight fetch"),
        }

        receiver.recv().await.unwrap_or_else(|_| {
            Err(GatewayError::Unavailable(
                "fetch ended without reporting a result".to_string(),
            ))
        })
    }

    /// Starts a background fetch unless one is already running.
    fn refresh(&self, key: FetchKey) {
        let (sender, started) = {
            let mut state = self.inner.state.lock();
            if state.in_flight.contains_key(&key) {
                return;
            }
            let (sender, _) = broadcast::channel(1);
            let started = state.generation;
            state.in_flight.insert(
                key.clone(),
                Flight {
                    sender: sender.clone(),
                    started,
                },
            );
            (sender, started)
        };
        debug!(?key, "serving stale entry while revalidating");
        self.spawn_fetch(key, sender, started);
    }

    // Fetches run detached so a dropped reader never strands the in-flight
    // slot that other readers are waiting on.
    fn spawn_fetch(&self, key: FetchKey, sender: broadcast::Sender<FetchOutcome>, started: u64) {
        let store = self.clone();
        tokio::spawn(async move {
            let fetched = store.call_gateway(&key).await;
            let outcome = store.finish_fetch(&key, started, fetched);
            // No receivers is fine: background refreshes have nobody waiting.
            let _ = sender.send(outcome);
        });
    }

    async fn call_gateway(&self, key: &FetchKey) -> Result<Vec<Requirement>, GatewayError> {
        let gateway = &self.inner.gateway;
        match key {
            FetchKey::Requirement(id) => gateway.fetch_requirement(id).await.map(|r| vec![r]),
            FetchKey::List(ListKey::Owner(owner_id)) => {
                gateway.fetch_requirements_by_owner(owner_id).await
            }
            FetchKey::List(ListKey::All) => gateway.fetch_all_requirements().await,
        }
    }

    fn finish_fetch(
        &self,
        key: &FetchKey,
        started: u64,
        fetched: Result<Vec<Requirement>, GatewayError>,
    ) -> FetchOutcome {
        let now = Instant::now();
        let mut events = Vec::new();

        let outcome = {
            let mut state = self.inner.state.lock();
            let outcome = match fetched {
                Ok(requirements) => {
                    let mut ids = Vec::with_capacity(requirements.len());
                    for requirement in requirements {
                        let id = requirement.id.clone();
                        let installed = state.install(requirement, now, started);
                        if installed == Installed::Replaced && matches!(key, FetchKey::Requirement(_)) {
                            events.push(StoreEvent::RequirementChanged(id.clone()));
                        }
                        if installed.is_member() {
                            ids.push(id);
                        }
                    }
                    match key {
                        FetchKey::List(list) if state.list_written(list) > started => {
                            debug!(?key, "list changed while fetching; keeping invalidated entry");
                        }
                        FetchKey::List(list) => {
                            state.lists.insert(
                                list.clone(),
                                ListEntry {
                                    ids,
                                    fetched_at: now,
                                    invalidated: false,
                                },
                            );
                            events.push(StoreEvent::ListLoaded(list.clone()));
                        }
                        FetchKey::Requirement(_) => {}
                    }
                    Ok(())
                }
                Err(GatewayError::NotFound) => {
                    if let FetchKey::Requirement(id) = key {
                        let removable = state.requirement_written(id) <= started;
                        if removable && state.requirements.remove(id).is_some() {
                            events.push(StoreEvent::RequirementRemoved(id.clone()));
                        }
                    }
                    Err(GatewayError::NotFound)
                }
                Err(err) => {
                    warn!(?key, error = %err, "gateway fetch failed; keeping cached data");
                    Err(err)
                }
            };
            let owns_slot = state
                .in_flight
                .get(key)
                .is_some_and(|flight| flight.started == started);
            if owns_slot {
                state.in_flight.remove(key);
            }
            outcome
        };

        for event in events {
            self.emit(event);
        }
        outcome
    }

    fn emit(&self, event: StoreEvent) {
        let _ = self.inner.events.send(event);
    }

    /// Applies `mutate` to the cached application under the store lock and
    /// claims the application's write slot. `mutate` receives `None` when
    /// the applicant has not applied yet.
    pub(crate) fn apply_optimistic<F>(
        &self,
        key: &ApplicationKey,
        mutate: F,
    ) -> Result<RollbackToken, PipelineError>
    where
        F: FnOnce(&Requirement, Option<&Application>) -> Result<Application, PipelineError>,
    {
        let target = WriteTarget::Application(key.clone());
        let previous = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            state.claim(&target)?;
            let entry = state
                .requirements
                .get_mut(&key.requirement_id)
                .ok_or_else(|| NotFound::Requirement(key.requirement_id.clone()))?;

            let previous = entry.requirement.application(&key.applicant_id).cloned();
            let next = mutate(&entry.requirement, previous.as_ref())?;
            match entry.requirement.application_mut(&key.applicant_id) {
                Some(slot) => *slot = next,
                None => entry.requirement.applications.push(next),
            }
            state.pending.insert(target.clone());
            previous
        };

        self.emit(StoreEvent::ApplicationChanged(key.clone()));
        Ok(RollbackToken {
            target,
            undo: Undo::Application {
                key: key.clone(),
                previous,
            },
        })
    }

    /// Same protocol for the requirement's own fields. `mutate` must validate
    /// before it modifies; on error the fields are restored anyway.
    pub(crate) fn apply_requirement_optimistic<F>(
        &self,
        id: &RequirementId,
        mutate: F,
    ) -> Result<RollbackToken, PipelineError>
    where
        F: FnOnce(&mut Requirement) -> Result<(), PipelineError>,
    {
        let target = WriteTarget::Requirement(id.clone());
        let header = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            state.claim(&target)?;
            let entry = state
                .requirements
                .get_mut(id)
                .ok_or_else(|| NotFound::Requirement(id.clone()))?;

            let header = Header::capture(&entry.requirement);
            if let Err(err) = mutate(&mut entry.requirement) {
                header.restore(&mut entry.requirement);
                return Err(err);
            }
            state.pending.insert(target.clone());
            header
        };

        self.emit(StoreEvent::RequirementChanged(id.clone()));
        Ok(RollbackToken {
            target,
            undo: Undo::Requirement {
                id: id.clone(),
                header,
            },
        })
    }

    /// Drops the requirement from the cache and from every cached list.
    pub(crate) fn remove_optimistic(&self, id: &RequirementId) -> Result<RollbackToken, PipelineError> {
        let target = WriteTarget::Requirement(id.clone());
        let (requirement, memberships) = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            state.claim(&target)?;
            let entry = state
                .requirements
                .remove(id)
                .ok_or_else(|| NotFound::Requirement(id.clone()))?;

            let memberships: Vec<(ListKey, usize)> = state
                .lists
                .iter_mut()
                .filter_map(|(key, list)| {
                    let position = list.ids.iter().position(|member| member == id)?;
                    list.ids.remove(position);
                    Some((key.clone(), position))
                })
                .collect();
            state.pending.insert(target.clone());
            (entry.requirement, memberships)
        };

        self.emit(StoreEvent::RequirementRemoved(id.clone()));
        Ok(RollbackToken {
            target,
            undo: Undo::Removal {
                requirement: Box::new(requirement),
                memberships,
            },
        })
    }

    /// Makes the optimistic write permanent and releases its write slot.
    pub(crate) fn commit(&self, token: RollbackToken) {
        self.inner.state.lock().release(&token.target);
        debug!(target = %token.target, "optimistic write committed");
    }

    /// Commits and overwrites the optimistic guess with the server's copy.
    pub(crate) fn commit_application(&self, token: RollbackToken, mut confirmed: Application) {
        // The slot belongs to the write, whatever ids the server echoed.
        let key = match &token.undo {
            Undo::Application { key, .. } => key.clone(),
            Undo::Requirement { .. } | Undo::Removal { .. } => confirmed.key(),
        };
        confirmed.requirement_id = key.requirement_id.clone();
        confirmed.applicant_id = key.applicant_id.clone();
        {
            let mut state = self.inner.state.lock();
            state.release(&token.target);
            if let Some(entry) = state.requirements.get_mut(&key.requirement_id) {
                match entry.requirement.application_mut(&key.applicant_id) {
                    Some(slot) => *slot = confirmed,
                    None => entry.requirement.applications.push(confirmed),
                }
            }
        }
        debug!(target = %token.target, "optimistic write committed");
        self.emit(StoreEvent::ApplicationChanged(key));
    }

    pub(crate) fn commit_requirement(&self, token: RollbackToken, confirmed: Requirement) {
        let id = confirmed.id.clone();
        {
            let mut state = self.inner.state.lock();
            let generation = state.release(&token.target);
            state.install(confirmed, Instant::now(), generation);
        }
        debug!(target = %token.target, "optimistic write committed");
        self.emit(StoreEvent::RequirementChanged(id));
    }

    /// Inserts a requirement the gateway just created.
    pub(crate) fn insert_confirmed(&self, requirement: Requirement) {
        let id = requirement.id.clone();
        let installed = {
            let mut state = self.inner.state.lock();
            let generation = state.stamp(&id);
            state.install(requirement, Instant::now(), generation)
        };
        if installed == Installed::Replaced {
            self.emit(StoreEvent::RequirementChanged(id));
        }
    }

    /// Restores the pre-write value and marks the entry for refetch.
    pub(crate) fn rollback(&self, token: RollbackToken) {
        let RollbackToken { target, undo } = token;
        let event = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            state.release(&target);
            match undo {
                Undo::Application { key, previous } => {
                    if let Some(entry) = state.requirements.get_mut(&key.requirement_id) {
                        let applications = &mut entry.requirement.applications;
                        match previous {
                            Some(previous) => {
                                for slot in applications.iter_mut() {
                                    if slot.applicant_id == key.applicant_id {
                                        *slot = previous.clone();
                                    }
                                }
                            }
                            None => applications
                                .retain(|application| application.applicant_id != key.applicant_id),
                        }
                        entry.invalidated = true;
                    }
                    StoreEvent::ApplicationChanged(key)
                }
                Undo::Requirement { id, header } => {
                    if let Some(entry) = state.requirements.get_mut(&id) {
                        header.restore(&mut entry.requirement);
                        entry.invalidated = true;
                    }
                    StoreEvent::RequirementChanged(id)
                }
                Undo::Removal {
                    requirement,
                    memberships,
                } => {
                    let id = requirement.id.clone();
                    for (key, position) in memberships {
                        if let Some(list) = state.lists.get_mut(&key) {
                            let position = position.min(list.ids.len());
                            list.ids.insert(position, id.clone());
                        }
                    }
                    state.requirements.insert(
                        id.clone(),
                        Entry {
                            requirement: *requirement,
                            fetched_at: Instant::now(),
                            invalidated: true,
                        },
                    );
                    StoreEvent::RequirementChanged(id)
                }
            }
        };
        debug!(%target, "optimistic write rolled back");
        self.emit(event);
    }
}
