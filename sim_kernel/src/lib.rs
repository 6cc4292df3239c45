//! # Simulated Kernel
//!
//! This crate provides an in-process implementation of the kernel API.
//!
//! ## Purpose
//!
//! The simulated kernel lets the I/O layer be tested without hardware:
//! - Runs under `cargo test`
//! - Real handle semantics (move-only values, one-time close, peer-closed
//!   propagation, transfer through messages and process bundles)
//! - Blocking waits backed by a condition variable, so a peer can be
//!   served from another thread
//! - Inspectable: every handle event lands in a [`HandleAuditLog`]
//!
//! ## Time
//!
//! The clock is virtual. It only moves when a finite wait expires (the
//! clock jumps to the deadline) or a test calls
//! [`SimulatedKernel::advance_time`].

pub mod fault_injection;
pub mod handle_audit;
pub mod rio_peer;
pub mod smp;
pub mod test_utils;

use core_types::{HandleInfo, RawHandle};
use fault_injection::{FaultInjector, FaultPlan};
use handle_audit::{HandleAuditLog, HandleEvent};
use kernel_api::{
    BundleEntry, Deadline, Duration, Instant, KernelApi, KernelError, MessageRead, Signals,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

type ObjectId = u64;

const FIRST_HANDLE: RawHandle = 0x100;

#[derive(Debug)]
struct Message {
    bytes: Vec<u8>,
    /// Objects in transit; each holds one reference until received
    objects: Vec<ObjectId>,
}

#[derive(Debug)]
struct ProcessInfo {
    name: String,
    args: Vec<String>,
    bundle: Vec<(ObjectId, HandleInfo)>,
    return_code: Option<i32>,
}

#[derive(Debug)]
enum KernelObject {
    Channel {
        inbox: VecDeque<Message>,
        peer: Option<ObjectId>,
    },
    Stream {
        inbox: VecDeque<u8>,
        peer: Option<ObjectId>,
    },
    Event {
        signals: Signals,
    },
    Process(ProcessInfo),
}

impl KernelObject {
    fn kind(&self) -> &'static str {
        match self {
            KernelObject::Channel { .. } => "channel",
            KernelObject::Stream { .. } => "stream",
            KernelObject::Event { .. } => "event",
            KernelObject::Process(_) => "process",
        }
    }
}

#[derive(Debug)]
struct ObjectEntry {
    object: KernelObject,
    /// Live handles plus in-transit references
    refs: usize,
}

struct KernelState {
    now: Instant,
    next_handle: RawHandle,
    next_object: ObjectId,
    handles: HashMap<RawHandle, ObjectId>,
    objects: HashMap<ObjectId, ObjectEntry>,
    audit: HandleAuditLog,
    faults: FaultInjector,
}

impl KernelState {
    fn new() -> Self {
        Self {
            now: Instant::from_nanos(0),
            next_handle: FIRST_HANDLE,
            next_object: 1,
            handles: HashMap::new(),
            objects: HashMap::new(),
            audit: HandleAuditLog::new(),
            faults: FaultInjector::default(),
        }
    }

    fn record(&mut self, event: HandleEvent) {
        self.audit.record_event(self.now, event);
    }

    fn insert_object(&mut self, object: KernelObject) -> ObjectId {
        let id = self.next_object;
        self.next_object += 1;
        self.objects.insert(id, ObjectEntry { object, refs: 0 });
        id
    }

    /// Mints a new handle value referencing `id`
    fn mint(&mut self, id: ObjectId) -> RawHandle {
        let raw = self.next_handle;
        self.next_handle += 1;
        if let Some(entry) = self.objects.get_mut(&id) {
            entry.refs += 1;
        }
        self.handles.insert(raw, id);
        raw
    }

    /// Mints a handle for a fresh object and records its creation
    fn create(&mut self, object: KernelObject) -> RawHandle {
        let kind = object.kind();
        let id = self.insert_object(object);
        let raw = self.mint(id);
        self.record(HandleEvent::Created { handle: raw, kind });
        raw
    }

    fn lookup(&self, raw: RawHandle) -> Result<ObjectId, KernelError> {
        self.handles.get(&raw).copied().ok_or(KernelError::BadHandle)
    }

    fn object_mut(&mut self, raw: RawHandle) -> Result<&mut KernelObject, KernelError> {
        let id = self.lookup(raw)?;
        self.objects
            .get_mut(&id)
            .map(|entry| &mut entry.object)
            .ok_or(KernelError::BadHandle)
    }

    fn peer_of(&self, raw: RawHandle) -> Result<Option<ObjectId>, KernelError> {
        let id = self.lookup(raw)?;
        match self.objects.get(&id).map(|entry| &entry.object) {
            Some(KernelObject::Channel { peer, .. }) | Some(KernelObject::Stream { peer, .. }) => {
                Ok(*peer)
            }
            Some(_) => Err(KernelError::NotSupported),
            None => Err(KernelError::BadHandle),
        }
    }

    /// Drops one reference to each object, destroying those that reach zero
    fn release(&mut self, ids: Vec<ObjectId>) {
        let mut pending = ids;
        while let Some(id) = pending.pop() {
            let Some(entry) = self.objects.get_mut(&id) else {
                continue;
            };
            entry.refs = entry.refs.saturating_sub(1);
            if entry.refs > 0 {
                continue;
            }
            let Some(entry) = self.objects.remove(&id) else {
                continue;
            };
            match entry.object {
                KernelObject::Channel { inbox, peer } => {
                    if let Some(peer) = peer {
                        self.detach_peer(peer);
                    }
                    for message in inbox {
                        pending.extend(message.objects);
                    }
                }
                KernelObject::Stream { peer, .. } => {
                    if let Some(peer) = peer {
                        self.detach_peer(peer);
                    }
                }
                KernelObject::Process(info) => {
                    pending.extend(info.bundle.into_iter().map(|(id, _)| id));
                }
                KernelObject::Event { .. } => {}
            }
        }
    }

    fn detach_peer(&mut self, id: ObjectId) {
        if let Some(entry) = self.objects.get_mut(&id) {
            match &mut entry.object {
                KernelObject::Channel { peer, .. } | KernelObject::Stream { peer, .. } => {
                    *peer = None
                }
                _ => {}
            }
        }
    }

    /// Removes a handle from the table, keeping its reference in transit
    fn take_for_transfer(&mut self, raw: RawHandle) -> Result<ObjectId, KernelError> {
        let id = self.handles.remove(&raw).ok_or(KernelError::BadHandle)?;
        self.record(HandleEvent::Transferred { handle: raw });
        Ok(id)
    }

    /// Re-mints in-transit objects under new handle values
    fn receive(&mut self, ids: Vec<ObjectId>) -> Vec<RawHandle> {
        ids.into_iter()
            .map(|id| {
                // The in-transit reference becomes the new handle's reference.
                let raw = self.mint(id);
                if let Some(entry) = self.objects.get_mut(&id) {
                    entry.refs -= 1;
                }
                self.record(HandleEvent::Received { handle: raw });
                raw
            })
            .collect()
    }

    /// Closes every valid handle in `raws` (used when a transfer fails)
    fn discard(&mut self, raws: &[RawHandle]) {
        let ids: Vec<ObjectId> = raws
            .iter()
            .filter_map(|raw| {
                let id = self.handles.remove(raw)?;
                self.record(HandleEvent::Closed { handle: *raw });
                Some(id)
            })
            .collect();
        self.release(ids);
    }

    fn signals(&self, id: ObjectId) -> Signals {
        let Some(entry) = self.objects.get(&id) else {
            return Signals::empty();
        };
        match &entry.object {
            KernelObject::Channel { inbox, peer } => endpoint_signals(inbox.is_empty(), *peer),
            KernelObject::Stream { inbox, peer } => endpoint_signals(inbox.is_empty(), *peer),
            KernelObject::Event { signals } => *signals,
            KernelObject::Process(info) => {
                if info.return_code.is_some() {
                    Signals::SIGNALED
                } else {
                    Signals::empty()
                }
            }
        }
    }

    fn process_mut(&mut self, raw: RawHandle) -> Result<&mut ProcessInfo, KernelError> {
        match self.object_mut(raw)? {
            KernelObject::Process(info) => Ok(info),
            _ => Err(KernelError::NotSupported),
        }
    }
}

fn endpoint_signals(empty: bool, peer: Option<ObjectId>) -> Signals {
    let mut signals = Signals::empty();
    if !empty {
        signals |= Signals::READABLE;
    }
    if peer.is_some() {
        signals |= Signals::WRITABLE;
    } else {
        signals |= Signals::PEER_CLOSED;
    }
    signals
}

/// Simulated kernel state
///
/// Every handle value lives in one global table; "processes" created via
/// [`KernelApi::process_start`] hold their startup bundle until a test
/// takes it with [`SimulatedKernel::take_startup_bundle`] and boots a child
/// I/O context from it.
pub struct SimulatedKernel {
    state: Mutex<KernelState>,
    wake: Condvar,
}

impl SimulatedKernel {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(KernelState::new()),
            wake: Condvar::new(),
        }
    }

    /// Creates a kernel ready to be shared as a `KernelRef`
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Sets the fault plan for this kernel
    pub fn with_fault_plan(self, plan: FaultPlan) -> Self {
        self.inject_faults(plan);
        self
    }

    /// Adds faults to an already running kernel
    pub fn inject_faults(&self, plan: FaultPlan) {
        self.lock().faults.extend(plan);
    }

    fn lock(&self) -> MutexGuard<'_, KernelState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn notify(&self) {
        self.wake.notify_all();
    }

    /// Advances simulated time, waking waiters whose deadline passed
    pub fn advance_time(&self, duration: Duration) {
        let mut state = self.lock();
        state.now = state.now + duration;
        drop(state);
        self.notify();
    }

    /// Whether `raw` currently names a live handle
    pub fn is_live(&self, raw: RawHandle) -> bool {
        self.lock().handles.contains_key(&raw)
    }

    /// Number of live handles across the whole kernel
    pub fn live_handle_count(&self) -> usize {
        self.lock().handles.len()
    }

    /// Whether two handles reference the same kernel object
    pub fn same_object(&self, a: RawHandle, b: RawHandle) -> bool {
        let state = self.lock();
        matches!((state.lookup(a), state.lookup(b)), (Ok(x), Ok(y)) if x == y)
    }

    /// Runs `f` against the handle audit log
    pub fn audit<R>(&self, f: impl FnOnce(&HandleAuditLog) -> R) -> R {
        f(&self.lock().audit)
    }

    /// Hands a started process's bundle to the caller, as the child would
    /// receive it
    pub fn take_startup_bundle(&self, process: RawHandle) -> Result<Vec<BundleEntry>, KernelError> {
        let mut state = self.lock();
        let bundle = std::mem::take(&mut state.process_mut(process)?.bundle);
        let (ids, infos): (Vec<ObjectId>, Vec<HandleInfo>) = bundle.into_iter().unzip();
        let raws = state.receive(ids);
        Ok(raws.into_iter().zip(infos).collect())
    }

    /// Name and argv a process was started with
    pub fn process_args(&self, process: RawHandle) -> Result<(String, Vec<String>), KernelError> {
        let mut state = self.lock();
        let info = state.process_mut(process)?;
        Ok((info.name.clone(), info.args.clone()))
    }

    /// Marks a process as exited with `code`
    pub fn exit_process(&self, process: RawHandle, code: i32) -> Result<(), KernelError> {
        let mut state = self.lock();
        state.process_mut(process)?.return_code = Some(code);
        drop(state);
        self.notify();
        Ok(())
    }
}

impl Default for SimulatedKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl KernelApi for SimulatedKernel {
    fn handle_close(&self, handle: RawHandle) -> Result<(), KernelError> {
        let mut state = self.lock();
        let id = state.handles.remove(&handle).ok_or(KernelError::BadHandle)?;
        let failed = state.faults.should_fail_close(handle);
        state.release(vec![id]);
        if failed {
            state.record(HandleEvent::CloseFailed { handle });
        } else {
            state.record(HandleEvent::Closed { handle });
        }
        drop(state);
        self.notify();
        if failed {
            Err(KernelError::Io)
        } else {
            Ok(())
        }
    }

    fn handle_duplicate(&self, handle: RawHandle) -> Result<RawHandle, KernelError> {
        let mut state = self.lock();
        let id = state.lookup(handle)?;
        if state.faults.should_fail_duplicate() {
            return Err(KernelError::NoResources);
        }
        let raw = state.mint(id);
        state.record(HandleEvent::Duplicated {
            from: handle,
            to: raw,
        });
        Ok(raw)
    }

    fn handle_wait_one(
        &self,
        handle: RawHandle,
        signals: Signals,
        deadline: Deadline,
    ) -> Result<Signals, KernelError> {
        let mut state = self.lock();
        loop {
            let id = state.lookup(handle)?;
            let asserted = state.signals(id) & signals;
            if !asserted.is_empty() {
                return Ok(asserted);
            }
            match deadline {
                Deadline::Infinite => {
                    state = self
                        .wake
                        .wait(state)
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                }
                Deadline::At(at) => {
                    if at <= state.now {
                        return Err(KernelError::TimedOut);
                    }
                    let remaining = at.duration_since(state.now).as_nanos();
                    let (guard, result) = self
                        .wake
                        .wait_timeout(state, std::time::Duration::from_nanos(remaining))
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                    state = guard;
                    if result.timed_out() && state.now < at {
                        state.now = at;
                    }
                }
            }
        }
    }

    fn message_pipe_create(&self) -> Result<(RawHandle, RawHandle), KernelError> {
        let mut state = self.lock();
        let a = state.next_object;
        let b = a + 1;
        let a_raw = state.create(KernelObject::Channel {
            inbox: VecDeque::new(),
            peer: Some(b),
        });
        let b_raw = state.create(KernelObject::Channel {
            inbox: VecDeque::new(),
            peer: Some(a),
        });
        Ok((a_raw, b_raw))
    }

    fn message_write(
        &self,
        handle: RawHandle,
        bytes: &[u8],
        handles: Vec<RawHandle>,
    ) -> Result<(), KernelError> {
        let mut state = self.lock();
        let peer = match state.peer_of(handle) {
            Ok(Some(peer)) => peer,
            Ok(None) => {
                state.discard(&handles);
                return Err(KernelError::PeerClosed);
            }
            Err(err) => {
                state.discard(&handles);
                return Err(err);
            }
        };
        if handles.contains(&handle) || handles.iter().any(|h| !state.handles.contains_key(h)) {
            state.discard(&handles);
            return Err(KernelError::InvalidArgs);
        }
        let mut objects = Vec::with_capacity(handles.len());
        for raw in handles {
            objects.push(state.take_for_transfer(raw)?);
        }
        if let Some(ObjectEntry {
            object: KernelObject::Channel { inbox, .. },
            ..
        }) = state.objects.get_mut(&peer)
        {
            inbox.push_back(Message {
                bytes: bytes.to_vec(),
                objects,
            });
        }
        drop(state);
        self.notify();
        Ok(())
    }

    fn message_read(&self, handle: RawHandle) -> Result<MessageRead, KernelError> {
        let mut state = self.lock();
        let message = match state.object_mut(handle)? {
            KernelObject::Channel { inbox, peer } => match inbox.pop_front() {
                Some(message) => message,
                None if peer.is_none() => return Err(KernelError::PeerClosed),
                None => return Err(KernelError::ShouldWait),
            },
            _ => return Err(KernelError::NotSupported),
        };
        let handles = state.receive(message.objects);
        Ok(MessageRead {
            bytes: message.bytes,
            handles,
        })
    }

    fn stream_create(&self) -> Result<(RawHandle, RawHandle), KernelError> {
        let mut state = self.lock();
        let a = state.next_object;
        let b = a + 1;
        let a_raw = state.create(KernelObject::Stream {
            inbox: VecDeque::new(),
            peer: Some(b),
        });
        let b_raw = state.create(KernelObject::Stream {
            inbox: VecDeque::new(),
            peer: Some(a),
        });
        Ok((a_raw, b_raw))
    }

    fn stream_write(&self, handle: RawHandle, bytes: &[u8]) -> Result<usize, KernelError> {
        let mut state = self.lock();
        let peer = state.peer_of(handle)?.ok_or(KernelError::PeerClosed)?;
        if let Some(ObjectEntry {
            object: KernelObject::Stream { inbox, .. },
            ..
        }) = state.objects.get_mut(&peer)
        {
            inbox.extend(bytes.iter().copied());
        }
        drop(state);
        self.notify();
        Ok(bytes.len())
    }

    fn stream_read(&self, handle: RawHandle, buf: &mut [u8]) -> Result<usize, KernelError> {
        let mut state = self.lock();
        match state.object_mut(handle)? {
            KernelObject::Stream { inbox, peer } => {
                if buf.is_empty() {
                    return Ok(0);
                }
                if inbox.is_empty() {
                    return match peer {
                        Some(_) => Err(KernelError::ShouldWait),
                        None => Ok(0),
                    };
                }
                let count = buf.len().min(inbox.len());
                for (slot, byte) in buf.iter_mut().zip(inbox.drain(..count)) {
                    *slot = byte;
                }
                Ok(count)
            }
            _ => Err(KernelError::NotSupported),
        }
    }

    fn event_create(&self) -> Result<RawHandle, KernelError> {
        let mut state = self.lock();
        Ok(state.create(KernelObject::Event {
            signals: Signals::empty(),
        }))
    }

    fn object_signal(
        &self,
        handle: RawHandle,
        clear: Signals,
        set: Signals,
    ) -> Result<(), KernelError> {
        if !Signals::USER_ALL.contains(clear | set) {
            return Err(KernelError::InvalidArgs);
        }
        let mut state = self.lock();
        match state.object_mut(handle)? {
            KernelObject::Event { signals } => {
                *signals = (*signals - clear) | set;
            }
            _ => return Err(KernelError::NotSupported),
        }
        drop(state);
        self.notify();
        Ok(())
    }

    fn now(&self) -> Instant {
        self.lock().now
    }

    fn process_start(
        &self,
        name: &str,
        args: &[String],
        bundle: Vec<BundleEntry>,
    ) -> Result<RawHandle, KernelError> {
        let mut state = self.lock();
        let raws: Vec<RawHandle> = bundle.iter().map(|(raw, _)| *raw).collect();
        if raws.iter().any(|raw| !state.handles.contains_key(raw)) {
            state.discard(&raws);
            return Err(KernelError::BadHandle);
        }
        let mut transferred = Vec::with_capacity(bundle.len());
        for (raw, info) in bundle {
            transferred.push((state.take_for_transfer(raw)?, info));
        }
        let handle_count = transferred.len();
        let process = state.create(KernelObject::Process(ProcessInfo {
            name: name.to_string(),
            args: args.to_vec(),
            bundle: transferred,
            return_code: None,
        }));
        state.record(HandleEvent::ProcessStarted {
            name: name.to_string(),
            handle_count,
        });
        Ok(process)
    }

    fn process_return_code(&self, process: RawHandle) -> Result<i32, KernelError> {
        let mut state = self.lock();
        state
            .process_mut(process)?
            .return_code
            .ok_or(KernelError::ShouldWait)
    }
}
