//! Per-transmitter signal buckets.
//!
//! Receivers are prepended, so a bucket lists the most recent connection
//! first. Emission works on a snapshot of `Rc<Connection>`s and skips entries
//! severed after the snapshot was taken, which lets a receiver disconnect
//! itself or its neighbours mid-emission.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use signalbridge_core::{ObjectHandle, Runtime};

use crate::error::{BridgeResult, owned_name};
use crate::slot::SlotRecord;

/// One registered receiver.
#[derive(Debug)]
pub struct Connection {
    slot: SlotRecord,
    connected: Cell<bool>,
}

impl Connection {
    fn new(slot: SlotRecord) -> Self {
        Self {
            slot,
            connected: Cell::new(true),
        }
    }

    pub fn slot(&self) -> &SlotRecord {
        &self.slot
    }

    pub fn is_connected(&self) -> bool {
        self.connected.get()
    }

    /// Mark disconnected and release the slot. Later calls do nothing.
    fn sever(&self, runtime: &Runtime) {
        if self.connected.replace(false) {
            self.slot.release(runtime);
        }
    }
}

#[derive(Debug)]
struct SignalBucket {
    name: String,
    receivers: VecDeque<Rc<Connection>>,
}

/// Receivers of managed signals, keyed by transmitter then signal name.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    transmitters: FxHashMap<ObjectHandle, Vec<SignalBucket>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `slot` for `signal` on `tx`. Duplicates are kept.
    pub fn connect(
        &mut self,
        tx: ObjectHandle,
        signal: &str,
        slot: SlotRecord,
        same_name: &dyn Fn(&str, &str) -> bool,
    ) -> BridgeResult<()> {
        self.transmitters.try_reserve(1)?;
        let buckets = self.transmitters.entry(tx).or_default();

        let index = match buckets.iter().position(|b| same_name(&b.name, signal)) {
            Some(index) => index,
            None => {
                buckets.try_reserve(1)?;
                buckets.push(SignalBucket {
                    name: owned_name(signal)?,
                    receivers: VecDeque::new(),
                });
                buckets.len() - 1
            }
        };

        let bucket = &mut buckets[index];
        bucket.receivers.try_reserve(1)?;
        bucket.receivers.push_front(Rc::new(Connection::new(slot)));
        Ok(())
    }

    /// Remove the first receiver equal to `rx`/`member`.
    pub fn disconnect(
        &mut self,
        runtime: &Runtime,
        tx: ObjectHandle,
        signal: &str,
        rx: ObjectHandle,
        member: Option<&str>,
        same_name: &dyn Fn(&str, &str) -> bool,
    ) -> bool {
        let Some(bucket) = self.bucket_mut(tx, signal, same_name) else {
            return false;
        };
        let Some(index) = bucket
            .receivers
            .iter()
            .position(|conn| conn.slot.matches(runtime, rx, member, same_name))
        else {
            return false;
        };
        if let Some(conn) = bucket.receivers.remove(index) {
            conn.sever(runtime);
        }
        true
    }

    /// Remove `conn` itself from the bucket of `signal` and release its slot.
    ///
    /// Returns false if it was already gone.
    pub fn remove_connection(
        &mut self,
        runtime: &Runtime,
        tx: ObjectHandle,
        signal: &str,
        conn: &Rc<Connection>,
        same_name: &dyn Fn(&str, &str) -> bool,
    ) -> bool {
        let Some(bucket) = self.bucket_mut(tx, signal, same_name) else {
            return false;
        };
        let Some(index) = bucket.receivers.iter().position(|c| Rc::ptr_eq(c, conn)) else {
            return false;
        };
        if let Some(conn) = bucket.receivers.remove(index) {
            conn.sever(runtime);
        }
        true
    }

    /// Whether `tx` has a bucket for `signal`, even an empty one.
    pub fn find_signal(
        &self,
        tx: ObjectHandle,
        signal: &str,
        same_name: &dyn Fn(&str, &str) -> bool,
    ) -> bool {
        self.bucket(tx, signal, same_name).is_some()
    }

    /// The receivers of `signal` at this moment, most recent first.
    pub fn snapshot(
        &self,
        tx: ObjectHandle,
        signal: &str,
        same_name: &dyn Fn(&str, &str) -> bool,
    ) -> BridgeResult<Vec<Rc<Connection>>> {
        let Some(bucket) = self.bucket(tx, signal, same_name) else {
            return Ok(Vec::new());
        };
        let mut receivers = Vec::new();
        receivers.try_reserve_exact(bucket.receivers.len())?;
        receivers.extend(bucket.receivers.iter().cloned());
        Ok(receivers)
    }

    pub fn receiver_count(
        &self,
        tx: ObjectHandle,
        signal: &str,
        same_name: &dyn Fn(&str, &str) -> bool,
    ) -> usize {
        self.bucket(tx, signal, same_name)
            .map_or(0, |bucket| bucket.receivers.len())
    }

    /// Drop every bucket of `tx`, returning the number of receivers removed.
    pub fn remove_transmitter(&mut self, runtime: &Runtime, tx: ObjectHandle) -> usize {
        let Some(buckets) = self.transmitters.remove(&tx) else {
            return 0;
        };
        let mut removed = 0;
        for conn in buckets.iter().flat_map(|bucket| bucket.receivers.iter()) {
            conn.sever(runtime);
            removed += 1;
        }
        removed
    }

    /// Transmitters with at least one bucket.
    pub fn transmitters(&self) -> impl Iterator<Item = ObjectHandle> + '_ {
        self.transmitters.keys().copied()
    }

    /// Drop every bucket, returning the number of receivers removed.
    pub fn clear(&mut self, runtime: &Runtime) -> usize {
        let mut removed = 0;
        for (_, buckets) in self.transmitters.drain() {
            for conn in buckets.iter().flat_map(|bucket| bucket.receivers.iter()) {
                conn.sever(runtime);
                removed += 1;
            }
        }
        removed
    }

    /// Drop the bucket for `signal` if it has no receivers left.
    pub fn prune_signal(
        &mut self,
        tx: ObjectHandle,
        signal: &str,
        same_name: &dyn Fn(&str, &str) -> bool,
    ) {
        if let Some(buckets) = self.transmitters.get_mut(&tx) {
            buckets.retain(|b| !(b.receivers.is_empty() && same_name(&b.name, signal)));
            if buckets.is_empty() {
                self.transmitters.remove(&tx);
            }
        }
    }

    fn bucket(
        &self,
        tx: ObjectHandle,
        signal: &str,
        same_name: &dyn Fn(&str, &str) -> bool,
    ) -> Option<&SignalBucket> {
        self.transmitters
            .get(&tx)?
            .iter()
            .find(|bucket| same_name(&bucket.name, signal))
    }

    fn bucket_mut(
        &mut self,
        tx: ObjectHandle,
        signal: &str,
        same_name: &dyn Fn(&str, &str) -> bool,
    ) -> Option<&mut SignalBucket> {
        self.transmitters
            .get_mut(&tx)?
            .iter_mut()
            .find(|bucket| same_name(&bucket.name, signal))
    }
}
