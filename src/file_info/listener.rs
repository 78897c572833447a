use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::layout::{piece_offset, TorrentFile};
use crate::piece::PieceStates;

/// Error a listener may report back; it is logged and otherwise ignored.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Observer of a file's write and verification progress.
///
/// Offsets are relative to the start of the file.
pub trait DiskFileInfoListener: Send + Sync {
    fn data_written(&self, offset: u64, length: u64) -> Result<(), ListenerError>;

    fn data_verified(&self, offset: u64, length: u64) -> Result<(), ListenerError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stream {
    Written,
    Verified,
}

/// Delivers one event, containing errors and panics to this listener.
pub(crate) fn deliver(
    listener: &dyn DiskFileInfoListener,
    stream: Stream,
    offset: u64,
    length: u64,
    file_index: usize,
) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| match stream {
        Stream::Written => listener.data_written(offset, length),
        Stream::Verified => listener.data_verified(offset, length),
    }));

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::warn!(
                "file {}: listener failed on {:?} ({}, {}): {}",
                file_index,
                stream,
                offset,
                length,
                e
            );
        }
        Err(_) => {
            tracing::warn!(
                "file {}: listener panicked on {:?} ({}, {})",
                file_index,
                stream,
                offset,
                length
            );
        }
    }
}

fn same_listener(a: &Arc<dyn DiskFileInfoListener>, b: &Arc<dyn DiskFileInfoListener>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// A listener whose replay is still running, with the live events it missed.
struct PendingListener {
    listener: Arc<dyn DiskFileInfoListener>,
    backlog: Vec<(Stream, u64, u64)>,
}

/// Registered listeners, compared by identity.
///
/// Mutations replace the whole list; a fan-out iterates the snapshot it
/// started with, so concurrent registration never skips or repeats a
/// listener within one pass.
///
/// A listener being replayed to sits in a pending list. Live events that
/// arrive meanwhile are queued for it and delivered before it joins the live
/// list, so nothing falls between replay and live delivery. No lock is held
/// while a callback runs; callbacks may register, remove or notify freely.
#[derive(Default)]
pub struct ListenerSet {
    listeners: RwLock<Arc<Vec<Arc<dyn DiskFileInfoListener>>>>,
    pending: Mutex<Vec<PendingListener>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `listener` is live or still being replayed to.
    pub fn contains(&self, listener: &Arc<dyn DiskFileInfoListener>) -> bool {
        let pending = self.pending.lock();
        pending.iter().any(|p| same_listener(&p.listener, listener))
            || self.listeners.read().iter().any(|l| same_listener(l, listener))
    }

    /// Adds `listener` straight to the live list; returns false if it was
    /// already registered.
    pub fn insert(&self, listener: Arc<dyn DiskFileInfoListener>) -> bool {
        let pending = self.pending.lock();
        if pending.iter().any(|p| same_listener(&p.listener, &listener)) {
            return false;
        }
        self.insert_live(listener)
    }

    fn insert_live(&self, listener: Arc<dyn DiskFileInfoListener>) -> bool {
        let mut listeners = self.listeners.write();
        if listeners.iter().any(|l| same_listener(l, &listener)) {
            return false;
        }
        let mut next = Vec::with_capacity(listeners.len() + 1);
        next.extend(listeners.iter().cloned());
        next.push(listener);
        *listeners = Arc::new(next);
        true
    }

    /// Starts queueing live events for `listener` ahead of its replay.
    /// Returns false if it is already live or pending.
    pub(crate) fn begin(&self, listener: Arc<dyn DiskFileInfoListener>) -> bool {
        let mut pending = self.pending.lock();
        if pending.iter().any(|p| same_listener(&p.listener, &listener))
            || self.listeners.read().iter().any(|l| same_listener(l, &listener))
        {
            return false;
        }
        pending.push(PendingListener {
            listener,
            backlog: Vec::new(),
        });
        true
    }

    /// Flushes the events queued for a pending `listener`, then makes it
    /// live. Does nothing if it was removed while pending.
    pub(crate) fn complete(&self, listener: &Arc<dyn DiskFileInfoListener>, file_index: usize) {
        loop {
            let batch = {
                let mut pending = self.pending.lock();
                let Some(position) = pending
                    .iter()
                    .position(|p| same_listener(&p.listener, listener))
                else {
                    return;
                };
                if pending[position].backlog.is_empty() {
                    let entry = pending.swap_remove(position);
                    self.insert_live(entry.listener);
                    return;
                }
                std::mem::take(&mut pending[position].backlog)
            };

            for (stream, offset, length) in batch {
                deliver(listener.as_ref(), stream, offset, length, file_index);
            }
        }
    }

    /// Removes `listener`, live or pending; returns false if it was not
    /// registered.
    pub fn remove(&self, listener: &Arc<dyn DiskFileInfoListener>) -> bool {
        let mut pending = self.pending.lock();
        let before = pending.len();
        pending.retain(|p| !same_listener(&p.listener, listener));
        let was_pending = pending.len() != before;

        let mut listeners = self.listeners.write();
        if !listeners.iter().any(|l| same_listener(l, listener)) {
            return was_pending;
        }
        let next: Vec<_> = listeners
            .iter()
            .filter(|l| !same_listener(l, listener))
            .cloned()
            .collect();
        *listeners = Arc::new(next);
        true
    }

    pub fn snapshot(&self) -> Arc<Vec<Arc<dyn DiskFileInfoListener>>> {
        Arc::clone(&self.listeners.read())
    }

    /// Number of live listeners.
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        let pending = self.pending.lock();
        pending.is_empty() && self.listeners.read().is_empty()
    }

    pub(crate) fn notify(&self, stream: Stream, offset: u64, length: u64, file_index: usize) {
        let snapshot = {
            let mut pending = self.pending.lock();
            for entry in pending.iter_mut() {
                entry.backlog.push((stream, offset, length));
            }
            self.snapshot()
        };
        for listener in snapshot.iter() {
            deliver(listener.as_ref(), stream, offset, length, file_index);
        }
    }
}

/// Pending `[start, end)` interval in transfer-absolute bytes.
type Pending = Option<(u64, u64)>;

/// Coalesces historical progress into as few notifications as possible.
///
/// The written and verified streams are merged independently. A pending
/// interval is only emitted once the next interval leaves a gap, and every
/// emission is clipped to the file's own bytes.
pub(crate) struct ReplayAccumulator<'a> {
    file: &'a TorrentFile,
    listener: &'a dyn DiskFileInfoListener,
    written: Pending,
    verified: Pending,
    emitted: usize,
}

impl<'a> ReplayAccumulator<'a> {
    pub(crate) fn new(file: &'a TorrentFile, listener: &'a dyn DiskFileInfoListener) -> Self {
        Self {
            file,
            listener,
            written: None,
            verified: None,
            emitted: 0,
        }
    }

    /// Feeds one sub-interval; `verified` marks a whole done piece.
    pub(crate) fn feed(&mut self, start: u64, end: u64, verified: bool) {
        match self.written {
            None => self.written = Some((start, end)),
            Some((pending_start, pending_end)) if pending_end == start => {
                self.written = Some((pending_start, end));
            }
            Some(pending) => {
                self.emit(Stream::Written, pending);
                self.written = Some((start, end));
            }
        }

        match self.verified {
            None if verified => self.verified = Some((start, end)),
            Some((pending_start, pending_end)) if verified && pending_end == start => {
                self.verified = Some((pending_start, end));
            }
            pending => {
                if let Some(pending) = pending {
                    self.emit(Stream::Verified, pending);
                }
                self.verified = verified.then_some((start, end));
            }
        }
    }

    /// Flushes both streams and returns the number of notifications sent.
    pub(crate) fn finish(mut self) -> usize {
        if let Some(pending) = self.written.take() {
            self.emit(Stream::Written, pending);
        }
        if let Some(pending) = self.verified.take() {
            self.emit(Stream::Verified, pending);
        }
        self.emitted
    }

    fn emit(&mut self, stream: Stream, (start, end): (u64, u64)) {
        if let Some((offset, length)) = self.file.relative(start..end) {
            deliver(self.listener, stream, offset, length, self.file.index);
            self.emitted += 1;
        }
    }
}

/// Replays the current progress of `file` to `listener`, piece by piece in
/// ascending order.
pub(crate) fn replay(
    file: &TorrentFile,
    piece_length: u64,
    pieces: &dyn PieceStates,
    listener: &dyn DiskFileInfoListener,
) -> usize {
    let mut acc = ReplayAccumulator::new(file, listener);

    for piece in file.first_piece..=file.last_piece {
        let piece_start = piece_offset(piece_length, piece, 0);

        if pieces.is_done(piece) {
            acc.feed(piece_start, piece_start + pieces.piece_length(piece), true);
            continue;
        }

        let mut block_offset = 0u64;
        for block in 0..pieces.block_count(piece) {
            let block_size = u64::from(pieces.block_size(piece, block));
            if pieces.is_written(piece, block) {
                let start = piece_start + block_offset;
                acc.feed(start, start + block_size, false);
            }
            block_offset += block_size;
        }
    }

    acc.finish()
}
