//! Pagination engine: split large collections into bounded pages and
//! reassemble them on the receiving side.
//!
//! Large collections (user lists, room lists, per-room lists) do not fit
//! comfortably in one frame, so they travel as a sequence of pages. Each
//! page carries a zero-based index and an explicit `is_last` flag — the
//! terminal page is marked, never inferred from a count, so page numbering
//! can never be confused with page arithmetic.
//!
//! Three pieces:
//!
//! - [`paginate`] — sender side, pure: slice a collection into pages.
//! - [`OpenTransfers`] — sender side: one open transfer per
//!   [`TransferKey`] at a time. `begin` before the first page goes out,
//!   `finish` once the terminal page has actually been written.
//! - [`TransferAssembler`] — receiver side: per-key buffers that
//!   accumulate pages in arrival order and hand back the whole collection
//!   when the terminal page arrives.
//!
//! None of these types lock anything themselves; the caller owns the
//! synchronization, the same way the session registry is wrapped by its
//! owner. Items are carried as pre-serialized strings so one assembler
//! serves every collection kind.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::ClientId;

/// The collections that may travel as paged transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    UserList,
    RoomList,
    RoomMembers,
    RoomBanned,
    RoomApproved,
}

/// Identifies one transfer: which connection, which collection, and — for
/// room-scoped lists — which room. Independent keys paginate concurrently;
/// the busy guard is per key, never global.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferKey {
    pub client: ClientId,
    pub collection: CollectionKind,
    pub room: Option<Uuid>,
}

impl TransferKey {
    pub fn new(client: ClientId, collection: CollectionKind) -> Self {
        Self {
            client,
            collection,
            room: None,
        }
    }

    pub fn for_room(
        client: ClientId,
        collection: CollectionKind,
        room: Uuid,
    ) -> Self {
        Self {
            client,
            collection,
            room: Some(room),
        }
    }
}

/// One page of a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Zero-based position in the transfer.
    pub index: u32,
    /// Set on the terminal page.
    pub is_last: bool,
    /// This page's slice of the collection, items pre-serialized.
    pub items: Vec<String>,
}

/// Splits `items` into pages of at most `page_size` items.
///
/// Pages come back lowest index first with the terminal page flagged. An
/// empty collection yields exactly one empty terminal page, so the
/// receiver always observes a completed transfer.
pub fn paginate(items: &[String], page_size: NonZeroUsize) -> Vec<Page> {
    if items.is_empty() {
        return vec![Page {
            index: 0,
            is_last: true,
            items: Vec::new(),
        }];
    }

    let chunks: Vec<&[String]> = items.chunks(page_size.get()).collect();
    let last = chunks.len() - 1;
    chunks
        .into_iter()
        .enumerate()
        .map(|(index, chunk)| Page {
            index: index as u32,
            is_last: index == last,
            items: chunk.to_vec(),
        })
        .collect()
}

/// Errors from the transfer machinery.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// A transfer is already open for this exact key. The open transfer
    /// is left untouched.
    #[error("a paged transfer is already in flight for this key")]
    Busy,
}

/// Sender-side guard: tracks which transfer keys currently have pages in
/// flight, so overlapping requests for the same collection cannot
/// interleave their pages.
#[derive(Debug, Default)]
pub struct OpenTransfers {
    open: std::collections::HashSet<TransferKey>,
}

impl OpenTransfers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a transfer open.
    ///
    /// # Errors
    /// [`TransferError::Busy`] if a transfer for this key is already open.
    pub fn begin(&mut self, key: TransferKey) -> Result<(), TransferError> {
        if !self.open.insert(key) {
            return Err(TransferError::Busy);
        }
        Ok(())
    }

    /// Closes a transfer. Returns `false` if no transfer was open for the
    /// key (already finished, or swept by [`drop_client`](Self::drop_client)).
    pub fn finish(&mut self, key: &TransferKey) -> bool {
        self.open.remove(key)
    }

    /// Drops every open transfer belonging to a client. Called when the
    /// connection goes away so its keys do not stay busy forever.
    pub fn drop_client(&mut self, client: ClientId) {
        self.open.retain(|key| key.client != client);
    }

    pub fn is_open(&self, key: &TransferKey) -> bool {
        self.open.contains(key)
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}

/// A partially received transfer.
#[derive(Debug)]
struct TransferBuffer {
    items: Vec<String>,
    touched: Instant,
}

/// Receiver side: reassembles paged transfers by key.
///
/// A page for a key with no open buffer opens one; every page appends its
/// items in arrival order; the terminal page closes the buffer and yields
/// the concatenated collection. A page with index 0 arriving while the
/// key's buffer is still open is a new transfer starting on top of an
/// unfinished one — it is rejected busy and the open buffer is untouched.
#[derive(Debug, Default)]
pub struct TransferAssembler {
    buffers: HashMap<TransferKey, TransferBuffer>,
}

impl TransferAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one page into the assembler.
    ///
    /// Returns `Ok(Some(items))` when `page` completed the transfer,
    /// `Ok(None)` when more pages are expected.
    ///
    /// # Errors
    /// [`TransferError::Busy`] for a page that would start a second
    /// transfer over an open buffer.
    pub fn accumulate(
        &mut self,
        key: TransferKey,
        page: Page,
    ) -> Result<Option<Vec<String>>, TransferError> {
        match self.buffers.get_mut(&key) {
            Some(buffer) => {
                if page.index == 0 {
                    return Err(TransferError::Busy);
                }
                buffer.items.extend(page.items);
                buffer.touched = Instant::now();
            }
            None => {
                self.buffers.insert(
                    key,
                    TransferBuffer {
                        items: page.items,
                        touched: Instant::now(),
                    },
                );
            }
        }

        if page.is_last {
            // The buffer is present: either it pre-existed or the arm
            // above just inserted it.
            let buffer = self
                .buffers
                .remove(&key)
                .expect("buffer inserted or updated above");
            return Ok(Some(buffer.items));
        }
        Ok(None)
    }

    /// Drops buffers that have not seen a page for `max_idle`, returning
    /// the abandoned keys. An abandoned multi-page transfer would
    /// otherwise hold its buffer forever.
    pub fn prune_idle(&mut self, max_idle: Duration) -> Vec<TransferKey> {
        let mut pruned = Vec::new();
        self.buffers.retain(|key, buffer| {
            if buffer.touched.elapsed() > max_idle {
                pruned.push(*key);
                false
            } else {
                true
            }
        });
        pruned
    }

    /// Number of transfers currently mid-flight.
    pub fn open_count(&self) -> usize {
        self.buffers.len()
    }
}
