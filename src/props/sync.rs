//! Property-group synchronization.
//!
//! Each group's cached property list lives in an observable cell.  A
//! fetch replaces the cell with a loading placeholder, asks the
//! controller for the group's contents, and commits the decoded list —
//! unless a newer fetch for the same group has started in the meantime.
//!
//! Supersession is generation-based: every fetch takes a ticket, and
//! only the holder of the newest ticket may commit.  A superseded fetch
//! discards its result cooperatively, so a stale round-trip can never
//! overwrite a fresher one regardless of completion order.
//!
//! Outbound propagation is origin-tagged: hydration from the wire only
//! updates the cache, while a [`PropertyUpdate`] (which can only come
//! from the embedding application) updates the cache *and* pushes the
//! value upstream.  The controller therefore never hears its own values
//! echoed back.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::observe::StateCell;
use crate::session::Session;
use crate::wire::bytes::ByteReader;
use crate::wire::frame::FunctionId;

use super::codec;
use super::{GroupId, Property, PropertyUpdate, PropertyValue};

/// What a group's cell currently holds.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupContent {
    /// Nothing fetched yet.
    Empty,
    /// A fetch is in flight; `progress` is 0..=1.
    Loading { progress: f32 },
    /// The current property list, replaced wholesale on every commit.
    Ready(Arc<Vec<Property>>),
}

/// Outcome of a fetch that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The list was committed; carries the property count.
    Committed(usize),
    /// A newer fetch for the same group superseded this one; its result
    /// was discarded.
    Superseded,
}

struct GroupSlot {
    content: StateCell<GroupContent>,
    generation: AtomicU32,
}

struct Shared {
    session: Session,
    groups: [GroupSlot; 2],
}

/// The synchronization engine for all property groups.
#[derive(Clone)]
pub struct SyncEngine {
    shared: Arc<Shared>,
}

impl SyncEngine {
    pub fn new(session: Session) -> Self {
        let slot = || GroupSlot {
            content: StateCell::new(GroupContent::Empty),
            generation: AtomicU32::new(0),
        };
        Self {
            shared: Arc::new(Shared {
                session,
                groups: [slot(), slot()],
            }),
        }
    }

    /// Observable content of a group.
    pub fn content(&self, group: GroupId) -> &StateCell<GroupContent> {
        &self.shared.groups[group.index()].content
    }

    /// Fetch a group's properties in one round-trip and commit them.
    ///
    /// On failure the cell is left showing the loading placeholder (or
    /// whatever a newer fetch has put there); nothing is retried here.
    pub async fn fetch(&self, group: GroupId) -> Result<FetchOutcome> {
        let ticket = self.begin(group);
        let result = self.fetch_bulk(group).await;
        self.finish(group, ticket, result)
    }

    /// Fetch a group id-by-id, updating the loading placeholder's
    /// progress between properties.  Slower than [`fetch`](Self::fetch)
    /// but keeps the UI informed on large groups.
    pub async fn fetch_with_progress(&self, group: GroupId) -> Result<FetchOutcome> {
        let ticket = self.begin(group);

        let ids = match self.fetch_ids(group).await {
            Ok(ids) => ids,
            Err(e) => return self.finish(group, ticket, Err(e)),
        };

        let total = ids.len();
        let mut list = Vec::with_capacity(total);
        for (i, id) in ids.into_iter().enumerate() {
            // Cooperative cancellation: a newer fetch owns the cell now.
            if !self.is_current(group, ticket) {
                debug!("sync: {group:?} fetch superseded mid-flight");
                return Ok(FetchOutcome::Superseded);
            }
            match self.fetch_one(id).await {
                Ok(property) => list.push(property),
                Err(e) => return self.finish(group, ticket, Err(e)),
            }
            let progress = (i + 1) as f32 / total.max(1) as f32;
            self.set_if_current(group, ticket, GroupContent::Loading { progress });
        }

        self.finish(group, ticket, Ok(list))
    }

    /// Apply a user edit: validate against the cached property, commit a
    /// new snapshot, and push the value to the controller.
    pub async fn set_value(&self, group: GroupId, id: i32, update: PropertyUpdate) -> Result<()> {
        let slot = &self.shared.groups[group.index()];
        let GroupContent::Ready(list) = slot.content.get() else {
            return Err(Error::InvalidValue("group not synchronized"));
        };
        let index = list
            .iter()
            .position(|p| p.id == id)
            .ok_or(Error::InvalidValue("unknown property id"))?;

        let mut updated = list[index].clone();
        apply_update(&mut updated.value, update)?;

        let mut body = crate::wire::bytes::ByteWriter::new();
        codec::encode_value(&updated, &mut body)?;
        let value_bytes = body.into_inner();

        // Commit the new snapshot before the push so readers see the
        // edit immediately.
        let mut next = list.as_ref().clone();
        next[index] = updated;
        slot.content.set(GroupContent::Ready(Arc::new(next)));

        self.shared
            .session
            .request_no_response(FunctionId::SetPropertyValueById, |w| {
                w.put_i32(id);
                w.put_bytes(&value_bytes);
            })
            .await
    }

    // ── Fetch plumbing ────────────────────────────────────────

    /// Take a fetch ticket and show the loading placeholder.
    fn begin(&self, group: GroupId) -> u32 {
        let slot = &self.shared.groups[group.index()];
        let ticket = slot.generation.fetch_add(1, Ordering::SeqCst) + 1;
        slot.content.set(GroupContent::Loading { progress: 0.0 });
        ticket
    }

    fn is_current(&self, group: GroupId, ticket: u32) -> bool {
        self.shared.groups[group.index()]
            .generation
            .load(Ordering::SeqCst)
            == ticket
    }

    fn set_if_current(&self, group: GroupId, ticket: u32, content: GroupContent) {
        if self.is_current(group, ticket) {
            self.shared.groups[group.index()].content.set(content);
        }
    }

    /// Commit or discard a finished fetch.
    fn finish(
        &self,
        group: GroupId,
        ticket: u32,
        result: Result<Vec<Property>>,
    ) -> Result<FetchOutcome> {
        match result {
            Ok(list) => {
                if !self.is_current(group, ticket) {
                    debug!("sync: discarding superseded {group:?} fetch");
                    return Ok(FetchOutcome::Superseded);
                }
                let count = list.len();
                self.shared.groups[group.index()]
                    .content
                    .set(GroupContent::Ready(Arc::new(list)));
                debug!("sync: {group:?} committed ({count} properties)");
                Ok(FetchOutcome::Committed(count))
            }
            Err(e) => {
                // Leave the placeholder in place; the caller surfaces
                // the failure.
                warn!("sync: {group:?} fetch failed: {e}");
                Err(e)
            }
        }
    }

    async fn fetch_bulk(&self, group: GroupId) -> Result<Vec<Property>> {
        let body = self
            .shared
            .session
            .request(FunctionId::GetPropertiesFromGroup, |w| {
                w.put_u8(group as u8);
            })
            .await?;

        let mut r = ByteReader::new(&body);
        let count = r.read_u16().ok_or(Error::Decode {
            property: String::new(),
            kind: "group-count",
        })?;

        let mut list = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            let mut property = codec::decode_descriptor(&mut r)?;
            codec::decode_value(&mut r, &mut property)?;
            if property.group != group {
                warn!(
                    "sync: property '{}' tagged {:?} arrived in {group:?} list",
                    property.name, property.group
                );
            }
            list.push(property);
        }
        Ok(list)
    }

    async fn fetch_ids(&self, group: GroupId) -> Result<Vec<i32>> {
        let body = self
            .shared
            .session
            .request(FunctionId::GetPropertiesIdsByGroup, |w| {
                w.put_u8(group as u8);
            })
            .await?;

        let mut r = ByteReader::new(&body);
        let count = r.read_u16().ok_or(Error::Decode {
            property: String::new(),
            kind: "id-list",
        })?;
        let mut ids = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            ids.push(r.read_i32().ok_or(Error::Decode {
                property: String::new(),
                kind: "id-list",
            })?);
        }
        Ok(ids)
    }

    async fn fetch_one(&self, id: i32) -> Result<Property> {
        let info = self
            .shared
            .session
            .request(FunctionId::GetPropertyInfoById, |w| w.put_i32(id))
            .await?;
        let mut property = codec::decode_descriptor(&mut ByteReader::new(&info))?;

        let value = self
            .shared
            .session
            .request(FunctionId::GetPropertyValueById, |w| w.put_i32(id))
            .await?;
        codec::decode_value(&mut ByteReader::new(&value), &mut property)?;
        Ok(property)
    }
}

/// Merge a user edit into a cached value, enforcing kind agreement and
/// numeric bounds.
fn apply_update(target: &mut PropertyValue, update: PropertyUpdate) -> Result<()> {
    match (target, update) {
        (PropertyValue::Float { value, min, max, .. }, PropertyUpdate::Float(v)) => {
            *value = v.clamp(*min, *max);
        }
        (PropertyValue::Int { value, min, max, .. }, PropertyUpdate::Int(v)) => {
            *value = v.clamp(*min, *max);
        }
        (PropertyValue::Color(color), PropertyUpdate::Color(v)) => {
            *color = v;
        }
        (PropertyValue::Enum { labels, selected }, PropertyUpdate::EnumSelected(v)) => {
            if usize::from(v) >= labels.len() {
                return Err(Error::InvalidValue("enum index out of range"));
            }
            *selected = v;
        }
        (PropertyValue::Bool(value), PropertyUpdate::Bool(v)) => {
            *value = v;
        }
        (PropertyValue::Loading { .. }, _) => {
            return Err(Error::InvalidValue("loading placeholder is not writable"));
        }
        _ => return Err(Error::InvalidValue("update kind does not match property")),
    }
    Ok(())
}
