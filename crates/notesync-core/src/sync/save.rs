//! Record saver: upsert pushed payloads one by one.

use crate::db::RecordStore;
use crate::error::{Error, Result};
use crate::models::{Item, ItemPayload, SyncField, UnsavedItem};

/// Apply each payload to the owner's record with the same uuid.
///
/// A uuid that cannot be claimed lands in the unsaved list and processing
/// moves on. Store failures abort the whole batch.
pub fn save_items<S: RecordStore + ?Sized>(
    store: &S,
    owner: &str,
    payloads: &[ItemPayload],
    fields: &[SyncField],
) -> Result<(Vec<Item>, Vec<UnsavedItem>)> {
    let mut saved = Vec::with_capacity(payloads.len());
    let mut unsaved = Vec::new();

    for payload in payloads {
        if payload.uuid.trim().is_empty() {
            unsaved.push(UnsavedItem::uuid_conflict(
                payload.clone(),
                "uuid must not be empty",
            ));
            continue;
        }

        let mut item = match store.find_or_create(owner, &payload.uuid) {
            Ok(item) => item,
            Err(err @ Error::UuidConflict(_)) => {
                tracing::warn!(error = %err, "Skipping payload with conflicting uuid");
                unsaved.push(UnsavedItem::uuid_conflict(payload.clone(), err.to_string()));
                continue;
            }
            Err(err) => return Err(err),
        };

        item.apply(payload, fields);
        store.update(&mut item)?;

        if payload.deleted == Some(true) || item.deleted {
            item.tombstone();
            store.update(&mut item)?;
        }

        saved.push(item);
    }

    tracing::debug!(
        saved = saved.len(),
        unsaved = unsaved.len(),
        "Saved sync payloads"
    );
    Ok((saved, unsaved))
}
