//! Record lifecycle shared by the metric and location endpoints
//!
//! Every mutation holds the record's lock across the store write and the
//! engine call.

use crate::error::AppError;
use crate::orchestration::{
    ConfigRecord, OrchestrationError, Orchestrator, RecordId, RecordKind, RecordPatch,
};
use crate::state::AppContext;
use crate::store::{RecordStore, StoredRecord};
use tracing::{info, warn};

/// Persist a new record and start its flow
///
/// The identifier is locked before the record becomes visible. The record
/// is removed again when activation fails.
pub async fn create(ctx: &AppContext, mut record: ConfigRecord) -> Result<StoredRecord, AppError> {
    record.set_default_site(ctx.default_site.as_deref());
    record.validate()?;

    let id = RecordStore::next_id();
    let guard = ctx.locks.acquire(&id).await;
    let result = create_locked(ctx, id.clone(), record).await;
    drop(guard);
    ctx.locks.prune(&id);
    result
}

async fn create_locked(
    ctx: &AppContext,
    id: RecordId,
    record: ConfigRecord,
) -> Result<StoredRecord, AppError> {
    let stored = ctx.store.insert(id, record).await?;

    if let Err(e) = ctx.orchestrator.activate(&stored.record, &stored.id).await {
        warn!(record_id = %stored.id, error = %e, "Activation failed, removing record");
        if let Err(cleanup) = ctx.store.delete(&stored.id).await {
            warn!(record_id = %stored.id, error = %cleanup, "Failed to remove record after activation failure");
        }
        return Err(e.into());
    }

    info!(record_id = %stored.id, kind = stored.record.kind().as_str(), "Record created");
    Ok(stored)
}

/// Records of one kind
pub async fn list(
    ctx: &AppContext,
    kind: RecordKind,
    site: Option<&str>,
) -> Result<Vec<StoredRecord>, AppError> {
    Ok(ctx.store.list(kind, site).await?)
}

/// A record of the given kind
pub async fn get(ctx: &AppContext, kind: RecordKind, id: &str) -> Result<StoredRecord, AppError> {
    ctx.store
        .get(id)
        .await?
        .filter(|stored| stored.record.kind() == kind)
        .ok_or_else(|| AppError::RecordNotFound(id.to_string()))
}

/// Apply a partial update and push it into the running flow
///
/// A change of metric name or location mode redeploys the flow under its
/// new name or template; anything else is reconciled in place. Returns the
/// record as stored afterwards. An empty patch changes nothing and leaves
/// the flow alone.
pub async fn update(ctx: &AppContext, id: &str, patch: RecordPatch) -> Result<StoredRecord, AppError> {
    let guard = ctx.locks.acquire(id).await;
    let result = update_locked(ctx, id, &patch).await;
    drop(guard);
    ctx.locks.prune(id);
    result
}

async fn update_locked(ctx: &AppContext, id: &str, patch: &RecordPatch) -> Result<StoredRecord, AppError> {
    let current = get(ctx, patch.kind(), id).await?;
    let merged = current.record.patched(patch)?;
    merged.validate()?;
    ctx.orchestrator.arguments_for(&merged, id)?;

    if Orchestrator::requires_redeploy(&current.record, &merged, id) {
        // New name or template: the running instance cannot be reused
        ctx.orchestrator.redeploy(&current.record, &merged, id).await?;
        if let Err(e) = ctx.store.update(id, patch).await {
            warn!(record_id = %id, error = %e, "Failed to persist update, restoring previous flow");
            if let Err(undo) = ctx.orchestrator.redeploy(&merged, &current.record, id).await {
                warn!(record_id = %id, error = %undo, "Failed to restore previous flow");
            }
            return Err(e.into());
        }
    } else {
        if !ctx.store.update(id, patch).await? {
            return Ok(current);
        }
        ctx.orchestrator.reconcile(&merged, id).await?;
    }

    info!(record_id = %id, "Record updated");
    get(ctx, patch.kind(), id).await
}

/// Stop the flow of a record and delete it
///
/// A flow that is already gone does not block the deletion.
pub async fn delete(ctx: &AppContext, kind: RecordKind, id: &str) -> Result<StoredRecord, AppError> {
    let guard = ctx.locks.acquire(id).await;
    let result = delete_locked(ctx, kind, id).await;
    drop(guard);
    ctx.locks.prune(id);
    result
}

async fn delete_locked(ctx: &AppContext, kind: RecordKind, id: &str) -> Result<StoredRecord, AppError> {
    let stored = get(ctx, kind, id).await?;

    match ctx.orchestrator.deactivate(&stored.record, id).await {
        Ok(()) => {}
        Err(OrchestrationError::InstanceNotFound(name)) => {
            warn!(record_id = %id, flow = %name, "Flow already absent, deleting record anyway");
        }
        Err(e) => return Err(e.into()),
    }

    ctx.store.delete(id).await?;
    info!(record_id = %id, "Record deleted");
    Ok(stored)
}
