//! Collection reconciliation.
//!
//! A [`CollectionSyncer`] holds the in-memory view of one tenant-scoped
//! remote collection and makes the remote side match a desired snapshot by
//! minimal diff: insert what is missing, rewrite what differs, delete what
//! is no longer wanted. The view is updated optimistically before the
//! remote confirms; any remote failure abandons it and reloads the
//! authoritative snapshot.
//!
//! Not safe for two concurrent reconcile calls against the same tenant and
//! collection: there is no version token, the last call to complete wins.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::db::{RemoteCollection, TenantRecord};
use crate::errors::CoreError;

/// Whether a diff may emit delete instructions.
///
/// The stock-transaction ledger is `AppendOnly`: whatever the diff says,
/// it never receives deletes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePolicy {
    Prune,
    AppendOnly,
}

/// Operation counts of one reconcile pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.inserted == 0 && self.updated == 0 && self.deleted == 0
    }
}

pub type ChangeListener<T> = Arc<dyn Fn(&[T]) + Send + Sync>;

pub struct CollectionSyncer<T: TenantRecord> {
    name: &'static str,
    store: Arc<dyn RemoteCollection<T>>,
    delete_policy: DeletePolicy,
    view: RwLock<Vec<T>>,
    on_change: Option<ChangeListener<T>>,
}

impl<T: TenantRecord> CollectionSyncer<T> {
    pub fn new(
        name: &'static str,
        store: Arc<dyn RemoteCollection<T>>,
        delete_policy: DeletePolicy,
    ) -> Self {
        Self {
            name,
            store,
            delete_policy,
            view: RwLock::new(Vec::new()),
            on_change: None,
        }
    }

    /// Register a callback fired whenever the in-memory view changes
    /// (optimistic apply or rollback reload).
    pub fn with_change_listener(mut self, listener: ChangeListener<T>) -> Self {
        self.on_change = Some(listener);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Refresh the view from the remote store and return it.
    #[instrument(skip(self), fields(collection = self.name))]
    pub async fn load(&self, tenant_id: Uuid) -> Result<Vec<T>, CoreError> {
        let rows = self.store.select(tenant_id).await?;
        self.set_view(rows.clone()).await;
        Ok(rows)
    }

    /// Current in-memory view (may be optimistically ahead of the remote).
    pub async fn view(&self) -> Vec<T> {
        self.view.read().await.clone()
    }

    /// Make the remote collection match `desired` for this tenant.
    ///
    /// An empty `desired` on a pruning collection is refused here: wiping a
    /// tenant's collection must be asked for via [`reset_collection`], not
    /// fall out of an accidentally empty in-memory array.
    ///
    /// [`reset_collection`]: CollectionSyncer::reset_collection
    #[instrument(skip(self, desired), fields(collection = self.name, desired = desired.len()))]
    pub async fn reconcile(
        &self,
        tenant_id: Uuid,
        desired: Vec<T>,
    ) -> Result<SyncReport, CoreError> {
        if desired.is_empty() && self.delete_policy == DeletePolicy::Prune {
            return Err(CoreError::Validation(format!(
                "{}: refusing to delete every row for tenant {} from an empty snapshot; \
                 call reset_collection to wipe the collection",
                self.name, tenant_id
            )));
        }
        self.reconcile_inner(tenant_id, desired).await
    }

    /// Explicit opt-in for the "empty desired snapshot deletes everything"
    /// edge: wipes the tenant's rows on a pruning collection.
    #[instrument(skip(self), fields(collection = self.name))]
    pub async fn reset_collection(&self, tenant_id: Uuid) -> Result<SyncReport, CoreError> {
        if self.delete_policy == DeletePolicy::AppendOnly {
            return Err(CoreError::Validation(format!(
                "{}: append-only collections are never pruned",
                self.name
            )));
        }
        self.reconcile_inner(tenant_id, Vec::new()).await
    }

    /// Delete one row by id: the explicit single-row variant of reconcile
    /// used by destructive operations (quote reopen). Unlike an empty
    /// snapshot this can legally leave the collection empty.
    #[instrument(skip(self), fields(collection = self.name))]
    pub async fn remove(&self, tenant_id: Uuid, id: Uuid) -> Result<SyncReport, CoreError> {
        if self.delete_policy == DeletePolicy::AppendOnly {
            return Err(CoreError::Validation(format!(
                "{}: append-only collections are never pruned",
                self.name
            )));
        }
        let desired: Vec<T> = self
            .store
            .select(tenant_id)
            .await?
            .into_iter()
            .filter(|row| row.id() != id)
            .collect();
        self.reconcile_inner(tenant_id, desired).await
    }

    /// Append rows to the collection, leaving existing rows untouched.
    /// The write path for the ledger.
    #[instrument(skip(self, rows), fields(collection = self.name, rows = rows.len()))]
    pub async fn append(&self, tenant_id: Uuid, rows: Vec<T>) -> Result<SyncReport, CoreError> {
        let mut desired = self.store.select(tenant_id).await?;
        desired.extend(rows);
        self.reconcile_inner(tenant_id, desired).await
    }

    async fn reconcile_inner(
        &self,
        tenant_id: Uuid,
        mut desired: Vec<T>,
    ) -> Result<SyncReport, CoreError> {
        let remote = self.store.select(tenant_id).await?;

        // Enforcement point of the tenant boundary: every written record
        // carries the caller's tenant id, whatever the input said.
        for row in desired.iter_mut() {
            row.set_tenant_id(tenant_id);
        }

        let remote_by_id: HashMap<Uuid, &T> = remote.iter().map(|row| (row.id(), row)).collect();
        let desired_ids: HashSet<Uuid> = desired.iter().map(|row| row.id()).collect();

        let mut to_insert = Vec::new();
        let mut to_update = Vec::new();
        for row in &desired {
            match remote_by_id.get(&row.id()) {
                None => to_insert.push(row.clone()),
                // Full-record comparison, no field-level dirty tracking;
                // a differing row is rewritten whole.
                Some(existing) if **existing != *row => to_update.push(row.clone()),
                Some(_) => {}
            }
        }
        let to_delete: Vec<Uuid> = match self.delete_policy {
            DeletePolicy::AppendOnly => Vec::new(),
            DeletePolicy::Prune => remote
                .iter()
                .map(|row| row.id())
                .filter(|id| !desired_ids.contains(id))
                .collect(),
        };

        // Optimistic apply: the view reflects the desired snapshot before
        // the remote confirms.
        self.set_view(desired).await;

        let report = SyncReport {
            inserted: to_insert.len(),
            updated: to_update.len(),
            deleted: to_delete.len(),
        };

        if let Err(err) = self
            .apply_remote(tenant_id, to_insert, to_update, to_delete)
            .await
        {
            warn!(
                collection = self.name,
                %tenant_id,
                error = %err,
                "remote write failed, abandoning optimistic view"
            );
            self.rollback(tenant_id).await;
            return Err(err);
        }

        if !report.is_noop() {
            info!(
                collection = self.name,
                %tenant_id,
                inserted = report.inserted,
                updated = report.updated,
                deleted = report.deleted,
                "collection reconciled"
            );
        }
        Ok(report)
    }

    /// Ordering is insert, update, delete. There is no cross-record
    /// transaction; a failure mid-sequence leaves the remote partially
    /// written and is mitigated only by the rollback reload.
    async fn apply_remote(
        &self,
        tenant_id: Uuid,
        to_insert: Vec<T>,
        to_update: Vec<T>,
        to_delete: Vec<Uuid>,
    ) -> Result<(), CoreError> {
        for row in to_insert {
            self.store.insert(row).await?;
        }
        for row in to_update {
            self.store.update(row).await?;
        }
        for id in to_delete {
            self.store.delete(tenant_id, id).await?;
        }
        Ok(())
    }

    async fn rollback(&self, tenant_id: Uuid) {
        match self.store.select(tenant_id).await {
            Ok(rows) => self.set_view(rows).await,
            Err(reload_err) => {
                // The optimistic view is already wrong and the remote is
                // unreadable; leave the stale view and surface loudly.
                error!(
                    collection = self.name,
                    %tenant_id,
                    error = %reload_err,
                    "rollback reload failed, in-memory view is stale"
                );
            }
        }
    }

    async fn set_view(&self, rows: Vec<T>) {
        {
            let mut view = self.view.write().await;
            *view = rows;
        }
        if let Some(listener) = &self.on_change {
            let view = self.view.read().await;
            listener(&view);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{InMemoryCollection, StoreError};
    use assert_matches::assert_matches;
    use chrono::{DateTime, Utc};

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: Uuid,
        tenant_id: Uuid,
        label: String,
        created_at: DateTime<Utc>,
    }

    impl Row {
        fn new(tenant_id: Uuid, label: &str) -> Self {
            Self {
                id: Uuid::new_v4(),
                tenant_id,
                label: label.into(),
                created_at: Utc::now(),
            }
        }
    }

    impl TenantRecord for Row {
        fn id(&self) -> Uuid {
            self.id
        }
        fn tenant_id(&self) -> Uuid {
            self.tenant_id
        }
        fn set_tenant_id(&mut self, tenant_id: Uuid) {
            self.tenant_id = tenant_id;
        }
        fn created_at(&self) -> DateTime<Utc> {
            self.created_at
        }
    }

    fn syncer(policy: DeletePolicy) -> (Arc<InMemoryCollection<Row>>, CollectionSyncer<Row>) {
        let store = Arc::new(InMemoryCollection::new("rows"));
        let syncer = CollectionSyncer::new("rows", store.clone(), policy);
        (store, syncer)
    }

    #[tokio::test]
    async fn second_reconcile_is_a_noop() {
        let (_, syncer) = syncer(DeletePolicy::Prune);
        let tenant = Uuid::new_v4();
        let rows = vec![Row::new(tenant, "a"), Row::new(tenant, "b")];

        let first = syncer.reconcile(tenant, rows.clone()).await.unwrap();
        assert_eq!(first.inserted, 2);

        let second = syncer.reconcile(tenant, rows).await.unwrap();
        assert!(second.is_noop());
    }

    #[tokio::test]
    async fn written_tenant_id_is_always_the_callers() {
        let (store, syncer) = syncer(DeletePolicy::Prune);
        let tenant = Uuid::new_v4();
        let foreign_tenant = Uuid::new_v4();

        // The record claims to belong to another tenant; the write must not
        // honor that.
        let row = Row::new(foreign_tenant, "smuggled");
        syncer.reconcile(tenant, vec![row]).await.unwrap();

        let written = store.select(tenant).await.unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].tenant_id, tenant);
        assert!(store.select(foreign_tenant).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn changed_rows_are_rewritten_whole() {
        let (store, syncer) = syncer(DeletePolicy::Prune);
        let tenant = Uuid::new_v4();
        let mut rows = vec![Row::new(tenant, "a"), Row::new(tenant, "b")];
        syncer.reconcile(tenant, rows.clone()).await.unwrap();

        rows[0].label = "a2".into();
        let report = syncer.reconcile(tenant, rows).await.unwrap();
        assert_eq!(report.inserted, 0);
        assert_eq!(report.updated, 1);
        assert_eq!(report.deleted, 0);

        let written = store.select(tenant).await.unwrap();
        assert!(written.iter().any(|r| r.label == "a2"));
    }

    #[tokio::test]
    async fn removed_rows_are_deleted_on_pruning_collections() {
        let (store, syncer) = syncer(DeletePolicy::Prune);
        let tenant = Uuid::new_v4();
        let rows = vec![Row::new(tenant, "keep"), Row::new(tenant, "drop")];
        syncer.reconcile(tenant, rows.clone()).await.unwrap();

        let report = syncer.reconcile(tenant, vec![rows[0].clone()]).await.unwrap();
        assert_eq!(report.deleted, 1);
        assert_eq!(store.select(tenant).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn append_only_collections_never_receive_deletes() {
        let (store, syncer) = syncer(DeletePolicy::AppendOnly);
        let tenant = Uuid::new_v4();
        let rows = vec![Row::new(tenant, "t1"), Row::new(tenant, "t2")];
        syncer.reconcile(tenant, rows.clone()).await.unwrap();

        // A desired snapshot missing t2 must not delete it.
        let report = syncer.reconcile(tenant, vec![rows[0].clone()]).await.unwrap();
        assert_eq!(report.deleted, 0);
        assert_eq!(store.select(tenant).await.unwrap().len(), 2);

        // Neither must an empty one.
        let report = syncer.reconcile(tenant, vec![]).await.unwrap();
        assert!(report.is_noop());
        assert_eq!(store.select(tenant).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_snapshot_requires_explicit_reset() {
        let (store, syncer) = syncer(DeletePolicy::Prune);
        let tenant = Uuid::new_v4();
        syncer
            .reconcile(tenant, vec![Row::new(tenant, "a")])
            .await
            .unwrap();

        let err = syncer.reconcile(tenant, vec![]).await.unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
        assert_eq!(store.select(tenant).await.unwrap().len(), 1);

        let report = syncer.reset_collection(tenant).await.unwrap();
        assert_eq!(report.deleted, 1);
        assert!(store.select(tenant).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_may_leave_the_collection_empty() {
        let (store, syncer) = syncer(DeletePolicy::Prune);
        let tenant = Uuid::new_v4();
        let row = Row::new(tenant, "only one");
        syncer.reconcile(tenant, vec![row.clone()]).await.unwrap();

        let report = syncer.remove(tenant, row.id).await.unwrap();
        assert_eq!(report.deleted, 1);
        assert!(store.select(tenant).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reset_does_not_touch_other_tenants() {
        let (store, syncer) = syncer(DeletePolicy::Prune);
        let tenant = Uuid::new_v4();
        let other = Uuid::new_v4();
        store.seed(Row::new(other, "theirs"));
        syncer
            .reconcile(tenant, vec![Row::new(tenant, "mine")])
            .await
            .unwrap();

        syncer.reset_collection(tenant).await.unwrap();
        assert!(store.select(tenant).await.unwrap().is_empty());
        assert_eq!(store.select(other).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_write_reloads_the_authoritative_snapshot() {
        let (store, syncer) = syncer(DeletePolicy::Prune);
        let tenant = Uuid::new_v4();
        let row = Row::new(tenant, "committed");
        syncer.reconcile(tenant, vec![row.clone()]).await.unwrap();

        store.fail_next_write(StoreError::Rejected("disk full".into()));
        let mut changed = row.clone();
        changed.label = "never lands".into();
        let err = syncer.reconcile(tenant, vec![changed]).await.unwrap_err();
        assert_matches!(err, CoreError::RemoteWrite { .. });

        // The optimistic view was abandoned for the remote truth.
        let view = syncer.view().await;
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].label, "committed");
    }

    #[tokio::test]
    async fn unique_violation_is_surfaced_as_such() {
        let (store, syncer) = syncer(DeletePolicy::Prune);
        let tenant = Uuid::new_v4();
        store.fail_next_write(StoreError::UniqueViolation("code GL-6 taken".into()));

        let err = syncer
            .reconcile(tenant, vec![Row::new(tenant, "dup")])
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn change_listener_sees_optimistic_apply_and_rollback() {
        let store: Arc<InMemoryCollection<Row>> = Arc::new(InMemoryCollection::new("rows"));
        let seen = Arc::new(std::sync::Mutex::new(Vec::<usize>::new()));
        let seen_by_listener = seen.clone();
        let syncer = CollectionSyncer::new("rows", store.clone(), DeletePolicy::Prune)
            .with_change_listener(Arc::new(move |rows: &[Row]| {
                seen_by_listener.lock().unwrap().push(rows.len());
            }));

        let tenant = Uuid::new_v4();
        syncer
            .reconcile(tenant, vec![Row::new(tenant, "a")])
            .await
            .unwrap();

        store.fail_next_write(StoreError::Rejected("boom".into()));
        let _ = syncer
            .reconcile(tenant, vec![Row::new(tenant, "a"), Row::new(tenant, "b")])
            .await;

        // First reconcile: optimistic apply of 1. Second: optimistic apply
        // of 2, then rollback reload back to 1.
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 1]);
    }
}
