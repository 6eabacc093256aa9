//! In-memory store
//!
//! Thread-safe implementation of the full store trait catalogue for
//! development and tests. All tables live behind one `RwLock`, so the
//! composite commits are genuinely atomic: readers observe either none or
//! all of a commit's writes. Row-level document locks are a registry of
//! per-document mutexes independent of the table lock.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

use tessera_core::types::{
    ApprovedAssignment, BaseDocument, ContentSetId, Document, DocumentId, DocumentStatus,
    EncryptedContentSet, EncryptionKeyRecord, KeyId, KeyShareRecord, OrganizationId,
    ReconstructionEvent, SecurityProfile,
};

use crate::error::{StoreError, StoreResult};
use crate::traits::{
    AccessGrant, AccessLevel, AccessLevelStore, AssignmentStore, BaseDocumentStore,
    ContentSetStore, DeconstructionCommit, DestructionCommit, DestructionScope, DocumentLock,
    DocumentStore, GrantStore, KeyRecordStore, LegalHold, LegalHoldStore,
    ReconstructionEventStore, RotationCommit, SecurityProfileStore, ShareStore, TransactionStore,
};

#[derive(Default)]
struct MemoryState {
    documents: HashMap<DocumentId, Document>,
    assignments: HashMap<(DocumentId, String), Vec<ApprovedAssignment>>,
    content_sets: HashMap<(DocumentId, ContentSetId), EncryptedContentSet>,
    keys: HashMap<KeyId, EncryptionKeyRecord>,
    shares: HashMap<KeyId, Vec<KeyShareRecord>>,
    base_documents: HashMap<DocumentId, BaseDocument>,
    reconstructions: Vec<ReconstructionEvent>,
    grants: Vec<AccessGrant>,
    access_levels: HashMap<(OrganizationId, String), AccessLevel>,
    profiles: HashMap<OrganizationId, SecurityProfile>,
    holds: HashMap<DocumentId, Vec<LegalHold>>,
}

/// In-memory store implementing every persistence trait
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    row_locks: Mutex<HashMap<DocumentId, Arc<tokio::sync::Mutex<()>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            row_locks: Mutex::new(HashMap::new()),
        }
    }

    fn row_lock(&self, id: &DocumentId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.row_locks.lock().expect("row lock registry poisoned");
        locks
            .entry(id.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Failure injection: mutate a stored content-set row in place,
    /// bypassing the engine write path. Simulates a storage adversary in
    /// tamper-detection tests.
    pub async fn tamper_content_set<F>(
        &self,
        document_id: &DocumentId,
        set: &ContentSetId,
        mutate: F,
    ) -> StoreResult<()>
    where
        F: FnOnce(&mut EncryptedContentSet),
    {
        let mut state = self.state.write().await;
        let row = state
            .content_sets
            .get_mut(&(document_id.clone(), set.clone()))
            .ok_or_else(|| {
                StoreError::NotFound(format!("content set {}/{}", document_id, set))
            })?;
        mutate(row);
        Ok(())
    }

    /// Failure injection: mutate the stored base document in place.
    pub async fn tamper_base_document<F>(
        &self,
        document_id: &DocumentId,
        mutate: F,
    ) -> StoreResult<()>
    where
        F: FnOnce(&mut BaseDocument),
    {
        let mut state = self.state.write().await;
        let base = state
            .base_documents
            .get_mut(document_id)
            .ok_or_else(|| StoreError::NotFound(format!("base document {}", document_id)))?;
        mutate(base);
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_document(&self, document: Document) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.documents.contains_key(&document.id) {
            return Err(StoreError::Conflict(format!(
                "document {} already exists",
                document.id
            )));
        }
        state.documents.insert(document.id.clone(), document);
        Ok(())
    }

    async fn get_document(&self, id: &DocumentId) -> StoreResult<Option<Document>> {
        Ok(self.state.read().await.documents.get(id).cloned())
    }

    async fn lock_document(&self, id: &DocumentId) -> StoreResult<DocumentLock> {
        let lock = self.row_lock(id);
        let guard = lock.lock_owned().await;
        Ok(DocumentLock::new(guard, id.clone()))
    }

    async fn update_status(
        &self,
        id: &DocumentId,
        from: DocumentStatus,
        to: DocumentStatus,
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let document = state
            .documents
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("document {}", id)))?;
        if document.status != from {
            return Err(StoreError::Conflict(format!(
                "document {} is {}, expected {}",
                id, document.status, from
            )));
        }
        document.status = to;
        document.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl AssignmentStore for MemoryStore {
    async fn put_approved_set(
        &self,
        document_id: &DocumentId,
        session_id: &str,
        assignments: Vec<ApprovedAssignment>,
    ) -> StoreResult<()> {
        self.state
            .write()
            .await
            .assignments
            .insert((document_id.clone(), session_id.to_string()), assignments);
        Ok(())
    }

    async fn load_approved_set(
        &self,
        document_id: &DocumentId,
        session_id: &str,
    ) -> StoreResult<Option<Vec<ApprovedAssignment>>> {
        Ok(self
            .state
            .read()
            .await
            .assignments
            .get(&(document_id.clone(), session_id.to_string()))
            .cloned())
    }
}

#[async_trait]
impl ContentSetStore for MemoryStore {
    async fn get_content_set(
        &self,
        document_id: &DocumentId,
        set: &ContentSetId,
    ) -> StoreResult<Option<EncryptedContentSet>> {
        Ok(self
            .state
            .read()
            .await
            .content_sets
            .get(&(document_id.clone(), set.clone()))
            .cloned())
    }

    async fn list_content_sets(
        &self,
        document_id: &DocumentId,
    ) -> StoreResult<Vec<EncryptedContentSet>> {
        let state = self.state.read().await;
        let mut sets: Vec<EncryptedContentSet> = state
            .content_sets
            .values()
            .filter(|row| &row.document_id == document_id)
            .cloned()
            .collect();
        sets.sort_by(|a, b| a.content_set_identifier.cmp(&b.content_set_identifier));
        Ok(sets)
    }
}

#[async_trait]
impl KeyRecordStore for MemoryStore {
    async fn get_key(&self, id: &KeyId) -> StoreResult<Option<EncryptionKeyRecord>> {
        Ok(self.state.read().await.keys.get(id).cloned())
    }

    async fn active_key_for(
        &self,
        document_id: &DocumentId,
        set: &ContentSetId,
    ) -> StoreResult<Option<EncryptionKeyRecord>> {
        let state = self.state.read().await;
        Ok(state
            .keys
            .values()
            .find(|k| {
                k.is_active && &k.document_id == document_id && &k.content_set_identifier == set
            })
            .cloned())
    }

    async fn list_keys_for_document(
        &self,
        document_id: &DocumentId,
    ) -> StoreResult<Vec<EncryptionKeyRecord>> {
        let state = self.state.read().await;
        let mut keys: Vec<EncryptionKeyRecord> = state
            .keys
            .values()
            .filter(|k| &k.document_id == document_id)
            .cloned()
            .collect();
        keys.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(keys)
    }
}

#[async_trait]
impl ShareStore for MemoryStore {
    async fn list_shares_for_key(&self, key_id: &KeyId) -> StoreResult<Vec<KeyShareRecord>> {
        Ok(self
            .state
            .read()
            .await
            .shares
            .get(key_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn mark_share_distributed(&self, key_id: &KeyId, share_index: u8) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let shares = state
            .shares
            .get_mut(key_id)
            .ok_or_else(|| StoreError::NotFound(format!("shares for key {}", key_id)))?;
        let share = shares
            .iter_mut()
            .find(|s| s.share_index == share_index)
            .ok_or_else(|| {
                StoreError::NotFound(format!("share {} for key {}", share_index, key_id))
            })?;
        share.mark_distributed();
        Ok(())
    }
}

#[async_trait]
impl BaseDocumentStore for MemoryStore {
    async fn get_base_document(
        &self,
        document_id: &DocumentId,
    ) -> StoreResult<Option<BaseDocument>> {
        Ok(self.state.read().await.base_documents.get(document_id).cloned())
    }
}

#[async_trait]
impl ReconstructionEventStore for MemoryStore {
    async fn record_reconstruction(&self, event: ReconstructionEvent) -> StoreResult<()> {
        self.state.write().await.reconstructions.push(event);
        Ok(())
    }

    async fn list_reconstructions(
        &self,
        document_id: &DocumentId,
    ) -> StoreResult<Vec<ReconstructionEvent>> {
        Ok(self
            .state
            .read()
            .await
            .reconstructions
            .iter()
            .filter(|e| &e.document_id == document_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl GrantStore for MemoryStore {
    async fn put_grant(&self, grant: AccessGrant) -> StoreResult<()> {
        self.state.write().await.grants.push(grant);
        Ok(())
    }

    async fn find_grant(
        &self,
        user_id: &str,
        document_id: &DocumentId,
        access_level_id: &str,
        organization_id: &OrganizationId,
    ) -> StoreResult<Option<AccessGrant>> {
        let state = self.state.read().await;
        Ok(state
            .grants
            .iter()
            .find(|g| {
                g.user_id == user_id
                    && &g.document_id == document_id
                    && g.access_level_id == access_level_id
                    && &g.organization_id == organization_id
            })
            .cloned())
    }
}

#[async_trait]
impl AccessLevelStore for MemoryStore {
    async fn put_access_level(&self, level: AccessLevel) -> StoreResult<()> {
        self.state.write().await.access_levels.insert(
            (level.organization_id.clone(), level.access_level_id.clone()),
            level,
        );
        Ok(())
    }

    async fn get_access_level(
        &self,
        organization_id: &OrganizationId,
        access_level_id: &str,
    ) -> StoreResult<Option<AccessLevel>> {
        Ok(self
            .state
            .read()
            .await
            .access_levels
            .get(&(organization_id.clone(), access_level_id.to_string()))
            .cloned())
    }
}

#[async_trait]
impl SecurityProfileStore for MemoryStore {
    async fn put_profile(&self, profile: SecurityProfile) -> StoreResult<()> {
        self.state
            .write()
            .await
            .profiles
            .insert(profile.organization_id.clone(), profile);
        Ok(())
    }

    async fn get_profile(
        &self,
        organization_id: &OrganizationId,
    ) -> StoreResult<Option<SecurityProfile>> {
        Ok(self.state.read().await.profiles.get(organization_id).cloned())
    }
}

#[async_trait]
impl LegalHoldStore for MemoryStore {
    async fn place_hold(&self, hold: LegalHold) -> StoreResult<()> {
        self.state
            .write()
            .await
            .holds
            .entry(hold.document_id.clone())
            .or_default()
            .push(hold);
        Ok(())
    }

    async fn release_hold(&self, hold_id: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        for holds in state.holds.values_mut() {
            if let Some(hold) = holds.iter_mut().find(|h| h.hold_id == hold_id) {
                hold.released_at = Some(Utc::now());
                return Ok(());
            }
        }
        Err(StoreError::NotFound(format!("legal hold {}", hold_id)))
    }

    async fn has_active_hold(&self, document_id: &DocumentId) -> StoreResult<bool> {
        Ok(self
            .state
            .read()
            .await
            .holds
            .get(document_id)
            .map(|holds| holds.iter().any(|h| h.is_active()))
            .unwrap_or(false))
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn commit_deconstruction(&self, commit: DeconstructionCommit) -> StoreResult<()> {
        let mut state = self.state.write().await;

        let document = state
            .documents
            .get(&commit.document_id)
            .ok_or_else(|| StoreError::NotFound(format!("document {}", commit.document_id)))?;
        if document.status != DocumentStatus::Deconstructing {
            return Err(StoreError::Conflict(format!(
                "document {} is {}, expected deconstructing",
                commit.document_id, document.status
            )));
        }

        for row in &commit.content_sets {
            let key = (row.document_id.clone(), row.content_set_identifier.clone());
            if state.content_sets.contains_key(&key) {
                return Err(StoreError::Conflict(format!(
                    "content set {} already exists for document {}",
                    row.content_set_identifier, row.document_id
                )));
            }
        }
        for record in &commit.key_records {
            let duplicate_active = state.keys.values().any(|k| {
                k.is_active
                    && k.document_id == record.document_id
                    && k.content_set_identifier == record.content_set_identifier
            });
            if duplicate_active {
                return Err(StoreError::Conflict(format!(
                    "active key already exists for {}/{}",
                    record.document_id, record.content_set_identifier
                )));
            }
        }

        for row in commit.content_sets {
            state.content_sets.insert(
                (row.document_id.clone(), row.content_set_identifier.clone()),
                row,
            );
        }
        for record in commit.key_records {
            state.keys.insert(record.id.clone(), record);
        }
        for share in commit.share_records {
            state.shares.entry(share.key_id.clone()).or_default().push(share);
        }
        state
            .base_documents
            .insert(commit.document_id.clone(), commit.base_document);

        let document = state
            .documents
            .get_mut(&commit.document_id)
            .expect("checked above");
        document.status = DocumentStatus::Active;
        document.updated_at = Utc::now();

        Ok(())
    }

    async fn commit_rotation(&self, commit: RotationCommit) -> StoreResult<()> {
        let mut state = self.state.write().await;

        let document = state
            .documents
            .get(&commit.document_id)
            .ok_or_else(|| StoreError::NotFound(format!("document {}", commit.document_id)))?;
        if document.status != DocumentStatus::Active {
            return Err(StoreError::Conflict(format!(
                "document {} is {}, expected active",
                commit.document_id, document.status
            )));
        }

        for record in commit.deactivated_keys {
            state.keys.insert(record.id.clone(), record);
        }
        for record in commit.new_keys {
            state.keys.insert(record.id.clone(), record);
        }
        for share in commit.new_shares {
            state.shares.entry(share.key_id.clone()).or_default().push(share);
        }
        for row in commit.updated_content_sets {
            state.content_sets.insert(
                (row.document_id.clone(), row.content_set_identifier.clone()),
                row,
            );
        }

        Ok(())
    }

    async fn commit_destruction(&self, commit: DestructionCommit) -> StoreResult<()> {
        let mut state = self.state.write().await;

        let document = state
            .documents
            .get(&commit.document_id)
            .ok_or_else(|| StoreError::NotFound(format!("document {}", commit.document_id)))?;

        match &commit.scope {
            DestructionScope::Document => {
                if document.status != DocumentStatus::Destroying {
                    return Err(StoreError::Conflict(format!(
                        "document {} is {}, expected destroying",
                        commit.document_id, document.status
                    )));
                }

                state
                    .content_sets
                    .retain(|(doc, _), _| doc != &commit.document_id);
                state.base_documents.remove(&commit.document_id);

                let doc_key_ids: Vec<KeyId> = state
                    .keys
                    .values()
                    .filter(|k| k.document_id == commit.document_id)
                    .map(|k| k.id.clone())
                    .collect();
                for key_id in &doc_key_ids {
                    state.shares.remove(key_id);
                }
                for record in commit.destroyed_keys {
                    state.keys.insert(record.id.clone(), record);
                }

                let document = state
                    .documents
                    .get_mut(&commit.document_id)
                    .expect("checked above");
                document.status = DocumentStatus::Destroyed;
                document.updated_at = Utc::now();
            }
            DestructionScope::ContentSet(set) => {
                if document.status != DocumentStatus::Active {
                    return Err(StoreError::Conflict(format!(
                        "document {} is {}, expected active",
                        commit.document_id, document.status
                    )));
                }

                state
                    .content_sets
                    .remove(&(commit.document_id.clone(), set.clone()));

                let set_key_ids: Vec<KeyId> = state
                    .keys
                    .values()
                    .filter(|k| {
                        k.document_id == commit.document_id && &k.content_set_identifier == set
                    })
                    .map(|k| k.id.clone())
                    .collect();
                for key_id in &set_key_ids {
                    state.shares.remove(key_id);
                }
                for record in commit.destroyed_keys {
                    state.keys.insert(record.id.clone(), record);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tessera_core::types::{EncryptedEnvelope, KeyHandle, Sha512Digest, AES_256_GCM};

    fn document(id: &str, status: DocumentStatus) -> Document {
        Document::new(
            DocumentId::new(id),
            OrganizationId::new("org:1"),
            status,
        )
    }

    fn envelope(set: &str, key_id: &KeyId) -> EncryptedEnvelope {
        EncryptedEnvelope {
            content_set_identifier: ContentSetId::new(set),
            iv: vec![0u8; 12],
            auth_tag: vec![0u8; 16],
            ciphertext: vec![1, 2, 3],
            plaintext_hash: Sha512Digest::compute(b"p"),
            ciphertext_hash: Sha512Digest::compute(&[1, 2, 3]),
            key_id: key_id.clone(),
            algorithm: AES_256_GCM.to_string(),
            encrypted_at: Utc::now(),
        }
    }

    fn deconstruction_commit(doc_id: &DocumentId) -> DeconstructionCommit {
        let key = EncryptionKeyRecord::new(
            KeyId::new("key:test"),
            doc_id.clone(),
            ContentSetId::new("CS-A"),
            OrganizationId::new("org:1"),
            KeyHandle::new("hsm:1"),
            AES_256_GCM,
            2,
            3,
        )
        .unwrap();
        let shares = (1..=3u8)
            .map(|i| KeyShareRecord::new(key.id.clone(), i, format!("holder:{}", i)))
            .collect();
        DeconstructionCommit {
            document_id: doc_id.clone(),
            base_document: BaseDocument {
                document_id: doc_id.clone(),
                content: "[]".to_string(),
                content_hash: Sha512Digest::compute(b"[]"),
                markers: vec![],
                created_at: Utc::now(),
            },
            content_sets: vec![EncryptedContentSet {
                document_id: doc_id.clone(),
                content_set_identifier: ContentSetId::new("CS-A"),
                envelope: envelope("CS-A", &key.id),
                storage_ref: "tier_1/cs-a".to_string(),
                key_id: key.id.clone(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            }],
            key_records: vec![key],
            share_records: shares,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_document() {
        let store = MemoryStore::new();
        store
            .insert_document(document("doc:1", DocumentStatus::Approved))
            .await
            .unwrap();

        let loaded = store
            .get_document(&DocumentId::new("doc:1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.status, DocumentStatus::Approved);

        // Duplicate insert conflicts
        assert!(store
            .insert_document(document("doc:1", DocumentStatus::Approved))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_update_status_cas() {
        let store = MemoryStore::new();
        store
            .insert_document(document("doc:1", DocumentStatus::Approved))
            .await
            .unwrap();

        store
            .update_status(
                &DocumentId::new("doc:1"),
                DocumentStatus::Approved,
                DocumentStatus::Deconstructing,
            )
            .await
            .unwrap();

        // Stale expectation fails
        let err = store
            .update_status(
                &DocumentId::new("doc:1"),
                DocumentStatus::Approved,
                DocumentStatus::Deconstructing,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_commit_deconstruction_atomicity() {
        let store = MemoryStore::new();
        let doc_id = DocumentId::new("doc:1");
        store
            .insert_document(document("doc:1", DocumentStatus::Deconstructing))
            .await
            .unwrap();

        store
            .commit_deconstruction(deconstruction_commit(&doc_id))
            .await
            .unwrap();

        let doc = store.get_document(&doc_id).await.unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Active);
        assert!(store.get_base_document(&doc_id).await.unwrap().is_some());
        assert_eq!(store.list_content_sets(&doc_id).await.unwrap().len(), 1);
        let key = store
            .active_key_for(&doc_id, &ContentSetId::new("CS-A"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(store.list_shares_for_key(&key.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_commit_deconstruction_requires_deconstructing() {
        let store = MemoryStore::new();
        let doc_id = DocumentId::new("doc:1");
        store
            .insert_document(document("doc:1", DocumentStatus::Approved))
            .await
            .unwrap();

        let err = store
            .commit_deconstruction(deconstruction_commit(&doc_id))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        // Nothing leaked
        assert!(store.get_base_document(&doc_id).await.unwrap().is_none());
        assert!(store.list_content_sets(&doc_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_destruction_removes_rows() {
        let store = MemoryStore::new();
        let doc_id = DocumentId::new("doc:1");
        store
            .insert_document(document("doc:1", DocumentStatus::Deconstructing))
            .await
            .unwrap();
        store
            .commit_deconstruction(deconstruction_commit(&doc_id))
            .await
            .unwrap();

        let mut key = store
            .active_key_for(&doc_id, &ContentSetId::new("CS-A"))
            .await
            .unwrap()
            .unwrap();
        let key_id = key.id.clone();
        key.deactivate_destroyed();

        store
            .update_status(&doc_id, DocumentStatus::Active, DocumentStatus::Destroying)
            .await
            .unwrap();
        store
            .commit_destruction(DestructionCommit {
                document_id: doc_id.clone(),
                scope: DestructionScope::Document,
                destroyed_keys: vec![key],
            })
            .await
            .unwrap();

        let doc = store.get_document(&doc_id).await.unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Destroyed);
        assert!(store.get_base_document(&doc_id).await.unwrap().is_none());
        assert!(store.list_content_sets(&doc_id).await.unwrap().is_empty());
        assert!(store.list_shares_for_key(&key_id).await.unwrap().is_empty());
        let stored_key = store.get_key(&key_id).await.unwrap().unwrap();
        assert!(!stored_key.is_active);
        assert!(stored_key.destroyed_at.is_some());
    }

    #[tokio::test]
    async fn test_legal_holds() {
        let store = MemoryStore::new();
        let doc_id = DocumentId::new("doc:1");
        assert!(!store.has_active_hold(&doc_id).await.unwrap());

        store
            .place_hold(LegalHold {
                hold_id: "hold:1".to_string(),
                document_id: doc_id.clone(),
                case_ref: "case:9".to_string(),
                applied_at: Utc::now(),
                released_at: None,
            })
            .await
            .unwrap();
        assert!(store.has_active_hold(&doc_id).await.unwrap());

        store.release_hold("hold:1").await.unwrap();
        assert!(!store.has_active_hold(&doc_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_document_lock_serializes() {
        let store = Arc::new(MemoryStore::new());
        let doc_id = DocumentId::new("doc:1");

        let lock = store.lock_document(&doc_id).await.unwrap();

        // A second acquisition must block until the first is dropped
        let store2 = store.clone();
        let doc_id2 = doc_id.clone();
        let attempt = tokio::spawn(async move { store2.lock_document(&doc_id2).await });

        tokio::task::yield_now().await;
        assert!(!attempt.is_finished());

        drop(lock);
        attempt.await.unwrap().unwrap();
    }
}
