//! End-to-end lifecycle scenarios over the in-memory stores and the
//! development HSM provider: deconstruction, tailored reconstruction,
//! cross-set overlap, tampering, key rotation, Shamir recovery, and
//! verified destruction.

use std::sync::Arc;

use tessera_core::crypto::shamir;
use tessera_core::types::{
    ApprovedAssignment, AuthorizationProviderKind, ContentSetId, Document, DocumentId,
    DocumentStatus, IntegrityFailurePolicy, OrganizationId, SecurityProfile, Sha512Digest,
    StorageTier,
};
use tessera_core::CoreError;
use tessera_engine::{
    ConventionalProvider, EngineContext, EngineError, TesseraEngine,
};
use tessera_hsm::DevHsmProvider;
use tessera_store::{
    AccessGrant, AccessLevel, AccessLevelStore, AssignmentStore, AuditSink, BaseDocumentStore,
    ContentSetStore, DocumentStore, GrantStore, KeyRecordStore, LegalHold, LegalHoldStore,
    MemoryAnchorSink, MemoryAuditSink, MemoryStore, ReconstructionEventStore,
    SecurityProfileStore, ShareStore,
};

const DOC: &str = "doc:annual-report";
const ORG: &str = "org:acme";
const SESSION: &str = "session:markup-1";
const VIEWER: &str = "viewer:jordan";
const REDACTED: &str = "\u{2588}\u{2588}\u{2588}";

struct Harness {
    store: Arc<MemoryStore>,
    audit: Arc<MemoryAuditSink>,
    anchor: Arc<MemoryAnchorSink>,
    engine: TesseraEngine,
}

fn doc_id() -> DocumentId {
    DocumentId::new(DOC)
}

fn org_id() -> OrganizationId {
    OrganizationId::new(ORG)
}

fn assignment(set: &str, block: &str, text: &str, page: u32) -> ApprovedAssignment {
    ApprovedAssignment {
        content_set_identifier: ContentSetId::new(set),
        block_id: block.to_string(),
        start_offset: Some(0),
        end_offset: Some(text.len() as u32),
        selected_text: Some(text.to_string()),
        page_number: page,
    }
}

fn scenario_a_assignments() -> Vec<ApprovedAssignment> {
    vec![
        assignment("CS-PUBLIC", "block-1", "Public statement.", 1),
        assignment("CS-CONFIDENTIAL", "block-2", "Budget $4.2M.", 1),
        assignment("CS-SECRET", "block-3", "Agent Smith.", 2),
    ]
}

async fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let audit = Arc::new(MemoryAuditSink::new());
    let anchor = Arc::new(MemoryAnchorSink::new());
    let hsm = Arc::new(DevHsmProvider::new());
    let authorization = Arc::new(ConventionalProvider::new(
        store.clone(),
        store.clone(),
        store.clone(),
    ));

    let ctx = EngineContext::for_memory_store(
        store.clone(),
        audit.clone(),
        anchor.clone(),
        hsm,
        authorization,
    );

    Harness {
        store,
        audit,
        anchor,
        engine: TesseraEngine::new(ctx),
    }
}

/// Seed a document in `approved`, the tenant profile (M=2, N=3, width 3),
/// the scenario-A assignment set, access levels, and grants for VIEWER.
async fn seed(h: &Harness, assignments: Vec<ApprovedAssignment>) {
    h.store
        .insert_document(Document::new(doc_id(), org_id(), DocumentStatus::Approved))
        .await
        .unwrap();

    h.store
        .put_profile(SecurityProfile {
            organization_id: org_id(),
            shamir_threshold: 2,
            shamir_total_shares: 3,
            storage_tier: StorageTier::Tier1,
            marker_width: 3,
            export_permitted: true,
            min_retention_days: 0,
            authorization_provider: AuthorizationProviderKind::Conventional,
            share_holder_ids: vec![
                "holder:legal".into(),
                "holder:compliance".into(),
                "holder:security".into(),
            ],
            integrity_failure_policy: IntegrityFailurePolicy::ProceedWithRedaction,
        })
        .await
        .unwrap();

    h.store
        .put_approved_set(&doc_id(), SESSION, assignments)
        .await
        .unwrap();

    let levels: &[(&str, &[&str])] = &[
        ("level:public", &["CS-PUBLIC"]),
        ("level:confidential", &["CS-PUBLIC", "CS-CONFIDENTIAL"]),
        ("level:all", &["CS-PUBLIC", "CS-CONFIDENTIAL", "CS-SECRET"]),
        ("level:secret", &["CS-SECRET"]),
    ];
    for (level_id, sets) in levels {
        h.store
            .put_access_level(AccessLevel {
                organization_id: org_id(),
                access_level_id: level_id.to_string(),
                content_sets: sets.iter().map(|s| ContentSetId::new(*s)).collect(),
                is_active: true,
            })
            .await
            .unwrap();
        h.store
            .put_grant(AccessGrant {
                user_id: VIEWER.to_string(),
                document_id: doc_id(),
                access_level_id: level_id.to_string(),
                organization_id: org_id(),
                granted_at: chrono::Utc::now(),
                expires_at: None,
                revoked_at: None,
            })
            .await
            .unwrap();
    }
}

fn view_contents(view: &tessera_core::types::ReconstructedView) -> Vec<String> {
    view.blocks.iter().map(|b| b.content.clone()).collect()
}

#[tokio::test]
async fn scenario_a_happy_path() {
    let h = harness().await;
    seed(&h, scenario_a_assignments()).await;

    let outcome = h.engine.deconstruct(&doc_id(), SESSION).await.unwrap();
    assert_eq!(outcome.content_sets.len(), 3);
    assert_eq!(outcome.marker_count, 3);
    assert!(outcome.anchor_tx_id.is_some());

    // Document is active; three envelopes; three active key records
    let doc = h.store.get_document(&doc_id()).await.unwrap().unwrap();
    assert_eq!(doc.status, DocumentStatus::Active);
    assert_eq!(h.store.list_content_sets(&doc_id()).await.unwrap().len(), 3);
    let keys = h.store.list_keys_for_document(&doc_id()).await.unwrap();
    assert_eq!(keys.len(), 3);
    assert!(keys.iter().all(|k| k.is_active));

    // Three shares of metadata per key, none distributed yet
    for key in &keys {
        let shares = h.store.list_shares_for_key(&key.id).await.unwrap();
        assert_eq!(shares.len(), 3);
        assert!(shares.iter().all(|s| !s.distributed));
    }

    // Base document: three markers at sequence positions 1, 2, 3
    let base = h.store.get_base_document(&doc_id()).await.unwrap().unwrap();
    let mut positions: Vec<u32> = base.markers.iter().map(|m| m.sequence_position).collect();
    positions.sort_unstable();
    assert_eq!(positions, vec![1, 2, 3]);

    // Tailored views per access level
    let public = h
        .engine
        .reconstruct(&doc_id(), VIEWER, "level:public")
        .await
        .unwrap();
    assert_eq!(
        view_contents(&public),
        vec!["Public statement.", REDACTED, REDACTED]
    );
    assert!(public.integrity_all_passed);

    let confidential = h
        .engine
        .reconstruct(&doc_id(), VIEWER, "level:confidential")
        .await
        .unwrap();
    assert_eq!(
        view_contents(&confidential),
        vec!["Public statement.", "Budget $4.2M.", REDACTED]
    );

    let all = h
        .engine
        .reconstruct(&doc_id(), VIEWER, "level:all")
        .await
        .unwrap();
    assert_eq!(
        view_contents(&all),
        vec!["Public statement.", "Budget $4.2M.", "Agent Smith."]
    );
    assert!(all.blocks.iter().all(|b| !b.is_redacted));

    // Exactly one primary audit event per operation kind
    assert_eq!(
        h.audit
            .events_of_type("document.deconstructed")
            .await
            .unwrap()
            .len(),
        1
    );
    assert_eq!(
        h.audit
            .events_of_type("document.reconstructed")
            .await
            .unwrap()
            .len(),
        3
    );

    // One reconstruction event per attempt
    let events = h.store.list_reconstructions(&doc_id()).await.unwrap();
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|e| e.marker_width == 3));
}

#[tokio::test]
async fn scenario_b_cross_set_overlap() {
    let h = harness().await;
    let mut assignments = scenario_a_assignments();
    // "Budget $4.2M." also belongs to CS-SECRET at the same position
    assignments.push(assignment("CS-SECRET", "block-2", "Budget $4.2M.", 1));
    seed(&h, assignments).await;

    h.engine.deconstruct(&doc_id(), SESSION).await.unwrap();

    // Three positions, three markers; the budget marker is merged
    let base = h.store.get_base_document(&doc_id()).await.unwrap().unwrap();
    assert_eq!(base.markers.len(), 3);
    let budget = base
        .markers
        .iter()
        .find(|m| m.block_id == "block-2")
        .unwrap();
    assert!(budget.is_merged);
    assert_eq!(
        budget.content_set_membership,
        vec![
            ContentSetId::new("CS-CONFIDENTIAL"),
            ContentSetId::new("CS-SECRET")
        ]
    );

    // A secret-only viewer sees the overlap content via CS-SECRET
    let secret = h
        .engine
        .reconstruct(&doc_id(), VIEWER, "level:secret")
        .await
        .unwrap();
    assert_eq!(
        view_contents(&secret),
        vec![REDACTED, "Budget $4.2M.", "Agent Smith."]
    );

    // A public-only viewer still sees none of it
    let public = h
        .engine
        .reconstruct(&doc_id(), VIEWER, "level:public")
        .await
        .unwrap();
    assert_eq!(
        view_contents(&public),
        vec!["Public statement.", REDACTED, REDACTED]
    );
}

#[tokio::test]
async fn scenario_c_ciphertext_tampering() {
    let h = harness().await;
    seed(&h, scenario_a_assignments()).await;
    h.engine.deconstruct(&doc_id(), SESSION).await.unwrap();

    // Storage adversary flips one ciphertext byte of CS-CONFIDENTIAL
    h.store
        .tamper_content_set(&doc_id(), &ContentSetId::new("CS-CONFIDENTIAL"), |row| {
            row.envelope.ciphertext[0] ^= 0x01;
        })
        .await
        .unwrap();

    // Tier-1 policy: proceed, redacting the failed set
    let view = h
        .engine
        .reconstruct(&doc_id(), VIEWER, "level:confidential")
        .await
        .unwrap();
    assert_eq!(
        view_contents(&view),
        vec!["Public statement.", REDACTED, REDACTED]
    );
    assert!(!view.integrity_all_passed);

    // The failure was audited with its stage
    let failures = h
        .audit
        .events_of_type("reconstruction.integrity_failure")
        .await
        .unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].metadata["stage"], "ciphertext_hash");

    // The reconstruction event records the set as unverified
    let events = h.store.list_reconstructions(&doc_id()).await.unwrap();
    assert!(!events.last().unwrap().integrity_all_passed);
}

#[tokio::test]
async fn scenario_c_halt_policy_aborts() {
    let h = harness().await;
    seed(&h, scenario_a_assignments()).await;

    // Switch the tenant to the halting policy
    let mut profile = h.store.get_profile(&org_id()).await.unwrap().unwrap();
    profile.integrity_failure_policy = IntegrityFailurePolicy::Halt;
    h.store.put_profile(profile).await.unwrap();

    h.engine.deconstruct(&doc_id(), SESSION).await.unwrap();
    h.store
        .tamper_content_set(&doc_id(), &ContentSetId::new("CS-CONFIDENTIAL"), |row| {
            row.envelope.ciphertext[0] ^= 0x01;
        })
        .await
        .unwrap();

    let err = h
        .engine
        .reconstruct(&doc_id(), VIEWER, "level:confidential")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Core(CoreError::CiphertextIntegrityFailure(_))
    ));
}

#[tokio::test]
async fn scenario_base_document_tampering_halts() {
    let h = harness().await;
    seed(&h, scenario_a_assignments()).await;
    h.engine.deconstruct(&doc_id(), SESSION).await.unwrap();

    h.store
        .tamper_base_document(&doc_id(), |base| {
            base.content.push(' ');
        })
        .await
        .unwrap();

    let err = h
        .engine
        .reconstruct(&doc_id(), VIEWER, "level:all")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::BaseDocumentTampered));

    let failures = h
        .audit
        .events_of_type("reconstruction.integrity_failure")
        .await
        .unwrap();
    assert_eq!(failures[0].metadata["stage"], "base_document_hash");
}

#[tokio::test]
async fn scenario_d_key_rotation() {
    let h = harness().await;
    seed(&h, scenario_a_assignments()).await;
    h.engine.deconstruct(&doc_id(), SESSION).await.unwrap();

    let before: Vec<(ContentSetId, Sha512Digest)> = h
        .store
        .list_content_sets(&doc_id())
        .await
        .unwrap()
        .into_iter()
        .map(|row| (row.content_set_identifier.clone(), row.envelope.plaintext_hash.clone()))
        .collect();

    let outcome = h.engine.rotate_keys(&doc_id()).await.unwrap();
    assert_eq!(outcome.rotated.len(), 3);

    // Three active successors, three deactivated predecessors
    let keys = h.store.list_keys_for_document(&doc_id()).await.unwrap();
    assert_eq!(keys.len(), 6);
    let active: Vec<_> = keys.iter().filter(|k| k.is_active).collect();
    let inactive: Vec<_> = keys.iter().filter(|k| !k.is_active).collect();
    assert_eq!(active.len(), 3);
    assert_eq!(inactive.len(), 3);
    assert!(inactive.iter().all(|k| k.rotated_at.is_some()));
    for successor in &active {
        let predecessor_id = successor.rotated_from_key_id.clone().unwrap();
        assert!(inactive.iter().any(|k| k.id == predecessor_id));
        // (M, N) inherited
        assert_eq!(successor.shamir_threshold, 2);
        assert_eq!(successor.shamir_total_shares, 3);
    }

    // plaintext_hash preserved per envelope; key ids rewritten
    for row in h.store.list_content_sets(&doc_id()).await.unwrap() {
        let (_, old_hash) = before
            .iter()
            .find(|(set, _)| set == &row.content_set_identifier)
            .unwrap();
        assert_eq!(&row.envelope.plaintext_hash, old_hash);
        assert_eq!(row.key_id, row.envelope.key_id);
    }

    // Identical visible content after rotation
    let view = h
        .engine
        .reconstruct(&doc_id(), VIEWER, "level:all")
        .await
        .unwrap();
    assert_eq!(
        view_contents(&view),
        vec!["Public statement.", "Budget $4.2M.", "Agent Smith."]
    );
    assert!(view.integrity_all_passed);
}

#[tokio::test]
async fn scenario_e_shamir_recovery() {
    let mut secret = [0u8; 32];
    for (i, byte) in secret.iter_mut().enumerate() {
        *byte = (i as u8).wrapping_mul(71).wrapping_add(5);
    }

    let shares = shamir::split(&secret, 3, 5).unwrap();

    // Shares {1, 3, 5} recover the secret
    let subset = vec![shares[0].clone(), shares[2].clone(), shares[4].clone()];
    assert_eq!(shamir::reconstruct(&subset, 3).unwrap(), secret);

    // Shares {2, 4} are insufficient
    let short = vec![shares[1].clone(), shares[3].clone()];
    assert!(matches!(
        shamir::reconstruct(&short, 3),
        Err(CoreError::InsufficientShares { .. })
    ));
}

#[tokio::test]
async fn scenario_f_destruction_is_terminal() {
    let h = harness().await;
    seed(&h, scenario_a_assignments()).await;
    h.engine.deconstruct(&doc_id(), SESSION).await.unwrap();
    let keys = h.store.list_keys_for_document(&doc_id()).await.unwrap();

    let outcome = h
        .engine
        .destroy(&doc_id(), "retention expired", true)
        .await
        .unwrap();
    assert_eq!(outcome.destroyed_key_count, 3);

    let doc = h.store.get_document(&doc_id()).await.unwrap().unwrap();
    assert_eq!(doc.status, DocumentStatus::Destroyed);
    assert!(h.store.list_content_sets(&doc_id()).await.unwrap().is_empty());
    assert!(h.store.get_base_document(&doc_id()).await.unwrap().is_none());
    for key in &keys {
        assert!(h.store.list_shares_for_key(&key.id).await.unwrap().is_empty());
        let stored = h.store.get_key(&key.id).await.unwrap().unwrap();
        assert!(!stored.is_active);
        assert!(stored.destroyed_at.is_some());
    }

    // Subsequent reconstruction fails the precondition
    let err = h
        .engine
        .reconstruct(&doc_id(), VIEWER, "level:all")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::PreconditionViolation(_)));

    // The audit trail survives the content
    assert_eq!(
        h.audit
            .events_of_type("document.destroyed")
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn targeted_content_set_destruction() {
    let h = harness().await;
    seed(&h, scenario_a_assignments()).await;
    h.engine.deconstruct(&doc_id(), SESSION).await.unwrap();

    h.engine
        .destroy_content_set(
            &doc_id(),
            &ContentSetId::new("CS-SECRET"),
            "erasure request",
            "gdpr-article-17",
        )
        .await
        .unwrap();

    // The document stays active and other sets remain reconstructible
    let doc = h.store.get_document(&doc_id()).await.unwrap().unwrap();
    assert_eq!(doc.status, DocumentStatus::Active);
    assert_eq!(h.store.list_content_sets(&doc_id()).await.unwrap().len(), 2);

    let view = h
        .engine
        .reconstruct(&doc_id(), VIEWER, "level:confidential")
        .await
        .unwrap();
    assert_eq!(
        view_contents(&view),
        vec!["Public statement.", "Budget $4.2M.", REDACTED]
    );
}

#[tokio::test]
async fn denied_reconstruction_is_audited_without_anchor() {
    let h = harness().await;
    seed(&h, scenario_a_assignments()).await;
    h.engine.deconstruct(&doc_id(), SESSION).await.unwrap();
    let anchors_after_deconstruct = h.anchor.accepted_count().await;

    let err = h
        .engine
        .reconstruct(&doc_id(), "viewer:stranger", "level:all")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::AuthorizationDenied(tessera_engine::DenialReason::NoGrant)
    ));

    // Audited, event persisted, nothing anchored
    assert_eq!(
        h.audit
            .events_of_type("reconstruction.denied")
            .await
            .unwrap()
            .len(),
        1
    );
    assert_eq!(h.anchor.accepted_count().await, anchors_after_deconstruct);
    let events = h.store.list_reconstructions(&doc_id()).await.unwrap();
    assert_eq!(events.len(), 1);
    assert!(events[0].content_sets_used.is_empty());
}

#[tokio::test]
async fn empty_assignment_set_rolls_back() {
    let h = harness().await;
    seed(&h, Vec::new()).await;

    let err = h.engine.deconstruct(&doc_id(), SESSION).await.unwrap_err();
    assert!(matches!(err, EngineError::EmptyAssignmentSet));

    // Status rewound; no partial persistence
    let doc = h.store.get_document(&doc_id()).await.unwrap().unwrap();
    assert_eq!(doc.status, DocumentStatus::Approved);
    assert!(h.store.get_base_document(&doc_id()).await.unwrap().is_none());
    assert!(h.store.list_content_sets(&doc_id()).await.unwrap().is_empty());
    assert!(h.store.list_keys_for_document(&doc_id()).await.unwrap().is_empty());
}

#[tokio::test]
async fn deconstruct_requires_approved_state() {
    let h = harness().await;
    seed(&h, scenario_a_assignments()).await;
    h.engine.deconstruct(&doc_id(), SESSION).await.unwrap();

    // Second deconstruction of the now-active document fails
    let err = h.engine.deconstruct(&doc_id(), SESSION).await.unwrap_err();
    assert!(matches!(err, EngineError::PreconditionViolation(_)));
}

#[tokio::test]
async fn unknown_session_fails_precondition() {
    let h = harness().await;
    seed(&h, scenario_a_assignments()).await;

    let err = h
        .engine
        .deconstruct(&doc_id(), "session:unknown")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::PreconditionViolation(_)));
    let doc = h.store.get_document(&doc_id()).await.unwrap().unwrap();
    assert_eq!(doc.status, DocumentStatus::Approved);
}

#[tokio::test]
async fn anchor_outage_is_a_warning_not_a_fault() {
    let h = harness().await;
    seed(&h, scenario_a_assignments()).await;
    h.anchor.set_unreachable(true);

    // Deconstruction still succeeds; the event stays unanchored
    let outcome = h.engine.deconstruct(&doc_id(), SESSION).await.unwrap();
    assert!(outcome.anchor_tx_id.is_none());
    let doc = h.store.get_document(&doc_id()).await.unwrap().unwrap();
    assert_eq!(doc.status, DocumentStatus::Active);

    // Reconstruction records a null anchor transaction id
    let view = h
        .engine
        .reconstruct(&doc_id(), VIEWER, "level:all")
        .await
        .unwrap();
    assert!(view.integrity_all_passed);
    let events = h.store.list_reconstructions(&doc_id()).await.unwrap();
    assert!(events[0].anchor_tx_id.is_none());
}

#[tokio::test]
async fn legal_hold_blocks_destruction() {
    let h = harness().await;
    seed(&h, scenario_a_assignments()).await;
    h.engine.deconstruct(&doc_id(), SESSION).await.unwrap();

    h.store
        .place_hold(LegalHold {
            hold_id: "hold:lit-2026".to_string(),
            document_id: doc_id(),
            case_ref: "case:north-v-acme".to_string(),
            applied_at: chrono::Utc::now(),
            released_at: None,
        })
        .await
        .unwrap();

    let err = h
        .engine
        .destroy(&doc_id(), "cleanup", true)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::PreconditionViolation(_)));
    let doc = h.store.get_document(&doc_id()).await.unwrap().unwrap();
    assert_eq!(doc.status, DocumentStatus::Active);

    // Releasing the hold unblocks destruction
    h.store.release_hold("hold:lit-2026").await.unwrap();
    h.engine.destroy(&doc_id(), "cleanup", true).await.unwrap();
}

#[tokio::test]
async fn destruction_requires_regulatory_clearance() {
    let h = harness().await;
    seed(&h, scenario_a_assignments()).await;
    h.engine.deconstruct(&doc_id(), SESSION).await.unwrap();

    let err = h
        .engine
        .destroy(&doc_id(), "cleanup", false)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::PreconditionViolation(_)));
}

#[tokio::test]
async fn verify_integrity_reports_tampered_sets() {
    let h = harness().await;
    seed(&h, scenario_a_assignments()).await;
    h.engine.deconstruct(&doc_id(), SESSION).await.unwrap();

    let report = h.engine.verify_integrity(&doc_id()).await.unwrap();
    assert!(report.all_passed());
    assert_eq!(report.sets.len(), 3);

    h.store
        .tamper_content_set(&doc_id(), &ContentSetId::new("CS-SECRET"), |row| {
            row.envelope.ciphertext[0] ^= 0xFF;
        })
        .await
        .unwrap();

    let report = h.engine.verify_integrity(&doc_id()).await.unwrap();
    assert!(!report.all_passed());
    assert!(report.base_document_ok);
    let secret = report
        .sets
        .iter()
        .find(|s| s.content_set_identifier == ContentSetId::new("CS-SECRET"))
        .unwrap();
    assert!(!secret.ciphertext_ok);
    let public = report
        .sets
        .iter()
        .find(|s| s.content_set_identifier == ContentSetId::new("CS-PUBLIC"))
        .unwrap();
    assert!(public.all_ok());
}

#[tokio::test]
async fn share_distribution_marking() {
    let h = harness().await;
    seed(&h, scenario_a_assignments()).await;
    h.engine.deconstruct(&doc_id(), SESSION).await.unwrap();

    let keys = h.store.list_keys_for_document(&doc_id()).await.unwrap();
    h.store
        .mark_share_distributed(&keys[0].id, 1)
        .await
        .unwrap();

    let shares = h.store.list_shares_for_key(&keys[0].id).await.unwrap();
    let first = shares.iter().find(|s| s.share_index == 1).unwrap();
    assert!(first.distributed);
    assert!(first.distributed_at.is_some());
    assert!(shares.iter().filter(|s| s.share_index != 1).all(|s| !s.distributed));
}
