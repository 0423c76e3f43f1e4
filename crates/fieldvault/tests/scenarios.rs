//! End-to-end behaviour through the in-memory storage host.

use std::sync::Arc;

use fieldvault::crypto::is_envelope;
use fieldvault::{
    CipherEngine, Classifier, Coordinator, Document, Encryptable, MemoryStore, RecordSchema,
    RootSecret,
};

const PHONE: &str = "+33612345678";

fn coordinator() -> Coordinator {
    let classifier = Classifier::new();
    classifier
        .register_all([
            RecordSchema::new("Account")
                .plain("display_name")
                .encrypted("secret")
                .blind_index("secretIndex", "secret"),
            RecordSchema::new("Customer")
                .extends("Account")
                .encrypted("email")
                .embedded("billing", "Address"),
            RecordSchema::new("Address").encrypted("street"),
        ])
        .unwrap();
    let engine = CipherEngine::new(&RootSecret::new(vec![0x5a; 32]).unwrap()).unwrap();
    Coordinator::new(Arc::new(engine), Arc::new(classifier))
}

fn account(id: &str) -> Document {
    Document::new("Account", id)
        .with_text("display_name", "Ada")
        .with_text("secret", PHONE)
}

#[test]
fn scenario_a_ciphertext_on_disk_and_lookup_by_blind_hash() {
    let c = coordinator();
    let store = MemoryStore::new();
    let mut session = store.session(&c);
    let mut doc = account("acc-1");
    session.persist(&mut doc).unwrap();

    // The caller keeps seeing cleartext.
    assert_eq!(doc.text("secret"), Some(PHONE));

    let raw = store.raw("Account", "acc-1").unwrap();
    let stored = raw.text("secret").unwrap();
    assert_ne!(stored, PHONE);
    assert!(is_envelope(stored));
    assert_eq!(raw.text("display_name"), Some("Ada"));

    let expected = c.engine().blind_hash(PHONE, "Account.secret").unwrap();
    assert_eq!(raw.text("secretIndex"), Some(expected.as_str()));

    let found = session
        .find_by_blind_index("Account", "secretIndex", PHONE)
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].identity(), "acc-1");
    assert_eq!(found[0].text("secret"), Some(PHONE));
}

#[test]
fn blind_lookup_is_case_insensitive() {
    let c = coordinator();
    let store = MemoryStore::new();
    let mut session = store.session(&c);
    session
        .persist(&mut account("acc-1").with_text("secret", "Ada@Example.org"))
        .unwrap();
    let found = session
        .find_by_blind_index("Account", "secretIndex", "ada@example.ORG")
        .unwrap();
    assert_eq!(found.len(), 1);
}

#[test]
fn scenario_b_unchanged_record_written_twice_is_byte_identical() {
    let c = coordinator();
    let store = MemoryStore::new();
    let mut session = store.session(&c);
    let mut doc = account("acc-1");

    session.persist(&mut doc).unwrap();
    let first = store.raw("Account", "acc-1").unwrap();
    session.persist(&mut doc).unwrap();
    let second = store.raw("Account", "acc-1").unwrap();

    assert_eq!(first.text("secret"), second.text("secret"));
    assert_eq!(first, second);
}

#[test]
fn scenario_c_empty_target_clears_blind_index() {
    let c = coordinator();
    let store = MemoryStore::new();
    let mut session = store.session(&c);
    let mut doc = account("acc-1");
    session.persist(&mut doc).unwrap();
    assert!(store.raw("Account", "acc-1").unwrap().text("secretIndex").is_some());

    doc.set_text("secret", Some(String::new()));
    session.persist(&mut doc).unwrap();
    assert_eq!(store.raw("Account", "acc-1").unwrap().text("secretIndex"), None);
    assert_eq!(doc.text("secret"), Some(""));
}

#[test]
fn materialize_then_write_without_changes_keeps_ciphertext() {
    let c = coordinator();
    let store = MemoryStore::new();
    store.session(&c).persist(&mut account("acc-1")).unwrap();
    let before = store.raw("Account", "acc-1").unwrap();

    let mut session = store.session(&c);
    let mut loaded = session.load("Account", "acc-1").unwrap().unwrap();
    assert_eq!(loaded.text("secret"), Some(PHONE));
    session.persist(&mut loaded).unwrap();

    assert_eq!(store.raw("Account", "acc-1").unwrap(), before);
}

#[test]
fn mutate_then_write_persists_new_envelope() {
    let c = coordinator();
    let store = MemoryStore::new();
    store.session(&c).persist(&mut account("acc-1")).unwrap();
    let before = store.raw("Account", "acc-1").unwrap();

    let mut session = store.session(&c);
    let mut loaded = session.load("Account", "acc-1").unwrap().unwrap();
    loaded.set_text("secret", Some("+33700000000".into()));
    session.persist(&mut loaded).unwrap();
    session.close();

    let after = store.raw("Account", "acc-1").unwrap();
    assert_ne!(after.text("secret"), before.text("secret"));
    assert_ne!(after.text("secretIndex"), before.text("secretIndex"));

    let mut fresh = store.session(&c);
    let reloaded = fresh.load("Account", "acc-1").unwrap().unwrap();
    assert_eq!(reloaded.text("secret"), Some("+33700000000"));
    assert!(fresh
        .find_by_blind_index("Account", "secretIndex", PHONE)
        .unwrap()
        .is_empty());
}

#[test]
fn inherited_and_embedded_fields_are_protected() {
    let c = coordinator();
    let store = MemoryStore::new();
    let mut session = store.session(&c);
    let mut customer = Document::new("Customer", "cus-1")
        .with_text("secret", PHONE)
        .with_text("email", "ada@example.org")
        .with_embedded(
            "billing",
            Document::new("Address", "addr-1").with_text("street", "1 rue de Paris"),
        );
    session.persist(&mut customer).unwrap();

    let raw = store.raw("Customer", "cus-1").unwrap();
    assert!(is_envelope(raw.text("secret").unwrap()));
    assert!(is_envelope(raw.text("email").unwrap()));
    assert!(is_envelope(
        raw.embedded("billing").unwrap().text("street").unwrap()
    ));
    // The inherited index is scoped to the declaring type.
    assert_eq!(
        raw.text("secretIndex"),
        Some(c.engine().blind_hash(PHONE, "Account.secret").unwrap().as_str())
    );

    let loaded = store.session(&c).load("Customer", "cus-1").unwrap().unwrap();
    assert_eq!(loaded, customer);
}

#[test]
fn embedded_record_must_match_declared_type() {
    let classifier = Classifier::new();
    classifier
        .register_all([
            RecordSchema::new("Customer")
                .encrypted("email")
                .embedded("billing", "Address"),
            RecordSchema::new("Address").encrypted("street"),
            RecordSchema::new("Tag").plain("street"),
        ])
        .unwrap();
    let engine = CipherEngine::new(&RootSecret::new(vec![0x5a; 32]).unwrap()).unwrap();
    let c = Coordinator::new(Arc::new(engine), Arc::new(classifier));
    let store = MemoryStore::new();
    let mut session = store.session(&c);
    let mut customer = Document::new("Customer", "cus-1")
        .with_text("email", "ada@example.org")
        .with_embedded(
            "billing",
            Document::new("Tag", "x").with_text("street", "1 rue secret"),
        );

    let err = session.persist(&mut customer).unwrap_err();
    assert_eq!(err.code(), "classification_error");
    assert!(store.raw("Customer", "cus-1").is_none());
    assert_eq!(
        customer.embedded("billing").unwrap().text("street"),
        Some("1 rue secret")
    );
}

#[test]
fn envelope_moved_to_another_record_fails_closed() {
    let c = coordinator();
    let store = MemoryStore::new();
    let mut session = store.session(&c);
    session.persist(&mut account("acc-1")).unwrap();
    session.persist(&mut account("acc-2")).unwrap();
    session.close();

    // Simulate a row-level tamper: copy acc-1's envelope into acc-2.
    let stolen = store.raw("Account", "acc-1").unwrap();
    let mut victim = store.raw("Account", "acc-2").unwrap();
    victim.set_text("secret", stolen.text("secret").map(str::to_owned));
    let before = victim.clone();
    {
        let mut session = store.session(&c);
        // Rebuilding the blind index has to read the foreign envelope.
        let err = session.persist(&mut victim).unwrap_err();
        assert!(err.is_data_integrity());
    }
    assert_eq!(victim, before);

    // Nothing was written for the failed pre-write.
    assert_ne!(
        store.raw("Account", "acc-2").unwrap().text("secret"),
        stolen.text("secret")
    );
}

#[test]
fn sessions_do_not_share_decrypt_caches() {
    let c = coordinator();
    let store = MemoryStore::new();
    store.session(&c).persist(&mut account("acc-1")).unwrap();
    let before = store.raw("Account", "acc-1").unwrap();

    // A session that loaded the record and aborted leaves nothing behind.
    let mut aborted = store.session(&c);
    aborted.load("Account", "acc-1").unwrap();
    aborted.abort();

    // Writing the cleartext from a session that never loaded the row cannot
    // reuse any cached envelope.
    let mut other = store.session(&c);
    other.persist(&mut account("acc-1")).unwrap();
    let after = store.raw("Account", "acc-1").unwrap();
    assert_ne!(after.text("secret"), before.text("secret"));
    assert_eq!(after.text("secretIndex"), before.text("secretIndex"));
}

#[test]
fn clear_signal_discards_cached_envelopes() {
    let c = coordinator();
    let store = MemoryStore::new();
    let mut session = store.session(&c);
    let mut doc = account("acc-1");
    session.persist(&mut doc).unwrap();
    let first = store.raw("Account", "acc-1").unwrap();

    session.clear();
    session.persist(&mut doc).unwrap();
    let second = store.raw("Account", "acc-1").unwrap();
    assert_ne!(first.text("secret"), second.text("secret"));
}
