//! Tests fuer den EphemeralStore

use std::sync::Arc;
use std::time::Duration;

use handoff_core::{
    DiskStorage, HandoffError, ItemId, PeerId, RamStorage, StorageBackend, TestUhr, Uhr,
};
use handoff_crypto::{oeffnen, versiegeln, Schluessel, VersiegelterBlob};

use crate::store::{EphemeralStore, INDEX_DATEI};

const TTL: u64 = 300;

fn ram_store() -> (EphemeralStore, Arc<RamStorage>, Arc<TestUhr>) {
    let storage = Arc::new(RamStorage::new());
    let uhr = Arc::new(TestUhr::fest());
    let store = EphemeralStore::neu(storage.clone(), uhr.clone(), Duration::from_secs(TTL));
    (store, storage, uhr)
}

fn blob(inhalt: &[u8]) -> (Schluessel, VersiegelterBlob) {
    let k = Schluessel::zufaellig();
    let b = versiegeln(&k, inhalt).expect("Versiegeln fehlgeschlagen");
    (k, b)
}

#[tokio::test]
async fn test_hochladen_besitzer_abruf_und_ablauf() {
    let dir = tempfile::tempdir().expect("Temp-Verzeichnis konnte nicht erstellt werden");
    let storage = Arc::new(DiskStorage::new(dir.path()));
    let uhr = Arc::new(TestUhr::fest());
    let store = EphemeralStore::neu(storage.clone(), uhr.clone(), Duration::from_secs(TTL));

    let (k, b) = blob(b"0123456789");
    let chiffrat = b.ciphertext.clone();
    let i1 = store.put("a.png", "image/png", b).await.unwrap();
    assert!(dir.path().join(format!("{i1}.enc")).exists());

    let peer = PeerId::parse("peerX").unwrap();
    store.attach_owner(&i1, &peer).await.unwrap();

    let item = store.get(&i1).await.unwrap();
    assert_eq!(item.blob.ciphertext, chiffrat);
    assert_eq!(item.owner_peer_id, Some(peer));
    assert_eq!(item.display_name, "a.png");
    assert_eq!(oeffnen(&k, &item.blob).unwrap(), b"0123456789");

    uhr.vorstellen(TTL as i64 + 1);
    let e = store.get(&i1).await.unwrap_err();
    assert!(matches!(e, HandoffError::NichtGefunden(_)));
    assert!(!dir.path().join(format!("{i1}.enc")).exists());
}

#[tokio::test]
async fn test_genau_bei_ttl_noch_gueltig() {
    let (store, _storage, uhr) = ram_store();
    let (_k, b) = blob(b"x");
    let id = store.put("a.gif", "image/gif", b).await.unwrap();

    uhr.vorstellen(TTL as i64);
    assert!(store.get(&id).await.is_ok());
    uhr.vorstellen(1);
    assert!(store.get(&id).await.is_err());
    // Wiederholter Zugriff bleibt NichtGefunden
    assert!(matches!(
        store.get(&id).await,
        Err(HandoffError::NichtGefunden(_))
    ));
}

#[tokio::test]
async fn test_unbekannte_id() {
    let (store, _storage, _uhr) = ram_store();
    let id = ItemId::parse("gibtesnicht").unwrap();
    assert!(matches!(store.get(&id).await, Err(HandoffError::NichtGefunden(_))));
    let peer = PeerId::parse("p").unwrap();
    assert!(matches!(
        store.attach_owner(&id, &peer).await,
        Err(HandoffError::NichtGefunden(_))
    ));
}

#[tokio::test]
async fn test_besitzer_letzter_schreiber_gewinnt() {
    let (store, _storage, _uhr) = ram_store();
    let (_k, b) = blob(b"x");
    let id = store.put("a.png", "image/png", b).await.unwrap();

    let a = PeerId::parse("peerA").unwrap();
    let b = PeerId::parse("peerB").unwrap();
    store.attach_owner(&id, &a).await.unwrap();
    store.attach_owner(&id, &b).await.unwrap();
    store.attach_owner(&id, &b).await.unwrap();
    assert_eq!(store.get(&id).await.unwrap().owner_peer_id, Some(b));
}

#[tokio::test]
async fn test_besitzer_fuer_abgelaufenes_item() {
    let (store, _storage, uhr) = ram_store();
    let (_k, b) = blob(b"x");
    let id = store.put("a.png", "image/png", b).await.unwrap();
    uhr.vorstellen(TTL as i64 + 1);
    let peer = PeerId::parse("peerA").unwrap();
    assert!(matches!(
        store.attach_owner(&id, &peer).await,
        Err(HandoffError::NichtGefunden(_))
    ));
}

#[tokio::test]
async fn test_sweep_entfernt_nur_abgelaufene() {
    let (store, storage, uhr) = ram_store();
    let (_k, b1) = blob(b"alt");
    let alt = store.put("alt.png", "image/png", b1).await.unwrap();
    uhr.vorstellen(200);
    let (_k, b2) = blob(b"neu");
    let neu = store.put("neu.png", "image/png", b2).await.unwrap();

    uhr.vorstellen(101);
    let bericht = store.sweep(uhr.jetzt()).await;
    assert_eq!(bericht.entfernt, 1);
    assert_eq!(bericht.fehlgeschlagen, 0);
    assert_eq!(bericht.verbleibend, 1);

    assert!(!storage.enthaelt(&format!("{alt}.enc")));
    assert!(storage.enthaelt(&format!("{neu}.enc")));
    assert!(store.get(&neu).await.is_ok());
}

#[tokio::test]
async fn test_sweep_wiederholt_fehlgeschlagene_loeschung() {
    let (store, storage, uhr) = ram_store();
    let (_k, b) = blob(b"x");
    let id = store.put("a.png", "image/png", b).await.unwrap();
    uhr.vorstellen(TTL as i64 + 1);

    storage.fehler_simulieren(true);
    let bericht = store.sweep(uhr.jetzt()).await;
    assert_eq!(bericht.entfernt, 0);
    assert_eq!(bericht.fehlgeschlagen, 1);
    assert!(storage.enthaelt(&format!("{id}.enc")));
    // Unsichtbar, obwohl noch nicht geloescht
    assert!(store.get(&id).await.is_err());

    storage.fehler_simulieren(false);
    let bericht = store.sweep(uhr.jetzt()).await;
    assert_eq!(bericht.entfernt, 1);
    assert!(!storage.enthaelt(&format!("{id}.enc")));
    assert_eq!(store.anzahl().await, 0);
}

#[tokio::test]
async fn test_put_bei_speicherfehler() {
    let (store, storage, _uhr) = ram_store();
    storage.fehler_simulieren(true);
    let (_k, b) = blob(b"x");
    let e = store.put("a.png", "image/png", b).await.unwrap_err();
    assert!(matches!(e, HandoffError::Speicher(_)));
    assert_eq!(store.anzahl().await, 0);
    storage.fehler_simulieren(false);
    assert_eq!(storage.anzahl(), 0);
}

#[tokio::test]
async fn test_liste_sortiert_mit_restlaufzeit() {
    let (store, _storage, uhr) = ram_store();
    let (_k, b1) = blob(b"1");
    let erstes = store.put("eins.png", "image/png", b1).await.unwrap();
    uhr.vorstellen(100);
    let (_k, b2) = blob(b"2");
    let zweites = store.put("zwei.pdf", "application/pdf", b2).await.unwrap();
    uhr.vorstellen(10);

    let liste = store.list(uhr.jetzt()).await;
    assert_eq!(liste.len(), 2);
    assert_eq!(liste[0].id, erstes);
    assert_eq!(liste[0].expires_in_secs, 190);
    assert_eq!(liste[1].id, zweites);
    assert_eq!(liste[1].expires_in_secs, 290);

    uhr.vorstellen(191);
    let liste = store.list(uhr.jetzt()).await;
    assert_eq!(liste.len(), 1);
    assert_eq!(liste[0].display_name, "zwei.pdf");
}

#[tokio::test]
async fn test_laden_stellt_index_wieder_her() {
    let (store, storage, uhr) = ram_store();
    let (k, b) = blob(b"persistiert");
    let id = store.put("a.png", "image/png", b).await.unwrap();
    store
        .attach_owner(&id, &PeerId::parse("peerX").unwrap())
        .await
        .unwrap();
    storage.store("verwaist.enc", b"alt").await.unwrap();

    let neu = EphemeralStore::neu(storage.clone(), uhr.clone(), Duration::from_secs(TTL));
    assert_eq!(neu.laden().await.unwrap(), 1);
    let item = neu.get(&id).await.unwrap();
    assert_eq!(item.owner_peer_id.unwrap().as_str(), "peerX");
    assert_eq!(oeffnen(&k, &item.blob).unwrap(), b"persistiert");
    assert!(!storage.enthaelt("verwaist.enc"));
    assert!(storage.enthaelt(INDEX_DATEI));
}

#[tokio::test]
async fn test_laden_ohne_index() {
    let (store, _storage, _uhr) = ram_store();
    assert_eq!(store.laden().await.unwrap(), 0);
}

#[tokio::test]
async fn test_gleichzeitiges_lesen_und_sweep() {
    let (store, _storage, uhr) = ram_store();
    let store = Arc::new(store);
    let mut ids = Vec::new();
    for i in 0..20 {
        let (_k, b) = blob(format!("inhalt {i}").as_bytes());
        ids.push(store.put("a.png", "image/png", b).await.unwrap());
    }

    let mut handles = Vec::new();
    for id in ids.clone() {
        let s = store.clone();
        handles.push(tokio::spawn(async move { s.get(&id).await }));
    }
    let s = store.clone();
    let u = uhr.clone();
    let sweeper = tokio::spawn(async move { s.sweep(u.jetzt()).await });

    for h in handles {
        let item = h.await.unwrap().unwrap();
        assert!(!item.blob.ciphertext.is_empty());
    }
    assert_eq!(sweeper.await.unwrap().entfernt, 0);
}

#[tokio::test]
async fn test_lazy_expiry_wird_gezaehlt() {
    let (store, storage, uhr) = ram_store();
    let (_, b1) = blob(b"eins");
    let (_, b2) = blob(b"zwei");
    let erstes = store.put("a.png", "image/png", b1).await.unwrap();
    let zweites = store.put("b.png", "image/png", b2).await.unwrap();
    assert_eq!(store.lebend(uhr.jetzt()).await, 2);

    uhr.vorstellen(TTL as i64 + 1);
    assert_eq!(store.lebend(uhr.jetzt()).await, 0);
    assert_eq!(store.anzahl().await, 2);

    assert!(matches!(store.get(&erstes).await, Err(HandoffError::NichtGefunden(_))));
    assert_eq!(store.beim_zugriff_entfernt(), 1);
    assert_eq!(store.beim_zugriff_entfernt(), 0);
    assert_eq!(store.anzahl().await, 1);

    // Schlaegt das Loeschen fehl, bleibt der Eintrag und wird nicht gezaehlt
    storage.fehler_simulieren(true);
    assert!(store.get(&zweites).await.is_err());
    assert_eq!(store.beim_zugriff_entfernt(), 0);
    assert_eq!(store.anzahl().await, 1);
}
