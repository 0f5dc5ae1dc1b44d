use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use tempfile::tempdir;
use vault_core::{MountManager, VaultError};

#[test]
fn create_and_remount_round_trips_namespace() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vault.dat");

    {
        let mut m = MountManager::open(&path).unwrap();
        m.seed_slot_noise().unwrap();
        m.create_volume("hunter2", 0).unwrap();
        m.mkdir("docs").unwrap();
        m.chdir("docs").unwrap();
        m.create("notes.txt").unwrap();
        m.write("notes.txt", b"hello vault".to_vec()).unwrap();
    }

    let mut m = MountManager::open(&path).unwrap();
    let (slot, fsid) = m.mount("hunter2", true).unwrap();
    assert_eq!(slot, 0);
    assert_eq!(fsid, 0);
    m.chdir("docs").unwrap();
    assert_eq!(m.read("notes.txt").unwrap(), b"hello vault");
}

#[test]
fn wrong_password_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vault.dat");

    let mut m = MountManager::open(&path).unwrap();
    m.seed_slot_noise().unwrap();
    m.create_volume("correct-password", 0).unwrap();
    drop(m);

    let mut m = MountManager::open(&path).unwrap();
    assert!(matches!(m.mount("wrong-password", true), Err(VaultError::WrongPassword)));
}

#[test]
fn decoy_is_reachable_without_kd_real_is_not() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vault.dat");

    {
        let mut m = MountManager::open(&path).unwrap();
        m.seed_slot_noise().unwrap();
        m.create_volume("real-password", 0).unwrap();
        m.create_volume("decoy-password", 1).unwrap();
    }

    // Without the out-of-band gate, slot 0 (the real volume) is never
    // tried, so the real password finds nothing.
    let mut m = MountManager::open(&path).unwrap();
    assert!(matches!(m.mount("real-password", false), Err(VaultError::WrongPassword)));

    let mut m = MountManager::open(&path).unwrap();
    let (slot, fsid) = m.mount("decoy-password", false).unwrap();
    assert_eq!(slot, 1);
    assert_eq!(fsid, 1);

    // With the gate, the real volume becomes reachable again.
    let mut m = MountManager::open(&path).unwrap();
    let (slot, fsid) = m.mount("real-password", true).unwrap();
    assert_eq!(slot, 0);
    assert_eq!(fsid, 0);
}

#[test]
fn aliasing_points_a_second_password_at_an_existing_volume() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vault.dat");

    {
        let mut m = MountManager::open(&path).unwrap();
        m.seed_slot_noise().unwrap();
        // Slot 0 stays noise; only the decoy volume (slot 1) exists.
        m.create_volume("decoy-password", 1).unwrap();
        m.create("hello.txt").unwrap();
        m.write("hello.txt", b"decoy contents".to_vec()).unwrap();
        // Within the same session the decoy's header is known, so it can
        // be re-encrypted under a second password into slot 2.
        m.alias_slot(1, "alias-password", 2).unwrap();
    }

    // The alias password reaches slot 2 (slot 0 is noise, slot 1 doesn't
    // decrypt under it) and lands on the same volume and data as the decoy.
    let mut m = MountManager::open(&path).unwrap();
    let (slot, fsid) = m.mount("alias-password", true).unwrap();
    assert_eq!(slot, 2);
    assert_eq!(fsid, 1);
    assert_eq!(m.read("hello.txt").unwrap(), b"decoy contents");
}

#[test]
fn mutations_persist_across_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vault.dat");

    {
        let mut m = MountManager::open(&path).unwrap();
        m.seed_slot_noise().unwrap();
        m.create_volume("hunter2", 0).unwrap();
        m.create("a.txt").unwrap();
        m.write("a.txt", b"first".to_vec()).unwrap();
    }
    {
        let mut m = MountManager::open(&path).unwrap();
        m.mount("hunter2", true).unwrap();
        m.append("a.txt", b" second".to_vec()).unwrap();
        m.mkdir("sub").unwrap();
    }

    let mut m = MountManager::open(&path).unwrap();
    m.mount("hunter2", true).unwrap();
    assert_eq!(m.read("a.txt").unwrap(), b"first second");
    let names: Vec<_> = m.list().unwrap().into_iter().map(|e| e.name).collect();
    assert!(names.contains(&"sub".to_string()));
}

#[test]
fn namespace_overflowing_the_volume_reservation_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vault.dat");

    let mut m = MountManager::open(&path).unwrap();
    m.seed_slot_noise().unwrap();
    m.create_volume("hunter2", 0).unwrap();
    m.create("big.bin").unwrap();

    let oversized = vec![0u8; 2 * 1024 * 1024];
    let err = m.write("big.bin", oversized).unwrap_err();
    assert!(matches!(err, VaultError::VolumeFull { .. }));
}

#[test]
fn rejected_write_leaves_namespace_unchanged_for_later_ops() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vault.dat");

    let mut m = MountManager::open(&path).unwrap();
    m.seed_slot_noise().unwrap();
    m.create_volume("hunter2", 0).unwrap();
    m.create("big.bin").unwrap();
    m.write("big.bin", b"small".to_vec()).unwrap();

    let oversized = vec![0u8; 2 * 1024 * 1024];
    assert!(matches!(
        m.write("big.bin", oversized),
        Err(VaultError::VolumeFull { .. })
    ));

    // The rejected write must not have left the in-memory namespace (or
    // the on-disk region) holding the oversized content; the file's prior
    // contents and later mutations both still work.
    assert_eq!(m.read("big.bin").unwrap(), b"small");
    m.create("other.txt").unwrap();
    m.write("other.txt", b"ok".to_vec()).unwrap();
    assert_eq!(m.read("other.txt").unwrap(), b"ok");
}

#[test]
fn bit_flip_in_volume_region_reinitializes_namespace_instead_of_failing_mount() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vault.dat");

    {
        let mut m = MountManager::open(&path).unwrap();
        m.seed_slot_noise().unwrap();
        m.create_volume("hunter2", 0).unwrap();
        m.mkdir("docs").unwrap();
    }

    // Flip a bit well inside the ciphertext of volume 0's region (past the
    // header area and the 4-byte length prefix + 8-byte nonce framing).
    let header_area = 3 * 108u64;
    let mut file = OpenOptions::new().read(true).write(true).open(&path).unwrap();
    file.seek(SeekFrom::Start(header_area + 20)).unwrap();
    let mut byte = [0u8; 1];
    file.read_exact(&mut byte).unwrap();
    byte[0] ^= 0x01;
    file.seek(SeekFrom::Start(header_area + 20)).unwrap();
    file.write_all(&byte).unwrap();
    drop(file);

    let mut m = MountManager::open(&path).unwrap();
    let (slot, fsid) = m.mount("hunter2", true).unwrap();
    assert_eq!((slot, fsid), (0, 0));
    // Namespace degraded to root-only; the "docs" mutation is gone because
    // the region failed to authenticate, not because mount failed.
    assert!(m.list().unwrap().is_empty());
}

#[test]
fn wrong_password_has_no_side_effects_on_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vault.dat");

    let before = {
        let mut m = MountManager::open(&path).unwrap();
        m.seed_slot_noise().unwrap();
        m.create_volume("alpha", 0).unwrap();
        std::fs::read(&path).unwrap()
    };

    let mut m = MountManager::open(&path).unwrap();
    assert!(matches!(m.mount("nope", true), Err(VaultError::WrongPassword)));
    drop(m);

    let after = std::fs::read(&path).unwrap();
    assert_eq!(before, after, "a failed mount must not rewrite the vault file");
}
