//! Orchestrates volume creation, slot aliasing, and the trial-decrypt
//! mount protocol; holds the active volume handle for the lifetime of the
//! session. This struct *is* the session: there are no module-level
//! globals, a session is just a value that gets created and dropped.

use crate::container::VaultContainer;
use crate::crypto;
use crate::error::{Result, VaultError};
use crate::header::{self, HeaderPayload, HEADER_SLOT_SIZE, NUM_HEADER_SLOTS};
use crate::namespace::{EntryKind, FileEntry, Namespace};
use std::collections::HashMap;
use std::path::Path;

/// Length prefix (u32 LE) + nonce + MAC overhead around the encrypted
/// namespace blob written into a volume region.
const REGION_FRAMING_OVERHEAD: u64 = 4 + crypto::NONCE_LEN as u64 + crypto::MAC_LEN as u64;

/// A read-only view of one [`FileEntry`] for callers that shouldn't see
/// tombstoned rows or mutate the namespace directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryView {
    pub name: String,
    pub kind: EntryKind,
    pub path: String,
}

impl From<&FileEntry> for EntryView {
    fn from(e: &FileEntry) -> Self {
        EntryView {
            name: e.name.clone(),
            kind: e.kind,
            path: e.path.clone(),
        }
    }
}

pub struct MountManager {
    container: VaultContainer,
    known_headers: HashMap<usize, HeaderPayload>,
    active_slot: Option<usize>,
    namespace: Option<Namespace>,
}

impl MountManager {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(MountManager {
            container: VaultContainer::open(path)?,
            known_headers: HashMap::new(),
            active_slot: None,
            namespace: None,
        })
    }

    pub fn exists(&self) -> bool {
        self.container.exists()
    }

    /// Fills every header slot with random noise. Call once, before any
    /// `create_volume`, so an as-yet-unpopulated slot is indistinguishable
    /// from one holding ciphertext rather than a block of zeros.
    pub fn seed_slot_noise(&mut self) -> Result<()> {
        for i in 0..NUM_HEADER_SLOTS {
            let noise = crypto::random_bytes(HEADER_SLOT_SIZE);
            self.container.write_slot(i, &noise)?;
        }
        Ok(())
    }

    /// Creates a new volume at `fsid`, writes its encrypted header into
    /// slot `fsid` (freshly created volumes use slot index == fsid), seeds
    /// an empty namespace, marks the volume active, and persists it.
    pub fn create_volume(&mut self, password: &str, fsid: u32) -> Result<(usize, u32)> {
        if fsid as usize >= NUM_HEADER_SLOTS {
            return Err(VaultError::InvalidArgument(format!(
                "fsid {fsid} has no fixed slot (NUM_HEADER_SLOTS = {NUM_HEADER_SLOTS})"
            )));
        }
        let payload = HeaderPayload::new_volume(fsid);
        let blob = header::encrypt_header(&payload, password);
        let slot = fsid as usize;
        self.container.write_slot(slot, &blob)?;

        let fsid_out = payload.fsid;
        self.known_headers.insert(slot, payload);
        self.active_slot = Some(slot);
        self.namespace = Some(Namespace::new_root());
        self.persist()?;

        log::info!("created volume fsid={fsid_out} in slot {slot}");
        Ok((slot, fsid_out))
    }

    /// Plausible-deniability primitive: copies the header known at
    /// `target_slot`, re-encrypts it under `new_password`, and writes it
    /// to `write_slot`. After this call, mounting with `new_password`
    /// reveals the *target* volume.
    pub fn alias_slot(&mut self, target_slot: usize, new_password: &str, write_slot: usize) -> Result<()> {
        if write_slot >= NUM_HEADER_SLOTS {
            return Err(VaultError::InvalidArgument(format!(
                "write_slot {write_slot} is out of range"
            )));
        }
        let target = self
            .known_headers
            .get(&target_slot)
            .cloned()
            .ok_or_else(|| {
                VaultError::InvalidArgument(format!(
                    "target_slot {target_slot} header is not known in this session"
                ))
            })?;
        let blob = header::encrypt_header(&target, new_password);
        self.container.write_slot(write_slot, &blob)?;
        self.known_headers.insert(write_slot, target);
        log::info!("aliased slot {target_slot} into slot {write_slot}");
        Ok(())
    }

    /// Trial-decrypts header slots in ascending order, starting at slot 0
    /// only when `kd_ok` is true (the out-of-band authenticator gate that
    /// hides the real volume's slot from unauthenticated callers). The
    /// first slot that decrypts wins; every other slot's failure is
    /// swallowed, never surfaced.
    pub fn mount(&mut self, password: &str, kd_ok: bool) -> Result<(usize, u32)> {
        if !self.container.exists() {
            return Err(VaultError::InvalidArgument("vault does not exist".to_string()));
        }
        let start = if kd_ok { 0 } else { 1 };
        for slot in start..NUM_HEADER_SLOTS {
            let blob = self.container.read_slot(slot)?;
            match header::decrypt_header(&blob, password) {
                Ok(payload) => {
                    let fsid = payload.fsid;
                    self.known_headers.insert(slot, payload);
                    self.active_slot = Some(slot);
                    self.namespace = Some(self.load_namespace_or_reinit());
                    log::info!("mounted slot {slot} (fsid {fsid})");
                    return Ok((slot, fsid));
                }
                Err(_) => {
                    log::debug!("slot {slot} did not decrypt under the supplied password");
                    continue;
                }
            }
        }
        Err(VaultError::WrongPassword)
    }

    fn active_payload(&self) -> Result<&HeaderPayload> {
        let slot = self
            .active_slot
            .ok_or_else(|| VaultError::InvalidArgument("no volume is mounted".to_string()))?;
        self.known_headers
            .get(&slot)
            .ok_or_else(|| VaultError::InvalidArgument("active slot has no known header".to_string()))
    }

    fn load_namespace_or_reinit(&mut self) -> Namespace {
        match self.try_load_namespace() {
            Ok(ns) => ns,
            Err(e) => {
                log::warn!("namespace region unreadable ({e}), reinitializing to root only");
                Namespace::new_root()
            }
        }
    }

    fn try_load_namespace(&mut self) -> Result<Namespace> {
        let payload = self.active_payload()?.clone();
        let len_bytes = self.container.read_region(payload.volume_offset, 4)?;
        let ct_len = u32::from_le_bytes(len_bytes.try_into().unwrap()) as u64;

        if REGION_FRAMING_OVERHEAD + ct_len > payload.volume_size {
            return Err(VaultError::Corrupt);
        }

        let rest = self
            .container
            .read_region(payload.volume_offset + 4, (8 + ct_len + 32) as usize)?;
        let nonce = &rest[..8];
        let ciphertext = &rest[8..8 + ct_len as usize];
        let tag = &rest[8 + ct_len as usize..8 + ct_len as usize + 32];

        let mut mac_input = Vec::with_capacity(8 + ct_len as usize);
        mac_input.extend_from_slice(nonce);
        mac_input.extend_from_slice(ciphertext);
        if !crypto::verify_mac(&payload.volume_key, &mac_input, tag) {
            return Err(VaultError::Corrupt);
        }

        let plain = crypto::stream_decrypt(&payload.volume_key, nonce, ciphertext)
            .map_err(|_| VaultError::Corrupt)?;
        let entries = Namespace::decode(&plain)?;
        Ok(Namespace::from_entries(entries))
    }

    /// Encrypts and writes the full namespace into the active volume's
    /// region: `u32_LE(len) ‖ nonce ‖ ciphertext ‖ mac`, where the mac
    /// covers `nonce ‖ ciphertext` (unlike the header mac, which covers
    /// ciphertext only).
    fn persist(&mut self) -> Result<()> {
        let payload = self.active_payload()?.clone();
        let namespace = self
            .namespace
            .as_ref()
            .ok_or_else(|| VaultError::InvalidArgument("no namespace loaded".to_string()))?;

        let plain = namespace.encode();
        let (ciphertext, nonce) = crypto::stream_encrypt(&payload.volume_key, &plain)?;
        let mut mac_input = Vec::with_capacity(nonce.len() + ciphertext.len());
        mac_input.extend_from_slice(&nonce);
        mac_input.extend_from_slice(&ciphertext);
        let tag = crypto::mac(&payload.volume_key, &mac_input);

        let needed = REGION_FRAMING_OVERHEAD + ciphertext.len() as u64;
        if needed > payload.volume_size {
            return Err(VaultError::VolumeFull {
                needed,
                capacity: payload.volume_size,
            });
        }

        let mut buf = Vec::with_capacity(needed as usize);
        buf.extend_from_slice(&(ciphertext.len() as u32).to_le_bytes());
        buf.extend_from_slice(&nonce);
        buf.extend_from_slice(&ciphertext);
        buf.extend_from_slice(&tag);

        self.container
            .write_region(payload.volume_offset, &buf, payload.volume_size)
    }

    fn namespace_mut(&mut self) -> Result<&mut Namespace> {
        self.namespace
            .as_mut()
            .ok_or_else(|| VaultError::InvalidArgument("no volume is mounted".to_string()))
    }

    fn namespace_ref(&self) -> Result<&Namespace> {
        self.namespace
            .as_ref()
            .ok_or_else(|| VaultError::InvalidArgument("no volume is mounted".to_string()))
    }

    /// Applies `mutate` to the active namespace, then persists it. If
    /// `mutate` itself fails (e.g. `NotFound`), nothing changed and the
    /// error is returned as-is. If persisting the mutated namespace fails
    /// (e.g. `VolumeFull`), the namespace is rolled back to its
    /// pre-mutation snapshot so the rejected operation leaves no trace:
    /// either a mutation is flushed, or the namespace is exactly as it was.
    fn mutate_and_persist(&mut self, mutate: impl FnOnce(&mut Namespace) -> Result<()>) -> Result<()> {
        let snapshot = self.namespace_ref()?.clone();
        mutate(self.namespace_mut()?)?;
        if let Err(e) = self.persist() {
            self.namespace = Some(snapshot);
            return Err(e);
        }
        Ok(())
    }

    pub fn current_path(&self) -> Result<&str> {
        Ok(self.namespace_ref()?.current_path())
    }

    pub fn list(&self) -> Result<Vec<EntryView>> {
        Ok(self.namespace_ref()?.list().into_iter().map(EntryView::from).collect())
    }

    pub fn tree(&self) -> Result<Vec<(usize, EntryView)>> {
        Ok(self
            .namespace_ref()?
            .tree()
            .into_iter()
            .map(|(depth, e)| (depth, EntryView::from(e)))
            .collect())
    }

    pub fn chdir(&mut self, target: &str) -> Result<()> {
        self.namespace_mut()?.chdir(target)
    }

    pub fn mkdir(&mut self, name: &str) -> Result<()> {
        self.mutate_and_persist(|ns| ns.mkdir(name))
    }

    pub fn rmdir(&mut self, name: &str) -> Result<()> {
        self.mutate_and_persist(|ns| ns.rmdir(name))
    }

    pub fn create(&mut self, name: &str) -> Result<()> {
        self.mutate_and_persist(|ns| ns.create(name))
    }

    pub fn write(&mut self, name: &str, data: impl Into<Vec<u8>>) -> Result<()> {
        let data = data.into();
        self.mutate_and_persist(|ns| ns.write(name, data))
    }

    pub fn append(&mut self, name: &str, data: impl Into<Vec<u8>>) -> Result<()> {
        let data = data.into();
        self.mutate_and_persist(|ns| ns.append(name, data))
    }

    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        Ok(self.namespace_ref()?.read(name)?.to_vec())
    }

    pub fn rm(&mut self, name: &str) -> Result<()> {
        self.mutate_and_persist(|ns| ns.rm(name))
    }
}
