//! In-memory hierarchical namespace: an ordered list of [`FileEntry`]
//! values (including tombstoned ones, so deletion never shifts positional
//! order) plus the session-local current directory. Persisted whole,
//! never per-entry.

use crate::error::{Result, VaultError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    File,
    Directory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub kind: EntryKind,
    pub path: String,
    pub used: bool,
    pub content: Vec<u8>,
}

/// `base == "/"` yields `"/" + name`; otherwise `base` with any trailing
/// slash trimmed, then `/name`.
pub fn join_path(base: &str, name: &str) -> String {
    if base == "/" {
        format!("/{name}")
    } else {
        format!("{}/{}", base.trim_end_matches('/'), name)
    }
}

/// `"/"` maps to `""`, the sentinel for "above root". Otherwise the
/// substring before the last `/`, or `"/"` if that `/` is the first byte.
pub fn parent_path(path: &str) -> String {
    if path == "/" {
        return String::new();
    }
    match path.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
        None => String::new(),
    }
}

#[derive(Clone)]
pub struct Namespace {
    entries: Vec<FileEntry>,
    current_path: String,
}

impl Namespace {
    /// A freshly seeded namespace: one root directory entry and nothing
    /// else.
    pub fn new_root() -> Self {
        Namespace {
            entries: vec![FileEntry {
                name: "root".to_string(),
                kind: EntryKind::Directory,
                path: "/".to_string(),
                used: true,
                content: Vec::new(),
            }],
            current_path: "/".to_string(),
        }
    }

    /// Wraps an entry list loaded from the encrypted region. Current
    /// directory always resets to root on (re)mount; it is session-local
    /// state, never persisted.
    pub fn from_entries(entries: Vec<FileEntry>) -> Self {
        Namespace {
            entries,
            current_path: "/".to_string(),
        }
    }

    pub fn current_path(&self) -> &str {
        &self.current_path
    }

    /// Serializes the full entry list, the only thing persisted.
    pub fn encode(&self) -> Vec<u8> {
        bincode::serialize(&self.entries).expect("FileEntry list is always serializable")
    }

    /// Deserializes a persisted entry list. Callers must MAC-verify the
    /// ciphertext this came from before calling this.
    pub fn decode(bytes: &[u8]) -> Result<Vec<FileEntry>> {
        bincode::deserialize(bytes).map_err(|_| VaultError::Corrupt)
    }

    fn validate_name(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(VaultError::InvalidArgument(
                "name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    fn find_used(&self, path: &str) -> Option<&FileEntry> {
        self.entries.iter().find(|e| e.used && e.path == path)
    }

    fn find_used_mut(&mut self, path: &str) -> Option<&mut FileEntry> {
        self.entries.iter_mut().find(|e| e.used && e.path == path)
    }

    /// Direct children of the current directory, in insertion order.
    pub fn list(&self) -> Vec<&FileEntry> {
        let base = self.current_path.clone();
        self.entries
            .iter()
            .filter(|e| e.used && parent_path(&e.path) == base)
            .collect()
    }

    /// Depth-first enumeration from root: `(depth, entry)` pairs.
    pub fn tree(&self) -> Vec<(usize, &FileEntry)> {
        let mut out = Vec::new();
        self.tree_from("", 0, &mut out);
        out
    }

    fn tree_from<'a>(&'a self, base: &str, level: usize, out: &mut Vec<(usize, &'a FileEntry)>) {
        for e in &self.entries {
            if !e.used || parent_path(&e.path) != base {
                continue;
            }
            out.push((level, e));
            if e.kind == EntryKind::Directory {
                self.tree_from(&e.path, level + 1, out);
            }
        }
    }

    /// `"/"` resets to root; anything else is resolved as a child of the
    /// current directory. Multi-segment and other absolute paths are not
    /// supported.
    pub fn chdir(&mut self, target: &str) -> Result<()> {
        if target == "/" {
            self.current_path = "/".to_string();
            return Ok(());
        }
        let full = join_path(&self.current_path, target);
        let is_dir = self
            .entries
            .iter()
            .any(|e| e.used && e.kind == EntryKind::Directory && e.path == full);
        if is_dir {
            self.current_path = full;
            Ok(())
        } else {
            Err(VaultError::NotFound(target.to_string()))
        }
    }

    pub fn mkdir(&mut self, name: &str) -> Result<()> {
        Self::validate_name(name)?;
        let path = join_path(&self.current_path, name);
        if self.find_used(&path).is_some() {
            return Err(VaultError::Exists(name.to_string()));
        }
        self.entries.push(FileEntry {
            name: name.to_string(),
            kind: EntryKind::Directory,
            path,
            used: true,
            content: Vec::new(),
        });
        Ok(())
    }

    pub fn rmdir(&mut self, name: &str) -> Result<()> {
        let path = join_path(&self.current_path, name);
        match self
            .entries
            .iter_mut()
            .find(|e| e.used && e.kind == EntryKind::Directory && e.path == path)
        {
            Some(e) => {
                e.used = false;
                Ok(())
            }
            None => Err(VaultError::NotFound(name.to_string())),
        }
    }

    pub fn create(&mut self, name: &str) -> Result<()> {
        Self::validate_name(name)?;
        let path = join_path(&self.current_path, name);
        if self.find_used(&path).is_some() {
            return Err(VaultError::Exists(name.to_string()));
        }
        self.entries.push(FileEntry {
            name: name.to_string(),
            kind: EntryKind::File,
            path,
            used: true,
            content: Vec::new(),
        });
        Ok(())
    }

    pub fn write(&mut self, name: &str, data: impl Into<Vec<u8>>) -> Result<()> {
        Self::validate_name(name)?;
        let path = join_path(&self.current_path, name);
        match self.find_used_mut(&path) {
            Some(e) if e.kind == EntryKind::File => {
                e.content = data.into();
                Ok(())
            }
            _ => Err(VaultError::NotFound(name.to_string())),
        }
    }

    pub fn append(&mut self, name: &str, data: impl Into<Vec<u8>>) -> Result<()> {
        let path = join_path(&self.current_path, name);
        match self.find_used_mut(&path) {
            Some(e) if e.kind == EntryKind::File => {
                e.content.extend_from_slice(&data.into());
                Ok(())
            }
            _ => Err(VaultError::NotFound(name.to_string())),
        }
    }

    pub fn read(&self, name: &str) -> Result<&[u8]> {
        let path = join_path(&self.current_path, name);
        match self.find_used(&path) {
            Some(e) if e.kind == EntryKind::File => Ok(&e.content),
            _ => Err(VaultError::NotFound(name.to_string())),
        }
    }

    pub fn rm(&mut self, name: &str) -> Result<()> {
        let path = join_path(&self.current_path, name);
        match self
            .entries
            .iter_mut()
            .find(|e| e.used && e.kind == EntryKind::File && e.path == path)
        {
            Some(e) => {
                e.used = false;
                Ok(())
            }
            None => Err(VaultError::NotFound(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_and_parent_path() {
        assert_eq!(join_path("/", "docs"), "/docs");
        assert_eq!(join_path("/docs", "notes"), "/docs/notes");
        assert_eq!(parent_path("/"), "");
        assert_eq!(parent_path("/docs"), "/");
        assert_eq!(parent_path("/docs/notes"), "/docs");
    }

    #[test]
    fn mkdir_and_chdir_and_list() {
        let mut ns = Namespace::new_root();
        ns.mkdir("docs").unwrap();
        assert!(matches!(ns.mkdir("docs"), Err(VaultError::Exists(_))));
        ns.chdir("docs").unwrap();
        assert_eq!(ns.current_path(), "/docs");
        ns.create("notes").unwrap();
        ns.write("notes", b"hi".to_vec()).unwrap();
        assert_eq!(ns.read("notes").unwrap(), b"hi");
        ns.append("notes", b" there".to_vec()).unwrap();
        assert_eq!(ns.read("notes").unwrap(), b"hi there");

        ns.chdir("/").unwrap();
        let top = ns.list();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].name, "docs");
    }

    #[test]
    fn mkdir_twice_is_exists_rm_twice_is_not_found() {
        let mut ns = Namespace::new_root();
        ns.mkdir("x").unwrap();
        assert!(matches!(ns.mkdir("x"), Err(VaultError::Exists(_))));

        ns.create("f").unwrap();
        ns.rm("f").unwrap();
        assert!(matches!(ns.rm("f"), Err(VaultError::NotFound(_))));
    }

    #[test]
    fn tombstones_preserve_order() {
        let mut ns = Namespace::new_root();
        ns.create("a").unwrap();
        ns.create("b").unwrap();
        ns.create("c").unwrap();
        ns.rm("b").unwrap();
        let names: Vec<_> = ns.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["root", "a", "b", "c"]);
        assert_eq!(ns.list().iter().map(|e| e.name.as_str()).collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[test]
    fn empty_name_rejected() {
        let mut ns = Namespace::new_root();
        assert!(matches!(
            ns.mkdir(""),
            Err(VaultError::InvalidArgument(_))
        ));
        assert!(matches!(
            ns.create(""),
            Err(VaultError::InvalidArgument(_))
        ));
    }

    #[test]
    fn namespace_blob_round_trips() {
        let mut ns = Namespace::new_root();
        ns.mkdir("docs").unwrap();
        ns.chdir("docs").unwrap();
        ns.create("notes").unwrap();
        ns.write("notes", b"hi".to_vec()).unwrap();

        let blob = ns.encode();
        let entries = Namespace::decode(&blob).unwrap();
        let restored = Namespace::from_entries(entries);
        assert_eq!(restored.current_path(), "/"); // current dir is not persisted
        assert_eq!(restored.read_from("/docs/notes"), Some(b"hi".to_vec()));
    }

    impl Namespace {
        fn read_from(&self, path: &str) -> Option<Vec<u8>> {
            self.find_used(path).map(|e| e.content.clone())
        }
    }
}
