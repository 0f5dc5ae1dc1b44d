use thiserror::Error;

/// Error taxonomy for the vault core.
///
/// Cryptographic failures encountered while trial-decrypting header slots
/// are never surfaced directly to callers outside `mount`; the mount loop
/// swallows them and only returns `WrongPassword` once every slot has been
/// tried.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("no slot decrypted under the supplied password")]
    WrongPassword,

    #[error("slot did not decrypt under the supplied password, or is corrupt")]
    WrongPasswordOrCorrupt,

    #[error("decrypted region failed authentication or parsing")]
    Corrupt,

    #[error("no entry named {0:?}")]
    NotFound(String),

    #[error("entry {0:?} already exists")]
    Exists(String),

    #[error("encrypted namespace ({needed} bytes) exceeds the volume's reserved size ({capacity} bytes)")]
    VolumeFull { needed: u64, capacity: u64 },

    #[error("backing file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, VaultError>;
