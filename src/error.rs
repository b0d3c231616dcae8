use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Why `Store::load_or_clear` rejected an on-disk image.
#[derive(Debug, Error)]
pub enum StoreImageError {
    #[error("expected 16384 words, found {0}")]
    WrongCount(usize),
    #[error("invalid integer token {0:?}")]
    InvalidToken(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Fatal emulator conditions (§7): printed with a diagnostic identifying the
/// offending instruction, then the process exits 1 *without* persisting the
/// store, since its contents are considered indeterminate.
#[derive(Debug, Error)]
pub enum EmulatorError {
    #[error("store image {path}: {source}")]
    StoreImage {
        path: PathBuf,
        #[source]
        source: StoreImageError,
    },

    #[error("peripheral I/O on {path}: {source}")]
    Peripheral {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("SCR reached {0}, past the end of the 16384-word store")]
    ScrOverflow(u32),

    #[error("effective address {0:#o} is outside the store")]
    AddressOutOfBounds(u32),

    #[error("shift amount {0} is not in a supported range (2048..6144 is undefined)")]
    UnsupportedShift(u16),

    #[error("function 15 sub-address {0:#06o} is not implemented")]
    UnsupportedIo(u16),

    #[error(transparent)]
    Io(#[from] io::Error),
}
