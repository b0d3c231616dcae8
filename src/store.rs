//! The 16384-word core store and its on-disk image.

use crate::error::{EmulatorError, StoreImageError};
use crate::word;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Total addressable words. Addresses are 14 bits, 0..STORE_SIZE.
pub const STORE_SIZE: usize = 16_384;

/// First address of the twelve-word bootstrap block.
pub const INITIAL_ORDERS_START: u16 = 8180;

/// Last address (inclusive) of the bootstrap block.
pub const INITIAL_ORDERS_END: u16 = 8191;

/// Bits 14..13 of an address select its 8K module.
pub const MODULE_MASK: u16 = 0x6000;

/// The 13-bit displacement field carried by every instruction's address
/// field, used by function 11 (Store S) to split the SCR into its module
/// and address halves.
pub const ADDRESS_MASK: u16 = 0x1FFF;

const fn encode(b_modified: bool, function: u8, address: u16) -> u32 {
    ((b_modified as u32) << 17) | ((function as u32) << 13) | (address as u32 & 0x1FFF)
}

/// The fixed bootstrap routine reinstalled at every session start. See
/// SPEC_FULL.md §6 for the (module, function, address) derivation of each
/// word; 8180 is a plain data word, the rest are instructions.
const INITIAL_ORDERS: [u32; 12] = [
    word_neg3(),
    encode(false, 0, 8180),
    encode(false, 4, 8189),
    encode(false, 15, 2048),
    encode(false, 9, 8186),
    encode(false, 8, 8183),
    encode(false, 15, 2048),
    encode(true, 5, 8180),
    encode(false, 10, 1),
    encode(false, 4, 1),
    encode(false, 9, 8182),
    encode(false, 8, 8177),
];

const fn word_neg3() -> u32 {
    // -3 masked to 18 bits; word::mask isn't const, so inline the mask here.
    (((-3i64) as u64) & 0x3FFFF) as u32
}

/// The machine's core store, plus the bookkeeping needed to load and persist
/// it as a flat decimal file.
pub struct Store {
    cells: Vec<u32>,
}

impl Store {
    /// A freshly cleared store (all cells zero).
    pub fn cleared() -> Self {
        Self {
            cells: vec![0; STORE_SIZE],
        }
    }

    /// Read a decimal-encoded image from `path`, overlaying it onto a
    /// cleared store. A missing file yields a zeroed store; any other read
    /// or parse failure is fatal.
    pub fn load_or_clear(path: &Path) -> Result<Self, EmulatorError> {
        let mut store = Self::cleared();

        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(store),
            Err(e) => {
                return Err(EmulatorError::StoreImage {
                    path: path.to_path_buf(),
                    source: StoreImageError::Io(e),
                })
            }
        };

        let mut count = 0usize;
        for token in text.split_whitespace() {
            if count >= STORE_SIZE {
                return Err(EmulatorError::StoreImage {
                    path: path.to_path_buf(),
                    source: StoreImageError::WrongCount(count + 1),
                });
            }
            let value: i64 = token.parse().map_err(|_| EmulatorError::StoreImage {
                path: path.to_path_buf(),
                source: StoreImageError::InvalidToken(token.to_string()),
            })?;
            store.cells[count] = word::mask(value);
            count += 1;
        }

        Ok(store)
    }

    /// Overwrite positions 8180..=8191 with the fixed bootstrap. Called at
    /// every session start, after the image overlay.
    pub fn install_initial_orders(&mut self) {
        for (offset, &value) in INITIAL_ORDERS.iter().enumerate() {
            self.cells[INITIAL_ORDERS_START as usize + offset] = value;
        }
    }

    /// True for the protected bootstrap range; writes here are silently
    /// dropped while priority level 1 is active.
    pub fn is_initial_orders_address(addr: u16) -> bool {
        (INITIAL_ORDERS_START..=INITIAL_ORDERS_END).contains(&addr)
    }

    pub fn read(&self, addr: u16) -> u32 {
        self.cells[addr as usize]
    }

    /// Bounds-checked read, for effective addresses the function unit
    /// computes at runtime (these can exceed STORE_SIZE once B-modification
    /// is added in, unlike the fixed addresses the rest of this module
    /// uses).
    pub fn read_checked(&self, addr: u16) -> Result<u32, EmulatorError> {
        self.cells
            .get(addr as usize)
            .copied()
            .ok_or(EmulatorError::AddressOutOfBounds(addr as u32))
    }

    /// Bounds-checked, protection-respecting write; the function unit's
    /// entry point for every store[m] write a running program performs.
    pub fn write_checked_protected(
        &mut self,
        addr: u16,
        value: u32,
        protected: bool,
    ) -> Result<(), EmulatorError> {
        if (addr as usize) >= self.cells.len() {
            return Err(EmulatorError::AddressOutOfBounds(addr as u32));
        }
        self.write_protected(addr, value, protected);
        Ok(())
    }

    /// Write unconditionally; callers that must honour level-1 write
    /// protection should check `is_initial_orders_address` first (the
    /// function unit and `write_protected` both do).
    pub fn write_raw(&mut self, addr: u16, value: u32) {
        self.cells[addr as usize] = word::mask(value as i64);
    }

    /// Write `value`, silently dropping it if `protected` names the
    /// bootstrap range. Mirrors every Store-cell write a running program can
    /// perform (function 5, the increment-in-store function, Store Q, etc).
    pub fn write_protected(&mut self, addr: u16, value: u32, protected: bool) {
        if protected && Self::is_initial_orders_address(addr) {
            return;
        }
        self.write_raw(addr, value);
    }

    /// Serialize all 16384 words as decimal integers, seven columns wide,
    /// ten per line, replacing `path` atomically (write to a sibling temp
    /// file, then rename over the target).
    pub fn persist(&self, path: &Path) -> std::io::Result<()> {
        let mut buf = String::with_capacity(STORE_SIZE * 8);
        for (i, &cell) in self.cells.iter().enumerate() {
            let signed = word::to_signed(cell);
            buf.push_str(&format!("{:>7}", signed));
            if (i + 1) % 10 == 0 {
                buf.push('\n');
            }
        }
        if !buf.ends_with('\n') {
            buf.push('\n');
        }

        let tmp_path = tmp_path_for(path);
        {
            let mut tmp = fs::File::create(&tmp_path)?;
            tmp.write_all(buf.as_bytes())?;
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, path)
    }
}

/// Writes the dynamic-stop address as a single decimal integer, atomically.
pub fn persist_stop_address(path: &Path, addr: u16) -> std::io::Result<()> {
    let tmp_path = tmp_path_for(path);
    {
        let mut tmp = fs::File::create(&tmp_path)?;
        writeln!(tmp, "{addr}")?;
        tmp.sync_all()?;
    }
    fs::rename(&tmp_path, path)
}

fn tmp_path_for(path: &Path) -> std::path::PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn missing_image_yields_zeroed_store() {
        let store = Store::load_or_clear(Path::new("/nonexistent/path/.store")).unwrap();
        for addr in 0..STORE_SIZE as u16 {
            assert_eq!(store.read(addr), 0);
        }
    }

    #[test]
    fn initial_orders_match_the_fixed_bootstrap() {
        let mut store = Store::cleared();
        store.install_initial_orders();
        assert_eq!(store.read(8180), word::from_signed(-3));
        assert_eq!(store.read(8181), 8180);
        assert_eq!(store.read(8187), encode(true, 5, 8180));
        assert_eq!(store.read(8191), encode(false, 8, 8177));
    }

    #[test]
    fn level1_writes_to_bootstrap_are_dropped() {
        let mut store = Store::cleared();
        store.install_initial_orders();
        let before = store.read(8185);
        store.write_protected(8185, 12345, true);
        assert_eq!(store.read(8185), before);

        store.write_protected(8185, 12345, false);
        assert_eq!(store.read(8185), word::mask(12345));
    }

    #[test]
    fn load_then_persist_round_trips() {
        let mut store = Store::cleared();
        store.write_raw(0, word::from_signed(-1));
        store.write_raw(100, word::from_signed(42));
        store.write_raw(16383, word::from_signed(-131072));

        let dir = std::env::temp_dir().join(format!("e903-store-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(".store");

        store.persist(&path).unwrap();
        let reloaded = Store::load_or_clear(&path).unwrap();

        for addr in 0..STORE_SIZE as u16 {
            assert_eq!(store.read(addr), reloaded.read(addr), "addr {addr}");
        }

        let mut contents = String::new();
        fs::File::open(&path).unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents.split_whitespace().count(), STORE_SIZE);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn stop_address_persists_as_plain_decimal() {
        let dir = std::env::temp_dir().join(format!("e903-store-test-stop-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(".stop");

        persist_stop_address(&path, 8181).unwrap();

        let mut contents = String::new();
        fs::File::open(&path).unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents.trim(), "8181");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn wrong_word_count_is_fatal() {
        let dir = std::env::temp_dir().join(format!("e903-store-test-bad-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(".store");
        fs::write(&path, "1 2 3").unwrap();

        let err = Store::load_or_clear(&path);
        assert!(err.is_ok(), "fewer than STORE_SIZE tokens just leaves the rest zeroed");

        let mut too_many = String::new();
        for _ in 0..STORE_SIZE + 1 {
            too_many.push_str("0 ");
        }
        fs::write(&path, too_many).unwrap();
        assert!(Store::load_or_clear(&path).is_err());

        let _ = fs::remove_dir_all(&dir);
    }
}
