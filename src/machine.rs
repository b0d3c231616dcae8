//! The registers and store that make up one running machine (§3).

use crate::registers::{self, Level};
use crate::store::Store;

pub struct Machine {
    pub store: Store,
    pub a: u32,
    pub q: u32,
    pub level: Level,
}

impl Machine {
    pub fn new(store: Store) -> Self {
        Machine {
            store,
            a: 0,
            q: 0,
            level: Level::One,
        }
    }

    pub fn scr(&self) -> u16 {
        registers::read_scr(&self.store, self.level)
    }

    pub fn set_scr(&mut self, value: u16) {
        registers::write_scr(&mut self.store, self.level, value)
    }

    pub fn b(&self) -> u32 {
        registers::read_b(&self.store, self.level)
    }

    pub fn set_b(&mut self, value: u32) {
        registers::write_b(&mut self.store, self.level, value)
    }

    pub fn protects_initial_orders(&self) -> bool {
        self.level.protects_initial_orders()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_machine_starts_at_zero() {
        let m = Machine::new(Store::cleared());
        assert_eq!(m.a, 0);
        assert_eq!(m.q, 0);
        assert_eq!(m.level, Level::One);
    }
}
