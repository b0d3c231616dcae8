//! Diagnostics (§7): an OR-composable verbosity bitmask, a one-shot monitor
//! trace, and a 1000-instruction windowed trace. All of it flows through
//! the `log` facade so it shares a backend (and the `--log-to-file`
//! switch) with the rest of the ambient logging.

pub const SUMMARY: u8 = 1;
pub const JUMPS: u8 = 2;
pub const INSTRUCTIONS: u8 = 4;
pub const IO: u8 = 8;

const WINDOW_LEN: u64 = 1000;

pub struct Trace {
    verbosity: u8,
    monitor_address: Option<u16>,
    last_monitored_value: Option<u32>,
    monitor_armed: bool,
    trace_count_threshold: Option<u64>,
    trace_address: Option<u16>,
    window_active: bool,
    window_remaining: u64,
}

impl Trace {
    pub fn new(
        verbosity: u8,
        monitor_address: Option<u16>,
        trace_count_threshold: Option<u64>,
        trace_address: Option<u16>,
        windowed: bool,
    ) -> Self {
        Trace {
            verbosity,
            monitor_address,
            last_monitored_value: None,
            monitor_armed: false,
            trace_count_threshold,
            trace_address,
            window_active: windowed,
            window_remaining: if windowed { WINDOW_LEN } else { 0 },
        }
    }

    fn enabled(&self, bit: u8) -> bool {
        self.verbosity & bit != 0
    }

    /// Whether the fetch/execute of the next instruction should be traced
    /// at instruction granularity, either because bit 4 is set globally, a
    /// monitored address just changed, or we are inside a trace window.
    fn instruction_tracing_active(&self) -> bool {
        self.enabled(INSTRUCTIONS) || self.monitor_armed || self.window_active
    }

    pub fn before_step(&self, scr: u16, instr: u32) {
        if self.instruction_tracing_active() {
            log::trace!("scr={scr:#06o} instr={instr:#06o}");
        }
    }

    pub fn jump(&self, function_name: &str, from: u16, to: u16) {
        if self.enabled(JUMPS) {
            log::debug!("{function_name}: {from:#06o} -> {to:#06o}");
        }
    }

    pub fn io(&self, key: u16, a_before: u32, a_after: u32) {
        if self.enabled(IO) {
            log::debug!("io key={key:#06o} a: {a_before:#06o} -> {a_after:#06o}");
        }
    }

    pub fn summary(&self, instruction_count: u64, elapsed_us: u64) {
        if self.enabled(SUMMARY) {
            log::info!("{instruction_count} instructions, {elapsed_us} us estimated");
        }
    }

    /// Called after every store write; arms a one-shot instruction trace if
    /// the monitored address just changed.
    pub fn observe_write(&mut self, store: &crate::store::Store, addr: u16, before: u32) {
        if self.monitor_address != Some(addr) {
            return;
        }
        let after = store.read(addr);
        if Some(after) != self.last_monitored_value || after != before {
            self.last_monitored_value = Some(after);
            self.monitor_armed = true;
            log::debug!("monitor: {addr:#06o} changed to {after:#06o}");
        }
    }

    /// Consumes the one-shot monitor arming after the traced instruction
    /// executes.
    pub fn disarm_monitor(&mut self) {
        self.monitor_armed = false;
    }

    /// Whether the one-shot monitor trace is currently armed, without
    /// consuming it. The session loop samples this before executing the
    /// next instruction, since `observe_write` arms the flag for the
    /// instruction *after* the one that performed the write.
    pub fn is_monitor_armed(&self) -> bool {
        self.monitor_armed
    }

    /// Updates trigger state for the address-reached trace and the
    /// instruction-count threshold trace; called once per iteration with
    /// the instruction count and the SCR that was just executed.
    pub fn check_triggers(&mut self, instruction_count: u64, last_scr: u16) {
        if let Some(threshold) = self.trace_count_threshold {
            if instruction_count >= threshold {
                self.window_active = true;
            }
        }
        if self.trace_address == Some(last_scr) {
            self.window_active = true;
        }
    }

    /// Advances the windowed trace; returns true once the window has run
    /// its full 1000 instructions and the session should abandon.
    pub fn tick_window(&mut self) -> bool {
        if !self.window_active {
            return false;
        }
        if self.window_remaining == 0 {
            self.window_remaining = WINDOW_LEN;
        }
        self.window_remaining -= 1;
        if self.window_remaining == 0 {
            self.window_active = false;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[test]
    fn monitor_arms_on_change_and_disarms_after_one_step() {
        let mut trace = Trace::new(0, Some(100), None, None, false);
        let mut store = Store::cleared();
        store.write_raw(100, 42);
        trace.observe_write(&store, 100, 0);
        assert!(trace.instruction_tracing_active());
        trace.disarm_monitor();
        assert!(!trace.instruction_tracing_active());
    }

    #[test]
    fn windowed_trace_abandons_after_1000_instructions() {
        let mut trace = Trace::new(0, None, None, None, true);
        let mut abandoned = false;
        for _ in 0..1000 {
            abandoned = trace.tick_window();
        }
        assert!(abandoned);
    }
}
