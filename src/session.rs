//! The fetch/decode/execute loop (§4.5): drives the machine to completion
//! and reports why it stopped. Persistence is the caller's job — this
//! module only knows when to stop, not where its state should be written.

use crate::error::EmulatorError;
use crate::function_unit::{self, StepResult};
use crate::instruction;
use crate::io::{IoDispatcher, IoOutcome};
use crate::machine::Machine;
use crate::store::STORE_SIZE;
use crate::trace::Trace;

/// Sixteen function codes, indexed by `Function::code()`.
pub type Histogram = [u64; 16];

/// Why the session stopped running, on the `Ok` side of the world (§7): all
/// of these persist the Store on the way out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    DynamicStop(u16),
    ReaderExhausted,
    TtyExhausted,
    InstructionLimit,
    PunchOverflow,
}

impl ExitReason {
    /// The process exit code this reason maps to (§6).
    pub fn exit_code(self) -> i32 {
        match self {
            ExitReason::DynamicStop(_) => 0,
            ExitReason::ReaderExhausted => 2,
            ExitReason::TtyExhausted => 4,
            ExitReason::InstructionLimit => 8,
            ExitReason::PunchOverflow => 16,
        }
    }
}

pub struct Session {
    pub machine: Machine,
    pub io: IoDispatcher,
    trace: Trace,
    histogram: Histogram,
    instruction_count: u64,
    elapsed_us: u64,
    abandon_after: Option<u64>,
}

impl Session {
    pub fn new(machine: Machine, io: IoDispatcher, trace: Trace, abandon_after: Option<u64>) -> Self {
        Session {
            machine,
            io,
            trace,
            histogram: [0; 16],
            instruction_count: 0,
            elapsed_us: 0,
            abandon_after,
        }
    }

    pub fn instruction_count(&self) -> u64 {
        self.instruction_count
    }

    pub fn histogram(&self) -> Histogram {
        self.histogram
    }

    pub fn elapsed_us(&self) -> u64 {
        self.elapsed_us
    }

    pub fn run(&mut self) -> Result<ExitReason, EmulatorError> {
        loop {
            if let Some(reason) = self.step()? {
                self.trace.summary(self.instruction_count, self.elapsed_us);
                return Ok(reason);
            }
        }
    }

    /// One pass of §4.5's nine-step sequence. Returns `Some(reason)` once an
    /// orderly termination condition is met, `None` to keep running.
    fn step(&mut self) -> Result<Option<ExitReason>, EmulatorError> {
        // 1. Read SCR; fail if past the end of the store.
        let last_scr = self.machine.scr();
        if last_scr as usize >= STORE_SIZE {
            return Err(EmulatorError::ScrOverflow(last_scr as u32));
        }

        // 2. Increment SCR.
        self.machine.set_scr(last_scr.wrapping_add(1));

        // 3. Decode.
        let instr = self.machine.store.read(last_scr);
        let b = self.machine.b();
        let decoded = instruction::decode(instr, last_scr, b);

        let monitor_was_armed = self.trace.is_monitor_armed();
        self.trace.before_step(last_scr, instr);

        // 4. Histogram.
        self.histogram[decoded.function.code() as usize] += 1;

        // 5. Execute.
        let StepResult { elapsed_us, io_outcome } =
            function_unit::execute(&mut self.machine, &mut self.io, &mut self.trace, decoded)?;
        self.instruction_count += 1;
        self.elapsed_us += elapsed_us;

        // 6. One-shot monitor trace is consumed the instruction after it armed.
        if monitor_was_armed {
            self.trace.disarm_monitor();
        }

        // 7. Trace-activation conditions.
        self.trace.check_triggers(self.instruction_count, last_scr);
        if self.trace.tick_window() {
            log::info!("trace window exhausted after 1000 instructions; abandoning");
            return Ok(Some(ExitReason::InstructionLimit));
        }

        // An I/O dispatch can itself signal an orderly termination.
        match io_outcome {
            IoOutcome::ReaderExhausted => return Ok(Some(ExitReason::ReaderExhausted)),
            IoOutcome::TtyExhausted => return Ok(Some(ExitReason::TtyExhausted)),
            IoOutcome::PunchOverflow => return Ok(Some(ExitReason::PunchOverflow)),
            IoOutcome::Continue => {}
        }

        // 8. Instruction-count abandonment.
        if let Some(limit) = self.abandon_after {
            if self.instruction_count >= limit {
                return Ok(Some(ExitReason::InstructionLimit));
            }
        }

        // 9. Dynamic stop: the instruction just executed jumped to itself.
        if self.machine.scr() == last_scr {
            return Ok(Some(ExitReason::DynamicStop(last_scr)));
        }

        Ok(None)
    }
}
