//! Execution of the sixteen function codes (§4.3).

use crate::error::EmulatorError;
use crate::instruction::{Decoded, Function};
use crate::io::{IoDispatcher, IoOutcome};
use crate::machine::Machine;
use crate::store::{ADDRESS_MASK, MODULE_MASK};
use crate::trace::Trace;
use crate::word;

/// What a single `execute` call did, besides mutating `machine` in place.
pub struct StepResult {
    pub elapsed_us: u64,
    pub io_outcome: IoOutcome,
}

pub fn execute(
    machine: &mut Machine,
    io: &mut IoDispatcher,
    trace: &mut Trace,
    decoded: Decoded,
) -> Result<StepResult, EmulatorError> {
    let m = decoded.m;
    let protected = machine.protects_initial_orders();
    let mut elapsed = if decoded.b_modified { 6 } else { 0 };
    let mut io_outcome = IoOutcome::Continue;

    match decoded.function {
        Function::LoadB => {
            let v = machine.store.read_checked(m)?;
            machine.q = v;
            machine.set_b(v);
            elapsed += 30;
        }

        Function::Add => {
            machine.a = word::mask(machine.a as i64 + machine.store.read_checked(m)? as i64);
            elapsed += 23;
        }

        Function::NegateAndAdd => {
            machine.a = word::mask(machine.store.read_checked(m)? as i64 - machine.a as i64);
            elapsed += 26;
        }

        Function::StoreQ => {
            let value = (machine.q >> 1) & word::WORD_MASK;
            let before = machine.store.read_checked(m)?;
            machine.store.write_checked_protected(m, value, protected)?;
            trace.observe_write(&machine.store, m, before);
            elapsed += 25;
        }

        Function::LoadA => {
            machine.a = machine.store.read_checked(m)?;
            elapsed += 23;
        }

        Function::StoreA => {
            let before = machine.store.read_checked(m)?;
            machine.store.write_checked_protected(m, machine.a, protected)?;
            trace.observe_write(&machine.store, m, before);
            elapsed += 25;
        }

        Function::Collate => {
            machine.a &= machine.store.read_checked(m)?;
            elapsed += 23;
        }

        Function::JumpIfZero => {
            let from = machine.scr();
            if machine.a == 0 {
                machine.set_scr(m);
                trace.jump("jump-if-zero", from, m);
                elapsed += 28;
            } else {
                elapsed += 20;
            }
        }

        Function::Jump => {
            let from = machine.scr();
            machine.set_scr(m);
            trace.jump("jump", from, m);
            elapsed += 23;
        }

        Function::JumpIfNegative => {
            let from = machine.scr();
            if word::to_signed(machine.a) < 0 {
                machine.set_scr(m);
                trace.jump("jump-if-negative", from, m);
                elapsed += 25;
            } else {
                elapsed += 20;
            }
        }

        Function::Increment => {
            let before = machine.store.read_checked(m)?;
            let value = word::mask(before as i64 + 1);
            machine.store.write_checked_protected(m, value, protected)?;
            trace.observe_write(&machine.store, m, before);
            elapsed += 24;
        }

        Function::StoreS => {
            let scr = machine.scr();
            machine.q = (scr & MODULE_MASK) as u32;
            let before = machine.store.read_checked(m)?;
            machine
                .store
                .write_checked_protected(m, (scr & ADDRESS_MASK) as u32, protected)?;
            trace.observe_write(&machine.store, m, before);
            elapsed += 30;
        }

        Function::Multiply => {
            multiply(machine, m)?;
            elapsed += 79;
        }

        Function::Divide => {
            divide(machine, m)?;
            elapsed += 79;
        }

        Function::Shift => {
            let amount = shift(machine, m)?;
            elapsed += 24 + 7 * amount as u64;
        }

        Function::Io => {
            let a_before = machine.a;
            let (outcome, io_elapsed) = io.dispatch(machine, m, trace)?;
            trace.io(m & 0x1FFF, a_before, machine.a);
            io_outcome = outcome;
            elapsed += io_elapsed;
        }
    }

    Ok(StepResult { elapsed_us: elapsed, io_outcome })
}

/// A:Q treated as a combined 36-bit signed register for the high-word of a
/// multiply, the dividend of a divide, and the operand of a shift.
fn multiply(machine: &mut Machine, m: u16) -> Result<(), EmulatorError> {
    let multiplicand = word::sign_extend64(machine.a);
    let multiplier = word::sign_extend64(machine.store.read_checked(m)?);
    let product = multiplicand * multiplier;

    let mut q = word::mask(product << 1);
    if multiplicand < 0 {
        q |= 1;
    }
    machine.a = word::mask(product >> 17);
    machine.q = q;
    Ok(())
}

fn divide(machine: &mut Machine, m: u16) -> Result<(), EmulatorError> {
    let divisor = word::sign_extend64(machine.store.read_checked(m)?);
    if divisor == 0 {
        log::warn!("divide by zero at m={m:#06o}; undefined on real hardware, A/Q left unchanged");
        return Ok(());
    }

    let a_signed = word::sign_extend64(machine.a);
    let aq: i64 = (a_signed << 18) | machine.q as i64;
    let quot = (aq / divisor) >> 1;
    let quot = word::mask(quot);

    machine.a = quot | 1;
    machine.q = quot & 0o777776;
    Ok(())
}

/// Returns the clamped shift magnitude actually applied, used by the caller
/// to charge the 7-us-per-place elapsed time.
fn shift(machine: &mut Machine, m: u16) -> Result<u32, EmulatorError> {
    let places = m & 0x1FFF;
    let a_signed = word::sign_extend64(machine.a);
    let aq: i64 = (a_signed << 18) | machine.q as i64;

    let (shifted, amount) = if places <= 2047 {
        let amount = (places as u32).min(36);
        (aq << amount, amount)
    } else if places >= 6144 {
        let amount = (8192u32.saturating_sub(places as u32)).min(36);
        (aq >> amount, amount)
    } else {
        return Err(EmulatorError::UnsupportedShift(places));
    };

    machine.q = word::mask(shifted);
    machine.a = word::mask(shifted >> 18);
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{Function, RawInstruction};
    use crate::io::IoDispatcher;
    use crate::store::Store;
    use std::path::PathBuf;

    fn exec(machine: &mut Machine, f: Function, m: u16) -> StepResult {
        let mut io = IoDispatcher::new(test_io_paths());
        let mut trace = Trace::new(0, None, None, None, false);
        let decoded = Decoded {
            function: f,
            m,
            b_modified: false,
        };
        execute(machine, &mut io, &mut trace, decoded).unwrap()
    }

    fn test_io_paths() -> crate::io::IoPaths {
        // None of these tests exercise function 15, so the peripherals are
        // never actually opened; the paths just need to exist as values.
        crate::io::IoPaths {
            reader: PathBuf::from("/nonexistent/.reader"),
            punch: PathBuf::from("/nonexistent/.punch"),
            ttyin: PathBuf::from("/nonexistent/.ttyin"),
            plot: PathBuf::from("/nonexistent/.plot.png"),
        }
    }

    #[test]
    fn add_wraps_modulo_18_bits() {
        let mut m = Machine::new(Store::cleared());
        m.a = word::from_signed(-1);
        m.store.write_raw(500, word::from_signed(1));
        exec(&mut m, Function::Add, 500);
        assert_eq!(m.a, 0);
    }

    #[test]
    fn multiply_positive_operands() {
        let mut m = Machine::new(Store::cleared());
        m.a = 2;
        m.store.write_raw(500, 3);
        exec(&mut m, Function::Multiply, 500);
        assert_eq!(m.a, 0);
        assert_eq!(m.q, 12);
    }

    #[test]
    fn multiply_sets_qs_low_bit_when_multiplicand_negative() {
        let mut m = Machine::new(Store::cleared());
        m.a = word::from_signed(-1);
        m.store.write_raw(500, 1);
        exec(&mut m, Function::Multiply, 500);
        assert_eq!(m.q & 1, 1);
    }

    #[test]
    fn multiply_then_shift_right_18_recovers_high_word() {
        let mut m = Machine::new(Store::cleared());
        m.a = word::from_signed(-200);
        m.store.write_raw(500, word::from_signed(300));
        exec(&mut m, Function::Multiply, 500);
        let expected_a = m.a;

        exec(&mut m, Function::Shift, 8192 - 18);
        assert_eq!(m.a, expected_a);
    }

    #[test]
    fn left_then_right_shift_is_identity() {
        for k in 1..=17u16 {
            let mut m = Machine::new(Store::cleared());
            m.a = word::from_signed(-12345);
            m.q = 0o123456;
            let original_a = m.a;

            exec(&mut m, Function::Shift, k);
            exec(&mut m, Function::Shift, 8192 - k);
            assert_eq!(m.a, original_a, "k={k}");
        }
    }

    #[test]
    fn shift_in_undefined_range_is_fatal() {
        let mut m = Machine::new(Store::cleared());
        let mut io = IoDispatcher::new(test_io_paths());
        let mut trace = Trace::new(0, None, None, None, false);
        let decoded = Decoded {
            function: Function::Shift,
            m: 3000,
            b_modified: false,
        };
        assert!(execute(&mut m, &mut io, &mut trace, decoded).is_err());
    }

    #[test]
    fn level1_store_a_into_bootstrap_is_suppressed() {
        let mut m = Machine::new(Store::cleared());
        m.store.install_initial_orders();
        let before = m.store.read(8185);
        m.a = 0o123456;
        exec(&mut m, Function::StoreA, 8185);
        assert_eq!(m.store.read(8185), before);
    }

    #[test]
    fn raw_round_trip_used_by_encode_decode_property() {
        let raw = RawInstruction {
            b_modified: true,
            function: Function::Divide,
            address_field: 42,
        };
        assert_eq!(RawInstruction::decode(raw.encode()), raw);
    }
}
