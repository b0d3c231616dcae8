//! Function 15 I/O dispatch (§4.4): reader, punch, teletype, plotter, and
//! level-terminate. This is the only component that talks to the host's
//! peripheral files; the reader and teletype-input files are opened lazily
//! on first access.

use crate::error::EmulatorError;
use crate::machine::Machine;
use crate::plotter::Plotter;
use crate::registers::Level;
use crate::trace::Trace;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

const READER_KEY: u16 = 2048;
const TELETYPE_IN_KEY: u16 = 2052;
const PLOTTER_KEY: u16 = 4864;
const PUNCH_KEY: u16 = 6144;
const TELETYPE_OUT_KEY: u16 = 6148;
const LEVEL_TERMINATE_KEY: u16 = 7168;

/// One reel's worth of characters; the soft cap that aborts a punch (or,
/// here, a teletype-input read) with an overflow.
const REEL_CAP: usize = 120_000;

/// What function 15 did, beyond the A/Q/level mutations already applied to
/// `Machine` directly: either nothing notable, or a signal that the session
/// manager must turn into an orderly termination (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOutcome {
    Continue,
    ReaderExhausted,
    TtyExhausted,
    PunchOverflow,
}

#[derive(Debug, Clone)]
pub struct IoPaths {
    pub reader: PathBuf,
    pub punch: PathBuf,
    pub ttyin: PathBuf,
    pub plot: PathBuf,
}

/// A byte tape read lazily and fully into memory on first access, tracking
/// how much of it has been consumed so the unread remainder can be spilled
/// to the residual ("save") file at teardown.
struct Tape {
    path: PathBuf,
    data: Option<Vec<u8>>,
    pos: usize,
}

impl Tape {
    fn new(path: PathBuf) -> Self {
        Tape { path, data: None, pos: 0 }
    }

    fn ensure_open(&mut self) -> Result<(), EmulatorError> {
        if self.data.is_some() {
            return Ok(());
        }
        let bytes = match File::open(&self.path) {
            Ok(mut f) => {
                let mut buf = Vec::new();
                f.read_to_end(&mut buf).map_err(|source| EmulatorError::Peripheral {
                    path: self.path.clone(),
                    source,
                })?;
                buf
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(source) => {
                return Err(EmulatorError::Peripheral {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        self.data = Some(bytes);
        Ok(())
    }

    /// Reads one byte, or `None` if the tape is exhausted.
    fn read_byte(&mut self) -> Result<Option<u8>, EmulatorError> {
        self.ensure_open()?;
        let data = self.data.as_ref().unwrap();
        if self.pos >= data.len() {
            return Ok(None);
        }
        let byte = data[self.pos];
        self.pos += 1;
        Ok(Some(byte))
    }

    /// The unread suffix, for spilling to the residual file.
    fn residual(&self) -> &[u8] {
        match &self.data {
            Some(data) => &data[self.pos.min(data.len())..],
            None => &[],
        }
    }
}

pub struct IoDispatcher {
    reader: Tape,
    ttyin: Tape,
    punch_path: PathBuf,
    punch: Option<File>,
    punch_bytes: usize,
    ttyin_bytes: usize,
    plot_path: PathBuf,
    plotter: Plotter,
}

impl IoDispatcher {
    pub fn new(paths: IoPaths) -> Self {
        IoDispatcher::with_plotter_geometry(paths, 3600, 3600, 3)
    }

    pub fn with_plotter_geometry(paths: IoPaths, width: u32, height: u32, pen_size: u32) -> Self {
        IoDispatcher {
            reader: Tape::new(paths.reader),
            ttyin: Tape::new(paths.ttyin),
            punch_path: paths.punch,
            punch: None,
            punch_bytes: 0,
            ttyin_bytes: 0,
            plot_path: paths.plot,
            plotter: Plotter::new(width, height, pen_size),
        }
    }

    pub fn dispatch(
        &mut self,
        machine: &mut Machine,
        m: u16,
        trace: &mut Trace,
    ) -> Result<(IoOutcome, u64), EmulatorError> {
        let key = m & 0x1FFF;
        match key {
            READER_KEY => self.read_reader(machine),
            TELETYPE_IN_KEY => self.read_teletype(machine),
            PLOTTER_KEY => self.send_plotter(machine),
            PUNCH_KEY => self.write_punch(machine),
            TELETYPE_OUT_KEY => self.write_teletype(machine, trace),
            LEVEL_TERMINATE_KEY => self.level_terminate(machine),
            other => Err(EmulatorError::UnsupportedIo(other)),
        }
    }

    fn read_reader(&mut self, machine: &mut Machine) -> Result<(IoOutcome, u64), EmulatorError> {
        match self.reader.read_byte()? {
            Some(byte) => {
                machine.a = ((machine.a << 7) | byte as u32) & 0x3FFFF;
                Ok((IoOutcome::Continue, 4_000))
            }
            None => Ok((IoOutcome::ReaderExhausted, 4_000)),
        }
    }

    fn read_teletype(&mut self, machine: &mut Machine) -> Result<(IoOutcome, u64), EmulatorError> {
        if self.ttyin_bytes >= REEL_CAP {
            return Ok((IoOutcome::TtyExhausted, 100_000));
        }
        match self.ttyin.read_byte()? {
            Some(byte) => {
                self.ttyin_bytes += 1;
                machine.a = ((machine.a << 7) | byte as u32) & 0x3FFFF;
                print!("{}", (byte & 0x7F) as char);
                let _ = std::io::stdout().flush();
                Ok((IoOutcome::Continue, 100_000))
            }
            None => Ok((IoOutcome::TtyExhausted, 100_000)),
        }
    }

    fn send_plotter(&mut self, machine: &mut Machine) -> Result<(IoOutcome, u64), EmulatorError> {
        let bits = (machine.a & 0x3F) as u8;
        self.plotter.command(bits);
        let elapsed = if Plotter::is_pen_command(bits) { 20_000 } else { 3_300 };
        Ok((IoOutcome::Continue, elapsed))
    }

    fn write_punch(&mut self, machine: &mut Machine) -> Result<(IoOutcome, u64), EmulatorError> {
        if self.punch_bytes >= REEL_CAP {
            return Ok((IoOutcome::PunchOverflow, 9_091));
        }
        let byte = (machine.a & 0xFF) as u8;
        self.ensure_punch_open()?;
        self.punch
            .as_mut()
            .unwrap()
            .write_all(&[byte])
            .map_err(|source| EmulatorError::Peripheral {
                path: self.punch_path.clone(),
                source,
            })?;
        self.punch_bytes += 1;
        Ok((IoOutcome::Continue, 9_091))
    }

    fn write_teletype(
        &mut self,
        machine: &mut Machine,
        trace: &mut Trace,
    ) -> Result<(IoOutcome, u64), EmulatorError> {
        let byte = (machine.a & 0x7F) as u8;
        if byte == 10 || (32..=122).contains(&byte) {
            print!("{}", byte as char);
            let _ = std::io::stdout().flush();
        } else {
            trace.io(TELETYPE_OUT_KEY, machine.a, machine.a);
            log::trace!("teletype: dropped non-printable byte {byte:#04o}");
        }
        Ok((IoOutcome::Continue, 100_000))
    }

    fn level_terminate(&mut self, machine: &mut Machine) -> Result<(IoOutcome, u64), EmulatorError> {
        machine.level = Level::Four;
        Ok((IoOutcome::Continue, 19))
    }

    fn ensure_punch_open(&mut self) -> Result<(), EmulatorError> {
        if self.punch.is_some() {
            return Ok(());
        }
        let file = File::create(&self.punch_path).map_err(|source| EmulatorError::Peripheral {
            path: self.punch_path.clone(),
            source,
        })?;
        self.punch = Some(file);
        Ok(())
    }

    /// Spills any unread reader bytes to `save_path`, flushes the plotter
    /// PNG, and closes the punch. Called once, at orderly teardown.
    pub fn teardown(&mut self, save_path: &Path) -> Result<(), EmulatorError> {
        let residual = self.reader.residual();
        if !residual.is_empty() {
            std::fs::write(save_path, residual).map_err(|source| EmulatorError::Peripheral {
                path: save_path.to_path_buf(),
                source,
            })?;
        }
        self.plotter.save(&self.plot_path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use std::io::Read as _;

    fn temp_paths(tag: &str) -> (PathBuf, IoPaths) {
        let dir = std::env::temp_dir().join(format!("e903-io-test-{tag}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let paths = IoPaths {
            reader: dir.join(".reader"),
            punch: dir.join(".punch"),
            ttyin: dir.join(".ttyin"),
            plot: dir.join(".plot.png"),
        };
        (dir, paths)
    }

    #[test]
    fn reader_bootstrap_loads_three_bytes_then_stops() {
        let (dir, paths) = temp_paths("reader");
        std::fs::write(&paths.reader, [0x01u8, 0x02, 0x03]).unwrap();

        let mut machine = Machine::new(Store::cleared());
        let mut io = IoDispatcher::new(paths);
        let mut trace = Trace::new(0, None, None, None, false);

        for expected in [1u32, 2, 3] {
            machine.a = 0;
            let (outcome, _) = io.dispatch(&mut machine, READER_KEY, &mut trace).unwrap();
            assert_eq!(outcome, IoOutcome::Continue);
            assert_eq!(machine.a, expected);
        }

        let (outcome, _) = io.dispatch(&mut machine, READER_KEY, &mut trace).unwrap();
        assert_eq!(outcome, IoOutcome::ReaderExhausted);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn residual_reader_bytes_spill_to_save_file() {
        let (dir, paths) = temp_paths("residual");
        std::fs::write(&paths.reader, [1u8, 2, 3, 4, 5]).unwrap();
        let save_path = dir.join(".save");

        let mut machine = Machine::new(Store::cleared());
        let mut io = IoDispatcher::new(paths);
        let mut trace = Trace::new(0, None, None, None, false);

        io.dispatch(&mut machine, READER_KEY, &mut trace).unwrap();
        io.dispatch(&mut machine, READER_KEY, &mut trace).unwrap();
        io.teardown(&save_path).unwrap();

        let mut saved = Vec::new();
        File::open(&save_path).unwrap().read_to_end(&mut saved).unwrap();
        assert_eq!(saved, vec![3, 4, 5]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn punch_writes_exactly_the_emitted_byte() {
        let (dir, paths) = temp_paths("punch");
        let punch_path = paths.punch.clone();

        let mut machine = Machine::new(Store::cleared());
        machine.a = 0x41;
        let mut io = IoDispatcher::new(paths);
        let mut trace = Trace::new(0, None, None, None, false);

        let (outcome, _) = io.dispatch(&mut machine, PUNCH_KEY, &mut trace).unwrap();
        assert_eq!(outcome, IoOutcome::Continue);

        let mut contents = Vec::new();
        File::open(&punch_path).unwrap().read_to_end(&mut contents).unwrap();
        assert_eq!(contents, vec![0x41]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn level_terminate_switches_scr_and_b_to_level_4_cells() {
        let (dir, paths) = temp_paths("level");
        let mut machine = Machine::new(Store::cleared());
        machine.set_scr(100);
        let mut io = IoDispatcher::new(paths);
        let mut trace = Trace::new(0, None, None, None, false);

        io.dispatch(&mut machine, LEVEL_TERMINATE_KEY, &mut trace).unwrap();

        assert_eq!(machine.level, Level::Four);
        machine.set_scr(200);
        assert_eq!(machine.store.read(6), 200);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn unsupported_io_key_is_fatal() {
        let (dir, paths) = temp_paths("bad");
        let mut machine = Machine::new(Store::cleared());
        let mut io = IoDispatcher::new(paths);
        let mut trace = Trace::new(0, None, None, None, false);
        assert!(io.dispatch(&mut machine, 1, &mut trace).is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
