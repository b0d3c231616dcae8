pub mod config;
pub mod error;
pub mod function_unit;
pub mod instruction;
pub mod io;
pub mod machine;
pub mod plotter;
pub mod registers;
pub mod session;
pub mod store;
pub mod trace;
pub mod word;

pub use crate::config::Config;
pub use crate::error::EmulatorError;
pub use crate::session::ExitReason;

use crate::io::{IoDispatcher, IoPaths};
use crate::machine::Machine;
use crate::session::Session;
use crate::store::Store;
use crate::trace::Trace;

/// Loads the store, runs a session to completion, and persists on every
/// orderly exit. Fatal errors propagate without touching any peripheral
/// file, per §7.
pub fn run(config: Config) -> Result<ExitReason, EmulatorError> {
    let mut store = Store::load_or_clear(&config.store)?;
    store.install_initial_orders();

    let mut machine = Machine::new(store);
    machine.set_scr(config.jump);

    let io_paths = IoPaths {
        reader: config.reader.clone(),
        punch: config.punch.clone(),
        ttyin: config.ttyin.clone(),
        plot: config.plot.clone(),
    };
    let io = IoDispatcher::with_plotter_geometry(io_paths, config.plot_width, config.plot_height, config.pen_size);

    let trace = Trace::new(
        config.verbosity,
        config.monitor,
        config.trace_count,
        config.trace_address,
        config.trace_window,
    );

    let mut session = Session::new(machine, io, trace, config.abandon_after);
    let reason = session.run()?;

    session.machine.store.persist(&config.store).map_err(EmulatorError::Io)?;
    session.io.teardown(&config.save)?;
    if let ExitReason::DynamicStop(addr) = reason {
        crate::store::persist_stop_address(&config.stop, addr).map_err(EmulatorError::Io)?;
    }

    Ok(reason)
}
