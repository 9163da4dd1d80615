//! Multi-pin interrupt dispatch on a background thread.
//!
//! An [`IrqMux`] tracks up to `capacity` pins. Once started, a single worker
//! thread polls all of their value descriptors and calls each pin's callback
//! when its edge fires. Callbacks run one at a time on the worker, with the
//! pin's mutex held, so the owner of a [`SharedPin`] cannot close or
//! reconfigure it in the middle of a dispatch.
//!
//! ```no_run
//! use std::sync::Arc;
//! use gpio_sysfs::{irq::IrqMux, pin::options::{Direction, Edge}, Sysfs};
//!
//! # fn main() -> Result<(), gpio_sysfs::Error> {
//! let sysfs = Sysfs::new();
//! let button = Arc::new(parking_lot::Mutex::new(
//!     sysfs.open_with_direction(17, Direction::In)?,
//! ));
//!
//! let mut mux = IrqMux::new(4);
//! mux.enable_callback(&button, Edge::Rising, |pin, level| {
//!     println!("gpio{} is now {:?}", pin.number(), level);
//!     Ok(())
//! })?;
//! mux.add(&button)?;
//! mux.start()?;
//! // ...
//! mux.stop();
//! # Ok(()) }
//! ```

use std::{
    collections::HashMap,
    fs::File,
    io::Write,
    os::fd::AsFd,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc,
    },
    thread::{self, JoinHandle},
};

use itertools::Itertools;
use log::{debug, error, info, warn};
use nix::{
    errno::Errno,
    poll::{PollFd, PollFlags, PollTimeout},
};
use parking_lot::Mutex;

use super::IRQ_EVENTS;
use crate::{
    errors::{ErrorKind, Result},
    pin::{
        options::Edge,
        values::{self, Level},
        Pin,
    },
    Error,
};

/// A pin shared between its owner and an [`IrqMux`].
pub type SharedPin = Arc<Mutex<Pin>>;

/// Called on the worker thread with the pin that fired and the level read
/// right after the edge. The result is only logged.
///
/// The pin is passed in already locked; locking its [`SharedPin`] again from
/// inside the callback deadlocks.
pub type IrqCallback = Box<dyn FnMut(&mut Pin, Level) -> Result<()> + Send + 'static>;

type WorkerBody = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

struct Entry {
    number: u32,
    pin: SharedPin,
    value_fd: File,
    callback: Option<IrqCallback>,
    active: bool,
}

impl Entry {
    fn dispatch(&mut self) {
        // Reading from offset zero acknowledges the edge; without it the
        // descriptor stays ready.
        let level = match values::read_level(&self.value_fd) {
            Ok(level) => level,
            Err(e) => {
                warn!("gpio{}: read after irq failed, no longer watched: {e}", self.number);
                self.active = false;
                return;
            }
        };
        debug!("gpio{}: irq, level {level:?}", self.number);

        let Some(callback) = self.callback.as_mut() else {
            return;
        };
        let mut pin = self.pin.lock();
        if let Err(e) = callback(&mut pin, level) {
            warn!("gpio{}: irq callback returned error: {e}", self.number);
        }
    }
}

struct Worker {
    stop: Arc<AtomicBool>,
    // Both pipe ends stay open here so the wake write never hits a closed pipe.
    wake_tx: File,
    _wake_rx: File,
    handle: JoinHandle<Result<()>>,
}

enum State {
    Idle,
    Running(Worker),
    Stopped,
}

/// Interrupt multiplexer over a fixed set of pins.
pub struct IrqMux {
    capacity: usize,
    tracked: usize,
    entries: Vec<Entry>,
    pending: HashMap<u32, IrqCallback>,
    state: State,
    last_error: Option<Error>,
}

impl IrqMux {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            tracked: 0,
            entries: Vec::with_capacity(capacity),
            pending: HashMap::new(),
            state: State::Idle,
            last_error: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of pins tracked, including while the set is with the worker.
    pub fn len(&self) -> usize {
        self.tracked
    }

    pub fn is_empty(&self) -> bool {
        self.tracked == 0
    }

    /// Start tracking `pin`. Only possible before [`IrqMux::start`].
    pub fn add(&mut self, pin: &SharedPin) -> Result<()> {
        self.ensure_idle()?;
        if self.entries.len() >= self.capacity {
            return Err(ErrorKind::CapacityExceeded(self.capacity).into());
        }

        let (number, value_fd) = {
            let mut guard = pin.lock();
            let number = guard.number();
            if self.entries.iter().any(|e| e.number == number) {
                return Err(Error::invalid_operation(
                    number,
                    "already tracked by this multiplexer",
                ));
            }
            (number, guard.try_clone_value_fd()?)
        };

        // A freshly opened sysfs value file reports ready until read once.
        values::read_level(&value_fd).map_err(|e| Error::io(number, "read value", e))?;

        debug!("irq mux: tracking gpio{number}");
        self.entries.push(Entry {
            number,
            pin: Arc::clone(pin),
            value_fd,
            callback: self.pending.remove(&number),
            active: true,
        });
        self.tracked = self.entries.len();
        Ok(())
    }

    /// Arm `pin` for `mode` edges and have `callback` run when one fires.
    ///
    /// The pin may be added before or after this call, but not after
    /// [`IrqMux::start`]. A later call for the same pin replaces the callback.
    pub fn enable_callback<F>(&mut self, pin: &SharedPin, mode: Edge, callback: F) -> Result<()>
    where
        F: FnMut(&mut Pin, Level) -> Result<()> + Send + 'static,
    {
        self.ensure_idle()?;

        let number = {
            let mut guard = pin.lock();
            guard.enable_irq(mode)?;
            guard.number()
        };

        let callback: IrqCallback = Box::new(callback);
        match self.entries.iter_mut().find(|e| e.number == number) {
            Some(entry) => entry.callback = Some(callback),
            None => {
                self.pending.insert(number, callback);
            }
        }
        Ok(())
    }

    /// Spawn the worker thread. The tracked set is fixed from here on.
    ///
    /// If the thread cannot be created the multiplexer stays idle with its
    /// pins and callbacks, and `start` may be retried.
    pub fn start(&mut self) -> Result<()> {
        self.start_with(|body| thread::Builder::new().name("gpio-irq".into()).spawn(body))
    }

    fn start_with<S>(&mut self, spawn: S) -> Result<()>
    where
        S: FnOnce(WorkerBody) -> std::io::Result<JoinHandle<Result<()>>>,
    {
        self.ensure_idle()?;

        let spawn_err = |e: std::io::Error| Error::from(ErrorKind::Spawn(e));
        let (wake_rx, wake_tx) = nix::unistd::pipe().map_err(|e| spawn_err(e.into()))?;
        let wake_rx = File::from(wake_rx);
        let worker_wake = wake_rx.try_clone().map_err(spawn_err)?;

        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = Arc::clone(&stop);
        // The entries move to the worker only once it exists.
        let (entries_tx, entries_rx) = mpsc::channel::<Vec<Entry>>();
        let body: WorkerBody = Box::new(move || match entries_rx.recv() {
            Ok(mut entries) => run(&mut entries, &worker_wake, &worker_stop),
            Err(_) => Ok(()),
        });
        let handle = spawn(body).map_err(spawn_err)?;

        let entries = std::mem::take(&mut self.entries);
        if let Err(mpsc::SendError(entries)) = entries_tx.send(entries) {
            self.entries = entries;
            let _ = handle.join();
            return Err(spawn_err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "irq worker exited before receiving its pins",
            )));
        }

        for number in self.pending.keys() {
            warn!("irq mux: callback for gpio{number} dropped, pin was never added");
        }
        self.pending.clear();

        self.state = State::Running(Worker {
            stop,
            wake_tx: File::from(wake_tx),
            _wake_rx: wake_rx,
            handle,
        });
        Ok(())
    }

    /// Stop and join the worker and release the tracked pins.
    ///
    /// Safe to call on a multiplexer that was never started or is already
    /// stopped. An error that ended the worker is kept in
    /// [`IrqMux::last_error`].
    pub fn stop(&mut self) {
        self.entries.clear();
        self.pending.clear();
        self.tracked = 0;

        let State::Running(mut worker) = std::mem::replace(&mut self.state, State::Stopped) else {
            return;
        };

        worker.stop.store(true, Ordering::Release);
        if let Err(e) = worker.wake_tx.write(&[1]) {
            warn!("irq mux: failed to wake worker: {e}");
        }

        match worker.handle.join() {
            Ok(Ok(())) => debug!("irq mux: worker stopped"),
            Ok(Err(e)) => {
                error!("irq mux: worker failed: {e}");
                self.last_error = Some(e);
            }
            Err(_) => error!("irq mux: worker panicked"),
        }
    }

    /// Stop the multiplexer and hand back the error that ended the worker,
    /// if any.
    pub fn destroy(mut self) -> Option<Error> {
        self.stop();
        self.last_error.take()
    }

    /// True while the worker thread is alive.
    pub fn is_running(&self) -> bool {
        match &self.state {
            State::Running(worker) => !worker.handle.is_finished(),
            State::Idle | State::Stopped => false,
        }
    }

    /// The error that ended the worker, once it has been joined.
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    fn ensure_idle(&self) -> Result<()> {
        match self.state {
            State::Idle => Ok(()),
            State::Running(_) | State::Stopped => Err(ErrorKind::AlreadyStarted.into()),
        }
    }
}

impl Drop for IrqMux {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for IrqMux {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            State::Idle => "idle",
            State::Running(_) => "running",
            State::Stopped => "stopped",
        };
        f.debug_struct("IrqMux")
            .field("capacity", &self.capacity)
            .field("tracked", &self.tracked)
            .field("state", &state)
            .finish()
    }
}

fn is_ready(fd: &PollFd<'_>) -> bool {
    fd.revents().is_some_and(|r| !r.is_empty())
}

/// Worker loop: poll every active pin plus the wake pipe, dispatch ready pins.
fn run(entries: &mut [Entry], wake: &File, stop: &AtomicBool) -> Result<()> {
    info!("irq worker: watching {} pins", entries.len());

    while !stop.load(Ordering::Acquire) {
        let watched: Vec<usize> = entries.iter().positions(|e| e.active).collect();

        let ready: Vec<usize> = {
            let mut fds = Vec::with_capacity(watched.len() + 1);
            fds.push(PollFd::new(wake.as_fd(), PollFlags::POLLIN));
            fds.extend(
                watched
                    .iter()
                    .map(|&idx| PollFd::new(entries[idx].value_fd.as_fd(), IRQ_EVENTS)),
            );

            match nix::poll::poll(&mut fds, PollTimeout::NONE) {
                Ok(_) => {}
                Err(Errno::EINTR) => continue,
                Err(errno) => {
                    error!("irq worker: poll failed: {errno}");
                    return Err(ErrorKind::Poll(errno).into());
                }
            }

            if is_ready(&fds[0]) {
                break;
            }

            fds[1..]
                .iter()
                .zip(&watched)
                .filter(|(fd, _)| is_ready(fd))
                .map(|(_, &idx)| idx)
                .collect()
        };

        for idx in ready {
            entries[idx].dispatch();
        }
    }

    debug!("irq worker: exiting");
    Ok(())
}
