//! The live bridge handle and its protocol state machine.

pub mod registers;

use std::fmt;
use std::sync::Arc;

use crate::binary::BinarySet;
use crate::chips::ChipSequence;
use crate::config::memory::{MemoryRange, MemoryRegion};
use crate::config::BridgeConfig;
use crate::error::Error;
use crate::transport::{DebugTransport, TransportError};

use self::registers::RegisterId;

/// The core the bridge drives for step and register access: the fabric
/// controller on multi-core chips.
const FC_CORE: u8 = 0;

/// Run state of an attached target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// All cores halted; registers and memory are stable for inspection.
    Stopped,
    /// Cores released from halt.
    Running,
    /// The target stopped answering (e.g. a request timed out); only
    /// `detach` is valid until the caller re-attaches.
    Unknown,
}

/// The protocol state of a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// Constructed, no transport claimed yet.
    Unattached,
    /// Attached to the target with the contained run state.
    Attached(RunState),
    /// Detached; terminal.
    Detached,
}

impl BridgeState {
    /// Whether the bridge currently holds a live attachment.
    pub fn is_attached(&self) -> bool {
        matches!(self, BridgeState::Attached(_))
    }
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeState::Unattached => write!(f, "unattached"),
            BridgeState::Attached(RunState::Stopped) => write!(f, "attached (stopped)"),
            BridgeState::Attached(RunState::Running) => write!(f, "attached (running)"),
            BridgeState::Attached(RunState::Unknown) => write!(f, "attached (state unknown)"),
            BridgeState::Detached => write!(f, "detached"),
        }
    }
}

/// The host-side control object for one target chip.
///
/// A bridge is constructed unattached by [`create_bridge`](crate::create_bridge);
/// all capability operations require a prior [`attach`](Bridge::attach).
/// The handle is a unique resource: it exclusively owns one transport while
/// attached and is deliberately not `Clone`. Dropping an attached bridge
/// releases the transport.
///
/// One bridge is driven by one thread at a time; independent bridges (each
/// with its own transport) may run concurrently.
pub struct Bridge {
    sequence: Arc<dyn ChipSequence>,
    config: BridgeConfig,
    binaries: BinarySet,
    state: BridgeState,
    link: Option<Box<dyn DebugTransport>>,
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("chip", &self.chip_name())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Bridge {
    /// Creates an unattached bridge driving `sequence`.
    ///
    /// Callers normally go through [`create_bridge`](crate::create_bridge);
    /// this constructor is the hook for externally registered chip variants.
    pub fn new(
        sequence: Arc<dyn ChipSequence>,
        config: BridgeConfig,
        binaries: BinarySet,
    ) -> Self {
        Self {
            sequence,
            config,
            binaries,
            state: BridgeState::Unattached,
            link: None,
        }
    }

    /// The chip variant this bridge implements.
    pub fn chip_name(&self) -> &'static str {
        self.sequence.chip_name()
    }

    /// The current protocol state.
    pub fn state(&self) -> BridgeState {
        self.state
    }

    /// The configuration snapshot this bridge was constructed from.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// The binaries handed over at construction time.
    pub fn binaries(&self) -> &BinarySet {
        &self.binaries
    }

    /// The memory map the load bounds check runs against.
    pub fn memory_map(&self) -> &[MemoryRegion] {
        self.sequence.memory_map()
    }

    /// Claims `link` and attaches to the target.
    ///
    /// Runs the chip specific reset/handshake sequence; on success the
    /// target is attached with all cores stopped. On failure the link is
    /// released again and the bridge stays unattached.
    #[tracing::instrument(skip(self, link), fields(chip = self.chip_name()))]
    pub fn attach(&mut self, mut link: Box<dyn DebugTransport>) -> Result<(), Error> {
        if self.state != BridgeState::Unattached {
            return Err(Error::InvalidState {
                operation: "attach",
                state: self.state,
            });
        }

        self.progress(format_args!("attaching"));
        link.open()?;
        match self
            .sequence
            .reset_and_handshake(link.as_mut(), self.config.request_timeout)
        {
            Ok(()) => {
                self.link = Some(link);
                self.state = BridgeState::Attached(RunState::Stopped);
                self.progress(format_args!(
                    "attached, {} core(s) halted",
                    self.sequence.core_count()
                ));
                Ok(())
            }
            Err(error) => {
                let _ = link.close();
                Err(error)
            }
        }
    }

    /// Loads the binaries supplied at construction time into target memory.
    pub fn load(&mut self) -> Result<(), Error> {
        // The images stay owned by the bridge; they are only moved out for
        // the duration of the call so `load_images` can borrow them while
        // the transport is borrowed mutably.
        let binaries = std::mem::take(&mut self.binaries);
        let result = self.load_images(&binaries);
        self.binaries = binaries;
        result
    }

    /// Loads `binaries` into target memory.
    ///
    /// Every image is validated against the chip's memory map before any of
    /// its bytes are transmitted. A transport failure partway through is
    /// not rolled back: the target memory is in an indeterminate state and
    /// the caller must load again.
    #[tracing::instrument(skip(self, binaries), fields(chip = self.chip_name()))]
    pub fn load_images(&mut self, binaries: &BinarySet) -> Result<(), Error> {
        self.require_attached("load")?;
        let timeout = self.config.request_timeout;

        for image in binaries.iter() {
            // An image whose end would wrap past the top of the address
            // space has no range and cannot fit anywhere.
            let fits = image.address_range().is_some_and(|range| {
                self.sequence
                    .memory_map()
                    .iter()
                    .any(|region| region.is_loadable() && region.range().contains_range(&range))
            });
            if !fits {
                return Err(Error::OutOfRange {
                    chip: self.chip_name().to_string(),
                    address: image.load_address,
                    length: image.data.len() as u64,
                });
            }

            self.progress(format_args!(
                "loading {} bytes at {:#010x}",
                image.data.len(),
                image.load_address
            ));
            let link = self.link.as_deref_mut().ok_or(TransportError::Closed)?;
            let result = self
                .sequence
                .write_memory(link, image.load_address, &image.data, timeout);
            if let Err(error) = result {
                self.note_timeout(&error);
                return Err(error);
            }
            tracing::debug!(
                address = image.load_address,
                len = image.data.len(),
                "image loaded"
            );
        }
        Ok(())
    }

    /// Releases the core(s) from halt. Succeeds trivially when already
    /// running.
    #[tracing::instrument(skip(self), fields(chip = self.chip_name()))]
    pub fn run(&mut self) -> Result<(), Error> {
        if self.require_attached("run")? == RunState::Running {
            return Ok(());
        }
        let link = self.link.as_deref_mut().ok_or(TransportError::Closed)?;
        let result = self.sequence.resume_cores(link, self.config.request_timeout);
        self.finish_transition(result, RunState::Running, "running")
    }

    /// Halts the core(s), preserving register and memory state. Succeeds
    /// trivially when already stopped.
    #[tracing::instrument(skip(self), fields(chip = self.chip_name()))]
    pub fn stop(&mut self) -> Result<(), Error> {
        if self.require_attached("stop")? == RunState::Stopped {
            return Ok(());
        }
        let link = self.link.as_deref_mut().ok_or(TransportError::Closed)?;
        let result = self.sequence.halt_cores(link, self.config.request_timeout);
        self.finish_transition(result, RunState::Stopped, "stopped")
    }

    /// Executes exactly one instruction on the fabric controller core, then
    /// returns to stopped.
    #[tracing::instrument(skip(self), fields(chip = self.chip_name()))]
    pub fn step(&mut self) -> Result<(), Error> {
        if self.require_attached("step")? == RunState::Running {
            return Err(Error::InvalidState {
                operation: "step",
                state: self.state,
            });
        }
        let link = self.link.as_deref_mut().ok_or(TransportError::Closed)?;
        let result = self
            .sequence
            .step_core(link, FC_CORE, self.config.request_timeout);
        self.finish_transition(result, RunState::Stopped, "stepped")
    }

    /// Writes the program entry point (taken from the first image that
    /// declares one) into the program counter, then releases the core(s).
    #[tracing::instrument(skip(self), fields(chip = self.chip_name()))]
    pub fn start(&mut self) -> Result<(), Error> {
        if self.require_attached("start")? == RunState::Running {
            return Err(Error::InvalidState {
                operation: "start",
                state: self.state,
            });
        }
        if let Some(entry) = self.binaries.entry_point() {
            let pc = self.sequence.registers().program_counter().id();
            self.progress(format_args!("starting at entry point {entry:#010x}"));
            let link = self.link.as_deref_mut().ok_or(TransportError::Closed)?;
            let result = self
                .sequence
                .write_register(link, FC_CORE, pc, entry, self.config.request_timeout);
            if let Err(error) = result {
                self.note_timeout(&error);
                return Err(error);
            }
        }
        self.run()
    }

    /// Re-runs the chip reset sequence; the target ends up attached and
    /// stopped.
    #[tracing::instrument(skip(self), fields(chip = self.chip_name()))]
    pub fn reset(&mut self) -> Result<(), Error> {
        self.require_attached("reset")?;
        let link = self.link.as_deref_mut().ok_or(TransportError::Closed)?;
        let result = self
            .sequence
            .reset_and_handshake(link, self.config.request_timeout);
        self.finish_transition(result, RunState::Stopped, "reset")
    }

    /// Reads target memory into `data`.
    pub fn read_memory(&mut self, address: u64, data: &mut [u8]) -> Result<(), Error> {
        self.require_access("read_memory")?;
        let link = self.link.as_deref_mut().ok_or(TransportError::Closed)?;
        let result = self
            .sequence
            .read_memory(link, address, data, self.config.request_timeout);
        self.surface(result)
    }

    /// Writes `data` to target memory.
    pub fn write_memory(&mut self, address: u64, data: &[u8]) -> Result<(), Error> {
        self.require_access("write_memory")?;
        let link = self.link.as_deref_mut().ok_or(TransportError::Closed)?;
        let result = self
            .sequence
            .write_memory(link, address, data, self.config.request_timeout);
        self.surface(result)
    }

    /// Reads a single 32 bit word from target memory.
    pub fn read_word_32(&mut self, address: u64) -> Result<u32, Error> {
        let mut bytes = [0u8; 4];
        self.read_memory(address, &mut bytes)?;
        Ok(u32::from_le_bytes(bytes))
    }

    /// Writes a single 32 bit word to target memory.
    pub fn write_word_32(&mut self, address: u64, value: u32) -> Result<(), Error> {
        self.write_memory(address, &value.to_le_bytes())
    }

    /// Reads a debug unit register of the fabric controller core.
    pub fn read_register(&mut self, id: impl Into<RegisterId>) -> Result<u64, Error> {
        let id = id.into();
        self.require_access("read_register")?;
        self.require_known_register(id)?;
        let link = self.link.as_deref_mut().ok_or(TransportError::Closed)?;
        let result = self
            .sequence
            .read_register(link, FC_CORE, id, self.config.request_timeout);
        self.surface(result)
    }

    /// Writes a debug unit register of the fabric controller core.
    pub fn write_register(&mut self, id: impl Into<RegisterId>, value: u64) -> Result<(), Error> {
        let id = id.into();
        self.require_access("write_register")?;
        self.require_known_register(id)?;
        let link = self.link.as_deref_mut().ok_or(TransportError::Closed)?;
        let result = self
            .sequence
            .write_register(link, FC_CORE, id, value, self.config.request_timeout);
        self.surface(result)
    }

    /// Releases the transport and leaves the terminal detached state.
    /// Idempotent: a second call is a no-op.
    #[tracing::instrument(skip(self), fields(chip = self.chip_name()))]
    pub fn detach(&mut self) -> Result<(), Error> {
        if self.state == BridgeState::Detached {
            return Ok(());
        }
        let link = self.link.take();
        self.state = BridgeState::Detached;
        if let Some(mut link) = link {
            self.progress(format_args!("detaching"));
            link.close()?;
        }
        Ok(())
    }

    fn require_attached(&self, operation: &'static str) -> Result<RunState, Error> {
        match self.state {
            BridgeState::Attached(RunState::Unknown) => Err(Error::InvalidState {
                operation,
                state: self.state,
            }),
            BridgeState::Attached(run_state) => Ok(run_state),
            BridgeState::Unattached | BridgeState::Detached => Err(Error::InvalidState {
                operation,
                state: self.state,
            }),
        }
    }

    fn require_access(&self, operation: &'static str) -> Result<(), Error> {
        let run_state = self.require_attached(operation)?;
        if run_state == RunState::Running && !self.sequence.supports_live_access() {
            return Err(Error::InvalidState {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }

    fn require_known_register(&self, id: RegisterId) -> Result<(), Error> {
        if !self.sequence.registers().contains(id) {
            return Err(Error::UnknownRegister {
                chip: self.chip_name().to_string(),
                id,
            });
        }
        Ok(())
    }

    /// Applies a run-state transition on success; on failure surfaces the
    /// error and degrades the run state if the target timed out.
    fn finish_transition(
        &mut self,
        result: Result<(), Error>,
        on_success: RunState,
        verb: &str,
    ) -> Result<(), Error> {
        match result {
            Ok(()) => {
                self.state = BridgeState::Attached(on_success);
                self.progress(format_args!("{verb}"));
                Ok(())
            }
            Err(error) => {
                self.note_timeout(&error);
                Err(error)
            }
        }
    }

    fn surface<T>(&mut self, result: Result<T, Error>) -> Result<T, Error> {
        if let Err(error) = &result {
            self.note_timeout(error);
        }
        result
    }

    /// A timed out target is in an unknown run state; the caller recovers
    /// by detaching and re-attaching.
    fn note_timeout(&mut self, error: &Error) {
        if matches!(error, Error::Transport(TransportError::Timeout(_)))
            && self.state.is_attached()
        {
            tracing::warn!(chip = self.chip_name(), "request timed out, run state unknown");
            self.state = BridgeState::Attached(RunState::Unknown);
        }
    }

    fn progress(&self, message: fmt::Arguments<'_>) {
        if self.config.verbose {
            eprintln!("[{}] {}", self.chip_name(), message);
        }
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        if let Some(mut link) = self.link.take() {
            let _ = link.close();
        }
    }
}
