//! The NVML context: library handle, resolution table, and lifecycle.
//!
//! One `RwLock` guards the handle/table pair. `init` and `shutdown` hold the
//! write lock for their whole duration; every facade call holds the read
//! lock while it is inside native code, so a library is never closed under
//! a running call.

use std::ffi::{c_uint, CStr};

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{error, info, warn};

use rnvml_core::config::{InitConfig, NvmlConfig};

use crate::dl::{Loader, RawSymbol, SymbolSource, SystemLoader};
use crate::error::{check, NvmlError};
use crate::ffi::{FnErrorString, FnInit, FnInitV2, FnInitWithFlags, FnShutdown};
use crate::probe::probe;
use crate::status::Return;
use crate::symbols::{BindingInfo, Operation, ResolutionTable, SymbolVersion};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LifecycleState {
    Uninitialized,
    Ready,
    /// Only observable from inside `shutdown`, which holds the write lock.
    ShuttingDown,
}

#[derive(Debug, Clone, Copy)]
enum InitMode {
    Default,
    Flags(u32),
}

struct Context<S> {
    state: LifecycleState,
    library: Option<S>,
    table: ResolutionTable,
}

/// Safe handle to NVML.
///
/// Construct one per loader; [`crate::global`] provides the process-wide
/// instance backed by the system library.
pub struct Nvml<L: Loader = SystemLoader> {
    loader: L,
    context: RwLock<Context<L::Library>>,
}

impl Nvml<SystemLoader> {
    /// Context that loads NVML from the platform default locations.
    pub fn new() -> Self {
        Self::with_loader(SystemLoader::default())
    }

    /// Context that loads NVML using the configured search order.
    pub fn from_config(config: &NvmlConfig) -> Self {
        Self::with_loader(SystemLoader::new(&config.library))
    }
}

impl Default for Nvml<SystemLoader> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: Loader> Nvml<L> {
    pub fn with_loader(loader: L) -> Self {
        Self {
            loader,
            context: RwLock::new(Context {
                state: LifecycleState::Uninitialized,
                library: None,
                table: ResolutionTable::new(),
            }),
        }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn state(&self) -> LifecycleState {
        self.context.read().state
    }

    pub fn is_initialized(&self) -> bool {
        self.state() == LifecycleState::Ready
    }

    // ── Lifecycle ─────────────────────────────────────────────────

    /// Load the library, bind the newest entry points, and call `nvmlInit`.
    pub fn init(&self) -> Result<(), NvmlError> {
        self.init_with_mode(InitMode::Default)
    }

    /// As [`Nvml::init`], but initializes through `nvmlInitWithFlags`.
    pub fn init_with_flags(&self, flags: u32) -> Result<(), NvmlError> {
        self.init_with_mode(InitMode::Flags(flags))
    }

    /// Initialize the way `[init]` in `rnvml.toml` asks for: through
    /// `nvmlInitWithFlags` when flags are set, plain `init` otherwise.
    pub fn init_configured(&self, config: &InitConfig) -> Result<(), NvmlError> {
        if config.flags != 0 {
            self.init_with_flags(config.flags)
        } else {
            self.init()
        }
    }

    fn init_with_mode(&self, mode: InitMode) -> Result<(), NvmlError> {
        let mut ctx = self.context.write();
        if ctx.state != LifecycleState::Uninitialized {
            return Err(NvmlError::AlreadyInitialized);
        }

        let mut library = self.loader.open().map_err(NvmlError::LibraryNotFound)?;

        ctx.table.reset_to_defaults();
        let summary = match probe(&library, &mut ctx.table) {
            Ok(summary) => summary,
            Err(e) => {
                error!("symbol probe failed for {}: {}", library.origin(), e);
                Self::discard(&mut library, &mut ctx.table);
                return Err(NvmlError::Probe(e));
            }
        };

        if let Err(e) = Self::native_init(&ctx.table, mode) {
            error!("NVML initialization failed: {}", e);
            Self::discard(&mut library, &mut ctx.table);
            return Err(e);
        }

        info!(
            "NVML initialized from {} ({} operation(s) upgraded, {} unavailable)",
            library.origin(),
            summary.upgraded,
            summary.missing
        );
        ctx.library = Some(library);
        ctx.state = LifecycleState::Ready;
        Ok(())
    }

    fn native_init(table: &ResolutionTable, mode: InitMode) -> Result<(), NvmlError> {
        let (operation, flags) = match mode {
            InitMode::Default => (Operation::Init, 0),
            InitMode::Flags(flags) => (Operation::InitWithFlags, flags),
        };
        let binding = table.resolve(operation);
        let symbol = binding
            .symbol()
            .ok_or(NvmlError::Native(Return::FunctionNotFound))?;

        let raw = unsafe {
            match (operation, binding.version()) {
                (Operation::InitWithFlags, _) => {
                    symbol.cast::<FnInitWithFlags>()(flags as c_uint)
                }
                (_, SymbolVersion::V1) => symbol.cast::<FnInit>()(),
                _ => symbol.cast::<FnInitV2>()(),
            }
        };
        check(raw)
    }

    /// Close a library that failed to initialize and forget its bindings.
    fn discard(library: &mut L::Library, table: &mut ResolutionTable) {
        if let Err(e) = library.close() {
            warn!("failed to close {}: {}", library.origin(), e);
        }
        table.reset_to_defaults();
    }

    /// Call `nvmlShutdown`, unload the library, and reset every binding.
    ///
    /// If the native shutdown reports an error the library stays loaded and
    /// the context stays `Ready`.
    pub fn shutdown(&self) -> Result<(), NvmlError> {
        let mut ctx = self.context.write();
        if ctx.state != LifecycleState::Ready {
            return Err(NvmlError::NotLoaded);
        }
        ctx.state = LifecycleState::ShuttingDown;

        match ctx.table.resolve(Operation::Shutdown).symbol() {
            Some(symbol) => {
                let raw = unsafe { symbol.cast::<FnShutdown>()() };
                if let Err(e) = check(raw) {
                    error!("nvmlShutdown failed: {}", e);
                    ctx.state = LifecycleState::Ready;
                    return Err(e);
                }
            }
            None => warn!("nvmlShutdown not exported; unloading without it"),
        }

        let closed = match ctx.library.take() {
            Some(mut library) => library.close(),
            None => Ok(()),
        };
        ctx.table.reset_to_defaults();
        ctx.state = LifecycleState::Uninitialized;

        match closed {
            Ok(()) => {
                info!("NVML shut down");
                Ok(())
            }
            Err(e) => {
                error!("failed to unload NVML: {}", e);
                Err(NvmlError::Close(e))
            }
        }
    }

    // ── Dispatch ──────────────────────────────────────────────────

    /// Run `call` with the entry point bound for `operation`, holding the read
    /// lock for the duration of the call.
    pub(crate) fn dispatch<T>(
        &self,
        operation: Operation,
        call: impl FnOnce(SymbolVersion, RawSymbol) -> Result<T, NvmlError>,
    ) -> Result<T, NvmlError> {
        let ctx = self.context.read();
        if ctx.state != LifecycleState::Ready {
            return Err(NvmlError::Uninitialized);
        }
        let binding = ctx.table.resolve(operation);
        let symbol = binding
            .symbol()
            .ok_or(NvmlError::Native(Return::FunctionNotFound))?;
        call(binding.version(), symbol)
    }

    // ── Inspection ────────────────────────────────────────────────

    /// Describe a status, through `nvmlErrorString` when the library is
    /// loaded and with a built-in description otherwise.
    pub fn error_string(&self, ret: Return) -> String {
        let native = self.dispatch(Operation::ErrorString, |_, symbol| {
            let ptr = unsafe { symbol.cast::<FnErrorString>()(ret.as_raw()) };
            if ptr.is_null() {
                return Err(NvmlError::Native(Return::Unknown));
            }
            Ok(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
        });
        native.unwrap_or_else(|_| ret.fallback_description().to_string())
    }

    /// Which entry point is currently bound for `operation`.
    pub fn binding(&self, operation: Operation) -> BindingInfo {
        let ctx = self.context.read();
        BindingInfo::new(operation, ctx.table.resolve(operation))
    }

    /// Snapshot of every binding, in `Operation::ALL` order.
    pub fn bindings(&self) -> Vec<BindingInfo> {
        let ctx = self.context.read();
        ctx.table
            .iter()
            .map(|(operation, binding)| BindingInfo::new(operation, binding))
            .collect()
    }
}
