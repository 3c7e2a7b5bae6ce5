//! Dynamic loading of the NVML shared library.
//!
//! Uses `libloading` to open `libnvidia-ml.so.1` (Linux) or `nvml.dll`
//! (Windows). Symbol absence is reported as `Ok(None)` rather than an error
//! because the version probe relies on it as a normal outcome.

use std::ffi::c_void;
use std::ptr::NonNull;

use libloading::Library;
use tracing::{debug, info};

use rnvml_core::config::LibraryConfig;

#[derive(Debug, thiserror::Error)]
pub enum DlError {
    #[error("library not found: {0}")]
    NotFound(String),

    #[error("library already closed")]
    AlreadyClosed,

    #[error("symbol lookup for {symbol} failed: {reason}")]
    Lookup { symbol: String, reason: String },

    #[error("failed to close library: {0}")]
    Close(String),
}

/// Address of a resolved entry point, with no type attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSymbol(NonNull<c_void>);

// SAFETY: a symbol address is an immutable location in a loaded image; it is
// only dereferenced (called) while the owning library is held open.
unsafe impl Send for RawSymbol {}
unsafe impl Sync for RawSymbol {}

impl RawSymbol {
    /// Wrap a raw address. Returns `None` for a null pointer.
    pub fn from_ptr(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0.as_ptr()
    }

    /// Reinterpret the address as a typed function pointer.
    ///
    /// # Safety
    /// `F` must be a function pointer type matching the native signature of
    /// the symbol, and the library the symbol came from must still be open
    /// when the result is called.
    pub unsafe fn cast<F: Copy>(self) -> F {
        debug_assert_eq!(std::mem::size_of::<F>(), std::mem::size_of::<*mut c_void>());
        std::mem::transmute_copy::<*mut c_void, F>(&self.0.as_ptr())
    }
}

/// An open library that symbols can be resolved from.
pub trait SymbolSource: Send + Sync {
    /// Resolve `name`. `Ok(None)` means the symbol is not exported.
    fn lookup(&self, name: &str) -> Result<Option<RawSymbol>, DlError>;

    /// Release the library. A second close fails with [`DlError::AlreadyClosed`].
    fn close(&mut self) -> Result<(), DlError>;

    /// Where the library was loaded from, for diagnostics.
    fn origin(&self) -> &str;
}

/// Opens a [`SymbolSource`]. Injected into [`crate::Nvml`] so tests can
/// substitute a library built from Rust functions.
pub trait Loader: Send + Sync {
    type Library: SymbolSource;

    fn open(&self) -> Result<Self::Library, DlError>;
}

/// A library opened with `libloading`.
pub struct DynamicLibrary {
    lib: Option<Library>,
    origin: String,
}

impl DynamicLibrary {
    /// Open a shared library by exact name or path.
    pub fn open(name: &str) -> Result<Self, DlError> {
        let lib = unsafe { Library::new(name) }
            .map_err(|e| DlError::NotFound(format!("{}: {}", name, e)))?;
        Ok(Self {
            lib: Some(lib),
            origin: name.to_string(),
        })
    }

    /// Try each candidate in order and keep the first that loads.
    pub fn open_first<S: AsRef<str>>(candidates: &[S]) -> Result<Self, DlError> {
        let mut last_err = format!(
            "no candidate library names for {}",
            rnvml_common::platform::platform_name()
        );
        for name in candidates {
            let name = name.as_ref();
            match Self::open(name) {
                Ok(lib) => {
                    info!("loaded NVML from: {}", name);
                    return Ok(lib);
                }
                Err(e) => {
                    debug!("failed to load {}: {}", name, e);
                    last_err = e.to_string();
                }
            }
        }

        Err(DlError::NotFound(format!(
            "failed to load NVML library: {}",
            last_err
        )))
    }

    pub fn is_open(&self) -> bool {
        self.lib.is_some()
    }
}

impl SymbolSource for DynamicLibrary {
    fn lookup(&self, name: &str) -> Result<Option<RawSymbol>, DlError> {
        let lib = self.lib.as_ref().ok_or(DlError::AlreadyClosed)?;
        let result = unsafe { lib.get::<*mut c_void>(name.as_bytes()) };
        match result {
            Ok(sym) => Ok(RawSymbol::from_ptr(*sym)),
            // dlsym / GetProcAddress reporting "not exported"
            Err(libloading::Error::DlSym { .. })
            | Err(libloading::Error::DlSymUnknown)
            | Err(libloading::Error::GetProcAddress { .. })
            | Err(libloading::Error::GetProcAddressUnknown) => Ok(None),
            Err(e) => Err(DlError::Lookup {
                symbol: name.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    fn close(&mut self) -> Result<(), DlError> {
        let lib = self.lib.take().ok_or(DlError::AlreadyClosed)?;
        lib.close().map_err(|e| DlError::Close(e.to_string()))
    }

    fn origin(&self) -> &str {
        &self.origin
    }
}

/// Loads NVML from the configured search order.
#[derive(Debug, Clone)]
pub struct SystemLoader {
    candidates: Vec<String>,
}

impl SystemLoader {
    pub fn new(config: &LibraryConfig) -> Self {
        Self {
            candidates: config.candidates(),
        }
    }

    /// Load only from the given paths/names, ignoring configuration.
    pub fn with_candidates(candidates: Vec<String>) -> Self {
        Self { candidates }
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }
}

impl Default for SystemLoader {
    fn default() -> Self {
        Self::new(&LibraryConfig::default())
    }
}

impl Loader for SystemLoader {
    type Library = DynamicLibrary;

    fn open(&self) -> Result<DynamicLibrary, DlError> {
        DynamicLibrary::open_first(&self.candidates)
    }
}
