//! NVML return codes (`nvmlReturn_t`) as a typed enumeration.

use std::ffi::c_int;
use std::fmt;

use serde::Serialize;

/// Raw NVML return type.
pub type NvmlReturn = c_int;

pub const NVML_SUCCESS: NvmlReturn = 0;

/// Typed NVML status.
///
/// Codes outside the known set are preserved in [`Return::Unrecognized`] so
/// nothing the driver reports is lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Return {
    Success,
    Uninitialized,
    InvalidArgument,
    NotSupported,
    NoPermission,
    AlreadyInitialized,
    NotFound,
    InsufficientSize,
    InsufficientPower,
    DriverNotLoaded,
    Timeout,
    IrqIssue,
    LibraryNotFound,
    FunctionNotFound,
    CorruptedInforom,
    GpuIsLost,
    ResetRequired,
    OperatingSystem,
    LibRmVersionMismatch,
    InUse,
    Memory,
    NoData,
    VgpuEccNotSupported,
    InsufficientResources,
    FreqNotSupported,
    ArgumentVersionMismatch,
    Deprecated,
    NotReady,
    GpuNotFound,
    InvalidState,
    Unknown,
    Unrecognized(NvmlReturn),
}

impl Return {
    pub fn from_raw(code: NvmlReturn) -> Self {
        match code {
            0 => Self::Success,
            1 => Self::Uninitialized,
            2 => Self::InvalidArgument,
            3 => Self::NotSupported,
            4 => Self::NoPermission,
            5 => Self::AlreadyInitialized,
            6 => Self::NotFound,
            7 => Self::InsufficientSize,
            8 => Self::InsufficientPower,
            9 => Self::DriverNotLoaded,
            10 => Self::Timeout,
            11 => Self::IrqIssue,
            12 => Self::LibraryNotFound,
            13 => Self::FunctionNotFound,
            14 => Self::CorruptedInforom,
            15 => Self::GpuIsLost,
            16 => Self::ResetRequired,
            17 => Self::OperatingSystem,
            18 => Self::LibRmVersionMismatch,
            19 => Self::InUse,
            20 => Self::Memory,
            21 => Self::NoData,
            22 => Self::VgpuEccNotSupported,
            23 => Self::InsufficientResources,
            24 => Self::FreqNotSupported,
            25 => Self::ArgumentVersionMismatch,
            26 => Self::Deprecated,
            27 => Self::NotReady,
            28 => Self::GpuNotFound,
            29 => Self::InvalidState,
            999 => Self::Unknown,
            other => Self::Unrecognized(other),
        }
    }

    pub fn as_raw(self) -> NvmlReturn {
        match self {
            Self::Success => 0,
            Self::Uninitialized => 1,
            Self::InvalidArgument => 2,
            Self::NotSupported => 3,
            Self::NoPermission => 4,
            Self::AlreadyInitialized => 5,
            Self::NotFound => 6,
            Self::InsufficientSize => 7,
            Self::InsufficientPower => 8,
            Self::DriverNotLoaded => 9,
            Self::Timeout => 10,
            Self::IrqIssue => 11,
            Self::LibraryNotFound => 12,
            Self::FunctionNotFound => 13,
            Self::CorruptedInforom => 14,
            Self::GpuIsLost => 15,
            Self::ResetRequired => 16,
            Self::OperatingSystem => 17,
            Self::LibRmVersionMismatch => 18,
            Self::InUse => 19,
            Self::Memory => 20,
            Self::NoData => 21,
            Self::VgpuEccNotSupported => 22,
            Self::InsufficientResources => 23,
            Self::FreqNotSupported => 24,
            Self::ArgumentVersionMismatch => 25,
            Self::Deprecated => 26,
            Self::NotReady => 27,
            Self::GpuNotFound => 28,
            Self::InvalidState => 29,
            Self::Unknown => 999,
            Self::Unrecognized(code) => code,
        }
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }

    /// `Ok(())` for success, the status itself otherwise.
    pub fn into_result(self) -> Result<(), Return> {
        if self.is_success() { Ok(()) } else { Err(self) }
    }

    /// NVML-style constant name, e.g. `NVML_ERROR_TIMEOUT`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Success => "NVML_SUCCESS",
            Self::Uninitialized => "NVML_ERROR_UNINITIALIZED",
            Self::InvalidArgument => "NVML_ERROR_INVALID_ARGUMENT",
            Self::NotSupported => "NVML_ERROR_NOT_SUPPORTED",
            Self::NoPermission => "NVML_ERROR_NO_PERMISSION",
            Self::AlreadyInitialized => "NVML_ERROR_ALREADY_INITIALIZED",
            Self::NotFound => "NVML_ERROR_NOT_FOUND",
            Self::InsufficientSize => "NVML_ERROR_INSUFFICIENT_SIZE",
            Self::InsufficientPower => "NVML_ERROR_INSUFFICIENT_POWER",
            Self::DriverNotLoaded => "NVML_ERROR_DRIVER_NOT_LOADED",
            Self::Timeout => "NVML_ERROR_TIMEOUT",
            Self::IrqIssue => "NVML_ERROR_IRQ_ISSUE",
            Self::LibraryNotFound => "NVML_ERROR_LIBRARY_NOT_FOUND",
            Self::FunctionNotFound => "NVML_ERROR_FUNCTION_NOT_FOUND",
            Self::CorruptedInforom => "NVML_ERROR_CORRUPTED_INFOROM",
            Self::GpuIsLost => "NVML_ERROR_GPU_IS_LOST",
            Self::ResetRequired => "NVML_ERROR_RESET_REQUIRED",
            Self::OperatingSystem => "NVML_ERROR_OPERATING_SYSTEM",
            Self::LibRmVersionMismatch => "NVML_ERROR_LIB_RM_VERSION_MISMATCH",
            Self::InUse => "NVML_ERROR_IN_USE",
            Self::Memory => "NVML_ERROR_MEMORY",
            Self::NoData => "NVML_ERROR_NO_DATA",
            Self::VgpuEccNotSupported => "NVML_ERROR_VGPU_ECC_NOT_SUPPORTED",
            Self::InsufficientResources => "NVML_ERROR_INSUFFICIENT_RESOURCES",
            Self::FreqNotSupported => "NVML_ERROR_FREQ_NOT_SUPPORTED",
            Self::ArgumentVersionMismatch => "NVML_ERROR_ARGUMENT_VERSION_MISMATCH",
            Self::Deprecated => "NVML_ERROR_DEPRECATED",
            Self::NotReady => "NVML_ERROR_NOT_READY",
            Self::GpuNotFound => "NVML_ERROR_GPU_NOT_FOUND",
            Self::InvalidState => "NVML_ERROR_INVALID_STATE",
            Self::Unknown | Self::Unrecognized(_) => "NVML_ERROR_UNKNOWN",
        }
    }

    /// Description used when the native `nvmlErrorString` is unavailable
    /// (library not loaded, or symbol missing).
    pub fn fallback_description(self) -> &'static str {
        match self {
            Self::Success => "The operation was successful",
            Self::Uninitialized => "NVML was not first initialized with nvmlInit()",
            Self::InvalidArgument => "A supplied argument is invalid",
            Self::NotSupported => "The requested operation is not available on target device",
            Self::NoPermission => "The current user does not have permission for operation",
            Self::AlreadyInitialized => "NVML has already been initialized",
            Self::NotFound => "A query to find an object was unsuccessful",
            Self::InsufficientSize => "An input argument is not large enough",
            Self::InsufficientPower => "A device's external power cables are not properly attached",
            Self::DriverNotLoaded => "NVIDIA driver is not loaded",
            Self::Timeout => "User provided timeout passed",
            Self::IrqIssue => "NVIDIA Kernel detected an interrupt issue with a GPU",
            Self::LibraryNotFound => "NVML Shared Library couldn't be found or loaded",
            Self::FunctionNotFound => "Local version of NVML doesn't implement this function",
            Self::CorruptedInforom => "infoROM is corrupted",
            Self::GpuIsLost => "The GPU has fallen off the bus or has otherwise become inaccessible",
            Self::ResetRequired => "The GPU requires a reset before it can be used again",
            Self::OperatingSystem => "The GPU control device has been blocked by the operating system/cgroups",
            Self::LibRmVersionMismatch => "RM detects a driver/library version mismatch",
            Self::InUse => "An operation cannot be performed because the GPU is currently in use",
            Self::Memory => "Insufficient memory",
            Self::NoData => "No data",
            Self::VgpuEccNotSupported => "The requested vGPU operation is not available because ECC is enabled",
            Self::InsufficientResources => "Ran out of critical resources, other than memory",
            Self::FreqNotSupported => "The requested frequency is not supported",
            Self::ArgumentVersionMismatch => "The provided version is invalid/unsupported",
            Self::Deprecated => "The requested functionality has been deprecated",
            Self::NotReady => "The system is not ready for the request",
            Self::GpuNotFound => "No GPUs were found",
            Self::InvalidState => "Resource not in correct state to perform requested operation",
            Self::Unknown | Self::Unrecognized(_) => "An internal driver error occurred",
        }
    }
}

impl From<NvmlReturn> for Return {
    fn from(code: NvmlReturn) -> Self {
        Self::from_raw(code)
    }
}

impl fmt::Display for Return {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.fallback_description(), self.as_raw())
    }
}
