use crate::dl::DlError;
use crate::status::Return;

#[derive(Debug, thiserror::Error)]
pub enum NvmlError {
    #[error("NVML library not initialized")]
    Uninitialized,

    #[error("NVML library already initialized")]
    AlreadyInitialized,

    #[error("NVML library not loaded")]
    NotLoaded,

    #[error("failed to load NVML: {0}")]
    LibraryNotFound(#[source] DlError),

    #[error("failed to probe NVML symbols: {0}")]
    Probe(#[source] DlError),

    #[error("failed to unload NVML: {0}")]
    Close(#[source] DlError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("NVML error: {0}")]
    Native(Return),
}

impl NvmlError {
    /// NVML return code equivalent of this error.
    pub fn code(&self) -> Return {
        match self {
            Self::Uninitialized | Self::NotLoaded => Return::Uninitialized,
            Self::AlreadyInitialized => Return::AlreadyInitialized,
            Self::LibraryNotFound(_) => Return::LibraryNotFound,
            Self::Probe(_) => Return::FunctionNotFound,
            Self::Close(_) => Return::Unknown,
            Self::InvalidArgument(_) => Return::InvalidArgument,
            Self::Native(ret) => *ret,
        }
    }
}

impl From<Return> for NvmlError {
    fn from(ret: Return) -> Self {
        Self::Native(ret)
    }
}

/// Turn a raw native status into `Ok(())` or [`NvmlError::Native`].
pub(crate) fn check(raw: crate::status::NvmlReturn) -> Result<(), NvmlError> {
    Return::from_raw(raw).into_result().map_err(NvmlError::Native)
}
