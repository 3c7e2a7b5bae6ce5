//! Logical operations, their versioned symbol candidates, and the table of
//! currently bound entry points.
//!
//! `DESCRIPTORS` is indexed by `Operation as usize` and every candidate list
//! is ordered oldest → newest. The probe relies on that ordering: later
//! candidates overwrite earlier ones, so the last present candidate wins.

use serde::Serialize;

use crate::dl::RawSymbol;

/// ABI revision of a concrete entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SymbolVersion {
    V1,
    V2,
    V3,
}

/// Stable identity of an NVML call, independent of which ABI revision
/// implements it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Operation {
    Init,
    InitWithFlags,
    Shutdown,
    ErrorString,
    SystemGetDriverVersion,
    SystemGetNvmlVersion,
    SystemGetCudaDriverVersion,
    DeviceGetCount,
    DeviceGetHandleByIndex,
    DeviceGetHandleByPciBusId,
    DeviceGetName,
    DeviceGetUuid,
    DeviceGetMemoryInfo,
    DeviceGetPciInfo,
    DeviceGetNvLinkRemotePciInfo,
    DeviceGetAttributes,
    DeviceGetComputeRunningProcesses,
    DeviceGetGraphicsRunningProcesses,
    DeviceGetMpsComputeRunningProcesses,
    DeviceRemoveGpu,
    GetExcludedDeviceCount,
    GetExcludedDeviceInfoByIndex,
    EventSetCreate,
    EventSetFree,
    DeviceRegisterEvents,
    DeviceGetSupportedEventTypes,
    EventSetWait,
}

impl Operation {
    pub const COUNT: usize = 27;

    pub const ALL: [Operation; Operation::COUNT] = [
        Operation::Init,
        Operation::InitWithFlags,
        Operation::Shutdown,
        Operation::ErrorString,
        Operation::SystemGetDriverVersion,
        Operation::SystemGetNvmlVersion,
        Operation::SystemGetCudaDriverVersion,
        Operation::DeviceGetCount,
        Operation::DeviceGetHandleByIndex,
        Operation::DeviceGetHandleByPciBusId,
        Operation::DeviceGetName,
        Operation::DeviceGetUuid,
        Operation::DeviceGetMemoryInfo,
        Operation::DeviceGetPciInfo,
        Operation::DeviceGetNvLinkRemotePciInfo,
        Operation::DeviceGetAttributes,
        Operation::DeviceGetComputeRunningProcesses,
        Operation::DeviceGetGraphicsRunningProcesses,
        Operation::DeviceGetMpsComputeRunningProcesses,
        Operation::DeviceRemoveGpu,
        Operation::GetExcludedDeviceCount,
        Operation::GetExcludedDeviceInfoByIndex,
        Operation::EventSetCreate,
        Operation::EventSetFree,
        Operation::DeviceRegisterEvents,
        Operation::DeviceGetSupportedEventTypes,
        Operation::EventSetWait,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn descriptor(self) -> &'static Descriptor {
        &DESCRIPTORS[self.index()]
    }
}

/// One concrete entry point for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub symbol: &'static str,
    pub version: SymbolVersion,
}

/// Static description of an operation and its candidates, oldest first.
#[derive(Debug)]
pub struct Descriptor {
    pub operation: Operation,
    pub candidates: &'static [Candidate],
}

impl Descriptor {
    /// The oldest candidate; bound by default before any probe.
    pub fn default_candidate(&self) -> &'static Candidate {
        &self.candidates[0]
    }

    pub fn is_versioned(&self) -> bool {
        self.candidates.len() > 1
    }
}

const fn v1(symbol: &'static str) -> Candidate {
    Candidate { symbol, version: SymbolVersion::V1 }
}

const fn v2(symbol: &'static str) -> Candidate {
    Candidate { symbol, version: SymbolVersion::V2 }
}

const fn v3(symbol: &'static str) -> Candidate {
    Candidate { symbol, version: SymbolVersion::V3 }
}

pub static DESCRIPTORS: [Descriptor; Operation::COUNT] = [
    Descriptor {
        operation: Operation::Init,
        candidates: &[v1("nvmlInit"), v2("nvmlInit_v2")],
    },
    Descriptor {
        operation: Operation::InitWithFlags,
        candidates: &[v1("nvmlInitWithFlags")],
    },
    Descriptor {
        operation: Operation::Shutdown,
        candidates: &[v1("nvmlShutdown")],
    },
    Descriptor {
        operation: Operation::ErrorString,
        candidates: &[v1("nvmlErrorString")],
    },
    Descriptor {
        operation: Operation::SystemGetDriverVersion,
        candidates: &[v1("nvmlSystemGetDriverVersion")],
    },
    Descriptor {
        operation: Operation::SystemGetNvmlVersion,
        candidates: &[v1("nvmlSystemGetNVMLVersion")],
    },
    Descriptor {
        operation: Operation::SystemGetCudaDriverVersion,
        candidates: &[
            v1("nvmlSystemGetCudaDriverVersion"),
            v2("nvmlSystemGetCudaDriverVersion_v2"),
        ],
    },
    Descriptor {
        operation: Operation::DeviceGetCount,
        candidates: &[v1("nvmlDeviceGetCount"), v2("nvmlDeviceGetCount_v2")],
    },
    Descriptor {
        operation: Operation::DeviceGetHandleByIndex,
        candidates: &[
            v1("nvmlDeviceGetHandleByIndex"),
            v2("nvmlDeviceGetHandleByIndex_v2"),
        ],
    },
    Descriptor {
        operation: Operation::DeviceGetHandleByPciBusId,
        candidates: &[
            v1("nvmlDeviceGetHandleByPciBusId"),
            v2("nvmlDeviceGetHandleByPciBusId_v2"),
        ],
    },
    Descriptor {
        operation: Operation::DeviceGetName,
        candidates: &[v1("nvmlDeviceGetName")],
    },
    Descriptor {
        operation: Operation::DeviceGetUuid,
        candidates: &[v1("nvmlDeviceGetUUID")],
    },
    Descriptor {
        operation: Operation::DeviceGetMemoryInfo,
        candidates: &[v1("nvmlDeviceGetMemoryInfo")],
    },
    Descriptor {
        operation: Operation::DeviceGetPciInfo,
        candidates: &[
            v1("nvmlDeviceGetPciInfo"),
            v2("nvmlDeviceGetPciInfo_v2"),
            v3("nvmlDeviceGetPciInfo_v3"),
        ],
    },
    Descriptor {
        operation: Operation::DeviceGetNvLinkRemotePciInfo,
        candidates: &[
            v1("nvmlDeviceGetNvLinkRemotePciInfo"),
            v2("nvmlDeviceGetNvLinkRemotePciInfo_v2"),
        ],
    },
    Descriptor {
        operation: Operation::DeviceGetAttributes,
        candidates: &[
            v1("nvmlDeviceGetAttributes"),
            v2("nvmlDeviceGetAttributes_v2"),
        ],
    },
    Descriptor {
        operation: Operation::DeviceGetComputeRunningProcesses,
        candidates: &[
            v1("nvmlDeviceGetComputeRunningProcesses"),
            v2("nvmlDeviceGetComputeRunningProcesses_v2"),
            v3("nvmlDeviceGetComputeRunningProcesses_v3"),
        ],
    },
    Descriptor {
        operation: Operation::DeviceGetGraphicsRunningProcesses,
        candidates: &[
            v1("nvmlDeviceGetGraphicsRunningProcesses"),
            v2("nvmlDeviceGetGraphicsRunningProcesses_v2"),
            v3("nvmlDeviceGetGraphicsRunningProcesses_v3"),
        ],
    },
    Descriptor {
        operation: Operation::DeviceGetMpsComputeRunningProcesses,
        candidates: &[
            v1("nvmlDeviceGetMPSComputeRunningProcesses"),
            v2("nvmlDeviceGetMPSComputeRunningProcesses_v2"),
            v3("nvmlDeviceGetMPSComputeRunningProcesses_v3"),
        ],
    },
    Descriptor {
        operation: Operation::DeviceRemoveGpu,
        candidates: &[v1("nvmlDeviceRemoveGpu"), v2("nvmlDeviceRemoveGpu_v2")],
    },
    Descriptor {
        operation: Operation::GetExcludedDeviceCount,
        candidates: &[
            v1("nvmlGetBlacklistDeviceCount"),
            v2("nvmlGetExcludedDeviceCount"),
        ],
    },
    Descriptor {
        operation: Operation::GetExcludedDeviceInfoByIndex,
        candidates: &[
            v1("nvmlGetBlacklistDeviceInfoByIndex"),
            v2("nvmlGetExcludedDeviceInfoByIndex"),
        ],
    },
    Descriptor {
        operation: Operation::EventSetCreate,
        candidates: &[v1("nvmlEventSetCreate")],
    },
    Descriptor {
        operation: Operation::EventSetFree,
        candidates: &[v1("nvmlEventSetFree")],
    },
    Descriptor {
        operation: Operation::DeviceRegisterEvents,
        candidates: &[v1("nvmlDeviceRegisterEvents")],
    },
    Descriptor {
        operation: Operation::DeviceGetSupportedEventTypes,
        candidates: &[v1("nvmlDeviceGetSupportedEventTypes")],
    },
    Descriptor {
        operation: Operation::EventSetWait,
        candidates: &[v1("nvmlEventSetWait"), v2("nvmlEventSetWait_v2")],
    },
];

/// The entry point currently selected for one operation.
///
/// A default binding names the oldest candidate but carries no address until
/// a probe finds it in a loaded library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    candidate: &'static Candidate,
    symbol: Option<RawSymbol>,
}

impl Binding {
    pub fn default_for(operation: Operation) -> Self {
        Self {
            candidate: operation.descriptor().default_candidate(),
            symbol: None,
        }
    }

    pub fn resolved(candidate: &'static Candidate, symbol: RawSymbol) -> Self {
        Self {
            candidate,
            symbol: Some(symbol),
        }
    }

    pub fn version(&self) -> SymbolVersion {
        self.candidate.version
    }

    pub fn symbol_name(&self) -> &'static str {
        self.candidate.symbol
    }

    pub fn symbol(&self) -> Option<RawSymbol> {
        self.symbol
    }

    pub fn is_resolved(&self) -> bool {
        self.symbol.is_some()
    }
}

/// Operation → binding, indexed by `Operation as usize`.
#[derive(Debug, Clone)]
pub struct ResolutionTable {
    bindings: [Binding; Operation::COUNT],
}

impl ResolutionTable {
    pub fn new() -> Self {
        Self {
            bindings: Operation::ALL.map(Binding::default_for),
        }
    }

    pub fn reset_to_defaults(&mut self) {
        self.bindings = Operation::ALL.map(Binding::default_for);
    }

    pub(crate) fn rebind(&mut self, operation: Operation, binding: Binding) {
        self.bindings[operation.index()] = binding;
    }

    pub fn resolve(&self, operation: Operation) -> &Binding {
        &self.bindings[operation.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Operation, &Binding)> {
        Operation::ALL.iter().copied().zip(self.bindings.iter())
    }
}

impl Default for ResolutionTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable snapshot of one binding, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindingInfo {
    pub operation: Operation,
    pub symbol: &'static str,
    pub version: SymbolVersion,
    pub resolved: bool,
}

impl BindingInfo {
    pub fn new(operation: Operation, binding: &Binding) -> Self {
        Self {
            operation,
            symbol: binding.symbol_name(),
            version: binding.version(),
            resolved: binding.is_resolved(),
        }
    }
}
