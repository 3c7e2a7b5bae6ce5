pub mod api;
pub mod device;
pub mod dl;
pub mod error;
pub mod event;
pub mod ffi;
pub mod library;
pub mod mock;
pub mod probe;
pub mod status;
pub mod symbols;
pub mod types;

use std::sync::OnceLock;

use rnvml_core::config::{default_config_path, InitConfig, NvmlConfig};

pub use api::NvmlApi;
pub use dl::{DlError, DynamicLibrary, Loader, RawSymbol, SymbolSource, SystemLoader};
pub use error::NvmlError;
pub use event::{subscribe_supported, EventData, EventSet, EventTypes, EventWait};
pub use library::{LifecycleState, Nvml};
pub use mock::{CallLog, MockCall, MockNvml};
pub use probe::{probe, ProbeSummary};
pub use status::Return;
pub use symbols::{BindingInfo, Operation, ResolutionTable, SymbolVersion};
pub use types::{
    DetachGpuState, Device, DeviceAttributes, ExcludedDeviceInfo, Memory, PciInfo,
    PcieLinkState, ProcessInfo,
};

struct Global {
    nvml: Nvml,
    init: InitConfig,
}

static GLOBAL: OnceLock<Global> = OnceLock::new();

fn global_state() -> &'static Global {
    GLOBAL.get_or_init(|| {
        let config = NvmlConfig::load_or_default(default_config_path());
        Global {
            nvml: Nvml::from_config(&config),
            init: config.init,
        }
    })
}

/// The process-wide context, configured from `rnvml.toml` on first use.
pub fn global() -> &'static Nvml {
    &global_state().nvml
}

/// Initialize the process-wide context, honoring `init.flags`.
pub fn init() -> Result<(), NvmlError> {
    let state = global_state();
    state.nvml.init_configured(&state.init)
}

/// Shut down the process-wide context.
pub fn shutdown() -> Result<(), NvmlError> {
    global().shutdown()
}

/// Describe `ret` using the process-wide context.
pub fn error_string(ret: Return) -> String {
    global().error_string(ret)
}
