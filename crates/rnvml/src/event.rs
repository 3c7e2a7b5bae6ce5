//! Event sets: registration and waiting for XID, ECC, clock and power events.

use std::ffi::{c_uint, c_ulonglong};
use std::fmt;

use bitflags::bitflags;
use bytemuck::Zeroable;
use serde::Serialize;
use tracing::{info, trace, warn};

use crate::api::NvmlApi;
use crate::dl::Loader;
use crate::error::{check, NvmlError};
use crate::ffi::{
    FnDeviceGetSupportedEventTypes, FnDeviceRegisterEvents, FnEventSetCreate, FnEventSetFree,
    FnEventSetWait, FnEventSetWaitV2, NvmlEventSetT, RawEventData,
};
use crate::library::Nvml;
use crate::status::Return;
use crate::symbols::{Operation, SymbolVersion};
use crate::types::Device;

bitflags! {
    /// `nvmlEventType*` masks.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
    pub struct EventTypes: u64 {
        const SINGLE_BIT_ECC_ERROR = 0x0000_0001;
        const DOUBLE_BIT_ECC_ERROR = 0x0000_0002;
        const PSTATE = 0x0000_0004;
        const XID_CRITICAL_ERROR = 0x0000_0008;
        const CLOCK = 0x0000_0010;
        const POWER_SOURCE_CHANGE = 0x0000_0080;
        const MIG_CONFIG_CHANGE = 0x0000_0100;
    }
}

/// Opaque `nvmlEventSet_t`. Released with [`Nvml::event_set_free`].
#[derive(PartialEq, Eq)]
pub struct EventSet(NvmlEventSetT);

// SAFETY: event sets are driver-side objects; NVML serializes access to them.
unsafe impl Send for EventSet {}
unsafe impl Sync for EventSet {}

impl EventSet {
    pub fn from_raw(raw: NvmlEventSetT) -> Self {
        Self(raw)
    }

    pub fn as_raw(&self) -> NvmlEventSetT {
        self.0
    }
}

impl fmt::Debug for EventSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventSet({:p})", self.0)
    }
}

/// One delivered event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventData {
    pub device: Device,
    /// Unknown bits from newer drivers are kept.
    pub event_type: EventTypes,
    /// XID number for `XID_CRITICAL_ERROR`, otherwise 0.
    pub event_data: u64,
    /// `None` when the original `nvmlEventSetWait` delivered the event.
    pub gpu_instance_id: Option<u32>,
    pub compute_instance_id: Option<u32>,
}

impl EventData {
    fn from_raw(raw: &RawEventData, version: SymbolVersion) -> Self {
        let instances = version != SymbolVersion::V1;
        Self {
            device: Device::from_raw(raw.device),
            event_type: EventTypes::from_bits_retain(raw.event_type),
            event_data: raw.event_data,
            gpu_instance_id: instances.then_some(raw.gpu_instance_id),
            compute_instance_id: instances.then_some(raw.compute_instance_id),
        }
    }
}

/// Outcome of [`Nvml::event_set_wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventWait {
    Event(EventData),
    TimedOut,
}

/// Create an event set and register every GPU for all events it supports.
///
/// Devices whose supported types cannot be queried are skipped. Returns
/// `None` when no device supports any event. The set is freed before any
/// error or `None` is returned.
pub fn subscribe_supported<A: NvmlApi + ?Sized>(
    nvml: &A,
) -> Result<Option<EventSet>, NvmlError> {
    let set = nvml.event_set_create()?;
    match register_supported(nvml, &set) {
        Ok(0) => {
            nvml.event_set_free(set)?;
            Ok(None)
        }
        Ok(_) => Ok(Some(set)),
        Err(e) => {
            if let Err(free_err) = nvml.event_set_free(set) {
                warn!("freeing event set after failed registration: {}", free_err);
            }
            Err(e)
        }
    }
}

fn register_supported<A: NvmlApi + ?Sized>(nvml: &A, set: &EventSet) -> Result<u32, NvmlError> {
    let mut registered = 0;
    for index in 0..nvml.device_get_count()? {
        let device = nvml.device_get_handle_by_index(index)?;
        let supported = match nvml.device_get_supported_event_types(device) {
            Ok(types) => types & EventTypes::all(),
            Err(e) => {
                warn!("GPU {}: cannot query supported events: {}", index, e);
                continue;
            }
        };
        if supported.is_empty() {
            continue;
        }
        nvml.device_register_events(device, supported, set)?;
        info!("GPU {}: registered {:?}", index, supported);
        registered += 1;
    }
    Ok(registered)
}

impl<L: Loader> Nvml<L> {
    pub fn event_set_create(&self) -> Result<EventSet, NvmlError> {
        self.dispatch(Operation::EventSetCreate, |_, symbol| {
            let mut set: NvmlEventSetT = std::ptr::null_mut();
            check(unsafe { symbol.cast::<FnEventSetCreate>()(&mut set) })?;
            Ok(EventSet::from_raw(set))
        })
    }

    /// Release an event set. The set is consumed even if NVML reports an error.
    pub fn event_set_free(&self, set: EventSet) -> Result<(), NvmlError> {
        self.dispatch(Operation::EventSetFree, |_, symbol| {
            check(unsafe { symbol.cast::<FnEventSetFree>()(set.as_raw()) })
        })
    }

    pub fn device_register_events(
        &self,
        device: Device,
        event_types: EventTypes,
        set: &EventSet,
    ) -> Result<(), NvmlError> {
        self.dispatch(Operation::DeviceRegisterEvents, |_, symbol| {
            let func = unsafe { symbol.cast::<FnDeviceRegisterEvents>() };
            check(unsafe { func(device.as_raw(), event_types.bits(), set.as_raw()) })
        })
    }

    pub fn device_get_supported_event_types(&self, device: Device) -> Result<EventTypes, NvmlError> {
        self.dispatch(Operation::DeviceGetSupportedEventTypes, |_, symbol| {
            let mut mask: c_ulonglong = 0;
            let func = unsafe { symbol.cast::<FnDeviceGetSupportedEventTypes>() };
            check(unsafe { func(device.as_raw(), &mut mask) })?;
            Ok(EventTypes::from_bits_retain(mask))
        })
    }

    /// Block for up to `timeout_ms` waiting on `set`.
    ///
    /// The read lock is held for the whole wait, so `shutdown` blocks until
    /// the wait returns.
    pub fn event_set_wait(&self, set: &EventSet, timeout_ms: u32) -> Result<EventWait, NvmlError> {
        self.dispatch(Operation::EventSetWait, |version, symbol| {
            let mut data = RawEventData::zeroed();
            let timeout = timeout_ms as c_uint;
            let raw = unsafe {
                match version {
                    SymbolVersion::V1 => {
                        symbol.cast::<FnEventSetWait>()(set.as_raw(), &mut data, timeout)
                    }
                    _ => symbol.cast::<FnEventSetWaitV2>()(set.as_raw(), &mut data, timeout),
                }
            };
            match Return::from_raw(raw) {
                Return::Success => Ok(EventWait::Event(EventData::from_raw(&data, version))),
                Return::Timeout => {
                    trace!("event wait timed out after {} ms", timeout_ms);
                    Ok(EventWait::TimedOut)
                }
                other => Err(NvmlError::Native(other)),
            }
        })
    }
}
