//! In-memory [`NvmlApi`] for consumers that need to test against NVML
//! without a GPU.
//!
//! Each operation has an optional handler. An operation without a handler
//! fails with `FunctionNotFound`, except `init`, `init_with_flags` and
//! `shutdown`, which succeed. Every call is recorded.

use parking_lot::Mutex;

use crate::api::NvmlApi;
use crate::error::NvmlError;
use crate::event::{EventSet, EventTypes, EventWait};
use crate::status::Return;
use crate::symbols::Operation;
use crate::types::{
    DetachGpuState, Device, DeviceAttributes, ExcludedDeviceInfo, Memory, PciInfo,
    PcieLinkState, ProcessInfo,
};

/// Handler taking the call's arguments as a tuple. Event sets are passed by
/// address.
pub type Handler<A, T> = Option<Box<dyn Fn(A) -> Result<T, NvmlError> + Send + Sync>>;

/// A recorded call and its arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Init,
    InitWithFlags(u32),
    Shutdown,
    ErrorString(Return),
    SystemGetDriverVersion,
    SystemGetNvmlVersion,
    SystemGetCudaDriverVersion,
    DeviceGetCount,
    DeviceGetHandleByIndex(u32),
    DeviceGetHandleByPciBusId(String),
    DeviceGetName(Device),
    DeviceGetUuid(Device),
    DeviceGetMemoryInfo(Device),
    DeviceGetPciInfo(Device),
    DeviceGetNvLinkRemotePciInfo(Device, u32),
    DeviceGetAttributes(Device),
    DeviceGetComputeRunningProcesses(Device),
    DeviceGetGraphicsRunningProcesses(Device),
    DeviceGetMpsComputeRunningProcesses(Device),
    DeviceRemoveGpu(PciInfo, DetachGpuState, PcieLinkState),
    GetExcludedDeviceCount,
    GetExcludedDeviceInfoByIndex(u32),
    EventSetCreate,
    EventSetFree(usize),
    DeviceRegisterEvents(Device, EventTypes, usize),
    DeviceGetSupportedEventTypes(Device),
    EventSetWait(usize, u32),
}

impl MockCall {
    pub fn operation(&self) -> Operation {
        match self {
            Self::Init => Operation::Init,
            Self::InitWithFlags(_) => Operation::InitWithFlags,
            Self::Shutdown => Operation::Shutdown,
            Self::ErrorString(_) => Operation::ErrorString,
            Self::SystemGetDriverVersion => Operation::SystemGetDriverVersion,
            Self::SystemGetNvmlVersion => Operation::SystemGetNvmlVersion,
            Self::SystemGetCudaDriverVersion => Operation::SystemGetCudaDriverVersion,
            Self::DeviceGetCount => Operation::DeviceGetCount,
            Self::DeviceGetHandleByIndex(_) => Operation::DeviceGetHandleByIndex,
            Self::DeviceGetHandleByPciBusId(_) => Operation::DeviceGetHandleByPciBusId,
            Self::DeviceGetName(_) => Operation::DeviceGetName,
            Self::DeviceGetUuid(_) => Operation::DeviceGetUuid,
            Self::DeviceGetMemoryInfo(_) => Operation::DeviceGetMemoryInfo,
            Self::DeviceGetPciInfo(_) => Operation::DeviceGetPciInfo,
            Self::DeviceGetNvLinkRemotePciInfo(..) => Operation::DeviceGetNvLinkRemotePciInfo,
            Self::DeviceGetAttributes(_) => Operation::DeviceGetAttributes,
            Self::DeviceGetComputeRunningProcesses(_) => {
                Operation::DeviceGetComputeRunningProcesses
            }
            Self::DeviceGetGraphicsRunningProcesses(_) => {
                Operation::DeviceGetGraphicsRunningProcesses
            }
            Self::DeviceGetMpsComputeRunningProcesses(_) => {
                Operation::DeviceGetMpsComputeRunningProcesses
            }
            Self::DeviceRemoveGpu(..) => Operation::DeviceRemoveGpu,
            Self::GetExcludedDeviceCount => Operation::GetExcludedDeviceCount,
            Self::GetExcludedDeviceInfoByIndex(_) => Operation::GetExcludedDeviceInfoByIndex,
            Self::EventSetCreate => Operation::EventSetCreate,
            Self::EventSetFree(_) => Operation::EventSetFree,
            Self::DeviceRegisterEvents(..) => Operation::DeviceRegisterEvents,
            Self::DeviceGetSupportedEventTypes(_) => Operation::DeviceGetSupportedEventTypes,
            Self::EventSetWait(..) => Operation::EventSetWait,
        }
    }
}

#[derive(Default)]
pub struct MockNvml {
    pub init: Handler<(), ()>,
    pub init_with_flags: Handler<u32, ()>,
    pub shutdown: Handler<(), ()>,
    pub error_string: Option<Box<dyn Fn(Return) -> String + Send + Sync>>,
    pub system_get_driver_version: Handler<(), String>,
    pub system_get_nvml_version: Handler<(), String>,
    pub system_get_cuda_driver_version: Handler<(), i32>,
    pub device_get_count: Handler<(), u32>,
    pub device_get_handle_by_index: Handler<u32, Device>,
    pub device_get_handle_by_pci_bus_id: Handler<String, Device>,
    pub device_get_name: Handler<Device, String>,
    pub device_get_uuid: Handler<Device, String>,
    pub device_get_memory_info: Handler<Device, Memory>,
    pub device_get_pci_info: Handler<Device, PciInfo>,
    pub device_get_nvlink_remote_pci_info: Handler<(Device, u32), PciInfo>,
    pub device_get_attributes: Handler<Device, DeviceAttributes>,
    pub device_get_compute_running_processes: Handler<Device, Vec<ProcessInfo>>,
    pub device_get_graphics_running_processes: Handler<Device, Vec<ProcessInfo>>,
    pub device_get_mps_compute_running_processes: Handler<Device, Vec<ProcessInfo>>,
    pub device_remove_gpu: Handler<(PciInfo, DetachGpuState, PcieLinkState), ()>,
    pub get_excluded_device_count: Handler<(), u32>,
    pub get_excluded_device_info_by_index: Handler<u32, ExcludedDeviceInfo>,
    pub event_set_create: Handler<(), EventSet>,
    pub event_set_free: Handler<usize, ()>,
    pub device_register_events: Handler<(Device, EventTypes, usize), ()>,
    pub device_get_supported_event_types: Handler<Device, EventTypes>,
    pub event_set_wait: Handler<(usize, u32), EventWait>,
    pub log: CallLog,
}

/// Calls recorded by a [`MockNvml`].
#[derive(Default)]
pub struct CallLog(Mutex<Vec<MockCall>>);

impl MockNvml {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.log.0.lock().clone()
    }

    pub fn calls_to(&self, operation: Operation) -> usize {
        self.log
            .0
            .lock()
            .iter()
            .filter(|call| call.operation() == operation)
            .count()
    }

    fn record(&self, call: MockCall) {
        self.log.0.lock().push(call);
    }
}

fn run<A, T>(handler: &Handler<A, T>, args: A) -> Result<T, NvmlError> {
    match handler {
        Some(handler) => handler(args),
        None => Err(NvmlError::Native(Return::FunctionNotFound)),
    }
}

fn set_addr(set: &EventSet) -> usize {
    set.as_raw() as usize
}

impl NvmlApi for MockNvml {
    fn init(&self) -> Result<(), NvmlError> {
        self.record(MockCall::Init);
        self.init.as_ref().map_or(Ok(()), |handler| handler(()))
    }

    fn init_with_flags(&self, flags: u32) -> Result<(), NvmlError> {
        self.record(MockCall::InitWithFlags(flags));
        self.init_with_flags
            .as_ref()
            .map_or(Ok(()), |handler| handler(flags))
    }

    fn shutdown(&self) -> Result<(), NvmlError> {
        self.record(MockCall::Shutdown);
        self.shutdown.as_ref().map_or(Ok(()), |handler| handler(()))
    }

    fn error_string(&self, ret: Return) -> String {
        self.record(MockCall::ErrorString(ret));
        match &self.error_string {
            Some(handler) => handler(ret),
            None => ret.fallback_description().to_string(),
        }
    }

    fn system_get_driver_version(&self) -> Result<String, NvmlError> {
        self.record(MockCall::SystemGetDriverVersion);
        run(&self.system_get_driver_version, ())
    }

    fn system_get_nvml_version(&self) -> Result<String, NvmlError> {
        self.record(MockCall::SystemGetNvmlVersion);
        run(&self.system_get_nvml_version, ())
    }

    fn system_get_cuda_driver_version(&self) -> Result<i32, NvmlError> {
        self.record(MockCall::SystemGetCudaDriverVersion);
        run(&self.system_get_cuda_driver_version, ())
    }

    fn device_get_count(&self) -> Result<u32, NvmlError> {
        self.record(MockCall::DeviceGetCount);
        run(&self.device_get_count, ())
    }

    fn device_get_handle_by_index(&self, index: u32) -> Result<Device, NvmlError> {
        self.record(MockCall::DeviceGetHandleByIndex(index));
        run(&self.device_get_handle_by_index, index)
    }

    fn device_get_handle_by_pci_bus_id(&self, pci_bus_id: &str) -> Result<Device, NvmlError> {
        self.record(MockCall::DeviceGetHandleByPciBusId(pci_bus_id.to_string()));
        run(&self.device_get_handle_by_pci_bus_id, pci_bus_id.to_string())
    }

    fn device_get_name(&self, device: Device) -> Result<String, NvmlError> {
        self.record(MockCall::DeviceGetName(device));
        run(&self.device_get_name, device)
    }

    fn device_get_uuid(&self, device: Device) -> Result<String, NvmlError> {
        self.record(MockCall::DeviceGetUuid(device));
        run(&self.device_get_uuid, device)
    }

    fn device_get_memory_info(&self, device: Device) -> Result<Memory, NvmlError> {
        self.record(MockCall::DeviceGetMemoryInfo(device));
        run(&self.device_get_memory_info, device)
    }

    fn device_get_pci_info(&self, device: Device) -> Result<PciInfo, NvmlError> {
        self.record(MockCall::DeviceGetPciInfo(device));
        run(&self.device_get_pci_info, device)
    }

    fn device_get_nvlink_remote_pci_info(
        &self,
        device: Device,
        link: u32,
    ) -> Result<PciInfo, NvmlError> {
        self.record(MockCall::DeviceGetNvLinkRemotePciInfo(device, link));
        run(&self.device_get_nvlink_remote_pci_info, (device, link))
    }

    fn device_get_attributes(&self, device: Device) -> Result<DeviceAttributes, NvmlError> {
        self.record(MockCall::DeviceGetAttributes(device));
        run(&self.device_get_attributes, device)
    }

    fn device_get_compute_running_processes(
        &self,
        device: Device,
    ) -> Result<Vec<ProcessInfo>, NvmlError> {
        self.record(MockCall::DeviceGetComputeRunningProcesses(device));
        run(&self.device_get_compute_running_processes, device)
    }

    fn device_get_graphics_running_processes(
        &self,
        device: Device,
    ) -> Result<Vec<ProcessInfo>, NvmlError> {
        self.record(MockCall::DeviceGetGraphicsRunningProcesses(device));
        run(&self.device_get_graphics_running_processes, device)
    }

    fn device_get_mps_compute_running_processes(
        &self,
        device: Device,
    ) -> Result<Vec<ProcessInfo>, NvmlError> {
        self.record(MockCall::DeviceGetMpsComputeRunningProcesses(device));
        run(&self.device_get_mps_compute_running_processes, device)
    }

    fn device_remove_gpu(
        &self,
        pci_info: &PciInfo,
        gpu_state: DetachGpuState,
        link_state: PcieLinkState,
    ) -> Result<(), NvmlError> {
        self.record(MockCall::DeviceRemoveGpu(pci_info.clone(), gpu_state, link_state));
        run(&self.device_remove_gpu, (pci_info.clone(), gpu_state, link_state))
    }

    fn get_excluded_device_count(&self) -> Result<u32, NvmlError> {
        self.record(MockCall::GetExcludedDeviceCount);
        run(&self.get_excluded_device_count, ())
    }

    fn get_excluded_device_info_by_index(
        &self,
        index: u32,
    ) -> Result<ExcludedDeviceInfo, NvmlError> {
        self.record(MockCall::GetExcludedDeviceInfoByIndex(index));
        run(&self.get_excluded_device_info_by_index, index)
    }

    fn event_set_create(&self) -> Result<EventSet, NvmlError> {
        self.record(MockCall::EventSetCreate);
        run(&self.event_set_create, ())
    }

    fn event_set_free(&self, set: EventSet) -> Result<(), NvmlError> {
        let addr = set_addr(&set);
        self.record(MockCall::EventSetFree(addr));
        run(&self.event_set_free, addr)
    }

    fn device_register_events(
        &self,
        device: Device,
        event_types: EventTypes,
        set: &EventSet,
    ) -> Result<(), NvmlError> {
        let addr = set_addr(set);
        self.record(MockCall::DeviceRegisterEvents(device, event_types, addr));
        run(&self.device_register_events, (device, event_types, addr))
    }

    fn device_get_supported_event_types(&self, device: Device) -> Result<EventTypes, NvmlError> {
        self.record(MockCall::DeviceGetSupportedEventTypes(device));
        run(&self.device_get_supported_event_types, device)
    }

    fn event_set_wait(&self, set: &EventSet, timeout_ms: u32) -> Result<EventWait, NvmlError> {
        let addr = set_addr(set);
        self.record(MockCall::EventSetWait(addr, timeout_ms));
        run(&self.event_set_wait, (addr, timeout_ms))
    }
}
