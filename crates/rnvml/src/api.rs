//! Object-safe view of the facade, so callers can swap in [`crate::MockNvml`].

use crate::dl::Loader;
use crate::error::NvmlError;
use crate::event::{EventSet, EventTypes, EventWait};
use crate::library::Nvml;
use crate::status::Return;
use crate::types::{
    DetachGpuState, Device, DeviceAttributes, ExcludedDeviceInfo, Memory, PciInfo,
    PcieLinkState, ProcessInfo,
};

pub trait NvmlApi: Send + Sync {
    fn init(&self) -> Result<(), NvmlError>;
    fn init_with_flags(&self, flags: u32) -> Result<(), NvmlError>;
    fn shutdown(&self) -> Result<(), NvmlError>;
    fn error_string(&self, ret: Return) -> String;

    fn system_get_driver_version(&self) -> Result<String, NvmlError>;
    fn system_get_nvml_version(&self) -> Result<String, NvmlError>;
    fn system_get_cuda_driver_version(&self) -> Result<i32, NvmlError>;

    fn device_get_count(&self) -> Result<u32, NvmlError>;
    fn device_get_handle_by_index(&self, index: u32) -> Result<Device, NvmlError>;
    fn device_get_handle_by_pci_bus_id(&self, pci_bus_id: &str) -> Result<Device, NvmlError>;
    fn device_get_name(&self, device: Device) -> Result<String, NvmlError>;
    fn device_get_uuid(&self, device: Device) -> Result<String, NvmlError>;
    fn device_get_memory_info(&self, device: Device) -> Result<Memory, NvmlError>;
    fn device_get_pci_info(&self, device: Device) -> Result<PciInfo, NvmlError>;
    fn device_get_nvlink_remote_pci_info(
        &self,
        device: Device,
        link: u32,
    ) -> Result<PciInfo, NvmlError>;
    fn device_get_attributes(&self, device: Device) -> Result<DeviceAttributes, NvmlError>;
    fn device_get_compute_running_processes(
        &self,
        device: Device,
    ) -> Result<Vec<ProcessInfo>, NvmlError>;
    fn device_get_graphics_running_processes(
        &self,
        device: Device,
    ) -> Result<Vec<ProcessInfo>, NvmlError>;
    fn device_get_mps_compute_running_processes(
        &self,
        device: Device,
    ) -> Result<Vec<ProcessInfo>, NvmlError>;
    fn device_remove_gpu(
        &self,
        pci_info: &PciInfo,
        gpu_state: DetachGpuState,
        link_state: PcieLinkState,
    ) -> Result<(), NvmlError>;
    fn get_excluded_device_count(&self) -> Result<u32, NvmlError>;
    fn get_excluded_device_info_by_index(&self, index: u32)
        -> Result<ExcludedDeviceInfo, NvmlError>;

    fn event_set_create(&self) -> Result<EventSet, NvmlError>;
    fn event_set_free(&self, set: EventSet) -> Result<(), NvmlError>;
    fn device_register_events(
        &self,
        device: Device,
        event_types: EventTypes,
        set: &EventSet,
    ) -> Result<(), NvmlError>;
    fn device_get_supported_event_types(&self, device: Device) -> Result<EventTypes, NvmlError>;
    fn event_set_wait(&self, set: &EventSet, timeout_ms: u32) -> Result<EventWait, NvmlError>;
}

impl<L: Loader> NvmlApi for Nvml<L> {
    fn init(&self) -> Result<(), NvmlError> {
        Nvml::init(self)
    }

    fn init_with_flags(&self, flags: u32) -> Result<(), NvmlError> {
        Nvml::init_with_flags(self, flags)
    }

    fn shutdown(&self) -> Result<(), NvmlError> {
        Nvml::shutdown(self)
    }

    fn error_string(&self, ret: Return) -> String {
        Nvml::error_string(self, ret)
    }

    fn system_get_driver_version(&self) -> Result<String, NvmlError> {
        Nvml::system_get_driver_version(self)
    }

    fn system_get_nvml_version(&self) -> Result<String, NvmlError> {
        Nvml::system_get_nvml_version(self)
    }

    fn system_get_cuda_driver_version(&self) -> Result<i32, NvmlError> {
        Nvml::system_get_cuda_driver_version(self)
    }

    fn device_get_count(&self) -> Result<u32, NvmlError> {
        Nvml::device_get_count(self)
    }

    fn device_get_handle_by_index(&self, index: u32) -> Result<Device, NvmlError> {
        Nvml::device_get_handle_by_index(self, index)
    }

    fn device_get_handle_by_pci_bus_id(&self, pci_bus_id: &str) -> Result<Device, NvmlError> {
        Nvml::device_get_handle_by_pci_bus_id(self, pci_bus_id)
    }

    fn device_get_name(&self, device: Device) -> Result<String, NvmlError> {
        Nvml::device_get_name(self, device)
    }

    fn device_get_uuid(&self, device: Device) -> Result<String, NvmlError> {
        Nvml::device_get_uuid(self, device)
    }

    fn device_get_memory_info(&self, device: Device) -> Result<Memory, NvmlError> {
        Nvml::device_get_memory_info(self, device)
    }

    fn device_get_pci_info(&self, device: Device) -> Result<PciInfo, NvmlError> {
        Nvml::device_get_pci_info(self, device)
    }

    fn device_get_nvlink_remote_pci_info(
        &self,
        device: Device,
        link: u32,
    ) -> Result<PciInfo, NvmlError> {
        Nvml::device_get_nvlink_remote_pci_info(self, device, link)
    }

    fn device_get_attributes(&self, device: Device) -> Result<DeviceAttributes, NvmlError> {
        Nvml::device_get_attributes(self, device)
    }

    fn device_get_compute_running_processes(
        &self,
        device: Device,
    ) -> Result<Vec<ProcessInfo>, NvmlError> {
        Nvml::device_get_compute_running_processes(self, device)
    }

    fn device_get_graphics_running_processes(
        &self,
        device: Device,
    ) -> Result<Vec<ProcessInfo>, NvmlError> {
        Nvml::device_get_graphics_running_processes(self, device)
    }

    fn device_get_mps_compute_running_processes(
        &self,
        device: Device,
    ) -> Result<Vec<ProcessInfo>, NvmlError> {
        Nvml::device_get_mps_compute_running_processes(self, device)
    }

    fn device_remove_gpu(
        &self,
        pci_info: &PciInfo,
        gpu_state: DetachGpuState,
        link_state: PcieLinkState,
    ) -> Result<(), NvmlError> {
        Nvml::device_remove_gpu(self, pci_info, gpu_state, link_state)
    }

    fn get_excluded_device_count(&self) -> Result<u32, NvmlError> {
        Nvml::get_excluded_device_count(self)
    }

    fn get_excluded_device_info_by_index(
        &self,
        index: u32,
    ) -> Result<ExcludedDeviceInfo, NvmlError> {
        Nvml::get_excluded_device_info_by_index(self, index)
    }

    fn event_set_create(&self) -> Result<EventSet, NvmlError> {
        Nvml::event_set_create(self)
    }

    fn event_set_free(&self, set: EventSet) -> Result<(), NvmlError> {
        Nvml::event_set_free(self, set)
    }

    fn device_register_events(
        &self,
        device: Device,
        event_types: EventTypes,
        set: &EventSet,
    ) -> Result<(), NvmlError> {
        Nvml::device_register_events(self, device, event_types, set)
    }

    fn device_get_supported_event_types(&self, device: Device) -> Result<EventTypes, NvmlError> {
        Nvml::device_get_supported_event_types(self, device)
    }

    fn event_set_wait(&self, set: &EventSet, timeout_ms: u32) -> Result<EventWait, NvmlError> {
        Nvml::event_set_wait(self, set, timeout_ms)
    }
}
