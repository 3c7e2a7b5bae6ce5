//! System and device queries.
//!
//! Each method has one fixed signature; the `match` on [`SymbolVersion`]
//! picks the typed call for whichever revision the probe bound.

use std::ffi::{c_char, c_int, c_uint, CString};

use bytemuck::Zeroable;

use crate::dl::Loader;
use crate::error::{check, NvmlError};
use crate::ffi::*;
use crate::library::Nvml;
use crate::status::Return;
use crate::symbols::{Operation, SymbolVersion};
use crate::types::{
    DetachGpuState, Device, DeviceAttributes, ExcludedDeviceInfo, Memory, PciInfo,
    PcieLinkState, ProcessInfo,
};

type RunningProcessesFn<R> =
    unsafe extern "C" fn(NvmlDeviceT, *mut c_uint, *mut R) -> crate::status::NvmlReturn;

/// Size query followed by one fill call. A list that grows between the two
/// calls is reported as `InsufficientSize`, not retried.
///
/// # Safety
/// `func` must be a live entry point whose buffer element type is `R`.
unsafe fn query_processes<R>(
    device: Device,
    func: RunningProcessesFn<R>,
) -> Result<Vec<ProcessInfo>, NvmlError>
where
    R: Zeroable + Copy + Into<ProcessInfo>,
{
    let mut count: c_uint = 0;
    let raw = unsafe { func(device.as_raw(), &mut count, std::ptr::null_mut()) };
    match Return::from_raw(raw) {
        Return::Success => return Ok(Vec::new()),
        Return::InsufficientSize => {}
        other => return Err(NvmlError::Native(other)),
    }

    let mut infos = vec![R::zeroed(); count as usize];
    let mut filled = count;
    check(unsafe { func(device.as_raw(), &mut filled, infos.as_mut_ptr()) })?;
    infos.truncate(filled as usize);
    Ok(infos.into_iter().map(Into::into).collect())
}

impl<L: Loader> Nvml<L> {
    // ── System ────────────────────────────────────────────────────

    pub fn system_get_driver_version(&self) -> Result<String, NvmlError> {
        self.dispatch(Operation::SystemGetDriverVersion, |_, symbol| {
            let mut buf = [0 as c_char; NVML_SYSTEM_DRIVER_VERSION_BUFFER_SIZE];
            let func = unsafe { symbol.cast::<FnSystemGetDriverVersion>() };
            check(unsafe { func(buf.as_mut_ptr(), buf.len() as c_uint) })?;
            Ok(string_from_buf(&buf))
        })
    }

    pub fn system_get_nvml_version(&self) -> Result<String, NvmlError> {
        self.dispatch(Operation::SystemGetNvmlVersion, |_, symbol| {
            let mut buf = [0 as c_char; NVML_SYSTEM_NVML_VERSION_BUFFER_SIZE];
            let func = unsafe { symbol.cast::<FnSystemGetNvmlVersion>() };
            check(unsafe { func(buf.as_mut_ptr(), buf.len() as c_uint) })?;
            Ok(string_from_buf(&buf))
        })
    }

    /// CUDA driver version encoded as `1000 * major + 10 * minor`.
    pub fn system_get_cuda_driver_version(&self) -> Result<i32, NvmlError> {
        self.dispatch(Operation::SystemGetCudaDriverVersion, |version, symbol| {
            let mut value: c_int = 0;
            let raw = unsafe {
                match version {
                    SymbolVersion::V1 => symbol.cast::<FnSystemGetCudaDriverVersion>()(&mut value),
                    _ => symbol.cast::<FnSystemGetCudaDriverVersionV2>()(&mut value),
                }
            };
            check(raw)?;
            Ok(value)
        })
    }

    // ── Device enumeration ────────────────────────────────────────

    pub fn device_get_count(&self) -> Result<u32, NvmlError> {
        self.dispatch(Operation::DeviceGetCount, |version, symbol| {
            let mut count: c_uint = 0;
            let raw = unsafe {
                match version {
                    SymbolVersion::V1 => symbol.cast::<FnDeviceGetCount>()(&mut count),
                    _ => symbol.cast::<FnDeviceGetCountV2>()(&mut count),
                }
            };
            check(raw)?;
            Ok(count)
        })
    }

    pub fn device_get_handle_by_index(&self, index: u32) -> Result<Device, NvmlError> {
        self.dispatch(Operation::DeviceGetHandleByIndex, |version, symbol| {
            let mut handle: NvmlDeviceT = std::ptr::null_mut();
            let raw = unsafe {
                match version {
                    SymbolVersion::V1 => {
                        symbol.cast::<FnDeviceGetHandleByIndex>()(index, &mut handle)
                    }
                    _ => symbol.cast::<FnDeviceGetHandleByIndexV2>()(index, &mut handle),
                }
            };
            check(raw)?;
            Ok(Device::from_raw(handle))
        })
    }

    pub fn device_get_handle_by_pci_bus_id(&self, pci_bus_id: &str) -> Result<Device, NvmlError> {
        let bus_id = CString::new(pci_bus_id)
            .map_err(|_| NvmlError::InvalidArgument(format!("PCI bus id {:?}", pci_bus_id)))?;
        self.dispatch(Operation::DeviceGetHandleByPciBusId, |version, symbol| {
            let mut handle: NvmlDeviceT = std::ptr::null_mut();
            let raw = unsafe {
                match version {
                    SymbolVersion::V1 => symbol.cast::<FnDeviceGetHandleByPciBusId>()(
                        bus_id.as_ptr(),
                        &mut handle,
                    ),
                    _ => symbol.cast::<FnDeviceGetHandleByPciBusIdV2>()(
                        bus_id.as_ptr(),
                        &mut handle,
                    ),
                }
            };
            check(raw)?;
            Ok(Device::from_raw(handle))
        })
    }

    // ── Device queries ────────────────────────────────────────────

    pub fn device_get_name(&self, device: Device) -> Result<String, NvmlError> {
        self.dispatch(Operation::DeviceGetName, |_, symbol| {
            let mut buf = [0 as c_char; NVML_DEVICE_NAME_V2_BUFFER_SIZE];
            let func = unsafe { symbol.cast::<FnDeviceGetName>() };
            check(unsafe { func(device.as_raw(), buf.as_mut_ptr(), buf.len() as c_uint) })?;
            Ok(string_from_buf(&buf))
        })
    }

    pub fn device_get_uuid(&self, device: Device) -> Result<String, NvmlError> {
        self.dispatch(Operation::DeviceGetUuid, |_, symbol| {
            let mut buf = [0 as c_char; NVML_DEVICE_UUID_V2_BUFFER_SIZE];
            let func = unsafe { symbol.cast::<FnDeviceGetUuid>() };
            check(unsafe { func(device.as_raw(), buf.as_mut_ptr(), buf.len() as c_uint) })?;
            Ok(string_from_buf(&buf))
        })
    }

    pub fn device_get_memory_info(&self, device: Device) -> Result<Memory, NvmlError> {
        self.dispatch(Operation::DeviceGetMemoryInfo, |_, symbol| {
            let mut memory = RawMemory::zeroed();
            let func = unsafe { symbol.cast::<FnDeviceGetMemoryInfo>() };
            check(unsafe { func(device.as_raw(), &mut memory) })?;
            Ok(memory.into())
        })
    }

    pub fn device_get_pci_info(&self, device: Device) -> Result<PciInfo, NvmlError> {
        self.dispatch(Operation::DeviceGetPciInfo, |version, symbol| {
            let mut pci = RawPciInfo::zeroed();
            let raw = unsafe {
                match version {
                    SymbolVersion::V1 => symbol.cast::<FnDeviceGetPciInfo>()(device.as_raw(), &mut pci),
                    SymbolVersion::V2 => symbol.cast::<FnDeviceGetPciInfoV2>()(device.as_raw(), &mut pci),
                    SymbolVersion::V3 => symbol.cast::<FnDeviceGetPciInfoV3>()(device.as_raw(), &mut pci),
                }
            };
            check(raw)?;
            if version == SymbolVersion::V1 {
                pci.promote_legacy_bus_id();
            }
            Ok(PciInfo::from_raw(&pci))
        })
    }

    pub fn device_get_nvlink_remote_pci_info(
        &self,
        device: Device,
        link: u32,
    ) -> Result<PciInfo, NvmlError> {
        self.dispatch(Operation::DeviceGetNvLinkRemotePciInfo, |version, symbol| {
            let mut pci = RawPciInfo::zeroed();
            let raw = unsafe {
                match version {
                    SymbolVersion::V1 => symbol.cast::<FnDeviceGetNvLinkRemotePciInfo>()(
                        device.as_raw(),
                        link,
                        &mut pci,
                    ),
                    _ => symbol.cast::<FnDeviceGetNvLinkRemotePciInfoV2>()(
                        device.as_raw(),
                        link,
                        &mut pci,
                    ),
                }
            };
            check(raw)?;
            if version == SymbolVersion::V1 {
                pci.promote_legacy_bus_id();
            }
            Ok(PciInfo::from_raw(&pci))
        })
    }

    pub fn device_get_attributes(&self, device: Device) -> Result<DeviceAttributes, NvmlError> {
        self.dispatch(Operation::DeviceGetAttributes, |version, symbol| {
            let mut attributes = RawDeviceAttributes::zeroed();
            let raw = unsafe {
                match version {
                    SymbolVersion::V1 => {
                        symbol.cast::<FnDeviceGetAttributes>()(device.as_raw(), &mut attributes)
                    }
                    _ => symbol.cast::<FnDeviceGetAttributesV2>()(device.as_raw(), &mut attributes),
                }
            };
            check(raw)?;
            Ok(attributes.into())
        })
    }

    // ── Running processes ─────────────────────────────────────────

    pub fn device_get_compute_running_processes(
        &self,
        device: Device,
    ) -> Result<Vec<ProcessInfo>, NvmlError> {
        self.running_processes(Operation::DeviceGetComputeRunningProcesses, device)
    }

    pub fn device_get_graphics_running_processes(
        &self,
        device: Device,
    ) -> Result<Vec<ProcessInfo>, NvmlError> {
        self.running_processes(Operation::DeviceGetGraphicsRunningProcesses, device)
    }

    pub fn device_get_mps_compute_running_processes(
        &self,
        device: Device,
    ) -> Result<Vec<ProcessInfo>, NvmlError> {
        self.running_processes(Operation::DeviceGetMpsComputeRunningProcesses, device)
    }

    fn running_processes(
        &self,
        operation: Operation,
        device: Device,
    ) -> Result<Vec<ProcessInfo>, NvmlError> {
        self.dispatch(operation, |version, symbol| unsafe {
            match version {
                SymbolVersion::V1 => {
                    query_processes(device, symbol.cast::<FnDeviceGetRunningProcessesV1>())
                }
                SymbolVersion::V2 => {
                    query_processes(device, symbol.cast::<FnDeviceGetRunningProcessesV2>())
                }
                SymbolVersion::V3 => {
                    query_processes(device, symbol.cast::<FnDeviceGetRunningProcessesV3>())
                }
            }
        })
    }

    // ── Drain / removal ───────────────────────────────────────────

    /// Detach a GPU from the driver. `gpu_state` and `link_state` are ignored
    /// when only the original `nvmlDeviceRemoveGpu` is available.
    pub fn device_remove_gpu(
        &self,
        pci_info: &PciInfo,
        gpu_state: DetachGpuState,
        link_state: PcieLinkState,
    ) -> Result<(), NvmlError> {
        self.dispatch(Operation::DeviceRemoveGpu, |version, symbol| {
            let mut pci = pci_info.to_raw();
            let raw = unsafe {
                match version {
                    SymbolVersion::V1 => symbol.cast::<FnDeviceRemoveGpu>()(&mut pci),
                    _ => symbol.cast::<FnDeviceRemoveGpuV2>()(
                        &mut pci,
                        gpu_state.as_raw(),
                        link_state.as_raw(),
                    ),
                }
            };
            check(raw)
        })
    }

    // ── Excluded devices ──────────────────────────────────────────

    pub fn get_excluded_device_count(&self) -> Result<u32, NvmlError> {
        self.dispatch(Operation::GetExcludedDeviceCount, |version, symbol| {
            let mut count: c_uint = 0;
            let raw = unsafe {
                match version {
                    SymbolVersion::V1 => symbol.cast::<FnGetBlacklistDeviceCount>()(&mut count),
                    _ => symbol.cast::<FnGetExcludedDeviceCount>()(&mut count),
                }
            };
            check(raw)?;
            Ok(count)
        })
    }

    pub fn get_excluded_device_info_by_index(
        &self,
        index: u32,
    ) -> Result<ExcludedDeviceInfo, NvmlError> {
        self.dispatch(Operation::GetExcludedDeviceInfoByIndex, |version, symbol| {
            let mut info = RawExcludedDeviceInfo::zeroed();
            let raw = unsafe {
                match version {
                    SymbolVersion::V1 => {
                        symbol.cast::<FnGetBlacklistDeviceInfoByIndex>()(index, &mut info)
                    }
                    _ => symbol.cast::<FnGetExcludedDeviceInfoByIndex>()(index, &mut info),
                }
            };
            check(raw)?;
            Ok(info.into())
        })
    }
}
