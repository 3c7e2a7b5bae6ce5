//! Raw NVML C types and entry point signatures.
//!
//! Layouts follow `nvml.h`. Every versioned entry point gets its own alias
//! even when the signature is unchanged, so dispatch code names exactly the
//! ABI revision it is calling.

use std::ffi::{c_char, c_int, c_uint, c_ulonglong, c_void};

use bytemuck::Zeroable;

use crate::status::NvmlReturn;

/// Opaque `nvmlDevice_t`.
pub type NvmlDeviceT = *mut c_void;
/// Opaque `nvmlEventSet_t`.
pub type NvmlEventSetT = *mut c_void;

pub const NVML_DEVICE_PCI_BUS_ID_BUFFER_SIZE: usize = 32;
pub const NVML_DEVICE_PCI_BUS_ID_BUFFER_V2_SIZE: usize = 16;
pub const NVML_DEVICE_UUID_BUFFER_SIZE: usize = 80;
pub const NVML_DEVICE_UUID_V2_BUFFER_SIZE: usize = 96;
pub const NVML_DEVICE_NAME_V2_BUFFER_SIZE: usize = 96;
pub const NVML_SYSTEM_DRIVER_VERSION_BUFFER_SIZE: usize = 80;
pub const NVML_SYSTEM_NVML_VERSION_BUFFER_SIZE: usize = 80;

/// `nvmlPciInfo_t`
#[repr(C)]
#[derive(Debug, Clone, Copy, Zeroable)]
pub struct RawPciInfo {
    pub bus_id_legacy: [c_char; NVML_DEVICE_PCI_BUS_ID_BUFFER_V2_SIZE],
    pub domain: c_uint,
    pub bus: c_uint,
    pub device: c_uint,
    pub pci_device_id: c_uint,
    pub pci_sub_system_id: c_uint,
    pub bus_id: [c_char; NVML_DEVICE_PCI_BUS_ID_BUFFER_SIZE],
}

impl RawPciInfo {
    /// Unversioned entry points fill the pre-v2 layout, which ends with four
    /// reserved words where `bus_id` starts. Rebuild `bus_id` from the
    /// 16-byte id those entry points do write.
    pub(crate) fn promote_legacy_bus_id(&mut self) {
        let legacy = string_from_buf(&self.bus_id_legacy);
        string_to_buf(&legacy, &mut self.bus_id);
    }
}

/// `nvmlMemory_t`
#[repr(C)]
#[derive(Debug, Clone, Copy, Zeroable)]
pub struct RawMemory {
    pub total: c_ulonglong,
    pub free: c_ulonglong,
    pub used: c_ulonglong,
}

/// `nvmlProcessInfo_v1_t`
#[repr(C)]
#[derive(Debug, Clone, Copy, Zeroable)]
pub struct RawProcessInfoV1 {
    pub pid: c_uint,
    pub used_gpu_memory: c_ulonglong,
}

/// `nvmlProcessInfo_t` (`_v2` and `_v3` entry points)
#[repr(C)]
#[derive(Debug, Clone, Copy, Zeroable)]
pub struct RawProcessInfo {
    pub pid: c_uint,
    pub used_gpu_memory: c_ulonglong,
    pub gpu_instance_id: c_uint,
    pub compute_instance_id: c_uint,
}

/// `nvmlDeviceAttributes_t`
#[repr(C)]
#[derive(Debug, Clone, Copy, Zeroable)]
pub struct RawDeviceAttributes {
    pub multiprocessor_count: c_uint,
    pub shared_copy_engine_count: c_uint,
    pub shared_decoder_count: c_uint,
    pub shared_encoder_count: c_uint,
    pub shared_jpeg_count: c_uint,
    pub shared_ofa_count: c_uint,
    pub gpu_instance_slice_count: c_uint,
    pub compute_instance_slice_count: c_uint,
    pub memory_size_mb: c_ulonglong,
}

/// `nvmlExcludedDeviceInfo_t`
#[repr(C)]
#[derive(Debug, Clone, Copy, Zeroable)]
pub struct RawExcludedDeviceInfo {
    pub pci_info: RawPciInfo,
    pub uuid: [c_char; NVML_DEVICE_UUID_BUFFER_SIZE],
}

/// `nvmlEventData_t`
#[repr(C)]
#[derive(Debug, Clone, Copy, Zeroable)]
pub struct RawEventData {
    pub device: NvmlDeviceT,
    pub event_type: c_ulonglong,
    pub event_data: c_ulonglong,
    pub gpu_instance_id: c_uint,
    pub compute_instance_id: c_uint,
}

/// `nvmlDetachGpuState_t`
pub type RawDetachGpuState = c_int;
/// `nvmlPcieLinkState_t`
pub type RawPcieLinkState = c_int;

// Lifecycle
pub type FnInit = unsafe extern "C" fn() -> NvmlReturn;
pub type FnInitV2 = unsafe extern "C" fn() -> NvmlReturn;
pub type FnInitWithFlags = unsafe extern "C" fn(flags: c_uint) -> NvmlReturn;
pub type FnShutdown = unsafe extern "C" fn() -> NvmlReturn;
pub type FnErrorString = unsafe extern "C" fn(result: NvmlReturn) -> *const c_char;

// System
pub type FnSystemGetDriverVersion =
    unsafe extern "C" fn(version: *mut c_char, length: c_uint) -> NvmlReturn;
pub type FnSystemGetNvmlVersion =
    unsafe extern "C" fn(version: *mut c_char, length: c_uint) -> NvmlReturn;
pub type FnSystemGetCudaDriverVersion = unsafe extern "C" fn(version: *mut c_int) -> NvmlReturn;
pub type FnSystemGetCudaDriverVersionV2 = unsafe extern "C" fn(version: *mut c_int) -> NvmlReturn;

// Device enumeration
pub type FnDeviceGetCount = unsafe extern "C" fn(count: *mut c_uint) -> NvmlReturn;
pub type FnDeviceGetCountV2 = unsafe extern "C" fn(count: *mut c_uint) -> NvmlReturn;
pub type FnDeviceGetHandleByIndex =
    unsafe extern "C" fn(index: c_uint, device: *mut NvmlDeviceT) -> NvmlReturn;
pub type FnDeviceGetHandleByIndexV2 =
    unsafe extern "C" fn(index: c_uint, device: *mut NvmlDeviceT) -> NvmlReturn;
pub type FnDeviceGetHandleByPciBusId =
    unsafe extern "C" fn(pci_bus_id: *const c_char, device: *mut NvmlDeviceT) -> NvmlReturn;
pub type FnDeviceGetHandleByPciBusIdV2 =
    unsafe extern "C" fn(pci_bus_id: *const c_char, device: *mut NvmlDeviceT) -> NvmlReturn;

// Device queries
pub type FnDeviceGetName =
    unsafe extern "C" fn(device: NvmlDeviceT, name: *mut c_char, length: c_uint) -> NvmlReturn;
pub type FnDeviceGetUuid =
    unsafe extern "C" fn(device: NvmlDeviceT, uuid: *mut c_char, length: c_uint) -> NvmlReturn;
pub type FnDeviceGetMemoryInfo =
    unsafe extern "C" fn(device: NvmlDeviceT, memory: *mut RawMemory) -> NvmlReturn;
pub type FnDeviceGetPciInfo =
    unsafe extern "C" fn(device: NvmlDeviceT, pci: *mut RawPciInfo) -> NvmlReturn;
pub type FnDeviceGetPciInfoV2 =
    unsafe extern "C" fn(device: NvmlDeviceT, pci: *mut RawPciInfo) -> NvmlReturn;
pub type FnDeviceGetPciInfoV3 =
    unsafe extern "C" fn(device: NvmlDeviceT, pci: *mut RawPciInfo) -> NvmlReturn;
pub type FnDeviceGetNvLinkRemotePciInfo =
    unsafe extern "C" fn(device: NvmlDeviceT, link: c_uint, pci: *mut RawPciInfo) -> NvmlReturn;
pub type FnDeviceGetNvLinkRemotePciInfoV2 =
    unsafe extern "C" fn(device: NvmlDeviceT, link: c_uint, pci: *mut RawPciInfo) -> NvmlReturn;
pub type FnDeviceGetAttributes =
    unsafe extern "C" fn(device: NvmlDeviceT, attributes: *mut RawDeviceAttributes) -> NvmlReturn;
pub type FnDeviceGetAttributesV2 =
    unsafe extern "C" fn(device: NvmlDeviceT, attributes: *mut RawDeviceAttributes) -> NvmlReturn;

// Running processes
pub type FnDeviceGetRunningProcessesV1 = unsafe extern "C" fn(
    device: NvmlDeviceT,
    info_count: *mut c_uint,
    infos: *mut RawProcessInfoV1,
) -> NvmlReturn;
pub type FnDeviceGetRunningProcessesV2 = unsafe extern "C" fn(
    device: NvmlDeviceT,
    info_count: *mut c_uint,
    infos: *mut RawProcessInfo,
) -> NvmlReturn;
pub type FnDeviceGetRunningProcessesV3 = unsafe extern "C" fn(
    device: NvmlDeviceT,
    info_count: *mut c_uint,
    infos: *mut RawProcessInfo,
) -> NvmlReturn;

// Drain / removal
pub type FnDeviceRemoveGpu = unsafe extern "C" fn(pci_info: *mut RawPciInfo) -> NvmlReturn;
pub type FnDeviceRemoveGpuV2 = unsafe extern "C" fn(
    pci_info: *mut RawPciInfo,
    gpu_state: RawDetachGpuState,
    link_state: RawPcieLinkState,
) -> NvmlReturn;

// Excluded devices
pub type FnGetBlacklistDeviceCount = unsafe extern "C" fn(count: *mut c_uint) -> NvmlReturn;
pub type FnGetExcludedDeviceCount = unsafe extern "C" fn(count: *mut c_uint) -> NvmlReturn;
pub type FnGetBlacklistDeviceInfoByIndex =
    unsafe extern "C" fn(index: c_uint, info: *mut RawExcludedDeviceInfo) -> NvmlReturn;
pub type FnGetExcludedDeviceInfoByIndex =
    unsafe extern "C" fn(index: c_uint, info: *mut RawExcludedDeviceInfo) -> NvmlReturn;

// Events
pub type FnEventSetCreate = unsafe extern "C" fn(set: *mut NvmlEventSetT) -> NvmlReturn;
pub type FnEventSetFree = unsafe extern "C" fn(set: NvmlEventSetT) -> NvmlReturn;
pub type FnDeviceRegisterEvents = unsafe extern "C" fn(
    device: NvmlDeviceT,
    event_types: c_ulonglong,
    set: NvmlEventSetT,
) -> NvmlReturn;
pub type FnDeviceGetSupportedEventTypes =
    unsafe extern "C" fn(device: NvmlDeviceT, event_types: *mut c_ulonglong) -> NvmlReturn;
pub type FnEventSetWait = unsafe extern "C" fn(
    set: NvmlEventSetT,
    data: *mut RawEventData,
    timeout_ms: c_uint,
) -> NvmlReturn;
pub type FnEventSetWaitV2 = unsafe extern "C" fn(
    set: NvmlEventSetT,
    data: *mut RawEventData,
    timeout_ms: c_uint,
) -> NvmlReturn;

/// Read a NUL-terminated C string out of a fixed buffer.
pub(crate) fn string_from_buf(buf: &[c_char]) -> String {
    let bytes: Vec<u8> = buf
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Copy `value` into a fixed C buffer, truncating and always NUL-terminating.
pub(crate) fn string_to_buf(value: &str, buf: &mut [c_char]) {
    buf.fill(0);
    let max = buf.len().saturating_sub(1);
    for (dst, &src) in buf.iter_mut().zip(value.as_bytes().iter().take(max)) {
        *dst = src as c_char;
    }
}
