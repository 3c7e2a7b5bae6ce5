//! Owned Rust views of NVML output structures.

use std::fmt;

use serde::Serialize;

use crate::ffi::{
    self, NvmlDeviceT, RawDeviceAttributes, RawExcludedDeviceInfo, RawMemory, RawPciInfo,
    RawProcessInfo, RawProcessInfoV1,
};

/// Opaque device handle (`nvmlDevice_t`).
///
/// Only meaningful while the context that produced it stays initialized.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Device(NvmlDeviceT);

// SAFETY: NVML device handles are process-global tokens and the library is
// documented thread-safe.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}

impl Device {
    pub fn from_raw(raw: NvmlDeviceT) -> Self {
        Self(raw)
    }

    pub fn as_raw(self) -> NvmlDeviceT {
        self.0
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Device({:p})", self.0)
    }
}

/// Device memory in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Memory {
    pub total: u64,
    pub free: u64,
    pub used: u64,
}

impl From<RawMemory> for Memory {
    fn from(raw: RawMemory) -> Self {
        Self {
            total: raw.total,
            free: raw.free,
            used: raw.used,
        }
    }
}

/// PCI location and identity of a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PciInfo {
    /// "domain:bus:device.function" (e.g. "00000000:65:00.0")
    pub bus_id: String,
    /// Same location in the legacy 16-byte format
    pub bus_id_legacy: String,
    pub domain: u32,
    pub bus: u32,
    pub device: u32,
    pub pci_device_id: u32,
    pub pci_sub_system_id: u32,
}

impl PciInfo {
    pub fn from_raw(raw: &RawPciInfo) -> Self {
        Self {
            bus_id: ffi::string_from_buf(&raw.bus_id),
            bus_id_legacy: ffi::string_from_buf(&raw.bus_id_legacy),
            domain: raw.domain,
            bus: raw.bus,
            device: raw.device,
            pci_device_id: raw.pci_device_id,
            pci_sub_system_id: raw.pci_sub_system_id,
        }
    }

    pub fn to_raw(&self) -> RawPciInfo {
        let mut raw: RawPciInfo = bytemuck::Zeroable::zeroed();
        ffi::string_to_buf(&self.bus_id, &mut raw.bus_id);
        ffi::string_to_buf(&self.bus_id_legacy, &mut raw.bus_id_legacy);
        raw.domain = self.domain;
        raw.bus = self.bus;
        raw.device = self.device;
        raw.pci_device_id = self.pci_device_id;
        raw.pci_sub_system_id = self.pci_sub_system_id;
        raw
    }
}

/// A process using a device.
///
/// Instance ids are `None` when the bound entry point predates MIG
/// (`_v1` process queries do not report them).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub used_gpu_memory: u64,
    pub gpu_instance_id: Option<u32>,
    pub compute_instance_id: Option<u32>,
}

impl From<RawProcessInfoV1> for ProcessInfo {
    fn from(raw: RawProcessInfoV1) -> Self {
        Self {
            pid: raw.pid,
            used_gpu_memory: raw.used_gpu_memory,
            gpu_instance_id: None,
            compute_instance_id: None,
        }
    }
}

impl From<RawProcessInfo> for ProcessInfo {
    fn from(raw: RawProcessInfo) -> Self {
        Self {
            pid: raw.pid,
            used_gpu_memory: raw.used_gpu_memory,
            gpu_instance_id: Some(raw.gpu_instance_id),
            compute_instance_id: Some(raw.compute_instance_id),
        }
    }
}

/// Resource counts of a device or MIG instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeviceAttributes {
    pub multiprocessor_count: u32,
    pub shared_copy_engine_count: u32,
    pub shared_decoder_count: u32,
    pub shared_encoder_count: u32,
    pub shared_jpeg_count: u32,
    pub shared_ofa_count: u32,
    pub gpu_instance_slice_count: u32,
    pub compute_instance_slice_count: u32,
    pub memory_size_mb: u64,
}

impl From<RawDeviceAttributes> for DeviceAttributes {
    fn from(raw: RawDeviceAttributes) -> Self {
        Self {
            multiprocessor_count: raw.multiprocessor_count,
            shared_copy_engine_count: raw.shared_copy_engine_count,
            shared_decoder_count: raw.shared_decoder_count,
            shared_encoder_count: raw.shared_encoder_count,
            shared_jpeg_count: raw.shared_jpeg_count,
            shared_ofa_count: raw.shared_ofa_count,
            gpu_instance_slice_count: raw.gpu_instance_slice_count,
            compute_instance_slice_count: raw.compute_instance_slice_count,
            memory_size_mb: raw.memory_size_mb,
        }
    }
}

/// A device the driver has been told to ignore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExcludedDeviceInfo {
    pub pci_info: PciInfo,
    pub uuid: String,
}

impl From<RawExcludedDeviceInfo> for ExcludedDeviceInfo {
    fn from(raw: RawExcludedDeviceInfo) -> Self {
        Self {
            pci_info: PciInfo::from_raw(&raw.pci_info),
            uuid: ffi::string_from_buf(&raw.uuid),
        }
    }
}

/// `nvmlDetachGpuState_t`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum DetachGpuState {
    #[default]
    Keep,
    Remove,
}

impl DetachGpuState {
    pub fn as_raw(self) -> ffi::RawDetachGpuState {
        match self {
            Self::Keep => 0,
            Self::Remove => 1,
        }
    }
}

/// `nvmlPcieLinkState_t`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum PcieLinkState {
    #[default]
    KeepLink,
    ShutDownLink,
}

impl PcieLinkState {
    pub fn as_raw(self) -> ffi::RawPcieLinkState {
        match self {
            Self::KeepLink => 0,
            Self::ShutDownLink => 1,
        }
    }
}
