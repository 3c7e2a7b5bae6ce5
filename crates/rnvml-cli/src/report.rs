use serde::Serialize;
use tracing::debug;

use rnvml::{EventWait, Memory, Nvml, NvmlError, Return};

#[derive(Debug, Serialize)]
pub struct SystemReport {
    pub driver_version: String,
    pub nvml_version: String,
    /// `None` when the driver predates the query.
    pub cuda_driver_version: Option<i32>,
    pub excluded_devices: u32,
    pub devices: Vec<DeviceReport>,
}

#[derive(Debug, Serialize)]
pub struct DeviceReport {
    pub index: u32,
    pub name: String,
    pub uuid: String,
    pub pci_bus_id: String,
    pub memory: Memory,
    pub process_count: usize,
}

/// Treat "not implemented by this driver" as absent rather than fatal.
fn optional<T>(result: Result<T, NvmlError>) -> Result<Option<T>, NvmlError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if matches!(e.code(), Return::FunctionNotFound | Return::NotSupported) => {
            debug!("optional query unavailable: {}", e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

impl SystemReport {
    pub fn collect(nvml: &Nvml) -> Result<Self, NvmlError> {
        let count = nvml.device_get_count()?;
        let mut devices = Vec::with_capacity(count as usize);
        for index in 0..count {
            let device = nvml.device_get_handle_by_index(index)?;
            let pci = nvml.device_get_pci_info(device)?;
            let compute = optional(nvml.device_get_compute_running_processes(device))?;
            let graphics = optional(nvml.device_get_graphics_running_processes(device))?;
            devices.push(DeviceReport {
                index,
                name: nvml.device_get_name(device)?,
                uuid: nvml.device_get_uuid(device)?,
                pci_bus_id: pci.bus_id,
                memory: nvml.device_get_memory_info(device)?,
                process_count: compute.map_or(0, |p| p.len()) + graphics.map_or(0, |p| p.len()),
            });
        }

        Ok(Self {
            driver_version: nvml.system_get_driver_version()?,
            nvml_version: nvml.system_get_nvml_version()?,
            cuda_driver_version: optional(nvml.system_get_cuda_driver_version())?,
            excluded_devices: optional(nvml.get_excluded_device_count())?.unwrap_or(0),
            devices,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct EventReport {
    pub timed_out: bool,
    pub event: Option<EventDetail>,
}

#[derive(Debug, Serialize)]
pub struct EventDetail {
    pub device: String,
    pub event_type: String,
    pub event_data: u64,
    pub gpu_instance_id: Option<u32>,
    pub compute_instance_id: Option<u32>,
}

impl From<EventWait> for EventReport {
    fn from(wait: EventWait) -> Self {
        match wait {
            EventWait::TimedOut => Self {
                timed_out: true,
                event: None,
            },
            EventWait::Event(data) => Self {
                timed_out: false,
                event: Some(EventDetail {
                    device: format!("{:?}", data.device),
                    event_type: format!("{:?}", data.event_type),
                    event_data: data.event_data,
                    gpu_instance_id: data.gpu_instance_id,
                    compute_instance_id: data.compute_instance_id,
                }),
            },
        }
    }
}
