//! In-process stand-in for the NVML shared library.
//!
//! `FakeLoader` hands out a `FakeLibrary` whose exports are plain Rust
//! `extern "C"` functions, so a test picks exactly which symbol revisions
//! "exist" in the loaded library.
#![allow(dead_code)]

use std::collections::HashMap;
use std::ffi::{c_char, c_int, c_uint, c_ulonglong, c_void, CStr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rnvml::dl::{DlError, Loader, RawSymbol, SymbolSource};
use rnvml::ffi::{
    NvmlDeviceT, NvmlEventSetT, RawDeviceAttributes, RawEventData, RawExcludedDeviceInfo,
    RawMemory, RawPciInfo, RawProcessInfo, RawProcessInfoV1,
};
use rnvml::Nvml;

pub const SUCCESS: c_int = 0;
pub const INVALID_ARGUMENT: c_int = 2;
pub const NOT_SUPPORTED: c_int = 3;
pub const INSUFFICIENT_SIZE: c_int = 7;
pub const DRIVER_NOT_LOADED: c_int = 9;
pub const TIMEOUT: c_int = 10;
pub const IN_USE: c_int = 19;

pub const FAKE_EVENT_SET: usize = 0xe5e7;

/// Turn a function item into a symbol address.
pub fn sym(ptr: *const ()) -> RawSymbol {
    match RawSymbol::from_ptr(ptr as *mut c_void) {
        Some(symbol) => symbol,
        None => panic!("function pointer is null"),
    }
}

pub struct FakeLibrary {
    symbols: HashMap<&'static str, RawSymbol>,
    faulty: Option<&'static str>,
    open: bool,
    closes: Arc<AtomicUsize>,
    origin: String,
}

impl SymbolSource for FakeLibrary {
    fn lookup(&self, name: &str) -> Result<Option<RawSymbol>, DlError> {
        if !self.open {
            return Err(DlError::AlreadyClosed);
        }
        if self.faulty == Some(name) {
            return Err(DlError::Lookup {
                symbol: name.to_string(),
                reason: "simulated loader fault".to_string(),
            });
        }
        Ok(self.symbols.get(name).copied())
    }

    fn close(&mut self) -> Result<(), DlError> {
        if !self.open {
            return Err(DlError::AlreadyClosed);
        }
        self.open = false;
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn origin(&self) -> &str {
        &self.origin
    }
}

#[derive(Clone, Default)]
pub struct FakeLoader {
    symbols: Vec<(&'static str, RawSymbol)>,
    faulty: Option<&'static str>,
    fail_open: bool,
    opens: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl FakeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader whose library exports the lifecycle entry points.
    pub fn with_lifecycle() -> Self {
        Self::new()
            .export("nvmlInit_v2", ok_init as *const ())
            .export("nvmlShutdown", ok_shutdown as *const ())
    }

    pub fn export(mut self, name: &'static str, ptr: *const ()) -> Self {
        self.symbols.push((name, sym(ptr)));
        self
    }

    /// Looking `name` up fails with a loader fault instead of "absent".
    pub fn faulty(mut self, name: &'static str) -> Self {
        self.faulty = Some(name);
        self
    }

    pub fn failing() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl Loader for FakeLoader {
    type Library = FakeLibrary;

    fn open(&self) -> Result<FakeLibrary, DlError> {
        if self.fail_open {
            return Err(DlError::NotFound("libfake-nvml.so".to_string()));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(FakeLibrary {
            symbols: self.symbols.iter().copied().collect(),
            faulty: self.faulty,
            open: true,
            closes: Arc::clone(&self.closes),
            origin: "libfake-nvml.so".to_string(),
        })
    }
}

/// Initialized context over `loader`.
pub fn ready(loader: FakeLoader) -> Nvml<FakeLoader> {
    rnvml_common::try_init_logging();
    let nvml = Nvml::with_loader(loader);
    if let Err(e) = nvml.init() {
        panic!("fake init failed: {}", e);
    }
    nvml
}

unsafe fn write_str(value: &str, buf: *mut c_char, len: c_uint) -> c_int {
    let bytes = value.as_bytes();
    if bytes.len() + 1 > len as usize {
        return INSUFFICIENT_SIZE;
    }
    for (i, &b) in bytes.iter().enumerate() {
        *buf.add(i) = b as c_char;
    }
    *buf.add(bytes.len()) = 0;
    SUCCESS
}

fn fill_array(value: &str, buf: &mut [c_char]) {
    for (dst, &src) in buf.iter_mut().zip(value.as_bytes()) {
        *dst = src as c_char;
    }
}

// ── Lifecycle ────────────────────────────────────────────────────

pub extern "C" fn ok_init() -> c_int {
    SUCCESS
}

pub extern "C" fn failing_init() -> c_int {
    DRIVER_NOT_LOADED
}

pub extern "C" fn ok_init_with_flags(flags: c_uint) -> c_int {
    if flags > 3 {
        INVALID_ARGUMENT
    } else {
        SUCCESS
    }
}

pub extern "C" fn ok_shutdown() -> c_int {
    SUCCESS
}

pub extern "C" fn busy_shutdown() -> c_int {
    IN_USE
}

pub extern "C" fn error_string(result: c_int) -> *const c_char {
    let text: &'static [u8] = match result {
        SUCCESS => b"fake: success\0",
        DRIVER_NOT_LOADED => b"fake: driver not loaded\0",
        _ => b"fake: error\0",
    };
    text.as_ptr() as *const c_char
}

// ── System ───────────────────────────────────────────────────────

pub unsafe extern "C" fn driver_version(buf: *mut c_char, len: c_uint) -> c_int {
    write_str("550.54.14", buf, len)
}

pub unsafe extern "C" fn nvml_version(buf: *mut c_char, len: c_uint) -> c_int {
    write_str("12.550.54.14", buf, len)
}

pub unsafe extern "C" fn cuda_driver_version_v1(version: *mut c_int) -> c_int {
    *version = 11080;
    SUCCESS
}

pub unsafe extern "C" fn cuda_driver_version_v2(version: *mut c_int) -> c_int {
    *version = 12040;
    SUCCESS
}

// ── Devices ──────────────────────────────────────────────────────

pub unsafe extern "C" fn device_count_v1(count: *mut c_uint) -> c_int {
    *count = 1;
    SUCCESS
}

pub unsafe extern "C" fn device_count_v2(count: *mut c_uint) -> c_int {
    *count = 2;
    SUCCESS
}

pub unsafe extern "C" fn handle_by_index(index: c_uint, device: *mut NvmlDeviceT) -> c_int {
    if index >= 2 {
        return INVALID_ARGUMENT;
    }
    *device = (0x1000 + index as usize) as NvmlDeviceT;
    SUCCESS
}

pub unsafe extern "C" fn handle_by_pci_bus_id(
    bus_id: *const c_char,
    device: *mut NvmlDeviceT,
) -> c_int {
    match CStr::from_ptr(bus_id).to_str() {
        Ok("00000000:65:00.0") => {
            *device = 0x1000 as NvmlDeviceT;
            SUCCESS
        }
        _ => 6, // NOT_FOUND
    }
}

pub unsafe extern "C" fn device_name(_device: NvmlDeviceT, buf: *mut c_char, len: c_uint) -> c_int {
    write_str("Fake GPU 80GB", buf, len)
}

pub unsafe extern "C" fn device_uuid(_device: NvmlDeviceT, buf: *mut c_char, len: c_uint) -> c_int {
    write_str("GPU-00000000-1111-2222-3333-444444444444", buf, len)
}

pub unsafe extern "C" fn memory_info(_device: NvmlDeviceT, memory: *mut RawMemory) -> c_int {
    *memory = RawMemory {
        total: 100,
        free: 60,
        used: 40,
    };
    SUCCESS
}

unsafe fn fill_pci(pci: *mut RawPciInfo, domain: c_uint) -> c_int {
    let pci = &mut *pci;
    fill_array("00000000:65:00.0", &mut pci.bus_id);
    fill_array("0000:65:00.0", &mut pci.bus_id_legacy);
    pci.domain = domain;
    pci.bus = 0x65;
    pci.device = 0;
    pci.pci_device_id = 0x20b2_10de;
    SUCCESS
}

/// `nvmlPciInfo_t` as written by the unversioned entry points.
#[repr(C)]
struct LegacyPciInfo {
    bus_id: [c_char; 16],
    domain: c_uint,
    bus: c_uint,
    device: c_uint,
    pci_device_id: c_uint,
    pci_sub_system_id: c_uint,
    reserved: [c_uint; 4],
}

unsafe fn fill_legacy_pci(pci: *mut RawPciInfo, domain: c_uint) -> c_int {
    let mut legacy = LegacyPciInfo {
        bus_id: [0; 16],
        domain,
        bus: 0x65,
        device: 0,
        pci_device_id: 0x1db4_10de,
        pci_sub_system_id: 0,
        reserved: [0x5a5a_5a5a; 4],
    };
    fill_array("0000:65:00.0", &mut legacy.bus_id);
    pci.cast::<LegacyPciInfo>().write(legacy);
    SUCCESS
}

pub unsafe extern "C" fn pci_info_v1(_device: NvmlDeviceT, pci: *mut RawPciInfo) -> c_int {
    fill_legacy_pci(pci, 1)
}

pub unsafe extern "C" fn pci_info_v2(_device: NvmlDeviceT, pci: *mut RawPciInfo) -> c_int {
    fill_pci(pci, 2)
}

pub unsafe extern "C" fn pci_info_v3(_device: NvmlDeviceT, pci: *mut RawPciInfo) -> c_int {
    fill_pci(pci, 3)
}

pub unsafe extern "C" fn nvlink_remote_pci_v1(
    _device: NvmlDeviceT,
    link: c_uint,
    pci: *mut RawPciInfo,
) -> c_int {
    fill_legacy_pci(pci, 100 + link)
}

pub unsafe extern "C" fn nvlink_remote_pci_v2(
    _device: NvmlDeviceT,
    link: c_uint,
    pci: *mut RawPciInfo,
) -> c_int {
    fill_pci(pci, 100 + link)
}

pub unsafe extern "C" fn attributes_v2(
    _device: NvmlDeviceT,
    attributes: *mut RawDeviceAttributes,
) -> c_int {
    (*attributes).multiprocessor_count = 108;
    (*attributes).memory_size_mb = 81920;
    SUCCESS
}

// ── Processes ────────────────────────────────────────────────────

pub unsafe extern "C" fn processes_v1(
    _device: NvmlDeviceT,
    count: *mut c_uint,
    infos: *mut RawProcessInfoV1,
) -> c_int {
    if infos.is_null() || *count < 2 {
        *count = 2;
        return INSUFFICIENT_SIZE;
    }
    *infos = RawProcessInfoV1 {
        pid: 100,
        used_gpu_memory: 1 << 20,
    };
    *infos.add(1) = RawProcessInfoV1 {
        pid: 200,
        used_gpu_memory: 2 << 20,
    };
    *count = 2;
    SUCCESS
}

pub unsafe extern "C" fn processes_v3(
    _device: NvmlDeviceT,
    count: *mut c_uint,
    infos: *mut RawProcessInfo,
) -> c_int {
    if infos.is_null() || *count < 1 {
        *count = 1;
        return INSUFFICIENT_SIZE;
    }
    *infos = RawProcessInfo {
        pid: 300,
        used_gpu_memory: 3 << 20,
        gpu_instance_id: 1,
        compute_instance_id: 2,
    };
    *count = 1;
    SUCCESS
}

pub unsafe extern "C" fn no_processes(
    _device: NvmlDeviceT,
    count: *mut c_uint,
    _infos: *mut RawProcessInfo,
) -> c_int {
    *count = 0;
    SUCCESS
}

// ── Removal ──────────────────────────────────────────────────────

pub extern "C" fn remove_gpu_v1(_pci: *mut RawPciInfo) -> c_int {
    SUCCESS
}

/// Only accepts a full detach, so tests can see the extra arguments arrive.
pub extern "C" fn remove_gpu_v2(_pci: *mut RawPciInfo, gpu_state: c_int, link_state: c_int) -> c_int {
    if gpu_state == 1 && link_state == 1 {
        SUCCESS
    } else {
        NOT_SUPPORTED
    }
}

// ── Excluded devices ─────────────────────────────────────────────

pub unsafe extern "C" fn blacklist_count(count: *mut c_uint) -> c_int {
    *count = 1;
    SUCCESS
}

pub unsafe extern "C" fn excluded_count(count: *mut c_uint) -> c_int {
    *count = 3;
    SUCCESS
}

pub unsafe extern "C" fn excluded_info(index: c_uint, info: *mut RawExcludedDeviceInfo) -> c_int {
    if index != 0 {
        return INVALID_ARGUMENT;
    }
    fill_pci(&mut (*info).pci_info, 0);
    fill_array("GPU-excluded", &mut (*info).uuid);
    SUCCESS
}

// ── Events ───────────────────────────────────────────────────────

pub unsafe extern "C" fn event_set_create(set: *mut NvmlEventSetT) -> c_int {
    *set = FAKE_EVENT_SET as NvmlEventSetT;
    SUCCESS
}

pub extern "C" fn event_set_free(set: NvmlEventSetT) -> c_int {
    if set as usize == FAKE_EVENT_SET {
        SUCCESS
    } else {
        INVALID_ARGUMENT
    }
}

pub extern "C" fn register_events(
    _device: NvmlDeviceT,
    _event_types: c_ulonglong,
    set: NvmlEventSetT,
) -> c_int {
    if set.is_null() {
        INVALID_ARGUMENT
    } else {
        SUCCESS
    }
}

pub unsafe extern "C" fn supported_event_types(
    _device: NvmlDeviceT,
    event_types: *mut c_ulonglong,
) -> c_int {
    // XID | CLOCK plus a bit no released driver defines
    *event_types = 0x8 | 0x10 | 0x1_0000_0000;
    SUCCESS
}

unsafe fn deliver(data: *mut RawEventData, timeout_ms: c_uint) -> c_int {
    if timeout_ms == 0 {
        return TIMEOUT;
    }
    *data = RawEventData {
        device: 0x1000 as NvmlDeviceT,
        event_type: 0x8,
        event_data: 79,
        gpu_instance_id: 5,
        compute_instance_id: 6,
    };
    SUCCESS
}

pub unsafe extern "C" fn event_wait_v1(
    _set: NvmlEventSetT,
    data: *mut RawEventData,
    timeout_ms: c_uint,
) -> c_int {
    deliver(data, timeout_ms)
}

pub unsafe extern "C" fn event_wait_v2(
    _set: NvmlEventSetT,
    data: *mut RawEventData,
    timeout_ms: c_uint,
) -> c_int {
    deliver(data, timeout_ms)
}
