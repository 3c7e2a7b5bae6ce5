mod common;

use common::*;
use rnvml::{Device, EventTypes, EventWait, NvmlError, Return};

fn events_loader() -> FakeLoader {
    FakeLoader::with_lifecycle()
        .export("nvmlEventSetCreate", event_set_create as *const ())
        .export("nvmlEventSetFree", event_set_free as *const ())
        .export("nvmlDeviceRegisterEvents", register_events as *const ())
        .export("nvmlDeviceGetSupportedEventTypes", supported_event_types as *const ())
}

fn device() -> Device {
    Device::from_raw(0x1000 as *mut std::ffi::c_void)
}

#[test]
fn test_event_set_lifecycle() {
    let nvml = ready(events_loader().export("nvmlEventSetWait_v2", event_wait_v2 as *const ()));

    let set = nvml.event_set_create().unwrap();
    assert_eq!(set.as_raw() as usize, FAKE_EVENT_SET);

    let supported = nvml.device_get_supported_event_types(device()).unwrap();
    assert!(supported.contains(EventTypes::XID_CRITICAL_ERROR | EventTypes::CLOCK));
    // bits newer than this crate are retained
    assert_eq!(supported.bits() & 0x1_0000_0000, 0x1_0000_0000);

    nvml.device_register_events(device(), EventTypes::XID_CRITICAL_ERROR, &set)
        .unwrap();
    nvml.event_set_free(set).unwrap();
}

#[test]
fn test_wait_timeout_is_not_an_error() {
    let nvml = ready(events_loader().export("nvmlEventSetWait_v2", event_wait_v2 as *const ()));
    let set = nvml.event_set_create().unwrap();

    assert_eq!(nvml.event_set_wait(&set, 0).unwrap(), EventWait::TimedOut);
    nvml.event_set_free(set).unwrap();
}

#[test]
fn test_wait_v2_reports_instance_ids() {
    let nvml = ready(
        events_loader()
            .export("nvmlEventSetWait", event_wait_v1 as *const ())
            .export("nvmlEventSetWait_v2", event_wait_v2 as *const ()),
    );
    let set = nvml.event_set_create().unwrap();

    match nvml.event_set_wait(&set, 100).unwrap() {
        EventWait::Event(data) => {
            assert_eq!(data.device, device());
            assert_eq!(data.event_type, EventTypes::XID_CRITICAL_ERROR);
            assert_eq!(data.event_data, 79);
            assert_eq!(data.gpu_instance_id, Some(5));
            assert_eq!(data.compute_instance_id, Some(6));
        }
        EventWait::TimedOut => panic!("expected an event"),
    }
}

#[test]
fn test_wait_v1_omits_instance_ids() {
    let nvml = ready(events_loader().export("nvmlEventSetWait", event_wait_v1 as *const ()));
    let set = nvml.event_set_create().unwrap();

    match nvml.event_set_wait(&set, 100).unwrap() {
        EventWait::Event(data) => {
            assert_eq!(data.event_data, 79);
            assert_eq!(data.gpu_instance_id, None);
            assert_eq!(data.compute_instance_id, None);
        }
        EventWait::TimedOut => panic!("expected an event"),
    }
}

#[test]
fn test_event_calls_require_init() {
    let nvml = rnvml::Nvml::with_loader(events_loader());
    assert!(matches!(nvml.event_set_create(), Err(NvmlError::Uninitialized)));
}

#[test]
fn test_wait_without_symbol() {
    let nvml = ready(events_loader());
    let set = nvml.event_set_create().unwrap();
    assert!(matches!(
        nvml.event_set_wait(&set, 0),
        Err(NvmlError::Native(Return::FunctionNotFound))
    ));
}
