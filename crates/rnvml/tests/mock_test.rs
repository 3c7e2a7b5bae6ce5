use rnvml::{
    subscribe_supported, Device, EventSet, EventTypes, MockCall, MockNvml, NvmlApi, NvmlError,
    Operation, Return,
};

fn count_gpus(nvml: &dyn NvmlApi) -> Result<Vec<String>, NvmlError> {
    nvml.init()?;
    let mut names = Vec::new();
    for index in 0..nvml.device_get_count()? {
        let device = nvml.device_get_handle_by_index(index)?;
        names.push(nvml.device_get_name(device)?);
    }
    nvml.shutdown()?;
    Ok(names)
}

#[test]
fn test_mock_drives_generic_code() {
    let mock = MockNvml {
        device_get_count: Some(Box::new(|_: ()| Ok(2))),
        device_get_handle_by_index: Some(Box::new(|index: u32| {
            Ok(Device::from_raw((0x100 + index as usize) as *mut std::ffi::c_void))
        })),
        device_get_name: Some(Box::new(|device: Device| {
            Ok(format!("gpu@{:x}", device.as_raw() as usize))
        })),
        ..MockNvml::default()
    };

    let names = count_gpus(&mock).unwrap();
    assert_eq!(names, vec!["gpu@100".to_string(), "gpu@101".to_string()]);
    assert_eq!(mock.calls_to(Operation::DeviceGetName), 2);
    assert_eq!(mock.calls().first(), Some(&MockCall::Init));
    assert_eq!(mock.calls().last(), Some(&MockCall::Shutdown));
}

#[test]
fn test_unconfigured_operation_not_found() {
    let mock = MockNvml::new();
    let err = mock.device_get_count().unwrap_err();
    assert_eq!(err.code(), Return::FunctionNotFound);
    assert_eq!(
        mock.error_string(Return::Timeout),
        Return::Timeout.fallback_description()
    );
}

#[test]
fn test_mock_records_event_arguments() {
    let mock = MockNvml {
        device_register_events: Some(Box::new(|(_, types, _): (Device, EventTypes, usize)| {
            if types.contains(EventTypes::PSTATE) {
                Err(NvmlError::Native(Return::NotSupported))
            } else {
                Ok(())
            }
        })),
        ..MockNvml::default()
    };
    let device = Device::from_raw(0x10 as *mut std::ffi::c_void);
    let set = EventSet::from_raw(0x20 as *mut std::ffi::c_void);

    mock.device_register_events(device, EventTypes::XID_CRITICAL_ERROR, &set)
        .unwrap();
    assert!(mock
        .device_register_events(device, EventTypes::PSTATE, &set)
        .is_err());

    assert_eq!(
        mock.calls()[0],
        MockCall::DeviceRegisterEvents(device, EventTypes::XID_CRITICAL_ERROR, 0x20)
    );
    assert_eq!(mock.calls()[1].operation(), Operation::DeviceRegisterEvents);
}

fn two_gpus_with_events() -> MockNvml {
    MockNvml {
        event_set_create: Some(Box::new(|_: ()| {
            Ok(EventSet::from_raw(0x20 as *mut std::ffi::c_void))
        })),
        event_set_free: Some(Box::new(|_: usize| Ok(()))),
        device_get_count: Some(Box::new(|_: ()| Ok(2))),
        device_get_handle_by_index: Some(Box::new(|index: u32| {
            Ok(Device::from_raw((0x100 + index as usize) as *mut std::ffi::c_void))
        })),
        device_get_supported_event_types: Some(Box::new(|_: Device| {
            Ok(EventTypes::XID_CRITICAL_ERROR | EventTypes::CLOCK)
        })),
        device_register_events: Some(Box::new(|_: (Device, EventTypes, usize)| Ok(()))),
        ..MockNvml::default()
    }
}

#[test]
fn test_subscribe_registers_every_gpu() {
    let mock = two_gpus_with_events();
    let set = subscribe_supported(&mock).unwrap().unwrap();
    assert_eq!(set.as_raw() as usize, 0x20);
    assert_eq!(mock.calls_to(Operation::DeviceRegisterEvents), 2);
    assert_eq!(mock.calls_to(Operation::EventSetFree), 0);
}

#[test]
fn test_subscribe_frees_set_when_registration_fails() {
    let mock = MockNvml {
        device_register_events: Some(Box::new(|(device, _, _): (Device, EventTypes, usize)| {
            if device.as_raw() as usize == 0x101 {
                Err(NvmlError::Native(Return::GpuIsLost))
            } else {
                Ok(())
            }
        })),
        ..two_gpus_with_events()
    };

    let err = subscribe_supported(&mock).unwrap_err();
    assert_eq!(err.code(), Return::GpuIsLost);
    assert_eq!(mock.calls().last(), Some(&MockCall::EventSetFree(0x20)));
}

#[test]
fn test_subscribe_without_supported_events_frees_set() {
    let mock = MockNvml {
        device_get_supported_event_types: Some(Box::new(|_: Device| {
            Err(NvmlError::Native(Return::NotSupported))
        })),
        ..two_gpus_with_events()
    };

    assert!(subscribe_supported(&mock).unwrap().is_none());
    assert_eq!(mock.calls_to(Operation::DeviceRegisterEvents), 0);
    assert_eq!(mock.calls().last(), Some(&MockCall::EventSetFree(0x20)));
}
