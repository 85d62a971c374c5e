use super::{
    handle::*,
    last_error::{boundary, c_str, into_c_string, NullArgument},
};
use crate::device::{Device, DeviceSelector};
use std::{
    os::raw::{c_char, c_int},
    ptr::null_mut,
};

/** Creates a selector from a filter string like `"opencl:gpu:0"`.

Returns null if `filter` is null or malformed.

# Safety
`filter` is null or a nul terminated string. */
#[no_mangle]
pub unsafe extern "C" fn SyclFilterSelector_Create(filter: *const c_char) -> SyclDeviceSelectorRef {
    boundary("SyclFilterSelector_Create", null_mut(), || {
        let filter = unsafe { c_str(filter, "filter")? };
        let selector = filter.parse::<DeviceSelector>()?;
        Ok(OpaqueDeviceSelector::into_ref(selector))
    })
}

/// Creates a selector preferring gpus, then accelerators, then cpus, then the host.
#[no_mangle]
pub extern "C" fn SyclDefaultSelector_Create() -> SyclDeviceSelectorRef {
    OpaqueDeviceSelector::into_ref(DeviceSelector::default_selector())
}

/// Creates a selector for cpus.
#[no_mangle]
pub extern "C" fn SyclCPUSelector_Create() -> SyclDeviceSelectorRef {
    OpaqueDeviceSelector::into_ref(DeviceSelector::cpu())
}

/// Creates a selector for gpus.
#[no_mangle]
pub extern "C" fn SyclGPUSelector_Create() -> SyclDeviceSelectorRef {
    OpaqueDeviceSelector::into_ref(DeviceSelector::gpu())
}

/// Creates a selector for accelerators.
#[no_mangle]
pub extern "C" fn SyclAcceleratorSelector_Create() -> SyclDeviceSelectorRef {
    OpaqueDeviceSelector::into_ref(DeviceSelector::accelerator())
}

/// Creates a selector for the host.
#[no_mangle]
pub extern "C" fn SyclHostSelector_Create() -> SyclDeviceSelectorRef {
    OpaqueDeviceSelector::into_ref(DeviceSelector::host())
}

/** Scores `device`, negative if rejected or if either handle is null.

# Safety
Handles are null or live. */
#[no_mangle]
pub unsafe extern "C" fn SyclDeviceSelector_Score(
    selector: SyclDeviceSelectorRef,
    device: SyclDeviceRef,
) -> c_int {
    boundary("SyclDeviceSelector_Score", -1, || {
        let selector =
            unsafe { OpaqueDeviceSelector::as_target(selector) }.ok_or(NullArgument("selector"))?;
        let device = unsafe { OpaqueDevice::as_target(device) }.ok_or(NullArgument("device"))?;
        Ok(selector.score(device))
    })
}

/// # Safety
/// `selector` is null or live.
#[no_mangle]
pub unsafe extern "C" fn SyclDeviceSelector_Delete(selector: SyclDeviceSelectorRef) {
    unsafe { OpaqueDeviceSelector::delete(selector) }
}

/** Returns the enumerated device the selector scores highest, or null.

# Safety
`selector` is null or live. */
#[no_mangle]
pub unsafe extern "C" fn SyclDevice_CreateFromSelector(
    selector: SyclDeviceSelectorRef,
) -> SyclDeviceRef {
    boundary("SyclDevice_CreateFromSelector", null_mut(), || {
        let selector =
            unsafe { OpaqueDeviceSelector::as_target(selector) }.ok_or(NullArgument("selector"))?;
        Ok(OpaqueDevice::into_ref(selector.select()?))
    })
}

/// # Safety
/// `device` is null or live.
#[no_mangle]
pub unsafe extern "C" fn SyclDevice_Copy(device: SyclDeviceRef) -> SyclDeviceRef {
    boundary("SyclDevice_Copy", null_mut(), || {
        let device = unsafe { OpaqueDevice::as_target(device) }.ok_or(NullArgument("device"))?;
        Ok(OpaqueDevice::into_ref(device.clone()))
    })
}

/// # Safety
/// `device` is null or live.
#[no_mangle]
pub unsafe extern "C" fn SyclDevice_Delete(device: SyclDeviceRef) {
    unsafe { OpaqueDevice::delete(device) }
}

unsafe fn device_string(
    name: &'static str,
    device: SyclDeviceRef,
    f: impl FnOnce(&Device) -> &str,
) -> *mut c_char {
    boundary(name, null_mut(), || {
        let device = unsafe { OpaqueDevice::as_target(device) }.ok_or(NullArgument("device"))?;
        into_c_string(f(device))
    })
}

/** The device name, or null. Release with [`SyclCString_Delete`](super::SyclCString_Delete).

# Safety
`device` is null or live. */
#[no_mangle]
pub unsafe extern "C" fn SyclDevice_GetName(device: SyclDeviceRef) -> *mut c_char {
    unsafe { device_string("SyclDevice_GetName", device, |x| x.info().name()) }
}

/** The vendor name, or null. Release with [`SyclCString_Delete`](super::SyclCString_Delete).

# Safety
`device` is null or live. */
#[no_mangle]
pub unsafe extern "C" fn SyclDevice_GetVendor(device: SyclDeviceRef) -> *mut c_char {
    unsafe { device_string("SyclDevice_GetVendor", device, |x| x.info().vendor()) }
}

/** The backend: host 0, opencl 1, level_zero 2, cuda 3, or -1 if `device` is null.

# Safety
`device` is null or live. */
#[no_mangle]
pub unsafe extern "C" fn SyclDevice_GetBackend(device: SyclDeviceRef) -> c_int {
    boundary("SyclDevice_GetBackend", -1, || {
        let device = unsafe { OpaqueDevice::as_target(device) }.ok_or(NullArgument("device"))?;
        Ok(device.backend().to_raw())
    })
}

/** The device type: host 0, cpu 1, gpu 2, acc 3, or -1 if `device` is null.

# Safety
`device` is null or live. */
#[no_mangle]
pub unsafe extern "C" fn SyclDevice_GetDeviceType(device: SyclDeviceRef) -> c_int {
    boundary("SyclDevice_GetDeviceType", -1, || {
        let device = unsafe { OpaqueDevice::as_target(device) }.ok_or(NullArgument("device"))?;
        Ok(device.device_type().to_raw())
    })
}

/// # Safety
/// `device` is null or live.
#[no_mangle]
pub unsafe extern "C" fn SyclDevice_IsHost(device: SyclDeviceRef) -> bool {
    boundary("SyclDevice_IsHost", false, || {
        let device = unsafe { OpaqueDevice::as_target(device) }.ok_or(NullArgument("device"))?;
        Ok(device.is_host())
    })
}

/** Whether both handles refer to the same device. False if either is null.

# Safety
Handles are null or live. */
#[no_mangle]
pub unsafe extern "C" fn SyclDevice_AreEq(a: SyclDeviceRef, b: SyclDeviceRef) -> bool {
    boundary("SyclDevice_AreEq", false, || {
        let a = unsafe { OpaqueDevice::as_target(a) }.ok_or(NullArgument("a"))?;
        let b = unsafe { OpaqueDevice::as_target(b) }.ok_or(NullArgument("b"))?;
        Ok(a == b)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::{
        last_error::{last_message, with_last_error},
        SyclCString_Delete,
    };
    use std::ffi::CStr;

    fn filter_selector(filter: &str) -> SyclDeviceSelectorRef {
        let filter = std::ffi::CString::new(filter).unwrap();
        unsafe { SyclFilterSelector_Create(filter.as_ptr()) }
    }

    #[test]
    fn malformed_filters_return_null() {
        unsafe {
            assert!(SyclFilterSelector_Create(std::ptr::null()).is_null());
        }
        assert!(last_message().unwrap().contains("`filter` is null"));
        for filter in ["", "opencl:gpu:-1", "gpu:opencl", "opencl:gpu:0:0", "fpga"] {
            assert!(filter_selector(filter).is_null(), "{filter:?}");
        }
    }

    #[test]
    fn absent_devices_return_null() {
        unsafe {
            let selector = filter_selector("cuda:gpu:0");
            assert!(!selector.is_null());
            assert!(SyclDevice_CreateFromSelector(selector).is_null());
            assert!(last_message().unwrap().contains("No device found"));
            SyclDeviceSelector_Delete(selector);
            let selector = SyclAcceleratorSelector_Create();
            let device = SyclDevice_CreateFromSelector(selector);
            SyclDevice_Delete(device);
            SyclDeviceSelector_Delete(selector);
            assert!(SyclDevice_CreateFromSelector(null_mut()).is_null());
        }
    }

    #[test]
    fn host_device() {
        if std::env::var(crate::device::DEVICE_FILTER_ENV).is_ok() {
            return;
        }
        unsafe {
            let selector = filter_selector("host:host:0");
            let device = SyclDevice_CreateFromSelector(selector);
            assert!(!device.is_null());
            assert!(SyclDevice_IsHost(device));
            assert_eq!(SyclDevice_GetBackend(device), 0);
            assert_eq!(SyclDevice_GetDeviceType(device), 0);
            assert_eq!(SyclDeviceSelector_Score(selector, device), 1000);
            let name = SyclDevice_GetName(device);
            assert_eq!(CStr::from_ptr(name).to_str().unwrap(), "SYCL host device");
            SyclCString_Delete(name);
            let copy = SyclDevice_Copy(device);
            assert!(SyclDevice_AreEq(device, copy));
            let host_selector = SyclHostSelector_Create();
            let other = SyclDevice_CreateFromSelector(host_selector);
            assert!(SyclDevice_AreEq(device, other));
            SyclDevice_Delete(other);
            SyclDeviceSelector_Delete(host_selector);
            SyclDevice_Delete(copy);
            SyclDevice_Delete(device);
            SyclDeviceSelector_Delete(selector);
        }
    }

    #[test]
    fn null_queries_set_last_error() {
        unsafe {
            let (copy, message) = with_last_error(|| SyclDevice_Copy(null_mut()));
            assert!(copy.is_null());
            assert_eq!(message, "SyclDevice_Copy: Argument `device` is null!");
            let (backend, message) = with_last_error(|| SyclDevice_GetBackend(null_mut()));
            assert_eq!(backend, -1);
            assert_eq!(message, "SyclDevice_GetBackend: Argument `device` is null!");
            let (device_type, message) = with_last_error(|| SyclDevice_GetDeviceType(null_mut()));
            assert_eq!(device_type, -1);
            assert_eq!(message, "SyclDevice_GetDeviceType: Argument `device` is null!");
            let (is_host, message) = with_last_error(|| SyclDevice_IsHost(null_mut()));
            assert!(!is_host);
            assert!(message.starts_with("SyclDevice_IsHost:"));
            let (eq, message) = with_last_error(|| SyclDevice_AreEq(null_mut(), null_mut()));
            assert!(!eq);
            assert!(message.starts_with("SyclDevice_AreEq:"));
        }
    }

    #[test]
    fn null_device_queries() {
        unsafe {
            assert_eq!(SyclDevice_GetBackend(null_mut()), -1);
            assert_eq!(SyclDevice_GetDeviceType(null_mut()), -1);
            assert!(!SyclDevice_IsHost(null_mut()));
            assert!(!SyclDevice_AreEq(null_mut(), null_mut()));
            assert!(SyclDevice_GetName(null_mut()).is_null());
            assert!(SyclDevice_GetVendor(null_mut()).is_null());
            assert!(SyclDevice_Copy(null_mut()).is_null());
            assert_eq!(SyclDeviceSelector_Score(null_mut(), null_mut()), -1);
            SyclDevice_Delete(null_mut());
            SyclDeviceSelector_Delete(null_mut());
        }
    }
}
