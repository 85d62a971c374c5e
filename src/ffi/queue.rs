use super::{
    handle::*,
    last_error::{boundary, NullArgument},
};
use crate::queue::{error::AsyncError, AsyncHandler, Context, Queue, QueueProperties};
use std::{os::raw::c_int, ptr::null_mut, sync::Arc};

/// Called with a negative error code when [`SyclQueue_Wait`] observes an asynchronous error.
pub type SyclAsyncErrorHandler = Option<extern "C" fn(c_int)>;

fn async_handler(handler: SyclAsyncErrorHandler) -> Option<AsyncHandler> {
    handler.map(|handler| -> AsyncHandler { Arc::new(move |e: &AsyncError| handler(e.code())) })
}

/** Creates a context for `device`, or null.

# Safety
`device` is null or live. */
#[no_mangle]
pub unsafe extern "C" fn SyclContext_Create(device: SyclDeviceRef) -> SyclContextRef {
    boundary("SyclContext_Create", null_mut(), || {
        let device = unsafe { OpaqueDevice::as_target(device) }.ok_or(NullArgument("device"))?;
        Ok(OpaqueContext::into_ref(Context::new(device.clone())?))
    })
}

/// # Safety
/// `context` is null or live.
#[no_mangle]
pub unsafe extern "C" fn SyclContext_Copy(context: SyclContextRef) -> SyclContextRef {
    boundary("SyclContext_Copy", null_mut(), || {
        let context =
            unsafe { OpaqueContext::as_target(context) }.ok_or(NullArgument("context"))?;
        Ok(OpaqueContext::into_ref(context.clone()))
    })
}

/** The device of the context, or null.

# Safety
`context` is null or live. */
#[no_mangle]
pub unsafe extern "C" fn SyclContext_GetDevice(context: SyclContextRef) -> SyclDeviceRef {
    boundary("SyclContext_GetDevice", null_mut(), || {
        let context =
            unsafe { OpaqueContext::as_target(context) }.ok_or(NullArgument("context"))?;
        Ok(OpaqueDevice::into_ref(context.device().clone()))
    })
}

/** The number of devices in the context, or -1 if `context` is null.

# Safety
`context` is null or live. */
#[no_mangle]
pub unsafe extern "C" fn SyclContext_GetDeviceCount(context: SyclContextRef) -> i64 {
    boundary("SyclContext_GetDeviceCount", -1, || {
        let context =
            unsafe { OpaqueContext::as_target(context) }.ok_or(NullArgument("context"))?;
        Ok(context.device_count() as i64)
    })
}

/** Whether both handles share a context. False if either is null.

# Safety
Handles are null or live. */
#[no_mangle]
pub unsafe extern "C" fn SyclContext_AreEq(a: SyclContextRef, b: SyclContextRef) -> bool {
    boundary("SyclContext_AreEq", false, || {
        let a = unsafe { OpaqueContext::as_target(a) }.ok_or(NullArgument("a"))?;
        let b = unsafe { OpaqueContext::as_target(b) }.ok_or(NullArgument("b"))?;
        Ok(a == b)
    })
}

/// # Safety
/// `context` is null or live.
#[no_mangle]
pub unsafe extern "C" fn SyclContext_Delete(context: SyclContextRef) {
    unsafe { OpaqueContext::delete(context) }
}

/** Creates a queue for `device` with a new context, or null.

`properties` is a bitmask of `1 << 1` (enable profiling) and `1 << 2` (in order). Other
bits fail.

# Safety
`device` is null or live. */
#[no_mangle]
pub unsafe extern "C" fn SyclQueue_CreateForDevice(
    device: SyclDeviceRef,
    handler: SyclAsyncErrorHandler,
    properties: u32,
) -> SyclQueueRef {
    boundary("SyclQueue_CreateForDevice", null_mut(), || {
        let device = unsafe { OpaqueDevice::as_target(device) }.ok_or(NullArgument("device"))?;
        let properties = QueueProperties::from_bits(properties)?;
        let queue = Queue::for_device(device.clone(), async_handler(handler), properties)?;
        Ok(OpaqueQueue::into_ref(queue))
    })
}

/** Creates a queue for `device` in `context`, or null.

See [`SyclQueue_CreateForDevice`] for `properties`.

# Safety
Handles are null or live. */
#[no_mangle]
pub unsafe extern "C" fn SyclQueue_Create(
    context: SyclContextRef,
    device: SyclDeviceRef,
    handler: SyclAsyncErrorHandler,
    properties: u32,
) -> SyclQueueRef {
    boundary("SyclQueue_Create", null_mut(), || {
        let context =
            unsafe { OpaqueContext::as_target(context) }.ok_or(NullArgument("context"))?;
        let device = unsafe { OpaqueDevice::as_target(device) }.ok_or(NullArgument("device"))?;
        let properties = QueueProperties::from_bits(properties)?;
        let queue = Queue::new(
            context.clone(),
            device.clone(),
            async_handler(handler),
            properties,
        )?;
        Ok(OpaqueQueue::into_ref(queue))
    })
}

/** A new handle to the queue's context, or null.

# Safety
`queue` is null or live. */
#[no_mangle]
pub unsafe extern "C" fn SyclQueue_GetContext(queue: SyclQueueRef) -> SyclContextRef {
    boundary("SyclQueue_GetContext", null_mut(), || {
        let queue = unsafe { OpaqueQueue::as_target(queue) }.ok_or(NullArgument("queue"))?;
        Ok(OpaqueContext::into_ref(queue.context().clone()))
    })
}

/** A new handle to the queue's device, or null.

# Safety
`queue` is null or live. */
#[no_mangle]
pub unsafe extern "C" fn SyclQueue_GetDevice(queue: SyclQueueRef) -> SyclDeviceRef {
    boundary("SyclQueue_GetDevice", null_mut(), || {
        let queue = unsafe { OpaqueQueue::as_target(queue) }.ok_or(NullArgument("queue"))?;
        Ok(OpaqueDevice::into_ref(queue.device().clone()))
    })
}

/// # Safety
/// `queue` is null or live.
#[no_mangle]
pub unsafe extern "C" fn SyclQueue_IsInOrder(queue: SyclQueueRef) -> bool {
    boundary("SyclQueue_IsInOrder", false, || {
        let queue = unsafe { OpaqueQueue::as_target(queue) }.ok_or(NullArgument("queue"))?;
        Ok(queue.is_in_order())
    })
}

/// # Safety
/// `queue` is null or live.
#[no_mangle]
pub unsafe extern "C" fn SyclQueue_HasEnableProfiling(queue: SyclQueueRef) -> bool {
    boundary("SyclQueue_HasEnableProfiling", false, || {
        let queue = unsafe { OpaqueQueue::as_target(queue) }.ok_or(NullArgument("queue"))?;
        Ok(queue.properties().enable_profiling())
    })
}

/** Waits for submitted work. Returns false if `queue` is null or an error was observed.

# Safety
`queue` is null or live. */
#[no_mangle]
pub unsafe extern "C" fn SyclQueue_Wait(queue: SyclQueueRef) -> bool {
    boundary("SyclQueue_Wait", false, || {
        let queue = unsafe { OpaqueQueue::as_target(queue) }.ok_or(NullArgument("queue"))?;
        queue.wait()?;
        Ok(true)
    })
}

/** Whether both handles share a queue. False if either is null.

# Safety
Handles are null or live. */
#[no_mangle]
pub unsafe extern "C" fn SyclQueue_AreEq(a: SyclQueueRef, b: SyclQueueRef) -> bool {
    boundary("SyclQueue_AreEq", false, || {
        let a = unsafe { OpaqueQueue::as_target(a) }.ok_or(NullArgument("a"))?;
        let b = unsafe { OpaqueQueue::as_target(b) }.ok_or(NullArgument("b"))?;
        Ok(a == b)
    })
}

/// # Safety
/// `queue` is null or live.
#[no_mangle]
pub unsafe extern "C" fn SyclQueue_Delete(queue: SyclQueueRef) {
    unsafe { OpaqueQueue::delete(queue) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        device::Device,
        ffi::last_error::{last_message, with_last_error},
    };

    extern "C" fn ignore_errors(_: c_int) {}

    #[test]
    fn host_queue_and_context() {
        unsafe {
            let device = OpaqueDevice::into_ref(Device::host());
            let queue = SyclQueue_CreateForDevice(device, Some(ignore_errors), 0);
            assert!(!queue.is_null());
            assert!(!SyclQueue_IsInOrder(queue));
            assert!(!SyclQueue_HasEnableProfiling(queue));
            assert!(SyclQueue_Wait(queue));
            let context = SyclQueue_GetContext(queue);
            assert!(!context.is_null());
            assert_eq!(SyclContext_GetDeviceCount(context), 1);
            let context_device = SyclContext_GetDevice(context);
            assert!(crate::ffi::SyclDevice_AreEq(device, context_device));
            let queue_device = SyclQueue_GetDevice(queue);
            assert!(crate::ffi::SyclDevice_AreEq(device, queue_device));
            // Each handle is released independently.
            SyclQueue_Delete(queue);
            let other = SyclQueue_Create(context, device, None, 6);
            assert!(SyclQueue_IsInOrder(other));
            assert!(SyclQueue_HasEnableProfiling(other));
            let other_context = SyclQueue_GetContext(other);
            assert!(SyclContext_AreEq(context, other_context));
            let copy = SyclQueue_GetContext(other);
            let fresh = SyclContext_Create(device);
            assert!(!SyclContext_AreEq(fresh, copy));
            for context in [context, other_context, copy, fresh] {
                SyclContext_Delete(context);
            }
            SyclQueue_Delete(other);
            crate::ffi::SyclDevice_Delete(queue_device);
            crate::ffi::SyclDevice_Delete(context_device);
            crate::ffi::SyclDevice_Delete(device);
        }
    }

    #[test]
    fn invalid_properties_return_null() {
        unsafe {
            let device = OpaqueDevice::into_ref(Device::host());
            assert!(SyclQueue_CreateForDevice(device, None, 1).is_null());
            assert!(last_message().unwrap().contains("Invalid queue properties"));
            crate::ffi::SyclDevice_Delete(device);
        }
    }

    #[test]
    fn null_queue_arguments() {
        unsafe {
            assert!(SyclQueue_CreateForDevice(null_mut(), None, 0).is_null());
            assert!(SyclQueue_Create(null_mut(), null_mut(), None, 0).is_null());
            assert!(SyclQueue_GetContext(null_mut()).is_null());
            assert!(SyclQueue_GetDevice(null_mut()).is_null());
            assert!(!SyclQueue_Wait(null_mut()));
            assert!(!SyclQueue_IsInOrder(null_mut()));
            assert!(!SyclQueue_AreEq(null_mut(), null_mut()));
            assert!(SyclContext_Create(null_mut()).is_null());
            assert!(SyclContext_Copy(null_mut()).is_null());
            assert!(SyclContext_GetDevice(null_mut()).is_null());
            assert_eq!(SyclContext_GetDeviceCount(null_mut()), -1);
            SyclQueue_Delete(null_mut());
            SyclContext_Delete(null_mut());
        }
    }

    #[test]
    fn null_queries_set_last_error() {
        unsafe {
            let (context, message) = with_last_error(|| SyclQueue_GetContext(null_mut()));
            assert!(context.is_null());
            assert_eq!(message, "SyclQueue_GetContext: Argument `queue` is null!");
            let (device, message) = with_last_error(|| SyclQueue_GetDevice(null_mut()));
            assert!(device.is_null());
            assert_eq!(message, "SyclQueue_GetDevice: Argument `queue` is null!");
            let (in_order, message) = with_last_error(|| SyclQueue_IsInOrder(null_mut()));
            assert!(!in_order);
            assert!(message.starts_with("SyclQueue_IsInOrder:"));
            let (profiling, message) =
                with_last_error(|| SyclQueue_HasEnableProfiling(null_mut()));
            assert!(!profiling);
            assert!(message.starts_with("SyclQueue_HasEnableProfiling:"));
            let (eq, message) = with_last_error(|| SyclQueue_AreEq(null_mut(), null_mut()));
            assert!(!eq);
            assert_eq!(message, "SyclQueue_AreEq: Argument `a` is null!");
            let (copy, message) = with_last_error(|| SyclContext_Copy(null_mut()));
            assert!(copy.is_null());
            assert_eq!(message, "SyclContext_Copy: Argument `context` is null!");
            let (device, message) = with_last_error(|| SyclContext_GetDevice(null_mut()));
            assert!(device.is_null());
            assert!(message.starts_with("SyclContext_GetDevice:"));
            let (count, message) = with_last_error(|| SyclContext_GetDeviceCount(null_mut()));
            assert_eq!(count, -1);
            assert!(message.starts_with("SyclContext_GetDeviceCount:"));
            let (eq, message) = with_last_error(|| SyclContext_AreEq(null_mut(), null_mut()));
            assert!(!eq);
            assert!(message.starts_with("SyclContext_AreEq:"));
        }
    }
}
