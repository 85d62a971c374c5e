use super::{
    handle::*,
    last_error::{boundary, c_str, into_c_string, NullArgument},
};
use crate::kernel_bundle::KernelBundle;
use anyhow::{format_err, Result};
use std::{ffi::c_void, os::raw::c_char, ptr::null_mut, slice};

unsafe fn options<'a>(options: *const c_char) -> Result<&'a str> {
    if options.is_null() {
        Ok("")
    } else {
        unsafe { c_str(options, "options") }
    }
}

/** Compiles OpenCL C `source` for `device` in `context`, or returns null.

`options` are passed to the compiler verbatim, null is treated as empty. On a build
failure the last error holds the build log.

# Safety
Handles are null or live. Strings are null or nul terminated. */
#[no_mangle]
pub unsafe extern "C" fn SyclKernelBundle_CreateFromOCLSource(
    context: SyclContextRef,
    device: SyclDeviceRef,
    source: *const c_char,
    compile_options: *const c_char,
) -> SyclKernelBundleRef {
    boundary("SyclKernelBundle_CreateFromOCLSource", null_mut(), || {
        let context =
            unsafe { OpaqueContext::as_target(context) }.ok_or(NullArgument("context"))?;
        let device = unsafe { OpaqueDevice::as_target(device) }.ok_or(NullArgument("device"))?;
        let source = unsafe { c_str(source, "source")? };
        let compile_options = unsafe { options(compile_options)? };
        let bundle = KernelBundle::from_source(context, device, source, compile_options)?;
        Ok(OpaqueKernelBundle::into_ref(bundle))
    })
}

/** Builds a bundle from `len` bytes of SPIR-V at `il`, or returns null.

# Safety
Handles are null or live. `il` is null or valid for `len` bytes. `options` is null or
nul terminated. */
#[no_mangle]
pub unsafe extern "C" fn SyclKernelBundle_CreateFromSpirv(
    context: SyclContextRef,
    device: SyclDeviceRef,
    il: *const c_void,
    len: usize,
    compile_options: *const c_char,
) -> SyclKernelBundleRef {
    boundary("SyclKernelBundle_CreateFromSpirv", null_mut(), || {
        let context =
            unsafe { OpaqueContext::as_target(context) }.ok_or(NullArgument("context"))?;
        let device = unsafe { OpaqueDevice::as_target(device) }.ok_or(NullArgument("device"))?;
        if il.is_null() {
            return Err(NullArgument("il").into());
        }
        let il = unsafe { slice::from_raw_parts(il.cast::<u8>(), len) };
        let compile_options = unsafe { options(compile_options)? };
        let bundle = KernelBundle::from_spirv(context, device, il, compile_options)?;
        Ok(OpaqueKernelBundle::into_ref(bundle))
    })
}

/** Whether the bundle has a kernel named exactly `name`. False if either argument is null.

# Safety
`bundle` is null or live, `name` is null or nul terminated. */
#[no_mangle]
pub unsafe extern "C" fn SyclKernelBundle_HasKernel(
    bundle: SyclKernelBundleRef,
    name: *const c_char,
) -> bool {
    boundary("SyclKernelBundle_HasKernel", false, || {
        let bundle =
            unsafe { OpaqueKernelBundle::as_target(bundle) }.ok_or(NullArgument("bundle"))?;
        let name = unsafe { c_str(name, "name")? };
        Ok(bundle.has_kernel(name))
    })
}

/** The kernel named `name`, or null.

# Safety
`bundle` is null or live, `name` is null or nul terminated. */
#[no_mangle]
pub unsafe extern "C" fn SyclKernelBundle_GetKernel(
    bundle: SyclKernelBundleRef,
    name: *const c_char,
) -> SyclKernelRef {
    boundary("SyclKernelBundle_GetKernel", null_mut(), || {
        let bundle =
            unsafe { OpaqueKernelBundle::as_target(bundle) }.ok_or(NullArgument("bundle"))?;
        let name = unsafe { c_str(name, "name")? };
        Ok(OpaqueKernel::into_ref(bundle.kernel(name)?))
    })
}

/// The number of kernels, or -1 if `bundle` is null.
///
/// # Safety
/// `bundle` is null or live.
#[no_mangle]
pub unsafe extern "C" fn SyclKernelBundle_GetNumKernels(bundle: SyclKernelBundleRef) -> i64 {
    boundary("SyclKernelBundle_GetNumKernels", -1, || {
        let bundle =
            unsafe { OpaqueKernelBundle::as_target(bundle) }.ok_or(NullArgument("bundle"))?;
        Ok(bundle.kernel_names().len() as i64)
    })
}

/** The name of kernel `index`, or null. Release with
[`SyclCString_Delete`](super::SyclCString_Delete).

# Safety
`bundle` is null or live. */
#[no_mangle]
pub unsafe extern "C" fn SyclKernelBundle_GetKernelName(
    bundle: SyclKernelBundleRef,
    index: usize,
) -> *mut c_char {
    boundary("SyclKernelBundle_GetKernelName", null_mut(), || {
        let bundle =
            unsafe { OpaqueKernelBundle::as_target(bundle) }.ok_or(NullArgument("bundle"))?;
        let names = bundle.kernel_names();
        let name = names.get(index).ok_or_else(|| {
            format_err!("Kernel index {index} out of range for {} kernels!", names.len())
        })?;
        into_c_string(name)
    })
}

/// # Safety
/// `bundle` is null or live.
#[no_mangle]
pub unsafe extern "C" fn SyclKernelBundle_Delete(bundle: SyclKernelBundleRef) {
    unsafe { OpaqueKernelBundle::delete(bundle) }
}

/** The number of formal arguments of the kernel, or -1 if `kernel` is null.

# Safety
`kernel` is null or live. */
#[no_mangle]
pub unsafe extern "C" fn SyclKernel_GetNumArgs(kernel: SyclKernelRef) -> i64 {
    boundary("SyclKernel_GetNumArgs", -1, || {
        let kernel = unsafe { OpaqueKernel::as_target(kernel) }.ok_or(NullArgument("kernel"))?;
        Ok(kernel.num_args().into())
    })
}

/** The function name of the kernel, or null. Release with
[`SyclCString_Delete`](super::SyclCString_Delete).

# Safety
`kernel` is null or live. */
#[no_mangle]
pub unsafe extern "C" fn SyclKernel_GetFunctionName(kernel: SyclKernelRef) -> *mut c_char {
    boundary("SyclKernel_GetFunctionName", null_mut(), || {
        let kernel = unsafe { OpaqueKernel::as_target(kernel) }.ok_or(NullArgument("kernel"))?;
        into_c_string(kernel.name())
    })
}

/// # Safety
/// `kernel` is null or live.
#[no_mangle]
pub unsafe extern "C" fn SyclKernel_Copy(kernel: SyclKernelRef) -> SyclKernelRef {
    boundary("SyclKernel_Copy", null_mut(), || {
        let kernel = unsafe { OpaqueKernel::as_target(kernel) }.ok_or(NullArgument("kernel"))?;
        Ok(OpaqueKernel::into_ref(kernel.clone()))
    })
}

/// # Safety
/// `kernel` is null or live.
#[no_mangle]
pub unsafe extern "C" fn SyclKernel_Delete(kernel: SyclKernelRef) {
    unsafe { OpaqueKernel::delete(kernel) }
}
