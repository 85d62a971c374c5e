use crate::{
    device::{Device, DeviceSelector},
    kernel::Kernel,
    kernel_bundle::KernelBundle,
    queue::{Context, Queue},
};

/// A handle type, pointing to a boxed `Target`.
pub(crate) trait Opaque: Sized {
    type Target;
    fn into_ref(target: Self::Target) -> *mut Self {
        Box::into_raw(Box::new(target)).cast()
    }
    /// # Safety
    /// `ptr` is null or was returned by `into_ref` and not yet deleted.
    unsafe fn as_target<'a>(ptr: *const Self) -> Option<&'a Self::Target> {
        unsafe { ptr.cast::<Self::Target>().as_ref() }
    }
    /// # Safety
    /// `ptr` is null or was returned by `into_ref` and not yet deleted.
    unsafe fn delete(ptr: *mut Self) {
        if !ptr.is_null() {
            drop(unsafe { Box::from_raw(ptr.cast::<Self::Target>()) });
        }
    }
}

macro_rules! opaque {
    ($($(#[$attr:meta])* $opaque:ident => $target:ty, $handle:ident;)*) => {
        $(
            $(#[$attr])*
            #[repr(C)]
            pub struct $opaque {
                _private: [u8; 0],
            }

            $(#[$attr])*
            pub type $handle = *mut $opaque;

            impl Opaque for $opaque {
                type Target = $target;
            }
        )*
    };
}

opaque! {
    /// A device selector.
    OpaqueDeviceSelector => DeviceSelector, SyclDeviceSelectorRef;
    /// A device.
    OpaqueDevice => Device, SyclDeviceRef;
    /// A context.
    OpaqueContext => Context, SyclContextRef;
    /// A queue.
    OpaqueQueue => Queue, SyclQueueRef;
    /// A kernel bundle.
    OpaqueKernelBundle => KernelBundle, SyclKernelBundleRef;
    /// A kernel.
    OpaqueKernel => Kernel, SyclKernelRef;
}
