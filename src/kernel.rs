use crate::kernel_bundle::KernelBundle;
use std::fmt::{self, Debug};

/** A kernel.

A named entry point of a [`KernelBundle`], created with [`KernelBundle::kernel`]. The
number of arguments is queried once, when the kernel is created.
*/
#[derive(Clone)]
pub struct Kernel {
    bundle: KernelBundle,
    name: String,
    num_args: u32,
    #[cfg(feature = "opencl")]
    raw: ocl::core::Kernel,
}

impl Kernel {
    #[cfg(feature = "opencl")]
    pub(crate) fn new(bundle: KernelBundle, name: String, num_args: u32, raw: ocl::core::Kernel) -> Self {
        Self {
            bundle,
            name,
            num_args,
            raw,
        }
    }
    /// The bundle.
    pub fn bundle(&self) -> &KernelBundle {
        &self.bundle
    }
    /// The function name.
    pub fn name(&self) -> &str {
        &self.name
    }
    /// The number of formal arguments.
    pub fn num_args(&self) -> u32 {
        self.num_args
    }
    /** The runtime kernel, for interop with `ocl`.

    The runtime kernel is released when the last clone of this kernel is dropped. */
    #[cfg(feature = "opencl")]
    pub fn as_core(&self) -> &ocl::core::Kernel {
        &self.raw
    }
}

/// Prints `Kernel(name, num_args)`.
impl Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Kernel")
            .field(&self.name)
            .field(&self.num_args)
            .finish()
    }
}
