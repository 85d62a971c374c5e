/*!

A [`KernelBundle`] is compiled device code holding one or more named kernels.

Bundles are built online from OpenCL C source, or from a SPIR-V binary on backends that
accept it (OpenCL and Level Zero). Kernels can not be built for the host.

```no_run
# use syclinterface::{anyhow::Result, device::DeviceSelector, kernel_bundle::KernelBundle, queue::Context};
# fn main() -> Result<()> {
let device = "opencl:gpu:0".parse::<DeviceSelector>()?.select()?;
let context = Context::new(device.clone())?;
let bundle = KernelBundle::from_source(
    &context,
    &device,
    "kernel void fill(global int* a, int x) { a[get_global_id(0)] = x; }",
    "-cl-fast-relaxed-math",
)?;
assert_eq!(bundle.kernel("fill")?.num_args(), 2);
# Ok(())
# }
```
*/

use crate::{
    device::{Backend, Device, DeviceInner},
    kernel::Kernel,
    queue::Context,
    spirv::SpirvModule,
};
use anyhow::Result;
use std::{
    fmt::{self, Debug},
    sync::Arc,
};

#[cfg(feature = "opencl")]
use crate::{device::opencl_engine, queue::ContextInner};

/// Errors.
pub mod error {
    use super::*;

    /// Kernels can not be built for the backend.
    #[derive(Clone, Copy, Debug, thiserror::Error)]
    #[error("Kernels are not supported on the {backend} backend!")]
    pub struct KernelsUnsupported {
        pub(crate) backend: Backend,
    }

    /// The backend or device does not accept SPIR-V.
    #[derive(Clone, Debug, thiserror::Error)]
    #[error("SPIR-V is not supported by {device:?} on the {backend} backend!")]
    pub struct SpirvUnsupported {
        pub(crate) backend: Backend,
        pub(crate) device: String,
    }

    /// The runtime compiler failed, holds its build log.
    #[derive(Clone, Debug, thiserror::Error)]
    #[error("Failed to build kernel bundle for {device:?}:\n{log}")]
    pub struct BuildFailed {
        pub(crate) device: String,
        pub(crate) log: String,
    }

    impl BuildFailed {
        /// The compiler output.
        pub fn log(&self) -> &str {
            &self.log
        }
    }

    /// The bundle has no kernel with the name.
    #[derive(Clone, Debug, thiserror::Error)]
    #[error("Kernel {name:?} not found in bundle with kernels {kernels:?}!")]
    pub struct KernelNotFound {
        pub(crate) name: String,
        pub(crate) kernels: Vec<String>,
    }
}
use error::*;

/** A kernel bundle.

Cloning shares the bundle. Kernels keep their bundle alive.
*/
#[derive(Clone)]
pub struct KernelBundle {
    inner: Arc<KernelBundleInner>,
}

#[cfg_attr(not(feature = "opencl"), allow(dead_code))]
struct KernelBundleInner {
    context: Context,
    device: Device,
    kernel_names: Vec<String>,
    #[cfg(feature = "opencl")]
    program: ocl::Program,
}

impl KernelBundle {
    /** Compiles OpenCL C `source` for `device`.

    `options` are passed to the compiler verbatim.

    **errors**
    - [`DeviceNotInContext`](crate::queue::error::DeviceNotInContext)
    - [`KernelsUnsupported`](error::KernelsUnsupported) for the host.
    - [`BuildFailed`](error::BuildFailed) */
    pub fn from_source(
        context: &Context,
        device: &Device,
        source: &str,
        options: &str,
    ) -> Result<Self> {
        context.ensure_contains(device)?;
        log::debug!("building {} bytes of source for {device:?} with {options:?}", source.len());
        match (context.inner(), device.inner()) {
            (_, DeviceInner::Host) => Err(KernelsUnsupported {
                backend: Backend::Host,
            }
            .into()),
            #[cfg(feature = "opencl")]
            (ContextInner::OpenCl(cl_context), DeviceInner::OpenCl(raw)) => {
                let program = raw
                    .engine()
                    .build_source(cl_context, source, options)
                    .map_err(|log| BuildFailed {
                        device: device.info().name().to_string(),
                        log,
                    })?;
                Self::from_program(context, device, program)
            }
            #[cfg(feature = "opencl")]
            _ => unreachable!("context device mismatch"),
        }
    }
    /** Builds a bundle from a SPIR-V binary.

    The binary is inspected with [`SpirvModule::parse`] before it is handed to the
    runtime.

    **errors**
    - [`DeviceNotInContext`](crate::queue::error::DeviceNotInContext)
    - [`InvalidSpirv`](crate::spirv::error::InvalidSpirv)
    - [`SpirvUnsupported`](error::SpirvUnsupported) unless the backend and device accept
    SPIR-V.
    - [`BuildFailed`](error::BuildFailed) */
    pub fn from_spirv(context: &Context, device: &Device, il: &[u8], options: &str) -> Result<Self> {
        context.ensure_contains(device)?;
        let module = SpirvModule::parse(il)?;
        log::debug!("building {module:?} for {device:?} with {options:?}");
        let info = device.info();
        if !info.backend().supports_spirv() || !info.supports_spirv() {
            return Err(SpirvUnsupported {
                backend: info.backend(),
                device: info.name().to_string(),
            }
            .into());
        }
        match (context.inner(), device.inner()) {
            (_, DeviceInner::Host) => Err(KernelsUnsupported {
                backend: Backend::Host,
            }
            .into()),
            #[cfg(feature = "opencl")]
            (ContextInner::OpenCl(cl_context), DeviceInner::OpenCl(raw)) => {
                let program = raw
                    .engine()
                    .build_il(cl_context, il, options)
                    .map_err(|log| BuildFailed {
                        device: info.name().to_string(),
                        log,
                    })?;
                let bundle = Self::from_program(context, device, program)?;
                for kernel in module.kernels() {
                    if !bundle.has_kernel(kernel.name()) {
                        log::warn!("SPIR-V entry point {:?} missing from built bundle", kernel.name());
                    }
                }
                Ok(bundle)
            }
            #[cfg(feature = "opencl")]
            _ => unreachable!("context device mismatch"),
        }
    }
    #[cfg(feature = "opencl")]
    fn from_program(context: &Context, device: &Device, program: ocl::Program) -> Result<Self> {
        let kernel_names = opencl_engine::kernel_names(&program)?;
        log::debug!("built kernels {kernel_names:?} for {device:?}");
        Ok(Self {
            inner: Arc::new(KernelBundleInner {
                context: context.clone(),
                device: device.clone(),
                kernel_names,
                program,
            }),
        })
    }
    /// The context.
    pub fn context(&self) -> &Context {
        &self.inner.context
    }
    /// The device.
    pub fn device(&self) -> &Device {
        &self.inner.device
    }
    /// The kernel names, in runtime order.
    pub fn kernel_names(&self) -> &[String] {
        &self.inner.kernel_names
    }
    /// Whether a kernel is named exactly `name`.
    pub fn has_kernel(&self, name: &str) -> bool {
        self.inner.kernel_names.iter().any(|x| x == name)
    }
    /** The kernel named `name`.

    **errors**
    - [`KernelNotFound`](error::KernelNotFound)
    - The runtime failed to create the kernel. */
    pub fn kernel(&self, name: &str) -> Result<Kernel> {
        if !self.has_kernel(name) {
            return Err(KernelNotFound {
                name: name.to_string(),
                kernels: self.inner.kernel_names.clone(),
            }
            .into());
        }
        #[cfg(feature = "opencl")]
        {
            let (raw, num_args) = opencl_engine::create_kernel(&self.inner.program, name)?;
            Ok(Kernel::new(self.clone(), name.to_string(), num_args, raw))
        }
        #[cfg(not(feature = "opencl"))]
        {
            unreachable!("bundles are only built by a device backend")
        }
    }
}

impl Debug for KernelBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelBundle")
            .field("device", &self.inner.device)
            .field("kernels", &self.inner.kernel_names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spirv::tests::kernel_module;

    const SOURCE: &str = "kernel void add(global int* a, global int* b, global int* c) {}";

    #[test]
    fn host_rejects_source() {
        let context = Context::new(Device::host()).unwrap();
        let e = KernelBundle::from_source(&context, &Device::host(), SOURCE, "").unwrap_err();
        assert!(e.is::<KernelsUnsupported>(), "{e:#}");
    }

    #[test]
    fn host_rejects_spirv() {
        let context = Context::new(Device::host()).unwrap();
        let il = kernel_module(&[("add", 3)]);
        let e = KernelBundle::from_spirv(&context, &Device::host(), &il, "").unwrap_err();
        assert!(e.is::<SpirvUnsupported>(), "{e:#}");
    }

    #[test]
    fn malformed_spirv_fails_before_backend_check() {
        let context = Context::new(Device::host()).unwrap();
        let e = KernelBundle::from_spirv(&context, &Device::host(), &[1, 2, 3], "").unwrap_err();
        assert!(e.is::<crate::spirv::error::InvalidSpirv>(), "{e:#}");
    }
}
