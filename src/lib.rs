/*!
C-linkage handles for compute devices, queues, contexts, kernel bundles and kernels.

The Rust API lives in [`device`], [`queue`], [`kernel_bundle`], [`kernel`] and [`spirv`].
The [`ffi`] module re-exposes it across a C ABI as opaque, null-checked handles.

Without the "opencl" feature only the host device is available, and kernels can not
be compiled for the host.

```no_run
# use syclinterface::{anyhow::Result, device::DeviceSelector, queue::{Queue, QueueProperties}};
# fn main() -> Result<()> {
let device = "opencl:gpu:0".parse::<DeviceSelector>()?.select()?;
let queue = Queue::for_device(device, None, QueueProperties::empty())?;
dbg!(queue.device().info());
# Ok(())
# }
```
*/
#![forbid(unsafe_op_in_unsafe_fn)]

pub use anyhow;

pub mod result {
    pub type Result<T, E = anyhow::Error> = std::result::Result<T, E>;
}

pub mod device;
pub mod ffi;
pub mod kernel;
pub mod kernel_bundle;
pub mod queue;
pub mod spirv;
