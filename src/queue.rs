/*!

A [`Context`] binds a [`Device`] to the runtime, and a [`Queue`] orders work on a device
within a context.

```no_run
# use syclinterface::{anyhow::Result, device::Device, queue::{Queue, QueueProperties}};
# fn main() -> Result<()> {
let queue = Queue::for_device(
    Device::host(),
    None,
    QueueProperties::empty().with_in_order(true),
)?;
let context = queue.context().clone();
assert_eq!(context.device(), queue.device());
# Ok(())
# }
```
*/

use crate::device::{Device, DeviceInner};
use anyhow::Result;
use std::{
    fmt::{self, Debug},
    sync::Arc,
};

#[cfg(feature = "opencl")]
use ocl::{Context as ClContext, Queue as ClQueue};

/// Errors.
pub mod error {
    use super::*;

    /// The properties bitmask contains unknown bits.
    #[derive(Clone, Copy, Debug, thiserror::Error)]
    #[error("Invalid queue properties {bits:#x}!")]
    pub struct InvalidQueueProperties {
        pub(super) bits: u32,
    }

    /// The device is not part of the context.
    #[derive(Clone, Debug, thiserror::Error)]
    #[error("{device:?} is not in {context:?}!")]
    pub struct DeviceNotInContext {
        pub(crate) device: Device,
        pub(crate) context: Context,
    }

    /// An error reported asynchronously by the runtime while waiting on a queue.
    #[derive(Clone, Debug, thiserror::Error)]
    #[error("Asynchronous error {code}: {message}")]
    pub struct AsyncError {
        pub(crate) code: i32,
        pub(crate) message: String,
    }

    impl AsyncError {
        /// The runtime error code, negative.
        pub fn code(&self) -> i32 {
            self.code
        }
    }
}
use error::*;

/** Queue properties.

Queues are out of order unless [`in_order`](QueueProperties::in_order) is set.

Across the C ABI these are a bitmask, see [`from_bits`](QueueProperties::from_bits).
*/
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct QueueProperties {
    enable_profiling: bool,
    in_order: bool,
}

impl QueueProperties {
    /// Bit enabling profiling.
    pub const ENABLE_PROFILING: u32 = 1 << 1;
    /// Bit requesting an in order queue.
    pub const IN_ORDER: u32 = 1 << 2;
    /// Out of order, no profiling.
    pub const fn empty() -> Self {
        Self {
            enable_profiling: false,
            in_order: false,
        }
    }
    /// Profiling is enabled.
    pub const fn enable_profiling(&self) -> bool {
        self.enable_profiling
    }
    /// Adds `enable_profiling`.
    pub const fn with_enable_profiling(mut self, enable_profiling: bool) -> Self {
        self.enable_profiling = enable_profiling;
        self
    }
    /// Work executes in submission order.
    pub const fn in_order(&self) -> bool {
        self.in_order
    }
    /// Adds `in_order`.
    pub const fn with_in_order(mut self, in_order: bool) -> Self {
        self.in_order = in_order;
        self
    }
    /** Parses a bitmask of [`ENABLE_PROFILING`](Self::ENABLE_PROFILING) and
    [`IN_ORDER`](Self::IN_ORDER).

    **errors**
    - [`InvalidQueueProperties`](error::InvalidQueueProperties) if other bits are set. */
    pub const fn from_bits(bits: u32) -> Result<Self, InvalidQueueProperties> {
        if bits & !(Self::ENABLE_PROFILING | Self::IN_ORDER) != 0 {
            return Err(InvalidQueueProperties { bits });
        }
        Ok(Self {
            enable_profiling: bits & Self::ENABLE_PROFILING != 0,
            in_order: bits & Self::IN_ORDER != 0,
        })
    }
    /// The bitmask.
    pub const fn bits(&self) -> u32 {
        let mut bits = 0;
        if self.enable_profiling {
            bits |= Self::ENABLE_PROFILING;
        }
        if self.in_order {
            bits |= Self::IN_ORDER;
        }
        bits
    }
}

/// Called with errors observed by [`Queue::wait`].
pub type AsyncHandler = Arc<dyn Fn(&AsyncError) + Send + Sync>;

/** A context.

Cloning shares the context, clones compare equal.
*/
#[derive(Clone)]
pub struct Context {
    device: Device,
    inner: Arc<ContextInner>,
}

pub(crate) enum ContextInner {
    Host,
    #[cfg(feature = "opencl")]
    OpenCl(ClContext),
}

impl Context {
    /** Creates a context for `device`.

    **errors**
    - The runtime failed to create the context. */
    pub fn new(device: Device) -> Result<Self> {
        let inner = match device.inner() {
            DeviceInner::Host => ContextInner::Host,
            #[cfg(feature = "opencl")]
            DeviceInner::OpenCl(raw) => ContextInner::OpenCl(raw.engine().create_context()?),
        };
        log::debug!("created context for {device:?}");
        Ok(Self {
            device,
            inner: Arc::new(inner),
        })
    }
    /// The device.
    pub fn device(&self) -> &Device {
        &self.device
    }
    /// The number of devices, always 1.
    pub fn device_count(&self) -> usize {
        1
    }
    /// Whether `device` is part of the context.
    pub fn contains(&self, device: &Device) -> bool {
        &self.device == device
    }
    pub(crate) fn ensure_contains(&self, device: &Device) -> Result<(), DeviceNotInContext> {
        if self.contains(device) {
            Ok(())
        } else {
            Err(DeviceNotInContext {
                device: device.clone(),
                context: self.clone(),
            })
        }
    }
    pub(crate) fn inner(&self) -> &ContextInner {
        &self.inner
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Context {}

/// Prints `Context(device@handle)`.
impl Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Context({:?}@{:p})", self.device, Arc::as_ptr(&self.inner))
    }
}

/** A queue.

Cloning shares the queue, clones compare equal.
*/
#[derive(Clone)]
pub struct Queue {
    context: Context,
    device: Device,
    properties: QueueProperties,
    handler: Option<AsyncHandler>,
    inner: Arc<QueueInner>,
}

enum QueueInner {
    Host,
    #[cfg(feature = "opencl")]
    OpenCl(ClQueue),
}

impl Queue {
    /** Creates a queue for `device` with a new context.

    **errors**
    - See [`Context::new`] and [`Queue::new`]. */
    pub fn for_device(
        device: Device,
        handler: Option<AsyncHandler>,
        properties: QueueProperties,
    ) -> Result<Self> {
        let context = Context::new(device.clone())?;
        Self::new(context, device, handler, properties)
    }
    /** Creates a queue for `device` in `context`.

    If the runtime rejects an out of order queue, an in order queue is created instead.

    **errors**
    - [`DeviceNotInContext`](error::DeviceNotInContext)
    - The runtime failed to create the queue. */
    pub fn new(
        context: Context,
        device: Device,
        handler: Option<AsyncHandler>,
        properties: QueueProperties,
    ) -> Result<Self> {
        context.ensure_contains(&device)?;
        let (inner, properties) = match (context.inner(), device.inner()) {
            (ContextInner::Host, DeviceInner::Host) => (QueueInner::Host, properties),
            #[cfg(feature = "opencl")]
            (ContextInner::OpenCl(cl_context), DeviceInner::OpenCl(raw)) => {
                let (queue, properties) = raw.engine().create_queue(cl_context, properties)?;
                (QueueInner::OpenCl(queue), properties)
            }
            #[cfg(feature = "opencl")]
            _ => unreachable!("context device mismatch"),
        };
        log::debug!("created queue for {device:?} with {properties:?}");
        Ok(Self {
            context,
            device,
            properties,
            handler,
            inner: Arc::new(inner),
        })
    }
    /// The context.
    pub fn context(&self) -> &Context {
        &self.context
    }
    /// The device.
    pub fn device(&self) -> &Device {
        &self.device
    }
    /// The properties the queue was created with, after any fallback.
    pub fn properties(&self) -> QueueProperties {
        self.properties
    }
    /// See [`QueueProperties::in_order`].
    pub fn is_in_order(&self) -> bool {
        self.properties.in_order()
    }
    /** Waits for submitted work to finish.

    If host, this does nothing.

    **errors**
    - [`AsyncError`](error::AsyncError) if the runtime reports a failure. The handler, if
    any, is called first. */
    pub fn wait(&self) -> Result<(), AsyncError> {
        let result = match &*self.inner {
            QueueInner::Host => Ok(()),
            #[cfg(feature = "opencl")]
            QueueInner::OpenCl(queue) => queue.finish().map_err(|e| {
                let e = crate::device::opencl_engine::ClError::from(e);
                AsyncError {
                    code: e.code,
                    message: e.to_string(),
                }
            }),
        };
        if let (Err(e), Some(handler)) = (&result, self.handler.as_ref()) {
            handler(e);
        }
        result
    }
}

impl PartialEq for Queue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Queue {}

impl Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("context", &self.context)
            .field("properties", &self.properties)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_properties_bits() {
        assert_eq!(QueueProperties::from_bits(0).unwrap(), QueueProperties::empty());
        let props = QueueProperties::from_bits(QueueProperties::IN_ORDER).unwrap();
        assert!(props.in_order());
        assert!(!props.enable_profiling());
        let props = QueueProperties::from_bits(6).unwrap();
        assert!(props.in_order() && props.enable_profiling());
        assert_eq!(props.bits(), 6);
        assert!(QueueProperties::from_bits(1).is_err());
        assert!(QueueProperties::from_bits(1 << 8).is_err());
    }

    #[test]
    fn host_queue() {
        let queue = Queue::for_device(Device::host(), None, QueueProperties::empty()).unwrap();
        assert!(queue.device().is_host());
        assert!(!queue.is_in_order());
        assert_eq!(queue.context().device(), queue.device());
        assert_eq!(queue.context().device_count(), 1);
        queue.wait().unwrap();
        let clone = queue.clone();
        assert_eq!(clone, queue);
        let other = Queue::new(
            queue.context().clone(),
            Device::host(),
            None,
            QueueProperties::empty(),
        )
        .unwrap();
        assert_ne!(other, queue);
        assert_eq!(other.context(), queue.context());
    }

    #[test]
    fn contexts_are_unique() {
        let a = Context::new(Device::host()).unwrap();
        let b = Context::new(Device::host()).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.clone(), a);
        assert!(a.contains(&Device::host()));
    }
}
