/*!

A [`Device`](crate::device::Device) is resolved from a [`DeviceSelector`](crate::device::DeviceSelector),
and is used to create [contexts and queues](crate::queue) and [kernel bundles](crate::kernel_bundle).

The host device is always available. With the "opencl" feature, every OpenCL device of
every platform is enumerated before the host.

Resolving a device from a filter string:
```no_run
# use syclinterface::{anyhow::Result, device::DeviceSelector};
# fn main() -> Result<()> {
let device = "opencl:cpu:0".parse::<DeviceSelector>()?.select()?;
dbg!(device.info());
# Ok(())
# }
```

# Filtering
If `SYCL_DEVICE_FILTER` is set, only devices matching it are enumerated. A malformed
value is ignored with a warning.

Note: Kernels can not be created for the host.
*/

use anyhow::Result;
use once_cell::sync::Lazy;
#[cfg(feature = "opencl")]
use std::sync::Arc;
use std::{
    fmt::{self, Debug},
    str::FromStr,
};

#[cfg(feature = "opencl")]
pub(crate) mod opencl_engine;
#[cfg(feature = "opencl")]
use opencl_engine::Engine;

mod selector;
pub use selector::{DeviceSelector, Filter};

/// Environment variable restricting the enumerated devices.
pub const DEVICE_FILTER_ENV: &str = "SYCL_DEVICE_FILTER";

/// Errors.
pub mod error {
    use super::*;

    /** Device is unavailable.

    - The "opencl" feature is not enabled.
    - Failed to load the OpenCL library. */
    #[derive(Clone, Copy, Debug, thiserror::Error)]
    #[error("DeviceUnavailable")]
    pub struct DeviceUnavailable;

    /// No enumerated device was accepted by the selector.
    #[derive(Clone, Debug, thiserror::Error)]
    #[error("No device found for selector {selector}!")]
    pub struct DeviceNotFound {
        pub(crate) selector: String,
    }

    /// A device filter string could not be parsed.
    #[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
    pub enum FilterParseError {
        /// The filter, or one of its comma separated entries, is empty.
        #[error("Empty device filter in {filter:?}!")]
        Empty {
            /// The full filter string.
            filter: String,
        },
        /// A token is not a backend, device type or index in the expected position.
        #[error("Unexpected token {token:?} in device filter {filter:?}, expected \"backend:device_type:index\"!")]
        UnexpectedToken {
            /// The offending token.
            token: String,
            /// The full filter string.
            filter: String,
        },
    }

    /// A backend or device type name is not recognized.
    #[derive(Clone, Debug, thiserror::Error)]
    #[error("Unknown {kind} {input:?}!")]
    pub struct UnknownName {
        pub(super) kind: &'static str,
        pub(super) input: String,
    }
}
use error::*;

/// The runtime backing a device.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, derive_more::Display)]
pub enum Backend {
    #[display(fmt = "host")]
    Host,
    #[display(fmt = "opencl")]
    OpenCl,
    #[display(fmt = "level_zero")]
    LevelZero,
    #[display(fmt = "cuda")]
    Cuda,
}

impl Backend {
    /// Whether the backend can build kernel bundles from SPIR-V.
    pub const fn supports_spirv(&self) -> bool {
        matches!(self, Self::OpenCl | Self::LevelZero)
    }
    /// The value passed across the C ABI.
    pub const fn to_raw(&self) -> i32 {
        match self {
            Self::Host => 0,
            Self::OpenCl => 1,
            Self::LevelZero => 2,
            Self::Cuda => 3,
        }
    }
}

impl FromStr for Backend {
    type Err = UnknownName;
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "host" => Ok(Self::Host),
            "opencl" => Ok(Self::OpenCl),
            "level_zero" => Ok(Self::LevelZero),
            "cuda" => Ok(Self::Cuda),
            _ => Err(UnknownName {
                kind: "backend",
                input: input.to_string(),
            }),
        }
    }
}

/// The kind of a device.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, derive_more::Display)]
pub enum DeviceType {
    #[display(fmt = "host")]
    Host,
    #[display(fmt = "cpu")]
    Cpu,
    #[display(fmt = "gpu")]
    Gpu,
    #[display(fmt = "acc")]
    Accelerator,
}

impl DeviceType {
    /// The value passed across the C ABI.
    pub const fn to_raw(&self) -> i32 {
        match self {
            Self::Host => 0,
            Self::Cpu => 1,
            Self::Gpu => 2,
            Self::Accelerator => 3,
        }
    }
}

impl FromStr for DeviceType {
    type Err = UnknownName;
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "host" => Ok(Self::Host),
            "cpu" => Ok(Self::Cpu),
            "gpu" => Ok(Self::Gpu),
            "acc" | "accelerator" => Ok(Self::Accelerator),
            _ => Err(UnknownName {
                kind: "device type",
                input: input.to_string(),
            }),
        }
    }
}

/// Device info.
#[derive(Clone, Debug)]
pub struct DeviceInfo {
    pub(crate) name: String,
    pub(crate) vendor: String,
    pub(crate) backend: Backend,
    pub(crate) device_type: DeviceType,
    pub(crate) address_bits: u32,
    pub(crate) supports_spirv: bool,
}

impl DeviceInfo {
    /// The device name reported by the runtime.
    pub fn name(&self) -> &str {
        &self.name
    }
    /// The vendor name reported by the runtime.
    pub fn vendor(&self) -> &str {
        &self.vendor
    }
    /// The backend.
    pub fn backend(&self) -> Backend {
        self.backend
    }
    /// The device type.
    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }
    /// The width of device pointers, 32 or 64.
    pub fn address_bits(&self) -> u32 {
        self.address_bits
    }
    /** Whether kernel bundles can be built from SPIR-V.

    For OpenCL this requires version 2.1 or the `cl_khr_il_program` extension. */
    pub fn supports_spirv(&self) -> bool {
        self.supports_spirv
    }
}

static HOST_INFO: Lazy<DeviceInfo> = Lazy::new(|| DeviceInfo {
    name: "SYCL host device".to_string(),
    vendor: String::new(),
    backend: Backend::Host,
    device_type: DeviceType::Host,
    address_bits: usize::BITS,
    supports_spirv: false,
});

/** A device.

Devices can be cloned, which is cheap. Two devices compare equal if they refer to the
same enumerated runtime device.
*/
#[derive(Clone, Eq, PartialEq)]
pub struct Device {
    inner: DeviceInner,
}

impl Device {
    /// The host.
    pub const fn host() -> Self {
        Self {
            inner: DeviceInner::Host,
        }
    }
    /** The enumerated devices.

    Enumeration happens once per process. Devices not matching `SYCL_DEVICE_FILTER` are
    dropped. */
    pub fn list() -> &'static [Device] {
        static DEVICES: Lazy<Vec<Device>> = Lazy::new(enumerate);
        &DEVICES
    }
    /// Is the host.
    pub fn is_host(&self) -> bool {
        self.inner.is_host()
    }
    /// Device info.
    pub fn info(&self) -> &DeviceInfo {
        match self.inner() {
            DeviceInner::Host => &HOST_INFO,
            #[cfg(feature = "opencl")]
            DeviceInner::OpenCl(raw) => raw.info(),
        }
    }
    /// The backend, see [`DeviceInfo::backend`].
    pub fn backend(&self) -> Backend {
        self.info().backend
    }
    /// The device type, see [`DeviceInfo::device_type`].
    pub fn device_type(&self) -> DeviceType {
        self.info().device_type
    }
    pub(crate) fn inner(&self) -> &DeviceInner {
        &self.inner
    }
}

/// See [`Device::host()`].
impl Default for Device {
    fn default() -> Self {
        Self::host()
    }
}

/// Prints `Device(host:host)` for the host, otherwise `Device(backend:type@index)`.
impl Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

#[derive(Clone, Eq, PartialEq)]
pub(crate) enum DeviceInner {
    Host,
    #[cfg(feature = "opencl")]
    OpenCl(RawDevice),
}

impl DeviceInner {
    pub(crate) fn is_host(&self) -> bool {
        matches!(self, Self::Host)
    }
}

impl Debug for DeviceInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => write!(f, "Device(host:host)"),
            #[cfg(feature = "opencl")]
            Self::OpenCl(raw) => raw.fmt(f),
        }
    }
}

#[cfg(feature = "opencl")]
#[derive(Clone)]
pub(crate) struct RawDevice {
    engine: Arc<Engine>,
}

#[cfg(feature = "opencl")]
impl RawDevice {
    pub(crate) fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }
    fn info(&self) -> &DeviceInfo {
        self.engine.info()
    }
}

#[cfg(feature = "opencl")]
impl PartialEq for RawDevice {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.engine, &other.engine)
    }
}

#[cfg(feature = "opencl")]
impl Eq for RawDevice {}

#[cfg(feature = "opencl")]
impl Debug for RawDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let info = self.info();
        write!(
            f,
            "Device({}:{}@{})",
            info.backend,
            info.device_type,
            self.engine.index()
        )
    }
}

fn enumerate() -> Vec<Device> {
    let mut devices = Vec::new();
    #[cfg(feature = "opencl")]
    {
        match Engine::enumerate() {
            Ok(engines) => devices.extend(engines.into_iter().map(|engine| Device {
                inner: DeviceInner::OpenCl(RawDevice { engine }),
            })),
            Err(e) => log::debug!("OpenCL devices unavailable: {e:#}"),
        }
    }
    devices.push(Device::host());
    let devices = match std::env::var(DEVICE_FILTER_ENV) {
        Ok(filter) => match filter.parse::<DeviceSelector>() {
            Ok(selector) => selector.retain(devices),
            Err(e) => {
                log::warn!("Ignoring {DEVICE_FILTER_ENV}: {e}");
                devices
            }
        },
        Err(_) => devices,
    };
    log::debug!("devices: {devices:?}");
    devices
}
