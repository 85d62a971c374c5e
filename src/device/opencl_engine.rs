use super::{Backend, DeviceInfo, DeviceType};
use crate::queue::QueueProperties;
use anyhow::{format_err, Result};
use ocl::{
    core::{
        self, DeviceInfo as ClDeviceInfo, DeviceInfoResult, KernelInfo, KernelInfoResult,
        OpenclVersion, ProgramInfo, ProgramInfoResult,
    },
    flags::{CommandQueueProperties, DeviceType as ClDeviceType},
    Context as ClContext, Device as ClDevice, Platform, Program, Queue as ClQueue,
};
use std::sync::Arc;

/// A failure reported by the OpenCL runtime.
#[derive(Debug, thiserror::Error)]
#[error("OpenCL error {code}: {message}")]
pub(crate) struct ClError {
    pub(crate) code: i32,
    message: String,
}

impl From<ocl::Error> for ClError {
    fn from(e: ocl::Error) -> Self {
        Self {
            code: e.api_status().map_or(-1, |status| status as i32),
            message: e.to_string(),
        }
    }
}

impl From<core::Error> for ClError {
    fn from(e: core::Error) -> Self {
        ocl::Error::from(e).into()
    }
}

pub(crate) struct Engine {
    index: usize,
    platform: Platform,
    device: ClDevice,
    info: DeviceInfo,
}

impl Engine {
    pub(crate) fn enumerate() -> Result<Vec<Arc<Self>>> {
        let mut engines = Vec::new();
        for platform_id in core::get_platform_ids().map_err(ClError::from)? {
            let device_ids = match core::get_device_ids(platform_id, None, None) {
                Ok(device_ids) => device_ids,
                Err(e) => {
                    log::debug!("Skipping platform {platform_id:?}: {e}");
                    continue;
                }
            };
            let platform = Platform::new(platform_id);
            for device_id in device_ids {
                let device = ClDevice::from(device_id);
                match device_info(&device) {
                    Ok(info) => engines.push(Arc::new(Self {
                        index: engines.len(),
                        platform,
                        device,
                        info,
                    })),
                    Err(e) => log::debug!("Skipping device {device_id:?}: {e:#}"),
                }
            }
        }
        Ok(engines)
    }
    pub(crate) fn index(&self) -> usize {
        self.index
    }
    pub(crate) fn info(&self) -> &DeviceInfo {
        &self.info
    }
    pub(crate) fn create_context(&self) -> Result<ClContext> {
        let context = ClContext::builder()
            .platform(self.platform)
            .devices(self.device)
            .build()
            .map_err(ClError::from)?;
        Ok(context)
    }
    pub(crate) fn create_queue(
        &self,
        context: &ClContext,
        properties: QueueProperties,
    ) -> Result<(ClQueue, QueueProperties)> {
        let mut flags = CommandQueueProperties::empty();
        if properties.enable_profiling() {
            flags |= CommandQueueProperties::PROFILING_ENABLE;
        }
        if properties.in_order() {
            let queue = ClQueue::new(context, self.device, Some(flags)).map_err(ClError::from)?;
            return Ok((queue, properties));
        }
        let out_of_order = flags | CommandQueueProperties::OUT_OF_ORDER_EXEC_MODE_ENABLE;
        match ClQueue::new(context, self.device, Some(out_of_order)) {
            Ok(queue) => Ok((queue, properties)),
            Err(e) => {
                log::debug!(
                    "Out of order queue unsupported on {}, falling back to in order: {e}",
                    self.info.name
                );
                let queue =
                    ClQueue::new(context, self.device, Some(flags)).map_err(ClError::from)?;
                Ok((queue, properties.with_in_order(true)))
            }
        }
    }
    pub(crate) fn build_source(
        &self,
        context: &ClContext,
        source: &str,
        options: &str,
    ) -> Result<Program, String> {
        Program::builder()
            .src(source)
            .devices(self.device)
            .cmplr_opt(options)
            .build(context)
            .map_err(|e| e.to_string())
    }
    pub(crate) fn build_il(
        &self,
        context: &ClContext,
        il: &[u8],
        options: &str,
    ) -> Result<Program, String> {
        Program::builder()
            .il(il)
            .devices(self.device)
            .cmplr_opt(options)
            .build(context)
            .map_err(|e| e.to_string())
    }
}

pub(crate) fn kernel_names(program: &Program) -> Result<Vec<String>> {
    match program.info(ProgramInfo::KernelNames).map_err(ClError::from)? {
        ProgramInfoResult::KernelNames(names) => Ok(names
            .split(';')
            .map(str::trim)
            .filter(|x| !x.is_empty())
            .map(String::from)
            .collect()),
        result => Err(format_err!("Unexpected program info {result:?}!")),
    }
}

pub(crate) fn create_kernel(program: &Program, name: &str) -> Result<(core::Kernel, u32)> {
    let kernel = core::create_kernel(program.as_core(), name).map_err(ClError::from)?;
    match core::get_kernel_info(&kernel, KernelInfo::NumArgs).map_err(ClError::from)? {
        KernelInfoResult::NumArgs(num_args) => Ok((kernel, num_args)),
        result => Err(format_err!("Unexpected kernel info {result:?}!")),
    }
}

fn device_info(device: &ClDevice) -> Result<DeviceInfo> {
    let query = |kind| device.info(kind).map_err(ClError::from);
    let name = match query(ClDeviceInfo::Name)? {
        DeviceInfoResult::Name(name) => name.trim().to_string(),
        result => return Err(format_err!("Unexpected device info {result:?}!")),
    };
    let vendor = match query(ClDeviceInfo::Vendor)? {
        DeviceInfoResult::Vendor(vendor) => vendor.trim().to_string(),
        result => return Err(format_err!("Unexpected device info {result:?}!")),
    };
    let device_type = match query(ClDeviceInfo::Type)? {
        DeviceInfoResult::Type(ty) if ty.contains(ClDeviceType::GPU) => DeviceType::Gpu,
        DeviceInfoResult::Type(ty) if ty.contains(ClDeviceType::CPU) => DeviceType::Cpu,
        DeviceInfoResult::Type(_) => DeviceType::Accelerator,
        result => return Err(format_err!("Unexpected device info {result:?}!")),
    };
    let address_bits = match query(ClDeviceInfo::AddressBits)? {
        DeviceInfoResult::AddressBits(bits) => bits,
        result => return Err(format_err!("Unexpected device info {result:?}!")),
    };
    let il_version = matches!(
        query(ClDeviceInfo::Version)?,
        DeviceInfoResult::Version(version) if version >= OpenclVersion::new(2, 1)
    );
    let il_extension = matches!(
        query(ClDeviceInfo::Extensions)?,
        DeviceInfoResult::Extensions(extensions) if extensions.split_whitespace().any(|x| x == "cl_khr_il_program")
    );
    Ok(DeviceInfo {
        name,
        vendor,
        backend: Backend::OpenCl,
        device_type,
        address_bits,
        supports_spirv: il_version || il_extension,
    })
}
