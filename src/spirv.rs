/*!

Inspection of SPIR-V binaries before they are handed to a runtime.

```
# use syclinterface::spirv::SpirvModule;
assert!(SpirvModule::parse(&[]).is_err());
```
*/

use rspirv::dr::Operand;
use spirv::{ExecutionModel, MAGIC_NUMBER};
use std::fmt::{self, Debug};

/// Errors.
pub mod error {
    /// The binary is not a SPIR-V module with kernels.
    #[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
    pub enum InvalidSpirv {
        #[error("SPIR-V binary is empty!")]
        Empty,
        #[error("SPIR-V binary length {len} is not a multiple of 4!")]
        Misaligned { len: usize },
        #[error("SPIR-V binary has magic number {found:#010x}, expected {expected:#010x}!")]
        MagicNumber { found: u32, expected: u32 },
        #[error("Failed to parse SPIR-V: {0}")]
        Parse(String),
        #[error("SPIR-V module has no kernel entry points!")]
        NoKernels,
    }
}
use error::*;

/// A kernel entry point.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SpirvKernel {
    name: String,
    num_args: usize,
}

impl SpirvKernel {
    /// The entry point name.
    pub fn name(&self) -> &str {
        &self.name
    }
    /// The number of function parameters.
    pub fn num_args(&self) -> usize {
        self.num_args
    }
}

/// A parsed SPIR-V module, reduced to what bundles need.
#[derive(Clone, Eq, PartialEq)]
pub struct SpirvModule {
    version: (u8, u8),
    kernels: Vec<SpirvKernel>,
}

impl SpirvModule {
    /** Parses a little endian SPIR-V binary.

    **errors**
    - [`InvalidSpirv`](error::InvalidSpirv) if the binary is empty, misaligned, has the
    wrong magic number, fails to parse, or has no `Kernel` entry points. */
    pub fn parse(bytes: &[u8]) -> Result<Self, InvalidSpirv> {
        if bytes.is_empty() {
            return Err(InvalidSpirv::Empty);
        }
        if bytes.len() % 4 != 0 {
            return Err(InvalidSpirv::Misaligned { len: bytes.len() });
        }
        let magic = u32::from_le_bytes(bytemuck::pod_read_unaligned(&bytes[..4]));
        if magic != MAGIC_NUMBER {
            return Err(InvalidSpirv::MagicNumber {
                found: magic,
                expected: MAGIC_NUMBER,
            });
        }
        let module = rspirv::dr::load_bytes(bytes).map_err(|e| InvalidSpirv::Parse(e.to_string()))?;
        let version = module.header.as_ref().map_or((0, 0), |x| x.version());
        let mut kernels = Vec::with_capacity(module.entry_points.len());
        for inst in module.entry_points.iter() {
            if let [Operand::ExecutionModel(ExecutionModel::Kernel), Operand::IdRef(id), Operand::LiteralString(name), ..] =
                inst.operands.as_slice()
            {
                let num_args = module
                    .functions
                    .iter()
                    .find(|x| x.def_id() == Some(*id))
                    .map(|x| x.parameters.len())
                    .ok_or_else(|| {
                        InvalidSpirv::Parse(format!("entry point {name:?} has no function %{id}"))
                    })?;
                kernels.push(SpirvKernel {
                    name: name.clone(),
                    num_args,
                });
            }
        }
        if kernels.is_empty() {
            return Err(InvalidSpirv::NoKernels);
        }
        Ok(Self { version, kernels })
    }
    /// The SPIR-V version, `(major, minor)`.
    pub fn version(&self) -> (u8, u8) {
        self.version
    }
    /// The kernel entry points, in module order.
    pub fn kernels(&self) -> &[SpirvKernel] {
        &self.kernels
    }
    /// The kernel named `name`.
    pub fn kernel(&self, name: &str) -> Option<&SpirvKernel> {
        self.kernels.iter().find(|x| x.name == name)
    }
}

/// Prints `SpirvModule(1.0, ["add"(3), ..])`.
impl Debug for SpirvModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpirvModule({}.{}, [", self.version.0, self.version.1)?;
        for (i, kernel) in self.kernels.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:?}({})", kernel.name, kernel.num_args)?;
        }
        write!(f, "])")
    }
}
