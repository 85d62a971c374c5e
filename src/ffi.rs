/*!

The C ABI.

Every object crosses the boundary as an opaque, typed handle (`SyclDeviceRef`,
`SyclQueueRef`, ...) that owns a boxed Rust value. Handles are created by `*_Create*`,
`*_Copy` and `*_Get*` functions and released with the matching `*_Delete`, which
accepts null. Each handle is independent: deleting a queue does not invalidate a context
obtained from it.

Nothing unwinds across the boundary. Failures return null, `false` or `-1`, and the
error message is kept per thread, see [`SyclError_GetLastMessage`].

Strings returned by the library are owned by the caller and released with
[`SyclCString_Delete`].
*/
#![allow(non_snake_case)]

mod device;
mod handle;
mod kernel_bundle;
mod last_error;
mod queue;

pub use device::*;
pub use handle::*;
pub use kernel_bundle::*;
pub use last_error::{SyclCString_Delete, SyclError_Clear, SyclError_GetLastMessage};
pub use queue::*;
