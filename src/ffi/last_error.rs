use anyhow::{format_err, Result};
use std::{
    any::Any,
    cell::RefCell,
    ffi::{CStr, CString},
    os::raw::c_char,
    panic::{catch_unwind, AssertUnwindSafe},
    ptr::null_mut,
};

thread_local! {
    static LAST_ERROR: RefCell<Option<String>> = RefCell::new(None);
}

/// A required pointer argument was null.
#[derive(Clone, Copy, Debug, thiserror::Error)]
#[error("Argument `{0}` is null!")]
pub(crate) struct NullArgument(pub(crate) &'static str);

fn set_last_error(message: String) {
    LAST_ERROR.with(|x| x.borrow_mut().replace(message));
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/** Runs `f` at the C boundary.

Errors and panics are logged, stored as the last error, and replaced with `failure`. */
pub(crate) fn boundary<T>(name: &'static str, failure: T, f: impl FnOnce() -> Result<T>) -> T {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => value,
        Ok(Err(e)) => {
            log::warn!("{name}: {e:#}");
            set_last_error(format!("{name}: {e:#}"));
            failure
        }
        Err(payload) => {
            let message = panic_message(&*payload);
            log::warn!("{name} panicked: {message}");
            set_last_error(format!("{name} panicked: {message}"));
            failure
        }
    }
}

/// # Safety
/// `ptr` is null or a nul terminated string valid for `'a`.
pub(crate) unsafe fn c_str<'a>(ptr: *const c_char, arg: &'static str) -> Result<&'a str> {
    if ptr.is_null() {
        return Err(NullArgument(arg).into());
    }
    let c_str = unsafe { CStr::from_ptr(ptr) };
    c_str
        .to_str()
        .map_err(|e| format_err!("Argument `{arg}` is not valid UTF-8: {e}"))
}

/// Copies `s` into a string owned by the caller.
pub(crate) fn into_c_string(s: &str) -> Result<*mut c_char> {
    Ok(CString::new(s)?.into_raw())
}

/** Returns the message of the last error on this thread, or null.

The message is copied, release it with [`SyclCString_Delete`]. Successful calls do not
clear it. */
#[no_mangle]
pub extern "C" fn SyclError_GetLastMessage() -> *mut c_char {
    let message = LAST_ERROR.with(|x| x.borrow().clone());
    message.map_or(null_mut(), |message| {
        // Interior nul bytes would truncate the message.
        CString::new(message.replace('\0', " ")).map_or(null_mut(), CString::into_raw)
    })
}

/// Clears the last error on this thread.
#[no_mangle]
pub extern "C" fn SyclError_Clear() {
    LAST_ERROR.with(|x| x.borrow_mut().take());
}

/** Releases a string returned by the library.

# Safety
`s` is null or was returned by the library and not yet deleted. */
#[no_mangle]
pub unsafe extern "C" fn SyclCString_Delete(s: *mut c_char) {
    if !s.is_null() {
        drop(unsafe { CString::from_raw(s) });
    }
}

#[cfg(test)]
pub(crate) fn last_message() -> Option<String> {
    LAST_ERROR.with(|x| x.borrow().clone())
}

/// Runs `f` with a cleared last error, returning its value and the stored message.
#[cfg(test)]
pub(crate) fn with_last_error<T>(f: impl FnOnce() -> T) -> (T, String) {
    SyclError_Clear();
    let value = f();
    (value, last_message().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    #[test]
    fn boundary_stores_errors() {
        SyclError_Clear();
        assert!(SyclError_GetLastMessage().is_null());
        let value = boundary("Test_Fail", -1, || bail!("boom"));
        assert_eq!(value, -1);
        assert_eq!(last_message().unwrap(), "Test_Fail: boom");
        assert_eq!(boundary("Test_Ok", -1, || Ok(2)), 2);
        assert_eq!(last_message().unwrap(), "Test_Fail: boom");
        let message = SyclError_GetLastMessage();
        assert!(!message.is_null());
        unsafe {
            assert_eq!(CStr::from_ptr(message).to_str().unwrap(), "Test_Fail: boom");
            SyclCString_Delete(message);
        }
        SyclError_Clear();
        assert!(last_message().is_none());
    }

    #[test]
    fn boundary_catches_panics() {
        let value = boundary("Test_Panic", false, || panic!("oops"));
        assert!(!value);
        assert_eq!(last_message().unwrap(), "Test_Panic panicked: oops");
    }

    #[test]
    fn c_str_arguments() {
        unsafe {
            assert!(c_str(std::ptr::null(), "name").unwrap_err().is::<NullArgument>());
            assert_eq!(c_str(b"add\0".as_ptr().cast(), "name").unwrap(), "add");
            assert!(c_str(b"\xff\0".as_ptr().cast(), "name").is_err());
        }
        assert!(into_c_string("a\0b").is_err());
        let s = into_c_string("add").unwrap();
        unsafe { SyclCString_Delete(s) };
        unsafe { SyclCString_Delete(null_mut()) };
    }
}
