use windows::Win32::Foundation::{CloseHandle, HANDLE};

/// Owned Win32 handle, closed exactly once when dropped.
///
/// Every handle the crate keeps (process, mutex, snapshot, thread) lives in
/// one of these so that early-error paths cannot leak it.
#[derive(Debug)]
pub struct OwnedHandle(HANDLE);

impl OwnedHandle {
    /// Wraps a raw handle; returns `None` for null or `INVALID_HANDLE_VALUE`.
    #[inline]
    pub fn new(raw: HANDLE) -> Option<Self> {
        if raw.is_invalid() {
            None
        } else {
            Some(Self(raw))
        }
    }

    #[inline]
    pub fn raw(&self) -> HANDLE {
        self.0
    }
}

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.0);
        }
    }
}
