//! Virtual-memory plumbing behind [`OwnedRegion`](crate::OwnedRegion).
//!
//! Owned regions get their bytes straight from the operating system, one
//! page-aligned mapping per region, and hand them back on drop. Everything
//! platform-dependant lives behind [`PlatformMemory`] so the rest of the
//! crate never mentions a syscall.

use std::{ptr::NonNull, sync::OnceLock};

/// The memory operations a platform has to provide.
pub(crate) trait PlatformMemory {
    /// Maps `len` bytes of zero-initialized read-write memory, or `None` if
    /// the kernel refuses.
    unsafe fn request_memory(len: usize) -> Option<NonNull<u8>>;

    /// Returns a mapping of `len` bytes starting at `addr` to the kernel.
    unsafe fn return_memory(addr: *mut u8, len: usize);

    /// Virtual-memory page size in bytes.
    unsafe fn page_size() -> usize;
}

/// Marker type carrying the current platform's [`PlatformMemory`] impl.
pub(crate) struct Os;

/// Page size of the running system, queried once and cached.
pub(crate) fn page_size() -> usize {
    static PAGE_SIZE: OnceLock<usize> = OnceLock::new();
    *PAGE_SIZE.get_or_init(|| unsafe { Os::page_size() })
}

pub(crate) unsafe fn request_memory(len: usize) -> Option<NonNull<u8>> {
    unsafe { Os::request_memory(len) }
}

pub(crate) unsafe fn return_memory(addr: *mut u8, len: usize) {
    unsafe { Os::return_memory(addr, len) }
}

#[cfg(unix)]
mod unix {
    use std::ptr::{self, NonNull};

    use libc::size_t;

    use super::{Os, PlatformMemory};

    impl PlatformMemory for Os {
        unsafe fn request_memory(len: usize) -> Option<NonNull<u8>> {
            // Anonymous private mapping; the kernel picks the address.
            let prot = libc::PROT_READ | libc::PROT_WRITE;
            let flags = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;

            unsafe {
                let addr = libc::mmap(ptr::null_mut(), len as size_t, prot, flags, -1, 0);

                if addr == libc::MAP_FAILED {
                    None
                } else {
                    Some(NonNull::new_unchecked(addr.cast::<u8>()))
                }
            }
        }

        unsafe fn return_memory(addr: *mut u8, len: usize) {
            unsafe {
                libc::munmap(addr.cast(), len as size_t);
            }
        }

        unsafe fn page_size() -> usize {
            unsafe { libc::sysconf(libc::_SC_PAGE_SIZE) as usize }
        }
    }
}

#[cfg(windows)]
mod windows {
    use std::{mem::MaybeUninit, os::raw::c_void, ptr::NonNull};

    use windows::Win32::System::{Memory, SystemInformation};

    use super::{Os, PlatformMemory};

    impl PlatformMemory for Os {
        unsafe fn request_memory(len: usize) -> Option<NonNull<u8>> {
            let flags = Memory::MEM_RESERVE | Memory::MEM_COMMIT;

            unsafe {
                let addr = Memory::VirtualAlloc(None, len, flags, Memory::PAGE_READWRITE);

                NonNull::new(addr.cast())
            }
        }

        unsafe fn return_memory(addr: *mut u8, _len: usize) {
            unsafe {
                let _ = Memory::VirtualFree(addr as *mut c_void, 0, Memory::MEM_RELEASE);
            }
        }

        unsafe fn page_size() -> usize {
            unsafe {
                let mut system_info = MaybeUninit::uninit();
                SystemInformation::GetSystemInfo(system_info.as_mut_ptr());

                system_info.assume_init().dwPageSize as usize
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_is_a_nonzero_power_of_two() {
        let page = page_size();
        assert!(page > 0);
        assert!(page.is_power_of_two());
    }

    #[test]
    fn request_and_return_round_trip() {
        let len = page_size();

        unsafe {
            let addr = request_memory(len).expect("kernel refused a single page");

            // Mapped memory must be writable and page-aligned.
            assert_eq!(addr.as_ptr() as usize % len, 0);
            addr.as_ptr().write(0xA5);
            assert_eq!(addr.as_ptr().read(), 0xA5);

            return_memory(addr.as_ptr(), len);
        }
    }
}
