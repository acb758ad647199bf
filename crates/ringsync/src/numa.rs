//! Best-effort NUMA placement of slot storage.
//!
//! With the `numa` feature on Linux, the freshly allocated (and not yet
//! touched) slot array is bound to the requested node with `mbind`, so its
//! pages fault in on that node. Everywhere else placement is left to the
//! allocator. A failed bind never fails ring creation.

#[cfg(all(feature = "numa", target_os = "linux"))]
mod imp {
    use std::io;

    const MPOL_PREFERRED: libc::c_long = 1;

    pub(crate) fn page_align() -> usize {
        static PAGE_SIZE: std::sync::OnceLock<usize> = std::sync::OnceLock::new();
        *PAGE_SIZE.get_or_init(|| {
            // SAFETY: sysconf has no preconditions.
            let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
            if size > 0 {
                size as usize
            } else {
                4096
            }
        })
    }

    pub(crate) fn bind(addr: *mut libc::c_void, len: usize, socket: u32) {
        if socket as usize >= libc::c_ulong::BITS as usize {
            tracing::warn!(socket, "NUMA socket out of range for node mask; not binding");
            return;
        }
        let nodemask: libc::c_ulong = 1 << socket;
        let maxnode = libc::c_ulong::BITS as libc::c_ulong + 1;

        // SAFETY: addr/len describe a page-aligned allocation we own;
        // nodemask outlives the call.
        let rc = unsafe {
            libc::syscall(
                libc::SYS_mbind,
                addr,
                len as libc::c_ulong,
                MPOL_PREFERRED,
                &nodemask as *const libc::c_ulong,
                maxnode,
                0 as libc::c_uint,
            )
        };
        if rc != 0 {
            tracing::warn!(
                socket,
                len,
                error = %io::Error::last_os_error(),
                "mbind failed; slot storage left on the default node"
            );
        } else {
            tracing::debug!(socket, len, "slot storage bound to NUMA node");
        }
    }
}

#[cfg(not(all(feature = "numa", target_os = "linux")))]
mod imp {
    pub(crate) fn page_align() -> usize {
        1
    }

    pub(crate) fn bind(_addr: *mut u8, len: usize, socket: u32) {
        tracing::trace!(socket, len, "NUMA placement unavailable; using default allocator");
    }
}

pub(crate) use imp::{bind, page_align};
