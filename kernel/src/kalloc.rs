use core::ptr;

use crate::memlayout::PHYSTOP;
use crate::riscv::PGSIZE;
use crate::spinlock::Spinlock;
use crate::string::memset;
use crate::PGROUNDUP;

extern "C" {
    // first address after kernel.
    // defined by kernel.ld.
    static mut end: u8;
}

struct Run {
    next: *mut Run,
}

pub struct KMem {
    lock: Spinlock,
    freelist: *mut Run,
}

pub static mut KMEM: KMem = KMem::create();

impl KMem {
    const fn create() -> Self {
        Self {
            lock: Spinlock::init_lock("kmem"),
            freelist: ptr::null_mut(),
        }
    }
    #[cfg(target_arch = "riscv64")]
    pub fn kinit() {
        unsafe {
            KMEM.freerange((&mut end) as *mut u8, PHYSTOP as *mut u8);
        }
    }

    fn freerange<T: Sized>(self: &mut Self, pa_start: *mut T, pa_end: *mut T) {
        let mut p = PGROUNDUP!(pa_start);
        while p + PGSIZE <= pa_end as usize {
            self.kfree(p as *mut T);
            p += PGSIZE;
        }
    }

    /// Free the page of physical memory pointed at by pa,
    /// which normally should have been returned by a
    /// call to kalloc().  (The exception is when
    /// initializing the allocator; see kinit above.)
    pub fn kfree<T: Sized>(self: &mut Self, pa: *mut T) {
        let pa_usize = pa as usize;
        if pa_usize % PGSIZE != 0 {
            panic!("kfree: unaligned");
        }
        #[cfg(target_arch = "riscv64")]
        unsafe {
            if pa_usize < ((&end) as *const u8) as usize || pa_usize >= PHYSTOP {
                panic!("kfree: out of range");
            }
        }

        // Fill with junk to catch dangling refs.
        memset(pa as *mut u8, 1, PGSIZE);

        let r = pa as *mut Run;

        self.lock.acquire();
        unsafe {
            (*r).next = self.freelist;
        }
        self.freelist = r;
        self.lock.release();
    }

    /// Allocate one 4096-byte page of physical memory.
    /// Returns a pointer that the kernel can use.
    /// Returns 0 if the memory cannot be allocated.
    pub fn kalloc<T: Sized>(self: &mut Self) -> *mut T {
        self.lock.acquire();
        let r = self.freelist;
        if !r.is_null() {
            unsafe {
                self.freelist = (*r).next;
            }
        }
        self.lock.release();

        if !r.is_null() {
            memset(r as *mut u8, 5, PGSIZE); // fill with junk
        }
        r as *mut T
    }

    // Seed the global allocator with a host-backed arena so modules other
    // than kalloc itself (vm's page-table tests) can exercise real
    // kalloc()/kfree() without a target_arch="riscv64" kinit().
    #[cfg(test)]
    pub(crate) fn test_seed(pa_start: *mut u8, pa_end: *mut u8) {
        unsafe { KMEM.freerange(pa_start, pa_end) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(align(4096))]
    struct Arena([u8; PGSIZE * 4]);

    #[test]
    fn kalloc_reuses_freed_pages() {
        let mut arena = Arena([0; PGSIZE * 4]);
        let start = arena.0.as_mut_ptr();
        let end = unsafe { start.add(PGSIZE * 4) };
        let mut kmem = KMem::create();
        kmem.freerange(start, end);

        let a = kmem.kalloc::<u8>();
        let b = kmem.kalloc::<u8>();
        assert!(!a.is_null());
        assert!(!b.is_null());
        assert_ne!(a, b);

        kmem.kfree(a);
        let c = kmem.kalloc::<u8>();
        assert_eq!(a, c, "freed page should be handed back out (LIFO free list)");
    }

    #[test]
    fn kalloc_exhausts_to_null() {
        let mut arena = Arena([0; PGSIZE * 2]);
        let start = arena.0.as_mut_ptr();
        let end = unsafe { start.add(PGSIZE * 2) };
        let mut kmem = KMem::create();
        kmem.freerange(start, end);

        assert!(!kmem.kalloc::<u8>().is_null());
        assert!(!kmem.kalloc::<u8>().is_null());
        assert!(kmem.kalloc::<u8>().is_null());
    }
}
