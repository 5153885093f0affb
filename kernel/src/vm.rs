use crate::kalloc::KMEM;
use crate::{MAKE_SATP, PA2PTE, PGROUNDDOWN, PTE2PA, PTE_FLAGS, PX, printf};
use crate::memlayout::{KERNBASE, PHYSTOP, PLIC, UART0, VIRTIO0};
use crate::proc::proc_mapstacks;
use crate::riscv::{MAXVA, PageTable, PGSIZE, Pte, PTE_R, PTE_V, PTE_W, PTE_X, sfence_vma, w_satp};
use crate::string::memset;

// This core has exactly one page table, ever: Non-goals rule out isolated
// per-process address spaces, so every process runs against the same
// direct-mapped kernel table. create_table()/map_range()/walk()/
// destroy_table() below are still general-purpose (and exercised directly
// by the tests in this module); activate() just never has more than one
// table to choose between in production.
pub static mut KERNEL_PAGETABLE: Option<&'static PageTable> = None;

extern {
    static etext: u8;  // kernel.ld sets this to end of kernel code.
}

// Allocate and zero a fresh, empty page table (spec.md 4.2's create_table).
pub fn create_table<'a>() -> Option<&'a mut PageTable> {
    unsafe {
        let pg: *mut PageTable = KMEM.kalloc();
        if pg.is_null() {
            return None;
        }
        memset(pg as *mut u8, 0, PGSIZE);
        pg.as_mut()
    }
}

// Map the mappings every page table shares: the device windows and the
// direct-mapped kernel text/data range. Since every process shares the one
// kernel table, a process never traps for touching kernel code or data -
// there is no separate user address space to switch away from.
pub(crate) fn map_kernel_mappings(pgtbl: &mut PageTable) {
    // uart registers
    kvmmap(pgtbl, UART0, UART0, PGSIZE, PTE_R | PTE_W);

    // virtio mmio disk interface
    kvmmap(pgtbl, VIRTIO0, VIRTIO0, PGSIZE, PTE_R | PTE_W);

    // PLIC
    kvmmap(pgtbl, PLIC, PLIC, 0x400000, PTE_R | PTE_W);

    let etext_addr = (unsafe { &etext } as *const u8).expose_addr();
    // map kernel text executable and read-only.
    kvmmap(pgtbl, KERNBASE, KERNBASE, etext_addr - KERNBASE, PTE_R | PTE_X);

    // map kernel data and the physical RAM we'll make use of.
    kvmmap(pgtbl, etext_addr, etext_addr, PHYSTOP - etext_addr, PTE_R | PTE_W);
}

// Make the direct-map page table for the kernel.
fn kvmmake<'a>() -> &'a PageTable {
    let kpgtbl = create_table().expect("failed to alloc for root page table");

    map_kernel_mappings(kpgtbl);

    // allocate and map a kernel stack for each process.
    proc_mapstacks(kpgtbl);

    kpgtbl
}

// Initialize the one KERNEL_PAGETABLE.
pub fn kvminit() {
    unsafe {
        KERNEL_PAGETABLE = Some(kvmmake());
    }
}

// add a mapping to the kernel page table.
// only used when booting.
// does not flush TLB or enable paging.
pub fn kvmmap(kpgtbl: &mut PageTable, va: usize, pa: usize, sz: usize, perm: usize)
{
    if map_range(kpgtbl, va, pa, sz, perm) != 0 {
        panic!("kvmmap");
    }
}

// Create PTEs for virtual addresses starting at va that refer to
// physical addresses starting at pa. va and size might not
// be page-aligned. Returns 0 on success, -1 if walk() couldn't
// allocate a needed page-table page (spec.md 4.2's map_range).
pub fn map_range(pagetable: &mut PageTable, va: usize, mut pa: usize, size: usize, perm: usize) -> i32 {
    if size == 0 {
        panic!("map_range: size");
    }

    let mut a: usize = PGROUNDDOWN!(va);
    let last: usize = PGROUNDDOWN!(va + size - 1);

    loop {
        let pte: Option<&mut Pte> = walk(pagetable, a, 1);
        if pte.is_none() {
            return -1;
        }

        let pte = pte.unwrap();
        if pte.0 & PTE_V != 0 {
            printf!("a: {:x}, Pte: {:x}\n", a, pte.0);
            panic!("map_range: remap");
        }

        (*pte) = Pte(PA2PTE!(pa) | perm | PTE_V);
        if a == last {
            break;
        }

        a += PGSIZE;
        pa += PGSIZE;
    }
    return 0;
}

// Return the address of the PTE in page table pagetable
// that corresponds to virtual address va.  If alloc!=0,
// create any required page-table pages (spec.md 4.2's walk).
//
// The risc-v Sv39 scheme has three levels of page-table
// pages. A page-table page contains 512 64-bit PTEs.
// A 64-bit virtual address is split into five fields:
//   39..63 -- must be zero.
//   30..38 -- 9 bits of level-2 index.
//   21..29 -- 9 bits of level-1 index.
//   12..20 -- 9 bits of level-0 index.
//    0..11 -- 12 bits of byte offset within the page.
pub(crate) fn walk(pagetable: &mut PageTable, va: usize, alloc: usize) -> Option<&mut Pte> {
    if va >= MAXVA {
        panic!("walk");
    }

    let mut curr_pgtbl = pagetable;
    for level in (1..3).rev() {
        let pte = &mut (curr_pgtbl.0)[PX!(level, va)];
        if pte.0 & PTE_V  == PTE_V {
            unsafe { curr_pgtbl = (PTE2PA!(pte.0) as *mut PageTable).as_mut().unwrap(); }
        } else {
            unsafe {
                if alloc == 0 {
                    return None;
                }

                let next_level_pgtbl: *mut PageTable = KMEM.kalloc();
                if next_level_pgtbl.is_null() {
                    return None;
                }

                memset(next_level_pgtbl as *mut u8, 0, PGSIZE);

                *pte = Pte(PA2PTE!(next_level_pgtbl.expose_addr()) | PTE_V);
                curr_pgtbl = next_level_pgtbl.as_mut().unwrap();
            }
        }
    }

    Some(&mut (curr_pgtbl.0)[PX!(0, va)])
}

// Recursively tear down a page table: frees every lower-level page-table
// page plus the physical frame behind each leaf mapping (spec.md 4.2's
// destroy_table). pagetable itself is freed last.
pub fn destroy_table(pagetable: &mut PageTable) {
    for pte in &mut pagetable.0 {
        if pte.0 & PTE_V == 0 {
            continue;
        }

        let child_pa = PTE2PA!(pte.0);
        if PTE_FLAGS!(pte.0) == PTE_V {
            // Points to a lower-level page table.
            let child = unsafe { (child_pa as *mut PageTable).as_mut().unwrap() };
            destroy_table(child);
        } else {
            // Leaf mapping: free the physical frame it maps.
            unsafe { KMEM.kfree(child_pa as *mut u8); }
        }
        *pte = Pte(0);
    }

    unsafe { KMEM.kfree(pagetable) };
}

// Switch the hart's satp to `root` and enable paging (spec.md 4.2's
// activate). Flushes the TLB on both sides of the switch.
pub fn activate(root: &PageTable) {
    sfence_vma();

    let addr = (root as *const PageTable).expose_addr();
    let satp = MAKE_SATP!(addr);
    w_satp(satp);

    sfence_vma();
}

// Switch this hart to the kernel's page table. Thin wrapper around
// activate() for the boot path, which only ever has the one table.
pub fn kvminithart() {
    activate(unsafe { KERNEL_PAGETABLE.unwrap() });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kalloc::KMem;
    use crate::riscv::{PTE_U};
    use core::sync::atomic::{AtomicBool, Ordering};

    // create_table()/walk() allocate through the one global KMEM, which on
    // a host build is only ever populated here: KMem::kinit() is gated to
    // target_arch="riscv64" and never runs under `cargo test`. Seed it once
    // from a host-backed arena so these tests can call the real allocator.
    #[repr(align(4096))]
    struct Arena([u8; PGSIZE * 64]);
    static mut ARENA: Arena = Arena([0; PGSIZE * 64]);
    static SEEDED: AtomicBool = AtomicBool::new(false);

    fn ensure_kmem_seeded() {
        if SEEDED.swap(true, Ordering::SeqCst) {
            return;
        }
        unsafe {
            let start = ARENA.0.as_mut_ptr();
            let end = start.add(PGSIZE * 64);
            KMem::test_seed(start, end);
        }
    }

    // Testable Property (spec.md 8): mapping a range then walking any page
    // inside it returns the same physical address and permission flags that
    // were mapped in.
    #[test]
    fn map_then_walk_round_trips_pa_and_flags() {
        ensure_kmem_seeded();
        let pagetable = create_table().expect("create_table");
        let va = 0x1000usize;
        let pa = 0x8000_0000usize;
        let perm = PTE_R | PTE_W;

        assert_eq!(map_range(pagetable, va, pa, PGSIZE, perm), 0);

        let pte = walk(pagetable, va, 0).expect("walk should find the mapping");
        assert_eq!(PTE2PA!(pte.0), pa);
        assert_eq!(pte.0 & PTE_V, PTE_V);
        assert_eq!(pte.0 & PTE_R, PTE_R);
        assert_eq!(pte.0 & PTE_W, PTE_W);
        assert_eq!(pte.0 & PTE_U, 0);

        destroy_table(pagetable);
    }

    #[test]
    #[should_panic(expected = "map_range: remap")]
    fn mapping_the_same_page_twice_panics() {
        ensure_kmem_seeded();
        let pagetable = create_table().expect("create_table");
        let va = 0x2000usize;
        map_range(pagetable, va, 0x8000_0000, PGSIZE, PTE_R);
        map_range(pagetable, va, 0x8000_1000, PGSIZE, PTE_R);
    }

    #[test]
    fn walk_without_alloc_does_not_create_pages() {
        ensure_kmem_seeded();
        let pagetable = create_table().expect("create_table");
        assert!(walk(pagetable, 0x3000, 0).is_none());
        destroy_table(pagetable);
    }
}
