use core::sync::atomic::{AtomicU32, Ordering};

use crate::file::File;
use crate::kalloc::KMEM;
use crate::KSTACK;
use crate::param::{AGING_BOOST, AGING_SWEEP_PERIOD, AGING_THRESHOLD, MAXPRIORITY, NCPU, NOFILE, NPROC};
use crate::proc::Procstate::{RUNNABLE, RUNNING, SLEEPING, UNUSED, USED, ZOMBIE};
use crate::riscv::{intr_on, PageTable, PGSIZE, PTE_R, PTE_W, r_tp};
use crate::spinlock::{pop_off, push_off, Spinlock};
use crate::string::safestrcpy;
use crate::vm::kvmmap;

extern "C" {
    // switch.S: swtch(old, new) saves the callee-saved registers of the
    // currently running context into *old and restores them from *new.
    fn swtch(old: *mut Context, new: *mut Context);
}

// Saved registers for kernel context switches.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct Context {
    ra: u64,
    sp: u64,

    // callee-saved
    s0: u64,
    s1: u64,
    s2: u64,
    s3: u64,
    s4: u64,
    s5: u64,
    s6: u64,
    s7: u64,
    s8: u64,
    s9: u64,
    s10: u64,
    s11: u64,
}

impl Context {
    pub(crate) const fn zeroed() -> Self {
        Context {
            ra: 0, sp: 0,
            s0: 0, s1: 0, s2: 0, s3: 0, s4: 0, s5: 0,
            s6: 0, s7: 0, s8: 0, s9: 0, s10: 0, s11: 0,
        }
    }
}

// Per-CPU state. One hart only (param::NCPU == 1 in this core), but the
// array/cpuid() shape is kept so a multi-hart port only needs to grow NCPU.
#[derive(Copy, Clone)]
pub struct Cpu {
    proc: Option<*mut Proc>,      // the process running on this cpu, or None.
    scheduler_ctx: Context,       // swtch() here to enter scheduler().
    pub noff: u8,                 // depth of push_off() nesting.
    pub intena: bool,             // were interrupts enabled before push_off()?
}

impl Cpu {
    const fn default() -> Self {
        Cpu {
            proc: None,
            scheduler_ctx: Context::zeroed(),
            noff: 0,
            intena: false,
        }
    }
}

static mut CPUS: [Cpu; NCPU] = [Cpu::default(); NCPU];
static mut PROCS: [Proc; NPROC] = [Proc::default(); NPROC];

// Index of the last process handed the CPU by the scheduler; the next scan
// starts one slot past this one, implementing the round-robin tie-break
// among equal-priority runnable processes (spec.md 4.9 / SPEC_FULL.md 11).
static mut LAST_SCHEDULED: usize = NPROC - 1;

static mut INIT_PROC: Option<*mut Proc> = None;

// Entry point signature every kernel-resident "program" exposes. There is no
// ELF image or isolated address space to load (see Non-goals); a process's
// code is just a Rust function compiled into the kernel, selected by name at
// create_process()/exec() time (exec.rs::PROGRAMS).
pub type EntryFn = fn();

// Register file saved on a process's own kernel stack at trap entry by
// kernelvec.S. There is no separate trapframe page and no trampoline: since
// every process runs in supervisor mode against the one shared kernel
// mapping, the trapframe is nothing more than the GPRs live at the moment of
// the trap, so it lives directly in the stack frame kernelvec.S builds.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct Trapframe {
    pub ra: u64,
    pub gp: u64,
    pub tp: u64,
    pub t0: u64,
    pub t1: u64,
    pub t2: u64,
    pub s0: u64,
    pub s1: u64,
    pub a0: u64,
    pub a1: u64,
    pub a2: u64,
    pub a3: u64,
    pub a4: u64,
    pub a5: u64,
    pub a6: u64,
    pub a7: u64,
    pub s2: u64,
    pub s3: u64,
    pub s4: u64,
    pub s5: u64,
    pub s6: u64,
    pub s7: u64,
    pub s8: u64,
    pub s9: u64,
    pub s10: u64,
    pub s11: u64,
    pub t3: u64,
    pub t4: u64,
    pub t5: u64,
    pub t6: u64,
}

impl Trapframe {
    const fn zeroed() -> Self {
        // SAFETY-free zero init: all-zero bit pattern is a valid Trapframe.
        unsafe { core::mem::zeroed() }
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Procstate { UNUSED, USED, SLEEPING, RUNNABLE, RUNNING, ZOMBIE }

// Per-process control block (spec.md 4.2/4.9). No `pagetable` field: every
// process runs against the single shared kernel page table (vm::KERNEL_PAGETABLE),
// so there is nothing per-process to map or free at exit beyond the kernel
// stack. No `cwd` field either — this core has no per-process current
// directory (fs::fs::namex always resolves against the root, spec.md 4.5).
#[derive(Copy, Clone)]
pub struct Proc {
    lock: Spinlock,

    // p.lock must be held when using these:
    state: Procstate,
    chan: Option<usize>,   // sleeping on this address, if Some and state == SLEEPING
    killed: u8,
    xstate: i32,           // exit status, valid once state == ZOMBIE
    pub pid: u32,

    priority: i32,         // higher is better (spec.md 4.2)
    wait_time: u32,        // ticks since last aging boost, reset on RUNNING/boost

    // parent is read under WAIT_LOCK, not p.lock (classic xv6 discipline:
    // avoids a lock-ordering cycle between a child's exit and its parent's wait).
    parent: Option<*mut Proc>,

    // private to the process; p.lock need not be held.
    kstack: usize,                       // virtual (== physical, direct map) base of the kernel stack
    trapframe: Option<*mut Trapframe>,    // live only while this process is mid-trap
    context: Context,                    // swtch() here to resume the process
    entry: Option<EntryFn>,               // what exec()/create_process() set this process to run
    ofile: [Option<*mut File<'static>>; NOFILE],
    name: [u8; 16],
}

unsafe impl Send for Proc {}
unsafe impl Sync for Proc {}

impl Proc {
    const fn default() -> Self {
        Proc {
            lock: Spinlock::init_lock("proc"),
            state: UNUSED,
            chan: None,
            killed: 0,
            xstate: 0,
            pid: 0,
            priority: 0,
            wait_time: 0,
            parent: None,
            kstack: 0,
            trapframe: None,
            context: Context::zeroed(),
            entry: None,
            ofile: [None; NOFILE],
            name: [0; 16],
        }
    }

    pub fn killed(&mut self) -> u8 {
        self.lock.acquire();
        let k = self.killed;
        self.lock.release();
        k
    }

    pub fn set_killed(&mut self) {
        self.lock.acquire();
        self.killed = 1;
        self.lock.release();
    }

    pub fn ofile_mut(&mut self) -> &mut [Option<*mut File<'static>>; NOFILE] {
        &mut self.ofile
    }

    // Point this process at the trapframe kernelvec.S just pushed onto its
    // kernel stack. Only valid for the duration of the trap that set it.
    pub fn set_trapframe(&mut self, tf: *mut Trapframe) {
        self.trapframe = Some(tf);
    }

    pub fn trapframe_mut(&mut self) -> &mut Trapframe {
        unsafe { &mut *self.trapframe.expect("trapframe_mut: no active trap") }
    }

    pub fn name_bytes(&self) -> &[u8; 16] {
        &self.name
    }
}

// Other modules' host tests (fs/fs.rs) exercise code that calls myproc()
// (ilock()/iput() by way of Sleeplock) without a scheduler ever having run.
// Point this hart's "current process" at a scratch slot so those calls
// don't panic with "no current process".
#[cfg(test)]
pub(crate) fn test_set_current_proc(pid: u32) {
    unsafe {
        PROCS[0].pid = pid;
        CPUS[0].proc = Some(&mut PROCS[0] as *mut Proc);
    }
}

static NEXT_PID: AtomicU32 = AtomicU32::new(1);
// Helps ensure that wakeups of wait()ing parents are not lost, and protects
// the parent/child links. Must be acquired before any p.lock.
static mut WAIT_LOCK: Spinlock = Spinlock::init_lock("wait_lock");

// Must be called with interrupts disabled, to prevent a race with the
// process being rescheduled to a different hart (a future multi-hart port).
pub fn cpuid() -> usize {
    r_tp() as usize
}

// Return this CPU's cpu struct. Interrupts must be disabled.
pub fn mycpu() -> *mut Cpu {
    unsafe { &mut CPUS[cpuid()] as *mut Cpu }
}

// Return the currently running process on this hart.
pub fn myproc() -> &'static mut Proc {
    push_off();
    let c = mycpu();
    let p = unsafe { (*c).proc };
    pop_off();
    unsafe { &mut *p.expect("myproc: no current process") }
}

fn allocpid() -> u32 {
    NEXT_PID.fetch_add(1, Ordering::Relaxed)
}

// Allocate a kernel stack (KSTACK! reserves 3 pages per slot: a guard page
// followed by 2 usable pages, see memlayout.rs) for each process slot, and
// map the 2 usable pages into the kernel page table. The guard page is
// deliberately left unmapped so a stack overflow page-faults instead of
// silently corrupting the next process's stack.
pub fn proc_mapstacks(kpgtbl: &mut PageTable) {
    for idx in 0..NPROC {
        unsafe {
            let va = KSTACK!(idx) + PGSIZE;
            for page in 0..2 {
                let pa: *mut u8 = KMEM.kalloc();
                if pa.is_null() {
                    panic!("kalloc");
                }
                kvmmap(kpgtbl, va + page * PGSIZE, pa.expose_addr(), PGSIZE, PTE_R | PTE_W);
            }
            PROCS[idx].kstack = va;
        }
    }
}

// initialize the proc table.
pub fn procinit() {
    // empty: PROCS/CPUS/WAIT_LOCK are already initialized as statics.
}

// Look in the process table for an UNUSED proc. If found, initialize state
// required to run in the kernel and return with p.lock held. Returns None
// if there are no free procs.
fn allocproc() -> Option<&'static mut Proc> {
    let mut found: Option<&'static mut Proc> = None;
    for i in 0..NPROC {
        let p = unsafe { &mut PROCS[i] };
        p.lock.acquire();
        if p.state == UNUSED {
            found = Some(p);
            break;
        }
        p.lock.release();
    }

    let p = found?;
    p.pid = allocpid();
    p.state = USED;
    p.priority = 0;
    p.wait_time = 0;
    p.killed = 0;
    p.xstate = 0;
    p.parent = None;
    p.trapframe = None;
    p.ofile = [None; NOFILE];
    Some(p)
}

// Free a process structure and the data hanging from it. p.lock must be held.
fn freeproc(p: &mut Proc) {
    p.trapframe = None;
    p.entry = None;
    p.pid = 0;
    p.parent = None;
    p.name = [0; 16];
    p.chan = None;
    p.killed = 0;
    p.xstate = 0;
    p.priority = 0;
    p.wait_time = 0;
    p.ofile = [None; NOFILE];
    p.state = UNUSED;
}

// Allocate a process, set it runnable, and arrange for it to begin executing
// `entry` the first time the scheduler picks it (spec.md 4.9,
// "create_process(entry, name, priority)"). Used both for brand new
// processes and, by exec.rs, to re-target an existing process at a new
// entry function ("warm re-exec", SPEC_FULL.md 12).
pub fn create_process(entry: EntryFn, name: &str, priority: i32) -> Option<u32> {
    let p = allocproc()?;
    p.priority = priority.clamp(crate::param::MINPRIORITY, MAXPRIORITY);
    p.entry = Some(entry);
    safestrcpy(p.name.as_mut_ptr(), name.as_ptr(), p.name.len().min(name.len() + 1));

    p.context = Context::zeroed();
    p.context.ra = proc_trampoline as u64;
    p.context.sp = (p.kstack + 2 * PGSIZE) as u64; // top of the 2 usable kstack pages

    let pid = p.pid;
    p.state = RUNNABLE;
    p.lock.release();
    Some(pid)
}

// Re-target the calling process at a new entry function, reusing its
// existing pid/priority/open files/kernel stack (exec.rs, SPEC_FULL.md 12).
// Never returns: the call frame that invoked this is discarded along with
// the rest of the process's prior execution state.
pub fn reexec(entry: EntryFn) -> ! {
    let p = myproc();
    p.lock.acquire();

    p.entry = Some(entry);
    p.context = Context::zeroed();
    p.context.ra = proc_trampoline as u64;
    p.context.sp = (p.kstack + 2 * PGSIZE) as u64;
    p.state = RUNNABLE;

    // Not sched(): sched() saves the *live* registers of this call into
    // p.context, which would clobber the reset values just set above. Jump
    // straight to the scheduler instead; p.lock.acquire() has already
    // disabled interrupts, matching sched()'s invariant.
    let c = mycpu();
    let mut discarded = Context::zeroed();
    unsafe { swtch(&mut discarded, &mut (*c).scheduler_ctx); }

    unreachable!("reexec: process resumed on its discarded stack")
}

// What a brand new process's context.ra points at: the very first thing
// that runs on its kernel stack once the scheduler swtch()es to it. Calls
// the process's entry function and, on return, exits with status 0 (the
// spec's "a trampoline that eventually calls entry() and, on return, invokes
// exit(0)" — note this is unrelated to the teacher's original trampoline.S /
// user-mode trampoline, which this core has no use for).
extern "C" fn proc_trampoline() -> ! {
    // Still holding p.lock from scheduler(); release before running
    // arbitrary process code.
    myproc().lock.release();
    intr_on();

    let entry = myproc().entry.expect("proc_trampoline: no entry");
    entry();
    exit(0);
}

// The process table scan shared by the scheduler's selection step and the
// aging sweep.
fn aging_sweep() {
    for i in 0..NPROC {
        let p = unsafe { &mut PROCS[i] };
        p.lock.acquire();
        if p.state == RUNNABLE {
            p.wait_time += 1;
            if p.wait_time >= AGING_THRESHOLD {
                p.priority = (p.priority + AGING_BOOST).min(MAXPRIORITY);
                p.wait_time = 0;
            }
        }
        p.lock.release();
    }
}

// Scan the table starting one past the last-selected slot and return the
// index of the RUNNABLE process with the strictly highest priority,
// breaking ties by rotation order (spec.md 4.9 point 3).
fn pick_next() -> Option<usize> {
    let start = unsafe { (LAST_SCHEDULED + 1) % NPROC };
    let mut best: Option<usize> = None;
    for off in 0..NPROC {
        let i = (start + off) % NPROC;
        let p = unsafe { &mut PROCS[i] };
        p.lock.acquire();
        let runnable = p.state == RUNNABLE;
        let prio = p.priority;
        p.lock.release();
        if runnable {
            match best {
                None => best = Some(i),
                Some(b) => {
                    let bp = unsafe { PROCS[b].priority };
                    if prio > bp {
                        best = Some(i);
                    }
                }
            }
        }
    }
    best
}

// Per-hart scheduler: never returns. Picks the highest-priority runnable
// process, round and round (spec.md 4.9).
pub fn scheduler() -> ! {
    let c = mycpu();
    unsafe { (*c).proc = None; }

    let mut loops: u32 = 0;
    loop {
        intr_on();

        loops = loops.wrapping_add(1);
        if loops % AGING_SWEEP_PERIOD == 0 {
            aging_sweep();
        }

        match pick_next() {
            Some(i) => {
                let p = unsafe { &mut PROCS[i] };
                p.lock.acquire();
                if p.state == RUNNABLE {
                    p.state = RUNNING;
                    p.wait_time = 0;
                    unsafe { (*c).proc = Some(p as *mut Proc); }
                    unsafe { LAST_SCHEDULED = i; }

                    unsafe { swtch(&mut (*c).scheduler_ctx, &mut p.context); }

                    // Process is done running for now (yielded, slept, or
                    // exited). It's responsible for its own state transition.
                    unsafe { (*c).proc = None; }
                }
                p.lock.release();
            }
            None => {
                // nothing runnable; idle with interrupts on until a timer
                // or wakeup makes something runnable.
            }
        }
    }
}

// Switch to the scheduler. Must hold only p.lock and have changed
// proc->state. Saves and restores intena because intena is a property of
// this kernel thread, not this CPU, and it should persist through swtch().
fn sched() {
    let p = myproc();
    if !p.lock.holding() {
        panic!("sched p->lock");
    }
    let c = mycpu();
    unsafe {
        if (*c).noff != 1 {
            panic!("sched locks");
        }
    }
    if p.state == RUNNING {
        panic!("sched running");
    }
    if crate::riscv::intr_get() {
        panic!("sched interruptible");
    }

    let intena = unsafe { (*c).intena };
    unsafe { swtch(&mut p.context, &mut (*c).scheduler_ctx); }
    unsafe { (*c).intena = intena; }
}

// Give up the CPU for one scheduling round (spec.md 4.9, "yield/sched").
pub fn yield_() {
    let p = myproc();
    p.lock.acquire();
    p.state = RUNNABLE;
    p.wait_time = 0;
    sched();
    p.lock.release();
}

// Atomically release lk and sleep on chan. Reacquires lk before returning,
// so callers can safely pattern `while !cond { sleep(chan, &mut lk) }`
// (spec.md 4.9/C9) without losing a wakeup delivered between the condition
// check and the sleep.
pub fn sleep<T>(chan: *const T, lk: &mut Spinlock) {
    let p = myproc();

    // Must acquire p.lock in order to change p.state and then call sched.
    // Once we hold p.lock we can be guaranteed that we won't miss any
    // wakeup (wakeup locks p.lock), so it's okay to release lk.
    if !core::ptr::eq(lk as *const Spinlock, &p.lock as *const Spinlock) {
        p.lock.acquire();
        lk.release();
    }

    p.chan = Some(chan as usize);
    p.state = SLEEPING;

    sched();

    p.chan = None;

    if !core::ptr::eq(lk as *const Spinlock, &p.lock as *const Spinlock) {
        p.lock.release();
        lk.acquire();
    }
}

// Wake every process sleeping on chan (spec.md 4.9/C9). Must be called
// without holding any p.lock.
pub fn wakeup<T>(chan: *const T) {
    let target = chan as usize;
    for i in 0..NPROC {
        let p = unsafe { &mut PROCS[i] };
        if p as *const Proc != myproc() as *const Proc {
            p.lock.acquire();
            if p.state == SLEEPING && p.chan == Some(target) {
                p.state = RUNNABLE;
                p.wait_time = 0;
            }
            p.lock.release();
        }
    }
}

// Set the killed flag on pid and, if it is sleeping, wake it so it can
// observe the flag at its next safe point (spec.md 4.9).
pub fn kill(pid: u32) -> i32 {
    for i in 0..NPROC {
        let p = unsafe { &mut PROCS[i] };
        p.lock.acquire();
        if p.pid == pid && p.state != UNUSED {
            p.killed = 1;
            if p.state == SLEEPING {
                p.state = RUNNABLE;
                p.wait_time = 0;
            }
            p.lock.release();
            return 0;
        }
        p.lock.release();
    }
    -1
}

pub fn setpriority(pid: u32, priority: i32) -> i32 {
    let priority = priority.clamp(crate::param::MINPRIORITY, MAXPRIORITY);
    for i in 0..NPROC {
        let p = unsafe { &mut PROCS[i] };
        p.lock.acquire();
        if p.pid == pid && p.state != UNUSED {
            p.priority = priority;
            p.lock.release();
            return 0;
        }
        p.lock.release();
    }
    -1
}

pub fn getpriority(pid: u32) -> i32 {
    for i in 0..NPROC {
        let p = unsafe { &mut PROCS[i] };
        p.lock.acquire();
        if p.pid == pid && p.state != UNUSED {
            let prio = p.priority;
            p.lock.release();
            return prio;
        }
        p.lock.release();
    }
    -1
}

// Create a new process, copying the running process's kernel stack and
// trapframe so the child resumes exactly where the parent called fork()
// (SPEC_FULL.md 12: there is no per-process address space to copy-on-write,
// so "eager copy" means duplicating the only per-process state that exists —
// the live kernel stack and the saved register file — rather than a page
// table). Returns the child's pid to the parent, 0 is returned to the child
// via its copied trapframe's a0, -1 on failure.
pub fn fork() -> i32 {
    let p = myproc();

    let np = match allocproc() {
        Some(np) => np,
        None => return -1,
    };

    // Copy the live kernel stack bytes. Both stacks are the same fixed size
    // (2 usable KSTACK! pages), so a byte-for-byte copy needs no
    // relocation of saved frame-pointer chains: identical offsets from the
    // top of the stack mean identical offsets from kstack/kstack+2*PGSIZE.
    unsafe {
        let src = p.kstack as *const u8;
        let dst = np.kstack as *mut u8;
        crate::string::memmove(dst, src, 2 * PGSIZE);
    }

    // Adjust the copied callee-saved context by the constant offset between
    // the two stacks so the child's saved sp/s0 (frame pointer) point into
    // its own copy rather than the parent's.
    let delta = np.kstack as i64 - p.kstack as i64;
    np.context = p.context;
    np.context.sp = (np.context.sp as i64 + delta) as u64;
    np.context.s0 = (np.context.s0 as i64 + delta) as u64;

    // Duplicate the trapframe (by value; it does not live on the stack) and
    // arrange for the child to see a 0 return value from fork().
    if let Some(tf) = p.trapframe {
        let mut child_tf = unsafe { *tf };
        child_tf.a0 = 0;
        let child_tf_storage: *mut Trapframe = unsafe { KMEM.kalloc() };
        unsafe { *child_tf_storage = child_tf; }
        np.trapframe = Some(child_tf_storage);
    }

    np.entry = p.entry;
    np.priority = p.priority;
    safestrcpy(np.name.as_mut_ptr(), p.name.as_ptr(), np.name.len());

    for (i, of) in p.ofile.iter().enumerate() {
        if let Some(f) = of {
            crate::file::file::filedup(*f as *mut File);
            np.ofile[i] = Some(*f);
        }
    }

    let pid = np.pid;

    unsafe {
        WAIT_LOCK.acquire();
        np.parent = Some(p as *mut Proc);
        WAIT_LOCK.release();
    }

    np.state = RUNNABLE;
    np.lock.release();

    pid as i32
}

// Pass p's abandoned children to init (classic xv6 reparenting). WAIT_LOCK
// must be held.
unsafe fn reparent(p: &mut Proc) {
    for i in 0..NPROC {
        let pp = &mut PROCS[i];
        if pp.parent == Some(p as *mut Proc) {
            pp.parent = INIT_PROC;
            wakeup(INIT_PROC.unwrap() as *const Proc);
        }
    }
}

// Exit the current process. Does not return (spec.md 4.9).
pub fn exit(status: i32) -> ! {
    let p = myproc();

    if core::ptr::eq(p as *const Proc, unsafe { INIT_PROC.unwrap() as *const Proc }) {
        panic!("init exiting");
    }

    for of in p.ofile.iter_mut() {
        if let Some(f) = of.take() {
            crate::file::file::fileclose(unsafe { &mut *f });
        }
    }

    unsafe {
        WAIT_LOCK.acquire();
        reparent(p);

        let parent = p.parent;
        WAIT_LOCK.release();

        if let Some(parent) = parent {
            wakeup(parent as *const Proc);
        }

        p.lock.acquire();
        p.xstate = status;
        p.state = ZOMBIE;
        WAIT_LOCK.release();
    }

    sched();
    unreachable!("zombie exited");
}

// Wait for a child to exit; return its pid and copy its exit status into
// *status, or -1 if the caller has no children (spec.md 4.9).
pub fn wait(status: &mut i32) -> i32 {
    let p = myproc();

    unsafe { WAIT_LOCK.acquire(); }
    loop {
        let mut have_children = false;
        for i in 0..NPROC {
            let np = unsafe { &mut PROCS[i] };
            if np.parent == Some(p as *mut Proc) {
                have_children = true;
                np.lock.acquire();
                if np.state == ZOMBIE {
                    let pid = np.pid;
                    *status = np.xstate;
                    freeproc(np);
                    np.lock.release();
                    unsafe { WAIT_LOCK.release(); }
                    return pid as i32;
                }
                np.lock.release();
            }
        }

        if !have_children || p.killed() != 0 {
            unsafe { WAIT_LOCK.release(); }
            return -1;
        }

        sleep(p as *const Proc, unsafe { &mut WAIT_LOCK });
    }
}

// Copy data between kernel memory and a syscall-argument address. There is
// no separate user address space in this core (Non-goals), so "user" and
// "kernel" addresses are the same shared, identity-mapped kernel memory;
// is_user only exists to keep the call sites symmetric with a teaching
// kernel that did have one.
pub fn either_copyout(_is_user_dst: bool, dst: *mut u8, src: *const u8, len: usize) -> i32 {
    if dst.is_null() {
        return -1;
    }
    unsafe { crate::string::memmove(dst, src, len); }
    0
}

pub fn either_copyin(dst: *mut u8, _is_user_src: bool, src: *const u8, len: usize) -> i32 {
    if src.is_null() {
        return -1;
    }
    unsafe { crate::string::memmove(dst, src, len); }
    0
}

// Print a process listing (invoked from the console's 'P' control
// character, consoleintr).
pub fn procdump() {
    crate::printf!("\n");
    for i in 0..NPROC {
        let p = unsafe { &PROCS[i] };
        if p.state == UNUSED {
            continue;
        }
        let state = match p.state {
            UNUSED => "unused",
            USED => "used",
            SLEEPING => "sleep ",
            RUNNABLE => "runble",
            RUNNING => "run   ",
            ZOMBIE => "zombie",
        };
        let name_len = p.name.iter().position(|&c| c == 0).unwrap_or(p.name.len());
        let name = core::str::from_utf8(&p.name[..name_len]).unwrap_or("?");
        crate::printf!("{} {} {} (priority {})\n", p.pid, state, name, p.priority);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pick_next_prefers_strictly_higher_priority() {
        unsafe {
            for i in 0..NPROC {
                PROCS[i] = Proc::default();
            }
            PROCS[0].state = RUNNABLE;
            PROCS[0].priority = 2;
            PROCS[1].state = RUNNABLE;
            PROCS[1].priority = 8;
            PROCS[2].state = RUNNABLE;
            PROCS[2].priority = 5;
            LAST_SCHEDULED = NPROC - 1;
        }
        assert_eq!(pick_next(), Some(1));
    }

    #[test]
    fn pick_next_breaks_ties_by_rotation() {
        unsafe {
            for i in 0..NPROC {
                PROCS[i] = Proc::default();
            }
            PROCS[0].state = RUNNABLE;
            PROCS[0].priority = 5;
            PROCS[2].state = RUNNABLE;
            PROCS[2].priority = 5;
            LAST_SCHEDULED = 0;
        }
        // scan starts at slot 1: slot 2 is hit before slot 0 wraps around.
        assert_eq!(pick_next(), Some(2));
    }

    #[test]
    fn aging_sweep_boosts_starved_runnable_process() {
        unsafe {
            for i in 0..NPROC {
                PROCS[i] = Proc::default();
            }
            PROCS[0].state = RUNNABLE;
            PROCS[0].priority = 0;
            PROCS[0].wait_time = AGING_THRESHOLD - 1;
        }
        aging_sweep();
        unsafe {
            assert_eq!(PROCS[0].priority, AGING_BOOST);
            assert_eq!(PROCS[0].wait_time, 0);
        }
    }

    #[test]
    fn aging_sweep_clamps_to_maxpriority() {
        unsafe {
            for i in 0..NPROC {
                PROCS[i] = Proc::default();
            }
            PROCS[0].state = RUNNABLE;
            PROCS[0].priority = MAXPRIORITY;
            PROCS[0].wait_time = AGING_THRESHOLD;
        }
        aging_sweep();
        unsafe {
            assert_eq!(PROCS[0].priority, MAXPRIORITY);
        }
    }
}
