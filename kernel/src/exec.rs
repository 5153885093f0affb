// exec() — SPEC_FULL.md 12.
//
// spec.md lists exec in the syscall numbering but scopes real ELF loading
// into an isolated address space out (Non-goals). Since every process
// already runs against the one shared kernel page table, there is nothing
// address-space-shaped for exec to build; what it does instead is a "warm
// re-exec": look `name` up in a small compile-time table of kernel-entry
// functions and restart the calling process's kernel stack at that entry,
// exactly as create_process() sets up a brand new process's context. The
// pid, priority, and open-file table survive; everything else about the
// process's prior execution state is discarded.

use crate::proc::EntryFn;

// The kernel-resident "programs" a path can name. A real system would read
// argv[0] or a path off disk and load an ELF image; this one resolves
// straight to a function pointer compiled into the kernel.
const PROGRAMS: &[(&str, EntryFn)] = &[("init", init_main)];

fn lookup(name: &str) -> Option<EntryFn> {
    PROGRAMS.iter().find(|(n, _)| *n == name).map(|(_, f)| *f)
}

// sys_exec's entry point (syscall::sysfile::sys_exec). Returns -1 if `name`
// doesn't match any entry in PROGRAMS; otherwise never returns to the
// caller — the calling process's kernel stack is about to be reused for
// the new entry function, so there is no "after exec" for this call frame
// to resume (see proc::reexec).
pub fn exec(name: &str) -> i32 {
    match lookup(name) {
        Some(entry) => crate::proc::reexec(entry),
        None => -1,
    }
}

// main.rs's boot sequence spawns the very first process pointed at this
// entry directly, without going through PROGRAMS/exec (there is no
// process calling exec() yet at boot time).
pub(crate) fn init_entry() -> crate::proc::EntryFn {
    init_main
}

// The first process (SPEC_FULL.md 11, "init process" reparenting target):
// reaps orphaned zombies forever. A future shell/program table would open
// the console on fd 0-2 here before looping; this core's spec doesn't
// require that, so init stays minimal.
fn init_main() {
    let mut status = 0;
    loop {
        crate::proc::wait(&mut status);
    }
}
