use crate::proc::{self, myproc};
use crate::syscall::syscall::{argint, argaddr};
use crate::proc::either_copyout;

pub(crate) fn sys_exit() -> u64 {
    let status = argint(0);
    proc::exit(status)
}

pub(crate) fn sys_getpid() -> u64 {
    myproc().pid as u64
}

pub(crate) fn sys_fork() -> u64 {
    proc::fork() as u64
}

pub(crate) fn sys_wait() -> u64 {
    let addr = argaddr(0);
    let mut status: i32 = 0;
    let pid = proc::wait(&mut status);
    if pid >= 0 && addr != 0 {
        if either_copyout(
            false,
            addr as *mut u8,
            &status as *const i32 as *const u8,
            core::mem::size_of::<i32>(),
        ) < 0
        {
            return u64::MAX;
        }
    }
    pid as u64
}

pub(crate) fn sys_kill() -> u64 {
    let pid = argint(0);
    proc::kill(pid as u32) as u64
}

pub(crate) fn sys_setpriority() -> u64 {
    let pid = argint(0);
    let priority = argint(1);
    proc::setpriority(pid as u32, priority) as u64
}

pub(crate) fn sys_getpriority() -> u64 {
    let pid = argint(0);
    proc::getpriority(pid as u32) as u64
}

// There is no per-process heap to grow (Non-goals: no per-process address
// space), so sbrk has nothing to do. Kept as a syscall number because
// spec.md's table lists it; it always reports failure.
pub(crate) fn sys_sbrk() -> u64 {
    u64::MAX
}
