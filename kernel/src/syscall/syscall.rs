use core::mem;

use crate::printf;
use crate::proc::{either_copyin, myproc};
use crate::syscall::sysfile::{
    sys_close, sys_exec, sys_mkdir, sys_open, sys_read, sys_unlink, sys_write,
};
use crate::syscall::sysproc::{
    sys_exit, sys_fork, sys_getpid, sys_getpriority, sys_kill, sys_sbrk, sys_setpriority, sys_wait,
};
use crate::syscall::{
    SYS_CLOSE, SYS_EXEC, SYS_EXIT, SYS_FORK, SYS_GETPID, SYS_GETPRIORITY, SYS_KILL, SYS_MKDIR,
    SYS_OPEN, SYS_READ, SYS_SBRK, SYS_SETPRIORITY, SYS_UNLINK, SYS_WAIT, SYS_WRITE,
};

// Retrieve an argument as a pointer. Doesn't check for legality; callers
// that dereference it go through either_copyin/either_copyout, which do.
pub(super) fn argaddr(n: u8) -> usize {
    argraw(n) as usize
}

// Fetch the nth 32-bit system call argument.
pub(super) fn argint(n: u8) -> i32 {
    argraw(n) as i32
}

// Fetch the nth word-sized system call argument as a nul-terminated string.
// Copies into buf, at most max. Returns string length if OK, -1 if error.
pub(super) fn argstr(n: u8, buf: *mut u8, max: usize) -> i32 {
    let addr = argaddr(n);
    fetchstr(addr, buf, max)
}

fn argraw(n: u8) -> u64 {
    let p = myproc();
    let tf = p.trapframe_mut();
    match n {
        0 => tf.a0,
        1 => tf.a1,
        2 => tf.a2,
        3 => tf.a3,
        4 => tf.a4,
        5 => tf.a5,
        _ => panic!("argraw"),
    }
}

// Fetch the usize at addr (spec.md's shared kernel address space: there is
// no per-process mapping to walk, so addr is already a valid kernel
// pointer and this is a plain bounded copy, not a page-table translation).
pub(super) fn fetchaddr(addr: usize, ip: &mut usize) -> i32 {
    if addr == 0 {
        return -1;
    }
    either_copyin(
        ip as *mut usize as *mut u8,
        false,
        addr as *const u8,
        mem::size_of::<usize>(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetchaddr_rejects_null() {
        let mut out = 0usize;
        assert_eq!(fetchaddr(0, &mut out), -1);
    }

    #[test]
    fn fetchstr_rejects_null() {
        let mut buf = [0u8; 8];
        assert_eq!(fetchstr(0, buf.as_mut_ptr(), buf.len()), -1);
    }
}

// Fetch the nul-terminated string at addr. Returns length of string, not
// including the nul, or -1 if no nul terminator appears within max bytes.
pub(super) fn fetchstr(addr: usize, buf: *mut u8, max: usize) -> i32 {
    if addr == 0 {
        return -1;
    }
    if either_copyin(buf, false, addr as *const u8, max) != 0 {
        return -1;
    }
    for i in 0..max {
        if unsafe { *buf.add(i) } == 0 {
            return i as i32;
        }
    }
    -1
}

// Maps syscall numbers (syscall/mod.rs) to the function that handles them.
const SYSCALL: [Option<fn() -> u64>; 16] = {
    let mut arr: [Option<fn() -> u64>; 16] = [None; 16];
    arr[SYS_EXIT as usize] = Some(sys_exit);
    arr[SYS_GETPID as usize] = Some(sys_getpid);
    arr[SYS_FORK as usize] = Some(sys_fork);
    arr[SYS_WAIT as usize] = Some(sys_wait);
    arr[SYS_READ as usize] = Some(sys_read);
    arr[SYS_WRITE as usize] = Some(sys_write);
    arr[SYS_OPEN as usize] = Some(sys_open);
    arr[SYS_CLOSE as usize] = Some(sys_close);
    arr[SYS_EXEC as usize] = Some(sys_exec);
    arr[SYS_SBRK as usize] = Some(sys_sbrk);
    arr[SYS_KILL as usize] = Some(sys_kill);
    arr[SYS_UNLINK as usize] = Some(sys_unlink);
    arr[SYS_MKDIR as usize] = Some(sys_mkdir);
    arr[SYS_SETPRIORITY as usize] = Some(sys_setpriority);
    arr[SYS_GETPRIORITY as usize] = Some(sys_getpriority);
    arr
};

pub fn syscall() {
    let p = myproc();
    let num = p.trapframe_mut().a7 as usize;

    if num > 0 && num < SYSCALL.len() && SYSCALL[num].is_some() {
        // Use num to look up the handler and stash its return value in a0,
        // exactly where the calling ecall expects to find it.
        let ret = SYSCALL[num].unwrap()();
        p.trapframe_mut().a0 = ret;
    } else {
        let name_len = p.name_bytes().iter().position(|&c| c == 0).unwrap_or(p.name_bytes().len());
        printf!(
            "{} {}: unknown sys call {}\n",
            p.pid,
            core::str::from_utf8(&p.name_bytes()[..name_len]).unwrap_or("?"),
            num
        );
        p.trapframe_mut().a0 = u64::MAX;
    }
}
