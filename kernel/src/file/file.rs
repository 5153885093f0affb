use crate::file::FDType::{FD_DEVICE, FD_INODE, FD_NONE};
use crate::file::{Devsw, File, DEVSW};
use crate::log::{begin_op, end_op};
use crate::param::NFILE;
use crate::spinlock::Spinlock;

struct FTable {
    lock: Spinlock,
    file: [File<'static>; NFILE]
}

static mut FTABLE: FTable = FTable {
    lock: Spinlock::init_lock("ftable"),
    file: [File::create(); NFILE],
};

pub fn fileinit() {
    // empty due to FTABLE has already been initialized
}

// Allocate a file structure.
pub fn filealloc() -> Option<&'static mut File<'static>> {
    unsafe {
        FTABLE.lock.acquire();
        for f in &mut FTABLE.file {
            if f.ref_cnt == 0 {
                f.ref_cnt = 1;
                FTABLE.lock.release();
                return Some(f);
            }
        }

        FTABLE.lock.release();
        return None;
    }
}

// Increment ref count for file f.
pub(crate) fn filedup(f: *mut File<'static>) {
    unsafe {
        FTABLE.lock.acquire();
        let f = f.as_mut().unwrap();
        if f.ref_cnt < 1 {
            panic!("filedup")
        }

        f.ref_cnt += 1;
        FTABLE.lock.release();
    }
}

// Close file f.  (Decrement ref count, close when reaches 0.)
pub(crate) fn fileclose(f: &mut File<'static>) {
    unsafe {
        FTABLE.lock.acquire();
        if f.ref_cnt < 1 {
            panic!("fileclose");
        }

        f.ref_cnt -= 1;
        if f.ref_cnt > 0 {
            FTABLE.lock.release();
            return;
        }

        let file_type = f.file_type;
        let ip = f.ip.take();

        f.ref_cnt = 0;
        f.file_type = FD_NONE;
        FTABLE.lock.release();

        if file_type == FD_INODE || file_type == FD_DEVICE {
            begin_op();
            ip.unwrap().iput();
            end_op();
        }
    }
}

// Get metadata about file f (spec.md C6, open file byte offset/kind).
// Unused directly by any numbered syscall in this core (no fstat in the
// table) but kept as the primitive readi/writei-style syscalls are built
// on; exposed for completeness of the open-file object's contract.
pub(crate) fn filestat(f: &mut File<'static>) -> Option<(u32, u32, crate::stat::FileType, i16, u32)> {
    if f.file_type != FD_INODE {
        return None;
    }
    let ip = f.ip.as_mut()?;
    ip.ilock();
    let stat = (ip.dev, ip.inum, ip.file_type, ip.nlink, ip.size);
    ip.iunlock();
    Some(stat)
}

// Read from file f into dst (spec.md C6 "read(fd, buf, n)"). Advances f's
// byte offset for FD_INODE files; dispatches to the registered device
// driver for FD_DEVICE (spec.md 6's UART byte channel, wired in as major
// device CONSOLE).
pub(crate) fn fileread(f: &mut File<'static>, dst: *mut u8, n: usize) -> i32 {
    if !f.readable {
        return -1;
    }

    match f.file_type {
        FD_DEVICE => {
            if f.major < 0 || f.major as usize >= crate::param::NDEV {
                return -1;
            }
            let dev = unsafe { DEVSW[f.major as usize] };
            match dev {
                Some(d) => unsafe { (*d).read(false, dst as usize, n) },
                None => -1,
            }
        }
        FD_INODE => {
            let ip = match f.ip.as_mut() {
                Some(ip) => ip,
                None => return -1,
            };
            ip.ilock();
            let r = ip.readi(false, dst, f.off, n);
            if r > 0 {
                f.off += r as u32;
            }
            ip.iunlock();
            r as i32
        }
        FD_NONE => -1,
    }
}

// Write src into file f (spec.md C6 "write(fd, buf, n)"). Every write to an
// inode-backed file happens inside its own begin_op/end_op transaction
// (spec.md 4.4): a write larger than one transaction's block budget is
// chunked so no single call can overrun the log.
pub(crate) fn filewrite(f: &mut File<'static>, src: *const u8, n: usize) -> i32 {
    if !f.writable {
        return -1;
    }

    match f.file_type {
        FD_DEVICE => {
            if f.major < 0 || f.major as usize >= crate::param::NDEV {
                return -1;
            }
            let dev = unsafe { DEVSW[f.major as usize] };
            match dev {
                Some(d) => unsafe { (*d).write(false, src as usize, n) },
                None => -1,
            }
        }
        FD_INODE => {
            // Conservative per-transaction byte cap so a single write()
            // call never logs more distinct blocks than MAXOPBLOCKS allows
            // (log_write absorbs repeats to the same block, but a long
            // write touches many distinct ones).
            let max = ((crate::param::MAXOPBLOCKS - 1) / 2) as usize * crate::fs::BSIZE;
            let mut i = 0;
            let mut ret = 0;
            while i < n {
                let chunk = core::cmp::min(n - i, max);
                begin_op();
                let ip = match f.ip.as_mut() {
                    Some(ip) => ip,
                    None => { end_op(); return if ret > 0 { ret } else { -1 }; }
                };
                ip.ilock();
                let r = ip.writei(false, unsafe { src.add(i) as *mut u8 }, f.off, chunk);
                ip.iunlock();
                end_op();

                if r < 0 || r as usize != chunk {
                    break;
                }
                f.off += r as u32;
                ret += r as i32;
                i += chunk;
            }
            if i == n { ret } else { -1 }
        }
        FD_NONE => -1,
    }
}
