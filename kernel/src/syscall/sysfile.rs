use crate::exec;
use crate::file::fcntl::{O_CREATE, O_RDONLY, O_RDWR, O_TRUNC, O_WRONLY};
use crate::file::file::{filealloc, fileclose, fileread, filewrite};
use crate::file::{File, FDType, INode};
use crate::fs::fs::{dir_is_empty, dirlink, dirlookup, dirunlink, ialloc, nameiparent, namei};
use crate::log::{begin_op, end_op};
use crate::param::{MAXPATH, NDEV, NOFILE};
use crate::proc::myproc;
use crate::stat::FileType;
use crate::stat::FileType::{T_DEVICE, T_DIR, T_FILE};
use crate::syscall::syscall::{argaddr, argint, argstr};

// sys_exec's entry point. spec.md's exec(path) carries no argv in this
// core (SPEC_FULL.md 12, "warm re-exec"): a successful call never returns
// here at all, since reexec() discards the calling stack frame.
pub(crate) fn sys_exec() -> u64 {
    let mut path: [u8; MAXPATH] = [0; MAXPATH];
    if argstr(0, path.as_mut_ptr(), MAXPATH) < 0 {
        return u64::MAX;
    }

    let name_len = path.iter().position(|&c| c == 0).unwrap_or(path.len());
    let name = core::str::from_utf8(&path[..name_len]).unwrap_or("");
    exec::exec(name) as u64
}

pub(crate) fn sys_open() -> u64 {
    let mut path: [u8; MAXPATH] = [0; MAXPATH];
    let omode = argint(1);
    if argstr(0, path.as_mut_ptr(), MAXPATH) < 0 {
        return u64::MAX;
    }

    begin_op();

    let ip: &mut INode = if omode & O_CREATE != 0 {
        match create(&path, T_FILE, 0, 0) {
            Some(ip) => ip,
            None => {
                end_op();
                return u64::MAX;
            }
        }
    } else {
        let found = match namei(&path) {
            Some(ip) => ip,
            None => {
                end_op();
                return u64::MAX;
            }
        };
        found.ilock();
        if found.file_type == T_DIR && omode != O_RDONLY {
            found.iunlockput();
            end_op();
            return u64::MAX;
        }
        found
    };

    if ip.file_type == T_DEVICE && (ip.major < 0 || ip.major as usize >= NDEV) {
        ip.iunlockput();
        end_op();
        return u64::MAX;
    }

    let f = match filealloc() {
        Some(f) => f,
        None => {
            ip.iunlockput();
            end_op();
            return u64::MAX;
        }
    };

    let fd = match fdalloc(f as *mut File<'static>) {
        Some(fd) => fd,
        None => {
            fileclose(f);
            ip.iunlockput();
            end_op();
            return u64::MAX;
        }
    };

    if ip.file_type == T_DEVICE {
        f.file_type = FDType::FD_DEVICE;
        f.major = ip.major;
    } else {
        f.file_type = FDType::FD_INODE;
        f.off = 0;
    }
    f.readable = omode & O_WRONLY == 0;
    f.writable = (omode & O_WRONLY) != 0 || (omode & O_RDWR) != 0;

    if (omode & O_TRUNC) != 0 && ip.file_type == T_FILE {
        ip.itrunc();
    }

    ip.iunlock();
    f.ip = Some(ip);

    end_op();
    fd as u64
}

pub(crate) fn sys_close() -> u64 {
    let fd = argint(0);
    if fd < 0 || fd as usize >= NOFILE {
        return u64::MAX;
    }

    let p = myproc();
    let slot = &mut p.ofile_mut()[fd as usize];
    let f = match slot.take() {
        Some(f) => f,
        None => return u64::MAX,
    };

    fileclose(unsafe { &mut *f });
    0
}

pub(crate) fn sys_read() -> u64 {
    rw(true)
}

pub(crate) fn sys_write() -> u64 {
    rw(false)
}

fn rw(reading: bool) -> u64 {
    let fd = argint(0);
    let addr = argaddr(1);
    let n = argint(2);
    if fd < 0 || fd as usize >= NOFILE || n < 0 {
        return u64::MAX;
    }

    let p = myproc();
    let f = match p.ofile_mut()[fd as usize] {
        Some(f) => unsafe { &mut *f },
        None => return u64::MAX,
    };

    let ret = if reading {
        fileread(f, addr as *mut u8, n as usize)
    } else {
        filewrite(f, addr as *const u8, n as usize)
    };
    ret as u64
}

pub(crate) fn sys_unlink() -> u64 {
    let mut path: [u8; MAXPATH] = [0; MAXPATH];
    if argstr(0, path.as_mut_ptr(), MAXPATH) < 0 {
        return u64::MAX;
    }

    begin_op();

    let (dp, name) = nameiparent(&path);
    let dp = match dp {
        Some(dp) => dp,
        None => {
            end_op();
            return u64::MAX;
        }
    };

    dp.ilock();

    // Cannot unlink "." or "..".
    if name == b"." || name == b".." {
        dp.iunlockput();
        end_op();
        return u64::MAX;
    }

    let mut off: u32 = 0;
    let ip = match dirlookup(dp, name, &mut off) {
        Some(ip) => ip,
        None => {
            dp.iunlockput();
            end_op();
            return u64::MAX;
        }
    };

    ip.ilock();
    if ip.nlink < 1 {
        panic!("unlink: nlink < 1");
    }
    if ip.file_type == T_DIR && !dir_is_empty(ip) {
        ip.iunlockput();
        dp.iunlockput();
        end_op();
        return u64::MAX;
    }

    if !dirunlink(dp, off) {
        panic!("unlink: dirunlink");
    }

    if ip.file_type == T_DIR {
        dp.nlink -= 1;
        dp.iupdate();
    }
    dp.iunlockput();

    ip.nlink -= 1;
    ip.iupdate();
    ip.iunlockput();

    end_op();
    0
}

pub(crate) fn sys_mkdir() -> u64 {
    let mut path: [u8; MAXPATH] = [0; MAXPATH];
    if argstr(0, path.as_mut_ptr(), MAXPATH) < 0 {
        return u64::MAX;
    }

    begin_op();
    let ret = match create(&path, T_DIR, 0, 0) {
        Some(ip) => {
            ip.iunlockput();
            0
        }
        None => u64::MAX,
    };
    end_op();
    ret
}

// Shared by sys_open (O_CREATE) and sys_mkdir: look up `path`'s final
// component under its parent, creating it if absent. Returns the new or
// existing inode, locked.
fn create<'a>(path: &[u8], file_type: FileType, major: i16, minor: i16) -> Option<&'a mut INode> {
    let (dp, name) = nameiparent(path);
    let dp = dp?;
    dp.ilock();

    let mut off: u32 = 0;
    if let Some(existing) = dirlookup(dp, name, &mut off) {
        dp.iunlockput();
        existing.ilock();
        if file_type == T_FILE && (existing.file_type == T_FILE || existing.file_type == T_DEVICE)
        {
            return Some(existing);
        }
        existing.iunlockput();
        return None;
    }

    let ip = ialloc(dp.dev, file_type)?;
    ip.ilock();
    ip.major = major;
    ip.minor = minor;
    ip.nlink = 1;
    ip.iupdate();

    if file_type == T_DIR {
        // No ip.nlink += 1 for ".": avoids a cyclic reference count.
        if dirlink(ip, b".", ip.inum as u16).is_none() || dirlink(ip, b"..", dp.inum as u16).is_none() {
            ip.nlink = 0;
            ip.iupdate();
            ip.iunlockput();
            dp.iunlockput();
            return None;
        }
    }

    if dirlink(dp, name, ip.inum as u16).is_none() {
        ip.nlink = 0;
        ip.iupdate();
        ip.iunlockput();
        dp.iunlockput();
        return None;
    }

    if file_type == T_DIR {
        dp.nlink += 1; // for ".."
        dp.iupdate();
    }

    dp.iunlockput();
    Some(ip)
}

// Allocate a file descriptor for the given file. Takes over the file
// reference from the caller on success.
fn fdalloc(f: *mut File<'static>) -> Option<usize> {
    let p = myproc();
    for (fd, slot) in p.ofile_mut().iter_mut().enumerate() {
        if slot.is_none() {
            *slot = Some(f);
            return Some(fd);
        }
    }
    None
}
