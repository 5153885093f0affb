// Compile-time kernel configuration.

pub const NCPU: usize = 1; // maximum number of CPUs (this core assumes one hart)
pub const NPROC: usize = 64; // maximum number of processes
pub const NOFILE: usize = 16; // open files per process
pub const NFILE: usize = 100; // open files per system
pub const NINODE: usize = 50; // maximum number of active i-nodes
pub const NDEV: usize = 10; // maximum major device number
pub const ROOTDEV: u32 = 1; // device number of file system root disk
pub const NBUF: usize = 30; // size of disk block cache
pub const FSSIZE: usize = 2000; // size of file system, in blocks (matches mkfs)

// Logging (C4). MAXOPBLOCKS * MAX_CONCURRENT_OPS <= LOGSIZE, or begin_op panics.
pub const MAXOPBLOCKS: u32 = 10; // max # of distinct blocks any FS op writes
pub const MAX_CONCURRENT_OPS: u32 = 3; // max FS ops admitted into one transaction
pub const LOGSIZE: usize = (MAXOPBLOCKS * MAX_CONCURRENT_OPS) as usize; // log slots (excl. header)

// Scheduler (C8/C9).
pub const MAXPRIORITY: i32 = 31;
pub const MINPRIORITY: i32 = 0;
pub const AGING_THRESHOLD: u32 = 16; // scheduler rounds a RUNNABLE proc can wait before boosted
pub const AGING_BOOST: i32 = 4; // priority added once AGING_THRESHOLD is reached
pub const AGING_SWEEP_PERIOD: u32 = 1; // run the aging sweep every K scheduler loops

pub const MAXPATH: usize = 128; // maximum file path name length
pub const MAXARG: usize = 16; // max exec arguments
pub const DIRSIZ: usize = 14; // directory entry name length
