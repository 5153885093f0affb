use crate::plic::{plic_claim, plic_complete};
use crate::proc::{myproc, Trapframe};
use crate::riscv::{
    intr_get, intr_on, r_scause, r_sepc, r_sip, r_sstatus, r_stval, SSTATUS_SPP, w_sepc, w_sip,
    w_sstatus, w_stvec,
};
use crate::spinlock::Spinlock;

static mut TICKS_LOCK: Spinlock = Spinlock::init_lock("time");
static mut TICKS: u64 = 0;

extern {
    // kernelvec.S
    static kernelvec: u8;
}

pub fn trapinit() {
    // TICKS_LOCK is already usable as a static; nothing else to set up.
}

// Install the kernel trap vector. Every process in this core runs in
// supervisor mode against the shared kernel mapping (Non-goals exclude
// isolated user address spaces), so there is exactly one vector, installed
// once per hart and never swapped the way a user/kernel split would
// require (spec.md 4.7).
pub fn trapinithart() {
    w_stvec((unsafe { &kernelvec } as *const u8).expose_addr());
}

const SCAUSE_INTR_BIT: u64 = 1 << 63;
const SCAUSE_ENV_CALL_FROM_S: u64 = 9;
const SCAUSE_BREAKPOINT: u64 = 3;

// Called from kernelvec.S on every trap taken while running in supervisor
// mode: timer/external interrupts, ecall, and exceptions (spec.md 4.7). `tf`
// points at the 30 GPRs kernelvec.S just pushed onto the interrupted
// process's own kernel stack (there is no separate trapframe page to switch
// to - see proc::Trapframe).
#[no_mangle]
pub extern "C" fn kerneltrap(tf: *mut Trapframe) {
    let sepc = r_sepc();
    let sstatus = r_sstatus();
    let scause = r_scause();

    if sstatus & SSTATUS_SPP == 0 {
        panic!("kerneltrap: not from supervisor mode");
    }
    if intr_get() {
        panic!("kerneltrap: interrupts enabled");
    }

    let which_dev = devintr(scause);
    if which_dev == 0 {
        if scause == SCAUSE_ENV_CALL_FROM_S {
            // dispatch through the syscall layer (C10); arguments and the
            // syscall number live in the trapframe kernelvec.S just pushed.
            let p = myproc();
            p.set_trapframe(tf);
            if p.killed() != 0 {
                crate::proc::exit(-1);
            }
            w_sepc(sepc as usize + 4);
            intr_on();
            crate::syscall::syscall::syscall();
        } else if scause == SCAUSE_BREAKPOINT {
            w_sepc(sepc as usize + 2);
        } else {
            crate::printf!(
                "scause {:x}\nsepc={:x} stval={:x}\n",
                scause,
                sepc,
                r_stval()
            );
            panic!("kerneltrap: unhandled trap");
        }
    }

    // a yield() inside devintr()/syscall() may have let other traps run on
    // this stack in the meantime; restore our own sepc/sstatus before
    // kernelvec.S's sret.
    w_sepc(sepc as usize);
    w_sstatus(sstatus);

    if which_dev == 2 && myproc().killed() == 0 {
        // timer interrupt: this is the core's only preemption point.
        crate::proc::yield_();
    }
}

// Advance the global tick count and wake anyone sleeping on it (spec.md 4.7:
// "Timer => increment global tick ... reset the next-tick comparator").
fn clockintr() {
    unsafe {
        TICKS_LOCK.acquire();
        TICKS += 1;
        TICKS_LOCK.release();
    }
    crate::proc::wakeup(unsafe { &TICKS as *const u64 });
}

// Check whether scause is a recognised interrupt and handle it. Returns 2
// for the timer, 1 for another device, 0 if scause isn't an interrupt at
// all (spec.md 4.7: "Software/external => log (no device drivers in the
// core)" - this core's one real device, the console UART, is still wired
// through here since the file layer needs a concrete Devsw to exist).
fn devintr(scause: u64) -> i32 {
    if scause == SCAUSE_INTR_BIT | 9 {
        // supervisor external interrupt via the PLIC.
        let irq = plic_claim();

        if irq == crate::memlayout::UART0_IRQ as u32 {
            unsafe { crate::uart::UART_INSTANCE.intr(); }
        } else if irq != 0 {
            crate::printf!("unexpected interrupt irq={}\n", irq);
        }

        if irq != 0 {
            plic_complete(irq);
        }
        1
    } else if scause == SCAUSE_INTR_BIT | 5 {
        // supervisor software interrupt, raised by kernelvec.S's
        // machine-mode timervec to forward the timer tick.
        clockintr();
        unsafe {
            w_sip(r_sip() & !2);
        }
        2
    } else {
        0
    }
}
