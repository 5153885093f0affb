use crate::spinlock::{pop_off, push_off, Spinlock};

// the UART control registers are memory-mapped at address UART0. this macro
// returns the address of one of the registers.
#[macro_export]
macro_rules! Reg {
    ( $reg:expr ) => {
        $crate::memlayout::UART0 + $reg
    };
}

// the UART control registers.
// some have different meanings for read vs write.
// see http://byterunner.com/16550.html
pub const RHR: usize = 0; // receive holding register (for input bytes)
pub const THR: usize = 0; // transmit holding register (for output bytes)
pub const IER: usize = 1; // interrupt enable register
pub const IER_RX_ENABLE: u8 = 1 << 0;
pub const IER_TX_ENABLE: u8 = 1 << 1;
pub const FCR: usize = 2; // FIFO control register
pub const FCR_FIFO_ENABLE: u8 = 1 << 0;
pub const FCR_FIFO_CLEAR: u8 = 3 << 1; // clear the content of the two FIFOs
pub const LCR: usize = 3; // line control register
pub const LCR_EIGHT_BITS: u8 = 3 << 0;
pub const LCR_BAUD_LATCH: u8 = 1 << 7; // special mode to set baud rate
pub const LSR: usize = 5; // line status register
pub const LSR_RX_READY: u8 = 1 << 0; // input is waiting to be read from RHR
pub const LSR_TX_IDLE: u8 = 1 << 5; // THR can accept another character to send
pub const UART_TX_BUF_SIZE: usize = 32;

#[macro_export]
macro_rules! ReadReg {
    ( $reg:expr ) => {
        (($crate::memlayout::UART0 + $reg) as *mut u8).read_volatile()
    };
}

#[macro_export]
macro_rules! WriteReg {
    ( $reg:expr, $val:expr ) => {
        (($crate::memlayout::UART0 + $reg) as *mut u8).write_volatile($val)
    };
}

pub struct Uart {
    uart_tx_lock: Spinlock,
    uart_tx_buf: [u8; UART_TX_BUF_SIZE],
    uart_tx_w: u64,
    uart_tx_r: u64,
}

pub static mut UART_INSTANCE: Uart = Uart::create();

impl Uart {
    const fn create() -> Self {
        Self {
            uart_tx_lock: Spinlock::init_lock("uart"),
            uart_tx_buf: [0; UART_TX_BUF_SIZE],
            uart_tx_w: 0,
            uart_tx_r: 0,
        }
    }

    pub fn init() {
        unsafe {
            // disable interrupts.
            WriteReg!(IER, 0x00);

            // special mode to set baud rate.
            WriteReg!(LCR, LCR_BAUD_LATCH);

            // LSB for baud rate of 38.4K.
            WriteReg!(0, 0x03);
            // MSB for baud rate of 38.4K.
            WriteReg!(1, 0x00);

            // leave set-baud mode, and set word length to 8 bits, no parity.
            WriteReg!(LCR, LCR_EIGHT_BITS);

            // reset and enable FIFOs.
            WriteReg!(FCR, FCR_FIFO_ENABLE | FCR_FIFO_CLEAR);

            // enable transmit and receive interrupts.
            WriteReg!(IER, IER_TX_ENABLE | IER_RX_ENABLE);
        }
    }

    /// Add a character to the output buffer and tell the UART to start
    /// sending if it isn't already. Blocks if the output buffer is full.
    /// Because it may block, it can't be called from interrupts; it's only
    /// suitable for use by write().
    pub fn putc(self: &mut Self, c: u8) {
        self.uart_tx_lock.acquire();

        while self.uart_tx_w == self.uart_tx_r + UART_TX_BUF_SIZE as u64 {
            // buffer is full: wait for uart_start() to open up space.
            crate::proc::sleep(&self.uart_tx_r as *const u64, &mut self.uart_tx_lock);
        }
        self.uart_tx_buf[(self.uart_tx_w % UART_TX_BUF_SIZE as u64) as usize] = c;
        self.uart_tx_w += 1;
        self.uart_start();
        self.uart_tx_lock.release();
    }

    /// Alternate version of putc() that doesn't use interrupts, for use by
    /// kernel printf() and to echo characters. It spins waiting for the
    /// uart's output register to be empty.
    pub fn putc_sync(self: &Self, c: u8) {
        push_off();

        unsafe {
            while (ReadReg!(LSR) & LSR_TX_IDLE) == 0 {}
            WriteReg!(THR, c);
        }

        pop_off();
    }

    /// If the UART is idle, and a character is waiting in the transmit
    /// buffer, send it. Caller must hold uart_tx_lock. Called from both the
    /// top- and bottom-half.
    fn uart_start(self: &mut Self) {
        loop {
            if self.uart_tx_w == self.uart_tx_r {
                // transmit buffer is empty.
                return;
            }

            unsafe {
                if (ReadReg!(LSR) & LSR_TX_IDLE) == 0 {
                    // the UART transmit holding register is full; it will
                    // interrupt when ready for a new byte.
                    return;
                }
            }

            let c = self.uart_tx_buf[(self.uart_tx_r % UART_TX_BUF_SIZE as u64) as usize];
            self.uart_tx_r += 1;

            // a putc() may be waiting for space in the buffer.
            crate::proc::wakeup(&self.uart_tx_r as *const u64);

            unsafe { WriteReg!(THR, c); }
        }
    }

    /// Read one input character from the UART. Returns None if none is
    /// waiting.
    fn getc(self: &Self) -> Option<u8> {
        unsafe {
            if ReadReg!(LSR) & LSR_RX_READY != 0 {
                Some(ReadReg!(RHR))
            } else {
                None
            }
        }
    }

    /// Handle a uart interrupt, raised because input has arrived, or the
    /// uart is ready for more output, or both. Called from devintr().
    pub fn intr(self: &mut Self) {
        loop {
            match self.getc() {
                Some(c) => unsafe { crate::console::CONSOLE_INSTANCE.consoleintr(c) },
                None => break,
            }
        }

        self.uart_tx_lock.acquire();
        self.uart_start();
        self.uart_tx_lock.release();
    }
}
