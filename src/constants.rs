/// Driver-wide constants to avoid magic numbers

/// 8042 keyboard controller registers and commands
pub mod kbc {
    /// Output buffer port: bytes from the controller are read here
    pub const OUTPUT_BUFFER: u16 = 0x60;

    /// Input buffer port: command arguments are written here
    pub const INPUT_BUFFER: u16 = 0x60;

    /// Status register (read side of 0x64)
    pub const STATUS_REGISTER: u16 = 0x64;

    /// Command register (write side of 0x64)
    pub const COMMAND_REGISTER: u16 = 0x64;

    /// Command to place the controller command byte in the output buffer
    pub const CMD_READ_COMMAND_BYTE: u8 = 0x20;

    /// Polls of a full input buffer tolerated before a write gives up
    pub const MAX_WRITE_TRIES: u8 = 20;

    /// Delay between polls: 20 ms covers the controller's worst-case
    /// settle time for one byte
    pub const RETRY_DELAY_MICROS: u64 = 20_000;
}

/// Set 1 scan codes for the keys the game binds
pub mod scancode {
    pub const W_KEY: u8 = 0x11;
    pub const A_KEY: u8 = 0x1E;
    pub const S_KEY: u8 = 0x1F;
    pub const D_KEY: u8 = 0x20;
    pub const ESC_KEY: u8 = 0x01;

    /// Bit set on a scan code when the key is released
    pub const BREAK_BIT: u8 = 0x80;
}

/// Interrupt constants
pub mod irq {
    /// Keyboard line on the primary PIC
    pub const KEYBOARD_LINE: u8 = 1;

    /// PIC remap offsets
    /// We remap PIC interrupts to start at 32 to avoid conflicts with CPU exceptions
    pub const PIC_1_OFFSET: u8 = 32;
    pub const PIC_2_OFFSET: u8 = PIC_1_OFFSET + 8;

    /// PIC mask (data) ports
    pub const PIC_1_DATA: u16 = 0x21;
    pub const PIC_2_DATA: u16 = 0xA1;

    /// Unused diagnostic port, written to for short I/O delays
    pub const WAIT_PORT: u16 = 0x80;
}
