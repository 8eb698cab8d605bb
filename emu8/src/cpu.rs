//! CPU and memory state.
use crate::constants::*;

/// Display buffer of pixel words, row-major.
pub type Chip8DisplayBuffer<'a> = &'a [u32; DISPLAY_BUFFER_SIZE];

/// Core state for a chip8 interpreter.
#[derive(Clone)]
pub struct Chip8Cpu {
    // ------------------------------------------------------------------------
    // Registers
    /// Program counter pointing to the next instruction to fetch.
    pub(crate) pc: Address,
    /// Stack pointer, the number of return addresses on the stack.
    ///
    /// Always in the range `0..=STACK_SIZE`.
    pub(crate) sp: usize,
    /// General purpose registers for temporary values.
    ///
    /// Register 16 (VF) is used for either the carry flag or borrow switch depending on opcode.
    pub(crate) registers: [u8; REGISTER_COUNT],
    /// (I) Pointer register used for temporarily storing an address.
    pub(crate) address: Address,
    /// (DT) Delay timer that counts down to 0.
    pub(crate) delay_timer: u8,
    /// (ST) Sound timer that counts down to 0. When it has a non-zero value, a beep is played.
    pub(crate) sound_timer: u8,
    /// Keyboard input state. Pressed is a 1 bit, released is a 0 bit.
    pub(crate) key_state: u16,
    /// Key held down during the first phase of `Fx0A`, waiting to be released.
    pub(crate) key_awaited: Option<u8>,
    /// Set after a sprite is drawn, cleared by the host once the frame is presented.
    pub(crate) display_ready: bool,

    // ------------------------------------------------------------------------
    // Memory
    /// Main memory storage space.
    pub(crate) ram: Box<[u8; MEM_SIZE]>,
    /// Stack of return pointers used for jumping when a routine call finishes.
    pub(crate) stack: [Address; STACK_SIZE],
    /// Screen buffer that is drawn to.
    pub(crate) display: Box<[u32; DISPLAY_BUFFER_SIZE]>,
}

impl Default for Chip8Cpu {
    fn default() -> Self {
        let mut cpu = Self {
            pc: MEM_START as Address,
            sp: 0,
            registers: [0; REGISTER_COUNT],
            address: 0,
            delay_timer: 0,
            sound_timer: 0,
            key_state: 0,
            key_awaited: None,
            display_ready: false,

            ram: Box::new([0; MEM_SIZE]),
            stack: [0; STACK_SIZE],
            display: Box::new([PIXEL_OFF; DISPLAY_BUFFER_SIZE]),
        };
        cpu.load_font();
        cpu
    }
}

impl Chip8Cpu {
    /// Power-on state, with the built-in font loaded.
    pub fn new() -> Self {
        Default::default()
    }

    /// Return all registers, timers, latches and the display to their
    /// power-on values. Memory is left untouched.
    pub(crate) fn reset_registers(&mut self) {
        self.pc = MEM_START as Address;
        self.sp = 0;
        self.registers.fill(0);
        self.address = 0;
        self.delay_timer = 0;
        self.sound_timer = 0;
        self.key_state = 0;
        self.key_awaited = None;
        self.display_ready = false;
        self.stack.fill(0);
        self.clear_display();
    }

    /// Erase the contents of the memory buffers `ram`, `stack` and `display`.
    pub(crate) fn clear_memory(&mut self) {
        self.ram.fill(0);
        self.stack.fill(0);
        self.clear_display();
    }

    pub(crate) fn load_font(&mut self) {
        let start = FONTSET_START as usize;
        self.ram[start..start + FONTSET_DATA_LENGTH].copy_from_slice(&FONTSET);
    }

    pub fn clear_display(&mut self) {
        self.display.fill(PIXEL_OFF);
    }

    pub fn set_key_state(&mut self, key_id: u8, state: bool) {
        if key_id < KEY_COUNT {
            if state {
                self.key_state |= 1 << key_id;
            } else {
                self.key_state &= !(1 << key_id);
            }
        }
    }

    /// Whether the given key is held down.
    ///
    /// Identifiers outside the keypad are never pressed.
    pub fn key_state(&self, key_id: u8) -> bool {
        if key_id < KEY_COUNT {
            self.key_state & (1 << key_id) > 0
        } else {
            false
        }
    }

    /// Check whether any key is pressed down.
    #[inline(always)]
    pub fn any_key(&self) -> bool {
        self.key_state > 0
    }

    /// Retrieve the value of the lowest key that is pressed down.
    #[inline]
    pub fn first_key(&self) -> Option<u8> {
        if self.any_key() {
            Some(self.key_state.trailing_zeros() as u8)
        } else {
            None
        }
    }

    /// Count down the delay timer.
    #[inline]
    pub fn tick_delay(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
    }

    /// Count down the sound timer.
    #[inline]
    pub fn tick_sound(&mut self) {
        self.sound_timer = self.sound_timer.saturating_sub(1);
    }

    /// Extract the instruction at the current program counter.
    #[inline(always)]
    pub fn instr(&self) -> [u8; 2] {
        let pc = self.pc as usize;
        [self.ram[pc & MEM_MASK], self.ram[(pc + 1) & MEM_MASK]]
    }

    /// Read a byte of memory, wrapping the address at the end of memory.
    #[inline(always)]
    pub(crate) fn peek(&self, address: usize) -> u8 {
        self.ram[address & MEM_MASK]
    }

    /// Write a byte of memory, wrapping the address at the end of memory.
    #[inline(always)]
    pub(crate) fn poke(&mut self, address: usize, value: u8) {
        self.ram[address & MEM_MASK] = value;
    }
}

/// Read access
impl Chip8Cpu {
    #[inline(always)]
    pub fn pc(&self) -> Address {
        self.pc
    }

    #[inline(always)]
    pub fn sp(&self) -> usize {
        self.sp
    }

    #[inline(always)]
    pub fn register(&self, index: usize) -> u8 {
        self.registers[index & 0xF]
    }

    pub fn registers(&self) -> &[u8; REGISTER_COUNT] {
        &self.registers
    }

    /// Value of the index register I.
    #[inline(always)]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Return addresses currently on the stack, oldest first.
    pub fn stack(&self) -> &[Address] {
        &self.stack[..self.sp]
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer
    }

    pub fn sound_timer(&self) -> u8 {
        self.sound_timer
    }

    pub fn key_mask(&self) -> u16 {
        self.key_state
    }

    pub fn key_awaited(&self) -> Option<u8> {
        self.key_awaited
    }

    pub fn display_ready(&self) -> bool {
        self.display_ready
    }

    pub fn ram(&self) -> &[u8; MEM_SIZE] {
        &self.ram
    }

    pub fn display(&self) -> Chip8DisplayBuffer<'_> {
        &self.display
    }
}
