//! Virtual machine.
use std::{
    fmt::{self, Write},
    fs,
    path::Path,
};

use log::{debug, trace, warn};
use rand::prelude::*;

use crate::{
    constants::*,
    cpu::{Chip8Cpu, Chip8DisplayBuffer},
    disasm::Mnemonic,
    error::{Chip8Error, Chip8Result},
    keypad::KeyCode,
    opcode::Opcode,
};

pub struct Chip8Vm {
    cpu: Chip8Cpu,
    rng: StdRng,
    conf: Chip8Conf,
}

/// VM Configuration Parameters.
#[derive(Debug, Clone)]
pub struct Chip8Conf {
    /// Number of instructions executed by [`Chip8Vm::run_frame`].
    pub instructions_per_frame: usize,
    /// Seed for the random number generator used by `Cxkk`.
    ///
    /// When `None` the generator is seeded from system entropy.
    pub rng_seed: Option<u64>,
}

impl Default for Chip8Conf {
    fn default() -> Self {
        Self {
            instructions_per_frame: DEFAULT_INSTRUCTIONS_PER_FRAME,
            rng_seed: None,
        }
    }
}

impl Chip8Vm {
    pub fn new(conf: Chip8Conf) -> Self {
        let rng = match conf.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Chip8Vm {
            cpu: Chip8Cpu::new(),
            rng,
            conf,
        }
    }

    /// Configuration that was used to instantiate the VM.
    pub fn config(&self) -> &Chip8Conf {
        &self.conf
    }

    /// Read-only view of the machine state.
    pub fn cpu(&self) -> &Chip8Cpu {
        &self.cpu
    }

    /// Load a program into memory and prepare the machine for execution.
    ///
    /// The size is checked before anything is touched, so a rejected
    /// program leaves the machine as it was.
    pub fn load_bytecode(&mut self, bytecode: &[u8]) -> Chip8Result<()> {
        if !check_program_size(bytecode) {
            return Err(Chip8Error::LargeProgram {
                size: bytecode.len(),
            });
        }

        // Start with clean memory to avoid leaking previous program.
        self.cpu.clear_memory();
        self.cpu.load_font();

        // Load program into virtual RAM
        self.cpu.ram[MEM_START..MEM_START + bytecode.len()].copy_from_slice(bytecode);

        self.cpu.reset_registers();

        debug!("loaded {} byte program", bytecode.len());

        Ok(())
    }

    /// Read a ROM file and load it into memory.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Chip8Result<()> {
        let bytecode = fs::read(path.as_ref())?;
        self.load_bytecode(&bytecode)
    }

    /// Return the machine to its power-on state, keeping the loaded program.
    pub fn reset(&mut self) {
        self.cpu.reset_registers();
        self.cpu.load_font();

        debug!("machine reset");
    }

    pub fn display_buffer(&self) -> Chip8DisplayBuffer<'_> {
        &self.cpu.display
    }

    /// A sprite has been drawn since the host last consumed the display.
    pub fn display_ready(&self) -> bool {
        self.cpu.display_ready
    }

    /// Signal that the host has presented the display buffer.
    ///
    /// Unblocks a `Dxyn` instruction that is waiting for the display.
    pub fn consume_frame(&mut self) {
        self.cpu.display_ready = false;
    }

    /// The buzzer sounds while the sound timer is counting down.
    pub fn is_buzzing(&self) -> bool {
        self.cpu.sound_timer > 0
    }
}

/// Check that the program fits into the program memory region.
#[inline]
fn check_program_size(bytecode: &[u8]) -> bool {
    bytecode.len() < PROGRAM_MEMORY_SIZE
}

/// Outcome of a single interpreter cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Flow {
    Ok,
    /// Program counter has jumped to a new address.
    ///
    /// This is useful for the caller to avoid being
    /// blocked on infinite or long running loops.
    ///
    /// This is returned when the interpreter encounters:
    ///
    /// - 1nnn (`JP addr`)
    /// - 2nnn (`CALL addr`)
    /// - 00EE (`RET`)
    /// - Bnnn (`JP V0, addr`)
    Jump,
    /// A sprite was drawn and the display is ready to be presented.
    Draw,
    /// A sprite draw is stalled until the host consumes the previous frame.
    DrawWait,
    /// The sound timer was set to a non-zero value.
    Sound,
    /// Wait for a keypress.
    ///
    /// This is triggered by the opcode `Fx0A` (`LD Vx, K`), which stops
    /// execution until a key is pressed and released, and loads the key value into `Vx`.
    KeyWait,
}

/// Host interface
impl Chip8Vm {
    /// Sets the keyboard key input state.
    pub fn set_key(&mut self, key: KeyCode, pressed: bool) {
        self.cpu.set_key_state(key.as_u8(), pressed);
    }

    /// Replace the whole keyboard state. Bit `i` set means key `i` is held down.
    pub fn set_keypad(&mut self, mask: u16) {
        self.cpu.key_state = mask;
    }

    /// Clear the keyboard input state, setting all keys to up.
    pub fn clear_keys(&mut self) {
        self.cpu.key_state = 0;
    }

    /// Count down the delay and sound timers.
    ///
    /// Must be called by the host at [`DELAY_FREQUENCY`], independently of
    /// how many instructions are executed in between.
    pub fn tick_timers(&mut self) {
        self.cpu.tick_delay();
        self.cpu.tick_sound();
    }
}

/// Interpreter
impl Chip8Vm {
    /// Execute up to `step_count` instructions, stopping at the first fault.
    ///
    /// Returns the flow of the last executed instruction.
    pub fn run_steps(&mut self, step_count: usize) -> Chip8Result<Flow> {
        let mut flow = Flow::Ok;

        for _ in 0..step_count {
            flow = self.cycle()?;
        }

        Ok(flow)
    }

    /// Execute the configured number of instructions for one 60 Hz frame.
    pub fn run_frame(&mut self) -> Chip8Result<Flow> {
        self.run_steps(self.conf.instructions_per_frame)
    }

    /// Fetch, decode and execute a single instruction.
    ///
    /// When a fault is returned the program counter is rewound to the
    /// faulting instruction and no other state has been changed.
    pub fn cycle(&mut self) -> Chip8Result<Flow> {
        let address = self.cpu.pc;
        let op = Opcode::from_bytes(self.cpu.instr());
        self.cpu.pc = address.wrapping_add(2);

        trace!("{:04X}: {}", address, Mnemonic(op));

        let result = match op.op {
            0x0 => self.exec_sys(op),
            0x2 => self.exec_call(op),
            0x8 => Ok(self.exec_math(op)),
            0xD => Ok(self.exec_draw(op)),
            0xE => Ok(self.exec_key(op)),
            0xF => Ok(self.exec_misc(op)),
            _ => Ok(self.exec_base(op)),
        };

        if let Err(ref err) = result {
            warn!("{err}");
            self.cpu.pc = address;
        }

        result
    }

    /// Skip the next instruction.
    #[inline(always)]
    fn skip(&mut self) {
        self.cpu.pc = self.cpu.pc.wrapping_add(2);
    }

    /// Rewind the program counter so the current instruction is executed again.
    #[inline(always)]
    fn stall(&mut self) {
        self.cpu.pc = self.cpu.pc.wrapping_sub(2);
    }

    /// Execute a system instruction identified by kk.
    #[inline]
    fn exec_sys(&mut self, op: Opcode) -> Chip8Result<Flow> {
        debug_assert_eq!(op.op, 0x0);

        match op.kk {
            // 00E0 (CLS)
            //
            // Clear display
            0xE0 => {
                self.cpu.clear_display();
                Ok(Flow::Ok)
            }
            // 00EE (RET)
            //
            // Return from a subroutine.
            // Subtract 1 from the stack pointer, then set the program
            // counter to the value at the top of the stack.
            0xEE => {
                if self.cpu.sp == 0 {
                    return Err(Chip8Error::StackUnderflow {
                        address: self.cpu.pc.wrapping_sub(2),
                    });
                }
                self.cpu.sp -= 1;
                self.cpu.pc = self.cpu.stack[self.cpu.sp];
                Ok(Flow::Jump)
            }
            // 0nnn (SYS addr) is ignored by modern interpreters.
            _ => Ok(Flow::Ok),
        }
    }

    /// Execute one of the instructions that are fully identified by their class.
    #[inline]
    fn exec_base(&mut self, op: Opcode) -> Flow {
        let Opcode { x, y, kk, n, nnn, .. } = op;
        let (vx, vy) = (x as usize, y as usize);

        match op.op {
            // 1NNN (JP addr)
            //
            // Jump to address.
            0x1 => {
                self.cpu.pc = nnn;
                return Flow::Jump;
            }
            // 3XNN (SE Vx, byte)
            //
            // Skip the next instruction if register VX equals value NN.
            0x3 => {
                if self.cpu.registers[vx] == kk {
                    self.skip();
                }
            }
            // 4XNN (SNE Vx, byte)
            //
            // Skip the next instruction if register VX does not equal value NN.
            0x4 => {
                if self.cpu.registers[vx] != kk {
                    self.skip();
                }
            }
            // 5XY0 (SE Vx, Vy)
            //
            // Skip the next instruction if register VX equals value VY.
            0x5 if n == 0 => {
                if self.cpu.registers[vx] == self.cpu.registers[vy] {
                    self.skip();
                }
            }
            // 6XNN (LD Vx, byte)
            //
            // Set register VX to value NN.
            0x6 => {
                self.cpu.registers[vx] = kk;
            }
            // 7xnn (ADD Vx, byte)
            //
            // Add value NN to register VX. Carry flag is not set.
            0x7 => {
                self.cpu.registers[vx] = self.cpu.registers[vx].wrapping_add(kk);
            }
            // 9xy0 (SNE Vx, Vy)
            //
            // Skip next instruction if Vx != Vy.
            0x9 if n == 0 => {
                if self.cpu.registers[vx] != self.cpu.registers[vy] {
                    self.skip();
                }
            }
            // Annn (LD I, addr)
            //
            // Set address register I to value NNN.
            0xA => {
                self.cpu.address = nnn;
            }
            // Bnnn (JP V0, addr)
            //
            // Jump to address NNN plus V0.
            // CHIP-48 and SUPER-CHIP read this as Bxnn with VX, this machine uses V0.
            0xB => {
                self.cpu.pc = nnn + self.cpu.registers[0] as u16;
                return Flow::Jump;
            }
            // CXNN (RND Vx, byte)
            //
            // Generate random number.
            // Set register VX to the result of bitwise AND between a random number and NN.
            0xC => {
                self.cpu.registers[vx] = kk & self.rng.gen::<u8>();
            }
            // Unsupported operation.
            _ => {
                trace!("ignored opcode {:04X}", op.code);
            }
        }

        Flow::Ok
    }

    /// 2NNN (CALL addr)
    ///
    /// Call subroutine at NNN.
    /// The address of the next instruction is pushed onto the stack.
    #[inline]
    fn exec_call(&mut self, op: Opcode) -> Chip8Result<Flow> {
        debug_assert_eq!(op.op, 0x2);

        if self.cpu.sp >= STACK_SIZE {
            return Err(Chip8Error::StackOverflow {
                address: self.cpu.pc.wrapping_sub(2),
            });
        }
        self.cpu.stack[self.cpu.sp] = self.cpu.pc;
        self.cpu.sp += 1;
        self.cpu.pc = op.nnn;

        Ok(Flow::Jump)
    }

    /// Execute an arithmetic instruction
    #[inline]
    #[must_use]
    fn exec_math(&mut self, op: Opcode) -> Flow {
        debug_assert_eq!(op.op, 0x8);
        let (vx, vy) = (op.x as usize, op.y as usize);
        let (x, y) = (self.cpu.registers[vx], self.cpu.registers[vy]);

        match op.n {
            // 8XY0 (LD Vx, Vy)
            //
            // Store the value of register VY in register VX.
            0x0 => {
                self.cpu.registers[vx] = y;
            }
            // 8XY1 (OR Vx, Vy)
            //
            // Performs bitwise OR on VX and VY, and stores the result in VX.
            // VF is reset to 0, as on the COSMAC VIP.
            0x1 => {
                self.cpu.registers[vx] = x | y;
                self.cpu.registers[FLAG_REGISTER] = 0;
            }
            // 8XY2 (AND Vx, Vy)
            //
            // Performs bitwise AND on VX and VY, and stores the result in VX.
            // VF is reset to 0.
            0x2 => {
                self.cpu.registers[vx] = x & y;
                self.cpu.registers[FLAG_REGISTER] = 0;
            }
            // 8XY3 (XOR Vx, Vy)
            //
            // Performs bitwise XOR on VX and VY, and stores the result in VX.
            // VF is reset to 0.
            0x3 => {
                self.cpu.registers[vx] = x ^ y;
                self.cpu.registers[FLAG_REGISTER] = 0;
            }
            // 8XY4 (ADD Vx, Vy)
            //
            // ADDs VX to VY, and stores the result in VX.
            // Overflow is wrapped.
            // If overflow, set VF to 1, else 0.
            0x4 => {
                let (result, carry) = x.overflowing_add(y);
                self.cpu.registers[vx] = result;
                self.cpu.registers[FLAG_REGISTER] = carry as u8;
            }
            // 8XY5 (SUB Vx, Vy)
            //
            // Subtracts VY from VX, and stores the result in VX.
            // VF is set to 0 when there is a borrow, set to 1 when there isn't.
            0x5 => {
                self.cpu.registers[vx] = x.wrapping_sub(y);
                self.cpu.registers[FLAG_REGISTER] = (x >= y) as u8;
            }
            // 8XY6 (SHR Vx, Vy)
            //
            // Shift VY right by 1 and store the result in VX.
            // VF is set to the bit that was shifted out.
            // CHIP-48 and SUPER-CHIP shift VX in place instead.
            0x6 => {
                self.cpu.registers[vx] = y >> 1;
                self.cpu.registers[FLAG_REGISTER] = y & 1;
            }
            // 8XY7 (SUBN Vx, Vy)
            //
            // Subtracts VX from VY, and stores the result in VX.
            // VF is set to 0 when there is a borrow, set to 1 when there isn't.
            0x7 => {
                self.cpu.registers[vx] = y.wrapping_sub(x);
                self.cpu.registers[FLAG_REGISTER] = (y >= x) as u8;
            }
            // 8XYE (SHL Vx, Vy)
            //
            // Shift VY left by 1 and store the result in VX.
            // VF is set to the bit that was shifted out.
            // CHIP-48 and SUPER-CHIP shift VX in place instead.
            0xE => {
                self.cpu.registers[vx] = y << 1;
                self.cpu.registers[FLAG_REGISTER] = (y >> 7) & 1;
            }
            // Unsupported operation.
            _ => {
                trace!("ignored math opcode {:04X}", op.code);
            }
        }

        Flow::Ok
    }

    /// Dxyn (DRW Vx, Vy, nibble)
    ///
    /// Draw sprite to the display buffer, at coordinate as per registers Vx and Vy.
    /// Sprite is encoded as 8 pixels wide, N pixels high, stored in bits located in
    /// memory pointed to by address register I.
    ///
    /// The origin wraps around the display, but the sprite itself is clipped
    /// at the right and bottom edges.
    ///
    /// If the drawing operation erases existing pixels in the display buffer, register VF is set to
    /// 1, and set to 0 if no display bits are unset. This is used for collision detection.
    ///
    /// Only one sprite is drawn per frame. While the previous frame has not
    /// been consumed by the host the instruction stalls.
    #[inline]
    fn exec_draw(&mut self, op: Opcode) -> Flow {
        debug_assert_eq!(op.op, 0xD);

        if self.cpu.display_ready {
            self.stall();
            return Flow::DrawWait;
        }

        let x = self.cpu.registers[op.x as usize] as usize % DISPLAY_WIDTH;
        let y = self.cpu.registers[op.y as usize] as usize % DISPLAY_HEIGHT;
        let address = self.cpu.address as usize;
        let mut is_erased = false;

        self.cpu.registers[FLAG_REGISTER] = 0;

        for r in 0..op.n as usize {
            let py = y + r;
            if py >= DISPLAY_HEIGHT {
                break;
            }

            // Each row is 8 bits representing the 8 pixels of the sprite.
            let row = self.cpu.peek(address + r);

            for c in 0..8 {
                let px = x + c;
                if px >= DISPLAY_WIDTH {
                    break;
                }

                if row & (0x80 >> c) != 0 {
                    let pixel = &mut self.cpu.display[px + py * DISPLAY_WIDTH];

                    // XOR erases a pixel when both the old and new values are both 1.
                    is_erased |= *pixel == PIXEL_ON;
                    *pixel ^= PIXEL_ON;
                }
            }
        }

        // If a pixel was erased, then a collision occurred.
        self.cpu.registers[FLAG_REGISTER] = is_erased as u8;
        self.cpu.display_ready = true;

        Flow::Draw
    }

    /// Execute a keyboard instruction identified by kk.
    #[inline]
    fn exec_key(&mut self, op: Opcode) -> Flow {
        debug_assert_eq!(op.op, 0xE);
        let key = self.cpu.registers[op.x as usize];

        match op.kk {
            // Ex9E (SKP Vx)
            //
            // Skip the next instruction if the key with the value of Vx is pressed.
            0x9E => {
                if self.cpu.key_state(key) {
                    self.skip();
                }
            }
            // ExA1 (SKNP Vx)
            //
            // Skip the next instruction if the key with the value of Vx is not pressed.
            0xA1 => {
                if !self.cpu.key_state(key) {
                    self.skip();
                }
            }
            // Unsupported operation.
            _ => {
                trace!("ignored key opcode {:04X}", op.code);
            }
        }

        Flow::Ok
    }

    /// Execute a miscellaneous instruction identified by kk.
    #[inline]
    #[must_use]
    fn exec_misc(&mut self, op: Opcode) -> Flow {
        debug_assert_eq!(op.op, 0xF);
        let vx = op.x as usize;

        match op.kk {
            // Fx07 (LD Vx, DT)
            //
            // Set Vx = delay timer value.
            0x07 => {
                self.cpu.registers[vx] = self.cpu.delay_timer;
            }
            // Fx0A (LD Vx, K)
            //
            // Wait for a key press and release, store the value of the key in Vx.
            // The instruction is repeated until the key that was pressed is released.
            0x0A => match self.cpu.key_awaited {
                Some(key) if !self.cpu.key_state(key) => {
                    self.cpu.registers[vx] = key;
                    self.cpu.key_awaited = None;
                }
                Some(_) => {
                    self.stall();
                    return Flow::KeyWait;
                }
                None => {
                    self.cpu.key_awaited = self.cpu.first_key();
                    self.stall();
                    return Flow::KeyWait;
                }
            },
            // Fx15 (LD DT, Vx)
            //
            // Set delay timer = Vx.
            0x15 => {
                self.cpu.delay_timer = self.cpu.registers[vx];
            }
            // Fx18 (LD ST, Vx)
            //
            // Set sound timer = Vx.
            0x18 => {
                self.cpu.sound_timer = self.cpu.registers[vx];
                if self.cpu.sound_timer > 0 {
                    return Flow::Sound;
                }
            }
            // Fx1E (ADD I, Vx)
            //
            // Add Vx to I. VF is not affected.
            0x1E => {
                let x = self.cpu.registers[vx] as u16;
                self.cpu.address = self.cpu.address.wrapping_add(x);
            }
            // Fx29 (LD F, Vx)
            //
            // Set I = location of sprite for digit Vx.
            0x29 => {
                let x = self.cpu.registers[vx] as u16;
                self.cpu.address = FONTSET_START + x * FONTSET_HEIGHT as u16;
            }
            // Fx33 (LD B, Vx)
            //
            // Store the binary-coded decimal representation of Vx
            // in the memory locations I, I+1, and I+2.
            #[rustfmt::skip]
            0x33 => {
                let addr = self.cpu.address as usize;
                let x = self.cpu.registers[vx];
                self.cpu.poke(addr,     x / 100 % 10);
                self.cpu.poke(addr + 1, x / 10  % 10);
                self.cpu.poke(addr + 2, x       % 10);
            }
            // Fx55 (LD [I], Vx)
            //
            // Store registers V0 through Vx in memory starting at location I.
            // I is left pointing after the last stored byte, as on the COSMAC VIP.
            0x55 => {
                let addr = self.cpu.address as usize;
                for v in 0..=vx {
                    self.cpu.poke(addr + v, self.cpu.registers[v]);
                }
                self.cpu.address = self.cpu.address.wrapping_add(vx as u16 + 1);
            }
            // Fx65 (LD Vx, [I])
            //
            // Read registers V0 through Vx from memory starting at location I.
            // I is left pointing after the last loaded byte.
            0x65 => {
                let addr = self.cpu.address as usize;
                for v in 0..=vx {
                    self.cpu.registers[v] = self.cpu.peek(addr + v);
                }
                self.cpu.address = self.cpu.address.wrapping_add(vx as u16 + 1);
            }
            // Unsupported operation.
            _ => {
                trace!("ignored misc opcode {:04X}", op.code);
            }
        }

        Flow::Ok
    }
}

/// Troubleshooting
impl Chip8Vm {
    /// Returns the contents of the program memory as a human readable string.
    pub fn dump_ram(&self, count: usize) -> Result<String, fmt::Error> {
        let mut buf = String::new();

        for i in (MEM_START..(MEM_START + count).min(MEM_SIZE)).step_by(2) {
            writeln!(
                buf,
                "{:04X}: {:02X}{:02X}",
                i,
                self.cpu.ram[i],
                self.cpu.peek(i + 1)
            )?;
        }

        Ok(buf)
    }

    pub fn dump_display(&self) -> Result<String, fmt::Error> {
        let mut buf = String::new();

        for row in self.cpu.display.chunks(DISPLAY_WIDTH) {
            for px in row {
                if *px == PIXEL_ON {
                    write!(buf, "#")?;
                } else {
                    write!(buf, ".")?;
                }
            }
            writeln!(buf)?;
        }

        Ok(buf)
    }

    pub fn dump_keys(&self) -> Result<String, fmt::Error> {
        let mut buf = String::new();

        if self.cpu.any_key() {
            write!(buf, "keys:")?;
            for key in KeyCode::ALL {
                if self.cpu.key_state(key.as_u8()) {
                    write!(buf, " {key}")?;
                }
            }
        }

        Ok(buf)
    }
}
