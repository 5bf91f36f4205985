//! # cpu
//!
//! Processor state the opcode table works on. The core only ever touches the
//! delay timer (the 60 Hz countdown), the graphics buffer and, on reset, the
//! registers, stack and PC; everything else belongs to the `Processor`.
use crate::display::{GfxBuffer, Resolution, SharedGfx};
use crate::memory::{Chip8MemoryMap, CHIP8_PROGRAM_ADDR};
use std::io;
use std::sync::Arc;

pub const REGISTER_COUNT: usize = 0x10;
pub const STACK_DEPTH: usize = 0x10;

pub struct CpuState {
    pub memory: Chip8MemoryMap,
    pub v: [u8; REGISTER_COUNT],
    pub i: u16,
    pub pc: u16,
    pub stack: Vec<u16>,
    pub delay_timer: u8,
    pub sound_timer: u8,
    gfx: SharedGfx,
}

impl CpuState {
    pub fn new(gfx_res: Resolution) -> Self {
        CpuState {
            memory: Chip8MemoryMap::new(),
            v: [0; REGISTER_COUNT],
            i: 0,
            pc: CHIP8_PROGRAM_ADDR,
            stack: Vec::with_capacity(STACK_DEPTH),
            delay_timer: 0,
            sound_timer: 0,
            gfx: GfxBuffer::shared(gfx_res),
        }
    }

    /// the buffer shared with the render plugin
    pub fn gfx(&self) -> SharedGfx {
        Arc::clone(&self.gfx)
    }

    pub fn gfx_resolution(&self) -> Resolution {
        self.gfx.read().resolution()
    }

    pub fn load_program(&mut self, reader: &mut impl io::Read) -> Result<usize, io::Error> {
        self.memory.load_program(reader)
    }

    /// push a return address; false on overflow
    pub fn push(&mut self, addr: u16) -> bool {
        if self.stack.len() >= STACK_DEPTH {
            return false;
        }
        self.stack.push(addr);
        true
    }

    pub fn pop(&mut self) -> Option<u16> {
        self.stack.pop()
    }

    pub fn clean_gfx(&mut self) {
        self.gfx.write().clear();
    }

    pub fn clean_stack(&mut self) {
        self.stack.clear();
    }

    pub fn clean_registers(&mut self) {
        self.v = [0; REGISTER_COUNT];
        self.i = 0;
        self.delay_timer = 0;
        self.sound_timer = 0;
    }

    pub fn set_pc(&mut self, pc: u16) {
        self.pc = pc;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_program() {
        let c = CpuState::new(Resolution::mono(64, 32));
        assert_eq!(c.pc, 0x200);
        assert_eq!(c.gfx_resolution(), Resolution::mono(64, 32));
    }

    #[test]
    fn test_stack_depth() {
        let mut c = CpuState::new(Resolution::mono(64, 32));
        for n in 0..STACK_DEPTH as u16 {
            assert!(c.push(0x200 + n));
        }
        assert!(!c.push(0x300));
        assert_eq!(c.pop(), Some(0x20f));
    }

    #[test]
    fn test_clean_helpers() {
        let mut c = CpuState::new(Resolution::mono(64, 32));
        c.v[3] = 9;
        c.delay_timer = 40;
        c.push(0x222);
        c.gfx().write().set_pixel(1, 1, true);
        c.clean_registers();
        c.clean_stack();
        c.clean_gfx();
        assert_eq!(c.v, [0; REGISTER_COUNT]);
        assert_eq!(c.delay_timer, 0);
        assert!(c.stack.is_empty());
        assert!(!c.gfx().read().pixel(1, 1));
    }

    #[test]
    fn test_gfx_is_shared() {
        let c = CpuState::new(Resolution::mono(64, 32));
        let other = c.gfx();
        other.write().set_pixel(0, 0, true);
        assert!(c.gfx().read().pixel(0, 0));
    }

    #[test]
    fn test_load_program() -> Result<(), io::Error> {
        let mut c = CpuState::new(Resolution::mono(64, 32));
        let mut prog: &[u8] = &[0xf0, 0x0a];
        assert_eq!(c.load_program(&mut prog)?, 2);
        use crate::memory::MemoryMap;
        assert_eq!(c.memory.get_word(0x200), 0xf00a);
        Ok(())
    }
}
