use std::io;
use std::io::Read;

// NB. addresses are u16 as per the chip-8; lengths are usize to stop endless casting

/// Represents memory map, ROM, RAM etc.
pub trait MemoryMap {
    /// write unknown len of data into memory at a particular address
    fn write_any(&mut self, reader: &mut impl io::Read, addr: u16) -> Result<usize, io::Error> {
        let mut buf = Vec::new();
        let len = reader.read_to_end(&mut buf)?;
        self.write(buf.as_slice(), addr, len)?;
        Ok(len)
    }

    /// write a chunk of bytes into "RAM"
    fn write(&mut self, data: &[u8], addr: u16, len: usize) -> Result<(), io::Error> {
        if addr as usize + len > self.size() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} bytes at 0x{:04x} do not fit in memory", len, addr),
            ));
        }
        let bytes = self.get_rw_slice(addr, len);
        let mut d: &[u8] = data;
        d.read_exact(bytes)?;
        Ok(())
    }

    /// get a two-byte word (opcodes, stack)
    fn get_word(&self, addr: u16) -> u16 {
        let word = self.get_ro_slice(addr, 2);
        ((word[0] as u16) << 8) + (word[1] as u16)
    }

    fn size(&self) -> usize;

    /// get a r/w slice of the underlying memory (heap)
    fn get_rw_slice(&mut self, addr: u16, len: usize) -> &mut [u8];

    /// get a r/o slice of the underlying memory (heap)
    fn get_ro_slice(&self, addr: u16, len: usize) -> &[u8];
}

/// Defines the CHIP-8 4K memory map
///   0x0000-0x01ff  interpreter (font at 0x050)
///   0x0200-0x0fff  program
pub struct Chip8MemoryMap {
    bytes: Box<[u8]>,
    pub program_addr: u16,
    pub font_addr: u16,
}

impl MemoryMap for Chip8MemoryMap {
    fn size(&self) -> usize {
        self.bytes.len()
    }
    fn get_rw_slice(&mut self, addr: u16, len: usize) -> &mut [u8] {
        let a = addr as usize;
        &mut self.bytes[a..(a + len)]
    }
    fn get_ro_slice(&self, addr: u16, len: usize) -> &[u8] {
        let a = addr as usize;
        &self.bytes[a..(a + len)]
    }
}

/// how much RAM we have
pub const CHIP8_RAM_SIZE_BYTES: u16 = 4096;

/// where the program is loaded and where reset puts the PC
pub const CHIP8_PROGRAM_ADDR: u16 = 0x0200;

impl Chip8MemoryMap {
    /// initialises CHIP-8 with contemporary memory contents
    pub fn new() -> Self {
        let mut bytes = vec![0u8; CHIP8_RAM_SIZE_BYTES as usize].into_boxed_slice();
        let font = CHIP8_CONTEMPORARY_FONT_ADDR as usize;
        bytes[font..font + CHIP8_CONTEMPORARY_FONT.len()].copy_from_slice(&CHIP8_CONTEMPORARY_FONT);
        Chip8MemoryMap {
            bytes,
            program_addr: CHIP8_PROGRAM_ADDR,
            font_addr: CHIP8_CONTEMPORARY_FONT_ADDR,
        }
    }

    /// load a CHIP-8 program at 0x200, returning its length
    pub fn load_program(&mut self, reader: &mut impl io::Read) -> Result<usize, io::Error> {
        self.write_any(reader, self.program_addr)
    }

    /// address of the 5-byte glyph for hex digit `digit`
    pub fn glyph_addr(&self, digit: u8) -> u16 {
        self.font_addr + 5 * u16::from(digit & 0x0f)
    }
}

impl Default for Chip8MemoryMap {
    fn default() -> Self {
        Self::new()
    }
}

const CHIP8_CONTEMPORARY_FONT_ADDR: u16 = 0x050;
const CHIP8_CONTEMPORARY_FONT: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_zeroed() {
        let m = Chip8MemoryMap::new();
        // NB. memory is zeroed from 0x200 because before that we bake in the
        //     font
        assert_eq!(m.bytes[0x200..], [0; 0xe00]);
    }

    #[test]
    fn test_font_loaded() {
        let m = Chip8MemoryMap::new();
        assert_eq!(m.get_ro_slice(m.glyph_addr(0x0), 5), &[0xF0, 0x90, 0x90, 0x90, 0xF0]);
        assert_eq!(m.get_ro_slice(m.glyph_addr(0xf), 5), &[0xF0, 0x80, 0xF0, 0x80, 0x80]);
    }

    #[test]
    fn test_write_any_data_ok() -> Result<(), io::Error> {
        let mut dst = Chip8MemoryMap::new();
        let mut src: &[u8] = &[0, 1, 2, 3, 4, 5, 6, 7];
        assert_eq!(dst.write_any(&mut src, 0x300)?, 8);
        assert_eq!(dst.get_ro_slice(0x2f8, 16), &[0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7]);
        Ok(())
    }

    #[test]
    fn test_read_word() -> Result<(), io::Error> {
        let mut m = Chip8MemoryMap::new();
        let src: &[u8] = &[0, 1, 2, 3, 4, 5, 6, 7];
        m.write(src, 0x200, 8)?;
        assert_eq!(m.get_word(0x204), 0x0405);
        Ok(())
    }

    #[test]
    fn test_write_too_much_rejected() {
        let mut dst = Chip8MemoryMap::new();
        let mut src: &[u8] = &[0; 8];
        let err = dst.write_any(&mut src, 4089).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_program_load_ok() -> Result<(), io::Error> {
        let mut dst = Chip8MemoryMap::new();
        let mut prog: &[u8] = &[0x00, 0xe0]; // clear screen
        dst.load_program(&mut prog)?;
        assert_eq!(dst.get_ro_slice(0x200, 2), &[0x00, 0xe0]);
        Ok(())
    }
}
