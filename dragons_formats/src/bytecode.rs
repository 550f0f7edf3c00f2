//! Instruction framing shared by the sequence and script interpreters.
//!
//! Every instruction starts with a little-endian opcode word followed by a
//! little-endian operand length, then that many operand bytes. The framing
//! says nothing about what an opcode means; the interpreters own that.

use std::io::{self, Cursor, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

/// Opcode word plus operand length word.
pub const HEADER_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction<'a> {
    pub offset: usize,
    pub word: u16,
    pub operands: &'a [u8],
}

impl<'a> Instruction<'a> {
    /// Decodes the instruction at `offset`. Returns `None` when the header or
    /// the declared operand bytes run past the end of `code`.
    pub fn decode(code: &'a [u8], offset: usize) -> Option<Self> {
        let header = code.get(offset..offset.checked_add(HEADER_LEN)?)?;
        let word = u16::from_le_bytes([header[0], header[1]]);
        let operand_len = u16::from_le_bytes([header[2], header[3]]) as usize;
        let start = offset + HEADER_LEN;
        let operands = code.get(start..start.checked_add(operand_len)?)?;
        Some(Self {
            offset,
            word,
            operands,
        })
    }

    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.operands.len()
    }

    pub fn next_offset(&self) -> usize {
        self.offset + self.encoded_len()
    }

    pub fn operands(&self) -> Operands<'a> {
        Operands::new(self.operands)
    }
}

/// Sequential little-endian reader over an instruction's operand bytes.
pub struct Operands<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> Operands<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(bytes),
        }
    }

    pub fn read_u8(&mut self) -> io::Result<u8> {
        self.cursor.read_u8()
    }

    pub fn read_i8(&mut self) -> io::Result<i8> {
        self.cursor.read_i8()
    }

    pub fn read_u16(&mut self) -> io::Result<u16> {
        self.cursor.read_u16::<LittleEndian>()
    }

    pub fn read_i16(&mut self) -> io::Result<i16> {
        self.cursor.read_i16::<LittleEndian>()
    }

    pub fn remaining(&self) -> usize {
        let len = self.cursor.get_ref().len() as u64;
        len.saturating_sub(self.cursor.position()) as usize
    }
}

/// Walks a buffer instruction by instruction until the framing breaks or the
/// buffer ends. Used by the dump tools; the interpreters decode one
/// instruction at a time because jumps move the cursor.
pub struct InstructionIter<'a> {
    code: &'a [u8],
    offset: usize,
}

impl<'a> InstructionIter<'a> {
    pub fn new(code: &'a [u8], offset: usize) -> Self {
        Self { code, offset }
    }
}

impl<'a> Iterator for InstructionIter<'a> {
    type Item = Instruction<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let instruction = Instruction::decode(self.code, self.offset)?;
        self.offset = instruction.next_offset();
        Some(instruction)
    }
}

/// Assembles bytecode buffers. Operands are written as 16-bit words unless
/// raw bytes are supplied.
#[derive(Debug, Default, Clone)]
pub struct ProgramBuilder {
    bytes: Vec<u8>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset the next instruction will be written at.
    pub fn position(&self) -> usize {
        self.bytes.len()
    }

    pub fn op(self, word: u16, args: &[i16]) -> Self {
        let mut operands = Vec::with_capacity(args.len() * 2);
        for arg in args {
            // Writing into a Vec cannot fail.
            let _ = operands.write_i16::<LittleEndian>(*arg);
        }
        self.op_bytes(word, &operands)
    }

    pub fn op_bytes(mut self, word: u16, operands: &[u8]) -> Self {
        let _ = self.bytes.write_u16::<LittleEndian>(word);
        let _ = self.bytes.write_u16::<LittleEndian>(operands.len() as u16);
        let _ = self.bytes.write_all(operands);
        self
    }

    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}
