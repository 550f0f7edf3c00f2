use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;

use anyhow::{Context, Result, bail, ensure};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

const SEQUENCE_MAGIC: &[u8; 4] = b"DSEQ";

/// Sequence table and bytecode of one actor resource.
///
/// Layout: `DSEQ`, a `u16` sequence count, one `u32` offset per sequence
/// (relative to the start of the code block), then the code block itself.
/// Frame pixel data lives elsewhere; the sequence code only carries frame
/// offsets that the renderer resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorResource {
    sequence_offsets: Vec<u32>,
    code: Vec<u8>,
}

impl ActorResource {
    pub fn from_parts(sequence_offsets: Vec<u32>, code: Vec<u8>) -> Result<Self> {
        for (id, offset) in sequence_offsets.iter().enumerate() {
            ensure!(
                (*offset as usize) < code.len(),
                "sequence {id} starts at {offset:#x}, beyond the {} byte code block",
                code.len()
            );
        }
        Ok(Self {
            sequence_offsets,
            code,
        })
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let mut magic = [0u8; 4];
        cursor
            .read_exact(&mut magic)
            .context("reading actor resource magic")?;
        if &magic != SEQUENCE_MAGIC {
            bail!("actor resource missing DSEQ signature");
        }

        let count = cursor
            .read_u16::<LittleEndian>()
            .context("reading sequence count")? as usize;
        let mut offsets = Vec::with_capacity(count);
        for index in 0..count {
            let offset = cursor
                .read_u32::<LittleEndian>()
                .with_context(|| format!("reading offset of sequence {index}"))?;
            offsets.push(offset);
        }

        let code_start = cursor.position() as usize;
        let code = bytes[code_start..].to_vec();
        Self::from_parts(offsets, code)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("reading actor resource {}", path.display()))?;
        Self::parse(&bytes).with_context(|| format!("parsing actor resource {}", path.display()))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(6 + self.sequence_offsets.len() * 4 + self.code.len());
        out.extend_from_slice(SEQUENCE_MAGIC);
        let _ = out.write_u16::<LittleEndian>(self.sequence_offsets.len() as u16);
        for offset in &self.sequence_offsets {
            let _ = out.write_u32::<LittleEndian>(*offset);
        }
        out.extend_from_slice(&self.code);
        out
    }

    pub fn sequence_count(&self) -> usize {
        self.sequence_offsets.len()
    }

    pub fn sequence_offset(&self, sequence_id: u16) -> Option<usize> {
        self.sequence_offsets
            .get(sequence_id as usize)
            .map(|offset| *offset as usize)
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }
}
