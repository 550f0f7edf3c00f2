use std::env;
use std::fs;

use anyhow::{Context, Result};
use dragons_formats::InstructionIter;

fn main() -> Result<()> {
    let path = env::args()
        .nth(1)
        .context("usage: script_dump <raw script buffer>")?;
    let code = fs::read(&path).with_context(|| format!("reading script buffer {path}"))?;
    let mut consumed = 0;
    for instruction in InstructionIter::new(&code, 0) {
        println!(
            "{offset:04X}  op 0x{op:02X}  {operands:02X?}",
            offset = instruction.offset,
            op = instruction.word & 0x7fff,
            operands = instruction.operands
        );
        consumed = instruction.next_offset();
    }
    if consumed < code.len() {
        println!(
            "{:04X}  <{} trailing bytes do not frame an instruction>",
            consumed,
            code.len() - consumed
        );
    }
    Ok(())
}
