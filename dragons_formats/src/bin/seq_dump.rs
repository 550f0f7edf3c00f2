use std::env;

use anyhow::{Context, Result};
use dragons_formats::{ActorResource, InstructionIter};

fn main() -> Result<()> {
    let path = env::args()
        .nth(1)
        .context("usage: seq_dump <actor sequence resource>")?;
    let resource = ActorResource::open(&path)?;
    println!(
        "{} sequences, {} code bytes in {}",
        resource.sequence_count(),
        resource.code().len(),
        path
    );
    for id in 0..resource.sequence_count() as u16 {
        let Some(start) = resource.sequence_offset(id) else {
            continue;
        };
        println!("\nsequence {id:>3} @ 0x{start:04X}");
        for instruction in InstructionIter::new(resource.code(), start) {
            println!(
                "  {offset:04X}  op {op:>3}  {operands:02X?}",
                offset = instruction.offset,
                op = instruction.word & 0xff,
                operands = instruction.operands
            );
            // Halting opcodes end the straight-line listing.
            if matches!(instruction.word & 0xff, 2 | 3 | 5 | 7 | 9 | 19) {
                break;
            }
        }
    }
    Ok(())
}
