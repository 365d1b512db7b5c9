//! x86 jump and NOP encoding
//!
//! The hook model is the classic 5-byte `jmp rel32`: one opcode byte plus a
//! little-endian 32-bit displacement relative to the address immediately
//! after the jump instruction. Displacement math is done in wrapping 32-bit
//! arithmetic, which is also how a rel32 reaches "backwards" targets.

/// `jmp rel32` opcode
pub const JMP_REL32: u8 = 0xE9;

/// total size of a `jmp rel32` instruction
pub const JMP_REL32_SIZE: usize = 5;

/// single-byte NOP opcode
pub const NOP: u8 = 0x90;

/// rel32 displacement for a jump placed at `source` that lands on `target`
///
/// the displacement is relative to the end of the 5-byte instruction,
/// i.e. `target - (source + 5)`, truncated to 32 bits.
pub fn rel32_displacement(source: usize, target: usize) -> i32 {
    (target as i32).wrapping_sub((source as i32).wrapping_add(JMP_REL32_SIZE as i32))
}

/// encode a complete `jmp rel32` at `source` landing on `target`
pub fn jmp_rel32(source: usize, target: usize) -> [u8; JMP_REL32_SIZE] {
    let disp = rel32_displacement(source, target).to_le_bytes();
    [JMP_REL32, disp[0], disp[1], disp[2], disp[3]]
}
