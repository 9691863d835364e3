//! Base cycle cost of every opcode.

/// Cycles charged for each opcode before it executes.
///
/// Page-crossing penalties on indexed reads and the extra cycles of taken
/// branches are added separately. Undocumented opcodes are included; the
/// halt opcodes (CIM) are listed at 2.
#[rustfmt::skip]
pub const CYCLES: [u8; 256] = [
//  0  1  2  3  4  5  6  7  8  9  A  B  C  D  E  F
    7, 6, 2, 8, 3, 3, 5, 5, 3, 2, 2, 2, 4, 4, 6, 6, // 0
    2, 5, 2, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 7, 7, // 1
    6, 6, 2, 8, 3, 3, 5, 5, 4, 2, 2, 2, 4, 4, 6, 6, // 2
    2, 5, 2, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 7, 7, // 3
    6, 6, 2, 8, 3, 3, 5, 5, 3, 2, 2, 2, 3, 4, 6, 6, // 4
    2, 5, 2, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 7, 7, // 5
    6, 6, 2, 8, 3, 3, 5, 5, 4, 2, 2, 2, 5, 4, 6, 6, // 6
    2, 5, 2, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 7, 7, // 7
    2, 6, 2, 6, 3, 3, 3, 3, 2, 2, 2, 2, 4, 4, 4, 4, // 8
    2, 6, 2, 6, 4, 4, 4, 4, 2, 5, 2, 5, 5, 5, 5, 5, // 9
    2, 6, 2, 6, 3, 3, 3, 3, 2, 2, 2, 2, 4, 4, 4, 4, // A
    2, 5, 2, 5, 4, 4, 4, 4, 2, 4, 2, 4, 4, 4, 4, 4, // B
    2, 6, 2, 8, 3, 3, 5, 5, 2, 2, 2, 2, 4, 4, 6, 6, // C
    2, 5, 2, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 7, 7, // D
    2, 6, 2, 8, 3, 3, 5, 5, 2, 2, 2, 2, 4, 4, 6, 6, // E
    2, 5, 2, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 7, 7, // F
];

#[cfg(test)]
mod tests {
    use super::CYCLES;

    #[test]
    fn documented_costs() {
        assert_eq!(CYCLES[0xA9], 2); // LDA #
        assert_eq!(CYCLES[0xBD], 4); // LDA abs,X before page penalty
        assert_eq!(CYCLES[0x9D], 5); // STA abs,X
        assert_eq!(CYCLES[0xFE], 7); // INC abs,X
        assert_eq!(CYCLES[0x20], 6); // JSR
        assert_eq!(CYCLES[0x6C], 5); // JMP (ind)
        assert_eq!(CYCLES[0x00], 7); // BRK
    }
}
