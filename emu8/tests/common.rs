/// David Winter's Maze, drawing a random maze of diagonal lines.
#[rustfmt::skip]
pub const MAZE: &[u8] = &[
    0xA2, 0x1E, // 0200: LD I, 0x21E
    0xC2, 0x01, // 0202: RND V2, 0x01
    0x32, 0x01, // 0204: SE V2, 0x01
    0xA2, 0x1A, // 0206: LD I, 0x21A
    0xD0, 0x14, // 0208: DRW V0, V1, 4
    0x70, 0x04, // 020A: ADD V0, 0x04
    0x30, 0x40, // 020C: SE V0, 0x40
    0x12, 0x00, // 020E: JP 0x200
    0x60, 0x00, // 0210: LD V0, 0x00
    0x71, 0x04, // 0212: ADD V1, 0x04
    0x31, 0x20, // 0214: SE V1, 0x20
    0x12, 0x00, // 0216: JP 0x200
    0x12, 0x18, // 0218: JP 0x218
    0x80, 0x40, 0x20, 0x10, // 021A: sprite "\"
    0x20, 0x40, 0x80, 0x10, // 021E: sprite "/"
];
