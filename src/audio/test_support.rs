//! Synthetic MPEG streams for tests. Payload bytes are filler; only the
//! headers and frame lengths have to be right for scanning and trimming.

/// A frame header plus the full frame length it implies.
pub type TestHeader = ([u8; 4], usize);

/// MPEG-1 Layer III, 128 kbps, 48 kHz: 384-byte frames of 24 ms.
pub const MPEG1_L3_128K_48K: TestHeader = ([0xFF, 0xFB, 0x94, 0x00], 384);
/// MPEG-2 Layer III, 64 kbps, 24 kHz: 192-byte frames of 24 ms.
pub const MPEG2_L3_64K_24K: TestHeader = ([0xFF, 0xF3, 0x84, 0x00], 192);
/// MPEG-1 Layer I, 32 kbps, 48 kHz: 32-byte frames of 8 ms.
pub const MPEG1_L1_32K_48K: TestHeader = ([0xFF, 0xFF, 0x14, 0x00], 32);

/// `count` back-to-back frames; frame `i` is filled with `i % 200`, which
/// never forms a sync word.
pub fn build_stream((header, len): TestHeader, count: usize) -> Vec<u8> {
    let mut buf = Vec::with_capacity(len * count);
    for i in 0..count {
        buf.extend_from_slice(&header);
        buf.extend(std::iter::repeat((i % 200) as u8).take(len - header.len()));
    }
    buf
}

/// Seconds of 24 ms MPEG-1 Layer III frames.
pub fn stream_of_secs(secs: usize) -> Vec<u8> {
    build_stream(MPEG1_L3_128K_48K, secs * 1_000_000 / 24_000)
}

/// An ID3v2.4 tag with `size` zeroed body bytes and no footer.
pub fn id3v2_tag(size: usize) -> Vec<u8> {
    let mut tag = b"ID3\x04\x00\x00".to_vec();
    tag.extend([
        ((size >> 21) & 0x7F) as u8,
        ((size >> 14) & 0x7F) as u8,
        ((size >> 7) & 0x7F) as u8,
        (size & 0x7F) as u8,
    ]);
    tag.extend(std::iter::repeat(0u8).take(size));
    tag
}

/// A 128-byte ID3v1 trailer with empty fields.
pub fn id3v1_trailer() -> Vec<u8> {
    let mut tag = vec![0u8; 128];
    tag[..3].copy_from_slice(b"TAG");
    tag
}
