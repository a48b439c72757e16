//! PalmDoc LZ77 decompression.
//!
//! The scheme is byte-oriented:
//! - `0x00`: literal null byte
//! - `0x01`-`0x08`: copy next `n` bytes literally
//! - `0x09`-`0x7F`: literal character
//! - `0x80`-`0xBF`: back-reference; combined with the next byte,
//!   distance = `(pair & 0x3FFF) >> 3`, length = `(pair & 7) + 3`
//! - `0xC0`-`0xFF`: space followed by `byte ^ 0x80`

use crate::error::{Error, Result};
use crate::options::Strictness;

/// Decompress a PalmDoc-compressed record.
///
/// Malformed input degrades to partial output rather than looping or reading
/// out of bounds: copy runs are clamped to the remaining input and
/// back-reference reads are bounded by the current output size. A
/// back-reference pointing before the start of output emits a zero byte in
/// [`Strictness::Lenient`] mode and fails in [`Strictness::Strict`] mode.
pub fn decompress(input: &[u8], strictness: Strictness) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(input.len() * 4);
    let mut i = 0;

    while i < input.len() {
        let c = input[i];
        i += 1;

        if (1..=8).contains(&c) {
            // Copy next 'c' bytes literally, clamped to available input.
            let count = (c as usize).min(input.len() - i);
            output.extend_from_slice(&input[i..i + count]);
            i += count;
        } else if c == 0 || (0x09..=0x7F).contains(&c) {
            output.push(c);
        } else if c >= 0xC0 {
            output.push(b' ');
            output.push(c ^ 0x80);
        } else if i < input.len() {
            // Back-reference (0x80-0xBF).
            let next = input[i];
            i += 1;

            let combined = ((c as u16) << 8) | (next as u16);
            let distance = ((combined & 0x3FFF) >> 3) as usize;
            let length = ((combined & 7) + 3) as usize;

            if distance == 0 || distance > output.len() {
                if strictness == Strictness::Strict {
                    return Err(Error::CorruptContainer(format!(
                        "back-reference distance {} exceeds {} decoded bytes",
                        distance,
                        output.len()
                    )));
                }
                // Lenient: pad with zero bytes instead of faulting.
                output.resize(output.len() + length, 0);
                continue;
            }

            for _ in 0..length {
                let byte = output[output.len() - distance];
                output.push(byte);
            }
        }
    }

    Ok(output)
}

/// PalmDoc LZ77 compression. Exists to exercise the decompressor's
/// round-trip property; record splitting is the caller's concern.
pub fn compress(input: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(input.len());
    let mut i = 0;

    while i < input.len() {
        if i > 10 && (input.len() - i) > 10 {
            let mut found = false;
            for chunk_len in (3..=10).rev() {
                if let Some(dist) = find_match(input, i, chunk_len)
                    && dist <= 2047
                {
                    let compound = (dist << 3) | (chunk_len - 3);
                    output.push(0x80 | ((compound >> 8) as u8));
                    output.push((compound & 0xFF) as u8);
                    i += chunk_len;
                    found = true;
                    break;
                }
            }
            if found {
                continue;
            }
        }

        let c = input[i];
        i += 1;

        // Space + ASCII pair packs into one byte.
        if c == b' '
            && i < input.len()
            && (0x40..=0x7F).contains(&input[i])
        {
            output.push(input[i] ^ 0x80);
            i += 1;
            continue;
        }

        if c == 0 || (c > 8 && c < 0x80) {
            output.push(c);
        } else {
            // Binary run (bytes 1-8 or >= 0x80) as a literal copy.
            let mut run = vec![c];
            while i < input.len() && run.len() < 8 {
                let next = input[i];
                if next == 0 || (next > 8 && next < 0x80) {
                    break;
                }
                run.push(next);
                i += 1;
            }
            output.push(run.len() as u8);
            output.extend_from_slice(&run);
        }
    }

    output
}

fn find_match(data: &[u8], pos: usize, len: usize) -> Option<usize> {
    if pos < len {
        return None;
    }
    let pattern = &data[pos..pos + len];
    (0..=pos - len)
        .rev()
        .find(|&i| &data[i..i + len] == pattern)
        .map(|i| pos - i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decompress_literal() {
        let output = decompress(b"Hello", Strictness::Lenient).unwrap();
        assert_eq!(output, b"Hello");
    }

    #[test]
    fn test_decompress_space_ascii() {
        // 0x41 ^ 0x80 = 0xC1 decodes to " A".
        let output = decompress(&[0xC1], Strictness::Lenient).unwrap();
        assert_eq!(output, b" A");
    }

    #[test]
    fn test_decompress_back_reference() {
        // "abc" then a back-reference of distance 3, length 3.
        let compound: u16 = (3 << 3) | 0;
        let input = [b'a', b'b', b'c', 0x80 | (compound >> 8) as u8, compound as u8];
        let output = decompress(&input, Strictness::Lenient).unwrap();
        assert_eq!(output, b"abcabc");
    }

    #[test]
    fn test_overlapping_back_reference() {
        // Distance 1, length 3 repeats the last byte.
        let compound: u16 = (1 << 3) | 0;
        let input = [b'x', 0x80 | (compound >> 8) as u8, compound as u8];
        let output = decompress(&input, Strictness::Lenient).unwrap();
        assert_eq!(output, b"xxxx");
    }

    #[test]
    fn test_out_of_range_reference_lenient_pads_zero() {
        let compound: u16 = (5 << 3) | 0;
        let input = [b'a', 0x80 | (compound >> 8) as u8, compound as u8];
        let output = decompress(&input, Strictness::Lenient).unwrap();
        assert_eq!(output, [b'a', 0, 0, 0]);
    }

    #[test]
    fn test_out_of_range_reference_strict_errors() {
        let compound: u16 = (5 << 3) | 0;
        let input = [b'a', 0x80 | (compound >> 8) as u8, compound as u8];
        let err = decompress(&input, Strictness::Strict).unwrap_err();
        assert_eq!(err.category(), "corrupt-container");
    }

    #[test]
    fn test_truncated_copy_run() {
        // Control byte says copy 8, only 2 remain.
        let output = decompress(&[8, b'a', b'b'], Strictness::Lenient).unwrap();
        assert_eq!(output, b"ab");
    }

    #[test]
    fn test_roundtrip() {
        let original = b"Hello, World! This is a test of PalmDoc compression. \
                         Repeated phrases compress well: hello world hello world.";
        let compressed = compress(original);
        let decompressed = decompress(&compressed, Strictness::Strict).unwrap();
        assert_eq!(decompressed, original);
    }

    proptest! {
        #[test]
        fn prop_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let compressed = compress(&data);
            let decompressed = decompress(&compressed, Strictness::Strict).unwrap();
            prop_assert_eq!(decompressed, data);
        }

        #[test]
        fn prop_decompress_never_panics(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let _ = decompress(&data, Strictness::Lenient);
        }
    }
}
