//! Base64 variable-length quantities
//!
//! Each value is stored sign-in-lowest-bit, then split into 5-bit groups,
//! least significant first; bit 6 of each digit flags a continuation.

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

const CONTINUATION: u32 = 0b10_0000;
const MASK: u32 = 0b01_1111;
const SHIFT: u32 = 5;

fn digit_value(c: u8) -> Option<u32> {
    match c {
        b'A'..=b'Z' => Some((c - b'A') as u32),
        b'a'..=b'z' => Some((c - b'a') as u32 + 26),
        b'0'..=b'9' => Some((c - b'0') as u32 + 52),
        b'+' => Some(62),
        b'/' => Some(63),
        _ => None,
    }
}

/// Append the VLQ encoding of `value` to `out`
pub fn encode(value: i64, out: &mut String) {
    let mut vlq: u64 = if value < 0 {
        ((value.unsigned_abs()) << 1) | 1
    } else {
        (value as u64) << 1
    };
    loop {
        let mut digit = (vlq & MASK as u64) as u32;
        vlq >>= SHIFT;
        if vlq > 0 {
            digit |= CONTINUATION;
        }
        out.push(ALPHABET[digit as usize] as char);
        if vlq == 0 {
            break;
        }
    }
}

/// Decode every value in one segment (`"AAgBC"` -> `[0, 0, 16, 1]`)
pub fn decode(segment: &str) -> Option<Vec<i64>> {
    let mut values = Vec::new();
    let mut acc: u64 = 0;
    let mut shift: u32 = 0;
    let mut pending = false;
    for c in segment.bytes() {
        let digit = digit_value(c)?;
        if shift >= 64 {
            return None;
        }
        acc |= ((digit & MASK) as u64) << shift;
        if digit & CONTINUATION != 0 {
            shift += SHIFT;
            pending = true;
            continue;
        }
        let magnitude = (acc >> 1) as i64;
        values.push(if acc & 1 == 1 { -magnitude } else { magnitude });
        acc = 0;
        shift = 0;
        pending = false;
    }
    if pending {
        return None;
    }
    Some(values)
}
