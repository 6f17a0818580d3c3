//! Modified UTF-8, the string encoding of `CONSTANT_Utf8` entries.
//!
//! Differs from standard UTF-8 in two places: NUL is written as `C0 80`
//! and supplementary characters are written as two 3-byte surrogates.

use super::ClassFormatError;

pub fn encode(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for ch in text.chars() {
        let code = ch as u32;
        match code {
            0 => out.extend_from_slice(&[0xC0, 0x80]),
            0x01..=0x7F => out.push(code as u8),
            0x80..=0x7FF => {
                out.push(0xC0 | (code >> 6) as u8);
                out.push(0x80 | (code & 0x3F) as u8);
            }
            0x800..=0xFFFF => push_three(&mut out, code as u16),
            _ => {
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    push_three(&mut out, *unit);
                }
            }
        }
    }
    out
}

fn push_three(out: &mut Vec<u8>, unit: u16) {
    out.push(0xE0 | (unit >> 12) as u8);
    out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
    out.push(0x80 | (unit & 0x3F) as u8);
}

pub fn decode(bytes: &[u8]) -> Result<String, ClassFormatError> {
    // Plain UTF-8 never contains C0 80 or encoded surrogates
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok(text.to_string());
    }

    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = bytes[i];
        if b0 & 0x80 == 0 {
            units.push(b0 as u16);
            i += 1;
        } else if b0 & 0xE0 == 0xC0 {
            let b1 = continuation(bytes, i + 1)?;
            units.push((((b0 & 0x1F) as u16) << 6) | b1);
            i += 2;
        } else if b0 & 0xF0 == 0xE0 {
            let b1 = continuation(bytes, i + 1)?;
            let b2 = continuation(bytes, i + 2)?;
            units.push((((b0 & 0x0F) as u16) << 12) | (b1 << 6) | b2);
            i += 3;
        } else {
            return Err(ClassFormatError::attribute(
                "CONSTANT_Utf8",
                format!("invalid lead byte {b0:#04x}"),
            ));
        }
    }

    String::from_utf16(&units)
        .map_err(|_| ClassFormatError::attribute("CONSTANT_Utf8", "unpaired surrogate"))
}

fn continuation(bytes: &[u8], at: usize) -> Result<u16, ClassFormatError> {
    match bytes.get(at) {
        Some(b) if b & 0xC0 == 0x80 => Ok((b & 0x3F) as u16),
        _ => Err(ClassFormatError::attribute(
            "CONSTANT_Utf8",
            "truncated multi-byte sequence",
        )),
    }
}
