/*
 * base64.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Mailsift, a filtered mailbox retrieval service.
 *
 * Mailsift is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Mailsift is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Mailsift.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Base64 decoder for Content-Transfer-Encoding (RFC 2045) and RFC 2047 "B" encoded-words.

use std::sync::OnceLock;

const INVALID: i8 = -1;
const WHITESPACE: i8 = -2;

fn decode_table() -> &'static [i8; 256] {
    static TABLE: OnceLock<[i8; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut t = [INVALID; 256];
        t[32] = WHITESPACE;
        t[9] = WHITESPACE;
        t[13] = WHITESPACE;
        t[10] = WHITESPACE;
        for i in 0..26u8 {
            t[(b'A' + i) as usize] = i as i8;
            t[(b'a' + i) as usize] = (26 + i) as i8;
        }
        for i in 0..10u8 {
            t[(b'0' + i) as usize] = (52 + i) as i8;
        }
        t[b'+' as usize] = 62;
        t[b'/' as usize] = 63;
        t
    })
}

/// Decode a body. Bytes outside the alphabet are skipped and a dangling partial quantum is dropped.
pub fn decode(src: &[u8]) -> Vec<u8> {
    decode_with(src, false).unwrap_or_default()
}

/// Decode an encoded-word payload. None on a byte outside the alphabet or a truncated
/// quantum (one leftover character); missing `=` padding is tolerated.
pub fn decode_strict(src: &[u8]) -> Option<Vec<u8>> {
    decode_with(src, true)
}

fn decode_with(src: &[u8], strict: bool) -> Option<Vec<u8>> {
    let table = decode_table();
    let mut out = Vec::with_capacity(src.len() * 3 / 4);
    let mut quantum: u32 = 0;
    let mut bits: u32 = 0;
    let mut symbols = 0usize;
    for &b in src {
        let val = table[b as usize];
        if val >= 0 {
            quantum = (quantum << 6) | val as u32;
            bits += 6;
            symbols += 1;
            if bits >= 8 {
                bits -= 8;
                out.push((quantum >> bits) as u8);
                quantum &= (1 << bits) - 1;
            }
        } else if val == WHITESPACE {
            continue;
        } else if b == b'=' {
            break;
        } else if strict {
            return None;
        }
    }
    if strict && symbols % 4 == 1 {
        return None;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folded_body() {
        assert_eq!(decode(b"SGVsbG8s\r\nIHdvcmxk\r\nIQ==\r\n"), b"Hello, world!");
    }

    #[test]
    fn lenient_skips_garbage() {
        assert_eq!(decode(b"SGV*sbG8="), b"Hello");
    }

    #[test]
    fn strict_rejects_bad_input() {
        assert_eq!(decode_strict(b"SGVsbG8").as_deref(), Some(&b"Hello"[..]));
        assert!(decode_strict(b"SGV*sbG8=").is_none());
        assert!(decode_strict(b"SGVsb").is_none());
    }
}
