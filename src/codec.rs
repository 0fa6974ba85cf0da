//! Constrained Base64 codec with PEM-style line handling
//!
//! Three output layouts are supported: `Standard` (a line terminator after
//! every 64 encoded characters and after the final group), `EscapedNewline`
//! (the same layout, but `+`, `=` and the terminator are emitted as the
//! percent triples `%2B`, `%3D`, `%0A` so the text can live inside a query
//! string), and `NoNewline` (data and padding characters only).
//!
//! Every entry point exists in two forms: a buffer-level call that fills a
//! caller-owned slice and reports how many bytes it wrote, and an allocating
//! convenience wrapper. `encoded_len` supports the size-then-fill protocol:
//! it returns the exact byte count a subsequent `encode_into` will produce
//! without writing anything.

use thiserror::Error;

/// Width of a PEM-style output line, in encoded characters.
const PEM_LINE_WIDTH: usize = 64;

/// Encoded groups per output line.
const GROUPS_PER_LINE: usize = PEM_LINE_WIDTH / 4;

const PAD: u8 = b'=';

const ENCODE_TABLE: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Marks a byte inside the alphabet's code-point range with no entry.
const BAD: u8 = 0xff;

/// Decode table indexed from `+` (0x2B) through `z` (0x7A).
const DECODE_TABLE: [u8; 80] = [
    62, BAD, BAD, BAD, 63, // + , - . /
    52, 53, 54, 55, 56, 57, 58, 59, 60, 61, // 0-9
    BAD, BAD, BAD, BAD, BAD, BAD, BAD, // : ; < = > ? @
    0, 1, 2, 3, 4, 5, 6, 7, 8, 9, // A-J
    10, 11, 12, 13, 14, 15, 16, 17, 18, 19, // K-T
    20, 21, 22, 23, 24, 25, // U-Z
    BAD, BAD, BAD, BAD, BAD, BAD, // [ \ ] ^ _ `
    26, 27, 28, 29, 30, 31, 32, 33, 34, 35, // a-j
    36, 37, 38, 39, 40, 41, 42, 43, 44, 45, // k-t
    46, 47, 48, 49, 50, 51, // u-z
];

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Base64Error {
    /// A byte outside the Base64 alphabet was found while decoding.
    #[error("invalid base64 byte 0x{byte:02x} at offset {offset}")]
    InvalidCharacter { byte: u8, offset: usize },

    /// The caller-supplied output buffer cannot hold the result.
    #[error("output buffer too small: need {needed} bytes, capacity is {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },

    /// The pre-computed encoded size disagrees with the bytes actually
    /// written. Indicates a defect in the codec, not a caller error.
    #[error("encoded size mismatch: sized {expected} bytes, wrote {written}")]
    SizeMismatch { expected: usize, written: usize },
}

/// Output layout, selected per encode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingMode {
    /// PEM style: `\n` after every 64 encoded characters and after the
    /// final group.
    Standard,
    /// Like `Standard`, but `+`, `=` and the line terminator become
    /// `%2B`, `%3D` and `%0A`.
    EscapedNewline,
    /// Data and padding characters only.
    NoNewline,
}

/// Exact number of bytes `encode_into` will write for `input` in `mode`.
///
/// Standard and NoNewline sizes are closed-form; EscapedNewline depends on
/// which characters the input encodes to, so the escape overhead is counted
/// by scanning the input. Nothing is written.
pub fn encoded_len(input: &[u8], mode: EncodingMode) -> usize {
    if input.is_empty() {
        return 0;
    }
    let groups = input.len().div_ceil(3);
    let data = groups * 4;
    let terminators = (groups - 1) / GROUPS_PER_LINE + 1;
    match mode {
        EncodingMode::NoNewline => data,
        EncodingMode::Standard => data + terminators,
        EncodingMode::EscapedNewline => data + terminators * 3 + escape_overhead(input),
    }
}

/// Extra bytes EscapedNewline spends on `+` and `=` output characters,
/// excluding line terminators. Each escape replaces one byte with three.
fn escape_overhead(input: &[u8]) -> usize {
    let mut plus = 0usize;
    for chunk in input.chunks(3) {
        let b0 = chunk[0] as u32;
        let b1 = chunk.get(1).copied().unwrap_or(0) as u32;
        let b2 = chunk.get(2).copied().unwrap_or(0) as u32;
        let triple = (b0 << 16) | (b1 << 8) | b2;

        // a short final chunk emits only 2 or 3 data characters
        let symbols = chunk.len() + 1;
        for s in 0..symbols {
            if (triple >> (18 - 6 * s)) & 0x3f == 62 {
                plus += 1;
            }
        }
    }
    let pads = (3 - input.len() % 3) % 3;
    (plus + pads) * 2
}

struct Emitter<'a> {
    out: Option<&'a mut [u8]>,
    pos: usize,
    escape: bool,
}

impl Emitter<'_> {
    /// Emit one output character, substituting its percent triple when the
    /// escaped layout calls for it.
    fn emit(&mut self, ch: u8) -> Result<(), Base64Error> {
        if self.escape {
            match ch {
                b'+' => return self.raw(b"%2B"),
                b'=' => return self.raw(b"%3D"),
                b'\n' => return self.raw(b"%0A"),
                _ => {}
            }
        }
        self.raw(&[ch])
    }

    fn raw(&mut self, bytes: &[u8]) -> Result<(), Base64Error> {
        if let Some(out) = self.out.as_deref_mut() {
            let end = self.pos + bytes.len();
            if end > out.len() {
                return Err(Base64Error::BufferTooSmall {
                    needed: end,
                    capacity: out.len(),
                });
            }
            out[self.pos..end].copy_from_slice(bytes);
        }
        self.pos += bytes.len();
        Ok(())
    }
}

fn encode_inner(
    input: &[u8],
    out: Option<&mut [u8]>,
    mode: EncodingMode,
) -> Result<usize, Base64Error> {
    let wrap = mode != EncodingMode::NoNewline;
    let mut w = Emitter {
        out,
        pos: 0,
        escape: mode == EncodingMode::EscapedNewline,
    };

    let mut chunks = input.chunks_exact(3);
    let mut groups = 0usize;
    let mut remaining = input.len();
    for chunk in chunks.by_ref() {
        let (b1, b2, b3) = (chunk[0], chunk[1], chunk[2]);

        w.emit(ENCODE_TABLE[(b1 >> 2) as usize])?;
        w.emit(ENCODE_TABLE[(((b1 & 0x03) << 4) | (b2 >> 4)) as usize])?;
        w.emit(ENCODE_TABLE[(((b2 & 0x0f) << 2) | (b3 >> 6)) as usize])?;
        w.emit(ENCODE_TABLE[(b3 & 0x3f) as usize])?;

        remaining -= 3;
        groups += 1;
        if wrap && groups % GROUPS_PER_LINE == 0 && remaining > 0 {
            w.emit(b'\n')?;
        }
    }

    // final partial group: 2 leftover bytes emit 3 data characters + 1 pad,
    // 1 leftover byte emits 2 data characters + 2 pads
    let rest = chunks.remainder();
    if !rest.is_empty() {
        let b1 = rest[0];
        let b2 = rest.get(1).copied().unwrap_or(0);

        w.emit(ENCODE_TABLE[(b1 >> 2) as usize])?;
        w.emit(ENCODE_TABLE[(((b1 & 0x03) << 4) | (b2 >> 4)) as usize])?;
        if rest.len() == 2 {
            w.emit(ENCODE_TABLE[((b2 & 0x0f) << 2) as usize])?;
        } else {
            w.emit(PAD)?;
        }
        w.emit(PAD)?;
    }

    if wrap && !input.is_empty() {
        w.emit(b'\n')?;
    }

    Ok(w.pos)
}

/// Encode `input` into the caller-owned `out`, returning the byte count
/// written.
///
/// The required capacity is computed before anything is written; a short
/// buffer fails with `BufferTooSmall` and leaves `out` untouched. The write
/// is then cross-checked against the pre-computed size.
pub fn encode_into(input: &[u8], out: &mut [u8], mode: EncodingMode) -> Result<usize, Base64Error> {
    let needed = encoded_len(input, mode);
    if needed > out.len() {
        return Err(Base64Error::BufferTooSmall {
            needed,
            capacity: out.len(),
        });
    }
    let written = encode_inner(input, Some(out), mode)?;
    if written != needed {
        return Err(Base64Error::SizeMismatch {
            expected: needed,
            written,
        });
    }
    Ok(written)
}

/// Encode `input` into a freshly allocated string.
pub fn encode(input: &[u8], mode: EncodingMode) -> Result<String, Base64Error> {
    let mut out = vec![0u8; encoded_len(input, mode)];
    let written = encode_into(input, &mut out, mode)?;
    out.truncate(written);
    Ok(String::from_utf8(out).expect("encoded output is ASCII"))
}

fn decode_symbol(ch: u8) -> Option<u8> {
    if !(0x2b..=0x7a).contains(&ch) {
        return None;
    }
    match DECODE_TABLE[(ch - 0x2b) as usize] {
        BAD => None,
        v => Some(v),
    }
}

/// Conservative decoded-size estimate: input length minus one assumed line
/// terminator per 64 characters, scaled to raw bytes.
fn decoded_estimate(input_len: usize) -> usize {
    let terminators = input_len.div_ceil(PEM_LINE_WIDTH);
    ((input_len - terminators) * 3 + 3) / 4
}

/// Decode Base64 text into the caller-owned `out`, returning the byte count
/// written.
///
/// Input is consumed 4 characters at a time. A `=` in the 3rd position
/// yields 1 byte from that group, a `=` in the 4th yields 2; decoding stops
/// at the first padded group. A NUL at a group start is treated as the end
/// of the encoded stream. Between groups, a run of spaces followed by an
/// optional `\r` and a required `\n` is skipped; any other byte there is an
/// `InvalidCharacter`. A trailing run of fewer than 4 characters is ignored.
pub fn decode_into(input: &[u8], out: &mut [u8]) -> Result<usize, Base64Error> {
    let estimate = decoded_estimate(input.len());
    if estimate > out.len() {
        return Err(Base64Error::BufferTooSmall {
            needed: estimate,
            capacity: out.len(),
        });
    }

    let mut written = 0usize;
    let mut pos = 0usize;

    while input.len() - pos >= 4 {
        let quad = [input[pos], input[pos + 1], input[pos + 2], input[pos + 3]];

        // zero-filled tail of a fixed buffer marks end of stream
        if quad[0] == 0 {
            break;
        }

        let pad3 = quad[2] == PAD;
        let pad4 = quad[3] == PAD;
        if pad3 && !pad4 {
            return Err(Base64Error::InvalidCharacter {
                byte: PAD,
                offset: pos + 2,
            });
        }

        let mut vals = [0u8; 4];
        for (k, &ch) in quad.iter().enumerate() {
            vals[k] = if k >= 2 && ch == PAD {
                0
            } else {
                decode_symbol(ch).ok_or(Base64Error::InvalidCharacter {
                    byte: ch,
                    offset: pos + k,
                })?
            };
        }
        pos += 4;

        let b1 = (vals[0] << 2) | (vals[1] >> 4);
        let b2 = ((vals[1] & 0x0f) << 4) | (vals[2] >> 2);
        let b3 = ((vals[2] & 0x03) << 6) | vals[3];

        let take = if pad3 {
            1
        } else if pad4 {
            2
        } else {
            3
        };
        if written + take > out.len() {
            return Err(Base64Error::BufferTooSmall {
                needed: written + take,
                capacity: out.len(),
            });
        }
        out[written] = b1;
        if take >= 2 {
            out[written + 1] = b2;
        }
        if take == 3 {
            out[written + 2] = b3;
        }
        written += take;

        if pad4 {
            break;
        }

        // optional line terminator: spaces, then \r, then a required \n
        if pos < input.len() && matches!(input[pos], b' ' | b'\r' | b'\n') {
            let mut end = input[pos];
            pos += 1;
            while end == b' ' && pos < input.len() {
                end = input[pos];
                pos += 1;
            }
            if end == b'\r' && pos < input.len() {
                end = input[pos];
                pos += 1;
            }
            if end != b'\n' {
                return Err(Base64Error::InvalidCharacter {
                    byte: end,
                    offset: pos - 1,
                });
            }
        }
    }

    Ok(written)
}

/// Decode Base64 text into a freshly allocated buffer.
pub fn decode(input: &[u8]) -> Result<Vec<u8>, Base64Error> {
    let mut out = vec![0u8; (input.len() / 4) * 3 + 3];
    let written = decode_into(input, &mut out)?;
    out.truncate(written);
    Ok(out)
}
