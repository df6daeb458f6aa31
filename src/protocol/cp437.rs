//! # Code Page 437 Encoding
//!
//! ESC/POS printers boot into code page 437 (PC437 USA). Receipt text is
//! encoded to that single-byte table before being sent: ASCII passes through,
//! the upper half maps via [`UPPER_HALF`], anything else becomes `?`.

use tracing::warn;

/// CP437 bytes 0x80–0xFF, in byte order.
const UPPER_HALF: [char; 128] = [
    'Ç', 'ü', 'é', 'â', 'ä', 'à', 'å', 'ç', 'ê', 'ë', 'è', 'ï', 'î', 'ì', 'Ä', 'Å', //
    'É', 'æ', 'Æ', 'ô', 'ö', 'ò', 'û', 'ù', 'ÿ', 'Ö', 'Ü', '¢', '£', '¥', '₧', 'ƒ', //
    'á', 'í', 'ó', 'ú', 'ñ', 'Ñ', 'ª', 'º', '¿', '⌐', '¬', '½', '¼', '¡', '«', '»', //
    '░', '▒', '▓', '│', '┤', '╡', '╢', '╖', '╕', '╣', '║', '╗', '╝', '╜', '╛', '┐', //
    '└', '┴', '┬', '├', '─', '┼', '╞', '╟', '╚', '╔', '╩', '╦', '╠', '═', '╬', '╧', //
    '╨', '╤', '╥', '╙', '╘', '╒', '╓', '╫', '╪', '┘', '┌', '█', '▄', '▌', '▐', '▀', //
    'α', 'ß', 'Γ', 'π', 'Σ', 'σ', 'µ', 'τ', 'Φ', 'Θ', 'Ω', 'δ', '∞', 'φ', 'ε', '∩', //
    '≡', '±', '≥', '≤', '⌠', '⌡', '÷', '≈', '°', '∙', '·', '√', 'ⁿ', '²', '■', '\u{A0}',
];

/// Encode a Unicode string as CP437 bytes.
///
/// ```
/// use thermal_bridge::protocol::cp437;
///
/// assert_eq!(cp437::encode("CODE: A1"), b"CODE: A1".to_vec());
/// assert_eq!(cp437::encode("café"), vec![b'c', b'a', b'f', 0x82]);
/// ```
pub fn encode(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    for ch in s.chars() {
        if ch.is_ascii() {
            out.push(ch as u8);
        } else if let Some(byte) = to_cp437(ch) {
            out.push(byte);
        } else {
            warn!(
                "cp437: unmapped character '{}' (U+{:04X}), replacing with '?'",
                ch, ch as u32
            );
            out.push(b'?');
        }
    }
    out
}

fn to_cp437(ch: char) -> Option<u8> {
    UPPER_HALF
        .iter()
        .position(|&c| c == ch)
        .map(|i| 0x80 + i as u8)
}
