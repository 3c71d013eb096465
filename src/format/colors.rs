//! Stable per-nickname IRC colours.

/// IRC colour introducer.
pub const COLOR: char = '\x03';

/// IRC "reset all formatting" code.
pub const RESET: char = '\x0F';

/// mIRC colours used for nicknames, as (name, two-digit code).
pub const NICK_COLORS: [(&str, &str); 12] = [
    ("light_blue", "12"),
    ("dark_blue", "02"),
    ("light_red", "04"),
    ("dark_red", "05"),
    ("light_green", "09"),
    ("dark_green", "03"),
    ("magenta", "06"),
    ("light_magenta", "13"),
    ("orange", "07"),
    ("yellow", "08"),
    ("cyan", "10"),
    ("light_cyan", "11"),
];

/// Index into [`NICK_COLORS`] for a display name.
///
/// `(first UTF-16 unit + UTF-16 length) mod 12`, so names keep the colour
/// other bridge instances give them.
pub fn color_index(name: &str) -> usize {
    let first = name.encode_utf16().next().map(usize::from).unwrap_or(0);
    let length = name.encode_utf16().count();
    (first + length) % NICK_COLORS.len()
}

/// Wrap `name` in its IRC colour, terminated by a reset.
pub fn colorize_nick(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }
    let (_, code) = NICK_COLORS[color_index(name)];
    format!("{}{}{}{}", COLOR, code, name, RESET)
}
