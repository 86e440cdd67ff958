//! Session index <-> hotkey mapping.
//!
//! Indices 0..9 use the digits 1-9, later ones use lowercase letters that no
//! picker action already claims (c, d, h, k, z).

/// Hotkeys in index order.
const KEYS: [char; 30] = [
    '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'e', 'f', 'g', 'i', 'j', 'l', 'm', 'n',
    'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y',
];

/// Most sessions the picker can show with a hotkey.
pub const MAX_SESSIONS: usize = KEYS.len();

pub fn key_for_index(index: usize) -> Option<char> {
    KEYS.get(index).copied()
}

pub fn index_for_key(key: char) -> Option<usize> {
    KEYS.iter().position(|&k| k == key)
}
