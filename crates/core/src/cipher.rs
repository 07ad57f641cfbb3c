/// Fixed-shift substitution over unicode scalar values.
///
/// Keeps the handshake template from matching on other listeners of the
/// shared channel. It offers no confidentiality whatsoever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftCipher {
    key: u32,
}

impl ShiftCipher {
    pub fn new(key: u32) -> Self {
        Self { key }
    }

    pub fn encode(&self, text: &str) -> String {
        text.chars().map(|c| shift(c, self.key as i64)).collect()
    }

    pub fn decode(&self, text: &str) -> String {
        text.chars().map(|c| shift(c, -(self.key as i64))).collect()
    }
}

impl Default for ShiftCipher {
    fn default() -> Self {
        Self::new(5)
    }
}

fn shift(c: char, by: i64) -> char {
    let shifted = c as i64 + by;
    u32::try_from(shifted)
        .ok()
        .and_then(char::from_u32)
        .unwrap_or(c)
}
