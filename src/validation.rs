//! Character and length rules applied to every piece of user-supplied text.

const SWEDISH: &[char] = &['å', 'ä', 'ö', 'Å', 'Ä', 'Ö'];

#[derive(Debug, Clone, Copy)]
pub struct TextPolicy {
    pub min_length: usize,
    pub max_length: usize,
    pub allow_newline: bool,
    pub allow_punctuation: bool,
    pub allow_space: bool,
    pub swedish: bool,
    /// Accept the empty string regardless of `min_length`.
    pub ignore_undefined: bool,
}

impl Default for TextPolicy {
    fn default() -> Self {
        Self {
            min_length: 1,
            max_length: 255,
            allow_newline: true,
            allow_punctuation: true,
            allow_space: true,
            swedish: true,
            ignore_undefined: false,
        }
    }
}

impl TextPolicy {
    pub fn max(max_length: usize) -> Self {
        Self {
            max_length,
            ..Self::default()
        }
    }

    pub fn length(mut self, min_length: usize, max_length: usize) -> Self {
        self.min_length = min_length;
        self.max_length = max_length;
        self
    }

    pub fn single_line(mut self) -> Self {
        self.allow_newline = false;
        self
    }

    pub fn no_punctuation(mut self) -> Self {
        self.allow_punctuation = false;
        self
    }

    pub fn no_space(mut self) -> Self {
        self.allow_space = false;
        self
    }

    pub fn ascii_only(mut self) -> Self {
        self.swedish = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.ignore_undefined = true;
        self
    }

    pub fn accepts(&self, value: &str) -> bool {
        if value.is_empty() && self.ignore_undefined {
            return true;
        }
        let len = value.chars().count();
        if len < self.min_length || len > self.max_length {
            return false;
        }
        value.chars().all(|c| self.allows_char(c))
    }

    fn allows_char(&self, c: char) -> bool {
        match c {
            c if c.is_ascii_alphanumeric() => true,
            ' ' => self.allow_space,
            '\n' | '\r' => self.allow_newline,
            c if c.is_ascii_punctuation() => self.allow_punctuation,
            c if SWEDISH.contains(&c) => self.swedish,
            _ => false,
        }
    }
}

/// Integer ids arrive either as JSON numbers or as digit strings.
pub fn parse_integer(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => parse_id(s),
        _ => None,
    }
}

pub fn parse_id(raw: &str) -> Option<i64> {
    let t = raw.trim();
    if t.is_empty() || !t.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    t.parse().ok()
}
