// Input service - position-indexed access to the characters being parsed

/// What the parser needs from its input. Positions are character indices,
/// `len()` is the end-of-input position.
pub trait Input {
    fn len(&self) -> usize;

    /// The symbol starting at `i`, or `None` at end of input.
    /// This is the lookahead query used by the FIRST/FOLLOW pre-checks.
    fn next_symbol(&self, i: usize) -> Option<char>;

    /// Text of the region `[left, right)`
    fn substring(&self, left: usize, right: usize) -> String;

    /// 1-based (line, column) of position `i`
    fn line_column(&self, i: usize) -> (usize, usize);

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Input backed by a string, indexed by `char`
#[derive(Debug, Clone)]
pub struct TextInput {
    chars: Vec<char>,
    /// Positions at which a line starts (always contains 0)
    line_starts: Vec<usize>,
}

impl TextInput {
    pub fn new(text: &str) -> Self {
        let chars: Vec<char> = text.chars().collect();
        let mut line_starts = vec![0];
        for (i, &c) in chars.iter().enumerate() {
            if c == '\n' {
                line_starts.push(i + 1);
            }
        }
        TextInput { chars, line_starts }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    pub fn line_number(&self, i: usize) -> usize {
        match self.line_starts.binary_search(&i) {
            Ok(line) => line + 1,
            Err(line) => line,
        }
    }

    pub fn column_number(&self, i: usize) -> usize {
        let line = self.line_number(i);
        i - self.line_starts[line - 1] + 1
    }

    pub fn is_start_of_line(&self, i: usize) -> bool {
        self.line_starts.binary_search(&i).is_ok()
    }

    pub fn is_end_of_line(&self, i: usize) -> bool {
        matches!(self.next_symbol(i), None | Some('\n'))
    }

    pub fn is_end_of_file(&self, i: usize) -> bool {
        i >= self.chars.len()
    }
}

impl Input for TextInput {
    fn len(&self) -> usize {
        self.chars.len()
    }

    fn next_symbol(&self, i: usize) -> Option<char> {
        self.chars.get(i).copied()
    }

    fn substring(&self, left: usize, right: usize) -> String {
        let right = right.min(self.chars.len());
        let left = left.min(right);
        self.chars[left..right].iter().collect()
    }

    fn line_column(&self, i: usize) -> (usize, usize) {
        (self.line_number(i), self.column_number(i))
    }
}

impl From<&str> for TextInput {
    fn from(text: &str) -> Self {
        TextInput::new(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_and_column() {
        let input = TextInput::new("ab\ncd\n\nx");
        assert_eq!(input.line_count(), 4);
        assert_eq!(input.line_column(0), (1, 1));
        assert_eq!(input.line_column(1), (1, 2));
        assert_eq!(input.line_column(3), (2, 1));
        assert_eq!(input.line_column(4), (2, 2));
        assert_eq!(input.line_column(6), (3, 1));
        assert_eq!(input.line_column(7), (4, 1));
        assert!(input.is_start_of_line(3));
        assert!(!input.is_start_of_line(4));
        assert!(input.is_end_of_line(2));
        assert!(input.is_end_of_file(8));
    }

    #[test]
    fn test_next_symbol_and_substring() {
        let input = TextInput::new("héllo");
        assert_eq!(input.len(), 5);
        assert_eq!(input.next_symbol(1), Some('é'));
        assert_eq!(input.next_symbol(5), None);
        assert_eq!(input.substring(1, 4), "éll");
        assert_eq!(input.substring(3, 10), "lo");
    }
}
