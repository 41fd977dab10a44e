use std::io::{BufRead, Write};

use anyhow::{Context, Result};

/// Line-oriented terminal: questions go to `output`, answers come from `input`.
pub struct Console<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Print `question` without a newline and read one line back. End of
    /// input reads as an empty answer.
    pub fn ask(&mut self, question: &str) -> Result<String> {
        write!(self.output, "{question}")?;
        self.output.flush()?;
        let mut line = String::new();
        self.input
            .read_line(&mut line)
            .context("reading from standard input")?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    pub fn say(&mut self, text: &str) -> Result<()> {
        writeln!(self.output, "{text}")?;
        Ok(())
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

pub fn query_question(hint: &str) -> String {
    format!("Ask something like '{hint}': ")
}

pub const MODIFY_QUESTION: &str =
    "\nDo you want to change anything in the config? (e.g., interface name): ";

pub fn score_line(score: f32) -> String {
    format!("\n[Similarity Score] {score:.2}")
}

pub const MATCH_HEADER: &str = "\n✅ Closest PTP config found:\n";
pub const NO_MATCH: &str = "\n❌ No strong config match found.";
pub const MODIFIED_HEADER: &str = "\n📄 Modified Config Snippet:\n";

pub fn calling_line(label: &str) -> String {
    format!("\n🔧 Calling {label} to modify configuration...")
}

/// First `chars` characters of `text`; never splits a UTF-8 sequence.
pub fn preview(text: &str, chars: usize) -> &str {
    match text.char_indices().nth(chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ask_prints_question_and_strips_newline() {
        let mut console = Console::new("ens2f0\r\nnext\n".as_bytes(), Vec::new());
        assert_eq!(console.ask("Q: ").unwrap(), "ens2f0");
        assert_eq!(console.ask("Q2: ").unwrap(), "next");
        assert_eq!(console.ask("Q3: ").unwrap(), "");
        assert_eq!(String::from_utf8(console.into_output()).unwrap(), "Q: Q2: Q3: ");
    }

    #[test]
    fn score_has_two_decimals() {
        assert_eq!(score_line(0.9), "\n[Similarity Score] 0.90");
        assert_eq!(score_line(0.1), "\n[Similarity Score] 0.10");
        assert_eq!(score_line(0.4049), "\n[Similarity Score] 0.40");
    }

    #[test]
    fn preview_counts_characters() {
        assert_eq!(preview("foo: bar", 1000), "foo: bar");
        assert_eq!(preview("abcdef", 3), "abc");
        assert_eq!(preview("ñandú", 2), "ña");
        assert_eq!(preview("", 5), "");
    }

    #[test]
    fn query_question_uses_hint() {
        assert_eq!(
            query_question("ptp config for dual nic"),
            "Ask something like 'ptp config for dual nic': "
        );
    }
}
