use log::warn;
use raidbot_engine::constants::MAX_HEROES;
use std::io::{self, BufRead, Write};

pub const HERO_PROMPT: &str = "Enter number of heroes available (0-5): ";

/// Anything that is not a number in `0..=5` counts as no heroes.
#[must_use]
pub fn parse_heroes(input: &str) -> u8 {
    match input.trim().parse::<u8>() {
        Ok(count) if count <= MAX_HEROES => count,
        _ => {
            warn!("Invalid hero count {:?}; defaulting to 0", input.trim());
            0
        }
    }
}

/// Ask for the hero count on `output` and read one line from `input`.
///
/// # Errors
///
/// Returns an error if the prompt cannot be written or the answer read.
pub fn prompt_heroes<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> io::Result<u8> {
    write!(output, "{HERO_PROMPT}")?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(parse_heroes(&line))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_counts_in_range() {
        assert_eq!(parse_heroes("0"), 0);
        assert_eq!(parse_heroes(" 4\n"), 4);
        assert_eq!(parse_heroes("5"), 5);
    }

    #[test]
    fn out_of_range_or_garbage_is_zero() {
        assert_eq!(parse_heroes("6"), 0);
        assert_eq!(parse_heroes("-1"), 0);
        assert_eq!(parse_heroes("three"), 0);
        assert_eq!(parse_heroes(""), 0);
    }

    #[test]
    fn prompt_writes_question_and_reads_answer() {
        let mut input = io::Cursor::new(b"3\n".to_vec());
        let mut output = Vec::new();
        assert_eq!(prompt_heroes(&mut input, &mut output).expect("prompt"), 3);
        assert_eq!(String::from_utf8_lossy(&output), HERO_PROMPT);
    }
}
