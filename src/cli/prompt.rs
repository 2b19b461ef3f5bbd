use anyhow::{Context, Result};
use std::io::{BufRead, Write};

/// Asks a yes/no question; anything but `y`/`yes` counts as no.
pub fn confirm<R, W>(question: &str, input: &mut R, output: &mut W) -> Result<bool>
where
    R: BufRead,
    W: Write,
{
    write!(output, "{question} [y/N] ").context("writing prompt")?;
    output.flush().context("flushing prompt")?;

    let mut answer = String::new();
    input.read_line(&mut answer).context("reading answer")?;

    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

pub fn confirm_removal<R, W>(name: &str, input: &mut R, output: &mut W) -> Result<bool>
where
    R: BufRead,
    W: Write,
{
    confirm(
        &format!("Are you sure you want to remove the environment '{name}'?"),
        input,
        output,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn ask(answer: &str) -> (bool, String) {
        let mut input = Cursor::new(answer.as_bytes().to_vec());
        let mut output = Vec::new();
        let yes = confirm_removal("ml", &mut input, &mut output).unwrap();
        (yes, String::from_utf8(output).unwrap())
    }

    #[test]
    fn accepts_yes_variants() {
        assert!(ask("y\n").0);
        assert!(ask("YES\n").0);
        assert!(ask("  yes  \n").0);
    }

    #[test]
    fn defaults_to_no() {
        assert!(!ask("\n").0);
        assert!(!ask("").0);
        assert!(!ask("nope\n").0);
    }

    #[test]
    fn prompt_names_the_environment() {
        let (_, prompt) = ask("n\n");
        assert_eq!(
            prompt,
            "Are you sure you want to remove the environment 'ml'? [y/N] "
        );
    }
}
