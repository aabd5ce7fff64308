//! Operator prompt for the person being recorded

use crate::error::{OrganizerError, Result};
use std::collections::BTreeMap;
use std::io::{BufRead, Write};

/// Resolve an answer against the people table. Accepts a display name
/// (case-insensitive) or a person code.
pub fn resolve_person(people: &BTreeMap<String, String>, answer: &str) -> Result<String> {
    let answer = answer.trim();

    people
        .iter()
        .find(|(name, code)| name.eq_ignore_ascii_case(answer) || code.as_str() == answer)
        .map(|(_, code)| code.clone())
        .ok_or_else(|| OrganizerError::UnknownPerson(answer.to_string()))
}

/// Ask until the operator names a configured person. End of input aborts.
pub fn prompt_person<R, W>(people: &BTreeMap<String, String>, mut input: R, mut output: W) -> Result<String>
where
    R: BufRead,
    W: Write,
{
    let names: Vec<&str> = people.keys().map(String::as_str).collect();

    loop {
        write!(output, "Who is recording {:?}: ", names)?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Err(OrganizerError::UnknownPerson(String::new()));
        }

        match resolve_person(people, &line) {
            Ok(code) => {
                writeln!(output, "Selected person: {}", line.trim())?;
                return Ok(code);
            }
            Err(_) => writeln!(output, "'{}' is not one of {:?}", line.trim(), names)?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("Isabela".to_string(), "p001".to_string()),
            ("Thyago".to_string(), "p002".to_string()),
            ("Natalia".to_string(), "p003".to_string()),
        ])
    }

    #[test]
    fn test_resolve_by_name_or_code() {
        assert_eq!(resolve_person(&people(), "thyago").unwrap(), "p002");
        assert_eq!(resolve_person(&people(), " p003 ").unwrap(), "p003");
        assert!(matches!(
            resolve_person(&people(), "Maria"),
            Err(OrganizerError::UnknownPerson(name)) if name == "Maria"
        ));
    }

    #[test]
    fn test_prompt_retries_until_valid() {
        let input = "Maria\n\nIsabela\n".as_bytes();
        let mut output = Vec::new();

        let code = prompt_person(&people(), input, &mut output).unwrap();
        assert_eq!(code, "p001");

        let transcript = String::from_utf8(output).unwrap();
        assert_eq!(transcript.matches("Who is recording").count(), 3);
        assert!(transcript.contains("Selected person: Isabela"));
    }

    #[test]
    fn test_prompt_end_of_input() {
        let mut output = Vec::new();
        let err = prompt_person(&people(), "".as_bytes(), &mut output).unwrap_err();
        assert!(matches!(err, OrganizerError::UnknownPerson(_)));
    }
}
