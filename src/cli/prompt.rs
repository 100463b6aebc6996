use std::error::Error;
use std::io::{self, BufRead, Write};

/// Use `given` when present, otherwise ask on stdin.
pub fn value_or_prompt(given: Option<String>, label: &str) -> Result<String, Box<dyn Error>> {
    match given {
        Some(value) => Ok(value),
        None => read_line(label),
    }
}

pub fn read_line(label: &str) -> Result<String, Box<dyn Error>> {
    print!("{label}: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
