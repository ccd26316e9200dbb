use regex::Regex;

use crate::lattice::{
    element::{Coordinate, Element, ElementType},
    error::{LatticeError, invalid_request, parse_error},
};

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    Skip,
    Girder,
    Element(Element),
    Unsupported(String),
}

/// Line parser for the Placet lattice format:
/// `Quadrupole -name "QD0" -length 2.0 -strength -0.35`.
pub struct LatticeParser {
    header: Regex,
}

impl LatticeParser {
    pub fn new() -> Result<Self, LatticeError> {
        let header = Regex::new(r"^(\w+)(\s.*)?$")
            .map_err(|err| invalid_request(format!("failed to compile lattice pattern: {err}")))?;
        Ok(Self { header })
    }

    pub fn parse_line(&self, line: &str, line_no: usize) -> Result<ParsedLine, LatticeError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(ParsedLine::Skip);
        }

        let captures = self
            .header
            .captures(line)
            .ok_or_else(|| parse_error(line_no, format!("invalid line format: '{line}'")))?;
        let keyword = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
        let remainder = captures.get(2).map(|m| m.as_str()).unwrap_or_default();

        if keyword == "Girder" {
            return Ok(ParsedLine::Girder);
        }
        let Ok(element_type) = keyword.parse::<ElementType>() else {
            return Ok(ParsedLine::Unsupported(keyword.to_string()));
        };

        let tokens = split_tokens(remainder, line_no)?;
        let mut element = Element::new(element_type);
        for (key, value) in option_pairs(&tokens) {
            apply_option(&mut element, key, value, line_no)?;
        }
        Ok(ParsedLine::Element(element))
    }
}

fn apply_option(
    element: &mut Element,
    key: &str,
    value: &str,
    line_no: usize,
) -> Result<(), LatticeError> {
    match key {
        "name" => element.name = value.to_string(),
        "s" => element.s = parse_float(key, value, line_no)?,
        "length" => element.length = parse_float(key, value, line_no)?,
        "tilt" => element.tilt = parse_float(key, value, line_no)?,
        _ => match key.parse::<Coordinate>() {
            Ok(coord) => element.set(coord, parse_float(key, value, line_no)?),
            Err(_) => {
                element
                    .parameters
                    .insert(key.to_string(), value.to_string());
            }
        },
    }
    Ok(())
}

fn parse_float(key: &str, value: &str, line_no: usize) -> Result<f64, LatticeError> {
    value
        .parse::<f64>()
        .map_err(|_| parse_error(line_no, format!("option -{key} expects a number, got '{value}'")))
}

fn is_option(token: &str) -> bool {
    let mut chars = token.chars();
    chars.next() == Some('-') && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
}

/// `-key value` pairs; a key directly followed by another key carries no value
/// and is dropped.
fn option_pairs(tokens: &[String]) -> Vec<(&str, &str)> {
    let mut pairs = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        if is_option(token) && i + 1 < tokens.len() && !is_option(&tokens[i + 1]) {
            pairs.push((&token[1..], tokens[i + 1].as_str()));
            i += 2;
        } else {
            i += 1;
        }
    }
    pairs
}

fn split_tokens(text: &str, line_no: usize) -> Result<Vec<String>, LatticeError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut quoted = false;

    for c in text.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                quoted = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() || quoted {
                    tokens.push(std::mem::take(&mut current));
                }
                quoted = false;
            }
            c => current.push(c),
        }
    }
    if in_quotes {
        return Err(parse_error(line_no, "unterminated quoted value"));
    }
    if !current.is_empty() || quoted {
        tokens.push(current);
    }
    Ok(tokens)
}
