use std::{collections::BTreeMap, fmt};

/// Lines a command prints after its echo, before the prompt returns.
pub fn builtin_output_lines(command_name: &str) -> usize {
    match command_name {
        "set" | "RandomReset" => 1,
        "BeamlineSet" | "TestMeasuredCorrection" | "TestFreeCorrection" | "TestRfAlignment" => 2,
        "TestSimpleCorrection" => 3,
        "SurveyErrorSet" => 27,
        _ => 0,
    }
}

/// First word of a command line.
pub fn command_name(command: &str) -> &str {
    command.split_whitespace().next().unwrap_or("")
}

pub fn expected_output_lines(command: &str, overrides: &BTreeMap<String, usize>) -> usize {
    let name = command_name(command);
    overrides
        .get(name)
        .copied()
        .unwrap_or_else(|| builtin_output_lines(name))
}

/// One simulator command line: a name, positional arguments, then
/// `-key value` options in insertion order.
///
/// Setting an option twice keeps its first position and the last value, so
/// caller overrides can be layered over defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacetCommand {
    name: String,
    args: Vec<String>,
    options: Vec<(String, String)>,
}

impl PlacetCommand {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            options: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arg(mut self, value: impl fmt::Display) -> Self {
        self.args.push(value.to_string());
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        let key = key.into();
        let value = value.to_string();
        match self.options.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.options.push((key, value)),
        }
        self
    }

    pub fn options<K, V>(self, options: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: fmt::Display,
    {
        options
            .into_iter()
            .fold(self, |command, (key, value)| command.option(key, value))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }
}

impl fmt::Display for PlacetCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        for (key, value) in &self.options {
            write!(f, " -{key} {value}")?;
        }
        Ok(())
    }
}

/// Tcl list literal, `{ 1 2.5 -3 }`.
pub fn tcl_list(values: &[f64]) -> String {
    let mut list = String::from("{");
    for value in values {
        list.push(' ');
        list.push_str(&value.to_string());
    }
    list.push_str(" }");
    list
}
