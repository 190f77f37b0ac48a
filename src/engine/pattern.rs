//! `${name}` placeholder patterns.
//!
//! A pattern is tokenized once into literals and placeholders. Resolution
//! substitutes token by token, so a bound value containing `${...}` is
//! never expanded again.

use crate::engine::errors::SubstError;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;

/// Placeholder name to literal value.
pub type Bindings = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    Placeholder(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    tokens: Vec<Token>,
}

impl Pattern {
    pub fn parse(source: &str) -> Self {
        let mut tokens = Vec::new();
        let mut literal = String::new();
        let mut rest = source;
        while let Some(start) = rest.find("${") {
            let after = &rest[start + 2..];
            match after.find('}') {
                Some(end) if end > 0 => {
                    literal.push_str(&rest[..start]);
                    if !literal.is_empty() {
                        tokens.push(Token::Literal(std::mem::take(&mut literal)));
                    }
                    tokens.push(Token::Placeholder(after[..end].to_string()));
                    rest = &after[end + 1..];
                }
                _ => {
                    literal.push_str(&rest[..start + 2]);
                    rest = after;
                }
            }
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            tokens.push(Token::Literal(literal));
        }
        Self {
            source: source.to_string(),
            tokens,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Placeholder names, unique, in order of first appearance.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for token in &self.tokens {
            if let Token::Placeholder(name) = token {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// The setter name when the pattern is exactly one placeholder.
    pub fn pure_name(&self) -> Option<&str> {
        match self.tokens.as_slice() {
            [Token::Placeholder(name)] => Some(name.as_str()),
            _ => None,
        }
    }

    /// Replace bound placeholders. Unbound ones are kept as `${name}`.
    pub fn substitute(&self, bindings: &Bindings) -> String {
        let mut out = String::with_capacity(self.source.len());
        for token in &self.tokens {
            match token {
                Token::Literal(text) => out.push_str(text),
                Token::Placeholder(name) => match bindings.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push_str("${");
                        out.push_str(name);
                        out.push('}');
                    }
                },
            }
        }
        out
    }

    /// Placeholder names without a binding, in order of first appearance.
    pub fn unresolved(&self, bindings: &Bindings) -> Vec<String> {
        self.placeholders()
            .into_iter()
            .filter(|name| !bindings.contains_key(*name))
            .map(str::to_string)
            .collect()
    }

    /// Recover placeholder values from a value previously produced by this
    /// pattern.
    ///
    /// Literals must match exactly and the whole value must be consumed.
    /// Repeated names keep the first occurrence. Captures may be empty.
    pub fn derive(&self, current: &str) -> Option<Bindings> {
        let mut source = String::from("^");
        let mut names = Vec::new();
        for token in &self.tokens {
            match token {
                Token::Literal(text) => source.push_str(&regex::escape(text)),
                Token::Placeholder(name) => {
                    source.push_str("(.*)");
                    names.push(name.as_str());
                }
            }
        }
        source.push('$');
        if names.is_empty() {
            return None;
        }

        let regex = Regex::new(&source).ok()?;
        let captures = regex.captures(current)?;
        let mut bindings = Bindings::new();
        for (idx, name) in names.into_iter().enumerate() {
            let value = captures.get(idx + 1).map_or("", |m| m.as_str());
            bindings
                .entry(name.to_string())
                .or_insert_with(|| value.to_string());
        }
        Some(bindings)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Resolve every placeholder of `pattern`.
///
/// Explicit bindings win; the rest are derived from `current` by matching
/// it against the pattern. Fails listing the names that stay unresolved.
pub fn resolve(pattern: &Pattern, bindings: &Bindings, current: &str) -> Result<String, SubstError> {
    if pattern.unresolved(bindings).is_empty() {
        return Ok(pattern.substitute(bindings));
    }

    let mut merged = bindings.clone();
    if let Some(derived) = pattern.derive(current) {
        for (name, value) in derived {
            merged.entry(name).or_insert(value);
        }
    }

    let names = pattern.unresolved(&merged);
    if !names.is_empty() {
        return Err(SubstError::UnresolvedPlaceholders { names });
    }
    Ok(pattern.substitute(&merged))
}

/// Replace `${N}` references in `template` with the groups of `regex`
/// matched against `value`.
///
/// Without a regex the template is returned unchanged. A reference to a
/// group that does not exist fails.
pub fn resolve_capture_groups(
    template: &str,
    regex: Option<&Regex>,
    value: &str,
) -> Result<String, SubstError> {
    let Some(regex) = regex else {
        return Ok(template.to_string());
    };
    let groups: Vec<&str> = match regex.captures(value) {
        Some(captures) => captures
            .iter()
            .map(|group| group.map_or("", |m| m.as_str()))
            .collect(),
        None => Vec::new(),
    };

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let reference = after
            .find('}')
            .map(|end| (&after[..end], end))
            .filter(|(digits, _)| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()));
        match reference {
            Some((digits, end)) => {
                let group = digits
                    .parse::<usize>()
                    .ok()
                    .filter(|idx| *idx > 0)
                    .and_then(|idx| groups.get(idx))
                    .ok_or(SubstError::UnresolvedCaptureGroups)?;
                out.push_str(group);
                rest = &after[end + 1..];
            }
            None => {
                out.push_str("${");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}
