//! Minimal parser for the Prometheus text exposition format

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    /// `None` for NaN and infinities
    pub value: Option<f64>,
}

impl Sample {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Exposition {
    samples: Vec<Sample>,
}

impl Exposition {
    pub fn parse(text: &str) -> Self {
        let samples = text.lines().filter_map(parse_line).collect();
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Value of the first sample with this name
    pub fn first(&self, name: &str) -> Option<f64> {
        self.samples
            .iter()
            .find(|s| s.name == name)
            .and_then(|s| s.value)
    }

    pub fn samples<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Sample> + 'a {
        self.samples.iter().filter(move |s| s.name == name)
    }

    /// First finite value of `name` whose labels contain `key=value`
    pub fn with_label(&self, name: &str, key: &str, value: &str) -> Option<f64> {
        self.samples(name)
            .find(|s| s.label(key) == Some(value))
            .and_then(|s| s.value)
    }
}

fn parse_line(line: &str) -> Option<Sample> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let name_end = line
        .find(|c: char| c == '{' || c.is_whitespace())
        .unwrap_or(line.len());
    let name = &line[..name_end];
    if name.is_empty() {
        return None;
    }

    let mut rest = &line[name_end..];
    let mut labels = BTreeMap::new();
    if rest.starts_with('{') {
        let (parsed, remaining) = parse_labels(&rest[1..])?;
        labels = parsed;
        rest = remaining;
    }

    // Optional timestamp after the value is ignored
    let raw_value = rest.split_whitespace().next()?;
    let value = raw_value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite());
    if value.is_none() && !is_special_value(raw_value) {
        return None;
    }

    Some(Sample {
        name: name.to_string(),
        labels,
        value,
    })
}

fn is_special_value(raw: &str) -> bool {
    matches!(raw, "NaN" | "+Inf" | "-Inf" | "Inf")
}

/// Parses `key="value",...}` and returns the labels plus the text after the closing brace
fn parse_labels(input: &str) -> Option<(BTreeMap<String, String>, &str)> {
    let mut labels = BTreeMap::new();
    let mut chars = input.char_indices().peekable();

    loop {
        while matches!(chars.peek(), Some((_, c)) if c.is_whitespace() || *c == ',') {
            chars.next();
        }

        let (start, c) = chars.next()?;
        if c == '}' {
            return Some((labels, &input[start + 1..]));
        }

        let mut key_end = start + c.len_utf8();
        loop {
            let (idx, c) = chars.next()?;
            if c == '=' {
                key_end = idx;
                break;
            }
            key_end = idx + c.len_utf8();
        }
        let key = input[start..key_end].trim().to_string();

        let (_, quote) = chars.next()?;
        if quote != '"' {
            return None;
        }

        let mut value = String::new();
        loop {
            let (_, c) = chars.next()?;
            match c {
                '\\' => {
                    let (_, escaped) = chars.next()?;
                    value.push(match escaped {
                        'n' => '\n',
                        other => other,
                    });
                }
                '"' => break,
                other => value.push(other),
            }
        }

        labels.insert(key, value);
    }
}
