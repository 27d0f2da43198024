use std::collections::BTreeMap;
use std::fmt::Write;
use std::time::{SystemTime, UNIX_EPOCH};

/// A typed field value carried by a [`Point`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    Str(String),
}

impl FieldValue {
    /// Renders the value in line protocol syntax.
    fn write_line_protocol(&self, out: &mut String) {
        match self {
            Self::Float(v) => {
                let _ = write!(out, "{v}");
            }
            Self::Int(v) => {
                let _ = write!(out, "{v}i");
            }
            Self::Bool(v) => {
                out.push_str(if *v { "true" } else { "false" });
            }
            Self::Str(v) => {
                out.push('"');
                for c in v.chars() {
                    if c == '"' || c == '\\' {
                        out.push('\\');
                    }
                    out.push(c);
                }
                out.push('"');
            }
        }
    }
}

/// One fully-formed metric sample: measurement, tags, typed fields and a
/// timestamp. Construct via [`PointBuilder`].
///
/// Invariants: tag keys and field keys are each unique, the two key sets
/// are disjoint, and every point carries a timestamp (enforced at
/// construction).
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    measurement: String,
    tags: BTreeMap<String, String>,
    fields: BTreeMap<String, FieldValue>,
    timestamp: SystemTime,
}

impl Point {
    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// Timestamp as nanoseconds since the Unix epoch.
    pub fn timestamp_nanos(&self) -> i64 {
        self.timestamp
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
            .unwrap_or(0)
    }

    /// Renders this point as one InfluxDB v2 line protocol line
    /// (no trailing newline). Tags are emitted in key order.
    pub fn to_line_protocol(&self) -> String {
        let mut line = String::with_capacity(128);
        escape_into(&mut line, &self.measurement, &[',', ' ']);

        for (key, value) in &self.tags {
            line.push(',');
            escape_into(&mut line, key, &[',', '=', ' ']);
            line.push('=');
            escape_into(&mut line, value, &[',', '=', ' ']);
        }

        line.push(' ');
        let mut first = true;
        for (key, value) in &self.fields {
            if !first {
                line.push(',');
            }
            first = false;
            escape_into(&mut line, key, &[',', '=', ' ']);
            line.push('=');
            value.write_line_protocol(&mut line);
        }

        let _ = write!(line, " {}", self.timestamp_nanos());
        line
    }
}

/// Escapes the given special characters with a backslash.
fn escape_into(out: &mut String, raw: &str, special: &[char]) {
    for c in raw.chars() {
        if special.contains(&c) || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
}

/// Mutable accumulator for one [`Point`].
///
/// The timestamp is part of construction so that no point can be emitted
/// without one. Writing the same key twice, or using one key as both a
/// tag and a field, is a programming error.
#[derive(Debug, Clone)]
pub struct PointBuilder {
    measurement: String,
    tags: BTreeMap<String, String>,
    fields: BTreeMap<String, FieldValue>,
    timestamp: SystemTime,
}

impl PointBuilder {
    /// Starts a new point for `measurement` stamped with `timestamp`.
    pub fn new(measurement: impl Into<String>, timestamp: SystemTime) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            timestamp,
        }
    }

    /// Adds a tag. Tag values are always strings, even for numeric-looking
    /// dimensions such as coordinates.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        debug_assert!(
            !self.tags.contains_key(&key) && !self.fields.contains_key(&key),
            "duplicate point key {key:?}"
        );
        self.tags.insert(key, value.into());
        self
    }

    pub fn float_field(self, key: impl Into<String>, value: f64) -> Self {
        self.field(key.into(), FieldValue::Float(value))
    }

    pub fn int_field(self, key: impl Into<String>, value: i64) -> Self {
        self.field(key.into(), FieldValue::Int(value))
    }

    pub fn bool_field(self, key: impl Into<String>, value: bool) -> Self {
        self.field(key.into(), FieldValue::Bool(value))
    }

    pub fn str_field(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.field(key.into(), FieldValue::Str(value.into()))
    }

    fn field(mut self, key: String, value: FieldValue) -> Self {
        debug_assert!(
            !self.fields.contains_key(&key) && !self.tags.contains_key(&key),
            "duplicate point key {key:?}"
        );
        self.fields.insert(key, value);
        self
    }

    pub fn build(self) -> Point {
        Point {
            measurement: self.measurement,
            tags: self.tags,
            fields: self.fields,
            timestamp: self.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ts(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn test_line_protocol_basic() {
        let point = PointBuilder::new("helium_stats", ts(1))
            .int_field("blocks", 42)
            .build();
        assert_eq!(point.to_line_protocol(), "helium_stats blocks=42i 1000000000");
    }

    #[test]
    fn test_line_protocol_tags_sorted() {
        let point = PointBuilder::new("m", ts(1))
            .tag("b", "2")
            .tag("a", "1")
            .float_field("v", 1.5)
            .build();
        assert_eq!(point.to_line_protocol(), "m,a=1,b=2 v=1.5 1000000000");
    }

    #[test]
    fn test_line_protocol_escaping() {
        let point = PointBuilder::new("my measure", ts(0))
            .tag("geo", "Berlin, Mitte")
            .str_field("note", "say \"hi\"")
            .build();
        assert_eq!(
            point.to_line_protocol(),
            "my\\ measure,geo=Berlin\\,\\ Mitte note=\"say \\\"hi\\\"\" 0"
        );
    }

    #[test]
    fn test_field_types() {
        let point = PointBuilder::new("m", ts(2))
            .float_field("f", 2.25)
            .int_field("i", -3)
            .bool_field("b", true)
            .build();
        assert_eq!(
            point.to_line_protocol(),
            "m b=true,f=2.25,i=-3i 2000000000"
        );
    }

    #[test]
    fn test_timestamp_nanos() {
        let point = PointBuilder::new("m", ts(1_600_000_000))
            .bool_field("ok", false)
            .build();
        assert_eq!(point.timestamp_nanos(), 1_600_000_000_000_000_000);
    }

    #[test]
    fn test_tag_and_field_keys_disjoint() {
        let point = PointBuilder::new("m", ts(1))
            .tag("hotspot_id", "abc")
            .bool_field("event", true)
            .build();
        for key in point.tags().keys() {
            assert!(!point.fields().contains_key(key));
        }
    }
}
