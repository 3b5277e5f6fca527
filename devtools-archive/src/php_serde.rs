//! PHP `serialize()` encoding for archive metadata.
//!
//! The host reads phar metadata back with `unserialize()`, so the embedded
//! record has to use PHP's format. Only the value kinds the metadata needs
//! are supported: null, bool, int, string and arrays.

use devtools_core::error::{DevToolsError, Result};
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PhpKey {
    Int(i64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PhpValue {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    /// Ordered key/value pairs, as PHP arrays preserve insertion order
    Array(Vec<(PhpKey, PhpValue)>),
}

impl PhpValue {
    /// A list-style array keyed 0..n
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<PhpValue>,
    {
        PhpValue::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(i, item)| (PhpKey::Int(i as i64), item.into()))
                .collect(),
        )
    }

    /// Look up a string key in an array value
    pub fn get(&self, key: &str) -> Option<&PhpValue> {
        match self {
            PhpValue::Array(pairs) => pairs.iter().find_map(|(k, v)| match k {
                PhpKey::Str(s) if s == key => Some(v),
                _ => None,
            }),
            _ => None,
        }
    }

    pub fn serialize(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut String) {
        match self {
            PhpValue::Null => out.push_str("N;"),
            PhpValue::Bool(b) => {
                let _ = write!(out, "b:{};", u8::from(*b));
            }
            PhpValue::Int(i) => {
                let _ = write!(out, "i:{};", i);
            }
            PhpValue::Str(s) => write_str(out, s),
            PhpValue::Array(pairs) => {
                let _ = write!(out, "a:{}:{{", pairs.len());
                for (key, value) in pairs {
                    match key {
                        PhpKey::Int(i) => {
                            let _ = write!(out, "i:{};", i);
                        }
                        PhpKey::Str(s) => write_str(out, s),
                    }
                    value.write_to(out);
                }
                out.push('}');
            }
        }
    }

    /// Parse the output of PHP `serialize()`
    pub fn unserialize(input: &[u8]) -> Result<Self> {
        let mut parser = Parser {
            input,
            pos: 0,
            depth: 0,
        };
        let value = parser.value()?;
        if parser.pos != input.len() {
            return Err(malformed(parser.pos, "trailing bytes"));
        }
        Ok(value)
    }

    /// Render the way PHP `echo` would, joining arrays with `", "`
    pub fn display(&self) -> String {
        match self {
            PhpValue::Null | PhpValue::Bool(false) => String::new(),
            PhpValue::Bool(true) => "1".to_string(),
            PhpValue::Int(i) => i.to_string(),
            PhpValue::Str(s) => s.clone(),
            PhpValue::Array(pairs) => pairs
                .iter()
                .map(|(_, v)| match v {
                    PhpValue::Array(_) => "Array".to_string(),
                    other => other.display(),
                })
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

// PHP string lengths count bytes, not characters
fn write_str(out: &mut String, s: &str) {
    let _ = write!(out, "s:{}:\"{}\";", s.len(), s);
}

impl From<&str> for PhpValue {
    fn from(s: &str) -> Self {
        PhpValue::Str(s.to_string())
    }
}

impl From<String> for PhpValue {
    fn from(s: String) -> Self {
        PhpValue::Str(s)
    }
}

impl From<&String> for PhpValue {
    fn from(s: &String) -> Self {
        PhpValue::Str(s.clone())
    }
}

impl From<i64> for PhpValue {
    fn from(i: i64) -> Self {
        PhpValue::Int(i)
    }
}

impl From<Option<&str>> for PhpValue {
    fn from(value: Option<&str>) -> Self {
        value.map_or(PhpValue::Null, PhpValue::from)
    }
}

fn malformed(pos: usize, reason: &str) -> DevToolsError {
    DevToolsError::Archive(format!("bad serialized metadata at byte {}: {}", pos, reason))
}

/// Nesting limit for arrays; metadata never comes close
const MAX_DEPTH: usize = 64;

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn expect(&mut self, byte: u8) -> Result<()> {
        match self.input.get(self.pos) {
            Some(&b) if b == byte => {
                self.pos += 1;
                Ok(())
            }
            _ => Err(malformed(self.pos, &format!("expected '{}'", byte as char))),
        }
    }

    fn until(&mut self, terminator: u8) -> Result<&str> {
        let start = self.pos;
        let offset = self.input[start..]
            .iter()
            .position(|&b| b == terminator)
            .ok_or_else(|| malformed(start, "unterminated token"))?;
        self.pos = start + offset + 1;
        std::str::from_utf8(&self.input[start..start + offset])
            .map_err(|_| malformed(start, "token is not UTF-8"))
    }

    fn integer(&mut self, terminator: u8) -> Result<i64> {
        let start = self.pos;
        self.until(terminator)?
            .parse()
            .map_err(|_| malformed(start, "invalid integer"))
    }

    fn string_body(&mut self) -> Result<String> {
        let start = self.pos;
        let len = usize::try_from(self.integer(b':')?)
            .map_err(|_| malformed(start, "negative string length"))?;
        self.expect(b'"')?;
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.input.len())
            .ok_or_else(|| malformed(self.pos, "string runs past end"))?;
        let s = String::from_utf8_lossy(&self.input[self.pos..end]).into_owned();
        self.pos = end;
        self.expect(b'"')?;
        self.expect(b';')?;
        Ok(s)
    }

    fn key(&mut self) -> Result<PhpKey> {
        let tag = self.tag()?;
        match tag {
            b'i' => Ok(PhpKey::Int(self.integer(b';')?)),
            b's' => Ok(PhpKey::Str(self.string_body()?)),
            _ => Err(malformed(self.pos, "array keys must be int or string")),
        }
    }

    fn tag(&mut self) -> Result<u8> {
        let tag = *self
            .input
            .get(self.pos)
            .ok_or_else(|| malformed(self.pos, "unexpected end"))?;
        self.pos += 1;
        if tag != b'N' {
            self.expect(b':')?;
        }
        Ok(tag)
    }

    fn value(&mut self) -> Result<PhpValue> {
        match self.tag()? {
            b'N' => {
                self.expect(b';')?;
                Ok(PhpValue::Null)
            }
            b'b' => Ok(PhpValue::Bool(self.integer(b';')? != 0)),
            b'i' => Ok(PhpValue::Int(self.integer(b';')?)),
            b's' => Ok(PhpValue::Str(self.string_body()?)),
            b'a' => {
                let start = self.pos;
                let count = usize::try_from(self.integer(b':')?)
                    .map_err(|_| malformed(start, "negative array length"))?;
                self.expect(b'{')?;
                if self.depth >= MAX_DEPTH {
                    return Err(malformed(start, "arrays nested too deeply"));
                }
                self.depth += 1;
                let mut pairs = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    let key = self.key()?;
                    let value = self.value()?;
                    pairs.push((key, value));
                }
                self.depth -= 1;
                self.expect(b'}')?;
                Ok(PhpValue::Array(pairs))
            }
            other => Err(malformed(
                self.pos,
                &format!("unsupported value type '{}'", other as char),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_matches_php() {
        let value = PhpValue::Array(vec![
            (PhpKey::Str("name".into()), "Example".into()),
            (PhpKey::Str("api".into()), PhpValue::list(["3.0.0"])),
            (PhpKey::Str("website".into()), PhpValue::Null),
            (PhpKey::Str("creationDate".into()), PhpValue::Int(1_700_000_000)),
        ]);

        assert_eq!(
            value.serialize(),
            "a:4:{s:4:\"name\";s:7:\"Example\";s:3:\"api\";a:1:{i:0;s:5:\"3.0.0\";}\
             s:7:\"website\";N;s:12:\"creationDate\";i:1700000000;}"
        );
    }

    #[test]
    fn test_string_length_counts_bytes() {
        assert_eq!(PhpValue::from("é").serialize(), "s:2:\"é\";");
    }

    #[test]
    fn test_unserialize_nested_array() {
        let raw = b"a:2:{s:4:\"tags\";a:2:{i:0;s:1:\"a\";i:1;s:1:\"b\";}s:4:\"flag\";b:1;}";
        let value = PhpValue::unserialize(raw).expect("valid serialized data");
        assert_eq!(value.get("tags").map(PhpValue::display), Some("a, b".into()));
        assert_eq!(value.get("flag"), Some(&PhpValue::Bool(true)));
        assert_eq!(value.serialize().as_bytes(), &raw[..]);
    }

    #[test]
    fn test_unserialize_string_with_quote_inside() {
        let value = PhpValue::unserialize(b"s:3:\"a\"b\";").expect("length-prefixed");
        assert_eq!(value, PhpValue::Str("a\"b".into()));
    }

    #[test]
    fn test_unserialize_rejects_truncated_input() {
        assert!(PhpValue::unserialize(b"s:10:\"short\";").is_err());
        assert!(PhpValue::unserialize(b"a:1:{i:0;").is_err());
        assert!(PhpValue::unserialize(b"d:1.5;").is_err());
        assert!(PhpValue::unserialize(b"N;N;").is_err());
    }

    #[test]
    fn test_display_like_php_echo() {
        assert_eq!(PhpValue::Null.display(), "");
        assert_eq!(PhpValue::Int(7).display(), "7");
        assert_eq!(PhpValue::list(["Alice", "Bob"]).display(), "Alice, Bob");
    }

    #[test]
    fn test_unserialize_rejects_deep_nesting() {
        let nested = "a:1:{i:0;".repeat(100_000);
        let err = PhpValue::unserialize(nested.as_bytes()).expect_err("too deep");
        assert!(matches!(err, DevToolsError::Archive(ref msg) if msg.contains("nested")));

        let shallow = format!("{}N;{}", "a:1:{i:0;".repeat(8), "}".repeat(8));
        assert!(PhpValue::unserialize(shallow.as_bytes()).is_ok());
    }
}
