//! Compact serializer for the DAB JSON value model.
//!
//! Output carries no whitespace and object members appear in key order.
//! Bytes below 0x20 or above 0x7F inside strings are emitted as `%XX`
//! with uppercase hex; this matches the wire format of existing DAB
//! operators and is knowingly not reversible by the parser.

use super::Value;

const HEX: &[u8; 16] = b"0123456789ABCDEF";

impl Value {
    /// Serialize to a compact JSON string. With `quote_names` false,
    /// object keys are emitted without surrounding quotes.
    pub fn serialize(&self, quote_names: bool) -> String {
        let mut buf = String::new();
        write_value(self, &mut buf, quote_names);
        buf
    }
}

fn write_value(value: &Value, buf: &mut String, quote_names: bool) {
    match value {
        Value::Null => buf.push_str("null"),
        Value::Bool(true) => buf.push_str("true"),
        Value::Bool(false) => buf.push_str("false"),
        Value::Integer(n) => buf.push_str(&n.to_string()),
        Value::Double(d) => write_double(*d, buf),
        Value::String(s) => write_string(s, buf),
        Value::Array(items) => {
            buf.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                write_value(item, buf, quote_names);
            }
            buf.push(']');
        }
        Value::Object(map) => {
            buf.push('{');
            for (i, (key, member)) in map.iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                if quote_names {
                    buf.push('"');
                }
                buf.push_str(key);
                if quote_names {
                    buf.push('"');
                }
                buf.push(':');
                write_value(member, buf, quote_names);
            }
            buf.push('}');
        }
        Value::ArrayMarker => {}
    }
}

fn write_double(d: f64, buf: &mut String) {
    // keep a decimal point on whole values so the text reparses as a double
    if d.is_finite() && d.fract() == 0.0 {
        buf.push_str(&format!("{d:.1}"));
    } else {
        buf.push_str(&d.to_string());
    }
}

fn write_string(s: &str, buf: &mut String) {
    buf.push('"');
    for byte in s.bytes() {
        match byte {
            b'"' => buf.push_str("\\\""),
            b'\\' => buf.push_str("\\\\"),
            b'\r' => buf.push_str("\\r"),
            b'\n' => buf.push_str("\\n"),
            b'\t' => buf.push_str("\\t"),
            _ if byte < 0x20 || byte > 0x7F => {
                buf.push('%');
                buf.push(HEX[(byte >> 4) as usize] as char);
                buf.push(HEX[(byte & 0x0F) as usize] as char);
            }
            _ => buf.push(byte as char),
        }
    }
    buf.push('"');
}
