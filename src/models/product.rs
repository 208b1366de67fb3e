use serde::{ Deserialize, Serialize };
use serde_json::{ Map, Value };
use std::io;

/// A catalog row. Columns beyond the well-known ones are carried through untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Product(pub Map<String, Value>);

impl Product {
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    pub fn description(&self) -> Option<&str> {
        self.0.get("description").and_then(Value::as_str)
    }

    /// Numeric price. Postgres `numeric` columns can arrive as strings.
    pub fn price(&self) -> Option<f64> {
        let price = match self.0.get("price")? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        price.filter(|p| p.is_finite())
    }

    /// `$19.50`, or `N/A` when the price is missing.
    pub fn display_price(&self) -> String {
        match self.price() {
            Some(p) => format!("${:.2}", p),
            None => "N/A".to_string(),
        }
    }

    /// JSON with `", "` and `": "` separators, as embedded in the prompt context.
    pub fn to_spaced_json(&self) -> String {
        let mut out = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(&mut out, SpacedFormatter);
        if self.serialize(&mut ser).is_err() {
            return Value::Object(self.0.clone()).to_string();
        }
        String::from_utf8(out).unwrap_or_default()
    }
}

impl From<Value> for Product {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Product(map),
            _ => Product::default(),
        }
    }
}

/// A product returned by similarity search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub product: Product,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
}

struct SpacedFormatter;

impl serde_json::ser::Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
        where W: ?Sized + io::Write
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
        where W: ?Sized + io::Write
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
        where W: ?Sized + io::Write
    {
        writer.write_all(b": ")
    }
}
