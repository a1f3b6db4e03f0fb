use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::document::multiline;

/// One entry in a code cell's `outputs`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "output_type", rename_all = "snake_case")]
pub enum Output {
    Stream {
        name: String,
        #[serde(deserialize_with = "multiline")]
        text: String,
    },
    ExecuteResult {
        #[serde(default)]
        execution_count: Option<u64>,
        #[serde(default)]
        data: Map<String, Value>,
        #[serde(default)]
        metadata: Map<String, Value>,
    },
    DisplayData {
        #[serde(default)]
        data: Map<String, Value>,
        #[serde(default)]
        metadata: Map<String, Value>,
    },
    Error {
        ename: String,
        evalue: String,
        #[serde(default)]
        traceback: Vec<String>,
    },
}

impl Output {
    pub fn stream(text: impl Into<String>) -> Self {
        Output::Stream {
            name: "stdout".into(),
            text: text.into(),
        }
    }

    pub fn execute_result(text_plain: impl Into<String>) -> Self {
        let mut data = Map::new();
        data.insert("text/plain".into(), Value::String(text_plain.into()));
        Output::ExecuteResult {
            execution_count: None,
            data,
            metadata: Map::new(),
        }
    }

    pub fn error(ename: impl Into<String>, evalue: impl Into<String>) -> Self {
        Output::Error {
            ename: ename.into(),
            evalue: evalue.into(),
            traceback: Vec::new(),
        }
    }

    /// The textual content of this output.
    ///
    /// Stream text, else the `text/plain` entry of the mime bundle. `None` when
    /// the output has no textual field at all (errors, image-only displays).
    pub fn text(&self) -> Option<String> {
        match self {
            Output::Stream { text, .. } => Some(text.clone()),
            Output::ExecuteResult { data, .. } | Output::DisplayData { data, .. } => {
                match data.get("text/plain")? {
                    Value::String(s) => Some(s.clone()),
                    Value::Array(lines) => Some(
                        lines
                            .iter()
                            .filter_map(Value::as_str)
                            .collect::<Vec<_>>()
                            .concat(),
                    ),
                    _ => None,
                }
            }
            Output::Error { .. } => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Output::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(v: Value) -> Output {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn stream_text() {
        let out = parse(json!({"output_type": "stream", "name": "stdout", "text": ["a\n", "b"]}));
        assert_eq!(out.text().as_deref(), Some("a\nb"));
    }

    #[test]
    fn execute_result_uses_text_plain() {
        let out = parse(json!({
            "output_type": "execute_result",
            "execution_count": 3,
            "data": {"text/plain": ["[1, ", "2]"], "text/html": "<b>x</b>"},
            "metadata": {}
        }));
        assert_eq!(out.text().as_deref(), Some("[1, 2]"));
    }

    #[test]
    fn image_only_display_has_no_text() {
        let out = parse(json!({
            "output_type": "display_data",
            "data": {"image/png": "iVBOR..."},
            "metadata": {}
        }));
        assert_eq!(out.text(), None);
    }

    #[test]
    fn error_has_no_text() {
        let out = parse(json!({
            "output_type": "error",
            "ename": "NameError",
            "evalue": "name 'x' is not defined",
            "traceback": []
        }));
        assert!(out.is_error());
        assert_eq!(out.text(), None);
    }

    #[test]
    fn constructors_serialise_with_output_type() {
        let v = serde_json::to_value(Output::execute_result("42")).unwrap();
        assert_eq!(v["output_type"], "execute_result");
        assert_eq!(v["data"]["text/plain"], "42");
        let v = serde_json::to_value(Output::stream("hi")).unwrap();
        assert_eq!(v["output_type"], "stream");
        assert_eq!(v["name"], "stdout");
    }
}
