use super::document::Cell;
use serde_json::{Map, Value};

const AUTOGRADING_KEY: &str = "autograding";

/// A question identifier and its point value, read from cell metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionTag {
    pub id: String,
    pub points: f64,
}

fn id_from(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn points_from(value: &Value) -> Option<f64> {
    value.as_f64().filter(|p| p.is_finite() && *p >= 0.0)
}

/// Read question metadata from a cell.
///
/// Accepted forms, in order:
/// - `"question": ["Q1", 10]`
/// - `"question": {"id": "Q1", "points": 10}`
/// - `"nbgrader": {"grade": true, "grade_id": "Q1", "points": 10}`
///
/// Returns `Ok(None)` for cells that are not questions and `Err` for a
/// `question` entry that is present but incomplete.
pub fn question_tag(metadata: &Map<String, Value>) -> Result<Option<QuestionTag>, String> {
    if let Some(q) = metadata.get("question") {
        let (id, points) = match q {
            Value::Array(items) if items.len() == 2 => (id_from(&items[0]), points_from(&items[1])),
            Value::Object(obj) => (
                obj.get("id").and_then(id_from),
                obj.get("points").and_then(points_from),
            ),
            other => return Err(format!("unrecognised question metadata: {other}")),
        };
        return match (id, points) {
            (Some(id), Some(points)) => Ok(Some(QuestionTag { id, points })),
            (None, _) => Err(format!("question metadata has no id: {q}")),
            (Some(id), None) => Err(format!("question {id} has no valid points value")),
        };
    }

    if let Some(Value::Object(nb)) = metadata.get("nbgrader") {
        if nb.get("grade").and_then(Value::as_bool) != Some(true) {
            return Ok(None);
        }
        let id = nb
            .get("grade_id")
            .and_then(id_from)
            .ok_or_else(|| "nbgrader graded cell has no grade_id".to_string())?;
        let points = nb
            .get("points")
            .and_then(points_from)
            .ok_or_else(|| format!("nbgrader cell {id} has no valid points value"))?;
        return Ok(Some(QuestionTag { id, points }));
    }

    Ok(None)
}

/// The role identifier used to pair cells by tag, in order of preference:
/// - an explicit `grader_role` string;
/// - the question id;
/// - an `autograding` entry that names its cell, either `"autograding": "Q1"`
///   or `"autograding": {"id": "Q1", ...}`.
///
/// Malformed question metadata yields `None`.
pub fn role_id(metadata: &Map<String, Value>) -> Option<String> {
    if let Some(role) = metadata.get("grader_role").and_then(id_from) {
        return Some(role);
    }
    if let Some(id) = question_tag(metadata).ok().flatten().map(|q| q.id) {
        return Some(id);
    }
    match metadata.get(AUTOGRADING_KEY)? {
        Value::Object(obj) => obj.get("id").and_then(id_from),
        other => id_from(other),
    }
}

/// Role of every cell, in document order.
///
/// Cells carrying an `autograding` entry without an identifier of their own
/// (`"autograding": true`, `{}`) are numbered by occurrence as
/// `autograding-1`, `autograding-2`, ...
pub fn cell_roles(cells: &[Cell]) -> Vec<Option<String>> {
    let mut anonymous = 0;
    cells
        .iter()
        .map(|cell| {
            let metadata = cell.metadata();
            role_id(metadata).or_else(|| {
                metadata.contains_key(AUTOGRADING_KEY).then(|| {
                    anonymous += 1;
                    format!("{AUTOGRADING_KEY}-{anonymous}")
                })
            })
        })
        .collect()
}
