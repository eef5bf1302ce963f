//! Form drafts: `{field, value}` change events applied to a JSON draft through
//! dotted paths, plus the slide-over shell that submits them.

use anyhow::{anyhow, bail, Context, Result};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::ApiError;

/// Returns a copy of `root` with the value at `path` set, creating objects for
/// every missing or `null` segment on the way. The input is never modified, so
/// successive drafts share no nested objects.
///
/// Segments are always object keys; `"items.0"` creates `{"items": {"0": ..}}`.
pub fn set_nested(root: &Value, path: &str, value: Value) -> Value {
    let mut next = root.clone();
    if path.is_empty() {
        return next;
    }

    let mut segments: Vec<&str> = path.split('.').collect();
    let Some(last) = segments.pop() else {
        return next;
    };

    let mut cursor = &mut next;
    for segment in segments {
        cursor = ensure_object(cursor)
            .entry(segment.to_string())
            .or_insert(Value::Null);
    }
    ensure_object(cursor).insert(last.to_string(), value);
    next
}

pub fn get_nested<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(root);
    }
    path.split('.').try_fold(root, |node, segment| node.get(segment))
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("non-object replaced above"),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub field: String,
    pub value: Value,
}

impl FieldChange {
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self { field: field.into(), value: value.into() }
    }
}

/// Parses `field.path=value` from the command line.
pub fn parse_assignment(raw: &str) -> Result<FieldChange> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("Expected field=value, got '{}'", raw))?;
    let field = field.trim();
    if field.is_empty() || field.split('.').any(str::is_empty) {
        bail!("Invalid field path in '{}'", raw);
    }
    Ok(FieldChange::new(field, value.trim()))
}

fn parse_yes_no(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "yes" | "true" | "y" => Some(true),
        "no" | "false" | "n" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct Form {
    draft: Value,
    required: Vec<&'static str>,
    booleans: Vec<&'static str>,
}

impl Form {
    pub fn new(initial: Value) -> Self {
        Self { draft: initial, required: Vec::new(), booleans: Vec::new() }
    }

    pub fn required(mut self, fields: &[&'static str]) -> Self {
        self.required.extend_from_slice(fields);
        self
    }

    /// Fields rendered as Yes/No selects; string input is coerced to a bool.
    pub fn booleans(mut self, fields: &[&'static str]) -> Self {
        self.booleans.extend_from_slice(fields);
        self
    }

    pub fn apply(&mut self, change: FieldChange) -> Result<()> {
        let FieldChange { field, value } = change;
        let value = match value {
            Value::String(raw) if self.booleans.iter().any(|b| *b == field) => {
                let flag = parse_yes_no(&raw)
                    .ok_or_else(|| anyhow!("Field '{}' expects yes or no, got '{}'", field, raw))?;
                Value::Bool(flag)
            }
            other => other,
        };
        self.draft = set_nested(&self.draft, &field, value);
        Ok(())
    }

    pub fn apply_all(&mut self, changes: impl IntoIterator<Item = FieldChange>) -> Result<()> {
        for change in changes {
            self.apply(change)?;
        }
        Ok(())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        get_nested(&self.draft, field)
    }

    pub fn draft(&self) -> &Value {
        &self.draft
    }

    pub fn missing_required(&self) -> Vec<&'static str> {
        self.required
            .iter()
            .copied()
            .filter(|field| match self.get(field) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(_) => false,
            })
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        let missing = self.missing_required();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(anyhow!("Missing required field(s): {}", missing.join(", ")))
        }
    }

    pub fn to_payload<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.draft.clone()).context("Form does not match the expected shape")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    Closed,
    Open,
    Submitting,
}

/// Create/edit panel around a [`Form`]. A failed submit keeps the panel open
/// with the error in `banner`; a successful one closes it.
#[derive(Debug)]
pub struct SlideOver {
    title: String,
    panel: Panel,
    banner: Option<String>,
    form: Form,
}

impl SlideOver {
    pub fn open(title: impl Into<String>, form: Form) -> Self {
        Self { title: title.into(), panel: Panel::Open, banner: None, form }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn panel(&self) -> Panel {
        self.panel
    }

    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    pub fn form(&self) -> &Form {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut Form {
        &mut self.form
    }

    pub fn close(&mut self) {
        self.panel = Panel::Closed;
        self.banner = None;
    }

    pub fn submit<T, F>(&mut self, handler: F) -> Result<T>
    where
        F: FnOnce(&Value) -> Result<T, ApiError>,
    {
        if self.panel != Panel::Open {
            bail!("'{}' is not open", self.title);
        }
        if let Err(e) = self.form.validate() {
            self.banner = Some(e.to_string());
            return Err(e);
        }

        self.panel = Panel::Submitting;
        self.banner = None;
        match handler(self.form.draft()) {
            Ok(output) => {
                self.close();
                Ok(output)
            }
            Err(e) => {
                tracing::warn!(title = %self.title, error = %e, "submit failed");
                self.panel = Panel::Open;
                self.banner = Some(e.banner());
                Err(e.into())
            }
        }
    }
}
