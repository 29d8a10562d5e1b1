//! Import/export of `mapping.yaml` documents (ch57x-keyboard-tool layout).
//!
//! ```yaml
//! orientation: normal
//! rows: 2
//! columns: 3
//! knobs: 1
//! layers:
//!   - buttons:
//!       - ["ctrl-c", "ctrl-v", "f13"]
//!       - ["f14", "f15", "shift-f16"]
//!     knobs:
//!       - ccw: volumedown
//!         press: mute
//!         cw: volumeup
//! ```
//!
//! A bad action never rejects the document: the slot becomes "no key" and
//! the problem is kept in [`Mapping::issues`].

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tracing::{info, warn};

use crate::action::{parse_action, KeyAction};
use crate::button::Button;
use crate::error::{MiniKbError, Result};
use crate::programmer::KeyProgrammer;

fn default_orientation() -> String {
    "normal".to_string()
}

fn default_rows() -> u8 {
    2
}

fn default_columns() -> u8 {
    3
}

fn default_knobs() -> u8 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingDocument {
    #[serde(default = "default_orientation")]
    pub orientation: String,
    #[serde(default = "default_rows")]
    pub rows: u8,
    #[serde(default = "default_columns")]
    pub columns: u8,
    #[serde(default = "default_knobs")]
    pub knobs: u8,
    #[serde(default)]
    pub layers: Vec<LayerDocument>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayerDocument {
    #[serde(default)]
    pub buttons: Vec<Vec<Option<Value>>>,
    #[serde(default)]
    pub knobs: Vec<KnobDocument>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnobDocument {
    #[serde(default)]
    pub ccw: Option<Value>,
    #[serde(default)]
    pub press: Option<Value>,
    #[serde(default)]
    pub cw: Option<Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KnobMapping {
    pub ccw: KeyAction,
    pub press: KeyAction,
    pub cw: KeyAction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerMapping {
    /// Row-major grid, as written in the document.
    pub buttons: Vec<Vec<KeyAction>>,
    pub knob: KnobMapping,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingIssue {
    pub location: String,
    pub text: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub orientation: String,
    pub rows: u8,
    pub columns: u8,
    pub knobs: u8,
    pub layers: Vec<LayerMapping>,
    pub issues: Vec<MappingIssue>,
}

impl Mapping {
    pub fn to_document(&self) -> MappingDocument {
        let action = |a: &KeyAction| Some(Value::String(a.to_string()));
        MappingDocument {
            orientation: self.orientation.clone(),
            rows: self.rows,
            columns: self.columns,
            knobs: self.knobs,
            layers: self
                .layers
                .iter()
                .map(|layer| LayerDocument {
                    buttons: layer
                        .buttons
                        .iter()
                        .map(|row| row.iter().map(action).collect())
                        .collect(),
                    knobs: vec![KnobDocument {
                        ccw: action(&layer.knob.ccw),
                        press: action(&layer.knob.press),
                        cw: action(&layer.knob.cw),
                    }],
                })
                .collect(),
        }
    }
}

fn resolve(
    value: Option<&Value>,
    location: String,
    issues: &mut Vec<MappingIssue>,
) -> KeyAction {
    let text = match value {
        None | Some(Value::Null) => return KeyAction::NONE,
        Some(Value::String(s)) if s.trim().is_empty() => return KeyAction::NONE,
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => {
            let issue = MappingIssue {
                location,
                text: format!("{other:?}"),
                reason: "action must be a string".to_string(),
            };
            warn!("{}: {} ({})", issue.location, issue.reason, issue.text);
            issues.push(issue);
            return KeyAction::NONE;
        }
    };

    match parse_action(&text) {
        Ok(action) => action,
        Err(e) => {
            warn!("{}: {} in '{}', using no key", location, e, text);
            issues.push(MappingIssue {
                location,
                text,
                reason: e.to_string(),
            });
            KeyAction::NONE
        }
    }
}

pub fn from_document(doc: &MappingDocument) -> Result<Mapping> {
    if doc.layers.is_empty() {
        return Err(MiniKbError::Document("missing 'layers'".to_string()));
    }

    let mut issues = Vec::new();
    let mut layers = Vec::with_capacity(doc.layers.len());
    for (l, layer) in doc.layers.iter().enumerate() {
        let mut buttons: Vec<Vec<KeyAction>> = Vec::with_capacity(layer.buttons.len());
        for (r, row) in layer.buttons.iter().enumerate() {
            let row = row
                .iter()
                .enumerate()
                .map(|(c, value)| {
                    resolve(value.as_ref(), format!("layer {l} button ({r},{c})"), &mut issues)
                })
                .collect();
            buttons.push(row);
        }

        let knob_doc = layer.knobs.first().cloned().unwrap_or_default();
        let knob = KnobMapping {
            ccw: resolve(knob_doc.ccw.as_ref(), format!("layer {l} knob ccw"), &mut issues),
            press: resolve(knob_doc.press.as_ref(), format!("layer {l} knob press"), &mut issues),
            cw: resolve(knob_doc.cw.as_ref(), format!("layer {l} knob cw"), &mut issues),
        };
        if layer.knobs.len() > 1 {
            warn!("layer {}: only the first of {} knobs is used", l, layer.knobs.len());
        }

        layers.push(LayerMapping { buttons, knob });
    }

    Ok(Mapping {
        orientation: doc.orientation.clone(),
        rows: doc.rows,
        columns: doc.columns,
        knobs: doc.knobs,
        layers,
        issues,
    })
}

pub fn parse(text: &str) -> Result<Mapping> {
    let doc: MappingDocument = serde_yaml::from_str(text)?;
    from_document(&doc)
}

pub fn load(path: &Path) -> Result<Mapping> {
    let text = fs::read_to_string(path)?;
    parse(&text)
}

pub fn export(mapping: &Mapping) -> Result<String> {
    Ok(serde_yaml::to_string(&mapping.to_document())?)
}

/// Programs layer 0 of `mapping`.
pub fn apply<P: KeyProgrammer>(
    programmer: &mut P,
    mapping: &Mapping,
) -> Result<Vec<(Button, KeyAction)>> {
    apply_layer(programmer, mapping, 0)
}

/// Grid cells go to button1..button6 in row-major order, then knob ccw,
/// press, cw. Stops at the first transport error.
pub fn apply_layer<P: KeyProgrammer>(
    programmer: &mut P,
    mapping: &Mapping,
    layer: usize,
) -> Result<Vec<(Button, KeyAction)>> {
    let layer_mapping = mapping.layers.get(layer).ok_or_else(|| {
        MiniKbError::Document(format!(
            "layer {} does not exist ({} defined)",
            layer,
            mapping.layers.len()
        ))
    })?;

    let cells: Vec<KeyAction> = layer_mapping.buttons.iter().flatten().copied().collect();
    if cells.len() > Button::KEYS.len() {
        warn!(
            "{} button cells defined, only the first {} are used",
            cells.len(),
            Button::KEYS.len()
        );
    }

    let mut plan: Vec<(Button, KeyAction)> = Button::KEYS.into_iter().zip(cells).collect();
    let knob = &layer_mapping.knob;
    plan.extend(Button::KNOB.into_iter().zip([knob.ccw, knob.press, knob.cw]));

    for &(button, action) in &plan {
        programmer.set_key(button, action)?;
    }
    info!("applied layer {}: {} controls", layer, plan.len());
    Ok(plan)
}
