// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Diagram and marker export/import.
//!
//! Both formats are JSON arrays. Imports are validated as a whole: one bad
//! entry rejects the batch so nothing is partially applied.

use crate::models::marker::{StoneMarker, MARKER_PALETTE};
use crate::models::shape::Shape;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("JSON is not an array")]
    NotArray,
    #[error("No entries found in JSON")]
    Empty,
    #[error("Entry {index} is invalid: {reason}")]
    InvalidEntry { index: usize, reason: String },
    #[error("Duplicate id \"{0}\"")]
    DuplicateId(String),
}

/// Marker fields written by the export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerExport {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
}

fn round3(value: f32) -> f32 {
    (value * 1000.0).round() / 1000.0
}

/// Export shapes as a pretty JSON array.
pub fn shapes_to_json(shapes: &[Shape]) -> Result<String> {
    Ok(serde_json::to_string_pretty(shapes)?)
}

/// Export markers as a pretty JSON array of `{id, x, y, radius}`, each
/// number rounded to three decimals.
pub fn markers_to_json(markers: &[StoneMarker]) -> Result<String> {
    let export: Vec<MarkerExport> = markers
        .iter()
        .map(|m| MarkerExport {
            id: m.id.clone(),
            x: round3(m.x),
            y: round3(m.y),
            radius: round3(m.radius),
        })
        .collect();
    Ok(serde_json::to_string_pretty(&export)?)
}

/// Default file name for a marker export made on `date`.
pub fn marker_export_filename(date: chrono::NaiveDate) -> String {
    format!("markers-{}.json", date.format("%Y-%m-%d"))
}

fn parse_array(json: &str) -> Result<Vec<Value>, ImportError> {
    match serde_json::from_str::<Value>(json)? {
        Value::Array(items) if items.is_empty() => Err(ImportError::Empty),
        Value::Array(items) => Ok(items),
        _ => Err(ImportError::NotArray),
    }
}

fn require_str<'a>(entry: &'a Value, field: &str) -> Result<&'a str, String> {
    entry
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("\"{field}\" must be a string"))
}

/// A number that stays finite once narrowed to the f32 the models store.
fn require_number(entry: &Value, field: &str) -> Result<f64, String> {
    entry
        .get(field)
        .and_then(Value::as_f64)
        .filter(|v| (*v as f32).is_finite())
        .ok_or_else(|| format!("\"{field}\" must be a finite number"))
}

fn check_unique<'a>(ids: impl Iterator<Item = &'a str>) -> Result<(), ImportError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(ImportError::DuplicateId(id.to_string()));
        }
    }
    Ok(())
}

fn validate_shape(entry: &Value) -> Result<Shape, String> {
    if !entry.is_object() {
        return Err("not an object".into());
    }
    require_str(entry, "id")?;
    match require_str(entry, "type")? {
        "circle" | "square" => {}
        other => return Err(format!("unknown type \"{other}\"")),
    }
    for field in ["x", "y"] {
        require_number(entry, field)?;
    }
    for field in ["width", "height"] {
        if require_number(entry, field)? < 0.0 {
            return Err(format!("\"{field}\" must not be negative"));
        }
    }
    require_str(entry, "text")?;
    require_str(entry, "color")?;
    Shape::deserialize(entry).map_err(|e| e.to_string())
}

/// Parse and validate a diagram import.
pub fn shapes_from_json(json: &str) -> Result<Vec<Shape>, ImportError> {
    let shapes = parse_array(json)?
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            validate_shape(entry).map_err(|reason| ImportError::InvalidEntry { index, reason })
        })
        .collect::<Result<Vec<_>, _>>()?;
    check_unique(shapes.iter().map(|s| s.id.as_str()))?;
    Ok(shapes)
}

fn validate_marker(index: usize, entry: &Value) -> Result<StoneMarker, String> {
    let id = require_str(entry, "id")?;
    let x = require_number(entry, "x")?;
    let y = require_number(entry, "y")?;
    let radius = require_number(entry, "radius")?;
    if !(0.0..=1.0).contains(&x) || !(0.0..=1.0).contains(&y) {
        return Err("position must be within 0..1".into());
    }
    if radius <= 0.0 || radius > 1.0 {
        return Err("radius must be within (0, 1]".into());
    }

    let fallback_index = index % MARKER_PALETTE.len();
    let color = entry
        .get("color")
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty())
        .unwrap_or(MARKER_PALETTE[fallback_index])
        .to_string();
    let color_index = match entry.get("colorIndex") {
        None | Some(Value::Null) => fallback_index,
        Some(value) => value
            .as_u64()
            .and_then(|i| usize::try_from(i).ok())
            .filter(|i| *i < MARKER_PALETTE.len())
            .ok_or_else(|| format!("\"colorIndex\" must be below {}", MARKER_PALETTE.len()))?,
    };

    Ok(StoneMarker {
        id: id.to_string(),
        x: x as f32,
        y: y as f32,
        radius: radius as f32,
        color,
        color_index,
    })
}

/// Parse and validate a marker import. Missing colors are filled in from
/// the palette by position.
pub fn markers_from_json(json: &str) -> Result<Vec<StoneMarker>, ImportError> {
    let markers = parse_array(json)?
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            validate_marker(index, entry).map_err(|reason| ImportError::InvalidEntry { index, reason })
        })
        .collect::<Result<Vec<_>, _>>()?;
    check_unique(markers.iter().map(|m| m.id.as_str()))?;
    Ok(markers)
}

/// Write an export document to disk.
pub fn write_export(path: &Path, json: &str) -> Result<()> {
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

/// Read an import document from disk.
pub fn read_import(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::shape::ShapeKind;

    #[test]
    fn test_import_single_shape_exact_values() {
        let json = r##"[{"id":"a","type":"circle","x":1,"y":2,"text":"t","width":10,"height":10,"color":"#fff"}]"##;
        let shapes = shapes_from_json(json).unwrap();
        assert_eq!(shapes.len(), 1);
        let shape = &shapes[0];
        assert_eq!(shape.id, "a");
        assert_eq!(shape.kind, ShapeKind::Circle);
        assert_eq!((shape.x, shape.y), (1.0, 2.0));
        assert_eq!(shape.text, "t");
        assert_eq!((shape.width, shape.height), (10.0, 10.0));
        assert_eq!(shape.color.as_deref(), Some("#fff"));
    }

    #[test]
    fn test_import_rejects_missing_fields() {
        let err = shapes_from_json(r#"[{"id":"bad"}]"#).unwrap_err();
        assert!(matches!(err, ImportError::InvalidEntry { index: 0, .. }));
    }

    #[test]
    fn test_import_rejects_whole_batch() {
        let json = r##"[
            {"id":"a","type":"square","x":0,"y":0,"text":"ok","width":10,"height":10,"color":"#000"},
            {"id":"b","type":"triangle","x":0,"y":0,"text":"no","width":10,"height":10,"color":"#000"}
        ]"##;
        assert!(matches!(
            shapes_from_json(json),
            Err(ImportError::InvalidEntry { index: 1, .. })
        ));
    }

    #[test]
    fn test_import_rejects_non_array_and_empty() {
        assert!(matches!(shapes_from_json("{}"), Err(ImportError::NotArray)));
        assert!(matches!(shapes_from_json("[]"), Err(ImportError::Empty)));
        assert!(matches!(shapes_from_json("[{"), Err(ImportError::Json(_))));
    }

    #[test]
    fn test_import_rejects_numbers_beyond_f32() {
        let json = r##"[
            {"id":"a","type":"square","x":1e39,"y":0,"text":"far","width":10,"height":10,"color":"#000"},
            {"id":"b","type":"circle","x":0,"y":0,"text":"ok","width":10,"height":10,"color":"#000"}
        ]"##;
        assert!(matches!(
            shapes_from_json(json),
            Err(ImportError::InvalidEntry { index: 0, .. })
        ));

        let wide = r##"[{"id":"a","type":"square","x":0,"y":0,"text":"","width":-1e39,"height":1,"color":"#000"}]"##;
        assert!(shapes_from_json(wide).is_err());
        assert!(markers_from_json(r#"[{"id":"s1","x":0.5,"y":1e39,"radius":0.1}]"#).is_err());
    }

    #[test]
    fn test_marker_import_checks_color_index() {
        assert!(matches!(
            markers_from_json(r#"[{"id":"s1","x":0.5,"y":0.5,"radius":0.1,"colorIndex":5000}]"#),
            Err(ImportError::InvalidEntry { index: 0, .. })
        ));
        assert!(markers_from_json(r#"[{"id":"s1","x":0.5,"y":0.5,"radius":0.1,"colorIndex":-1}]"#).is_err());
        assert!(markers_from_json(r#"[{"id":"s1","x":0.5,"y":0.5,"radius":0.1,"colorIndex":"3"}]"#).is_err());

        let last = MARKER_PALETTE.len() - 1;
        let json = format!(r#"[{{"id":"s1","x":0.5,"y":0.5,"radius":0.1,"colorIndex":{last}}},{{"id":"s2","x":0.5,"y":0.5,"radius":0.1}}]"#);
        let markers = markers_from_json(&json).unwrap();
        assert_eq!(markers[0].color_index, last);
        assert_eq!(markers[1].color_index, 1);
    }

    #[test]
    fn test_import_rejects_duplicate_ids() {
        let entry = r##"{"id":"a","type":"square","x":0,"y":0,"text":"","width":1,"height":1,"color":"#000"}"##;
        let json = format!("[{entry},{entry}]");
        assert!(matches!(shapes_from_json(&json), Err(ImportError::DuplicateId(id)) if id == "a"));
    }

    #[test]
    fn test_shape_export_reimports() {
        let json = r##"[{"id":"a","type":"square","x":5.5,"y":2,"text":"Bed","width":80,"height":40,"color":"#795548","zIndex":3}]"##;
        let shapes = shapes_from_json(json).unwrap();
        let exported = shapes_to_json(&shapes).unwrap();
        assert_eq!(shapes_from_json(&exported).unwrap(), shapes);
    }

    #[test]
    fn test_marker_export_rounds_and_reimports() {
        let marker = StoneMarker {
            id: "s1".into(),
            x: 0.333333,
            y: 0.666666,
            radius: 0.05,
            color: "#FF6B6B".into(),
            color_index: 0,
        };
        let exported = markers_to_json(std::slice::from_ref(&marker)).unwrap();
        let parsed: Vec<MarkerExport> = serde_json::from_str(&exported).unwrap();
        assert_eq!(parsed[0].x, 0.333);
        assert_eq!(parsed[0].y, 0.667);
        assert_eq!(parsed[0].radius, 0.05);

        let reimported = markers_from_json(&exported).unwrap();
        assert_eq!(reimported.len(), 1);
        assert_eq!(reimported[0].id, "s1");
        assert!((reimported[0].x - marker.x).abs() <= 0.0005 + f32::EPSILON);
        assert!((reimported[0].y - marker.y).abs() <= 0.0005 + f32::EPSILON);
        assert_eq!(reimported[0].color, MARKER_PALETTE[0]);
        assert_eq!(reimported[0].color_index, 0);
    }

    #[test]
    fn test_marker_import_validates_ranges() {
        assert!(markers_from_json(r#"[{"id":"s1","x":1.5,"y":0.5,"radius":0.05}]"#).is_err());
        assert!(markers_from_json(r#"[{"id":"s1","x":0.5,"y":0.5,"radius":0}]"#).is_err());
        assert!(matches!(markers_from_json("[]"), Err(ImportError::Empty)));

        let ok = markers_from_json(
            r##"[{"id":"s1","x":0.5,"y":0.5,"radius":0.1,"color":"#123456","colorIndex":7}]"##,
        )
        .unwrap();
        assert_eq!(ok[0].color, "#123456");
        assert_eq!(ok[0].color_index, 7);
    }

    #[test]
    fn test_marker_export_filename() {
        let date = chrono::NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        assert_eq!(marker_export_filename(date), "markers-2025-03-09.json");
    }
}
