/// Lamppost location source.
///
/// Reads the named layer of a geospatial dataset into `LocationRecord`s. Two
/// containers are supported without a GDAL install:
///
/// - GeoPackage (`.gpkg`, also plain `.sqlite` / `.db`): a SQLite file where
///   each layer is a table. Every non-BLOB column becomes an attribute; the
///   geometry column is a BLOB and is skipped.
/// - GeoJSON (`.geojson`, `.json`): a FeatureCollection whose feature
///   `properties` become attributes. A collection is a single layer; when it
///   declares a `name`, that name must match the requested layer.
///
/// Anything else, including Esri File Geodatabase directories, is rejected.
/// Convert those first, e.g. `ogr2ogr -f GPKG out.gpkg in.gdb smart_lamppost`.

use std::path::Path;

use geojson::GeoJson;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OpenFlags};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::{CollectorError, Result};
use crate::model::{AttrValue, LocationRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    GeoPackage,
    GeoJson,
}

impl SourceFormat {
    /// Infer the container format from the file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "gpkg" | "sqlite" | "db" => Ok(SourceFormat::GeoPackage),
            "geojson" | "json" => Ok(SourceFormat::GeoJson),
            "gdb" => Err(CollectorError::UnsupportedSource {
                path: path.to_path_buf(),
                reason: "File Geodatabase is not readable directly; export the layer to GeoPackage or GeoJSON".to_string(),
            }),
            _ => Err(CollectorError::UnsupportedSource {
                path: path.to_path_buf(),
                reason: format!("unrecognized extension '{}'", ext),
            }),
        }
    }
}

/// Load every row of `layer` from the source at `path`, in layer order.
pub fn load_locations(path: &Path, layer: &str) -> Result<Vec<LocationRecord>> {
    let format = SourceFormat::from_path(path)?;
    debug!(path = %path.display(), layer, ?format, "opening location source");

    match format {
        SourceFormat::GeoPackage => load_geopackage(path, layer),
        SourceFormat::GeoJson => load_geojson(path, layer),
    }
}

// ---------------------------------------------------------------------------
// GeoPackage
// ---------------------------------------------------------------------------

fn load_geopackage(path: &Path, layer: &str) -> Result<Vec<LocationRecord>> {
    let source_err = |e: rusqlite::Error| CollectorError::SourceOpen {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };
    let layer_err = |reason: String| CollectorError::LayerNotFound {
        path: path.to_path_buf(),
        layer: layer.to_string(),
        reason,
    };

    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(source_err)?;

    let exists: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
            [layer],
            |row| row.get(0),
        )
        .map_err(source_err)?;
    if exists == 0 {
        return Err(layer_err("no such table or view".to_string()));
    }

    let sql = format!("SELECT * FROM \"{}\"", layer.replace('"', "\"\""));
    let mut stmt = conn.prepare(&sql).map_err(|e| layer_err(e.to_string()))?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut rows = stmt.query([]).map_err(|e| layer_err(e.to_string()))?;
    let mut locations = Vec::new();
    while let Some(row) = rows.next().map_err(|e| layer_err(e.to_string()))? {
        let mut attributes = Vec::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            let value: SqlValue = row.get(i).map_err(|e| layer_err(e.to_string()))?;
            let value = match value {
                SqlValue::Null => AttrValue::Null,
                SqlValue::Integer(n) => AttrValue::Number(n as f64),
                SqlValue::Real(n) => AttrValue::Number(n),
                SqlValue::Text(s) => AttrValue::Text(s),
                SqlValue::Blob(_) => continue,
            };
            attributes.push((name.clone(), value));
        }
        locations.push(LocationRecord::new(locations.len(), attributes));
    }

    Ok(locations)
}

// ---------------------------------------------------------------------------
// GeoJSON
// ---------------------------------------------------------------------------

fn json_to_attr(value: &JsonValue) -> AttrValue {
    match value {
        JsonValue::Null => AttrValue::Null,
        JsonValue::Number(n) => n.as_f64().map(AttrValue::Number).unwrap_or(AttrValue::Null),
        JsonValue::String(s) => AttrValue::Text(s.clone()),
        other => AttrValue::Text(other.to_string()),
    }
}

fn load_geojson(path: &Path, layer: &str) -> Result<Vec<LocationRecord>> {
    let text = std::fs::read_to_string(path).map_err(|e| CollectorError::SourceOpen {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let geojson: GeoJson = text.parse().map_err(|e: geojson::Error| CollectorError::SourceOpen {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => {
            return Err(CollectorError::LayerNotFound {
                path: path.to_path_buf(),
                layer: layer.to_string(),
                reason: "document is not a FeatureCollection".to_string(),
            });
        }
    };

    let declared_name = collection
        .foreign_members
        .as_ref()
        .and_then(|members| members.get("name"))
        .and_then(JsonValue::as_str);
    if let Some(name) = declared_name {
        if name != layer {
            return Err(CollectorError::LayerNotFound {
                path: path.to_path_buf(),
                layer: layer.to_string(),
                reason: format!("collection is named '{}'", name),
            });
        }
    }

    let locations = collection
        .features
        .iter()
        .enumerate()
        .map(|(index, feature)| {
            let attributes = feature
                .properties
                .iter()
                .flatten()
                .map(|(key, value)| (key.clone(), json_to_attr(value)))
                .collect();
            LocationRecord::new(index, attributes)
        })
        .collect();

    Ok(locations)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
