//! Zipped ESRI shapefile → [`County`] list.
//!
//! Census county boundary files ship as a ZIP holding `.shp` (geometry),
//! `.dbf` (attributes) and a few sidecars. Only the first two are needed;
//! both are read from memory, so no temporary directory is involved.

use super::County;
use crate::config::CountyFields;
use crate::error::ImprintError;
use shapefile::dbase::{self, FieldValue};
use shapefile::Shape;
use std::io::{Cursor, Read};
use tracing::{debug, info, warn};
use zip::ZipArchive;

/// Read every polygon county from a zipped shapefile.
///
/// Shapes that are null or not polygons are skipped. Records whose id or
/// name attribute is missing are skipped with a warning.
pub fn load_counties(zip_bytes: &[u8], fields: &CountyFields) -> Result<Vec<County>, ImprintError> {
    let mut archive = ZipArchive::new(Cursor::new(zip_bytes))
        .map_err(|e| read_err(format!("not a ZIP archive: {e}")))?;

    let shp = read_member(&mut archive, "shp")?;
    let dbf = read_member(&mut archive, "dbf")?;

    let shape_reader =
        shapefile::ShapeReader::new(Cursor::new(shp)).map_err(|e| read_err(format!(".shp: {e}")))?;
    let shapes = shape_reader
        .read()
        .map_err(|e| read_err(format!(".shp: {e}")))?;

    let mut dbf_reader =
        dbase::Reader::new(Cursor::new(dbf)).map_err(|e| read_err(format!(".dbf: {e}")))?;
    let records = dbf_reader
        .read()
        .map_err(|e| read_err(format!(".dbf: {e}")))?;

    if shapes.len() != records.len() {
        return Err(read_err(format!(
            ".shp has {} shapes but .dbf has {} records",
            shapes.len(),
            records.len()
        )));
    }

    let mut counties = Vec::with_capacity(shapes.len());
    for (idx, (shape, record)) in shapes.into_iter().zip(records).enumerate() {
        let rings = match polygon_rings(shape) {
            Some(rings) if !rings.is_empty() => rings,
            _ => {
                debug!("Record {}: not a polygon, skipped", idx + 1);
                continue;
            }
        };

        let (Some(id), Some(name)) = (
            field_string(&record, &fields.id),
            field_string(&record, &fields.name),
        ) else {
            warn!(
                "Record {}: missing '{}' or '{}' attribute, skipped",
                idx + 1,
                fields.id,
                fields.name
            );
            continue;
        };

        counties.push(County {
            id,
            name,
            state: field_string(&record, &fields.state).unwrap_or_default(),
            rings,
        });
    }

    info!("Loaded {} counties from shapefile", counties.len());
    Ok(counties)
}

fn read_err(detail: String) -> ImprintError {
    ImprintError::ShapefileRead { detail }
}

/// Bytes of the first archive member with the given extension.
fn read_member(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    ext: &str,
) -> Result<Vec<u8>, ImprintError> {
    let suffix = format!(".{ext}");
    let candidates: Vec<String> = archive
        .file_names()
        .filter(|n| !n.starts_with("__MACOSX/") && n.to_ascii_lowercase().ends_with(&suffix))
        .map(str::to_string)
        .collect();

    let Some(name) = candidates.first() else {
        return Err(read_err(format!("archive has no {suffix} file")));
    };
    if candidates.len() > 1 {
        warn!("Archive has {} {} files, using '{}'", candidates.len(), suffix, name);
    }

    let mut file = archive
        .by_name(name)
        .map_err(|e| read_err(format!("{name}: {e}")))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| read_err(format!("{name}: {e}")))?;
    Ok(bytes)
}

fn polygon_rings(shape: Shape) -> Option<Vec<Vec<(f64, f64)>>> {
    let rings = match shape {
        Shape::Polygon(p) => p
            .rings()
            .iter()
            .map(|r| r.points().iter().map(|pt| (pt.x, pt.y)).collect())
            .collect(),
        Shape::PolygonM(p) => p
            .rings()
            .iter()
            .map(|r| r.points().iter().map(|pt| (pt.x, pt.y)).collect())
            .collect(),
        Shape::PolygonZ(p) => p
            .rings()
            .iter()
            .map(|r| r.points().iter().map(|pt| (pt.x, pt.y)).collect())
            .collect(),
        _ => return None,
    };
    Some(rings)
}

/// A `.dbf` attribute as trimmed text; numbers are formatted without a
/// trailing `.0`.
fn field_string(record: &dbase::Record, field: &str) -> Option<String> {
    let value = match record.get(field)? {
        FieldValue::Character(Some(s)) => s.trim().to_string(),
        FieldValue::Numeric(Some(n)) if n.fract() == 0.0 => format!("{}", *n as i64),
        FieldValue::Numeric(Some(n)) => n.to_string(),
        FieldValue::Integer(i) => i.to_string(),
        _ => return None,
    };
    (!value.is_empty()).then_some(value)
}


#[cfg(test)]
mod tests {
    use super::fixture::{square, zip_archive, Feature};
    use super::*;

    fn two_counties() -> Vec<u8> {
        zip_archive(&[
            Feature {
                id: "06001",
                name: "Alameda",
                state: "06",
                rings: vec![square(-122.0, 37.0, 1.0)],
            },
            Feature {
                id: "32003",
                name: "Clark",
                state: "32",
                rings: vec![square(-115.0, 36.0, 1.0)],
            },
        ])
    }

    #[test]
    fn loads_counties_with_attributes() {
        let counties = load_counties(&two_counties(), &CountyFields::default()).unwrap();
        assert_eq!(counties.len(), 2);
        assert_eq!(counties[0].id, "06001");
        assert_eq!(counties[0].name, "Alameda");
        assert_eq!(counties[0].state, "06");
        assert_eq!(counties[1].name, "Clark");
        assert_eq!(counties[0].rings.len(), 1);
        assert_eq!(counties[0].rings[0].len(), 5);
    }

    #[test]
    fn custom_field_names_are_honoured() {
        let fields = CountyFields {
            id: "GEOID".into(),
            name: "STATEFP".into(),
            state: "NAME".into(),
        };
        let counties = load_counties(&two_counties(), &fields).unwrap();
        assert_eq!(counties[0].name, "06");
        assert_eq!(counties[0].state, "Alameda");
    }

    #[test]
    fn missing_name_field_skips_records() {
        let fields = CountyFields {
            name: "COUNTY_NM".into(),
            ..CountyFields::default()
        };
        assert!(load_counties(&two_counties(), &fields).unwrap().is_empty());
    }

    #[test]
    fn non_zip_input_is_reported() {
        let err = load_counties(b"not a zip", &CountyFields::default()).unwrap_err();
        assert!(matches!(err, ImprintError::ShapefileRead { .. }));
        assert!(err.to_string().contains("ZIP"));
    }

    #[test]
    fn archive_without_dbf_is_reported() {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("only.shp", zip::write::SimpleFileOptions::default())
            .unwrap();
        std::io::Write::write_all(&mut zip, b"x").unwrap();
        let bytes = zip.finish().unwrap().into_inner();

        let err = load_counties(&bytes, &CountyFields::default()).unwrap_err();
        assert!(err.to_string().contains(".dbf"), "got: {err}");
    }
}
