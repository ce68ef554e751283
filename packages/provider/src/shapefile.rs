//! Zipped shapefile decoding.
//!
//! Reads the first `.shp` member of a zip bundle together with its
//! same-named `.dbf` attribute table. Supports null, point, multipoint,
//! polyline and polygon shapes; Z and M variants are read as 2D.
//! Coordinates are taken as-is, so bundles are expected in WGS84.

use std::io::{Cursor, Read as _};

use geo::Winding as _;
use impact_map_layer_models::{DataSource, Feature, FeatureCollection};

use crate::ProviderError;

const SHP_HEADER_LEN: usize = 100;
const SHP_FILE_CODE: i32 = 9994;
const SHP_VERSION: i32 = 1000;
const RECORD_HEADER_LEN: usize = 8;

/// Display name for an uploaded bundle: the file name without `.zip`.
#[must_use]
pub fn display_name(file_name: &str) -> String {
    file_name.replace(".zip", "")
}

/// Decodes a zipped shapefile bundle into a collection tagged `source`.
///
/// # Errors
///
/// Returns [`ProviderError`] if the archive is unreadable, contains no
/// `.shp`, or the shapefile/attribute table is malformed.
pub fn decode_zip(bytes: &[u8], source: DataSource) -> Result<FeatureCollection, ProviderError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;

    let names: Vec<String> = archive
        .file_names()
        .filter(|name| !name.starts_with("__MACOSX/"))
        .map(str::to_string)
        .collect();

    let shp_name = names
        .iter()
        .find(|name| name.to_ascii_lowercase().ends_with(".shp"))
        .ok_or_else(|| shapefile_error("no .shp file in archive"))?
        .clone();
    let expected_dbf = format!("{}.dbf", shp_name[..shp_name.len() - 4].to_ascii_lowercase());
    let dbf_name = names
        .iter()
        .find(|name| name.to_ascii_lowercase() == expected_dbf)
        .cloned();

    let shp = read_member(&mut archive, &shp_name)?;
    let shapes = parse_shp(&shp)?;

    let records = match dbf_name {
        Some(name) => parse_dbf(&read_member(&mut archive, &name)?)?,
        None => {
            log::warn!("{shp_name}: no attribute table, features will have no properties");
            Vec::new()
        }
    };

    let mut records = records.into_iter();
    let mut features = Vec::with_capacity(shapes.len());
    let mut null_shapes = 0_usize;

    for shape in shapes {
        let properties = records.next().unwrap_or_default();
        match shape {
            Some(geometry) => features.push(Feature {
                geometry,
                properties,
            }),
            None => null_shapes += 1,
        }
    }

    if null_shapes > 0 {
        log::warn!("{shp_name}: skipped {null_shapes} null shapes");
    }
    log::info!("{shp_name}: decoded {} features", features.len());

    Ok(FeatureCollection::new(source, features))
}

fn read_member(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<Vec<u8>, ProviderError> {
    let mut file = archive.by_name(name)?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(buf)
}

fn shapefile_error(message: impl Into<String>) -> ProviderError {
    ProviderError::Shapefile {
        message: message.into(),
    }
}

/// Bounds-checked little/big-endian reads over a byte slice.
struct Bytes<'a>(&'a [u8]);

impl Bytes<'_> {
    fn slice<const N: usize>(&self, offset: usize) -> Result<[u8; N], ProviderError> {
        self.0
            .get(offset..offset + N)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| shapefile_error(format!("unexpected end of data at byte {offset}")))
    }

    fn i32_be(&self, offset: usize) -> Result<i32, ProviderError> {
        Ok(i32::from_be_bytes(self.slice(offset)?))
    }

    fn i32_le(&self, offset: usize) -> Result<i32, ProviderError> {
        Ok(i32::from_le_bytes(self.slice(offset)?))
    }

    fn u32_le(&self, offset: usize) -> Result<u32, ProviderError> {
        Ok(u32::from_le_bytes(self.slice(offset)?))
    }

    fn u16_le(&self, offset: usize) -> Result<u16, ProviderError> {
        Ok(u16::from_le_bytes(self.slice(offset)?))
    }

    fn f64_le(&self, offset: usize) -> Result<f64, ProviderError> {
        Ok(f64::from_le_bytes(self.slice(offset)?))
    }

    fn count(&self, offset: usize, what: &str) -> Result<usize, ProviderError> {
        usize::try_from(self.i32_le(offset)?)
            .map_err(|_| shapefile_error(format!("negative {what} count at byte {offset}")))
    }

    fn coord(&self, offset: usize) -> Result<geo::Coord<f64>, ProviderError> {
        Ok(geo::coord! { x: self.f64_le(offset)?, y: self.f64_le(offset + 8)? })
    }
}

/// Parses the main `.shp` file into one optional geometry per record.
fn parse_shp(data: &[u8]) -> Result<Vec<Option<geo::Geometry<f64>>>, ProviderError> {
    if data.len() < SHP_HEADER_LEN {
        return Err(shapefile_error(format!(
            "buffer too small for header (got {}, need {SHP_HEADER_LEN})",
            data.len()
        )));
    }

    let bytes = Bytes(data);
    let file_code = bytes.i32_be(0)?;
    if file_code != SHP_FILE_CODE {
        return Err(shapefile_error(format!(
            "incorrect file code (got {file_code}, expected {SHP_FILE_CODE})"
        )));
    }
    let version = bytes.i32_le(28)?;
    if version != SHP_VERSION {
        return Err(shapefile_error(format!(
            "unsupported version (got {version}, expected {SHP_VERSION})"
        )));
    }

    // File length is in 16-bit words.
    let declared_len = usize::try_from(bytes.i32_be(24)?).unwrap_or(0) * 2;
    let end = declared_len.clamp(SHP_HEADER_LEN, data.len());

    let mut shapes = Vec::new();
    let mut offset = SHP_HEADER_LEN;

    while offset + RECORD_HEADER_LEN <= end {
        let content_len = usize::try_from(bytes.i32_be(offset + 4)?)
            .map_err(|_| shapefile_error(format!("negative record length at byte {offset}")))?
            * 2;
        let content_start = offset + RECORD_HEADER_LEN;
        let content_end = content_start + content_len;
        let content = data
            .get(content_start..content_end)
            .ok_or_else(|| shapefile_error(format!("record at byte {offset} overruns file")))?;

        shapes.push(parse_record(&Bytes(content))?);
        offset = content_end;
    }

    Ok(shapes)
}

fn parse_record(record: &Bytes<'_>) -> Result<Option<geo::Geometry<f64>>, ProviderError> {
    let shape_type = record.i32_le(0)?;

    let geometry = match shape_type {
        0 => return Ok(None),
        1 | 11 | 21 => geo::Geometry::Point(geo::Point(record.coord(4)?)),
        8 | 18 | 28 => {
            let num_points = record.count(36, "point")?;
            let points = (0..num_points)
                .map(|i| record.coord(40 + i * 16).map(geo::Point))
                .collect::<Result<Vec<_>, _>>()?;
            geo::Geometry::MultiPoint(geo::MultiPoint(points))
        }
        3 | 13 | 23 => {
            let mut lines: Vec<geo::LineString<f64>> = read_parts(record)?
                .into_iter()
                .map(geo::LineString::from)
                .collect();
            if lines.len() == 1 {
                geo::Geometry::LineString(lines.remove(0))
            } else {
                geo::Geometry::MultiLineString(geo::MultiLineString(lines))
            }
        }
        5 | 15 | 25 => {
            let rings = read_parts(record)?
                .into_iter()
                .map(geo::LineString::from)
                .collect();
            let mut polygons = assemble_polygons(rings);
            if polygons.len() == 1 {
                geo::Geometry::Polygon(polygons.remove(0))
            } else {
                geo::Geometry::MultiPolygon(geo::MultiPolygon(polygons))
            }
        }
        other => {
            return Err(shapefile_error(format!("unsupported shape type {other}")));
        }
    };

    Ok(Some(geometry))
}

/// Reads the parts/points arrays shared by polyline and polygon records.
fn read_parts(record: &Bytes<'_>) -> Result<Vec<Vec<geo::Coord<f64>>>, ProviderError> {
    let num_parts = record.count(36, "part")?;
    let num_points = record.count(40, "point")?;
    let parts_offset = 44;
    let points_offset = parts_offset + num_parts * 4;

    let mut starts = (0..num_parts)
        .map(|i| record.count(parts_offset + i * 4, "part index"))
        .collect::<Result<Vec<_>, _>>()?;
    starts.push(num_points);

    starts
        .windows(2)
        .map(|w| {
            let (start, end) = (w[0], w[1]);
            if start > end || end > num_points {
                return Err(shapefile_error(format!(
                    "invalid part range {start}..{end} for {num_points} points"
                )));
            }
            (start..end)
                .map(|i| record.coord(points_offset + i * 16))
                .collect()
        })
        .collect()
}

/// Groups rings into polygons: clockwise rings are exteriors, and each
/// counter-clockwise ring is a hole of the exterior that precedes it.
fn assemble_polygons(rings: Vec<geo::LineString<f64>>) -> Vec<geo::Polygon<f64>> {
    let mut polygons: Vec<(geo::LineString<f64>, Vec<geo::LineString<f64>>)> = Vec::new();

    for ring in rings {
        if ring.is_cw() || polygons.is_empty() {
            polygons.push((ring, Vec::new()));
        } else if let Some((_, holes)) = polygons.last_mut() {
            holes.push(ring);
        }
    }

    polygons
        .into_iter()
        .map(|(exterior, holes)| geo::Polygon::new(exterior, holes))
        .collect()
}

/// Parses a dBase III attribute table into one property map per record.
fn parse_dbf(
    data: &[u8],
) -> Result<Vec<serde_json::Map<String, serde_json::Value>>, ProviderError> {
    struct Field {
        name: String,
        kind: u8,
        len: usize,
        decimals: u8,
    }

    let bytes = Bytes(data);
    let record_count = bytes.u32_le(4)? as usize;
    let header_len = usize::from(bytes.u16_le(8)?);
    let record_len = usize::from(bytes.u16_le(10)?);

    if header_len > data.len() {
        return Err(shapefile_error(format!(
            "attribute table header claims {header_len} bytes but the file has {}",
            data.len()
        )));
    }
    if record_len == 0 && record_count > 0 {
        return Err(shapefile_error("attribute table has zero-length records"));
    }

    let mut fields = Vec::new();
    let mut offset = 32;
    while data.get(offset).is_some_and(|&b| b != 0x0D) && offset + 32 <= header_len {
        let descriptor = data
            .get(offset..offset + 32)
            .ok_or_else(|| shapefile_error("attribute table field descriptor truncated"))?;
        let name_end = descriptor[..11].iter().position(|&b| b == 0).unwrap_or(11);
        fields.push(Field {
            name: String::from_utf8_lossy(&descriptor[..name_end]).trim().to_string(),
            kind: descriptor[11],
            len: usize::from(descriptor[16]),
            decimals: descriptor[17],
        });
        offset += 32;
    }

    let mut records = Vec::with_capacity(record_count.min(data.len() / record_len.max(1)));
    for i in 0..record_count {
        let start = header_len + i * record_len;
        let Some(raw) = data.get(start..start + record_len) else {
            log::warn!("Attribute table truncated after {i} of {record_count} records");
            break;
        };

        // Skip the deletion flag byte.
        let mut cursor = 1;
        let mut properties = serde_json::Map::new();
        for field in &fields {
            let Some(cell) = raw.get(cursor..cursor + field.len) else {
                break;
            };
            cursor += field.len;
            let text = String::from_utf8_lossy(cell).trim().to_string();
            properties.insert(field.name.clone(), dbf_value(field.kind, field.decimals, text));
        }
        records.push(properties);
    }

    Ok(records)
}

fn dbf_value(kind: u8, decimals: u8, text: String) -> serde_json::Value {
    if text.is_empty() {
        return serde_json::Value::Null;
    }

    match kind {
        b'N' | b'F' => {
            if decimals == 0
                && let Ok(n) = text.parse::<i64>()
            {
                return serde_json::Value::from(n);
            }
            text.parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map_or(serde_json::Value::String(text), serde_json::Value::Number)
        }
        b'L' => match text.as_bytes()[0] {
            b'T' | b't' | b'Y' | b'y' => serde_json::Value::Bool(true),
            b'F' | b'f' | b'N' | b'n' => serde_json::Value::Bool(false),
            _ => serde_json::Value::Null,
        },
        _ => serde_json::Value::String(text),
    }
}
