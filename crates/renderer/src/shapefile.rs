//! ESRI Shapefile export (polygon shapes, dBASE III attributes).

use cdi_common::archive::zip_files;
use cdi_common::{BoundingBox, CdiResult, MultiPolygon, Ring};
use chrono::{Datelike, Utc};

use crate::document::{MapDocument, MapFeature};

const FILE_CODE: i32 = 9994;
const VERSION: i32 = 1000;
const SHAPE_NULL: i32 = 0;
const SHAPE_POLYGON: i32 = 5;
const HEADER_LEN: usize = 100;

pub const WGS84_PRJ: &str = concat!(
    "GEOGCS[\"GCS_WGS_1984\",DATUM[\"D_WGS_1984\",",
    "SPHEROID[\"WGS_1984\",6378137.0,298.257223563]],",
    "PRIMEM[\"Greenwich\",0.0],UNIT[\"Degree\",0.0174532925199433]]"
);

/// `(name, type, length)` of each attribute column.
const FIELDS: [(&str, u8, u8); 5] = [
    ("ADM_ID", b'N', 10),
    ("NAME", b'C', 80),
    ("REGION", b'C', 80),
    ("CATEGORY", b'N', 5),
    ("CAT_NAME", b'C', 40),
];

#[derive(Debug, Clone)]
pub struct ShapefileParts {
    pub shp: Vec<u8>,
    pub shx: Vec<u8>,
    pub dbf: Vec<u8>,
    pub prj: String,
}

pub fn write_shapefile(doc: &MapDocument) -> CdiResult<ShapefileParts> {
    let bbox = doc.bbox().unwrap_or(BoundingBox::new(0.0, 0.0, 0.0, 0.0));

    let records: Vec<Vec<u8>> = doc.features.iter().map(|f| shape_record(&f.geometry)).collect();

    let shp_len = HEADER_LEN + records.iter().map(|r| 8 + r.len()).sum::<usize>();
    let shx_len = HEADER_LEN + 8 * records.len();

    let mut shp = file_header(shp_len, &bbox);
    let mut shx = file_header(shx_len, &bbox);

    for (i, content) in records.iter().enumerate() {
        let offset_words = (shp.len() / 2) as i32;
        let content_words = (content.len() / 2) as i32;

        shp.extend_from_slice(&(i as i32 + 1).to_be_bytes());
        shp.extend_from_slice(&content_words.to_be_bytes());
        shp.extend_from_slice(content);

        shx.extend_from_slice(&offset_words.to_be_bytes());
        shx.extend_from_slice(&content_words.to_be_bytes());
    }

    Ok(ShapefileParts {
        shp,
        shx,
        dbf: write_dbf(&doc.features),
        prj: WGS84_PRJ.to_string(),
    })
}

/// Zip the shapefile parts under the document's file stem.
pub fn to_shapefile_zip(doc: &MapDocument) -> CdiResult<Vec<u8>> {
    let parts = write_shapefile(doc)?;
    let stem = doc.file_stem();

    zip_files([
        (format!("{}.shp", stem), parts.shp.as_slice()),
        (format!("{}.shx", stem), parts.shx.as_slice()),
        (format!("{}.dbf", stem), parts.dbf.as_slice()),
        (format!("{}.prj", stem), parts.prj.as_bytes()),
        (format!("{}.cpg", stem), b"UTF-8".as_slice()),
    ])
}

fn file_header(total_len: usize, bbox: &BoundingBox) -> Vec<u8> {
    let mut h = Vec::with_capacity(total_len);
    h.extend_from_slice(&FILE_CODE.to_be_bytes());
    h.extend_from_slice(&[0u8; 20]);
    h.extend_from_slice(&((total_len / 2) as i32).to_be_bytes());
    h.extend_from_slice(&VERSION.to_le_bytes());
    h.extend_from_slice(&SHAPE_POLYGON.to_le_bytes());
    for v in [bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y] {
        h.extend_from_slice(&v.to_le_bytes());
    }
    // Z and M ranges
    h.extend_from_slice(&[0u8; 32]);
    h
}

/// Record content for one feature. Outer rings are written clockwise and
/// holes counter-clockwise.
fn shape_record(geometry: &MultiPolygon) -> Vec<u8> {
    let bbox = match geometry.bbox() {
        Some(b) => b,
        None => return SHAPE_NULL.to_le_bytes().to_vec(),
    };

    let rings: Vec<Ring> = geometry
        .polygons()
        .iter()
        .flat_map(|polygon| {
            std::iter::once(polygon.exterior.with_winding(true))
                .chain(polygon.holes.iter().map(|h| h.with_winding(false)))
        })
        .collect();

    let num_points: usize = rings.iter().map(|r| r.points().len()).sum();
    let mut out = Vec::with_capacity(44 + 4 * rings.len() + 16 * num_points);
    out.extend_from_slice(&SHAPE_POLYGON.to_le_bytes());
    for v in [bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y] {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out.extend_from_slice(&(rings.len() as i32).to_le_bytes());
    out.extend_from_slice(&(num_points as i32).to_le_bytes());

    let mut start = 0i32;
    for ring in &rings {
        out.extend_from_slice(&start.to_le_bytes());
        start += ring.points().len() as i32;
    }
    for ring in &rings {
        for p in ring.points() {
            out.extend_from_slice(&p[0].to_le_bytes());
            out.extend_from_slice(&p[1].to_le_bytes());
        }
    }
    out
}

fn write_dbf(features: &[MapFeature]) -> Vec<u8> {
    let header_len = 32 + 32 * FIELDS.len() + 1;
    let record_len = 1 + FIELDS.iter().map(|f| f.2 as usize).sum::<usize>();
    let today = Utc::now().date_naive();

    let mut dbf = Vec::with_capacity(header_len + record_len * features.len() + 1);
    dbf.push(0x03);
    dbf.push((today.year() - 1900).clamp(0, 255) as u8);
    dbf.push(today.month() as u8);
    dbf.push(today.day() as u8);
    dbf.extend_from_slice(&(features.len() as u32).to_le_bytes());
    dbf.extend_from_slice(&(header_len as u16).to_le_bytes());
    dbf.extend_from_slice(&(record_len as u16).to_le_bytes());
    dbf.extend_from_slice(&[0u8; 20]);

    for (name, kind, len) in FIELDS {
        let mut descriptor = [0u8; 32];
        descriptor[..name.len()].copy_from_slice(name.as_bytes());
        descriptor[11] = kind;
        descriptor[16] = len;
        dbf.extend_from_slice(&descriptor);
    }
    dbf.push(0x0D);

    for f in features {
        dbf.push(b' ');
        push_numeric(&mut dbf, f.administration_id, FIELDS[0].2);
        push_text(&mut dbf, &f.name, FIELDS[1].2);
        push_text(&mut dbf, f.region.as_deref().unwrap_or(""), FIELDS[2].2);
        push_numeric(&mut dbf, f.category.code() as i64, FIELDS[3].2);
        push_text(&mut dbf, f.cat_name(), FIELDS[4].2);
    }
    dbf.push(0x1A);
    dbf
}

fn push_numeric(buf: &mut Vec<u8>, value: i64, len: u8) {
    let len = len as usize;
    let text = value.to_string();
    let text = if text.len() > len { "*".repeat(len) } else { text };
    buf.extend_from_slice(format!("{:>width$}", text, width = len).as_bytes());
}

/// Left-aligned, space padded, cut on a character boundary.
fn push_text(buf: &mut Vec<u8>, value: &str, len: u8) {
    let len = len as usize;
    let mut end = value.len().min(len);
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    buf.extend_from_slice(&value.as_bytes()[..end]);
    buf.extend(std::iter::repeat(b' ').take(len - end));
}
