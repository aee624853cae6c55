//! End-to-end zonal statistics over the strip fixtures.

use cdi_common::archive::zip_files;
use cdi_common::{BoundarySet, DroughtCategory, NODATA_VALUE};
use test_utils::{
    assert_approx_eq, create_grid, geotiff_bytes, strip_boundaries, strip_initial_values,
    strip_raster_data, strips_geojson, write_strip_geotiff, GeoSpec, NODATA, STRIP_RASTER_HEIGHT,
    STRIP_RASTER_WIDTH,
};
use zonal_stats::{
    read_geotiff, read_geotiff_file, read_raster_bytes, zonal_categories, zonal_statistics,
    GeoTransform, Raster, Statistic, ZonalOptions,
};

fn strip_geotiff() -> Vec<u8> {
    geotiff_bytes(
        STRIP_RASTER_WIDTH,
        STRIP_RASTER_HEIGHT,
        &strip_raster_data(),
        GeoSpec::strips(),
    )
}

// ============================================================================
// GeoTIFF reading
// ============================================================================

#[test]
fn test_read_geotiff_georeference() {
    let raster = read_geotiff(strip_geotiff()).unwrap();
    assert_eq!(raster.width, 30);
    assert_eq!(raster.height, 20);
    assert_eq!(raster.nodata, Some(-9999.0));
    assert_approx_eq!(raster.transform.origin_x, 0.0, 1e-9);
    assert_approx_eq!(raster.transform.origin_y, 2.0, 1e-9);
    assert_approx_eq!(raster.transform.pixel_width, 0.1, 1e-9);
    assert_approx_eq!(raster.transform.pixel_height, -0.1, 1e-9);
    assert_approx_eq!(raster.value(15, 3), 0.15, 1e-6);
}

#[test]
fn test_read_geotiff_without_georeference_fails() {
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut encoder = tiff::encoder::TiffEncoder::new(&mut cursor).unwrap();
        encoder
            .write_image::<tiff::encoder::colortype::Gray32Float>(2, 2, &[0.0; 4])
            .unwrap();
    }
    assert!(read_geotiff(cursor.into_inner()).is_err());
}

#[test]
fn test_read_zipped_geotiff() {
    let tiff = strip_geotiff();
    let bundle = zip_files([
        ("metadata.xml".to_string(), b"<xml/>".as_slice()),
        ("cdi_2025_01.tif".to_string(), tiff.as_slice()),
    ])
    .unwrap();
    let raster = read_raster_bytes(bundle).unwrap();
    assert_eq!(raster.width, 30);
}

#[test]
fn test_read_geotiff_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cdi.tif");
    write_strip_geotiff(&path).unwrap();
    assert_eq!(read_geotiff_file(&path).unwrap().height, 20);
    assert!(read_geotiff_file(dir.path().join("missing.tif")).is_err());
}

// ============================================================================
// Zonal statistics
// ============================================================================

#[test]
fn test_strip_categories() {
    let raster = read_geotiff(strip_geotiff()).unwrap();
    let values = zonal_categories(&raster, &strip_boundaries(), &ZonalOptions::default());
    assert_eq!(values, strip_initial_values());
}

#[test]
fn test_geojson_and_topojson_agree() {
    let raster = read_geotiff(strip_geotiff()).unwrap();
    let geo = BoundarySet::from_json_str(&strips_geojson().to_string()).unwrap();
    let a = zonal_categories(&raster, &geo, &ZonalOptions::default());
    let b = zonal_categories(&raster, &strip_boundaries(), &ZonalOptions::default());
    assert_eq!(a, b);
}

#[test]
fn test_pixel_counts() {
    let raster = read_geotiff(strip_geotiff()).unwrap();
    let results = zonal_statistics(&raster, &strip_boundaries(), &ZonalOptions::default());
    for zone in &results {
        assert_eq!(zone.stats.unwrap().count, 200);
    }
}

#[test]
fn test_nodata_pixels_are_excluded() {
    // Left strip: top half nodata, bottom half 0.04
    let data = create_grid(30, 20, |col, row| match (col / 10, row < 10) {
        (0, true) => NODATA,
        (0, false) => 0.04,
        (1, _) => 0.15,
        _ => 0.5,
    });
    let raster = read_geotiff(geotiff_bytes(30, 20, &data, GeoSpec::strips())).unwrap();
    let results = zonal_statistics(&raster, &strip_boundaries(), &ZonalOptions::default());
    assert_eq!(results[0].stats.unwrap().count, 100);
    assert_eq!(results[0].value, 0.04);
    assert_eq!(results[0].category, DroughtCategory::D3);
}

#[test]
fn test_zone_without_data() {
    let data = create_grid(30, 20, |col, _| if col >= 20 { f32::NAN } else { 0.25 });
    let raster = read_geotiff(geotiff_bytes(30, 20, &data, GeoSpec::strips())).unwrap();
    let results = zonal_statistics(&raster, &strip_boundaries(), &ZonalOptions::default());
    assert_eq!(results[2].value, NODATA_VALUE);
    assert_eq!(results[2].category, DroughtCategory::NoData);
    assert_eq!(results[1].category, DroughtCategory::D0);
}

#[test]
fn test_boundary_outside_raster() {
    // Raster only covers the western strip
    let raster = Raster::new(
        10,
        20,
        GeoTransform::new(0.0, 2.0, 0.1, -0.1),
        None,
        vec![0.07; 200],
    )
    .unwrap();
    let values = zonal_categories(&raster, &strip_boundaries(), &ZonalOptions::default());
    assert_eq!(values[0].category, Some(DroughtCategory::D2));
    assert_eq!(values[1].category, Some(DroughtCategory::NoData));
    assert_eq!(values[2].value, Some(NODATA_VALUE));
}

#[test]
fn test_statistic_choice() {
    // Middle strip has a gradient 0.1 .. 0.29 across rows
    let data = create_grid(30, 20, |col, row| {
        if col / 10 == 1 {
            0.1 + row as f32 * 0.01
        } else {
            0.5
        }
    });
    let raster = read_geotiff(geotiff_bytes(30, 20, &data, GeoSpec::strips())).unwrap();
    let boundaries = strip_boundaries();

    let opts = |statistic| ZonalOptions {
        statistic,
        all_touched: false,
    };
    let min = zonal_statistics(&raster, &boundaries, &opts(Statistic::Min));
    let max = zonal_statistics(&raster, &boundaries, &opts(Statistic::Max));
    assert_eq!(min[1].value, 0.1);
    assert_eq!(min[1].category, DroughtCategory::D2);
    assert_eq!(max[1].value, 0.29);
    assert_eq!(max[1].category, DroughtCategory::D0);
}
