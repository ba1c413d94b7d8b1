mod common;

use common::{kml, placemark, two_tile_catalog};
use geo::MultiPolygon;
use sar_ard::types::{ArdError, BoundingBox};
use sar_ard::GridCatalog;

#[test]
fn test_lookup_by_id() {
    let catalog = two_tile_catalog();
    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog.lookup_by_id("T1").unwrap().epsg, 32631);

    let err = catalog.lookup_by_id("T9").unwrap_err();
    assert!(matches!(err, ArdError::UnknownTile(ref id) if id == "T9"));
}

#[test]
fn test_intersecting_straddling_polygon() {
    let catalog = two_tile_catalog();

    // AOI straddling exactly the two adjacent tiles
    let aoi = MultiPolygon::new(vec![BoundingBox::new(0.5, 0.5, 1.5, 0.9).to_polygon()]);
    let hits: Vec<&str> = catalog
        .intersecting(&aoi)
        .iter()
        .map(|t| t.id.as_str())
        .collect();
    assert_eq!(hits, vec!["T1", "T2"]);

    // AOI entirely inside T1 must not pull in T2
    let aoi = MultiPolygon::new(vec![BoundingBox::new(0.2, 0.2, 0.8, 0.8).to_polygon()]);
    let hits: Vec<&str> = catalog
        .intersecting(&aoi)
        .iter()
        .map(|t| t.id.as_str())
        .collect();
    assert_eq!(hits, vec!["T1"]);

    // AOI far away from both tiles selects nothing
    let aoi = MultiPolygon::new(vec![BoundingBox::new(10.0, 10.0, 11.0, 11.0).to_polygon()]);
    assert!(catalog.intersecting(&aoi).is_empty());
}

#[test]
fn test_intersecting_epsg_filter() {
    let catalog = two_tile_catalog();
    let aoi = MultiPolygon::new(vec![BoundingBox::new(0.5, 0.5, 1.5, 0.9).to_polygon()]);

    let hits: Vec<&str> = catalog
        .intersecting_filtered(&aoi, Some(&[32632]))
        .iter()
        .map(|t| t.id.as_str())
        .collect();
    assert_eq!(hits, vec!["T2"]);
}

#[test]
fn test_malformed_description_is_fatal() {
    // Missing LL_WKT: the scheme cannot be trusted, loading must abort
    let bad = "<Placemark><name>T1</name><description><![CDATA[\
               <table><tr><td>TILE_ID</td><td>T1</td></tr>\
               <tr><td>EPSG</td><td>32631</td></tr>\
               <tr><td>UTM_WKT</td><td>POLYGON ((0 0,1 0,1 1,0 1,0 0))</td></tr></table>\
               ]]></description></Placemark>"
        .to_string();
    let err = GridCatalog::from_kml_str(&kml(&[bad])).unwrap_err();
    assert!(matches!(err, ArdError::SchemeParse { ref tile, .. } if tile == "T1"));
    assert!(err.to_string().contains("LL_WKT"));
}

#[test]
fn test_duplicate_tile_id_rejected() {
    let content = kml(&[
        placemark("T1", 32631, &BoundingBox::new(0.0, 0.0, 1.0, 1.0)),
        placemark("T1", 32631, &BoundingBox::new(1.0, 0.0, 2.0, 1.0)),
    ]);
    let err = GridCatalog::from_kml_str(&content).unwrap_err();
    assert!(err.to_string().contains("duplicate"));
}
