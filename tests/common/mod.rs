#![allow(dead_code)]

use sar_ard::types::BoundingBox;
use sar_ard::GridCatalog;

/// KML description block for a synthetic tile with a lon/lat footprint.
pub fn description(id: &str, epsg: u32, ll: &BoundingBox) -> String {
    let ll_wkt = format!(
        "POLYGON (({x0} {y0},{x1} {y0},{x1} {y1},{x0} {y1},{x0} {y0}))",
        x0 = ll.xmin,
        y0 = ll.ymin,
        x1 = ll.xmax,
        y1 = ll.ymax
    );
    format!(
        "<table><tr><td>TILE_ID</td><td>{id}</td></tr>\
         <tr><td>EPSG</td><td>{epsg}</td></tr>\
         <tr><td>UTM_WKT</td><td>POLYGON ((0 0,109800 0,109800 109800,0 109800,0 0))</td></tr>\
         <tr><td>LL_WKT</td><td>{ll_wkt}</td></tr></table>"
    )
}

pub fn placemark(id: &str, epsg: u32, ll: &BoundingBox) -> String {
    format!(
        "<Placemark><name>{}</name><description><![CDATA[{}]]></description></Placemark>",
        id,
        description(id, epsg, ll)
    )
}

pub fn kml(placemarks: &[String]) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2"><Document><Folder>{}</Folder></Document></kml>"#,
        placemarks.join("")
    )
}

/// Two adjacent unit-square tiles sharing the x = 1 edge.
pub fn two_tile_catalog() -> GridCatalog {
    let content = kml(&[
        placemark("T1", 32631, &BoundingBox::new(0.0, 0.0, 1.0, 1.0)),
        placemark("T2", 32632, &BoundingBox::new(1.0, 0.0, 2.0, 1.0)),
    ]);
    GridCatalog::from_kml_str(&content).unwrap()
}
