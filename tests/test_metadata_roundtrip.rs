mod common;

use chrono::{TimeZone, Utc};
use common::two_tile_catalog;
use sar_ard::io::annotation::{CalibrationConstants, SourceAnnotation};
use sar_ard::types::{
    AcquisitionMode, ArdError, BoundingBox, OrbitDirection, Polarization,
};
use sar_ard::{
    AoiSpec, MetadataAssembler, PerformanceEstimator, ProcessingParameters, ProcessingTile,
    SelectorParams, StacWriter, TileSelector, XmlWriter,
};

fn processing_tile(id: &str) -> ProcessingTile {
    let catalog = two_tile_catalog();
    TileSelector::select(
        &AoiSpec::TileIds(vec![id.to_string()]),
        &catalog,
        &[],
        &SelectorParams::default(),
    )
    .unwrap()
    .remove(0)
}

fn annotation(id: &str, start_h: u32, stop_h: u32) -> SourceAnnotation {
    SourceAnnotation {
        scene_id: id.to_string(),
        acquisition_mode: Some(AcquisitionMode::IW),
        polarization: Some(Polarization::VV),
        orbit_direction: Some(OrbitDirection::Descending),
        start_time: Utc.with_ymd_and_hms(2021, 6, 1, start_h, 0, 0).unwrap(),
        stop_time: Utc.with_ymd_and_hms(2021, 6, 1, stop_h, 0, 25).unwrap(),
        footprint: Some(BoundingBox::new(0.1, 0.1, 0.9, 0.9).to_polygon()),
        incidence_near_deg: Some(30.0),
        incidence_far_deg: Some(46.0),
        orbit: None,
        calibration: Some(CalibrationConstants {
            absolute_constant: 1000.0,
            noise_power: 10.0,
            reference_incidence_deg: 38.0,
        }),
        point_targets: Vec::new(),
        reference_points: Vec::new(),
    }
}

#[test]
fn test_assemble_aggregates_time_and_provenance() {
    let tile = processing_tile("T1");
    let scenes = vec![annotation("S1B_IW_A", 12, 12), annotation("S1A_IW_B", 10, 11)];
    let proc_time = Utc.with_ymd_and_hms(2021, 6, 2, 8, 0, 0).unwrap();

    let record = MetadataAssembler::assemble(
        &tile,
        Default::default(),
        &scenes,
        ProcessingParameters::default(),
        proc_time,
    )
    .unwrap();

    assert_eq!(record.tile_id, "T1");
    assert_eq!(record.epsg, 32631);
    assert_eq!(record.created, proc_time);
    // Temporal coverage spans all sources
    assert_eq!(record.start_time, scenes[1].start_time);
    assert_eq!(record.stop_time, scenes[0].stop_time);
    assert_eq!(record.sources.len(), 2);
    assert_eq!(record.product_id.len(), 4);
    // Native extent comes from the tile, geographic envelope from its footprint
    assert_eq!(record.extent, tile.tile.extent);
    assert_eq!(record.footprint_wgs84, BoundingBox::new(0.0, 0.0, 1.0, 1.0));
}

#[test]
fn test_assemble_without_sources_uses_processing_time() {
    let tile = processing_tile("T1");
    let proc_time = Utc.with_ymd_and_hms(2021, 6, 2, 8, 0, 0).unwrap();
    let record = MetadataAssembler::assemble(
        &tile,
        Default::default(),
        &[],
        ProcessingParameters::default(),
        proc_time,
    )
    .unwrap();
    assert_eq!(record.start_time, proc_time);
    assert_eq!(record.stop_time, proc_time);
    assert!(record.sources.is_empty());
}

#[test]
fn test_assemble_is_reproducible() {
    let tile = processing_tile("T1");
    let scenes = vec![annotation("S1", 12, 12)];
    let proc_time = Utc.with_ymd_and_hms(2021, 6, 2, 8, 0, 0).unwrap();
    let params = ProcessingParameters::default();

    let a = MetadataAssembler::assemble(&tile, Default::default(), &scenes, params.clone(), proc_time)
        .unwrap();
    let b = MetadataAssembler::assemble(&tile, Default::default(), &scenes, params, proc_time)
        .unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_incomplete_provenance_is_fatal_for_the_product() {
    let tile = processing_tile("T1");
    let mut scene = annotation("S1", 12, 12);
    scene.polarization = None;

    let err = MetadataAssembler::assemble(
        &tile,
        Default::default(),
        &[scene],
        ProcessingParameters::default(),
        Utc::now(),
    )
    .unwrap_err();

    match err {
        ArdError::IncompleteMetadata {
            product,
            scene,
            field,
        } => {
            assert_eq!(product, "T1");
            assert_eq!(scene, "S1");
            assert_eq!(field, "polarization");
        }
        other => panic!("unexpected error: {}", other),
    }
}

/// Record with every optional branch populated that the writers must carry.
fn full_record() -> sar_ard::ProductMetadataRecord {
    let tile = processing_tile("T2");
    let scenes = vec![annotation("S1A_IW_A", 10, 11), annotation("S1B_IW_B", 12, 12)];
    let metrics =
        sar_ard::PerformanceMetrics::combined(&PerformanceEstimator::default().estimate_all(&scenes));
    assert!(metrics.noise_equivalent.is_some());

    MetadataAssembler::assemble(
        &tile,
        metrics,
        &scenes,
        ProcessingParameters::default(),
        Utc.with_ymd_and_hms(2021, 6, 2, 8, 0, 0).unwrap(),
    )
    .unwrap()
}

#[test]
fn test_stac_roundtrip_is_lossless() {
    let _ = env_logger::try_init();
    let record = full_record();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("product.json");

    StacWriter::write_stac(&record, &path).unwrap();
    let restored = StacWriter::read_stac(&path).unwrap();
    assert_eq!(restored, record);
}

#[test]
fn test_stac_item_shape() {
    let record = full_record();
    let item = StacWriter::to_item(&record);
    assert_eq!(item.item_type, "Feature");
    assert_eq!(item.id, record.product_id);
    assert_eq!(item.properties.grid_code, "MGRS-T2");
    assert_eq!(item.properties.epsg, 32632);
    assert!(item.properties.datetime >= item.properties.start_datetime);
    assert!(item.properties.datetime <= item.properties.end_datetime);
    assert_eq!(item.bbox[0], record.footprint_wgs84.xmin);
}

#[test]
fn test_xml_roundtrip_is_lossless() {
    let record = full_record();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("product.xml");

    XmlWriter::write_xml(&record, &path).unwrap();
    let restored = XmlWriter::read_xml(&path).unwrap();
    assert_eq!(restored, record);
}

#[test]
fn test_xml_roundtrip_without_sources() {
    // An empty scene list emits no <sources> elements at all; parsing
    // must still reproduce the record
    let tile = processing_tile("T1");
    let record = MetadataAssembler::assemble(
        &tile,
        Default::default(),
        &[],
        ProcessingParameters::default(),
        Utc.with_ymd_and_hms(2021, 6, 2, 8, 0, 0).unwrap(),
    )
    .unwrap();
    assert!(record.sources.is_empty());

    let xml = XmlWriter::to_xml_string(&record).unwrap();
    let restored = XmlWriter::from_xml_str(&xml).unwrap();
    assert_eq!(restored, record);
}

#[test]
fn test_xml_document_shape() {
    let record = full_record();
    let xml = XmlWriter::to_xml_string(&record).unwrap();
    assert!(xml.starts_with("<?xml version=\"1.0\""));
    assert!(xml.contains("<productMetadata>"));
    assert!(xml.contains(&format!("<product_id>{}</product_id>", record.product_id)));
    assert!(xml.contains("<tile_id>T2</tile_id>"));
}
