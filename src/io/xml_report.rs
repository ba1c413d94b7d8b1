use crate::core::metadata::ProductMetadataRecord;
use crate::types::{ArdError, ArdResult};
use quick_xml::de::from_str;
use quick_xml::se::Serializer;
use serde::Serialize;
use std::path::Path;

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";
const ROOT_TAG: &str = "productMetadata";

/// XML serializer for product metadata records.
///
/// Pure serialization: the record's own serde model is written element for
/// element under a `<productMetadata>` root, so a written document parses
/// back into a field-for-field equal record.
pub struct XmlWriter;

impl XmlWriter {
    /// Render the record as an XML document string.
    pub fn to_xml_string(record: &ProductMetadataRecord) -> ArdResult<String> {
        let mut body = String::new();
        let mut serializer = Serializer::with_root(&mut body, Some(ROOT_TAG))
            .map_err(|e| ArdError::XmlParsing(e.to_string()))?;
        serializer.indent(' ', 2);
        record
            .serialize(serializer)
            .map_err(|e| ArdError::XmlParsing(format!("Failed to serialize record: {}", e)))?;

        let mut document = String::with_capacity(XML_DECLARATION.len() + body.len() + 1);
        document.push_str(XML_DECLARATION);
        document.push_str(&body);
        document.push('\n');
        Ok(document)
    }

    /// Parse an XML document back into a record.
    pub fn from_xml_str(xml: &str) -> ArdResult<ProductMetadataRecord> {
        from_str::<ProductMetadataRecord>(xml)
            .map_err(|e| ArdError::XmlParsing(format!("Failed to parse product XML: {}", e)))
    }

    /// Write the record as an XML document.
    pub fn write_xml<P: AsRef<Path>>(record: &ProductMetadataRecord, path: P) -> ArdResult<()> {
        log::info!(
            "Writing XML metadata for product {}: {}",
            record.product_id,
            path.as_ref().display()
        );
        std::fs::write(path, Self::to_xml_string(record)?)?;
        Ok(())
    }

    /// Read and parse a written XML document.
    pub fn read_xml<P: AsRef<Path>>(path: P) -> ArdResult<ProductMetadataRecord> {
        let content = std::fs::read_to_string(path)?;
        Self::from_xml_str(&content)
    }
}
