//! Map document: placemarks for geotagged photos, rendered as KML 2.2.
//!
//! Placemarks are numbered chronologically (`p1` is the oldest photo) but
//! emitted newest first, so the most recent photo sits at the top of the
//! viewer's place list. Both orders come from the same label-ordered list:
//! [`MapDocument::label_order`] and [`MapDocument::emission_order`]. Labels
//! are never renumbered for the reversal.
//!
//! ## Document shape
//!
//! ```text
//! kml
//! └── Document
//!     ├── name, open
//!     ├── Style#customIcon (IconStyle: scale, Icon/href)
//!     └── Placemark × N (newest first)
//!         ├── name          p{i}
//!         ├── styleUrl      #customIcon
//!         ├── description   CDATA <img src="files/…" width="…"/>
//!         ├── ExtendedData  DateTimeOriginal (when known)
//!         └── Point/coordinates  lon,lat[,alt]
//! ```

use crate::config::MapConfig;
use crate::sequence::OrderedBatch;
use crate::types::Position;
use chrono::NaiveDateTime;
use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use thiserror::Error;

const KML_NAMESPACE: &str = "http://www.opengis.net/kml/2.2";
const STYLE_ID: &str = "customIcon";
/// Directory inside the archive that holds the embedded photos.
pub const ASSET_DIR: &str = "files";

#[derive(Error, Debug)]
pub enum KmlError {
    #[error("XML write failed: {0}")]
    Xml(String),
    #[error("KML output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Vertical placement of a placemark.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Altitude {
    Meters(f64),
    /// No recorded altitude: the viewer clamps the point to the ground.
    Ground,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Placemark {
    pub label: String,
    pub position: Position,
    pub altitude: Altitude,
    /// Path of the photo inside the archive, e.g. `files/IMG_0001.jpg`.
    pub asset: String,
    pub captured_at: Option<NaiveDateTime>,
}

impl Placemark {
    /// `lon,lat[,alt]` as KML expects.
    pub fn coordinates(&self) -> String {
        let Position {
            latitude,
            longitude,
        } = self.position;
        match self.altitude {
            Altitude::Meters(alt) => format!("{longitude},{latitude},{alt}"),
            Altitude::Ground => format!("{longitude},{latitude}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapDocument {
    pub name: String,
    /// Chronological: index 0 is `p1`.
    placemarks: Vec<Placemark>,
}

impl MapDocument {
    /// One placemark per geotagged entry of the batch.
    pub fn from_batch(batch: &OrderedBatch, name: &str) -> Self {
        // Numbering happens after the position lookup, so labels stay
        // contiguous even if an entry had no position.
        let placemarks = batch
            .geotagged()
            .iter()
            .filter_map(|entry| entry.record.position.map(|p| (&entry.record, p)))
            .enumerate()
            .map(|(i, (record, position))| Placemark {
                label: format!("p{}", i + 1),
                position,
                altitude: record.altitude.map_or(Altitude::Ground, Altitude::Meters),
                asset: asset_path(&record.display_name),
                captured_at: record.captured_at,
            })
            .collect();

        Self {
            name: name.to_string(),
            placemarks,
        }
    }

    /// `p1`, `p2`, … `pN`.
    pub fn label_order(&self) -> impl DoubleEndedIterator<Item = &Placemark> {
        self.placemarks.iter()
    }

    /// `pN` … `p1`: the order placemarks appear in the document.
    pub fn emission_order(&self) -> impl Iterator<Item = &Placemark> {
        self.label_order().rev()
    }

    pub fn len(&self) -> usize {
        self.placemarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placemarks.is_empty()
    }
}

/// Archive path for a photo with the given display name.
pub fn asset_path(display_name: &str) -> String {
    format!("{ASSET_DIR}/{display_name}")
}

/// Render the document as a KML string.
pub fn render_kml(document: &MapDocument, map: &MapConfig) -> Result<String, KmlError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    let w = &mut writer;

    emit(w, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    emit(
        w,
        Event::Start(BytesStart::new("kml").with_attributes([("xmlns", KML_NAMESPACE)])),
    )?;
    open(w, "Document")?;
    text_element(w, "name", &document.name)?;
    text_element(w, "open", "1")?;

    emit(
        w,
        Event::Start(BytesStart::new("Style").with_attributes([("id", STYLE_ID)])),
    )?;
    open(w, "IconStyle")?;
    text_element(w, "scale", &map.icon_scale.to_string())?;
    open(w, "Icon")?;
    text_element(w, "href", &map.icon_href)?;
    close(w, "Icon")?;
    close(w, "IconStyle")?;
    close(w, "Style")?;

    let style_url = format!("#{STYLE_ID}");
    for placemark in document.emission_order() {
        open(w, "Placemark")?;
        text_element(w, "name", &placemark.label)?;
        text_element(w, "styleUrl", &style_url)?;

        open(w, "description")?;
        let balloon = balloon_html(&placemark.asset, map.image_width);
        emit(w, Event::CData(BytesCData::new(balloon.as_str())))?;
        close(w, "description")?;

        if let Some(captured_at) = placemark.captured_at {
            open(w, "ExtendedData")?;
            emit(
                w,
                Event::Start(
                    BytesStart::new("Data").with_attributes([("name", "DateTimeOriginal")]),
                ),
            )?;
            text_element(
                w,
                "value",
                &captured_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
            )?;
            close(w, "Data")?;
            close(w, "ExtendedData")?;
        }

        open(w, "Point")?;
        text_element(w, "coordinates", &placemark.coordinates())?;
        close(w, "Point")?;
        close(w, "Placemark")?;
    }

    close(w, "Document")?;
    close(w, "kml")?;

    let mut xml = String::from_utf8(writer.into_inner())?;
    xml.push('\n');
    Ok(xml)
}

/// Balloon HTML for one placemark. Goes inside CDATA, so only the attribute
/// value needs escaping, plus any `]]>` that would end the section early.
fn balloon_html(asset: &str, width: u32) -> String {
    let src = asset
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    format!(r#"<img src="{src}" width="{width}"/>"#)
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), KmlError> {
    writer
        .write_event(event)
        .map_err(|e| KmlError::Xml(e.to_string()))
}

fn open(writer: &mut Writer<Vec<u8>>, tag: &str) -> Result<(), KmlError> {
    emit(writer, Event::Start(BytesStart::new(tag)))
}

fn close(writer: &mut Writer<Vec<u8>>, tag: &str) -> Result<(), KmlError> {
    emit(writer, Event::End(BytesEnd::new(tag)))
}

fn text_element(writer: &mut Writer<Vec<u8>>, tag: &str, text: &str) -> Result<(), KmlError> {
    open(writer, tag)?;
    emit(writer, Event::Text(BytesText::new(text)))?;
    close(writer, tag)
}
