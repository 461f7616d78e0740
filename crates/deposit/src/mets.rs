//! METS packaging for SWORD deposits.
//!
//! A package is a zip holding exactly two entries, `mets.xml` and `document.pdf`. The METS
//! document is deliberately minimal: one `dmdSec` wrapping the descriptive metadata, one `fileSec`
//! referencing the PDF and one `structMap` tying them together. SWORD servers dispatch on the
//! entry names, so they are fixed.
//!
//! ```
//! use deposit::{metadata::xml::Element, mets::{self, MdType}};
//!
//! let mods = Element::new("mods").attr("xmlns", "http://www.loc.gov/mods/v3");
//! let document = mets::build_mets(mods, MdType::Mods);
//! assert_eq!(document.find("fileSec/fileGrp/file/FLocat").unwrap().attribute("xlink:href"), Some("document.pdf"));
//! ```

use std::io::{Cursor, Write};

use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

use super::*;

/// METS namespace
pub const METS_NAMESPACE: &str = "http://www.loc.gov/METS/";
/// XLink namespace, used for file locations
pub const XLINK_NAMESPACE: &str = "http://www.w3.org/1999/xlink";
/// Name of the METS entry in a package
pub const METS_ENTRY: &str = "mets.xml";
/// Name of the PDF entry in a package
pub const PDF_ENTRY: &str = "document.pdf";

/// `MDTYPE` of the wrapped metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MdType {
  /// MODS
  Mods,
  /// Dublin Core
  Dc,
  /// A TEI header
  TeiHdr,
  /// Anything else
  Other,
}

impl MdType {
  /// The value written in `MDTYPE`.
  pub fn as_str(&self) -> &'static str {
    match self {
      MdType::Mods => "MODS",
      MdType::Dc => "DC",
      MdType::TeiHdr => "TEIHDR",
      MdType::Other => "OTHER",
    }
  }
}

/// Wraps `metadata` in a METS document referencing [`PDF_ENTRY`].
pub fn build_mets(metadata: Element, md_type: MdType) -> Element {
  let dmd_sec = Element::new("mets:dmdSec").attr("ID", "d_dmd_1").child(
    Element::new("mets:mdWrap")
      .attr("MDTYPE", md_type.as_str())
      .child(Element::new("mets:xmlData").child(metadata)),
  );

  let file_sec = Element::new("mets:fileSec").child(
    Element::new("mets:fileGrp").attr("USE", "CONTENT").child(
      Element::new("mets:file").attr("ID", "d_file_1").attr("MIMETYPE", "application/pdf").child(
        Element::new("mets:FLocat").attr("LOCTYPE", "URL").attr("xlink:href", PDF_ENTRY),
      ),
    ),
  );

  let struct_map = Element::new("mets:structMap").child(
    Element::new("mets:div")
      .attr("DMDID", "d_dmd_1")
      .child(Element::new("mets:fptr").attr("FILEID", "d_file_1")),
  );

  Element::new("mets:mets")
    .attr("xmlns:mets", METS_NAMESPACE)
    .attr("xmlns:xlink", XLINK_NAMESPACE)
    .child(dmd_sec)
    .child(file_sec)
    .child(struct_map)
}

/// Zips `entries` in order, deflated, with fixed timestamps.
pub fn zip_entries(entries: &[(&str, &[u8])]) -> Result<Vec<u8>, DepositError> {
  let mut buffer = Cursor::new(Vec::new());
  {
    let mut zip = ZipWriter::new(&mut buffer);
    let options = SimpleFileOptions::default()
      .compression_method(CompressionMethod::Deflated)
      .last_modified_time(zip::DateTime::default());

    for (name, content) in entries {
      zip.start_file(*name, options)?;
      zip.write_all(content)?;
    }
    zip.finish()?;
  }
  Ok(buffer.into_inner())
}

/// Builds the `mets.xml` + `document.pdf` package.
pub fn build_package(mets: &Element, pdf: &[u8]) -> Result<Vec<u8>, DepositError> {
  let mets = mets.to_bytes()?;
  trace!("Packaging {} bytes of METS with a {} byte PDF", mets.len(), pdf.len());
  zip_entries(&[(METS_ENTRY, mets.as_slice()), (PDF_ENTRY, pdf)])
}
