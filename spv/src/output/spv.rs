// PSPP - a program for statistical analysis.
// Copyright (C) 2025 Free Software Foundation, Inc.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <http://www.gnu.org/licenses/>.


//! Reading SPSS Viewer (SPV) files.
//!
//! An SPV file is a ZIP archive.  Its `outputViewer*.xml` members describe
//! the tree of output items, and other members hold the tables, images, and
//! other content that the tree refers to.  [SpvFile] reads the tree eagerly
//! and decodes tables the first time they are needed.

use std::{
    collections::HashMap,
    fs::File,
    io::{BufReader, Error as IoError, Read, Seek},
    path::Path,
    rc::Rc,
    string::FromUtf8Error,
    sync::Arc,
};

use displaydoc::Display;
use log::debug;
use quick_xml::de::DeError;
use thiserror::Error as ThisError;

use crate::{
    message::{emit, Diagnostic, Location},
    output::{
        page::Setup,
        pivot::{Look, PivotTable, Value},
        Details, Item, SpvInfo, TableItem, Text,
    },
    settings::Settings,
};

use self::{
    html::decode_html,
    legacy_bin::LegacyData,
    legacy_xml::Visualization,
    structure::{Container, Content, Heading, Node, Visibility},
    xml::Element,
    zip::ZipArchive,
};

pub mod binary;
pub mod html;
pub mod legacy;
pub mod legacy_bin;
pub mod legacy_xml;
pub mod light;
pub mod select;
pub mod structure;
pub mod xml;
pub mod zip;

/// The member that identifies a ZIP archive as an SPV file.
pub const MANIFEST: &str = "META-INF/MANIFEST.MF";

const MANIFEST_CONTENTS: &[u8] = b"allowPivoting=true";

/// An error opening an SPV file.
#[derive(Display, ThisError, Debug)]
pub enum Error {
    /// {0}
    Io(#[from] IoError),

    /// {0}
    Zip(#[from] zip::Error),

    /// not an SPV file
    NotSpv,
}

/// A problem with one member of an SPV file.  These do not prevent reading
/// the rest of the file.
#[derive(Display, ThisError, Debug)]
enum MemberError {
    /// {0}
    Zip(#[from] zip::Error),

    /// member is not valid UTF-8 ({0})
    Utf8(#[from] FromUtf8Error),

    /// {0}
    Xml(#[from] xml::Error),

    /// {0}
    Structure(#[from] DeError),

    /// {0}
    Light(#[from] light::Error),

    /// {0}
    LegacyData(#[from] legacy_bin::Error),

    /// {0}
    Legacy(#[from] legacy::Error),

    /// table lacks a data member
    MissingDataPath,

    /// container has no content
    EmptyContainer,
}

/// Returns true if `archive` has the manifest that marks an SPV file.
fn has_manifest<R>(archive: &ZipArchive<R>) -> Result<bool, zip::Error>
where
    R: Read + Seek,
{
    if !archive.contains(MANIFEST) {
        return Ok(false);
    }
    Ok(archive.read_all(MANIFEST)? == MANIFEST_CONTENTS)
}

/// Returns true if `reader` is an SPV file.  Failing to read it as a ZIP
/// archive just means that it isn't one.
pub fn detect<R>(reader: R) -> bool
where
    R: Read + Seek,
{
    match ZipArchive::new(reader) {
        Ok(archive) => has_manifest(&archive).unwrap_or(false),
        Err(error) => {
            debug!("not a ZIP archive: {error}");
            false
        }
    }
}

/// Returns true if `path` names an SPV file.
pub fn detect_file(path: impl AsRef<Path>) -> Result<bool, IoError> {
    Ok(detect(BufReader::new(File::open(path)?)))
}

/// Whether `error` means that the input isn't a ZIP archive at all, as
/// opposed to a damaged one.
fn is_not_zip(error: &zip::Error) -> bool {
    matches!(
        error,
        zip::Error::UnexpectedEof
            | zip::Error::NoCentralDirectory
            | zip::Error::BadMagic { offset: 0, .. }
    )
}

/// An open SPV file.
pub struct SpvFile<R> {
    archive: Rc<ZipArchive<R>>,
    root: Item,
    page_setup: Option<Setup>,
}

impl SpvFile<BufReader<File>> {
    /// Opens the SPV file at `path` and reads its item tree.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Self::read(BufReader::new(file), Some(path.display().to_string()))
    }
}

impl<R> SpvFile<R>
where
    R: Read + Seek + 'static,
{
    /// Reads an SPV file from `reader`.
    pub fn from_reader(reader: R) -> Result<Self, Error> {
        Self::read(reader, None)
    }

    fn read(reader: R, file_name: Option<String>) -> Result<Self, Error> {
        let archive = match ZipArchive::new(reader) {
            Ok(archive) => archive,
            Err(error) if is_not_zip(&error) => {
                debug!("not a ZIP archive: {error}");
                return Err(Error::NotSpv);
            }
            Err(error) => return Err(error.into()),
        };
        if !has_manifest(&archive)? {
            return Err(Error::NotSpv);
        }
        let archive = Rc::new(archive);

        let structure_members: Vec<String> = archive
            .list()
            .filter(|name| name.starts_with("outputViewer") && name.ends_with(".xml"))
            .map(String::from)
            .collect();
        let mut root = Item::new_root();
        let mut page_setup = None;
        for structure_member in &structure_members {
            let reader = StructureReader {
                archive: &archive,
                file_name: file_name.as_deref(),
                structure_member,
            };
            reader.read(&mut root, &mut page_setup);
        }

        Ok(Self {
            archive,
            root,
            page_setup,
        })
    }
}

impl<R> SpvFile<R> {
    /// The root of the item tree.  It is a heading whose children are the
    /// top-level items.
    pub fn root(&self) -> &Item {
        &self.root
    }

    pub fn into_root(self) -> Item {
        self.root
    }

    /// The page setup from the first structure member that has one.
    pub fn page_setup(&self) -> Option<&Setup> {
        self.page_setup.as_ref()
    }

    pub fn archive(&self) -> &ZipArchive<R> {
        &self.archive
    }
}

fn read_string<R>(archive: &ZipArchive<R>, member: &str) -> Result<String, MemberError>
where
    R: Read + Seek,
{
    Ok(String::from_utf8(archive.read_all(member)?)?)
}

/// Reads the item tree from one structure member.
struct StructureReader<'a, R> {
    archive: &'a Rc<ZipArchive<R>>,
    file_name: Option<&'a str>,
    structure_member: &'a str,
}

impl<R> StructureReader<'_, R>
where
    R: Read + Seek + 'static,
{
    fn read(&self, root: &mut Item, page_setup: &mut Option<Setup>) {
        debug!("reading structure member {}", self.structure_member);
        match self.parse() {
            Ok(heading) => {
                if page_setup.is_none() {
                    *page_setup = heading.page_setup().map(structure::PageSetup::decode);
                }
                self.read_children(heading.into_nodes().collect(), "", root);
            }
            Err(error) => {
                root.push(self.error_item(format!("{}: {error}", self.structure_member)));
            }
        }
    }

    fn parse(&self) -> Result<Heading, MemberError> {
        let xml = read_string(self.archive, self.structure_member)?;
        Element::parse_with_root(&xml, "heading")?;
        Ok(structure::parse(&xml)?)
    }

    fn spv_info(&self) -> SpvInfo {
        SpvInfo::new(self.structure_member)
    }

    fn error_item(&self, text: String) -> Item {
        emit(Diagnostic::error(text.clone()));
        Item::new(Text::new_log(Value::new_user_text(text)))
            .with_label(Some(String::from("Error")))
            .with_spv_info(SpvInfo {
                error: true,
                ..self.spv_info()
            })
    }

    fn read_children(&self, nodes: Vec<Node>, parent_path: &str, parent: &mut Item) {
        // Siblings that share a label get `[k]` appended in paths.
        let mut n_labels = HashMap::<String, usize>::new();
        for node in &nodes {
            *n_labels.entry(node_label(node).into()).or_default() += 1;
        }
        let mut seen = HashMap::<String, usize>::new();

        for node in nodes {
            let label = node_label(&node).to_string();
            let path = if n_labels.get(&label).is_some_and(|n| *n > 1) {
                let k = seen.entry(label.clone()).or_default();
                *k += 1;
                format!("{parent_path}/{label}[{k}]")
            } else {
                format!("{parent_path}/{label}")
            };
            match node {
                Node::Container(container) => {
                    if container.page_break_before.is_some() {
                        parent.push(Item::new(Details::PageBreak).with_spv_info(self.spv_info()));
                    }
                    parent.push(self.read_container(*container, path));
                }
                Node::Heading(heading) => {
                    let mut item = Item::new_root()
                        .with_label(Some(heading.label().unwrap_or_default().into()))
                        .with_command_name(heading.command_name.clone())
                        .with_show(heading.visibility.is_none())
                        .with_spv_info(SpvInfo {
                            hidden: heading.visibility == Some(Visibility::Hidden),
                            ..self.spv_info()
                        });
                    self.read_children(heading.into_nodes().collect(), &path, &mut item);
                    parent.push(item);
                }
            }
        }
    }

    fn read_container(&self, container: Container, path: String) -> Item {
        let label = container.label().map(String::from);
        let show = container.is_visible();
        let Some(content) = container.into_content() else {
            return self.error_item(format!(
                "{}: {}",
                self.structure_member,
                MemberError::EmptyContainer
            ));
        };
        let item = match content {
            Content::Text(text) => {
                let (markup, font_style) = decode_html(text.html());
                let content = Value::new_user_text(markup).with_font_style(font_style);
                Item::new(Text::new(text.type_, content))
                    .with_command_name(text.command_name.clone())
                    .with_spv_info(self.spv_info())
            }
            Content::Table(mut table) => {
                let Some(bin_member) = table.data_path().map(String::from) else {
                    return self.error_item(format!(
                        "{}: {}",
                        self.structure_member,
                        MemberError::MissingDataPath
                    ));
                };
                let xml_member = table.xml_path().map(String::from);
                let source = TableSource {
                    archive: self.archive.clone(),
                    location: Location {
                        file_name: self.file_name.map(String::from),
                        path: Some(path),
                        member: None,
                    },
                    look: match table.take_table_properties() {
                        Some(table_properties) => Arc::new(Look::from(table_properties)),
                        None => Settings::global().look.clone(),
                    },
                    bin_member: bin_member.clone(),
                    xml_member: xml_member.clone(),
                    subtype: table.sub_type.clone(),
                };
                let mut item = Item::new(TableItem::lazy(move || source.load()))
                    .with_command_name(table.command_name.clone())
                    .with_spv_info(SpvInfo {
                        bin_member: Some(bin_member),
                        xml_member,
                        ..self.spv_info()
                    });
                item.subtype = table.sub_type.clone();
                item
            }
            Content::Graph(opaque) => self.opaque_item(Details::Graph, &opaque),
            Content::Model(opaque) => self.opaque_item(Details::Model, &opaque),
            Content::Tree(opaque) => self.opaque_item(Details::Tree, &opaque),
            Content::Image(opaque) => Item::new(Details::Image)
                .with_command_name(opaque.command_name.clone())
                .with_spv_info(SpvInfo {
                    png_member: opaque.data_path().map(String::from),
                    ..self.spv_info()
                }),
            Content::Object(object) => Item::new(Details::Image)
                .with_command_name(object.command_name.clone())
                .with_spv_info(SpvInfo {
                    png_member: object.uri.clone(),
                    ..self.spv_info()
                }),
        };
        item.with_label(label).with_show(show)
    }

    fn opaque_item(&self, details: Details, opaque: &structure::Opaque) -> Item {
        Item::new(details)
            .with_command_name(opaque.command_name.clone())
            .with_spv_info(SpvInfo {
                bin_member: opaque.data_path().map(String::from),
                xml_member: opaque.xml_path().map(String::from),
                ..self.spv_info()
            })
    }
}

/// The label that identifies `node` in item paths.
fn node_label(node: &Node) -> &str {
    match node {
        Node::Container(container) => container.label().unwrap_or("Table"),
        Node::Heading(heading) => heading.label().unwrap_or_default(),
    }
}

/// Everything needed to decode a table when it is first needed.
struct TableSource<R> {
    archive: Rc<ZipArchive<R>>,
    location: Location,
    look: Arc<Look>,
    bin_member: String,
    xml_member: Option<String>,
    subtype: Option<String>,
}

impl<R> TableSource<R>
where
    R: Read + Seek,
{
    fn at(&self, member: &str) -> Location {
        Location {
            member: Some(member.into()),
            ..self.location.clone()
        }
    }

    /// Decodes the table.  On failure, returns a message that says where the
    /// failure occurred.
    fn load(&self) -> Result<PivotTable, String> {
        let result = match &self.xml_member {
            Some(xml_member) => self.load_legacy(xml_member),
            None => self.load_light(),
        };
        result.map_err(|(member, error)| {
            emit(Diagnostic::error(error.to_string()).with_location(self.at(&member)));
            let location = Location {
                file_name: None,
                ..self.at(&member)
            };
            format!("{location}: {error}")
        })
    }

    fn load_light(&self) -> Result<PivotTable, (String, MemberError)> {
        let member = &self.bin_member;
        debug!("decoding light table {member}");
        let fail = |error: MemberError| (member.clone(), error);
        let data = self.archive.read_all(member).map_err(|e| fail(e.into()))?;
        let table = light::parse(&data).map_err(|e| fail(e.into()))?;
        let location = self.at(member);
        light::decode::decode(&table, |warning| {
            emit(Diagnostic::warning(warning.to_string()).with_location(location.clone()))
        })
        .map_err(|e| fail(e.into()))
    }

    fn load_legacy(&self, xml_member: &str) -> Result<PivotTable, (String, MemberError)> {
        debug!("decoding legacy table {xml_member} with data {}", self.bin_member);
        let in_xml = |error: MemberError| (xml_member.to_string(), error);
        let in_bin = |error: MemberError| (self.bin_member.clone(), error);

        let xml = read_string(&self.archive, xml_member).map_err(in_xml)?;
        Element::parse_with_root(&xml, "visualization").map_err(|e| in_xml(e.into()))?;
        let visualization = Visualization::from_xml(&xml).map_err(|e| in_xml(e.into()))?;

        let data = self
            .archive
            .read_all(&self.bin_member)
            .map_err(|e| in_bin(e.into()))?;
        let data = LegacyData::parse(&data).map_err(|e| in_bin(e.into()))?;

        legacy::decode(
            &visualization,
            &data,
            self.look.clone(),
            self.subtype.as_deref(),
        )
        .map_err(|e| in_xml(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use ::zip::{write::SimpleFileOptions, ZipWriter};

    use crate::{
        message::{count, Severity},
        output::{Details, ItemClass},
    };

    use super::{detect, Error, SpvFile, MANIFEST};

    fn archive(members: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in members {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    const HEADING: &str = r#"<heading xmlns="http://xml.spss.com/spss/viewer/viewer-tree" xmlns:vtx="http://xml.spss.com/spss/viewer/viewer-text" xmlns:vtb="http://xml.spss.com/spss/viewer/viewer-table">
  <label>Output</label>
  <heading commandName="Frequencies">
    <label>Frequencies</label>
    <container visibility="visible">
      <label>Title</label>
      <vtx:text type="title" commandName="Frequencies"><html>&lt;html&gt;&lt;head&gt;&lt;style type="text/css"&gt;p{font-family:sans-serif;font-size:12pt;font-weight:bold}&lt;/style&gt;&lt;/head&gt;&lt;body&gt;&lt;p&gt;Frequencies&lt;/p&gt;&lt;/body&gt;&lt;/html&gt;</html></vtx:text>
    </container>
    <container visibility="hidden" page-break-before="always">
      <label>Statistics</label>
      <vtb:table commandName="Frequencies" subType="Statistics" tableId="1">
        <vtb:tableStructure><vtb:dataPath>missing_lightTableData.bin</vtb:dataPath></vtb:tableStructure>
      </vtb:table>
    </container>
  </heading>
  <heading commandName="Frequencies" visibility="collapsed">
    <label>Frequencies</label>
  </heading>
</heading>"#;

    #[test]
    fn not_an_archive() {
        let text = "This is just some text.\n".repeat(4);
        assert!(!detect(Cursor::new(text.clone())));
        let error = SpvFile::from_reader(Cursor::new(text)).err().unwrap();
        assert!(matches!(error, Error::NotSpv));
        assert_eq!(error.to_string(), "not an SPV file");
    }

    #[test]
    fn manifest() {
        let minimal = archive(&[(MANIFEST, "allowPivoting=true")]);
        assert!(detect(Cursor::new(minimal.clone())));
        let spv = SpvFile::from_reader(Cursor::new(minimal)).unwrap();
        assert!(spv.root().is_heading());
        assert!(spv.root().children().is_empty());
        assert!(spv.page_setup().is_none());

        let trailing_newline = archive(&[(MANIFEST, "allowPivoting=true\n")]);
        assert!(!detect(Cursor::new(trailing_newline.clone())));
        assert!(matches!(
            SpvFile::from_reader(Cursor::new(trailing_newline)),
            Err(Error::NotSpv)
        ));

        let no_manifest = archive(&[("outputViewer0000000001.xml", HEADING)]);
        assert!(!detect(Cursor::new(no_manifest)));
    }

    #[test]
    fn item_tree() {
        let spv = SpvFile::from_reader(Cursor::new(archive(&[
            (MANIFEST, "allowPivoting=true"),
            ("outputViewer0000000001.xml", HEADING),
        ])))
        .unwrap();
        let outline: Vec<_> = spv
            .root()
            .descendants()
            .map(|(depth, item)| {
                (
                    depth,
                    item.details.type_name(),
                    item.label().into_owned(),
                    item.show,
                )
            })
            .collect();
        assert_eq!(
            outline,
            vec![
                (0, "heading", String::from("Frequencies"), true),
                (1, "text", String::from("Title"), true),
                (1, "page break", String::from("Page Break"), true),
                (1, "table", String::from("Statistics"), false),
                (0, "heading", String::from("Frequencies"), false),
            ]
        );

        let frequencies = &spv.root().children()[0];
        assert_eq!(frequencies.command_name.as_deref(), Some("Frequencies"));
        let title = &frequencies.children()[0];
        assert_eq!(title.class(), ItemClass::OutlineHeaders);
        let Details::Text(text) = &title.details else {
            panic!()
        };
        assert_eq!(text.content.display(()).to_string(), "Frequencies");
        let font_style = text.content.font_style().unwrap();
        assert!(font_style.bold);
        assert_eq!(font_style.size, 12);

        let table = &frequencies.children()[2];
        assert_eq!(table.subtype.as_deref(), Some("Statistics"));
        let info = table.spv_info.as_ref().unwrap();
        assert_eq!(
            info.structure_member.as_deref(),
            Some("outputViewer0000000001.xml")
        );
        assert_eq!(
            info.bin_member.as_deref(),
            Some("missing_lightTableData.bin")
        );
        assert!(info.xml_member.is_none());

        // The table's member is missing, so it decodes as an error table
        // whose message names the item path and the member.
        assert!(table.is_error());
        let pt = table.table().unwrap();
        assert_eq!(pt.label(), "Error");
        let message = pt.get(&[0]).unwrap().display(()).to_string();
        assert!(
            message.starts_with("/Frequencies[1]/Statistics (missing_lightTableData.bin): "),
            "{message}"
        );
    }

    const HIDDEN_HEADING: &str = r#"<heading xmlns="http://xml.spss.com/spss/viewer/viewer-tree" xmlns:vtb="http://xml.spss.com/spss/viewer/viewer-table">
  <heading commandName="Crosstabs" visibility="hidden">
    <label>Crosstabs</label>
    <container visibility="visible">
      <label>Table</label>
      <vtb:table commandName="Crosstabs" subType="Crosstabulation" tableId="1">
        <vtb:tableStructure><vtb:dataPath>first.bin</vtb:dataPath></vtb:tableStructure>
      </vtb:table>
    </container>
    <container visibility="visible">
      <label>Table</label>
      <vtb:table commandName="Crosstabs" subType="Crosstabulation" tableId="2">
        <vtb:tableStructure><vtb:dataPath>second.bin</vtb:dataPath></vtb:tableStructure>
      </vtb:table>
    </container>
  </heading>
</heading>"#;

    #[test]
    fn hidden_heading_and_sibling_paths() {
        let spv = SpvFile::from_reader(Cursor::new(archive(&[
            (MANIFEST, "allowPivoting=true"),
            ("outputViewer0000000001.xml", HIDDEN_HEADING),
            ("second.bin", "not a light table"),
        ])))
        .unwrap();
        let crosstabs = &spv.root().children()[0];
        assert!(crosstabs.spv_info.as_ref().unwrap().hidden);
        assert!(!crosstabs.is_visible());
        assert!(crosstabs.children().iter().all(|child| child.is_visible()));

        // Failing to decode a table counts as an error.
        let errors = count(Severity::Error);
        let second = &crosstabs.children()[1];
        assert!(second.is_error());
        assert!(count(Severity::Error) > errors);

        let message = second
            .table()
            .unwrap()
            .get(&[0])
            .unwrap()
            .display(())
            .to_string();
        assert!(
            message.starts_with("/Crosstabs/Table[2] (second.bin): "),
            "{message}"
        );
    }

    #[test]
    fn bad_structure() {
        let spv = SpvFile::from_reader(Cursor::new(archive(&[
            (MANIFEST, "allowPivoting=true"),
            ("outputViewer0000000001.xml", "<notHeading/>"),
            ("outputViewer0000000002.xml", "<heading><container>"),
        ])))
        .unwrap();
        let children = spv.root().children();
        assert_eq!(children.len(), 2);
        for (child, member) in children
            .iter()
            .zip(["outputViewer0000000001.xml", "outputViewer0000000002.xml"])
        {
            assert_eq!(child.label(), "Error");
            assert_eq!(child.class(), ItemClass::Logs);
            assert!(child.is_error());
            let Details::Text(text) = &child.details else {
                panic!()
            };
            assert!(text
                .content
                .display(())
                .to_string()
                .starts_with(&format!("{member}: ")));
        }
        let Details::Text(text) = &children[0].details else {
            panic!()
        };
        assert_eq!(
            text.content.display(()).to_string(),
            "outputViewer0000000001.xml: root node is \"notHeading\" but \"heading\" was expected"
        );
    }
}
