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


//! The output structure members of an SPV file (`outputViewer*.xml`), which
//! describe the outline of headings and the containers within them.

use quick_xml::de::{from_str, DeError};
use serde::Deserialize;

use crate::output::{
    page::{ChartSize as PageChartSize, Orientation, Setup},
    TextType,
    pivot::{look_xml::{Dimension as Length, TableProperties}, Axis2},
};

use super::html::decode_page_paragraphs;

/// Parses the contents of a structure member, whose root element must be a
/// `heading`.
pub fn parse(xml: &str) -> Result<Heading, DeError> {
    from_str(xml)
}

/// Text content of an element.
#[derive(Deserialize, Debug, Default)]
pub struct Text {
    #[serde(rename = "$text", default)]
    pub text: String,
}

#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Visible,
    Hidden,
    Collapsed,
}

#[derive(Deserialize, Debug)]
pub struct Heading {
    #[serde(rename = "@commandName")]
    pub command_name: Option<String>,

    #[serde(rename = "@visibility")]
    pub visibility: Option<Visibility>,

    #[serde(rename = "$value", default)]
    children: Vec<HeadingChild>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
enum HeadingChild {
    Label(Text),
    PageSetup(PageSetup),
    Container(Box<Container>),
    Heading(Box<Heading>),
    #[serde(other)]
    Other,
}

/// A child of a [Heading] that corresponds to an output item.
pub enum Node {
    Container(Box<Container>),
    Heading(Box<Heading>),
}

impl Heading {
    pub fn label(&self) -> Option<&str> {
        self.children.iter().find_map(|child| match child {
            HeadingChild::Label(label) => Some(label.text.as_str()),
            _ => None,
        })
    }

    pub fn page_setup(&self) -> Option<&PageSetup> {
        self.children.iter().find_map(|child| match child {
            HeadingChild::PageSetup(page_setup) => Some(page_setup),
            _ => None,
        })
    }

    /// Consumes the heading and returns its containers and subheadings, in
    /// document order.
    pub fn into_nodes(self) -> impl Iterator<Item = Node> {
        self.children.into_iter().filter_map(|child| match child {
            HeadingChild::Container(container) => Some(Node::Container(container)),
            HeadingChild::Heading(heading) => Some(Node::Heading(heading)),
            _ => None,
        })
    }
}

#[derive(Deserialize, Debug)]
pub struct Container {
    #[serde(rename = "@visibility")]
    pub visibility: Option<Visibility>,

    #[serde(rename = "@page-break-before")]
    pub page_break_before: Option<String>,

    #[serde(rename = "@text-align")]
    pub text_align: Option<String>,

    #[serde(rename = "@width")]
    pub width: Option<String>,

    #[serde(rename = "$value", default)]
    children: Vec<ContainerChild>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
enum ContainerChild {
    Label(Text),
    Table(Box<Table>),
    Text(ContainerText),
    Graph(Opaque),
    Model(Opaque),
    Tree(Opaque),
    Object(Object),
    Image(Opaque),
    #[serde(other)]
    Other,
}

/// The content of a [Container].
pub enum Content {
    Table(Box<Table>),
    Text(ContainerText),
    Graph(Opaque),
    Model(Opaque),
    Tree(Opaque),
    Object(Object),
    Image(Opaque),
}

impl Container {
    pub fn label(&self) -> Option<&str> {
        self.children.iter().find_map(|child| match child {
            ContainerChild::Label(label) => Some(label.text.as_str()),
            _ => None,
        })
    }

    pub fn is_visible(&self) -> bool {
        self.visibility == Some(Visibility::Visible)
    }

    /// Consumes the container and returns its content, if it has any.
    pub fn into_content(self) -> Option<Content> {
        self.children.into_iter().find_map(|child| match child {
            ContainerChild::Table(table) => Some(Content::Table(table)),
            ContainerChild::Text(text) => Some(Content::Text(text)),
            ContainerChild::Graph(graph) => Some(Content::Graph(graph)),
            ContainerChild::Model(model) => Some(Content::Model(model)),
            ContainerChild::Tree(tree) => Some(Content::Tree(tree)),
            ContainerChild::Object(object) => Some(Content::Object(object)),
            ContainerChild::Image(image) => Some(Content::Image(image)),
            ContainerChild::Label(_) | ContainerChild::Other => None,
        })
    }
}

/// A text item (the `vtx:text` element).
#[derive(Deserialize, Debug)]
pub struct ContainerText {
    #[serde(rename = "@type", default)]
    pub type_: TextType,

    #[serde(rename = "@commandName")]
    pub command_name: Option<String>,

    #[serde(rename = "$value", default)]
    children: Vec<ContainerTextChild>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
enum ContainerTextChild {
    Html(Text),
    #[serde(other)]
    Other,
}

impl ContainerText {
    /// The embedded HTML document.
    pub fn html(&self) -> &str {
        self.children
            .iter()
            .find_map(|child| match child {
                ContainerTextChild::Html(html) => Some(html.text.as_str()),
                ContainerTextChild::Other => None,
            })
            .unwrap_or_default()
    }
}

/// A table (the `vtb:table` element).
#[derive(Deserialize, Debug)]
pub struct Table {
    #[serde(rename = "@commandName")]
    pub command_name: Option<String>,

    #[serde(rename = "@subType")]
    pub sub_type: Option<String>,

    #[serde(rename = "@tableId")]
    pub table_id: Option<String>,

    #[serde(rename = "@type")]
    pub type_: Option<String>,

    #[serde(rename = "$value", default)]
    children: Vec<TableChild>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
enum TableChild {
    TableProperties(Box<TableProperties>),
    TableStructure(TableStructure),
    #[serde(other)]
    Other,
}

#[derive(Deserialize, Debug, Default)]
pub struct TableStructure {
    #[serde(rename = "$value", default)]
    children: Vec<PathChild>,
}

/// Member references within a [TableStructure] or [Opaque] item.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
enum PathChild {
    Path(Text),
    DataPath(Text),
    CsvPath(Text),
    #[serde(other)]
    Other,
}

fn find_path<'a>(children: &'a [PathChild], xml: bool) -> Option<&'a str> {
    children.iter().find_map(|child| match child {
        PathChild::Path(path) if xml => Some(path.text.trim()),
        PathChild::DataPath(path) if !xml => Some(path.text.trim()),
        _ => None,
    })
}

impl Table {
    fn structure(&self) -> Option<&TableStructure> {
        self.children.iter().find_map(|child| match child {
            TableChild::TableStructure(structure) => Some(structure),
            _ => None,
        })
    }

    /// The name of the member that holds the light table, or the legacy
    /// table's data.
    pub fn data_path(&self) -> Option<&str> {
        self.structure()
            .and_then(|structure| find_path(&structure.children, false))
    }

    /// The name of the member that holds the legacy table's visualization, if
    /// this is a legacy table.
    pub fn xml_path(&self) -> Option<&str> {
        self.structure()
            .and_then(|structure| find_path(&structure.children, true))
    }

    /// Removes and returns the table's properties.
    pub(crate) fn take_table_properties(&mut self) -> Option<TableProperties> {
        let index = self
            .children
            .iter()
            .position(|child| matches!(child, TableChild::TableProperties(_)))?;
        match self.children.remove(index) {
            TableChild::TableProperties(table_properties) => Some(*table_properties),
            _ => None,
        }
    }
}

/// A graph, model, tree, or image.  The reader does not interpret these
/// beyond the members they reference.
#[derive(Deserialize, Debug)]
pub struct Opaque {
    #[serde(rename = "@commandName")]
    pub command_name: Option<String>,

    #[serde(rename = "$value", default)]
    children: Vec<PathChild>,
}

impl Opaque {
    pub fn data_path(&self) -> Option<&str> {
        find_path(&self.children, false)
    }

    pub fn xml_path(&self) -> Option<&str> {
        find_path(&self.children, true)
    }
}

/// An image referenced by URI.
#[derive(Deserialize, Debug)]
pub struct Object {
    #[serde(rename = "@commandName")]
    pub command_name: Option<String>,

    #[serde(rename = "@type")]
    pub type_: Option<String>,

    #[serde(rename = "@uri")]
    pub uri: Option<String>,
}

#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ChartSize {
    AsIs,
    FullHeight,
    HalfHeight,
    QuarterHeight,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct PageSetup {
    #[serde(rename = "@initial-page-number")]
    initial_page_number: Option<i32>,

    #[serde(rename = "@chart-size")]
    chart_size: Option<ChartSize>,

    #[serde(rename = "@margin-left")]
    margin_left: Option<Length>,

    #[serde(rename = "@margin-right")]
    margin_right: Option<Length>,

    #[serde(rename = "@margin-top")]
    margin_top: Option<Length>,

    #[serde(rename = "@margin-bottom")]
    margin_bottom: Option<Length>,

    #[serde(rename = "@paper-height")]
    paper_height: Option<Length>,

    #[serde(rename = "@paper-width")]
    paper_width: Option<Length>,

    #[serde(rename = "@reference-orientation")]
    reference_orientation: Option<String>,

    #[serde(rename = "@space-after")]
    space_after: Option<Length>,

    #[serde(rename = "pageHeader")]
    page_header: PageParagraphs,

    #[serde(rename = "pageFooter")]
    page_footer: PageParagraphs,
}

/// A page header or footer.
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct PageParagraphs {
    #[serde(rename = "pageParagraph")]
    page_paragraph: Option<PageParagraph>,
}

#[derive(Deserialize, Debug, Default)]
pub struct PageParagraph {
    #[serde(rename = "$value", default)]
    children: Vec<PageParagraphChild>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
enum PageParagraphChild {
    PageParagraphText(Text),
    Text(Text),
    #[serde(other)]
    Other,
}

impl PageParagraphs {
    fn html(&self) -> impl Iterator<Item = &str> {
        self.page_paragraph
            .iter()
            .flat_map(|paragraph| paragraph.children.iter())
            .filter_map(|child| match child {
                PageParagraphChild::PageParagraphText(text) | PageParagraphChild::Text(text) => {
                    Some(text.text.as_str())
                }
                PageParagraphChild::Other => None,
            })
    }
}

impl PageSetup {
    /// Converts this page setup into the output subsystem's form.  Anything
    /// not specified keeps its default value.
    pub fn decode(&self) -> Setup {
        let mut setup = Setup::default();
        if let Some(initial_page_number) = self.initial_page_number {
            setup.initial_page_number = initial_page_number;
        }
        for (axis, length) in [(Axis2::X, self.paper_width), (Axis2::Y, self.paper_height)] {
            if let Some(length) = length {
                setup.paper[axis] = length.0;
            }
        }
        for (axis, side, length) in [
            (Axis2::X, 0, self.margin_left),
            (Axis2::X, 1, self.margin_right),
            (Axis2::Y, 0, self.margin_top),
            (Axis2::Y, 1, self.margin_bottom),
        ] {
            if let Some(length) = length {
                setup.margins[axis][side] = length.0;
            }
        }
        if let Some(space_after) = self.space_after {
            setup.object_spacing = space_after.0;
        }
        if let Some(chart_size) = self.chart_size {
            setup.chart_size = match chart_size {
                ChartSize::AsIs => PageChartSize::AsIs,
                ChartSize::FullHeight => PageChartSize::FullHeight,
                ChartSize::HalfHeight => PageChartSize::HalfHeight,
                ChartSize::QuarterHeight => PageChartSize::QuarterHeight,
            };
        }
        if let Some(orientation) = &self.reference_orientation {
            if orientation.starts_with("90") || orientation.eq_ignore_ascii_case("landscape") {
                setup.orientation = Orientation::Landscape;
            }
        }
        for (heading, paragraphs) in setup
            .headings
            .iter_mut()
            .zip([&self.page_header, &self.page_footer])
        {
            heading.0 = paragraphs.html().flat_map(decode_page_paragraphs).collect();
        }
        setup
    }
}

#[cfg(test)]
mod tests {
    use crate::output::{
        page::ChartSize,
        pivot::{Axis2, HorzAlign},
        TextType,
    };

    use super::{parse, Content, Node, Visibility};

    const STRUCTURE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<heading xmlns="http://xml.spss.com/spss/viewer/viewer-tree" xmlns:vps="http://xml.spss.com/spss/viewer/viewer-pagesetup" xmlns:vtx="http://xml.spss.com/spss/viewer/viewer-text" xmlns:vtb="http://xml.spss.com/spss/viewer/viewer-table">
  <label>Output</label>
  <vps:pageSetup initial-page-number="3" chart-size="half-height" margin-left="1in" margin-top="36pt" paper-width="8.27in" reference-orientation="90deg">
    <vps:pageHeader>
      <vps:pageParagraph>
        <vps:pageParagraphText>&lt;html&gt;&lt;body&gt;&lt;p style="text-align:right"&gt;Header&lt;/p&gt;&lt;/body&gt;&lt;/html&gt;</vps:pageParagraphText>
      </vps:pageParagraph>
    </vps:pageHeader>
    <vps:pageFooter/>
  </vps:pageSetup>
  <heading commandName="Descriptives">
    <label>Descriptives</label>
    <container visibility="visible">
      <label>Title</label>
      <vtx:text type="title" commandName="Descriptives"><html lang="en">&lt;html&gt;&lt;body&gt;Descriptives&lt;/body&gt;&lt;/html&gt;</html></vtx:text>
    </container>
    <container visibility="hidden" page-break-before="always">
      <label>Descriptive Statistics</label>
      <vtb:table commandName="Descriptives" subType="Descriptive Statistics" tableId="-4122591256483201023" type="table">
        <vtb:tableStructure>
          <vtb:path>0000_viewerVisualization.xml</vtb:path>
          <vtb:dataPath>0000_visualizationData.bin</vtb:dataPath>
        </vtb:tableStructure>
      </vtb:table>
    </container>
  </heading>
  <heading visibility="collapsed">
    <label>Empty</label>
  </heading>
</heading>
"#;

    #[test]
    fn structure() {
        let root = parse(STRUCTURE).unwrap();
        assert_eq!(root.label(), Some("Output"));

        let setup = root.page_setup().unwrap().decode();
        assert_eq!(setup.initial_page_number, 3);
        assert_eq!(setup.chart_size, ChartSize::HalfHeight);
        assert_eq!(setup.margins[Axis2::X], [1.0, 0.5]);
        assert_eq!(setup.margins[Axis2::Y][0], 0.5);
        assert_eq!(setup.paper[Axis2::X], 8.27);
        assert_eq!(setup.headings[0].0.len(), 1);
        assert_eq!(setup.headings[0].0[0].markup, "Header");
        assert_eq!(setup.headings[0].0[0].horz_align, HorzAlign::Right);
        assert!(setup.headings[1].0.is_empty());

        let nodes: Vec<_> = root.into_nodes().collect();
        assert_eq!(nodes.len(), 2);
        let Node::Heading(empty) = &nodes[1] else {
            panic!();
        };
        assert_eq!(empty.visibility, Some(Visibility::Collapsed));
        assert_eq!(empty.label(), Some("Empty"));

        let Node::Heading(descriptives) = nodes.into_iter().next().unwrap() else {
            panic!();
        };
        assert_eq!(descriptives.command_name.as_deref(), Some("Descriptives"));
        let mut containers = descriptives.into_nodes().map(|node| match node {
            Node::Container(container) => container,
            Node::Heading(_) => panic!(),
        });

        let title = containers.next().unwrap();
        assert!(title.is_visible());
        assert_eq!(title.label(), Some("Title"));
        let Some(Content::Text(text)) = title.into_content() else {
            panic!();
        };
        assert_eq!(text.type_, TextType::Title);
        assert_eq!(text.html(), "<html><body>Descriptives</body></html>");

        let table = containers.next().unwrap();
        assert!(!table.is_visible());
        assert_eq!(table.page_break_before.as_deref(), Some("always"));
        let Some(Content::Table(mut table)) = table.into_content() else {
            panic!();
        };
        assert_eq!(table.sub_type.as_deref(), Some("Descriptive Statistics"));
        assert_eq!(table.data_path(), Some("0000_visualizationData.bin"));
        assert_eq!(table.xml_path(), Some("0000_viewerVisualization.xml"));
        assert!(table.take_table_properties().is_none());
        assert!(containers.next().is_none());
    }
}
