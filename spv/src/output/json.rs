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


use std::{
    borrow::Cow,
    fs::File,
    io::{BufWriter, Result as IoResult, Write},
    path::PathBuf,
};

use log::warn;
use serde::{Deserialize, Serialize};

use super::{
    driver::{sorted_cells, Driver},
    page::{Heading, Setup},
    pivot::{Axis2, PivotTable},
    Details, Item,
};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JsonConfig {
    /// Output file name.
    pub file: PathBuf,

    /// Whether to indent the output.
    #[serde(default = "default_pretty")]
    pub pretty: bool,
}

fn default_pretty() -> bool {
    true
}

/// Writes each item passed to [Driver::write] as a JSON object.
pub struct JsonDriver<W: Write = BufWriter<File>> {
    file: W,
    pretty: bool,
}

impl JsonDriver {
    pub fn new(config: &JsonConfig) -> IoResult<Self> {
        Ok(Self::for_writer(
            BufWriter::new(File::create(&config.file)?),
            config.pretty,
        ))
    }
}

impl<W: Write> JsonDriver<W> {
    pub fn for_writer(file: W, pretty: bool) -> Self {
        Self { file, pretty }
    }

    fn write_value(&mut self, value: &impl Serialize) -> IoResult<()> {
        if self.pretty {
            serde_json::to_writer_pretty(&mut self.file, value)?;
        } else {
            serde_json::to_writer(&mut self.file, value)?;
        }
        writeln!(self.file)
    }

    pub fn into_inner(self) -> W {
        self.file
    }
}

#[derive(Serialize)]
struct ItemView<'a> {
    #[serde(rename = "type")]
    type_: &'static str,
    label: Cow<'a, str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    command: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subtype: Option<&'a str>,
    #[serde(skip_serializing_if = "is_true")]
    show: bool,
    #[serde(flatten)]
    content: Option<ContentView<'a>>,
}

fn is_true(b: &bool) -> bool {
    *b
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
enum ContentView<'a> {
    Children(Vec<ItemView<'a>>),
    Text(String),
    Table(TableView),
}

#[derive(Serialize)]
struct TableView {
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    caption: Option<String>,
    dimensions: Vec<DimensionView>,
    cells: Vec<CellView>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    footnotes: Vec<FootnoteView>,
}

#[derive(Serialize)]
struct DimensionView {
    name: String,
    axis: &'static str,
    categories: Vec<String>,
}

#[derive(Serialize)]
struct CellView {
    index: Vec<usize>,
    value: String,
}

#[derive(Serialize)]
struct FootnoteView {
    marker: String,
    content: String,
}

#[derive(Serialize)]
struct SetupView {
    initial_page_number: i32,
    paper: [f64; 2],
    margins: MarginsView,
    orientation: &'static str,
    object_spacing: f64,
    chart_size: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    header: Vec<ParagraphView>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    footer: Vec<ParagraphView>,
}

#[derive(Serialize)]
struct MarginsView {
    left: f64,
    right: f64,
    top: f64,
    bottom: f64,
}

#[derive(Serialize)]
struct ParagraphView {
    markup: String,
    align: &'static str,
}

impl SetupView {
    fn new(setup: &Setup) -> Self {
        fn paragraphs(heading: &Heading) -> Vec<ParagraphView> {
            heading
                .0
                .iter()
                .map(|paragraph| ParagraphView {
                    markup: paragraph.markup.clone(),
                    align: paragraph.horz_align.as_str(),
                })
                .collect()
        }

        let [left, right] = setup.margins[Axis2::X];
        let [top, bottom] = setup.margins[Axis2::Y];
        Self {
            initial_page_number: setup.initial_page_number,
            paper: [setup.paper[Axis2::X], setup.paper[Axis2::Y]],
            margins: MarginsView {
                left,
                right,
                top,
                bottom,
            },
            orientation: setup.orientation.as_str(),
            object_spacing: setup.object_spacing,
            chart_size: setup.chart_size.as_str(),
            header: paragraphs(setup.header()),
            footer: paragraphs(setup.footer()),
        }
    }
}

impl TableView {
    fn new(pt: &PivotTable) -> Self {
        Self {
            title: pt.title().display(pt).to_string(),
            caption: pt
                .caption
                .as_ref()
                .map(|caption| caption.display(pt).to_string()),
            dimensions: pt
                .dimensions
                .iter()
                .map(|dimension| DimensionView {
                    name: dimension.root.name.display(pt).to_string(),
                    axis: dimension.axis_type.as_str(),
                    categories: (0..dimension.len())
                        .filter_map(|index| dimension.data_leaf(index))
                        .map(|leaf| leaf.name.display(pt).to_string())
                        .collect(),
                })
                .collect(),
            cells: sorted_cells(pt)
                .into_iter()
                .map(|(index, value)| CellView {
                    index: index.to_vec(),
                    value: value.display(pt).to_string(),
                })
                .collect(),
            footnotes: pt
                .footnotes
                .iter()
                .map(|footnote| FootnoteView {
                    marker: footnote.display_marker(pt).to_string(),
                    content: footnote.display_content(pt).to_string(),
                })
                .collect(),
        }
    }
}

impl<'a> ItemView<'a> {
    fn new(item: &'a Item) -> Self {
        let content = match &item.details {
            Details::Heading(children) => Some(ContentView::Children(
                children.iter().map(|child| ItemView::new(child)).collect(),
            )),
            Details::Text(text) => Some(ContentView::Text(text.content.display(()).to_string())),
            Details::Table(_) => item.table().map(|pt| ContentView::Table(TableView::new(pt))),
            Details::Graph
            | Details::Model
            | Details::Tree
            | Details::Image
            | Details::PageBreak => None,
        };
        Self {
            type_: item.details.type_name(),
            label: item.label(),
            command: item.command_name.as_deref(),
            subtype: item.subtype.as_deref(),
            show: item.show,
            content,
        }
    }
}

impl<W: Write> Driver for JsonDriver<W> {
    fn name(&self) -> Cow<'static, str> {
        Cow::from("json")
    }

    fn write(&mut self, item: &Item) -> IoResult<()> {
        self.write_value(&ItemView::new(item))
    }

    /// Writes the page setup as a `{"page_setup": ...}` object, ahead of the
    /// items.
    fn setup(&mut self, page_setup: &Setup) -> bool {
        #[derive(Serialize)]
        struct PageSetupRecord {
            page_setup: SetupView,
        }

        let record = PageSetupRecord {
            page_setup: SetupView::new(page_setup),
        };
        if let Err(error) = self.write_value(&record) {
            warn!("{error}");
        }
        true
    }

    fn flush(&mut self) -> IoResult<()> {
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value as JsonValue};

    use crate::output::{
        driver::Driver,
        page::{Orientation, Paragraph, Setup},
        pivot::{Axis3, HorzAlign, PivotTable, Value},
        Item, Text, TextType,
    };

    use super::JsonDriver;

    #[test]
    fn items() {
        let mut pt = PivotTable::new("Counts", "Counts");
        let rows = pt.add_dimension(Axis3::Y, "Sex");
        pt.dimensions[rows].add_leaf(&[], "Male");
        pt.dimensions[rows].add_leaf(&[], "Female");
        pt.put1(1, Value::new_user_text("12"));

        let mut heading = Item::new_root()
            .with_label(Some(String::from("Frequencies")))
            .with_command_name(Some(String::from("Frequencies")));
        heading.push(Item::new(Text::new(TextType::Title, Value::new_user_text("Frequencies"))));
        let mut table = Item::new(pt).with_show(false);
        table.subtype = Some(String::from("Counts"));
        heading.push(table);

        let mut driver = JsonDriver::for_writer(Vec::new(), false);
        driver.write(&heading).unwrap();
        let output = String::from_utf8(driver.into_inner()).unwrap();
        let actual: JsonValue = serde_json::from_str(&output).unwrap();
        assert_eq!(
            actual,
            json!({
                "type": "heading",
                "label": "Frequencies",
                "command": "Frequencies",
                "children": [
                    {"type": "text", "label": "Title", "text": "Frequencies"},
                    {
                        "type": "table",
                        "label": "Table",
                        "subtype": "Counts",
                        "show": false,
                        "table": {
                            "title": "Counts",
                            "dimensions": [{
                                "name": "Sex",
                                "axis": "row",
                                "categories": ["Male", "Female"],
                            }],
                            "cells": [{"index": [1], "value": "12"}],
                        },
                    },
                ],
            })
        );
    }

    #[test]
    fn page_setup() {
        let mut setup = Setup {
            orientation: Orientation::Landscape,
            ..Setup::default()
        };
        setup.headings[0].0.push(Paragraph {
            markup: String::from("Page &[Page]"),
            horz_align: HorzAlign::Center,
        });

        let mut driver = JsonDriver::for_writer(Vec::new(), false);
        assert!(driver.setup(&setup));
        let output = String::from_utf8(driver.into_inner()).unwrap();
        let actual: JsonValue = serde_json::from_str(&output).unwrap();
        assert_eq!(
            actual,
            json!({
                "page_setup": {
                    "initial_page_number": 1,
                    "paper": [8.5, 11.0],
                    "margins": {"left": 0.5, "right": 0.5, "top": 0.5, "bottom": 0.5},
                    "orientation": "landscape",
                    "object_spacing": 12.0 / 72.0,
                    "chart_size": "as-is",
                    "header": [{"markup": "Page &[Page]", "align": "center"}],
                },
            })
        );
    }
}
