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

//! Reads whole archives built in memory.

use std::{
    io::{Cursor, Write},
    path::PathBuf,
};

use spv::output::{
    csv::{CsvConfig, CsvDriver},
    driver::Driver,
    pivot::{PivotTable, ValueInner},
    spv::{
        detect,
        select::{select, Criteria},
        Error, SpvFile,
    },
    Item,
};
use zip::{write::SimpleFileOptions, ZipWriter};

const STRUCTURE: &str = "outputViewer0000000001.xml";

fn archive(members: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in members {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn open(members: &[(&str, &[u8])]) -> SpvFile<Cursor<Vec<u8>>> {
    let mut all = vec![("META-INF/MANIFEST.MF", &b"allowPivoting=true"[..])];
    all.extend_from_slice(members);
    SpvFile::from_reader(Cursor::new(archive(&all))).unwrap()
}

/// Wraps `containers` in a structure member with one command heading.
fn structure(containers: &str) -> Vec<u8> {
    format!(
        r#"<heading xmlns="http://xml.spss.com/spss/viewer/viewer-tree" xmlns:vtb="http://xml.spss.com/spss/viewer/viewer-table">
  <label>Output</label>
  <heading commandName="Crosstabs">
    <label>Crosstabs</label>
    {containers}
  </heading>
</heading>"#
    )
    .into_bytes()
}

fn light_container(label: &str, visibility: &str, member: &str) -> String {
    format!(
        r#"<container visibility="{visibility}">
      <label>{label}</label>
      <vtb:table commandName="Crosstabs" subType="Crosstabulation" tableId="1">
        <vtb:tableStructure><vtb:dataPath>{member}</vtb:dataPath></vtb:tableStructure>
      </vtb:table>
    </container>"#
    )
}

/// Builds light binary table members.
#[derive(Default)]
struct Bytes(Vec<u8>);

impl Bytes {
    fn u8(&mut self, x: u8) -> &mut Self {
        self.0.push(x);
        self
    }

    fn u16(&mut self, x: u16) -> &mut Self {
        self.0.extend_from_slice(&x.to_le_bytes());
        self
    }

    fn u32(&mut self, x: u32) -> &mut Self {
        self.0.extend_from_slice(&x.to_le_bytes());
        self
    }

    fn be32(&mut self, x: u32) -> &mut Self {
        self.0.extend_from_slice(&x.to_be_bytes());
        self
    }

    fn u64(&mut self, x: u64) -> &mut Self {
        self.0.extend_from_slice(&x.to_le_bytes());
        self
    }

    fn f32(&mut self, x: f32) -> &mut Self {
        self.0.extend_from_slice(&x.to_le_bytes());
        self
    }

    fn f64(&mut self, x: f64) -> &mut Self {
        self.0.extend_from_slice(&x.to_le_bytes());
        self
    }

    fn bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.0.extend_from_slice(bytes);
        self
    }

    fn string(&mut self, s: &str) -> &mut Self {
        self.u32(s.len() as u32).bytes(s.as_bytes())
    }

    fn counted(&mut self, inner: &Bytes) -> &mut Self {
        self.u32(inner.0.len() as u32).bytes(&inner.0)
    }

    fn refs(&mut self, refs: &[u16]) -> &mut Self {
        self.u8(0x31).u32(refs.len() as u32);
        for r in refs {
            self.u16(*r);
        }
        self.u32(0)
            .counted(Bytes::default().u32(0).u8(0x58).u8(0x58))
    }

    fn text(&mut self, s: &str) -> &mut Self {
        self.text_with_refs(s, &[])
    }

    fn text_with_refs(&mut self, s: &str, refs: &[u16]) -> &mut Self {
        self.u8(3).string(s);
        if refs.is_empty() {
            self.u8(0x58);
        } else {
            self.refs(refs);
        }
        self.string(s).string(s).u8(1)
    }

    fn number(&mut self, x: f64, refs: &[u16]) -> &mut Self {
        self.u8(1);
        if refs.is_empty() {
            self.u8(0x58);
        } else {
            self.refs(refs);
        }
        self.u32(F8_2).f64(x)
    }
}

const F8_2: u32 = (5 << 16) | (8 << 8) | 2;

fn value(f: impl FnOnce(&mut Bytes) -> &mut Bytes) -> Vec<u8> {
    let mut b = Bytes::default();
    f(&mut b);
    b.0
}

/// A dimension named `name` whose leaves have data indexes in order.
fn dimension(name: &str, leaves: &[&str]) -> Vec<u8> {
    let mut b = Bytes::default();
    b.text(name)
        .u8(0)
        .u8(0)
        .u32(2)
        .u8(0)
        .u8(0)
        .u8(1)
        .u32(0)
        .u32(leaves.len() as u32);
    for (index, leaf) in leaves.iter().enumerate() {
        b.text(leaf)
            .bytes(b"\0\0\0\x02\0\0\0")
            .u32(index as u32)
            .u32(0);
    }
    b.0
}

/// A version 3 light table with one row dimension and one column dimension.
fn light_table(
    title: &str,
    footnotes: &[Vec<u8>],
    rows: &[u8],
    columns: &[u8],
    cells: &[(u64, Vec<u8>)],
) -> Vec<u8> {
    let mut b = Bytes::default();
    b.bytes(b"\x01\0")
        .u32(3)
        .bytes(&[1, 0, 0, 0, 1])
        .u32(0)
        .u32(36)
        .u32(72)
        .u32(36)
        .u32(120)
        .u64(0);

    b.text(title).text("Crosstabulation").u8(0x31).text(title);
    b.u8(0x58).u8(0x58);

    b.u32(footnotes.len() as u32);
    for footnote in footnotes {
        b.bytes(footnote).u8(0x58).u32(1);
    }

    b.u8(0);
    for index in 1..=8 {
        b.u8(index)
            .u8(0x31)
            .string("Sans Serif")
            .f32(12.0)
            .u32(0)
            .u8(0)
            .u32(0xffff_ffad)
            .u32(0)
            .string("#000000")
            .string("#ffffff")
            .u8(0)
            .string("")
            .string("")
            .u32(8)
            .u32(11)
            .u32(1)
            .u32(1);
    }

    b.counted(
        Bytes::default()
            .be32(1)
            .be32(1)
            .be32(0)
            .be32(1)
            .be32(0xff00_00ff)
            .u8(1)
            .bytes(&[0, 0, 0]),
    );
    b.u32(0).u32(0);

    b.u32(0)
        .string("en_US.windows-1252")
        .u32(0)
        .bytes(&[0, 0, 0])
        .u32(2000)
        .u8(b'.')
        .u8(b',')
        .u32(0)
        .u32(0);

    b.u32(2).bytes(rows).bytes(columns);
    b.u32(0).u32(1).u32(1).u32(0).u32(1);

    b.u32(cells.len() as u32);
    for (index, value) in cells {
        b.u64(*index).bytes(value);
    }
    b.0
}

fn two_by_two() -> Vec<u8> {
    let cells: Vec<_> = [10.0, 20.0, 30.0, 40.0]
        .into_iter()
        .enumerate()
        .map(|(index, x)| (index as u64, value(|b| b.number(x, &[]))))
        .collect();
    light_table(
        "Sex by Group",
        &[],
        &dimension("Sex", &["Male", "Female"]),
        &dimension("Group", &["A", "B"]),
        &cells,
    )
}

fn number_at(pt: &PivotTable, indexes: &[usize]) -> Option<f64> {
    match &pt.get(indexes)?.inner {
        ValueInner::Number(number) => number.value,
        _ => None,
    }
}

fn csv(item: &Item) -> String {
    let config = CsvConfig {
        file: PathBuf::from("unused.csv"),
        delimiter: ',',
        quote: '"',
    };
    let mut driver = CsvDriver::for_writer(Vec::new(), &config).unwrap();
    driver.write(item).unwrap();
    driver.flush().unwrap();
    String::from_utf8(driver.into_inner().unwrap()).unwrap()
}

#[test]
fn text_file_is_not_spv() {
    let text = b"Not an archive at all, just a few words of text.\n".repeat(3);
    assert!(!detect(Cursor::new(text.clone())));
    let error = SpvFile::from_reader(Cursor::new(text)).err().unwrap();
    assert!(matches!(error, Error::NotSpv));
}

#[test]
fn minimal_archive() {
    let spv = open(&[]);
    assert!(spv.root().is_heading());
    assert!(spv.root().children().is_empty());
}

#[test]
fn light_table_end_to_end() {
    let bin = two_by_two();
    let spv = open(&[
        (
            STRUCTURE,
            &structure(&light_container("Crosstabulation", "visible", "0001_lightTableData.bin"))[..],
        ),
        ("0001_lightTableData.bin", &bin[..]),
    ]);

    let heading = &spv.root().children()[0];
    assert_eq!(heading.command_name.as_deref(), Some("Crosstabs"));
    let table = &heading.children()[0];
    let pt = table.table().unwrap();
    assert!(!table.is_error());
    assert_eq!(pt.title().display(&**pt).to_string(), "Sex by Group");
    assert_eq!(number_at(pt, &[0, 0]), Some(10.0));
    assert_eq!(number_at(pt, &[0, 1]), Some(20.0));
    assert_eq!(number_at(pt, &[1, 0]), Some(30.0));
    assert_eq!(number_at(pt, &[1, 1]), Some(40.0));

    assert_eq!(
        csv(spv.root()),
        "\
Table: Sex by Group
Sex,Group,Value
Male,A,10.00
Male,B,20.00
Female,A,30.00
Female,B,40.00
"
    );
}

/// Builds version 0xb0 legacy data with one source named `tableData`.
fn legacy_data(variables: &[(&str, &[f64])]) -> Vec<u8> {
    fn name_field(name: &str, width: usize) -> Vec<u8> {
        let mut field = name.as_bytes().to_vec();
        field.resize(width, 0);
        field
    }

    let n_values = variables.first().map_or(0, |(_, values)| values.len());
    let header_len = 8 + 12 + 28 + 36 + 4;
    let mut out = vec![0, 0xb0];
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&(n_values as u32).to_le_bytes());
    out.extend_from_slice(&(variables.len() as u32).to_le_bytes());
    out.extend_from_slice(&(header_len as u32).to_le_bytes());
    out.extend(name_field("tableData", 28));
    out.extend(name_field("", 36));
    out.extend_from_slice(&0u32.to_le_bytes());
    for (name, values) in variables {
        out.extend(name_field(name, 288));
        for value in *values {
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
    out
}

const VISUALIZATION: &str = r##"<visualization name="Counts">
  <sourceVariable id="row" categorical="true" source="tableData" sourceName="row" label="Sex">
    <format><relabel from="0" to="Male"/><relabel from="1" to="Female"/></format>
  </sourceVariable>
  <sourceVariable id="col" categorical="true" source="tableData" sourceName="col" label="Group">
    <format><relabel from="0" to="A"/><relabel from="1" to="B"/></format>
  </sourceVariable>
  <sourceVariable id="cell" categorical="false" source="tableData" sourceName="cell"/>
  <graph id="g">
    <faceting>
      <cross>
        <nest><variableReference ref="col"/></nest>
        <nest><variableReference ref="row"/></nest>
      </cross>
    </faceting>
    <interval id="i"><labeling id="l" variable="cell"/></interval>
  </graph>
  <labelFrame>
    <label purpose="title"><text>Counts</text></label>
  </labelFrame>
</visualization>"##;

#[test]
fn legacy_table_end_to_end() {
    let data = legacy_data(&[
        ("row", &[0.0, 0.0, 1.0, 1.0]),
        ("col", &[0.0, 1.0, 0.0, 1.0]),
        ("cell", &[1.0, 2.0, 3.0, 4.0]),
    ]);
    let container = r#"<container visibility="visible">
      <label>Counts</label>
      <vtb:table commandName="Crosstabs" subType="Counts" tableId="2">
        <vtb:tableStructure>
          <vtb:path>0002_viz.xml</vtb:path>
          <vtb:dataPath>0002_tableData.bin</vtb:dataPath>
        </vtb:tableStructure>
      </vtb:table>
    </container>"#;
    let spv = open(&[
        (STRUCTURE, &structure(container)[..]),
        ("0002_viz.xml", VISUALIZATION.as_bytes()),
        ("0002_tableData.bin", &data[..]),
    ]);

    let table = &spv.root().children()[0].children()[0];
    let info = table.spv_info.as_ref().unwrap();
    assert_eq!(info.xml_member.as_deref(), Some("0002_viz.xml"));
    assert_eq!(info.bin_member.as_deref(), Some("0002_tableData.bin"));

    let pt = table.table().unwrap();
    assert!(!table.is_error(), "{:?}", pt.get(&[0]));
    assert_eq!(pt.dimensions.len(), 2);

    // The column dimension comes first because it is nested first.
    assert_eq!(pt.get(&[0, 0]).unwrap().display(()).to_string(), "1.00");
    assert_eq!(pt.get(&[1, 0]).unwrap().display(()).to_string(), "2.00");
    assert_eq!(pt.get(&[0, 1]).unwrap().display(()).to_string(), "3.00");
    assert_eq!(pt.get(&[1, 1]).unwrap().display(()).to_string(), "4.00");
}

#[test]
fn hidden_items() {
    let bin = two_by_two();
    let containers = format!(
        "{}\n{}",
        light_container("Shown", "visible", "0001_lightTableData.bin"),
        light_container("Hidden", "hidden", "0001_lightTableData.bin"),
    );
    let spv = open(&[
        (STRUCTURE, &structure(&containers)[..]),
        ("0001_lightTableData.bin", &bin[..]),
    ]);

    let labels = |root: &Item| -> Vec<String> {
        root.descendants()
            .map(|(_, item)| item.label().into_owned())
            .collect()
    };

    let selected = select(spv.root(), &[]);
    assert_eq!(labels(&selected), ["Crosstabs", "Shown"]);

    let everything = Criteria {
        include_hidden: true,
        ..Criteria::default()
    };
    let selected = select(spv.root(), &[everything]);
    assert_eq!(labels(&selected), ["Crosstabs", "Shown", "Hidden"]);
}

#[test]
fn footnote_forward_reference() {
    // The first footnote refers to the second, which has not been read yet
    // when the first one is decoded.
    let bin = light_table(
        "Notes",
        &[
            value(|b| b.text_with_refs("first", &[1])),
            value(|b| b.text("second")),
        ],
        &dimension("Rows", &["1"]),
        &dimension("Columns", &["x"]),
        &[(0, value(|b| b.number(1.5, &[1, 0])))],
    );
    let spv = open(&[
        (
            STRUCTURE,
            &structure(&light_container("Notes", "visible", "0003_lightTableData.bin"))[..],
        ),
        ("0003_lightTableData.bin", &bin[..]),
    ]);

    let table = &spv.root().children()[0].children()[0];
    let pt = table.table().unwrap();
    assert!(!table.is_error());
    assert_eq!(pt.footnotes.len(), 2);
    assert_eq!(pt.footnotes[0].content.footnotes(), &[1]);
    assert_eq!(pt.get(&[0, 0]).unwrap().footnotes(), &[0, 1]);
    assert_eq!(number_at(pt, &[0, 0]), Some(1.5));
}
