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

use crate::{
    format::Format,
    output::pivot::{Axis3, Category, ValueInner},
};

use super::{
    decode::{decode, Warning},
    parse, Error, Version,
};

/// Builds light table bytes.
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

    /// Version 3 value modifiers that refer to `refs`.
    fn refs(&mut self, refs: &[u16]) -> &mut Self {
        self.u8(0x31).u32(refs.len() as u32);
        for r in refs {
            self.u16(*r);
        }
        // No subscripts, empty template string, no styles.
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

    fn number(&mut self, x: f64, format: u32) -> &mut Self {
        self.u8(1).u8(0x58).u32(format).f64(x)
    }

    fn number_with_refs(&mut self, x: f64, refs: &[u16]) -> &mut Self {
        self.u8(1).refs(refs).u32(F8_2).f64(x)
    }
}

const F8_2: u32 = (5 << 16) | (8 << 8) | 2;

struct TestTable {
    version: u32,
    footnotes: Vec<Vec<u8>>,
    dimensions: Vec<Vec<u8>>,
    layers: Vec<u32>,
    rows: Vec<u32>,
    columns: Vec<u32>,
    cells: Vec<(u64, Vec<u8>)>,
}

impl Default for TestTable {
    fn default() -> Self {
        Self {
            version: 3,
            footnotes: Vec::new(),
            dimensions: Vec::new(),
            layers: Vec::new(),
            rows: Vec::new(),
            columns: Vec::new(),
            cells: Vec::new(),
        }
    }
}

/// A dimension named `name` whose leaves have data indexes in order.
fn dimension(name: &str, leaves: &[&str]) -> Vec<u8> {
    let mut b = Bytes::default();
    dimension_header(&mut b, name, leaves.len());
    for (index, leaf) in leaves.iter().enumerate() {
        b.text(leaf);
        leaf_child(&mut b, index as u32);
    }
    b.0
}

fn dimension_header(b: &mut Bytes, name: &str, n_categories: usize) {
    b.text(name)
        .u8(0)
        .u8(0)
        .u32(2)
        .u8(0)
        .u8(0)
        .u8(1)
        .u32(0)
        .u32(n_categories as u32);
}

fn leaf_child(b: &mut Bytes, leaf_index: u32) {
    b.bytes(b"\0\0\0\x02\0\0\0").u32(leaf_index).u32(0);
}

fn group_child(b: &mut Bytes, merge: bool, n_subcategories: u32) {
    b.u8(merge as u8)
        .bytes(b"\0\x01")
        .u32(0)
        .u32(0xffff_ffff)
        .u32(n_subcategories);
}

impl TestTable {
    fn build(&self) -> Vec<u8> {
        let v3 = self.version == 3;
        let mut b = Bytes::default();

        // Header.
        b.bytes(b"\x01\0")
            .u32(self.version)
            .bytes(&[1, 0, 0, 0, 1])
            .u32(0)
            .u32(36)
            .u32(72)
            .u32(36)
            .u32(120)
            .u64(0);

        // Titles.
        b.text("Title").text("Subtype").u8(0x31).text("User Title");
        b.u8(0x58).u8(0x58);

        // Footnotes.
        b.u32(self.footnotes.len() as u32);
        for footnote in &self.footnotes {
            b.bytes(footnote).u8(0x58).u32(1);
        }

        // Areas.
        b.u8(0);
        for index in 1..=8 {
            b.u8(index)
                .u8(0x31)
                .string("Sans Serif")
                .f32(12.0)
                .u32(if index == 1 { 1 } else { 0 })
                .u8(0)
                .u32(0xffff_ffad)
                .u32(0)
                .string("#000000")
                .string("#ffffff")
                .u8(0)
                .string("")
                .string("");
            if v3 {
                b.u32(8).u32(11).u32(1).u32(1);
            }
        }

        // Borders.
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

        // No print settings or table settings.
        b.u32(0).u32(0);

        // Formats.
        b.u32(0)
            .string("en_US.windows-1252")
            .u32(0)
            .bytes(&[0, 0, 0])
            .u32(2000)
            .u8(b'.')
            .u8(b',')
            .u32(0)
            .u32(0);

        b.u32(self.dimensions.len() as u32);
        for dimension in &self.dimensions {
            b.bytes(dimension);
        }

        b.u32(self.layers.len() as u32)
            .u32(self.rows.len() as u32)
            .u32(self.columns.len() as u32);
        for index in self.layers.iter().chain(&self.rows).chain(&self.columns) {
            b.u32(*index);
        }

        b.u32(self.cells.len() as u32);
        for (index, value) in &self.cells {
            b.u64(*index).bytes(value);
        }
        b.0
    }
}

fn value(f: impl FnOnce(&mut Bytes) -> &mut Bytes) -> Vec<u8> {
    let mut b = Bytes::default();
    f(&mut b);
    b.0
}

fn two_by_two() -> TestTable {
    TestTable {
        dimensions: vec![
            dimension("Rows", &["1", "2"]),
            dimension("Columns", &["A", "B"]),
        ],
        rows: vec![0],
        columns: vec![1],
        cells: [10.0, 20.0, 30.0, 40.0]
            .into_iter()
            .enumerate()
            .map(|(index, x)| (index as u64, value(|b| b.number(x, F8_2))))
            .collect(),
        ..TestTable::default()
    }
}

fn number_at(pt: &crate::output::pivot::PivotTable, indexes: &[usize]) -> Option<f64> {
    match &pt.get(indexes)?.inner {
        ValueInner::Number(number) => number.value,
        _ => None,
    }
}

#[test]
fn two_by_two_table() {
    let bytes = two_by_two().build();
    let table = parse(&bytes).unwrap();
    assert_eq!(table.version(), Version::V3);
    assert_eq!(table.dimensions.dimensions.len(), 2);

    let mut warnings = Vec::new();
    let pt = decode(&table, |w| warnings.push(w)).unwrap();
    assert!(warnings.is_empty());

    assert_eq!(pt.title().display(&pt).to_string(), "User Title");
    assert_eq!(pt.subtype().display(&pt).to_string(), "Subtype");
    assert_eq!(pt.axes[Axis3::Y].dimensions, vec![0]);
    assert_eq!(pt.axes[Axis3::X].dimensions, vec![1]);
    assert_eq!(number_at(&pt, &[0, 0]), Some(10.0));
    assert_eq!(number_at(&pt, &[0, 1]), Some(20.0));
    assert_eq!(number_at(&pt, &[1, 0]), Some(30.0));
    assert_eq!(number_at(&pt, &[1, 1]), Some(40.0));
    match &pt.get(&[1, 1]).unwrap().inner {
        ValueInner::Number(number) => assert_eq!(number.format, Some(Format::F8_2)),
        other => panic!("{other:?}"),
    }

    let look = &pt.look;
    assert!(look.areas[crate::output::pivot::Area::Title].font_style.bold);
    assert_eq!(look.heading_widths[crate::output::pivot::HeadingRegion::Rows], 36..=120);
    assert_eq!(pt.settings.epoch.0, 2000);
    assert_eq!(pt.grouping, Some(','));
    assert!(pt.show_grid_lines);
}

#[test]
fn version_1_table() {
    let mut table = two_by_two();
    table.version = 1;
    let bytes = table.build();
    let table = parse(&bytes).unwrap();
    assert_eq!(table.version(), Version::V1);
    let pt = decode(&table, |_| ()).unwrap();
    assert_eq!(number_at(&pt, &[1, 0]), Some(30.0));
}

#[test]
fn layers() {
    let table = TestTable {
        dimensions: vec![
            dimension("Layer", &["x", "y", "z"]),
            dimension("Rows", &["1"]),
        ],
        layers: vec![0],
        rows: vec![1],
        cells: vec![(2, value(|b| b.text("cell")))],
        ..TestTable::default()
    };
    let pt = decode(&parse(&table.build()).unwrap(), |_| ()).unwrap();
    assert_eq!(pt.current_layer, vec![0]);
    assert_eq!(
        pt.get(&[2, 0]).unwrap().display(&pt).to_string(),
        "cell"
    );
}

#[test]
fn empty_input() {
    assert!(matches!(parse(&[]), Err(Error::Empty)));
}

#[test]
fn unknown_version() {
    let mut bytes = two_by_two().build();
    bytes[2] = 2;
    assert!(matches!(parse(&bytes), Err(Error::UnknownVersion(2))));
}

#[test]
fn trailing_garbage() {
    let mut bytes = two_by_two().build();

    // One trailing `01` is allowed.
    bytes.push(1);
    assert!(parse(&bytes).is_ok());

    bytes.push(7);
    assert!(matches!(parse(&bytes), Err(Error::ExpectedEnd(_))));
}

#[test]
fn truncated() {
    let bytes = two_by_two().build();
    assert!(matches!(
        parse(&bytes[..bytes.len() - 3]),
        Err(Error::BinError(_))
    ));
}

#[test]
fn footnote_forward_reference() {
    let table = TestTable {
        // The first footnote refers to the second.
        footnotes: vec![
            value(|b| b.text_with_refs("first", &[1])),
            value(|b| b.text("second")),
        ],
        dimensions: vec![dimension("Rows", &["1"])],
        rows: vec![0],
        cells: vec![(0, value(|b| b.number_with_refs(1.5, &[1, 0])))],
        ..TestTable::default()
    };
    let pt = decode(&parse(&table.build()).unwrap(), |_| ()).unwrap();
    assert_eq!(pt.footnotes.len(), 2);
    assert_eq!(pt.footnotes[0].content.footnotes(), &[1]);
    assert!(pt.footnotes[1].show);

    // References are sorted.
    assert_eq!(pt.get(&[0]).unwrap().footnotes(), &[0, 1]);
}

#[test]
fn bad_footnote_index() {
    let table = TestTable {
        footnotes: vec![value(|b| b.text("only"))],
        dimensions: vec![dimension("Rows", &["1"])],
        rows: vec![0],
        cells: vec![(0, value(|b| b.number_with_refs(1.5, &[3])))],
        ..TestTable::default()
    };
    let error = decode(&parse(&table.build()).unwrap(), |_| ()).unwrap_err();
    assert_eq!(error.to_string(), "bad footnote index: 3 >= 1");
}

#[test]
fn bad_axis_sum() {
    let mut table = two_by_two();
    table.columns.clear();
    let error = decode(&parse(&table.build()).unwrap(), |_| ()).unwrap_err();
    assert!(matches!(error, Error::BadAxisSum { .. }));
}

#[test]
fn duplicate_dimension() {
    let mut table = two_by_two();
    table.columns = vec![0];
    let error = decode(&parse(&table.build()).unwrap(), |_| ()).unwrap_err();
    assert!(matches!(error, Error::DuplicateDimension(0)));
}

#[test]
fn bad_cell_index() {
    let mut table = two_by_two();
    table.cells.push((4, value(|b| b.number(50.0, F8_2))));
    let error = decode(&parse(&table.build()).unwrap(), |_| ()).unwrap_err();
    assert_eq!(error.to_string(), "out of range cell data index 4");
}

#[test]
fn cell_in_empty_dimension() {
    let table = TestTable {
        dimensions: vec![dimension("Rows", &["1", "2"]), dimension("Columns", &[])],
        rows: vec![0],
        columns: vec![1],
        cells: vec![(0, value(|b| b.number(1.0, F8_2)))],
        ..TestTable::default()
    };
    let error = decode(&parse(&table.build()).unwrap(), |_| ()).unwrap_err();
    assert_eq!(error.to_string(), "out of range cell data index 0");
}

#[test]
fn bad_format_warns() {
    let table = TestTable {
        dimensions: vec![dimension("Rows", &["1"])],
        rows: vec![0],
        // Type 1 is a string format, which numbers cannot use.
        cells: vec![(0, value(|b| b.number(2.0, (1 << 16) | (8 << 8))))],
        ..TestTable::default()
    };
    let mut warnings = Vec::new();
    let pt = decode(&parse(&table.build()).unwrap(), |w| warnings.push(w)).unwrap();
    assert_eq!(warnings, vec![Warning::BadFormat(0x10800)]);
    match &pt.get(&[0]).unwrap().inner {
        ValueInner::Number(number) => assert_eq!(number.format, Some(Format::F40_2)),
        other => panic!("{other:?}"),
    }
}

#[test]
fn groups() {
    // Dimension "Rows" with a visible group "G" containing "a" and "b", then
    // a merged group whose child "c" moves up to the root.
    let mut b = Bytes::default();
    dimension_header(&mut b, "Rows", 2);
    b.text("G");
    group_child(&mut b, false, 2);
    b.text("a");
    leaf_child(&mut b, 1);
    b.text("b");
    leaf_child(&mut b, 0);
    b.text("merged");
    group_child(&mut b, true, 1);
    b.text("c");
    leaf_child(&mut b, 2);

    let table = TestTable {
        dimensions: vec![b.0],
        rows: vec![0],
        ..TestTable::default()
    };
    let pt = decode(&parse(&table.build()).unwrap(), |_| ()).unwrap();
    let dimension = &pt.dimensions[0];
    assert_eq!(dimension.len(), 3);
    assert_eq!(dimension.presentation_order, vec![1, 0, 2]);
    assert!(dimension.root.show_label);
    assert_eq!(dimension.root.children.len(), 2);
    match &dimension.root.children[0] {
        Category::Group(group) => {
            assert!(group.show_label);
            assert_eq!(group.name().display(&pt).to_string(), "G");
        }
        other => panic!("{other:?}"),
    }
    assert_eq!(
        dimension.data_leaf(2).unwrap().name().display(&pt).to_string(),
        "c"
    );
}

#[test]
fn duplicate_leaf_index() {
    let mut b = Bytes::default();
    dimension_header(&mut b, "Rows", 2);
    b.text("a");
    leaf_child(&mut b, 0);
    b.text("b");
    leaf_child(&mut b, 0);
    let table = TestTable {
        dimensions: vec![b.0],
        rows: vec![0],
        ..TestTable::default()
    };
    let error = decode(&parse(&table.build()).unwrap(), |_| ()).unwrap_err();
    assert!(matches!(error, Error::DuplicateLeafIndex(0)));
}
