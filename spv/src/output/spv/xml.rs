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


//! A small XML tree, for the places where the SPV reader needs to look at a
//! document generically instead of through `serde`.
//!
//! Strict parsing is used for members of the archive.  Lenient parsing, which
//! accepts unclosed and mismatched tags the way web browsers do, is used for
//! the HTML embedded in text items.

use std::{
    borrow::Cow,
    fmt::{Display, Formatter, Result as FmtResult},
};

use displaydoc::Display;
use quick_xml::{
    escape::{partial_escape, resolve_predefined_entity, unescape, unescape_with},
    events::{BytesStart, Event},
    Reader,
};
use thiserror::Error as ThisError;

#[derive(Clone, Debug, Display, ThisError, PartialEq, Eq)]
pub enum Error {
    /// XML syntax error at offset {offset}: {message}
    Syntax { offset: u64, message: String },

    /// document has no root element
    NoRoot,

    /// document ends inside element "{0}"
    Unclosed(String),

    /// root node is "{actual}" but "{expected}" was expected
    WrongRoot { actual: String, expected: String },
}

/// A node in an [Element]'s content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An XML element.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Element {
    /// The element's qualified name, e.g. `vtb:table`.
    pub name: String,

    /// Attributes in document order, with their qualified names and unescaped
    /// values.
    pub attributes: Vec<(String, String)>,

    pub children: Vec<Node>,
}

fn local_part(name: &str) -> &str {
    match name.rsplit_once(':') {
        Some((_, local)) => local,
        None => name,
    }
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parses `xml` as a well-formed XML document and returns its root
    /// element.
    pub fn parse(xml: &str) -> Result<Self, Error> {
        let mut root = Builder::new(false).build(xml)?;
        root.children
            .into_iter()
            .find_map(|node| match node {
                Node::Element(element) => Some(element),
                Node::Text(_) => None,
            })
            .ok_or(Error::NoRoot)
    }

    /// Like [Element::parse], but also requires the root element's local name
    /// to be `expected`.
    pub fn parse_with_root(xml: &str, expected: &str) -> Result<Self, Error> {
        let root = Self::parse(xml)?;
        if root.local_name() != expected {
            return Err(Error::WrongRoot {
                actual: root.local_name().into(),
                expected: expected.into(),
            });
        }
        Ok(root)
    }

    /// Parses `html` tolerantly.  The return value is an unnamed element that
    /// contains everything in the document.
    pub fn parse_html(html: &str) -> Self {
        // The lenient builder never fails.
        Builder::new(true).build(html).unwrap_or_default()
    }

    /// The element's name without any namespace prefix.
    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    /// Returns the value of the attribute with the given local name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| local_part(key) == name)
            .map(|(_, value)| value.as_str())
    }

    /// The child elements.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|child| match child {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    /// Returns the first child element with the given local name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|element| element.local_name() == name)
    }

    /// Returns the concatenated text of this element and its descendants.
    pub fn text(&self) -> String {
        fn inner(element: &Element, s: &mut String) {
            for child in &element.children {
                match child {
                    Node::Element(element) => inner(element, s),
                    Node::Text(text) => s.push_str(text),
                }
            }
        }
        let mut s = String::new();
        inner(self, &mut s);
        s
    }

    fn matches(&self, step: &str) -> bool {
        step == "*" || self.local_name() == local_part(step)
    }

    fn push_descendants<'a>(&'a self, step: &str, output: &mut Vec<&'a Element>) {
        if self.matches(step) {
            output.push(self);
        }
        for child in self.elements() {
            child.push_descendants(step, output);
        }
    }

    /// Returns the elements that `path` selects, in document order.
    ///
    /// `path` is a list of element names separated by `/`, matched against
    /// local names and starting from this element's children, e.g.
    /// `graph/labeling`.  `*` matches any element.  A leading `/` makes the
    /// first name match this element itself, and a leading `//` makes it match
    /// this element or any of its descendants.
    pub fn select<'a>(&'a self, path: &str) -> Vec<&'a Element> {
        let (mut current, rest) = if let Some(rest) = path.strip_prefix("//") {
            let (first, rest) = rest.split_once('/').unwrap_or((rest, ""));
            let mut current = Vec::new();
            self.push_descendants(first, &mut current);
            (current, rest)
        } else if let Some(rest) = path.strip_prefix('/') {
            let (first, rest) = rest.split_once('/').unwrap_or((rest, ""));
            let current = if self.matches(first) {
                vec![self]
            } else {
                Vec::new()
            };
            (current, rest)
        } else {
            (vec![self], path)
        };

        for step in rest.split('/').filter(|step| !step.is_empty() && *step != ".") {
            current = current
                .into_iter()
                .flat_map(|element| element.elements().filter(|child| child.matches(step)))
                .collect();
        }
        current
    }
}

impl Display for Element {
    /// Serializes the element as compact XML.
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "<{}", self.name)?;
        for (key, value) in &self.attributes {
            write!(f, " {key}=\"{}\"", escape_attribute(value))?;
        }
        if self.children.is_empty() {
            return write!(f, "/>");
        }
        write!(f, ">")?;
        for child in &self.children {
            match child {
                Node::Element(element) => write!(f, "{element}")?,
                Node::Text(text) => write!(f, "{}", partial_escape(text))?,
            }
        }
        write!(f, "</{}>", self.name)
    }
}

fn escape_attribute(s: &str) -> Cow<'_, str> {
    if !s.contains(['&', '<', '>', '"', '\n']) {
        return Cow::from(s);
    }
    let mut escaped = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\n' => escaped.push_str("&#10;"),
            c => escaped.push(c),
        }
    }
    Cow::from(escaped)
}

/// Elements that never have content in HTML, whether or not they are written
/// as empty elements.
const HTML_VOID_ELEMENTS: [&str; 12] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "wbr",
];

fn resolve_html_entity(entity: &str) -> Option<&'static str> {
    match entity {
        "nbsp" => Some("\u{a0}"),
        "copy" => Some("\u{a9}"),
        "reg" => Some("\u{ae}"),
        "deg" => Some("\u{b0}"),
        "plusmn" => Some("\u{b1}"),
        "middot" => Some("\u{b7}"),
        "times" => Some("\u{d7}"),
        "divide" => Some("\u{f7}"),
        "ndash" => Some("\u{2013}"),
        "mdash" => Some("\u{2014}"),
        "lsquo" => Some("\u{2018}"),
        "rsquo" => Some("\u{2019}"),
        "ldquo" => Some("\u{201c}"),
        "rdquo" => Some("\u{201d}"),
        "hellip" => Some("\u{2026}"),
        "le" => Some("\u{2264}"),
        "ge" => Some("\u{2265}"),
        "ne" => Some("\u{2260}"),
        _ => resolve_predefined_entity(entity),
    }
}

struct Builder {
    html: bool,

    /// Elements that have been started but not ended.  The first element is
    /// an unnamed placeholder for the document itself.
    stack: Vec<Element>,
}

impl Builder {
    fn new(html: bool) -> Self {
        Self {
            html,
            stack: vec![Element::default()],
        }
    }

    fn unescape<'a>(&self, raw: &'a str) -> Result<Cow<'a, str>, String> {
        if self.html {
            Ok(unescape_with(raw, resolve_html_entity).unwrap_or(Cow::from(raw)))
        } else {
            unescape(raw).map_err(|error| error.to_string())
        }
    }

    fn start_element(&self, start: &BytesStart) -> Result<Element, String> {
        let mut name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        if self.html {
            name.make_ascii_lowercase();
        }

        let mut attributes = Vec::new();
        let iter = if self.html {
            start.html_attributes()
        } else {
            start.attributes()
        };
        for attribute in iter {
            let attribute = match attribute {
                Ok(attribute) => attribute,
                Err(_) if self.html => continue,
                Err(error) => return Err(error.to_string()),
            };
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let raw = String::from_utf8_lossy(&attribute.value);
            let value = self.unescape(&raw)?.into_owned();
            attributes.push((key, value));
        }
        Ok(Element {
            name,
            attributes,
            children: Vec::new(),
        })
    }

    fn top(&mut self) -> &mut Element {
        // The placeholder for the document is never popped.
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let top = self.top();
        if let Some(Node::Text(last)) = top.children.last_mut() {
            last.push_str(text);
        } else {
            top.children.push(Node::Text(text.into()));
        }
    }

    fn close_to(&mut self, depth: usize) {
        while self.stack.len() > depth.max(1) {
            if let Some(element) = self.stack.pop() {
                self.top().children.push(Node::Element(element));
            }
        }
    }

    fn end_element(&mut self, name: &[u8]) {
        if !self.html {
            self.close_to(self.stack.len() - 1);
            return;
        }
        let name = String::from_utf8_lossy(name).to_ascii_lowercase();
        if let Some(depth) = self
            .stack
            .iter()
            .skip(1)
            .rposition(|element| element.name == name)
        {
            self.close_to(depth + 1);
        }
    }

    fn build(mut self, xml: &str) -> Result<Element, Error> {
        let mut reader = Reader::from_str(xml);
        let config = reader.config_mut();
        config.trim_text(false);
        if self.html {
            config.check_end_names = false;
            config.allow_unmatched_ends = true;
        }

        loop {
            let offset = reader.buffer_position() as u64;
            let syntax_error = |message: String| Error::Syntax { offset, message };
            let event = match reader.read_event() {
                Ok(event) => event,
                Err(_) if self.html => break,
                Err(error) => return Err(syntax_error(error.to_string())),
            };
            match event {
                Event::Start(start) => {
                    let element = match self.start_element(&start) {
                        Ok(element) => element,
                        Err(message) => return Err(syntax_error(message)),
                    };
                    if self.html && HTML_VOID_ELEMENTS.contains(&element.name.as_str()) {
                        self.top().children.push(Node::Element(element));
                    } else {
                        self.stack.push(element);
                    }
                }
                Event::Empty(start) => {
                    let element = match self.start_element(&start) {
                        Ok(element) => element,
                        Err(message) => return Err(syntax_error(message)),
                    };
                    self.top().children.push(Node::Element(element));
                }
                Event::End(end) => self.end_element(end.name().as_ref()),
                Event::Text(text) => {
                    let raw = String::from_utf8_lossy(&text);
                    let text = match self.unescape(&raw) {
                        Ok(text) => text.into_owned(),
                        Err(message) => return Err(syntax_error(message)),
                    };
                    self.push_text(&text);
                }
                Event::CData(cdata) => self.push_text(&String::from_utf8_lossy(&cdata)),
                Event::Eof => break,
                _ => (),
            }
        }

        if !self.html && self.stack.len() > 1 {
            return Err(Error::Unclosed(self.top().name.clone()));
        }
        self.close_to(1);
        Ok(self.stack.pop().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::{Element, Error, Node};

    const STRUCTURE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<heading xmlns="http://xml.spss.com/spss/viewer/viewer-tree" xmlns:vtb="http://xml.spss.com/spss/viewer/viewer-table"><label>Output</label><container visibility="visible"><label>Statistics</label><vtb:table commandName="Frequencies" subType="Statistics"><vtb:tableStructure><vtb:dataPath>0000_lightTableData.bin</vtb:dataPath></vtb:tableStructure></vtb:table></container></heading>"#;

    #[test]
    fn parse_and_query() {
        let root = Element::parse_with_root(STRUCTURE, "heading").unwrap();
        assert_eq!(root.child("label").unwrap().text(), "Output");

        let tables = root.select("container/table");
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "vtb:table");
        assert_eq!(tables[0].attr("commandName"), Some("Frequencies"));

        let data_paths = root.select("//dataPath");
        assert_eq!(data_paths.len(), 1);
        assert_eq!(data_paths[0].text(), "0000_lightTableData.bin");

        assert_eq!(root.select("/heading/*").len(), 2);
        assert!(root.select("/container").is_empty());
        assert_eq!(root.select("").len(), 1);
    }

    #[test]
    fn wrong_root() {
        assert_eq!(
            Element::parse_with_root("<visualization/>", "heading"),
            Err(Error::WrongRoot {
                actual: "visualization".into(),
                expected: "heading".into()
            })
        );
    }

    #[test]
    fn malformed() {
        assert!(matches!(
            Element::parse("<a><b></a>"),
            Err(Error::Syntax { .. })
        ));
        assert!(matches!(
            Element::parse("<a><b>"),
            Err(Error::Unclosed(_) | Error::Syntax { .. })
        ));
        assert_eq!(Element::parse("just text"), Err(Error::NoRoot));
    }

    #[test]
    fn serialize() {
        let root = Element::parse(r#"<a x="1 &quot;2&quot;"><b/>x &lt; y<c>z</c></a>"#).unwrap();
        assert_eq!(root.to_string(), r#"<a x="1 &quot;2&quot;"><b/>x &lt; y<c>z</c></a>"#);
    }

    #[test]
    fn lenient_html() {
        let html = Element::parse_html(
            "<html><head><style>p{color:red}</style></head><BODY><p>a&nbsp;b<br>c<b>bold</p><p nowrap>d</i></p></body></html>",
        );
        let body = &html.select("html/body")[0];
        let paragraphs = body.select("p");
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(paragraphs[0].text(), "a\u{a0}bcbold");
        assert!(matches!(&paragraphs[0].children[1], Node::Element(br) if br.name == "br"));
        assert_eq!(paragraphs[1].attr("nowrap"), Some(""));
        assert_eq!(paragraphs[1].text(), "d");
    }
}
