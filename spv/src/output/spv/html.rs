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


//! Text extraction from the HTML that SPV files embed in text items and page
//! headings.
//!
//! The HTML is converted into Pango-style markup: `b`, `i`, and `u` pass
//! through, `font` becomes `span`, and everything else contributes only its
//! text.

use std::str::FromStr;

use crate::output::{
    page::Paragraph,
    pivot::{look_xml::Dimension as Length, Color, FontStyle, HorzAlign},
};

use super::xml::{Element, Node};

/// Relative sizes for HTML `<font size=N>`, for `N` from 1 to 7.
const FONT_SCALE: [f64; 7] = [0.444, 0.556, 0.667, 0.778, 1.0, 1.33, 2.0];

/// Whitespace as HTML (and C) defines it.
fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\x0b' | '\x0c' | '\r')
}

/// Converts `html` into markup.  Returns the markup along with the base font
/// style that the document's style sheet specifies.
pub fn decode_html(html: &str) -> (String, FontStyle) {
    let mut font_style = FontStyle {
        size: 10,
        ..FontStyle::default()
    };

    let document = Element::parse_html(html);
    let root = document.child("html").unwrap_or(&document);
    if let Some(style) = root.select("head/style").first() {
        parse_css_style(&style.text(), &mut font_style);
    }

    let mut markup = String::new();
    extract_text(root, font_style.size, &mut markup);
    font_style.markup = true;
    (markup, font_style)
}

/// Appends the markup for `element` to `s`.  `base_size` is the base font
/// size in points, which `<font size=N>` scales.
pub fn extract_text(element: &Element, base_size: i32, s: &mut String) {
    match element.name.as_str() {
        "br" => s.push('\n'),
        "style" => (),
        name => {
            let tag = match name {
                "b" | "i" | "u" => {
                    s.push_str(&format!("<{name}>"));
                    Some(name)
                }
                "font" => {
                    s.push_str("<span");
                    put_attr(s, "face", element.attr("face"));
                    if let Some(color) = element.attr("color") {
                        if color.starts_with('#') {
                            put_attr(s, "color", Some(color));
                        } else if let Some(color) = parse_rgb(color) {
                            put_attr(s, "color", Some(&color.display_css().to_string()));
                        }
                    }
                    let html_size = element
                        .attr("size")
                        .and_then(|size| size.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if (1..=7).contains(&html_size) {
                        let size = base_size as f64 * FONT_SCALE[html_size - 1] * 1024.0;
                        put_attr(s, "size", Some(&format!("{size:.0}")));
                    }
                    s.push('>');
                    Some("span")
                }
                _ => None,
            };
            for child in &element.children {
                match child {
                    Node::Element(child) => extract_text(child, base_size, s),
                    Node::Text(text) => put_text(s, text),
                }
            }
            if let Some(tag) = tag {
                s.push_str(&format!("</{tag}>"));
            }
        }
    }
}

fn put_text(s: &mut String, text: &str) {
    for c in text.chars() {
        let c = match c {
            '\u{a0}' | '\u{2007}' => ' ',
            c => c,
        };
        match c {
            c if is_space(c) => {
                if s.chars().next_back().is_some_and(|last| !is_space(last)) {
                    s.push(c);
                }
            }
            '<' => s.push_str("&lt;"),
            '>' => s.push_str("&gt;"),
            '&' => s.push_str("&amp;"),
            c => s.push(c),
        }
    }
}

fn put_attr(s: &mut String, name: &str, value: Option<&str>) {
    let Some(value) = value else {
        return;
    };
    s.push_str(&format!(" {name}=\""));
    for c in value.chars() {
        match c {
            '\n' => s.push_str("&#10;"),
            '&' => s.push_str("&amp;"),
            '<' => s.push_str("&lt;"),
            '>' => s.push_str("&gt;"),
            '"' => s.push_str("&quot;"),
            c => s.push(c),
        }
    }
    s.push('"');
}

/// Parses `rgb (r, g, b)`.
fn parse_rgb(s: &str) -> Option<Color> {
    let inner = s
        .trim()
        .strip_prefix("rgb")?
        .trim_start()
        .strip_prefix('(')?
        .split_once(')')?
        .0;
    let mut components = inner.split(',').map(|c| c.trim().parse::<u8>());
    let (Some(Ok(r)), Some(Ok(g)), Some(Ok(b))) =
        (components.next(), components.next(), components.next())
    else {
        return None;
    };
    Some(Color::new(r, g, b))
}

/// Updates `font_style` from the declarations in the CSS style sheet `css`.
/// Selectors are ignored, so the last declaration of each property wins.
pub fn parse_css_style(css: &str, font_style: &mut FontStyle) {
    let declarations = css
        .split(['{', '}'])
        .flat_map(|block| block.split(';'))
        .filter_map(|declaration| declaration.split_once(':'));
    for (property, value) in declarations {
        let property = property.trim().to_ascii_lowercase();
        let value = value.trim();
        match property.as_str() {
            "font-family" => {
                font_style.font = value.trim_matches(['"', '\'']).into();
            }
            "font-size" => {
                if let Ok(size) = Length::from_str(value) {
                    font_style.size = size.as_pt_i32();
                }
            }
            "font-weight" => font_style.bold = value.eq_ignore_ascii_case("bold"),
            "font-style" => font_style.italic = value.eq_ignore_ascii_case("italic"),
            "text-decoration" => {
                font_style.underline = value.eq_ignore_ascii_case("underline");
            }
            "color" => {
                if let Ok(color) = Color::from_str(value) {
                    font_style.fg[0] = color;
                }
            }
            _ => (),
        }
    }
}

/// Decodes the paragraphs in the HTML body of a page header or footer.
pub fn decode_page_paragraphs(html: &str) -> Vec<Paragraph> {
    let document = Element::parse_html(html);
    let Some(body) = document
        .select("html/body")
        .into_iter()
        .chain(document.select("body"))
        .next()
    else {
        return Vec::new();
    };
    body.elements()
        .filter(|element| element.name == "p")
        .map(|p| {
            let style = p.attr("style").unwrap_or_default();
            let horz_align = if style.contains("center") {
                HorzAlign::Center
            } else if style.contains("right") {
                HorzAlign::Right
            } else {
                HorzAlign::Left
            };
            let mut markup = String::new();
            extract_text(p, 10, &mut markup);
            Paragraph { markup, horz_align }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::output::pivot::{Color, FontStyle, HorzAlign};

    use super::{decode_html, decode_page_paragraphs, parse_css_style};

    #[test]
    fn text_item() {
        let (markup, font_style) = decode_html(
            r#"<html><head><style type="text/css">p{color:0;font-family:Monospaced;font-size:13pt;font-style:normal;font-weight:normal;text-decoration:none}</style></head><body><p>DESCRIPTIVES&nbsp;&nbsp;x<br>  /STATISTICS=MEAN   STDDEV.</p></body></html>"#,
        );
        assert_eq!(markup, "DESCRIPTIVES x\n/STATISTICS=MEAN STDDEV.");
        assert!(font_style.markup);
        assert_eq!(font_style.font, "Monospaced");
        assert_eq!(font_style.size, 13);
        assert!(!font_style.bold);
    }

    #[test]
    fn formatting() {
        let (markup, _) = decode_html(
            r#"<html><body><b>Bold</b> <i>it</i> <font face="Serif" color="rgb(255, 0, 16)" size="5">big &amp; red</font> a&lt;b</body></html>"#,
        );
        assert_eq!(
            markup,
            r##"<b>Bold</b> <i>it</i> <span face="Serif" color="#ff0010" size="10240">big &amp; red</span> a&lt;b"##
        );
    }

    #[test]
    fn malformed() {
        let (markup, _) = decode_html("<html><body><b>unclosed <u>nested</b> text");
        assert_eq!(markup, "<b>unclosed <u>nested</u></b> text");
    }

    #[test]
    fn css() {
        let mut font_style = FontStyle::default();
        parse_css_style(
            "p { font-family: 'Times New Roman'; font-weight: bold; color: #102030 }",
            &mut font_style,
        );
        assert_eq!(font_style.font, "Times New Roman");
        assert!(font_style.bold);
        assert_eq!(font_style.fg[0], Color::new(0x10, 0x20, 0x30));
    }

    #[test]
    fn page_paragraphs() {
        let paragraphs = decode_page_paragraphs(
            r#"<html><body><p style="text-align:center; margin-top: 0">Page &[Page]</p><p>left</p></body></html>"#,
        );
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(paragraphs[0].horz_align, HorzAlign::Center);
        assert_eq!(paragraphs[0].markup, "Page &amp;[Page]");
        assert_eq!(paragraphs[1].horz_align, HorzAlign::Left);
    }
}
