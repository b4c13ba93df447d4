// SPDX-License-Identifier: GPL-3.0-only

//! Reading and writing `monitors.xml`.

use std::{fmt::Write, rc::Rc};

use cosmic_monitors_config::{Configuration, OutputIntent, OutputKey, Rotation, Transform};
use quick_xml::{
    escape::escape,
    events::{BytesStart, Event},
    Reader,
};
use thiserror::Error;

use super::store::ConfigurationStore;

const VERSION: &str = "1";
const MAX_INT: i64 = i16::MAX as i64;

#[derive(Debug, Error)]
#[error("{kind} (at byte {position})")]
pub struct ParseError {
    pub position: usize,
    pub kind: ParseErrorKind,
}

#[derive(Debug, Error)]
pub enum ParseErrorKind {
    #[error(transparent)]
    Xml(#[from] quick_xml::Error),
    #[error("Invalid document element {0}")]
    InvalidDocumentElement(String),
    #[error("Missing attribute {attribute} on element {element}")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },
    #[error("Invalid or unsupported version {0}")]
    UnsupportedVersion(String),
    #[error("Invalid toplevel element {0}")]
    InvalidToplevelElement(String),
    #[error("Unexpected element {0}")]
    UnexpectedElement(String),
    #[error("Unexpected content at this point")]
    UnexpectedContent,
    #[error("Expected a number, got {0}")]
    InvalidNumber(String),
    #[error("Invalid boolean value {0}")]
    InvalidBool(String),
    #[error("Invalid rotation type {0}")]
    InvalidRotation(String),
    #[error("Y reflection is not supported")]
    ReflectY,
    #[error("Document ended unexpectedly")]
    UnexpectedEof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Vendor,
    Product,
    Serial,
    Width,
    Height,
    Rate,
    X,
    Y,
    Rotation,
    ReflectX,
    ReflectY,
    Primary,
    Presentation,
    Underscanning,
}

impl Field {
    fn from_name(name: &[u8]) -> Option<Field> {
        Some(match name {
            b"vendor" => Field::Vendor,
            b"product" => Field::Product,
            b"serial" => Field::Serial,
            b"width" => Field::Width,
            b"height" => Field::Height,
            b"rate" => Field::Rate,
            b"x" => Field::X,
            b"y" => Field::Y,
            b"rotation" => Field::Rotation,
            b"reflect_x" => Field::ReflectX,
            b"reflect_y" => Field::ReflectY,
            b"primary" => Field::Primary,
            b"presentation" => Field::Presentation,
            b"underscanning" => Field::Underscanning,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Initial,
    Monitors,
    Configuration,
    Output,
    OutputField(Field),
    Clone,
}

#[derive(Debug, Default)]
struct PendingOutput {
    connector: String,
    vendor: Option<String>,
    product: Option<String>,
    serial: Option<String>,
    intent: OutputIntent,
    rotation: Option<Rotation>,
    reflect_x: bool,
}

impl PendingOutput {
    /// `None` for outputs that were disconnected when the file was written.
    fn finish(self) -> Option<(OutputKey, OutputIntent)> {
        let key = OutputKey::new(self.connector, self.vendor?, self.product?, self.serial?);
        let mut intent = self.intent;
        intent.enabled = intent.rect.width != 0 && intent.rect.height != 0;
        intent.transform = Transform::new(self.rotation.unwrap_or(Rotation::Normal), self.reflect_x);
        Some((key, intent))
    }
}

struct Parser<'a> {
    store: &'a mut ConfigurationStore,
    state: State,
    unknown_count: usize,
    entries: Vec<(OutputKey, OutputIntent)>,
    output: PendingOutput,
}

fn element_name(name: &[u8]) -> String {
    String::from_utf8_lossy(name).into_owned()
}

fn read_int(text: &str) -> Result<i32, ParseErrorKind> {
    match text.parse::<i64>() {
        Ok(value) if (0..=MAX_INT).contains(&value) => Ok(value as i32),
        _ => Err(ParseErrorKind::InvalidNumber(text.to_string())),
    }
}

fn read_float(text: &str) -> Result<f32, ParseErrorKind> {
    match text.parse::<f32>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
        _ => Err(ParseErrorKind::InvalidNumber(text.to_string())),
    }
}

fn read_bool(text: &str) -> Result<bool, ParseErrorKind> {
    match text {
        "yes" => Ok(true),
        "no" => Ok(false),
        _ => Err(ParseErrorKind::InvalidBool(text.to_string())),
    }
}

impl Parser<'_> {
    fn start(&mut self, e: &BytesStart<'_>) -> Result<(), ParseErrorKind> {
        let name = e.name();
        let name = name.as_ref();
        match self.state {
            State::Initial => {
                if name != b"monitors" {
                    return Err(ParseErrorKind::InvalidDocumentElement(element_name(name)));
                }
                let version = e
                    .try_get_attribute("version")
                    .map_err(quick_xml::Error::from)?
                    .ok_or(ParseErrorKind::MissingAttribute {
                        element: "monitors",
                        attribute: "version",
                    })?
                    .unescape_value()?;
                if version != VERSION {
                    return Err(ParseErrorKind::UnsupportedVersion(version.into_owned()));
                }
                self.state = State::Monitors;
            }
            State::Monitors => {
                if name != b"configuration" {
                    return Err(ParseErrorKind::InvalidToplevelElement(element_name(name)));
                }
                self.entries.clear();
                self.state = State::Configuration;
            }
            State::Configuration if self.unknown_count == 0 && name == b"clone" => {
                self.state = State::Clone;
            }
            State::Configuration if self.unknown_count == 0 && name == b"output" => {
                let connector = e
                    .try_get_attribute("name")
                    .map_err(quick_xml::Error::from)?
                    .ok_or(ParseErrorKind::MissingAttribute {
                        element: "output",
                        attribute: "name",
                    })?
                    .unescape_value()?;
                self.output = PendingOutput {
                    connector: connector.into_owned(),
                    ..Default::default()
                };
                self.state = State::Output;
            }
            State::Output if self.unknown_count == 0 => match Field::from_name(name) {
                Some(field) => self.state = State::OutputField(field),
                None => self.unknown_count += 1,
            },
            State::Configuration | State::Output => self.unknown_count += 1,
            State::Clone | State::OutputField(_) => {
                return Err(ParseErrorKind::UnexpectedElement(element_name(name)));
            }
        }
        Ok(())
    }

    fn end(&mut self, name: &[u8]) -> Result<(), ParseErrorKind> {
        match self.state {
            State::Initial => return Err(ParseErrorKind::UnexpectedElement(element_name(name))),
            State::Monitors => self.state = State::Initial,
            State::Configuration if self.unknown_count == 0 && name == b"configuration" => {
                let entries = std::mem::take(&mut self.entries);
                if !entries.is_empty() {
                    self.store.insert(Rc::new(Configuration::new(entries)));
                }
                self.state = State::Monitors;
            }
            State::Output if self.unknown_count == 0 && name == b"output" => {
                if let Some(entry) = std::mem::take(&mut self.output).finish() {
                    self.entries.push(entry);
                }
                self.state = State::Configuration;
            }
            State::Configuration | State::Output => {
                self.unknown_count = self.unknown_count.saturating_sub(1);
            }
            State::Clone => self.state = State::Configuration,
            State::OutputField(_) => self.state = State::Output,
        }
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<(), ParseErrorKind> {
        let blank = text.trim().is_empty();
        match self.state {
            State::Initial | State::Monitors if blank => {}
            State::Configuration | State::Output if blank || self.unknown_count > 0 => {}
            State::Initial | State::Monitors | State::Configuration | State::Output => {
                return Err(ParseErrorKind::UnexpectedContent);
            }
            // only informational
            State::Clone => {}
            State::OutputField(field) => self.field(field, text)?,
        }
        Ok(())
    }

    fn field(&mut self, field: Field, text: &str) -> Result<(), ParseErrorKind> {
        let output = &mut self.output;
        match field {
            Field::Vendor => output.vendor = Some(text.to_string()),
            Field::Product => output.product = Some(text.to_string()),
            Field::Serial => output.serial = Some(text.to_string()),
            Field::Width => output.intent.rect.width = read_int(text)?,
            Field::Height => output.intent.rect.height = read_int(text)?,
            Field::Rate => output.intent.refresh_rate = read_float(text)?,
            Field::X => output.intent.rect.x = read_int(text)?,
            Field::Y => output.intent.rect.y = read_int(text)?,
            Field::Rotation => {
                output.rotation = Some(
                    Rotation::from_name(text)
                        .ok_or_else(|| ParseErrorKind::InvalidRotation(text.to_string()))?,
                )
            }
            Field::ReflectX => output.reflect_x = read_bool(text)?,
            Field::ReflectY => {
                if read_bool(text)? {
                    return Err(ParseErrorKind::ReflectY);
                }
            }
            Field::Primary => output.intent.is_primary = read_bool(text)?,
            Field::Presentation => output.intent.is_presentation = read_bool(text)?,
            Field::Underscanning => output.intent.is_underscanning = read_bool(text)?,
        }
        Ok(())
    }
}

/// Parses `contents` into `store`.
///
/// Configurations are inserted as soon as they are complete, so on error the
/// store keeps everything that came before the broken one.
pub fn parse(contents: &str, store: &mut ConfigurationStore) -> Result<(), ParseError> {
    let mut reader = Reader::from_str(contents);
    reader.trim_text(true);

    let mut parser = Parser {
        store,
        state: State::Initial,
        unknown_count: 0,
        entries: Vec::new(),
        output: PendingOutput::default(),
    };

    let mut buf = Vec::new();
    loop {
        let result = match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => parser.start(e),
            Ok(Event::Empty(ref e)) => parser
                .start(e)
                .and_then(|_| parser.end(e.name().as_ref())),
            Ok(Event::End(ref e)) => parser.end(e.name().as_ref()),
            Ok(Event::Text(ref e)) => e
                .unescape()
                .map_err(ParseErrorKind::from)
                .and_then(|text| parser.text(&text)),
            Ok(Event::CData(e)) => {
                let text = e.into_inner();
                parser.text(&String::from_utf8_lossy(&text))
            }
            Ok(Event::Eof) if parser.state == State::Initial => break,
            Ok(Event::Eof) => Err(ParseErrorKind::UnexpectedEof),
            Ok(_) => Ok(()),
            Err(err) => Err(err.into()),
        };
        result.map_err(|kind| ParseError {
            position: reader.buffer_position(),
            kind,
        })?;
        buf.clear();
    }

    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

/// Renders every configuration of `store`, in store order.
pub fn serialize(store: &ConfigurationStore) -> String {
    let mut buffer = format!("<monitors version=\"{}\">\n", VERSION);

    for config in store.iter() {
        buffer.push_str("  <configuration>\n    <clone>no</clone>\n");
        for (key, output) in config.iter() {
            let _ = write!(
                buffer,
                "    <output name=\"{}\">\n      <vendor>{}</vendor>\n      <product>{}</product>\n      <serial>{}</serial>\n",
                escape(key.connector.as_str()),
                escape(key.vendor.as_str()),
                escape(key.product.as_str()),
                escape(key.serial.as_str()),
            );
            if output.enabled {
                let _ = write!(
                    buffer,
                    "      <width>{}</width>\n      <height>{}</height>\n      <rate>{}</rate>\n      <x>{}</x>\n      <y>{}</y>\n      <rotation>{}</rotation>\n      <reflect_x>{}</reflect_x>\n      <reflect_y>no</reflect_y>\n      <primary>{}</primary>\n      <presentation>{}</presentation>\n      <underscanning>{}</underscanning>\n",
                    output.rect.width,
                    output.rect.height,
                    output.refresh_rate,
                    output.rect.x,
                    output.rect.y,
                    output.transform.rotation().as_str(),
                    yes_no(output.transform.is_flipped()),
                    yes_no(output.is_primary),
                    yes_no(output.is_presentation),
                    yes_no(output.is_underscanning),
                );
            }
            buffer.push_str("    </output>\n");
        }
        buffer.push_str("  </configuration>\n");
    }

    buffer.push_str("</monitors>\n");
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmic_monitors_config::Rect;

    const DOCKED: &str = r#"<?xml version="1.0"?>
<monitors version="1">
  <configuration>
    <clone>no</clone>
    <output name="DP-1">
      <vendor>DEL</vendor>
      <product>0xa0c4</product>
      <serial>0x4c4b3953</serial>
      <width>1440</width>
      <height>2560</height>
      <rate>59.951</rate>
      <x>1920</x>
      <y>0</y>
      <rotation>left</rotation>
      <reflect_x>yes</reflect_x>
      <reflect_y>no</reflect_y>
      <primary>no</primary>
      <presentation>no</presentation>
      <underscanning>no</underscanning>
    </output>
    <output name="eDP-1">
      <vendor>BOE</vendor>
      <product>0x0a1b</product>
      <serial>unknown</serial>
      <width>1920</width>
      <height>1080</height>
      <rate>60</rate>
      <x>0</x>
      <y>0</y>
      <primary>yes</primary>
    </output>
    <output name="HDMI-A-1">
    </output>
  </configuration>
</monitors>
"#;

    fn wrap(outputs: &str) -> String {
        format!(
            "<monitors version=\"1\"><configuration>{}</configuration></monitors>",
            outputs
        )
    }

    fn parse_str(contents: &str) -> (ConfigurationStore, Result<(), ParseError>) {
        let mut store = ConfigurationStore::new();
        let result = parse(contents, &mut store);
        (store, result)
    }

    #[test]
    fn parses_full_file() {
        let (store, result) = parse_str(DOCKED);
        result.unwrap();
        assert_eq!(store.len(), 1);
        let config = store.iter().next().unwrap();
        // the disconnected HDMI output is dropped
        assert_eq!(config.len(), 2);

        let (key, dp) = config.iter().next().unwrap();
        assert_eq!(key, &OutputKey::new("DP-1", "DEL", "0xa0c4", "0x4c4b3953"));
        assert!(dp.enabled);
        assert_eq!(dp.rect, Rect::new(1920, 0, 1440, 2560));
        assert_eq!(dp.refresh_rate, 59.951);
        assert_eq!(dp.transform, Transform::Flipped90);

        let edp = config.outputs()[1];
        assert!(edp.is_primary);
        assert_eq!(edp.transform, Transform::Normal);
    }

    #[test]
    fn missing_size_means_disabled() {
        let (store, result) = parse_str(&wrap(
            r#"<output name="DP-2"><vendor>GSM</vendor><product>0x5b7f</product><serial>0x1</serial><x>10</x><primary>yes</primary></output>"#,
        ));
        result.unwrap();
        let config = store.iter().next().unwrap();
        assert_eq!(config.outputs()[0], OutputIntent::disabled());
    }

    #[test]
    fn skips_unknown_elements() {
        let (store, result) = parse_str(&wrap(
            r#"<layout><output name="nested"><width>oops</width></output></layout>
            <output name="DP-2"><vendor>GSM</vendor><scale><factor>2</factor></scale><product>0x5b7f</product><serial>0x1</serial><width>800</width><height>600</height></output>
            <empty/>"#,
        ));
        result.unwrap();
        let config = store.iter().next().unwrap();
        assert_eq!(config.len(), 1);
        assert_eq!(config.keys()[0].connector, "DP-2");
        assert_eq!(config.outputs()[0].rect, Rect::new(0, 0, 800, 600));
    }

    #[test]
    fn rejects_bad_documents() {
        for contents in [
            r#"<monitors version="2"></monitors>"#.to_string(),
            r#"<monitors></monitors>"#.to_string(),
            r#"<displays version="1"></displays>"#.to_string(),
            r#"<monitors version="1"><output name="x"/></monitors>"#.to_string(),
            r#"<monitors version="1">text</monitors>"#.to_string(),
            r#"<monitors version="1"><configuration>"#.to_string(),
            wrap(r#"<output name="a"><width>40000</width></output>"#),
            wrap(r#"<output name="a"><width>-1</width></output>"#),
            wrap(r#"<output name="a"><x>12px</x></output>"#),
            wrap(r#"<output name="a"><rate>fast</rate></output>"#),
            wrap(r#"<output name="a"><rate>NaN</rate></output>"#),
            wrap(r#"<output name="a"><rate>inf</rate></output>"#),
            wrap(r#"<output name="a"><rate>-60</rate></output>"#),
            wrap(r#"<output name="a"><primary>true</primary></output>"#),
            wrap(r#"<output name="a"><rotation>sideways</rotation></output>"#),
            wrap(r#"<output name="a"><reflect_y>yes</reflect_y></output>"#),
            wrap(r#"<output name="a"><vendor><b>X</b></vendor></output>"#),
            wrap(r#"<output><vendor>X</vendor></output>"#),
        ] {
            let (_, result) = parse_str(&contents);
            assert!(result.is_err(), "accepted {}", contents);
        }
    }

    #[test]
    fn rates_must_be_finite() {
        assert_eq!(read_float("59.95").unwrap(), 59.95);
        for text in ["NaN", "inf", "-inf", "-1"] {
            assert!(matches!(read_float(text), Err(ParseErrorKind::InvalidNumber(ref n)) if n == text));
        }
    }

    #[test]
    fn keeps_configurations_before_error() {
        let contents = r#"<monitors version="1">
  <configuration><output name="DP-1"><vendor>A</vendor><product>B</product><serial>C</serial><width>800</width><height>600</height></output></configuration>
  <configuration><output name="DP-2"><vendor>A</vendor><product>B</product><serial>D</serial><width>800</width><height>600</height></output></configuration>
  <configuration><output name="DP-3"><vendor>A</vendor><product>B</product><serial>E</serial><width>32768</width></output></configuration>
</monitors>"#;
        let (store, result) = parse_str(contents);
        let err = result.unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::InvalidNumber(ref n) if n == "32768"));
        assert!(err.position > 0);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn serialize_round_trips() {
        let (store, result) = parse_str(DOCKED);
        result.unwrap();
        let mut extra = store.clone();
        extra.insert(Rc::new(Configuration::new([(
            OutputKey::new("HDMI-A-1", "A&B <Displays>", "0x\"1\"", ""),
            OutputIntent::disabled(),
        )])));

        let text = serialize(&extra);
        assert!(text.contains("A&amp;B &lt;Displays&gt;"));
        let (reparsed, result) = parse_str(&text);
        result.unwrap();
        assert_eq!(reparsed.len(), extra.len());
        for (original, parsed) in extra.iter().zip(reparsed.iter()) {
            assert!(original.full_eq(parsed));
        }
    }
}
