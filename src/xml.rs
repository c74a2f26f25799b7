//! Event-driven XML reading and small writing helpers over `quick-xml`.
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::borrow::Cow;
use std::io::{BufRead, Write};

use crate::error::{OctError, Result};

/// Receiver of XML parsing events.
///
/// An empty element (`<a/>`) is reported as `start` immediately followed by
/// `end`.
pub trait XmlHandler {
    fn start(&mut self, name: &str, attrs: &Attributes) -> Result<()>;

    fn end(&mut self, name: &str) -> Result<()>;

    /// Character data, unescaped. May be delivered in several pieces.
    fn characters(&mut self, _text: &str) -> Result<()> {
        Ok(())
    }
}

/// Attributes of one start tag, in document order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    fn from_tag(tag: &BytesStart) -> Result<Self> {
        let mut out = Vec::new();
        for attr in tag.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            out.push((key, value));
        }
        Ok(Attributes(out))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Fetch an attribute which must be present.
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| OctError::MissingAttribute(key.to_owned()))
    }

    /// Fetch a numeric attribute which must be present.
    pub fn require_number<T: std::str::FromStr>(&self, key: &str) -> Result<T> {
        crate::util::parse_number(key, self.require(key)?)
    }
}

/// Drive `handler` over the whole document read from `source`.
pub fn parse<R: BufRead, H: XmlHandler>(source: R, handler: &mut H) -> Result<()> {
    let mut reader = Reader::from_reader(source);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                let name = tag_name(e.name().into_inner());
                handler.start(&name, &Attributes::from_tag(e)?)?;
            }
            Event::Empty(ref e) => {
                let name = tag_name(e.name().into_inner());
                handler.start(&name, &Attributes::from_tag(e)?)?;
                handler.end(&name)?;
            }
            Event::End(ref e) => {
                handler.end(&tag_name(e.name().into_inner()))?;
            }
            Event::Text(ref e) => {
                handler.characters(&e.unescape()?)?;
            }
            Event::CData(e) => {
                handler.characters(&String::from_utf8_lossy(&e.into_inner()))?;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

fn tag_name(raw: &[u8]) -> Cow<str> {
    String::from_utf8_lossy(raw)
}

/// Write `<name attrs...>`.
pub fn start<W: Write>(writer: &mut Writer<W>, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
    let mut tag = BytesStart::new(name);
    for &attr in attrs {
        tag.push_attribute(attr);
    }
    writer.write_event(Event::Start(tag))?;
    Ok(())
}

/// Write `<name attrs.../>`.
pub fn empty<W: Write>(writer: &mut Writer<W>, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
    let mut tag = BytesStart::new(name);
    for &attr in attrs {
        tag.push_attribute(attr);
    }
    writer.write_event(Event::Empty(tag))?;
    Ok(())
}

/// Write `</name>`.
pub fn end<W: Write>(writer: &mut Writer<W>, name: &str) -> Result<()> {
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Write `<name attrs...>text</name>`, escaping the text.
pub fn text_element<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    attrs: &[(&str, &str)],
    text: &str,
) -> Result<()> {
    start(writer, name, attrs)?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    end(writer, name)
}

#[cfg(test)]
mod tests {
    use super::{parse, Attributes, XmlHandler};
    use crate::error::{ErrorCategory, Result};

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
        size: Option<Attributes>,
    }

    impl XmlHandler for Recorder {
        fn start(&mut self, name: &str, attrs: &Attributes) -> Result<()> {
            if name == "size" {
                self.size = Some(attrs.clone());
            }
            self.events.push(format!("+{}", name));
            Ok(())
        }

        fn end(&mut self, name: &str) -> Result<()> {
            self.events.push(format!("-{}", name));
            Ok(())
        }

        fn characters(&mut self, text: &str) -> Result<()> {
            if !text.trim().is_empty() {
                self.events.push(text.trim().to_owned());
            }
            Ok(())
        }
    }

    #[test]
    fn events_in_order() {
        let doc = r#"<?xml version="1.0"?><a><b>x &amp; y</b><size x="1.5" y="2"/></a>"#;
        let mut rec = Recorder::default();
        parse(doc.as_bytes(), &mut rec).unwrap();
        assert_eq!(rec.events, ["+a", "+b", "x & y", "-b", "+size", "-size", "-a"]);

        let size = rec.size.unwrap();
        assert_eq!(size.get("x"), Some("1.5"));
        assert_eq!(size.require_number::<f32>("y").unwrap(), 2.);
        let err = size.require("z").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Structure);
    }

    #[test]
    fn handler_errors_stop_parsing() {
        struct Fail;
        impl XmlHandler for Fail {
            fn start(&mut self, name: &str, _: &Attributes) -> Result<()> {
                Err(crate::error::OctError::UnknownTag(name.to_owned()))
            }
            fn end(&mut self, _: &str) -> Result<()> {
                Ok(())
            }
        }
        assert!(parse("<foo/>".as_bytes(), &mut Fail).is_err());
    }
}
