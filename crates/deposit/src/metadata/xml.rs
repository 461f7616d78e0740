//! A small XML element tree.
//!
//! Documents are composed from builder functions that return whole subtrees, so no helper ever
//! mutates a node it did not create. Serialization and parsing go through `quick-xml`; parsing is
//! used to read SWORD receipts and to inspect generated documents.
//!
//! ```
//! use deposit::metadata::xml::Element;
//!
//! let title = Element::new("titleInfo").child(Element::leaf("title", "Ficciones"));
//! let mods = Element::new("mods").attr("version", "3.7").child(title);
//!
//! let bytes = mods.to_bytes().unwrap();
//! let parsed = Element::parse(std::str::from_utf8(&bytes).unwrap()).unwrap();
//! assert_eq!(parsed.find("titleInfo/title").unwrap().text_content(), "Ficciones");
//! ```

use quick_xml::{
  events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
  Reader, Writer,
};

use super::*;

/// A node of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
  /// A child element
  Element(Element),
  /// Character data
  Text(String),
}

/// An XML element with its attributes and children, names kept as written (`mets:file`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
  /// Qualified name
  pub name:       String,
  /// Attributes in insertion order
  pub attributes: Vec<(String, String)>,
  /// Children in document order
  pub children:   Vec<Node>,
}

impl Element {
  /// An element with no attributes or children.
  pub fn new(name: impl Into<String>) -> Self {
    Self { name: name.into(), attributes: Vec::new(), children: Vec::new() }
  }

  /// An element containing only `text`.
  pub fn leaf(name: impl Into<String>, text: impl Into<String>) -> Self {
    Self::new(name).text(text)
  }

  /// `leaf(name, text)` if `text` is present and not blank.
  pub fn optional_leaf(name: &str, text: Option<&str>) -> Option<Self> {
    text.map(str::trim).filter(|text| !text.is_empty()).map(|text| Self::leaf(name, text))
  }

  /// Adds an attribute.
  pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.attributes.push((key.into(), value.into()));
    self
  }

  /// Appends character data.
  pub fn text(mut self, text: impl Into<String>) -> Self {
    self.children.push(Node::Text(text.into()));
    self
  }

  /// Appends a child element.
  pub fn child(mut self, child: Element) -> Self {
    self.children.push(Node::Element(child));
    self
  }

  /// Appends a child element if there is one.
  pub fn optional_child(self, child: Option<Element>) -> Self {
    match child {
      Some(child) => self.child(child),
      None => self,
    }
  }

  /// Appends every element of `children`.
  pub fn children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
    self.children.extend(children.into_iter().map(Node::Element));
    self
  }

  /// Name without its namespace prefix.
  pub fn local_name(&self) -> &str {
    self.name.rsplit_once(':').map(|(_, local)| local).unwrap_or(&self.name)
  }

  /// Value of an attribute, matched on its full name.
  pub fn attribute(&self, key: &str) -> Option<&str> {
    self.attributes.iter().find(|(name, _)| name == key).map(|(_, value)| value.as_str())
  }

  /// Child elements.
  pub fn elements(&self) -> impl Iterator<Item = &Element> {
    self.children.iter().filter_map(|node| match node {
      Node::Element(element) => Some(element),
      Node::Text(_) => None,
    })
  }

  /// Concatenated character data of this element and its descendants.
  pub fn text_content(&self) -> String {
    let mut text = String::new();
    for node in &self.children {
      match node {
        Node::Text(content) => text.push_str(content),
        Node::Element(element) => text.push_str(&element.text_content()),
      }
    }
    text
  }

  /// Follows a `/`-separated path of child names, matching on local names.
  pub fn find(&self, path: &str) -> Option<&Element> {
    path.split('/').filter(|step| !step.is_empty()).try_fold(self, |element, step| {
      element.elements().find(|child| child.local_name() == step)
    })
  }

  /// All elements reached by a `/`-separated path of child names.
  pub fn find_all(&self, path: &str) -> Vec<&Element> {
    let mut current = vec![self];
    for step in path.split('/').filter(|step| !step.is_empty()) {
      current = current
        .into_iter()
        .flat_map(|element| element.elements().filter(move |child| child.local_name() == step))
        .collect();
    }
    current
  }

  /// First descendant (depth first, self included) with the given local name.
  pub fn descendant(&self, local_name: &str) -> Option<&Element> {
    if self.local_name() == local_name {
      return Some(self);
    }
    self.elements().find_map(|child| child.descendant(local_name))
  }

  /// All descendants (self included) with the given local name, in document order.
  pub fn descendants(&self, local_name: &str) -> Vec<&Element> {
    let mut found = Vec::new();
    if self.local_name() == local_name {
      found.push(self);
    }
    for child in self.elements() {
      found.extend(child.descendants(local_name));
    }
    found
  }

  /// Serializes the element as an indented UTF-8 document with an XML declaration.
  pub fn to_bytes(&self) -> Result<Vec<u8>, DepositError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
      .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
      .map_err(xml_error)?;
    write_element(&mut writer, self)?;
    Ok(writer.into_inner())
  }

  /// [`Element::to_bytes`] as a string.
  pub fn to_xml_string(&self) -> Result<String, DepositError> {
    String::from_utf8(self.to_bytes()?).map_err(xml_error)
  }

  /// Parses a document and returns its root element.
  ///
  /// Whitespace-only text is dropped; comments and processing instructions are ignored.
  pub fn parse(xml: &str) -> Result<Element, DepositError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    loop {
      match reader.read_event().map_err(xml_error)? {
        Event::Start(start) => stack.push(element_from_start(&start)?),
        Event::Empty(start) => {
          let element = element_from_start(&start)?;
          match stack.last_mut() {
            Some(parent) => parent.children.push(Node::Element(element)),
            None => return Ok(element),
          }
        },
        Event::Text(text) => {
          let text = text.unescape().map_err(xml_error)?;
          if let Some(parent) = stack.last_mut() {
            parent.children.push(Node::Text(text.into_owned()));
          }
        },
        Event::CData(data) => {
          let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
          if let Some(parent) = stack.last_mut() {
            parent.children.push(Node::Text(text));
          }
        },
        Event::End(_) => {
          let element =
            stack.pop().ok_or_else(|| DepositError::Xml("unbalanced closing tag".to_string()))?;
          match stack.last_mut() {
            Some(parent) => parent.children.push(Node::Element(element)),
            None => return Ok(element),
          }
        },
        Event::Eof => return Err(DepositError::Xml("document has no root element".to_string())),
        _ => {},
      }
    }
  }
}

/// Writes `element` and its subtree.
fn write_element<W: std::io::Write>(
  writer: &mut Writer<W>,
  element: &Element,
) -> Result<(), DepositError> {
  let mut start = BytesStart::new(element.name.as_str());
  for (key, value) in &element.attributes {
    start.push_attribute((key.as_str(), value.as_str()));
  }

  if element.children.is_empty() {
    return writer.write_event(Event::Empty(start)).map_err(xml_error);
  }

  writer.write_event(Event::Start(start)).map_err(xml_error)?;
  for node in &element.children {
    match node {
      Node::Element(child) => write_element(writer, child)?,
      Node::Text(text) => writer.write_event(Event::Text(BytesText::new(text))).map_err(xml_error)?,
    }
  }
  writer.write_event(Event::End(BytesEnd::new(element.name.as_str()))).map_err(xml_error)
}

/// Builds an attribute-carrying element from a start tag.
fn element_from_start(start: &BytesStart<'_>) -> Result<Element, DepositError> {
  let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
  for attribute in start.attributes() {
    let attribute = attribute.map_err(xml_error)?;
    let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
    let value = attribute.unescape_value().map_err(xml_error)?.into_owned();
    element.attributes.push((key, value));
  }
  Ok(element)
}

/// Maps any writer or reader failure to [`DepositError::Xml`].
fn xml_error(err: impl fmt::Display) -> DepositError { DepositError::Xml(err.to_string()) }
