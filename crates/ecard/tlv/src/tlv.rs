//! TLV tree nodes
//!
//! A [`Tlv`] is one tag-length-value object. Constructed objects carry their parsed children,
//! and objects that followed each other in the input are threaded through a sibling link.

use std::borrow::Cow;

use bytes::Bytes;
use tracing::trace;

use crate::error::{Error, Result};
use crate::length::{self, Length};
use crate::tag::Tag;

/// A BER encoded tag-length-value object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tlv {
    tag: Tag,
    value: Bytes,
    children: Vec<Self>,
    next: Option<Box<Self>>,
}

impl Tlv {
    /// Create a primitive object
    pub fn primitive(tag: Tag, value: impl Into<Bytes>) -> Self {
        Self {
            tag: tag.with_constructed(false),
            value: value.into(),
            children: Vec::new(),
            next: None,
        }
    }

    /// Create a constructed object from its children
    pub fn constructed(tag: Tag, children: Vec<Self>) -> Self {
        let mut value = Vec::new();
        for child in &children {
            child.write_to(&mut value);
        }
        Self {
            tag: tag.with_constructed(true),
            value: Bytes::from(value),
            children,
            next: None,
        }
    }

    /// Parse `data` into a chain of sibling objects
    ///
    /// The first object is returned and the following ones are reachable through
    /// [`Tlv::next`]. A zero tag octet at the top level ends the input.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let nodes = Self::parse_all(data)?;
        Self::chain(nodes).ok_or(Error::Empty)
    }

    /// Parse `data` into a list of top level objects
    pub fn parse_all(data: &[u8]) -> Result<Vec<Self>> {
        let buffer = Bytes::copy_from_slice(data);
        parse_sequence(&buffer)
    }

    /// Link a list of objects into a sibling chain
    pub fn chain(nodes: Vec<Self>) -> Option<Self> {
        let mut head: Option<Self> = None;
        for mut node in nodes.into_iter().rev() {
            node.next = head.map(Box::new);
            head = Some(node);
        }
        head
    }

    /// Tag of this object
    pub const fn tag(&self) -> Tag {
        self.tag
    }

    /// Raw value octets
    pub const fn value(&self) -> &Bytes {
        &self.value
    }

    /// Parsed children of a constructed object
    pub fn children(&self) -> &[Self] {
        &self.children
    }

    /// Whether this object is constructed
    pub const fn is_constructed(&self) -> bool {
        self.tag.is_constructed()
    }

    /// Next sibling
    pub fn next(&self) -> Option<&Self> {
        self.next.as_deref()
    }

    /// Append `sibling` at the end of this object's sibling chain
    pub fn with_sibling(mut self, sibling: Self) -> Self {
        self.push_sibling(sibling);
        self
    }

    fn push_sibling(&mut self, sibling: Self) {
        match self.next.as_mut() {
            Some(next) => next.push_sibling(sibling),
            None => self.next = Some(Box::new(sibling)),
        }
    }

    /// Iterate over this object and every sibling after it
    pub fn siblings(&self) -> Siblings<'_> {
        Siblings {
            current: Some(self),
        }
    }

    /// First direct child with the given tag
    pub fn find_child(&self, tag: Tag) -> Option<&Self> {
        self.children.iter().find(|child| child.tag == tag)
    }

    /// All direct children with the given tag
    pub fn find_children(&self, tag: Tag) -> impl Iterator<Item = &Self> {
        self.children.iter().filter(move |child| child.tag == tag)
    }

    /// Value of a mandatory direct child
    pub fn child_value(&self, tag: Tag) -> Result<&Bytes> {
        self.find_child(tag)
            .map(Self::value)
            .ok_or(Error::MissingChild {
                parent: self.tag,
                child: tag,
            })
    }

    /// Standalone deep copy of this object without its siblings
    ///
    /// The copy owns fresh buffers, so it does not keep the parse input alive.
    pub fn detached(&self) -> Self {
        Self {
            tag: self.tag,
            value: Bytes::copy_from_slice(&self.value),
            children: self.children.iter().map(Self::detached).collect(),
            next: None,
        }
    }

    /// Serialize this object, optionally followed by its siblings
    ///
    /// Constructed objects are re-encoded from their children.
    pub fn to_bytes(&self, include_siblings: bool) -> Vec<u8> {
        let mut out = Vec::new();
        if include_siblings {
            for node in self.siblings() {
                node.write_to(&mut out);
            }
        } else {
            self.write_to(&mut out);
        }
        out
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        let (tag, value): (Tag, Cow<'_, [u8]>) = if self.children.is_empty() {
            (self.tag, Cow::Borrowed(&self.value))
        } else {
            let mut value = Vec::with_capacity(self.value.len());
            for child in &self.children {
                child.write_to(&mut value);
            }
            (self.tag.with_constructed(true), Cow::Owned(value))
        };

        out.extend_from_slice(&tag.to_bytes());
        length::encode(value.len(), out);
        out.extend_from_slice(&value);
    }
}

impl Drop for Tlv {
    fn drop(&mut self) {
        // unlink iteratively so long sibling chains do not recurse
        let mut next = self.next.take();
        while let Some(mut node) = next {
            next = node.next.take();
        }
    }
}

/// Iterator over a sibling chain
#[derive(Debug, Clone)]
pub struct Siblings<'a> {
    current: Option<&'a Tlv>,
}

impl<'a> Iterator for Siblings<'a> {
    type Item = &'a Tlv;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.current?;
        self.current = node.next();
        Some(node)
    }
}

fn parse_sequence(buffer: &Bytes) -> Result<Vec<Tlv>> {
    let mut nodes = Vec::new();
    let mut offset = 0;

    while offset < buffer.len() {
        if buffer[offset] == 0x00 {
            trace!(offset, "End of TLV data marker reached");
            break;
        }
        let (node, used) = parse_one(buffer, offset)?;
        nodes.push(node);
        offset += used;
    }

    Ok(nodes)
}

fn parse_one(buffer: &Bytes, offset: usize) -> Result<(Tlv, usize)> {
    let data = &buffer[offset..];
    let (tag, tag_octets) = Tag::parse(data)?;
    let (length, length_octets) = Length::parse(&data[tag_octets..])?;

    let header = tag_octets + length_octets;
    let body = &data[header..];
    let (value_len, consumed) = match length {
        Length::Definite(declared) => {
            if declared > body.len() {
                return Err(Error::ValueOverrun {
                    declared,
                    available: body.len(),
                });
            }
            (declared, header + declared)
        }
        Length::Indefinite => {
            let end = length::find_end_of_contents(body)?;
            (end, header + end + 2)
        }
    };

    let start = offset + header;
    let value = buffer.slice(start..start + value_len);
    let children = if tag.is_constructed() && !value.is_empty() {
        parse_sequence(&value)?
    } else {
        Vec::new()
    };

    trace!(%tag, length = value_len, "Parsed TLV object");
    Ok((
        Tlv {
            tag,
            value,
            children,
            next: None,
        },
        consumed,
    ))
}
