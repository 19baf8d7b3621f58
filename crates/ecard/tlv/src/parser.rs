//! Cursor over a sequence of TLV objects
//!
//! Structures such as certificate bodies are read field by field: peek at what comes next,
//! consume it only if the tag matches, or demand a mandatory field. Every object handed out by
//! the parser is a [`Tlv::detached`] copy.

use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::tag::Tag;
use crate::tlv::Tlv;

/// Cursor over sibling TLV objects
#[derive(Debug, Clone, Default)]
pub struct Parser {
    nodes: VecDeque<Tlv>,
}

impl Parser {
    /// Cursor over `first` and all siblings that follow it
    pub fn new(first: &Tlv) -> Self {
        Self {
            nodes: first.siblings().map(Tlv::detached).collect(),
        }
    }

    /// Cursor over the children of a constructed object
    pub fn children_of(parent: &Tlv) -> Self {
        Self {
            nodes: parent.children().iter().map(Tlv::detached).collect(),
        }
    }

    /// Cursor over the objects encoded in `data`
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Ok(Self {
            nodes: Tlv::parse_all(data)?.into_iter().collect(),
        })
    }

    /// Number of objects not yet consumed
    pub fn remaining(&self) -> usize {
        self.nodes.len()
    }

    /// Whether all objects were consumed
    pub fn is_exhausted(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Object at the cursor position, without consuming it
    pub fn peek(&self) -> Option<&Tlv> {
        self.nodes.front()
    }

    /// Object `n` positions ahead of the cursor, without consuming anything
    pub fn peek_nth(&self, n: usize) -> Option<&Tlv> {
        self.nodes.get(n)
    }

    /// Whether the next object carries `tag`
    pub fn next_is(&self, tag: Tag) -> bool {
        self.nth_is(0, tag)
    }

    /// Whether the object `n` positions ahead carries `tag`
    pub fn nth_is(&self, n: usize, tag: Tag) -> bool {
        self.peek_nth(n).is_some_and(|node| node.tag() == tag)
    }

    /// Consume the next object only if it carries `tag`
    pub fn next_if(&mut self, tag: Tag) -> Option<Tlv> {
        if self.next_is(tag) {
            self.nodes.pop_front()
        } else {
            None
        }
    }

    /// Consume the next object, which must carry `tag`
    pub fn expect(&mut self, tag: Tag) -> Result<Tlv> {
        match self.nodes.front() {
            None => Err(Error::UnexpectedEnd { expected: tag }),
            Some(node) if node.tag() != tag => Err(Error::UnexpectedTag {
                expected: tag,
                found: node.tag(),
            }),
            Some(_) => self.nodes.pop_front().ok_or(Error::UnexpectedEnd { expected: tag }),
        }
    }
}

impl Iterator for Parser {
    type Item = Tlv;

    fn next(&mut self) -> Option<Self::Item> {
        self.nodes.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OID: Tag = Tag::universal(6);
    const DISCRETIONARY: Tag = Tag::application(0x13);

    fn sample() -> Parser {
        Parser::from_bytes(&hex::decode("0603040007 5301FF 4201AA".replace(' ', "")).unwrap())
            .unwrap()
    }

    #[test]
    fn test_lookahead_does_not_consume() {
        let parser = sample();
        assert_eq!(parser.remaining(), 3);
        assert!(parser.next_is(OID));
        assert!(parser.nth_is(1, DISCRETIONARY));
        assert!(!parser.nth_is(1, OID));
        assert!(parser.peek_nth(3).is_none());
        assert_eq!(parser.remaining(), 3);
    }

    #[test]
    fn test_next_if_and_expect() {
        let mut parser = sample();
        assert!(parser.next_if(DISCRETIONARY).is_none());
        let oid = parser.expect(OID).unwrap();
        assert_eq!(oid.value().as_ref(), &[0x04, 0x00, 0x07]);
        assert!(oid.next().is_none());

        assert_eq!(
            parser.expect(OID),
            Err(Error::UnexpectedTag {
                expected: OID,
                found: DISCRETIONARY
            })
        );
        assert!(parser.next_if(DISCRETIONARY).is_some());
        assert!(parser.next().is_some());
        assert!(parser.is_exhausted());
        assert_eq!(
            parser.expect(OID),
            Err(Error::UnexpectedEnd { expected: OID })
        );
    }

    #[test]
    fn test_parser_over_siblings_detaches() {
        let first = Tlv::from_bytes(&hex::decode("0101010101020101 03".replace(' ', "")).unwrap())
            .unwrap();
        let taken: Vec<Tlv> = Parser::new(&first).collect();
        assert_eq!(taken.len(), 3);
        assert!(taken.iter().all(|node| node.next().is_none()));
    }

    #[test]
    fn test_children_cursor() {
        let chat = Tlv::from_bytes(&hex::decode("7F4C080603040007530100").unwrap()).unwrap();
        let mut parser = Parser::children_of(&chat);
        assert!(parser.expect(OID).is_ok());
        assert_eq!(parser.expect(DISCRETIONARY).unwrap().value().as_ref(), &[0x00]);
    }
}
