//! Hypermedia links and the client-side routing table built from them.
//!
//! # Design
//! A `LinkTable` is an ordered list of links looked up by relation name.
//! Relations are opaque strings compared with plain equality; when several
//! links share a relation the first one in server order wins. A table is
//! never mutated after construction; refreshing links replaces the whole
//! table.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ClientError;

/// Relation names the client resolves itself.
pub mod rel {
    /// Root-document link used to register a pack.
    pub const PACK_REGISTRATION: &str = "pack-registration";
    /// Registered-pack link polled for work.
    pub const TAKE_ACTION: &str = "take-action";
    /// Registered-pack link that accepts standalone events.
    pub const EVENT: &str = "event";
    /// Action-local link that accepts the action's result event.
    pub const ACTION_RESULT: &str = "actionResult";
    /// Root-document link of the API health check.
    ///
    /// Matched exactly, so servers advertising the swagger-style
    /// `.../info/health` relation need [`super::LinkTable::resolve`] with
    /// their full relation string.
    pub const HEALTH: &str = "health";
}

/// One hypermedia edge: where to go and why.
///
/// Decoding a `Link` directly needs an absolute `href`, which is what pack
/// and action responses carry. The API root document goes through
/// [`LinksDocument::resolve`] instead, which also accepts relative hrefs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub href: Url,
    pub rel: String,
}

impl Link {
    pub fn new(href: &str, rel: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            href: Url::parse(href)?,
            rel: rel.to_string(),
        })
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{} {}}}", self.href, self.rel)
    }
}

/// A link as the root document spells it, before its href is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentLink {
    pub href: String,
    pub rel: String,
}

/// Wire shape of the API root document: `{"links": [{"href", "rel"}, ...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinksDocument {
    #[serde(default)]
    pub links: Vec<DocumentLink>,
}

impl LinksDocument {
    /// Join every href onto `document_url`, the URL the document was fetched
    /// from. Absolute hrefs come through unchanged.
    pub fn resolve(self, document_url: &Url) -> Result<LinkTable, ClientError> {
        let links = self
            .links
            .into_iter()
            .map(|link| match document_url.join(&link.href) {
                Ok(href) => Ok(Link { href, rel: link.rel }),
                Err(e) => Err(ClientError::Decode(format!(
                    "invalid href {:?} for rel {:?}: {e}",
                    link.href, link.rel
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(LinkTable::new(links))
    }
}

/// Select the first link in `links` whose relation equals `relation`.
///
/// On a miss the error carries a snapshot of every link searched.
pub fn find_link<'a>(links: &'a [Link], relation: &str) -> Result<&'a Url, ClientError> {
    links
        .iter()
        .find(|link| link.rel == relation)
        .map(|link| &link.href)
        .ok_or_else(|| ClientError::LinkNotFound {
            relation: relation.to_string(),
            available: links.to_vec(),
        })
}

/// Relation-name lookup over the links of one links document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkTable {
    links: Vec<Link>,
}

impl LinkTable {
    pub fn new(links: Vec<Link>) -> Self {
        Self { links }
    }

    /// Resolve `relation` to the target of its first link.
    pub fn resolve(&self, relation: &str) -> Result<&Url, ClientError> {
        find_link(&self.links, relation)
    }

    pub fn find(&self, relation: &str) -> Option<&Link> {
        self.links.iter().find(|link| link.rel == relation)
    }

    /// Every link for `relation`, in server order.
    pub fn candidates<'a>(&'a self, relation: &'a str) -> impl Iterator<Item = &'a Link> + 'a {
        self.links.iter().filter(move |link| link.rel == relation)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Link> {
        self.links.iter()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn as_slice(&self) -> &[Link] {
        &self.links
    }
}
