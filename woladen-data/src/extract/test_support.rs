//! In-memory extract sources and downloaders for tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};

use async_trait::async_trait;
use camino::Utf8PathBuf;
use geo::Coord;
use woladen_core::Tags;

use super::{
    ExtractDownloader, ExtractError, ExtractSource, ExtractVisitor, RawNode, RawRelation, RawWay,
    ScanSummary,
};
use crate::http::TransportError;

type OwnedTags = Vec<(String, String)>;

/// Extract built element by element. Scans nodes, then ways, then
/// relations, like a sorted PBF file.
#[derive(Debug, Clone, Default)]
pub struct MemoryExtract {
    nodes: Vec<(i64, Coord<f64>, OwnedTags)>,
    ways: Vec<(i64, Vec<i64>, OwnedTags)>,
    relations: Vec<(i64, OwnedTags)>,
}

fn owned(tags: &[(&str, &str)]) -> OwnedTags {
    tags.iter()
        .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
        .collect()
}

fn borrowed(tags: &OwnedTags) -> Vec<(&str, &str)> {
    tags.iter()
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect()
}

impl MemoryExtract {
    /// Add a node.
    pub fn node(&mut self, id: i64, location: Coord<f64>, tags: &[(&str, &str)]) -> &mut Self {
        self.nodes.push((id, location, owned(tags)));
        self
    }

    /// Add a way referencing `refs`.
    pub fn way(&mut self, id: i64, refs: &[i64], tags: &[(&str, &str)]) -> &mut Self {
        self.ways.push((id, refs.to_vec(), owned(tags)));
        self
    }

    /// Add a relation.
    pub fn relation(&mut self, id: i64, tags: &[(&str, &str)]) -> &mut Self {
        self.relations.push((id, owned(tags)));
        self
    }
}

impl ExtractSource for MemoryExtract {
    fn describe(&self) -> String {
        "in-memory extract".to_owned()
    }

    fn scan(&self, visitor: &mut dyn ExtractVisitor) -> Result<ScanSummary, ExtractError> {
        let mut positions: HashMap<i64, Coord<f64>> = HashMap::new();
        for (id, location, tags) in &self.nodes {
            positions.insert(*id, *location);
            let pairs = borrowed(tags);
            visitor.visit_node(RawNode {
                id: *id,
                location: *location,
                tags: &pairs,
            });
        }
        for (id, refs, tags) in &self.ways {
            let pairs = borrowed(tags);
            if !visitor.wants_way(*id, &pairs) {
                continue;
            }
            let resolved: Vec<Coord<f64>> = refs
                .iter()
                .filter_map(|node| positions.get(node).copied())
                .collect();
            let way_tags = Tags::from_pairs(pairs.iter().copied());
            visitor.visit_way(RawWay {
                id: *id,
                tags: &way_tags,
                nodes: &resolved,
            });
        }
        for (id, tags) in &self.relations {
            let pairs = borrowed(tags);
            visitor.visit_relation(RawRelation { id: *id, tags: &pairs });
        }
        Ok(ScanSummary {
            nodes: self.nodes.len() as u64,
            ways: self.ways.len() as u64,
            relations: self.relations.len() as u64,
        })
    }
}

/// [`ExtractSource`] that always fails, for error paths.
#[derive(Debug, Clone, Default)]
pub struct MissingExtract {
    /// Path reported in the error.
    pub path: Utf8PathBuf,
}

impl ExtractSource for MissingExtract {
    fn describe(&self) -> String {
        self.path.to_string()
    }

    fn scan(&self, _visitor: &mut dyn ExtractVisitor) -> Result<ScanSummary, ExtractError> {
        Err(ExtractError::Missing {
            path: self.path.clone(),
        })
    }
}

/// Visitor that ignores everything and accepts no ways.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullVisitor;

impl ExtractVisitor for NullVisitor {
    fn visit_node(&mut self, _node: RawNode<'_>) {}

    fn wants_way(&mut self, _id: i64, _tags: &[(&str, &str)]) -> bool {
        false
    }

    fn visit_way(&mut self, _way: RawWay<'_>) {}

    fn visit_relation(&mut self, _relation: RawRelation<'_>) {}
}

/// [`ExtractDownloader`] that serves a fixed body and records requests.
#[derive(Debug, Default)]
pub struct StubDownloader {
    body: Vec<u8>,
    requested: RefCell<Vec<String>>,
}

impl StubDownloader {
    /// Downloader serving `body` for every URL.
    #[must_use]
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            body,
            requested: RefCell::new(Vec::new()),
        }
    }

    /// URLs requested so far.
    #[must_use]
    pub fn requested(&self) -> Vec<String> {
        self.requested.borrow().clone()
    }
}

#[async_trait(?Send)]
impl ExtractDownloader for StubDownloader {
    async fn download(&self, url: &str, sink: &mut dyn Write) -> Result<u64, TransportError> {
        self.requested.borrow_mut().push(url.to_owned());
        sink.write_all(&self.body)
            .map_err(|source| TransportError::Network {
                url: url.to_owned(),
                source,
            })?;
        Ok(self.body.len() as u64)
    }
}

/// [`ExtractDownloader`] whose connection always fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingDownloader;

#[async_trait(?Send)]
impl ExtractDownloader for FailingDownloader {
    async fn download(&self, url: &str, _sink: &mut dyn Write) -> Result<u64, TransportError> {
        Err(TransportError::Network {
            url: url.to_owned(),
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
        })
    }
}
