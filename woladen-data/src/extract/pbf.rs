//! `osmpbf` adapter.

use std::collections::{HashMap, HashSet};

use camino::{Utf8Path, Utf8PathBuf};
use geo::Coord;
use log::warn;
use osmpbf::{Element, ElementReader};
use woladen_core::Tags;

use super::{ExtractError, ExtractSource, ExtractVisitor, RawNode, RawRelation, RawWay, ScanSummary};

/// OSM PBF file read with `osmpbf`.
///
/// Ways accepted by the visitor have their node references resolved in a
/// second pass over the nodes, so the file is decoded at most twice.
///
/// # Examples
/// ```no_run
/// use woladen_core::RuleTable;
/// use woladen_data::extract::{LocalExtractBackend, PbfExtract};
///
/// let extract = PbfExtract::new("data/germany-latest.osm.pbf");
/// let mut backend = LocalExtractBackend::new(RuleTable::default(), extract, 100);
/// let stats = backend.prepare(&[])?;
/// println!("{} objects scanned", stats.objects_scanned);
/// # Ok::<(), woladen_data::extract::ExtractError>(())
/// ```
#[derive(Debug, Clone)]
pub struct PbfExtract {
    path: Utf8PathBuf,
}

#[derive(Debug)]
struct PendingWay {
    id: i64,
    tags: Tags,
    refs: Vec<i64>,
}

impl PbfExtract {
    /// Extract stored at `path`.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn reader(&self) -> Result<ElementReader<std::io::BufReader<std::fs::File>>, ExtractError> {
        ElementReader::from_path(self.path.as_std_path()).map_err(|source| ExtractError::Open {
            source,
            path: self.path.clone(),
        })
    }

    fn decode_error(&self, source: osmpbf::Error) -> ExtractError {
        ExtractError::Decode {
            source,
            path: self.path.clone(),
        }
    }

    fn resolve(&self, pending: &HashSet<i64>) -> Result<HashMap<i64, Coord<f64>>, ExtractError> {
        let mut positions: HashMap<i64, Coord<f64>> = HashMap::with_capacity(pending.len());
        let mut record = |id: i64, lon: f64, lat: f64| {
            if pending.contains(&id)
                && let Some(location) = valid_coordinate(lon, lat)
            {
                positions.insert(id, location);
            }
        };
        self.reader()?
            .for_each(|element| match element {
                Element::Node(node) => record(node.id(), node.lon(), node.lat()),
                Element::DenseNode(node) => record(node.id(), node.lon(), node.lat()),
                Element::Way(_) | Element::Relation(_) => {}
            })
            .map_err(|source| self.decode_error(source))?;
        Ok(positions)
    }
}

impl ExtractSource for PbfExtract {
    fn describe(&self) -> String {
        self.path.to_string()
    }

    fn scan(&self, visitor: &mut dyn ExtractVisitor) -> Result<ScanSummary, ExtractError> {
        let mut summary = ScanSummary::default();
        let mut ways: Vec<PendingWay> = Vec::new();
        let mut pending: HashSet<i64> = HashSet::new();

        self.reader()?
            .for_each(|element| match element {
                Element::Node(raw) => {
                    summary.nodes += 1;
                    let tags: Vec<(&str, &str)> = raw.tags().collect();
                    emit_node(&mut *visitor, raw.id(), raw.lon(), raw.lat(), &tags);
                }
                Element::DenseNode(raw) => {
                    summary.nodes += 1;
                    let tags: Vec<(&str, &str)> = raw.tags().collect();
                    emit_node(&mut *visitor, raw.id(), raw.lon(), raw.lat(), &tags);
                }
                Element::Way(way) => {
                    summary.ways += 1;
                    let tags: Vec<(&str, &str)> = way.tags().collect();
                    if visitor.wants_way(way.id(), &tags) {
                        let refs: Vec<i64> = way.refs().collect();
                        pending.extend(refs.iter().copied());
                        ways.push(PendingWay {
                            id: way.id(),
                            tags: Tags::from_pairs(tags),
                            refs,
                        });
                    }
                }
                Element::Relation(relation) => {
                    summary.relations += 1;
                    let tags: Vec<(&str, &str)> = relation.tags().collect();
                    visitor.visit_relation(RawRelation {
                        id: relation.id(),
                        tags: &tags,
                    });
                }
            })
            .map_err(|source| self.decode_error(source))?;

        if ways.is_empty() {
            return Ok(summary);
        }

        let positions = self.resolve(&pending)?;
        let mut unresolved = 0_usize;
        for way in &ways {
            let nodes: Vec<Coord<f64>> = way
                .refs
                .iter()
                .filter_map(|id| positions.get(id).copied())
                .collect();
            unresolved += way.refs.len() - nodes.len();
            visitor.visit_way(RawWay {
                id: way.id,
                tags: &way.tags,
                nodes: &nodes,
            });
        }
        if unresolved > 0 {
            warn!("Skipped {unresolved} way node references without coordinates");
        }
        Ok(summary)
    }
}

fn emit_node(visitor: &mut dyn ExtractVisitor, id: i64, lon: f64, lat: f64, tags: &[(&str, &str)]) {
    if let Some(location) = valid_coordinate(lon, lat) {
        visitor.visit_node(RawNode { id, location, tags });
    }
}

fn valid_coordinate(lon: f64, lat: f64) -> Option<Coord<f64>> {
    (lon.is_finite()
        && lat.is_finite()
        && (-180.0..=180.0).contains(&lon)
        && (-90.0..=90.0).contains(&lat))
    .then_some(Coord { x: lon, y: lat })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::test_support::NullVisitor;
    use rstest::rstest;

    #[rstest]
    #[case(13.4, 52.5, true)]
    #[case(181.0, 0.0, false)]
    #[case(0.0, -90.5, false)]
    #[case(f64::NAN, 0.0, false)]
    fn coordinates_are_validated(#[case] lon: f64, #[case] lat: f64, #[case] valid: bool) {
        assert_eq!(valid_coordinate(lon, lat).is_some(), valid);
    }

    #[rstest]
    fn missing_files_fail_to_open() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("absent.osm.pbf"))
            .expect("utf-8 temp path");
        let extract = PbfExtract::new(path.clone());
        let err = extract.scan(&mut NullVisitor).expect_err("file does not exist");
        assert!(matches!(err, ExtractError::Open { path: reported, .. } if reported == path));
    }

    #[rstest]
    fn corrupt_files_fail_to_decode() {
        let file = tempfile::Builder::new()
            .suffix(".osm.pbf")
            .tempfile()
            .expect("create temp file");
        std::fs::write(file.path(), b"\x00\x00\x00\x0dnot a blob header").expect("write junk");
        let path = Utf8PathBuf::from_path_buf(file.path().to_path_buf()).expect("utf-8 temp path");
        let err = PbfExtract::new(path)
            .scan(&mut NullVisitor)
            .expect_err("junk is not PBF");
        assert!(matches!(err, ExtractError::Decode { .. } | ExtractError::Open { .. }));
    }
}
