//! Lenient decoding of Overpass JSON responses.

use geo::Coord;
use log::debug;
use serde_json::{Map, Value};
use woladen_core::{ElementKind, ElementRef, Tags};

use super::OverpassError;

/// A tagged geometry returned by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct OverpassElement {
    /// Kind and id.
    pub element: ElementRef,
    /// String-valued tags.
    pub tags: Tags,
    /// The element's own coordinate, else its centroid, when valid.
    pub location: Option<Coord<f64>>,
}

/// Decode the `elements` array of a response body.
///
/// Elements without a known `type`, an integer `id` or a `tags` object are
/// skipped. A missing `elements` key yields an empty list.
///
/// # Errors
///
/// Returns [`OverpassError::Decode`] when the body is not JSON and
/// [`OverpassError::Malformed`] when the root is not an object or
/// `elements` is not an array.
pub fn parse_elements(body: &[u8]) -> Result<Vec<OverpassElement>, OverpassError> {
    let root: Value = serde_json::from_slice(body).map_err(|source| OverpassError::Decode { source })?;
    let Value::Object(root) = root else {
        return Err(OverpassError::Malformed {
            reason: "response root is not an object",
        });
    };
    let elements = match root.get("elements") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(elements)) => elements,
        Some(_) => {
            return Err(OverpassError::Malformed {
                reason: "`elements` is not an array",
            });
        }
    };
    let parsed: Vec<OverpassElement> = elements.iter().filter_map(parse_element).collect();
    if parsed.len() != elements.len() {
        debug!(
            "skipped {} unusable Overpass elements",
            elements.len() - parsed.len()
        );
    }
    Ok(parsed)
}

fn parse_element(raw: &Value) -> Option<OverpassElement> {
    let object = raw.as_object()?;
    let kind: ElementKind = object.get("type")?.as_str()?.parse().ok()?;
    let id = object.get("id")?.as_i64()?;
    let tags = object
        .get("tags")?
        .as_object()?
        .iter()
        .filter_map(|(key, value)| value.as_str().map(|value| (key.clone(), value.to_owned())))
        .collect();
    let location = point(object).or_else(|| {
        object
            .get("center")
            .and_then(Value::as_object)
            .and_then(point)
    });
    Some(OverpassElement {
        element: ElementRef::new(kind, id),
        tags,
        location,
    })
}

fn point(object: &Map<String, Value>) -> Option<Coord<f64>> {
    let lat = object.get("lat")?.as_f64()?;
    let lon = object.get("lon")?.as_f64()?;
    let valid = lat.is_finite()
        && lon.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lon);
    valid.then_some(Coord { x: lon, y: lat })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn elements_prefer_own_coordinates_then_centre() {
        let body = br#"{"elements": [
            {"type": "node", "id": 1, "lat": 52.5, "lon": 13.4, "tags": {"amenity": "cafe"}},
            {"type": "way", "id": 2, "center": {"lat": 52.6, "lon": 13.5}, "tags": {"shop": "bakery"}},
            {"type": "relation", "id": 3, "tags": {"leisure": "park", "layer": 1}}
        ]}"#;
        let elements = parse_elements(body).expect("valid body");
        assert_eq!(elements.len(), 3);
        assert_eq!(elements[0].location, Some(Coord { x: 13.4, y: 52.5 }));
        assert_eq!(elements[1].location, Some(Coord { x: 13.5, y: 52.6 }));
        assert_eq!(elements[2].location, None);
        assert_eq!(elements[2].tags.get("layer"), None, "non-string tags are dropped");
    }

    #[rstest]
    #[case::unknown_kind(r#"{"type": "area", "id": 1, "tags": {}}"#)]
    #[case::string_id(r#"{"type": "node", "id": "1", "tags": {}}"#)]
    #[case::fractional_id(r#"{"type": "node", "id": 1.5, "tags": {}}"#)]
    #[case::missing_tags(r#"{"type": "node", "id": 1}"#)]
    #[case::tags_not_object(r#"{"type": "node", "id": 1, "tags": []}"#)]
    #[case::not_object(r#""node""#)]
    fn unusable_elements_are_skipped(#[case] element: &str) {
        let body = format!(r#"{{"elements": [{element}]}}"#);
        assert!(parse_elements(body.as_bytes()).expect("valid body").is_empty());
    }

    #[rstest]
    fn missing_elements_mean_no_results() {
        assert!(parse_elements(br#"{"version": 0.6}"#).expect("valid body").is_empty());
    }

    #[rstest]
    #[case::array_root(&b"[]"[..])]
    #[case::elements_not_array(&br#"{"elements": {}}"#[..])]
    #[case::not_json(&b"<html>rate limited</html>"[..])]
    fn malformed_bodies_fail(#[case] body: &[u8]) {
        assert!(parse_elements(body).is_err());
    }
}
