use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

/// Face descriptor (embedding) for a single detected face.
///
/// Serialized as a plain list of numbers. There is no mutable access to the
/// values once a descriptor has been built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Descriptor(Vec<f32>);

impl Descriptor {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compute Euclidean distance between two descriptors.
    pub fn euclidean_distance(&self, other: &Descriptor) -> f32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }

    /// A descriptor is comparable with `query` when it is non-empty, finite and
    /// of the same length.
    fn comparable_with(&self, query: &Descriptor) -> bool {
        !self.0.is_empty()
            && self.0.len() == query.0.len()
            && self.0.iter().all(|v| v.is_finite())
    }
}

/// A caller-supplied `(user id, descriptor)` pair used as a search candidate.
#[derive(Debug, Clone)]
pub struct KnownDescriptor {
    pub user_id: String,
    pub descriptor: Option<Descriptor>,
}

impl KnownDescriptor {
    /// Parse one entry of a `knownDescriptors` array.
    ///
    /// Returns `None` when the entry has no usable user id. A descriptor that
    /// is missing, `null` or not a list of numbers is kept as absent so the
    /// matcher can skip it.
    pub fn from_json(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let user_id = match obj.get("userId")? {
            Value::String(s) if !s.is_empty() => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };

        let descriptor = obj
            .get("descriptor")
            .and_then(Value::as_array)
            .and_then(|items| {
                items
                    .iter()
                    .map(|v| v.as_f64().map(|f| f as f32))
                    .collect::<Option<Vec<f32>>>()
            })
            .map(Descriptor::new);

        Some(Self { user_id, descriptor })
    }

    /// Parse a full `knownDescriptors` array, dropping entries without a user id.
    pub fn parse_list(items: &[Value]) -> Vec<Self> {
        items.iter().filter_map(Self::from_json).collect()
    }
}

/// The accepted best candidate of a search.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub user_id: String,
    /// Euclidean distance between the query and the winning descriptor.
    pub distance: f32,
}

/// Strategy for selecting the best known descriptor for a query.
pub trait Matcher {
    fn best_match(
        &self,
        query: Option<&Descriptor>,
        candidates: &[KnownDescriptor],
        tolerance: f32,
    ) -> Option<MatchResult>;
}

/// Default match tolerance for Euclidean distance between unit-length
/// ArcFace descriptors, where `d = sqrt(2 - 2 * cos)`. 1.05 accepts cosine
/// similarity of about 0.45 and above.
pub const DEFAULT_TOLERANCE: f32 = 1.05;

/// Closest-overall matcher gated by a distance tolerance.
///
/// Every usable candidate is compared; the global minimum is accepted only
/// when it lies within `tolerance`. Ties keep the earliest candidate.
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn best_match(
        &self,
        query: Option<&Descriptor>,
        candidates: &[KnownDescriptor],
        tolerance: f32,
    ) -> Option<MatchResult> {
        let query = query.filter(|q| !q.is_empty())?;

        let mut best: Option<(usize, f32)> = None;
        for (i, known) in candidates.iter().enumerate() {
            let Some(descriptor) = known.descriptor.as_ref() else {
                continue;
            };
            if !descriptor.comparable_with(query) {
                tracing::debug!(user_id = %known.user_id, "skipping unusable known descriptor");
                continue;
            }

            let distance = query.euclidean_distance(descriptor);
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((i, distance));
            }
        }

        match best {
            Some((idx, distance)) if distance <= tolerance => Some(MatchResult {
                user_id: candidates[idx].user_id.clone(),
                distance,
            }),
            Some((_, distance)) => {
                tracing::debug!(distance, tolerance, "closest candidate outside tolerance");
                None
            }
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn known(user_id: &str, values: Option<Vec<f32>>) -> KnownDescriptor {
        KnownDescriptor {
            user_id: user_id.into(),
            descriptor: values.map(Descriptor::new),
        }
    }

    #[test]
    fn test_euclidean_distance() {
        let a = Descriptor::new(vec![0.0, 0.0]);
        let b = Descriptor::new(vec![3.0, 4.0]);
        assert!((a.euclidean_distance(&b) - 5.0).abs() < 1e-6);
        assert_eq!(a.euclidean_distance(&a), 0.0);
    }

    #[test]
    fn test_descriptor_serializes_as_list() {
        let d = Descriptor::new(vec![0.5, -1.0]);
        assert_eq!(serde_json::to_value(&d).unwrap(), json!([0.5, -1.0]));
        let back: Descriptor = serde_json::from_value(json!([0.5, -1.0])).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn test_matcher_within_tolerance() {
        let query = Descriptor::new(vec![0.0, 0.0, 0.0]);
        let candidates = vec![known("u1", Some(vec![0.4, 0.0, 0.0]))];
        let result = EuclideanMatcher.best_match(Some(&query), &candidates, 0.55).unwrap();
        assert_eq!(result.user_id, "u1");
        assert!((result.distance - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_matcher_rejects_closest_outside_tolerance() {
        let query = Descriptor::new(vec![0.0, 0.0]);
        let candidates = vec![
            known("far", Some(vec![0.9, 0.0])),
            known("closest", Some(vec![0.7, 0.0])),
        ];
        assert!(EuclideanMatcher.best_match(Some(&query), &candidates, 0.55).is_none());
    }

    #[test]
    fn test_matcher_picks_global_minimum_not_first_under_tolerance() {
        let query = Descriptor::new(vec![0.0, 0.0]);
        let candidates = vec![
            known("first", Some(vec![0.5, 0.0])),
            known("best", Some(vec![0.1, 0.0])),
            known("third", Some(vec![0.3, 0.0])),
        ];
        let result = EuclideanMatcher.best_match(Some(&query), &candidates, 0.6).unwrap();
        assert_eq!(result.user_id, "best");
    }

    #[test]
    fn test_matcher_tie_keeps_earliest() {
        let query = Descriptor::new(vec![0.0, 0.0]);
        let candidates = vec![
            known("a", Some(vec![0.0, 0.2])),
            known("b", Some(vec![0.2, 0.0])),
        ];
        let result = EuclideanMatcher.best_match(Some(&query), &candidates, 0.5).unwrap();
        assert_eq!(result.user_id, "a");
    }

    #[test]
    fn test_matcher_is_deterministic() {
        let query = Descriptor::new(vec![0.1, 0.2, 0.3]);
        let candidates = vec![
            known("a", Some(vec![0.1, 0.25, 0.3])),
            known("b", Some(vec![0.0, 0.2, 0.3])),
        ];
        let first = EuclideanMatcher.best_match(Some(&query), &candidates, 1.0);
        for _ in 0..10 {
            assert_eq!(EuclideanMatcher.best_match(Some(&query), &candidates, 1.0), first);
        }
    }

    #[test]
    fn test_matcher_absent_query_or_empty_candidates() {
        let query = Descriptor::new(vec![0.0]);
        assert!(EuclideanMatcher.best_match(Some(&query), &[], 1.0).is_none());
        let candidates = vec![known("u1", Some(vec![0.0]))];
        assert!(EuclideanMatcher.best_match(None, &candidates, 1.0).is_none());
    }

    #[test]
    fn test_matcher_skips_unusable_entries() {
        let query = Descriptor::new(vec![0.0, 0.0]);
        let candidates = vec![
            known("missing", None),
            known("empty", Some(vec![])),
            known("wrong_len", Some(vec![0.0, 0.0, 0.0])),
            known("nan", Some(vec![f32::NAN, 0.0])),
            known("ok", Some(vec![0.3, 0.0])),
        ];
        let result = EuclideanMatcher.best_match(Some(&query), &candidates, 0.5).unwrap();
        assert_eq!(result.user_id, "ok");
    }

    #[test]
    fn test_matcher_all_unusable_is_none() {
        let query = Descriptor::new(vec![0.0, 0.0]);
        let candidates = vec![known("missing", None), known("empty", Some(vec![]))];
        assert!(EuclideanMatcher.best_match(Some(&query), &candidates, 10.0).is_none());
    }

    #[test]
    fn test_known_descriptor_from_json() {
        let entry = KnownDescriptor::from_json(&json!({"userId": "u1", "descriptor": [0.1, 0.2]})).unwrap();
        assert_eq!(entry.user_id, "u1");
        assert_eq!(entry.descriptor.unwrap().len(), 2);

        let numeric_id = KnownDescriptor::from_json(&json!({"userId": 42, "descriptor": null})).unwrap();
        assert_eq!(numeric_id.user_id, "42");
        assert!(numeric_id.descriptor.is_none());

        let bad_values = KnownDescriptor::from_json(&json!({"userId": "u2", "descriptor": [0.1, "x"]})).unwrap();
        assert!(bad_values.descriptor.is_none());
    }

    #[test]
    fn test_known_descriptor_parse_list_drops_entries_without_user() {
        let items = vec![
            json!({"descriptor": [0.1]}),
            json!("not an object"),
            json!({"userId": "", "descriptor": [0.1]}),
            json!({"userId": "u1"}),
        ];
        let parsed = KnownDescriptor::parse_list(&items);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].user_id, "u1");
        assert!(parsed[0].descriptor.is_none());
    }
}
