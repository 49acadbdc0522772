// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Immutable shape collection, buffer cascades and persistence.
//!
//! Every operation borrows the current collection and returns a new one, so
//! no half-applied edit is ever observable. [`ShapeStore`] holds the live
//! snapshot and swaps it atomically.

use crate::models::{Ring, Shape, ShapeKind};
use crate::services::geometry::{self, GeometryError};
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject, Value};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, RwLock};

/// Errors from collection edits and persistence.
#[derive(Debug, thiserror::Error)]
pub enum CollectionError {
    #[error("Shape not found: {0}")]
    UnknownShape(String),

    #[error("Duplicate shape id: {0}")]
    DuplicateId(String),

    #[error("A project boundary already exists: {0}")]
    DuplicateBoundary(String),

    #[error("Shape '{0}' needs a project boundary to be drawn first")]
    MissingBoundary(String),

    #[error("Shape '{0}' is derived from another shape and cannot be edited directly")]
    NotEditable(String),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error("Failed to parse shapes: {0}")]
    ParseError(String),
}

/// Ordered shapes keyed by id. At most one boundary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapeCollection {
    shapes: Vec<Shape>,
}

impl ShapeCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a flat list, enforcing unique ids and a single boundary.
    pub fn from_shapes(shapes: Vec<Shape>) -> Result<Self, CollectionError> {
        let mut collection = Self::new();
        for shape in shapes {
            collection = collection.with_shape(shape)?;
        }
        Ok(collection)
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Shape> {
        self.shapes.iter().find(|s| s.id == id)
    }

    pub fn boundary(&self) -> Option<&Shape> {
        self.shapes.iter().find(|s| s.is_boundary())
    }

    pub fn zones(&self) -> impl Iterator<Item = &Shape> {
        self.shapes.iter().filter(|s| s.is_zone())
    }

    /// Buffers whose parent is `id` (direct children only).
    pub fn dependents_of<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Shape> + 'a {
        self.shapes
            .iter()
            .filter(move |s| s.buffer_parent().is_some_and(|(parent, _)| parent == id))
    }

    /// Append a shape.
    pub fn with_shape(&self, shape: Shape) -> Result<Self, CollectionError> {
        if self.get(&shape.id).is_some() {
            return Err(CollectionError::DuplicateId(shape.id));
        }
        if shape.is_boundary() {
            if let Some(existing) = self.boundary() {
                return Err(CollectionError::DuplicateBoundary(existing.id.clone()));
            }
        }
        let mut shapes = self.shapes.clone();
        shapes.push(shape);
        Ok(Self { shapes })
    }

    /// Add a newly drawn shape. Anything other than the boundary itself
    /// requires the boundary to exist.
    pub fn place_shape(&self, shape: Shape) -> Result<Self, CollectionError> {
        if !shape.is_boundary() && self.boundary().is_none() {
            return Err(CollectionError::MissingBoundary(shape.id));
        }
        self.with_shape(shape)
    }

    /// Replace the ring of `id` and recompute every buffer derived from it.
    pub fn replace_ring(&self, id: &str, ring: Ring) -> Result<Self, CollectionError> {
        let current = self
            .get(id)
            .ok_or_else(|| CollectionError::UnknownShape(id.to_string()))?;
        if !current.is_editable() {
            return Err(CollectionError::NotEditable(id.to_string()));
        }
        geometry::validate_ring(&ring, "edit", id)?;

        let edited = current.with_ring(ring);
        let next = self.replaced(edited);
        next.recompute_dependents(id)
    }

    /// Move a shape by metres east/north; dependents follow.
    pub fn translate(&self, id: &str, east_m: f64, north_m: f64) -> Result<Self, CollectionError> {
        let current = self
            .get(id)
            .ok_or_else(|| CollectionError::UnknownShape(id.to_string()))?;
        let moved = current.ring.translated(east_m, north_m);
        self.replace_ring(id, moved)
    }

    /// Re-run the buffer of every shape derived (transitively) from `id`.
    pub fn recompute_dependents(&self, id: &str) -> Result<Self, CollectionError> {
        let mut next = self.clone();
        let mut queue: VecDeque<String> = VecDeque::from([id.to_string()]);
        let mut seen: HashSet<String> = HashSet::new();

        while let Some(parent_id) = queue.pop_front() {
            if !seen.insert(parent_id.clone()) {
                continue;
            }
            let Some(parent) = next.get(&parent_id).cloned() else {
                continue;
            };
            let children: Vec<(Shape, f64)> = next
                .dependents_of(&parent_id)
                .filter_map(|child| child.buffer_parent().map(|(_, d)| (child.clone(), d)))
                .collect();

            for (child, distance) in children {
                let ring = geometry::buffer_ring(&parent.ring, distance, &parent.id)?;
                tracing::debug!(parent = %parent.id, buffer = %child.id, distance, "Recomputed dependent buffer");
                queue.push_back(child.id.clone());
                next = next.replaced(child.with_ring(ring));
            }
        }
        Ok(next)
    }

    /// Remove a shape and every buffer derived from it.
    pub fn remove(&self, id: &str) -> Result<Self, CollectionError> {
        if self.get(id).is_none() {
            return Err(CollectionError::UnknownShape(id.to_string()));
        }
        let mut doomed: HashSet<String> = HashSet::from([id.to_string()]);
        loop {
            let before = doomed.len();
            for shape in &self.shapes {
                if let Some((parent, _)) = shape.buffer_parent() {
                    if doomed.contains(parent) {
                        doomed.insert(shape.id.clone());
                    }
                }
            }
            if doomed.len() == before {
                break;
            }
        }
        if doomed.len() > 1 {
            tracing::info!(id, removed = doomed.len(), "Removed shape with dependent buffers");
        }
        Ok(Self {
            shapes: self
                .shapes
                .iter()
                .filter(|s| !doomed.contains(&s.id))
                .cloned()
                .collect(),
        })
    }

    fn replaced(&self, shape: Shape) -> Self {
        Self {
            shapes: self
                .shapes
                .iter()
                .map(|s| if s.id == shape.id { shape.clone() } else { s.clone() })
                .collect(),
        }
    }

    // ─── Persistence ─────────────────────────────────────────────

    /// Serialize as a flat ordered JSON list.
    pub fn to_json(&self) -> Result<String, CollectionError> {
        serde_json::to_string(&self.shapes).map_err(|e| CollectionError::ParseError(e.to_string()))
    }

    /// Load a flat JSON list. Areas are recomputed from the rings.
    pub fn from_json(json: &str) -> Result<Self, CollectionError> {
        let shapes: Vec<Shape> =
            serde_json::from_str(json).map_err(|e| CollectionError::ParseError(e.to_string()))?;
        Self::from_shapes(
            shapes
                .into_iter()
                .map(|s| Shape::new(s.id, s.ring, s.kind))
                .collect(),
        )
    }

    /// Export as a GeoJSON FeatureCollection with `kind` and `area_m2`
    /// properties.
    pub fn to_geojson(&self) -> Result<GeoJson, CollectionError> {
        let features = self
            .shapes
            .iter()
            .map(shape_to_feature)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(GeoJson::FeatureCollection(FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }))
    }

    /// Load a FeatureCollection written by [`Self::to_geojson`].
    pub fn from_geojson(json: &str) -> Result<Self, CollectionError> {
        let geojson: GeoJson = json
            .parse()
            .map_err(|e: geojson::Error| CollectionError::ParseError(e.to_string()))?;
        let GeoJson::FeatureCollection(collection) = geojson else {
            return Err(CollectionError::ParseError(
                "expected a FeatureCollection".to_string(),
            ));
        };

        let shapes = collection
            .features
            .into_iter()
            .map(feature_to_shape)
            .collect::<Result<Vec<_>, _>>()?;
        let loaded = Self::from_shapes(shapes)?;
        tracing::info!(count = loaded.len(), "Loaded shapes from GeoJSON");
        Ok(loaded)
    }
}

fn shape_to_feature(shape: &Shape) -> Result<Feature, CollectionError> {
    let mut exterior: Vec<Vec<f64>> = shape
        .ring
        .points()
        .iter()
        .map(|p| vec![p.lng, p.lat])
        .collect();
    if let Some(first) = exterior.first().cloned() {
        exterior.push(first);
    }

    let mut properties = JsonObject::new();
    properties.insert(
        "kind".to_string(),
        serde_json::to_value(&shape.kind).map_err(|e| CollectionError::ParseError(e.to_string()))?,
    );
    properties.insert("area_m2".to_string(), serde_json::json!(shape.area));

    Ok(Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(Value::Polygon(vec![exterior]))),
        id: Some(geojson::feature::Id::String(shape.id.clone())),
        properties: Some(properties),
        foreign_members: None,
    })
}

fn feature_to_shape(feature: Feature) -> Result<Shape, CollectionError> {
    let id = match &feature.id {
        Some(geojson::feature::Id::String(s)) => s.clone(),
        Some(geojson::feature::Id::Number(n)) => n.to_string(),
        None => return Err(CollectionError::ParseError("feature without id".to_string())),
    };

    let kind: ShapeKind = feature
        .property("kind")
        .cloned()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| CollectionError::ParseError(format!("feature '{}': {}", id, e)))?
        .unwrap_or(ShapeKind::Asset { label: None });

    let ring = match feature.geometry.map(|g| g.value) {
        Some(Value::Polygon(rings)) => rings
            .into_iter()
            .next()
            .map(|exterior| {
                Ring::new(
                    exterior
                        .iter()
                        .filter(|pos| pos.len() >= 2)
                        .map(|pos| crate::models::GeoPoint::new(pos[1], pos[0])),
                )
            })
            .unwrap_or_default(),
        _ => {
            return Err(CollectionError::ParseError(format!(
                "feature '{}' is not a Polygon",
                id
            )))
        }
    };

    Ok(Shape::new(id, ring, kind))
}

/// Holder of the live collection snapshot.
#[derive(Debug, Default)]
pub struct ShapeStore {
    current: RwLock<Arc<ShapeCollection>>,
}

impl ShapeStore {
    pub fn new(collection: ShapeCollection) -> Self {
        Self {
            current: RwLock::new(Arc::new(collection)),
        }
    }

    /// Cheap handle on the current snapshot.
    pub fn snapshot(&self) -> Arc<ShapeCollection> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Swap in a whole collection (persistence load).
    pub fn replace(&self, collection: ShapeCollection) {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Arc::new(collection);
    }

    /// Apply `edit` to the current snapshot and publish the result. On error
    /// the stored collection is left as it was.
    pub fn update<F>(&self, edit: F) -> Result<Arc<ShapeCollection>, CollectionError>
    where
        F: FnOnce(&ShapeCollection) -> Result<ShapeCollection, CollectionError>,
    {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let next = Arc::new(edit(&guard)?);
        *guard = Arc::clone(&next);
        Ok(next)
    }
}
