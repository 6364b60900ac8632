//! Arrow layout of a collection and conversions to and from points.
//!
//! `filename` and `content` get their own columns; every other payload key is
//! kept as a JSON object in `metadata`.

use anyhow::{anyhow, bail, Result};
use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, StringArray, UInt64Array};
use arrow_schema::{DataType, Field, Schema};
use serde_json::Value;
use std::sync::Arc;

use docrag_core::types::{Payload, Point, ScoredPoint, CONTENT_KEY, FILENAME_KEY};

pub const DISTANCE_COLUMN: &str = "_distance";

pub fn build_points_schema(dim: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::UInt64, false),
        Field::new(FILENAME_KEY, DataType::Utf8, true),
        Field::new(CONTENT_KEY, DataType::Utf8, true),
        Field::new("metadata", DataType::Utf8, false),
        Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim as i32), true),
    ]))
}

pub fn points_to_record_batch(points: &[Point], dim: usize) -> Result<RecordBatch> {
    let mut ids = Vec::with_capacity(points.len());
    let mut filenames: Vec<Option<String>> = Vec::with_capacity(points.len());
    let mut contents: Vec<Option<String>> = Vec::with_capacity(points.len());
    let mut metadata = Vec::with_capacity(points.len());
    let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(points.len());
    for point in points {
        if point.vector.len() != dim {
            bail!("point {} has {} dims, collection expects {}", point.id, point.vector.len(), dim);
        }
        let mut rest = point.payload.clone();
        ids.push(point.id);
        filenames.push(take_string(&mut rest, FILENAME_KEY));
        contents.push(take_string(&mut rest, CONTENT_KEY));
        metadata.push(serde_json::to_string(&rest)?);
        vectors.push(Some(point.vector.iter().map(|&x| Some(x)).collect()));
    }
    let batch = RecordBatch::try_new(build_points_schema(dim), vec![
        Arc::new(UInt64Array::from(ids)),
        Arc::new(StringArray::from(filenames)),
        Arc::new(StringArray::from(contents)),
        Arc::new(StringArray::from(metadata)),
        Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors, dim as i32)),
    ])?;
    Ok(batch)
}

fn take_string(payload: &mut Payload, key: &str) -> Option<String> {
    match payload.get(key) {
        Some(Value::String(_)) => match payload.remove(key) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        },
        _ => None,
    }
}

/// Decode a search result batch. Score is `1 - cosine distance`.
pub fn hits_from_batch(batch: &RecordBatch) -> Result<Vec<ScoredPoint>> {
    let ids = column::<UInt64Array>(batch, "id")?;
    let filenames = column::<StringArray>(batch, FILENAME_KEY)?;
    let contents = column::<StringArray>(batch, CONTENT_KEY)?;
    let metadata = column::<StringArray>(batch, "metadata")?;
    let distances = column::<Float32Array>(batch, DISTANCE_COLUMN)?;

    let mut hits = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let mut payload: Payload = serde_json::from_str(metadata.value(i))?;
        if filenames.is_valid(i) {
            payload.insert(FILENAME_KEY.to_string(), Value::String(filenames.value(i).to_string()));
        }
        if contents.is_valid(i) {
            payload.insert(CONTENT_KEY.to_string(), Value::String(contents.value(i).to_string()));
        }
        hits.push(ScoredPoint { id: ids.value(i), score: 1.0 - distances.value(i), payload });
    }
    Ok(hits)
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| anyhow!("column '{}' missing or of unexpected type", name))
}
