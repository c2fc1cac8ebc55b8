//! Flat artifact writers for the output contracts: parquet and CSV for
//! bin and flow records, JSON for run metadata.
//!
//! Columns match the record structs field for field; sample runner ids are
//! flattened to a comma-separated string so both formats stay flat.

use std::error::Error;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Float64Array, StringArray, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use crate::flow::FlowOutcome;
use crate::records::{BinRecord, FlowRecord, RunMetadata};

pub fn write_bin_records_parquet<P: AsRef<Path>>(
    path: P,
    records: &[BinRecord],
) -> Result<(), Box<dyn Error>> {
    let n = records.len();
    let mut segment_id = Vec::with_capacity(n);
    let mut start_km = Vec::with_capacity(n);
    let mut end_km = Vec::with_capacity(n);
    let mut t_start = Vec::with_capacity(n);
    let mut t_end = Vec::with_capacity(n);
    let mut density = Vec::with_capacity(n);
    let mut rate = Vec::with_capacity(n);
    let mut los_grade = Vec::with_capacity(n);
    let mut severity = Vec::with_capacity(n);

    for record in records {
        segment_id.push(record.segment_id.clone());
        start_km.push(record.start_km);
        end_km.push(record.end_km);
        t_start.push(record.t_start);
        t_end.push(record.t_end);
        density.push(record.density);
        rate.push(record.rate);
        los_grade.push(record.los_grade.as_str());
        severity.push(record.severity.as_str());
    }

    let schema = Schema::new(vec![
        Field::new("segment_id", DataType::Utf8, false),
        Field::new("start_km", DataType::Float64, false),
        Field::new("end_km", DataType::Float64, false),
        Field::new("t_start", DataType::Float64, false),
        Field::new("t_end", DataType::Float64, false),
        Field::new("density", DataType::Float64, false),
        Field::new("rate", DataType::Float64, false),
        Field::new("los_grade", DataType::Utf8, false),
        Field::new("severity", DataType::Utf8, false),
    ]);

    let arrays: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(segment_id)),
        Arc::new(Float64Array::from(start_km)),
        Arc::new(Float64Array::from(end_km)),
        Arc::new(Float64Array::from(t_start)),
        Arc::new(Float64Array::from(t_end)),
        Arc::new(Float64Array::from(density)),
        Arc::new(Float64Array::from(rate)),
        Arc::new(StringArray::from(los_grade)),
        Arc::new(StringArray::from(severity)),
    ];

    write_record_batch(path, schema, arrays)
}

pub fn write_flow_records_parquet<P: AsRef<Path>>(
    path: P,
    records: &[FlowRecord],
) -> Result<(), Box<dyn Error>> {
    let n = records.len();
    let mut segment_id = Vec::with_capacity(n);
    let mut event_a = Vec::with_capacity(n);
    let mut event_b = Vec::with_capacity(n);
    let mut outcome = Vec::with_capacity(n);
    let mut has_convergence = Vec::with_capacity(n);
    let mut spatial_overlap = Vec::with_capacity(n);
    let mut temporal_overlap = Vec::with_capacity(n);
    let mut point_km = Vec::with_capacity(n);
    let mut point_fraction = Vec::with_capacity(n);
    let mut overtaking_a = Vec::with_capacity(n);
    let mut overtaking_b = Vec::with_capacity(n);
    let mut copresence_a = Vec::with_capacity(n);
    let mut copresence_b = Vec::with_capacity(n);
    let mut samples_a = Vec::with_capacity(n);
    let mut samples_b = Vec::with_capacity(n);

    for record in records {
        segment_id.push(record.segment_id.clone());
        event_a.push(record.event_a.clone());
        event_b.push(record.event_b.clone());
        outcome.push(outcome_code(record.outcome));
        has_convergence.push(record.has_convergence);
        spatial_overlap.push(record.spatial_overlap);
        temporal_overlap.push(record.temporal_overlap);
        point_km.push(record.convergence_point_km);
        point_fraction.push(record.convergence_point_fraction);
        overtaking_a.push(record.overtaking_count_a);
        overtaking_b.push(record.overtaking_count_b);
        copresence_a.push(record.copresence_count_a);
        copresence_b.push(record.copresence_count_b);
        samples_a.push(join_ids(&record.sample_runner_ids_a));
        samples_b.push(join_ids(&record.sample_runner_ids_b));
    }

    let schema = Schema::new(vec![
        Field::new("segment_id", DataType::Utf8, false),
        Field::new("event_a", DataType::Utf8, false),
        Field::new("event_b", DataType::Utf8, false),
        Field::new("outcome", DataType::Utf8, false),
        Field::new("has_convergence", DataType::Boolean, false),
        Field::new("spatial_overlap", DataType::Boolean, false),
        Field::new("temporal_overlap", DataType::Boolean, false),
        Field::new("convergence_point_km", DataType::Float64, true),
        Field::new("convergence_point_fraction", DataType::Float64, true),
        Field::new("overtaking_count_a", DataType::UInt32, false),
        Field::new("overtaking_count_b", DataType::UInt32, false),
        Field::new("copresence_count_a", DataType::UInt32, false),
        Field::new("copresence_count_b", DataType::UInt32, false),
        Field::new("sample_runner_ids_a", DataType::Utf8, false),
        Field::new("sample_runner_ids_b", DataType::Utf8, false),
    ]);

    let arrays: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(segment_id)),
        Arc::new(StringArray::from(event_a)),
        Arc::new(StringArray::from(event_b)),
        Arc::new(StringArray::from(outcome)),
        Arc::new(BooleanArray::from(has_convergence)),
        Arc::new(BooleanArray::from(spatial_overlap)),
        Arc::new(BooleanArray::from(temporal_overlap)),
        Arc::new(Float64Array::from(point_km)),
        Arc::new(Float64Array::from(point_fraction)),
        Arc::new(UInt32Array::from(overtaking_a)),
        Arc::new(UInt32Array::from(overtaking_b)),
        Arc::new(UInt32Array::from(copresence_a)),
        Arc::new(UInt32Array::from(copresence_b)),
        Arc::new(StringArray::from(samples_a)),
        Arc::new(StringArray::from(samples_b)),
    ];

    write_record_batch(path, schema, arrays)
}

pub fn write_bin_records_csv<W: std::io::Write>(
    writer: W,
    records: &[BinRecord],
) -> Result<(), Box<dyn Error>> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record([
        "segment_id",
        "start_km",
        "end_km",
        "t_start",
        "t_end",
        "density",
        "rate",
        "los_grade",
        "severity",
    ])?;
    for record in records {
        wtr.write_record([
            record.segment_id.as_str(),
            &record.start_km.to_string(),
            &record.end_km.to_string(),
            &record.t_start.to_string(),
            &record.t_end.to_string(),
            &record.density.to_string(),
            &record.rate.to_string(),
            record.los_grade.as_str(),
            record.severity.as_str(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_flow_records_csv<W: std::io::Write>(
    writer: W,
    records: &[FlowRecord],
) -> Result<(), Box<dyn Error>> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record([
        "segment_id",
        "event_a",
        "event_b",
        "outcome",
        "has_convergence",
        "spatial_overlap",
        "temporal_overlap",
        "convergence_point_km",
        "convergence_point_fraction",
        "overtaking_count_a",
        "overtaking_count_b",
        "copresence_count_a",
        "copresence_count_b",
        "sample_runner_ids_a",
        "sample_runner_ids_b",
    ])?;
    for record in records {
        wtr.write_record([
            record.segment_id.as_str(),
            record.event_a.as_str(),
            record.event_b.as_str(),
            outcome_code(record.outcome),
            &record.has_convergence.to_string(),
            &record.spatial_overlap.to_string(),
            &record.temporal_overlap.to_string(),
            &record
                .convergence_point_km
                .map(|v| v.to_string())
                .unwrap_or_default(),
            &record
                .convergence_point_fraction
                .map(|v| v.to_string())
                .unwrap_or_default(),
            &record.overtaking_count_a.to_string(),
            &record.overtaking_count_b.to_string(),
            &record.copresence_count_a.to_string(),
            &record.copresence_count_b.to_string(),
            &join_ids(&record.sample_runner_ids_a),
            &join_ids(&record.sample_runner_ids_b),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_run_metadata_json<P: AsRef<Path>>(
    path: P,
    metadata: &RunMetadata,
) -> Result<(), Box<dyn Error>> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, metadata)?;
    Ok(())
}

fn write_record_batch<P: AsRef<Path>>(
    path: P,
    schema: Schema,
    arrays: Vec<ArrayRef>,
) -> Result<(), Box<dyn Error>> {
    let schema = Arc::new(schema);
    let batch = RecordBatch::try_new(schema.clone(), arrays)?;
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn outcome_code(outcome: FlowOutcome) -> &'static str {
    match outcome {
        FlowOutcome::Converged => "CONVERGED",
        FlowOutcome::SpatialOnlyNoTemporal => "SPATIAL_ONLY_NO_TEMPORAL",
        FlowOutcome::NoSpatialOverlap => "NO_SPATIAL_OVERLAP",
        FlowOutcome::EmptyField => "EMPTY_FIELD",
    }
}

fn join_ids(ids: &[u32]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
