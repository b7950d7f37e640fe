use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use crate::{errors::CoachError, setup_assistant::Plan};

pub fn write_plan(file: &Path, plan: &Plan) -> Result<(), CoachError> {
    let plan_file = File::create(file).map_err(|e| CoachError::WriterError { source: e })?;
    let mut plan_file_writer = BufWriter::new(plan_file);
    serde_json::to_writer_pretty(&mut plan_file_writer, plan)
        .map_err(|e| CoachError::WriterError { source: e.into() })?;
    writeln!(plan_file_writer).map_err(|e| CoachError::WriterError { source: e })?;
    plan_file_writer
        .flush()
        .map_err(|e| CoachError::WriterError { source: e })?;
    log::info!("Plan written to {:?}", file);
    Ok(())
}
