//! IVF-PQ index build for larger vector tables.
//!
//! Small tables are scanned exactly; once a table reaches `vector.ann_min_rows`
//! rows an IVF-PQ index is trained (L2) and its name recorded in `meta`.
use anyhow::Result;
use lancedb::index::vector::IvfPqIndexBuilder;
use lancedb::index::Index;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType};

use crate::schema::{META_TABLE, VECTOR_COLUMN};
use crate::table::{set_meta, META_ANN_INDEX};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IvfPqParams {
    pub partitions: u32,
    pub sub_vectors: u32,
}

pub fn compute_ivfpq_params(rows: usize, dim: usize) -> IvfPqParams {
    let sqrt_n = (rows as f64).sqrt() as usize;
    let mut partitions = (2 * sqrt_n).clamp(1, 65536);
    // fewer partitions than rows, or training fails on tiny tables
    partitions = if rows > 1 { partitions.min(rows - 1) } else { 1 };
    let preferred = if dim >= 1024 { 32 } else { 16 };
    let sub_vectors = [preferred, 16, 8, 4, 2, 1]
        .into_iter()
        .find(|m| *m <= dim && dim % m == 0)
        .unwrap_or(1);
    IvfPqParams { partitions: partitions as u32, sub_vectors: sub_vectors as u32 }
}

pub async fn build_ivfpq_index(conn: &Connection, table_name: &str, index_name: &str, params: &IvfPqParams) -> Result<()> {
    let table = conn.open_table(table_name).execute().await?;
    table
        .create_index(
            &[VECTOR_COLUMN],
            Index::IvfPq(
                IvfPqIndexBuilder::default()
                    .distance_type(DistanceType::L2)
                    .num_partitions(params.partitions)
                    .num_sub_vectors(params.sub_vectors),
            ),
        )
        .name(index_name.to_string())
        .execute()
        .await?;
    set_meta(conn, META_TABLE, META_ANN_INDEX, index_name).await?;
    tracing::info!(table = table_name, index = index_name, partitions = params.partitions, sub_vectors = params.sub_vectors, "ANN index built");
    Ok(())
}

/// Build the ANN index when the table holds at least `min_rows` rows.
/// Returns the index name when one was built.
pub async fn maybe_build_ann_index(conn: &Connection, table_name: &str, dim: usize, min_rows: usize) -> Result<Option<String>> {
    let table = conn.open_table(table_name).execute().await?;
    let rows = table.count_rows(None).await?;
    if rows < min_rows.max(2) {
        tracing::debug!(rows, min_rows, "table below ANN threshold; exact search only");
        return Ok(None);
    }
    let params = compute_ivfpq_params(rows, dim);
    let index_name = format!("ivfpq-{}", chrono::Utc::now().format("%Y%m%d-%H%M%S"));
    build_ivfpq_index(conn, table_name, &index_name, &params).await?;
    Ok(Some(index_name))
}

/// Query a few stored vectors against the table and check each finds something.
pub async fn validate_index(conn: &Connection, table_name: &str, k: usize, sample: usize) -> Result<bool> {
    use arrow_array::cast::AsArray;
    use arrow_array::types::Float32Type;
    use arrow_array::Array;

    let table = conn.open_table(table_name).execute().await?;
    let mut stream = table.query().limit(sample).execute().await?;
    let mut ok = 0usize;
    while let Some(batch) = futures::TryStreamExt::try_next(&mut stream).await? {
        let Some(vectors) = batch.column_by_name(VECTOR_COLUMN).and_then(|c| c.as_fixed_size_list_opt()) else { continue };
        for i in 0..vectors.len() {
            if !vectors.is_valid(i) { continue; }
            let q = vectors.value(i).as_primitive::<Float32Type>().values().to_vec();
            let mut s = table.vector_search(q)?.distance_type(DistanceType::L2).limit(k).execute().await?;
            if let Some(rb) = futures::TryStreamExt::try_next(&mut s).await? {
                if rb.num_rows() > 0 { ok += 1; }
            }
        }
    }
    Ok(ok > 0)
}
